use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::admission::FailurePolicy;

/// Runtime configuration of the webhook server
///
/// Every flag can also be set through the environment of the webhook Pod.
#[derive(Parser, Debug, Clone)]
#[command(name = "mutating-pebble-webhook", version, about, long_about = None)]
pub struct Config {
    /// Address to accept admission reviews on
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8443")]
    pub listen_addr: SocketAddr,

    /// PEM encoded TLS certificate served to the API server
    #[arg(long, env = "TLS_CERT_FILE", default_value = "/etc/admission-webhook/tls/tls.crt")]
    pub tls_cert: PathBuf,

    /// PEM encoded private key of the TLS certificate
    #[arg(long, env = "TLS_KEY_FILE", default_value = "/etc/admission-webhook/tls/tls.key")]
    pub tls_key: PathBuf,

    /// Log filter, either a level (`debug`, `WARN`, ...) or tracing directives
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Whether a failed mutation admits the Pod unchanged or denies it
    #[arg(long, env = "FAILURE_POLICY", value_enum, default_value_t = FailurePolicy::Closed)]
    pub failure_policy: FailurePolicy,
}

impl Config {
    /// Parses the configured log level into a tracing filter
    pub fn log_filter(&self) -> crate::Result<EnvFilter> {
        Ok(EnvFilter::try_new(self.log_level.to_lowercase())?)
    }

    /// Installs the global tracing subscriber, logging to stderr
    pub fn init_tracing(&self) -> crate::Result<()> {
        tracing_subscriber::fmt()
            .with_env_filter(self.log_filter()?)
            .with_writer(std::io::stderr)
            .init();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::{CommandFactory, FromArgMatches};

    // Parses `args` with the env fallbacks removed, so the host environment
    // can't leak into the result.
    fn parse_without_env(args: &[&str]) -> Result<Config, clap::Error> {
        let cmd = ["listen_addr", "tls_cert", "tls_key", "log_level", "failure_policy"]
            .into_iter()
            .fold(Config::command(), |cmd, id| {
                cmd.mut_arg(id, |arg| arg.env(None::<&'static str>))
            });
        let matches = cmd.try_get_matches_from(args)?;
        Config::from_arg_matches(&matches)
    }

    #[test]
    fn defaults_match_deployment_layout() {
        let config = parse_without_env(&["mutating-pebble-webhook"]).unwrap();

        assert_eq!(config.listen_addr, "0.0.0.0:8443".parse().unwrap());
        assert_eq!(
            config.tls_cert,
            PathBuf::from("/etc/admission-webhook/tls/tls.crt")
        );
        assert_eq!(
            config.tls_key,
            PathBuf::from("/etc/admission-webhook/tls/tls.key")
        );
        assert_eq!(config.log_level, "info");
        assert_eq!(config.failure_policy, FailurePolicy::Closed);
    }

    #[test]
    fn every_setting_has_an_env_fallback() {
        let cmd = Config::command();
        let envs: Vec<_> = cmd
            .get_arguments()
            .filter_map(|arg| arg.get_env())
            .map(|env| env.to_string_lossy().into_owned())
            .collect();

        for env in [
            "LISTEN_ADDR",
            "TLS_CERT_FILE",
            "TLS_KEY_FILE",
            "LOG_LEVEL",
            "FAILURE_POLICY",
        ] {
            assert!(envs.iter().any(|e| e == env), "missing env fallback {env}");
        }
    }

    #[test]
    fn failure_policy_flag() {
        let config =
            parse_without_env(&["mutating-pebble-webhook", "--failure-policy", "open"]).unwrap();
        assert_eq!(config.failure_policy, FailurePolicy::Open);

        let err = parse_without_env(&["mutating-pebble-webhook", "--failure-policy", "sometimes"]);
        assert!(err.is_err());
    }

    #[test]
    fn invalid_listen_addr_is_rejected() {
        let err = parse_without_env(&["mutating-pebble-webhook", "--listen-addr", "nope"]);
        assert!(err.is_err());
    }

    #[test]
    fn log_levels_are_case_insensitive() {
        let mut config =
            parse_without_env(&["mutating-pebble-webhook", "--log-level", "DEBUG"]).unwrap();
        assert!(config.log_filter().is_ok());

        config.log_level = "pebble_webhook=trace,warp=warn".to_string();
        assert!(config.log_filter().is_ok());

        config.log_level = "pebble_webhook=verbose".to_string();
        assert!(matches!(config.log_filter(), Err(crate::Error::LogLevel(_))));
    }
}
