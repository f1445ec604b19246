use clap::Parser;
use pebble_webhook::{Config, PebbleMountMutator};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), pebble_webhook::Error> {
    let config = Config::parse();
    config.init_tracing()?;

    info!("starting mutating-pebble-webhook");

    if let Err(err) = pebble_webhook::webhook::serve(&config, PebbleMountMutator).await {
        error!(error = %err, "webhook server failed");
        return Err(err);
    }

    Ok(())
}
