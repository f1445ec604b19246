//! Mutating admission webhook for Pebble-based container images
//!
//! Pebble keeps its state under `$PEBBLE`. In containers with a read-only root
//! filesystem it cannot write there, so this webhook patches Pods at creation:
//! every such container gets a `pebble-dir` emptyDir volume mounted at
//! `$PEBBLE/writable`, `$PEBBLE` is pointed at that mount and
//! `$PEBBLE_COPY_ONCE` at the original directory.
//!
//! ```no_run
//! use clap::Parser;
//! use pebble_webhook::{Config, PebbleMountMutator};
//!
//! # async fn run() -> pebble_webhook::Result<()> {
//! let config = Config::parse();
//! config.init_tracing()?;
//! pebble_webhook::webhook::serve(&config, PebbleMountMutator).await
//! # }
//! ```

pub mod admission;
pub mod config;
pub mod container;
pub mod error;
pub mod mutation;
pub mod patch;
pub mod webhook;

pub use admission::{FailurePolicy, MutatingAdmissionHandler, PebbleMountMutator};
pub use config::Config;
pub use error::{Error, HandlerError, Result, ReviewError};

/// Env var holding the directory Pebble keeps its state in
pub const PEBBLE_ENV_VAR: &str = "PEBBLE";

/// Env var telling Pebble to seed `$PEBBLE` from this directory on first start
pub const PEBBLE_COPY_ONCE_ENV_VAR: &str = "PEBBLE_COPY_ONCE";

/// `$PEBBLE` of containers that don't set it
pub const PEBBLE_DEFAULT_PATH: &str = "/var/lib/pebble/default";

/// Directory below `$PEBBLE` the writable volume is mounted at
pub const PEBBLE_WRITABLE_SUBPATH: &str = "writable";

/// Name of the shared emptyDir volume added to mutated Pods
pub const PEBBLE_VOLUME_NAME: &str = "pebble-dir";
