//! Serves the webhook routes without TLS
//!
//! Handy for poking at the mutation locally:
//!
//! ```sh
//! cargo run --example plain_http
//! curl -s -H 'Content-Type: application/json' \
//!     --data @review.json http://127.0.0.1:8080/add-pebble-mount
//! ```

use pebble_webhook::webhook::routes;
use pebble_webhook::{FailurePolicy, PebbleMountMutator};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().init();

    warp::serve(routes(PebbleMountMutator, FailurePolicy::Open))
        .run(([127, 0, 0, 1], 8080))
        .await;
}
