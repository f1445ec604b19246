//! HTTPS transport for admission reviews
//!
//! - `POST /add-pebble-mount` decodes an `AdmissionReview`, runs the handler and
//!   answers with the resulting `AdmissionReview`
//! - `GET /healthz` always answers `OK`
//!
//! Malformed reviews are rejected with HTTP 400 and a plain-text message. Handler
//! failures are not HTTP errors, they are reported inside the admission response.
//! The response `patch` goes on the wire base64 encoded, as the API server expects
//! for a byte field.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use base64::{Engine, engine::general_purpose::STANDARD};
use kube::core::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview};
use serde_json::Value;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{debug, error, info};
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

use crate::admission::{FailurePolicy, MutatingAdmissionHandler, review};
use crate::config::Config;
use crate::{Error, ReviewError};

/// Path segment of the mutation endpoint
pub const MUTATE_PATH: &str = "add-pebble-mount";

/// Largest accepted review body, the API server's own request size limit
pub const MAX_BODY_BYTES: u64 = 3 * 1024 * 1024;

const JSON_CONTENT_TYPE: &str = "application/json";
const ADMISSION_API_VERSION: &str = "admission.k8s.io/v1";
const ADMISSION_REVIEW_KIND: &str = "AdmissionReview";

/// Builds the webhook routes around `handler`
pub fn routes<H>(
    handler: H,
    policy: FailurePolicy,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone
where
    H: MutatingAdmissionHandler + 'static,
{
    let handler = Arc::new(handler);

    let mutate = warp::path(MUTATE_PATH)
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::header::optional::<String>("content-type"))
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::bytes())
        .map(move |content_type: Option<String>, body: Bytes| {
            mutate_reply(handler.as_ref(), policy, content_type.as_deref(), &body)
        });

    let healthz = warp::path("healthz")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| {
            debug!("healthy");
            "OK".into_response()
        });

    mutate.or(healthz).unify()
}

fn mutate_reply<H>(
    handler: &H,
    policy: FailurePolicy,
    content_type: Option<&str>,
    body: &[u8],
) -> Response
where
    H: MutatingAdmissionHandler + ?Sized,
{
    let req = match decode_review(content_type, body) {
        Ok(req) => req,
        Err(err) => {
            error!(error = %err, "invalid admission review");
            return warp::reply::with_status(err.to_string(), StatusCode::BAD_REQUEST)
                .into_response();
        }
    };

    let res = review(handler, &req, policy);
    debug!(
        uid = %res.uid,
        allowed = res.allowed,
        patched = res.patch.is_some(),
        "sending response"
    );

    match encode_review(res) {
        Ok(body) => warp::reply::json(&body).into_response(),
        Err(err) => {
            error!(error = %err, "failed to encode admission review");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Wraps `res` in an `AdmissionReview`, with its patch base64 encoded
pub fn encode_review(res: AdmissionResponse) -> serde_json::Result<Value> {
    let patch = res.patch.as_deref().map(|patch| STANDARD.encode(patch));
    let mut review = serde_json::to_value(res.into_review())?;

    let response = review.get_mut("response").and_then(Value::as_object_mut);
    if let (Some(patch), Some(response)) = (patch, response) {
        response.insert("patch".to_string(), Value::String(patch));
    }

    Ok(review)
}

/// Decodes the body of a mutation request into its admission request
pub fn decode_review(
    content_type: Option<&str>,
    body: &[u8],
) -> Result<AdmissionRequest<DynamicObject>, ReviewError> {
    let content_type = content_type.unwrap_or_default();
    if content_type != JSON_CONTENT_TYPE {
        return Err(ReviewError::ContentType(content_type.to_string()));
    }

    if body.is_empty() {
        return Err(ReviewError::EmptyBody);
    }

    let review: AdmissionReview<DynamicObject> =
        serde_json::from_slice(body).map_err(ReviewError::Decode)?;

    if review.types.api_version != ADMISSION_API_VERSION
        || review.types.kind != ADMISSION_REVIEW_KIND
    {
        return Err(ReviewError::UnsupportedKind {
            api_version: review.types.api_version,
            kind: review.types.kind,
        });
    }

    Ok(review.try_into()?)
}

/// Serves `handler` over TLS until SIGTERM or SIGINT
///
/// The certificate and key must exist before the server binds. An unusable key
/// pair or listen address is returned as [`Error::Serve`].
pub async fn serve<H>(config: &Config, handler: H) -> crate::Result<()>
where
    H: MutatingAdmissionHandler + 'static,
{
    ensure_file(&config.tls_cert).await?;
    ensure_file(&config.tls_key).await?;

    let shutdown = shutdown_signal()?;

    let (addr, server) = warp::serve(routes(handler, config.failure_policy))
        .tls()
        .cert_path(&config.tls_cert)
        .key_path(&config.tls_key)
        .try_bind_with_graceful_shutdown(config.listen_addr, shutdown)
        .map_err(|err| {
            error!(error = %err, addr = %config.listen_addr, "failed to start TLS server");
            Error::Serve(err)
        })?;

    info!(
        addr = %addr,
        failure_policy = ?config.failure_policy,
        "listening for admission reviews"
    );
    server.await;
    info!("webhook server stopped");

    Ok(())
}

async fn ensure_file(path: &Path) -> crate::Result<()> {
    match tokio::fs::metadata(path).await {
        Ok(_) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            error!(path = %path.display(), "expected file to exist, but doesn't");
            Err(Error::MissingFile(path.to_path_buf()))
        }
        Err(err) => {
            error!(path = %path.display(), error = %err, "failed to check file");
            Err(err.into())
        }
    }
}

fn shutdown_signal() -> crate::Result<impl Future<Output = ()> + Send + 'static> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    Ok(async move {
        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
            _ = sigint.recv() => info!("received SIGINT, shutting down"),
        }
    })
}
