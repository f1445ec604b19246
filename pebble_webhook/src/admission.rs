use std::error::Error as StdError;

use json_patch::Patch;
use k8s_openapi::api::core::v1::Pod;
use kube::core::admission::{AdmissionRequest, AdmissionResponse};
use kube::core::{DynamicObject, GroupVersionResource};
use tracing::{error, info};

use crate::HandlerError;
use crate::mutation::pebble_volume_patches;

pub trait MutatingAdmissionHandler: Send + Sync {
    /// Error type returned by the handler
    type Err: StdError + Send + Sync + 'static;

    /// Returns the name of this handler for logging purposes
    fn name(&self) -> &'static str;

    /// Mutates the resource in the admission request
    ///
    /// Returns an `AdmissionResponse` that may include JSON patches to modify the resource.
    /// Errors are turned into a response by the configured [`FailurePolicy`].
    fn mutate(&self, req: &AdmissionRequest<DynamicObject>) -> Result<AdmissionResponse, Self::Err>;
}

/// What to answer when a handler fails to process a request
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum FailurePolicy {
    /// Admit the object unchanged, reporting the error in the status message
    Open,
    /// Deny the object, reporting the error in the status message
    #[default]
    Closed,
}

impl FailurePolicy {
    fn respond(self, req: &AdmissionRequest<DynamicObject>, message: String) -> AdmissionResponse {
        match self {
            FailurePolicy::Closed => AdmissionResponse::from(req).deny(message),
            FailurePolicy::Open => {
                let mut res = AdmissionResponse::from(req);
                res.result.message = message;
                res
            }
        }
    }
}

/// Adds a writable Pebble state volume to Pods with read-only root filesystems
#[derive(Clone, Copy, Debug, Default)]
pub struct PebbleMountMutator;

impl MutatingAdmissionHandler for PebbleMountMutator {
    type Err = HandlerError;

    fn name(&self) -> &'static str {
        "PebbleMountMutator"
    }

    fn mutate(&self, req: &AdmissionRequest<DynamicObject>) -> Result<AdmissionResponse, Self::Err> {
        ensure_pod_resource(&req.resource)?;
        let pod = decode_pod(req)?;

        let res = AdmissionResponse::from(req);
        let patches = pebble_volume_patches(&pod).map_err(HandlerError::SerializationError)?;
        if patches.is_empty() {
            return Ok(res);
        }

        Ok(res.with_patch(Patch(patches))?)
    }
}

fn ensure_pod_resource(resource: &GroupVersionResource) -> Result<(), HandlerError> {
    if resource.group.is_empty() && resource.version == "v1" && resource.resource == "pods" {
        return Ok(());
    }

    // `<group>/<version>, Resource=<resource>`, leading `/` kept for the core group
    Err(HandlerError::UnexpectedResource {
        actual: format!(
            "{}/{}, Resource={}",
            resource.group, resource.version, resource.resource
        ),
    })
}

fn decode_pod(req: &AdmissionRequest<DynamicObject>) -> Result<Pod, HandlerError> {
    let obj = req.object.as_ref().ok_or(HandlerError::MissingObject)?;
    let value = serde_json::to_value(obj).map_err(HandlerError::Decode)?;
    serde_json::from_value(value).map_err(HandlerError::Decode)
}

/// Runs `handler` on the request, applying `policy` if it fails
pub fn review<H>(
    handler: &H,
    req: &AdmissionRequest<DynamicObject>,
    policy: FailurePolicy,
) -> AdmissionResponse
where
    H: MutatingAdmissionHandler + ?Sized,
{
    let name = req.name.as_str();
    let namespace = req.namespace.as_deref().unwrap_or_default();

    match handler.mutate(req) {
        Ok(res) => {
            info!(
                handler = handler.name(),
                uid = %req.uid,
                operation = ?req.operation,
                name = %name,
                namespace = %namespace,
                patched = res.patch.is_some(),
                "mutated resource"
            );
            res
        }
        Err(err) => {
            error!(
                handler = handler.name(),
                uid = %req.uid,
                operation = ?req.operation,
                name = %name,
                namespace = %namespace,
                policy = ?policy,
                error = %err,
                "mutation failed"
            );
            policy.respond(req, err.to_string())
        }
    }
}
