//! Predicates over a single container of the admitted Pod

use k8s_openapi::api::core::v1::Container;

use crate::{PEBBLE_DEFAULT_PATH, PEBBLE_ENV_VAR};

/// Returns whether Pebble needs a writable volume in this container
///
/// Containers do not have a read-only root filesystem unless
/// `securityContext.readOnlyRootFilesystem` is explicitly set to `true`.
pub fn needs_pebble_volume(container: &Container) -> bool {
    container
        .security_context
        .as_ref()
        .and_then(|ctx| ctx.read_only_root_filesystem)
        .unwrap_or(false)
}

/// Returns the position of the first env var named `name`, in declared order
pub fn find_env_var(container: &Container, name: &str) -> Option<usize> {
    container
        .env
        .as_deref()?
        .iter()
        .position(|env| env.name == name)
}

/// Returns the configured `$PEBBLE` path, or the default one
///
/// An entry without a literal value (e.g. one using `valueFrom`) resolves to
/// an empty path.
pub fn pebble_path(container: &Container) -> String {
    let Some(index) = find_env_var(container, PEBBLE_ENV_VAR) else {
        return PEBBLE_DEFAULT_PATH.to_string();
    };

    container
        .env
        .as_deref()
        .and_then(|env| env.get(index))
        .and_then(|env| env.value.clone())
        .unwrap_or_default()
}

/// Returns whether any volume mount of the container targets exactly `path`
pub fn has_mount_path(container: &Container, path: &str) -> bool {
    container
        .volume_mounts
        .as_deref()
        .unwrap_or_default()
        .iter()
        .any(|mount| mount.mount_path == path)
}
