//! Pod mutation giving Pebble a writable state directory
//!
//! Pebble needs to be able to write its state. Containers with a read-only root
//! filesystem get an `emptyDir` volume mounted below their `$PEBBLE` directory,
//! and `$PEBBLE`/`$PEBBLE_COPY_ONCE` pointing Pebble at it.

use std::path::{Component, Path, PathBuf};

use json_patch::PatchOperation;
use k8s_openapi::api::core::v1::{Container, EmptyDirVolumeSource, EnvVar, Pod, Volume, VolumeMount};
use tracing::debug;

use crate::container::{find_env_var, has_mount_path, needs_pebble_volume, pebble_path};
use crate::patch;
use crate::{
    PEBBLE_COPY_ONCE_ENV_VAR, PEBBLE_ENV_VAR, PEBBLE_VOLUME_NAME, PEBBLE_WRITABLE_SUBPATH,
};

/// Returns the JSON patches needed by the Pebble containers of `pod`
///
/// Every path is computed against `pod` as given. Container-level patches are
/// emitted in declared container order, and the shared Pod volume comes last.
/// An empty list means the Pod is left untouched.
pub fn pebble_volume_patches(pod: &Pod) -> serde_json::Result<Vec<PatchOperation>> {
    let containers = pod
        .spec
        .as_ref()
        .map(|spec| spec.containers.as_slice())
        .unwrap_or_default();

    let mut patches = Vec::new();

    for (index, container) in containers.iter().enumerate() {
        if !needs_pebble_volume(container) {
            continue;
        }

        // An existing mount on $PEBBLE is left for the user to manage, even if it
        // hides the layers Pebble expects there.
        let pebble_path = pebble_path(container);
        if has_mount_path(container, &pebble_path) {
            debug!(
                container = %container.name,
                path = %pebble_path,
                "pebble path already mounted, skipping"
            );
            continue;
        }

        // The layers folder lives in $PEBBLE, so mount in a subfolder and let
        // Pebble copy the original content over on first start.
        let mount_path = writable_path(&pebble_path);

        // subPath keeps containers sharing the volume from using the same
        // socket and state files.
        patches.push(patch::add(
            patch::container_volume_mount(index),
            VolumeMount {
                name: PEBBLE_VOLUME_NAME.to_string(),
                mount_path: mount_path.clone(),
                sub_path: Some(container.name.clone()),
                ..Default::default()
            },
        )?);

        patches.extend(env_patches(container, index, &pebble_path, &mount_path)?);
    }

    if patches.is_empty() {
        return Ok(patches);
    }

    patches.push(patch::add(
        patch::pod_volume(),
        Volume {
            name: PEBBLE_VOLUME_NAME.to_string(),
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Default::default()
        },
    )?);

    Ok(patches)
}

/// Joins the writable segment onto a `$PEBBLE` path
///
/// The result is cleaned lexically: repeated separators and `.` segments are
/// dropped, and `..` removes the segment before it (or is dropped at the root).
pub fn writable_path(pebble_path: &str) -> String {
    let joined = Path::new(pebble_path).join(PEBBLE_WRITABLE_SUBPATH);

    let mut cleaned = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match cleaned.components().next_back() {
                Some(Component::Normal(_)) => {
                    cleaned.pop();
                }
                Some(Component::RootDir) => {}
                _ => cleaned.push(Component::ParentDir),
            },
            other => cleaned.push(other),
        }
    }

    cleaned.to_string_lossy().into_owned()
}

fn env_patches(
    container: &Container,
    index: usize,
    pebble_path: &str,
    mount_path: &str,
) -> serde_json::Result<Vec<PatchOperation>> {
    let envs = [
        EnvVar {
            name: PEBBLE_ENV_VAR.to_string(),
            value: Some(mount_path.to_string()),
            ..Default::default()
        },
        EnvVar {
            name: PEBBLE_COPY_ONCE_ENV_VAR.to_string(),
            value: Some(pebble_path.to_string()),
            ..Default::default()
        },
    ];

    if container.env.is_none() {
        return Ok(vec![patch::add(patch::container_env(index), &envs)?]);
    }

    envs.iter()
        .map(|env| match find_env_var(container, &env.name) {
            Some(env_index) => patch::replace(patch::container_env_at(index, env_index), env),
            None => patch::add(patch::container_env_append(index), env),
        })
        .collect()
}
