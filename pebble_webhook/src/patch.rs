//! JSON Patch operations and the Pod locations they target

use json_patch::jsonptr::PointerBuf;
use json_patch::{AddOperation, PatchOperation, ReplaceOperation};
use serde::Serialize;

/// Token addressing the position past the last array element
const END_OF_ARRAY: &str = "-";

/// Builds an `add` operation, serializing `value`
pub fn add(path: PointerBuf, value: impl Serialize) -> serde_json::Result<PatchOperation> {
    Ok(PatchOperation::Add(AddOperation {
        path,
        value: serde_json::to_value(value)?,
    }))
}

/// Builds a `replace` operation, serializing `value`
pub fn replace(path: PointerBuf, value: impl Serialize) -> serde_json::Result<PatchOperation> {
    Ok(PatchOperation::Replace(ReplaceOperation {
        path,
        value: serde_json::to_value(value)?,
    }))
}

fn container_field(container: usize, field: &str) -> PointerBuf {
    let mut path = PointerBuf::from_tokens(["spec", "containers"]);
    path.push_back(container.to_string());
    path.push_back(field);
    path
}

/// `/spec/containers/<container>/volumeMounts/-`
pub fn container_volume_mount(container: usize) -> PointerBuf {
    let mut path = container_field(container, "volumeMounts");
    path.push_back(END_OF_ARRAY);
    path
}

/// `/spec/containers/<container>/env`
pub fn container_env(container: usize) -> PointerBuf {
    container_field(container, "env")
}

/// `/spec/containers/<container>/env/-`
pub fn container_env_append(container: usize) -> PointerBuf {
    let mut path = container_env(container);
    path.push_back(END_OF_ARRAY);
    path
}

/// `/spec/containers/<container>/env/<index>`
pub fn container_env_at(container: usize, index: usize) -> PointerBuf {
    let mut path = container_env(container);
    path.push_back(index.to_string());
    path
}

/// `/spec/volumes/-`
pub fn pod_volume() -> PointerBuf {
    PointerBuf::from_tokens(["spec", "volumes", END_OF_ARRAY])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn container_paths_embed_index() {
        assert_eq!(
            container_volume_mount(3).as_str(),
            "/spec/containers/3/volumeMounts/-"
        );
        assert_eq!(container_env(0).as_str(), "/spec/containers/0/env");
        assert_eq!(container_env_append(1).as_str(), "/spec/containers/1/env/-");
        assert_eq!(container_env_at(2, 5).as_str(), "/spec/containers/2/env/5");
    }

    #[test]
    fn pod_volume_appends() {
        assert_eq!(pod_volume().as_str(), "/spec/volumes/-");
    }

    #[test]
    fn operations_serialize_as_rfc6902() {
        let ops = vec![
            add(pod_volume(), json!({"name": "pebble-dir"})).unwrap(),
            replace(container_env_at(0, 1), json!({"name": "PEBBLE"})).unwrap(),
        ];

        assert_eq!(
            serde_json::to_value(&ops).unwrap(),
            json!([
                {"op": "add", "path": "/spec/volumes/-", "value": {"name": "pebble-dir"}},
                {"op": "replace", "path": "/spec/containers/0/env/1", "value": {"name": "PEBBLE"}},
            ])
        );
    }
}
