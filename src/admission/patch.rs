use json_patch::{AddOperation, Patch, PatchOperation, ReplaceOperation};
use serde::Serialize;

use crate::errors::Error;
use crate::placement::{ConstraintDelta, Replacement};

/// One operation per touched field, each carrying the field's complete new value.
///
/// Fields that already exist are replaced; missing ones are added, since `replace`
/// on an absent member is rejected by the API server.
pub fn build(delta: &ConstraintDelta) -> Result<Patch, Error> {
    let mut operations = Vec::new();
    if let Some(node_selector) = &delta.node_selector {
        operations.push(field_operation(delta.pod_spec_path, "nodeSelector", node_selector)?);
    }
    if let Some(affinity) = &delta.affinity {
        operations.push(field_operation(delta.pod_spec_path, "affinity", affinity)?);
    }
    Ok(Patch(operations))
}

fn field_operation<T: Serialize>(
    pod_spec_path: &str,
    field: &str,
    replacement: &Replacement<T>,
) -> Result<PatchOperation, Error> {
    let path = format!("{}/{}", pod_spec_path, field);
    let value = serde_json::to_value(&replacement.value).map_err(Error::Serialize)?;
    Ok(if replacement.existed {
        PatchOperation::Replace(ReplaceOperation { path, value })
    } else {
        PatchOperation::Add(AddOperation { path, value })
    })
}
