//! The change set handed in by the orchestrator for a deployment.
//!
//! Field paths are qualified by the resource section they belong to, e.g.
//! `spec.memorySize` or `spec.vpcConfig.subnetIds[0]`.

use serde::{Deserialize, Serialize};

use crate::value::{MappingNode, EMPTY_FIELDS};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldChange {
    pub field_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_value: Option<MappingNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<MappingNode>,
}

impl FieldChange {
    pub fn new(field_path: impl Into<String>) -> Self {
        FieldChange {
            field_path: field_path.into(),
            ..Default::default()
        }
    }
}

/// What the orchestrator knows about the deployed resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedResourceInfo {
    pub resource_id: String,
    pub resource_name: String,
    /// Spec of the last known state, absent for a resource being created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_state_spec: Option<MappingNode>,
    /// Desired spec with all substitutions resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_spec: Option<MappingNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Changes {
    pub applied_resource_info: AppliedResourceInfo,
    #[serde(default)]
    pub new_fields: Vec<FieldChange>,
    #[serde(default)]
    pub modified_fields: Vec<FieldChange>,
    #[serde(default)]
    pub removed_fields: Vec<String>,
}

impl Changes {
    /// The last known spec, or an empty `Fields` node when there is none.
    pub fn current_state_spec(&self) -> &MappingNode {
        self.applied_resource_info
            .current_state_spec
            .as_ref()
            .unwrap_or(&EMPTY_FIELDS)
    }

    /// The resolved desired spec, or an empty `Fields` node when there is none.
    pub fn resolved_spec(&self) -> &MappingNode {
        self.applied_resource_info
            .resolved_spec
            .as_ref()
            .unwrap_or(&EMPTY_FIELDS)
    }

    /// Whether `path` or anything below it is new or modified.
    pub fn has_changed(&self, path: &str) -> bool {
        self.new_fields
            .iter()
            .chain(self.modified_fields.iter())
            .any(|change| covers(path, &change.field_path))
    }

    /// Like [`Changes::has_changed`], also counting removals.
    pub fn touches(&self, path: &str) -> bool {
        self.has_changed(path)
            || self
                .removed_fields
                .iter()
                .any(|removed| covers(path, removed))
    }

    pub fn is_empty(&self) -> bool {
        self.new_fields.is_empty() && self.modified_fields.is_empty() && self.removed_fields.is_empty()
    }
}

fn covers(path: &str, changed: &str) -> bool {
    match changed.strip_prefix(path) {
        Some(rest) => rest.is_empty() || rest.starts_with('.') || rest.starts_with('['),
        None => false,
    }
}
