use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    changes::Changes, context::ProviderContext, context::RequestContext, error::ProviderError,
    value::MappingNode,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDeployInput {
    pub resource_id: String,
    pub changes: Changes,
    #[serde(default)]
    pub provider_context: ProviderContext,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDeployOutput {
    /// Values assigned by the remote service, keyed by qualified field path
    /// such as `spec.arn`.
    pub computed_field_values: BTreeMap<String, MappingNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDestroyInput {
    pub resource_id: String,
    /// Spec of the last known state.
    pub resource_spec: MappingNode,
    #[serde(default)]
    pub provider_context: ProviderContext,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalStateInput {
    pub resource_id: String,
    /// Spec the caller last applied. Supplies values the service never
    /// returns.
    pub current_spec: MappingNode,
    #[serde(default)]
    pub provider_context: ProviderContext,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalStateOutput {
    pub resource_spec: MappingNode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StabilisedInput {
    pub resource_id: String,
    pub resource_spec: MappingNode,
    #[serde(default)]
    pub provider_context: ProviderContext,
}

/// Entry points the orchestrator calls for one resource type.
///
/// Whether to create, update or destroy is decided by the caller; durable
/// state is owned by the caller too.
#[async_trait]
pub trait Resource: Send + Sync {
    fn resource_type(&self) -> &'static str;

    async fn create(
        &self,
        ctx: &RequestContext,
        input: &ResourceDeployInput,
    ) -> Result<ResourceDeployOutput, ProviderError>;

    async fn update(
        &self,
        ctx: &RequestContext,
        input: &ResourceDeployInput,
    ) -> Result<ResourceDeployOutput, ProviderError>;

    async fn destroy(
        &self,
        ctx: &RequestContext,
        input: &ResourceDestroyInput,
    ) -> Result<(), ProviderError>;

    async fn get_external_state(
        &self,
        ctx: &RequestContext,
        input: &ExternalStateInput,
    ) -> Result<ExternalStateOutput, ProviderError>;

    async fn has_stabilised(
        &self,
        ctx: &RequestContext,
        input: &StabilisedInput,
    ) -> Result<bool, ProviderError>;
}
