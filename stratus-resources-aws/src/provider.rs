use std::{collections::BTreeMap, sync::Arc};

use stratus_resource::{error::ProviderError, resource::Resource, value::ScalarValue};

use crate::{
    config::{
        definition::{provider_config_definition, validate_provider_config, ConfigDefinition},
        validation::Diagnostic,
        AwsConfigLoader, AwsConfigStore,
    },
    lambda::{function::FunctionResource, LambdaServiceFactory},
};

pub const PROVIDER_NAMESPACE: &str = "aws";

/// The AWS provider: its resource types, keyed by type name, and the
/// definition of its configuration.
pub struct AwsProvider {
    resources: BTreeMap<&'static str, Arc<dyn Resource>>,
    config_definition: ConfigDefinition,
}

impl AwsProvider {
    /// `env` is the process environment, captured once and shared by every
    /// session's configuration.
    pub fn new(
        lambda: Arc<dyn LambdaServiceFactory>,
        env: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        let config_store = Arc::new(AwsConfigStore::new(env, AwsConfigLoader));

        let mut resources: BTreeMap<&'static str, Arc<dyn Resource>> = BTreeMap::new();
        let function = Arc::new(FunctionResource::new(lambda, config_store));
        resources.insert(function.resource_type(), function);

        AwsProvider {
            resources,
            config_definition: provider_config_definition(),
        }
    }

    pub fn namespace(&self) -> &'static str {
        PROVIDER_NAMESPACE
    }

    pub fn resource(&self, resource_type: &str) -> Result<Arc<dyn Resource>, ProviderError> {
        self.resources.get(resource_type).cloned().ok_or_else(|| {
            ProviderError::UnsupportedConfiguration(format!(
                "unknown resource type: {}",
                resource_type
            ))
        })
    }

    pub fn resource_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.resources.keys().copied()
    }

    pub fn config_definition(&self) -> &ConfigDefinition {
        &self.config_definition
    }

    pub fn validate_config(&self, config: &BTreeMap<String, ScalarValue>) -> Vec<Diagnostic> {
        validate_provider_config(&self.config_definition, config)
    }
}
