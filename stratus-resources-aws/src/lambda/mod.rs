//! AWS Lambda: the service boundary and the resources built on it.

pub mod function;
#[cfg(test)]
pub(crate) mod mock;
pub mod types;

use std::sync::Arc;

use async_trait::async_trait;
use stratus_resource::{context::ProviderContext, error::ServiceError};

use crate::config::AwsConfig;
use types::{
    CreateFunctionInput, FunctionConfiguration, GetFunctionCodeSigningConfigOutput,
    GetFunctionConcurrencyOutput, GetFunctionOutput, GetFunctionRecursionConfigOutput,
    PutFunctionCodeSigningConfigInput, PutFunctionConcurrencyInput,
    PutFunctionRecursionConfigInput, PutRuntimeManagementConfigInput, TagResourceInput,
    UntagResourceInput, UpdateFunctionCodeInput, UpdateFunctionConfigurationInput,
};

/// The Lambda API calls the function resource needs. Each call fails
/// independently; retries belong to the implementation's transport.
///
/// `function_name` accepts a function name or ARN.
#[async_trait]
pub trait LambdaService: Send + Sync {
    async fn get_function(&self, function_name: &str) -> Result<GetFunctionOutput, ServiceError>;

    async fn create_function(
        &self,
        input: &CreateFunctionInput,
    ) -> Result<FunctionConfiguration, ServiceError>;

    async fn delete_function(&self, function_name: &str) -> Result<(), ServiceError>;

    async fn update_function_configuration(
        &self,
        input: &UpdateFunctionConfigurationInput,
    ) -> Result<FunctionConfiguration, ServiceError>;

    async fn update_function_code(
        &self,
        input: &UpdateFunctionCodeInput,
    ) -> Result<FunctionConfiguration, ServiceError>;

    async fn get_function_code_signing_config(
        &self,
        function_name: &str,
    ) -> Result<GetFunctionCodeSigningConfigOutput, ServiceError>;

    async fn put_function_code_signing_config(
        &self,
        input: &PutFunctionCodeSigningConfigInput,
    ) -> Result<(), ServiceError>;

    async fn get_function_recursion_config(
        &self,
        function_name: &str,
    ) -> Result<GetFunctionRecursionConfigOutput, ServiceError>;

    async fn put_function_recursion_config(
        &self,
        input: &PutFunctionRecursionConfigInput,
    ) -> Result<(), ServiceError>;

    async fn get_function_concurrency(
        &self,
        function_name: &str,
    ) -> Result<GetFunctionConcurrencyOutput, ServiceError>;

    async fn put_function_concurrency(
        &self,
        input: &PutFunctionConcurrencyInput,
    ) -> Result<(), ServiceError>;

    async fn put_runtime_management_config(
        &self,
        input: &PutRuntimeManagementConfigInput,
    ) -> Result<(), ServiceError>;

    async fn tag_resource(&self, input: &TagResourceInput) -> Result<(), ServiceError>;

    async fn untag_resource(&self, input: &UntagResourceInput) -> Result<(), ServiceError>;
}

/// Creates a [`LambdaService`] for a derived configuration. The provider
/// context is passed along so implementations can honour per-call settings
/// such as `endpoint.lambda`, which is also present in
/// [`AwsConfig::endpoints`].
pub trait LambdaServiceFactory: Send + Sync {
    fn create(&self, config: &AwsConfig, provider: &ProviderContext) -> Arc<dyn LambdaService>;
}

impl<F> LambdaServiceFactory for F
where
    F: Fn(&AwsConfig, &ProviderContext) -> Arc<dyn LambdaService> + Send + Sync,
{
    fn create(&self, config: &AwsConfig, provider: &ProviderContext) -> Arc<dyn LambdaService> {
        self(config, provider)
    }
}
