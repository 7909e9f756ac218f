use std::{collections::BTreeSet, sync::Mutex};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use stratus_resource::error::ServiceError;

use super::{types::*, LambdaService};

/// A [`LambdaService`] that returns canned outputs and records every call
/// with its input.
#[derive(Default)]
pub(crate) struct MockLambdaService {
    pub get_function_output: GetFunctionOutput,
    pub create_function_output: FunctionConfiguration,
    pub update_function_output: FunctionConfiguration,
    pub code_signing_config_output: GetFunctionCodeSigningConfigOutput,
    pub recursion_config_output: GetFunctionRecursionConfigOutput,
    pub concurrency_output: GetFunctionConcurrencyOutput,
    /// Names of calls that fail, e.g. `"UpdateFunctionConfiguration"`.
    pub fail: BTreeSet<&'static str>,
    pub(crate) calls: Mutex<Vec<(String, Value)>>,
}

impl MockLambdaService {
    pub fn failing(mut self, call: &'static str) -> Self {
        self.fail.insert(call);
        self
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_names(&self) -> Vec<String> {
        self.calls().into_iter().map(|(name, _)| name).collect()
    }

    /// Input of the first call named `name`.
    pub fn input_of(&self, name: &str) -> Option<Value> {
        self.calls()
            .into_iter()
            .find(|(call, _)| call == name)
            .map(|(_, input)| input)
    }

    fn record<I: Serialize, T: Clone>(
        &self,
        name: &'static str,
        input: &I,
        output: &T,
    ) -> Result<T, ServiceError> {
        self.calls
            .lock()
            .unwrap()
            .push((name.to_string(), serde_json::to_value(input).unwrap()));
        if self.fail.contains(name) {
            return Err(format!("{name} rejected by mock").into());
        }
        Ok(output.clone())
    }
}

fn by_name(function_name: &str) -> Value {
    json!({ "FunctionName": function_name })
}

#[async_trait]
impl LambdaService for MockLambdaService {
    async fn get_function(&self, function_name: &str) -> Result<GetFunctionOutput, ServiceError> {
        self.record("GetFunction", &by_name(function_name), &self.get_function_output)
    }

    async fn create_function(
        &self,
        input: &CreateFunctionInput,
    ) -> Result<FunctionConfiguration, ServiceError> {
        self.record("CreateFunction", input, &self.create_function_output)
    }

    async fn delete_function(&self, function_name: &str) -> Result<(), ServiceError> {
        self.record("DeleteFunction", &by_name(function_name), &())
    }

    async fn update_function_configuration(
        &self,
        input: &UpdateFunctionConfigurationInput,
    ) -> Result<FunctionConfiguration, ServiceError> {
        self.record(
            "UpdateFunctionConfiguration",
            input,
            &self.update_function_output,
        )
    }

    async fn update_function_code(
        &self,
        input: &UpdateFunctionCodeInput,
    ) -> Result<FunctionConfiguration, ServiceError> {
        self.record("UpdateFunctionCode", input, &self.update_function_output)
    }

    async fn get_function_code_signing_config(
        &self,
        function_name: &str,
    ) -> Result<GetFunctionCodeSigningConfigOutput, ServiceError> {
        self.record(
            "GetFunctionCodeSigningConfig",
            &by_name(function_name),
            &self.code_signing_config_output,
        )
    }

    async fn put_function_code_signing_config(
        &self,
        input: &PutFunctionCodeSigningConfigInput,
    ) -> Result<(), ServiceError> {
        self.record("PutFunctionCodeSigningConfig", input, &())
    }

    async fn get_function_recursion_config(
        &self,
        function_name: &str,
    ) -> Result<GetFunctionRecursionConfigOutput, ServiceError> {
        self.record(
            "GetFunctionRecursionConfig",
            &by_name(function_name),
            &self.recursion_config_output,
        )
    }

    async fn put_function_recursion_config(
        &self,
        input: &PutFunctionRecursionConfigInput,
    ) -> Result<(), ServiceError> {
        self.record("PutFunctionRecursionConfig", input, &())
    }

    async fn get_function_concurrency(
        &self,
        function_name: &str,
    ) -> Result<GetFunctionConcurrencyOutput, ServiceError> {
        self.record(
            "GetFunctionConcurrency",
            &by_name(function_name),
            &self.concurrency_output,
        )
    }

    async fn put_function_concurrency(
        &self,
        input: &PutFunctionConcurrencyInput,
    ) -> Result<(), ServiceError> {
        self.record("PutFunctionConcurrency", input, &())
    }

    async fn put_runtime_management_config(
        &self,
        input: &PutRuntimeManagementConfigInput,
    ) -> Result<(), ServiceError> {
        self.record("PutRuntimeManagementConfig", input, &())
    }

    async fn tag_resource(&self, input: &TagResourceInput) -> Result<(), ServiceError> {
        self.record("TagResource", input, &())
    }

    async fn untag_resource(&self, input: &UntagResourceInput) -> Result<(), ServiceError> {
        self.record("UntagResource", input, &())
    }
}
