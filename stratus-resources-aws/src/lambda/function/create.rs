use async_trait::async_trait;
use stratus_resource::{
    changes::Changes,
    context::RequestContext,
    error::ProviderError,
    save_op::{remote_call, SaveOperation, SaveOperationContext},
    setter::{apply_all, ValueSetter},
    tags::tags_from_node,
    value::MappingNode,
};

use super::shared::{
    archive_inline_code, file_system_config_setters, function_code_setters, image_config_setters,
    logging_config_setters, nested, string, vpc_config_setters,
};
use crate::lambda::{
    types::{
        CreateFunctionInput, DeadLetterConfig, Environment, EphemeralStorage, SnapStart,
        TracingConfig,
    },
    LambdaService,
};

/// Key of the create response in the save operation context.
pub(super) const CREATE_FUNCTION_OUTPUT: &str = "createFunctionOutput";

fn create_function_setters() -> Vec<ValueSetter<'static, CreateFunctionInput>> {
    vec![
        ValueSetter::new("$.architecture", |v, input: &mut CreateFunctionInput| {
            input.architectures = string(v).map(|a| vec![a])
        }),
        nested("$.code", None, function_code_setters, |input: &mut CreateFunctionInput, c| {
            input.code = Some(c)
        }),
        ValueSetter::new("$.codeSigningConfigArn", |v, input: &mut CreateFunctionInput| {
            input.code_signing_config_arn = string(v)
        }),
        ValueSetter::new("$.deadLetterConfig.targetArn", |v, input: &mut CreateFunctionInput| {
            input.dead_letter_config = Some(DeadLetterConfig {
                target_arn: string(v),
            })
        }),
        ValueSetter::new("$.description", |v, input: &mut CreateFunctionInput| {
            input.description = string(v)
        }),
        ValueSetter::new("$.environment.variables", |v, input: &mut CreateFunctionInput| {
            input.environment = Some(Environment {
                variables: Some(v.string_map()),
            })
        }),
        ValueSetter::new("$.ephemeralStorage.size", |v, input: &mut CreateFunctionInput| {
            input.ephemeral_storage = Some(EphemeralStorage { size: v.as_int() })
        }),
        nested(
            "$.fileSystemConfig",
            None,
            file_system_config_setters,
            |input: &mut CreateFunctionInput, c| input.file_system_configs = Some(vec![c]),
        ),
        ValueSetter::new("$.functionName", |v, input: &mut CreateFunctionInput| {
            input.function_name = string(v)
        }),
        ValueSetter::new("$.handler", |v, input: &mut CreateFunctionInput| {
            input.handler = string(v)
        }),
        nested(
            "$.imageConfig",
            None,
            image_config_setters,
            |input: &mut CreateFunctionInput, c| input.image_config = Some(c),
        ),
        ValueSetter::new("$.kmsKeyArn", |v, input: &mut CreateFunctionInput| {
            input.kms_key_arn = string(v)
        }),
        ValueSetter::new("$.layers", |v, input: &mut CreateFunctionInput| {
            input.layers = Some(v.string_list())
        }),
        nested(
            "$.loggingConfig",
            None,
            logging_config_setters,
            |input: &mut CreateFunctionInput, c| input.logging_config = Some(c),
        ),
        ValueSetter::new("$.memorySize", |v, input: &mut CreateFunctionInput| {
            input.memory_size = v.as_int()
        }),
        ValueSetter::new("$.packageType", |v, input: &mut CreateFunctionInput| {
            input.package_type = string(v)
        }),
        ValueSetter::new("$.role", |v, input: &mut CreateFunctionInput| {
            input.role = string(v)
        }),
        ValueSetter::new("$.runtime", |v, input: &mut CreateFunctionInput| {
            input.runtime = string(v)
        }),
        ValueSetter::new("$.snapStart.applyOn", |v, input: &mut CreateFunctionInput| {
            input.snap_start = Some(SnapStart {
                apply_on: string(v),
            })
        }),
        ValueSetter::new("$.tags", |v, input: &mut CreateFunctionInput| {
            input.tags = Some(
                tags_from_node(Some(v))
                    .into_iter()
                    .map(|tag| (tag.key, tag.value))
                    .collect(),
            )
        }),
        ValueSetter::new("$.timeout", |v, input: &mut CreateFunctionInput| {
            input.timeout = v.as_int()
        }),
        ValueSetter::new("$.tracingConfig.mode", |v, input: &mut CreateFunctionInput| {
            input.tracing_config = Some(TracingConfig { mode: string(v) })
        }),
        nested(
            "$.vpcConfig",
            None,
            vpc_config_setters,
            |input: &mut CreateFunctionInput, c| input.vpc_config = Some(c),
        ),
    ]
}

/// Creates the function from the full desired spec.
#[derive(Default)]
pub(super) struct FunctionCreate {
    input: CreateFunctionInput,
}

#[async_trait]
impl SaveOperation<dyn LambdaService> for FunctionCreate {
    fn name(&self) -> &'static str {
        "create function"
    }

    fn prepare(
        &mut self,
        _save_ctx: &SaveOperationContext,
        spec: &MappingNode,
        changes: &Changes,
    ) -> Result<bool, ProviderError> {
        let mut input = CreateFunctionInput::default();
        let has_values = apply_all(&create_function_setters(), spec, changes, &mut input)?;

        if let Some(code) = input.code.as_mut() {
            if let Some(source) = code.zip_file.take() {
                code.zip_file = Some(archive_inline_code(input.runtime.as_deref(), &source)?);
            }
        }

        self.input = input;
        Ok(has_values)
    }

    async fn execute(
        &self,
        ctx: &RequestContext,
        mut save_ctx: SaveOperationContext,
        service: &dyn LambdaService,
    ) -> Result<SaveOperationContext, ProviderError> {
        let output = remote_call(ctx, "CreateFunction", service.create_function(&self.input)).await?;
        let arn = output.function_arn.clone().ok_or_else(|| {
            ProviderError::remote("CreateFunction", "response did not include a function ARN")
        })?;

        save_ctx.provider_upstream_id = arn;
        save_ctx.insert_data(CREATE_FUNCTION_OUTPUT, &output)?;
        Ok(save_ctx)
    }
}
