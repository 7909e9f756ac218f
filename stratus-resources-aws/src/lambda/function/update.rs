use async_trait::async_trait;
use stratus_resource::{
    changes::Changes,
    context::RequestContext,
    error::ProviderError,
    path::get_value_by_path,
    save_op::{remote_call, SaveOperation, SaveOperationContext},
    setter::{apply_all, ValueSetter},
    value::MappingNode,
};

use super::shared::{
    archive_inline_code, file_system_config_setters, image_config_setters,
    logging_config_setters, nested, string, vpc_config_setters,
};
use crate::lambda::{
    types::{
        DeadLetterConfig, Environment, EphemeralStorage, PutFunctionCodeSigningConfigInput,
        SnapStart, TracingConfig, UpdateFunctionCodeInput, UpdateFunctionConfigurationInput,
    },
    LambdaService,
};

type ConfigSetter = ValueSetter<'static, UpdateFunctionConfigurationInput>;

fn changed(setter: ConfigSetter) -> ConfigSetter {
    setter.with_check_if_changed(true)
}

fn update_configuration_setters() -> Vec<ConfigSetter> {
    vec![
        changed(ValueSetter::new(
            "$.deadLetterConfig.targetArn",
            |v, input: &mut UpdateFunctionConfigurationInput| {
                input.dead_letter_config = Some(DeadLetterConfig {
                    target_arn: string(v),
                })
            },
        )),
        changed(ValueSetter::new(
            "$.description",
            |v, input: &mut UpdateFunctionConfigurationInput| input.description = string(v),
        )),
        // Changes are recorded per variable, so the whole map is resent.
        ValueSetter::new(
            "$.environment.variables",
            |v, input: &mut UpdateFunctionConfigurationInput| {
                input.environment = Some(Environment {
                    variables: Some(v.string_map()),
                })
            },
        ),
        changed(ValueSetter::new(
            "$.ephemeralStorage.size",
            |v, input: &mut UpdateFunctionConfigurationInput| {
                input.ephemeral_storage = Some(EphemeralStorage { size: v.as_int() })
            },
        )),
        nested(
            "$.fileSystemConfig",
            Some("spec.fileSystemConfig"),
            file_system_config_setters,
            |input: &mut UpdateFunctionConfigurationInput, c| {
                input.file_system_configs = Some(vec![c])
            },
        ),
        changed(ValueSetter::new(
            "$.handler",
            |v, input: &mut UpdateFunctionConfigurationInput| input.handler = string(v),
        )),
        nested(
            "$.imageConfig",
            Some("spec.imageConfig"),
            image_config_setters,
            |input: &mut UpdateFunctionConfigurationInput, c| input.image_config = Some(c),
        ),
        changed(ValueSetter::new(
            "$.kmsKeyArn",
            |v, input: &mut UpdateFunctionConfigurationInput| input.kms_key_arn = string(v),
        )),
        changed(ValueSetter::new(
            "$.layers",
            |v, input: &mut UpdateFunctionConfigurationInput| {
                input.layers = Some(v.string_list())
            },
        )),
        nested(
            "$.loggingConfig",
            Some("spec.loggingConfig"),
            logging_config_setters,
            |input: &mut UpdateFunctionConfigurationInput, c| input.logging_config = Some(c),
        ),
        changed(ValueSetter::new(
            "$.memorySize",
            |v, input: &mut UpdateFunctionConfigurationInput| input.memory_size = v.as_int(),
        )),
        changed(ValueSetter::new(
            "$.role",
            |v, input: &mut UpdateFunctionConfigurationInput| input.role = string(v),
        )),
        changed(ValueSetter::new(
            "$.runtime",
            |v, input: &mut UpdateFunctionConfigurationInput| input.runtime = string(v),
        )),
        changed(ValueSetter::new(
            "$.snapStart",
            |v, input: &mut UpdateFunctionConfigurationInput| {
                input.snap_start = Some(SnapStart {
                    apply_on: v.field("applyOn").and_then(string),
                })
            },
        )),
        changed(ValueSetter::new(
            "$.timeout",
            |v, input: &mut UpdateFunctionConfigurationInput| input.timeout = v.as_int(),
        )),
        changed(ValueSetter::new(
            "$.tracingConfig",
            |v, input: &mut UpdateFunctionConfigurationInput| {
                input.tracing_config = Some(TracingConfig {
                    mode: v.field("mode").and_then(string),
                })
            },
        )),
        nested(
            "$.vpcConfig",
            Some("spec.vpcConfig"),
            vpc_config_setters,
            |input: &mut UpdateFunctionConfigurationInput, c| input.vpc_config = Some(c),
        ),
    ]
}

fn update_code_setters() -> Vec<ValueSetter<'static, UpdateFunctionCodeInput>> {
    vec![
        ValueSetter::new("$.architecture", |v, input: &mut UpdateFunctionCodeInput| {
            input.architectures = string(v).map(|a| vec![a])
        }),
        ValueSetter::new("$.code.imageUri", |v, input: &mut UpdateFunctionCodeInput| {
            input.image_uri = string(v)
        }),
        ValueSetter::new("$.code.s3Bucket", |v, input: &mut UpdateFunctionCodeInput| {
            input.s3_bucket = string(v)
        }),
        ValueSetter::new("$.code.s3Key", |v, input: &mut UpdateFunctionCodeInput| {
            input.s3_key = string(v)
        }),
        ValueSetter::new(
            "$.code.s3ObjectVersion",
            |v, input: &mut UpdateFunctionCodeInput| input.s3_object_version = string(v),
        ),
        ValueSetter::new(
            "$.code.sourceKMSKeyArn",
            |v, input: &mut UpdateFunctionCodeInput| input.source_kms_key_arn = string(v),
        ),
        ValueSetter::new("$.code.zipFile", |v, input: &mut UpdateFunctionCodeInput| {
            input.zip_file = string(v)
        }),
    ]
    .into_iter()
    .map(|setter| setter.with_check_if_changed(true))
    .collect()
}

#[derive(Default)]
pub(super) struct FunctionConfigurationUpdate {
    input: UpdateFunctionConfigurationInput,
}

#[async_trait]
impl SaveOperation<dyn LambdaService> for FunctionConfigurationUpdate {
    fn name(&self) -> &'static str {
        "function configuration"
    }

    fn prepare(
        &mut self,
        save_ctx: &SaveOperationContext,
        spec: &MappingNode,
        changes: &Changes,
    ) -> Result<bool, ProviderError> {
        let mut input = UpdateFunctionConfigurationInput {
            function_name: save_ctx.provider_upstream_id.clone(),
            ..Default::default()
        };
        let has_updates = apply_all(&update_configuration_setters(), spec, changes, &mut input)?;
        self.input = input;
        Ok(has_updates)
    }

    async fn execute(
        &self,
        ctx: &RequestContext,
        save_ctx: SaveOperationContext,
        service: &dyn LambdaService,
    ) -> Result<SaveOperationContext, ProviderError> {
        remote_call(
            ctx,
            "UpdateFunctionConfiguration",
            service.update_function_configuration(&self.input),
        )
        .await?;
        Ok(save_ctx)
    }
}

/// Uploads changed code. Every code update publishes a new version.
#[derive(Default)]
pub(super) struct FunctionCodeUpdate {
    input: UpdateFunctionCodeInput,
}

#[async_trait]
impl SaveOperation<dyn LambdaService> for FunctionCodeUpdate {
    fn name(&self) -> &'static str {
        "function code"
    }

    fn prepare(
        &mut self,
        save_ctx: &SaveOperationContext,
        spec: &MappingNode,
        changes: &Changes,
    ) -> Result<bool, ProviderError> {
        let mut input = UpdateFunctionCodeInput {
            function_name: save_ctx.provider_upstream_id.clone(),
            publish: true,
            ..Default::default()
        };
        let has_updates = apply_all(&update_code_setters(), spec, changes, &mut input)?;

        if let Some(source) = input.zip_file.take() {
            let runtime = get_value_by_path("$.runtime", spec)?.and_then(MappingNode::as_str);
            input.zip_file = Some(archive_inline_code(runtime, &source)?);
        }

        self.input = input;
        Ok(has_updates)
    }

    async fn execute(
        &self,
        ctx: &RequestContext,
        save_ctx: SaveOperationContext,
        service: &dyn LambdaService,
    ) -> Result<SaveOperationContext, ProviderError> {
        remote_call(
            ctx,
            "UpdateFunctionCode",
            service.update_function_code(&self.input),
        )
        .await?;
        Ok(save_ctx)
    }
}

#[derive(Default)]
pub(super) struct CodeSigningConfigUpdate {
    input: PutFunctionCodeSigningConfigInput,
}

#[async_trait]
impl SaveOperation<dyn LambdaService> for CodeSigningConfigUpdate {
    fn name(&self) -> &'static str {
        "code signing config"
    }

    fn prepare(
        &mut self,
        save_ctx: &SaveOperationContext,
        spec: &MappingNode,
        _changes: &Changes,
    ) -> Result<bool, ProviderError> {
        let Some(arn) = get_value_by_path("$.codeSigningConfigArn", spec)?.and_then(string) else {
            return Ok(false);
        };
        self.input = PutFunctionCodeSigningConfigInput {
            function_name: save_ctx.provider_upstream_id.clone(),
            code_signing_config_arn: arn,
        };
        Ok(true)
    }

    async fn execute(
        &self,
        ctx: &RequestContext,
        save_ctx: SaveOperationContext,
        service: &dyn LambdaService,
    ) -> Result<SaveOperationContext, ProviderError> {
        remote_call(
            ctx,
            "PutFunctionCodeSigningConfig",
            service.put_function_code_signing_config(&self.input),
        )
        .await?;
        Ok(save_ctx)
    }
}
