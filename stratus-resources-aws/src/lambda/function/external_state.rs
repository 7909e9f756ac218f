//! Rebuilds a function spec from the live function.
//!
//! `GetFunction` does not return everything a spec can hold: code signing,
//! recursion and concurrency settings each need their own read, and some
//! input fields are never returned at all. Those are copied from the spec
//! the caller last applied.

use stratus_resource::{
    context::RequestContext,
    error::ProviderError,
    save_op::remote_call,
    tags::tags_to_node,
    value::MappingNode,
};

use super::{computed_fields_from_configuration, function_arn};
use crate::lambda::{
    types::{
        FileSystemConfig, FunctionCodeLocation, FunctionConfiguration, ImageConfigResponse,
        LoggingConfig, RuntimeVersionConfig, VpcConfig,
    },
    LambdaService,
};

/// Code fields accepted on input that `GetFunction` never returns.
const WRITE_ONLY_CODE_FIELDS: [&str; 4] = ["s3Bucket", "s3Key", "s3ObjectVersion", "zipFile"];

const DEFAULT_ARCHITECTURE: &str = "x86_64";

pub(super) async fn function_external_state(
    ctx: &RequestContext,
    service: &dyn LambdaService,
    current_spec: &MappingNode,
) -> Result<MappingNode, ProviderError> {
    let arn = function_arn(current_spec)?;
    let output = remote_call(ctx, "GetFunction", service.get_function(&arn)).await?;
    let configuration = output.configuration.ok_or_else(|| {
        ProviderError::remote("GetFunction", "response did not include the function configuration")
    })?;

    let mut spec = MappingNode::fields([
        (
            "arn",
            MappingNode::string(configuration.function_arn.clone().unwrap_or_default()),
        ),
        (
            "architecture",
            MappingNode::string(
                configuration
                    .architectures
                    .as_ref()
                    .and_then(|a| a.first().cloned())
                    .unwrap_or_else(|| DEFAULT_ARCHITECTURE.to_string()),
            ),
        ),
        ("code", code_node(output.code.as_ref(), current_spec.field("code"))),
        (
            "functionName",
            MappingNode::string(configuration.function_name.clone().unwrap_or_default()),
        ),
    ]);

    let tags = output
        .tags
        .filter(|tags| !tags.is_empty())
        .map(|tags| tags_to_node(&tags));
    for (field, value) in optional_fields(&configuration, current_spec) {
        if let Some(value) = value {
            spec.insert_field(field, value);
        }
    }
    if let Some(tags) = tags {
        spec.insert_field("tags", tags);
    }

    add_code_signing_config(ctx, service, &arn, &mut spec)
        .await
        .map_err(|e| auxiliary("code signing config", e))?;
    add_recursion_config(ctx, service, &arn, &mut spec)
        .await
        .map_err(|e| auxiliary("recursion config", e))?;
    add_concurrency_config(ctx, service, &arn, &mut spec)
        .await
        .map_err(|e| auxiliary("concurrency config", e))?;

    for (path, value) in computed_fields_from_configuration(&configuration) {
        let field = path.strip_prefix("spec.").unwrap_or(&path).to_string();
        spec.insert_field(field, value);
    }

    Ok(spec)
}

fn auxiliary(field: &str, source: ProviderError) -> ProviderError {
    ProviderError::ExternalState {
        field: field.to_string(),
        source: Box::new(source),
    }
}

fn optional_fields(
    config: &FunctionConfiguration,
    current_spec: &MappingNode,
) -> Vec<(&'static str, Option<MappingNode>)> {
    let string = |s: &Option<String>| s.clone().map(MappingNode::string);
    vec![
        (
            "deadLetterConfig",
            config
                .dead_letter_config
                .as_ref()
                .map(|dlq| present_fields([("targetArn", string(&dlq.target_arn))])),
        ),
        ("description", string(&config.description)),
        (
            "environment",
            config.environment.as_ref().map(|env| {
                present_fields([(
                    "variables",
                    env.variables
                        .as_ref()
                        .map(|vars| MappingNode::string_fields(vars.clone())),
                )])
            }),
        ),
        (
            "ephemeralStorage",
            config
                .ephemeral_storage
                .as_ref()
                .map(|storage| present_fields([("size", storage.size.map(MappingNode::int))])),
        ),
        (
            "fileSystemConfig",
            config
                .file_system_configs
                .as_ref()
                .and_then(|configs| configs.first())
                .map(file_system_config_node),
        ),
        ("handler", string(&config.handler)),
        (
            "imageConfig",
            config.image_config_response.as_ref().map(image_config_node),
        ),
        ("kmsKeyArn", string(&config.kms_key_arn)),
        (
            "layers",
            config.layers.as_ref().map(|layers| {
                MappingNode::string_items(layers.iter().filter_map(|layer| layer.arn.clone()))
            }),
        ),
        (
            "loggingConfig",
            config.logging_config.as_ref().map(logging_config_node),
        ),
        ("memorySize", config.memory_size.map(MappingNode::int)),
        ("packageType", string(&config.package_type)),
        ("role", string(&config.role)),
        ("runtime", string(&config.runtime)),
        (
            "runtimeManagementConfig",
            config.runtime_version_config.as_ref().map(|runtime| {
                runtime_management_config_node(runtime, current_spec.field("runtimeManagementConfig"))
            }),
        ),
        (
            "snapStart",
            config
                .snap_start
                .as_ref()
                .map(|snap_start| present_fields([("applyOn", string(&snap_start.apply_on))])),
        ),
        ("timeout", config.timeout.map(MappingNode::int)),
        (
            "tracingConfig",
            config
                .tracing_config
                .as_ref()
                .map(|tracing| present_fields([("mode", string(&tracing.mode))])),
        ),
        ("vpcConfig", config.vpc_config.as_ref().map(vpc_config_node)),
    ]
}

/// A `Fields` node of the entries that have a value.
fn present_fields<const N: usize>(entries: [(&str, Option<MappingNode>); N]) -> MappingNode {
    MappingNode::fields(
        entries
            .into_iter()
            .filter_map(|(name, value)| value.map(|value| (name, value))),
    )
}

fn code_node(location: Option<&FunctionCodeLocation>, input_code: Option<&MappingNode>) -> MappingNode {
    let mut code = MappingNode::empty_fields();
    if let Some(input_code) = input_code {
        for field in WRITE_ONLY_CODE_FIELDS {
            if let Some(value) = input_code.field(field) {
                code.insert_field(field, value.clone());
            }
        }
    }
    if let Some(location) = location {
        if let Some(image_uri) = &location.image_uri {
            code.insert_field("imageUri", MappingNode::string(image_uri.as_str()));
        }
        if let Some(key_arn) = &location.source_kms_key_arn {
            code.insert_field("sourceKMSKeyArn", MappingNode::string(key_arn.as_str()));
        }
    }
    code
}

fn file_system_config_node(config: &FileSystemConfig) -> MappingNode {
    present_fields([
        ("arn", config.arn.clone().map(MappingNode::string)),
        (
            "localMountPath",
            config.local_mount_path.clone().map(MappingNode::string),
        ),
    ])
}

fn image_config_node(response: &ImageConfigResponse) -> MappingNode {
    let Some(config) = &response.image_config else {
        return MappingNode::empty_fields();
    };
    present_fields([
        (
            "command",
            config.command.clone().map(MappingNode::string_items),
        ),
        (
            "entryPoint",
            config.entry_point.clone().map(MappingNode::string_items),
        ),
        (
            "workingDirectory",
            config.working_directory.clone().map(MappingNode::string),
        ),
    ])
}

fn logging_config_node(config: &LoggingConfig) -> MappingNode {
    present_fields([
        (
            "applicationLogLevel",
            config.application_log_level.clone().map(MappingNode::string),
        ),
        ("logFormat", config.log_format.clone().map(MappingNode::string)),
        ("logGroup", config.log_group.clone().map(MappingNode::string)),
        (
            "systemLogLevel",
            config.system_log_level.clone().map(MappingNode::string),
        ),
    ])
}

fn runtime_management_config_node(
    config: &RuntimeVersionConfig,
    input_config: Option<&MappingNode>,
) -> MappingNode {
    present_fields([
        (
            "runtimeVersionArn",
            config.runtime_version_arn.clone().map(MappingNode::string),
        ),
        // write-only
        (
            "updateRuntimeOn",
            input_config
                .and_then(|input| input.field("updateRuntimeOn"))
                .cloned(),
        ),
    ])
}

fn vpc_config_node(config: &VpcConfig) -> MappingNode {
    present_fields([
        (
            "securityGroupIds",
            config.security_group_ids.clone().map(MappingNode::string_items),
        ),
        (
            "subnetIds",
            config.subnet_ids.clone().map(MappingNode::string_items),
        ),
        (
            "ipv6AllowedForDualStack",
            config.ipv6_allowed_for_dual_stack.map(MappingNode::bool),
        ),
    ])
}

async fn add_code_signing_config(
    ctx: &RequestContext,
    service: &dyn LambdaService,
    arn: &str,
    spec: &mut MappingNode,
) -> Result<(), ProviderError> {
    let output = remote_call(
        ctx,
        "GetFunctionCodeSigningConfig",
        service.get_function_code_signing_config(arn),
    )
    .await?;
    if let Some(config_arn) = output.code_signing_config_arn {
        spec.insert_field("codeSigningConfigArn", MappingNode::string(config_arn));
    }
    Ok(())
}

async fn add_recursion_config(
    ctx: &RequestContext,
    service: &dyn LambdaService,
    arn: &str,
    spec: &mut MappingNode,
) -> Result<(), ProviderError> {
    let output = remote_call(
        ctx,
        "GetFunctionRecursionConfig",
        service.get_function_recursion_config(arn),
    )
    .await?;
    if let Some(recursive_loop) = output.recursive_loop.filter(|r| !r.is_empty()) {
        spec.insert_field("recursiveLoop", MappingNode::string(recursive_loop));
    }
    Ok(())
}

async fn add_concurrency_config(
    ctx: &RequestContext,
    service: &dyn LambdaService,
    arn: &str,
    spec: &mut MappingNode,
) -> Result<(), ProviderError> {
    let output = remote_call(
        ctx,
        "GetFunctionConcurrency",
        service.get_function_concurrency(arn),
    )
    .await?;
    if let Some(reserved) = output.reserved_concurrent_executions {
        spec.insert_field("reservedConcurrentExecutions", MappingNode::int(reserved));
    }
    Ok(())
}
