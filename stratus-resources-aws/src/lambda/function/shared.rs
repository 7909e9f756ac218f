//! Setters and save operations used by both the create and update pipelines.

use async_trait::async_trait;
use stratus_resource::{
    changes::Changes,
    context::RequestContext,
    error::ProviderError,
    path::get_value_by_path,
    save_op::{remote_call, SaveOperation, SaveOperationContext},
    setter::{apply_all, ValueSetter},
    tags::{reconcile_tags, tags_from_node},
    value::MappingNode,
};

use crate::{
    archive::zip_in_memory,
    lambda::{
        types::{
            FileSystemConfig, FunctionCode, ImageConfig, LoggingConfig,
            PutFunctionConcurrencyInput, PutFunctionRecursionConfigInput,
            PutRuntimeManagementConfigInput, TagResourceInput, UntagResourceInput, VpcConfig,
        },
        LambdaService,
    },
};

pub(super) fn string(value: &MappingNode) -> Option<String> {
    value.as_str().map(str::to_string)
}

/// A composite setter for the object at `path`. The object is assembled by
/// `setters` and handed to `assign` only when at least one of them fired.
///
/// With a `gate_scope`, every nested setter only fires for changed values,
/// qualified with that scope, e.g. `spec.imageConfig`.
pub(super) fn nested<T, N>(
    path: &'static str,
    gate_scope: Option<&'static str>,
    setters: fn() -> Vec<ValueSetter<'static, N>>,
    assign: fn(&mut T, N),
) -> ValueSetter<'static, T>
where
    T: 'static,
    N: Default + 'static,
{
    ValueSetter::composite(path, move |value, changes, target: &mut T| {
        let setters: Vec<_> = setters()
            .into_iter()
            .map(|setter| match gate_scope {
                Some(scope) => setter.with_check_if_changed(true).with_change_scope(scope),
                None => setter,
            })
            .collect();
        let mut object = N::default();
        let did_set = apply_all(&setters, value, changes, &mut object)?;
        if did_set {
            assign(target, object);
        }
        Ok(did_set)
    })
}

pub(super) fn function_code_setters() -> Vec<ValueSetter<'static, FunctionCode>> {
    vec![
        ValueSetter::new("$.imageUri", |v, c: &mut FunctionCode| c.image_uri = string(v)),
        ValueSetter::new("$.s3Bucket", |v, c: &mut FunctionCode| c.s3_bucket = string(v)),
        ValueSetter::new("$.s3Key", |v, c: &mut FunctionCode| c.s3_key = string(v)),
        ValueSetter::new("$.s3ObjectVersion", |v, c: &mut FunctionCode| {
            c.s3_object_version = string(v)
        }),
        ValueSetter::new("$.sourceKMSKeyArn", |v, c: &mut FunctionCode| {
            c.source_kms_key_arn = string(v)
        }),
        ValueSetter::new("$.zipFile", |v, c: &mut FunctionCode| c.zip_file = string(v)),
    ]
}

pub(super) fn file_system_config_setters() -> Vec<ValueSetter<'static, FileSystemConfig>> {
    vec![
        ValueSetter::new("$.arn", |v, c: &mut FileSystemConfig| c.arn = string(v)),
        ValueSetter::new("$.localMountPath", |v, c: &mut FileSystemConfig| {
            c.local_mount_path = string(v)
        }),
    ]
}

pub(super) fn image_config_setters() -> Vec<ValueSetter<'static, ImageConfig>> {
    vec![
        ValueSetter::new("$.command", |v, c: &mut ImageConfig| {
            c.command = Some(v.string_list())
        }),
        ValueSetter::new("$.entryPoint", |v, c: &mut ImageConfig| {
            c.entry_point = Some(v.string_list())
        }),
        ValueSetter::new("$.workingDirectory", |v, c: &mut ImageConfig| {
            c.working_directory = string(v)
        }),
    ]
}

pub(super) fn logging_config_setters() -> Vec<ValueSetter<'static, LoggingConfig>> {
    vec![
        ValueSetter::new("$.applicationLogLevel", |v, c: &mut LoggingConfig| {
            c.application_log_level = string(v)
        }),
        ValueSetter::new("$.logFormat", |v, c: &mut LoggingConfig| c.log_format = string(v)),
        ValueSetter::new("$.logGroup", |v, c: &mut LoggingConfig| c.log_group = string(v)),
        ValueSetter::new("$.systemLogLevel", |v, c: &mut LoggingConfig| {
            c.system_log_level = string(v)
        }),
    ]
}

pub(super) fn vpc_config_setters() -> Vec<ValueSetter<'static, VpcConfig>> {
    vec![
        ValueSetter::new("$.securityGroupIds", |v, c: &mut VpcConfig| {
            c.security_group_ids = Some(v.string_list())
        }),
        ValueSetter::new("$.subnetIds", |v, c: &mut VpcConfig| {
            c.subnet_ids = Some(v.string_list())
        }),
        ValueSetter::new("$.ipv6AllowedForDualStack", |v, c: &mut VpcConfig| {
            c.ipv6_allowed_for_dual_stack = v.as_bool()
        }),
    ]
}

/// Packs inline function source into the zip archive Lambda expects.
///
/// Only Node.js and Python runtimes load an `index` file from the archive
/// root, so any other runtime is rejected.
pub(super) fn archive_inline_code(
    runtime: Option<&str>,
    source: &str,
) -> Result<String, ProviderError> {
    let file_name = match runtime {
        Some(runtime) if runtime.starts_with("nodejs") => "index.js",
        Some(runtime) if runtime.starts_with("python") => "index.py",
        _ => {
            return Err(ProviderError::UnsupportedConfiguration(format!(
                "inline code is only supported for Node.js and Python runtimes, \
                 the {} runtime can not be used with inline code",
                runtime.unwrap_or("unset")
            )))
        }
    };
    zip_in_memory(file_name, source)
}

/// The function these operations act on. Empty when the create pipeline
/// ran without creating the function.
fn upstream_id(save_ctx: &SaveOperationContext, operation: &str) -> Result<String, ProviderError> {
    if save_ctx.provider_upstream_id.is_empty() {
        return Err(ProviderError::MalformedInput(format!(
            "{} needs a function, but none was created",
            operation
        )));
    }
    Ok(save_ctx.provider_upstream_id.clone())
}

#[derive(Default)]
pub(super) struct ConcurrencyUpdate {
    input: PutFunctionConcurrencyInput,
}

#[async_trait]
impl SaveOperation<dyn LambdaService> for ConcurrencyUpdate {
    fn name(&self) -> &'static str {
        "function concurrency"
    }

    fn prepare(
        &mut self,
        save_ctx: &SaveOperationContext,
        spec: &MappingNode,
        _changes: &Changes,
    ) -> Result<bool, ProviderError> {
        let Some(reserved) =
            get_value_by_path("$.reservedConcurrentExecutions", spec)?.and_then(MappingNode::as_int)
        else {
            return Ok(false);
        };
        self.input = PutFunctionConcurrencyInput {
            function_name: upstream_id(save_ctx, self.name())?,
            reserved_concurrent_executions: reserved,
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
            "PutFunctionConcurrency",
            service.put_function_concurrency(&self.input),
        )
        .await?;
        Ok(save_ctx)
    }
}

#[derive(Default)]
pub(super) struct RecursionConfigUpdate {
    input: PutFunctionRecursionConfigInput,
}

#[async_trait]
impl SaveOperation<dyn LambdaService> for RecursionConfigUpdate {
    fn name(&self) -> &'static str {
        "function recursion config"
    }

    fn prepare(
        &mut self,
        save_ctx: &SaveOperationContext,
        spec: &MappingNode,
        _changes: &Changes,
    ) -> Result<bool, ProviderError> {
        let Some(recursive_loop) = get_value_by_path("$.recursiveLoop", spec)?.and_then(string)
        else {
            return Ok(false);
        };
        self.input = PutFunctionRecursionConfigInput {
            function_name: upstream_id(save_ctx, self.name())?,
            recursive_loop,
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
            "PutFunctionRecursionConfig",
            service.put_function_recursion_config(&self.input),
        )
        .await?;
        Ok(save_ctx)
    }
}

pub(super) struct RuntimeManagementConfigUpdate {
    /// Only send fields recorded as changed.
    gated: bool,
    input: PutRuntimeManagementConfigInput,
}

impl RuntimeManagementConfigUpdate {
    pub(super) fn new(gated: bool) -> Self {
        RuntimeManagementConfigUpdate {
            gated,
            input: PutRuntimeManagementConfigInput::default(),
        }
    }
}

#[async_trait]
impl SaveOperation<dyn LambdaService> for RuntimeManagementConfigUpdate {
    fn name(&self) -> &'static str {
        "runtime management config"
    }

    fn prepare(
        &mut self,
        save_ctx: &SaveOperationContext,
        spec: &MappingNode,
        changes: &Changes,
    ) -> Result<bool, ProviderError> {
        let Some(config) = get_value_by_path("$.runtimeManagementConfig", spec)? else {
            return Ok(false);
        };

        let setters = [
            ValueSetter::new(
                "$.runtimeVersionArn",
                |v, input: &mut PutRuntimeManagementConfigInput| {
                    input.runtime_version_arn = string(v)
                },
            ),
            ValueSetter::new(
                "$.updateRuntimeOn",
                |v, input: &mut PutRuntimeManagementConfigInput| {
                    input.update_runtime_on = string(v)
                },
            ),
        ]
        .map(|setter| {
            setter
                .with_check_if_changed(self.gated)
                .with_change_scope("spec.runtimeManagementConfig")
        });

        let mut input = PutRuntimeManagementConfigInput::default();
        let has_updates = apply_all(&setters, config, changes, &mut input)?;
        if has_updates {
            input.function_name = upstream_id(save_ctx, self.name())?;
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
            "PutRuntimeManagementConfig",
            service.put_runtime_management_config(&self.input),
        )
        .await?;
        Ok(save_ctx)
    }
}

/// Moves the function's tags to the desired set: every desired tag is
/// (re)applied and tags no longer desired are removed.
#[derive(Default)]
pub(super) struct TagsUpdate {
    tag_input: TagResourceInput,
    untag_input: UntagResourceInput,
}

#[async_trait]
impl SaveOperation<dyn LambdaService> for TagsUpdate {
    fn name(&self) -> &'static str {
        "tags"
    }

    fn prepare(
        &mut self,
        save_ctx: &SaveOperationContext,
        spec: &MappingNode,
        changes: &Changes,
    ) -> Result<bool, ProviderError> {
        if !changes.touches("spec.tags") {
            return Ok(false);
        }

        let desired = tags_from_node(get_value_by_path("$.tags", spec)?);
        let current = tags_from_node(get_value_by_path("$.tags", changes.current_state_spec())?);
        let tag_changes = reconcile_tags(&desired, &current);
        if tag_changes.is_empty() {
            return Ok(false);
        }

        self.tag_input = TagResourceInput {
            resource: save_ctx.provider_upstream_id.clone(),
            tags: tag_changes.to_add,
        };
        self.untag_input = UntagResourceInput {
            resource: save_ctx.provider_upstream_id.clone(),
            tag_keys: tag_changes.to_remove,
        };
        Ok(true)
    }

    async fn execute(
        &self,
        ctx: &RequestContext,
        save_ctx: SaveOperationContext,
        service: &dyn LambdaService,
    ) -> Result<SaveOperationContext, ProviderError> {
        if !self.tag_input.tags.is_empty() {
            remote_call(ctx, "TagResource", service.tag_resource(&self.tag_input)).await?;
        }
        if !self.untag_input.tag_keys.is_empty() {
            remote_call(ctx, "UntagResource", service.untag_resource(&self.untag_input)).await?;
        }
        Ok(save_ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lambda::mock::MockLambdaService;
    use serde_json::json;
    use stratus_resource::{
        changes::{AppliedResourceInfo, FieldChange},
        save_op::run_save_operations,
    };

    const ARN: &str = "arn:aws:lambda:us-east-1:123456789012:function:orders";

    fn tag_changes(current: serde_json::Value, touched: &[&str], removed: &[&str]) -> Changes {
        Changes {
            applied_resource_info: AppliedResourceInfo {
                current_state_spec: Some(MappingNode::from(json!({ "arn": ARN, "tags": current }))),
                ..Default::default()
            },
            modified_fields: touched.iter().map(|p| FieldChange::new(*p)).collect(),
            removed_fields: removed.iter().map(|p| p.to_string()).collect(),
            ..Default::default()
        }
    }

    async fn run_op(
        op: Box<dyn SaveOperation<dyn LambdaService>>,
        spec: &MappingNode,
        changes: &Changes,
        service: &MockLambdaService,
    ) -> Result<bool, ProviderError> {
        run_save_operations(
            &RequestContext::new(),
            SaveOperationContext::with_upstream_id(ARN),
            vec![op],
            spec,
            changes,
            service as &dyn LambdaService,
        )
        .await
        .map(|(any, _)| any)
    }

    #[tokio::test]
    async fn test_tags_added_and_removed() {
        let service = MockLambdaService::default();
        let spec = MappingNode::from(json!({
            "tags": [{"key": "Env", "value": "test"}, {"key": "Project", "value": "x"}]
        }));
        let changes = tag_changes(
            json!([{"key": "Env", "value": "prod"}, {"key": "Owner", "value": "ops"}]),
            &["spec.tags[0].value", "spec.tags[1]"],
            &[],
        );

        let ran = run_op(Box::new(TagsUpdate::default()), &spec, &changes, &service)
            .await
            .unwrap();

        assert!(ran);
        assert_eq!(service.call_names(), vec!["TagResource", "UntagResource"]);
        assert_eq!(
            service.input_of("TagResource").unwrap(),
            json!({"Resource": ARN, "Tags": {"Env": "test", "Project": "x"}})
        );
        assert_eq!(
            service.input_of("UntagResource").unwrap(),
            json!({"Resource": ARN, "TagKeys": ["Owner"]})
        );
    }

    #[tokio::test]
    async fn test_removing_every_tag_only_untags() {
        let service = MockLambdaService::default();
        let spec = MappingNode::from(json!({"memorySize": 128}));
        let changes = tag_changes(
            json!([{"key": "Env", "value": "prod"}]),
            &[],
            &["spec.tags"],
        );

        let ran = run_op(Box::new(TagsUpdate::default()), &spec, &changes, &service)
            .await
            .unwrap();

        assert!(ran);
        assert_eq!(service.call_names(), vec!["UntagResource"]);
    }

    #[tokio::test]
    async fn test_untouched_tags_are_skipped() {
        let service = MockLambdaService::default();
        let spec = MappingNode::from(json!({"tags": [{"key": "Env", "value": "prod"}]}));
        let changes = tag_changes(
            json!([{"key": "Env", "value": "prod"}]),
            &["spec.memorySize"],
            &[],
        );

        let ran = run_op(Box::new(TagsUpdate::default()), &spec, &changes, &service)
            .await
            .unwrap();

        assert!(!ran);
        assert!(service.calls().is_empty());
    }

    #[tokio::test]
    async fn test_runtime_management_gated_on_changes() {
        let service = MockLambdaService::default();
        let spec = MappingNode::from(json!({
            "runtimeManagementConfig": {
                "runtimeVersionArn": "arn:aws:lambda:us-east-1::runtime:abc",
                "updateRuntimeOn": "Manual"
            }
        }));
        let changes = Changes {
            modified_fields: vec![FieldChange::new("spec.runtimeManagementConfig.updateRuntimeOn")],
            ..Default::default()
        };

        let ran = run_op(
            Box::new(RuntimeManagementConfigUpdate::new(true)),
            &spec,
            &changes,
            &service,
        )
        .await
        .unwrap();

        assert!(ran);
        assert_eq!(
            service.input_of("PutRuntimeManagementConfig").unwrap(),
            json!({"FunctionName": ARN, "UpdateRuntimeOn": "Manual"})
        );

        let unchanged = MockLambdaService::default();
        let ran = run_op(
            Box::new(RuntimeManagementConfigUpdate::new(true)),
            &spec,
            &Changes::default(),
            &unchanged,
        )
        .await
        .unwrap();
        assert!(!ran);
        assert!(unchanged.calls().is_empty());
    }

    #[tokio::test]
    async fn test_concurrency_and_recursion_use_upstream_id() {
        let service = MockLambdaService::default();
        let spec = MappingNode::from(json!({
            "reservedConcurrentExecutions": 5,
            "recursiveLoop": "Terminate"
        }));

        let operations: Vec<Box<dyn SaveOperation<dyn LambdaService>>> = vec![
            Box::new(ConcurrencyUpdate::default()),
            Box::new(RecursionConfigUpdate::default()),
        ];

        let (any, _) = run_save_operations(
            &RequestContext::new(),
            SaveOperationContext::with_upstream_id(ARN),
            operations,
            &spec,
            &Changes::default(),
            &service as &dyn LambdaService,
        )
        .await
        .unwrap();

        assert!(any);
        assert_eq!(
            service.calls(),
            vec![
                (
                    "PutFunctionConcurrency".to_string(),
                    json!({"FunctionName": ARN, "ReservedConcurrentExecutions": 5})
                ),
                (
                    "PutFunctionRecursionConfig".to_string(),
                    json!({"FunctionName": ARN, "RecursiveLoop": "Terminate"})
                ),
            ]
        );
    }

    #[test]
    fn test_nested_gated_setter() {
        #[derive(Default)]
        struct Target {
            image: Option<ImageConfig>,
        }
        let setter = nested(
            "$.imageConfig",
            Some("spec.imageConfig"),
            image_config_setters,
            |t: &mut Target, c| t.image = Some(c),
        );
        let spec = MappingNode::from(json!({
            "imageConfig": {"command": ["app"], "entryPoint": ["/entry.sh"]}
        }));
        let changes = Changes {
            modified_fields: vec![FieldChange::new("spec.imageConfig.command[0]")],
            ..Default::default()
        };

        let mut target = Target::default();
        assert!(setter.apply(&spec, &changes, &mut target).unwrap());
        assert_eq!(
            target.image,
            Some(ImageConfig {
                command: Some(vec!["app".to_string()]),
                ..Default::default()
            })
        );

        let mut untouched = Target::default();
        assert!(!setter
            .apply(&spec, &Changes::default(), &mut untouched)
            .unwrap());
        assert!(untouched.image.is_none());
    }

    #[tokio::test]
    async fn test_follow_up_operations_need_a_function() {
        let service = MockLambdaService::default();
        let spec = MappingNode::from(json!({
            "reservedConcurrentExecutions": 3,
            "recursiveLoop": "Allow",
            "runtimeManagementConfig": {"updateRuntimeOn": "Auto"}
        }));

        let operations: [Box<dyn SaveOperation<dyn LambdaService>>; 3] = [
            Box::new(ConcurrencyUpdate::default()),
            Box::new(RecursionConfigUpdate::default()),
            Box::new(RuntimeManagementConfigUpdate::new(false)),
        ];
        for op in operations {
            let name = op.name();
            let err = run_save_operations(
                &RequestContext::new(),
                SaveOperationContext::default(),
                vec![op],
                &spec,
                &Changes::default(),
                &service as &dyn LambdaService,
            )
            .await
            .unwrap_err();
            assert!(matches!(err, ProviderError::MalformedInput(_)), "{name}: {err}");
        }
        assert!(service.calls().is_empty());
    }

    #[test]
    fn test_archive_inline_code() {
        assert!(archive_inline_code(Some("nodejs20.x"), "exports.handler = 1;").is_ok());
        assert!(archive_inline_code(Some("python3.12"), "def handler(e, c): pass").is_ok());

        let err = archive_inline_code(Some("java21"), "class A {}").unwrap_err();
        assert!(matches!(err, ProviderError::UnsupportedConfiguration(_)));
        assert!(err.to_string().contains("the java21 runtime"));

        let err = archive_inline_code(None, "x").unwrap_err();
        assert!(matches!(err, ProviderError::UnsupportedConfiguration(_)));
    }
}
