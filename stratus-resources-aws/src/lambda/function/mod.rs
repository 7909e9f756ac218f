//! The `aws/lambda/function` resource.

mod create;
mod external_state;
mod shared;
mod update;

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use stratus_resource::{
    context::{ProviderContext, RequestContext},
    error::ProviderError,
    resource::{
        ExternalStateInput, ExternalStateOutput, Resource, ResourceDeployInput,
        ResourceDeployOutput, ResourceDestroyInput, StabilisedInput,
    },
    save_op::{remote_call, run_save_operations, SaveOperation, SaveOperationContext},
    value::MappingNode,
};
use tracing::{debug, info};

use self::{
    create::{FunctionCreate, CREATE_FUNCTION_OUTPUT},
    external_state::function_external_state,
    shared::{ConcurrencyUpdate, RecursionConfigUpdate, RuntimeManagementConfigUpdate, TagsUpdate},
    update::{CodeSigningConfigUpdate, FunctionCodeUpdate, FunctionConfigurationUpdate},
};
use super::{types::FunctionConfiguration, LambdaService, LambdaServiceFactory};
use crate::config::AwsConfigStore;

pub const FUNCTION_RESOURCE_TYPE: &str = "aws/lambda/function";

const LAST_UPDATE_SUCCESSFUL: &str = "Successful";

/// Fields assigned by Lambda rather than the caller.
const COMPUTED_FIELDS: [&str; 3] = [
    "arn",
    "snapStartResponseApplyOn",
    "snapStartResponseOptimizationStatus",
];

pub struct FunctionResource {
    factory: Arc<dyn LambdaServiceFactory>,
    config_store: Arc<AwsConfigStore>,
}

impl FunctionResource {
    pub fn new(factory: Arc<dyn LambdaServiceFactory>, config_store: Arc<AwsConfigStore>) -> Self {
        FunctionResource {
            factory,
            config_store,
        }
    }

    async fn service(
        &self,
        ctx: &RequestContext,
        provider: &ProviderContext,
    ) -> Result<Arc<dyn LambdaService>, ProviderError> {
        let config = self.config_store.get(ctx, provider).await?;
        Ok(self.factory.create(&config, provider))
    }
}

/// The function ARN, which identifies the function in every call after
/// creation.
pub(crate) fn function_arn(spec: &MappingNode) -> Result<String, ProviderError> {
    spec.field("arn")
        .and_then(MappingNode::as_str)
        .filter(|arn| !arn.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ProviderError::MalformedInput("function spec has no arn".to_string()))
}

fn computed_fields_from_configuration(
    configuration: &FunctionConfiguration,
) -> BTreeMap<String, MappingNode> {
    let mut fields = BTreeMap::new();
    if let Some(arn) = &configuration.function_arn {
        fields.insert("spec.arn".to_string(), MappingNode::string(arn.as_str()));
    }
    if let Some(snap_start) = &configuration.snap_start {
        if let Some(apply_on) = &snap_start.apply_on {
            fields.insert(
                "spec.snapStartResponseApplyOn".to_string(),
                MappingNode::string(apply_on.as_str()),
            );
        }
        if let Some(status) = &snap_start.optimization_status {
            fields.insert(
                "spec.snapStartResponseOptimizationStatus".to_string(),
                MappingNode::string(status.as_str()),
            );
        }
    }
    fields
}

fn computed_fields_from_state(spec: &MappingNode) -> BTreeMap<String, MappingNode> {
    COMPUTED_FIELDS
        .iter()
        .filter_map(|field| {
            let value = spec.field(field).filter(|value| !value.is_null())?;
            Some((format!("spec.{field}"), value.clone()))
        })
        .collect()
}

#[async_trait]
impl Resource for FunctionResource {
    fn resource_type(&self) -> &'static str {
        FUNCTION_RESOURCE_TYPE
    }

    async fn create(
        &self,
        ctx: &RequestContext,
        input: &ResourceDeployInput,
    ) -> Result<ResourceDeployOutput, ProviderError> {
        info!(resource_id = %input.resource_id, "creating lambda function");
        let service = self.service(ctx, &input.provider_context).await?;

        let operations: Vec<Box<dyn SaveOperation<dyn LambdaService>>> = vec![
            Box::new(FunctionCreate::default()),
            Box::new(ConcurrencyUpdate::default()),
            Box::new(RecursionConfigUpdate::default()),
            Box::new(RuntimeManagementConfigUpdate::new(false)),
        ];
        let (has_updates, save_ctx) = run_save_operations(
            ctx,
            SaveOperationContext::default(),
            operations,
            input.changes.resolved_spec(),
            &input.changes,
            service.as_ref(),
        )
        .await?;

        if !has_updates {
            return Err(ProviderError::MalformedInput(
                "no fields to create the function from".to_string(),
            ));
        }

        let output: FunctionConfiguration =
            save_ctx.get_data(CREATE_FUNCTION_OUTPUT)?.ok_or_else(|| {
                ProviderError::MalformedInput(
                    "function was not created, the spec has no function fields".to_string(),
                )
            })?;

        Ok(ResourceDeployOutput {
            computed_field_values: computed_fields_from_configuration(&output),
        })
    }

    async fn update(
        &self,
        ctx: &RequestContext,
        input: &ResourceDeployInput,
    ) -> Result<ResourceDeployOutput, ProviderError> {
        let current_state = input.changes.current_state_spec();
        let arn = function_arn(current_state)?;
        info!(resource_id = %input.resource_id, arn = %arn, "updating lambda function");
        let service = self.service(ctx, &input.provider_context).await?;

        let operations: Vec<Box<dyn SaveOperation<dyn LambdaService>>> = vec![
            Box::new(FunctionConfigurationUpdate::default()),
            Box::new(FunctionCodeUpdate::default()),
            Box::new(CodeSigningConfigUpdate::default()),
            Box::new(ConcurrencyUpdate::default()),
            Box::new(RecursionConfigUpdate::default()),
            Box::new(RuntimeManagementConfigUpdate::new(true)),
            Box::new(TagsUpdate::default()),
        ];
        let (has_updates, _) = run_save_operations(
            ctx,
            SaveOperationContext::with_upstream_id(arn.as_str()),
            operations,
            input.changes.resolved_spec(),
            &input.changes,
            service.as_ref(),
        )
        .await?;

        if !has_updates {
            debug!(arn = %arn, "nothing to update");
            return Ok(ResourceDeployOutput {
                computed_field_values: computed_fields_from_state(current_state),
            });
        }

        let output = remote_call(ctx, "GetFunction", service.get_function(&arn)).await?;
        Ok(ResourceDeployOutput {
            computed_field_values: output
                .configuration
                .as_ref()
                .map(computed_fields_from_configuration)
                .unwrap_or_default(),
        })
    }

    async fn destroy(
        &self,
        ctx: &RequestContext,
        input: &ResourceDestroyInput,
    ) -> Result<(), ProviderError> {
        let arn = function_arn(&input.resource_spec)?;
        info!(resource_id = %input.resource_id, arn = %arn, "deleting lambda function");
        let service = self.service(ctx, &input.provider_context).await?;
        remote_call(ctx, "DeleteFunction", service.delete_function(&arn)).await
    }

    async fn get_external_state(
        &self,
        ctx: &RequestContext,
        input: &ExternalStateInput,
    ) -> Result<ExternalStateOutput, ProviderError> {
        let service = self.service(ctx, &input.provider_context).await?;
        let resource_spec =
            function_external_state(ctx, service.as_ref(), &input.current_spec).await?;
        Ok(ExternalStateOutput { resource_spec })
    }

    async fn has_stabilised(
        &self,
        ctx: &RequestContext,
        input: &StabilisedInput,
    ) -> Result<bool, ProviderError> {
        let arn = function_arn(&input.resource_spec)?;
        let service = self.service(ctx, &input.provider_context).await?;
        let output = remote_call(ctx, "GetFunction", service.get_function(&arn)).await?;

        let status = output
            .configuration
            .and_then(|configuration| configuration.last_update_status);
        debug!(arn = %arn, status = ?status, "checked function update status");
        Ok(status.as_deref() == Some(LAST_UPDATE_SUCCESSFUL))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{AwsConfig, AwsConfigLoader},
        lambda::{
            mock::MockLambdaService,
            types::{GetFunctionOutput, SnapStartResponse},
        },
    };
    use serde_json::json;
    use stratus_resource::{
        changes::{AppliedResourceInfo, Changes, FieldChange},
        config_store::SessionConfigStore,
        error::ErrorKind,
    };
    use tokio_util::sync::CancellationToken;

    const ARN: &str = "arn:aws:lambda:us-east-1:123456789012:function:orders";

    fn resource(service: Arc<MockLambdaService>) -> FunctionResource {
        let factory = move |_config: &AwsConfig, _provider: &ProviderContext| -> Arc<dyn LambdaService> {
            service.clone()
        };
        FunctionResource::new(
            Arc::new(factory),
            Arc::new(SessionConfigStore::new(Vec::new(), AwsConfigLoader)),
        )
    }

    fn deploy_input(
        resolved: serde_json::Value,
        current: Option<serde_json::Value>,
        modified: &[&str],
    ) -> ResourceDeployInput {
        ResourceDeployInput {
            resource_id: "orders-fn".to_string(),
            changes: Changes {
                applied_resource_info: AppliedResourceInfo {
                    resource_id: "orders-fn".to_string(),
                    resource_name: "orders".to_string(),
                    current_state_spec: current.map(MappingNode::from),
                    resolved_spec: Some(MappingNode::from(resolved)),
                },
                modified_fields: modified.iter().map(|p| FieldChange::new(*p)).collect(),
                ..Default::default()
            },
            provider_context: ProviderContext::default(),
        }
    }

    fn created_configuration() -> FunctionConfiguration {
        FunctionConfiguration {
            function_arn: Some(ARN.to_string()),
            function_name: Some("orders".to_string()),
            snap_start: Some(SnapStartResponse {
                apply_on: Some("PublishedVersions".to_string()),
                optimization_status: Some("Off".to_string()),
            }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_runs_follow_up_operations_against_new_arn() {
        let service = Arc::new(MockLambdaService {
            create_function_output: created_configuration(),
            ..Default::default()
        });

        let output = resource(service.clone())
            .create(
                &RequestContext::new(),
                &deploy_input(
                    json!({
                        "functionName": "orders",
                        "runtime": "nodejs20.x",
                        "reservedConcurrentExecutions": 3,
                        "runtimeManagementConfig": {"updateRuntimeOn": "FunctionUpdate"}
                    }),
                    None,
                    &[],
                ),
            )
            .await
            .unwrap();

        assert_eq!(
            service.call_names(),
            vec![
                "CreateFunction",
                "PutFunctionConcurrency",
                "PutRuntimeManagementConfig"
            ]
        );
        assert_eq!(
            service.input_of("PutFunctionConcurrency").unwrap()["FunctionName"],
            json!(ARN)
        );
        assert_eq!(
            output.computed_field_values,
            BTreeMap::from([
                ("spec.arn".to_string(), MappingNode::string(ARN)),
                (
                    "spec.snapStartResponseApplyOn".to_string(),
                    MappingNode::string("PublishedVersions")
                ),
                (
                    "spec.snapStartResponseOptimizationStatus".to_string(),
                    MappingNode::string("Off")
                ),
            ])
        );
    }

    #[tokio::test]
    async fn test_create_with_empty_spec_fails() {
        let service = Arc::new(MockLambdaService::default());

        let err = resource(service.clone())
            .create(&RequestContext::new(), &deploy_input(json!({}), None, &[]))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::MalformedInput);
        assert!(service.calls().is_empty());
    }

    #[tokio::test]
    async fn test_create_without_function_fields_makes_no_calls() {
        let service = Arc::new(MockLambdaService::default());

        let err = resource(service.clone())
            .create(
                &RequestContext::new(),
                &deploy_input(
                    json!({"reservedConcurrentExecutions": 3, "recursiveLoop": "Allow"}),
                    None,
                    &[],
                ),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::MalformedInput);
        assert!(service.calls().is_empty());
    }

    #[tokio::test]
    async fn test_update_runs_operations_in_order() {
        let service = Arc::new(MockLambdaService {
            get_function_output: GetFunctionOutput {
                configuration: Some(created_configuration()),
                ..Default::default()
            },
            ..Default::default()
        });

        let output = resource(service.clone())
            .update(
                &RequestContext::new(),
                &deploy_input(
                    json!({
                        "memorySize": 1024,
                        "code": {"s3Bucket": "artifacts", "s3Key": "v2.zip"},
                        "tags": [{"key": "Env", "value": "test"}]
                    }),
                    Some(json!({
                        "arn": ARN,
                        "memorySize": 512,
                        "tags": [{"key": "Env", "value": "prod"}]
                    })),
                    &["spec.memorySize", "spec.code.s3Key", "spec.tags[0].value"],
                ),
            )
            .await
            .unwrap();

        assert_eq!(
            service.call_names(),
            vec![
                "UpdateFunctionConfiguration",
                "UpdateFunctionCode",
                "TagResource",
                "GetFunction"
            ]
        );
        assert_eq!(
            output.computed_field_values.get("spec.arn"),
            Some(&MappingNode::string(ARN))
        );
    }

    #[tokio::test]
    async fn test_update_does_not_resend_unchanged_image_entry_point() {
        let service = Arc::new(MockLambdaService::default());

        resource(service.clone())
            .update(
                &RequestContext::new(),
                &deploy_input(
                    json!({
                        "imageConfig": {"command": ["serve", "--port=80"], "entryPoint": ["/entry.sh"]}
                    }),
                    Some(json!({"arn": ARN})),
                    &["spec.imageConfig.command[1]"],
                ),
            )
            .await
            .unwrap();

        assert_eq!(
            service.input_of("UpdateFunctionConfiguration").unwrap()["ImageConfig"],
            json!({"Command": ["serve", "--port=80"]})
        );
    }

    #[tokio::test]
    async fn test_update_failure_stops_later_operations() {
        let service = Arc::new(
            MockLambdaService::default().failing("UpdateFunctionConfiguration"),
        );

        let err = resource(service.clone())
            .update(
                &RequestContext::new(),
                &deploy_input(
                    json!({"memorySize": 1024, "code": {"s3Key": "v2.zip"}}),
                    Some(json!({"arn": ARN})),
                    &["spec.memorySize", "spec.code.s3Key"],
                ),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Remote);
        assert_eq!(service.call_names(), vec!["UpdateFunctionConfiguration"]);
    }

    #[tokio::test]
    async fn test_update_without_changes_keeps_computed_fields() {
        let service = Arc::new(MockLambdaService::default());

        let output = resource(service.clone())
            .update(
                &RequestContext::new(),
                &deploy_input(
                    json!({"memorySize": 512}),
                    Some(json!({
                        "arn": ARN,
                        "memorySize": 512,
                        "snapStartResponseApplyOn": "None"
                    })),
                    &[],
                ),
            )
            .await
            .unwrap();

        assert!(service.calls().is_empty());
        assert_eq!(
            output.computed_field_values,
            BTreeMap::from([
                ("spec.arn".to_string(), MappingNode::string(ARN)),
                (
                    "spec.snapStartResponseApplyOn".to_string(),
                    MappingNode::string("None")
                ),
            ])
        );
    }

    #[tokio::test]
    async fn test_cancelled_update_makes_no_calls() {
        let service = Arc::new(MockLambdaService::default());
        let token = CancellationToken::new();
        token.cancel();

        let err = resource(service.clone())
            .update(
                &RequestContext::new().with_cancellation(token),
                &deploy_input(
                    json!({"memorySize": 1024}),
                    Some(json!({"arn": ARN})),
                    &["spec.memorySize"],
                ),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert!(service.calls().is_empty());
    }

    #[tokio::test]
    async fn test_update_without_arn_is_malformed() {
        let service = Arc::new(MockLambdaService::default());

        let err = resource(service.clone())
            .update(
                &RequestContext::new(),
                &deploy_input(json!({"memorySize": 1024}), Some(json!({})), &["spec.memorySize"]),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::MalformedInput(_)));
        assert!(service.calls().is_empty());
    }

    #[tokio::test]
    async fn test_destroy() {
        let service = Arc::new(MockLambdaService::default());
        let resource = resource(service.clone());

        resource
            .destroy(
                &RequestContext::new(),
                &ResourceDestroyInput {
                    resource_id: "orders-fn".to_string(),
                    resource_spec: MappingNode::from(json!({"arn": ARN})),
                    provider_context: ProviderContext::default(),
                },
            )
            .await
            .unwrap();
        assert_eq!(
            service.calls(),
            vec![("DeleteFunction".to_string(), json!({"FunctionName": ARN}))]
        );

        let err = resource
            .destroy(
                &RequestContext::new(),
                &ResourceDestroyInput {
                    resource_id: "orders-fn".to_string(),
                    resource_spec: MappingNode::empty_fields(),
                    provider_context: ProviderContext::default(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
    }

    #[tokio::test]
    async fn test_has_stabilised() {
        for (status, expected) in [
            (Some("Successful"), true),
            (Some("InProgress"), false),
            (Some("Failed"), false),
            (None, false),
        ] {
            let service = Arc::new(MockLambdaService {
                get_function_output: GetFunctionOutput {
                    configuration: Some(FunctionConfiguration {
                        last_update_status: status.map(str::to_string),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                ..Default::default()
            });

            let stabilised = resource(service)
                .has_stabilised(
                    &RequestContext::new(),
                    &StabilisedInput {
                        resource_id: "orders-fn".to_string(),
                        resource_spec: MappingNode::from(json!({"arn": ARN})),
                        provider_context: ProviderContext::default(),
                    },
                )
                .await
                .unwrap();
            assert_eq!(stabilised, expected, "status {status:?}");
        }
    }

    #[tokio::test]
    async fn test_get_external_state_uses_service() {
        let service = Arc::new(MockLambdaService {
            get_function_output: GetFunctionOutput {
                configuration: Some(created_configuration()),
                ..Default::default()
            },
            ..Default::default()
        });

        let output = resource(service.clone())
            .get_external_state(
                &RequestContext::new(),
                &ExternalStateInput {
                    resource_id: "orders-fn".to_string(),
                    current_spec: MappingNode::from(json!({"arn": ARN})),
                    provider_context: ProviderContext::default(),
                },
            )
            .await
            .unwrap();

        assert_eq!(
            output.resource_spec.field("functionName"),
            Some(&MappingNode::string("orders"))
        );
    }
}
