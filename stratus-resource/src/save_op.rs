//! Save operations and the pipeline that runs them.
//!
//! A create or update is a fixed list of operations. Each one decides in
//! [`SaveOperation::prepare`] whether it has anything to send, and only then
//! performs its remote call in [`SaveOperation::execute`]. The pipeline stops
//! at the first error and does not undo earlier operations; re-running the
//! same list converges because every operation is idempotent.

use std::{collections::BTreeMap, future::Future};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, info_span, warn, Instrument};

use crate::{
    changes::Changes,
    context::RequestContext,
    error::{ProviderError, ServiceError},
    value::MappingNode,
};

/// State shared between the operations of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaveOperationContext {
    /// Remote identifier of the resource. Set by the operation that creates
    /// the resource; read-only to everything else.
    pub provider_upstream_id: String,
    /// Scratch space for response fragments, keyed by a name private to the
    /// writing operation.
    pub data: BTreeMap<String, Value>,
}

impl SaveOperationContext {
    pub fn with_upstream_id(provider_upstream_id: impl Into<String>) -> Self {
        SaveOperationContext {
            provider_upstream_id: provider_upstream_id.into(),
            data: BTreeMap::new(),
        }
    }

    pub fn insert_data<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), ProviderError> {
        let value = serde_json::to_value(value).map_err(|source| ProviderError::Serialization {
            what: key.to_string(),
            source,
        })?;
        self.data.insert(key.to_string(), value);
        Ok(())
    }

    pub fn get_data<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ProviderError> {
        self.data
            .get(key)
            .map(|value| {
                serde_json::from_value(value.clone()).map_err(|source| {
                    ProviderError::Serialization {
                        what: key.to_string(),
                        source,
                    }
                })
            })
            .transpose()
    }
}

#[async_trait]
pub trait SaveOperation<S: ?Sized + Sync>: Send + Sync {
    fn name(&self) -> &'static str;

    /// Builds the request from the spec and returns whether the operation
    /// needs to run. May only modify the operation's own state.
    fn prepare(
        &mut self,
        save_ctx: &SaveOperationContext,
        spec: &MappingNode,
        changes: &Changes,
    ) -> Result<bool, ProviderError>;

    /// Performs the remote call prepared earlier and returns the context for
    /// the next operation.
    async fn execute(
        &self,
        ctx: &RequestContext,
        save_ctx: SaveOperationContext,
        service: &S,
    ) -> Result<SaveOperationContext, ProviderError>;
}

/// Runs `operations` in order against `service`.
///
/// Returns whether any operation was activated, and the final context.
pub async fn run_save_operations<S: ?Sized + Sync>(
    ctx: &RequestContext,
    mut save_ctx: SaveOperationContext,
    operations: Vec<Box<dyn SaveOperation<S>>>,
    spec: &MappingNode,
    changes: &Changes,
    service: &S,
) -> Result<(bool, SaveOperationContext), ProviderError> {
    let mut any_updates = false;

    for mut operation in operations {
        let name = operation.name();
        let span = info_span!("save_operation", operation = name);

        let active = span.in_scope(|| operation.prepare(&save_ctx, spec, changes))?;
        if !active {
            debug!(operation = name, "nothing to save, skipping");
            continue;
        }
        any_updates = true;

        save_ctx = operation
            .execute(ctx, save_ctx, service)
            .instrument(span)
            .await?;
    }

    Ok((any_updates, save_ctx))
}

/// Performs one remote call, honouring cancellation before it starts.
pub async fn remote_call<T, E, F>(
    ctx: &RequestContext,
    operation: &str,
    call: F,
) -> Result<T, ProviderError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<ServiceError>,
{
    ctx.check_cancelled()?;
    call.await.map_err(|e| {
        let err = ProviderError::remote(operation, e);
        warn!(operation, error = %err, "remote call failed");
        err
    })
}
