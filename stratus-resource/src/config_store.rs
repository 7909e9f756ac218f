//! Caches derived service configuration per orchestrator session.
//!
//! Building a configuration can involve reading credential files and other
//! slow work, so the result is kept for the lifetime of the session that
//! requested it. Calls without a session id always build a fresh one.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{
    context::{ProviderContext, RequestContext},
    error::ProviderError,
};

/// Builds a configuration from the provider context and the process
/// environment captured by the store.
#[async_trait]
pub trait ConfigLoader<C>: Send + Sync {
    async fn load(
        &self,
        provider: &ProviderContext,
        env: &HashMap<String, String>,
    ) -> Result<C, ProviderError>;
}

pub struct SessionConfigStore<C, L> {
    env: HashMap<String, String>,
    loader: L,
    cache: RwLock<HashMap<String, C>>,
}

impl<C, L> SessionConfigStore<C, L>
where
    C: Clone + Send + Sync,
    L: ConfigLoader<C>,
{
    pub fn new(env: impl IntoIterator<Item = (String, String)>, loader: L) -> Self {
        SessionConfigStore {
            env: env.into_iter().collect(),
            loader,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the configuration for the caller's session, building it on
    /// first use.
    ///
    /// Two concurrent first calls for one session may both build; the later
    /// insert wins. Both results are equivalent.
    pub async fn get(
        &self,
        ctx: &RequestContext,
        provider: &ProviderContext,
    ) -> Result<C, ProviderError> {
        let Some(session_id) = session_id(ctx, provider) else {
            debug!("no session id, building uncached config");
            return self.loader.load(provider, &self.env).await;
        };

        if let Some(config) = self.cache.read().await.get(&session_id) {
            debug!(session_id = %session_id, "config cache hit");
            return Ok(config.clone());
        }

        debug!(session_id = %session_id, "config cache miss");
        let config = self.loader.load(provider, &self.env).await?;
        self.cache
            .write()
            .await
            .insert(session_id, config.clone());
        Ok(config)
    }

    pub async fn cached_sessions(&self) -> usize {
        self.cache.read().await.len()
    }
}

fn session_id(ctx: &RequestContext, provider: &ProviderContext) -> Option<String> {
    provider
        .session_id()
        .or_else(|| ctx.session_id().map(str::to_string))
}
