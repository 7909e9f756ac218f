use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{error::ProviderError, value::ScalarValue};

/// Context variable that identifies the orchestrator session a call belongs to.
pub const SESSION_ID_KEY: &str = "session_id";

/// Provider configuration and context variables supplied with every call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderContext {
    #[serde(default)]
    pub provider_config: BTreeMap<String, ScalarValue>,
    #[serde(default)]
    pub context_variables: BTreeMap<String, ScalarValue>,
}

impl ProviderContext {
    pub fn new(
        provider_config: BTreeMap<String, ScalarValue>,
        context_variables: BTreeMap<String, ScalarValue>,
    ) -> Self {
        ProviderContext {
            provider_config,
            context_variables,
        }
    }

    /// A provider config value. Null values count as unset.
    pub fn provider_config_variable(&self, name: &str) -> Option<&ScalarValue> {
        self.provider_config.get(name).filter(|v| !v.is_null())
    }

    pub fn context_variable(&self, name: &str) -> Option<&ScalarValue> {
        self.context_variables.get(name).filter(|v| !v.is_null())
    }

    /// Provider config entries under `prefix`, keyed by the remainder of
    /// their name, e.g. `assumeRole.tags.` yields the session tags.
    pub fn provider_config_with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a ScalarValue)> + 'a {
        self.provider_config
            .iter()
            .filter(|(_, v)| !v.is_null())
            .filter_map(move |(k, v)| k.strip_prefix(prefix).map(|rest| (rest, v)))
    }

    /// The session id, if the orchestrator passed one as a context variable.
    /// Any scalar is accepted and used in its text form.
    pub fn session_id(&self) -> Option<String> {
        self.context_variable(SESSION_ID_KEY)
            .map(ScalarValue::stringify)
    }
}

/// Per-call state that is not part of the provider context: the caller's
/// session and a cancellation signal.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    session_id: Option<String>,
    cancellation: CancellationToken,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn check_cancelled(&self) -> Result<(), ProviderError> {
        if self.is_cancelled() {
            Err(ProviderError::Cancelled)
        } else {
            Ok(())
        }
    }
}
