use crate::path::PathError;

/// Error type returned by remote service boundaries.
pub type ServiceError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Coarse classification of a [`ProviderError`], for deciding whether
/// re-running a reconciliation can help.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The remote service rejected or failed a call.
    Remote,
    /// Data needed to proceed was missing from the input or context.
    MalformedInput,
    /// The desired configuration cannot be applied as requested.
    UnsupportedConfiguration,
    /// Provider configuration could not be turned into service settings.
    Configuration,
    Cancelled,
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("{operation} failed: {source}")]
    Remote {
        operation: String,
        #[source]
        source: ServiceError,
    },

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    #[error("invalid provider configuration: {0}")]
    Configuration(String),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error("failed to (de)serialize {what}: {source}")]
    Serialization {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to add {field}: {source}")]
    ExternalState {
        field: String,
        #[source]
        source: Box<ProviderError>,
    },

    #[error("operation cancelled")]
    Cancelled,
}

impl ProviderError {
    pub fn remote(operation: impl Into<String>, source: impl Into<ServiceError>) -> Self {
        ProviderError::Remote {
            operation: operation.into(),
            source: source.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ProviderError::Remote { .. } => ErrorKind::Remote,
            ProviderError::MalformedInput(_)
            | ProviderError::Path(_)
            | ProviderError::Serialization { .. } => ErrorKind::MalformedInput,
            ProviderError::UnsupportedConfiguration(_) => ErrorKind::UnsupportedConfiguration,
            ProviderError::Configuration(_) => ErrorKind::Configuration,
            ProviderError::ExternalState { source, .. } => source.kind(),
            ProviderError::Cancelled => ErrorKind::Cancelled,
        }
    }
}
