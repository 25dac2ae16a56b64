use thiserror::Error;

/// Errors produced by the gateway, the session store and the storage layer
#[derive(Debug, Error)]
pub enum GuideError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Model {model} is unavailable: {message}")]
    ProviderUnavailable { model: String, message: String },

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Provider returned an empty result for {operation}")]
    EmptyResult { operation: String },

    #[error("Invalid profile: {0}")]
    InvalidProfile(String),

    #[error("Operation requires {0}")]
    MissingState(&'static str),

    #[error("Another request is still in progress")]
    Busy,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl GuideError {
    /// True when the failure means the model is overloaded and a same-tier
    /// fallback model may be tried instead.
    pub fn is_transient(&self) -> bool {
        match self {
            GuideError::ProviderUnavailable { .. } => true,
            GuideError::Provider(message) => {
                message.contains("503") || message.contains("UNAVAILABLE")
            }
            _ => false,
        }
    }

    /// True for everything that came back from (or failed on the way to) the model.
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            GuideError::ProviderUnavailable { .. }
                | GuideError::Provider(_)
                | GuideError::EmptyResult { .. }
                | GuideError::Http(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, GuideError>;
