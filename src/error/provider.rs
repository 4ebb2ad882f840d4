use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("No adapter registered for provider '{0}'")]
    AdapterNotRegistered(String),

    #[error("Invalid base URL for provider '{provider}': {message}")]
    InvalidBaseUrl { provider: String, message: String },
}
