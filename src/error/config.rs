use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration parse failed: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Configuration load failed: {0}")]
    Load(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Unsupported provider '{provider}'. Must be one of: {supported}")]
    UnsupportedProvider { provider: String, supported: String },

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid batch size {actual}: expected between {min} and {max} keys")]
    BatchSize { actual: usize, min: usize, max: usize },

    #[error("Invalid field '{field}': {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },
}
