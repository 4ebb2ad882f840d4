use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Network request failed: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("HTTP client build failed: {0}")]
    ClientBuild(String),

    #[error("Invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },
}
