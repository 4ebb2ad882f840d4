//! A "prelude" for easily importing the most common error handling items.

pub use super::config::ConfigError;
pub use super::database::DatabaseError;
pub use super::network::NetworkError;
pub use super::provider::ProviderError;
pub use super::storage::StorageError;
pub use super::{ConfigResult, Context, Result, TesterError};
