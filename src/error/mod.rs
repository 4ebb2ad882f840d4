//! The unified error handling system for the application.

// 1. Core Types
pub use types::TesterError;

/// A unified `Result` type for the entire application.
///
/// All functions that can fail should return this type.
pub type Result<T> = std::result::Result<T, TesterError>;

/// Result alias for configuration and batch-parameter validation.
pub type ConfigResult<T> = std::result::Result<T, config::ConfigError>;

// 3. Module declarations
pub mod config;
pub mod database;
pub mod network;
pub mod prelude;
pub mod provider;
pub mod storage;
pub mod types;

// 4. Context Trait for adding context to errors.
pub trait Context<T, E> {
    #[track_caller]
    fn context<C>(self, context: C) -> Result<T>
    where
        C: std::fmt::Display;

    #[track_caller]
    fn with_context<C, F>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: std::fmt::Display;
}

impl<T, E> Context<T, E> for std::result::Result<T, E>
where
    E: Into<TesterError>,
{
    #[track_caller]
    fn context<C>(self, context: C) -> Result<T>
    where
        C: std::fmt::Display,
    {
        self.with_context(|| context)
    }

    #[track_caller]
    fn with_context<C, F>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: std::fmt::Display,
    {
        match self {
            Ok(value) => Ok(value),
            Err(error) => {
                let context_message = context().to_string();
                Err(TesterError::Context {
                    context: context_message,
                    source: Box::new(error.into()),
                })
            }
        }
    }
}

// 5. Error Category for logging and exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Errors caused by the caller (bad batch parameters, unknown ids).
    Client,
    /// Errors caused by the engine or its collaborators.
    Server,
}

#[cfg(test)]
mod tests;
