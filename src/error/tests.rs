//! # 错误处理测试

use crate::error::prelude::*;
use std::error::Error;

#[test]
fn test_batch_size_error_is_configuration() {
    let err: TesterError = ConfigError::BatchSize {
        actual: 1001,
        min: 1,
        max: 1000,
    }
    .into();

    assert!(err.is_configuration());
    assert_eq!(
        err.to_string(),
        "Invalid batch size 1001: expected between 1 and 1000 keys"
    );
    assert_eq!(err.category(), crate::error::ErrorCategory::Client);
}

#[test]
fn test_unsupported_provider_message() {
    let err: TesterError = ConfigError::UnsupportedProvider {
        provider: "mistral".to_string(),
        supported: "openai, claude".to_string(),
    }
    .into();

    assert_eq!(
        err.to_string(),
        "Unsupported provider 'mistral'. Must be one of: openai, claude"
    );
}

#[test]
fn test_context_wraps_and_keeps_source() {
    let result: std::result::Result<(), StorageError> =
        Err(StorageError::SessionMissing("test_1".to_string()));

    let err = result.context("finalize session").unwrap_err();
    assert!(matches!(err, TesterError::Context { .. }));
    assert!(err.to_string().starts_with("finalize session: "));
    assert!(err.source().is_some());
}

#[test]
fn test_context_preserves_configuration_kind() {
    let result: std::result::Result<(), ConfigError> = Err(ConfigError::MissingField("model"));
    let err = result.with_context(|| "validate request").unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn test_error_categories() {
    let err = TesterError::internal("worker crashed");
    assert_eq!(err.to_string(), "Internal error: worker crashed");
    assert_eq!(err.category(), crate::error::ErrorCategory::Server);

    let err = TesterError::not_found("session", "test_42");
    assert_eq!(err.to_string(), "session not found: test_42");
    assert_eq!(err.category(), crate::error::ErrorCategory::Client);
}

#[test]
fn test_auto_conversion_from_toml_error() {
    let toml_err = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
    let err: TesterError = toml_err.into();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("Configuration parse failed"));
}
