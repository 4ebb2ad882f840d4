//! # 批量测试端到端集成测试
//!
//! 真实 HTTP 客户端 + wiremock 服务商 + `SQLite` 内存库存储

use std::sync::Arc;
use std::time::Duration;

use api_key_tester::config::{AppConfig, DatabaseConfig, ProviderEndpointConfig, RetryConfig};
use api_key_tester::database::{init_database, run_migrations};
use api_key_tester::storage::{DatabaseStorage, Storage};
use api_key_tester::tester::{
    BatchRunner, ResultQuery, ResultStatus, SessionStatus, TesterContext, ValidationRequest,
};
use api_key_tester::{AdapterRegistry, ProviderType};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn memory_storage() -> Arc<DatabaseStorage> {
    let config = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        ..DatabaseConfig::default()
    };
    let db = init_database(&config).await.expect("connect test db");
    run_migrations(&db).await.expect("run migrations");
    Arc::new(DatabaseStorage::new(db))
}

/// OpenAI 指向 mock 服务器，请求超时 200ms，退避延迟压到毫秒级
fn test_config(server: &MockServer) -> AppConfig {
    let mut config = AppConfig::default();
    config.retry = RetryConfig {
        base_delay_ms: 5,
        max_delay_ms: 20,
    };
    config.providers.insert(
        "openai".to_string(),
        ProviderEndpointConfig {
            base_url: server.uri(),
        },
    );
    config
}

fn runner_with(config: AppConfig, storage: Arc<DatabaseStorage>) -> BatchRunner {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(200))
        .build()
        .expect("build client");
    let registry = AdapterRegistry::with_client(client, &config).expect("build registry");
    BatchRunner::new(TesterContext::new(
        Arc::new(config),
        storage,
        Arc::new(registry),
    ))
}

fn bearer(key: &str) -> String {
    format!("Bearer {key}")
}

#[tokio::test]
async fn timed_out_key_is_retried_then_invalid_while_others_succeed() {
    let server = MockServer::start().await;

    let keys = vec![
        "sk-first-key-000001".to_string(),
        "sk-second-key-00002".to_string(),
        "sk-third-key-000003".to_string(),
    ];

    // 第二个密钥每次都超时：首次 + 2 次重试
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", bearer(&keys[1]).as_str()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "choices": [] }))
                .set_delay(Duration::from_secs(2)),
        )
        .with_priority(1)
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .expect(2)
        .mount(&server)
        .await;

    let storage = memory_storage().await;
    let runner = runner_with(test_config(&server), storage.clone());

    let request = ValidationRequest::new("openai", "gpt-4o-mini", keys.clone())
        .with_concurrency(3)
        .with_retry_count(2);
    let report = runner.run_batch(request).await.expect("batch runs");

    assert_eq!(report.total, 3);
    assert_eq!(report.counts.valid, 2);
    assert_eq!(report.counts.invalid, 1);
    assert_eq!(report.counts.rate_limited, 0);

    let items: Vec<_> = report.items.iter().map(|i| i.key.as_str()).collect();
    assert_eq!(items, keys.iter().map(String::as_str).collect::<Vec<_>>());
    assert_eq!(report.items[0].result.status, ResultStatus::Valid);
    assert_eq!(report.items[2].result.status, ResultStatus::Valid);

    let timed_out = &report.items[1].result;
    assert_eq!(timed_out.status, ResultStatus::Invalid);
    assert!(
        timed_out
            .error
            .as_deref()
            .is_some_and(|e| e.starts_with("Request timed out")),
        "unexpected error: {:?}",
        timed_out.error
    );

    // 会话已完成且计数与总数一致
    let session = storage
        .get_session(&report.test_id)
        .await
        .unwrap()
        .expect("session stored");
    assert_eq!(session.status, SessionStatus::Completed);
    assert!(session.completed_at.is_some());
    assert!(session.is_reconciled());
    assert_eq!(session.total_keys, 3);

    server.verify().await;
}

#[tokio::test]
async fn stored_results_are_paged_filtered_and_masked() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-limited-key-0000"))
        .respond_with(ResponseTemplate::new(429))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-revoked-key-0000"))
        .respond_with(ResponseTemplate::new(401))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let storage = memory_storage().await;
    let runner = runner_with(test_config(&server), storage);

    let keys = vec![
        "sk-valid-key-000001".to_string(),
        "sk-limited-key-0000".to_string(),
        "sk-revoked-key-0000".to_string(),
        "sk-valid-key-000002".to_string(),
        "sk-valid-key-000003".to_string(),
    ];
    let report = runner
        .run_batch(ValidationRequest::new("openai", "gpt-4o-mini", keys))
        .await
        .unwrap();
    assert_eq!(report.counts.valid, 3);
    assert_eq!(report.counts.invalid, 1);
    assert_eq!(report.counts.rate_limited, 1);

    let limited = &report.items[1].result;
    assert_eq!(limited.status, ResultStatus::RateLimited);
    assert!(limited.is_rate_limit);
    assert_eq!(report.items[2].result.error.as_deref(), Some("Auth failed (401)"));

    let all = runner
        .results(&report.test_id, ResultQuery::default())
        .await
        .unwrap();
    assert_eq!(all.items.len(), 5);
    assert_eq!(all.session.counts, report.counts);
    for item in &all.items {
        assert!(!item.key_masked.contains("sk-valid-key-00000"));
        assert!(item.key_masked.contains("***"));
        assert_eq!(item.provider, ProviderType::OpenAI);
    }

    let valid_only = runner
        .results(
            &report.test_id,
            ResultQuery {
                status: Some(ResultStatus::Valid),
                ..ResultQuery::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(valid_only.items.len(), 3);
    assert!(valid_only.items.iter().all(|r| r.status == ResultStatus::Valid));

    let second_page = runner
        .results(
            &report.test_id,
            ResultQuery {
                page: Some(2),
                page_size: Some(2),
                ..ResultQuery::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(second_page.page, 2);
    assert_eq!(second_page.items.len(), 2);

    let beyond = runner
        .results(
            &report.test_id,
            ResultQuery {
                page: Some(4),
                page_size: Some(2),
                ..ResultQuery::default()
            },
        )
        .await
        .unwrap();
    assert!(beyond.items.is_empty());
}

#[tokio::test]
async fn oversized_batch_is_rejected_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let storage = memory_storage().await;
    let runner = runner_with(test_config(&server), storage);

    let keys: Vec<String> = (0..1001).map(|i| format!("sk-bulk-key-{i:06}")).collect();
    let err = runner
        .run_batch(ValidationRequest::new("openai", "gpt-4o-mini", keys))
        .await
        .unwrap_err();
    assert!(err.is_configuration());

    server.verify().await;
}

#[tokio::test]
async fn unknown_test_id_is_not_found() {
    let server = MockServer::start().await;
    let runner = runner_with(test_config(&server), memory_storage().await);

    let err = runner
        .results("test_0_deadbeef", ResultQuery::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not found"));
}
