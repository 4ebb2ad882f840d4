//! # 数据库存储集成测试

use api_key_tester::config::DatabaseConfig;
use api_key_tester::database::{init_database, run_migrations};
use api_key_tester::provider::{ProbeOutcome, ProviderType};
use api_key_tester::storage::{DatabaseStorage, Storage};
use api_key_tester::tester::{
    ClassifiedResult, ResultCounts, ResultQuery, ResultStatus, SessionAggregate, SessionStatus,
};
use api_key_tester::utils::hash_key;
use entity::{TestResults, TestSessions};
use sea_orm::EntityTrait;
use tempfile::TempDir;

async fn setup_storage() -> DatabaseStorage {
    let config = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        ..DatabaseConfig::default()
    };
    let db = init_database(&config).await.expect("connect test db");
    run_migrations(&db).await.expect("run migrations");
    DatabaseStorage::new(db)
}

fn session(test_id: &str, total: usize) -> SessionAggregate {
    SessionAggregate::running(
        test_id.to_string(),
        ProviderType::Claude,
        "claude-3-haiku-20240307".to_string(),
        total,
    )
}

fn result(test_id: &str, key: &str, outcome: &ProbeOutcome) -> ClassifiedResult {
    ClassifiedResult::from_outcome(
        test_id,
        ProviderType::Claude,
        "claude-3-haiku-20240307",
        key,
        outcome,
    )
}

#[tokio::test]
async fn session_lifecycle_round_trips() {
    let storage = setup_storage().await;
    storage.create_session(&session("test_1", 3)).await.unwrap();

    let running = storage.get_session("test_1").await.unwrap().unwrap();
    assert_eq!(running.status, SessionStatus::Running);
    assert_eq!(running.provider, ProviderType::Claude);
    assert_eq!(running.counts, ResultCounts::default());
    assert!(running.completed_at.is_none());

    // 重复创建被拒绝
    assert!(storage.create_session(&session("test_1", 3)).await.is_err());

    let counts = ResultCounts {
        valid: 1,
        invalid: 1,
        rate_limited: 1,
    };
    storage
        .update_session_aggregate("test_1", counts)
        .await
        .unwrap();

    let done = storage.get_session("test_1").await.unwrap().unwrap();
    assert_eq!(done.status, SessionStatus::Completed);
    assert_eq!(done.counts, counts);
    assert!(done.completed_at.is_some());
    assert!(done.is_reconciled());

    // 汇总只写一次
    let err = storage
        .update_session_aggregate("test_1", ResultCounts::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("already completed"));

    let missing = storage
        .update_session_aggregate("test_missing", counts)
        .await
        .unwrap_err();
    assert!(missing.to_string().contains("does not exist"));

    assert!(storage.get_session("test_missing").await.unwrap().is_none());
}

#[tokio::test]
async fn results_keep_only_fingerprint_and_mask() {
    let storage = setup_storage().await;
    storage.create_session(&session("test_2", 1)).await.unwrap();

    let key = "sk-ant-REDACTED";
    storage
        .save_result(&result("test_2", key, &ProbeOutcome::auth_failure()))
        .await
        .unwrap();

    let stored = storage
        .query_results("test_2", &ResultQuery::default())
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    let row = &stored[0];
    assert_eq!(row.key_fingerprint, hash_key(key));
    assert_eq!(row.status, ResultStatus::Invalid);
    assert_eq!(row.error.as_deref(), Some("Auth failed (401)"));
    assert_eq!(row.is_paid, None);
    assert!(!row.key_masked.contains(key));

    // 表中任何列都不含原文密钥
    let db = storage.connection();
    let rows = TestResults::find().all(db).await.unwrap();
    assert_eq!(rows.len(), 1);
    let raw = format!("{:?}", rows[0]);
    assert!(!raw.contains(key));
    assert_eq!(TestSessions::find().all(db).await.unwrap().len(), 1);
}

#[tokio::test]
async fn query_filters_and_pages_newest_first() {
    let storage = setup_storage().await;
    storage.create_session(&session("test_3", 6)).await.unwrap();
    storage.create_session(&session("test_other", 1)).await.unwrap();

    for i in 0..6 {
        let outcome = match i % 3 {
            0 => ProbeOutcome::valid(),
            1 => ProbeOutcome::rate_limited(),
            _ => ProbeOutcome::permission_denied(),
        };
        storage
            .save_result(&result("test_3", &format!("sk-ant-key-number-{i}"), &outcome))
            .await
            .unwrap();
    }
    storage
        .save_result(&result("test_other", "sk-ant-unrelated-key", &ProbeOutcome::valid()))
        .await
        .unwrap();

    let all = storage
        .query_results("test_3", &ResultQuery::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 6);
    assert_eq!(all[0].key_fingerprint, hash_key("sk-ant-key-number-5"));
    assert!(all.iter().all(|r| r.test_id == "test_3"));

    let limited = storage
        .query_results(
            "test_3",
            &ResultQuery {
                status: Some(ResultStatus::RateLimited),
                ..ResultQuery::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(limited.len(), 2);
    assert!(limited.iter().all(|r| r.is_rate_limit));

    let page = storage
        .query_results(
            "test_3",
            &ResultQuery {
                page: Some(2),
                page_size: Some(4),
                ..ResultQuery::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[1].key_fingerprint, hash_key("sk-ant-key-number-0"));

    let wrong_provider = storage
        .query_results(
            "test_3",
            &ResultQuery {
                provider: Some(ProviderType::Gemini),
                ..ResultQuery::default()
            },
        )
        .await
        .unwrap();
    assert!(wrong_provider.is_empty());
}

#[tokio::test]
async fn file_database_is_created_and_reopened() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("tester.db");
    let config = DatabaseConfig {
        url: format!("sqlite://{}", path.display()),
        ..DatabaseConfig::default()
    };

    {
        let db = init_database(&config).await.unwrap();
        run_migrations(&db).await.unwrap();
        let storage = DatabaseStorage::new(db);
        storage.create_session(&session("test_file", 0)).await.unwrap();
    }
    assert!(path.exists());

    let db = init_database(&config).await.unwrap();
    run_migrations(&db).await.unwrap();
    let storage = DatabaseStorage::new(db);
    assert!(storage.get_session("test_file").await.unwrap().is_some());
}
