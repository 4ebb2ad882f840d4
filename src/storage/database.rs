use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use entity::{test_results, test_sessions};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};

use super::Storage;
use crate::error::database::DatabaseError;
use crate::error::storage::StorageError;
use crate::error::{Result, TesterError};
use crate::ldebug;
use crate::logging::{LogComponent, LogStage};
use crate::provider::ProviderType;
use crate::tester::{
    ClassifiedResult, ResultCounts, ResultQuery, ResultStatus, SessionAggregate, SessionStatus,
};

/// 基于 sea-orm 的持久化存储
#[derive(Debug, Clone)]
pub struct DatabaseStorage {
    db: DatabaseConnection,
}

impl DatabaseStorage {
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

fn to_naive(value: DateTime<Utc>) -> NaiveDateTime {
    value.naive_utc()
}

fn from_naive(value: NaiveDateTime) -> DateTime<Utc> {
    DateTime::from_naive_utc_and_offset(value, Utc)
}

fn count_to_i32(field: &str, value: usize) -> Result<i32> {
    i32::try_from(value).map_err(|_| {
        TesterError::from(DatabaseError::Decode(format!("{field} out of range: {value}")))
    })
}

fn count_from_i32(field: &str, value: i32) -> Result<usize> {
    usize::try_from(value).map_err(|_| {
        TesterError::from(DatabaseError::Decode(format!("{field} is negative: {value}")))
    })
}

fn decode_provider(value: &str) -> Result<ProviderType> {
    ProviderType::parse(value)
        .map_err(|e| DatabaseError::Decode(format!("unknown provider '{value}': {e}")).into())
}

fn decode_status(value: &str) -> Result<ResultStatus> {
    ResultStatus::parse(value)
        .map_err(|e| DatabaseError::Decode(format!("unknown result status '{value}': {e}")).into())
}

fn session_from_model(model: test_sessions::Model) -> Result<SessionAggregate> {
    let status = match model.status.as_str() {
        test_sessions::STATUS_RUNNING => SessionStatus::Running,
        test_sessions::STATUS_COMPLETED => SessionStatus::Completed,
        other => {
            return Err(DatabaseError::Decode(format!("unknown session status '{other}'")).into());
        }
    };

    Ok(SessionAggregate {
        provider: decode_provider(&model.provider)?,
        total_keys: count_from_i32("total_keys", model.total_keys)?,
        counts: ResultCounts {
            valid: count_from_i32("valid_count", model.valid_count)?,
            invalid: count_from_i32("invalid_count", model.invalid_count)?,
            rate_limited: count_from_i32("rate_limited_count", model.rate_limited_count)?,
        },
        status,
        created_at: from_naive(model.created_at),
        completed_at: model.completed_at.map(from_naive),
        test_id: model.test_id,
        model: model.model,
    })
}

fn result_from_model(model: test_results::Model) -> Result<ClassifiedResult> {
    Ok(ClassifiedResult {
        provider: decode_provider(&model.provider)?,
        status: decode_status(&model.status)?,
        tested_at: from_naive(model.tested_at),
        test_id: model.test_id,
        model: model.model,
        error: model.error,
        is_rate_limit: model.is_rate_limit,
        is_paid: model.is_paid,
        key_fingerprint: model.key_hash,
        key_masked: model.key_masked,
    })
}

#[async_trait]
impl Storage for DatabaseStorage {
    async fn create_session(&self, session: &SessionAggregate) -> Result<()> {
        let existing = test_sessions::Entity::find()
            .filter(test_sessions::Column::TestId.eq(session.test_id.as_str()))
            .one(&self.db)
            .await?;
        if existing.is_some() {
            return Err(StorageError::SessionExists(session.test_id.clone()).into());
        }

        let model = test_sessions::ActiveModel {
            test_id: Set(session.test_id.clone()),
            provider: Set(session.provider.as_str().to_string()),
            model: Set(session.model.clone()),
            total_keys: Set(count_to_i32("total_keys", session.total_keys)?),
            valid_count: Set(0),
            invalid_count: Set(0),
            rate_limited_count: Set(0),
            status: Set(test_sessions::STATUS_RUNNING.to_string()),
            created_at: Set(to_naive(session.created_at)),
            completed_at: Set(None),
            ..Default::default()
        };
        model.insert(&self.db).await?;

        ldebug!(
            &session.test_id,
            LogStage::Db,
            LogComponent::Storage,
            "session_created",
            "测试会话已创建",
            total_keys = session.total_keys
        );
        Ok(())
    }

    async fn save_result(&self, result: &ClassifiedResult) -> Result<()> {
        let model = test_results::ActiveModel {
            test_id: Set(result.test_id.clone()),
            key_hash: Set(result.key_fingerprint.clone()),
            key_masked: Set(result.key_masked.clone()),
            provider: Set(result.provider.as_str().to_string()),
            model: Set(result.model.clone()),
            status: Set(result.status.as_str().to_string()),
            error: Set(result.error.clone()),
            is_rate_limit: Set(result.is_rate_limit),
            is_paid: Set(result.is_paid),
            tested_at: Set(to_naive(result.tested_at)),
            ..Default::default()
        };
        model.insert(&self.db).await?;
        Ok(())
    }

    async fn update_session_aggregate(&self, test_id: &str, counts: ResultCounts) -> Result<()> {
        // 只更新仍在运行的会话，保证完成状态只写一次
        let updated = test_sessions::Entity::update_many()
            .col_expr(
                test_sessions::Column::ValidCount,
                Expr::value(count_to_i32("valid_count", counts.valid)?),
            )
            .col_expr(
                test_sessions::Column::InvalidCount,
                Expr::value(count_to_i32("invalid_count", counts.invalid)?),
            )
            .col_expr(
                test_sessions::Column::RateLimitedCount,
                Expr::value(count_to_i32("rate_limited_count", counts.rate_limited)?),
            )
            .col_expr(
                test_sessions::Column::Status,
                Expr::value(test_sessions::STATUS_COMPLETED),
            )
            .col_expr(
                test_sessions::Column::CompletedAt,
                Expr::value(to_naive(Utc::now())),
            )
            .filter(test_sessions::Column::TestId.eq(test_id))
            .filter(test_sessions::Column::Status.eq(test_sessions::STATUS_RUNNING))
            .exec(&self.db)
            .await?;

        if updated.rows_affected == 0 {
            let exists = self.get_session(test_id).await?.is_some();
            return Err(if exists {
                StorageError::SessionCompleted(test_id.to_string()).into()
            } else {
                StorageError::SessionMissing(test_id.to_string()).into()
            });
        }
        Ok(())
    }

    async fn get_session(&self, test_id: &str) -> Result<Option<SessionAggregate>> {
        test_sessions::Entity::find()
            .filter(test_sessions::Column::TestId.eq(test_id))
            .one(&self.db)
            .await?
            .map(session_from_model)
            .transpose()
    }

    async fn query_results(
        &self,
        test_id: &str,
        query: &ResultQuery,
    ) -> Result<Vec<ClassifiedResult>> {
        let mut select =
            test_results::Entity::find().filter(test_results::Column::TestId.eq(test_id));
        if let Some(status) = query.status {
            select = select.filter(test_results::Column::Status.eq(status.as_str()));
        }
        if let Some(provider) = query.provider {
            select = select.filter(test_results::Column::Provider.eq(provider.as_str()));
        }

        select
            .order_by_desc(test_results::Column::Id)
            .offset(query.offset())
            .limit(query.page_size())
            .all(&self.db)
            .await?
            .into_iter()
            .map(result_from_model)
            .collect()
    }
}
