use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::Storage;
use crate::error::Result;
use crate::error::storage::StorageError;
use crate::tester::{ClassifiedResult, ResultCounts, ResultQuery, SessionAggregate, SessionStatus};

/// 进程内存储，适合 CLI 单次运行与测试
#[derive(Debug, Default)]
pub struct MemoryStorage {
    sessions: DashMap<String, SessionAggregate>,
    /// 按写入顺序追加
    results: DashMap<String, Vec<ClassifiedResult>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// 某个会话已保存的结果条数
    #[must_use]
    pub fn result_count(&self, test_id: &str) -> usize {
        self.results.get(test_id).map_or(0, |r| r.len())
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn create_session(&self, session: &SessionAggregate) -> Result<()> {
        match self.sessions.entry(session.test_id.clone()) {
            Entry::Occupied(_) => Err(StorageError::SessionExists(session.test_id.clone()).into()),
            Entry::Vacant(slot) => {
                slot.insert(session.clone());
                self.results.insert(session.test_id.clone(), Vec::new());
                Ok(())
            }
        }
    }

    async fn save_result(&self, result: &ClassifiedResult) -> Result<()> {
        let mut results = self
            .results
            .get_mut(&result.test_id)
            .ok_or_else(|| StorageError::SessionMissing(result.test_id.clone()))?;
        results.push(result.clone());
        Ok(())
    }

    async fn update_session_aggregate(&self, test_id: &str, counts: ResultCounts) -> Result<()> {
        let mut session = self
            .sessions
            .get_mut(test_id)
            .ok_or_else(|| StorageError::SessionMissing(test_id.to_string()))?;
        if session.status == SessionStatus::Completed {
            return Err(StorageError::SessionCompleted(test_id.to_string()).into());
        }
        session.counts = counts;
        session.status = SessionStatus::Completed;
        session.completed_at = Some(Utc::now());
        Ok(())
    }

    async fn get_session(&self, test_id: &str) -> Result<Option<SessionAggregate>> {
        Ok(self.sessions.get(test_id).map(|s| s.clone()))
    }

    async fn query_results(
        &self,
        test_id: &str,
        query: &ResultQuery,
    ) -> Result<Vec<ClassifiedResult>> {
        let Some(results) = self.results.get(test_id) else {
            return Ok(Vec::new());
        };

        let offset = usize::try_from(query.offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(query.page_size()).unwrap_or(usize::MAX);
        Ok(results
            .iter()
            .rev()
            .filter(|r| query.matches(r))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }
}
