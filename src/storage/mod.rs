//! # 结果存储
//!
//! 批次协调器通过 [`Storage`] trait 写入会话与结果，默认提供内存与数据库两种实现。

mod database;
mod memory;

pub use database::DatabaseStorage;
pub use memory::MemoryStorage;

use async_trait::async_trait;

use crate::error::Result;
use crate::tester::{ClassifiedResult, ResultCounts, ResultQuery, SessionAggregate};

/// 会话与结果的持久化接口
#[async_trait]
pub trait Storage: Send + Sync + std::fmt::Debug {
    /// 创建运行中的会话，`test_id` 已存在时报错
    async fn create_session(&self, session: &SessionAggregate) -> Result<()>;

    /// 追加单个密钥的结果
    async fn save_result(&self, result: &ClassifiedResult) -> Result<()>;

    /// 写入最终计数并把会话标记为完成，只允许一次
    async fn update_session_aggregate(&self, test_id: &str, counts: ResultCounts) -> Result<()>;

    async fn get_session(&self, test_id: &str) -> Result<Option<SessionAggregate>>;

    /// 按条件分页查询，最新写入的结果在前
    async fn query_results(
        &self,
        test_id: &str,
        query: &ResultQuery,
    ) -> Result<Vec<ClassifiedResult>>;
}
