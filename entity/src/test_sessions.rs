//! # 测试会话实体定义
//!
//! 每个批次对应一行，记录汇总计数与生命周期状态

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 会话状态：运行中
pub const STATUS_RUNNING: &str = "running";
/// 会话状态：已完成
pub const STATUS_COMPLETED: &str = "completed";

/// 测试会话实体
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "test_sessions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub test_id: String,
    pub provider: String,
    pub model: String,
    pub total_keys: i32,
    pub valid_count: i32,
    pub invalid_count: i32,
    pub rate_limited_count: i32,
    pub status: String,
    pub created_at: DateTime,
    pub completed_at: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::test_results::Entity")]
    TestResults,
}

impl Related<super::test_results::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TestResults.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
