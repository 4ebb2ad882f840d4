//! # 测试结果实体定义
//!
//! 每个密钥一行，只追加。只保存密钥指纹与脱敏形式，不保存原文。

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "test_results")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub test_id: String,
    /// SHA-256 十六进制指纹
    pub key_hash: String,
    pub key_masked: String,
    pub provider: String,
    pub model: String,
    /// valid / invalid / `rate_limited`
    pub status: String,
    pub error: Option<String>,
    pub is_rate_limit: bool,
    pub is_paid: Option<bool>,
    pub tested_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::test_sessions::Entity",
        from = "Column::TestId",
        to = "super::test_sessions::Column::TestId",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    TestSession,
}

impl Related<super::test_sessions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TestSession.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
