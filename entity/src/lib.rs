//! # Entity 模块
//!
//! 包含所有 Sea-ORM 实体定义

pub mod test_results;
pub mod test_sessions;

pub use test_results::Entity as TestResults;
pub use test_sessions::Entity as TestSessions;
