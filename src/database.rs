//! # 数据库模块
//!
//! 数据库连接和迁移管理

use sea_orm::{Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use std::path::Path;

use crate::config::DatabaseConfig;
use crate::logging::{LogComponent, LogStage};
use crate::{ldebug, lerror, linfo, lwarn};

/// 从连接串中取出 `SQLite` 文件路径，内存库返回 `None`
fn sqlite_file_path(database_url: &str) -> Option<&Path> {
    let rest = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() || path.contains(":memory:") {
        return None;
    }
    Some(Path::new(path))
}

/// 确保 `SQLite` 数据库文件及其目录存在
fn ensure_sqlite_file(db_file_path: &Path) -> Result<(), DbErr> {
    if let Some(parent_dir) = db_file_path.parent()
        && !parent_dir.as_os_str().is_empty()
        && !parent_dir.exists()
    {
        std::fs::create_dir_all(parent_dir).map_err(|e| {
            DbErr::Custom(format!(
                "无法创建数据库目录 {}: {e}",
                parent_dir.display()
            ))
        })?;
        ldebug!(
            "system",
            LogStage::Db,
            LogComponent::Database,
            "create_dir",
            &format!("数据库目录创建成功: {}", parent_dir.display())
        );
    }

    if !db_file_path.exists() {
        std::fs::File::create(db_file_path).map_err(|e| {
            DbErr::Custom(format!(
                "无法创建数据库文件 {}: {e}",
                db_file_path.display()
            ))
        })?;
        ldebug!(
            "system",
            LogStage::Db,
            LogComponent::Database,
            "create_file",
            &format!("数据库文件创建成功: {}", db_file_path.display())
        );
    }
    Ok(())
}

/// 初始化数据库连接
pub async fn init_database(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    if let Some(path) = sqlite_file_path(&config.url) {
        ensure_sqlite_file(path)?;
    }

    let db = Database::connect(config.connect_options()).await?;

    linfo!(
        "system",
        LogStage::Db,
        LogComponent::Database,
        "connected",
        "数据库连接成功",
        memory = config.is_memory_database()
    );
    Ok(db)
}

/// 运行数据库迁移
pub async fn run_migrations(db: &DatabaseConnection) -> Result<(), DbErr> {
    let pending = ::migration::Migrator::get_pending_migrations(db).await?;
    if pending.is_empty() {
        ldebug!(
            "system",
            LogStage::Db,
            LogComponent::Database,
            "migrations_up_to_date",
            "所有迁移都已应用"
        );
        return Ok(());
    }

    lwarn!(
        "system",
        LogStage::Db,
        LogComponent::Database,
        "migrations_pending",
        &format!("有 {} 个待应用的迁移", pending.len())
    );

    match ::migration::Migrator::up(db, None).await {
        Ok(()) => {
            linfo!(
                "system",
                LogStage::Db,
                LogComponent::Database,
                "migrations_done",
                "数据库迁移完成"
            );
            Ok(())
        }
        Err(e) => {
            lerror!(
                "system",
                LogStage::Db,
                LogComponent::Database,
                "migrations_failed",
                &format!("数据库迁移失败: {e}")
            );
            Err(e)
        }
    }
}
