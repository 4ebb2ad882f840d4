use sea_orm_migration::prelude::*;
use std::env;

#[tokio::main]
async fn main() {
    // 未设置 DATABASE_URL 时默认使用 data/key_tester.db
    if env::var("DATABASE_URL").is_err() {
        let in_migration_dir = env::current_dir()
            .map(|dir| dir.ends_with("migration"))
            .unwrap_or(false);
        let db_path = if in_migration_dir {
            "../data/key_tester.db"
        } else {
            "data/key_tester.db"
        };
        unsafe {
            env::set_var("DATABASE_URL", format!("sqlite://{db_path}?mode=rwc"));
        }
    }
    cli::run_cli(migration::Migrator).await;
}
