use crate::entities::{return_media, return_requests, users};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema};
use std::env;
use std::time::Duration;
use tracing::info;

pub async fn setup_database() -> anyhow::Result<DatabaseConnection> {
    let db_url =
        env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://returns.db?mode=rwc".to_string());

    info!("📂 Database: {}", db_url);

    let mut opt = ConnectOptions::new(&db_url);
    opt.max_connections(100)
        .min_connections(5)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Debug);

    let db = Database::connect(opt).await?;

    info!("✅ Database connected successfully");

    run_migrations(&db).await?;

    Ok(db)
}

/// Creates tables from the entity definitions. Tables are created in
/// foreign-key order; existing tables are left untouched.
pub async fn run_migrations(db: &DatabaseConnection) -> anyhow::Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let stmts = vec![
        schema
            .create_table_from_entity(users::Entity)
            .if_not_exists()
            .to_owned(),
        schema
            .create_table_from_entity(return_requests::Entity)
            .if_not_exists()
            .to_owned(),
        schema
            .create_table_from_entity(return_media::Entity)
            .if_not_exists()
            .to_owned(),
    ];

    for stmt in stmts {
        let stmt = builder.build(&stmt);
        db.execute(stmt).await?;
    }

    // Indexes for the common query paths: per-user listing, status
    // filtering and newest-first ordering.
    let indexes = [
        "CREATE INDEX IF NOT EXISTS idx_return_requests_user_id ON return_requests(user_id);",
        "CREATE INDEX IF NOT EXISTS idx_return_requests_status ON return_requests(status);",
        "CREATE INDEX IF NOT EXISTS idx_return_requests_created_at ON return_requests(created_at);",
        "CREATE INDEX IF NOT EXISTS idx_return_media_request_id ON return_media(return_request_id);",
    ];

    for sql in indexes {
        let _ = db
            .execute(sea_orm::Statement::from_string(builder, sql.to_string()))
            .await;
    }

    Ok(())
}
