// Database connection and pool management
// This module handles SQLite database connections using sqlx

use std::path::Path;

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

pub struct DatabaseConnection {
    pool: SqlitePool,
}

impl DatabaseConnection {
    pub async fn new(database_url: &str) -> Result<Self> {
        // Create database file directory if it doesn't exist
        let db_path = if database_url.starts_with("sqlite://") {
            database_url.trim_start_matches("sqlite://")
        } else if database_url.starts_with("sqlite:") {
            database_url.trim_start_matches("sqlite:")
        } else {
            database_url
        };

        if db_path != ":memory:" {
            if let Some(parent) = Path::new(db_path).parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            if !Path::new(db_path).exists() {
                std::fs::File::create(db_path)?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        let create_active_sql = r#"
            CREATE TABLE IF NOT EXISTS active_service_dates (
                language TEXT NOT NULL,
                troop_school TEXT NOT NULL,
                start_date DATE,
                end_date DATE,
                scrape_date DATE NOT NULL
            )
        "#;

        let create_history_sql = r#"
            CREATE TABLE IF NOT EXISTS service_date_history (
                language TEXT NOT NULL,
                troop_school TEXT NOT NULL,
                start_date DATE,
                end_date DATE,
                scrape_date DATE NOT NULL,
                active BOOLEAN NOT NULL DEFAULT 1
            )
        "#;

        let create_indexes_sql = [
            "CREATE INDEX IF NOT EXISTS idx_active_language ON active_service_dates (language)",
            "CREATE INDEX IF NOT EXISTS idx_active_start_date ON active_service_dates (start_date)",
            "CREATE INDEX IF NOT EXISTS idx_history_key ON service_date_history (language, troop_school, start_date, end_date)",
            "CREATE INDEX IF NOT EXISTS idx_history_active ON service_date_history (active)",
        ];

        sqlx::query(create_active_sql).execute(&self.pool).await?;
        sqlx::query(create_history_sql).execute(&self.pool).await?;
        for index_sql in create_indexes_sql {
            sqlx::query(index_sql).execute(&self.pool).await?;
        }

        Ok(())
    }
}
