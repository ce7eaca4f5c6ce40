//! Database initialization
//!
//! Opens (or creates) the SQLite reference database and ensures the
//! industry code schema exists. Safe to call on every startup.

use crate::db::models::search_text;
use crate::{Error, Result};
use sqlx::{sqlite::SqlitePoolOptions, Row, SqlitePool};
use std::path::Path;
use tracing::info;

/// Current schema version recorded in `schema_version`
const CURRENT_SCHEMA_VERSION: i64 = 2;

/// Pool sizing and lock behaviour
#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    pub max_connections: u32,
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            busy_timeout_ms: 5000,
        }
    }
}

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path, options: &DatabaseOptions) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(options.max_connections.max(1))
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL allows concurrent readers alongside the single serialized writer
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    let pragma_sql = format!("PRAGMA busy_timeout = {}", options.busy_timeout_ms);
    sqlx::query(&pragma_sql).execute(&pool).await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Open a private in-memory database with the schema applied
///
/// Single connection so every query sees the same memory database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    create_schema(&pool).await?;
    Ok(pool)
}

/// Create all tables and indexes (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_industry_codes_table(pool).await?;
    ensure_search_text_column(pool).await?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(CURRENT_SCHEMA_VERSION)
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_industry_codes_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS industry_codes (
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL,
            code_type TEXT NOT NULL CHECK (code_type IN ('sic', 'naics', 'mcc')),
            description TEXT NOT NULL,
            category TEXT NOT NULL DEFAULT '',
            subcategory TEXT NOT NULL DEFAULT '',
            keywords TEXT NOT NULL DEFAULT '[]',
            search_text TEXT NOT NULL DEFAULT '',
            confidence REAL NOT NULL DEFAULT 1.0 CHECK (confidence >= 0.0 AND confidence <= 1.0),
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (code, code_type)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_industry_codes_type ON industry_codes(code_type)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_industry_codes_category ON industry_codes(category COLLATE NOCASE)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Add and backfill `search_text` on databases created at version 1
async fn ensure_search_text_column(pool: &SqlitePool) -> Result<()> {
    let columns: Vec<String> =
        sqlx::query_scalar("SELECT name FROM pragma_table_info('industry_codes')")
            .fetch_all(pool)
            .await?;
    if columns.iter().any(|c| c == "search_text") {
        return Ok(());
    }

    info!("Migrating industry_codes: adding search_text");
    sqlx::query("ALTER TABLE industry_codes ADD COLUMN search_text TEXT NOT NULL DEFAULT ''")
        .execute(pool)
        .await?;

    let rows = sqlx::query("SELECT id, description, category, keywords FROM industry_codes")
        .fetch_all(pool)
        .await?;
    for row in &rows {
        let keywords_json: String = row.get("keywords");
        let keywords: Vec<String> = serde_json::from_str(&keywords_json)
            .map_err(|e| Error::Internal(format!("Corrupt keywords column: {}", e)))?;
        let description: String = row.get("description");
        let category: String = row.get("category");

        sqlx::query("UPDATE industry_codes SET search_text = ? WHERE id = ?")
            .bind(search_text(&description, &category, &keywords))
            .bind(row.get::<String, _>("id"))
            .execute(pool)
            .await?;
    }
    Ok(())
}

/// Read the highest applied schema version (0 when none)
pub async fn schema_version(pool: &SqlitePool) -> Result<i64> {
    let version: Option<i64> =
        sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
            .fetch_one(pool)
            .await?;
    Ok(version.unwrap_or(0))
}
