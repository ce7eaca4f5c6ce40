//! Industry code persistence (SQLite)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::context::RequestContext;
use crate::db::models::{search_needle, CodeStats, CodeType, IndustryCode};
use crate::store::{compute_stats, validate_confidence, CodeStore};
use crate::{Error, Result};

const SELECT_COLUMNS: &str = "id, code, code_type, description, category, subcategory, keywords, confidence, updated_at";

/// SQLite-backed code store
///
/// Inserts and confidence updates go through `write_lock`; SQLite is not
/// relied on to arbitrate concurrent writers.
#[derive(Clone)]
pub struct SqliteCodeStore {
    pool: SqlitePool,
    write_lock: Arc<Mutex<()>>,
}

impl SqliteCodeStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn row_to_code(row: &SqliteRow) -> Result<IndustryCode> {
    let code_type: String = row.get("code_type");
    let keywords_json: String = row.get("keywords");
    let keywords: Vec<String> = serde_json::from_str(&keywords_json)
        .map_err(|e| Error::Internal(format!("Corrupt keywords column: {}", e)))?;
    let updated_at: DateTime<Utc> = row.get("updated_at");

    Ok(IndustryCode {
        id: row.get("id"),
        code: row.get("code"),
        code_type: code_type.parse()?,
        description: row.get("description"),
        category: row.get("category"),
        subcategory: row.get("subcategory"),
        keywords,
        confidence: row.get("confidence"),
        updated_at,
    })
}

fn rows_to_codes(rows: &[SqliteRow]) -> Result<Vec<IndustryCode>> {
    rows.iter().map(row_to_code).collect()
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[async_trait]
impl CodeStore for SqliteCodeStore {
    async fn search_codes(
        &self,
        ctx: &RequestContext,
        query: &str,
        type_filter: Option<CodeType>,
        limit: usize,
    ) -> Result<Vec<IndustryCode>> {
        ctx.check()?;
        let Some(needle) = search_needle(query) else {
            return Ok(Vec::new());
        };

        let sql = format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM industry_codes
            WHERE instr(search_text, ?1) > 0
              AND (?2 IS NULL OR code_type = ?2)
            ORDER BY rowid
            LIMIT ?3
            "#
        );

        let rows = sqlx::query(&sql)
            .bind(needle)
            .bind(type_filter.map(|t| t.as_str()))
            .bind(sql_limit(limit))
            .fetch_all(&self.pool)
            .await?;

        debug!(query = %query, hits = rows.len(), "search_codes");
        rows_to_codes(&rows)
    }

    async fn get_codes_by_type(
        &self,
        ctx: &RequestContext,
        code_type: CodeType,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<IndustryCode>> {
        ctx.check()?;
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM industry_codes WHERE code_type = ? ORDER BY rowid LIMIT ? OFFSET ?"
        );
        let rows = sqlx::query(&sql)
            .bind(code_type.as_str())
            .bind(sql_limit(limit))
            .bind(sql_limit(offset))
            .fetch_all(&self.pool)
            .await?;
        rows_to_codes(&rows)
    }

    async fn get_codes_by_category(
        &self,
        ctx: &RequestContext,
        category: &str,
        type_filter: Option<CodeType>,
        limit: usize,
    ) -> Result<Vec<IndustryCode>> {
        ctx.check()?;
        let sql = format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM industry_codes
            WHERE category = ?1 COLLATE NOCASE
              AND (?2 IS NULL OR code_type = ?2)
            ORDER BY rowid
            LIMIT ?3
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(category.trim())
            .bind(type_filter.map(|t| t.as_str()))
            .bind(sql_limit(limit))
            .fetch_all(&self.pool)
            .await?;
        rows_to_codes(&rows)
    }

    async fn get_code_by_id(&self, ctx: &RequestContext, id: &str) -> Result<IndustryCode> {
        ctx.check()?;
        let sql = format!("SELECT {SELECT_COLUMNS} FROM industry_codes WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => row_to_code(&row),
            None => Err(Error::NotFound(format!("industry code id {}", id))),
        }
    }

    async fn get_code_by_code_and_type(
        &self,
        ctx: &RequestContext,
        code: &str,
        code_type: CodeType,
    ) -> Result<IndustryCode> {
        ctx.check()?;
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM industry_codes WHERE code = ? AND code_type = ?"
        );
        let row = sqlx::query(&sql)
            .bind(code)
            .bind(code_type.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => row_to_code(&row),
            None => Err(Error::NotFound(format!("{} code {}", code_type, code))),
        }
    }

    async fn insert_code(&self, ctx: &RequestContext, code: &IndustryCode) -> Result<()> {
        ctx.check()?;
        validate_confidence(code.confidence)?;
        let keywords = serde_json::to_string(&code.keywords)
            .map_err(|e| Error::Internal(format!("Serialize keywords failed: {}", e)))?;

        let _guard = self.write_lock.lock().await;
        sqlx::query(
            r#"
            INSERT INTO industry_codes (
                id, code, code_type, description, category, subcategory,
                keywords, search_text, confidence, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                code = excluded.code,
                code_type = excluded.code_type,
                description = excluded.description,
                category = excluded.category,
                subcategory = excluded.subcategory,
                keywords = excluded.keywords,
                search_text = excluded.search_text,
                confidence = excluded.confidence,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&code.id)
        .bind(&code.code)
        .bind(code.code_type.as_str())
        .bind(&code.description)
        .bind(&code.category)
        .bind(&code.subcategory)
        .bind(keywords)
        .bind(code.search_text())
        .bind(code.confidence)
        .bind(code.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_code_confidence(
        &self,
        ctx: &RequestContext,
        id: &str,
        confidence: f64,
    ) -> Result<()> {
        ctx.check()?;
        validate_confidence(confidence)?;

        let _guard = self.write_lock.lock().await;
        let result = sqlx::query(
            "UPDATE industry_codes SET confidence = ?, updated_at = ? WHERE id = ?",
        )
        .bind(confidence)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("industry code id {}", id)));
        }
        Ok(())
    }

    async fn get_code_stats(&self, ctx: &RequestContext) -> Result<CodeStats> {
        ctx.check()?;
        let sql = format!("SELECT {SELECT_COLUMNS} FROM industry_codes");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        let codes = rows_to_codes(&rows)?;
        Ok(compute_stats(codes.iter()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init::init_memory_database;

    async fn seeded_store() -> SqliteCodeStore {
        let pool = init_memory_database().await.expect("in-memory database");
        let store = SqliteCodeStore::new(pool);
        let ctx = RequestContext::new();

        let codes = vec![
            IndustryCode::new("sic-5812", "5812", CodeType::Sic, "Eating Places")
                .with_category("Restaurant and Food Service")
                .with_keywords(["restaurant", "pizza"])
                .with_confidence(0.95),
            IndustryCode::new("naics-722511", "722511", CodeType::Naics, "Full-Service Restaurants")
                .with_category("Restaurant and Food Service")
                .with_keywords(["restaurant", "dining"]),
            IndustryCode::new("mcc-7299", "7299", CodeType::Mcc, "Miscellaneous Personal Services 100%_off")
                .with_category("Personal Services"),
        ];
        for code in &codes {
            store.insert_code(&ctx, code).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_search_matches_keywords_and_filters_type() {
        let store = seeded_store().await;
        let ctx = RequestContext::new();

        let hits = store.search_codes(&ctx, "PIZZA", None, 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].keywords, vec!["restaurant", "pizza"]);

        let naics = store
            .search_codes(&ctx, "restaurant", Some(CodeType::Naics), 10)
            .await
            .unwrap();
        assert_eq!(naics.len(), 1);
        assert_eq!(naics[0].code, "722511");
    }

    #[tokio::test]
    async fn test_wildcards_are_literal() {
        let store = seeded_store().await;
        let ctx = RequestContext::new();

        assert_eq!(store.search_codes(&ctx, "%", None, 10).await.unwrap().len(), 1);
        assert_eq!(store.search_codes(&ctx, "0%_", None, 10).await.unwrap().len(), 1);
        assert!(store.search_codes(&ctx, "x_z", None, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_point_lookups() {
        let store = seeded_store().await;
        let ctx = RequestContext::new();

        let code = store
            .get_code_by_code_and_type(&ctx, "5812", CodeType::Sic)
            .await
            .unwrap();
        assert_eq!(code.id, "sic-5812");
        assert!((code.confidence - 0.95).abs() < 1e-9);

        let missing = store.get_code_by_id(&ctx, "nope").await.unwrap_err();
        assert!(missing.is_not_found());
    }

    #[tokio::test]
    async fn test_category_and_type_listing() {
        let store = seeded_store().await;
        let ctx = RequestContext::new();

        let food = store
            .get_codes_by_category(&ctx, "restaurant and food service", None, 10)
            .await
            .unwrap();
        assert_eq!(food.len(), 2);

        let page = store.get_codes_by_type(&ctx, CodeType::Sic, 10, 1).await.unwrap();
        assert!(page.is_empty());
    }

    #[tokio::test]
    async fn test_search_folds_non_ascii_case() {
        let store = seeded_store().await;
        let ctx = RequestContext::new();
        store
            .insert_code(
                &ctx,
                &IndustryCode::new("mcc-5814", "5814", CodeType::Mcc, "CAFÉ Services")
                    .with_keywords(["Crème brûlée"]),
            )
            .await
            .unwrap();

        let hits = store.search_codes(&ctx, "café", None, 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].code, "5814");
        assert_eq!(store.search_codes(&ctx, "CRÈME", None, 10).await.unwrap().len(), 1);
        // Keyword JSON punctuation is not searchable
        assert!(store.search_codes(&ctx, "\"", None, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_refreshes_search_text() {
        let store = seeded_store().await;
        let ctx = RequestContext::new();
        let renamed = IndustryCode::new("mcc-7299", "7299", CodeType::Mcc, "Dry Cleaning Services")
            .with_category("Personal Services");
        store.insert_code(&ctx, &renamed).await.unwrap();

        assert!(store.search_codes(&ctx, "miscellaneous", None, 10).await.unwrap().is_empty());
        assert_eq!(store.search_codes(&ctx, "dry clean", None, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_and_confidence_update() {
        let store = seeded_store().await;
        let ctx = RequestContext::new();

        let replacement = IndustryCode::new("sic-5812", "5812", CodeType::Sic, "Eating and Drinking Places");
        store.insert_code(&ctx, &replacement).await.unwrap();
        store.update_code_confidence(&ctx, "sic-5812", 0.4).await.unwrap();

        let loaded = store.get_code_by_id(&ctx, "sic-5812").await.unwrap();
        assert_eq!(loaded.description, "Eating and Drinking Places");
        assert!((loaded.confidence - 0.4).abs() < 1e-9);

        let err = store.update_code_confidence(&ctx, "ghost", 0.4).await.unwrap_err();
        assert!(err.is_not_found());

        let stats = store.get_code_stats(&ctx).await.unwrap();
        assert_eq!(stats.total_codes, 3);
    }
}
