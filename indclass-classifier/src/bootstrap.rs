//! Store selection and reference-data seeding at startup

use indclass_common::config::DatabaseConfig;
use indclass_common::db::{init_database, SqliteCodeStore};
use indclass_common::seed::{load_seed_file, parse_seed, seed_store};
use indclass_common::{CodeStore, MemoryCodeStore, RequestContext, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Built-in reference codes, used when the store starts empty
pub const DEFAULT_SEED: &str = include_str!("../data/default_codes.toml");

/// SQLite store when a database path is configured, in-memory otherwise
pub async fn open_store(config: &DatabaseConfig) -> Result<Arc<dyn CodeStore>> {
    match &config.path {
        Some(path) => {
            info!(path = %path.display(), "Opening code database");
            let pool = init_database(path, &config.options()).await?;
            Ok(Arc::new(SqliteCodeStore::new(pool)))
        }
        None => {
            info!("No database path configured, using in-memory code store");
            Ok(Arc::new(MemoryCodeStore::new()))
        }
    }
}

/// Load `seed_path` if given, else the built-in seed when the store is empty
///
/// Returns the number of codes written.
pub async fn seed(
    store: &dyn CodeStore,
    ctx: &RequestContext,
    seed_path: Option<&Path>,
) -> Result<usize> {
    if let Some(path) = seed_path {
        info!(path = %path.display(), "Loading seed file");
        let codes = load_seed_file(path)?;
        return seed_store(store, ctx, &codes).await;
    }

    let stats = store.get_code_stats(ctx).await?;
    if stats.total_codes > 0 {
        info!(codes = stats.total_codes, "Code store already populated");
        return Ok(0);
    }
    let codes = parse_seed(DEFAULT_SEED)?;
    seed_store(store, ctx, &codes).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use indclass_common::CodeType;

    #[test]
    fn test_default_seed_parses() {
        let codes = parse_seed(DEFAULT_SEED).unwrap();
        assert!(codes.len() >= 20);
        for code_type in CodeType::ALL {
            assert!(codes.iter().any(|c| c.code_type == code_type));
        }
        assert!(codes
            .iter()
            .any(|c| c.code == "5812" && c.code_type == CodeType::Sic));
    }

    #[tokio::test]
    async fn test_seed_only_when_empty() {
        let store = MemoryCodeStore::new();
        let ctx = RequestContext::new();

        let written = seed(&store, &ctx, None).await.unwrap();
        assert!(written > 0);
        assert_eq!(seed(&store, &ctx, None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sqlite_store_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            path: Some(dir.path().join("codes.db")),
            ..DatabaseConfig::default()
        };
        let store = open_store(&config).await.unwrap();
        let ctx = RequestContext::new();

        let written = seed(store.as_ref(), &ctx, None).await.unwrap();
        assert_eq!(store.get_code_stats(&ctx).await.unwrap().total_codes, written as u64);
    }
}
