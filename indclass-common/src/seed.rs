//! Reference data seeding from TOML documents
//!
//! ```toml
//! [[codes]]
//! id = "sic-5812"
//! code = "5812"
//! code_type = "sic"
//! description = "Eating Places"
//! category = "Restaurant and Food Service"
//! keywords = ["restaurant", "pizza"]
//! confidence = 0.95
//! ```

use serde::Deserialize;
use std::path::Path;
use tracing::info;

use crate::context::RequestContext;
use crate::db::models::IndustryCode;
use crate::store::CodeStore;
use crate::{Error, Result};

#[derive(Debug, Deserialize)]
struct SeedDocument {
    #[serde(default)]
    codes: Vec<IndustryCode>,
}

/// Parse a seed document
pub fn parse_seed(content: &str) -> Result<Vec<IndustryCode>> {
    let doc: SeedDocument = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Parse seed failed: {}", e)))?;

    for code in &doc.codes {
        if code.id.trim().is_empty() || code.code.trim().is_empty() {
            return Err(Error::Config(format!(
                "Seed entry with empty id or code: {:?}",
                code.description
            )));
        }
        if !(0.0..=1.0).contains(&code.confidence) {
            return Err(Error::Config(format!(
                "Seed entry {} has confidence {} outside [0, 1]",
                code.id, code.confidence
            )));
        }
    }

    Ok(doc.codes)
}

/// Read and parse a seed file
pub fn load_seed_file(path: &Path) -> Result<Vec<IndustryCode>> {
    let content = std::fs::read_to_string(path)?;
    parse_seed(&content)
}

/// Upsert every code into the store, returning the number written
pub async fn seed_store(
    store: &dyn CodeStore,
    ctx: &RequestContext,
    codes: &[IndustryCode],
) -> Result<usize> {
    for code in codes {
        store.insert_code(ctx, code).await?;
    }
    info!("Seeded {} industry codes", codes.len());
    Ok(codes.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::CodeType;
    use crate::store::MemoryCodeStore;

    const SEED: &str = r#"
        [[codes]]
        id = "sic-5812"
        code = "5812"
        code_type = "sic"
        description = "Eating Places"
        category = "Restaurant and Food Service"
        keywords = ["restaurant", "pizza"]
        confidence = 0.95

        [[codes]]
        id = "mcc-5814"
        code = "5814"
        code_type = "mcc"
        description = "Fast Food Restaurants"
    "#;

    #[test]
    fn test_parse_seed_applies_defaults() {
        let codes = parse_seed(SEED).unwrap();
        assert_eq!(codes.len(), 2);
        assert_eq!(codes[0].code_type, CodeType::Sic);
        assert_eq!(codes[1].confidence, 1.0);
        assert!(codes[1].keywords.is_empty());
    }

    #[test]
    fn test_parse_seed_rejects_out_of_range_confidence() {
        let bad = r#"
            [[codes]]
            id = "x"
            code = "1"
            code_type = "sic"
            description = "Bad"
            confidence = 1.5
        "#;
        assert!(matches!(parse_seed(bad), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_seed_store_inserts_all() {
        let store = MemoryCodeStore::new();
        let codes = parse_seed(SEED).unwrap();
        let written = seed_store(&store, &RequestContext::new(), &codes).await.unwrap();
        assert_eq!(written, 2);
        assert_eq!(store.len().await, 2);
    }

    #[test]
    fn test_load_seed_file_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("codes.toml");
        std::fs::write(&path, SEED).unwrap();
        assert_eq!(load_seed_file(&path).unwrap().len(), 2);
    }
}
