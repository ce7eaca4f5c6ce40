//! Industry code store abstraction
//!
//! The classifier treats the store as a synchronous blocking dependency:
//! every call takes the request context and fails fast once it is cancelled
//! or past its deadline. Writers are serialized by the implementation.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::context::RequestContext;
use crate::db::models::{CodeStats, CodeType, IndustryCode, TypeStats};
use crate::{Error, Result};

/// Read/write access to industry code reference data
#[async_trait]
pub trait CodeStore: Send + Sync {
    /// Case-insensitive substring search over description, category and keywords
    async fn search_codes(
        &self,
        ctx: &RequestContext,
        query: &str,
        type_filter: Option<CodeType>,
        limit: usize,
    ) -> Result<Vec<IndustryCode>>;

    /// Paginated listing of one code system
    async fn get_codes_by_type(
        &self,
        ctx: &RequestContext,
        code_type: CodeType,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<IndustryCode>>;

    /// Exact (case-insensitive) category lookup
    async fn get_codes_by_category(
        &self,
        ctx: &RequestContext,
        category: &str,
        type_filter: Option<CodeType>,
        limit: usize,
    ) -> Result<Vec<IndustryCode>>;

    /// Point lookup; `Error::NotFound` when absent
    async fn get_code_by_id(&self, ctx: &RequestContext, id: &str) -> Result<IndustryCode>;

    /// Point lookup; `Error::NotFound` when absent
    async fn get_code_by_code_and_type(
        &self,
        ctx: &RequestContext,
        code: &str,
        code_type: CodeType,
    ) -> Result<IndustryCode>;

    /// Upsert keyed by id
    async fn insert_code(&self, ctx: &RequestContext, code: &IndustryCode) -> Result<()>;

    async fn update_code_confidence(
        &self,
        ctx: &RequestContext,
        id: &str,
        confidence: f64,
    ) -> Result<()>;

    async fn get_code_stats(&self, ctx: &RequestContext) -> Result<CodeStats>;
}

/// Validate confidence before it reaches any store
pub(crate) fn validate_confidence(confidence: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&confidence) || confidence.is_nan() {
        return Err(Error::InvalidInput(format!(
            "confidence {} outside [0, 1]",
            confidence
        )));
    }
    Ok(())
}

/// Build per-type statistics from an iterator of codes
pub(crate) fn compute_stats<'a>(codes: impl Iterator<Item = &'a IndustryCode>) -> CodeStats {
    let mut sums: BTreeMap<CodeType, (u64, f64)> = BTreeMap::new();
    for code in codes {
        let entry = sums.entry(code.code_type).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += code.confidence;
    }

    let total_codes = sums.values().map(|(count, _)| count).sum();
    let by_type = sums
        .into_iter()
        .map(|(code_type, (count, sum))| {
            (
                code_type,
                TypeStats {
                    count,
                    average_confidence: if count == 0 { 0.0 } else { sum / count as f64 },
                },
            )
        })
        .collect();

    CodeStats { total_codes, by_type }
}

/// In-memory store with the same semantics as the SQLite store
///
/// Codes are kept in insertion order so searches are deterministic.
#[derive(Debug, Clone, Default)]
pub struct MemoryCodeStore {
    codes: Arc<RwLock<Vec<IndustryCode>>>,
}

impl MemoryCodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with codes (later duplicates of an id win)
    pub fn with_codes(codes: impl IntoIterator<Item = IndustryCode>) -> Self {
        let mut stored: Vec<IndustryCode> = Vec::new();
        for code in codes {
            match stored.iter_mut().find(|c| c.id == code.id) {
                Some(existing) => *existing = code,
                None => stored.push(code),
            }
        }
        Self {
            codes: Arc::new(RwLock::new(stored)),
        }
    }

    pub async fn len(&self) -> usize {
        self.codes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.codes.read().await.is_empty()
    }
}

#[async_trait]
impl CodeStore for MemoryCodeStore {
    async fn search_codes(
        &self,
        ctx: &RequestContext,
        query: &str,
        type_filter: Option<CodeType>,
        limit: usize,
    ) -> Result<Vec<IndustryCode>> {
        ctx.check()?;
        let codes = self.codes.read().await;
        Ok(codes
            .iter()
            .filter(|c| type_filter.map_or(true, |t| c.code_type == t))
            .filter(|c| c.matches_query(query))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_codes_by_type(
        &self,
        ctx: &RequestContext,
        code_type: CodeType,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<IndustryCode>> {
        ctx.check()?;
        let codes = self.codes.read().await;
        Ok(codes
            .iter()
            .filter(|c| c.code_type == code_type)
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_codes_by_category(
        &self,
        ctx: &RequestContext,
        category: &str,
        type_filter: Option<CodeType>,
        limit: usize,
    ) -> Result<Vec<IndustryCode>> {
        ctx.check()?;
        let codes = self.codes.read().await;
        Ok(codes
            .iter()
            .filter(|c| type_filter.map_or(true, |t| c.code_type == t))
            .filter(|c| c.category.eq_ignore_ascii_case(category.trim()))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_code_by_id(&self, ctx: &RequestContext, id: &str) -> Result<IndustryCode> {
        ctx.check()?;
        let codes = self.codes.read().await;
        codes
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("industry code id {}", id)))
    }

    async fn get_code_by_code_and_type(
        &self,
        ctx: &RequestContext,
        code: &str,
        code_type: CodeType,
    ) -> Result<IndustryCode> {
        ctx.check()?;
        let codes = self.codes.read().await;
        codes
            .iter()
            .find(|c| c.code == code && c.code_type == code_type)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("{} code {}", code_type, code)))
    }

    async fn insert_code(&self, ctx: &RequestContext, code: &IndustryCode) -> Result<()> {
        ctx.check()?;
        validate_confidence(code.confidence)?;
        let mut codes = self.codes.write().await;

        if codes
            .iter()
            .any(|c| c.id != code.id && c.code == code.code && c.code_type == code.code_type)
        {
            return Err(Error::InvalidInput(format!(
                "{} code {} already exists under another id",
                code.code_type, code.code
            )));
        }

        match codes.iter_mut().find(|c| c.id == code.id) {
            Some(existing) => *existing = code.clone(),
            None => codes.push(code.clone()),
        }
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
        let mut codes = self.codes.write().await;
        let code = codes
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| Error::NotFound(format!("industry code id {}", id)))?;
        code.confidence = confidence;
        code.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn get_code_stats(&self, ctx: &RequestContext) -> Result<CodeStats> {
        ctx.check()?;
        let codes = self.codes.read().await;
        Ok(compute_stats(codes.iter()))
    }
}
