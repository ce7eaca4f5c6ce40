//! Reference data models
//!
//! Industry codes are immutable reference data owned by the store; the
//! classifier only ever reads them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Industry classification system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeType {
    /// Standard Industrial Classification
    Sic,
    /// North American Industry Classification System
    Naics,
    /// Merchant Category Code
    Mcc,
}

impl CodeType {
    /// All code systems in canonical order
    pub const ALL: [CodeType; 3] = [CodeType::Sic, CodeType::Naics, CodeType::Mcc];

    pub fn as_str(&self) -> &'static str {
        match self {
            CodeType::Sic => "sic",
            CodeType::Naics => "naics",
            CodeType::Mcc => "mcc",
        }
    }

    /// Upper-case label used in reasons and UI strings
    pub fn label(&self) -> &'static str {
        match self {
            CodeType::Sic => "SIC",
            CodeType::Naics => "NAICS",
            CodeType::Mcc => "MCC",
        }
    }
}

impl fmt::Display for CodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for CodeType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sic" => Ok(CodeType::Sic),
            "naics" => Ok(CodeType::Naics),
            "mcc" => Ok(CodeType::Mcc),
            other => Err(Error::InvalidInput(format!("Unknown code type: {}", other))),
        }
    }
}

/// Industry code reference record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndustryCode {
    pub id: String,
    pub code: String,
    pub code_type: CodeType,
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub subcategory: String,
    /// Ordered keyword list (may be empty)
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Intrinsic data-quality score (0.0-1.0)
    #[serde(default = "default_code_confidence")]
    pub confidence: f64,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_code_confidence() -> f64 {
    1.0
}

impl IndustryCode {
    /// Create a code with empty category data and full intrinsic confidence
    pub fn new(
        id: impl Into<String>,
        code: impl Into<String>,
        code_type: CodeType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            code: code.into(),
            code_type,
            description: description.into(),
            category: String::new(),
            subcategory: String::new(),
            keywords: Vec::new(),
            confidence: 1.0,
            updated_at: Utc::now(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_subcategory(mut self, subcategory: impl Into<String>) -> Self {
        self.subcategory = subcategory.into();
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Deduplication key shared by every merge step
    pub fn key(&self) -> (String, CodeType) {
        (self.code.clone(), self.code_type)
    }

    /// Lowercased description, category and keywords, one field per segment
    ///
    /// Every store searches this text, so matching is identical whether the
    /// code lives in SQLite or in memory.
    pub fn search_text(&self) -> String {
        search_text(&self.description, &self.category, &self.keywords)
    }

    /// Case-insensitive substring match over description, category and keywords
    pub fn matches_query(&self, query: &str) -> bool {
        match search_needle(query) {
            Some(needle) => self.search_text().contains(&needle),
            None => false,
        }
    }
}

/// Joins the fields of [`IndustryCode::search_text`]
pub const SEARCH_FIELD_SEPARATOR: char = '\u{1f}';

/// Searchable text of a code's fields (see [`IndustryCode::search_text`])
pub fn search_text(description: &str, category: &str, keywords: &[String]) -> String {
    let mut fields = vec![description.to_lowercase(), category.to_lowercase()];
    fields.extend(keywords.iter().map(|k| k.to_lowercase()));
    fields.join(&SEARCH_FIELD_SEPARATOR.to_string())
}

/// Trimmed, lowercased query; `None` when nothing is left to match
pub fn search_needle(query: &str) -> Option<String> {
    let needle = query.trim().to_lowercase();
    (!needle.is_empty()).then_some(needle)
}

/// Aggregate counts per code type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeStats {
    pub count: u64,
    pub average_confidence: f64,
}

/// Store-wide statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeStats {
    pub total_codes: u64,
    pub by_type: std::collections::BTreeMap<CodeType, TypeStats>,
}
