//! Aggregation request, result and configuration types

use indclass_common::CodeType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use super::analytics::Analytics;
use super::presentation::Presentation;
use crate::confidence::ConfidenceLevel;
use crate::types::ClassificationResult;

/// Sort order of aggregated results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortCriterion {
    Confidence,
    /// Aggregation score
    Relevance,
    /// Number of quality indicators
    Quality,
    /// Description, A to Z
    Alphabetical,
    /// Code type, then confidence
    CodeType,
    MatchStrength,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentationFormat {
    Detailed,
    Summary,
    Compact,
    Export,
    Dashboard,
    Api,
}

/// Discretized strength of a match, strongest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrength {
    Exact,
    Strong,
    Moderate,
    Weak,
    Minimal,
}

impl MatchStrength {
    /// Thresholds 0.85 / 0.7 / 0.5 / 0.3
    pub fn from_score(score: f64) -> Self {
        if score >= 0.85 {
            Self::Exact
        } else if score >= 0.7 {
            Self::Strong
        } else if score >= 0.5 {
            Self::Moderate
        } else if score >= 0.3 {
            Self::Weak
        } else {
            Self::Minimal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Strong => "strong",
            Self::Moderate => "moderate",
            Self::Weak => "weak",
            Self::Minimal => "minimal",
        }
    }
}

/// Rendering hints for user interfaces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiHints {
    pub color: String,
    pub icon: String,
    pub tags: Vec<String>,
    pub highlight: bool,
}

/// Pointer to another code in the same result set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedCode {
    pub code: String,
    pub code_type: CodeType,
    pub description: String,
    pub confidence: f64,
}

/// Final presentation unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedResult {
    pub result: ClassificationResult,
    pub aggregation_score: f64,
    /// 1-based rank over all returned results
    pub overall_rank: usize,
    /// 1-based rank within the code type
    pub type_rank: usize,
    /// Presentation scale (0.9 / 0.75 / 0.5 / 0.25)
    pub confidence_level: ConfidenceLevel,
    pub match_strength: MatchStrength,
    /// Higher sorts first in UI lists
    pub display_priority: u32,
    pub quality_indicators: Vec<String>,
    pub ui_hints: UiHints,
    /// Same category, other code types
    pub related_codes: Vec<RelatedCode>,
    /// Same code type, same category
    pub alternative_codes: Vec<RelatedCode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    pub min_confidence: f64,
    pub max_results_per_type: usize,
    pub sort_by: SortCriterion,
    pub include_analytics: bool,
    pub presentation: PresentationFormat,
    /// Cap of related and alternative codes per result
    pub max_related: usize,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.1,
            max_results_per_type: 3,
            sort_by: SortCriterion::Relevance,
            include_analytics: true,
            presentation: PresentationFormat::Detailed,
            max_related: 3,
        }
    }
}

/// Input of [`ResultAggregator::aggregate`](super::ResultAggregator::aggregate)
///
/// Unset options fall back to the aggregator's configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationRequest {
    pub results: Vec<ClassificationResult>,
    pub min_confidence: Option<f64>,
    pub max_results_per_type: Option<usize>,
    pub sort_by: Option<SortCriterion>,
    pub presentation: Option<PresentationFormat>,
    pub include_analytics: Option<bool>,
    /// Code types the caller expects; empty means all
    pub expected_types: Vec<CodeType>,
}

impl AggregationRequest {
    pub fn new(results: Vec<ClassificationResult>) -> Self {
        Self {
            results,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedResults {
    /// Returned results in sort order
    pub results: Vec<AggregatedResult>,
    /// Every code type, possibly with an empty list
    pub by_type: BTreeMap<CodeType, Vec<AggregatedResult>>,
    /// Returned results per contributing match-type tag
    pub by_strategy: BTreeMap<String, usize>,
    pub total_input_results: usize,
    pub total_after_dedup: usize,
    pub total_after_filter: usize,
    pub analytics: Option<Analytics>,
    pub presentation: Presentation,
    pub processing_time_ms: u64,
}

#[derive(Debug, Error, PartialEq)]
pub enum AggregationError {
    #[error("Invalid aggregation request: {0}")]
    InvalidRequest(String),

    #[error("Aggregation cancelled")]
    Cancelled,

    #[error("Aggregation deadline exceeded")]
    DeadlineExceeded,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_strength_thresholds() {
        assert_eq!(MatchStrength::from_score(0.9), MatchStrength::Exact);
        assert_eq!(MatchStrength::from_score(0.7), MatchStrength::Strong);
        assert_eq!(MatchStrength::from_score(0.55), MatchStrength::Moderate);
        assert_eq!(MatchStrength::from_score(0.3), MatchStrength::Weak);
        assert_eq!(MatchStrength::from_score(0.1), MatchStrength::Minimal);
        assert!(MatchStrength::Exact < MatchStrength::Minimal);
    }

    #[test]
    fn test_request_defaults_from_json() {
        let request: AggregationRequest = serde_json::from_str(r#"{"results": []}"#).unwrap();
        assert!(request.min_confidence.is_none());
        assert!(request.expected_types.is_empty());

        let request: AggregationRequest =
            serde_json::from_str(r#"{"sort_by": "match_strength", "presentation": "api"}"#).unwrap();
        assert_eq!(request.sort_by, Some(SortCriterion::MatchStrength));
        assert_eq!(request.presentation, Some(PresentationFormat::Api));
    }
}
