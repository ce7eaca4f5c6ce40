//! Core types shared across the classification pipeline
//!
//! Defines the candidate record produced by strategies, the per-strategy
//! vote consumed by the voting engine, and the merge rules used by every
//! deduplication step.
//!
//! # Merge rules
//! - Key is `(code, code_type)`
//! - Confidence becomes the maximum of the merged candidates
//! - `matched_on` and `reasons` are unioned; first-seen order wins, new
//!   entries are appended
//! - Divergent match types collapse to `"multi-strategy"`

use chrono::{DateTime, Utc};
use indclass_common::{CodeType, IndustryCode};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::text::clamp_unit;

/// Match type written when candidates from different strategies merge
pub const MULTI_STRATEGY: &str = "multi-strategy";

/// Deduplication key
pub type CodeKey = (String, CodeType);

// ============================================================================
// Classification Result
// ============================================================================

/// A candidate match for one industry code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub code: IndustryCode,
    /// Candidate confidence (0.0-1.0)
    pub confidence: f64,
    /// "exact", "keyword", "description", "business_name", "fuzzy",
    /// "multi-strategy" or a composite tag
    pub match_type: String,
    /// Tokens or fields that matched (ordered, deduplicated)
    #[serde(default)]
    pub matched_on: Vec<String>,
    /// Human-readable audit trail (append-only, deduplicated)
    #[serde(default)]
    pub reasons: Vec<String>,
    /// Strategy-assigned weight
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

impl ClassificationResult {
    /// Create a candidate with clamped confidence
    pub fn new(
        code: IndustryCode,
        confidence: f64,
        match_type: impl Into<String>,
        weight: f64,
    ) -> Self {
        Self {
            code,
            confidence: clamp_unit(confidence),
            match_type: match_type.into(),
            matched_on: Vec::new(),
            reasons: Vec::new(),
            weight: weight.max(0.0),
        }
    }

    pub fn key(&self) -> CodeKey {
        self.code.key()
    }

    pub fn code_type(&self) -> CodeType {
        self.code.code_type
    }

    pub fn set_confidence(&mut self, confidence: f64) {
        self.confidence = clamp_unit(confidence);
    }

    /// Append a matched term unless already present
    pub fn add_matched_on(&mut self, term: impl Into<String>) {
        let term = term.into();
        if !term.is_empty() && !self.matched_on.contains(&term) {
            self.matched_on.push(term);
        }
    }

    /// Append a reason unless already present
    pub fn add_reason(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        if !reason.is_empty() && !self.reasons.contains(&reason) {
            self.reasons.push(reason);
        }
    }

    pub fn with_matched_on(mut self, term: impl Into<String>) -> Self {
        self.add_matched_on(term);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.add_reason(reason);
        self
    }

    /// Merge another candidate for the same code into this one
    pub fn merge_from(&mut self, other: &ClassificationResult) {
        debug_assert_eq!(self.key(), other.key());

        if other.confidence > self.confidence {
            self.confidence = other.confidence;
        }
        if other.weight > self.weight {
            self.weight = other.weight;
        }
        if self.match_type != other.match_type {
            self.match_type = MULTI_STRATEGY.to_string();
        }
        for term in &other.matched_on {
            self.add_matched_on(term.clone());
        }
        for reason in &other.reasons {
            self.add_reason(reason.clone());
        }
    }

    /// Number of distinct pieces of supporting evidence
    pub fn evidence_count(&self) -> usize {
        self.reasons.len() + self.matched_on.len()
    }
}

/// Deduplicate candidates by `(code, code_type)` keeping first-seen order
pub fn merge_results<I>(results: I) -> Vec<ClassificationResult>
where
    I: IntoIterator<Item = ClassificationResult>,
{
    let mut merged: Vec<ClassificationResult> = Vec::new();
    let mut index: HashMap<CodeKey, usize> = HashMap::new();

    for result in results {
        match index.get(&result.key()) {
            Some(&pos) => merged[pos].merge_from(&result),
            None => {
                index.insert(result.key(), merged.len());
                merged.push(result);
            }
        }
    }

    merged
}

// ============================================================================
// Strategy Vote
// ============================================================================

/// Per-strategy multipliers recorded by adaptive weighting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightingFactors {
    pub performance_multiplier: f64,
    pub consistency_factor: f64,
    pub recency_factor: f64,
    pub original_weight: f64,
    pub adjusted_weight: f64,
}

/// Typed diagnostics attached to a vote
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoteMetadata {
    /// Raw candidates seen by the strategy before thresholding
    pub candidates_found: usize,
    pub processing_time_ms: u64,
    /// Weight annotation written by adaptive weighting
    pub adaptive_weight: Option<f64>,
    pub weighting_factors: Option<WeightingFactors>,
    /// Strategy-level confidence level label
    pub confidence_level: Option<String>,
}

/// One strategy's contribution to the consensus stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyVote {
    pub strategy_name: String,
    pub results: Vec<ClassificationResult>,
    /// Strategy prior weight
    pub weight: f64,
    /// Strategy-level aggregate confidence
    pub confidence: f64,
    pub vote_time: DateTime<Utc>,
    pub metadata: VoteMetadata,
}

impl StrategyVote {
    pub fn new(
        strategy_name: impl Into<String>,
        results: Vec<ClassificationResult>,
        weight: f64,
        confidence: f64,
    ) -> Self {
        Self {
            strategy_name: strategy_name.into(),
            results,
            weight: weight.max(0.0),
            confidence: clamp_unit(confidence),
            vote_time: Utc::now(),
            metadata: VoteMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: VoteMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Adaptive annotation if present, otherwise the prior weight
    pub fn effective_weight(&self) -> f64 {
        self.metadata.adaptive_weight.unwrap_or(self.weight)
    }
}

/// Group results by code type, preserving order within each group
pub fn group_by_type(
    results: &[ClassificationResult],
) -> BTreeMap<CodeType, Vec<ClassificationResult>> {
    let mut groups: BTreeMap<CodeType, Vec<ClassificationResult>> = BTreeMap::new();
    for result in results {
        groups
            .entry(result.code_type())
            .or_default()
            .push(result.clone());
    }
    groups
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn code(code: &str, code_type: CodeType) -> IndustryCode {
        IndustryCode::new(format!("{}-{}", code_type.as_str(), code), code, code_type, "Test code")
    }

    fn candidate(c: &str, confidence: f64, match_type: &str, term: &str) -> ClassificationResult {
        ClassificationResult::new(code(c, CodeType::Sic), confidence, match_type, 1.0)
            .with_matched_on(term)
            .with_reason(format!("matched {}", term))
    }

    #[test]
    fn test_confidence_clamped_on_creation() {
        let r = ClassificationResult::new(code("5812", CodeType::Sic), 1.3, "keyword", 1.0);
        assert_eq!(r.confidence, 1.0);
        let r = ClassificationResult::new(code("5812", CodeType::Sic), -0.3, "keyword", 1.0);
        assert_eq!(r.confidence, 0.0);
    }

    #[test]
    fn test_merge_takes_max_and_unions() {
        let mut a = candidate("5812", 0.4, "keyword", "pizza");
        let b = candidate("5812", 0.7, "business_name", "restaurant");
        a.merge_from(&b);

        assert_eq!(a.confidence, 0.7);
        assert_eq!(a.match_type, MULTI_STRATEGY);
        assert_eq!(a.matched_on, vec!["pizza", "restaurant"]);
        assert_eq!(a.reasons, vec!["matched pizza", "matched restaurant"]);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let a = candidate("5812", 0.6, "keyword", "pizza");
        let once = merge_results(vec![a.clone(), a.clone()]);
        let twice = merge_results(vec![a.clone(), a.clone(), a.clone()]);

        assert_eq!(once.len(), 1);
        assert_eq!(once, twice);
        assert_eq!(once[0], a);
    }

    #[test]
    fn test_merge_confidence_is_commutative() {
        let a = candidate("5812", 0.3, "keyword", "pizza");
        let b = candidate("5812", 0.9, "keyword", "pasta");

        let ab = merge_results(vec![a.clone(), b.clone()]);
        let ba = merge_results(vec![b, a]);
        assert_eq!(ab[0].confidence, ba[0].confidence);
        // Order of evidence follows first-seen
        assert_eq!(ab[0].matched_on, vec!["pizza", "pasta"]);
        assert_eq!(ba[0].matched_on, vec!["pasta", "pizza"]);
    }

    #[test]
    fn test_merge_keys_by_code_and_type() {
        let sic = candidate("5812", 0.5, "keyword", "pizza");
        let mcc = ClassificationResult::new(code("5812", CodeType::Mcc), 0.5, "keyword", 1.0);
        let merged = merge_results(vec![sic, mcc]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_effective_weight_prefers_annotation() {
        let mut vote = StrategyVote::new("keyword", vec![], 0.8, 0.5);
        assert_eq!(vote.effective_weight(), 0.8);
        vote.metadata.adaptive_weight = Some(1.1);
        assert_eq!(vote.effective_weight(), 1.1);
        assert_eq!(vote.weight, 0.8);
    }

    #[test]
    fn test_group_by_type() {
        let results = vec![
            candidate("5812", 0.5, "keyword", "a"),
            ClassificationResult::new(code("5812", CodeType::Mcc), 0.5, "keyword", 1.0),
            candidate("1711", 0.5, "keyword", "b"),
        ];
        let groups = group_by_type(&results);
        assert_eq!(groups[&CodeType::Sic].len(), 2);
        assert_eq!(groups[&CodeType::Mcc].len(), 1);
    }
}
