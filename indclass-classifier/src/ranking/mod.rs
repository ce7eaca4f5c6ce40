//! Ranking engine
//!
//! Orders filtered candidates by multi-factor scores and selects the best
//! per code type.
//!
//! # Factors
//! - **Confidence**: overall [`ConfidenceScore`]
//! - **Relevance**: 0.5 + match-type bonus (exact 0.4, keyword 0.3,
//!   description 0.2, fuzzy 0.1) + log-scaled matched-term bonus + reason bonus
//! - **Quality**: 0.25 text + 0.25 keyword + 0.20 code quality + 0.15 usage
//!   + 0.15 validation
//! - **Frequency**: usage frequency + type bonus (NAICS 0.1, SIC 0.05, MCC 0.15)
//!
//! # Strategies
//! - `confidence`: sort by confidence factor only
//! - `composite`: weighted factor sum + diversity bonus - penalty
//! - `weighted`: composite with `custom_weights`
//! - `topsis`: closeness to the ideal over the four factors
//!
//! Scores within `tie_epsilon` fall back to the tie breaker
//! (`0.4 conf + 0.3 quality + 0.2 frequency + 0.1 relevance`). Any order
//! left among exact ties is by code key.

pub mod topsis;

use indclass_common::CodeType;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use crate::confidence::{ConfidenceScore, ValidationStatus};
use crate::filter::ScoredResult;
use crate::stats;
use crate::text::clamp_unit;
use crate::types::ClassificationResult;

pub use topsis::topsis_scores;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingStrategy {
    Confidence,
    Composite,
    Weighted,
    Topsis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingWeights {
    pub confidence: f64,
    pub relevance: f64,
    pub quality: f64,
    pub frequency: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            confidence: 0.4,
            relevance: 0.25,
            quality: 0.2,
            frequency: 0.15,
        }
    }
}

impl RankingWeights {
    fn as_vec(&self) -> Vec<f64> {
        vec![self.confidence, self.relevance, self.quality, self.frequency]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub strategy: RankingStrategy,
    pub weights: RankingWeights,
    /// Weights used by the `weighted` strategy
    pub custom_weights: Option<RankingWeights>,
    pub max_results_per_type: usize,
    pub enable_diversification: bool,
    pub diversity_bonus: f64,
    pub tie_epsilon: f64,
    pub warning_penalty: f64,
    pub invalid_penalty: f64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            strategy: RankingStrategy::Composite,
            weights: RankingWeights::default(),
            custom_weights: None,
            max_results_per_type: 3,
            enable_diversification: true,
            diversity_bonus: 0.05,
            tie_epsilon: 0.001,
            warning_penalty: 0.05,
            invalid_penalty: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingFactors {
    pub confidence: f64,
    pub relevance: f64,
    pub quality: f64,
    pub frequency: f64,
    pub diversity_bonus: f64,
    pub penalty: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingResult {
    pub result: ClassificationResult,
    pub confidence_score: ConfidenceScore,
    pub ranking_score: f64,
    /// 1-based overall rank
    pub rank: usize,
    /// 1-based rank within the code type
    pub type_rank: usize,
    pub factors: RankingFactors,
    pub tie_breaker: f64,
    pub selection_reason: String,
    pub quality_indicators: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankingMetrics {
    pub total_ranked: usize,
    pub average_confidence: f64,
    /// max - min confidence factor
    pub confidence_range: f64,
    pub confidence_std_dev: f64,
    /// Fraction of code types represented
    pub type_coverage: f64,
    /// Normalized category entropy
    pub category_diversity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingOutcome {
    /// All selected results in overall rank order
    pub results: Vec<RankingResult>,
    pub by_type: BTreeMap<CodeType, Vec<RankingResult>>,
    pub metrics: RankingMetrics,
}

/// Relevance from match type and evidence volume
pub fn relevance_factor(result: &ClassificationResult) -> f64 {
    let match_type = result.match_type.as_str();
    let match_bonus = if match_type.contains("exact") {
        0.4
    } else if match_type.contains("keyword") {
        0.3
    } else if match_type.contains("description") {
        0.2
    } else if match_type.contains("fuzzy") {
        0.1
    } else {
        0.0
    };
    let term_bonus = 0.05 * (1.0 + result.matched_on.len() as f64).ln();
    let reason_bonus = 0.02 * result.reasons.len() as f64;
    clamp_unit(0.5 + match_bonus + term_bonus + reason_bonus)
}

pub fn quality_factor(score: &ConfidenceScore) -> f64 {
    let f = &score.factors;
    clamp_unit(
        f.text_match * 0.25
            + f.keyword_match * 0.25
            + f.code_quality * 0.20
            + f.usage_frequency * 0.15
            + f.validation * 0.15,
    )
}

pub fn frequency_factor(score: &ConfidenceScore, code_type: CodeType) -> f64 {
    let type_bonus = match code_type {
        CodeType::Naics => 0.1,
        CodeType::Sic => 0.05,
        CodeType::Mcc => 0.15,
    };
    clamp_unit(score.factors.usage_frequency + type_bonus)
}

pub struct RankingEngine {
    config: RankingConfig,
}

impl RankingEngine {
    pub fn new(config: RankingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    fn active_weights(&self) -> &RankingWeights {
        match (self.config.strategy, &self.config.custom_weights) {
            (RankingStrategy::Weighted, Some(custom)) => custom,
            _ => &self.config.weights,
        }
    }

    fn penalty(&self, status: ValidationStatus) -> f64 {
        match status {
            ValidationStatus::Valid => 0.0,
            ValidationStatus::Warning => self.config.warning_penalty,
            ValidationStatus::Invalid => self.config.invalid_penalty,
        }
    }

    fn composite(&self, factors: &RankingFactors) -> f64 {
        let w = self.active_weights();
        clamp_unit(
            factors.confidence * w.confidence
                + factors.relevance * w.relevance
                + factors.quality * w.quality
                + factors.frequency * w.frequency
                + factors.diversity_bonus
                - factors.penalty,
        )
    }

    fn build(&self, scored: ScoredResult) -> RankingResult {
        let ScoredResult { result, score } = scored;
        let factors = RankingFactors {
            confidence: score.overall,
            relevance: relevance_factor(&result),
            quality: quality_factor(&score),
            frequency: frequency_factor(&score, result.code_type()),
            diversity_bonus: 0.0,
            penalty: self.penalty(score.validation_status),
        };
        let tie_breaker = factors.confidence * 0.4
            + factors.quality * 0.3
            + factors.frequency * 0.2
            + factors.relevance * 0.1;

        RankingResult {
            ranking_score: 0.0,
            result,
            confidence_score: score,
            rank: 0,
            type_rank: 0,
            factors,
            tie_breaker,
            selection_reason: String::new(),
            quality_indicators: Vec::new(),
        }
    }

    fn rescore(&self, ranked: &mut RankingResult) {
        ranked.ranking_score = match self.config.strategy {
            RankingStrategy::Confidence => ranked.factors.confidence,
            RankingStrategy::Composite | RankingStrategy::Weighted => self.composite(&ranked.factors),
            // Closeness is assigned for the whole set in `rank`
            RankingStrategy::Topsis => ranked.ranking_score,
        };
    }

    fn compare(&self, a: &RankingResult, b: &RankingResult) -> Ordering {
        let by_key = || a.result.key().cmp(&b.result.key());
        if self.config.strategy == RankingStrategy::Confidence {
            return stats::desc(a.factors.confidence, b.factors.confidence).then_with(by_key);
        }
        stats::desc(a.ranking_score, b.ranking_score).then_with(by_key)
    }

    fn sort(&self, results: &mut [RankingResult]) {
        results.sort_by(|a, b| self.compare(a, b));
        if self.config.strategy == RankingStrategy::Confidence {
            return;
        }
        stats::settle_near_ties(
            results,
            self.config.tie_epsilon,
            |r| r.ranking_score,
            |a, b| {
                stats::desc(a.tie_breaker, b.tie_breaker)
                    .then_with(|| stats::desc(a.factors.confidence, b.factors.confidence))
                    .then_with(|| a.result.key().cmp(&b.result.key()))
            },
        );
    }

    /// Rank scored candidates and select the best per code type
    pub fn rank(&self, scored: Vec<ScoredResult>) -> RankingOutcome {
        let mut ranked: Vec<RankingResult> = scored.into_iter().map(|s| self.build(s)).collect();

        if self.config.strategy == RankingStrategy::Topsis {
            let rows: Vec<Vec<f64>> = ranked
                .iter()
                .map(|r| {
                    vec![
                        r.factors.confidence,
                        r.factors.relevance,
                        r.factors.quality,
                        r.factors.frequency,
                    ]
                })
                .collect();
            let closeness = topsis_scores(&rows, &self.config.weights.as_vec());
            for (r, c) in ranked.iter_mut().zip(closeness) {
                r.ranking_score = clamp_unit(c - r.factors.penalty);
            }
        } else {
            for r in ranked.iter_mut() {
                self.rescore(r);
            }
        }

        let mut by_type: BTreeMap<CodeType, Vec<RankingResult>> = BTreeMap::new();
        for r in ranked {
            by_type.entry(r.result.code_type()).or_default().push(r);
        }

        for (code_type, group) in by_type.iter_mut() {
            self.sort(group);
            if self.config.enable_diversification {
                self.diversify(group);
                self.sort(group);
            }
            group.truncate(self.config.max_results_per_type);
            for (i, r) in group.iter_mut().enumerate() {
                r.type_rank = i + 1;
                r.selection_reason = if i == 0 {
                    format!("top {} match by {:?} ranking", code_type.label(), self.config.strategy)
                } else {
                    format!("ranked {} among {} candidates", i + 1, code_type.label())
                };
                r.quality_indicators = quality_indicators(r);
            }
        }

        let mut results: Vec<RankingResult> = by_type.values().flatten().cloned().collect();
        self.sort(&mut results);
        for (i, r) in results.iter_mut().enumerate() {
            r.rank = i + 1;
        }
        // Keep per-type copies consistent with the overall ranks
        for group in by_type.values_mut() {
            for r in group.iter_mut() {
                if let Some(overall) = results.iter().find(|o| o.result.key() == r.result.key()) {
                    r.rank = overall.rank;
                }
            }
        }

        let metrics = self.metrics(&results);
        debug!(
            strategy = ?self.config.strategy,
            ranked = metrics.total_ranked,
            average_confidence = metrics.average_confidence,
            "Ranking complete"
        );

        RankingOutcome {
            results,
            by_type,
            metrics,
        }
    }

    /// One-time bonus for the best-ranked result of each category
    fn diversify(&self, group: &mut [RankingResult]) {
        let mut seen: HashSet<String> = HashSet::new();
        for r in group.iter_mut() {
            let category = r.result.code.category.to_lowercase();
            if seen.insert(category) {
                r.factors.diversity_bonus = self.config.diversity_bonus;
                r.ranking_score = match self.config.strategy {
                    RankingStrategy::Composite | RankingStrategy::Weighted => {
                        self.composite(&r.factors)
                    }
                    _ => clamp_unit(r.ranking_score + self.config.diversity_bonus),
                };
            }
        }
    }

    fn metrics(&self, results: &[RankingResult]) -> RankingMetrics {
        let confidences: Vec<f64> = results.iter().map(|r| r.factors.confidence).collect();
        let types: HashSet<CodeType> = results.iter().map(|r| r.result.code_type()).collect();

        let mut categories: BTreeMap<String, usize> = BTreeMap::new();
        for r in results {
            *categories
                .entry(r.result.code.category.to_lowercase())
                .or_insert(0) += 1;
        }
        let counts: Vec<usize> = categories.values().copied().collect();

        let (min, max) = confidences
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &c| (lo.min(c), hi.max(c)));

        RankingMetrics {
            total_ranked: results.len(),
            average_confidence: stats::mean(&confidences),
            confidence_range: if results.is_empty() { 0.0 } else { max - min },
            confidence_std_dev: stats::std_dev(&confidences),
            type_coverage: types.len() as f64 / CodeType::ALL.len() as f64,
            category_diversity: stats::normalized_entropy(&counts),
        }
    }
}

fn quality_indicators(r: &RankingResult) -> Vec<String> {
    let mut indicators = Vec::new();
    if r.factors.confidence >= 0.8 {
        indicators.push("high_confidence".to_string());
    }
    if r.factors.relevance >= 0.8 {
        indicators.push("strong_relevance".to_string());
    }
    match r.confidence_score.validation_status {
        ValidationStatus::Valid => indicators.push("validated".to_string()),
        ValidationStatus::Warning => indicators.push("validation_warning".to_string()),
        ValidationStatus::Invalid => indicators.push("invalid_format".to_string()),
    }
    if r.factors.diversity_bonus > 0.0 {
        indicators.push("category_leader".to_string());
    }
    indicators
}
