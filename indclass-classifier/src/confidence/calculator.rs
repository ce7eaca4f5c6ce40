//! Strategy-level and code-level confidence
//!
//! # Strategy confidence
//! - Base: mean candidate confidence + `min(1, n/10) * 0.1`
//! - Consistency bonus: up to 0.1 for low spread, 0.0 for one or no results
//! - Diversity penalty: <4 results 0.05, 4-9 none, 10-19 0.1, 20+ 0.2
//! - Final: `clamp(base + consistency - diversity)`
//!
//! # Adaptive weights
//! `weight * (0.5 + performance) * (0.9 + 0.2 * consistency) *
//! (0.9 + 0.2 * recent)`, clamped to [0.1, 1.5]. Strategies without
//! history keep their prior weight.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::level::ConfidenceLevel;
use super::performance::{AdaptiveConfig, PerformanceTracker};
use crate::stats;
use crate::text::clamp_unit;
use crate::types::{ClassificationResult, StrategyVote, WeightingFactors};
use crate::voting::{aggregate_by_code, CodeVoteAggregation};

/// Match type of enhanced consensus results
pub const ENHANCED_MATCH_TYPE: &str = "enhanced_weighted_average";
/// Matched-on marker appended by enhanced consensus
pub const ENHANCED_MARKER: &str = "enhanced_consensus";

/// Spread at which the consistency bonus reaches zero
const CONSISTENCY_SPREAD: f64 = 0.25;
const MAX_CONSISTENCY_BONUS: f64 = 0.1;
/// Variance below which results count as highly consistent
const HIGH_CONSISTENCY_VARIANCE: f64 = 0.01;

/// Strategy confidence with its components
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfidence {
    pub strategy_name: String,
    pub confidence: f64,
    pub level: ConfidenceLevel,
    pub result_count: usize,
    pub base_confidence: f64,
    pub consistency_bonus: f64,
    pub diversity_penalty: f64,
    pub variance: f64,
    /// "high_consistency", "optimal_result_count"
    pub quality_indicators: Vec<String>,
}

/// Bonus for a tight spread of confidences
pub fn consistency_bonus(confidences: &[f64]) -> f64 {
    if confidences.len() <= 1 {
        return 0.0;
    }
    let spread = stats::std_dev(confidences);
    MAX_CONSISTENCY_BONUS * (1.0 - spread / CONSISTENCY_SPREAD).max(0.0)
}

/// Penalty for too few or too many candidates
pub fn diversity_penalty(count: usize) -> f64 {
    match count {
        0..=3 => 0.05,
        4..=9 => 0.0,
        10..=19 => 0.1,
        _ => 0.2,
    }
}

fn is_optimal_count(count: usize) -> bool {
    (4..=9).contains(&count)
}

#[derive(Debug, Clone, Default)]
pub struct ConfidenceCalculator {
    adaptive: AdaptiveConfig,
}

impl ConfidenceCalculator {
    pub fn new(adaptive: AdaptiveConfig) -> Self {
        Self { adaptive }
    }

    pub fn adaptive_config(&self) -> &AdaptiveConfig {
        &self.adaptive
    }

    /// Aggregate confidence of one strategy's candidates
    pub fn calculate_strategy_confidence(
        &self,
        strategy_name: &str,
        results: &[ClassificationResult],
    ) -> StrategyConfidence {
        if results.is_empty() {
            return StrategyConfidence {
                strategy_name: strategy_name.to_string(),
                confidence: 0.0,
                level: ConfidenceLevel::None,
                result_count: 0,
                base_confidence: 0.0,
                consistency_bonus: 0.0,
                diversity_penalty: 0.0,
                variance: 0.0,
                quality_indicators: Vec::new(),
            };
        }

        let confidences: Vec<f64> = results.iter().map(|r| r.confidence).collect();
        let n = confidences.len();

        let count_bonus = (n as f64 / 10.0).min(1.0) * 0.1;
        let base = stats::mean(&confidences) + count_bonus;
        let consistency = consistency_bonus(&confidences);
        let diversity = diversity_penalty(n);
        let variance = stats::variance(&confidences);
        let confidence = clamp_unit(base + consistency - diversity);

        let mut quality_indicators = Vec::new();
        if n > 1 && variance < HIGH_CONSISTENCY_VARIANCE {
            quality_indicators.push("high_consistency".to_string());
        }
        if is_optimal_count(n) {
            quality_indicators.push("optimal_result_count".to_string());
        }

        debug!(
            strategy = strategy_name,
            results = n,
            base,
            consistency,
            diversity,
            confidence,
            "Strategy confidence calculated"
        );

        StrategyConfidence {
            strategy_name: strategy_name.to_string(),
            confidence,
            level: ConfidenceLevel::from_score(confidence),
            result_count: n,
            base_confidence: base,
            consistency_bonus: consistency,
            diversity_penalty: diversity,
            variance,
            quality_indicators,
        }
    }

    /// Annotate votes with adaptive weights derived from past performance
    ///
    /// The prior `weight` is never changed; the adjusted value is written to
    /// `metadata.adaptive_weight` together with its factors.
    pub fn calculate_adaptive_weights(
        &self,
        votes: Vec<StrategyVote>,
        tracker: &PerformanceTracker,
    ) -> Vec<StrategyVote> {
        if !self.adaptive.enabled {
            return votes;
        }

        votes
            .into_iter()
            .map(|mut vote| {
                let Some(perf) = tracker.performance(&vote.strategy_name) else {
                    return vote;
                };

                let performance_multiplier = 0.5 + perf.performance_score;
                let consistency_factor = 0.9 + 0.2 * perf.consistency;
                let recency_factor = 0.9 + 0.2 * perf.recent_average;
                let adjusted = (vote.weight
                    * performance_multiplier
                    * consistency_factor
                    * recency_factor)
                    .clamp(self.adaptive.min_weight, self.adaptive.max_weight);

                debug!(
                    strategy = %vote.strategy_name,
                    original = vote.weight,
                    adjusted,
                    samples = perf.samples,
                    "Adaptive weight applied"
                );

                vote.metadata.adaptive_weight = Some(adjusted);
                vote.metadata.weighting_factors = Some(WeightingFactors {
                    performance_multiplier,
                    consistency_factor,
                    recency_factor,
                    original_weight: vote.weight,
                    adjusted_weight: adjusted,
                });
                vote
            })
            .collect()
    }

    /// Per-code weighted consensus with a vote-count bonus and a variance
    /// penalty, sorted by the enhanced confidence
    pub fn enhanced_weighted_average(&self, votes: &[StrategyVote]) -> Vec<ClassificationResult> {
        self.enhanced_from_aggregations(aggregate_by_code(votes))
    }

    /// Enhanced consensus over already grouped (and possibly filtered) votes
    pub fn enhanced_from_aggregations(
        &self,
        aggregations: Vec<CodeVoteAggregation>,
    ) -> Vec<ClassificationResult> {
        let mut results: Vec<ClassificationResult> = aggregations
            .into_iter()
            .filter(|agg| agg.total_votes > 0)
            .map(|agg| {
                let base = agg.weighted_average();
                let enhanced = enhanced_confidence(base, agg.total_votes, agg.confidence_variance);

                let mut result = agg.merged;
                result.set_confidence(enhanced);
                result.match_type = ENHANCED_MATCH_TYPE.to_string();
                result.add_matched_on(ENHANCED_MARKER);
                result.add_reason(format!(
                    "enhanced aggregation across {} strategies",
                    agg.total_votes
                ));
                result
            })
            .collect();

        results.sort_by(|a, b| {
            stats::desc(a.confidence, b.confidence).then_with(|| a.key().cmp(&b.key()))
        });
        results
    }
}

/// Boost for agreement among several votes, reduced by their disagreement
pub fn enhanced_confidence(weighted_average: f64, votes: usize, variance: f64) -> f64 {
    let consensus_bonus = if votes > 1 {
        let agreement = 1.0 - (variance / 0.05).min(1.0);
        (0.05 * (votes - 1) as f64).min(0.1) * agreement
    } else {
        0.0
    };
    let variance_penalty = (variance * 2.0).min(0.1);
    clamp_unit(weighted_average + consensus_bonus - variance_penalty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indclass_common::{CodeType, IndustryCode};

    fn result(code: &str, confidence: f64) -> ClassificationResult {
        ClassificationResult::new(
            IndustryCode::new(format!("sic-{}", code), code, CodeType::Sic, "Test"),
            confidence,
            "keyword",
            1.0,
        )
    }

    #[test]
    fn test_empty_results_have_no_level() {
        let calc = ConfidenceCalculator::default();
        let conf = calc.calculate_strategy_confidence("keyword", &[]);
        assert_eq!(conf.confidence, 0.0);
        assert_eq!(conf.level, ConfidenceLevel::None);
    }

    #[test]
    fn test_diversity_penalty_table() {
        assert_eq!(diversity_penalty(1), 0.05);
        assert_eq!(diversity_penalty(5), 0.0);
        assert_eq!(diversity_penalty(15), 0.1);
        assert_eq!(diversity_penalty(25), 0.2);
    }

    #[test]
    fn test_consistency_bonus() {
        assert_eq!(consistency_bonus(&[0.8]), 0.0);
        assert!((consistency_bonus(&[0.7, 0.7, 0.7]) - 0.1).abs() < 1e-12);
        assert_eq!(consistency_bonus(&[0.0, 1.0]), 0.0);
    }

    #[test]
    fn test_strategy_confidence_components() {
        let calc = ConfidenceCalculator::default();
        let results: Vec<_> = (0..5).map(|i| result(&format!("58{}", i), 0.7)).collect();
        let conf = calc.calculate_strategy_confidence("keyword", &results);

        // 0.7 + 0.05 count bonus + 0.1 consistency - 0.0 diversity
        assert!((conf.confidence - 0.85).abs() < 1e-9);
        assert_eq!(conf.level, ConfidenceLevel::High);
        assert_eq!(
            conf.quality_indicators,
            vec!["high_consistency", "optimal_result_count"]
        );
    }

    #[test]
    fn test_adaptive_weights_without_history_unchanged() {
        let calc = ConfidenceCalculator::default();
        let tracker = PerformanceTracker::default();
        let votes = vec![StrategyVote::new("keyword", vec![], 0.9, 0.5)];
        let adjusted = calc.calculate_adaptive_weights(votes, &tracker);
        assert_eq!(adjusted[0].effective_weight(), 0.9);
        assert!(adjusted[0].metadata.weighting_factors.is_none());
    }

    #[test]
    fn test_adaptive_weights_follow_performance() {
        let calc = ConfidenceCalculator::default();
        let mut tracker = PerformanceTracker::default();
        for _ in 0..10 {
            tracker.record("keyword", 0.9);
            tracker.record("description", 0.1);
        }
        let votes = vec![
            StrategyVote::new("keyword", vec![], 0.8, 0.5),
            StrategyVote::new("description", vec![], 0.8, 0.5),
        ];
        let adjusted = calc.calculate_adaptive_weights(votes, &tracker);

        let strong = adjusted[0].effective_weight();
        let weak = adjusted[1].effective_weight();
        assert!(strong > 0.8 && strong <= 1.5);
        assert!(weak < 0.8 && weak >= 0.1);
        assert_eq!(adjusted[0].weight, 0.8);
    }

    #[test]
    fn test_adaptive_weights_disabled_pass_through() {
        let calc = ConfidenceCalculator::new(AdaptiveConfig {
            enabled: false,
            ..AdaptiveConfig::default()
        });
        let mut tracker = PerformanceTracker::default();
        tracker.record("keyword", 1.0);
        let votes = vec![StrategyVote::new("keyword", vec![], 0.8, 0.5)];
        let adjusted = calc.calculate_adaptive_weights(votes, &tracker);
        assert!(adjusted[0].metadata.adaptive_weight.is_none());
    }

    #[test]
    fn test_enhanced_weighted_average_rewards_agreement() {
        let calc = ConfidenceCalculator::default();
        let votes = vec![
            StrategyVote::new("keyword", vec![result("5812", 0.6), result("1711", 0.62)], 1.0, 0.6),
            StrategyVote::new("business_name", vec![result("5812", 0.6)], 1.0, 0.6),
        ];
        let results = calc.enhanced_weighted_average(&votes);

        assert_eq!(results[0].code.code, "5812");
        assert!((results[0].confidence - 0.65).abs() < 1e-9);
        assert_eq!(results[0].match_type, ENHANCED_MATCH_TYPE);
        assert!(results[0].matched_on.contains(&ENHANCED_MARKER.to_string()));
        assert!((results[1].confidence - 0.62).abs() < 1e-9);
    }
}
