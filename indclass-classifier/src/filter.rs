//! Confidence filter
//!
//! Scores every candidate and keeps those whose overall score clears the
//! effective threshold for its code type.
//!
//! # Effective threshold
//! 1. Start from the type-specific minimum (global minimum when the type
//!    has none): mcc 0.25, sic 0.35, naics 0.4, global 0.3
//! 2. Adaptive shift: `(0.5 - average quality) * quality_multiplier +
//!    (count - 10) * volume_multiplier`, clamped to `[min, max]`
//! 3. Quality tier: the score's level may demand a stricter bar
//! 4. Validation rules clamp the result into the allowed range
//!
//! Rejected candidates carry a "confidence X below threshold Y" reason.

use indclass_common::CodeType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::confidence::{ConfidenceLevel, ConfidenceScore, ConfidenceScorer, ScoringContext};
use crate::stats;
use crate::types::ClassificationResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub global_min_confidence: f64,
    pub sic_min_confidence: f64,
    pub naics_min_confidence: f64,
    pub mcc_min_confidence: f64,
    pub enable_adaptive_thresholds: bool,
    pub quality_adjustment_multiplier: f64,
    pub volume_adjustment_multiplier: f64,
    /// Lower clamp of adaptive thresholds
    pub adaptive_min: f64,
    /// Upper clamp of adaptive thresholds
    pub adaptive_max: f64,
    /// Tier bars by score level; 0.0 disables a tier
    pub high_tier_min: f64,
    pub medium_tier_min: f64,
    pub low_tier_min: f64,
    /// Final validation clamp of any threshold
    pub validation_min: f64,
    pub validation_max: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            global_min_confidence: 0.3,
            sic_min_confidence: 0.35,
            naics_min_confidence: 0.4,
            mcc_min_confidence: 0.25,
            enable_adaptive_thresholds: true,
            quality_adjustment_multiplier: 0.2,
            volume_adjustment_multiplier: 0.005,
            adaptive_min: 0.1,
            adaptive_max: 0.8,
            high_tier_min: 0.0,
            medium_tier_min: 0.3,
            low_tier_min: 0.45,
            validation_min: 0.05,
            validation_max: 0.95,
        }
    }
}

impl FilterConfig {
    pub fn type_min(&self, code_type: CodeType) -> f64 {
        match code_type {
            CodeType::Sic => self.sic_min_confidence,
            CodeType::Naics => self.naics_min_confidence,
            CodeType::Mcc => self.mcc_min_confidence,
        }
    }
}

/// Thresholds in force for one filtering pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectiveThresholds {
    pub global: f64,
    pub by_type: BTreeMap<CodeType, f64>,
    /// Adaptive shift applied to the base thresholds
    pub adjustment: f64,
}

impl EffectiveThresholds {
    pub fn for_type(&self, code_type: CodeType) -> f64 {
        self.by_type.get(&code_type).copied().unwrap_or(self.global)
    }
}

/// A candidate that cleared the filter with its score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredResult {
    pub result: ClassificationResult,
    pub score: ConfidenceScore,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedResult {
    pub result: ClassificationResult,
    pub score: ConfidenceScore,
    pub threshold: f64,
    pub reason: String,
}

/// Counts and ratios per quality tier of the accepted results
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityAnalysis {
    pub high_count: usize,
    pub medium_count: usize,
    pub low_count: usize,
    pub high_ratio: f64,
    pub medium_ratio: f64,
    pub low_ratio: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterStatistics {
    pub total: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub average_confidence_before: f64,
    pub average_confidence_after: f64,
    pub confidence_distribution: BTreeMap<ConfidenceLevel, usize>,
    pub type_distribution: BTreeMap<CodeType, usize>,
    pub quality_distribution: BTreeMap<String, usize>,
    pub quality_analysis: QualityAnalysis,
    /// Results scored with the fallback because scoring failed
    pub scoring_failures: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterOutcome {
    pub accepted: Vec<ScoredResult>,
    pub rejected: Vec<RejectedResult>,
    pub thresholds: EffectiveThresholds,
    pub statistics: FilterStatistics,
}

/// Quality tier of a score level
fn tier(level: ConfidenceLevel) -> &'static str {
    match level {
        ConfidenceLevel::VeryHigh | ConfidenceLevel::High => "high",
        ConfidenceLevel::Medium => "medium",
        _ => "low",
    }
}

pub struct ConfidenceFilter {
    config: FilterConfig,
    scorer: ConfidenceScorer,
}

impl ConfidenceFilter {
    pub fn new(config: FilterConfig, scorer: ConfidenceScorer) -> Self {
        Self { config, scorer }
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Score and filter candidates
    pub fn apply(&self, results: Vec<ClassificationResult>, ctx: &ScoringContext) -> FilterOutcome {
        let mut scoring_failures = 0;
        let scored: Vec<ScoredResult> = results
            .into_iter()
            .map(|result| {
                let score = match self.scorer.score(&result, ctx) {
                    Ok(score) => score,
                    Err(e) => {
                        warn!(code = %result.code.code, error = %e, "Scoring failed, using result confidence");
                        scoring_failures += 1;
                        ConfidenceScore::from_confidence(result.confidence)
                    }
                };
                ScoredResult { result, score }
            })
            .collect();

        let thresholds = self.effective_thresholds(&scored);

        let mut accepted = Vec::new();
        let mut rejected = Vec::new();
        for item in scored.iter().cloned() {
            let threshold = self.threshold_for(&item, &thresholds);
            if item.score.overall >= threshold {
                accepted.push(item);
            } else {
                let reason = format!(
                    "confidence {:.3} below threshold {:.3}",
                    item.score.overall, threshold
                );
                rejected.push(RejectedResult {
                    result: item.result,
                    score: item.score,
                    threshold,
                    reason,
                });
            }
        }

        let statistics = self.statistics(&scored, &accepted, scoring_failures);
        debug!(
            total = statistics.total,
            accepted = statistics.accepted,
            rejected = statistics.rejected,
            adjustment = thresholds.adjustment,
            "Confidence filter applied"
        );

        FilterOutcome {
            accepted,
            rejected,
            thresholds,
            statistics,
        }
    }

    /// Base thresholds shifted by result quality and volume
    pub fn effective_thresholds(&self, scored: &[ScoredResult]) -> EffectiveThresholds {
        let adjustment = if self.config.enable_adaptive_thresholds && !scored.is_empty() {
            let average_quality =
                stats::mean(&scored.iter().map(|s| s.score.overall).collect::<Vec<_>>());
            (0.5 - average_quality) * self.config.quality_adjustment_multiplier
                + (scored.len() as f64 - 10.0) * self.config.volume_adjustment_multiplier
        } else {
            0.0
        };

        let adapt = |base: f64| {
            if self.config.enable_adaptive_thresholds {
                (base + adjustment).clamp(self.config.adaptive_min, self.config.adaptive_max)
            } else {
                base
            }
        };

        EffectiveThresholds {
            global: adapt(self.config.global_min_confidence),
            by_type: CodeType::ALL
                .iter()
                .map(|&t| (t, adapt(self.config.type_min(t))))
                .collect(),
            adjustment,
        }
    }

    fn threshold_for(&self, item: &ScoredResult, thresholds: &EffectiveThresholds) -> f64 {
        let base = thresholds.for_type(item.result.code_type());
        let tier_min = match tier(item.score.level) {
            "high" => self.config.high_tier_min,
            "medium" => self.config.medium_tier_min,
            _ => self.config.low_tier_min,
        };
        base.max(tier_min)
            .clamp(self.config.validation_min, self.config.validation_max)
    }

    fn statistics(
        &self,
        scored: &[ScoredResult],
        accepted: &[ScoredResult],
        scoring_failures: usize,
    ) -> FilterStatistics {
        let before: Vec<f64> = scored.iter().map(|s| s.score.overall).collect();
        let after: Vec<f64> = accepted.iter().map(|s| s.score.overall).collect();

        let mut confidence_distribution = BTreeMap::new();
        let mut type_distribution = BTreeMap::new();
        let mut quality_distribution: BTreeMap<String, usize> = BTreeMap::new();
        for item in scored {
            *confidence_distribution.entry(item.score.level).or_insert(0) += 1;
            *type_distribution.entry(item.result.code_type()).or_insert(0) += 1;
            *quality_distribution
                .entry(tier(item.score.level).to_string())
                .or_insert(0) += 1;
        }

        let count_tier = |name: &str| accepted.iter().filter(|s| tier(s.score.level) == name).count();
        let (high, medium, low) = (count_tier("high"), count_tier("medium"), count_tier("low"));
        let ratio = |n: usize| {
            if accepted.is_empty() {
                0.0
            } else {
                n as f64 / accepted.len() as f64
            }
        };

        FilterStatistics {
            total: scored.len(),
            accepted: accepted.len(),
            rejected: scored.len() - accepted.len(),
            average_confidence_before: stats::mean(&before),
            average_confidence_after: stats::mean(&after),
            confidence_distribution,
            type_distribution,
            quality_distribution,
            quality_analysis: QualityAnalysis {
                high_count: high,
                medium_count: medium,
                low_count: low,
                high_ratio: ratio(high),
                medium_ratio: ratio(medium),
                low_ratio: ratio(low),
            },
            scoring_failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indclass_common::IndustryCode;

    fn result(code: &str, code_type: CodeType, confidence: f64) -> ClassificationResult {
        ClassificationResult::new(
            IndustryCode::new(format!("{}-{}", code_type.as_str(), code), code, code_type, "Test"),
            confidence,
            "keyword",
            1.0,
        )
    }

    fn static_filter() -> ConfidenceFilter {
        ConfidenceFilter::new(
            FilterConfig {
                enable_adaptive_thresholds: false,
                ..FilterConfig::default()
            },
            ConfidenceScorer::new(),
        )
    }

    #[test]
    fn test_adaptive_shift_raises_thresholds_for_weak_sets() {
        let filter = ConfidenceFilter::new(FilterConfig::default(), ConfidenceScorer::new());
        let scored: Vec<ScoredResult> = (0..10)
            .map(|i| ScoredResult {
                result: result(&format!("58{:02}", i), CodeType::Sic, 0.3),
                score: ConfidenceScore::from_confidence(0.3),
            })
            .collect();

        let thresholds = filter.effective_thresholds(&scored);
        // (0.5 - 0.3) * 0.2 + 0 volume
        assert!((thresholds.adjustment - 0.04).abs() < 1e-9);
        assert!((thresholds.for_type(CodeType::Sic) - 0.39).abs() < 1e-9);
        assert!((thresholds.global - 0.34).abs() < 1e-9);
    }

    #[test]
    fn test_adaptive_thresholds_clamped() {
        let filter = ConfidenceFilter::new(
            FilterConfig {
                volume_adjustment_multiplier: 1.0,
                ..FilterConfig::default()
            },
            ConfidenceScorer::new(),
        );
        let scored: Vec<ScoredResult> = (0..30)
            .map(|i| ScoredResult {
                result: result(&format!("{:04}", i), CodeType::Mcc, 0.5),
                score: ConfidenceScore::from_confidence(0.5),
            })
            .collect();
        let thresholds = filter.effective_thresholds(&scored);
        assert_eq!(thresholds.for_type(CodeType::Mcc), 0.8);
    }

    #[test]
    fn test_rejection_reason_and_type_thresholds() {
        let filter = static_filter();
        let ctx = ScoringContext::default();
        // Scored overall is 0.5 * conf + 0.5 * factors; pick extremes
        let outcome = filter.apply(
            vec![
                result("5812", CodeType::Sic, 1.0),
                result("9999", CodeType::Naics, 0.0),
            ],
            &ctx,
        );

        assert_eq!(outcome.accepted.len(), 1);
        assert_eq!(outcome.rejected.len(), 1);
        let rejected = &outcome.rejected[0];
        assert!(rejected.reason.starts_with("confidence "));
        assert!(rejected.reason.contains("below threshold"));
        assert!(rejected.score.overall < rejected.threshold);
        assert_eq!(outcome.statistics.total, 2);
        assert_eq!(outcome.statistics.type_distribution[&CodeType::Naics], 1);
    }

    #[test]
    fn test_low_tier_demands_stricter_bar() {
        let filter = static_filter();
        let item = ScoredResult {
            result: result("5812", CodeType::Mcc, 0.4),
            score: ConfidenceScore::from_confidence(0.4),
        };
        let thresholds = filter.effective_thresholds(&[item.clone()]);
        // mcc base 0.25, low tier 0.45
        assert_eq!(filter.threshold_for(&item, &thresholds), 0.45);
    }

    #[test]
    fn test_scoring_failure_falls_back() {
        let filter = static_filter();
        let mut bad = result("5812", CodeType::Sic, 0.9);
        bad.code.code = String::new();
        let outcome = filter.apply(vec![bad], &ScoringContext::default());
        assert_eq!(outcome.statistics.scoring_failures, 1);
        assert_eq!(outcome.accepted.len(), 1);
        assert_eq!(outcome.accepted[0].score.overall, 0.9);
    }

    #[test]
    fn test_empty_input() {
        let outcome = static_filter().apply(vec![], &ScoringContext::default());
        assert!(outcome.accepted.is_empty());
        assert_eq!(outcome.statistics.average_confidence_before, 0.0);
        assert_eq!(outcome.thresholds.by_type.len(), 3);
    }
}
