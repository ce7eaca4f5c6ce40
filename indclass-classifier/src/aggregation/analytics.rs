//! Analytics over aggregated results
//!
//! Statistics, coverage, quality, diversity, recommendation strength,
//! certainty and cross-type consistency. Every metric is defined for an
//! empty result set.

use indclass_common::CodeType;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::types::AggregatedResult;
use crate::stats;
use crate::text::clamp_unit;

/// Confidence below which a result is reported as an issue
const LOW_CONFIDENCE: f64 = 0.5;
/// Weights of the top results in the recommendation score
const RECOMMENDATION_WEIGHTS: [f64; 3] = [0.5, 0.3, 0.2];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceStatistics {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub mode: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub q1: f64,
    pub q3: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageAnalytics {
    pub types_present: Vec<CodeType>,
    /// Fraction of all code types present
    pub type_coverage: f64,
    /// Distinct categories, lowercase
    pub industries: Vec<String>,
    pub industry_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityAnalytics {
    pub average_confidence_by_type: BTreeMap<CodeType, f64>,
    pub low_confidence_issues: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiversityAnalytics {
    /// Distinct types over all code types
    pub type_diversity: f64,
    /// Distinct categories over result count
    pub category_diversity: f64,
    /// Normalized entropy of the category distribution
    pub industry_entropy: f64,
    /// Σ share² over categories; 1.0 is fully concentrated
    pub herfindahl_index: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyAnalytics {
    /// Fraction of expected types present
    pub expected_type_ratio: f64,
    /// Pairs of types whose top results disagree on category
    pub type_conflicts: Vec<String>,
    pub consistency_score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Analytics {
    pub statistics: ConfidenceStatistics,
    pub coverage: CoverageAnalytics,
    pub quality: QualityAnalytics,
    pub diversity: DiversityAnalytics,
    /// Weighted aggregation score of the top results
    pub recommendation_score: f64,
    /// Top confidence blended with its lead over the runner-up
    pub certainty_score: f64,
    pub consistency: ConsistencyAnalytics,
}

pub fn compute_analytics(results: &[AggregatedResult], expected_types: &[CodeType]) -> Analytics {
    let expected: Vec<CodeType> = if expected_types.is_empty() {
        CodeType::ALL.to_vec()
    } else {
        expected_types.to_vec()
    };

    Analytics {
        statistics: statistics(results),
        coverage: coverage(results),
        quality: quality(results, &expected),
        diversity: diversity(results),
        recommendation_score: recommendation_score(results),
        certainty_score: certainty_score(results),
        consistency: consistency(results, &expected),
    }
}

fn confidences(results: &[AggregatedResult]) -> Vec<f64> {
    results.iter().map(|r| r.result.confidence).collect()
}

fn category_counts(results: &[AggregatedResult]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for r in results {
        *counts
            .entry(r.result.code.category.to_lowercase())
            .or_insert(0) += 1;
    }
    counts
}

fn types_present(results: &[AggregatedResult]) -> BTreeSet<CodeType> {
    results.iter().map(|r| r.result.code_type()).collect()
}

pub fn statistics(results: &[AggregatedResult]) -> ConfidenceStatistics {
    let values = confidences(results);
    if values.is_empty() {
        return ConfidenceStatistics::default();
    }
    let sorted = stats::sorted(&values);

    ConfidenceStatistics {
        count: values.len(),
        mean: stats::mean(&values),
        median: stats::median(&values),
        mode: stats::mode(&values),
        std_dev: stats::std_dev(&values),
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        q1: stats::quantile(&values, 0.25),
        q3: stats::quantile(&values, 0.75),
    }
}

fn coverage(results: &[AggregatedResult]) -> CoverageAnalytics {
    let types = types_present(results);
    let industries: Vec<String> = category_counts(results)
        .into_keys()
        .filter(|c| !c.is_empty())
        .collect();

    CoverageAnalytics {
        type_coverage: types.len() as f64 / CodeType::ALL.len() as f64,
        types_present: types.into_iter().collect(),
        industry_count: industries.len(),
        industries,
    }
}

fn quality(results: &[AggregatedResult], expected: &[CodeType]) -> QualityAnalytics {
    let mut by_type: BTreeMap<CodeType, Vec<f64>> = BTreeMap::new();
    for r in results {
        by_type
            .entry(r.result.code_type())
            .or_default()
            .push(r.result.confidence);
    }
    let average_confidence_by_type = by_type
        .iter()
        .map(|(t, values)| (*t, stats::mean(values)))
        .collect();

    let low_confidence_issues: Vec<String> = results
        .iter()
        .filter(|r| r.result.confidence < LOW_CONFIDENCE)
        .map(|r| {
            format!(
                "{} {} has low confidence {:.2}",
                r.result.code_type().label(),
                r.result.code.code,
                r.result.confidence
            )
        })
        .collect();

    let present = types_present(results);
    let mut recommendations: Vec<String> = expected
        .iter()
        .filter(|t| !present.contains(t))
        .map(|t| {
            format!(
                "No {} classification found; add a description or keywords",
                t.label()
            )
        })
        .collect();
    if !low_confidence_issues.is_empty() {
        recommendations.push("Review low-confidence results before use".to_string());
    }
    if !results.is_empty() && certainty_score(results) < 0.5 {
        recommendations.push("Results are ambiguous; provide more business detail".to_string());
    }

    QualityAnalytics {
        average_confidence_by_type,
        low_confidence_issues,
        recommendations,
    }
}

fn diversity(results: &[AggregatedResult]) -> DiversityAnalytics {
    if results.is_empty() {
        return DiversityAnalytics::default();
    }
    let counts: Vec<usize> = category_counts(results).into_values().collect();
    let total = results.len() as f64;
    let herfindahl_index = counts
        .iter()
        .map(|&c| (c as f64 / total).powi(2))
        .sum();

    DiversityAnalytics {
        type_diversity: types_present(results).len() as f64 / CodeType::ALL.len() as f64,
        category_diversity: counts.len() as f64 / total,
        industry_entropy: stats::normalized_entropy(&counts),
        herfindahl_index,
    }
}

/// Weighted top-N aggregation score, normalized by the weights in use
pub fn recommendation_score(results: &[AggregatedResult]) -> f64 {
    let mut scores: Vec<f64> = results.iter().map(|r| r.aggregation_score).collect();
    scores.sort_by(|a, b| stats::desc(*a, *b));

    let (weighted, used) = scores
        .iter()
        .zip(RECOMMENDATION_WEIGHTS)
        .fold((0.0, 0.0), |(sum, w_sum), (s, w)| (sum + s * w, w_sum + w));
    if used > 0.0 {
        clamp_unit(weighted / used)
    } else {
        0.0
    }
}

/// `0.7 * top + 0.3 * (top - runner-up)`
pub fn certainty_score(results: &[AggregatedResult]) -> f64 {
    let sorted = stats::sorted(&confidences(results));
    let Some(&top) = sorted.last() else {
        return 0.0;
    };
    let gap = if sorted.len() > 1 {
        top - sorted[sorted.len() - 2]
    } else {
        top
    };
    clamp_unit(0.7 * top + 0.3 * gap)
}

fn consistency(results: &[AggregatedResult], expected: &[CodeType]) -> ConsistencyAnalytics {
    let present = types_present(results);
    let expected_type_ratio = if expected.is_empty() {
        0.0
    } else {
        expected.iter().filter(|t| present.contains(t)).count() as f64 / expected.len() as f64
    };

    // Category of the best result per type
    let mut top_category: BTreeMap<CodeType, String> = BTreeMap::new();
    for r in results {
        top_category
            .entry(r.result.code_type())
            .or_insert_with(|| r.result.code.category.to_lowercase());
    }

    let entries: Vec<(&CodeType, &String)> = top_category.iter().collect();
    let mut pairs = 0;
    let mut type_conflicts = Vec::new();
    for (i, (a_type, a_cat)) in entries.iter().enumerate() {
        for (b_type, b_cat) in entries.iter().skip(i + 1) {
            pairs += 1;
            if a_cat != b_cat {
                type_conflicts.push(format!(
                    "{} vs {}: '{}' vs '{}'",
                    a_type.label(),
                    b_type.label(),
                    a_cat,
                    b_cat
                ));
            }
        }
    }

    let conflict_ratio = if pairs > 0 {
        type_conflicts.len() as f64 / pairs as f64
    } else {
        0.0
    };

    ConsistencyAnalytics {
        expected_type_ratio,
        consistency_score: clamp_unit(expected_type_ratio * (1.0 - 0.5 * conflict_ratio)),
        type_conflicts,
    }
}
