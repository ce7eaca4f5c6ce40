//! Result aggregation
//!
//! Turns an ordered list of classification results into presentation-ready
//! output.
//!
//! # Pipeline
//! 1. Deduplicate by `(code, code_type)` (max confidence, union of evidence)
//! 2. Score each result: `(0.6 conf + match-type bonus + 0.05 per extra
//!    evidence) * (1 + 0.1 weight)`, clamped to 1.0. Bonuses: multi-strategy
//!    0.25, exact 0.2, keyword 0.15, fuzzy 0.1
//! 3. Drop results under the minimum confidence or without evidence
//! 4. Sort by the requested [`SortCriterion`]
//! 5. Cap per code type and assign ranks
//! 6. Optional analytics
//! 7. Render one [`Presentation`]
//!
//! Confidence levels here use the presentation scale
//! ([`ConfidenceLevel::from_presentation_score`]).

pub mod analytics;
pub mod presentation;
pub mod types;

use indclass_common::{CodeType, RequestContext};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::debug;

use crate::confidence::calculator::ENHANCED_MATCH_TYPE;
use crate::confidence::ConfidenceLevel;
use crate::stats;
use crate::text::clamp_unit;
use crate::types::{merge_results, ClassificationResult, MULTI_STRATEGY};

pub use analytics::{compute_analytics, Analytics};
pub use presentation::Presentation;
pub use types::{
    AggregatedResult, AggregatedResults, AggregationConfig, AggregationError,
    AggregationRequest, MatchStrength, PresentationFormat, RelatedCode, SortCriterion, UiHints,
};

/// Bonus for results backed by more than one strategy
fn match_type_bonus(match_type: &str) -> f64 {
    if match_type == MULTI_STRATEGY || match_type == ENHANCED_MATCH_TYPE || match_type.contains('+')
    {
        0.25
    } else {
        match match_type {
            "exact" => 0.2,
            "keyword" => 0.15,
            "fuzzy" => 0.1,
            _ => 0.0,
        }
    }
}

fn is_composite(match_type: &str) -> bool {
    match_type_bonus(match_type) >= 0.25
}

/// Evidence beyond the first reason and the first matched term
fn extra_evidence(result: &ClassificationResult) -> usize {
    result.reasons.len().saturating_sub(1) + result.matched_on.len().saturating_sub(1)
}

pub fn aggregation_score(result: &ClassificationResult) -> f64 {
    let base = result.confidence * 0.6
        + match_type_bonus(&result.match_type)
        + 0.05 * extra_evidence(result) as f64;
    clamp_unit(base * (1.0 + result.weight * 0.1))
}

/// Confidence boosted by match type and evidence volume
pub fn match_strength(result: &ClassificationResult) -> MatchStrength {
    let mut score = result.confidence;
    if result.match_type == "exact" {
        score += 0.1;
    } else if is_composite(&result.match_type) {
        score += 0.05;
    }
    score += (0.02 * result.evidence_count() as f64).min(0.1);
    MatchStrength::from_score(score)
}

fn display_priority(score: f64, strength: MatchStrength) -> u32 {
    let strength_bonus = match strength {
        MatchStrength::Exact => 20,
        MatchStrength::Strong => 15,
        MatchStrength::Moderate => 10,
        MatchStrength::Weak => 5,
        MatchStrength::Minimal => 0,
    };
    (clamp_unit(score) * 100.0).round() as u32 + strength_bonus
}

fn quality_indicators(result: &ClassificationResult) -> Vec<String> {
    let mut indicators = Vec::new();
    if result.confidence >= 0.8 {
        indicators.push("high_confidence".to_string());
    }
    if result.match_type == "exact" {
        indicators.push("exact_match".to_string());
    }
    if is_composite(&result.match_type) {
        indicators.push("multi_strategy".to_string());
    }
    if result.evidence_count() >= 3 {
        indicators.push("multiple_evidence".to_string());
    }
    if !result.code.category.is_empty() {
        indicators.push("categorized".to_string());
    }
    if !result.code.keywords.is_empty() && !result.matched_on.is_empty() {
        indicators.push("keyword_coverage".to_string());
    }
    indicators
}

fn ui_hints(
    result: &ClassificationResult,
    level: ConfidenceLevel,
    strength: MatchStrength,
    overall_rank: usize,
) -> UiHints {
    let color = match level {
        ConfidenceLevel::VeryHigh | ConfidenceLevel::High => "green",
        ConfidenceLevel::Medium => "amber",
        ConfidenceLevel::Low => "orange",
        ConfidenceLevel::VeryLow | ConfidenceLevel::None => "red",
    };
    let icon = match result.code_type() {
        CodeType::Sic => "factory",
        CodeType::Naics => "building",
        CodeType::Mcc => "credit-card",
    };
    let mut tags = vec![
        result.code_type().as_str().to_string(),
        level.as_str().to_string(),
        strength.as_str().to_string(),
    ];
    if is_composite(&result.match_type) {
        tags.push(MULTI_STRATEGY.to_string());
    }

    UiHints {
        color: color.to_string(),
        icon: icon.to_string(),
        tags,
        highlight: overall_rank == 1 || strength == MatchStrength::Exact,
    }
}

fn is_valid(result: &ClassificationResult) -> bool {
    !result.code.code.trim().is_empty()
        && (!result.reasons.is_empty() || !result.matched_on.is_empty())
}

fn related(result: &ClassificationResult) -> RelatedCode {
    RelatedCode {
        code: result.code.code.clone(),
        code_type: result.code_type(),
        description: result.code.description.clone(),
        confidence: result.confidence,
    }
}

fn same_category(a: &ClassificationResult, b: &ClassificationResult) -> bool {
    !a.code.category.is_empty() && a.code.category.eq_ignore_ascii_case(&b.code.category)
}

/// Pre-rank working entry
struct Candidate {
    result: ClassificationResult,
    score: f64,
    level: ConfidenceLevel,
    strength: MatchStrength,
    indicators: Vec<String>,
}

impl Candidate {
    fn new(result: ClassificationResult) -> Self {
        let score = aggregation_score(&result);
        Self {
            level: ConfidenceLevel::from_presentation_score(result.confidence),
            strength: match_strength(&result),
            indicators: quality_indicators(&result),
            score,
            result,
        }
    }
}

fn compare(criterion: SortCriterion, a: &Candidate, b: &Candidate) -> Ordering {
    let primary = match criterion {
        SortCriterion::Confidence => stats::desc(a.result.confidence, b.result.confidence),
        SortCriterion::Relevance => stats::desc(a.score, b.score)
            .then_with(|| stats::desc(a.result.confidence, b.result.confidence)),
        SortCriterion::Quality => b
            .indicators
            .len()
            .cmp(&a.indicators.len())
            .then_with(|| stats::desc(a.score, b.score)),
        SortCriterion::Alphabetical => a
            .result
            .code
            .description
            .to_lowercase()
            .cmp(&b.result.code.description.to_lowercase()),
        SortCriterion::CodeType => a
            .result
            .code_type()
            .cmp(&b.result.code_type())
            .then_with(|| stats::desc(a.result.confidence, b.result.confidence)),
        SortCriterion::MatchStrength => a
            .strength
            .cmp(&b.strength)
            .then_with(|| stats::desc(a.score, b.score)),
    };
    primary.then_with(|| a.result.key().cmp(&b.result.key()))
}

fn interrupted(err: indclass_common::Error) -> AggregationError {
    match err {
        indclass_common::Error::DeadlineExceeded => AggregationError::DeadlineExceeded,
        _ => AggregationError::Cancelled,
    }
}

/// Stateless aggregator; per-request options override the configuration
#[derive(Debug, Clone, Default)]
pub struct ResultAggregator {
    config: AggregationConfig,
}

impl ResultAggregator {
    pub fn new(config: AggregationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AggregationConfig {
        &self.config
    }

    pub fn aggregate(
        &self,
        ctx: &RequestContext,
        request: AggregationRequest,
    ) -> Result<AggregatedResults, AggregationError> {
        ctx.check().map_err(interrupted)?;
        let started = Instant::now();

        let min_confidence = request.min_confidence.unwrap_or(self.config.min_confidence);
        if !(0.0..=1.0).contains(&min_confidence) {
            return Err(AggregationError::InvalidRequest(format!(
                "min_confidence must be within [0, 1], got {}",
                min_confidence
            )));
        }
        let max_per_type = request
            .max_results_per_type
            .unwrap_or(self.config.max_results_per_type);
        if max_per_type == 0 {
            return Err(AggregationError::InvalidRequest(
                "max_results_per_type must be at least 1".to_string(),
            ));
        }
        let sort_by = request.sort_by.unwrap_or(self.config.sort_by);
        let format = request.presentation.unwrap_or(self.config.presentation);
        let include_analytics = request
            .include_analytics
            .unwrap_or(self.config.include_analytics);

        let total_input_results = request.results.len();
        let deduped = merge_results(request.results);
        let total_after_dedup = deduped.len();

        let mut pool: Vec<Candidate> = deduped
            .into_iter()
            .filter(|r| r.confidence >= min_confidence && is_valid(r))
            .map(Candidate::new)
            .collect();
        let total_after_filter = pool.len();
        pool.sort_by(|a, b| compare(sort_by, a, b));

        let mut per_type: BTreeMap<CodeType, usize> = BTreeMap::new();
        let mut selected: Vec<(usize, usize)> = Vec::new();
        for (i, candidate) in pool.iter().enumerate() {
            let count = per_type.entry(candidate.result.code_type()).or_insert(0);
            if *count < max_per_type {
                *count += 1;
                selected.push((i, *count));
            }
        }

        let results: Vec<AggregatedResult> = selected
            .iter()
            .enumerate()
            .map(|(overall, &(i, type_rank))| self.finish(&pool, i, overall + 1, type_rank))
            .collect();

        let mut by_type: BTreeMap<CodeType, Vec<AggregatedResult>> =
            CodeType::ALL.iter().map(|t| (*t, Vec::new())).collect();
        let mut by_strategy: BTreeMap<String, usize> = BTreeMap::new();
        for r in &results {
            by_type
                .entry(r.result.code_type())
                .or_default()
                .push(r.clone());
            for tag in r.result.match_type.split('+').filter(|t| !t.is_empty()) {
                *by_strategy.entry(tag.to_string()).or_insert(0) += 1;
            }
        }

        let analytics =
            include_analytics.then(|| compute_analytics(&results, &request.expected_types));
        let presentation = Presentation::render(format, &results, analytics.as_ref());

        debug!(
            input = total_input_results,
            deduped = total_after_dedup,
            filtered = total_after_filter,
            returned = results.len(),
            sort_by = ?sort_by,
            format = ?format,
            "Aggregated classification results"
        );

        Ok(AggregatedResults {
            results,
            by_type,
            by_strategy,
            total_input_results,
            total_after_dedup,
            total_after_filter,
            analytics,
            presentation,
            processing_time_ms: started.elapsed().as_millis() as u64,
        })
    }

    fn finish(
        &self,
        pool: &[Candidate],
        index: usize,
        overall_rank: usize,
        type_rank: usize,
    ) -> AggregatedResult {
        let candidate = &pool[index];
        let result = &candidate.result;
        let others = pool
            .iter()
            .enumerate()
            .filter(|(j, other)| *j != index && same_category(result, &other.result))
            .map(|(_, other)| &other.result);

        let related_codes = others
            .clone()
            .filter(|other| other.code_type() != result.code_type())
            .take(self.config.max_related)
            .map(related)
            .collect();
        let alternative_codes = others
            .filter(|other| other.code_type() == result.code_type())
            .take(self.config.max_related)
            .map(related)
            .collect();

        AggregatedResult {
            result: result.clone(),
            aggregation_score: candidate.score,
            overall_rank,
            type_rank,
            confidence_level: candidate.level,
            match_strength: candidate.strength,
            display_priority: display_priority(candidate.score, candidate.strength),
            quality_indicators: candidate.indicators.clone(),
            ui_hints: ui_hints(result, candidate.level, candidate.strength, overall_rank),
            related_codes,
            alternative_codes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indclass_common::IndustryCode;

    fn result(
        code: &str,
        code_type: CodeType,
        category: &str,
        confidence: f64,
        match_type: &str,
    ) -> ClassificationResult {
        ClassificationResult::new(
            IndustryCode::new(
                format!("{}-{}", code_type.as_str(), code),
                code,
                code_type,
                format!("Description {}", code),
            )
            .with_category(category),
            confidence,
            match_type,
            1.0,
        )
        .with_reason("matched keyword")
    }

    fn aggregator() -> ResultAggregator {
        ResultAggregator::new(AggregationConfig::default())
    }

    #[test]
    fn test_empty_input_is_valid() {
        let out = aggregator()
            .aggregate(&RequestContext::new(), AggregationRequest::default())
            .unwrap();
        assert_eq!(out.total_input_results, 0);
        assert!(out.results.is_empty());
        assert_eq!(out.by_type.len(), 3);
        assert!(out.by_type.values().all(|v| v.is_empty()));
        let analytics = out.analytics.unwrap();
        assert_eq!(analytics.certainty_score, 0.0);
        assert_eq!(analytics.recommendation_score, 0.0);
    }

    #[test]
    fn test_min_confidence_filter() {
        let results = [0.85, 0.80, 0.75, 0.45, 0.30]
            .iter()
            .enumerate()
            .map(|(i, c)| result(&format!("58{}0", i), CodeType::Sic, "Food", *c, "keyword"))
            .collect();
        let request = AggregationRequest {
            min_confidence: Some(0.7),
            max_results_per_type: Some(10),
            ..AggregationRequest::new(results)
        };
        let out = aggregator().aggregate(&RequestContext::new(), request).unwrap();

        assert_eq!(out.total_input_results, 5);
        assert_eq!(out.results.len(), 3);
        assert!(out.results.iter().all(|r| r.result.confidence >= 0.7));
    }

    #[test]
    fn test_duplicates_merge_and_evidence_required() {
        let results = vec![
            result("5812", CodeType::Sic, "Food", 0.6, "keyword"),
            result("5812", CodeType::Sic, "Food", 0.8, "business_name").with_matched_on("pizza"),
            ClassificationResult::new(
                IndustryCode::new("sic-9999", "9999", CodeType::Sic, "No evidence"),
                0.9,
                "keyword",
                1.0,
            ),
        ];
        let out = aggregator()
            .aggregate(&RequestContext::new(), AggregationRequest::new(results))
            .unwrap();

        assert_eq!(out.total_after_dedup, 2);
        assert_eq!(out.total_after_filter, 1);
        let top = &out.results[0].result;
        assert_eq!(top.confidence, 0.8);
        assert_eq!(top.match_type, MULTI_STRATEGY);
    }

    #[test]
    fn test_aggregation_score() {
        let keyword = result("5812", CodeType::Sic, "Food", 0.8, "keyword").with_matched_on("pizza");
        // (0.48 + 0.15) * 1.1
        assert!((aggregation_score(&keyword) - 0.693).abs() < 1e-9);

        let multi = result("5812", CodeType::Sic, "Food", 0.8, "keyword+business_name");
        assert!(aggregation_score(&multi) > aggregation_score(&keyword));

        let capped = result("5812", CodeType::Sic, "Food", 1.0, "exact")
            .with_reason("a")
            .with_reason("b")
            .with_reason("c");
        assert_eq!(aggregation_score(&capped), 1.0);
    }

    #[test]
    fn test_per_type_cap_and_ranks() {
        let results = vec![
            result("5812", CodeType::Sic, "Food", 0.9, "keyword"),
            result("5813", CodeType::Sic, "Food", 0.8, "keyword"),
            result("5814", CodeType::Sic, "Food", 0.7, "keyword"),
            result("5815", CodeType::Sic, "Food", 0.6, "keyword"),
            result("722511", CodeType::Naics, "Food", 0.85, "keyword"),
        ];
        let out = aggregator()
            .aggregate(&RequestContext::new(), AggregationRequest::new(results))
            .unwrap();

        assert_eq!(out.results.len(), 4);
        assert_eq!(out.by_type[&CodeType::Sic].len(), 3);
        assert_eq!(out.by_type[&CodeType::Mcc].len(), 0);
        assert_eq!(out.results[0].overall_rank, 1);
        assert!(out.results[0].ui_hints.highlight);
        let sic_ranks: Vec<usize> = out.by_type[&CodeType::Sic].iter().map(|r| r.type_rank).collect();
        assert_eq!(sic_ranks, vec![1, 2, 3]);
        assert_eq!(out.by_strategy["keyword"], 4);

        let naics = &out.by_type[&CodeType::Naics][0];
        assert_eq!(naics.related_codes.len(), 3);
        assert!(naics.alternative_codes.is_empty());
    }

    #[test]
    fn test_sort_alphabetical_and_presentation() {
        let results = vec![
            result("2000", CodeType::Sic, "B", 0.9, "keyword"),
            result("1000", CodeType::Naics, "A", 0.5, "keyword"),
        ];
        let request = AggregationRequest {
            sort_by: Some(SortCriterion::Alphabetical),
            presentation: Some(PresentationFormat::Compact),
            include_analytics: Some(false),
            ..AggregationRequest::new(results)
        };
        let out = aggregator().aggregate(&RequestContext::new(), request).unwrap();

        assert_eq!(out.results[0].result.code.code, "1000");
        assert!(out.analytics.is_none());
        match out.presentation {
            Presentation::Compact(view) => {
                assert_eq!(view.entries[0].label, "NAICS 1000");
                assert_eq!(view.entries[0].confidence, 0.5);
            }
            other => panic!("unexpected presentation {:?}", other.format()),
        }
    }

    #[test]
    fn test_invalid_request_and_cancellation() {
        let request = AggregationRequest {
            min_confidence: Some(1.5),
            ..AggregationRequest::default()
        };
        assert!(matches!(
            aggregator().aggregate(&RequestContext::new(), request),
            Err(AggregationError::InvalidRequest(_))
        ));

        let ctx = RequestContext::new();
        ctx.cancel();
        assert_eq!(
            aggregator().aggregate(&ctx, AggregationRequest::default()),
            Err(AggregationError::Cancelled)
        );
    }

    #[test]
    fn test_analytics_over_mixed_types() {
        let results = vec![
            result("5812", CodeType::Sic, "Food", 0.9, "keyword"),
            result("722511", CodeType::Naics, "Food", 0.8, "keyword"),
            result("5812", CodeType::Mcc, "Retail", 0.4, "keyword"),
        ];
        let out = aggregator()
            .aggregate(&RequestContext::new(), AggregationRequest::new(results))
            .unwrap();
        let analytics = out.analytics.unwrap();

        assert_eq!(analytics.statistics.count, 3);
        assert_eq!(analytics.coverage.type_coverage, 1.0);
        assert_eq!(analytics.consistency.expected_type_ratio, 1.0);
        assert_eq!(analytics.consistency.type_conflicts.len(), 2);
        assert_eq!(analytics.quality.low_confidence_issues.len(), 1);
        // 0.7 * 0.9 + 0.3 * 0.1
        assert!((analytics.certainty_score - 0.66).abs() < 1e-9);
        assert!(analytics.diversity.herfindahl_index > 0.5);
    }
}
