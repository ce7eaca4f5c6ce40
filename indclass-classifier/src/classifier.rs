//! Industry classifier orchestration
//!
//! Runs every strategy in a fixed order, then pushes the votes through
//! adaptive weighting, voting, confidence filtering, ranking and
//! aggregation.
//!
//! # Degradation
//! - A failing strategy casts no votes; the request continues
//! - Voting failure falls back to a weighted merge of the votes
//! - Aggregation failure falls back to confidence filtering with a
//!   per-type cap
//! - Cancellation or deadline expiry aborts the request without partial
//!   results

use indclass_common::{CodeStore, CodeType, RequestContext};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::aggregation::{
    AggregatedResults, AggregationError, AggregationRequest, Analytics, ResultAggregator,
};
use crate::confidence::{
    ConfidenceCalculator, ConfidenceScorer, PerformanceTracker, ScoringContext,
    StrategyConfidence, StrategyPerformance,
};
use crate::config::{ClassifierConfig, ServiceConfig};
use crate::error::ClassifyError;
use crate::filter::{ConfidenceFilter, FilterStatistics};
use crate::ranking::{RankingEngine, RankingMetrics};
use crate::stats;
use crate::strategies::{
    BusinessNameStrategy, ClassificationStrategy, DescriptionStrategy, ExactCodeStrategy,
    KeywordStrategy, StrategyInput,
};
use crate::types::{
    group_by_type, ClassificationResult, StrategyVote, VoteMetadata, MULTI_STRATEGY,
};
use crate::voting::{weighted_merge, VotingDiagnostics, VotingEngine};

/// Response strategy when the aggregator produced the results
pub const ENHANCED_AGGREGATION: &str = "enhanced-aggregation";

// ============================================================================
// Request / Response
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationRequest {
    pub business_name: String,
    pub description: String,
    pub website: Option<String>,
    pub keywords: Vec<String>,
    /// Empty means every code type
    pub preferred_types: Vec<CodeType>,
    /// `None` or 0 uses the configured default; negative is rejected
    pub max_results: Option<i64>,
    pub min_confidence: Option<f64>,
}

/// Request options after validation and defaults
#[derive(Debug, Clone, PartialEq)]
struct RequestParams {
    max_results: usize,
    min_confidence: f64,
    preferred_types: Vec<CodeType>,
}

impl ClassificationRequest {
    pub fn new(business_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            business_name: business_name.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    fn validate(&self, defaults: &ClassifierConfig) -> Result<RequestParams, ClassifyError> {
        if self.business_name.trim().is_empty() && self.description.trim().is_empty() {
            return Err(ClassifyError::InvalidRequest(
                "business_name or description is required".to_string(),
            ));
        }

        let max_results = match self.max_results {
            Some(n) if n < 0 => {
                return Err(ClassifyError::InvalidRequest(format!(
                    "max_results must not be negative, got {}",
                    n
                )))
            }
            Some(0) | None => defaults.default_max_results,
            Some(n) => n as usize,
        };

        let min_confidence = self.min_confidence.unwrap_or(defaults.default_min_confidence);
        if !(0.0..=1.0).contains(&min_confidence) {
            return Err(ClassifyError::InvalidRequest(format!(
                "min_confidence must be within [0, 1], got {}",
                min_confidence
            )));
        }

        let mut preferred_types = Vec::new();
        for t in &self.preferred_types {
            if !preferred_types.contains(t) {
                preferred_types.push(*t);
            }
        }
        if preferred_types.is_empty() {
            preferred_types = CodeType::ALL.to_vec();
        }

        Ok(RequestParams {
            max_results,
            min_confidence,
            preferred_types,
        })
    }

    /// Name, description, website and keywords joined for analysis
    pub fn analysis_text(&self) -> String {
        let mut parts = vec![self.business_name.as_str(), self.description.as_str()];
        if let Some(website) = &self.website {
            parts.push(website.as_str());
        }
        parts.extend(self.keywords.iter().map(String::as_str));
        parts
            .into_iter()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    /// "enhanced-aggregation" or "multi-strategy"
    pub strategy: String,
    pub strategies_run: Vec<String>,
    pub strategies_failed: Vec<String>,
    pub strategy_confidences: Vec<StrategyConfidence>,
    /// Absent when voting fell back to weighted merge
    pub voting: Option<VotingDiagnostics>,
    pub voting_fallback_reason: Option<String>,
    pub filter: FilterStatistics,
    pub ranking: RankingMetrics,
    pub analytics: Option<Analytics>,
    /// Problems found by the final sanity check; never blocks the response
    pub validation_issues: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResponse {
    pub request_id: Uuid,
    pub business_name: String,
    /// Final results, best first
    pub results: Vec<ClassificationResult>,
    /// Every code type, possibly with an empty list
    pub by_type: BTreeMap<CodeType, Vec<ClassificationResult>>,
    /// Raw candidates inspected by all strategies
    pub total_candidates: usize,
    pub processing_time_ms: u64,
    pub metadata: ResponseMetadata,
}

// ============================================================================
// Classifier
// ============================================================================

pub struct IndustryClassifier {
    store: Arc<dyn CodeStore>,
    strategies: Vec<Box<dyn ClassificationStrategy>>,
    calculator: ConfidenceCalculator,
    voting: VotingEngine,
    filter: ConfidenceFilter,
    ranking: RankingEngine,
    aggregator: ResultAggregator,
    /// Lives as long as the classifier; see [`Self::reset_performance`]
    tracker: Mutex<PerformanceTracker>,
    settings: ClassifierConfig,
}

impl IndustryClassifier {
    /// Classifier with the standard strategy set
    pub fn new(store: Arc<dyn CodeStore>, config: &ServiceConfig) -> Self {
        let weights = &config.classifier.strategy_weights;
        let strategies: Vec<Box<dyn ClassificationStrategy>> = vec![
            Box::new(KeywordStrategy::new(store.clone(), weights.keyword)),
            Box::new(DescriptionStrategy::new(store.clone(), weights.description)),
            Box::new(BusinessNameStrategy::new(store.clone(), weights.business_name)),
            Box::new(ExactCodeStrategy::new(store.clone(), weights.exact_code)),
        ];
        Self::with_strategies(store, strategies, config)
    }

    /// Classifier with a caller-chosen strategy set, run in the given order
    pub fn with_strategies(
        store: Arc<dyn CodeStore>,
        strategies: Vec<Box<dyn ClassificationStrategy>>,
        config: &ServiceConfig,
    ) -> Self {
        let calculator = ConfidenceCalculator::new(config.adaptive.clone());
        Self {
            store,
            strategies,
            voting: VotingEngine::new(config.voting.clone(), calculator.clone()),
            calculator,
            filter: ConfidenceFilter::new(config.filter.clone(), ConfidenceScorer::new()),
            ranking: RankingEngine::new(config.ranking.clone()),
            aggregator: ResultAggregator::new(config.aggregation.clone()),
            tracker: Mutex::new(PerformanceTracker::new(&config.adaptive)),
            settings: config.classifier.clone(),
        }
    }

    pub fn store(&self) -> &Arc<dyn CodeStore> {
        &self.store
    }

    pub fn settings(&self) -> &ClassifierConfig {
        &self.settings
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Snapshot of the sliding-window performance per strategy
    pub async fn strategy_performance(&self) -> BTreeMap<String, StrategyPerformance> {
        let tracker = self.tracker.lock().await;
        self.strategies
            .iter()
            .filter_map(|s| tracker.performance(s.name()).map(|p| (s.name().to_string(), p)))
            .collect()
    }

    /// Forget all recorded strategy outcomes
    pub async fn reset_performance(&self) {
        self.tracker.lock().await.reset();
        info!("Strategy performance history reset");
    }

    pub async fn classify_business(
        &self,
        ctx: &RequestContext,
        request: ClassificationRequest,
    ) -> Result<ClassificationResponse, ClassifyError> {
        let started = Instant::now();
        let request_id = Uuid::new_v4();
        let params = request.validate(&self.settings)?;
        let input = StrategyInput::new(
            &request.business_name,
            &request.analysis_text(),
            &params.preferred_types,
        );
        debug!(%request_id, business = %request.business_name, types = ?params.preferred_types, "Classifying business");

        let mut metadata = ResponseMetadata::default();
        let mut votes = Vec::new();
        let mut total_candidates = 0;

        // Strategies, in fixed order
        for (completed, strategy) in self.strategies.iter().enumerate() {
            ctx.check()
                .map_err(|e| ClassifyError::interrupted(e, completed))?;

            let strategy_started = Instant::now();
            match strategy.classify(ctx, &input).await {
                Ok(output) => {
                    let confidence = self
                        .calculator
                        .calculate_strategy_confidence(strategy.name(), &output.results);
                    total_candidates += output.candidates_found;

                    let vote = StrategyVote::new(
                        strategy.name(),
                        output.results,
                        strategy.weight(),
                        confidence.confidence,
                    )
                    .with_metadata(VoteMetadata {
                        candidates_found: output.candidates_found,
                        processing_time_ms: strategy_started.elapsed().as_millis() as u64,
                        confidence_level: Some(confidence.level.as_str().to_string()),
                        ..VoteMetadata::default()
                    });

                    metadata.strategies_run.push(strategy.name().to_string());
                    metadata.strategy_confidences.push(confidence);
                    votes.push(vote);
                }
                Err(e) if e.is_interrupted() => {
                    return Err(ClassifyError::interrupted(e, completed));
                }
                Err(e) => {
                    warn!(strategy = strategy.name(), error = %e, "Strategy failed, casting no votes");
                    metadata.strategies_failed.push(strategy.name().to_string());
                }
            }
        }

        let votes = {
            let tracker = self.tracker.lock().await;
            self.calculator.calculate_adaptive_weights(votes, &tracker)
        };

        let consensus = match self.voting.conduct_voting(&votes) {
            Ok(outcome) => {
                metadata.voting = Some(outcome.diagnostics);
                outcome.results
            }
            Err(e) => {
                warn!(error = %e, "Voting failed, falling back to weighted merge");
                metadata.voting_fallback_reason = Some(e.to_string());
                weighted_merge(&votes)
            }
        };

        let scoring = ScoringContext::new(&input.business_name, &input.analysis_text);
        let filtered = self.filter.apply(consensus, &scoring);
        metadata.filter = filtered.statistics;

        let ranked = self.ranking.rank(filtered.accepted);
        metadata.ranking = ranked.metrics;
        let ranked: Vec<ClassificationResult> =
            ranked.results.into_iter().map(|r| r.result).collect();

        let aggregation = AggregationRequest {
            min_confidence: Some(params.min_confidence),
            max_results_per_type: Some(self.settings.max_results_per_type),
            expected_types: params.preferred_types.clone(),
            ..AggregationRequest::new(ranked.clone())
        };
        let mut results = match self.aggregator.aggregate(ctx, aggregation) {
            Ok(aggregated) => {
                metadata.strategy = ENHANCED_AGGREGATION.to_string();
                metadata.analytics = aggregated.analytics;
                aggregated.results.into_iter().map(|r| r.result).collect()
            }
            Err(e @ (AggregationError::Cancelled | AggregationError::DeadlineExceeded)) => {
                return Err(ClassifyError::from_aggregation(e, self.strategies.len()))
            }
            Err(e) => {
                warn!(error = %e, "Aggregation failed, using basic filtering");
                metadata.strategy = MULTI_STRATEGY.to_string();
                basic_aggregate(
                    ranked,
                    params.min_confidence,
                    self.settings.max_results_per_type,
                )
            }
        };
        results.truncate(params.max_results);

        metadata.validation_issues = validate_results(&results, self.settings.max_results_per_type);
        for issue in &metadata.validation_issues {
            warn!(%request_id, issue = %issue, "Response validation issue");
        }

        {
            let mut tracker = self.tracker.lock().await;
            for vote in &votes {
                tracker.record(&vote.strategy_name, vote.confidence);
            }
        }

        let mut by_type = group_by_type(&results);
        for code_type in CodeType::ALL {
            by_type.entry(code_type).or_default();
        }

        let processing_time_ms = started.elapsed().as_millis() as u64;
        info!(
            %request_id,
            results = results.len(),
            candidates = total_candidates,
            strategy = %metadata.strategy,
            failed = metadata.strategies_failed.len(),
            elapsed_ms = processing_time_ms,
            "Classification complete"
        );

        Ok(ClassificationResponse {
            request_id,
            business_name: request.business_name,
            results,
            by_type,
            total_candidates,
            processing_time_ms,
            metadata,
        })
    }

    /// Aggregate any ordered result list into presentation form
    pub fn aggregate_and_present(
        &self,
        ctx: &RequestContext,
        request: AggregationRequest,
    ) -> Result<AggregatedResults, ClassifyError> {
        // No strategies run on this path
        self.aggregator
            .aggregate(ctx, request)
            .map_err(|e| ClassifyError::from_aggregation(e, 0))
    }
}

/// Confidence filter, confidence order and per-type cap
fn basic_aggregate(
    results: Vec<ClassificationResult>,
    min_confidence: f64,
    max_per_type: usize,
) -> Vec<ClassificationResult> {
    let mut kept: Vec<ClassificationResult> = results
        .into_iter()
        .filter(|r| r.confidence >= min_confidence)
        .collect();
    kept.sort_by(|a, b| stats::desc(a.confidence, b.confidence).then_with(|| a.key().cmp(&b.key())));

    let mut per_type: BTreeMap<CodeType, usize> = BTreeMap::new();
    kept.retain(|r| {
        let count = per_type.entry(r.code_type()).or_insert(0);
        *count += 1;
        *count <= max_per_type
    });
    kept
}

/// Sanity check of the final result list
fn validate_results(results: &[ClassificationResult], max_per_type: usize) -> Vec<String> {
    let mut issues = Vec::new();
    let mut seen = HashSet::new();
    let mut per_type: BTreeMap<CodeType, usize> = BTreeMap::new();

    for r in results {
        if !(0.0..=1.0).contains(&r.confidence) {
            issues.push(format!(
                "{} {} confidence {} out of range",
                r.code_type().label(),
                r.code.code,
                r.confidence
            ));
        }
        if !seen.insert(r.key()) {
            issues.push(format!(
                "duplicate result {} {}",
                r.code_type().label(),
                r.code.code
            ));
        }
        *per_type.entry(r.code_type()).or_insert(0) += 1;
    }

    for (code_type, count) in per_type {
        if count > max_per_type {
            issues.push(format!(
                "{} results for {} exceed the cap of {}",
                count,
                code_type.label(),
                max_per_type
            ));
        }
    }
    issues
}
