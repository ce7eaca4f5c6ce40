//! Multi-strategy voting engine
//!
//! Combines [`StrategyVote`]s into consensus results keyed by
//! `(code, code_type)`.
//!
//! # Algorithm
//! 1. Require at least `min_voters` votes with results
//! 2. Aggregate contributions per code ([`CodeVoteAggregation`])
//! 3. Drop outlier contributions (leave-one-out z-score above threshold,
//!    3+ contributions)
//! 4. Derive per-code confidence by the configured strategy
//! 5. Sort by confidence; ties break on vote count, then best single
//!    contribution, then code
//!
//! Vote order never changes the outcome; only confidence and vote counts
//! break ties.
//!
//! A failed vote (`VotingError`) is handled by the caller with
//! [`weighted_merge`].

use indclass_common::IndustryCode;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;
use tracing::debug;

use crate::confidence::ConfidenceCalculator;
use crate::stats;
use crate::types::{merge_results, ClassificationResult, CodeKey, StrategyVote};

/// Confidences within this distance count as tied
const TIE_EPSILON: f64 = 0.001;

/// Floor on the spread used for outlier z-scores
const MIN_OUTLIER_SPREAD: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotingStrategy {
    /// Σ(confidence × weight) / Σweight per code
    WeightedAverage,
    /// Codes backed by at least half the voters, unweighted mean
    Majority,
    /// Weighted average with consensus bonus and variance penalty
    EnhancedWeightedAverage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VotingConfig {
    pub strategy: VotingStrategy,
    pub min_voters: usize,
    /// Fraction of voters that must back a code for a consensus reason
    pub required_agreement: f64,
    pub confidence_weight: f64,
    pub consistency_weight: f64,
    pub diversity_weight: f64,
    pub enable_tie_breaking: bool,
    pub enable_outlier_filtering: bool,
    /// z-score above which a contribution is dropped
    pub outlier_threshold: f64,
}

impl Default for VotingConfig {
    fn default() -> Self {
        Self {
            strategy: VotingStrategy::WeightedAverage,
            min_voters: 2,
            required_agreement: 0.6,
            confidence_weight: 0.4,
            consistency_weight: 0.3,
            diversity_weight: 0.3,
            enable_tie_breaking: true,
            enable_outlier_filtering: true,
            outlier_threshold: 2.0,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum VotingError {
    #[error("Insufficient voters: {available} of {required} required")]
    InsufficientVoters { required: usize, available: usize },

    #[error("No candidate codes survived voting")]
    NoCandidates,
}

/// One strategy's support for one code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteContribution {
    pub strategy_name: String,
    pub confidence: f64,
    pub weight: f64,
    pub match_type: String,
}

/// Consensus record for one code across all votes
#[derive(Debug, Clone)]
pub struct CodeVoteAggregation {
    pub code: IndustryCode,
    pub contributions: Vec<VoteContribution>,
    pub total_votes: usize,
    /// Σ(confidence × weight)
    pub weighted_score: f64,
    pub confidence_variance: f64,
    /// Evidence of every contribution merged together
    pub merged: ClassificationResult,
}

impl CodeVoteAggregation {
    fn new(result: &ClassificationResult) -> Self {
        Self {
            code: result.code.clone(),
            contributions: Vec::new(),
            total_votes: 0,
            weighted_score: 0.0,
            confidence_variance: 0.0,
            merged: result.clone(),
        }
    }

    fn add(&mut self, strategy_name: &str, weight: f64, result: &ClassificationResult) {
        self.merged.merge_from(result);
        match self
            .contributions
            .iter_mut()
            .find(|c| c.strategy_name == strategy_name)
        {
            Some(existing) => existing.confidence = existing.confidence.max(result.confidence),
            None => self.contributions.push(VoteContribution {
                strategy_name: strategy_name.to_string(),
                confidence: result.confidence,
                weight,
                match_type: result.match_type.clone(),
            }),
        }
        self.recompute();
    }

    fn recompute(&mut self) {
        let confidences = self.confidences();
        self.total_votes = self.contributions.len();
        self.weighted_score = self
            .contributions
            .iter()
            .map(|c| c.confidence * c.weight)
            .sum();
        self.confidence_variance = stats::variance(&confidences);
    }

    fn confidences(&self) -> Vec<f64> {
        self.contributions.iter().map(|c| c.confidence).collect()
    }

    pub fn total_weight(&self) -> f64 {
        self.contributions.iter().map(|c| c.weight).sum()
    }

    /// Σ(c·w)/Σw, falling back to the plain mean when weights sum to zero
    pub fn weighted_average(&self) -> f64 {
        let total_weight = self.total_weight();
        if total_weight > 0.0 {
            self.weighted_score / total_weight
        } else {
            stats::mean(&self.confidences())
        }
    }

    pub fn max_confidence(&self) -> f64 {
        self.contributions
            .iter()
            .map(|c| c.confidence)
            .fold(0.0, f64::max)
    }

    /// Distinct contributing match types, sorted and joined with `+`
    pub fn composite_match_type(&self) -> String {
        let types: BTreeSet<&str> = self
            .contributions
            .iter()
            .map(|c| c.match_type.as_str())
            .collect();
        types.into_iter().collect::<Vec<_>>().join("+")
    }

    /// Drop contributions whose leave-one-out z-score exceeds `threshold`
    ///
    /// Each contribution is measured against the mean and spread of the
    /// others, so a single dissenter among three or four strategies can be
    /// caught. A full-sample z-score cannot exceed `(n-1)/sqrt(n)` and would
    /// never reach 2.0 with fewer than six voters. Returns the number removed.
    fn filter_outliers(&mut self, threshold: f64) -> usize {
        if self.contributions.len() < 3 {
            return 0;
        }
        let confidences = self.confidences();
        let outlier: Vec<bool> = (0..confidences.len())
            .map(|i| {
                let others: Vec<f64> = confidences
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .map(|(_, c)| *c)
                    .collect();
                let spread = stats::std_dev(&others).max(MIN_OUTLIER_SPREAD);
                ((confidences[i] - stats::mean(&others)) / spread).abs() > threshold
            })
            .collect();

        let before = self.contributions.len();
        let mut flags = outlier.into_iter();
        self.contributions
            .retain(|_| !flags.next().unwrap_or(false));
        self.recompute();
        before - self.contributions.len()
    }
}

/// Group every vote's results by code key, in first-seen order
pub fn aggregate_by_code(votes: &[StrategyVote]) -> Vec<CodeVoteAggregation> {
    let mut aggregations: Vec<CodeVoteAggregation> = Vec::new();
    let mut index: HashMap<CodeKey, usize> = HashMap::new();

    for vote in votes {
        let weight = vote.effective_weight();
        for result in &vote.results {
            let pos = *index.entry(result.key()).or_insert_with(|| {
                aggregations.push(CodeVoteAggregation::new(result));
                aggregations.len() - 1
            });
            aggregations[pos].add(&vote.strategy_name, weight, result);
        }
    }

    aggregations
}

/// Fallback when voting is not possible: scale each result by its vote's
/// weight, then merge by maximum confidence
pub fn weighted_merge(votes: &[StrategyVote]) -> Vec<ClassificationResult> {
    let scaled = votes.iter().flat_map(|vote| {
        let weight = vote.effective_weight();
        vote.results.iter().map(move |r| {
            let mut scaled = r.clone();
            scaled.set_confidence(r.confidence * weight);
            scaled
        })
    });

    let mut merged = merge_results(scaled);
    merged.sort_by(|a, b| stats::desc(a.confidence, b.confidence).then_with(|| a.key().cmp(&b.key())));
    merged
}

/// Diagnostics of one voting round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VotingDiagnostics {
    pub strategy: VotingStrategy,
    pub voters: usize,
    pub candidate_codes: usize,
    /// Codes backed by at least `required_agreement` of the voters
    pub consensus_codes: usize,
    /// Mean per-code fraction of voters in support
    pub agreement_score: f64,
    /// Blend of confidence, consistency and diversity
    pub voting_score: f64,
    pub outliers_removed: usize,
}

#[derive(Debug, Clone)]
pub struct VotingOutcome {
    pub results: Vec<ClassificationResult>,
    pub diagnostics: VotingDiagnostics,
}

pub struct VotingEngine {
    config: VotingConfig,
    calculator: ConfidenceCalculator,
}

impl VotingEngine {
    pub fn new(config: VotingConfig, calculator: ConfidenceCalculator) -> Self {
        Self { config, calculator }
    }

    pub fn config(&self) -> &VotingConfig {
        &self.config
    }

    pub fn conduct_voting(&self, votes: &[StrategyVote]) -> Result<VotingOutcome, VotingError> {
        let voters = votes.iter().filter(|v| !v.results.is_empty()).count();
        if voters < self.config.min_voters {
            return Err(VotingError::InsufficientVoters {
                required: self.config.min_voters,
                available: voters,
            });
        }

        let mut aggregations = aggregate_by_code(votes);
        if aggregations.is_empty() {
            return Err(VotingError::NoCandidates);
        }

        let outliers_removed = if self.config.enable_outlier_filtering {
            aggregations
                .iter_mut()
                .map(|a| a.filter_outliers(self.config.outlier_threshold))
                .sum()
        } else {
            0
        };

        let results = match self.config.strategy {
            VotingStrategy::WeightedAverage => self.rank_consensus(&aggregations, voters, |a| {
                a.weighted_average()
            }),
            VotingStrategy::Majority => {
                let majority: Vec<CodeVoteAggregation> = aggregations
                    .iter()
                    .filter(|a| a.total_votes * 2 >= voters)
                    .cloned()
                    .collect();
                self.rank_consensus(&majority, voters, |a| stats::mean(&a.confidences()))
            }
            VotingStrategy::EnhancedWeightedAverage => {
                self.calculator
                    .enhanced_from_aggregations(aggregations.clone())
            }
        };

        if results.is_empty() {
            return Err(VotingError::NoCandidates);
        }

        let diagnostics = self.diagnostics(&aggregations, &results, voters, outliers_removed);
        debug!(
            strategy = ?diagnostics.strategy,
            voters,
            candidates = diagnostics.candidate_codes,
            consensus = diagnostics.consensus_codes,
            voting_score = diagnostics.voting_score,
            "Voting complete"
        );

        Ok(VotingOutcome {
            results,
            diagnostics,
        })
    }

    fn rank_consensus<F>(
        &self,
        aggregations: &[CodeVoteAggregation],
        voters: usize,
        confidence_of: F,
    ) -> Vec<ClassificationResult>
    where
        F: Fn(&CodeVoteAggregation) -> f64,
    {
        let mut ranked: Vec<(ClassificationResult, usize, f64)> = aggregations
            .iter()
            .filter(|a| a.total_votes > 0)
            .map(|agg| {
                let mut result = agg.merged.clone();
                result.set_confidence(confidence_of(agg));
                result.match_type = agg.composite_match_type();
                result.weight = agg
                    .contributions
                    .iter()
                    .map(|c| c.weight)
                    .fold(0.0, f64::max);

                let agreement = agg.total_votes as f64 / voters as f64;
                if agreement >= self.config.required_agreement {
                    result.add_reason(format!(
                        "consensus of {} of {} strategies",
                        agg.total_votes, voters
                    ));
                }
                (result, agg.total_votes, agg.max_confidence())
            })
            .collect();

        ranked.sort_by(|(a, _, _), (b, _, _)| {
            stats::desc(a.confidence, b.confidence).then_with(|| a.key().cmp(&b.key()))
        });
        if self.config.enable_tie_breaking {
            stats::settle_near_ties(
                &mut ranked,
                TIE_EPSILON,
                |(r, _, _)| r.confidence,
                |(a, a_votes, a_max), (b, b_votes, b_max)| {
                    b_votes
                        .cmp(a_votes)
                        .then_with(|| stats::desc(*a_max, *b_max))
                        .then_with(|| a.key().cmp(&b.key()))
                },
            );
        }

        ranked.into_iter().map(|(r, _, _)| r).collect()
    }

    fn diagnostics(
        &self,
        aggregations: &[CodeVoteAggregation],
        results: &[ClassificationResult],
        voters: usize,
        outliers_removed: usize,
    ) -> VotingDiagnostics {
        let agreements: Vec<f64> = aggregations
            .iter()
            .map(|a| a.total_votes as f64 / voters as f64)
            .collect();
        let consensus_codes = agreements
            .iter()
            .filter(|&&a| a >= self.config.required_agreement)
            .count();

        let confidences: Vec<f64> = results.iter().map(|r| r.confidence).collect();
        let average_confidence = stats::mean(&confidences);

        let consistency = stats::mean(
            &aggregations
                .iter()
                .map(|a| (1.0 - a.confidence_variance.sqrt() / 0.25).max(0.0))
                .collect::<Vec<_>>(),
        );

        let contributing: BTreeSet<&str> = aggregations
            .iter()
            .flat_map(|a| a.contributions.iter().map(|c| c.strategy_name.as_str()))
            .collect();
        let diversity = (contributing.len() as f64 / voters as f64).min(1.0);

        let voting_score = crate::text::clamp_unit(
            self.config.confidence_weight * average_confidence
                + self.config.consistency_weight * consistency
                + self.config.diversity_weight * diversity,
        );

        VotingDiagnostics {
            strategy: self.config.strategy,
            voters,
            candidate_codes: aggregations.len(),
            consensus_codes,
            agreement_score: stats::mean(&agreements),
            voting_score,
            outliers_removed,
        }
    }
}
