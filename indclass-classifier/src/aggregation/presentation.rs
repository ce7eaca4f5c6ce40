//! Presentation views
//!
//! Each [`PresentationFormat`] renders to its own typed view. The view is
//! derived only from the returned results and, when computed, the analytics.

use indclass_common::CodeType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::analytics::{self, Analytics};
use super::types::{AggregatedResult, PresentationFormat};
use crate::confidence::ConfidenceLevel;
use crate::stats;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", content = "view", rename_all = "snake_case")]
pub enum Presentation {
    Detailed(DetailedView),
    Summary(SummaryView),
    Compact(CompactView),
    Export(ExportView),
    Dashboard(DashboardView),
    Api(ApiView),
}

impl Presentation {
    pub fn render(
        format: PresentationFormat,
        results: &[AggregatedResult],
        analytics: Option<&Analytics>,
    ) -> Self {
        match format {
            PresentationFormat::Detailed => Self::Detailed(DetailedView {
                results: results.to_vec(),
                analytics: analytics.cloned(),
            }),
            PresentationFormat::Summary => Self::Summary(summary(results)),
            PresentationFormat::Compact => Self::Compact(CompactView {
                entries: results
                    .iter()
                    .map(|r| CompactEntry {
                        label: format!("{} {}", r.result.code_type().label(), r.result.code.code),
                        confidence: round2(r.result.confidence),
                    })
                    .collect(),
            }),
            PresentationFormat::Export => Self::Export(export(results)),
            PresentationFormat::Dashboard => Self::Dashboard(dashboard(results, analytics)),
            PresentationFormat::Api => Self::Api(ApiView {
                count: results.len(),
                results: results.iter().map(ApiEntry::from).collect(),
            }),
        }
    }

    pub fn format(&self) -> PresentationFormat {
        match self {
            Self::Detailed(_) => PresentationFormat::Detailed,
            Self::Summary(_) => PresentationFormat::Summary,
            Self::Compact(_) => PresentationFormat::Compact,
            Self::Export(_) => PresentationFormat::Export,
            Self::Dashboard(_) => PresentationFormat::Dashboard,
            Self::Api(_) => PresentationFormat::Api,
        }
    }
}

/// Every field of every result, plus analytics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedView {
    pub results: Vec<AggregatedResult>,
    pub analytics: Option<Analytics>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryEntry {
    pub code: String,
    pub code_type: CodeType,
    pub description: String,
    pub confidence: f64,
    pub confidence_level: ConfidenceLevel,
}

impl From<&AggregatedResult> for SummaryEntry {
    fn from(r: &AggregatedResult) -> Self {
        Self {
            code: r.result.code.code.clone(),
            code_type: r.result.code_type(),
            description: r.result.code.description.clone(),
            confidence: r.result.confidence,
            confidence_level: r.confidence_level,
        }
    }
}

/// Best result per code type and a one-line headline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryView {
    pub headline: String,
    pub top_by_type: Vec<SummaryEntry>,
    pub total_results: usize,
    pub average_confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactEntry {
    /// "SIC 5812"
    pub label: String,
    /// Rounded to two decimals
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactView {
    pub entries: Vec<CompactEntry>,
}

/// Tabular rows for spreadsheet export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportView {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardView {
    pub total_results: usize,
    pub results_by_type: BTreeMap<CodeType, usize>,
    pub average_confidence: f64,
    pub top_result: Option<SummaryEntry>,
    /// Keyed by confidence level name
    pub level_distribution: BTreeMap<String, usize>,
    /// Keyed by match strength name
    pub strength_distribution: BTreeMap<String, usize>,
    pub certainty_score: f64,
    pub recommendations: Vec<String>,
}

/// Flat records for programmatic consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEntry {
    pub code: String,
    pub code_type: CodeType,
    pub description: String,
    pub category: String,
    pub confidence: f64,
    pub score: f64,
    pub rank: usize,
    pub match_type: String,
}

impl From<&AggregatedResult> for ApiEntry {
    fn from(r: &AggregatedResult) -> Self {
        Self {
            code: r.result.code.code.clone(),
            code_type: r.result.code_type(),
            description: r.result.code.description.clone(),
            category: r.result.code.category.clone(),
            confidence: r.result.confidence,
            score: r.aggregation_score,
            rank: r.overall_rank,
            match_type: r.result.match_type.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiView {
    pub count: usize,
    pub results: Vec<ApiEntry>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn average_confidence(results: &[AggregatedResult]) -> f64 {
    let values: Vec<f64> = results.iter().map(|r| r.result.confidence).collect();
    stats::mean(&values)
}

/// First result of each type in result order
fn top_by_type(results: &[AggregatedResult]) -> Vec<SummaryEntry> {
    let mut seen = Vec::new();
    let mut entries = Vec::new();
    for r in results {
        let code_type = r.result.code_type();
        if !seen.contains(&code_type) {
            seen.push(code_type);
            entries.push(SummaryEntry::from(r));
        }
    }
    entries
}

fn summary(results: &[AggregatedResult]) -> SummaryView {
    let headline = match results.first() {
        Some(top) => format!(
            "Best match: {} {} ({}) at {:.0}% confidence",
            top.result.code_type().label(),
            top.result.code.code,
            top.result.code.description,
            top.result.confidence * 100.0
        ),
        None => "No classification matched".to_string(),
    };

    SummaryView {
        headline,
        top_by_type: top_by_type(results),
        total_results: results.len(),
        average_confidence: average_confidence(results),
    }
}

fn export(results: &[AggregatedResult]) -> ExportView {
    let headers = [
        "rank",
        "code_type",
        "code",
        "description",
        "category",
        "confidence",
        "aggregation_score",
        "confidence_level",
        "match_strength",
        "match_type",
        "matched_on",
    ]
    .iter()
    .map(|h| h.to_string())
    .collect();

    let rows = results
        .iter()
        .map(|r| {
            vec![
                r.overall_rank.to_string(),
                r.result.code_type().as_str().to_string(),
                r.result.code.code.clone(),
                r.result.code.description.clone(),
                r.result.code.category.clone(),
                format!("{:.4}", r.result.confidence),
                format!("{:.4}", r.aggregation_score),
                r.confidence_level.as_str().to_string(),
                r.match_strength.as_str().to_string(),
                r.result.match_type.clone(),
                r.result.matched_on.join(";"),
            ]
        })
        .collect();

    ExportView { headers, rows }
}

fn dashboard(results: &[AggregatedResult], analytics: Option<&Analytics>) -> DashboardView {
    let mut results_by_type = BTreeMap::new();
    let mut level_distribution = BTreeMap::new();
    let mut strength_distribution = BTreeMap::new();
    for r in results {
        *results_by_type.entry(r.result.code_type()).or_insert(0) += 1;
        *level_distribution
            .entry(r.confidence_level.as_str().to_string())
            .or_insert(0) += 1;
        *strength_distribution
            .entry(r.match_strength.as_str().to_string())
            .or_insert(0) += 1;
    }

    let (certainty_score, recommendations) = match analytics {
        Some(a) => (a.certainty_score, a.quality.recommendations.clone()),
        None => (analytics::certainty_score(results), Vec::new()),
    };

    DashboardView {
        total_results: results.len(),
        results_by_type,
        average_confidence: average_confidence(results),
        top_result: results.first().map(SummaryEntry::from),
        level_distribution,
        strength_distribution,
        certainty_score,
        recommendations,
    }
}
