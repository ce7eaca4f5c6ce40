//! Per-result confidence scoring
//!
//! Produces an explainable [`ConfidenceScore`] for one candidate.
//!
//! # Factors (weight)
//! - **Text match** (0.25): Jaccard of request and description keywords
//! - **Keyword match** (0.25): code keywords found as whole words in the request
//! - **Name match** (0.15): best normalized Levenshtein similarity between
//!   business-name tokens and code keywords
//! - **Code quality** (0.15): the code's intrinsic confidence
//! - **Usage frequency** (0.10): evidence volume and strategy weight
//! - **Validation** (0.10): code format check for the code type
//!
//! Overall = `0.5 * result confidence + 0.5 * weighted factors`.

use indclass_common::{CodeType, IndustryCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::level::ConfidenceLevel;
use crate::text::{clamp_unit, contains_word, extract_keywords, jaccard_similarity};
use crate::types::ClassificationResult;

/// Validation outcome for a scored result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Valid,
    /// Well-formed code with low intrinsic confidence
    Warning,
    /// Code does not match its type's format
    Invalid,
}

/// Named sub-scores, each in [0, 1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceFactors {
    pub text_match: f64,
    pub keyword_match: f64,
    pub name_match: f64,
    pub code_quality: f64,
    pub usage_frequency: f64,
    pub validation: f64,
}

impl ConfidenceFactors {
    /// Factor blend used by the overall score
    pub fn weighted(&self) -> f64 {
        clamp_unit(
            self.text_match * 0.25
                + self.keyword_match * 0.25
                + self.name_match * 0.15
                + self.code_quality * 0.15
                + self.usage_frequency * 0.10
                + self.validation * 0.10,
        )
    }
}

/// Explainability record for one result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceScore {
    pub overall: f64,
    pub level: ConfidenceLevel,
    pub validation_status: ValidationStatus,
    pub factors: ConfidenceFactors,
}

impl ConfidenceScore {
    /// Score carrying only the result's own confidence
    ///
    /// Used when scoring fails; factors mirror the confidence so downstream
    /// blends stay neutral.
    pub fn from_confidence(confidence: f64) -> Self {
        let confidence = clamp_unit(confidence);
        Self {
            overall: confidence,
            level: ConfidenceLevel::from_score(confidence),
            validation_status: ValidationStatus::Valid,
            factors: ConfidenceFactors {
                text_match: confidence,
                keyword_match: confidence,
                name_match: confidence,
                code_quality: confidence,
                usage_frequency: confidence,
                validation: 1.0,
            },
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ScoringError {
    #[error("Result has an empty code")]
    EmptyCode,

    #[error("Result confidence is not a finite number")]
    NonFiniteConfidence,
}

/// Request-side data the scorer compares against
#[derive(Debug, Clone, Default)]
pub struct ScoringContext {
    /// Keywords of the full analysis text
    pub request_keywords: Vec<String>,
    /// Keywords of the business name alone
    pub name_keywords: Vec<String>,
    /// Normalized analysis text for word-boundary checks
    pub analysis_text: String,
}

impl ScoringContext {
    pub fn new(business_name: &str, analysis_text: &str) -> Self {
        Self {
            request_keywords: extract_keywords(analysis_text),
            name_keywords: extract_keywords(business_name),
            analysis_text: analysis_text.to_lowercase(),
        }
    }
}

/// Whether a code string is well-formed for its type
pub fn is_valid_code_format(code: &str, code_type: CodeType) -> bool {
    let digits = !code.is_empty() && code.chars().all(|c| c.is_ascii_digit());
    match code_type {
        CodeType::Sic | CodeType::Mcc => digits && code.len() == 4,
        CodeType::Naics => digits && (2..=6).contains(&code.len()),
    }
}

#[derive(Debug, Clone)]
pub struct ConfidenceScorer {
    /// Intrinsic confidence below which a valid code is flagged
    low_quality_threshold: f64,
}

impl Default for ConfidenceScorer {
    fn default() -> Self {
        Self {
            low_quality_threshold: 0.5,
        }
    }
}

impl ConfidenceScorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn score(
        &self,
        result: &ClassificationResult,
        ctx: &ScoringContext,
    ) -> Result<ConfidenceScore, ScoringError> {
        if result.code.code.trim().is_empty() {
            return Err(ScoringError::EmptyCode);
        }
        if !result.confidence.is_finite() {
            return Err(ScoringError::NonFiniteConfidence);
        }

        let code = &result.code;
        let format_ok = is_valid_code_format(&code.code, code.code_type);
        let validation_status = if !format_ok {
            ValidationStatus::Invalid
        } else if code.confidence < self.low_quality_threshold {
            ValidationStatus::Warning
        } else {
            ValidationStatus::Valid
        };

        let factors = ConfidenceFactors {
            text_match: self.text_match(code, ctx),
            keyword_match: self.keyword_match(code, ctx),
            name_match: self.name_match(code, ctx),
            code_quality: clamp_unit(code.confidence),
            usage_frequency: self.usage_frequency(result),
            validation: match validation_status {
                ValidationStatus::Valid => 1.0,
                ValidationStatus::Warning => 0.6,
                ValidationStatus::Invalid => 0.2,
            },
        };

        let overall = clamp_unit(0.5 * result.confidence + 0.5 * factors.weighted());

        Ok(ConfidenceScore {
            overall,
            level: ConfidenceLevel::from_score(overall),
            validation_status,
            factors,
        })
    }

    fn text_match(&self, code: &IndustryCode, ctx: &ScoringContext) -> f64 {
        let description = extract_keywords(&code.description);
        jaccard_similarity(&ctx.request_keywords, &description)
    }

    /// Fraction of code keywords present, saturating after three hits
    fn keyword_match(&self, code: &IndustryCode, ctx: &ScoringContext) -> f64 {
        if code.keywords.is_empty() {
            return 0.0;
        }
        let hits = code
            .keywords
            .iter()
            .filter(|k| contains_word(&ctx.analysis_text, k))
            .count();
        let target = code.keywords.len().min(3);
        clamp_unit(hits as f64 / target as f64)
    }

    fn name_match(&self, code: &IndustryCode, ctx: &ScoringContext) -> f64 {
        ctx.name_keywords
            .iter()
            .flat_map(|name| {
                code.keywords
                    .iter()
                    .map(move |k| strsim::normalized_levenshtein(name, &k.to_lowercase()))
            })
            .fold(0.0, f64::max)
    }

    fn usage_frequency(&self, result: &ClassificationResult) -> f64 {
        clamp_unit(0.2 + 0.1 * result.evidence_count() as f64 + 0.3 * result.weight.min(1.0))
    }
}
