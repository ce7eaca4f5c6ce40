//! Confidence level buckets
//!
//! Two scales exist for the same labels. The calculator scale
//! (0.9/0.8/0.6/0.3) applies to strategy confidence and
//! [`ConfidenceScore`](super::ConfidenceScore); the presentation scale
//! (0.9/0.75/0.5/0.25) applies to aggregated, user-facing results.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    /// No results to judge
    None,
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl ConfidenceLevel {
    /// Calculator scale: 0.9 / 0.8 / 0.6 / 0.3
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            Self::VeryHigh
        } else if score >= 0.8 {
            Self::High
        } else if score >= 0.6 {
            Self::Medium
        } else if score >= 0.3 {
            Self::Low
        } else {
            Self::VeryLow
        }
    }

    /// Presentation scale: 0.9 / 0.75 / 0.5 / 0.25
    pub fn from_presentation_score(score: f64) -> Self {
        if score >= 0.9 {
            Self::VeryHigh
        } else if score >= 0.75 {
            Self::High
        } else if score >= 0.5 {
            Self::Medium
        } else if score >= 0.25 {
            Self::Low
        } else {
            Self::VeryLow
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::VeryLow => "very_low",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::VeryHigh => "very_high",
        }
    }

    /// High or very high
    pub fn is_high(&self) -> bool {
        matches!(self, Self::High | Self::VeryHigh)
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
