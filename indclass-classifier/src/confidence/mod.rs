//! Confidence scoring, calculation and performance tracking

pub mod calculator;
pub mod level;
pub mod performance;
pub mod scorer;

pub use calculator::{ConfidenceCalculator, StrategyConfidence};
pub use level::ConfidenceLevel;
pub use performance::{AdaptiveConfig, PerformanceTracker, StrategyPerformance};
pub use scorer::{
    ConfidenceFactors, ConfidenceScore, ConfidenceScorer, ScoringContext, ScoringError,
    ValidationStatus,
};
