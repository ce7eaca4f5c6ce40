//! Per-strategy performance tracking
//!
//! Keeps a sliding window of recent outcome confidences per strategy name.
//! The tracker is an explicit object owned by the classifier and passed
//! to the calculator when adaptive weights are computed; it lives as long
//! as the classifier instance and is cleared only through [`reset`].
//!
//! [`reset`]: PerformanceTracker::reset

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Samples averaged for the recency factor
const RECENT_SAMPLES: usize = 5;

/// Adaptive weighting settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveConfig {
    pub enabled: bool,
    /// Outcomes remembered per strategy
    pub window_size: usize,
    /// Outcome confidence above which a run counts as successful
    pub success_threshold: f64,
    pub min_weight: f64,
    pub max_weight: f64,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_size: 20,
            success_threshold: 0.5,
            min_weight: 0.1,
            max_weight: 1.5,
        }
    }
}

/// Summary of one strategy's recent outcomes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyPerformance {
    pub samples: usize,
    /// Fraction of outcomes above the success threshold
    pub success_rate: f64,
    pub average_confidence: f64,
    /// Mean of the newest outcomes
    pub recent_average: f64,
    /// 1.0 for identical outcomes, falling to 0.0 as spread grows
    pub consistency: f64,
    /// `0.5 * success_rate + 0.5 * average_confidence`
    pub performance_score: f64,
}

#[derive(Debug, Clone)]
pub struct PerformanceTracker {
    window_size: usize,
    success_threshold: f64,
    history: HashMap<String, VecDeque<f64>>,
}

impl PerformanceTracker {
    pub fn new(config: &AdaptiveConfig) -> Self {
        Self {
            window_size: config.window_size.max(1),
            success_threshold: config.success_threshold,
            history: HashMap::new(),
        }
    }

    /// Record one outcome, evicting the oldest beyond the window
    pub fn record(&mut self, strategy: &str, confidence: f64) {
        let window = self.history.entry(strategy.to_string()).or_default();
        window.push_back(crate::text::clamp_unit(confidence));
        while window.len() > self.window_size {
            window.pop_front();
        }
    }

    pub fn samples(&self, strategy: &str) -> usize {
        self.history.get(strategy).map_or(0, VecDeque::len)
    }

    /// Performance summary, `None` when the strategy has no history
    pub fn performance(&self, strategy: &str) -> Option<StrategyPerformance> {
        let window = self.history.get(strategy).filter(|w| !w.is_empty())?;
        let n = window.len() as f64;

        let average = window.iter().sum::<f64>() / n;
        let successes = window
            .iter()
            .filter(|&&c| c > self.success_threshold)
            .count();
        let success_rate = successes as f64 / n;

        let variance = window.iter().map(|c| (c - average).powi(2)).sum::<f64>() / n;
        let consistency = (1.0 - variance.sqrt() / 0.25).max(0.0);

        let recent: Vec<f64> = window.iter().rev().take(RECENT_SAMPLES).copied().collect();
        let recent_average = recent.iter().sum::<f64>() / recent.len() as f64;

        Some(StrategyPerformance {
            samples: window.len(),
            success_rate,
            average_confidence: average,
            recent_average,
            consistency,
            performance_score: 0.5 * success_rate + 0.5 * average,
        })
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }
}

impl Default for PerformanceTracker {
    fn default() -> Self {
        Self::new(&AdaptiveConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_history() {
        let tracker = PerformanceTracker::default();
        assert!(tracker.performance("keyword").is_none());
        assert_eq!(tracker.samples("keyword"), 0);
    }

    #[test]
    fn test_window_evicts_oldest() {
        let mut tracker = PerformanceTracker::default();
        for _ in 0..20 {
            tracker.record("keyword", 0.1);
        }
        for _ in 0..5 {
            tracker.record("keyword", 0.9);
        }
        assert_eq!(tracker.samples("keyword"), 20);

        let perf = tracker.performance("keyword").unwrap();
        // 15 x 0.1 and 5 x 0.9 remain
        assert!((perf.average_confidence - 0.3).abs() < 1e-9);
        assert!((perf.success_rate - 0.25).abs() < 1e-9);
        assert!((perf.recent_average - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_performance_score() {
        let mut tracker = PerformanceTracker::default();
        tracker.record("description", 0.8);
        tracker.record("description", 0.8);

        let perf = tracker.performance("description").unwrap();
        assert_eq!(perf.success_rate, 1.0);
        assert!((perf.performance_score - 0.9).abs() < 1e-9);
        assert_eq!(perf.consistency, 1.0);
    }

    #[test]
    fn test_reset_clears_history() {
        let mut tracker = PerformanceTracker::default();
        tracker.record("keyword", 0.5);
        tracker.reset();
        assert!(tracker.performance("keyword").is_none());
    }
}
