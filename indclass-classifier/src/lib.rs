//! indclass-classifier library interface
//!
//! Multi-strategy classification of business descriptions into SIC, NAICS
//! and MCC codes, plus the HTTP surface that serves it.

pub mod aggregation;
pub mod api;
pub mod bootstrap;
pub mod classifier;
pub mod confidence;
pub mod config;
pub mod error;
pub mod filter;
pub mod ranking;
pub mod stats;
pub mod strategies;
pub mod text;
pub mod types;
pub mod voting;

pub use crate::classifier::{
    ClassificationRequest, ClassificationResponse, IndustryClassifier, ENHANCED_AGGREGATION,
};
pub use crate::config::ServiceConfig;
pub use crate::error::{ApiError, ApiResult, ClassifyError};
pub use crate::types::ClassificationResult;

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub classifier: Arc<IndustryClassifier>,
    /// Deadline applied to every request
    pub request_timeout: Option<Duration>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(classifier: Arc<IndustryClassifier>, request_timeout: Option<Duration>) -> Self {
        Self {
            classifier,
            request_timeout,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::classify_routes())
        .merge(api::health_routes())
        .with_state(state)
}
