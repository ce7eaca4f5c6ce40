//! Classification API handlers
//!
//! POST /classify, POST /aggregate, GET /codes/stats,
//! GET /strategies/performance, POST /strategies/performance/reset

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use indclass_common::{CodeStats, CodeStore, RequestContext};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, error};

use crate::aggregation::{AggregatedResults, AggregationRequest};
use crate::classifier::{ClassificationRequest, ClassificationResponse};
use crate::confidence::StrategyPerformance;
use crate::error::{ApiError, ApiResult, ClassifyError};
use crate::AppState;

/// Request context carrying the configured deadline, if any
fn request_context(state: &AppState) -> RequestContext {
    match state.request_timeout {
        Some(timeout) => RequestContext::with_timeout(timeout),
        None => RequestContext::new(),
    }
}

/// Log and remember server-side failures for /health
async fn record_failure(state: &AppState, err: &ClassifyError) {
    if matches!(err, ClassifyError::InvalidRequest(_)) {
        return;
    }
    error!(error = %err, "Classification request failed");
    *state.last_error.write().await = Some(err.to_string());
}

/// POST /classify
pub async fn classify(
    State(state): State<AppState>,
    Json(request): Json<ClassificationRequest>,
) -> ApiResult<Json<ClassificationResponse>> {
    let ctx = request_context(&state);
    match state.classifier.classify_business(&ctx, request).await {
        Ok(response) => Ok(Json(response)),
        Err(e) => {
            record_failure(&state, &e).await;
            Err(e.into())
        }
    }
}

/// POST /aggregate
pub async fn aggregate(
    State(state): State<AppState>,
    Json(request): Json<AggregationRequest>,
) -> ApiResult<Json<AggregatedResults>> {
    let ctx = request_context(&state);
    debug!(results = request.results.len(), "Aggregating caller results");
    let aggregated = state.classifier.aggregate_and_present(&ctx, request)?;
    Ok(Json(aggregated))
}

/// GET /codes/stats
pub async fn code_stats(State(state): State<AppState>) -> ApiResult<Json<CodeStats>> {
    let ctx = request_context(&state);
    let stats = state
        .classifier
        .store()
        .get_code_stats(&ctx)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(stats))
}

#[derive(Debug, Serialize)]
pub struct PerformanceResponse {
    pub strategies: BTreeMap<String, StrategyPerformance>,
}

/// GET /strategies/performance
pub async fn strategy_performance(State(state): State<AppState>) -> Json<PerformanceResponse> {
    Json(PerformanceResponse {
        strategies: state.classifier.strategy_performance().await,
    })
}

/// POST /strategies/performance/reset
pub async fn reset_strategy_performance(
    State(state): State<AppState>,
) -> Json<PerformanceResponse> {
    state.classifier.reset_performance().await;
    Json(PerformanceResponse {
        strategies: BTreeMap::new(),
    })
}

/// Build classification routes
pub fn classify_routes() -> Router<AppState> {
    Router::new()
        .route("/classify", post(classify))
        .route("/aggregate", post(aggregate))
        .route("/codes/stats", get(code_stats))
        .route("/strategies/performance", get(strategy_performance))
        .route(
            "/strategies/performance/reset",
            post(reset_strategy_performance),
        )
}
