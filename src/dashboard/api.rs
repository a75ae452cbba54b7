//! Dashboard HTTP API
//!
//! REST endpoints backing the dashboard charts. Every aggregate endpoint
//! accepts `start`/`end` query parameters.

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use super::types::*;
use super::DashboardContext;
use crate::analytics::{self, DateRange};
use crate::data::AdRecord;

/// Create the API router with all endpoints
pub fn create_router(context: Arc<DashboardContext>) -> Router {
    Router::new()
        // Aggregates
        .route("/api/revenue", get(get_revenue))
        .route("/api/performance", get(get_performance))
        .route("/api/platforms", get(get_platforms))
        .route("/api/formats", get(get_formats))
        .route("/api/bid-roas", get(get_bid_roas))
        .route("/api/audience", get(get_audience))
        .route("/api/suggestions", get(get_suggestions))
        // Data lifecycle
        .route("/api/range", get(get_range))
        .route("/api/reload", post(post_reload))
        // State
        .with_state(context)
        // CORS for frontend
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

async fn respond<T: Serialize>(
    context: &DashboardContext,
    query: RangeQuery,
    f: impl FnOnce(&[AdRecord], &DateRange) -> T,
) -> Json<ApiResponse<T>> {
    match context.query(query, f).await {
        Ok(data) => Json(ApiResponse::success(data)),
        Err(msg) => Json(ApiResponse::error(msg)),
    }
}

// ─────────────────────────────────────────────────────────────────
// API Handlers
// ─────────────────────────────────────────────────────────────────

/// GET /api/revenue - Revenue per day
async fn get_revenue(
    State(context): State<Arc<DashboardContext>>,
    Query(query): Query<RangeQuery>,
) -> impl IntoResponse {
    respond(&context, query, analytics::revenue_over_time).await
}

/// GET /api/performance - Average CTR vs. the whole dataset
async fn get_performance(
    State(context): State<Arc<DashboardContext>>,
    Query(query): Query<RangeQuery>,
) -> impl IntoResponse {
    respond(&context, query, analytics::performance_summary).await
}

/// GET /api/platforms - Revenue and ROAS per platform
async fn get_platforms(
    State(context): State<Arc<DashboardContext>>,
    Query(query): Query<RangeQuery>,
) -> impl IntoResponse {
    respond(&context, query, analytics::platform_performance).await
}

/// GET /api/formats - CTR and CVR per format
async fn get_formats(
    State(context): State<Arc<DashboardContext>>,
    Query(query): Query<RangeQuery>,
) -> impl IntoResponse {
    respond(&context, query, analytics::format_effectiveness).await
}

/// GET /api/bid-roas - Scatter points
async fn get_bid_roas(
    State(context): State<Arc<DashboardContext>>,
    Query(query): Query<RangeQuery>,
) -> impl IntoResponse {
    respond(&context, query, analytics::bid_roas_points).await
}

/// GET /api/audience - Per-audience metrics
async fn get_audience(
    State(context): State<Arc<DashboardContext>>,
    Query(query): Query<RangeQuery>,
) -> impl IntoResponse {
    respond(&context, query, analytics::audience_analysis).await
}

/// GET /api/suggestions - Pricing suggestions
async fn get_suggestions(
    State(context): State<Arc<DashboardContext>>,
    Query(query): Query<RangeQuery>,
) -> impl IntoResponse {
    respond(&context, query, analytics::optimization_suggestions).await
}

/// GET /api/range - Loaded date range and load status
async fn get_range(State(context): State<Arc<DashboardContext>>) -> impl IntoResponse {
    Json(ApiResponse::success(context.data_range().await))
}

/// POST /api/reload - Re-read the CSV
async fn post_reload(State(context): State<Arc<DashboardContext>>) -> impl IntoResponse {
    match context.reload().await {
        Ok(summary) => Json(ApiResponse::success(summary)),
        Err(e) => Json(ApiResponse::error(e.to_string())),
    }
}
