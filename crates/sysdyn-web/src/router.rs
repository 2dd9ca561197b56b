//! Axum router — maps all URL paths to handlers.

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::handlers::{
    convert::convert_model,
    simulate::{simulate, simulation_summary},
    structure::{causal_loops, feedback_loops, model_report, sd_report},
    upload::upload_model,
    visualize::{stock_flow_diagram, visualize},
};
use crate::state::{AppState, SharedState};

/// Build and return the full Axum router.
pub fn build_router(state: AppState) -> Router {
    // Leave headroom above the configured payload cap for multipart framing
    let body_limit = state.config.upload.max_bytes + 64 * 1024;
    let shared: SharedState = Arc::new(state);

    Router::new()
        .route("/upload", post(upload_model))
        .route("/simulate", get(simulate))
        .route("/visualize", get(visualize))
        .route("/convert", get(convert_model))
        .route("/sfd", get(stock_flow_diagram))
        .route("/cld", get(causal_loops))

        // Report endpoints
        .route("/model_report", get(model_report))
        .route("/simulation_summary", get(simulation_summary))
        .route("/feedback_loops", get(feedback_loops))
        .route("/sd_report", get(sd_report))

        // Middleware
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}
