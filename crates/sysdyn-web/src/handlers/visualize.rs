//! Image endpoints: results plot and stock-and-flow diagram.
//!
//! Rendering is CPU-bound, so the session data is cloned out of the lock
//! and the work runs on the blocking pool.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use sysdyn_render::{png_base64, render_results_png, render_sfd_png};

use crate::error::ApiError;
use crate::state::SharedState;

#[derive(Debug, Serialize)]
pub struct ImageResponse {
    pub image_base64: String,
    pub message: String,
}

/// GET /visualize — line plot of the recorded time series.
pub async fn visualize(State(state): State<SharedState>) -> Result<Json<ImageResponse>, ApiError> {
    let (results, title) = {
        let session = state.session.read().await;
        let results = session.results.clone().ok_or_else(ApiError::no_results)?;
        let title = session
            .model
            .as_ref()
            .map(|m| m.model.ir.name.clone())
            .unwrap_or_else(|| "simulation".to_string());
        (results, title)
    };
    let render = state.config.render.clone();

    let png = tokio::task::spawn_blocking(move || {
        render_results_png(&results, &title, render.plot_width, render.plot_height)
    })
    .await
    .map_err(|e| ApiError::internal(e.to_string()))??;

    Ok(Json(ImageResponse {
        image_base64: png_base64(&png),
        message: "Visualization generated.".to_string(),
    }))
}

/// GET /sfd — diagram of the loaded model's structure.
pub async fn stock_flow_diagram(
    State(state): State<SharedState>,
) -> Result<Json<ImageResponse>, ApiError> {
    let ir = {
        let session = state.session.read().await;
        let loaded = session.model.as_ref().ok_or_else(ApiError::no_model)?;
        loaded.model.ir.clone()
    };
    let render = state.config.render.clone();

    let png = tokio::task::spawn_blocking(move || {
        render_sfd_png(&ir, render.diagram_width, render.diagram_height)
    })
    .await
    .map_err(|e| ApiError::internal(e.to_string()))??;

    Ok(Json(ImageResponse {
        image_base64: png_base64(&png),
        message: "Stock and flow diagram generated.".to_string(),
    }))
}
