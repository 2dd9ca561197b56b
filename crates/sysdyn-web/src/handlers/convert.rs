//! Python conversion download.

use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use chrono::Utc;

use sysdyn_convert::generate_python;

use crate::error::ApiError;
use crate::state::SharedState;

/// GET /convert — the loaded model as a standalone Python script.
pub async fn convert_model(State(state): State<SharedState>) -> Result<Response, ApiError> {
    let session = state.session.read().await;
    let loaded = session.model.as_ref().ok_or_else(ApiError::no_model)?;

    let source = generate_python(&loaded.model, Utc::now())?;
    let filename = format!(
        "{}.py",
        loaded.model.ir.name.replace(|c: char| c.is_whitespace(), "_")
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/x-python; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        source,
    )
        .into_response())
}
