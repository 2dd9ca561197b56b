//! Model upload.

use axum::extract::{Multipart, State};
use axum::Json;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use sysdyn_engine::compile;
use sysdyn_model::{parse_model, ModelFormat};

use crate::error::ApiError;
use crate::state::{LoadedModel, Session, SharedState};

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub model_id: Uuid,
    pub format: ModelFormat,
    pub variables: usize,
}

/// POST /upload — multipart form with a `file` field. Replaces the
/// session: the previous model and any simulation results are dropped.
pub async fn upload_model(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut uploaded: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_upload(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("model").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_upload(e.to_string()))?;
        uploaded = Some((filename, data.to_vec()));
        break;
    }

    let (filename, data) =
        uploaded.ok_or_else(|| ApiError::bad_upload("multipart field `file` is required"))?;
    let max_bytes = state.config.upload.max_bytes;
    if data.len() > max_bytes {
        return Err(ApiError::bad_upload(format!(
            "upload of {} bytes exceeds the limit of {max_bytes}",
            data.len()
        )));
    }

    let (format, ir) = parse_model(&filename, &data)?;
    let compiled = compile(ir)?;
    let loaded = LoadedModel {
        id: Uuid::new_v4(),
        format,
        filename: filename.clone(),
        model: compiled,
    };
    info!(
        model_id = %loaded.id,
        file = %filename,
        format = ?format,
        variables = loaded.model.ir.variables.len(),
        "model loaded"
    );

    let response = UploadResponse {
        message: format!("Model {filename} loaded successfully."),
        model_id: loaded.id,
        format,
        variables: loaded.model.ir.variables.len(),
    };
    let mut session = state.session.write().await;
    *session = Session {
        model: Some(loaded),
        results: None,
    };
    Ok(Json(response))
}
