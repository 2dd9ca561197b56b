//! Structure endpoints: inventory, causal loops and the combined report.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use sysdyn_analysis::{find_loops, structure_report, CausalGraph, LoopPolarity, StructureReport};

use crate::error::ApiError;
use crate::handlers::simulate::{build_summary, SummaryResponse};
use crate::state::SharedState;

/// GET /model_report — stocks / flows / auxiliaries / constants.
pub async fn model_report(
    State(state): State<SharedState>,
) -> Result<Json<StructureReport>, ApiError> {
    let session = state.session.read().await;
    let loaded = session.model.as_ref().ok_or_else(ApiError::no_model)?;
    Ok(Json(structure_report(&loaded.model.ir)))
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum CldResponse {
    Empty { message: String },
    Loops { loops: Vec<Vec<String>>, count: usize },
}

/// GET /cld — the feedback loops as plain member lists.
pub async fn causal_loops(State(state): State<SharedState>) -> Result<Json<CldResponse>, ApiError> {
    let session = state.session.read().await;
    let loaded = session.model.as_ref().ok_or_else(ApiError::no_model)?;
    let graph = CausalGraph::from_ir(&loaded.model.ir);
    let loops = find_loops(&graph, state.config.simulation.max_loops);
    if loops.is_empty() {
        return Ok(Json(CldResponse::Empty {
            message: "No causal loops detected in model.".to_string(),
        }));
    }
    Ok(Json(CldResponse::Loops {
        count: loops.len(),
        loops: loops.into_iter().map(|l| l.variables).collect(),
    }))
}

#[derive(Debug, Serialize)]
pub struct AnnotatedLoop {
    #[serde(rename = "loop")]
    pub variables: Vec<String>,
    pub polarity: LoopPolarity,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum FeedbackLoopsResponse {
    Empty { message: String },
    Loops { feedback_loops: Vec<AnnotatedLoop> },
}

/// GET /feedback_loops — loops with polarity classification.
pub async fn feedback_loops(
    State(state): State<SharedState>,
) -> Result<Json<FeedbackLoopsResponse>, ApiError> {
    let session = state.session.read().await;
    let loaded = session.model.as_ref().ok_or_else(ApiError::no_model)?;
    Ok(Json(annotated_loops(&loaded.model.ir, state.config.simulation.max_loops)))
}

fn annotated_loops(ir: &sysdyn_common::ModelIr, max_loops: usize) -> FeedbackLoopsResponse {
    let graph = CausalGraph::from_ir(ir);
    let loops = find_loops(&graph, max_loops);
    if loops.is_empty() {
        return FeedbackLoopsResponse::Empty {
            message: "No causal loops detected in model.".to_string(),
        };
    }
    FeedbackLoopsResponse::Loops {
        feedback_loops: loops
            .into_iter()
            .map(|l| AnnotatedLoop {
                variables: l.variables,
                polarity: l.polarity,
            })
            .collect(),
    }
}

#[derive(Debug, Serialize)]
pub struct SdReport {
    pub model_structure: StructureReport,
    /// Null until /simulate has produced results.
    pub simulation_summary: Option<SummaryResponse>,
    pub feedback_loops: FeedbackLoopsResponse,
}

/// GET /sd_report — combined structure + summary + loops.
pub async fn sd_report(State(state): State<SharedState>) -> Result<Json<SdReport>, ApiError> {
    let session = state.session.read().await;
    let loaded = session.model.as_ref().ok_or_else(ApiError::no_model)?;
    let ir = &loaded.model.ir;
    Ok(Json(SdReport {
        model_structure: structure_report(ir),
        simulation_summary: session
            .results
            .as_ref()
            .map(|results| build_summary(ir, results)),
        feedback_loops: annotated_loops(ir, state.config.simulation.max_loops),
    }))
}
