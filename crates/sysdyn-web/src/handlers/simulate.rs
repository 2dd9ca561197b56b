//! Simulation run and results summary.

use axum::extract::State;
use axum::Json;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use sysdyn_common::ir::{ModelIr, VarKind};
use sysdyn_engine::{run, Method, SimulationResults};

use crate::error::ApiError;
use crate::state::SharedState;

#[derive(Debug, Serialize)]
pub struct SimulateResponse {
    pub model_id: Uuid,
    pub method: Method,
    pub time: Vec<f64>,
    pub series: IndexMap<String, Vec<f64>>,
}

/// GET /simulate — run the loaded model and keep the results in the
/// session for the derived endpoints.
pub async fn simulate(State(state): State<SharedState>) -> Result<Json<SimulateResponse>, ApiError> {
    let method = state.config.simulation.method;
    let mut session = state.session.write().await;
    let loaded = session.model.as_ref().ok_or_else(ApiError::no_model)?;

    let results = run(&loaded.model, method)?;
    info!(model_id = %loaded.id, rows = results.len(), ?method, "simulation complete");

    let response = SimulateResponse {
        model_id: loaded.id,
        method,
        time: results.time.clone(),
        series: results.columns.clone(),
    };
    session.results = Some(results);
    Ok(Json(response))
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub final_time: f64,
    pub stocks: IndexMap<String, f64>,
    pub flows: IndexMap<String, f64>,
}

/// GET /simulation_summary — final time plus final stock and flow values.
pub async fn simulation_summary(
    State(state): State<SharedState>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let session = state.session.read().await;
    let loaded = session.model.as_ref().ok_or_else(ApiError::no_model)?;
    let results = session.results.as_ref().ok_or_else(ApiError::no_results)?;
    Ok(Json(build_summary(&loaded.model.ir, results)))
}

/// Shared with /sd_report.
pub(crate) fn build_summary(ir: &ModelIr, results: &SimulationResults) -> SummaryResponse {
    let mut stocks = IndexMap::new();
    let mut flows = IndexMap::new();
    for var in ir.variables.values() {
        let Some(value) = results.final_value(&var.name) else {
            continue;
        };
        match var.kind {
            VarKind::Stock { .. } => {
                stocks.insert(var.name.clone(), value);
            }
            VarKind::Flow { .. } => {
                flows.insert(var.name.clone(), value);
            }
            VarKind::Aux { .. } => {}
        }
    }
    SummaryResponse {
        final_time: results.final_time().unwrap_or(ir.specs.start),
        stocks,
        flows,
    }
}
