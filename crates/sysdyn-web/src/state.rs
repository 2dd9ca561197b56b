//! Shared application state.
//!
//! One in-memory session per process: an upload replaces the loaded model
//! wholesale and drops any prior results; the GET endpoints read whatever
//! is current. The minted model id lets clients detect a swap.

use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use sysdyn_engine::{CompiledModel, SimulationResults};
use sysdyn_model::ModelFormat;

use crate::config::Config;

/// The model currently loaded in the session.
#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub id: Uuid,
    pub format: ModelFormat,
    pub filename: String,
    pub model: CompiledModel,
}

#[derive(Debug, Default)]
pub struct Session {
    pub model: Option<LoadedModel>,
    pub results: Option<SimulationResults>,
}

/// Shared state injected into every Axum handler.
pub struct AppState {
    pub config: Config,
    pub session: RwLock<Session>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            session: RwLock::new(Session::default()),
        }
    }
}

pub type SharedState = Arc<AppState>;
