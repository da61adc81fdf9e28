//! Application state: the solver backend, the typesetter, prompts, and settings.
//!
//! The solver is injected as `Arc<dyn SolverBackend>` so tests can swap in a
//! scripted backend. Per-user presentation state is NOT kept here; each
//! WebSocket connection owns its own `Session`.

use std::sync::Arc;

use tracing::{error, info, instrument};

use crate::config::{load_solver_config_from_env, Prompts, Settings};
use crate::gemini::{GeminiClient, SolverBackend, UnconfiguredSolver};
use crate::typeset::{EngineSlot, MathMlEngine, Typesetter};

#[derive(Clone)]
pub struct AppState {
    pub solver: Arc<dyn SolverBackend>,
    pub typesetter: Typesetter,
    pub prompts: Prompts,
    pub settings: Settings,
}

impl AppState {
    /// Assemble state from explicit parts.
    pub fn new(solver: Arc<dyn SolverBackend>, typesetter: Typesetter, prompts: Prompts, settings: Settings) -> Self {
        Self { solver, typesetter, prompts, settings }
    }

    /// Build state from env: load config, init the Gemini client, and bring the math engine up.
    #[instrument(level = "info", skip_all)]
    pub fn from_env() -> Self {
        let prompts = load_solver_config_from_env()
            .map(|c| c.prompts)
            .unwrap_or_default();
        let settings = Settings::from_env();

        let solver: Arc<dyn SolverBackend> = match &settings.api_key {
            Some(key) => match GeminiClient::new(key.clone(), &settings, prompts.clone()) {
                Ok(client) => Arc::new(client),
                Err(e) => {
                    error!(target: "flowsolve", error = %e, "Failed to build Gemini client; solving disabled");
                    Arc::new(UnconfiguredSolver)
                }
            },
            None => {
                error!(target: "flowsolve", "GEMINI_API_KEY not set; every solve will fail until it is configured");
                Arc::new(UnconfiguredSolver)
            }
        };
        info!(target: "flowsolve", solver = %solver.describe(), "Solver ready");

        let slot = EngineSlot::new();
        let typesetter = Typesetter::new(slot.clone(), settings.typeset_ready_timeout);
        // The bundled engine has nothing to load; a heavier engine would install from a task.
        slot.install(Arc::new(MathMlEngine));

        Self::new(solver, typesetter, prompts, settings)
    }
}
