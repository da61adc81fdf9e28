//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Running one solve through the injected backend (with logging)
//!   - Rendering a solution with the typesetter
//!   - Live preview of the input buffer

use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::domain::{SolutionData, SolveMode};
use crate::error::SolveError;
use crate::render::{render_solution, RenderedSolution};
use crate::request::SolveRequest;
use crate::state::AppState;
use crate::typeset::{DisplayMode, Rendered};

#[instrument(level = "info", skip(state, req), fields(request_id = %Uuid::new_v4(), has_image = req.image().is_some(), query_len = req.query().len()))]
pub async fn run_solve(state: &AppState, req: &SolveRequest) -> Result<SolutionData, SolveError> {
  match state.solver.solve(req).await {
    Ok(data) => {
      info!(target: "solve", topic = %data.topic, nodes = data.flow_nodes.len(), steps = data.traditional_steps.len(), "Solve succeeded");
      Ok(data)
    }
    Err(e) => {
      error!(target: "solve", error = %e, "Solve failed");
      Err(e)
    }
  }
}

#[instrument(level = "debug", skip(state, data))]
pub async fn render(state: &AppState, data: &SolutionData, mode: SolveMode, simplified: bool) -> RenderedSolution {
  let math = state.typesetter.handle().await;
  render_solution(&math, data, mode, simplified)
}

/// Both renderings of the same data, standard and simplified text selected by `simplified`.
pub async fn render_both(state: &AppState, data: &SolutionData, simplified: bool) -> (RenderedSolution, RenderedSolution) {
  let math = state.typesetter.handle().await;
  (
    render_solution(&math, data, SolveMode::Flowchart, simplified),
    render_solution(&math, data, SolveMode::Traditional, simplified),
  )
}

/// Preview of what the student is typing. Empty input has no preview.
#[instrument(level = "debug", skip(state, latex), fields(latex_len = latex.len()))]
pub async fn preview(state: &AppState, latex: &str, mode: DisplayMode) -> Option<Rendered> {
  if latex.is_empty() {
    return None;
  }
  Some(state.typesetter.render(latex, mode).await)
}
