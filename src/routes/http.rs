//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs sizes and basic result info, never payloads.

use std::sync::Arc;
use axum::{
  extract::State,
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use tracing::{info, instrument, warn};

use crate::error::SolveError;
use crate::input::{ImageAttachment, MATH_KEYS, SAMPLE_QUESTIONS};
use crate::logic::{preview, render_both, run_solve};
use crate::protocol::*;
use crate::request::SolveRequest;
use crate::state::AppState;
use crate::typeset::Rendered;

impl IntoResponse for SolveError {
  fn into_response(self) -> Response {
    let status = match &self {
      SolveError::EmptyInput => StatusCode::BAD_REQUEST,
      SolveError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
      _ => StatusCode::BAD_GATEWAY,
    };
    (status, Json(ErrorOut { error: self.user_notice().into() })).into_response()
  }
}

fn bad_request(message: String) -> Response {
  (StatusCode::BAD_REQUEST, Json(ErrorOut { error: message })).into_response()
}

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, solver: state.solver.describe() })
}

#[instrument(level = "info")]
pub async fn http_get_keyboard() -> impl IntoResponse {
  Json(KeyboardOut { keys: MATH_KEYS.to_vec() })
}

#[instrument(level = "info")]
pub async fn http_get_samples() -> impl IntoResponse {
  Json(SamplesOut { questions: SAMPLE_QUESTIONS.to_vec() })
}

/// Stateless solve: one request in, the solution and both renderings out.
#[instrument(level = "info", skip(state, body), fields(query_len = body.query.as_ref().map_or(0, |q| q.len()), has_image = body.image_base64.is_some()))]
pub async fn http_post_solve(
  State(state): State<Arc<AppState>>,
  Json(body): Json<SolveIn>,
) -> Response {
  let image = match body.image_base64.as_deref().filter(|s| !s.is_empty()) {
    Some(raw) => match ImageAttachment::from_base64(raw) {
      Ok(img) => Some(img),
      Err(e) => {
        warn!(target: "solve", error = %e, "HTTP solve rejected: bad image");
        return bad_request(e.to_string());
      }
    },
    None => None,
  };
  let req = match SolveRequest::new(body.query.unwrap_or_default(), image) {
    Ok(r) => r,
    Err(e) => return e.into_response(),
  };

  match run_solve(&state, &req).await {
    Ok(solution) => {
      let (flowchart, traditional) = render_both(&state, &solution, body.simplified).await;
      info!(target: "solve", topic = %solution.topic, "HTTP solve served");
      Json(SolveOut { solution, flowchart, traditional }).into_response()
    }
    Err(e) => e.into_response(),
  }
}

/// Live preview of a math-markup string.
#[instrument(level = "info", skip(state, body), fields(latex_len = body.latex.len()))]
pub async fn http_post_typeset(
  State(state): State<Arc<AppState>>,
  Json(body): Json<TypesetIn>,
) -> impl IntoResponse {
  let rendered = preview(&state, &body.latex, body.display_mode)
    .await
    .unwrap_or_else(|| Rendered::Fallback(String::new()));
  let html = rendered.to_html();
  Json(TypesetOut { rendered, html })
}
