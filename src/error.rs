//! Error types shared by the solve pipeline.

use thiserror::Error;

use crate::domain::SchemaViolation;

/// Everything that can go wrong between "user pressed Solve" and a validated `SolutionData`.
#[derive(Debug, Error)]
pub enum SolveError {
  #[error("nothing to solve: no text and no image")]
  EmptyInput,

  #[error("solver is not configured (missing API key)")]
  NotConfigured,

  #[error("request failed: {0}")]
  Request(String),

  #[error("HTTP {status}: {message}")]
  Http { status: u16, message: String },

  #[error("model returned an empty response")]
  EmptyResponse,

  #[error("malformed model response: {0}")]
  Malformed(#[from] serde_json::Error),

  #[error("response violates schema: {0}")]
  Schema(#[from] SchemaViolation),
}

impl SolveError {
  /// Generic, non-technical notice shown to the student.
  pub fn user_notice(&self) -> &'static str {
    match self {
      SolveError::EmptyInput => "Type a problem or attach a photo first.",
      _ => "Oops! Could not solve that problem. Please try again.",
    }
  }
}

impl From<reqwest::Error> for SolveError {
  fn from(e: reqwest::Error) -> Self {
    SolveError::Request(e.to_string())
  }
}
