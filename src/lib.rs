//! FlowSolve · step-by-step math explanations backed by Gemini.
//!
//! The crate collects a problem (text, keyboard templates, or a photo), sends one
//! schema-constrained request to the model, validates the structured answer, and
//! renders it as a flow chart or as textbook steps, each in a standard or
//! simplified register.

pub mod config;
pub mod domain;
pub mod error;
pub mod gemini;
pub mod input;
pub mod logic;
pub mod protocol;
pub mod render;
pub mod request;
pub mod routes;
pub mod session;
pub mod state;
pub mod telemetry;
pub mod typeset;
pub mod util;

pub use domain::{BlockType, FlowNode, SolutionData, SolveMode, TraditionalStep};
pub use error::SolveError;
pub use gemini::{GeminiClient, SolverBackend};
pub use routes::build_router;
pub use state::AppState;
