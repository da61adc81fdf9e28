#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{body::Body, http::Request, Router};
use flowsolve_backend::{
    build_router,
    config::{Prompts, Settings},
    request::SolveRequest,
    typeset::{DisplayMode, EngineSlot, MathEngine, TypesetError, Typesetter},
    AppState, SolutionData, SolveError, SolverBackend,
};

pub const SAMPLE_RESPONSE: &str = r#"{
  "topic": "Calculus",
  "detectedProblem": "\\int x \\sin(x)\\,dx",
  "finalAnswer": "-x\\cos(x)+\\sin(x)+C",
  "tips": ["Pick u with LIATE"],
  "similarProblems": ["\\int x e^x\\,dx"],
  "traditionalSteps": [
    {"stepNumber": 1, "explanation": "Use integration by parts.", "simplifiedExplanation": "Undo the product rule.", "latex": "u = x, dv = \\sin(x)dx", "formulaUsed": "\\int u\\,dv = uv - \\int v\\,du"},
    {"stepNumber": 2, "explanation": "Integrate and simplify.", "latex": "-x\\cos(x)+\\sin(x)+C"}
  ],
  "flowNodes": [
    {"id": "1", "type": "IDENTIFY", "label": "Product of functions", "description": "Integration by parts applies."},
    {"id": "2", "type": "APPLY", "label": "Parts", "latex": "uv - \\int v\\,du", "simplifiedDescription": "Swap the hard part for an easy one."},
    {"id": "3", "type": "FINAL", "label": "Answer", "latex": "-x\\cos(x)+\\sin(x)+C"}
  ]
}"#;

/// Replays a fixed model response and records every request it sees.
pub struct ScriptedSolver {
    pub response: Result<String, String>,
    pub calls: Mutex<Vec<SolveRequest>>,
}

impl ScriptedSolver {
    pub fn ok(json: &str) -> Arc<Self> {
        Arc::new(Self { response: Ok(json.to_string()), calls: Mutex::new(Vec::new()) })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self { response: Err(message.to_string()), calls: Mutex::new(Vec::new()) })
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl SolverBackend for ScriptedSolver {
    async fn solve(&self, req: &SolveRequest) -> Result<SolutionData, SolveError> {
        self.calls.lock().unwrap().push(req.clone());
        match &self.response {
            Ok(json) => flowsolve_backend::gemini::parse_solution(json),
            Err(msg) => Err(SolveError::Request(msg.clone())),
        }
    }

    fn describe(&self) -> String {
        "scripted".into()
    }
}

/// Echoes markup inside a tag; unbalanced braces are a parse error.
pub struct EchoEngine;

impl MathEngine for EchoEngine {
    fn render(&self, latex: &str, _mode: DisplayMode) -> Result<String, TypesetError> {
        if latex.matches('{').count() != latex.matches('}').count() {
            return Err(TypesetError::Parse("unbalanced".into()));
        }
        Ok(format!("<math>{latex}</math>"))
    }

    fn name(&self) -> &'static str {
        "echo"
    }
}

pub fn create_test_app(solver: Arc<ScriptedSolver>) -> Router {
    let typesetter = Typesetter::new(EngineSlot::ready_with(Arc::new(EchoEngine)), Duration::from_millis(50));
    let state = AppState::new(solver, typesetter, Prompts::default(), Settings::default());
    build_router(Arc::new(state))
}

pub fn json_post(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap()
}
