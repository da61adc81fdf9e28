//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::{SolutionData, SolveMode};
use crate::input::MathKey;
use crate::render::{Particle, RenderedSolution};
use crate::session::SessionSnapshot;
use crate::typeset::{DisplayMode, Rendered};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    /// The textarea changed.
    SetInput {
        text: String,
        #[serde(default)]
        cursor: Option<usize>,
    },
    MoveCursor {
        cursor: usize,
    },
    TypeText {
        text: String,
    },
    /// A math keyboard key was pressed.
    InsertSymbol {
        symbol: String,
    },
    DeleteChar,
    AttachImage {
        #[serde(rename = "imageBase64")]
        image_base64: String,
    },
    ClearImage,
    /// `query` is set when a sample question was clicked.
    Solve {
        #[serde(default)]
        query: Option<String>,
    },
    SwitchMode,
    SetMode {
        mode: SolveMode,
    },
    ToggleSimplified,
    Reset,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    State {
        state: SessionSnapshot,
        #[serde(skip_serializing_if = "Option::is_none")]
        preview: Option<Rendered>,
    },
    Solution {
        solution: SolutionData,
        rendered: RenderedSolution,
        state: SessionSnapshot,
        #[serde(skip_serializing_if = "Option::is_none")]
        confetti: Option<Vec<Particle>>,
    },
    SolveFailed {
        message: String,
        state: SessionSnapshot,
    },
    Error {
        message: String,
    },
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveIn {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub image_base64: Option<String>,
    #[serde(default)]
    pub simplified: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveOut {
    pub solution: SolutionData,
    pub flowchart: RenderedSolution,
    pub traditional: RenderedSolution,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypesetIn {
    pub latex: String,
    #[serde(default)]
    pub display_mode: DisplayMode,
}

#[derive(Debug, Serialize)]
pub struct TypesetOut {
    pub rendered: Rendered,
    pub html: String,
}

#[derive(Debug, Serialize)]
pub struct KeyboardOut {
    pub keys: Vec<MathKey>,
}

#[derive(Debug, Serialize)]
pub struct SamplesOut {
    pub questions: Vec<&'static str>,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub solver: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorOut {
    pub error: String,
}
