//! Configuration: prompts (optionally from TOML) and service settings from the environment.
//!
//! TOML schema (all keys optional):
//!
//! ```toml
//! [prompts]
//! system_instruction = "..."
//! image_instruction = "..."
//! text_template = "solve this math problem: {query}"
//! ```

use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info};

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct SolverConfig {
  #[serde(default)]
  pub prompts: Prompts,
}

/// Prompts sent with every solve request.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub system_instruction: String,
  /// Sent after the image part when a photo is attached.
  pub image_instruction: String,
  /// Text-only request; `{query}` is replaced with the student's input.
  pub text_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      system_instruction: "You are FlowSolve, an advanced 11th/12th grade JEE-level math tutor.

Tasks:
1. OCR/Detection: If an image is provided, accurately transcribe the math problem into LaTeX in the 'detectedProblem' field. If text is provided, format it as LaTeX.
2. Dual-Mode Explanation:
   - Standard Mode: Detailed, textbook-style academic rigor.
   - ELI15 Mode ('simplifiedExplanation', 'simplifiedDescription'): Explain it like I'm 15. Use simple analogies (e.g., 'Derivative is like the speedometer of a car'). Avoid jargon where possible.

Structure:
- 'flowNodes': A visual logic chain.
- 'traditionalSteps': Linear step-by-step solution of the same derivation.

Ensure all math is valid LaTeX. Do not include markdown backticks around LaTeX."
        .into(),
      image_instruction: "Analyze the image. Detect the math problem exactly and solve it.".into(),
      text_template: "solve this math problem: {query}".into(),
    }
  }
}

/// Runtime settings read from the environment.
#[derive(Clone, Debug)]
pub struct Settings {
  pub api_key: Option<String>,
  pub base_url: String,
  pub model: String,
  pub temperature: f32,
  pub request_timeout: Duration,
  /// How long a render waits for the math engine before falling back to text.
  pub typeset_ready_timeout: Duration,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      api_key: None,
      base_url: DEFAULT_GEMINI_BASE_URL.into(),
      model: DEFAULT_GEMINI_MODEL.into(),
      temperature: DEFAULT_TEMPERATURE,
      request_timeout: Duration::from_secs(60),
      typeset_ready_timeout: Duration::from_millis(2_000),
    }
  }
}

impl Settings {
  /// GEMINI_API_KEY (or API_KEY), GEMINI_BASE_URL, GEMINI_MODEL,
  /// GEMINI_TIMEOUT_SECS, TYPESET_READY_TIMEOUT_MS.
  pub fn from_env() -> Self {
    let d = Self::default();
    let api_key = std::env::var("GEMINI_API_KEY")
      .or_else(|_| std::env::var("API_KEY"))
      .ok()
      .filter(|k| !k.trim().is_empty());
    Self {
      api_key,
      base_url: std::env::var("GEMINI_BASE_URL").unwrap_or(d.base_url),
      model: std::env::var("GEMINI_MODEL").unwrap_or(d.model),
      temperature: d.temperature,
      request_timeout: env_parse("GEMINI_TIMEOUT_SECS")
        .map(Duration::from_secs)
        .unwrap_or(d.request_timeout),
      typeset_ready_timeout: env_parse("TYPESET_READY_TIMEOUT_MS")
        .map(Duration::from_millis)
        .unwrap_or(d.typeset_ready_timeout),
    }
  }
}

fn env_parse(key: &str) -> Option<u64> {
  std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Parse a TOML document into `SolverConfig`.
pub fn parse_solver_config(s: &str) -> Result<SolverConfig, toml::de::Error> {
  toml::from_str(s)
}

/// Attempt to load `SolverConfig` from SOLVER_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_solver_config_from_env() -> Option<SolverConfig> {
  let path = std::env::var("SOLVER_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_solver_config(&s) {
      Ok(cfg) => {
        info!(target: "flowsolve", %path, "Loaded solver config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "flowsolve", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "flowsolve", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
