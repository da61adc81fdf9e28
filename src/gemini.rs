//! Gemini client for the one call we make: generateContent with a JSON response schema.
//!
//! Calls are instrumented and log model name, latency, and response sizes (not contents).
//! There are no retries and no caching; every solve is a fresh request.
//!
//! NOTE: the API key travels in a header and is never logged.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::Deserialize;
use tracing::{debug, error, info, instrument};

use crate::config::{Prompts, Settings};
use crate::domain::SolutionData;
use crate::error::SolveError;
use crate::request::{build_generate_request, SolveRequest};
use crate::util::trunc_for_log;

/// Anything that can turn a `SolveRequest` into a validated `SolutionData`.
///
/// `AppState` holds one of these behind an `Arc`, so tests swap in a scripted double.
#[async_trait]
pub trait SolverBackend: Send + Sync {
  async fn solve(&self, req: &SolveRequest) -> Result<SolutionData, SolveError>;

  /// Short description for startup logs.
  fn describe(&self) -> String;
}

#[derive(Clone)]
pub struct GeminiClient {
  client: reqwest::Client,
  api_key: String,
  pub base_url: String,
  pub model: String,
  temperature: f32,
  prompts: Prompts,
}

impl GeminiClient {
  pub fn new(api_key: String, settings: &Settings, prompts: Prompts) -> Result<Self, SolveError> {
    let client = reqwest::Client::builder()
      .timeout(settings.request_timeout)
      .build()?;
    Ok(Self {
      client,
      api_key,
      base_url: settings.base_url.trim_end_matches('/').to_string(),
      model: settings.model.clone(),
      temperature: settings.temperature,
      prompts,
    })
  }

  fn endpoint(&self) -> String {
    format!("{}/models/{}:generateContent", self.base_url, self.model)
  }

  /// Send one request and return the raw JSON text the model produced.
  #[instrument(level = "info", skip(self, req), fields(model = %self.model, has_image = req.image().is_some(), query_len = req.query().len()))]
  async fn generate_json_text(&self, req: &SolveRequest) -> Result<String, SolveError> {
    let body = build_generate_request(req, &self.prompts, self.temperature);

    let res = self.client.post(self.endpoint())
      .header(USER_AGENT, "flowsolve-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header("x-goog-api-key", &self.api_key)
      .json(&body).send().await?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let message = extract_gemini_error(&body).unwrap_or(body);
      return Err(SolveError::Http { status: status.as_u16(), message });
    }

    let body: GenerateContentResponse = res.json().await?;
    if let Some(usage) = &body.usage_metadata {
      info!(prompt_tokens = ?usage.prompt_token_count, candidates_tokens = ?usage.candidates_token_count, total_tokens = ?usage.total_token_count, "Gemini usage");
    }
    response_text(body).ok_or(SolveError::EmptyResponse)
  }
}

#[async_trait]
impl SolverBackend for GeminiClient {
  async fn solve(&self, req: &SolveRequest) -> Result<SolutionData, SolveError> {
    let start = Instant::now();
    let result = self.generate_json_text(req).await;
    let elapsed: Duration = start.elapsed();

    let text = match result {
      Ok(t) => {
        info!(?elapsed, response_len = t.len(), "Model response received");
        t
      }
      Err(e) => {
        error!(?elapsed, error = %e, "Model call failed");
        return Err(e);
      }
    };
    debug!(preview = %trunc_for_log(&text, 200), "Model response preview");
    parse_solution(&text)
  }

  fn describe(&self) -> String {
    format!("gemini model={} base_url={}", self.model, self.base_url)
  }
}

/// Stand-in used when no API key is configured; every solve fails with `NotConfigured`.
pub struct UnconfiguredSolver;

#[async_trait]
impl SolverBackend for UnconfiguredSolver {
  async fn solve(&self, _req: &SolveRequest) -> Result<SolutionData, SolveError> {
    Err(SolveError::NotConfigured)
  }

  fn describe(&self) -> String {
    "unconfigured".into()
  }
}

/// Decode and validate the model's JSON text. Empty text counts as no response.
pub fn parse_solution(text: &str) -> Result<SolutionData, SolveError> {
  let text = text.trim();
  if text.is_empty() {
    return Err(SolveError::EmptyResponse);
  }
  let data: SolutionData = serde_json::from_str(text)?;
  data.validate()?;
  Ok(data)
}

// --- Response DTOs ---

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
  #[serde(default)]
  candidates: Vec<Candidate>,
  #[serde(default)]
  usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
  #[serde(default)]
  content: Option<CandidateContent>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
  #[serde(default)]
  parts: Vec<CandidatePart>,
}

#[derive(Deserialize, Debug)]
struct CandidatePart {
  #[serde(default)]
  text: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
  #[serde(default)] prompt_token_count: Option<u32>,
  #[serde(default)] candidates_token_count: Option<u32>,
  #[serde(default)] total_token_count: Option<u32>,
}

/// Concatenated text of the first candidate, or None if there is none.
fn response_text(body: GenerateContentResponse) -> Option<String> {
  let content = body.candidates.into_iter().next()?.content?;
  let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
  if text.trim().is_empty() { None } else { Some(text) }
}

/// Try to extract a clean error message from a Gemini error body.
fn extract_gemini_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}
