//! Building the single generateContent request for one solve.
//!
//! The request is either `[image, detection instruction]` or `[text instruction]`,
//! always with the fixed system instruction and the response schema attached.

use serde::Serialize;
use serde_json::{json, Value};

use crate::config::{Prompts, DEFAULT_TEMPERATURE};
use crate::error::SolveError;
use crate::input::ImageAttachment;
use crate::util::fill_template;

/// MIME type declared for every attached photo.
pub const IMAGE_MIME: &str = "image/jpeg";

/// What the student asked: text, a photo, or both.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SolveRequest {
  query: String,
  image: Option<ImageAttachment>,
}

impl SolveRequest {
  /// Fails with `EmptyInput` when there is neither text nor image.
  pub fn new(query: impl Into<String>, image: Option<ImageAttachment>) -> Result<Self, SolveError> {
    let query = query.into();
    if query.trim().is_empty() && image.is_none() {
      return Err(SolveError::EmptyInput);
    }
    Ok(Self { query, image })
  }

  pub fn query(&self) -> &str {
    &self.query
  }

  pub fn image(&self) -> Option<&ImageAttachment> {
    self.image.as_ref()
  }
}

// --- generateContent DTOs ---

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
  pub contents: Vec<Content>,
  pub system_instruction: Content,
  pub generation_config: GenerationConfig,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Content {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub role: Option<String>,
  pub parts: Vec<Part>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Part {
  Text { text: String },
  InlineData {
    #[serde(rename = "inlineData")]
    inline_data: Blob,
  },
}

impl Part {
  pub fn text(s: impl Into<String>) -> Self {
    Part::Text { text: s.into() }
  }

  pub fn as_text(&self) -> Option<&str> {
    match self {
      Part::Text { text } => Some(text),
      Part::InlineData { .. } => None,
    }
  }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
  pub mime_type: String,
  pub data: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
  pub temperature: f32,
  pub response_mime_type: String,
  pub response_schema: Value,
}

/// Content parts for one solve. The free-text query is not forwarded when a photo is attached.
pub fn build_parts(req: &SolveRequest, prompts: &Prompts) -> Vec<Part> {
  match &req.image {
    Some(img) => vec![
      Part::InlineData {
        inline_data: Blob { mime_type: IMAGE_MIME.into(), data: img.base64().to_string() },
      },
      Part::text(prompts.image_instruction.clone()),
    ],
    None => vec![Part::text(fill_template(&prompts.text_template, &[("query", &req.query)]))],
  }
}

pub fn build_generate_request(req: &SolveRequest, prompts: &Prompts, temperature: f32) -> GenerateContentRequest {
  GenerateContentRequest {
    contents: vec![Content { role: Some("user".into()), parts: build_parts(req, prompts) }],
    system_instruction: Content { role: None, parts: vec![Part::text(prompts.system_instruction.clone())] },
    generation_config: GenerationConfig {
      temperature,
      response_mime_type: "application/json".into(),
      response_schema: response_schema(),
    },
  }
}

/// Same as `build_generate_request` with the default low temperature.
pub fn build_default_request(req: &SolveRequest, prompts: &Prompts) -> GenerateContentRequest {
  build_generate_request(req, prompts, DEFAULT_TEMPERATURE)
}

/// Output-shape contract the model must follow.
pub fn response_schema() -> Value {
  json!({
    "type": "OBJECT",
    "properties": {
      "topic": { "type": "STRING", "description": "The mathematical topic (e.g., Calculus, Algebra)" },
      "detectedProblem": { "type": "STRING", "description": "The exact problem statement extracted from the input/image in LaTeX format." },
      "finalAnswer": { "type": "STRING", "description": "The final concise answer in LaTeX" },
      "tips": {
        "type": "ARRAY",
        "items": { "type": "STRING" },
        "description": "Short conceptual tips or 'Why' explanations"
      },
      "similarProblems": {
        "type": "ARRAY",
        "items": { "type": "STRING" },
        "description": "2-3 similar practice problems in LaTeX"
      },
      "traditionalSteps": {
        "type": "ARRAY",
        "items": {
          "type": "OBJECT",
          "properties": {
            "stepNumber": { "type": "INTEGER" },
            "explanation": { "type": "STRING", "description": "Standard academic explanation" },
            "simplifiedExplanation": { "type": "STRING", "description": "ELI15 explanation: Use analogies (e.g., pizza, velocity) and very simple language." },
            "latex": { "type": "STRING", "description": "The mathematical expression for this step in LaTeX" },
            "formulaUsed": { "type": "STRING", "description": "Optional formula used in LaTeX" }
          },
          "required": ["stepNumber", "explanation", "latex"]
        }
      },
      "flowNodes": {
        "type": "ARRAY",
        "items": {
          "type": "OBJECT",
          "properties": {
            "id": { "type": "STRING" },
            "type": { "type": "STRING", "enum": ["IDENTIFY", "APPLY", "SIMPLIFY", "TRANSFORM", "FINAL"] },
            "label": { "type": "STRING", "description": "Short title for the node" },
            "description": { "type": "STRING", "description": "Standard description" },
            "simplifiedDescription": { "type": "STRING", "description": "ELI15 description" },
            "latex": { "type": "STRING", "description": "Relevant LaTeX for this specific node" }
          },
          "required": ["id", "type", "label"]
        }
      }
    },
    "required": ["topic", "detectedProblem", "finalAnswer", "traditionalSteps", "flowNodes", "tips"]
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::BlockType;

  #[test]
  fn empty_input_is_refused() {
    assert!(matches!(SolveRequest::new("   ", None), Err(SolveError::EmptyInput)));
  }

  #[test]
  fn text_only_request_has_single_instruction_part() {
    let req = SolveRequest::new("Integrate x * sin(x) dx", None).unwrap();
    let body = build_default_request(&req, &Prompts::default());
    let parts = &body.contents[0].parts;
    assert_eq!(parts.len(), 1);
    assert_eq!(parts[0].as_text(), Some("solve this math problem: Integrate x * sin(x) dx"));
  }

  #[test]
  fn image_request_ignores_text_and_carries_detection_instruction() {
    let img = ImageAttachment::from_base64("aGVsbG8=").unwrap();
    let req = SolveRequest::new("also this text", Some(img)).unwrap();
    let prompts = Prompts::default();
    let parts = build_parts(&req, &prompts);
    assert_eq!(parts.len(), 2);
    assert!(matches!(&parts[0], Part::InlineData { inline_data } if inline_data.mime_type == "image/jpeg"));
    assert_eq!(parts[1].as_text(), Some(prompts.image_instruction.as_str()));
    assert!(parts.iter().all(|p| p.as_text().map_or(true, |t| !t.contains("also this text"))));
  }

  #[test]
  fn wire_shape_matches_generate_content() {
    let req = SolveRequest::new("1+1", None).unwrap();
    let v = serde_json::to_value(build_default_request(&req, &Prompts::default())).unwrap();
    assert_eq!(v["contents"][0]["role"], "user");
    assert_eq!(v["generationConfig"]["responseMimeType"], "application/json");
    assert!((v["generationConfig"]["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
    assert!(v["systemInstruction"]["parts"][0]["text"].is_string());
    assert!(v["systemInstruction"].get("role").is_none());
  }

  #[test]
  fn inline_data_serializes_camel_case() {
    let img = ImageAttachment::from_base64("aGVsbG8=").unwrap();
    let req = SolveRequest::new("", Some(img)).unwrap();
    let v = serde_json::to_value(build_parts(&req, &Prompts::default())).unwrap();
    assert_eq!(v[0]["inlineData"]["mimeType"], "image/jpeg");
    assert_eq!(v[0]["inlineData"]["data"], "aGVsbG8=");
  }

  #[test]
  fn schema_enumerates_every_block_type() {
    let schema = response_schema();
    let listed: Vec<&str> = schema["properties"]["flowNodes"]["items"]["properties"]["type"]["enum"]
      .as_array()
      .unwrap()
      .iter()
      .filter_map(|v| v.as_str())
      .collect();
    let expected: Vec<&str> = BlockType::ALL.iter().map(|b| b.as_str()).collect();
    assert_eq!(listed, expected);
    let step_required = &schema["properties"]["traditionalSteps"]["items"]["required"];
    assert_eq!(step_required, &json!(["stepNumber", "explanation", "latex"]));
  }
}
