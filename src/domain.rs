//! Domain models: the structured solution returned by the model and its parts.
//!
//! Field names on the wire are camelCase because the response schema we hand to
//! the model (see `request::response_schema`) is written that way.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Category tag of a flow-chart node.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockType {
  Identify,
  Apply,
  Simplify,
  Transform,
  Final,
}

impl BlockType {
  pub const ALL: [BlockType; 5] = [
    BlockType::Identify,
    BlockType::Apply,
    BlockType::Simplify,
    BlockType::Transform,
    BlockType::Final,
  ];

  /// Wire name, also used as the visible tag on a node card.
  pub fn as_str(&self) -> &'static str {
    match self {
      BlockType::Identify => "IDENTIFY",
      BlockType::Apply => "APPLY",
      BlockType::Simplify => "SIMPLIFY",
      BlockType::Transform => "TRANSFORM",
      BlockType::Final => "FINAL",
    }
  }

  /// CSS modifier class for the node card.
  pub fn css_class(&self) -> &'static str {
    match self {
      BlockType::Identify => "block-identify",
      BlockType::Apply => "block-apply",
      BlockType::Simplify => "block-simplify",
      BlockType::Transform => "block-transform",
      BlockType::Final => "block-final",
    }
  }
}

/// Which of the two renderings is active.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SolveMode {
  #[default]
  Flowchart,
  Traditional,
}

impl SolveMode {
  pub fn toggled(self) -> Self {
    match self {
      SolveMode::Flowchart => SolveMode::Traditional,
      SolveMode::Traditional => SolveMode::Flowchart,
    }
  }
}

/// One stage of the visual logic chain.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FlowNode {
  pub id: String,
  #[serde(rename = "type")]
  pub kind: BlockType,
  pub label: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub latex: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub simplified_description: Option<String>,
}

impl FlowNode {
  /// Description to show: the simplified one when requested and present,
  /// otherwise the standard one.
  pub fn display_description(&self, simplified: bool) -> Option<&str> {
    pick(self.description.as_deref(), self.simplified_description.as_deref(), simplified)
  }
}

/// One step of the textbook-style derivation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TraditionalStep {
  pub step_number: u32,
  pub explanation: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub simplified_explanation: Option<String>,
  pub latex: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub formula_used: Option<String>,
}

impl TraditionalStep {
  pub fn display_explanation(&self, simplified: bool) -> &str {
    pick(Some(self.explanation.as_str()), self.simplified_explanation.as_deref(), simplified)
      .unwrap_or_default()
  }
}

/// Complete result of one solve. Replaced wholesale on every successful solve.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SolutionData {
  pub topic: String,
  pub detected_problem: String,
  pub flow_nodes: Vec<FlowNode>,
  pub traditional_steps: Vec<TraditionalStep>,
  pub final_answer: String,
  #[serde(default)]
  pub similar_problems: Vec<String>,
  pub tips: Vec<String>,
}

/// Why a decoded payload was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaViolation {
  #[error("field `{0}` is empty")]
  EmptyField(&'static str),
  #[error("duplicate flow node id `{0}`")]
  DuplicateNodeId(String),
  #[error("traditional step {0} has no latex")]
  StepWithoutLatex(u32),
}

impl SolutionData {
  /// Checks the invariants the JSON schema alone cannot express.
  pub fn validate(&self) -> Result<(), SchemaViolation> {
    if self.topic.trim().is_empty() {
      return Err(SchemaViolation::EmptyField("topic"));
    }
    if self.final_answer.trim().is_empty() {
      return Err(SchemaViolation::EmptyField("finalAnswer"));
    }
    let mut seen = HashSet::new();
    for node in &self.flow_nodes {
      if !seen.insert(node.id.as_str()) {
        return Err(SchemaViolation::DuplicateNodeId(node.id.clone()));
      }
    }
    if let Some(step) = self.traditional_steps.iter().find(|s| s.latex.trim().is_empty()) {
      return Err(SchemaViolation::StepWithoutLatex(step.step_number));
    }
    Ok(())
  }
}

fn pick<'a>(standard: Option<&'a str>, simplified: Option<&'a str>, prefer_simplified: bool) -> Option<&'a str> {
  let standard = standard.filter(|s| !s.is_empty());
  let simplified = simplified.filter(|s| !s.is_empty());
  if prefer_simplified {
    simplified.or(standard)
  } else {
    standard
  }
}
