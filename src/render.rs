//! HTML fragments for a solution: flow chart, textbook steps, header, footer,
//! and the celebration particles.
//!
//! Rendering is synchronous over an already-resolved `EngineHandle`; resolve it
//! once per solution with `Typesetter::handle`.

use std::fmt::Write as _;

use rand::Rng;
use serde::Serialize;

use crate::domain::{FlowNode, SolutionData, SolveMode, TraditionalStep};
use crate::typeset::{DisplayMode, EngineHandle};
use crate::util::escape_html;

/// Everything a client needs to draw one solution.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RenderedSolution {
  pub mode: SolveMode,
  pub simplified: bool,
  /// Verbatim from the model, whichever mode is active.
  pub final_answer: String,
  pub header_html: String,
  pub body_html: String,
  pub footer_html: String,
}

pub fn render_solution(
  math: &EngineHandle,
  data: &SolutionData,
  mode: SolveMode,
  simplified: bool,
) -> RenderedSolution {
  let body_html = match mode {
    SolveMode::Flowchart => render_flowchart(math, &data.flow_nodes, simplified),
    SolveMode::Traditional => render_steps(math, &data.traditional_steps, &data.final_answer, simplified),
  };
  RenderedSolution {
    mode,
    simplified,
    final_answer: data.final_answer.clone(),
    header_html: render_header(math, data, simplified),
    body_html,
    footer_html: render_footer(math, data),
  }
}

fn render_header(math: &EngineHandle, data: &SolutionData, simplified: bool) -> String {
  let toggle = if simplified { "Explained for 15yo" } else { "Academic Mode" };
  format!(
    r#"<header class="solution-header"><span class="topic">{}</span><h2>Solution</h2><span class="explain-mode">{}</span><div class="detected"><span class="detected-label">Detected:</span>{}</div></header>"#,
    escape_html(&data.topic),
    toggle,
    math.render(&data.detected_problem, DisplayMode::Inline).to_html(),
  )
}

/// One card per node, a connector between consecutive nodes, none after the last.
pub fn render_flowchart(math: &EngineHandle, nodes: &[FlowNode], simplified: bool) -> String {
  let mut out = String::from(r#"<div class="flowchart">"#);
  for (i, node) in nodes.iter().enumerate() {
    let _ = write!(
      out,
      r#"<div class="flow-node {}" style="animation-delay: {}ms"><span class="flow-node-type">{}</span><h3>{}</h3>"#,
      node.kind.css_class(),
      i * 150,
      node.kind.as_str(),
      escape_html(&node.label),
    );
    if let Some(latex) = node.latex.as_deref().filter(|l| !l.is_empty()) {
      let _ = write!(out, r#"<div class="flow-node-math">{}</div>"#, math.render(latex, DisplayMode::Block).to_html());
    }
    if let Some(desc) = node.display_description(simplified) {
      let class = if simplified { "flow-node-desc simplified" } else { "flow-node-desc" };
      let _ = write!(out, r#"<p class="{}">{}</p>"#, class, escape_html(desc));
    }
    out.push_str("</div>");
    if i + 1 < nodes.len() {
      out.push_str(r#"<div class="flow-connector"></div>"#);
    }
  }
  out.push_str("</div>");
  out
}

/// Linear derivation followed by the final answer block.
pub fn render_steps(math: &EngineHandle, steps: &[TraditionalStep], final_answer: &str, simplified: bool) -> String {
  let mut out = String::from(r#"<div class="steps">"#);
  for step in steps {
    let _ = write!(
      out,
      r#"<div class="step"><h3>Step {}</h3><div class="step-explanation">{}"#,
      step.step_number,
      escape_html(step.display_explanation(simplified)),
    );
    if simplified {
      out.push_str(r#"<span class="badge-simplified">Simplified</span>"#);
    }
    out.push_str("</div>");
    // Rule reference: standard mode only.
    if let Some(formula) = step.formula_used.as_deref().filter(|f| !simplified && !f.is_empty()) {
      let _ = write!(out, r#"<div class="step-rule">Rule: {}</div>"#, math.render(formula, DisplayMode::Inline).to_html());
    }
    let _ = write!(out, r#"<div class="step-math">{}</div></div>"#, math.render(&step.latex, DisplayMode::Block).to_html());
  }
  let _ = write!(
    out,
    r#"<div class="final-answer"><h3>Final Answer</h3>{}</div></div>"#,
    math.render(final_answer, DisplayMode::Block).to_html(),
  );
  out
}

fn render_footer(math: &EngineHandle, data: &SolutionData) -> String {
  let mut out = String::from(r#"<section class="key-concepts"><h3>Key Concepts</h3><ul>"#);
  for tip in &data.tips {
    let _ = write!(out, "<li>{}</li>", escape_html(tip));
  }
  out.push_str(r#"</ul></section><section class="similar-problems"><h3>Similar Problems</h3>"#);
  for prob in &data.similar_problems {
    let _ = write!(out, r#"<div class="similar-problem">{}</div>"#, math.render(prob, DisplayMode::Inline).to_html());
  }
  out.push_str("</section>");
  out
}

/// One piece of confetti.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Particle {
  /// Horizontal position, percent of viewport width.
  pub left_pct: f32,
  pub duration_secs: f32,
  pub delay_secs: f32,
  pub color: &'static str,
}

const CONFETTI_COLORS: [&str; 4] = ["#6366f1", "#ec4899", "#10b981", "#f59e0b"];
pub const CONFETTI_COUNT: usize = 20;

pub fn confetti<R: Rng>(rng: &mut R) -> Vec<Particle> {
  (0..CONFETTI_COUNT)
    .map(|_| Particle {
      left_pct: rng.gen_range(0.0..100.0),
      duration_secs: 3.0 + rng.gen_range(0.0..2.0),
      delay_secs: rng.gen_range(0.0..2.0),
      color: CONFETTI_COLORS[rng.gen_range(0..CONFETTI_COLORS.len())],
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use rand::{rngs::StdRng, SeedableRng};

  use super::*;
  use crate::domain::tests::sample_solution;
  use crate::typeset::tests::FakeEngine;

  fn math() -> EngineHandle {
    EngineHandle::new(Some(Arc::new(FakeEngine)))
  }

  #[test]
  fn flowchart_has_one_connector_fewer_than_nodes() {
    let data = sample_solution();
    let html = render_flowchart(&math(), &data.flow_nodes, false);
    assert_eq!(html.matches(r#"class="flow-node "#).count(), 2);
    assert_eq!(html.matches("flow-connector").count(), 1);
    assert!(html.ends_with("</div></div>"));
    assert!(html.contains("block-final"));
  }

  #[test]
  fn simplified_flowchart_shows_exactly_one_description_per_node() {
    let data = sample_solution();
    let html = render_flowchart(&math(), &data.flow_nodes, true);
    assert!(html.contains("Two things multiplied, so split the job."));
    assert!(!html.contains("Use integration by parts."));
    // Node 2 has no simplified text; the standard one stays visible.
    assert!(html.contains("Combine the terms."));
  }

  #[test]
  fn steps_hide_rule_in_simplified_mode() {
    let data = sample_solution();
    let standard = render_steps(&math(), &data.traditional_steps, &data.final_answer, false);
    let simple = render_steps(&math(), &data.traditional_steps, &data.final_answer, true);
    assert!(standard.contains("Rule:"));
    assert!(!simple.contains("Rule:"));
    assert_eq!(simple.matches("badge-simplified").count(), 2);
    assert!(simple.contains("Evaluate the remaining integral."));
  }

  #[test]
  fn final_answer_reaches_both_modes_unchanged() {
    let data = sample_solution();
    for mode in [SolveMode::Flowchart, SolveMode::Traditional] {
      let r = render_solution(&math(), &data, mode, false);
      assert_eq!(r.final_answer, data.final_answer, "{mode:?}");
    }
    let steps = render_solution(&math(), &data, SolveMode::Traditional, false);
    assert!(steps.body_html.contains(r#"<div class="final-answer">"#));
    assert!(steps.body_html.contains(r"-x\cos(x)+\sin(x)+C"));
  }

  #[test]
  fn text_is_escaped_and_math_falls_back_without_engine() {
    let mut data = sample_solution();
    data.topic = "<script>".into();
    let r = render_solution(&EngineHandle::default(), &data, SolveMode::Flowchart, false);
    assert!(r.header_html.contains("&lt;script&gt;"));
    assert!(r.header_html.contains("latex-fallback"));
    assert!(r.footer_html.contains("LIATE picks u."));
  }

  #[test]
  fn confetti_stays_in_range() {
    let mut rng = StdRng::seed_from_u64(7);
    let ps = confetti(&mut rng);
    assert_eq!(ps.len(), CONFETTI_COUNT);
    for p in ps {
      assert!((0.0..100.0).contains(&p.left_pct));
      assert!((3.0..5.0).contains(&p.duration_secs));
      assert!((0.0..2.0).contains(&p.delay_secs));
      assert!(CONFETTI_COLORS.contains(&p.color));
    }
  }
}
