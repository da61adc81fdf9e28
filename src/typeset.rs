//! Math typesetting with a plain-text fallback.
//!
//! The engine becomes available through `EngineSlot`, a one-shot readiness
//! notification. Renders await it cooperatively for a bounded time; dropping the
//! render future abandons the wait and leaves nothing running. Any failure
//! (never ready, parse error, engine panic) degrades to the raw markup string.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::util::escape_html;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
  #[default]
  Inline,
  Block,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypesetError {
  #[error("parse error: {0}")]
  Parse(String),
}

/// A typesetting engine. Implementations must be cheap to call repeatedly.
pub trait MathEngine: Send + Sync {
  fn render(&self, latex: &str, mode: DisplayMode) -> Result<String, TypesetError>;

  fn name(&self) -> &'static str;
}

/// LaTeX → MathML.
pub struct MathMlEngine;

impl MathEngine for MathMlEngine {
  fn render(&self, latex: &str, mode: DisplayMode) -> Result<String, TypesetError> {
    // latex2mathml may close an open group at end of input; half-typed markup must not render.
    check_groups(latex)?;
    let style = match mode {
      DisplayMode::Inline => latex2mathml::DisplayStyle::Inline,
      DisplayMode::Block => latex2mathml::DisplayStyle::Block,
    };
    latex2mathml::latex_to_mathml(latex, style).map_err(|e| TypesetError::Parse(e.to_string()))
  }

  fn name(&self) -> &'static str {
    "latex2mathml"
  }
}

/// Rejects unbalanced `{}` groups. Escaped braces (`\{`, `\}`) are literals.
fn check_groups(latex: &str) -> Result<(), TypesetError> {
  let mut depth = 0usize;
  let mut chars = latex.chars();
  while let Some(c) = chars.next() {
    match c {
      '\\' => {
        chars.next();
      }
      '{' => depth += 1,
      '}' => {
        depth = depth
          .checked_sub(1)
          .ok_or_else(|| TypesetError::Parse("unexpected '}'".into()))?;
      }
      _ => {}
    }
  }
  if depth > 0 {
    return Err(TypesetError::Parse(format!("{depth} unclosed group(s)")));
  }
  Ok(())
}

/// Result of typesetting one expression.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Rendered {
  Markup(String),
  /// Raw markup shown as monospaced text.
  Fallback(String),
}

impl Rendered {
  pub fn is_fallback(&self) -> bool {
    matches!(self, Rendered::Fallback(_))
  }

  pub fn to_html(&self) -> String {
    match self {
      Rendered::Markup(html) => format!(r#"<span class="latex-content">{html}</span>"#),
      Rendered::Fallback(raw) => format!(r#"<span class="latex-fallback">{}</span>"#, escape_html(raw)),
    }
  }
}

type SharedEngine = Arc<dyn MathEngine>;

/// Readiness notification for the math engine, resolved once by `install`.
#[derive(Clone)]
pub struct EngineSlot {
  tx: Arc<watch::Sender<Option<SharedEngine>>>,
}

impl Default for EngineSlot {
  fn default() -> Self {
    Self::new()
  }
}

impl EngineSlot {
  pub fn new() -> Self {
    let (tx, _rx) = watch::channel(None);
    Self { tx: Arc::new(tx) }
  }

  /// Slot that is ready from the start.
  pub fn ready_with(engine: SharedEngine) -> Self {
    let slot = Self::new();
    slot.install(engine);
    slot
  }

  /// Make the engine available. Only the first call takes effect.
  pub fn install(&self, engine: SharedEngine) -> bool {
    let name = engine.name();
    let installed = self.tx.send_if_modified(|slot| {
      if slot.is_some() {
        return false;
      }
      *slot = Some(engine);
      true
    });
    if installed {
      info!(target: "typeset", engine = name, "Math engine ready");
    } else {
      warn!(target: "typeset", engine = name, "Math engine already installed; ignoring");
    }
    installed
  }

  pub fn current(&self) -> Option<SharedEngine> {
    self.tx.borrow().clone()
  }

  /// Wait until an engine is installed.
  pub async fn ready(&self) -> Option<SharedEngine> {
    let mut rx = self.tx.subscribe();
    let engine = rx.wait_for(|e| e.is_some()).await.ok()?.clone();
    engine
  }
}

/// Engine resolved for one batch of renders (possibly absent).
#[derive(Clone, Default)]
pub struct EngineHandle(Option<SharedEngine>);

impl EngineHandle {
  pub fn new(engine: Option<SharedEngine>) -> Self {
    Self(engine)
  }

  /// Typeset one expression. Never panics; failures come back as `Rendered::Fallback`.
  pub fn render(&self, latex: &str, mode: DisplayMode) -> Rendered {
    let Some(engine) = &self.0 else {
      return Rendered::Fallback(latex.to_string());
    };
    match catch_unwind(AssertUnwindSafe(|| engine.render(latex, mode))) {
      Ok(Ok(html)) if !html.is_empty() => Rendered::Markup(html),
      Ok(Ok(_)) => Rendered::Fallback(latex.to_string()),
      Ok(Err(e)) => {
        debug!(target: "typeset", error = %e, latex_len = latex.len(), "Typesetting failed; falling back to text");
        Rendered::Fallback(latex.to_string())
      }
      Err(_) => {
        warn!(target: "typeset", engine = engine.name(), latex_len = latex.len(), "Math engine panicked; falling back to text");
        Rendered::Fallback(latex.to_string())
      }
    }
  }
}

/// Front door used by the presenter.
#[derive(Clone)]
pub struct Typesetter {
  slot: EngineSlot,
  ready_timeout: Duration,
}

impl Typesetter {
  pub fn new(slot: EngineSlot, ready_timeout: Duration) -> Self {
    Self { slot, ready_timeout }
  }

  pub fn slot(&self) -> &EngineSlot {
    &self.slot
  }

  /// Resolve the engine, waiting at most `ready_timeout` for it to become available.
  pub async fn handle(&self) -> EngineHandle {
    if let Some(engine) = self.slot.current() {
      return EngineHandle::new(Some(engine));
    }
    match tokio::time::timeout(self.ready_timeout, self.slot.ready()).await {
      Ok(engine) => EngineHandle::new(engine),
      Err(_) => {
        debug!(target: "typeset", timeout = ?self.ready_timeout, "Math engine not ready; rendering as text");
        EngineHandle::new(None)
      }
    }
  }

  pub async fn render(&self, latex: &str, mode: DisplayMode) -> Rendered {
    self.handle().await.render(latex, mode)
  }
}
