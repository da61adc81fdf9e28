//! Per-connection presentation state and the solve lifecycle.
//!
//! A session is either showing nothing or showing one solution. At most one solve
//! is in flight; every solve is tagged with a generation number and a completion
//! whose generation no longer matches (because of a reset or a newer submit) is
//! dropped without touching state.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::{SolutionData, SolveMode};
use crate::error::SolveError;
use crate::input::{ImageAttachment, InputBuffer};
use crate::request::SolveRequest;

/// Every this-many successful solves, the celebration plays.
pub const CELEBRATE_EVERY: u32 = 5;

#[derive(Clone, Debug, PartialEq)]
pub enum View {
  NoSolution,
  ShowingSolution { data: SolutionData, mode: SolveMode, simplified: bool },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
  #[error("a solve is already in progress")]
  Busy,
  #[error("nothing to solve: type a problem or attach a photo")]
  EmptyInput,
  #[error("no solution is being shown")]
  NoSolution,
}

/// Ticket for a solve that has been started but not completed.
#[derive(Debug)]
pub struct PendingSolve {
  pub generation: u64,
  pub request: SolveRequest,
}

/// What `complete` did with a finished solve.
#[derive(Debug, PartialEq)]
pub enum Completion {
  Solved { streak: u32, celebrate: bool },
  Failed { notice: &'static str },
  /// Superseded by a reset or a newer submit; ignored.
  Stale,
}

#[derive(Debug, Default)]
pub struct Session {
  pub input: InputBuffer,
  image: Option<ImageAttachment>,
  loading: bool,
  generation: u64,
  streak: u32,
  view: Option<ShowingState>,
}

#[derive(Debug, Clone, PartialEq)]
struct ShowingState {
  data: SolutionData,
  mode: SolveMode,
  simplified: bool,
}

/// Serializable summary of the session for clients.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
  pub input: String,
  pub cursor: usize,
  pub has_image: bool,
  pub loading: bool,
  pub can_submit: bool,
  pub streak: u32,
  pub showing_solution: bool,
  pub mode: Option<SolveMode>,
  pub simplified: Option<bool>,
  pub celebrating: bool,
}

impl Session {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn view(&self) -> View {
    match &self.view {
      None => View::NoSolution,
      Some(s) => View::ShowingSolution { data: s.data.clone(), mode: s.mode, simplified: s.simplified },
    }
  }

  pub fn solution(&self) -> Option<(&SolutionData, SolveMode, bool)> {
    self.view.as_ref().map(|s| (&s.data, s.mode, s.simplified))
  }

  pub fn is_loading(&self) -> bool {
    self.loading
  }

  pub fn streak(&self) -> u32 {
    self.streak
  }

  pub fn image(&self) -> Option<&ImageAttachment> {
    self.image.as_ref()
  }

  /// Attach a photo, replacing any previous one.
  pub fn attach_image(&mut self, image: ImageAttachment) {
    if self.image.is_some() {
      debug!(target: "session", "Replacing attached image");
    }
    self.image = Some(image);
  }

  pub fn clear_image(&mut self) {
    self.image = None;
  }

  /// Whether the Solve control is enabled.
  pub fn can_submit(&self) -> bool {
    !self.loading && (!self.input.is_blank() || self.image.is_some())
  }

  /// Start a solve from the current input. Clears any shown solution.
  pub fn begin_solve(&mut self) -> Result<PendingSolve, SessionError> {
    self.begin_solve_with(None)
  }

  /// Start a solve, optionally with a query that replaces the buffer (sample questions).
  /// A blank override is ignored and the buffer is used.
  pub fn begin_solve_with(&mut self, query_override: Option<&str>) -> Result<PendingSolve, SessionError> {
    if self.loading {
      warn!(target: "session", generation = self.generation, "Submit rejected: solve in flight");
      return Err(SessionError::Busy);
    }
    if let Some(q) = query_override.filter(|q| !q.trim().is_empty()) {
      self.input.set_text(q, None);
    }
    let request = SolveRequest::new(self.input.text(), self.image.clone())
      .map_err(|_| SessionError::EmptyInput)?;

    self.generation += 1;
    self.loading = true;
    self.view = None;
    info!(target: "session", generation = self.generation, has_image = self.image.is_some(), "Solve started");
    Ok(PendingSolve { generation: self.generation, request })
  }

  /// Apply the outcome of a solve started with `begin_solve`.
  pub fn complete(&mut self, generation: u64, result: Result<SolutionData, SolveError>) -> Completion {
    if generation != self.generation || !self.loading {
      info!(target: "session", generation, current = self.generation, "Discarding stale solve result");
      return Completion::Stale;
    }
    self.loading = false;
    match result {
      Ok(data) => {
        self.streak += 1;
        self.view = Some(ShowingState { data, mode: SolveMode::default(), simplified: false });
        info!(target: "session", generation, streak = self.streak, "Solve succeeded");
        Completion::Solved { streak: self.streak, celebrate: self.celebrating() }
      }
      Err(e) => {
        warn!(target: "session", generation, error = %e, "Solve failed");
        Completion::Failed { notice: e.user_notice() }
      }
    }
  }

  pub fn switch_mode(&mut self) -> Result<SolveMode, SessionError> {
    let s = self.view.as_mut().ok_or(SessionError::NoSolution)?;
    s.mode = s.mode.toggled();
    Ok(s.mode)
  }

  pub fn set_mode(&mut self, mode: SolveMode) -> Result<SolveMode, SessionError> {
    let s = self.view.as_mut().ok_or(SessionError::NoSolution)?;
    s.mode = mode;
    Ok(s.mode)
  }

  pub fn toggle_simplified(&mut self) -> Result<bool, SessionError> {
    let s = self.view.as_mut().ok_or(SessionError::NoSolution)?;
    s.simplified = !s.simplified;
    Ok(s.simplified)
  }

  /// Back to an empty view. Any solve still in flight becomes stale. Streak is kept.
  pub fn reset(&mut self) {
    self.generation += 1;
    self.view = None;
    self.image = None;
    self.loading = false;
    info!(target: "session", generation = self.generation, streak = self.streak, "Session reset");
  }

  /// Celebration shows while a solution is displayed and the streak is a positive multiple of five.
  pub fn celebrating(&self) -> bool {
    self.view.is_some() && self.streak > 0 && self.streak % CELEBRATE_EVERY == 0
  }

  pub fn snapshot(&self) -> SessionSnapshot {
    SessionSnapshot {
      input: self.input.text().to_string(),
      cursor: self.input.cursor(),
      has_image: self.image.is_some(),
      loading: self.loading,
      can_submit: self.can_submit(),
      streak: self.streak,
      showing_solution: self.view.is_some(),
      mode: self.view.as_ref().map(|s| s.mode),
      simplified: self.view.as_ref().map(|s| s.simplified),
      celebrating: self.celebrating(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::tests::sample_solution;

  fn solved_session() -> Session {
    let mut s = Session::new();
    s.input.set_text("Integrate x * sin(x) dx", None);
    let p = s.begin_solve().unwrap();
    s.complete(p.generation, Ok(sample_solution()));
    s
  }

  #[test]
  fn empty_input_never_starts_a_solve() {
    let mut s = Session::new();
    assert!(!s.can_submit());
    assert_eq!(s.begin_solve().unwrap_err(), SessionError::EmptyInput);
    assert!(!s.is_loading());
  }

  #[test]
  fn image_alone_is_enough() {
    let mut s = Session::new();
    s.attach_image(ImageAttachment::from_base64("aGVsbG8=").unwrap());
    assert!(s.begin_solve().is_ok());
  }

  #[test]
  fn second_submit_while_pending_is_busy() {
    let mut s = Session::new();
    s.input.set_text("1+1", None);
    s.begin_solve().unwrap();
    assert!(!s.can_submit());
    assert_eq!(s.begin_solve().unwrap_err(), SessionError::Busy);
  }

  #[test]
  fn success_shows_flowchart_standard_and_bumps_streak() {
    let s = solved_session();
    match s.view() {
      View::ShowingSolution { data, mode, simplified } => {
        assert_eq!(data.final_answer, r"-x\cos(x)+\sin(x)+C");
        assert_eq!(mode, SolveMode::Flowchart);
        assert!(!simplified);
      }
      View::NoSolution => panic!("expected a solution"),
    }
    assert_eq!(s.streak(), 1);
    assert!(!s.is_loading());
  }

  #[test]
  fn failure_returns_to_no_solution_with_notice() {
    let mut s = Session::new();
    s.input.set_text("1+1", None);
    let p = s.begin_solve().unwrap();
    let c = s.complete(p.generation, Err(SolveError::EmptyResponse));
    assert!(matches!(c, Completion::Failed { .. }));
    assert_eq!(s.view(), View::NoSolution);
    assert!(!s.is_loading());
    assert_eq!(s.streak(), 0);
  }

  #[test]
  fn switching_mode_keeps_data() {
    let mut s = solved_session();
    let before = s.solution().unwrap().0.clone();
    assert_eq!(s.switch_mode().unwrap(), SolveMode::Traditional);
    assert_eq!(s.switch_mode().unwrap(), SolveMode::Flowchart);
    assert_eq!(s.solution().unwrap().0, &before);
  }

  #[test]
  fn toggles_require_a_solution() {
    let mut s = Session::new();
    assert_eq!(s.switch_mode().unwrap_err(), SessionError::NoSolution);
    assert_eq!(s.toggle_simplified().unwrap_err(), SessionError::NoSolution);
  }

  #[test]
  fn reset_keeps_streak_and_clears_image() {
    let mut s = solved_session();
    s.attach_image(ImageAttachment::from_base64("aGVsbG8=").unwrap());
    s.reset();
    assert_eq!(s.view(), View::NoSolution);
    assert!(s.image().is_none());
    assert_eq!(s.streak(), 1);
  }

  #[test]
  fn late_response_after_reset_is_ignored() {
    let mut s = Session::new();
    s.input.set_text("1+1", None);
    let p = s.begin_solve().unwrap();
    s.reset();
    assert_eq!(s.complete(p.generation, Ok(sample_solution())), Completion::Stale);
    assert_eq!(s.view(), View::NoSolution);
    assert_eq!(s.streak(), 0);
  }

  #[test]
  fn old_generation_cannot_overwrite_newer_solve() {
    let mut s = Session::new();
    s.input.set_text("first", None);
    let first = s.begin_solve().unwrap();
    s.reset();
    s.input.set_text("second", None);
    let second = s.begin_solve().unwrap();
    assert_eq!(s.complete(first.generation, Ok(sample_solution())), Completion::Stale);
    assert!(s.is_loading());
    assert!(matches!(s.complete(second.generation, Ok(sample_solution())), Completion::Solved { .. }));
  }

  #[test]
  fn celebrates_every_fifth_solve() {
    let mut s = Session::new();
    s.input.set_text("1+1", None);
    for n in 1..=15u32 {
      let p = s.begin_solve().unwrap();
      let c = s.complete(p.generation, Ok(sample_solution()));
      assert_eq!(c, Completion::Solved { streak: n, celebrate: n % 5 == 0 });
      assert_eq!(s.celebrating(), n % 5 == 0);
    }
    s.reset();
    assert!(!s.celebrating());
  }

  #[test]
  fn sample_question_override_replaces_input() {
    let mut s = Session::new();
    let p = s.begin_solve_with(Some("Find the derivative of ln(tan(x))")).unwrap();
    assert_eq!(p.request.query(), "Find the derivative of ln(tan(x))");
    assert_eq!(s.input.text(), "Find the derivative of ln(tan(x))");
  }

  #[test]
  fn blank_override_keeps_the_typed_problem() {
    let mut s = Session::new();
    s.input.set_text("2x + 3 = 7", None);
    let p = s.begin_solve_with(Some("  ")).unwrap();
    assert_eq!(p.request.query(), "2x + 3 = 7");
    assert_eq!(s.input.text(), "2x + 3 = 7");

    let mut empty = Session::new();
    assert_eq!(empty.begin_solve_with(Some("")).unwrap_err(), SessionError::EmptyInput);
  }

  #[test]
  fn attaching_a_second_image_replaces_the_first() {
    let mut s = Session::new();
    s.attach_image(ImageAttachment::from_base64("Zmlyc3Q=").unwrap());
    s.attach_image(ImageAttachment::from_base64("c2Vjb25k").unwrap());
    assert_eq!(s.image().unwrap().base64(), "c2Vjb25k");

    let p = s.begin_solve().unwrap();
    let sent = p.request.image().unwrap();
    assert_eq!(sent.base64(), "c2Vjb25k");
    assert_eq!(sent.encoded_len(), "c2Vjb25k".len());
  }
}
