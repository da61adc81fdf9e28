//! WebSocket session. Each connection owns one `Session`; client frames are parsed
//! as JSON and applied to it, and every frame gets exactly one reply.
//!
//! Solves run in spawned tasks and report back over a channel, so the socket keeps
//! serving while a solve is pending (a second submit is answered with an error).
//! A completion whose generation is no longer current is dropped silently.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::SolutionData;
use crate::error::SolveError;
use crate::input::ImageAttachment;
use crate::logic::{preview, render, run_solve};
use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::render::confetti;
use crate::session::{Completion, Session};
use crate::state::AppState;
use crate::typeset::DisplayMode;

type SolveDone = (u64, Result<SolutionData, SolveError>);

enum Event {
  Client(Option<Result<Message, axum::Error>>),
  SolveDone(SolveDone),
}

#[instrument(level = "info", skip(ws, state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "flowsolve", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state), fields(session_id = %Uuid::new_v4()))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "flowsolve", "WebSocket connected");
  let mut session = Session::new();
  let (done_tx, mut done_rx) = mpsc::channel::<SolveDone>(4);

  loop {
    let event = tokio::select! {
      incoming = socket.recv() => Event::Client(incoming),
      Some(done) = done_rx.recv() => Event::SolveDone(done),
    };

    let reply = match event {
      Event::Client(Some(Ok(Message::Text(txt)))) => match serde_json::from_str::<ClientWsMessage>(&txt) {
        Ok(incoming) => {
          debug!(target: "flowsolve", "WS received: {:?}", &incoming);
          handle_client_ws(incoming, &mut session, &state, &done_tx).await
        }
        Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
      },
      Event::Client(Some(Ok(Message::Ping(payload)))) => {
        let _ = socket.send(Message::Pong(payload)).await;
        continue;
      }
      Event::Client(Some(Ok(Message::Close(_)))) | Event::Client(None) => break,
      Event::Client(Some(Err(e))) => {
        warn!(target: "flowsolve", error = %e, "WS receive error");
        break;
      }
      Event::Client(Some(Ok(_))) => continue,
      Event::SolveDone((generation, result)) => match finish_solve(&mut session, &state, generation, result).await {
        Some(msg) => msg,
        None => continue,
      },
    };

    let out = serde_json::to_string(&reply).unwrap_or_else(|e| {
      serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
    });

    if let Err(e) = socket.send(Message::Text(out)).await {
      error!(target: "flowsolve", error = %e, "WS send error");
      break;
    }
  }
  info!(target: "flowsolve", streak = session.streak(), "WebSocket disconnected");
}

/// Apply one client message to the session and build the reply.
pub(crate) async fn handle_client_ws(
  msg: ClientWsMessage,
  session: &mut Session,
  state: &Arc<AppState>,
  done_tx: &mpsc::Sender<SolveDone>,
) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::SetInput { text, cursor } => {
      session.input.set_text(text, cursor);
      state_message(session, state).await
    }
    ClientWsMessage::MoveCursor { cursor } => {
      session.input.set_cursor(cursor);
      state_message(session, state).await
    }
    ClientWsMessage::TypeText { text } => {
      session.input.type_text(&text);
      state_message(session, state).await
    }
    ClientWsMessage::InsertSymbol { symbol } => {
      session.input.insert_symbol(&symbol);
      state_message(session, state).await
    }
    ClientWsMessage::DeleteChar => {
      session.input.delete_last();
      state_message(session, state).await
    }

    ClientWsMessage::AttachImage { image_base64 } => match ImageAttachment::from_base64(&image_base64) {
      Ok(img) => {
        info!(target: "session", encoded_len = img.encoded_len(), "Image attached");
        session.attach_image(img);
        state_message(session, state).await
      }
      Err(e) => ServerWsMessage::Error { message: e.to_string() },
    },
    ClientWsMessage::ClearImage => {
      session.clear_image();
      state_message(session, state).await
    }

    ClientWsMessage::Solve { query } => match session.begin_solve_with(query.as_deref()) {
      Ok(pending) => {
        let state = state.clone();
        let done_tx = done_tx.clone();
        tokio::spawn(async move {
          let result = run_solve(&state, &pending.request).await;
          // Receiver gone means the socket closed; nothing left to update.
          let _ = done_tx.send((pending.generation, result)).await;
        });
        ServerWsMessage::State { state: session.snapshot(), preview: None }
      }
      Err(e) => ServerWsMessage::Error { message: e.to_string() },
    },

    ClientWsMessage::SwitchMode => match session.switch_mode() {
      Ok(_) => solution_message(session, state).await,
      Err(e) => ServerWsMessage::Error { message: e.to_string() },
    },
    ClientWsMessage::SetMode { mode } => match session.set_mode(mode) {
      Ok(_) => solution_message(session, state).await,
      Err(e) => ServerWsMessage::Error { message: e.to_string() },
    },
    ClientWsMessage::ToggleSimplified => match session.toggle_simplified() {
      Ok(_) => solution_message(session, state).await,
      Err(e) => ServerWsMessage::Error { message: e.to_string() },
    },

    ClientWsMessage::Reset => {
      session.reset();
      state_message(session, state).await
    }
  }
}

pub(crate) async fn finish_solve(
  session: &mut Session,
  state: &AppState,
  generation: u64,
  result: Result<SolutionData, SolveError>,
) -> Option<ServerWsMessage> {
  match session.complete(generation, result) {
    Completion::Stale => None,
    Completion::Failed { notice } => Some(ServerWsMessage::SolveFailed {
      message: notice.to_string(),
      state: session.snapshot(),
    }),
    Completion::Solved { .. } => Some(solution_message(session, state).await),
  }
}

async fn state_message(session: &Session, state: &AppState) -> ServerWsMessage {
  let preview = preview(state, session.input.text(), DisplayMode::Inline).await;
  ServerWsMessage::State { state: session.snapshot(), preview }
}

async fn solution_message(session: &Session, state: &AppState) -> ServerWsMessage {
  let Some((data, mode, simplified)) = session.solution() else {
    return ServerWsMessage::State { state: session.snapshot(), preview: None };
  };
  let rendered = render(state, data, mode, simplified).await;
  let confetti = session.celebrating().then(|| confetti(&mut rand::thread_rng()));
  ServerWsMessage::Solution {
    solution: data.clone(),
    rendered,
    state: session.snapshot(),
    confetti,
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use async_trait::async_trait;

  use super::*;
  use crate::config::{Prompts, Settings};
  use crate::domain::tests::sample_solution;
  use crate::gemini::SolverBackend;
  use crate::request::SolveRequest;
  use crate::typeset::{tests::FakeEngine, EngineSlot, Typesetter};

  struct Canned;

  #[async_trait]
  impl SolverBackend for Canned {
    async fn solve(&self, _req: &SolveRequest) -> Result<SolutionData, SolveError> {
      Ok(sample_solution())
    }

    fn describe(&self) -> String {
      "canned".into()
    }
  }

  fn app() -> Arc<AppState> {
    let ts = Typesetter::new(EngineSlot::ready_with(Arc::new(FakeEngine)), Duration::from_millis(50));
    Arc::new(AppState::new(Arc::new(Canned), ts, Prompts::default(), Settings::default()))
  }

  #[tokio::test]
  async fn solve_round_trip_through_channel() {
    let state = app();
    let (tx, mut rx) = mpsc::channel(4);
    let mut session = Session::new();

    let reply = handle_client_ws(ClientWsMessage::Solve { query: Some("Integrate x * sin(x) dx".into()) }, &mut session, &state, &tx).await;
    assert!(matches!(reply, ServerWsMessage::State { ref state, .. } if state.loading));

    let busy = handle_client_ws(ClientWsMessage::Solve { query: None }, &mut session, &state, &tx).await;
    assert!(matches!(busy, ServerWsMessage::Error { .. }));

    let (generation, result) = rx.recv().await.unwrap();
    let msg = finish_solve(&mut session, &state, generation, result).await.unwrap();
    match msg {
      ServerWsMessage::Solution { solution, rendered, state, confetti } => {
        assert_eq!(solution.final_answer, r"-x\cos(x)+\sin(x)+C");
        assert!(rendered.body_html.contains("flowchart"));
        assert_eq!(state.streak, 1);
        assert!(confetti.is_none());
      }
      other => panic!("unexpected reply: {other:?}"),
    }
  }

  #[tokio::test]
  async fn reset_before_completion_drops_the_result() {
    let state = app();
    let (tx, mut rx) = mpsc::channel(4);
    let mut session = Session::new();
    session.input.set_text("1+1", None);

    handle_client_ws(ClientWsMessage::Solve { query: None }, &mut session, &state, &tx).await;
    handle_client_ws(ClientWsMessage::Reset, &mut session, &state, &tx).await;
    let (generation, result) = rx.recv().await.unwrap();
    assert!(finish_solve(&mut session, &state, generation, result).await.is_none());
    assert!(session.solution().is_none());
  }

  #[tokio::test]
  async fn keyboard_insert_replies_with_preview() {
    let state = app();
    let (tx, _rx) = mpsc::channel(4);
    let mut session = Session::new();
    handle_client_ws(ClientWsMessage::InsertSymbol { symbol: r"\frac{}{}".into() }, &mut session, &state, &tx).await;
    let reply = handle_client_ws(ClientWsMessage::TypeText { text: "1".into() }, &mut session, &state, &tx).await;
    match reply {
      ServerWsMessage::State { state, preview } => {
        assert_eq!(state.input, r"\frac{1}{}");
        assert!(preview.is_some());
      }
      other => panic!("unexpected reply: {other:?}"),
    }
  }

  #[tokio::test]
  async fn mode_switch_without_solution_is_an_error() {
    let state = app();
    let (tx, _rx) = mpsc::channel(4);
    let mut session = Session::new();
    let reply = handle_client_ws(ClientWsMessage::SwitchMode, &mut session, &state, &tx).await;
    assert!(matches!(reply, ServerWsMessage::Error { .. }));
  }
}
