//! WebSocket upgrade + message loop. Each client message is parsed as JSON
//! and dispatched against the per-connection quiz state. One connection owns
//! at most one live `QuizSession` and one `VoiceGateway`; both are released
//! when the quiz ends or the socket closes.

use std::sync::Arc;

use axum::{
  extract::{
    ws::{Message, WebSocket},
    Query, State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use serde::Deserialize;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::UserIdentity;
use crate::error::{QuizError, VoiceError};
use crate::parser::parse_quiz;
use crate::protocol::{to_subject_out, to_topic_out, ClientWsMessage, ServerWsMessage};
use crate::session::{QuizSession, Submitted};
use crate::state::AppState;
use crate::voice::{
  completion_utterance, map_spoken_answer, question_utterance, selection_utterance, VoiceGateway,
};

#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
  pub user: Option<String>,
}

/// Per-connection quiz state. The single-writer discipline of the session
/// holds because the message loop processes one event at a time.
struct QuizConn {
  user: UserIdentity,
  accessibility: bool,
  topic_id: Option<String>,
  session: Option<QuizSession>,
  voice: VoiceGateway,
}

#[instrument(level = "info", skip(ws, state))]
pub async fn ws_upgrade(
  ws: WebSocketUpgrade,
  Query(q): Query<WsAuthQuery>,
  State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
  info!(target: "rindeplus_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state, q.user.map(|id| UserIdentity { id })))
}

#[instrument(level = "info", skip(socket, state, user))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>, user: Option<UserIdentity>) {
  // The external identity collaborator says who is logged in; without a
  // user the client must go through the auth flow first.
  let Some(user) = user else {
    warn!(target: "rindeplus_backend", "WebSocket without identity rejected");
    let msg = ServerWsMessage::Error { message: "authentication required".into() };
    if let Ok(out) = serde_json::to_string(&msg) {
      let _ = socket.send(Message::Text(out)).await;
    }
    return;
  };

  info!(target: "rindeplus_backend", user = %user.id, "WebSocket connected");
  let mut conn = QuizConn {
    user,
    accessibility: false,
    topic_id: None,
    session: None,
    voice: VoiceGateway::default(),
  };

  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        // Parse, dispatch, serialize each reply.
        let replies = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "rindeplus_backend", "WS received: {:?}", &incoming);
            handle_client_ws(incoming, &state, &mut conn).await
          }
          Err(e) => vec![ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) }],
        };

        let mut disconnect = false;
        for reply in replies {
          let out = serde_json::to_string(&reply).unwrap_or_else(|e| {
            serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) })
              .to_string()
          });
          if let Err(e) = socket.send(Message::Text(out)).await {
            error!(target: "rindeplus_backend", error = %e, "WS send error");
            disconnect = true;
            break;
          }
        }
        if disconnect {
          break;
        }
      }
      Message::Ping(payload) => {
        let _ = socket.send(Message::Pong(payload)).await;
      }
      Message::Close(_) => break,
      _ => {}
    }
  }

  // Leaving the session cancels any in-flight speech or capture so stale
  // callbacks cannot mutate a session that has moved on.
  conn.voice.release();
  info!(target: "rindeplus_backend", user = %conn.user.id, "WebSocket disconnected");
}

async fn handle_client_ws(
  msg: ClientWsMessage,
  state: &AppState,
  conn: &mut QuizConn,
) -> Vec<ServerWsMessage> {
  match dispatch(msg, state, conn).await {
    Ok(replies) => replies,
    Err(message) => vec![ServerWsMessage::Error { message }],
  }
}

#[instrument(level = "info", skip_all, fields(user = %conn.user.id))]
async fn dispatch(
  msg: ClientWsMessage,
  state: &AppState,
  conn: &mut QuizConn,
) -> Result<Vec<ServerWsMessage>, String> {
  match msg {
    ClientWsMessage::Ping => Ok(vec![ServerWsMessage::Pong]),

    ClientWsMessage::SetAccessibility { enabled } => {
      conn.accessibility = enabled;
      if !enabled {
        conn.voice.release();
      }
      info!(target: "rindeplus_backend", enabled, "Accessibility mode toggled");
      Ok(vec![ServerWsMessage::Accessibility { enabled }])
    }

    ClientWsMessage::ListSubjects { grade } => {
      let subjects = state.subjects_for_grade(grade).await;
      info!(target: "rindeplus_backend", grade, count = subjects.len(), "WS subjects served");
      Ok(vec![ServerWsMessage::Subjects {
        subjects: subjects.iter().map(to_subject_out).collect(),
      }])
    }

    ClientWsMessage::ListTopics { subject_id } => {
      let topics = state
        .topics_for_subject(&subject_id)
        .await
        .map_err(|e| e.to_string())?;
      let ids: Vec<String> = topics.iter().map(|t| t.id.clone()).collect();
      let best = state.best_scores_for_user(&conn.user.id, &ids).await;
      info!(target: "rindeplus_backend", %subject_id, count = topics.len(), "WS topics served");
      Ok(vec![ServerWsMessage::Topics {
        topics: topics.iter().map(|t| to_topic_out(t, &best)).collect(),
      }])
    }

    ClientWsMessage::GetLesson { topic_id } => {
      let topic = state
        .get_topic(&topic_id)
        .await
        .ok_or_else(|| format!("unknown topic: {}", topic_id))?;
      let read_aloud = conn
        .accessibility
        .then(|| format!("{}. {}", topic.name, topic.lesson));
      if let Some(text) = &read_aloud {
        speak_best_effort(&conn.voice, text);
      }
      Ok(vec![ServerWsMessage::Lesson {
        topic_id: topic.id,
        name: topic.name,
        content: topic.lesson,
        read_aloud,
      }])
    }

    ClientWsMessage::StartQuiz { topic_id } => {
      // Switching topics abandons any previous attempt on this connection.
      conn.voice.release();
      let raw = state
        .fetch_topic_quiz_source(&topic_id)
        .await
        .map_err(|e| e.to_string())?;
      let questions = parse_quiz(&raw);
      let session = QuizSession::start(questions).map_err(|e| match e {
        QuizError::EmptyQuiz => format!("no quiz available for topic {}", topic_id),
        other => other.to_string(),
      })?;
      info!(target: "quiz", %topic_id, total = session.total(), "WS quiz started");
      conn.topic_id = Some(topic_id);
      conn.session = Some(session);
      Ok(vec![question_message(conn, state)?])
    }

    ClientWsMessage::ReadQuestion => Ok(vec![question_message(conn, state)?]),

    ClientWsMessage::SelectOption { index } => {
      let session = conn.session.as_mut().ok_or_else(|| QuizError::NoSession.to_string())?;
      session.select_option(index).map_err(|e| e.to_string())?;
      Ok(vec![selected_message(conn, state, index)])
    }

    ClientWsMessage::VoiceAnswer { transcript } => {
      let session = conn.session.as_mut().ok_or_else(|| QuizError::NoSession.to_string())?;
      let count = session.current_options().map_err(|e| e.to_string())?.len();
      match map_spoken_answer(&transcript, count) {
        Some(index) => {
          session.select_option(index).map_err(|e| e.to_string())?;
          Ok(vec![selected_message(conn, state, index)])
        }
        None => {
          let err = VoiceError::OutOfRange { transcript, count };
          warn!(target: "quiz", error = %err, "Voice answer rejected");
          Ok(vec![voice_retry_message(conn, state, err)])
        }
      }
    }

    ClientWsMessage::CaptureVoice => {
      let session = conn.session.as_ref().ok_or_else(|| QuizError::NoSession.to_string())?;
      let count = session.current_options().map_err(|e| e.to_string())?.len();
      match conn.voice.capture_answer(count).await {
        Ok(index) => {
          // Range was checked by the gateway against the same count.
          conn
            .session
            .as_mut()
            .ok_or_else(|| QuizError::NoSession.to_string())?
            .select_option(index)
            .map_err(|e| e.to_string())?;
          Ok(vec![selected_message(conn, state, index)])
        }
        Err(err @ VoiceError::OutOfRange { .. }) => Ok(vec![voice_retry_message(conn, state, err)]),
        Err(err) => {
          warn!(target: "quiz", error = %err, "Voice capture failed");
          Ok(vec![ServerWsMessage::VoiceError {
            message: err.to_string(),
            utterance: matches!(err, VoiceError::Unsupported)
              .then(|| state.utterances.unsupported.clone()),
          }])
        }
      }
    }

    ClientWsMessage::SubmitAnswer => {
      let session = conn.session.as_mut().ok_or_else(|| QuizError::NoSession.to_string())?;
      let submitted = session.submit_current().map_err(|e| e.to_string())?;

      match submitted {
        Submitted::Advanced { correct } => {
          let mut replies = vec![answer_result_message(conn, state, correct)];
          replies.push(question_message(conn, state)?);
          Ok(replies)
        }
        Submitted::Completed { correct, score_percent } => {
          let feedback = answer_result_message(conn, state, correct);

          // Exactly one persistence call per completed attempt. A failed
          // write is reported but does not revert completion.
          let topic_id = conn.topic_id.clone().unwrap_or_default();
          let saved = match state
            .record_quiz_score(&conn.user.id, &topic_id, score_percent)
            .await
          {
            Ok(()) => true,
            Err(e) => {
              error!(target: "quiz", %topic_id, error = %e, "Failed to persist quiz score");
              false
            }
          };

          let session = conn.session.as_ref().ok_or_else(|| QuizError::NoSession.to_string())?;
          let utterance = conn
            .accessibility
            .then(|| completion_utterance(&state.utterances, score_percent));
          if let Some(text) = &utterance {
            speak_best_effort(&conn.voice, text);
          }
          Ok(vec![
            feedback,
            ServerWsMessage::QuizComplete {
              score_percent,
              correct_count: session.correct_count(),
              total: session.total(),
              saved,
              utterance,
            },
          ])
        }
      }
    }

    ClientWsMessage::RetryQuiz => {
      let session = conn.session.as_mut().ok_or_else(|| QuizError::NoSession.to_string())?;
      session.retry().map_err(|e| e.to_string())?;
      conn.voice.release();
      Ok(vec![question_message(conn, state)?])
    }

    ClientWsMessage::EndQuiz => {
      conn.voice.release();
      conn.session = None;
      conn.topic_id = None;
      Ok(vec![ServerWsMessage::QuizEnded])
    }
  }
}

/// Build the `question` reply for the current question, composing and
/// speaking the read-aloud utterance when accessibility mode is on.
fn question_message(conn: &QuizConn, state: &AppState) -> Result<ServerWsMessage, String> {
  let session = conn.session.as_ref().ok_or_else(|| QuizError::NoSession.to_string())?;
  let prompt = session.current_prompt().map_err(|e| e.to_string())?;
  let options = session.current_options().map_err(|e| e.to_string())?;

  let read_aloud = conn.accessibility.then(|| {
    question_utterance(
      &state.utterances,
      session.current_index(),
      session.total(),
      prompt,
      options,
    )
  });
  if let Some(text) = &read_aloud {
    speak_best_effort(&conn.voice, text);
  }

  Ok(ServerWsMessage::Question {
    index: session.current_index(),
    total: session.total(),
    prompt: prompt.to_string(),
    options: options.to_vec(),
    read_aloud,
  })
}

fn selected_message(conn: &QuizConn, state: &AppState, index: usize) -> ServerWsMessage {
  let utterance = conn
    .accessibility
    .then(|| selection_utterance(&state.utterances, index));
  if let Some(text) = &utterance {
    speak_best_effort(&conn.voice, text);
  }
  ServerWsMessage::Selected {
    index,
    letter: crate::util::option_letter(index),
    utterance,
  }
}

fn answer_result_message(conn: &QuizConn, state: &AppState, correct: bool) -> ServerWsMessage {
  let utterance = conn.accessibility.then(|| {
    if correct {
      state.utterances.correct.clone()
    } else {
      state.utterances.incorrect.clone()
    }
  });
  if let Some(text) = &utterance {
    speak_best_effort(&conn.voice, text);
  }
  ServerWsMessage::AnswerResult { correct, utterance }
}

/// Out-of-range spoken answer: no selection is made; the user hears the
/// correction prompt and retries the capture.
fn voice_retry_message(conn: &QuizConn, state: &AppState, err: VoiceError) -> ServerWsMessage {
  let utterance = state.utterances.out_of_range.clone();
  speak_best_effort(&conn.voice, &utterance);
  ServerWsMessage::VoiceError {
    message: err.to_string(),
    utterance: Some(utterance),
  }
}

fn speak_best_effort(voice: &VoiceGateway, text: &str) {
  if let Err(e) = voice.speak(text) {
    warn!(target: "quiz", error = %e, "Speech synthesis failed");
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const CELL_QUIZ_ANSWERS: [&str; 2] = ["La célula", "La mitocondria"];

  fn test_conn(accessibility: bool) -> QuizConn {
    QuizConn {
      user: UserIdentity { id: "u1".into() },
      accessibility,
      topic_id: None,
      session: None,
      voice: VoiceGateway::default(),
    }
  }

  async fn start_cell_quiz(state: &AppState, conn: &mut QuizConn) -> Vec<ServerWsMessage> {
    dispatch(
      ClientWsMessage::StartQuiz { topic_id: "top-celula".into() },
      state,
      conn,
    )
    .await
    .unwrap()
  }

  fn correct_index(conn: &QuizConn) -> usize {
    let session = conn.session.as_ref().unwrap();
    session
      .current_options()
      .unwrap()
      .iter()
      .position(|o| CELL_QUIZ_ANSWERS.contains(&o.as_str()))
      .unwrap()
  }

  #[tokio::test]
  async fn full_quiz_flow_completes_and_records_score() {
    let state = AppState::from_config(None);
    let mut conn = test_conn(false);

    let replies = start_cell_quiz(&state, &mut conn).await;
    assert!(matches!(replies[0], ServerWsMessage::Question { index: 0, total: 2, .. }));

    // First question: answer correctly, expect feedback plus the next question.
    let idx = correct_index(&conn);
    dispatch(ClientWsMessage::SelectOption { index: idx }, &state, &mut conn).await.unwrap();
    let replies = dispatch(ClientWsMessage::SubmitAnswer, &state, &mut conn).await.unwrap();
    assert!(matches!(replies[0], ServerWsMessage::AnswerResult { correct: true, .. }));
    assert!(matches!(replies[1], ServerWsMessage::Question { index: 1, .. }));

    // Last question: completion carries the score and persists it.
    let idx = correct_index(&conn);
    dispatch(ClientWsMessage::SelectOption { index: idx }, &state, &mut conn).await.unwrap();
    let replies = dispatch(ClientWsMessage::SubmitAnswer, &state, &mut conn).await.unwrap();
    assert!(matches!(
      replies[1],
      ServerWsMessage::QuizComplete { score_percent: 100, correct_count: 2, total: 2, saved: true, .. }
    ));

    let best = state
      .best_scores_for_user("u1", &["top-celula".to_string()])
      .await;
    assert_eq!(best.get("top-celula"), Some(&100));

    // Retry reuses the parsed questions and starts over.
    let replies = dispatch(ClientWsMessage::RetryQuiz, &state, &mut conn).await.unwrap();
    assert!(matches!(replies[0], ServerWsMessage::Question { index: 0, total: 2, .. }));
    assert_eq!(conn.session.as_ref().unwrap().correct_count(), 0);
  }

  #[tokio::test]
  async fn voice_answer_out_of_range_selects_nothing() {
    let state = AppState::from_config(None);
    let mut conn = test_conn(true);
    start_cell_quiz(&state, &mut conn).await;

    // Three options on the current question, so "E" is out of range.
    let replies = dispatch(
      ClientWsMessage::VoiceAnswer { transcript: "E".into() },
      &state,
      &mut conn,
    )
    .await
    .unwrap();
    match &replies[0] {
      ServerWsMessage::VoiceError { utterance, .. } => {
        assert_eq!(utterance.as_deref(), Some(state.utterances.out_of_range.as_str()));
      }
      other => panic!("expected voice_error, got {:?}", other),
    }
    assert_eq!(conn.session.as_ref().unwrap().selected(), None);

    // "B" maps to index 1.
    let replies = dispatch(
      ClientWsMessage::VoiceAnswer { transcript: "B".into() },
      &state,
      &mut conn,
    )
    .await
    .unwrap();
    assert!(matches!(replies[0], ServerWsMessage::Selected { index: 1, letter: 'B', .. }));
    assert_eq!(conn.session.as_ref().unwrap().selected(), Some(1));
  }

  #[tokio::test]
  async fn accessibility_mode_composes_read_aloud() {
    let state = AppState::from_config(None);
    let mut conn = test_conn(true);
    let replies = start_cell_quiz(&state, &mut conn).await;
    match &replies[0] {
      ServerWsMessage::Question { read_aloud, .. } => {
        let text = read_aloud.as_deref().unwrap();
        assert!(text.starts_with("Pregunta 1 de 2."));
        assert!(text.contains("Opción A:"));
        assert!(text.contains("Opción C:"));
      }
      other => panic!("expected question, got {:?}", other),
    }
  }

  #[tokio::test]
  async fn server_side_capture_without_engine_is_a_notification() {
    let state = AppState::from_config(None);
    let mut conn = test_conn(true);
    start_cell_quiz(&state, &mut conn).await;

    // Default gateway has no recognizer; the capability absence is surfaced,
    // manual selection still works afterwards.
    let replies = dispatch(ClientWsMessage::CaptureVoice, &state, &mut conn).await.unwrap();
    match &replies[0] {
      ServerWsMessage::VoiceError { utterance, .. } => {
        assert_eq!(utterance.as_deref(), Some(state.utterances.unsupported.as_str()));
      }
      other => panic!("expected voice_error, got {:?}", other),
    }
    dispatch(ClientWsMessage::SelectOption { index: 0 }, &state, &mut conn).await.unwrap();
    assert_eq!(conn.session.as_ref().unwrap().selected(), Some(0));
  }

  #[tokio::test]
  async fn unknown_topic_and_missing_session_are_user_visible_errors() {
    let state = AppState::from_config(None);
    let mut conn = test_conn(false);

    let replies = handle_client_ws(
      ClientWsMessage::StartQuiz { topic_id: "nope".into() },
      &state,
      &mut conn,
    )
    .await;
    assert!(matches!(replies[0], ServerWsMessage::Error { .. }));

    let replies = handle_client_ws(ClientWsMessage::SubmitAnswer, &state, &mut conn).await;
    assert!(matches!(replies[0], ServerWsMessage::Error { .. }));
  }
}
