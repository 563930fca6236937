//! Domain models used by the backend: questions, subjects, topics, progress
//! and user identity.

use serde::{Deserialize, Serialize};

/// One multiple-choice question, built once by the parser and immutable
/// thereafter. `options` are already in display (shuffled) order and
/// `correct_index` points into that order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Question {
  pub prompt: String,
  pub options: Vec<String>,
  pub correct_index: usize,
}

/// Where did the content come from?
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ContentSource {
  LocalBank, // from user-provided TOML config
  Seed,      // built-in seeds (guarantee the app is useful without config)
}

/// A school subject, shown on the dashboard for one grade.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Subject {
  pub id: String,
  pub name: String,
  pub icon: String,
  pub grade: u8, // 9, 10 or 11
  pub display_order: u32,
  pub source: ContentSource,
}

/// A topic under a subject: lesson text plus the raw quiz source for the
/// parser. The quiz text is handed out verbatim; it is parsed per attempt.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Topic {
  pub id: String,
  pub subject_id: String,
  pub name: String,
  pub display_order: u32,
  pub lesson: String,
  pub quiz_source: String,
  pub source: ContentSource,
}

/// One recorded quiz attempt for a (user, topic) pair.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuizAttempt {
  pub user_id: String,
  pub topic_id: String,
  pub score_percent: u32,
}

/// The external identity collaborator only guarantees "is logged in";
/// everything we carry is an opaque user id.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UserIdentity {
  pub id: String,
}
