//! Error taxonomy. All of these are handled at the boundary where they occur
//! and converted to user-visible protocol messages; none abort a session.

use thiserror::Error;

/// Errors raised by the quiz session state machine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuizError {
  /// Parsed sequence has zero questions. Recovered by showing an
  /// "unavailable" state, not fatal.
  #[error("quiz has no questions")]
  EmptyQuiz,

  /// `submit_current` called before any option was selected.
  #[error("no answer selected for the current question")]
  NoSelection,

  /// Selected option index does not exist on the current question.
  #[error("option index {index} out of range ({count} options)")]
  OptionOutOfRange { index: usize, count: usize },

  /// Operation only valid while the quiz is in progress.
  #[error("quiz is already complete")]
  QuizComplete,

  /// Operation only valid once the quiz is complete (e.g. retry).
  #[error("quiz is still in progress")]
  NotComplete,

  /// No quiz session is active on this connection.
  #[error("no active quiz session")]
  NoSession,
}

/// Errors raised by the voice adapter (speech synthesis / recognition).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VoiceError {
  /// The runtime environment has no speech recognition capability.
  /// Manual answer selection remains available.
  #[error("speech recognition not supported")]
  Unsupported,

  /// A capture is already in flight; concurrent requests are rejected,
  /// never queued.
  #[error("speech recognition already running")]
  Busy,

  /// The captured letter does not map to an option of the current question.
  #[error("spoken answer '{transcript}' is out of range for {count} options")]
  OutOfRange { transcript: String, count: usize },

  /// Recognition engine failure.
  #[error("speech recognition failed: {0}")]
  Recognition(String),

  /// Synthesis engine failure.
  #[error("speech synthesis failed: {0}")]
  Synthesis(String),
}

/// Errors raised by the content/progress stores.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
  #[error("unknown topic: {0}")]
  UnknownTopic(String),

  #[error("unknown subject: {0}")]
  UnknownSubject(String),

  /// Final score write failure. Surfaced to the user; local completion
  /// state is not rolled back.
  #[error("failed to persist quiz score: {0}")]
  PersistFailed(String),
}
