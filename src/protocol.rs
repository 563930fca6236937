//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::{Subject, Topic};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
  Ping,
  SetAccessibility {
    enabled: bool,
  },
  ListSubjects {
    grade: u8,
  },
  ListTopics {
    #[serde(rename = "subjectId")]
    subject_id: String,
  },
  GetLesson {
    #[serde(rename = "topicId")]
    topic_id: String,
  },
  StartQuiz {
    #[serde(rename = "topicId")]
    topic_id: String,
  },
  /// Re-read the current question aloud (the "Repetir" button).
  ReadQuestion,
  SelectOption {
    index: usize,
  },
  /// Spoken answer transcript captured by the client runtime.
  VoiceAnswer {
    transcript: String,
  },
  /// Ask the server-side voice gateway to run one capture pass.
  CaptureVoice,
  SubmitAnswer,
  RetryQuiz,
  EndQuiz,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
  Pong,
  Accessibility {
    enabled: bool,
  },
  Subjects {
    subjects: Vec<SubjectOut>,
  },
  Topics {
    topics: Vec<TopicOut>,
  },
  Lesson {
    #[serde(rename = "topicId")]
    topic_id: String,
    name: String,
    content: String,
    #[serde(rename = "readAloud")]
    read_aloud: Option<String>,
  },
  Question {
    index: usize,
    total: usize,
    prompt: String,
    options: Vec<String>,
    #[serde(rename = "readAloud")]
    read_aloud: Option<String>,
  },
  Selected {
    index: usize,
    letter: char,
    utterance: Option<String>,
  },
  AnswerResult {
    correct: bool,
    utterance: Option<String>,
  },
  QuizComplete {
    #[serde(rename = "scorePercent")]
    score_percent: u32,
    #[serde(rename = "correctCount")]
    correct_count: u32,
    total: usize,
    saved: bool,
    utterance: Option<String>,
  },
  QuizEnded,
  VoiceError {
    message: String,
    utterance: Option<String>,
  },
  Error {
    message: String,
  },
}

/// DTO used by both WS and HTTP for subject delivery.
#[derive(Debug, Serialize)]
pub struct SubjectOut {
  pub id: String,
  pub name: String,
  pub icon: String,
  pub grade: u8,
  #[serde(rename = "displayOrder")]
  pub display_order: u32,
}

/// DTO used by both WS and HTTP for topic delivery. `best_score` is the
/// user's best recorded attempt, when an identity was supplied.
#[derive(Debug, Serialize)]
pub struct TopicOut {
  pub id: String,
  pub name: String,
  #[serde(rename = "displayOrder")]
  pub display_order: u32,
  #[serde(rename = "bestScore")]
  pub best_score: Option<u32>,
}

pub fn to_subject_out(s: &Subject) -> SubjectOut {
  SubjectOut {
    id: s.id.clone(),
    name: s.name.clone(),
    icon: s.icon.clone(),
    grade: s.grade,
    display_order: s.display_order,
  }
}

pub fn to_topic_out(t: &Topic, best: &HashMap<String, u32>) -> TopicOut {
  TopicOut {
    id: t.id.clone(),
    name: t.name.clone(),
    display_order: t.display_order,
    best_score: best.get(&t.id).copied(),
  }
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct SubjectsQuery {
  pub grade: Option<u8>,
}

#[derive(Debug, Deserialize)]
pub struct TopicsQuery {
  #[serde(rename = "subjectId")]
  pub subject_id: String,
  pub user: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LessonQuery {
  #[serde(rename = "topicId")]
  pub topic_id: String,
}

#[derive(Serialize)]
pub struct LessonOut {
  #[serde(rename = "topicId")]
  pub topic_id: String,
  pub name: String,
  pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ProgressQuery {
  pub user: String,
  #[serde(rename = "topicId")]
  pub topic_id: String,
}

#[derive(Serialize)]
pub struct ProgressOut {
  #[serde(rename = "topicId")]
  pub topic_id: String,
  #[serde(rename = "bestScore")]
  pub best_score: Option<u32>,
}

#[derive(Deserialize)]
pub struct ProgressIn {
  pub user: String,
  #[serde(rename = "topicId")]
  pub topic_id: String,
  pub score: u32,
}

#[derive(Serialize)]
pub struct SavedOut {
  pub ok: bool,
}

#[derive(Serialize)]
pub struct ErrorOut {
  pub message: String,
}

#[derive(Serialize)]
pub struct HealthOut {
  pub ok: bool,
}
