//! Application state: in-memory content and progress stores.
//!
//! This module owns:
//!   - the subject store (by id) and topic store (by id)
//!   - the quiz attempt log (append-only, best score wins on reads)
//!   - the utterance templates (from TOML or defaults)
//!
//! Content comes from an optional TOML bank merged over built-in seeds, so
//! the app stays useful with no external configuration.

use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::{load_content_config_from_env, ContentConfig, Utterances};
use crate::domain::{ContentSource, QuizAttempt, Subject, Topic};
use crate::error::StoreError;
use crate::seeds::{seed_subjects, seed_topics};

#[derive(Clone)]
pub struct AppState {
  pub subjects: Arc<RwLock<HashMap<String, Subject>>>,
  pub topics: Arc<RwLock<HashMap<String, Topic>>>,
  pub attempts: Arc<RwLock<Vec<QuizAttempt>>>,
  pub utterances: Utterances,
}

impl AppState {
  /// Build state from env: load config, merge seeds, build stores.
  #[instrument(level = "info", skip_all)]
  pub fn new() -> Self {
    let cfg_opt = load_content_config_from_env();
    Self::from_config(cfg_opt)
  }

  pub fn from_config(cfg_opt: Option<ContentConfig>) -> Self {
    let utterances = cfg_opt
      .as_ref()
      .map(|c| c.utterances.clone())
      .unwrap_or_default();

    let mut subject_map = HashMap::<String, Subject>::new();
    let mut topic_map = HashMap::<String, Topic>::new();

    // Insert config-based content first (if any).
    if let Some(cfg) = &cfg_opt {
      for (pos, sc) in cfg.subjects.iter().enumerate() {
        let id = sc.id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
        subject_map.insert(
          id.clone(),
          Subject {
            id,
            name: sc.name.clone(),
            icon: sc.icon.clone().unwrap_or_else(|| "📘".into()),
            grade: sc.grade,
            display_order: sc.display_order.unwrap_or(pos as u32 + 1),
            source: ContentSource::LocalBank,
          },
        );
      }
      for (pos, tc) in cfg.topics.iter().enumerate() {
        let id = tc.id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
        if !subject_map.contains_key(&tc.subject_id) {
          warn!(target: "rindeplus_backend", %id, subject_id = %tc.subject_id, "Bank topic references unknown subject; keeping it anyway");
        }
        topic_map.insert(
          id.clone(),
          Topic {
            id,
            subject_id: tc.subject_id.clone(),
            name: tc.name.clone(),
            display_order: tc.display_order.unwrap_or(pos as u32 + 1),
            lesson: tc.lesson.clone().unwrap_or_default(),
            quiz_source: tc.quiz.clone().unwrap_or_default(),
            source: ContentSource::LocalBank,
          },
        );
      }
    }

    // Always insert built-in seeds, but don't overwrite existing ids.
    for s in seed_subjects() {
      subject_map.entry(s.id.clone()).or_insert(s);
    }
    for t in seed_topics() {
      topic_map.entry(t.id.clone()).or_insert(t);
    }

    // Inventory summary by source.
    let mut count_by_source: HashMap<ContentSource, (usize, usize)> = HashMap::new();
    for s in subject_map.values() {
      count_by_source.entry(s.source.clone()).or_insert((0, 0)).0 += 1;
    }
    for t in topic_map.values() {
      count_by_source.entry(t.source.clone()).or_insert((0, 0)).1 += 1;
    }
    for (source, (subjects, topics)) in count_by_source {
      info!(target: "rindeplus_backend", ?source, subjects, topics, "Startup content inventory");
    }

    Self {
      subjects: Arc::new(RwLock::new(subject_map)),
      topics: Arc::new(RwLock::new(topic_map)),
      attempts: Arc::new(RwLock::new(Vec::new())),
      utterances,
    }
  }

  /// Subjects for one grade, ordered by display order.
  #[instrument(level = "debug", skip(self))]
  pub async fn subjects_for_grade(&self, grade: u8) -> Vec<Subject> {
    let subjects = self.subjects.read().await;
    let mut out: Vec<Subject> = subjects.values().filter(|s| s.grade == grade).cloned().collect();
    out.sort_by_key(|s| s.display_order);
    out
  }

  /// Topics for one subject, ordered by display order.
  #[instrument(level = "debug", skip(self), fields(%subject_id))]
  pub async fn topics_for_subject(&self, subject_id: &str) -> Result<Vec<Topic>, StoreError> {
    if !self.subjects.read().await.contains_key(subject_id) {
      return Err(StoreError::UnknownSubject(subject_id.to_string()));
    }
    let topics = self.topics.read().await;
    let mut out: Vec<Topic> = topics
      .values()
      .filter(|t| t.subject_id == subject_id)
      .cloned()
      .collect();
    out.sort_by_key(|t| t.display_order);
    Ok(out)
  }

  /// Read-only access to a topic by id.
  #[instrument(level = "debug", skip(self), fields(%id))]
  pub async fn get_topic(&self, id: &str) -> Option<Topic> {
    self.topics.read().await.get(id).cloned()
  }

  /// Raw quiz text for a topic, handed to the parser by the caller.
  #[instrument(level = "debug", skip(self), fields(%topic_id))]
  pub async fn fetch_topic_quiz_source(&self, topic_id: &str) -> Result<String, StoreError> {
    self
      .topics
      .read()
      .await
      .get(topic_id)
      .map(|t| t.quiz_source.clone())
      .ok_or_else(|| StoreError::UnknownTopic(topic_id.to_string()))
  }

  /// Record one finished attempt. Exactly one call per completed session.
  #[instrument(level = "info", skip(self), fields(%user_id, %topic_id, score_percent))]
  pub async fn record_quiz_score(
    &self,
    user_id: &str,
    topic_id: &str,
    score_percent: u32,
  ) -> Result<(), StoreError> {
    if !self.topics.read().await.contains_key(topic_id) {
      return Err(StoreError::PersistFailed(format!("unknown topic {topic_id}")));
    }
    self.attempts.write().await.push(QuizAttempt {
      user_id: user_id.to_string(),
      topic_id: topic_id.to_string(),
      score_percent,
    });
    info!(target: "quiz", %user_id, %topic_id, score_percent, "Quiz score recorded");
    Ok(())
  }

  /// Best score per topic for one user, restricted to `topic_ids`.
  #[instrument(level = "debug", skip(self, topic_ids), fields(%user_id))]
  pub async fn best_scores_for_user(
    &self,
    user_id: &str,
    topic_ids: &[String],
  ) -> HashMap<String, u32> {
    let attempts = self.attempts.read().await;
    let mut best = HashMap::new();
    for a in attempts.iter() {
      if a.user_id == user_id && topic_ids.contains(&a.topic_id) {
        let entry = best.entry(a.topic_id.clone()).or_insert(0);
        if a.score_percent > *entry {
          *entry = a.score_percent;
        }
      }
    }
    best
  }
}
