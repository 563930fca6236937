//! HTTP endpoint handlers. These are thin wrappers that forward to the
//! content/progress stores. Each handler is instrumented and logs include
//! parameters and basic result info.

use std::sync::Arc;

use axum::{
  extract::{Query, State},
  http::StatusCode,
  response::IntoResponse,
  Json,
};
use tracing::{info, instrument, warn};

use crate::protocol::*;
use crate::state::AppState;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse {
  Json(HealthOut { ok: true })
}

#[instrument(level = "info", skip(state), fields(grade = q.grade.unwrap_or(9)))]
pub async fn http_get_subjects(
  State(state): State<Arc<AppState>>,
  Query(q): Query<SubjectsQuery>,
) -> impl IntoResponse {
  let grade = q.grade.unwrap_or(9);
  let subjects = state.subjects_for_grade(grade).await;
  info!(target: "rindeplus_backend", grade, count = subjects.len(), "HTTP subjects served");
  Json(subjects.iter().map(to_subject_out).collect::<Vec<_>>())
}

#[instrument(level = "info", skip(state), fields(%q.subject_id))]
pub async fn http_get_topics(
  State(state): State<Arc<AppState>>,
  Query(q): Query<TopicsQuery>,
) -> impl IntoResponse {
  match state.topics_for_subject(&q.subject_id).await {
    Ok(topics) => {
      let best = match &q.user {
        Some(user) => {
          let ids: Vec<String> = topics.iter().map(|t| t.id.clone()).collect();
          state.best_scores_for_user(user, &ids).await
        }
        None => Default::default(),
      };
      info!(target: "rindeplus_backend", subject_id = %q.subject_id, count = topics.len(), "HTTP topics served");
      Json(topics.iter().map(|t| to_topic_out(t, &best)).collect::<Vec<_>>()).into_response()
    }
    Err(e) => {
      warn!(target: "rindeplus_backend", subject_id = %q.subject_id, error = %e, "HTTP topics lookup failed");
      (StatusCode::NOT_FOUND, Json(ErrorOut { message: e.to_string() })).into_response()
    }
  }
}

#[instrument(level = "info", skip(state), fields(%q.topic_id))]
pub async fn http_get_lesson(
  State(state): State<Arc<AppState>>,
  Query(q): Query<LessonQuery>,
) -> impl IntoResponse {
  match state.get_topic(&q.topic_id).await {
    Some(topic) => Json(LessonOut {
      topic_id: topic.id,
      name: topic.name,
      content: topic.lesson,
    })
    .into_response(),
    None => (
      StatusCode::NOT_FOUND,
      Json(ErrorOut { message: format!("unknown topic: {}", q.topic_id) }),
    )
      .into_response(),
  }
}

#[instrument(level = "info", skip(state), fields(%q.user, %q.topic_id))]
pub async fn http_get_progress(
  State(state): State<Arc<AppState>>,
  Query(q): Query<ProgressQuery>,
) -> impl IntoResponse {
  let best = state
    .best_scores_for_user(&q.user, std::slice::from_ref(&q.topic_id))
    .await;
  Json(ProgressOut {
    best_score: best.get(&q.topic_id).copied(),
    topic_id: q.topic_id,
  })
}

#[instrument(level = "info", skip(state, body), fields(%body.user, %body.topic_id, score = body.score))]
pub async fn http_post_progress(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ProgressIn>,
) -> impl IntoResponse {
  match state
    .record_quiz_score(&body.user, &body.topic_id, body.score)
    .await
  {
    Ok(()) => Json(SavedOut { ok: true }).into_response(),
    Err(e) => {
      warn!(target: "quiz", topic_id = %body.topic_id, error = %e, "HTTP progress write failed");
      (StatusCode::UNPROCESSABLE_ENTITY, Json(ErrorOut { message: e.to_string() })).into_response()
    }
  }
}
