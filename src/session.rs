//! Quiz session state machine: owns the current question pointer, the
//! running score and the selected-answer slot for one quiz attempt.
//!
//! States: `InProgress -> Complete`, with `retry` returning to `InProgress`
//! (reset) and `submit_current` self-looping on advance. Exactly one session
//! is live per topic view; all mutation happens through these operations in
//! response to one event at a time.

use tracing::{debug, info};

use crate::domain::Question;
use crate::error::QuizError;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Phase {
  InProgress,
  Complete,
}

/// Outcome of submitting the current answer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Submitted {
  /// Moved on to the next question; selection slot cleared.
  Advanced { correct: bool },
  /// That was the last question: the attempt is complete. The caller
  /// performs exactly one persistence call with `score_percent`.
  Completed { correct: bool, score_percent: u32 },
}

pub struct QuizSession {
  questions: Vec<Question>,
  current: usize,
  selected: Option<usize>,
  correct_count: u32,
  phase: Phase,
}

impl QuizSession {
  /// Start an attempt over a non-empty question sequence.
  pub fn start(questions: Vec<Question>) -> Result<Self, QuizError> {
    if questions.is_empty() {
      return Err(QuizError::EmptyQuiz);
    }
    info!(target: "quiz", total = questions.len(), "Quiz session started");
    Ok(Self {
      questions,
      current: 0,
      selected: None,
      correct_count: 0,
      phase: Phase::InProgress,
    })
  }

  fn require_in_progress(&self) -> Result<(), QuizError> {
    match self.phase {
      Phase::InProgress => Ok(()),
      Phase::Complete => Err(QuizError::QuizComplete),
    }
  }

  /// Select (or re-select) an answer for the current question.
  pub fn select_option(&mut self, index: usize) -> Result<(), QuizError> {
    self.require_in_progress()?;
    let count = self.questions[self.current].options.len();
    if index >= count {
      return Err(QuizError::OptionOutOfRange { index, count });
    }
    self.selected = Some(index);
    Ok(())
  }

  /// Grade the current selection, then advance or complete.
  pub fn submit_current(&mut self) -> Result<Submitted, QuizError> {
    self.require_in_progress()?;
    let selected = self.selected.ok_or(QuizError::NoSelection)?;

    let correct = selected == self.questions[self.current].correct_index;
    if correct {
      self.correct_count += 1;
    }
    debug!(target: "quiz", index = self.current, selected, correct, "Answer submitted");

    if self.current + 1 < self.questions.len() {
      self.current += 1;
      self.selected = None;
      Ok(Submitted::Advanced { correct })
    } else {
      self.phase = Phase::Complete;
      let score_percent = self.final_score_percent();
      info!(
        target: "quiz",
        correct_count = self.correct_count,
        total = self.questions.len(),
        score_percent,
        "Quiz session complete"
      );
      Ok(Submitted::Completed { correct, score_percent })
    }
  }

  /// Restart the attempt over the same (already shuffled) questions.
  /// No re-parse happens; shuffle order is stable across retries.
  pub fn retry(&mut self) -> Result<(), QuizError> {
    if self.phase != Phase::Complete {
      return Err(QuizError::NotComplete);
    }
    self.current = 0;
    self.selected = None;
    self.correct_count = 0;
    self.phase = Phase::InProgress;
    info!(target: "quiz", total = self.questions.len(), "Quiz session retried");
    Ok(())
  }

  pub fn current_prompt(&self) -> Result<&str, QuizError> {
    self.require_in_progress()?;
    Ok(&self.questions[self.current].prompt)
  }

  pub fn current_options(&self) -> Result<&[String], QuizError> {
    self.require_in_progress()?;
    Ok(&self.questions[self.current].options)
  }

  pub fn current_index(&self) -> usize {
    self.current
  }

  pub fn total(&self) -> usize {
    self.questions.len()
  }

  pub fn selected(&self) -> Option<usize> {
    self.selected
  }

  pub fn correct_count(&self) -> u32 {
    self.correct_count
  }

  pub fn is_complete(&self) -> bool {
    self.phase == Phase::Complete
  }

  /// `round(correct / total * 100)`. Meaningful once complete; also used
  /// for the completion message.
  pub fn final_score_percent(&self) -> u32 {
    ((self.correct_count as f64 / self.questions.len() as f64) * 100.0).round() as u32
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn question(prompt: &str, options: &[&str], correct: usize) -> Question {
    Question {
      prompt: prompt.into(),
      options: options.iter().map(|s| s.to_string()).collect(),
      correct_index: correct,
    }
  }

  fn five_questions() -> Vec<Question> {
    (0..5)
      .map(|n| question(&format!("Q{n}"), &["a", "b", "c"], 1))
      .collect()
  }

  #[test]
  fn empty_quiz_is_rejected() {
    assert_eq!(QuizSession::start(vec![]).err(), Some(QuizError::EmptyQuiz));
  }

  #[test]
  fn three_of_five_scores_sixty_percent() {
    let mut s = QuizSession::start(five_questions()).unwrap();
    // Correct on the first three, wrong on the last two.
    for n in 0..5 {
      s.select_option(if n < 3 { 1 } else { 0 }).unwrap();
      let out = s.submit_current().unwrap();
      if n == 4 {
        assert_eq!(out, Submitted::Completed { correct: false, score_percent: 60 });
      }
    }
    assert!(s.is_complete());
    assert_eq!(s.correct_count(), 3);
    assert_eq!(s.final_score_percent(), 60);
  }

  #[test]
  fn submit_requires_a_selection() {
    let mut s = QuizSession::start(five_questions()).unwrap();
    assert_eq!(s.submit_current().err(), Some(QuizError::NoSelection));
  }

  #[test]
  fn select_out_of_range_is_rejected() {
    let mut s = QuizSession::start(five_questions()).unwrap();
    assert_eq!(
      s.select_option(3).err(),
      Some(QuizError::OptionOutOfRange { index: 3, count: 3 })
    );
    // The selection slot stays empty.
    assert_eq!(s.selected(), None);
  }

  #[test]
  fn reselect_overwrites_previous_choice() {
    let mut s = QuizSession::start(five_questions()).unwrap();
    s.select_option(0).unwrap();
    s.select_option(1).unwrap();
    assert_eq!(s.selected(), Some(1));
  }

  #[test]
  fn advance_clears_selection_and_moves_pointer() {
    let mut s = QuizSession::start(five_questions()).unwrap();
    s.select_option(1).unwrap();
    assert_eq!(s.submit_current().unwrap(), Submitted::Advanced { correct: true });
    assert_eq!(s.current_index(), 1);
    assert_eq!(s.selected(), None);
  }

  #[test]
  fn retry_resets_score_and_pointer_but_not_questions() {
    let mut s = QuizSession::start(five_questions()).unwrap();
    let before: Vec<String> = s.current_options().unwrap().to_vec();
    for _ in 0..5 {
      s.select_option(1).unwrap();
      s.submit_current().unwrap();
    }
    assert!(s.is_complete());
    assert_eq!(s.final_score_percent(), 100);

    s.retry().unwrap();
    assert_eq!(s.current_index(), 0);
    assert_eq!(s.correct_count(), 0);
    assert_eq!(s.selected(), None);
    // Same immutable sequence, same option order.
    assert_eq!(s.current_options().unwrap().to_vec(), before);
  }

  #[test]
  fn retry_is_only_valid_once_complete() {
    let mut s = QuizSession::start(five_questions()).unwrap();
    assert_eq!(s.retry().err(), Some(QuizError::NotComplete));
  }

  #[test]
  fn accessors_are_invalid_after_completion() {
    let mut s = QuizSession::start(vec![question("Q", &["a", "b"], 0)]).unwrap();
    s.select_option(0).unwrap();
    assert!(matches!(s.submit_current().unwrap(), Submitted::Completed { correct: true, score_percent: 100 }));
    assert_eq!(s.current_prompt().err(), Some(QuizError::QuizComplete));
    assert_eq!(s.select_option(0).err(), Some(QuizError::QuizComplete));
  }

  #[test]
  fn single_question_quiz_completes_immediately() {
    let mut s = QuizSession::start(vec![question("Q", &["a", "b"], 1)]).unwrap();
    s.select_option(0).unwrap();
    assert_eq!(
      s.submit_current().unwrap(),
      Submitted::Completed { correct: false, score_percent: 0 }
    );
  }
}
