//! Quiz text parser: converts a flat plain-text quiz source into structured
//! multiple-choice questions with shuffled options.
//!
//! Source grammar (line-oriented, no escaping):
//!
//! ```text
//! <question line>
//! <correct answer line>
//! <wrong option line>
//! [<wrong option line> ...]
//! <blank line>
//! <question line>
//! ...
//! ```
//!
//! Blank lines separate records. The correct answer carries no marker; its
//! position (first line after the prompt) defines correctness. A record with
//! zero trailing option lines still produces a 1-option question.
//!
//! Malformed input (a dangling prompt with no answer line) stops the scan
//! silently; previously parsed records are returned as-is. This truncation
//! policy matches the source data contract.

use rand::seq::SliceRandom;
use rand::thread_rng;
use tracing::{debug, warn};

use crate::domain::Question;

/// Parse raw quiz text into an ordered sequence of questions.
/// Empty input yields an empty sequence, not an error.
pub fn parse_quiz(raw: &str) -> Vec<Question> {
  // Defensive encode/decode round trip: establishes the text is valid,
  // consistently encoded UTF-8. Lossless for any &str.
  let text = String::from_utf8_lossy(raw.as_bytes());

  let lines: Vec<&str> = text.split('\n').map(|l| l.trim()).collect();

  let mut questions = Vec::new();
  let mut rng = thread_rng();
  let mut i = 0;

  while i < lines.len() {
    // Skip blank lines between records.
    while i < lines.len() && lines[i].is_empty() {
      i += 1;
    }
    if i >= lines.len() {
      break;
    }

    let prompt = lines[i];
    i += 1;

    // The next non-blank line is the correct answer. A prompt with nothing
    // after it is a dangling record: stop and keep what we have.
    while i < lines.len() && lines[i].is_empty() {
      i += 1;
    }
    if i >= lines.len() {
      warn!(target: "quiz", prompt, "Dangling prompt without answer; truncating parse");
      break;
    }

    let correct = lines[i];
    i += 1;

    // Contiguous non-blank lines are the distractors.
    let mut options: Vec<String> = vec![correct.to_string()];
    while i < lines.len() && !lines[i].is_empty() {
      options.push(lines[i].to_string());
      i += 1;
    }

    options.shuffle(&mut rng);

    // Relocate the correct answer by text equality. If two options share the
    // same text the first match wins; that ambiguity comes with the format.
    let correct_index = options
      .iter()
      .position(|o| o == correct)
      .unwrap_or_default();

    questions.push(Question {
      prompt: prompt.to_string(),
      options,
      correct_index,
    });
  }

  debug!(target: "quiz", count = questions.len(), "Parsed quiz source");
  questions
}
