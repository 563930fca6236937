//! Voice adapter: speech synthesis/recognition contracts, the per-session
//! gateway that drives them, and Spanish utterance composition.
//!
//! The engines themselves are an external runtime capability; this module
//! owns the rules around them: at most one utterance live at a time (cancel,
//! never queue), one capture in flight at a time, a fixed settle delay
//! between cancelling prior audio and starting a new capture, and the
//! spoken-letter to option-index mapping.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::Utterances;
use crate::error::VoiceError;
use crate::util::{fill_template, option_letter};

/// Delay between cancelling prior voice activity and starting a new capture.
/// Avoids audio engine race conditions when output and input share a device.
const SETTLE_DELAY: Duration = Duration::from_millis(300);

#[derive(Clone, Debug)]
pub struct SpeakOptions {
  pub rate: f32,
  pub pitch: f32,
  pub volume: f32,
  pub lang: String,
}

impl Default for SpeakOptions {
  fn default() -> Self {
    Self { rate: 0.9, pitch: 1.0, volume: 1.0, lang: "es-ES".into() }
  }
}

/// Voice output contract. `speak` resolves when the utterance finishes or
/// fails; implementations must tolerate `cancel` at any time.
pub trait SpeechSynthesizer: Send + Sync {
  fn speak(&self, text: &str, opts: &SpeakOptions) -> Result<(), VoiceError>;
  fn cancel(&self);
  fn is_speaking(&self) -> bool;
}

/// Voice input contract. `capture_once` performs a single recognition pass
/// and must resolve (implementations own their timeout policy).
pub trait SpeechRecognizer: Send + Sync {
  fn is_supported(&self) -> bool;
  fn capture_once(&self) -> Result<String, VoiceError>;
  fn stop(&self);
}

/// Server-side default output: logs the utterance and completes. The real
/// synthesis runs in the client runtime; the composed text travels in the
/// protocol messages.
pub struct NullSynthesizer;

impl SpeechSynthesizer for NullSynthesizer {
  fn speak(&self, text: &str, opts: &SpeakOptions) -> Result<(), VoiceError> {
    debug!(
      target: "quiz",
      lang = %opts.lang,
      rate = opts.rate,
      pitch = opts.pitch,
      volume = opts.volume,
      text,
      "speak (null synthesizer)"
    );
    Ok(())
  }
  fn cancel(&self) {}
  fn is_speaking(&self) -> bool {
    false
  }
}

/// Server-side default input: capability absent. Manual answer selection
/// always remains available as the primary path.
pub struct UnsupportedRecognizer;

impl SpeechRecognizer for UnsupportedRecognizer {
  fn is_supported(&self) -> bool {
    false
  }
  fn capture_once(&self) -> Result<String, VoiceError> {
    Err(VoiceError::Unsupported)
  }
  fn stop(&self) {}
}

/// Map a captured transcript to a zero-based option index.
/// "B" with 4 options -> Some(1); "E" with 4 options -> None.
pub fn map_spoken_answer(transcript: &str, option_count: usize) -> Option<usize> {
  let letter = transcript.trim().to_uppercase().chars().next()?;
  let index = (letter as i64) - ('A' as i64);
  if (0..option_count as i64).contains(&index) {
    Some(index as usize)
  } else {
    None
  }
}

/// One synthesizer/recognizer pair scoped to a quiz session: acquired on
/// session start, released (cancel speech, stop capture) on every exit path.
pub struct VoiceGateway {
  tts: Arc<dyn SpeechSynthesizer>,
  stt: Arc<dyn SpeechRecognizer>,
  listening: AtomicBool,
  settle: Duration,
  opts: SpeakOptions,
}

// Clears the listening flag on every exit path, including errors.
struct ListenGuard<'a>(&'a AtomicBool);

impl Drop for ListenGuard<'_> {
  fn drop(&mut self) {
    self.0.store(false, Ordering::SeqCst);
  }
}

impl VoiceGateway {
  pub fn new(tts: Arc<dyn SpeechSynthesizer>, stt: Arc<dyn SpeechRecognizer>) -> Self {
    Self {
      tts,
      stt,
      listening: AtomicBool::new(false),
      settle: SETTLE_DELAY,
      opts: SpeakOptions::default(),
    }
  }

  #[cfg(test)]
  fn with_settle(mut self, settle: Duration) -> Self {
    self.settle = settle;
    self
  }

  pub fn capture_supported(&self) -> bool {
    self.stt.is_supported()
  }

  pub fn is_listening(&self) -> bool {
    self.listening.load(Ordering::SeqCst)
  }

  /// Speak an utterance, cancelling any in-flight one first (never queued).
  pub fn speak(&self, text: &str) -> Result<(), VoiceError> {
    self.tts.cancel();
    self.tts.speak(text, &self.opts)
  }

  /// One voice capture: cancel prior audio, settle, recognize once, map the
  /// spoken letter to an option index. Rejects concurrent captures outright.
  pub async fn capture_answer(&self, option_count: usize) -> Result<usize, VoiceError> {
    if !self.stt.is_supported() {
      return Err(VoiceError::Unsupported);
    }
    if self.listening.swap(true, Ordering::SeqCst) {
      warn!(target: "quiz", "Capture requested while one is in flight; rejected");
      return Err(VoiceError::Busy);
    }
    let _guard = ListenGuard(&self.listening);

    self.tts.cancel();
    self.stt.stop();
    tokio::time::sleep(self.settle).await;

    let transcript = self.stt.capture_once()?;
    debug!(target: "quiz", %transcript, option_count, "Voice capture result");

    map_spoken_answer(&transcript, option_count).ok_or(VoiceError::OutOfRange {
      transcript,
      count: option_count,
    })
  }

  /// Cancel any speech output and stop any capture. Called on session end,
  /// question switch, retry and navigation away.
  pub fn release(&self) {
    if self.tts.is_speaking() {
      debug!(target: "quiz", "Cancelling in-flight utterance");
    }
    self.tts.cancel();
    self.stt.stop();
  }
}

impl Default for VoiceGateway {
  fn default() -> Self {
    Self::new(Arc::new(NullSynthesizer), Arc::new(UnsupportedRecognizer))
  }
}

//
// Utterance composition (Spanish product copy; templates in config).
//

/// "Pregunta {n} de {total}. {prompt}. Opción A: ... Opción B: ..."
/// Letters are assigned in display order, which is the shuffled order.
pub fn question_utterance(
  u: &Utterances,
  index: usize,
  total: usize,
  prompt: &str,
  options: &[String],
) -> String {
  let mut parts = vec![fill_template(
    &u.question_template,
    &[
      ("n", &(index + 1).to_string()),
      ("total", &total.to_string()),
      ("prompt", prompt),
    ],
  )];
  for (i, opt) in options.iter().enumerate() {
    parts.push(fill_template(
      &u.option_template,
      &[("letter", &option_letter(i).to_string()), ("option", opt)],
    ));
  }
  parts.join(". ")
}

pub fn selection_utterance(u: &Utterances, index: usize) -> String {
  fill_template(
    &u.selection_template,
    &[("letter", &option_letter(index).to_string())],
  )
}

pub fn completion_utterance(u: &Utterances, score_percent: u32) -> String {
  fill_template(
    &u.completion_template,
    &[("score", &score_percent.to_string())],
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Mutex;

  // Records engine calls so tests can assert ordering and exclusion.
  struct ScriptedRecognizer {
    transcript: String,
    events: Arc<Mutex<Vec<String>>>,
  }

  impl SpeechRecognizer for ScriptedRecognizer {
    fn is_supported(&self) -> bool {
      true
    }
    fn capture_once(&self) -> Result<String, VoiceError> {
      self.events.lock().unwrap().push("capture".into());
      Ok(self.transcript.clone())
    }
    fn stop(&self) {
      self.events.lock().unwrap().push("stop".into());
    }
  }

  struct RecordingSynthesizer {
    events: Arc<Mutex<Vec<String>>>,
  }

  impl SpeechSynthesizer for RecordingSynthesizer {
    fn speak(&self, text: &str, _opts: &SpeakOptions) -> Result<(), VoiceError> {
      self.events.lock().unwrap().push(format!("speak:{text}"));
      Ok(())
    }
    fn cancel(&self) {
      self.events.lock().unwrap().push("cancel".into());
    }
    fn is_speaking(&self) -> bool {
      false
    }
  }

  fn gateway(transcript: &str) -> (VoiceGateway, Arc<Mutex<Vec<String>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let gw = VoiceGateway::new(
      Arc::new(RecordingSynthesizer { events: events.clone() }),
      Arc::new(ScriptedRecognizer { transcript: transcript.into(), events: events.clone() }),
    )
    .with_settle(Duration::from_millis(1));
    (gw, events)
  }

  #[test]
  fn maps_letters_inside_option_range() {
    assert_eq!(map_spoken_answer("B", 4), Some(1));
    assert_eq!(map_spoken_answer("  b ", 4), Some(1));
    assert_eq!(map_spoken_answer("A", 1), Some(0));
  }

  #[test]
  fn rejects_letters_outside_option_range() {
    assert_eq!(map_spoken_answer("E", 4), None);
    assert_eq!(map_spoken_answer("D", 3), None);
    assert_eq!(map_spoken_answer("", 4), None);
    assert_eq!(map_spoken_answer("3", 4), None);
  }

  #[tokio::test]
  async fn capture_maps_spoken_letter() {
    let (gw, _) = gateway("B");
    assert_eq!(gw.capture_answer(4).await.unwrap(), 1);
    assert!(!gw.is_listening());
  }

  #[tokio::test]
  async fn out_of_range_capture_selects_nothing() {
    let (gw, _) = gateway("E");
    let err = gw.capture_answer(4).await.unwrap_err();
    assert_eq!(err, VoiceError::OutOfRange { transcript: "E".into(), count: 4 });
    // Flag released so the user can retry the capture.
    assert!(!gw.is_listening());
  }

  #[tokio::test]
  async fn capture_cancels_prior_audio_before_listening() {
    let (gw, events) = gateway("A");
    gw.capture_answer(2).await.unwrap();
    assert_eq!(*events.lock().unwrap(), vec!["cancel", "stop", "capture"]);
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
  async fn concurrent_capture_is_rejected() {
    let (gw, _) = gateway("A");
    let gw = Arc::new(gw.with_settle(Duration::from_millis(200)));

    let first = {
      let gw = gw.clone();
      tokio::spawn(async move { gw.capture_answer(2).await })
    };
    // Let the first capture take the flag and park in the settle delay.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(gw.capture_answer(2).await.unwrap_err(), VoiceError::Busy);

    assert_eq!(first.await.unwrap().unwrap(), 0);
    assert!(!gw.is_listening());
  }

  struct FailingRecognizer;

  impl SpeechRecognizer for FailingRecognizer {
    fn is_supported(&self) -> bool {
      true
    }
    fn capture_once(&self) -> Result<String, VoiceError> {
      Err(VoiceError::Recognition("no-speech".into()))
    }
    fn stop(&self) {}
  }

  #[tokio::test]
  async fn recognition_failure_releases_the_flag() {
    let gw = VoiceGateway::new(Arc::new(NullSynthesizer), Arc::new(FailingRecognizer))
      .with_settle(Duration::from_millis(1));
    assert_eq!(
      gw.capture_answer(4).await.unwrap_err(),
      VoiceError::Recognition("no-speech".into())
    );
    // Never fatal to the session; the user may retry.
    assert!(!gw.is_listening());
  }

  struct FailingSynthesizer;

  impl SpeechSynthesizer for FailingSynthesizer {
    fn speak(&self, _text: &str, _opts: &SpeakOptions) -> Result<(), VoiceError> {
      Err(VoiceError::Synthesis("engine gone".into()))
    }
    fn cancel(&self) {}
    fn is_speaking(&self) -> bool {
      false
    }
  }

  #[test]
  fn speak_surfaces_synthesis_errors() {
    let gw = VoiceGateway::new(Arc::new(FailingSynthesizer), Arc::new(UnsupportedRecognizer));
    assert_eq!(
      gw.speak("hola").unwrap_err(),
      VoiceError::Synthesis("engine gone".into())
    );
  }

  #[tokio::test]
  async fn unsupported_recognizer_is_detected_before_capture() {
    let gw = VoiceGateway::default();
    assert!(!gw.capture_supported());
    assert_eq!(gw.capture_answer(4).await.unwrap_err(), VoiceError::Unsupported);
  }

  #[test]
  fn question_utterance_letters_follow_display_order() {
    let u = Utterances::default();
    let options = vec!["Rojo".to_string(), "Azul".to_string()];
    let text = question_utterance(&u, 0, 3, "¿Color del mar?", &options);
    assert_eq!(
      text,
      "Pregunta 1 de 3. ¿Color del mar?. Opción A: Rojo. Opción B: Azul"
    );
  }

  #[test]
  fn selection_and_completion_utterances() {
    let u = Utterances::default();
    assert_eq!(selection_utterance(&u, 2), "Has seleccionado la opción C");
    assert_eq!(
      completion_utterance(&u, 60),
      "Cuestionario completado. Tu puntuación es 60 por ciento"
    );
  }
}
