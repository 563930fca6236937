//! Loading content configuration (subject/topic bank + voice utterance
//! templates) from TOML.
//!
//! See `ContentConfig` and `Utterances` for the expected schema.

use serde::Deserialize;
use tracing::{error, info};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ContentConfig {
  #[serde(default)]
  pub utterances: Utterances,
  #[serde(default)]
  pub subjects: Vec<SubjectCfg>,
  #[serde(default)]
  pub topics: Vec<TopicCfg>,
}

/// Subject entry accepted in TOML configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct SubjectCfg {
  #[serde(default)] pub id: Option<String>,
  pub name: String,
  #[serde(default)] pub icon: Option<String>,
  pub grade: u8,
  #[serde(default)] pub display_order: Option<u32>,
}

/// Topic entry accepted in TOML configuration. `quiz` holds the raw
/// line-oriented quiz text exactly as the parser expects it.
#[derive(Clone, Debug, Deserialize)]
pub struct TopicCfg {
  #[serde(default)] pub id: Option<String>,
  pub subject_id: String,
  pub name: String,
  #[serde(default)] pub display_order: Option<u32>,
  #[serde(default)] pub lesson: Option<String>,
  #[serde(default)] pub quiz: Option<String>,
}

/// Spanish voice prompt templates used by the accessibility layer.
/// Defaults match the product copy; override them in TOML to tune wording.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Utterances {
  // Question read-aloud
  pub question_template: String,
  pub option_template: String,
  // Voice answer capture
  pub selection_template: String,
  pub out_of_range: String,
  pub unsupported: String,
  // Answer feedback
  pub correct: String,
  pub incorrect: String,
  // Completion
  pub completion_template: String,
}

impl Default for Utterances {
  fn default() -> Self {
    Self {
      question_template: "Pregunta {n} de {total}. {prompt}".into(),
      option_template: "Opción {letter}: {option}".into(),
      selection_template: "Has seleccionado la opción {letter}".into(),
      out_of_range: "No entendí tu respuesta. Por favor di A, B, C o D".into(),
      unsupported: "Tu navegador no soporta reconocimiento de voz".into(),
      correct: "¡Correcto!".into(),
      incorrect: "Incorrecto".into(),
      completion_template: "Cuestionario completado. Tu puntuación es {score} por ciento".into(),
    }
  }
}

/// Attempt to load `ContentConfig` from CONTENT_CONFIG_PATH. On any
/// parsing/IO error, returns None and the built-in seeds carry the app.
pub fn load_content_config_from_env() -> Option<ContentConfig> {
  let path = std::env::var("CONTENT_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<ContentConfig>(&s) {
      Ok(cfg) => {
        info!(target: "rindeplus_backend", %path, "Loaded content config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "rindeplus_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "rindeplus_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
