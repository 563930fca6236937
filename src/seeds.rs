//! Seed content: a minimal set of built-in subjects and topics that
//! guarantee the app is useful even without an external config file.

use crate::domain::{ContentSource, Subject, Topic};

pub fn seed_subjects() -> Vec<Subject> {
  vec![
    Subject {
      id: "sub-mat-9".into(),
      name: "Matemáticas".into(),
      icon: "📐".into(),
      grade: 9,
      display_order: 1,
      source: ContentSource::Seed,
    },
    Subject {
      id: "sub-cie-9".into(),
      name: "Ciencias Naturales".into(),
      icon: "🔬".into(),
      grade: 9,
      display_order: 2,
      source: ContentSource::Seed,
    },
    Subject {
      id: "sub-esp-10".into(),
      name: "Español".into(),
      icon: "📚".into(),
      grade: 10,
      display_order: 1,
      source: ContentSource::Seed,
    },
  ]
}

pub fn seed_topics() -> Vec<Topic> {
  vec![
    Topic {
      id: "top-fracciones".into(),
      subject_id: "sub-mat-9".into(),
      name: "Fracciones".into(),
      display_order: 1,
      lesson: "Una fracción representa partes iguales de un todo. \
               El número de arriba es el numerador y el de abajo el denominador."
        .into(),
      quiz_source: "\
¿Cuánto es 1/2 + 1/4?
3/4
1/2
2/4

¿Qué fracción es equivalente a 2/4?
1/2
3/4
2/8

¿Cuál es el numerador de 5/8?
5
8
3
"
      .into(),
      source: ContentSource::Seed,
    },
    Topic {
      id: "top-celula".into(),
      subject_id: "sub-cie-9".into(),
      name: "La célula".into(),
      display_order: 1,
      lesson: "La célula es la unidad básica de la vida. Todas las células \
               provienen de células preexistentes."
        .into(),
      quiz_source: "\
¿Cuál es la unidad básica de la vida?
La célula
El átomo
La molécula

¿Qué organelo produce la energía de la célula?
La mitocondria
El núcleo
El ribosoma
"
      .into(),
      source: ContentSource::Seed,
    },
  ]
}
