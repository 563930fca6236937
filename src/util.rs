//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
/// This is intentionally simple (no nested/conditional logic).
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Display letter for a zero-based option index: 0 -> 'A', 1 -> 'B', ...
/// Letters follow display order, which is the shuffled order.
pub fn option_letter(index: usize) -> char {
  (b'A' + (index as u8)) as char
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads.
#[allow(dead_code)]
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max { s.to_string() } else { format!("{}… ({} bytes total)", &s[..max], s.len()) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fill_template_replaces_all_keys() {
    let out = fill_template("Pregunta {n} de {total}.", &[("n", "2"), ("total", "5")]);
    assert_eq!(out, "Pregunta 2 de 5.");
  }

  #[test]
  fn option_letters_follow_display_order() {
    assert_eq!(option_letter(0), 'A');
    assert_eq!(option_letter(3), 'D');
  }
}
