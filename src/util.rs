//! Small utility helpers used across modules.

/// Normalise a learner answer for comparison: lowercase, curly quotes straightened,
/// surrounding punctuation dropped, inner whitespace collapsed.
pub fn normalize_answer(s: &str) -> String {
  let straightened: String = s
    .chars()
    .map(|c| match c {
      '\u{2018}' | '\u{2019}' => '\'',
      '\u{201C}' | '\u{201D}' => '"',
      other => other,
    })
    .collect();
  let trimmed = straightened.trim_matches(|c: char| c.is_whitespace() || (c.is_ascii_punctuation() && c != '\''));
  trimmed
    .split_whitespace()
    .collect::<Vec<_>>()
    .join(" ")
    .to_lowercase()
}

/// True when `answer` matches any accepted form after normalisation.
pub fn matches_any(answer: &str, accepted: &[String]) -> bool {
  let norm = normalize_answer(answer);
  accepted.iter().any(|a| normalize_answer(a) == norm)
}

/// File-name-safe form of a learner key. Every byte outside `[A-Za-z0-9_-]` is percent-escaped,
/// so distinct keys never share a file.
pub fn sanitize_key(key: &str) -> String {
  if key.is_empty() {
    return "anonymous".into();
  }
  let mut out = String::with_capacity(key.len());
  for b in key.bytes() {
    if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' {
      out.push(char::from(b));
    } else {
      out.push_str(&format!("%{:02X}", b));
    }
  }
  out
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let mut end = max;
  while !s.is_char_boundary(end) {
    end -= 1;
  }
  format!("{}… ({} bytes total)", &s[..end], s.len())
}
