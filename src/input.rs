//! Input collection: the problem text buffer, the on-screen math keyboard, and the
//! attached photo.
//!
//! The cursor is a char offset (not a byte offset) so that symbols like `θ` or `π`
//! count as one position, the same way the browser textarea counts them.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;

/// One key of the on-screen math keyboard.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct MathKey {
  pub label: &'static str,
  pub value: &'static str,
}

pub const MATH_KEYS: [MathKey; 16] = [
  MathKey { label: "x", value: "x" },
  MathKey { label: "y", value: "y" },
  MathKey { label: "θ", value: r"\theta" },
  MathKey { label: "π", value: r"\pi" },
  MathKey { label: "x²", value: "^2" },
  MathKey { label: "√", value: r"\sqrt{}" },
  MathKey { label: "÷", value: r"\frac{}{}" },
  MathKey { label: "×", value: r"\times" },
  MathKey { label: "∫", value: r"\int" },
  MathKey { label: "d/dx", value: r"\frac{d}{dx}" },
  MathKey { label: "Σ", value: r"\sum" },
  MathKey { label: "∞", value: r"\infty" },
  MathKey { label: "sin", value: r"\sin()" },
  MathKey { label: "cos", value: r"\cos()" },
  MathKey { label: "tan", value: r"\tan()" },
  MathKey { label: "ln", value: r"\ln()" },
];

pub const SAMPLE_QUESTIONS: [&str; 4] = [
  "Integrate x * sin(x) dx",
  "Find the derivative of ln(tan(x))",
  "Solve matrix equation AX = B",
  "Find the probability of getting 2 heads in 3 tosses",
];

/// Text buffer with a cursor and an optional selection.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct InputBuffer {
  text: String,
  cursor: usize,
  /// Selection anchor; the selection spans anchor..cursor (in either order).
  #[serde(skip)]
  anchor: Option<usize>,
}

impl InputBuffer {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn text(&self) -> &str {
    &self.text
  }

  pub fn cursor(&self) -> usize {
    self.cursor
  }

  pub fn is_blank(&self) -> bool {
    self.text.trim().is_empty()
  }

  fn char_len(&self) -> usize {
    self.text.chars().count()
  }

  fn byte_at(&self, char_pos: usize) -> usize {
    self.text
      .char_indices()
      .nth(char_pos)
      .map(|(b, _)| b)
      .unwrap_or(self.text.len())
  }

  /// Replace the whole buffer (the user typed into the textarea directly).
  /// The cursor moves to the end unless given.
  pub fn set_text(&mut self, text: impl Into<String>, cursor: Option<usize>) {
    self.text = text.into();
    let len = self.char_len();
    self.cursor = cursor.unwrap_or(len).min(len);
    self.anchor = None;
  }

  pub fn set_cursor(&mut self, pos: usize) {
    self.cursor = pos.min(self.char_len());
    self.anchor = None;
  }

  pub fn select(&mut self, start: usize, end: usize) {
    let len = self.char_len();
    self.anchor = Some(start.min(len));
    self.cursor = end.min(len);
  }

  fn selection(&self) -> (usize, usize) {
    match self.anchor {
      Some(a) => (a.min(self.cursor), a.max(self.cursor)),
      None => (self.cursor, self.cursor),
    }
  }

  fn splice(&mut self, insert: &str) -> usize {
    let (start, end) = self.selection();
    let (bs, be) = (self.byte_at(start), self.byte_at(end));
    self.text.replace_range(bs..be, insert);
    self.anchor = None;
    start
  }

  /// Insert plain text at the cursor (replacing any selection); the cursor ends after it.
  pub fn type_text(&mut self, s: &str) {
    let start = self.splice(s);
    self.cursor = start + s.chars().count();
  }

  /// Insert a keyboard symbol or template at the cursor.
  ///
  /// Templates with an empty `{}` or `()` pair leave the cursor inside the first
  /// empty pair, so `\frac{}{}` followed by typing `1` gives `\frac{1}{}`.
  pub fn insert_symbol(&mut self, symbol: &str) {
    let start = self.splice(symbol);
    self.cursor = start + template_cursor_offset(symbol);
  }

  /// Remove the final character of the buffer (the keyboard's backspace key).
  pub fn delete_last(&mut self) {
    self.text.pop();
    self.cursor = self.cursor.min(self.char_len());
    self.anchor = None;
  }

  pub fn clear(&mut self) {
    *self = Self::default();
  }
}

/// Char offset within `symbol` where the cursor should land after insertion.
fn template_cursor_offset(symbol: &str) -> usize {
  let chars: Vec<char> = symbol.chars().collect();
  chars
    .windows(2)
    .position(|w| matches!(w, ['{', '}'] | ['(', ')']))
    .map(|i| i + 1)
    .unwrap_or(chars.len())
}

/// A photo of the problem, held as base64 text ready to be sent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageAttachment {
  data: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ImageError {
  #[error("image payload is empty")]
  Empty,
  #[error("image payload is not valid base64: {0}")]
  InvalidBase64(String),
}

impl ImageAttachment {
  /// Encode raw file bytes.
  pub fn from_bytes(bytes: &[u8]) -> Result<Self, ImageError> {
    if bytes.is_empty() {
      return Err(ImageError::Empty);
    }
    Ok(Self { data: STANDARD.encode(bytes) })
  }

  /// Accept either bare base64 or a `data:<mime>;base64,<payload>` URL
  /// (what a browser file reader hands us). The prefix is dropped.
  pub fn from_base64(input: &str) -> Result<Self, ImageError> {
    let payload = match input.trim().strip_prefix("data:") {
      Some(rest) => rest.split_once(',').map(|(_, p)| p).unwrap_or(""),
      None => input.trim(),
    };
    if payload.is_empty() {
      return Err(ImageError::Empty);
    }
    STANDARD
      .decode(payload)
      .map_err(|e| ImageError::InvalidBase64(e.to_string()))?;
    Ok(Self { data: payload.to_string() })
  }

  pub fn base64(&self) -> &str {
    &self.data
  }

  /// Size of the encoded payload, for logging.
  pub fn encoded_len(&self) -> usize {
    self.data.len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fraction_template_puts_cursor_in_first_slot() {
    let mut buf = InputBuffer::new();
    buf.insert_symbol(r"\frac{}{}");
    buf.type_text("1");
    assert_eq!(buf.text(), r"\frac{1}{}");
  }

  #[test]
  fn function_template_puts_cursor_inside_parens() {
    let mut buf = InputBuffer::new();
    buf.type_text("2");
    buf.insert_symbol(r"\sin()");
    buf.type_text("x");
    assert_eq!(buf.text(), r"2\sin(x)");
  }

  #[test]
  fn plain_symbol_puts_cursor_after() {
    let mut buf = InputBuffer::new();
    buf.insert_symbol(r"\pi");
    buf.type_text("r");
    assert_eq!(buf.text(), r"\pir");
    assert_eq!(buf.cursor(), 4);
  }

  #[test]
  fn filled_template_is_not_treated_as_empty_pair() {
    let mut buf = InputBuffer::new();
    buf.insert_symbol(r"\frac{d}{dx}");
    assert_eq!(buf.cursor(), r"\frac{d}{dx}".len());
  }

  #[test]
  fn inserts_at_cursor_not_at_end() {
    let mut buf = InputBuffer::new();
    buf.set_text("x + y", Some(1));
    buf.insert_symbol("^2");
    assert_eq!(buf.text(), "x^2 + y");
  }

  #[test]
  fn insert_replaces_selection() {
    let mut buf = InputBuffer::new();
    buf.set_text("a θ b", None);
    buf.select(2, 3);
    buf.insert_symbol(r"\pi");
    assert_eq!(buf.text(), r"a \pi b");
  }

  #[test]
  fn cursor_counts_chars_not_bytes() {
    let mut buf = InputBuffer::new();
    buf.set_text("θθ", Some(1));
    buf.type_text("x");
    assert_eq!(buf.text(), "θxθ");
  }

  #[test]
  fn delete_last_removes_final_char() {
    let mut buf = InputBuffer::new();
    buf.set_text("xθ", Some(0));
    buf.delete_last();
    assert_eq!(buf.text(), "x");
    buf.delete_last();
    buf.delete_last();
    assert_eq!(buf.text(), "");
    assert_eq!(buf.cursor(), 0);
  }

  #[test]
  fn image_accepts_data_url() {
    let img = ImageAttachment::from_base64("data:image/png;base64,aGVsbG8=").unwrap();
    assert_eq!(img.base64(), "aGVsbG8=");
  }

  #[test]
  fn image_from_bytes_encodes() {
    let img = ImageAttachment::from_bytes(b"hello").unwrap();
    assert_eq!(img.base64(), "aGVsbG8=");
    assert_eq!(ImageAttachment::from_bytes(b""), Err(ImageError::Empty));
  }

  #[test]
  fn image_rejects_garbage() {
    assert!(matches!(
      ImageAttachment::from_base64("not base64!!"),
      Err(ImageError::InvalidBase64(_))
    ));
  }
}
