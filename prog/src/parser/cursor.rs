use std::ops::Range;

use crate::ident::{IDENT_LEN, Ident};
use crate::parser::error::LoadError;

/// Token reader over the line-oriented snapshot format.
///
/// Numbers are whitespace-separated; identifiers are exactly eight
/// characters terminated by a newline. Every read returns the byte span it
/// consumed so callers can point diagnostics at it.
pub struct Cursor<'a> {
    source: &'a str,
    pos: usize,
    file_id: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(source: &'a str, file_id: usize) -> Self {
        Cursor {
            source,
            pos: 0,
            file_id,
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn file_id(&self) -> usize {
        self.file_id
    }

    pub fn error(&self, message: impl Into<String>, span: Range<usize>) -> LoadError {
        LoadError::new(message, span, self.file_id)
    }

    fn peek(&self) -> Option<u8> {
        self.source.as_bytes().get(self.pos).copied()
    }

    pub fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    pub fn at_end(&mut self) -> bool {
        self.skip_whitespace();
        self.pos >= self.source.len()
    }

    /// Consume the next whitespace-delimited token.
    fn token(&mut self) -> Range<usize> {
        self.skip_whitespace();
        let start = self.pos;
        while self.peek().is_some_and(|b| !b.is_ascii_whitespace()) {
            self.pos += 1;
        }
        start..self.pos
    }

    fn describe(&self, span: &Range<usize>) -> String {
        if span.is_empty() {
            "end of input".to_string()
        } else {
            format!("'{}'", &self.source[span.clone()])
        }
    }

    /// Read an unsigned decimal integer.
    pub fn read_uint(&mut self, what: &str) -> Result<(u64, Range<usize>), LoadError> {
        let span = self.token();
        let text = &self.source[span.clone()];
        if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
            return Err(self.error(
                format!("expected {}, found {}", what, self.describe(&span)),
                span,
            ));
        }
        let value = text
            .parse::<u64>()
            .map_err(|_| self.error(format!("{} {} is too large", what, text), span.clone()))?;
        Ok((value, span))
    }

    /// Read a signed decimal integer.
    pub fn read_int(&mut self, what: &str) -> Result<(i64, Range<usize>), LoadError> {
        let span = self.token();
        let text = &self.source[span.clone()];
        let digits = text.strip_prefix('-').unwrap_or(text);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(self.error(
                format!("expected {}, found {}", what, self.describe(&span)),
                span,
            ));
        }
        let value = text
            .parse::<i64>()
            .map_err(|_| self.error(format!("{} {} is out of range", what, text), span.clone()))?;
        Ok((value, span))
    }

    /// Read an element count.
    pub fn read_count(&mut self, what: &str) -> Result<usize, LoadError> {
        let (value, span) = self.read_uint(what)?;
        usize::try_from(value)
            .map_err(|_| self.error(format!("{} {} is too large", what, value), span))
    }

    /// Read a `0`/`1` flag. Any other value is rejected.
    pub fn read_flag(&mut self, what: &str) -> Result<bool, LoadError> {
        let (value, span) = self.read_uint(what)?;
        match value {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(self.error(format!("{} must be 0 or 1, found {}", what, other), span)),
        }
    }

    /// Read an identifier line: eight letters followed by a newline.
    pub fn read_ident(&mut self) -> Result<(Ident, Range<usize>), LoadError> {
        let span = self.token();
        let text = &self.source[span.clone()];
        let ident = Ident::from_bytes(text.as_bytes()).ok_or_else(|| {
            self.error(
                format!("expected procedure identifier, found {}", self.describe(&span)),
                span.clone(),
            )
            .with_note(format!(
                "identifiers are exactly {} uppercase letters A-Z",
                IDENT_LEN
            ))
        })?;

        if self.peek() == Some(b'\r') {
            self.pos += 1;
        }
        if self.peek() != Some(b'\n') {
            return Err(self.error(
                format!("identifier {} must be followed by a newline", ident),
                span,
            ));
        }
        self.pos += 1;
        Ok((ident, span))
    }

    /// Read a token that must equal `literal`.
    pub fn expect_literal(&mut self, literal: &str, what: &str) -> Result<Range<usize>, LoadError> {
        let span = self.token();
        if &self.source[span.clone()] != literal {
            return Err(self.error(
                format!(
                    "expected {} '{}', found {}",
                    what,
                    literal,
                    self.describe(&span)
                ),
                span,
            ));
        }
        Ok(span)
    }

    /// Fail unless only whitespace remains.
    pub fn expect_end(&mut self) -> Result<(), LoadError> {
        if self.at_end() {
            return Ok(());
        }
        let span = self.token();
        Err(self.error(
            format!("unexpected trailing input {}", self.describe(&span)),
            span,
        ))
    }
}
