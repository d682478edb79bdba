//! Character-level source reader.
//!
//! Owns the raw text of one source file and exposes a forward/backward
//! single-character cursor with line counting. Both ends of the file behave
//! as a newline sentinel: `next()` at EOF and `prev()` at offset zero return
//! `'\n'` without moving. This lets the sub-lexers treat end-of-input
//! uniformly as a terminator character instead of special-casing EOF in
//! every state machine.

use std::path::Path;

use crate::error::{Result, ShroudError};

/// Whitespace characters skipped between tokens. Newline is deliberately
/// absent: it is a token in its own right until the normalization passes
/// have extracted preprocessor directives.
const INTER_TOKEN_WHITESPACE: [char; 6] = [' ', '\t', '\r', '\x0c', '\x0b', '\0'];

/// Cursor over the decoded text of a single source file.
#[derive(Debug, Clone)]
pub struct Reader {
    /// Decoded characters of the file.
    chars: Vec<char>,
    /// Byte offset of each character in the original text. One extra entry
    /// holds the total byte length so `offset()` is valid at EOF.
    byte_offsets: Vec<usize>,
    /// Cursor position as an index into `chars`.
    pos: usize,
    /// Current 1-indexed line number.
    line: usize,
}

impl Reader {
    /// Read and decode the file at `path`.
    pub fn read(path: &Path) -> Result<Self> {
        let text =
            std::fs::read_to_string(path).map_err(|e| ShroudError::io_with_path(e, path))?;
        Ok(Self::from_text(&text))
    }

    /// Build a reader over in-memory text.
    pub fn from_text(text: &str) -> Self {
        let mut chars = Vec::with_capacity(text.len());
        let mut byte_offsets = Vec::with_capacity(text.len() + 1);
        for (offset, ch) in text.char_indices() {
            chars.push(ch);
            byte_offsets.push(offset);
        }
        byte_offsets.push(text.len());
        Self {
            chars,
            byte_offsets,
            pos: 0,
            line: 1,
        }
    }

    /// Byte offset of the cursor in the original text.
    #[inline]
    pub fn offset(&self) -> usize {
        self.byte_offsets[self.pos]
    }

    /// Current 1-indexed line number.
    #[inline]
    pub fn line(&self) -> usize {
        self.line
    }

    /// True once the cursor has consumed every character.
    #[inline]
    pub fn eof(&self) -> bool {
        self.pos >= self.chars.len()
    }

    /// Consume and return the character under the cursor.
    ///
    /// At EOF returns the newline sentinel without advancing.
    pub fn next(&mut self) -> char {
        if self.eof() {
            return '\n';
        }
        let ch = self.chars[self.pos];
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
        }
        ch
    }

    /// Step the cursor back one character and return the character now under
    /// it. At offset zero returns the newline sentinel without moving.
    pub fn prev(&mut self) -> char {
        if self.pos == 0 {
            return '\n';
        }
        self.pos -= 1;
        let ch = self.chars[self.pos];
        if ch == '\n' {
            self.line -= 1;
        }
        ch
    }

    /// Look at the character under the cursor without consuming it.
    pub fn peek(&self) -> char {
        if self.eof() {
            '\n'
        } else {
            self.chars[self.pos]
        }
    }

    /// Skip spaces, tabs, carriage returns, form feeds, vertical tabs, and
    /// NUL bytes.
    pub fn skip_whitespace(&mut self) {
        while !self.eof() && INTER_TOKEN_WHITESPACE.contains(&self.chars[self.pos]) {
            self.pos += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_and_prev_round_trip() {
        let mut r = Reader::from_text("ab");
        assert_eq!(r.next(), 'a');
        assert_eq!(r.next(), 'b');
        assert!(r.eof());
        assert_eq!(r.prev(), 'b');
        assert_eq!(r.prev(), 'a');
        assert_eq!(r.prev(), '\n'); // sentinel at offset zero
        assert_eq!(r.offset(), 0);
    }

    #[test]
    fn test_eof_returns_newline_sentinel() {
        let mut r = Reader::from_text("x");
        assert_eq!(r.next(), 'x');
        assert_eq!(r.next(), '\n');
        assert_eq!(r.next(), '\n'); // does not advance past EOF
        assert!(r.eof());
    }

    #[test]
    fn test_line_counting() {
        let mut r = Reader::from_text("a\nb\nc");
        assert_eq!(r.line(), 1);
        r.next();
        r.next();
        assert_eq!(r.line(), 2);
        r.next();
        r.next();
        assert_eq!(r.line(), 3);
        r.prev();
        assert_eq!(r.line(), 2);
    }

    #[test]
    fn test_skip_whitespace_stops_at_newline() {
        let mut r = Reader::from_text("  \t\x0c\x0b\0z \n y");
        r.skip_whitespace();
        assert_eq!(r.next(), 'z');
        r.skip_whitespace();
        assert_eq!(r.peek(), '\n');
    }

    #[test]
    fn test_byte_offsets_with_multibyte_comment_text() {
        // Multibyte characters only ever appear inside comments and string
        // literals, but offsets must still be byte-accurate around them.
        let text = "a\u{e9}b";
        let mut r = Reader::from_text(text);
        assert_eq!(r.offset(), 0);
        r.next();
        assert_eq!(r.offset(), 1);
        r.next();
        assert_eq!(r.offset(), 3); // e-acute is two bytes
        r.next();
        assert_eq!(r.offset(), 4);
    }
}
