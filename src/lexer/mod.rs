//! Hand-built finite-state lexer for C/C++ source.
//!
//! Produces a flat ordered token sequence from a [`Reader`]. Dispatch is on
//! the current character: single/double-character operators use one-token
//! lookahead with single-character pushback on mismatch, and four sub-lexers
//! implement small DFAs for numbers, identifiers, comments, and strings.
//!
//! Two deliberate non-decisions at this layer:
//! - `>` is always one token. Whether a `>` closes a template argument list
//!   or is a comparison/shift is decided structurally by later passes via
//!   bracket matching.
//! - Malformed input produces an [`TokenKind::Other`] sentinel and lexing
//!   continues; later passes simply fail to match the junk.

pub mod token;

pub use token::{
    closes_brace, matching_brace_close, matching_close, matching_open, opens_brace, Token,
    TokenKind,
};

use phf::phf_set;

use crate::reader::Reader;

/// Reserved words of the supported C/C++ subset.
static KEYWORDS: phf::Set<&'static str> = phf_set! {
    "asm", "auto", "bool", "break", "case", "catch", "char", "class",
    "const", "const_cast", "constexpr", "continue", "decltype", "default",
    "delete", "do", "double", "dynamic_cast", "else", "enum", "explicit",
    "extern", "false", "float", "for", "friend", "goto", "if", "inline",
    "int", "long", "mutable", "namespace", "new", "noexcept", "nullptr",
    "operator", "private", "protected", "public", "register",
    "reinterpret_cast", "return", "short", "signed", "sizeof", "static",
    "static_cast", "struct", "switch", "template", "this", "throw", "true",
    "try", "typedef", "typeid", "typename", "union", "unsigned", "using",
    "virtual", "void", "volatile", "wchar_t", "while",
};

/// States of the numeric literal DFA.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NumState {
    Integer,
    Dot,
    Fraction,
    ExpMarker,
    ExpSign,
    Exponent,
    Suffix,
    Done,
}

/// Token producer over one file.
pub struct Lexer {
    reader: Reader,
}

impl Lexer {
    pub fn new(reader: Reader) -> Self {
        Self { reader }
    }

    /// Lex the whole file into a token sequence terminated by an `Eof` token.
    pub fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token();
            let done = tok.is(TokenKind::Eof);
            tokens.push(tok);
            if done {
                break;
            }
        }
        tokens
    }

    /// Produce the next token.
    fn next_token(&mut self) -> Token {
        self.reader.skip_whitespace();
        if self.reader.eof() {
            return Token::new(TokenKind::Eof, "", self.reader.offset());
        }
        let offset = self.reader.offset();
        let ch = self.reader.next();

        match ch {
            '\n' => Token::new(TokenKind::Newline, "\n", offset),
            '\\' => {
                if self.reader.peek() == '\n' {
                    self.reader.next();
                    Token::new(TokenKind::Continuation, "\\\n", offset)
                } else {
                    Token::new(TokenKind::Other, "\\", offset)
                }
            }
            '0' if matches!(self.reader.peek(), 'x' | 'X') => self.lex_hex(offset),
            c if c.is_ascii_digit() => self.lex_number(c, offset),
            '.' if self.reader.peek().is_ascii_digit() => self.lex_number('.', offset),
            c if c == '_' || c.is_ascii_alphabetic() => self.lex_identifier(c, offset),
            '"' => self.lex_string(offset),
            '\'' => self.lex_char(offset),
            '/' => match self.reader.peek() {
                '/' | '*' => self.lex_comment(offset),
                '=' => {
                    self.reader.next();
                    Token::new(TokenKind::Op, "/=", offset)
                }
                _ => Token::new(TokenKind::Op, "/", offset),
            },
            '(' => Token::new(TokenKind::LParen, "(", offset),
            ')' => Token::new(TokenKind::RParen, ")", offset),
            '{' => Token::new(TokenKind::LBrace, "{", offset),
            '}' => Token::new(TokenKind::RBrace, "}", offset),
            '[' => Token::new(TokenKind::LBracket, "[", offset),
            ']' => Token::new(TokenKind::RBracket, "]", offset),
            ';' => Token::new(TokenKind::Semi, ";", offset),
            ',' => Token::new(TokenKind::Comma, ",", offset),
            '#' => Token::new(TokenKind::Hash, "#", offset),
            '~' => Token::new(TokenKind::Tilde, "~", offset),
            '.' => Token::new(TokenKind::Dot, ".", offset),
            '?' => Token::new(TokenKind::Op, "?", offset),
            ':' => self.paired(offset, ':', TokenKind::Scope, "::", TokenKind::Colon, ":"),
            '=' => self.paired(offset, '=', TokenKind::Op, "==", TokenKind::Assign, "="),
            '*' => self.paired(offset, '=', TokenKind::Op, "*=", TokenKind::Star, "*"),
            '!' => self.paired(offset, '=', TokenKind::Op, "!=", TokenKind::Op, "!"),
            '%' => self.paired(offset, '=', TokenKind::Op, "%=", TokenKind::Op, "%"),
            '^' => self.paired(offset, '=', TokenKind::Op, "^=", TokenKind::Op, "^"),
            '-' => match self.reader.peek() {
                '>' => {
                    self.reader.next();
                    Token::new(TokenKind::Arrow, "->", offset)
                }
                '-' => {
                    self.reader.next();
                    Token::new(TokenKind::Op, "--", offset)
                }
                '=' => {
                    self.reader.next();
                    Token::new(TokenKind::Op, "-=", offset)
                }
                _ => Token::new(TokenKind::Op, "-", offset),
            },
            '+' => match self.reader.peek() {
                '+' => {
                    self.reader.next();
                    Token::new(TokenKind::Op, "++", offset)
                }
                '=' => {
                    self.reader.next();
                    Token::new(TokenKind::Op, "+=", offset)
                }
                _ => Token::new(TokenKind::Op, "+", offset),
            },
            '&' => match self.reader.peek() {
                '&' => {
                    self.reader.next();
                    Token::new(TokenKind::Op, "&&", offset)
                }
                '=' => {
                    self.reader.next();
                    Token::new(TokenKind::Op, "&=", offset)
                }
                _ => Token::new(TokenKind::Amp, "&", offset),
            },
            '|' => match self.reader.peek() {
                '|' => {
                    self.reader.next();
                    Token::new(TokenKind::Op, "||", offset)
                }
                '=' => {
                    self.reader.next();
                    Token::new(TokenKind::Op, "|=", offset)
                }
                _ => Token::new(TokenKind::Op, "|", offset),
            },
            '<' => match self.reader.peek() {
                '=' => {
                    self.reader.next();
                    Token::new(TokenKind::Op, "<=", offset)
                }
                '<' => {
                    self.reader.next();
                    if self.reader.peek() == '=' {
                        self.reader.next();
                        Token::new(TokenKind::Op, "<<=", offset)
                    } else {
                        Token::new(TokenKind::Op, "<<", offset)
                    }
                }
                _ => Token::new(TokenKind::LAngle, "<", offset),
            },
            // `>>` is never merged; nested template closers depend on it.
            '>' => self.paired(offset, '=', TokenKind::Op, ">=", TokenKind::RAngle, ">"),
            other => Token::new(TokenKind::Other, other.to_string(), offset),
        }
    }

    /// One-character lookahead helper: if the next char is `second`, consume
    /// it and produce the paired token, else produce the single token.
    fn paired(
        &mut self,
        offset: usize,
        second: char,
        pair_kind: TokenKind,
        pair_text: &str,
        single_kind: TokenKind,
        single_text: &str,
    ) -> Token {
        if self.reader.peek() == second {
            self.reader.next();
            Token::new(pair_kind, pair_text, offset)
        } else {
            Token::new(single_kind, single_text, offset)
        }
    }

    /// Numeric literal DFA: integer part, optional fraction, optional
    /// exponent with sign, optional `f`/`l`/`u` suffixes consumed greedily.
    /// A leading sign is *not* consumed here; sign folding is a
    /// normalization pass because `a-1` and `-1` lex identically.
    fn lex_number(&mut self, first: char, offset: usize) -> Token {
        let mut text = String::new();
        text.push(first);
        let mut state = if first == '.' {
            NumState::Dot
        } else {
            NumState::Integer
        };

        loop {
            if self.reader.eof() {
                break;
            }
            let ch = self.reader.next();
            let next_state = match (state, ch) {
                (NumState::Integer, c) if c.is_ascii_digit() => NumState::Integer,
                (NumState::Integer, '.') => NumState::Dot,
                (NumState::Integer | NumState::Fraction, 'e' | 'E') => NumState::ExpMarker,
                (NumState::Dot, c) if c.is_ascii_digit() => NumState::Fraction,
                (NumState::Fraction, c) if c.is_ascii_digit() => NumState::Fraction,
                (NumState::ExpMarker, '+' | '-') => NumState::ExpSign,
                (NumState::ExpMarker | NumState::ExpSign, c) if c.is_ascii_digit() => {
                    NumState::Exponent
                }
                (NumState::Exponent, c) if c.is_ascii_digit() => NumState::Exponent,
                (
                    NumState::Integer | NumState::Fraction | NumState::Exponent | NumState::Suffix,
                    'f' | 'F' | 'l' | 'L' | 'u' | 'U',
                ) => NumState::Suffix,
                _ => NumState::Done,
            };
            if next_state == NumState::Done {
                self.reader.prev();
                break;
            }
            text.push(ch);
            state = next_state;
        }
        Token::new(TokenKind::Number, text, offset)
    }

    /// Hex literal DFA: `0` already consumed, then `x`/`X`, hex digits, and
    /// optional `u`/`l` suffixes.
    fn lex_hex(&mut self, offset: usize) -> Token {
        let mut text = String::from("0");
        text.push(self.reader.next()); // x or X
        let mut saw_digit = false;
        while !self.reader.eof() {
            let ch = self.reader.next();
            if ch.is_ascii_hexdigit() {
                saw_digit = true;
                text.push(ch);
            } else if saw_digit && matches!(ch, 'u' | 'U' | 'l' | 'L') {
                text.push(ch);
            } else {
                self.reader.prev();
                break;
            }
        }
        if saw_digit {
            Token::new(TokenKind::Number, text, offset)
        } else {
            // `0x` with no digits: junk, keep lexing past it.
            Token::new(TokenKind::Other, text, offset)
        }
    }

    /// Identifier DFA, with keyword reclassification on acceptance.
    fn lex_identifier(&mut self, first: char, offset: usize) -> Token {
        let mut text = String::new();
        text.push(first);
        while !self.reader.eof() {
            let ch = self.reader.next();
            if ch == '_' || ch.is_ascii_alphanumeric() {
                text.push(ch);
            } else {
                self.reader.prev();
                break;
            }
        }
        let kind = if KEYWORDS.contains(text.as_str()) {
            TokenKind::Keyword
        } else {
            TokenKind::Name
        };
        Token::new(kind, text, offset)
    }

    /// Comment DFA distinguishing `//` line and `/* */` block forms. The
    /// leading `/` is already consumed. Line comments stop before the
    /// newline so a `Newline` token still follows (directive extraction
    /// depends on it).
    fn lex_comment(&mut self, offset: usize) -> Token {
        let mut text = String::from("/");
        let second = self.reader.next();
        text.push(second);
        if second == '/' {
            while !self.reader.eof() && self.reader.peek() != '\n' {
                text.push(self.reader.next());
            }
        } else {
            // Block comment: consume up to and including `*/`, tolerating
            // an unterminated comment at EOF.
            let mut star = false;
            while !self.reader.eof() {
                let ch = self.reader.next();
                text.push(ch);
                if star && ch == '/' {
                    break;
                }
                star = ch == '*';
            }
        }
        Token::new(TokenKind::Comment, text, offset)
    }

    /// String literal DFA tracking escapes, including an escaped backslash
    /// before the closing quote.
    fn lex_string(&mut self, offset: usize) -> Token {
        let mut text = String::from("\"");
        let mut escaped = false;
        while !self.reader.eof() {
            let ch = self.reader.next();
            text.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                break;
            }
        }
        Token::new(TokenKind::Str, text, offset)
    }

    /// Character literal: explicit single-char and escaped-char cases; any
    /// other shape becomes an `Other` sentinel consumed up to the closing
    /// quote or end of line.
    fn lex_char(&mut self, offset: usize) -> Token {
        let first = self.reader.next();
        if first == '\\' {
            let escaped = self.reader.next();
            if self.reader.peek() == '\'' {
                self.reader.next();
                return Token::new(TokenKind::CharLit, format!("'\\{}'", escaped), offset);
            }
            return self.char_error(format!("'\\{}", escaped), offset);
        }
        if first != '\'' && first != '\n' && self.reader.peek() == '\'' {
            self.reader.next();
            return Token::new(TokenKind::CharLit, format!("'{}'", first), offset);
        }
        self.char_error(format!("'{}", first), offset)
    }

    /// Error sentinel for malformed character literals: swallow to the
    /// closing quote or end of line so lexing resynchronizes.
    fn char_error(&mut self, mut text: String, offset: usize) -> Token {
        while !self.reader.eof() {
            let ch = self.reader.peek();
            if ch == '\n' {
                break;
            }
            text.push(self.reader.next());
            if ch == '\'' {
                break;
            }
        }
        Token::new(TokenKind::Other, text, offset)
    }
}

/// Lex in-memory text, for tests and the extern-type description parser.
pub fn tokenize_text(text: &str) -> Vec<Token> {
    Lexer::new(Reader::from_text(text)).tokenize()
}
