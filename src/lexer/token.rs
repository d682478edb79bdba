//! Token definitions.
//!
//! A [`Token`] is the universal unit flowing through every pass: the lexer
//! produces purely lexical kinds, and later passes rewrite `kind` in place as
//! semantic knowledge accumulates (an identifier becomes a `Type`, a call
//! site becomes a `Call`). The `source_offset` is assigned once by the lexer
//! and never changes; it is the anchor the rename emitter uses to splice
//! suffixes into the original text.

use serde::Serialize;

/// Lexical and semantic token categories.
///
/// Lexical kinds come out of the lexer; semantic kinds are assigned by the
/// corpus passes. A token's kind may be rewritten several times across
/// passes, always in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TokenKind {
    // --- lexical ---
    /// Identifier not (yet) classified further.
    Name,
    /// Reserved word from the fixed keyword set.
    Keyword,
    /// Integer, float, or hex literal, raw text including any suffix.
    Number,
    /// String literal including delimiters.
    Str,
    /// Character literal including delimiters.
    CharLit,
    /// Line or block comment.
    Comment,
    /// Bare newline. Dropped after directive extraction.
    Newline,
    /// Backslash-newline pair. Dropped after directive extraction.
    Continuation,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    /// `<`. Template-argument grouping is decided structurally, not here.
    LAngle,
    /// `>`. Never merged into `>>`; structural passes pair angles themselves.
    RAngle,
    Semi,
    Comma,
    Dot,
    /// `->`
    Arrow,
    /// `::`
    Scope,
    Colon,
    Star,
    Amp,
    Tilde,
    /// `=` exactly; compound assignments stay `Op`.
    Assign,
    /// `#`
    Hash,
    /// Any other operator or punctuation character(s).
    Op,
    /// End of file.
    Eof,
    /// Unrecognized input; lexing continues past it.
    Other,

    // --- semantic ---
    /// A type name: built-in, class, enum, typedef-expanded, or folded
    /// container. Folded containers carry their element types as children.
    Type,
    /// A class or struct name at its declaration site.
    Class,
    /// Opening brace of a class body; `owner` names the class.
    ClassBegin,
    /// Closing brace of a class body; `owner` names the class.
    ClassEnd,
    MemberFunction,
    MemberVariable,
    GlobalVariable,
    /// Free function name at declaration/definition site.
    Function,
    /// Call-site occurrence resolved to an in-module symbol.
    Call,
    /// Identifier matching a known macro name.
    Macro,
    /// Non-include preprocessor directive; children hold the directive body.
    Preprocessor,
    /// `#include` directive collapsed to one token.
    Header,
    /// Enum name at its declaration site.
    Enum,
}

impl TokenKind {
    /// True for kinds that terminate a statement-ish context when scanning
    /// backward for declarations.
    pub fn is_statement_boundary(self) -> bool {
        matches!(
            self,
            TokenKind::Semi
                | TokenKind::LBrace
                | TokenKind::RBrace
                | TokenKind::ClassBegin
                | TokenKind::ClassEnd
        )
    }
}

/// One lexical or semantically tagged unit with a stable source offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    /// Raw text as it appeared in the source (literals keep delimiters).
    pub text: String,
    /// Byte offset of the first character in the original file. Immutable.
    pub source_offset: usize,
    /// Composite structure: a macro's replacement tokens, a directive's
    /// argument tokens, a folded container's element types, a `decltype`
    /// body. Empty for plain tokens.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Token>,
    /// Qualifying class/scope for aliasing and template-parameter tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, source_offset: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            source_offset,
            children: Vec::new(),
            owner: None,
        }
    }

    /// A zero-offset token carrying only type information, used for
    /// synthesized resolution results.
    pub fn synthetic(kind: TokenKind, text: impl Into<String>) -> Self {
        Self::new(kind, text, 0)
    }

    #[inline]
    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    #[inline]
    pub fn is_text(&self, kind: TokenKind, text: &str) -> bool {
        self.kind == kind && self.text == text
    }

    /// True for the identifier-like kinds a name lookup may start from.
    pub fn is_name_like(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Name
                | TokenKind::MemberVariable
                | TokenKind::GlobalVariable
                | TokenKind::MemberFunction
                | TokenKind::Function
                | TokenKind::Call
        )
    }
}

/// Bracket pairing helpers over a token slice.
///
/// Passes re-derive positions from these structural anchors instead of
/// caching indices across mutations, so stream edits never leave a stale
/// cursor behind.
pub fn matching_close(tokens: &[Token], open: usize) -> Option<usize> {
    let (open_kind, close_kind) = match tokens.get(open)?.kind {
        TokenKind::LParen => (TokenKind::LParen, TokenKind::RParen),
        TokenKind::LBrace => (TokenKind::LBrace, TokenKind::RBrace),
        TokenKind::LBracket => (TokenKind::LBracket, TokenKind::RBracket),
        TokenKind::LAngle => (TokenKind::LAngle, TokenKind::RAngle),
        _ => return None,
    };
    let mut depth = 0usize;
    for (i, tok) in tokens.iter().enumerate().skip(open) {
        if tok.kind == open_kind {
            depth += 1;
        } else if tok.kind == close_kind {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// True for tokens opening a brace scope, including class-body braces that
/// the scope pass has already retagged.
#[inline]
pub fn opens_brace(kind: TokenKind) -> bool {
    matches!(kind, TokenKind::LBrace | TokenKind::ClassBegin)
}

/// Counterpart of [`opens_brace`].
#[inline]
pub fn closes_brace(kind: TokenKind) -> bool {
    matches!(kind, TokenKind::RBrace | TokenKind::ClassEnd)
}

/// Find the closing brace matching the opener at `open`, counting retagged
/// class braces as braces.
pub fn matching_brace_close(tokens: &[Token], open: usize) -> Option<usize> {
    if !opens_brace(tokens.get(open)?.kind) {
        return None;
    }
    let mut depth = 0usize;
    for (i, tok) in tokens.iter().enumerate().skip(open) {
        if opens_brace(tok.kind) {
            depth += 1;
        } else if closes_brace(tok.kind) {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// Find the opening bracket matching the closer at `close`, scanning backward.
pub fn matching_open(tokens: &[Token], close: usize) -> Option<usize> {
    let (open_kind, close_kind) = match tokens.get(close)?.kind {
        TokenKind::RParen => (TokenKind::LParen, TokenKind::RParen),
        TokenKind::RBrace => (TokenKind::LBrace, TokenKind::RBrace),
        TokenKind::RBracket => (TokenKind::LBracket, TokenKind::RBracket),
        TokenKind::RAngle => (TokenKind::LAngle, TokenKind::RAngle),
        _ => return None,
    };
    let mut depth = 0usize;
    for i in (0..=close).rev() {
        let tok = &tokens[i];
        if tok.kind == close_kind {
            depth += 1;
        } else if tok.kind == open_kind {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}
