//! Expression type resolution.
//!
//! The engine answers one question: what is the static type of the
//! sub-expression immediately left of a use site (a member access, a
//! subscript, a call)? Failure is a value, not an error: every caller must
//! treat [`Resolution::Unresolved`] as "not safe to rename". The walk is
//! pure over an explicit cursor-and-bound pair; nothing here mutates the
//! token stream.

pub mod call;
pub mod subject;

use phf::phf_set;
use rustc_hash::FxHashMap;

use crate::lexer::{Token, TokenKind};
use crate::model::{FileSymbols, Model};

pub use call::resolve_call_return_type;
pub use subject::resolve_subject_type;

/// Outcome of a resolution attempt. `Resolved` carries the type token,
/// possibly a folded container with element children.
#[derive(Debug, Clone)]
pub enum Resolution {
    Resolved(Token),
    Unresolved,
}

impl Resolution {
    pub fn resolved(&self) -> Option<&Token> {
        match self {
            Resolution::Resolved(t) => Some(t),
            Resolution::Unresolved => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }

    fn from_option(t: Option<Token>) -> Resolution {
        match t {
            Some(t) => Resolution::Resolved(t),
            None => Resolution::Unresolved,
        }
    }
}

/// Everything a resolution walk may consult, all read-only.
pub struct ResolveCtx<'a> {
    pub model: &'a Model,
    /// File-local symbol tables of the file being resolved.
    pub locals: &'a FileSymbols,
    /// Enclosing class for `this` and implicit member lookup.
    pub class_context: Option<&'a str>,
    /// Parameters of the enclosing function, name to type token.
    pub parameters: &'a FxHashMap<String, Token>,
}

/// Container methods returning an iterator over the container.
static ITERATOR_METHODS: phf::Set<&'static str> = phf_set! {
    "begin", "end", "rbegin", "rend", "cbegin", "cend",
    "find", "lower_bound", "upper_bound",
};

/// Container methods returning an element (value for maps).
static ELEMENT_METHODS: phf::Set<&'static str> = phf_set! {
    "front", "back", "at", "top",
};

/// Sequence containers whose element is the first template argument.
static SEQUENCE_CONTAINERS: phf::Set<&'static str> = phf_set! {
    "vector", "deque", "queue", "stack", "list", "set",
};

fn is_sequence(ty: &Token) -> bool {
    SEQUENCE_CONTAINERS.contains(ty.text.as_str())
}

fn is_smart_pointer(ty: &Token) -> bool {
    crate::passes::typedefs::SMART_POINTERS.contains(ty.text.as_str())
}

fn is_container(ty: &Token) -> bool {
    crate::passes::typedefs::CONTAINERS.contains(ty.text.as_str())
}

/// What iterating or indexing the container yields: element for sequences,
/// a key/value pair for maps, the pointee for smart pointers.
fn element_of(container: &Token) -> Option<Token> {
    if is_sequence(container) || is_smart_pointer(container) {
        return container.children.first().cloned();
    }
    if container.text == "map" {
        if container.children.len() < 2 {
            return None;
        }
        let mut pair = Token::synthetic(TokenKind::Type, "pair");
        pair.children = container.children.clone();
        return Some(pair);
    }
    None
}

/// What `container[...]` yields: element for sequences, the mapped value
/// for maps, the pointee for smart pointers, the type itself for a plain
/// (array-like) type.
fn subscript_of(base: &Token) -> Option<Token> {
    if is_sequence(base) || is_smart_pointer(base) {
        return base.children.first().cloned();
    }
    if base.text == "map" {
        return base.children.get(1).cloned();
    }
    if base.children.is_empty() {
        return Some(base.clone());
    }
    None
}

/// Collect the parameter table of a function signature slice
/// `( T a, U * b, ... )` given the paren indices.
pub fn collect_parameters(
    tokens: &[Token],
    open: usize,
    close: usize,
) -> FxHashMap<String, Token> {
    let mut params = FxHashMap::default();
    let mut i = open + 1;
    while i < close {
        if tokens[i].is(TokenKind::Type) {
            let ty = tokens[i].clone();
            let mut j = i + 1;
            while j < close && matches!(tokens[j].kind, TokenKind::Star | TokenKind::Amp) {
                j += 1;
            }
            if j < close && tokens[j].is(TokenKind::Name) {
                params.insert(tokens[j].text.clone(), ty);
                i = j + 1;
                continue;
            }
        }
        i += 1;
    }
    params
}
