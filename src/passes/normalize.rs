//! Token-stream normalization passes.
//!
//! Two cleanup passes run over the raw lexer output before any semantic
//! table is built:
//!
//! 1. Fold unary signs into numeric literals, extract preprocessor
//!    directives (`#include` becomes a single `Header` token, everything
//!    else a `Preprocessor` token owning its argument tokens), and
//!    reclassify built-in type names to `Type`.
//! 2. Merge consecutive `Type` tokens into one compound type
//!    (`unsigned long long`) and drop newline/continuation tokens, whose
//!    structural job ended with directive extraction.

use phf::phf_set;

use crate::lexer::{Token, TokenKind};

/// Built-in type names reclassified to `Type` ahead of the semantic passes.
static BUILTIN_TYPES: phf::Set<&'static str> = phf_set! {
    "auto", "void", "bool", "char", "short", "int", "long", "float", "double",
    "signed", "unsigned", "wchar_t", "size_t", "ssize_t", "ptrdiff_t",
    "int8_t", "int16_t", "int32_t", "int64_t",
    "uint8_t", "uint16_t", "uint32_t", "uint64_t",
    "intptr_t", "uintptr_t", "time_t", "string",
};

/// Directive keywords extracted into `Preprocessor` tokens. `include` is
/// handled separately because it collapses to a `Header` token.
static DIRECTIVES: phf::Set<&'static str> = phf_set! {
    "define", "if", "elif", "else", "ifndef", "ifdef", "pragma", "error",
    "undef", "line", "endif",
};

/// Pass 1: sign folding, directive extraction, built-in reclassification.
pub fn pass_one(tokens: &mut Vec<Token>) {
    fold_signs(tokens);
    extract_directives(tokens);
    reclassify_builtins(tokens);
}

/// Pass 2: compound-type merging and newline stripping.
pub fn pass_two(tokens: &mut Vec<Token>) {
    merge_compound_types(tokens);
    tokens.retain(|t| !matches!(t.kind, TokenKind::Newline | TokenKind::Continuation));
}

/// Fold a leading `+`/`-` into an immediately following numeric literal when
/// the sign is not itself preceded by another numeric token. `1 - 2` keeps
/// the binary minus; `x = -2` folds.
fn fold_signs(tokens: &mut Vec<Token>) {
    let mut i = 0;
    while i + 1 < tokens.len() {
        let is_sign = tokens[i].is(TokenKind::Op)
            && (tokens[i].text == "+" || tokens[i].text == "-");
        if is_sign
            && tokens[i + 1].is(TokenKind::Number)
            && (i == 0 || !tokens[i - 1].is(TokenKind::Number))
        {
            let sign = tokens.remove(i);
            let num = &mut tokens[i];
            num.text = format!("{}{}", sign.text, num.text);
            num.source_offset = sign.source_offset;
        }
        i += 1;
    }
}

/// Collapse each `# directive ...` run into a single token.
///
/// The directive's trailing tokens up to (but not across) an unescaped
/// newline become its children; `Continuation` tokens are elided so a
/// directive may span continued lines. The terminating newline itself stays
/// in the stream for pass 2 to strip.
fn extract_directives(tokens: &mut Vec<Token>) {
    let mut i = 0;
    while i < tokens.len() {
        if !tokens[i].is(TokenKind::Hash) {
            i += 1;
            continue;
        }
        let Some(keyword) = tokens.get(i + 1) else {
            break;
        };
        let name = keyword.text.clone();
        let offset = tokens[i].source_offset;

        if name == "include" {
            let body = take_directive_body(tokens, i);
            let text = body.iter().map(|t| t.text.as_str()).collect::<String>();
            let mut header = Token::new(TokenKind::Header, text, offset);
            header.children = body;
            tokens.insert(i, header);
        } else if DIRECTIVES.contains(name.as_str()) {
            let body = take_directive_body(tokens, i);
            let mut directive = Token::new(TokenKind::Preprocessor, name, offset);
            directive.children = body;
            tokens.insert(i, directive);
        }
        i += 1;
    }
}

/// Remove the `#`, the directive keyword, and the body tokens up to an
/// unescaped newline, returning the body. Continuations are dropped.
fn take_directive_body(tokens: &mut Vec<Token>, hash: usize) -> Vec<Token> {
    tokens.remove(hash); // '#'
    tokens.remove(hash); // directive keyword
    let mut body = Vec::new();
    while hash < tokens.len() {
        match tokens[hash].kind {
            TokenKind::Newline | TokenKind::Eof => break,
            TokenKind::Continuation => {
                tokens.remove(hash);
            }
            _ => body.push(tokens.remove(hash)),
        }
    }
    body
}

/// Reclassify identifiers/keywords naming built-in types to `Type`.
fn reclassify_builtins(tokens: &mut [Token]) {
    for tok in tokens.iter_mut() {
        if matches!(tok.kind, TokenKind::Name | TokenKind::Keyword)
            && BUILTIN_TYPES.contains(tok.text.as_str())
        {
            tok.kind = TokenKind::Type;
        }
        for child in tok.children.iter_mut() {
            if matches!(child.kind, TokenKind::Name | TokenKind::Keyword)
                && BUILTIN_TYPES.contains(child.text.as_str())
            {
                child.kind = TokenKind::Type;
            }
        }
    }
}

/// Merge runs of `Type` tokens: `unsigned long long` becomes one token
/// anchored at the first word's offset.
fn merge_compound_types(tokens: &mut Vec<Token>) {
    let mut i = 0;
    while i + 1 < tokens.len() {
        if tokens[i].is(TokenKind::Type)
            && tokens[i].children.is_empty()
            && tokens[i + 1].is(TokenKind::Type)
            && tokens[i + 1].children.is_empty()
        {
            let next = tokens.remove(i + 1);
            let cur = &mut tokens[i];
            cur.text = format!("{} {}", cur.text, next.text);
        } else {
            i += 1;
        }
    }
}
