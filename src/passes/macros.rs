//! Macro table construction and conditional-directive evaluation.
//!
//! Two sweeps over each file. The first collects every top-level `#define`
//! (one not nested inside a conditional block) into the global macro table.
//! The second evaluates `#ifdef`/`#ifndef` branching against the growing
//! table in a single forward pass: defines seen inside a taken branch are
//! added immediately, so later directives in the same pass observe them.
//!
//! Function-like macro expansion is out of scope. The only bodies expanded
//! are the namespace-shaped ones (a body opening with `namespace` or a
//! closing brace), which are spliced into the surrounding stream so the
//! scope walker sees the braces they contribute.

use std::path::Path;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::{Result, ShroudError};
use crate::lexer::{Token, TokenKind};

/// Macro table: name to its `#define` token (children hold name + body).
pub type MacroTable = FxHashMap<String, Token>;

/// First sweep: collect `#define`s outside any conditional block.
pub fn collect_defines(tokens: &[Token], macros: &mut MacroTable) {
    let mut cond_depth = 0usize;
    for tok in tokens {
        if !tok.is(TokenKind::Preprocessor) {
            continue;
        }
        match tok.text.as_str() {
            "if" | "ifdef" | "ifndef" => cond_depth += 1,
            "endif" => cond_depth = cond_depth.saturating_sub(1),
            "define" if cond_depth == 0 => {
                if let Some(name) = tok.children.first() {
                    macros.insert(name.text.clone(), tok.clone());
                }
            }
            _ => {}
        }
    }
}

/// Second sweep: evaluate `#ifdef`/`#ifndef` against the growing table.
///
/// A false condition skips forward to the matching `#else` or `#endif`,
/// counting nested conditional blocks so a nested `#endif` does not end the
/// skip early. A true condition enters the then-branch and skips the
/// else-branch when it is reached. Plain `#if`/`#elif` conditions are not
/// evaluated; their blocks are walked as taken.
pub fn evaluate_conditionals(
    file: &Path,
    tokens: &[Token],
    macros: &mut MacroTable,
) -> Result<()> {
    let mut i = 0;
    // Taken-branch markers: true when the matching `#else` must be skipped.
    let mut taken_stack: Vec<bool> = Vec::new();

    while i < tokens.len() {
        let tok = &tokens[i];
        if !tok.is(TokenKind::Preprocessor) {
            i += 1;
            continue;
        }
        match tok.text.as_str() {
            "define" => {
                if let Some(name) = tok.children.first() {
                    debug!(macro_name = %name.text, "macro defined");
                    macros.insert(name.text.clone(), tok.clone());
                }
                i += 1;
            }
            "undef" => {
                if let Some(name) = tok.children.first() {
                    macros.remove(&name.text);
                }
                i += 1;
            }
            "ifdef" | "ifndef" => {
                let Some(name) = tok.children.first() else {
                    return Err(ShroudError::structure(file, "conditional without a name"));
                };
                let defined = macros.contains_key(&name.text);
                let taken = (tok.text == "ifdef") == defined;
                if taken {
                    taken_stack.push(true);
                    i += 1;
                } else {
                    let (stop, was_else) = skip_branch(file, tokens, i + 1)?;
                    if was_else {
                        // Enter the else-branch; its endif pops normally.
                        taken_stack.push(false);
                        i = stop + 1;
                    } else {
                        i = stop + 1;
                    }
                }
            }
            "if" => {
                taken_stack.push(true);
                i += 1;
            }
            "else" | "elif" => {
                if taken_stack.last().copied().unwrap_or(false) {
                    // The then-branch was taken: skip to the matching endif.
                    let stop = skip_to_endif(file, tokens, i + 1)?;
                    taken_stack.pop();
                    i = stop + 1;
                } else {
                    i += 1;
                }
            }
            "endif" => {
                taken_stack.pop();
                i += 1;
            }
            _ => i += 1,
        }
    }
    Ok(())
}

/// Skip a not-taken branch: advance to the matching `#else` or `#endif` at
/// the same nesting level. Returns the stop index and whether it was an
/// `#else`.
fn skip_branch(file: &Path, tokens: &[Token], mut i: usize) -> Result<(usize, bool)> {
    let mut nesting = 0usize;
    while i < tokens.len() {
        let tok = &tokens[i];
        if tok.is(TokenKind::Preprocessor) {
            match tok.text.as_str() {
                "if" | "ifdef" | "ifndef" => nesting += 1,
                "endif" => {
                    if nesting == 0 {
                        return Ok((i, false));
                    }
                    nesting -= 1;
                }
                "else" if nesting == 0 => return Ok((i, true)),
                _ => {}
            }
        }
        i += 1;
    }
    Err(ShroudError::structure(file, "unterminated conditional block"))
}

/// Skip to the matching `#endif` at the same nesting level.
fn skip_to_endif(file: &Path, tokens: &[Token], mut i: usize) -> Result<usize> {
    let mut nesting = 0usize;
    while i < tokens.len() {
        let tok = &tokens[i];
        if tok.is(TokenKind::Preprocessor) {
            match tok.text.as_str() {
                "if" | "ifdef" | "ifndef" => nesting += 1,
                "endif" => {
                    if nesting == 0 {
                        return Ok(i);
                    }
                    nesting -= 1;
                }
                _ => {}
            }
        }
        i += 1;
    }
    Err(ShroudError::structure(file, "unterminated conditional block"))
}

/// Expand macro-of-macro bodies: a body that begins with a `namespace`
/// qualification followed by another known macro name gets that macro's body
/// substituted in place. Iterated to fixpoint over the table.
pub fn expand_macro_bodies(macros: &mut MacroTable) {
    loop {
        let mut replacement: Option<(String, Vec<Token>)> = None;
        for (name, def) in macros.iter() {
            // children[0] is the macro's own name; the body follows.
            let body = &def.children[1..];
            if body.len() < 2 || !body[0].is_text(TokenKind::Keyword, "namespace") {
                continue;
            }
            let inner = &body[1];
            if inner.text == *name || !inner.is(TokenKind::Name) {
                continue;
            }
            if let Some(inner_def) = macros.get(&inner.text) {
                let mut new_children = vec![def.children[0].clone(), body[0].clone()];
                new_children.extend(inner_def.children[1..].iter().cloned());
                new_children.extend(body[2..].iter().cloned());
                if new_children != def.children {
                    replacement = Some((name.clone(), new_children));
                    break;
                }
            }
        }
        match replacement {
            Some((name, children)) => {
                if let Some(def) = macros.get_mut(&name) {
                    def.children = children;
                }
            }
            None => break,
        }
    }
}

/// Final corpus sweep: reclassify identifiers matching macro names.
///
/// A macro whose body opens with `namespace` or a closing brace is spliced
/// directly into the stream (the scope walker needs its braces); any other
/// macro occurrence becomes an opaque `Macro` token.
pub fn apply_macros(tokens: &mut Vec<Token>, macros: &MacroTable) {
    let mut i = 0;
    while i < tokens.len() {
        if !tokens[i].is(TokenKind::Name) {
            i += 1;
            continue;
        }
        let Some(def) = macros.get(&tokens[i].text) else {
            i += 1;
            continue;
        };
        let body = &def.children[1..];
        let splice = body
            .first()
            .map(|t| t.is_text(TokenKind::Keyword, "namespace") || t.is(TokenKind::RBrace))
            .unwrap_or(false);
        if splice {
            let offset = tokens[i].source_offset;
            let spliced: Vec<Token> = body
                .iter()
                .map(|t| {
                    let mut c = t.clone();
                    c.source_offset = offset;
                    c
                })
                .collect();
            tokens.splice(i..=i, spliced.clone());
            i += spliced.len();
        } else {
            let tok = &mut tokens[i];
            tok.kind = TokenKind::Macro;
            tok.children = body.to_vec();
            i += 1;
        }
    }
}
