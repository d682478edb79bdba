//! Call classification and rename planning.
//!
//! The classifier walks every recognized function or method body, re-runs
//! subject resolution for each call site, and retags the callee token
//! `Call` only when the resolved owner is an in-project, non-template,
//! non-externally-based, non-ignored class (or an in-project free
//! function). Static cross-class calls and anything landing on a container
//! or smart-pointer method are excluded: an `Unresolved` subject is never
//! safe to rename.

pub mod emitter;

use tracing::debug;

use crate::config::IgnoreList;
use crate::lexer::{matching_brace_close, matching_close, Token, TokenKind};
use crate::model::{FileSymbols, Model};
use crate::resolve::{collect_parameters, resolve_subject_type, ResolveCtx, Resolution};

pub use emitter::{apply_renames, collect_occurrences, Occurrence, RenameMode};

/// Is `name` a class whose members may be renamed? Names declared by the
/// extern-type description are known-foreign even when a class of the same
/// name exists in the corpus.
pub(crate) fn renameable_class(model: &Model, ignores: &IgnoreList, name: &str) -> bool {
    model
        .classes
        .get(name)
        .map(|c| !c.is_template)
        .unwrap_or(false)
        && !model.has_external_base(name)
        && !model.extern_scopes.contains(name)
        && !ignores.classes.contains(name)
}

/// Is `name` a class whose raw name occurrences may be renamed? External
/// bases do not matter here; the class itself is still ours.
pub(crate) fn renameable_class_name(model: &Model, ignores: &IgnoreList, name: &str) -> bool {
    model
        .classes
        .get(name)
        .map(|c| !c.is_template)
        .unwrap_or(false)
        && !model.extern_scopes.contains(name)
        && !ignores.classes.contains(name)
}

/// Is `method` of `class` ours to rename? Shared between call-site
/// classification and declaration-site collection so the two can never
/// disagree on an ignore entry.
pub(crate) fn method_in_module(
    model: &Model,
    ignores: &IgnoreList,
    class: &str,
    method: &str,
) -> bool {
    if !renameable_class(model, ignores, class) {
        return false;
    }
    if ignores.functions.contains(method) {
        return false;
    }
    let scope = model
        .classes
        .get(class)
        .map(|c| c.owning_scope.as_str())
        .unwrap_or("");
    if ignores.matches_qualified(class, scope, method) {
        return false;
    }
    model.method_on(class, method).is_some()
}

fn free_function_in_module(
    model: &Model,
    locals: &FileSymbols,
    ignores: &IgnoreList,
    name: &str,
) -> bool {
    if ignores.functions.contains(name) {
        return false;
    }
    model.global_functions.contains_key(name) || locals.functions.contains_key(name)
}

/// The in-module test for one call site at `name_idx` inside a body
/// starting at `scope_start`.
fn is_call_in_module(
    ctx: &ResolveCtx,
    ignores: &IgnoreList,
    tokens: &[Token],
    name_idx: usize,
    scope_start: usize,
) -> bool {
    let name = tokens[name_idx].text.as_str();
    match name_idx.checked_sub(1).and_then(|k| tokens.get(k)).map(|t| t.kind) {
        // Static cross-class calls are conservatively excluded.
        Some(TokenKind::Scope) => false,
        Some(TokenKind::Dot) | Some(TokenKind::Arrow) => {
            let mut subject = match resolve_subject_type(ctx, tokens, name_idx - 2, scope_start) {
                Resolution::Resolved(t) => t,
                Resolution::Unresolved => return false,
            };
            if subject.text == "iterator" {
                match subject.children.first().cloned() {
                    Some(c) => subject = c,
                    None => return false,
                }
            }
            if tokens[name_idx - 1].is(TokenKind::Arrow)
                && crate::passes::typedefs::SMART_POINTERS.contains(subject.text.as_str())
            {
                match subject.children.first().cloned() {
                    Some(p) => subject = p,
                    None => return false,
                }
            }
            // A call still landing on a container or smart pointer is a
            // library call, never ours.
            if crate::passes::typedefs::CONTAINERS.contains(subject.text.as_str()) {
                return false;
            }
            method_in_module(ctx.model, ignores, &subject.text, name)
        }
        _ => {
            if let Some(class) = ctx.class_context {
                if method_in_module(ctx.model, ignores, class, name) {
                    return true;
                }
            }
            free_function_in_module(ctx.model, ctx.locals, ignores, name)
        }
    }
}

/// One recognized function body: its bounds and resolution context.
struct Body {
    scope_start: usize,
    end: usize,
    class: Option<String>,
    parameters: rustc_hash::FxHashMap<String, Token>,
}

/// Find the body attached to a `MemberFunction`/`Function` token at `i`,
/// skipping trailing qualifiers and a constructor initializer list.
fn body_after(tokens: &[Token], i: usize) -> Option<Body> {
    if !tokens.get(i + 1).map(|t| t.is(TokenKind::LParen)).unwrap_or(false) {
        return None;
    }
    let params_close = matching_close(tokens, i + 1)?;
    let mut k = params_close + 1;
    while tokens
        .get(k)
        .map(|t| {
            t.is_text(TokenKind::Keyword, "const")
                || t.is_text(TokenKind::Keyword, "noexcept")
                || t.is_text(TokenKind::Keyword, "throw")
        })
        .unwrap_or(false)
    {
        k += 1;
    }
    if tokens.get(k).map(|t| t.is(TokenKind::Colon)).unwrap_or(false) {
        while k < tokens.len()
            && !tokens[k].is(TokenKind::LBrace)
            && !tokens[k].is(TokenKind::Semi)
        {
            k += 1;
        }
    }
    if !tokens.get(k).map(|t| t.is(TokenKind::LBrace)).unwrap_or(false) {
        return None;
    }
    let end = matching_brace_close(tokens, k)?;
    Some(Body {
        scope_start: k,
        end,
        class: tokens[i].owner.clone(),
        parameters: collect_parameters(tokens, i + 1, params_close),
    })
}

/// Classify every call site in one file, retagging qualifying tokens
/// `Call`. The second sweep catches identifiers passed as bare
/// function-valued arguments.
pub fn classify_calls(
    tokens: &mut Vec<Token>,
    model: &Model,
    locals: &FileSymbols,
    ignores: &IgnoreList,
) {
    let mut i = 0;
    while i < tokens.len() {
        let is_fn = matches!(
            tokens[i].kind,
            TokenKind::MemberFunction | TokenKind::Function
        );
        let Some(body) = (if is_fn { body_after(tokens, i) } else { None }) else {
            i += 1;
            continue;
        };
        classify_body(tokens, model, locals, ignores, &body);
        i = body.end + 1;
    }
}

fn classify_body(
    tokens: &mut Vec<Token>,
    model: &Model,
    locals: &FileSymbols,
    ignores: &IgnoreList,
    body: &Body,
) {
    let class = body.class.clone();
    let ctx = ResolveCtx {
        model,
        locals,
        class_context: class.as_deref(),
        parameters: &body.parameters,
    };

    // Call sites.
    let mut marks: Vec<usize> = Vec::new();
    for j in body.scope_start + 1..body.end {
        if !tokens[j].is(TokenKind::Name) {
            continue;
        }
        if !tokens.get(j + 1).map(|t| t.is(TokenKind::LParen)).unwrap_or(false) {
            continue;
        }
        if is_call_in_module(&ctx, ignores, tokens, j, body.scope_start) {
            marks.push(j);
        }
    }
    // Bare function-valued arguments: a known in-project function name in
    // argument position, not itself called.
    for j in body.scope_start + 1..body.end {
        if !tokens[j].is(TokenKind::Name) {
            continue;
        }
        if tokens.get(j + 1).map(|t| t.is(TokenKind::LParen)).unwrap_or(false) {
            continue;
        }
        let in_arg_position = matches!(
            tokens[j - 1].kind,
            TokenKind::Comma | TokenKind::LParen
        );
        if in_arg_position
            && free_function_in_module(model, locals, ignores, &tokens[j].text)
        {
            marks.push(j);
        }
    }
    debug!(calls = marks.len(), "call sites classified");
    for j in marks {
        tokens[j].kind = TokenKind::Call;
    }
}
