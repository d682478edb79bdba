//! Function-call return-type resolution.

use tracing::trace;

use crate::lexer::{Token, TokenKind};
use crate::resolve::{
    element_of, is_container, is_smart_pointer, subscript_of, ResolveCtx, Resolution,
    ELEMENT_METHODS, ITERATOR_METHODS,
};

/// Resolve the return type of the call whose callee name sits at
/// `name_idx`. Distinguishes static qualified calls (`Class::fn`),
/// subject-qualified calls (`expr.fn` / `expr->fn`), and unqualified calls.
pub fn resolve_call_return_type(
    ctx: &ResolveCtx,
    tokens: &[Token],
    name_idx: usize,
    scope_start: usize,
) -> Resolution {
    call_return_at(ctx, tokens, name_idx, scope_start, 0)
}

pub(super) fn call_return_at(
    ctx: &ResolveCtx,
    tokens: &[Token],
    name_idx: usize,
    scope_start: usize,
    depth: usize,
) -> Resolution {
    if depth > super::subject::MAX_DEPTH {
        return Resolution::Unresolved;
    }
    let method = tokens[name_idx].text.as_str();
    match name_idx.checked_sub(1).and_then(|k| tokens.get(k)).map(|t| t.kind) {
        Some(TokenKind::Scope) => static_call(ctx, tokens, name_idx),
        Some(TokenKind::Dot) | Some(TokenKind::Arrow) => {
            subject_call(ctx, tokens, name_idx, scope_start, depth)
        }
        _ => unqualified_call(ctx, method),
    }
}

/// `Class::fn(...)`: resolved via the base-flattened method table; a class
/// unknown to the corpus is foreign and yields `Unresolved`.
fn static_call(ctx: &ResolveCtx, tokens: &[Token], name_idx: usize) -> Resolution {
    let Some(class_tok) = name_idx.checked_sub(2).and_then(|k| tokens.get(k)) else {
        return Resolution::Unresolved;
    };
    let class = class_tok.text.as_str();
    if !ctx.model.has_class(class) {
        trace!(class, "static call on foreign class");
        return Resolution::Unresolved;
    }
    Resolution::from_option(
        ctx.model
            .method_on(class, &tokens[name_idx].text)
            .and_then(|f| f.return_type.clone()),
    )
}

/// `expr.fn(...)` / `expr->fn(...)`: resolve the subject's type first,
/// then look the method up on it, with container and smart-pointer method
/// shapes special-cased.
fn subject_call(
    ctx: &ResolveCtx,
    tokens: &[Token],
    name_idx: usize,
    scope_start: usize,
    depth: usize,
) -> Resolution {
    if name_idx < 2 {
        return Resolution::Unresolved;
    }
    let is_arrow = tokens[name_idx - 1].is(TokenKind::Arrow);
    let mut subject =
        match super::subject::subject_at(ctx, tokens, name_idx - 2, scope_start, depth + 1) {
            Resolution::Resolved(t) => t,
            Resolution::Unresolved => return Resolution::Unresolved,
        };
    let method = tokens[name_idx].text.as_str();

    // Methods called through an iterator act on the pointed-at element.
    if subject.text == "iterator" {
        match subject.children.first().and_then(element_of) {
            Some(e) => subject = e,
            None => return Resolution::Unresolved,
        }
    }

    if is_smart_pointer(&subject) {
        if is_arrow {
            match subject.children.first().cloned() {
                Some(p) => subject = p,
                None => return Resolution::Unresolved,
            }
        } else {
            // Direct smart-pointer methods.
            return match method {
                "lock" => {
                    let mut shared = Token::synthetic(TokenKind::Type, "shared_ptr");
                    shared.children = subject.children.clone();
                    Resolution::Resolved(shared)
                }
                "get" => Resolution::from_option(subject.children.first().cloned()),
                _ => Resolution::Unresolved,
            };
        }
    }

    if is_container(&subject) {
        if ITERATOR_METHODS.contains(method) {
            let mut iter = Token::synthetic(TokenKind::Type, "iterator");
            iter.children = vec![subject];
            return Resolution::Resolved(iter);
        }
        if ELEMENT_METHODS.contains(method) {
            return Resolution::from_option(subscript_of(&subject));
        }
        return Resolution::Unresolved;
    }

    if !ctx.model.has_class(&subject.text) {
        trace!(method, ty = %subject.text, "method call on unknown type");
        return Resolution::Unresolved;
    }
    Resolution::from_option(
        ctx.model
            .method_on(&subject.text, method)
            .and_then(|f| f.return_type.clone()),
    )
}

/// Bare `fn(...)`: enclosing-class method, then global, then file-local.
fn unqualified_call(ctx: &ResolveCtx, name: &str) -> Resolution {
    if let Some(class) = ctx.class_context {
        if let Some(f) = ctx.model.method_on(class, name) {
            return Resolution::from_option(f.return_type.clone());
        }
    }
    if let Some(f) = ctx.model.global_functions.get(name) {
        return Resolution::from_option(f.return_type.clone());
    }
    if let Some(f) = ctx.locals.functions.get(name) {
        return Resolution::from_option(f.return_type.clone());
    }
    Resolution::Unresolved
}
