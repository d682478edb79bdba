//! Subject type resolution: the type of the expression left of a use site.

use tracing::trace;

use crate::lexer::{matching_open, Token, TokenKind};
use crate::model::type_token;
use crate::resolve::{element_of, is_smart_pointer, subscript_of, ResolveCtx, Resolution};

/// Casts whose angle-bracket type argument is the expression's type.
const CASTS: &[&str] = &["static_cast", "dynamic_cast", "const_cast", "dynamic_pointer_cast"];

/// Recursion bound. Real expressions stay far below it; hitting it means a
/// degenerate input (such as `auto a = a;`) and resolves to `Unresolved`.
pub(super) const MAX_DEPTH: usize = 32;

/// Resolve the static type of the sub-expression ending at `cursor`.
/// `scope_start` bounds every backward declaration scan, normally the
/// opening brace of the enclosing function body.
pub fn resolve_subject_type(
    ctx: &ResolveCtx,
    tokens: &[Token],
    cursor: usize,
    scope_start: usize,
) -> Resolution {
    subject_at(ctx, tokens, cursor, scope_start, 0)
}

pub(super) fn subject_at(
    ctx: &ResolveCtx,
    tokens: &[Token],
    cursor: usize,
    scope_start: usize,
    depth: usize,
) -> Resolution {
    if depth > MAX_DEPTH {
        return Resolution::Unresolved;
    }
    let Some(tok) = tokens.get(cursor) else {
        return Resolution::Unresolved;
    };
    match tok.kind {
        TokenKind::Keyword if tok.text == "this" => {
            Resolution::from_option(ctx.class_context.map(type_token))
        }
        TokenKind::Type => Resolution::Resolved(tok.clone()),
        TokenKind::Str => Resolution::Resolved(type_token("string")),
        TokenKind::RBracket => subscript(ctx, tokens, cursor, scope_start, depth),
        TokenKind::RParen => parenthesized(ctx, tokens, cursor, scope_start, depth),
        TokenKind::Name | TokenKind::MemberVariable | TokenKind::GlobalVariable => {
            let after_access = cursor >= 1
                && matches!(tokens[cursor - 1].kind, TokenKind::Dot | TokenKind::Arrow);
            if after_access {
                member_access(ctx, tokens, cursor, scope_start, depth)
            } else {
                recall_subject_type(ctx, tokens, cursor, scope_start, depth)
            }
        }
        _ => Resolution::Unresolved,
    }
}

/// `expr [ i ]`: resolve the base, then project through the subscript.
fn subscript(
    ctx: &ResolveCtx,
    tokens: &[Token],
    cursor: usize,
    scope_start: usize,
    depth: usize,
) -> Resolution {
    let Some(open) = matching_open(tokens, cursor) else {
        return Resolution::Unresolved;
    };
    if open == 0 {
        return Resolution::Unresolved;
    }
    match subject_at(ctx, tokens, open - 1, scope_start, depth + 1) {
        Resolution::Resolved(base) => Resolution::from_option(subscript_of(&base)),
        Resolution::Unresolved => Resolution::Unresolved,
    }
}

/// `... ( ... )`: a call, a constructor expression, a cast, or a plain
/// parenthesized sub-expression.
fn parenthesized(
    ctx: &ResolveCtx,
    tokens: &[Token],
    cursor: usize,
    scope_start: usize,
    depth: usize,
) -> Resolution {
    let Some(open) = matching_open(tokens, cursor) else {
        return Resolution::Unresolved;
    };
    if open == 0 {
        // A leading paren: recurse into the grouped expression.
        return if cursor > open + 1 {
            subject_at(ctx, tokens, cursor - 1, scope_start, depth + 1)
        } else {
            Resolution::Unresolved
        };
    }
    let prev = &tokens[open - 1];
    match prev.kind {
        TokenKind::Keyword if prev.text == "typeid" => Resolution::Unresolved,
        TokenKind::Name | TokenKind::MemberFunction | TokenKind::Function | TokenKind::Call => {
            super::call::call_return_at(ctx, tokens, open - 1, scope_start, depth + 1)
        }
        TokenKind::Type => Resolution::Resolved(prev.clone()),
        TokenKind::RAngle => cast_argument(tokens, open - 1),
        _ if cursor > open + 1 => subject_at(ctx, tokens, cursor - 1, scope_start, depth + 1),
        _ => Resolution::Unresolved,
    }
}

/// `static_cast<T>(...)` and friends: the type argument is the answer.
fn cast_argument(tokens: &[Token], angle_close: usize) -> Resolution {
    let Some(angle_open) = matching_open(tokens, angle_close) else {
        return Resolution::Unresolved;
    };
    let is_cast = angle_open
        .checked_sub(1)
        .and_then(|k| tokens.get(k))
        .map(|t| CASTS.contains(&t.text.as_str()))
        .unwrap_or(false);
    if !is_cast {
        return Resolution::Unresolved;
    }
    Resolution::from_option(
        tokens[angle_open + 1..angle_close]
            .iter()
            .find(|t| t.is(TokenKind::Type))
            .cloned(),
    )
}

/// `left . member` / `left -> member`: resolve the left side, then project
/// the member through pair/iterator/smart-pointer shapes or the resolved
/// class's member variable table.
fn member_access(
    ctx: &ResolveCtx,
    tokens: &[Token],
    cursor: usize,
    scope_start: usize,
    depth: usize,
) -> Resolution {
    if cursor < 2 {
        return Resolution::Unresolved;
    }
    let is_arrow = tokens[cursor - 1].is(TokenKind::Arrow);
    let mut left = match subject_at(ctx, tokens, cursor - 2, scope_start, depth + 1) {
        Resolution::Resolved(t) => t,
        Resolution::Unresolved => return Resolution::Unresolved,
    };
    // An iterator stands for the element it points at.
    if left.text == "iterator" {
        let elem = left.children.first().and_then(element_of);
        match elem {
            Some(e) => left = e,
            None => return Resolution::Unresolved,
        }
    }
    if is_arrow && is_smart_pointer(&left) {
        match left.children.first().cloned() {
            Some(p) => left = p,
            None => return Resolution::Unresolved,
        }
    }
    let member = tokens[cursor].text.as_str();
    if left.text == "pair" {
        return Resolution::from_option(match member {
            "first" => left.children.first().cloned(),
            "second" => left.children.get(1).cloned(),
            _ => None,
        });
    }
    if ctx.model.has_class(&left.text) {
        return Resolution::from_option(
            ctx.model
                .class_variable(&left.text, member)
                .map(|v| v.ty.clone()),
        );
    }
    trace!(member, ty = %left.text, "member access on unknown type");
    Resolution::Unresolved
}

/// Bare name: member variable, parameter, most recent local declaration,
/// file-local, then global. No match anywhere is `Unresolved`.
fn recall_subject_type(
    ctx: &ResolveCtx,
    tokens: &[Token],
    cursor: usize,
    scope_start: usize,
    depth: usize,
) -> Resolution {
    let name = tokens[cursor].text.as_str();
    if let Some(class) = ctx.class_context {
        if let Some(var) = ctx.model.class_variable(class, name) {
            return Resolution::Resolved(var.ty.clone());
        }
    }
    if let Some(ty) = ctx.parameters.get(name) {
        return Resolution::Resolved(ty.clone());
    }
    // Backward scan for the most recent declaration of `name`.
    let mut k = cursor;
    while k > scope_start {
        k -= 1;
        if tokens[k].text != name || !tokens[k].is_name_like() {
            continue;
        }
        if let Some(ty) = declaration_type_at(tokens, k) {
            if ty.text == "auto" {
                return auto_initializer(ctx, tokens, k, scope_start, depth);
            }
            return Resolution::Resolved(ty);
        }
    }
    if let Some(var) = ctx.locals.variables.get(name) {
        return Resolution::Resolved(var.ty.clone());
    }
    if let Some(var) = ctx.model.globals.get(name) {
        return Resolution::Resolved(var.ty.clone());
    }
    trace!(name, "subject unresolved");
    Resolution::Unresolved
}

/// Is the token at `k` the declared name of a declaration, and if so of what
/// type? Handles `T a`, `T * a`, the multi-declarator chain `T a, b, c`,
/// and `catch (T e)` (whose shape is the plain `T e` case).
fn declaration_type_at(tokens: &[Token], k: usize) -> Option<Token> {
    let mut j = k;
    loop {
        if j == 0 {
            return None;
        }
        j -= 1;
        match tokens[j].kind {
            TokenKind::Star | TokenKind::Amp => continue,
            TokenKind::Type => return Some(tokens[j].clone()),
            // `T a, b` chain: step over `name ,` pairs.
            TokenKind::Comma => {
                if j == 0 || !tokens[j - 1].is(TokenKind::Name) {
                    return None;
                }
                j -= 1;
            }
            _ => return None,
        }
    }
}

/// `auto a = expr;`: the declared type is whatever the initializer
/// resolves to.
fn auto_initializer(
    ctx: &ResolveCtx,
    tokens: &[Token],
    name_idx: usize,
    scope_start: usize,
    depth: usize,
) -> Resolution {
    let assign = name_idx + 1;
    if !tokens.get(assign).map(|t| t.is(TokenKind::Assign)).unwrap_or(false) {
        return Resolution::Unresolved;
    }
    let mut end = assign + 1;
    let mut nest = 0i32;
    while let Some(t) = tokens.get(end) {
        match t.kind {
            TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => nest += 1,
            TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => nest -= 1,
            TokenKind::Semi if nest == 0 => break,
            _ => {}
        }
        end += 1;
    }
    if end <= assign + 1 {
        return Resolution::Unresolved;
    }
    subject_at(ctx, tokens, end - 1, scope_start, depth + 1)
}
