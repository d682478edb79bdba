//! Expression type resolution tests over fully analyzed sources.

use std::path::PathBuf;

use rustc_hash::{FxHashMap, FxHashSet};

use shroud::lexer::{Token, TokenKind};
use shroud::resolve::{
    collect_parameters, resolve_call_return_type, resolve_subject_type, ResolveCtx,
};
use shroud::Analyzed;

fn analyze(src: &str) -> Analyzed {
    shroud::load_from_texts(vec![(PathBuf::from("t.cpp"), src.to_string())])
        .normalize()
        .expand_macros()
        .unwrap()
        .build_classes()
        .unwrap()
        .normalize_types()
        .unwrap()
        .extract_symbols(FxHashSet::default())
}

/// Index of the `n`th token with the given text.
fn nth(tokens: &[Token], text: &str, n: usize) -> usize {
    tokens
        .iter()
        .enumerate()
        .filter(|(_, t)| t.text == text)
        .map(|(i, _)| i)
        .nth(n)
        .unwrap()
}

/// Opening brace of the body following the token at `at`.
fn body_open(tokens: &[Token], at: usize) -> usize {
    (at..tokens.len())
        .find(|&i| tokens[i].is(TokenKind::LBrace))
        .unwrap()
}

#[test]
fn test_local_declaration_resolves_subject() {
    let analyzed = analyze("class Foo { public: int n; }; void use() { Foo f; f.n = 1; }");
    let file = &analyzed.corpus.files[0];
    let params = FxHashMap::default();
    let ctx = ResolveCtx {
        model: &analyzed.model,
        locals: &file.locals,
        class_context: None,
        parameters: &params,
    };
    let scope = body_open(&file.tokens, nth(&file.tokens, "use", 0));
    // Second `f` is the one before the dot.
    let subject = nth(&file.tokens, "f", 1);
    let ty = resolve_subject_type(&ctx, &file.tokens, subject, scope);
    assert_eq!(ty.resolved().unwrap().text, "Foo");
}

#[test]
fn test_call_return_type_resolves() {
    let analyzed =
        analyze("class Foo { public: int bar(); }; void use() { Foo f; f.bar(); }");
    let file = &analyzed.corpus.files[0];
    let params = FxHashMap::default();
    let ctx = ResolveCtx {
        model: &analyzed.model,
        locals: &file.locals,
        class_context: None,
        parameters: &params,
    };
    let scope = body_open(&file.tokens, nth(&file.tokens, "use", 0));
    let bar = nth(&file.tokens, "bar", 1);
    let ret = resolve_call_return_type(&ctx, &file.tokens, bar, scope);
    assert_eq!(ret.resolved().unwrap().text, "int");
}

#[test]
fn test_begin_yields_iterator_over_container() {
    let analyzed = analyze("void use() { std::vector<int> v; v.begin(); }");
    let file = &analyzed.corpus.files[0];
    let params = FxHashMap::default();
    let ctx = ResolveCtx {
        model: &analyzed.model,
        locals: &file.locals,
        class_context: None,
        parameters: &params,
    };
    let scope = body_open(&file.tokens, nth(&file.tokens, "use", 0));
    let begin = nth(&file.tokens, "begin", 0);
    let ret = resolve_call_return_type(&ctx, &file.tokens, begin, scope);
    let iter = ret.resolved().unwrap();
    assert_eq!(iter.text, "iterator");
    assert_eq!(iter.children[0].text, "vector");
}

#[test]
fn test_parameter_resolves_subject() {
    let analyzed =
        analyze("class Foo { public: int bar(); }; void use(Foo p) { p.bar(); }");
    let file = &analyzed.corpus.files[0];
    let use_idx = nth(&file.tokens, "use", 0);
    let open = use_idx + 1;
    let close = (open..file.tokens.len())
        .find(|&i| file.tokens[i].is(TokenKind::RParen))
        .unwrap();
    let params = collect_parameters(&file.tokens, open, close);
    let ctx = ResolveCtx {
        model: &analyzed.model,
        locals: &file.locals,
        class_context: None,
        parameters: &params,
    };
    let scope = body_open(&file.tokens, use_idx);
    let subject = nth(&file.tokens, "p", 1);
    let ty = resolve_subject_type(&ctx, &file.tokens, subject, scope);
    assert_eq!(ty.resolved().unwrap().text, "Foo");
}

#[test]
fn test_unknown_subject_stays_unresolved() {
    let analyzed = analyze("void use() { mystery.bar(); }");
    let file = &analyzed.corpus.files[0];
    let params = FxHashMap::default();
    let ctx = ResolveCtx {
        model: &analyzed.model,
        locals: &file.locals,
        class_context: None,
        parameters: &params,
    };
    let scope = body_open(&file.tokens, nth(&file.tokens, "use", 0));
    let subject = nth(&file.tokens, "mystery", 0);
    let ty = resolve_subject_type(&ctx, &file.tokens, subject, scope);
    assert!(!ty.is_resolved());
}

#[test]
fn test_subscript_then_arrow_projects_through_smart_pointer() {
    let analyzed = analyze(
        "class Bar { public: void baz(); }; \
         void use() { std::vector<std::shared_ptr<Bar>> v; v[0]->baz(); }",
    );
    let file = &analyzed.corpus.files[0];
    let params = FxHashMap::default();
    let ctx = ResolveCtx {
        model: &analyzed.model,
        locals: &file.locals,
        class_context: None,
        parameters: &params,
    };
    let scope = body_open(&file.tokens, nth(&file.tokens, "use", 0));
    let baz = nth(&file.tokens, "baz", 1);
    // The subject expression ends at the `]` two tokens left of `baz`.
    let ty = resolve_subject_type(&ctx, &file.tokens, baz - 2, scope);
    assert_eq!(ty.resolved().unwrap().text, "shared_ptr");
    assert_eq!(ty.resolved().unwrap().children[0].text, "Bar");
}
