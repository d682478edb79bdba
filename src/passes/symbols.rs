//! Member variable and free-symbol extraction.
//!
//! Runs last among the table-building passes, on token streams where class
//! bodies are delimited by `ClassBegin`/`ClassEnd`, class names and folded
//! containers are `Type` tokens, and typedefs are already expanded. Member
//! variables are read off class bodies at their outermost depth; qualified
//! out-of-class definitions back-fill return types; headers contribute
//! global variables and free functions while `.cpp` files, `static`
//! declarations, and anonymous namespaces populate per-file local tables.

use rustc_hash::FxHashMap;

use crate::lexer::{matching_brace_close, matching_close, Token, TokenKind};
use crate::model::{ClassFunction, ClassVariable, FileSymbols, Function, Variable, ANON_NAMESPACE};
use crate::passes::scopes::join_scope;

/// Does `prev` allow a `Type` token after it to start a declaration?
/// `None` is the start of the stream.
fn declaration_context(prev: Option<&Token>) -> bool {
    match prev {
        None => true,
        Some(t) => {
            matches!(
                t.kind,
                TokenKind::Semi
                    | TokenKind::LBrace
                    | TokenKind::RBrace
                    | TokenKind::ClassBegin
                    | TokenKind::ClassEnd
                    | TokenKind::Comment
                    | TokenKind::Colon
                    | TokenKind::Header
                    | TokenKind::Preprocessor
            ) || t.is_text(TokenKind::Keyword, "static")
                || t.is_text(TokenKind::Keyword, "mutable")
                || t.is_text(TokenKind::Keyword, "extern")
        }
    }
}

/// One parsed declarator run: the name-token indices of `T a, b[4], c = x;`.
/// `None` means the shape is not a variable declaration (a function, or
/// junk); the caller falls through.
fn parse_declarators(tokens: &[Token], type_idx: usize) -> Option<(Vec<usize>, usize)> {
    let mut names = Vec::new();
    let mut j = type_idx + 1;
    loop {
        while tokens
            .get(j)
            .map(|t| matches!(t.kind, TokenKind::Star | TokenKind::Amp))
            .unwrap_or(false)
        {
            j += 1;
        }
        if !tokens.get(j).map(|t| t.is(TokenKind::Name)).unwrap_or(false) {
            return None;
        }
        if tokens.get(j + 1).map(|t| t.is(TokenKind::LParen)).unwrap_or(false) {
            return None; // function shape
        }
        names.push(j);
        j += 1;
        while tokens.get(j).map(|t| t.is(TokenKind::LBracket)).unwrap_or(false) {
            j = matching_close(tokens, j)? + 1;
        }
        if tokens.get(j).map(|t| t.is(TokenKind::Assign)).unwrap_or(false) {
            j += 1;
            let mut depth = 0i32;
            loop {
                let tok = tokens.get(j)?;
                match tok.kind {
                    TokenKind::LParen | TokenKind::LBrace | TokenKind::LBracket => depth += 1,
                    TokenKind::RParen | TokenKind::RBrace | TokenKind::RBracket => depth -= 1,
                    TokenKind::Comma | TokenKind::Semi if depth == 0 => break,
                    _ => {}
                }
                j += 1;
            }
        } else if tokens
            .get(j)
            .map(|t| matches!(t.kind, TokenKind::LBrace | TokenKind::LParen))
            .unwrap_or(false)
        {
            // Brace or paren initializer.
            j = matching_close(tokens, j)? + 1;
        }
        match tokens.get(j).map(|t| t.kind) {
            Some(TokenKind::Comma) => j += 1,
            Some(TokenKind::Semi) => return Some((names, j + 1)),
            _ => return None,
        }
    }
}

/// Extract member variables from every class body at its outermost brace
/// depth, tagging the name tokens `MemberVariable`.
pub fn extract_class_members(
    tokens: &mut Vec<Token>,
    class_variables: &mut FxHashMap<String, Vec<ClassVariable>>,
) {
    let mut owners: Vec<(String, usize)> = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        match tokens[i].kind {
            TokenKind::ClassBegin => {
                let owner = tokens[i].owner.clone().unwrap_or_default();
                owners.push((owner, 0));
                i += 1;
            }
            TokenKind::ClassEnd => {
                owners.pop();
                i += 1;
            }
            TokenKind::LBrace => {
                if let Some((_, d)) = owners.last_mut() {
                    *d += 1;
                }
                i += 1;
            }
            TokenKind::RBrace => {
                if let Some((_, d)) = owners.last_mut() {
                    *d = d.saturating_sub(1);
                }
                i += 1;
            }
            TokenKind::Type
                if owners.last().map(|(_, d)| *d == 0).unwrap_or(false)
                    && declaration_context(i.checked_sub(1).and_then(|k| tokens.get(k))) =>
            {
                let Some((owner, _)) = owners.last() else {
                    i += 1;
                    continue;
                };
                let owner = owner.clone();
                match parse_declarators(tokens, i) {
                    Some((names, after)) => {
                        let ty = tokens[i].clone();
                        for name_idx in names {
                            tokens[name_idx].kind = TokenKind::MemberVariable;
                            tokens[name_idx].owner = Some(owner.clone());
                            class_variables.entry(owner.clone()).or_default().push(
                                ClassVariable {
                                    owner_class: owner.clone(),
                                    name: tokens[name_idx].text.clone(),
                                    ty: ty.clone(),
                                },
                            );
                        }
                        i = after;
                    }
                    None => i += 1,
                }
            }
            _ => i += 1,
        }
    }
}

/// Back-fill member function return types from qualified out-of-class
/// definitions `RET Class::name(...) { ... }`, tagging the definition-site
/// name token `MemberFunction`.
pub fn backfill_qualified_definitions(
    tokens: &mut [Token],
    class_functions: &mut FxHashMap<String, Vec<ClassFunction>>,
) {
    let mut i = 0;
    while i + 3 < tokens.len() {
        let qualifies = tokens[i].is(TokenKind::Type)
            && class_functions.contains_key(&tokens[i].text)
            && tokens[i + 1].is(TokenKind::Scope);
        if !qualifies {
            i += 1;
            continue;
        }
        let class = tokens[i].text.clone();
        // `Class::name(` or the destructor form `Class::~Class(`. The name
        // after `~` has already been reclassified to `Type` by the class
        // pass, so it is matched by text.
        let (name_idx, name) = if tokens[i + 2].is(TokenKind::Tilde)
            && tokens
                .get(i + 3)
                .map(|t| t.is_name_like() || t.is_text(TokenKind::Type, &class))
                .unwrap_or(false)
        {
            (i + 3, format!("~{}", tokens[i + 3].text))
        } else if tokens[i + 2].is_name_like() {
            (i + 2, tokens[i + 2].text.clone())
        } else {
            i += 1;
            continue;
        };
        let open = name_idx + 1;
        if !tokens.get(open).map(|t| t.is(TokenKind::LParen)).unwrap_or(false) {
            i += 1;
            continue;
        }
        let Some(close) = matching_close(tokens, open) else {
            i += 1;
            continue;
        };
        // Only definitions: a body must follow, possibly past qualifiers.
        let mut k = close + 1;
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
        let has_body = tokens.get(k).map(|t| t.is(TokenKind::LBrace)).unwrap_or(false)
            || tokens.get(k).map(|t| t.is(TokenKind::Colon)).unwrap_or(false);
        if !has_body {
            i = close + 1;
            continue;
        }

        tokens[name_idx].kind = TokenKind::MemberFunction;
        tokens[name_idx].owner = Some(class.clone());
        let return_type = i
            .checked_sub(1)
            .and_then(|k| tokens.get(k))
            .filter(|t| t.is(TokenKind::Type))
            .cloned();
        if let (Some(ret), Some(fns)) = (return_type, class_functions.get_mut(&class)) {
            if let Some(f) = fns.iter_mut().find(|f| f.name == name && f.return_type.is_none()) {
                f.return_type = Some(ret);
            }
        }
        i = close + 1;
    }
}

struct NamespaceFrame {
    qualified: String,
    anon: bool,
}

/// Extract free functions and global variables at file scope.
///
/// Header declarations go to the corpus-wide tables; `.cpp` declarations,
/// `static`-prefixed ones, and anything inside an anonymous namespace go to
/// the per-file local tables. Recorded function-name tokens are tagged
/// `Function`, variable names `GlobalVariable`.
pub fn extract_free_symbols(
    tokens: &mut Vec<Token>,
    is_header: bool,
    globals: &mut FxHashMap<String, Variable>,
    global_functions: &mut FxHashMap<String, Function>,
    locals: &mut FileSymbols,
) {
    let mut frames: Vec<NamespaceFrame> = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        match tokens[i].kind {
            TokenKind::Keyword if tokens[i].text == "namespace" => {
                if i > 0 && tokens[i - 1].is_text(TokenKind::Keyword, "using") {
                    i += 1;
                    continue;
                }
                let mut j = i + 1;
                let (name, anon) = match tokens.get(j).map(|t| t.kind) {
                    Some(TokenKind::Name) => {
                        let n = tokens[j].text.clone();
                        j += 1;
                        (n, false)
                    }
                    Some(TokenKind::LBrace) => (ANON_NAMESPACE.to_string(), true),
                    _ => {
                        i += 1;
                        continue;
                    }
                };
                if !tokens.get(j).map(|t| t.is(TokenKind::LBrace)).unwrap_or(false) {
                    i += 1;
                    continue;
                }
                let parent = frames.last().map(|f| f.qualified.clone()).unwrap_or_default();
                let anon = anon || frames.last().map(|f| f.anon).unwrap_or(false);
                frames.push(NamespaceFrame {
                    qualified: join_scope(&parent, &name),
                    anon,
                });
                i = j + 1;
            }
            TokenKind::ClassBegin | TokenKind::LBrace => {
                // Class and function bodies hold no file-scope symbols.
                match matching_brace_close(tokens, i) {
                    Some(close) => i = close + 1,
                    None => i += 1,
                }
            }
            TokenKind::RBrace => {
                frames.pop();
                i += 1;
            }
            TokenKind::Type
                if declaration_context(i.checked_sub(1).and_then(|k| tokens.get(k))) =>
            {
                let scope = frames.last().map(|f| f.qualified.clone()).unwrap_or_default();
                let is_static = i > 0 && tokens[i - 1].is_text(TokenKind::Keyword, "static");
                let local = !is_header || is_static || frames.last().map(|f| f.anon).unwrap_or(false);
                if let Some(next) = free_function_at(tokens, i, i) {
                    record_function(
                        tokens,
                        i,
                        local,
                        &scope,
                        global_functions,
                        locals,
                    );
                    i = next;
                } else if let Some((names, after)) = parse_declarators(tokens, i) {
                    let ty = tokens[i].clone();
                    for name_idx in names {
                        tokens[name_idx].kind = TokenKind::GlobalVariable;
                        let var = Variable {
                            name: tokens[name_idx].text.clone(),
                            ty: ty.clone(),
                            declaring_scope: scope.clone(),
                        };
                        if local {
                            locals.variables.insert(var.name.clone(), var);
                        } else {
                            globals.insert(var.name.clone(), var);
                        }
                    }
                    i = after;
                } else {
                    i += 1;
                }
            }
            TokenKind::Name
                if tokens.get(i + 1).map(|t| t.is(TokenKind::LParen)).unwrap_or(false)
                    && !i
                        .checked_sub(1)
                        .and_then(|k| tokens.get(k))
                        .map(|t| matches!(t.kind, TokenKind::Scope | TokenKind::Tilde | TokenKind::Type))
                        .unwrap_or(false) =>
            {
                // A function whose return type is not adjacent: scan backward
                // within the statement for it.
                let found = backward_type(tokens, i)
                    .and_then(|type_idx| free_function_at(tokens, type_idx, i).map(|n| (type_idx, n)));
                match found {
                    Some((type_idx, next)) => {
                        let scope =
                            frames.last().map(|f| f.qualified.clone()).unwrap_or_default();
                        let local =
                            !is_header || frames.last().map(|f| f.anon).unwrap_or(false);
                        record_function(tokens, type_idx, local, &scope, global_functions, locals);
                        i = next;
                    }
                    None => i += 1,
                }
            }
            _ => i += 1,
        }
    }
}

/// If `Type ... Name (` starting at `type_idx` (with the name at or after
/// `from`) is a free function declaration or definition, return the index
/// just past it (past the body for definitions, past the `;` for
/// declarations).
fn free_function_at(tokens: &[Token], type_idx: usize, from: usize) -> Option<usize> {
    let mut j = from.max(type_idx + 1);
    while tokens
        .get(j)
        .map(|t| matches!(t.kind, TokenKind::Star | TokenKind::Amp | TokenKind::Comment))
        .unwrap_or(false)
    {
        j += 1;
    }
    if !tokens.get(j).map(|t| t.is(TokenKind::Name)).unwrap_or(false) {
        return None;
    }
    let open = j + 1;
    if !tokens.get(open).map(|t| t.is(TokenKind::LParen)).unwrap_or(false) {
        return None;
    }
    let close = matching_close(tokens, open)?;
    match tokens.get(close + 1).map(|t| t.kind) {
        Some(TokenKind::Semi) => Some(close + 2),
        Some(TokenKind::LBrace) => {
            let body_close = matching_brace_close(tokens, close + 1)?;
            Some(body_close + 1)
        }
        _ => None,
    }
}

fn record_function(
    tokens: &mut [Token],
    type_idx: usize,
    local: bool,
    scope: &str,
    global_functions: &mut FxHashMap<String, Function>,
    locals: &mut FileSymbols,
) {
    let mut j = type_idx + 1;
    while tokens
        .get(j)
        .map(|t| matches!(t.kind, TokenKind::Star | TokenKind::Amp | TokenKind::Comment))
        .unwrap_or(false)
    {
        j += 1;
    }
    let ty = tokens[type_idx].clone();
    let Some(name_tok) = tokens.get_mut(j) else {
        return;
    };
    name_tok.kind = TokenKind::Function;
    let f = Function {
        name: name_tok.text.clone(),
        return_type: Some(ty),
        declaring_scope: scope.to_string(),
    };
    if local {
        locals.functions.insert(f.name.clone(), f);
    } else {
        global_functions.insert(f.name.clone(), f);
    }
}

/// Scan backward from a name index for a `Type` within the same statement.
fn backward_type(tokens: &[Token], name_idx: usize) -> Option<usize> {
    let mut k = name_idx;
    while k > 0 {
        k -= 1;
        match tokens[k].kind {
            TokenKind::Type => return Some(k),
            TokenKind::Semi
            | TokenKind::RBrace
            | TokenKind::ClassEnd
            | TokenKind::Header
            | TokenKind::Preprocessor => return None,
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize_text;
    use crate::passes::{normalize, scopes, scopes::ClassModelBuilder};
    use std::path::PathBuf;

    fn prepared(src: &str) -> (ClassModelBuilder, Vec<Token>) {
        let mut ts = tokenize_text(src);
        normalize::pass_one(&mut ts);
        normalize::pass_two(&mut ts);
        let mut builder = ClassModelBuilder::default();
        builder
            .scan_file(&PathBuf::from("test.h"), &mut ts)
            .unwrap();
        scopes::reclassify_class_names(&mut ts, &builder.classes);
        (builder, ts)
    }

    #[test]
    fn test_member_variables_recorded() {
        let (_, mut ts) = prepared(
            "class C { public: int count; static int total; mutable bool dirty_; void go(); };",
        );
        let mut vars = FxHashMap::default();
        extract_class_members(&mut ts, &mut vars);
        let names: Vec<_> = vars["C"].iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["count", "total", "dirty_"]);
        assert!(ts
            .iter()
            .any(|t| t.is(TokenKind::MemberVariable) && t.text == "count"));
    }

    #[test]
    fn test_comma_declarators_and_arrays() {
        let (_, mut ts) = prepared("class C { public: int a, b, buf[16]; };");
        let mut vars = FxHashMap::default();
        extract_class_members(&mut ts, &mut vars);
        let names: Vec<_> = vars["C"].iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "buf"]);
    }

    #[test]
    fn test_initializer_skipped() {
        let (_, mut ts) = prepared("class C { public: int x = compute(1, 2), y; };");
        let mut vars = FxHashMap::default();
        extract_class_members(&mut ts, &mut vars);
        let names: Vec<_> = vars["C"].iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["x", "y"]);
    }

    #[test]
    fn test_class_typed_member() {
        let (_, mut ts) = prepared("class Foo { }; class C { public: Foo f; Foo * p; };");
        let mut vars = FxHashMap::default();
        extract_class_members(&mut ts, &mut vars);
        let names: Vec<_> = vars["C"].iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["f", "p"]);
        assert_eq!(vars["C"][0].ty.text, "Foo");
    }

    #[test]
    fn test_method_body_locals_not_members() {
        let (_, mut ts) = prepared("class C { public: void go() { int local; } int real; };");
        let mut vars = FxHashMap::default();
        extract_class_members(&mut ts, &mut vars);
        let names: Vec<_> = vars["C"].iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["real"]);
    }

    #[test]
    fn test_backfill_return_type_from_definition() {
        let (b, mut ts) = prepared("class Foo { public: go(); }; int Foo::go() { return 1; }");
        let mut fns = b.class_functions;
        backfill_qualified_definitions(&mut ts, &mut fns);
        let f = fns["Foo"].iter().find(|f| f.name == "go").unwrap();
        assert_eq!(f.return_type.as_ref().unwrap().text, "int");
        // The definition-site name token is tagged for emission.
        let tagged = ts
            .iter()
            .filter(|t| t.is(TokenKind::MemberFunction) && t.text == "go")
            .count();
        assert_eq!(tagged, 2);
    }

    #[test]
    fn test_backfill_skips_static_call_sites() {
        let (b, mut ts) = prepared("class Foo { public: int go(); }; void f() { Foo::go(); }");
        let mut fns = b.class_functions;
        backfill_qualified_definitions(&mut ts, &mut fns);
        // `Foo::go();` has no body, so the call-site token keeps its kind.
        let tagged = ts
            .iter()
            .filter(|t| t.is(TokenKind::MemberFunction) && t.text == "go")
            .count();
        assert_eq!(tagged, 1);
    }

    #[test]
    fn test_destructor_definition_backfilled() {
        let (b, mut ts) = prepared("class Foo { public: ~Foo(); }; Foo::~Foo() { }");
        let mut fns = b.class_functions;
        backfill_qualified_definitions(&mut ts, &mut fns);
        assert!(ts
            .iter()
            .filter(|t| t.is(TokenKind::MemberFunction))
            .count() >= 2);
    }

    #[test]
    fn test_header_free_function_and_global() {
        let (_, mut ts) = prepared("int add(int a, int b); int counter = 0;");
        let mut globals = FxHashMap::default();
        let mut global_fns = FxHashMap::default();
        let mut locals = FileSymbols::default();
        extract_free_symbols(&mut ts, true, &mut globals, &mut global_fns, &mut locals);
        assert!(global_fns.contains_key("add"));
        assert_eq!(globals["counter"].ty.text, "int");
        assert!(ts.iter().any(|t| t.is(TokenKind::Function) && t.text == "add"));
        assert!(ts
            .iter()
            .any(|t| t.is(TokenKind::GlobalVariable) && t.text == "counter"));
    }

    #[test]
    fn test_static_and_cpp_declarations_are_local() {
        let (_, mut ts) = prepared("static int cached; int visible;");
        let mut globals = FxHashMap::default();
        let mut global_fns = FxHashMap::default();
        let mut locals = FileSymbols::default();
        extract_free_symbols(&mut ts, true, &mut globals, &mut global_fns, &mut locals);
        assert!(locals.variables.contains_key("cached"));
        assert!(globals.contains_key("visible"));

        let (_, mut ts) = prepared("int helper() { return 1; }");
        let mut locals = FileSymbols::default();
        extract_free_symbols(&mut ts, false, &mut globals, &mut global_fns, &mut locals);
        assert!(locals.functions.contains_key("helper"));
    }

    #[test]
    fn test_anonymous_namespace_is_local() {
        let (_, mut ts) = prepared("namespace { int hidden; } int open_var;");
        let mut globals = FxHashMap::default();
        let mut global_fns = FxHashMap::default();
        let mut locals = FileSymbols::default();
        extract_free_symbols(&mut ts, true, &mut globals, &mut global_fns, &mut locals);
        assert!(locals.variables.contains_key("hidden"));
        assert!(globals.contains_key("open_var"));
    }

    #[test]
    fn test_namespace_scope_recorded() {
        let (_, mut ts) = prepared("namespace app { int port; }");
        let mut globals = FxHashMap::default();
        let mut global_fns = FxHashMap::default();
        let mut locals = FileSymbols::default();
        extract_free_symbols(&mut ts, true, &mut globals, &mut global_fns, &mut locals);
        assert_eq!(globals["port"].declaring_scope, "app");
    }

    #[test]
    fn test_backward_type_scan_for_function() {
        let (_, mut ts) = prepared("int /* entry */ main() { return 0; }");
        let mut globals = FxHashMap::default();
        let mut global_fns = FxHashMap::default();
        let mut locals = FileSymbols::default();
        extract_free_symbols(&mut ts, false, &mut globals, &mut global_fns, &mut locals);
        let f = &locals.functions["main"];
        assert_eq!(f.return_type.as_ref().unwrap().text, "int");
    }

    #[test]
    fn test_function_bodies_not_scanned_for_globals() {
        let (_, mut ts) = prepared("void f() { int inner = 1; }");
        let mut globals = FxHashMap::default();
        let mut global_fns = FxHashMap::default();
        let mut locals = FileSymbols::default();
        extract_free_symbols(&mut ts, true, &mut globals, &mut global_fns, &mut locals);
        assert!(!globals.contains_key("inner"));
        assert!(!locals.variables.contains_key("inner"));
    }
}
