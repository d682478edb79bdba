//! End-to-end pipeline tests: lexing through model construction.

use std::path::PathBuf;

use rustc_hash::FxHashSet;

use shroud::model::render_type;
use shroud::Analyzed;

/// Run the full pipeline over in-memory sources.
fn analyze(files: &[(&str, &str)]) -> Analyzed {
    let files = files
        .iter()
        .map(|(p, t)| (PathBuf::from(p), t.to_string()))
        .collect();
    shroud::load_from_texts(files)
        .normalize()
        .expand_macros()
        .unwrap()
        .build_classes()
        .unwrap()
        .normalize_types()
        .unwrap()
        .extract_symbols(FxHashSet::default())
}

// =============================================================================
// Lexer Offsets
// =============================================================================

#[test]
fn test_token_offsets_index_the_source_bytes() {
    let text = "class Foo {\n  int x_; // member\n};\nFoo make();\n";
    let analyzed = analyze(&[("foo.cpp", text)]);
    let file = &analyzed.corpus.files[0];
    for tok in &file.snapshot {
        if tok.text.is_empty() {
            continue;
        }
        let end = tok.source_offset + tok.text.len();
        assert!(end <= text.len(), "offset out of range for {:?}", tok);
        assert_eq!(
            &text[tok.source_offset..end],
            tok.text,
            "offset does not index the token's own bytes"
        );
    }
}

// =============================================================================
// Conditional Compilation
// =============================================================================

#[test]
fn test_ifdef_else_selects_the_defined_branch() {
    let analyzed = analyze(&[(
        "conf.h",
        "#define ENABLED 1\n\
         #ifdef ENABLED\n\
         #define ON 1\n\
         #else\n\
         #define OFF 1\n\
         #endif\n",
    )]);
    assert!(analyzed.model.macros.contains_key("ENABLED"));
    assert!(analyzed.model.macros.contains_key("ON"));
    assert!(!analyzed.model.macros.contains_key("OFF"));
}

#[test]
fn test_ifndef_selects_the_undefined_branch() {
    let analyzed = analyze(&[(
        "conf.h",
        "#ifndef MISSING\n\
         #define FALLBACK 1\n\
         #else\n\
         #define PRESENT 1\n\
         #endif\n",
    )]);
    assert!(analyzed.model.macros.contains_key("FALLBACK"));
    assert!(!analyzed.model.macros.contains_key("PRESENT"));
}

// =============================================================================
// Typedef Expansion
// =============================================================================

#[test]
fn test_typedef_expansion_is_order_independent() {
    let base = ("a.h", "typedef std::vector<int> IntVec;\n");
    let alias = ("b.h", "typedef IntVec Rows;\n");

    for order in [vec![base, alias], vec![alias, base]] {
        let analyzed = analyze(&order);
        let body = &analyzed.model.typedefs["Rows"];
        assert_eq!(body.len(), 1, "alias body should fold to one type token");
        assert_eq!(render_type(&body[0]), "vector<int>");
    }
}

#[test]
fn test_container_fold_survives_into_globals() {
    let analyzed = analyze(&[("g.h", "std::map<int, std::vector<long>> registry;\n")]);
    let var = &analyzed.model.globals["registry"];
    assert_eq!(render_type(&var.ty), "map<int, vector<long>>");
}

#[test]
fn test_namespace_globals_reach_the_model() {
    let analyzed = analyze(&[(
        "n.h",
        "namespace app { int port; }\nnamespace { int hidden; }\n",
    )]);
    // The first declaration after a namespace brace is still file scope.
    assert_eq!(analyzed.model.globals["port"].declaring_scope, "app");
    assert!(analyzed.corpus.files[0]
        .locals
        .variables
        .contains_key("hidden"));
}

// =============================================================================
// Class Model and Inheritance Closure
// =============================================================================

#[test]
fn test_base_closure_is_transitive() {
    let analyzed = analyze(&[(
        "h.h",
        "class A { public: void ping(); };\n\
         class B : public A { };\n\
         class C : public B { };\n",
    )]);
    let bases = &analyzed.model.bases["C"];
    assert!(bases.contains("A"));
    assert!(bases.contains("B"));
    // Inherited methods are visible on the leaf.
    assert!(analyzed.model.method_on("C", "ping").is_some());
    // A declares nothing above it.
    assert!(!analyzed.model.has_external_base("A"));
}

#[test]
fn test_undeclared_base_marks_descendants_external() {
    let analyzed = analyze(&[(
        "h.h",
        "class D : public QWidget { };\n\
         class E : public D { };\n",
    )]);
    assert!(analyzed.model.has_external_base("D"));
    assert!(analyzed.model.has_external_base("E"));
}

#[test]
fn test_children_closure_covers_descendants() {
    let analyzed = analyze(&[(
        "h.h",
        "class A { };\n\
         class B : public A { };\n\
         class C : public B { };\n",
    )]);
    let children = &analyzed.model.children["A"];
    assert!(children.contains("B"));
    assert!(children.contains("C"));
}

// =============================================================================
// Qualified Definitions
// =============================================================================

#[test]
fn test_qualified_definition_backfills_return_type() {
    let analyzed = analyze(&[
        ("foo.h", "class Foo { public:\n  bar();\n};\n"),
        ("foo.cpp", "int Foo::bar() { return 0; }\n"),
    ]);
    let method = analyzed.model.method_on("Foo", "bar").unwrap();
    let ret = method.return_type.as_ref().unwrap();
    assert_eq!(ret.text, "int");
}

#[test]
fn test_enum_names_are_recorded() {
    let analyzed = analyze(&[("e.h", "enum Color { Red, Green, Blue };\n")]);
    assert!(analyzed.model.enums.contains("Color"));
}
