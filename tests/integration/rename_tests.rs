//! End-to-end rename planning and emission tests.

use std::fs;
use std::path::PathBuf;

use rustc_hash::FxHashSet;

use shroud::config::{Config, IgnoreList};
use shroud::rename::{self, RenameMode};
use shroud::Analyzed;

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

fn plan(analyzed: &mut Analyzed, ignores: &IgnoreList) -> Vec<rename::Occurrence> {
    let Analyzed { corpus, model } = analyzed;
    let file = &mut corpus.files[0];
    let locals = file.locals.clone();
    rename::classify_calls(&mut file.tokens, model, &locals, ignores);
    rename::collect_occurrences(file, model, ignores)
}

#[test]
fn test_declaration_and_definition_get_distinct_offsets() {
    let src = "class Foo { public: void bar(); };\nvoid Foo::bar() { }\n";
    let mut analyzed = analyze(&[("foo.cpp", src)]);
    let occurrences = plan(&mut analyzed, &IgnoreList::default());

    let mut offsets: Vec<usize> = occurrences.iter().map(|o| o.offset).collect();
    offsets.dedup();
    assert_eq!(offsets.len(), occurrences.len(), "offsets must be distinct");
    assert_eq!(occurrences.iter().filter(|o| o.name == "Foo").count(), 2);
    assert_eq!(occurrences.iter().filter(|o| o.name == "bar").count(), 2);

    let out = rename::apply_renames(src, &occurrences, &RenameMode::default());
    assert_eq!(out.matches("Foo_sh").count(), 2);
    assert_eq!(out.matches("bar_sh").count(), 2);
}

#[test]
fn test_occurrences_sorted_ascending() {
    let src = "class Foo { public: void bar(); void qux(); };\n\
               void Foo::bar() { qux(); }\nvoid Foo::qux() { }\n";
    let mut analyzed = analyze(&[("foo.cpp", src)]);
    let occurrences = plan(&mut analyzed, &IgnoreList::default());
    assert!(occurrences.windows(2).all(|w| w[0].offset < w[1].offset));
}

#[test]
fn test_marker_lands_inside_longer_identifiers_correctly() {
    let src = "class Foo { };\nFoo first;\nFoo second;\n";
    let mut analyzed = analyze(&[("foo.cpp", src)]);
    let occurrences = plan(&mut analyzed, &IgnoreList::default());
    let out = rename::apply_renames(src, &occurrences, &RenameMode::default());
    // Later offsets stay correct after the earlier insertions grew the text.
    assert!(out.contains("class Foo_sh { };"));
    assert!(out.contains("Foo_sh first;"));
    assert!(out.contains("Foo_sh second;"));
}

#[test]
fn test_hash_marker_is_stable_per_name() {
    let src = "class Foo { };\nFoo a;\nFoo b;\n";
    let mut analyzed = analyze(&[("foo.cpp", src)]);
    let occurrences = plan(&mut analyzed, &IgnoreList::default());
    let out = rename::apply_renames(src, &occurrences, &RenameMode::Hash);
    // All three sites get the same 8-hex-digit marker.
    let marker = out
        .split("Foo_")
        .nth(1)
        .map(|rest| &rest[..8])
        .unwrap()
        .to_string();
    assert!(marker.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(out.matches(&format!("Foo_{marker}")).count(), 3);
}

#[test]
fn test_smart_pointer_chain_call_renamed() {
    let src = "class Bar { public: void baz() { } };\n\
               void use() { std::vector<std::shared_ptr<Bar>> v; v[0]->baz(); }\n";
    let mut analyzed = analyze(&[("c.cpp", src)]);
    let occurrences = plan(&mut analyzed, &IgnoreList::default());
    assert!(occurrences.iter().any(|o| o.name == "baz"));
    let out = rename::apply_renames(src, &occurrences, &RenameMode::default());
    assert!(out.contains("v[0]->baz_sh();"));
    // The container and smart pointer names stay untouched.
    assert!(out.contains("std::vector<std::shared_ptr<Bar_sh>>"));
}

#[test]
fn test_qualified_ignore_suppresses_method() {
    let src = "class Foo { public: void bar() { } void keep() { } };\n\
               void use() { Foo f; f.bar(); f.keep(); }\n";
    let mut analyzed = analyze(&[("foo.cpp", src)]);
    let mut ignores = IgnoreList::default();
    ignores.add_function_entry("Foo::bar");
    let occurrences = plan(&mut analyzed, &ignores);
    assert!(!occurrences.iter().any(|o| o.name == "bar"));
    assert!(occurrences.iter().any(|o| o.name == "keep"));
}

#[test]
fn test_extern_declared_class_not_renamed() {
    let src = "class Canvas { public: void draw() { } };\n\
               class Own { public: void go() { } };\n\
               void use() { Canvas c; c.draw(); Own o; o.go(); }\n";
    let files = vec![(PathBuf::from("c.cpp"), src.to_string())];
    let mut extern_scopes = FxHashSet::default();
    extern_scopes.insert("Canvas".to_string());
    let mut analyzed = shroud::load_from_texts(files)
        .normalize()
        .expand_macros()
        .unwrap()
        .build_classes()
        .unwrap()
        .normalize_types()
        .unwrap()
        .extract_symbols(extern_scopes);
    let occurrences = plan(&mut analyzed, &IgnoreList::default());
    assert!(!occurrences
        .iter()
        .any(|o| o.name == "Canvas" || o.name == "draw"));
    assert!(occurrences.iter().any(|o| o.name == "Own"));
    assert!(occurrences.iter().any(|o| o.name == "go"));
}

#[test]
fn test_full_run_rewrites_files_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let header = dir.path().join("foo.h");
    let source = dir.path().join("foo.cpp");
    fs::write(&header, "class Foo { public: void bar(); };\n").unwrap();
    fs::write(&source, "void Foo::bar() { }\n").unwrap();

    let config = Config {
        files: vec![header.clone(), source.clone()],
        ignores: IgnoreList::default(),
        extern_scopes: FxHashSet::default(),
        mode: RenameMode::default(),
        dry_run: false,
    };
    let mut analyzed = shroud::analyze(&config).unwrap();
    let summary = shroud::plan_and_apply(&mut analyzed, &config).unwrap();
    assert_eq!(summary.renamed_files, 2);

    let h = fs::read_to_string(&header).unwrap();
    let c = fs::read_to_string(&source).unwrap();
    assert!(h.contains("class Foo_sh"));
    assert!(h.contains("bar_sh();"));
    assert!(c.contains("Foo_sh::bar_sh()"));
}
