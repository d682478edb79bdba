//! Typedef expansion, enum tagging, and container folding.
//!
//! Runs after the class model is complete. Typedef aliases are expanded to
//! fixpoint (bodies against each other first, then every occurrence in the
//! corpus); enum names become recognized types; recognized `std`/`boost`
//! container templates fold into a single structured `Type` token whose
//! children are the element types, recursively. Folded containers are what
//! the resolution engine later projects through (`vector` to its element,
//! `map` to its value, smart pointers to their pointee).

use std::path::Path;

use phf::phf_set;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{Result, ShroudError};
use crate::lexer::{matching_close, Token, TokenKind};

/// Containers recognized under `std`/`boost` qualification.
pub static CONTAINERS: phf::Set<&'static str> = phf_set! {
    "vector", "deque", "queue", "stack", "list", "set", "map", "pair",
    "auto_ptr", "shared_ptr", "weak_ptr", "unique_ptr",
};

/// Smart pointers: one level of unwrapping on `->` and `.lock()`.
pub static SMART_POINTERS: phf::Set<&'static str> = phf_set! {
    "auto_ptr", "shared_ptr", "weak_ptr", "unique_ptr",
};

/// Collect `typedef ... NAME;` aliases from one file.
///
/// The span between the `typedef` keyword and the trailing declared name is
/// the alias body. Redefining a name with a *different* body is a fatal
/// inconsistency: the table is scope-insensitive, and continuing would
/// silently corrupt every later type lookup.
pub fn collect_typedefs(
    file: &Path,
    tokens: &[Token],
    typedefs: &mut FxHashMap<String, Vec<Token>>,
) -> Result<()> {
    let mut i = 0;
    while i < tokens.len() {
        if !tokens[i].is_text(TokenKind::Keyword, "typedef") {
            i += 1;
            continue;
        }
        let Some(semi) = tokens[i..].iter().position(|t| t.is(TokenKind::Semi)) else {
            return Err(ShroudError::structure(file, "typedef without terminator"));
        };
        let semi = i + semi;
        // Trailing declared name: the last name-ish token before `;`.
        let name_idx = (i + 1..semi)
            .rev()
            .find(|&k| matches!(tokens[k].kind, TokenKind::Name | TokenKind::Type));
        let Some(name_idx) = name_idx else {
            i = semi + 1;
            continue;
        };
        let name = tokens[name_idx].text.clone();
        let body: Vec<Token> = tokens[i + 1..name_idx].to_vec();
        if let Some(existing) = typedefs.get(&name) {
            if !bodies_equal(existing, &body) {
                return Err(ShroudError::structure(
                    file,
                    format!("typedef {name} redefined with a different body"),
                ));
            }
        } else {
            typedefs.insert(name, body);
        }
        i = semi + 1;
    }
    Ok(())
}

fn bodies_equal(a: &[Token], b: &[Token]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b.iter())
            .all(|(x, y)| x.kind == y.kind && x.text == y.text)
}

/// Expand alias bodies against each other to fixpoint.
///
/// The alias graph is acyclic by construction (conflicting redefinitions
/// abort), but the iteration is still bounded: a pass count exceeding the
/// table size means a cycle slipped through, which is fatal.
pub fn expand_typedef_bodies(typedefs: &mut FxHashMap<String, Vec<Token>>) -> Result<()> {
    let limit = typedefs.len() + 1;
    for _ in 0..=limit {
        let names: Vec<String> = typedefs.keys().cloned().collect();
        let mut changed = false;
        for name in &names {
            let body = typedefs[name].clone();
            let mut expanded: Vec<Token> = Vec::with_capacity(body.len());
            for tok in body {
                let alias = tok.is(TokenKind::Name) && tok.text != *name;
                match (alias, typedefs.get(&tok.text)) {
                    (true, Some(alias_body)) => {
                        changed = true;
                        expanded.extend(alias_body.iter().cloned());
                    }
                    _ => expanded.push(tok),
                }
            }
            typedefs.insert(name.clone(), expanded);
        }
        if !changed {
            return Ok(());
        }
    }
    Err(ShroudError::structure(
        Path::new("<corpus>"),
        "typedef alias cycle",
    ))
}

/// Replace every alias occurrence in the stream with its expanded body,
/// skipping the `typedef` declaration sites themselves.
pub fn expand_typedefs_in_stream(
    tokens: &mut Vec<Token>,
    typedefs: &FxHashMap<String, Vec<Token>>,
) {
    let mut i = 0;
    while i < tokens.len() {
        if tokens[i].is_text(TokenKind::Keyword, "typedef") {
            // Skip the declaration through its semicolon.
            while i < tokens.len() && !tokens[i].is(TokenKind::Semi) {
                i += 1;
            }
            i += 1;
            continue;
        }
        if tokens[i].is(TokenKind::Name) {
            if let Some(body) = typedefs.get(&tokens[i].text) {
                let offset = tokens[i].source_offset;
                let spliced: Vec<Token> = body
                    .iter()
                    .map(|t| {
                        let mut c = t.clone();
                        c.source_offset = offset;
                        c
                    })
                    .collect();
                let n = spliced.len();
                tokens.splice(i..=i, spliced);
                i += n;
                continue;
            }
        }
        i += 1;
    }
}

/// Record `enum NAME` (and `enum class NAME`) declarations, tagging the
/// declaration-site name.
pub fn collect_enums(tokens: &mut [Token], enums: &mut FxHashSet<String>) {
    let mut i = 0;
    while i + 1 < tokens.len() {
        if tokens[i].is_text(TokenKind::Keyword, "enum") {
            let mut j = i + 1;
            if tokens[j].is_text(TokenKind::Keyword, "class")
                || tokens[j].is_text(TokenKind::Keyword, "struct")
            {
                j += 1;
            }
            if j < tokens.len() && tokens[j].is(TokenKind::Name) {
                enums.insert(tokens[j].text.clone());
                tokens[j].kind = TokenKind::Enum;
            }
            i = j;
        }
        i += 1;
    }
}

/// Reclassify later occurrences of known enum names to `Type`.
pub fn tag_enum_occurrences(tokens: &mut [Token], enums: &FxHashSet<String>) {
    for tok in tokens.iter_mut() {
        if tok.is(TokenKind::Name) && enums.contains(&tok.text) {
            tok.kind = TokenKind::Type;
        }
    }
}

/// Collapse `decltype( expr )` into one `Type` token carrying the expression
/// tokens as children.
pub fn collapse_decltype(tokens: &mut Vec<Token>) {
    let mut i = 0;
    while i < tokens.len() {
        if tokens[i].is_text(TokenKind::Keyword, "decltype")
            && tokens.get(i + 1).map(|t| t.is(TokenKind::LParen)).unwrap_or(false)
        {
            if let Some(close) = matching_close(tokens, i + 1) {
                let offset = tokens[i].source_offset;
                let inner: Vec<Token> = tokens[i + 2..close].to_vec();
                let mut ty = Token::new(TokenKind::Type, "decltype", offset);
                ty.children = inner;
                tokens.splice(i..=close, [ty]);
            }
        }
        i += 1;
    }
}

/// Fold recognized `std`/`boost` container occurrences into structured
/// `Type` tokens, recursively. `NS::NAME<ARGS>` becomes one token named
/// `NAME` whose children are the element types; a following
/// `::iterator`/`::const_iterator` wraps the result in a dedicated
/// `iterator` type whose single child is the container.
pub fn fold_containers(tokens: &mut Vec<Token>) {
    let mut i = 0;
    while i < tokens.len() {
        if !is_container_head(tokens, i) {
            i += 1;
            continue;
        }
        let name_idx = i + 2;
        let open = name_idx + 1;
        if !tokens.get(open).map(|t| t.is(TokenKind::LAngle)).unwrap_or(false) {
            i += 1;
            continue;
        }
        let Some(close) = matching_close(tokens, open) else {
            // `<` that is really a comparison; leave it alone.
            i += 1;
            continue;
        };
        let offset = tokens[i].source_offset;
        let name = tokens[name_idx].text.clone();
        let mut inner: Vec<Token> = tokens[open + 1..close].to_vec();
        fold_containers(&mut inner);
        let children: Vec<Token> = split_arguments(&inner)
            .into_iter()
            .map(argument_to_child)
            .collect();
        let mut folded = Token::new(TokenKind::Type, name, offset);
        folded.children = children;
        tokens.splice(i..=close, [folded]);

        // `::iterator` suffix on the folded container.
        if tokens.get(i + 1).map(|t| t.is(TokenKind::Scope)).unwrap_or(false)
            && tokens
                .get(i + 2)
                .map(|t| {
                    matches!(t.kind, TokenKind::Name)
                        && (t.text == "iterator" || t.text == "const_iterator")
                })
                .unwrap_or(false)
        {
            let container = tokens[i].clone();
            let mut iter = Token::new(TokenKind::Type, "iterator", offset);
            iter.children = vec![container];
            tokens.splice(i..=i + 2, [iter]);
        }
        i += 1;
    }
}

fn is_container_head(tokens: &[Token], i: usize) -> bool {
    let ns = match tokens.get(i) {
        Some(t) if t.is(TokenKind::Name) => t.text == "std" || t.text == "boost",
        _ => false,
    };
    ns && tokens.get(i + 1).map(|t| t.is(TokenKind::Scope)).unwrap_or(false)
        && tokens
            .get(i + 2)
            .map(|t| t.is(TokenKind::Name) && CONTAINERS.contains(t.text.as_str()))
            .unwrap_or(false)
}

/// Split template arguments at top-level commas, counting bracket depth so
/// nested unfolded templates and parenthesized shapes stay whole.
fn split_arguments(inner: &[Token]) -> Vec<Vec<Token>> {
    let mut args = Vec::new();
    let mut current = Vec::new();
    let mut depth = 0i32;
    for tok in inner {
        match tok.kind {
            TokenKind::LAngle | TokenKind::LParen | TokenKind::LBracket => depth += 1,
            TokenKind::RAngle | TokenKind::RParen | TokenKind::RBracket => depth -= 1,
            TokenKind::Comma if depth == 0 => {
                args.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(tok.clone());
    }
    if !current.is_empty() {
        args.push(current);
    }
    args
}

/// Reduce one argument's token run to a single child token. A lone token is
/// kept as-is (a folded container, a class type, a builtin); anything longer
/// is preserved verbatim as an opaque `Type` whose text concatenates the
/// run, keeping pointer/reference markers, array brackets, and scope
/// qualifiers.
fn argument_to_child(arg: Vec<Token>) -> Token {
    if let [tok] = arg.as_slice() {
        let mut tok = tok.clone();
        if tok.is(TokenKind::Name) {
            tok.kind = TokenKind::Type;
        }
        return tok;
    }
    let offset = arg.first().map(|t| t.source_offset).unwrap_or(0);
    let mut text = String::new();
    for (i, tok) in arg.iter().enumerate() {
        let needs_space = i > 0
            && text.chars().last().is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
            && tok.text.chars().next().is_some_and(|c| c.is_ascii_alphanumeric() || c == '_');
        if needs_space {
            text.push(' ');
        }
        text.push_str(&tok.text);
    }
    Token::new(TokenKind::Type, text, offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize_text;
    use crate::passes::normalize;
    use std::path::PathBuf;

    fn prepared(src: &str) -> Vec<Token> {
        let mut ts = tokenize_text(src);
        normalize::pass_one(&mut ts);
        normalize::pass_two(&mut ts);
        ts
    }

    fn file() -> PathBuf {
        PathBuf::from("test.h")
    }

    #[test]
    fn test_typedef_collection() {
        let ts = prepared("typedef unsigned long ulong;");
        let mut table = FxHashMap::default();
        collect_typedefs(&file(), &ts, &mut table).unwrap();
        assert_eq!(table["ulong"].len(), 1);
        assert_eq!(table["ulong"][0].text, "unsigned long");
    }

    #[test]
    fn test_typedef_conflicting_redefinition_fatal() {
        let ts = prepared("typedef int handle; typedef long handle;");
        let mut table = FxHashMap::default();
        assert!(collect_typedefs(&file(), &ts, &mut table).is_err());
    }

    #[test]
    fn test_typedef_identical_redefinition_allowed() {
        let ts = prepared("typedef int handle; typedef int handle;");
        let mut table = FxHashMap::default();
        assert!(collect_typedefs(&file(), &ts, &mut table).is_ok());
    }

    #[test]
    fn test_typedef_chain_expands_to_fixpoint() {
        let ts = prepared("typedef int base_t; typedef base_t mid_t; typedef mid_t top_t;");
        let mut table = FxHashMap::default();
        collect_typedefs(&file(), &ts, &mut table).unwrap();
        expand_typedef_bodies(&mut table).unwrap();
        assert_eq!(table["top_t"][0].text, "int");
        assert_eq!(table["mid_t"][0].text, "int");
    }

    #[test]
    fn test_occurrence_expansion_skips_declaration_sites() {
        let mut ts = prepared("typedef int handle; handle h;");
        let mut table = FxHashMap::default();
        collect_typedefs(&file(), &ts, &mut table).unwrap();
        expand_typedef_bodies(&mut table).unwrap();
        expand_typedefs_in_stream(&mut ts, &table);
        // Declaration keeps its alias name; the use site became `int`.
        let texts: Vec<_> = ts.iter().map(|t| t.text.as_str()).collect();
        assert!(texts.windows(2).any(|w| w == ["int", "handle"]));
        assert!(texts.windows(2).any(|w| w == ["int", "h"]));
    }

    #[test]
    fn test_enum_collection_and_tagging() {
        let mut ts = prepared("enum Color { Red }; Color c;");
        let mut enums = FxHashSet::default();
        collect_enums(&mut ts, &mut enums);
        assert!(enums.contains("Color"));
        tag_enum_occurrences(&mut ts, &enums);
        let uses: Vec<_> = ts
            .iter()
            .filter(|t| t.text == "Color")
            .map(|t| t.kind)
            .collect();
        assert_eq!(uses, vec![TokenKind::Enum, TokenKind::Type]);
    }

    #[test]
    fn test_decltype_collapse() {
        let mut ts = prepared("decltype(a + b) v;");
        collapse_decltype(&mut ts);
        let ty = &ts[0];
        assert_eq!(ty.kind, TokenKind::Type);
        assert_eq!(ty.text, "decltype");
        assert_eq!(ty.children.len(), 3);
    }

    #[test]
    fn test_simple_container_folding() {
        let mut ts = prepared("std::vector<int> v;");
        fold_containers(&mut ts);
        let ty = &ts[0];
        assert_eq!(ty.kind, TokenKind::Type);
        assert_eq!(ty.text, "vector");
        assert_eq!(ty.children.len(), 1);
        assert_eq!(ty.children[0].text, "int");
    }

    #[test]
    fn test_nested_container_folding() {
        let mut ts = prepared("std::vector<std::shared_ptr<Bar>> v;");
        fold_containers(&mut ts);
        let ty = &ts[0];
        assert_eq!(ty.text, "vector");
        let inner = &ty.children[0];
        assert_eq!(inner.text, "shared_ptr");
        assert_eq!(inner.children[0].text, "Bar");
    }

    #[test]
    fn test_map_two_arguments() {
        let mut ts = prepared("std::map<int, std::vector<long>> m;");
        fold_containers(&mut ts);
        let ty = &ts[0];
        assert_eq!(ty.text, "map");
        assert_eq!(ty.children.len(), 2);
        assert_eq!(ty.children[0].text, "int");
        assert_eq!(ty.children[1].text, "vector");
    }

    #[test]
    fn test_iterator_suffix_wraps_container() {
        let mut ts = prepared("std::vector<int>::iterator it;");
        fold_containers(&mut ts);
        let ty = &ts[0];
        assert_eq!(ty.text, "iterator");
        assert_eq!(ty.children[0].text, "vector");
    }

    #[test]
    fn test_pointer_marker_preserved_in_argument() {
        let mut ts = prepared("std::vector<Foo*> v;");
        fold_containers(&mut ts);
        let ty = &ts[0];
        assert_eq!(ty.children[0].text, "Foo*");
    }

    #[test]
    fn test_boost_qualification_recognized() {
        let mut ts = prepared("boost::shared_ptr<Bar> p;");
        fold_containers(&mut ts);
        assert_eq!(ts[0].text, "shared_ptr");
    }

    #[test]
    fn test_unrecognized_template_left_alone() {
        let mut ts = prepared("custom::thing<int> t;");
        let before = ts.len();
        fold_containers(&mut ts);
        assert_eq!(ts.len(), before);
    }
}
