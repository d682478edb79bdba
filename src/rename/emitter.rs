//! Offset-sorted rename emission.
//!
//! Occurrences are collected per file, sorted by source offset, deduplicated
//! on identical offsets (a destructor's name token and its class-name
//! snapshot occurrence share one), and applied with a running length
//! correction so later insertions land on the mutated text correctly.

use sha2::{Digest, Sha256};

use crate::config::IgnoreList;
use crate::lexer::TokenKind;
use crate::model::Model;
use crate::passes::SourceFile;
use crate::rename::{method_in_module, renameable_class_name};

/// What gets inserted after each occurrence.
#[derive(Debug, Clone)]
pub enum RenameMode {
    /// A fixed literal suffix.
    Suffix(String),
    /// A short content hash of the original identifier.
    Hash,
}

impl Default for RenameMode {
    fn default() -> Self {
        RenameMode::Suffix("_sh".to_string())
    }
}

/// One renameable identifier occurrence in the original text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    /// Byte offset of the identifier in the unmodified file.
    pub offset: usize,
    /// Byte length of the identifier.
    pub len: usize,
    pub name: String,
}

/// Collect every renameable occurrence in one file, sorted ascending by
/// offset with co-located duplicates dropped.
pub fn collect_occurrences(
    file: &SourceFile,
    model: &Model,
    ignores: &IgnoreList,
) -> Vec<Occurrence> {
    let mut occurrences = Vec::new();
    for tok in &file.tokens {
        let take = match tok.kind {
            TokenKind::Call | TokenKind::Function => !ignores.functions.contains(&tok.text),
            // Declaration sites go through the same test as call sites;
            // constructors and destructors ride the class-name path below.
            TokenKind::MemberFunction => tok
                .owner
                .as_deref()
                .map(|c| method_in_module(model, ignores, c, &tok.text))
                .unwrap_or(false),
            _ => false,
        };
        if take {
            occurrences.push(Occurrence {
                offset: tok.source_offset,
                len: tok.text.len(),
                name: tok.text.clone(),
            });
        }
    }
    // Raw class-name occurrences come from the pre-semantic snapshot; the
    // live stream has absorbed template arguments and spliced macro bodies
    // by now.
    for tok in &file.snapshot {
        if tok.is(TokenKind::Name) && renameable_class_name(model, ignores, &tok.text) {
            occurrences.push(Occurrence {
                offset: tok.source_offset,
                len: tok.text.len(),
                name: tok.text.clone(),
            });
        }
    }
    occurrences.sort_by_key(|o| o.offset);
    occurrences.dedup_by_key(|o| o.offset);
    occurrences
}

fn marker(mode: &RenameMode, name: &str) -> String {
    match mode {
        RenameMode::Suffix(s) => s.clone(),
        RenameMode::Hash => {
            let digest = Sha256::digest(name.as_bytes());
            let mut out = String::with_capacity(9);
            out.push('_');
            for b in &digest[..4] {
                out.push_str(&format!("{b:02x}"));
            }
            out
        }
    }
}

/// Apply the sorted occurrence list to the original text, inserting the
/// marker immediately after each identifier.
pub fn apply_renames(text: &str, occurrences: &[Occurrence], mode: &RenameMode) -> String {
    let mut out = String::with_capacity(text.len() + occurrences.len() * 4);
    let mut last = 0usize;
    for occ in occurrences {
        let end = occ.offset + occ.len;
        if end > text.len() || occ.offset < last {
            continue;
        }
        out.push_str(&text[last..end]);
        out.push_str(&marker(mode, &occ.name));
        last = end;
    }
    out.push_str(&text[last..]);
    out
}
