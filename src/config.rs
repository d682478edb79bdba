//! Run configuration: file lists, ignore lists, extern type descriptions.
//!
//! All of these are collaborator-provided inputs. A missing or unreadable
//! configuration file aborts before any analysis begins.

use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;
use serde::Serialize;
use tracing::debug;

use crate::error::{Result, ShroudError};
use crate::lexer::{tokenize_text, Token, TokenKind};
use crate::passes::normalize;
use crate::passes::scopes::join_scope;
use crate::rename::RenameMode;

/// A `Class::Scope::Function` exclusion. An empty scope matches any scope.
#[derive(Debug, Clone, Serialize)]
pub struct QualifiedIgnore {
    pub class: String,
    pub scope: String,
    pub function: String,
}

/// Names excluded from renaming, each list loaded from its own file.
#[derive(Debug, Default, Clone)]
pub struct IgnoreList {
    pub files: FxHashSet<String>,
    pub classes: FxHashSet<String>,
    pub functions: FxHashSet<String>,
    pub qualified: Vec<QualifiedIgnore>,
}

impl IgnoreList {
    pub fn matches_qualified(&self, class: &str, scope: &str, function: &str) -> bool {
        self.qualified.iter().any(|q| {
            q.class == class
                && q.function == function
                && (q.scope.is_empty() || q.scope == scope)
        })
    }

    pub fn is_file_ignored(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .map(|n| self.files.contains(n))
            .unwrap_or(false)
    }

    pub fn load_files(&mut self, path: &Path) -> Result<()> {
        for line in read_lines(path)? {
            self.files.insert(line);
        }
        Ok(())
    }

    pub fn load_classes(&mut self, path: &Path) -> Result<()> {
        for line in read_lines(path)? {
            self.classes.insert(line);
        }
        Ok(())
    }

    /// Function exclusions: a plain name, or a `Class::Function` /
    /// `Class::Scope::Function` qualified form.
    pub fn load_functions(&mut self, path: &Path) -> Result<()> {
        for line in read_lines(path)? {
            self.add_function_entry(&line);
        }
        Ok(())
    }

    pub fn add_function_entry(&mut self, entry: &str) {
        let parts: Vec<&str> = entry.split("::").collect();
        match parts.as_slice() {
            [single] => {
                self.functions.insert((*single).to_string());
            }
            [owner, function] => self.qualified.push(QualifiedIgnore {
                class: (*owner).to_string(),
                scope: String::new(),
                function: (*function).to_string(),
            }),
            [owner, scope @ .., function] => self.qualified.push(QualifiedIgnore {
                class: (*owner).to_string(),
                scope: scope.join("::"),
                function: (*function).to_string(),
            }),
            [] => {}
        }
    }
}

/// Everything one run needs.
#[derive(Debug)]
pub struct Config {
    pub files: Vec<PathBuf>,
    pub ignores: IgnoreList,
    pub extern_scopes: FxHashSet<String>,
    pub mode: RenameMode,
    /// Plan and report without rewriting any file.
    pub dry_run: bool,
}

fn read_lines(path: &Path) -> Result<Vec<String>> {
    let text =
        std::fs::read_to_string(path).map_err(|e| ShroudError::io_with_path(e, path))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Read a file-list file: one source path per line, blank lines and `#`
/// comments skipped.
pub fn read_file_list(path: &Path) -> Result<Vec<PathBuf>> {
    let lines = read_lines(path)?;
    if lines.is_empty() {
        return Err(ShroudError::Config(format!(
            "file list {} names no sources",
            path.display()
        )));
    }
    Ok(lines.into_iter().map(PathBuf::from).collect())
}

/// Parse an extern-type description file. It uses the same brace-nested
/// scope syntax as source code; every namespace and class name it declares
/// is a known-foreign type tree.
pub fn parse_extern_types(path: &Path) -> Result<FxHashSet<String>> {
    let text =
        std::fs::read_to_string(path).map_err(|e| ShroudError::io_with_path(e, path))?;
    Ok(parse_extern_types_text(&text))
}

pub fn parse_extern_types_text(text: &str) -> FxHashSet<String> {
    let mut tokens: Vec<Token> = tokenize_text(text);
    normalize::pass_one(&mut tokens);
    normalize::pass_two(&mut tokens);

    let mut scopes = FxHashSet::default();
    let mut stack: Vec<String> = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        match tokens[i].kind {
            TokenKind::Keyword
                if matches!(tokens[i].text.as_str(), "namespace" | "class" | "struct") =>
            {
                if let Some(name) = tokens.get(i + 1).filter(|t| t.is(TokenKind::Name)) {
                    let parent = stack.last().map(String::as_str).unwrap_or("");
                    let qualified = join_scope(parent, &name.text);
                    scopes.insert(name.text.clone());
                    scopes.insert(qualified.clone());
                    if tokens.get(i + 2).map(|t| t.is(TokenKind::LBrace)).unwrap_or(false) {
                        stack.push(qualified);
                        i += 3;
                        continue;
                    }
                    i += 2;
                    continue;
                }
                i += 1;
            }
            TokenKind::RBrace => {
                stack.pop();
                i += 1;
            }
            _ => i += 1,
        }
    }
    debug!(scopes = scopes.len(), "extern type tree parsed");
    scopes
}
