//! Corpus-wide C/C++ symbol analysis and renaming.
//!
//! `shroud` lexes a set of C/C++ sources with a hand-built scanner, runs an
//! ordered sequence of semantic passes that build a cross-file model of
//! macros, classes, typedefs and symbols, then rewrites project-owned
//! identifiers in place with a distinguishing marker. Third-party and
//! standard-library names are never touched.
//!
//! The pass order is enforced by the type system: each stage consumes the
//! previous one, so a caller cannot classify calls against a model that has
//! not been built yet. See [`passes`] for the pipeline and [`plan_and_apply`]
//! for the end-to-end driver.

pub mod config;
pub mod error;
pub mod lexer;
pub mod model;
pub mod passes;
pub mod reader;
pub mod rename;
pub mod report;
pub mod resolve;
pub mod scan;

pub use error::{Result, ShroudError};
pub use passes::{load, load_from_texts, Analyzed, Corpus, SourceFile};

use tracing::{debug, info};

/// Outcome of a rename run.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunSummary {
    /// Files analyzed.
    pub files: usize,
    /// Files that received at least one rename.
    pub renamed_files: usize,
    /// Total identifier occurrences rewritten.
    pub occurrences: usize,
}

/// Run the whole pipeline over the configured files.
pub fn analyze(config: &config::Config) -> Result<Analyzed> {
    Ok(load(&config.files)?
        .normalize()
        .expand_macros()?
        .build_classes()?
        .normalize_types()?
        .extract_symbols(config.extern_scopes.clone()))
}

/// Classify calls in every file, then emit renames back to disk.
///
/// Occurrences are collected per file against the corpus-wide model, sorted
/// by source offset and applied with running length correction, so a file is
/// rewritten in a single pass regardless of marker length.
pub fn plan_and_apply(analyzed: &mut Analyzed, config: &config::Config) -> Result<RunSummary> {
    let Analyzed { corpus, model } = analyzed;
    let mut summary = RunSummary {
        files: corpus.files.len(),
        ..RunSummary::default()
    };
    for file in &mut corpus.files {
        if config.ignores.is_file_ignored(&file.path) {
            debug!(file = %file.path.display(), "ignored, skipping");
            continue;
        }
        rename::classify_calls(&mut file.tokens, model, &file.locals, &config.ignores);
        let occurrences = rename::collect_occurrences(file, model, &config.ignores);
        if occurrences.is_empty() {
            continue;
        }
        summary.renamed_files += 1;
        summary.occurrences += occurrences.len();
        info!(
            file = %file.path.display(),
            occurrences = occurrences.len(),
            "renames planned"
        );
        if !config.dry_run {
            let rewritten = rename::apply_renames(&file.text, &occurrences, &config.mode);
            std::fs::write(&file.path, rewritten)
                .map_err(|e| ShroudError::io_with_path(e, &file.path))?;
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rename::RenameMode;
    use rustc_hash::FxHashSet;
    use std::path::PathBuf;

    #[test]
    fn test_plan_dry_run_counts_occurrences() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foo.cpp");
        let text = "class Foo { public: void bar(); };\nvoid Foo::bar() { }\n";
        std::fs::write(&path, text).unwrap();
        let config = config::Config {
            files: vec![path.clone()],
            ignores: Default::default(),
            extern_scopes: FxHashSet::default(),
            mode: RenameMode::default(),
            dry_run: true,
        };
        let mut analyzed = analyze(&config).unwrap();
        let summary = plan_and_apply(&mut analyzed, &config).unwrap();
        assert_eq!(summary.files, 1);
        assert_eq!(summary.renamed_files, 1);
        assert!(summary.occurrences >= 4);
        // Dry run leaves the file untouched.
        assert_eq!(std::fs::read_to_string(&path).unwrap(), text);
    }

    #[test]
    fn test_plan_applies_suffix_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foo.cpp");
        std::fs::write(&path, "class Foo { };\nFoo f;\n").unwrap();
        let config = config::Config {
            files: vec![path.clone()],
            ignores: Default::default(),
            extern_scopes: FxHashSet::default(),
            mode: RenameMode::default(),
            dry_run: false,
        };
        let mut analyzed = analyze(&config).unwrap();
        plan_and_apply(&mut analyzed, &config).unwrap();
        let rewritten = std::fs::read_to_string(&path).unwrap();
        assert!(rewritten.contains("Foo_sh"));
        assert!(!rewritten.contains("Foo_sh_sh"));
    }

    #[test]
    fn test_ignored_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skip.cpp");
        std::fs::write(&path, "class Foo { };\n").unwrap();
        let mut ignores = config::IgnoreList::default();
        ignores.files.insert("skip.cpp".to_string());
        let config = config::Config {
            files: vec![path],
            ignores,
            extern_scopes: FxHashSet::default(),
            mode: RenameMode::default(),
            dry_run: false,
        };
        let mut analyzed = analyze(&config).unwrap();
        let summary = plan_and_apply(&mut analyzed, &config).unwrap();
        assert_eq!(summary.renamed_files, 0);
    }

    #[test]
    fn test_missing_input_reports_path() {
        let config = config::Config {
            files: vec![PathBuf::from("/no/such/file.cpp")],
            ignores: Default::default(),
            extern_scopes: FxHashSet::default(),
            mode: RenameMode::default(),
            dry_run: true,
        };
        let err = analyze(&config).unwrap_err();
        assert!(err.to_string().contains("file.cpp"));
    }
}
