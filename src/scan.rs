//! Source discovery under root directories.
//!
//! Walks each root with gitignore-aware traversal and keeps files with a
//! C/C++ extension. Deterministic: results are sorted by path.

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use tracing::{debug, warn};

use crate::error::{Result, ShroudError};

/// Extensions accepted as C/C++ sources and headers.
pub const SOURCE_EXTENSIONS: &[&str] = &["c", "cc", "cpp", "cxx", "h", "hh", "hpp", "hxx"];

/// Walk statistics for reporting.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScanStats {
    pub matched: usize,
    pub skipped: usize,
}

fn is_source(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SOURCE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Collect every C/C++ source under the given roots.
pub fn collect_sources(roots: &[PathBuf]) -> Result<(Vec<PathBuf>, ScanStats)> {
    let mut files = Vec::new();
    let mut stats = ScanStats::default();
    for root in roots {
        if !root.exists() {
            return Err(ShroudError::Config(format!(
                "source root {} does not exist",
                root.display()
            )));
        }
        for entry in WalkBuilder::new(root).build() {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!(error = %e, "walk error, entry skipped");
                    continue;
                }
            };
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            if is_source(entry.path()) {
                stats.matched += 1;
                files.push(entry.into_path());
            } else {
                stats.skipped += 1;
            }
        }
    }
    files.sort();
    files.dedup();
    debug!(matched = stats.matched, skipped = stats.skipped, "scan complete");
    Ok((files, stats))
}
