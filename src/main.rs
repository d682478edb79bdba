//! Command line entry point.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use rustc_hash::FxHashSet;
use tracing_subscriber::EnvFilter;

use shroud::config::{self, Config, IgnoreList};
use shroud::rename::RenameMode;
use shroud::report::{self, ReportFormat};
use shroud::scan;

#[derive(Parser)]
#[command(
    name = "shroud",
    version,
    about = "Rename project-owned C/C++ symbols corpus-wide",
    long_about = "Analyzes a C/C++ corpus, builds a cross-file symbol model and \
                  rewrites project-owned identifiers in place with a marker. \
                  Standard-library and third-party names are left alone."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze the corpus and rewrite symbols in place
    Rename {
        /// File listing sources to process, one path per line
        #[arg(short, long)]
        file_list: Option<PathBuf>,

        /// Directory to scan for C/C++ sources (repeatable)
        #[arg(short, long)]
        root: Vec<PathBuf>,

        /// File listing file names to skip
        #[arg(long)]
        ignore_files: Option<PathBuf>,

        /// File listing class names to skip
        #[arg(long)]
        ignore_classes: Option<PathBuf>,

        /// File listing function names to skip, plain or Class::Scope::Fn
        #[arg(long)]
        ignore_functions: Option<PathBuf>,

        /// C/C++ header describing external namespaces and classes
        #[arg(long)]
        extern_types: Option<PathBuf>,

        /// Use a per-name hash marker instead of a fixed suffix
        #[arg(long)]
        hash: bool,

        /// Marker appended to renamed symbols
        #[arg(long, default_value = "_sh")]
        suffix: String,

        /// Plan and report without writing any file
        #[arg(long)]
        dry_run: bool,
    },
    /// Analyze the corpus and dump the symbol model
    Report {
        /// File listing sources to process, one path per line
        #[arg(short, long)]
        file_list: Option<PathBuf>,

        /// Directory to scan for C/C++ sources (repeatable)
        #[arg(short, long)]
        root: Vec<PathBuf>,

        /// C/C++ header describing external namespaces and classes
        #[arg(long)]
        extern_types: Option<PathBuf>,

        /// Emit the report as JSON
        #[arg(long)]
        json: bool,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn gather_inputs(file_list: Option<&PathBuf>, roots: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if let Some(list) = file_list {
        files.extend(config::read_file_list(list)?);
    }
    if !roots.is_empty() {
        let (scanned, stats) = scan::collect_sources(roots)?;
        tracing::info!(matched = stats.matched, "sources discovered");
        files.extend(scanned);
    }
    if files.is_empty() {
        bail!("no input: pass --file-list and/or --root");
    }
    files.sort();
    files.dedup();
    Ok(files)
}

fn load_extern_scopes(path: Option<&PathBuf>) -> anyhow::Result<FxHashSet<String>> {
    match path {
        Some(p) => Ok(config::parse_extern_types(p)?),
        None => Ok(FxHashSet::default()),
    }
}

fn cmd_rename(
    file_list: Option<PathBuf>,
    roots: Vec<PathBuf>,
    ignore_files: Option<PathBuf>,
    ignore_classes: Option<PathBuf>,
    ignore_functions: Option<PathBuf>,
    extern_types: Option<PathBuf>,
    hash: bool,
    suffix: String,
    dry_run: bool,
) -> anyhow::Result<()> {
    let mut ignores = IgnoreList::default();
    if let Some(p) = &ignore_files {
        ignores.load_files(p)?;
    }
    if let Some(p) = &ignore_classes {
        ignores.load_classes(p)?;
    }
    if let Some(p) = &ignore_functions {
        ignores.load_functions(p)?;
    }
    let config = Config {
        files: gather_inputs(file_list.as_ref(), &roots)?,
        ignores,
        extern_scopes: load_extern_scopes(extern_types.as_ref())?,
        mode: if hash {
            RenameMode::Hash
        } else {
            RenameMode::Suffix(suffix)
        },
        dry_run,
    };

    let mut analyzed = shroud::analyze(&config).context("analysis failed")?;
    let summary = shroud::plan_and_apply(&mut analyzed, &config)?;
    println!(
        "{} occurrence(s) across {} of {} file(s){}",
        summary.occurrences,
        summary.renamed_files,
        summary.files,
        if dry_run { " (dry run)" } else { "" }
    );
    Ok(())
}

fn cmd_report(
    file_list: Option<PathBuf>,
    roots: Vec<PathBuf>,
    extern_types: Option<PathBuf>,
    json: bool,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let config = Config {
        files: gather_inputs(file_list.as_ref(), &roots)?,
        ignores: IgnoreList::default(),
        extern_scopes: load_extern_scopes(extern_types.as_ref())?,
        mode: RenameMode::default(),
        dry_run: true,
    };
    let analyzed = shroud::analyze(&config).context("analysis failed")?;
    let format = if json {
        ReportFormat::Json
    } else {
        ReportFormat::Text
    };
    match output {
        Some(path) => {
            let mut file = std::fs::File::create(&path)
                .with_context(|| format!("cannot create {}", path.display()))?;
            report::write_report(&analyzed, format, &mut file)?;
        }
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            report::write_report(&analyzed, format, &mut lock)?;
            lock.flush()?;
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Rename {
            file_list,
            root,
            ignore_files,
            ignore_classes,
            ignore_functions,
            extern_types,
            hash,
            suffix,
            dry_run,
        } => cmd_rename(
            file_list,
            root,
            ignore_files,
            ignore_classes,
            ignore_functions,
            extern_types,
            hash,
            suffix,
            dry_run,
        )?,
        Commands::Report {
            file_list,
            root,
            extern_types,
            json,
            output,
        } => cmd_report(file_list, root, extern_types, json, output)?,
    }

    Ok(())
}
