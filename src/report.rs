//! Cross-reference report emission.
//!
//! One tagged-token dump per analyzed file, plus corpus-wide tables:
//! macros, classes with base and child lists, class functions with access
//! and return type, class variables, enums, expanded typedefs, globals,
//! global functions, and the per-file local tables. Text is the default;
//! JSON carries the same data for tooling.

use std::io::Write;

use serde::Serialize;

use crate::error::Result;
use crate::model::{render_type, Access, Model};
use crate::passes::{Analyzed, Corpus, SourceFile};

/// Report output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
}

fn access_label(access: Access) -> &'static str {
    match access {
        Access::Public => "public",
        Access::Protected => "protected",
        Access::Private => "private",
    }
}

/// Dump one file's tagged tokens, one per line.
pub fn write_token_dump(file: &SourceFile, w: &mut impl Write) -> Result<()> {
    writeln!(w, "== tokens: {}", file.path.display())?;
    for tok in &file.tokens {
        match &tok.owner {
            Some(owner) => writeln!(
                w,
                "{:>8}  {:<16} {:<24} owner={}",
                tok.source_offset,
                format!("{:?}", tok.kind),
                tok.text,
                owner
            )?,
            None => writeln!(
                w,
                "{:>8}  {:<16} {}",
                tok.source_offset,
                format!("{:?}", tok.kind),
                tok.text
            )?,
        }
    }
    Ok(())
}

fn sorted<'a, I: Iterator<Item = &'a String>>(keys: I) -> Vec<&'a String> {
    let mut v: Vec<&String> = keys.collect();
    v.sort();
    v
}

/// Write the corpus-wide cross-reference tables as text.
pub fn write_model_report(model: &Model, w: &mut impl Write) -> Result<()> {
    writeln!(w, "== macros")?;
    for name in sorted(model.macros.keys()) {
        writeln!(w, "  {name}")?;
    }

    writeln!(w, "== classes")?;
    for name in sorted(model.classes.keys()) {
        let class = &model.classes[name.as_str()];
        let bases: Vec<&String> = model
            .bases
            .get(name.as_str())
            .map(|s| sorted(s.iter()))
            .unwrap_or_default();
        let children: Vec<&String> = model
            .children
            .get(name.as_str())
            .map(|s| sorted(s.iter()))
            .unwrap_or_default();
        writeln!(
            w,
            "  {} scope={} template={} bases=[{}] children=[{}]",
            name,
            if class.owning_scope.is_empty() {
                "<global>"
            } else {
                &class.owning_scope
            },
            class.is_template,
            join(&bases),
            join(&children),
        )?;
    }

    writeln!(w, "== class functions")?;
    for name in sorted(model.class_functions.keys()) {
        for f in &model.class_functions[name.as_str()] {
            let ret = f
                .return_type
                .as_ref()
                .map(render_type)
                .unwrap_or_else(|| "?".to_string());
            writeln!(
                w,
                "  {}::{} {} {}{}",
                name,
                f.name,
                access_label(f.access),
                ret,
                if f.is_virtual { " virtual" } else { "" }
            )?;
        }
    }

    writeln!(w, "== class variables")?;
    for name in sorted(model.class_variables.keys()) {
        for v in &model.class_variables[name.as_str()] {
            writeln!(w, "  {}::{} {}", name, v.name, render_type(&v.ty))?;
        }
    }

    writeln!(w, "== enums")?;
    for name in sorted(model.enums.iter()) {
        writeln!(w, "  {name}")?;
    }

    writeln!(w, "== typedefs")?;
    for name in sorted(model.typedefs.keys()) {
        let body: Vec<String> = model.typedefs[name.as_str()]
            .iter()
            .map(render_type)
            .collect();
        writeln!(w, "  {} = {}", name, body.join(" "))?;
    }

    writeln!(w, "== globals")?;
    for name in sorted(model.globals.keys()) {
        let v = &model.globals[name.as_str()];
        writeln!(w, "  {} {}", name, render_type(&v.ty))?;
    }

    writeln!(w, "== global functions")?;
    for name in sorted(model.global_functions.keys()) {
        let f = &model.global_functions[name.as_str()];
        let ret = f
            .return_type
            .as_ref()
            .map(render_type)
            .unwrap_or_else(|| "?".to_string());
        writeln!(w, "  {name} {ret}")?;
    }
    Ok(())
}

/// Per-file local symbol tables.
pub fn write_locals_report(corpus: &Corpus, w: &mut impl Write) -> Result<()> {
    for file in &corpus.files {
        if file.locals.variables.is_empty() && file.locals.functions.is_empty() {
            continue;
        }
        writeln!(w, "== locals: {}", file.path.display())?;
        for name in sorted(file.locals.variables.keys()) {
            let v = &file.locals.variables[name.as_str()];
            writeln!(w, "  var {} {}", name, render_type(&v.ty))?;
        }
        for name in sorted(file.locals.functions.keys()) {
            let f = &file.locals.functions[name.as_str()];
            let ret = f
                .return_type
                .as_ref()
                .map(render_type)
                .unwrap_or_else(|| "?".to_string());
            writeln!(w, "  fn {name} {ret}")?;
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct FileReport<'a> {
    path: String,
    locals: &'a crate::model::FileSymbols,
}

#[derive(Serialize)]
struct CorpusReport<'a> {
    model: &'a Model,
    files: Vec<FileReport<'a>>,
}

/// Emit the full cross-reference report in the requested format.
pub fn write_report(analyzed: &Analyzed, format: ReportFormat, w: &mut impl Write) -> Result<()> {
    match format {
        ReportFormat::Text => {
            write_model_report(&analyzed.model, w)?;
            write_locals_report(&analyzed.corpus, w)?;
            for file in &analyzed.corpus.files {
                write_token_dump(file, w)?;
            }
            Ok(())
        }
        ReportFormat::Json => {
            let report = CorpusReport {
                model: &analyzed.model,
                files: analyzed
                    .corpus
                    .files
                    .iter()
                    .map(|f| FileReport {
                        path: f.path.display().to_string(),
                        locals: &f.locals,
                    })
                    .collect(),
            };
            serde_json::to_writer_pretty(&mut *w, &report)?;
            writeln!(w)?;
            Ok(())
        }
    }
}

fn join(items: &[&String]) -> String {
    items
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
