//! Semantic passes over the lexed corpus.
//!
//! The passes form a fixed pipeline and each table is built by exactly one
//! of them. The ordering is enforced by construction: every stage type here
//! consumes the previous stage, so a caller cannot run member extraction
//! before containers are folded, or fold containers before the class model
//! exists. The whole corpus is resident in memory from the first stage on;
//! no pass starts until the previous one has finished every file.

pub mod macros;
pub mod normalize;
pub mod scopes;
pub mod symbols;
pub mod typedefs;

use std::path::{Path, PathBuf};

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info};

use crate::error::{Result, ShroudError};
use crate::lexer::{Lexer, Token};
use crate::model::{FileSymbols, Model};
use crate::reader::Reader;

/// Header extensions; everything else in the file set is a translation unit.
const HEADER_EXTENSIONS: &[&str] = &["h", "hh", "hpp", "hxx"];

/// One source file with its evolving token sequence.
#[derive(Debug)]
pub struct SourceFile {
    pub path: PathBuf,
    pub text: String,
    pub is_header: bool,
    pub tokens: Vec<Token>,
    /// Tokens frozen right after normalization, before any semantic pass
    /// splices or retags. Rename emission reads raw class-name occurrences
    /// from here because later passes absorb template arguments and splice
    /// macro bodies, moving tokens off their source offsets.
    pub snapshot: Vec<Token>,
    /// File-scoped symbol tables, filled by the symbol pass.
    pub locals: FileSymbols,
}

/// The in-memory corpus, shared by every stage.
#[derive(Debug, Default)]
pub struct Corpus {
    pub files: Vec<SourceFile>,
}

impl Corpus {
    pub fn file(&self, path: &Path) -> Option<&SourceFile> {
        self.files.iter().find(|f| f.path == path)
    }
}

fn is_header(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| HEADER_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Stage 1: every file fully lexed.
pub struct Lexed {
    corpus: Corpus,
}

/// Load and lex the whole file set. Any unreadable file aborts before
/// analysis begins.
pub fn load(paths: &[PathBuf]) -> Result<Lexed> {
    let mut corpus = Corpus::default();
    for path in paths {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ShroudError::io_with_path(e, path))?;
        let tokens = Lexer::new(Reader::from_text(&text)).tokenize();
        debug!(file = %path.display(), tokens = tokens.len(), "lexed");
        corpus.files.push(SourceFile {
            is_header: is_header(path),
            path: path.clone(),
            text,
            tokens,
            snapshot: Vec::new(),
            locals: FileSymbols::default(),
        });
    }
    info!(files = corpus.files.len(), "corpus lexed");
    Ok(Lexed { corpus })
}

/// Lex an already-loaded file set; used by the extern-type parser and tests.
pub fn load_from_texts(files: Vec<(PathBuf, String)>) -> Lexed {
    let mut corpus = Corpus::default();
    for (path, text) in files {
        let tokens = Lexer::new(Reader::from_text(&text)).tokenize();
        corpus.files.push(SourceFile {
            is_header: is_header(&path),
            path,
            text,
            tokens,
            snapshot: Vec::new(),
            locals: FileSymbols::default(),
        });
    }
    Lexed { corpus }
}

impl Lexed {
    /// Stage 2: sign folding, directive extraction, builtin reclassification,
    /// compound-type merging. Freezes the pre-semantic snapshot.
    pub fn normalize(mut self) -> Normalized {
        for file in &mut self.corpus.files {
            normalize::pass_one(&mut file.tokens);
            normalize::pass_two(&mut file.tokens);
            file.snapshot = file.tokens.clone();
        }
        Normalized {
            corpus: self.corpus,
        }
    }
}

/// Stage 2 output: normalized corpus with frozen snapshots.
pub struct Normalized {
    corpus: Corpus,
}

impl Normalized {
    /// Stage 3: macro table, conditional evaluation, body expansion.
    pub fn expand_macros(mut self) -> Result<Macroed> {
        let mut table = macros::MacroTable::default();
        for file in &self.corpus.files {
            macros::collect_defines(&file.tokens, &mut table);
        }
        for file in &self.corpus.files {
            macros::evaluate_conditionals(&file.path, &file.tokens, &mut table)?;
        }
        macros::expand_macro_bodies(&mut table);
        for file in &mut self.corpus.files {
            macros::apply_macros(&mut file.tokens, &table);
        }
        info!(macros = table.len(), "macro table built");
        Ok(Macroed {
            corpus: self.corpus,
            macros: table,
        })
    }
}

/// Stage 3 output: corpus with macros applied.
pub struct Macroed {
    corpus: Corpus,
    macros: macros::MacroTable,
}

impl Macroed {
    /// Stage 4: scope walk and class model.
    pub fn build_classes(mut self) -> Result<Classed> {
        let mut builder = scopes::ClassModelBuilder::default();
        for file in &mut self.corpus.files {
            builder.scan_file(&file.path, &mut file.tokens)?;
        }
        info!(classes = builder.classes.len(), "class model built");
        Ok(Classed {
            corpus: self.corpus,
            macros: self.macros,
            builder,
        })
    }
}

/// Stage 4 output: class model registered, class bodies delimited.
pub struct Classed {
    corpus: Corpus,
    macros: macros::MacroTable,
    builder: scopes::ClassModelBuilder,
}

impl Classed {
    /// Stage 5: typedef fixpoint, enum tagging, decltype collapse, container
    /// folding, class-name reclassification.
    pub fn normalize_types(mut self) -> Result<Typed> {
        let mut typedefs = FxHashMap::default();
        for file in &self.corpus.files {
            typedefs::collect_typedefs(&file.path, &file.tokens, &mut typedefs)?;
        }
        typedefs::expand_typedef_bodies(&mut typedefs)?;

        let mut enums = FxHashSet::default();
        for file in &mut self.corpus.files {
            typedefs::expand_typedefs_in_stream(&mut file.tokens, &typedefs);
            typedefs::collect_enums(&mut file.tokens, &mut enums);
        }
        for file in &mut self.corpus.files {
            typedefs::tag_enum_occurrences(&mut file.tokens, &enums);
            typedefs::collapse_decltype(&mut file.tokens);
            typedefs::fold_containers(&mut file.tokens);
            scopes::reclassify_class_names(&mut file.tokens, &self.builder.classes);
        }
        // Streams got the raw bodies (so iterator suffixes at use sites still
        // fold); the retained table holds the folded form.
        for body in typedefs.values_mut() {
            typedefs::fold_containers(body);
        }
        info!(typedefs = typedefs.len(), enums = enums.len(), "types normalized");
        Ok(Typed {
            corpus: self.corpus,
            macros: self.macros,
            builder: self.builder,
            typedefs,
            enums,
        })
    }
}

/// Stage 5 output: fully typed token streams.
pub struct Typed {
    corpus: Corpus,
    macros: macros::MacroTable,
    builder: scopes::ClassModelBuilder,
    typedefs: FxHashMap<String, Vec<Token>>,
    enums: FxHashSet<String>,
}

impl Typed {
    /// Stage 6: member variables, return-type back-fill, free symbols, base
    /// closures. Produces the read-only [`Model`].
    pub fn extract_symbols(mut self, extern_scopes: FxHashSet<String>) -> Analyzed {
        let mut class_variables = FxHashMap::default();
        for file in &mut self.corpus.files {
            symbols::extract_class_members(&mut file.tokens, &mut class_variables);
        }
        for file in &mut self.corpus.files {
            symbols::backfill_qualified_definitions(&mut file.tokens, &mut self.builder.class_functions);
        }
        // Closures come after the back-fill so inherited entries carry
        // return types too.
        let closures = scopes::finalize(&self.builder);

        let mut globals = FxHashMap::default();
        let mut global_functions = FxHashMap::default();
        for file in &mut self.corpus.files {
            let is_header = file.is_header;
            symbols::extract_free_symbols(
                &mut file.tokens,
                is_header,
                &mut globals,
                &mut global_functions,
                &mut file.locals,
            );
        }

        let model = Model {
            macros: self.macros,
            classes: self.builder.classes,
            children: closures.children,
            bases: closures.bases,
            class_functions: self.builder.class_functions,
            class_functions_with_bases: closures.class_functions_with_bases,
            class_variables,
            enums: self.enums,
            typedefs: self.typedefs,
            globals,
            global_functions,
            extern_scopes,
        };
        info!(
            classes = model.classes.len(),
            globals = model.globals.len(),
            functions = model.global_functions.len(),
            "symbol tables complete"
        );
        Analyzed {
            corpus: self.corpus,
            model,
        }
    }
}

/// Final stage: the analyzed corpus and its read-only semantic model.
#[derive(Debug)]
pub struct Analyzed {
    pub corpus: Corpus,
    pub model: Model,
}

/// Full-pipeline driver over in-memory sources, for tests.
#[cfg(test)]
pub(crate) fn analyze_texts(files: Vec<(&str, &str)>) -> Analyzed {
    let files = files
        .into_iter()
        .map(|(p, t)| (PathBuf::from(p), t.to_string()))
        .collect();
    load_from_texts(files)
        .normalize()
        .expand_macros()
        .expect("macro pass")
        .build_classes()
        .expect("class pass")
        .normalize_types()
        .expect("type pass")
        .extract_symbols(FxHashSet::default())
}
