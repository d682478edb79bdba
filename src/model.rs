//! Semantic model types and the corpus-wide symbol tables.
//!
//! All tables are populated by exactly one pass and read-only afterwards;
//! the stage types in [`crate::passes`] enforce the build order at
//! compile time. Lookup keys are plain names, not qualified paths: symbol
//! lookup is deliberately scope-insensitive (last writer wins), a documented
//! limitation carried over from the analysis design. The one guarded case is
//! a typedef redefined with a *different* body, which is fatal.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

use crate::lexer::{Token, TokenKind};

/// Synthetic base marker for classes whose stated base is not declared in
/// the corpus. Fixpoint-propagated: inheriting from a rebound class rebinds
/// the child as well.
pub const EXTERNAL_BASE: &str = "<external>";

/// Reserved name for anonymous namespaces.
pub const ANON_NAMESPACE: &str = "<anon>";

/// Member access level. The running default flips with `class` vs `struct`
/// and with access-specifier labels inside the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Access {
    Public,
    Protected,
    Private,
}

/// A template parameter of a class template.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateParam {
    pub name: String,
    /// Constraint token for non-type parameters (`int N` records `int`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraint: Option<Token>,
    /// `typename... Args`
    pub is_variadic: bool,
}

/// One class or struct declared in the corpus.
///
/// Class names must be globally unique across the corpus; a duplicate simply
/// overwrites the earlier entry (known limitation, not silently fixed).
#[derive(Debug, Clone, Serialize)]
pub struct ClassType {
    pub name: String,
    /// `struct` (default-public) vs `class` (default-private).
    pub is_value_semantics: bool,
    pub is_template: bool,
    /// Single inheritance only; the last base wins if several are written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_name: Option<String>,
    /// Qualified key of the scope the class was declared in.
    pub owning_scope: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub template_parameters: Vec<TemplateParam>,
}

/// A member function declaration.
#[derive(Debug, Clone, Serialize)]
pub struct ClassFunction {
    pub owner_class: String,
    pub name: String,
    pub access: Access,
    /// Filled at declaration when the return type precedes the name, or
    /// back-filled from a later qualified definition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_type: Option<Token>,
    pub is_virtual: bool,
}

/// A member variable declaration.
#[derive(Debug, Clone, Serialize)]
pub struct ClassVariable {
    pub owner_class: String,
    pub name: String,
    pub ty: Token,
}

/// A global or file-local variable.
#[derive(Debug, Clone, Serialize)]
pub struct Variable {
    pub name: String,
    pub ty: Token,
    pub declaring_scope: String,
}

/// A free function, global or file-local.
#[derive(Debug, Clone, Serialize)]
pub struct Function {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_type: Option<Token>,
    pub declaring_scope: String,
}

/// Per-file symbol tables for `static` and anonymous-namespace declarations
/// plus everything declared in a `.cpp` at file scope.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FileSymbols {
    pub variables: FxHashMap<String, Variable>,
    pub functions: FxHashMap<String, Function>,
}

/// The complete read-only semantic model of the corpus.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Model {
    /// Macro name to its `#define` directive token (children = body).
    pub macros: FxHashMap<String, Token>,
    pub classes: FxHashMap<String, ClassType>,
    /// Class name to the set of classes that name it (transitively) as base.
    pub children: FxHashMap<String, FxHashSet<String>>,
    /// Class name to its transitive base set, including [`EXTERNAL_BASE`]
    /// when some ancestor is undeclared in the corpus.
    pub bases: FxHashMap<String, FxHashSet<String>>,
    /// Declared member functions, keyed by owning class.
    pub class_functions: FxHashMap<String, Vec<ClassFunction>>,
    /// Declared plus inherited member functions (access-unaware).
    pub class_functions_with_bases: FxHashMap<String, Vec<ClassFunction>>,
    pub class_variables: FxHashMap<String, Vec<ClassVariable>>,
    pub enums: FxHashSet<String>,
    /// Fixpoint-expanded typedef bodies.
    pub typedefs: FxHashMap<String, Vec<Token>>,
    pub globals: FxHashMap<String, Variable>,
    pub global_functions: FxHashMap<String, Function>,
    /// Namespace/type names declared known-foreign by the extern-type
    /// description file.
    pub extern_scopes: FxHashSet<String>,
}

impl Model {
    /// Is `name` a class or struct declared in the corpus?
    #[inline]
    pub fn has_class(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// Does `class_name` (transitively) inherit from outside the corpus?
    pub fn has_external_base(&self, class_name: &str) -> bool {
        self.bases
            .get(class_name)
            .is_some_and(|b| b.contains(EXTERNAL_BASE))
    }

    /// Look up a member variable on a class (own table only; member
    /// variables are not flattened through bases).
    pub fn class_variable(&self, class_name: &str, member: &str) -> Option<&ClassVariable> {
        self.class_variables
            .get(class_name)?
            .iter()
            .find(|v| v.name == member)
    }

    /// Look up a member function including inherited ones.
    pub fn method_on(&self, class_name: &str, method: &str) -> Option<&ClassFunction> {
        self.class_functions_with_bases
            .get(class_name)?
            .iter()
            .find(|f| f.name == method)
    }

    /// Look up a declared-only member function.
    pub fn declared_method(&self, class_name: &str, method: &str) -> Option<&ClassFunction> {
        self.class_functions
            .get(class_name)?
            .iter()
            .find(|f| f.name == method)
    }
}

/// Render a (possibly folded) type token as display text, e.g.
/// `vector<shared_ptr<Bar>>`.
pub fn render_type(tok: &Token) -> String {
    if tok.children.is_empty() {
        return tok.text.clone();
    }
    // decltype bodies are expressions, not type arguments.
    let sep = if tok.text == "decltype" { " " } else { ", " };
    let args: Vec<String> = tok.children.iter().map(render_type).collect();
    format!("{}<{}>", tok.text, args.join(sep))
}

/// Build a synthesized `Type` token for resolution results.
pub fn type_token(name: &str) -> Token {
    Token::synthetic(TokenKind::Type, name)
}
