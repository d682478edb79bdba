//! Scope walk and class model construction.
//!
//! One walk per file maintains a namespace scope stack keyed by brace depth,
//! extracts class/struct declarations (name, single base, template
//! parameters, nested classes) and their member function declarations with
//! access levels, and retags the class-body braces as
//! `ClassBegin`/`ClassEnd` so later passes can find class bodies without
//! re-parsing headers.
//!
//! After every file is scanned, [`finalize`] computes the transitive
//! base/child closures by fixpoint relaxation and reclassifies every bare
//! class-name occurrence in the corpus to `Type`.

use std::path::Path;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::error::{Result, ShroudError};
use crate::lexer::{matching_brace_close, matching_close, Token, TokenKind};
use crate::model::{
    Access, ClassFunction, ClassType, TemplateParam, ANON_NAMESPACE, EXTERNAL_BASE,
};

/// Base-class mixin that is never recorded: inheriting from it says nothing
/// about the project's own hierarchy.
const SHARED_FROM_THIS: &str = "enable_shared_from_this";

/// Accumulates the class model across files.
#[derive(Debug, Default)]
pub struct ClassModelBuilder {
    pub classes: FxHashMap<String, ClassType>,
    pub class_functions: FxHashMap<String, Vec<ClassFunction>>,
}

/// One frame of the namespace scope stack. `depth` counts plain braces
/// opened inside this scope; the scope pops when a closing brace arrives
/// with `depth == 0`.
#[derive(Debug)]
struct ScopeFrame {
    qualified: String,
    depth: usize,
}

impl ClassModelBuilder {
    /// Walk one file, registering classes and member functions and retagging
    /// class-body braces.
    pub fn scan_file(&mut self, file: &Path, tokens: &mut Vec<Token>) -> Result<()> {
        let mut scopes = vec![ScopeFrame {
            qualified: String::new(),
            depth: 0,
        }];
        let mut i = 0;
        while i < tokens.len() {
            match tokens[i].kind {
                TokenKind::Keyword if tokens[i].text == "namespace" => {
                    // `using namespace x;` is not a scope opener.
                    if i > 0 && tokens[i - 1].is_text(TokenKind::Keyword, "using") {
                        i += 1;
                        continue;
                    }
                    i = self.enter_namespace(&mut scopes, tokens, i);
                }
                TokenKind::Keyword if tokens[i].text == "template" => {
                    let params_end = skip_template_header(tokens, i);
                    let params = parse_template_params(&tokens[i..params_end]);
                    if tokens
                        .get(params_end)
                        .map(|t| {
                            t.is_text(TokenKind::Keyword, "class")
                                || t.is_text(TokenKind::Keyword, "struct")
                        })
                        .unwrap_or(false)
                    {
                        i = self.parse_class(file, tokens, params_end, &scopes, params)?;
                    } else {
                        // Function template: nothing to register here.
                        i = params_end;
                    }
                }
                TokenKind::Keyword
                    if tokens[i].text == "class" || tokens[i].text == "struct" =>
                {
                    // `enum class` is the typedef pass's business.
                    if i > 0 && tokens[i - 1].is_text(TokenKind::Keyword, "enum") {
                        i += 1;
                        continue;
                    }
                    i = self.parse_class(file, tokens, i, &scopes, Vec::new())?;
                }
                TokenKind::LBrace => {
                    if let Some(top) = scopes.last_mut() {
                        top.depth += 1;
                    }
                    i += 1;
                }
                TokenKind::RBrace => {
                    let top = scopes
                        .last_mut()
                        .ok_or_else(|| ShroudError::structure(file, "unbalanced braces"))?;
                    if top.depth > 0 {
                        top.depth -= 1;
                    } else if scopes.len() > 1 {
                        scopes.pop();
                    } else {
                        return Err(ShroudError::structure(file, "unbalanced braces"));
                    }
                    i += 1;
                }
                _ => i += 1,
            }
        }
        Ok(())
    }

    /// Handle `namespace NAME {` and the anonymous `namespace {` form.
    /// Returns the index just past the opening brace.
    fn enter_namespace(
        &mut self,
        scopes: &mut Vec<ScopeFrame>,
        tokens: &[Token],
        i: usize,
    ) -> usize {
        let mut j = i + 1;
        let name = match tokens.get(j).map(|t| t.kind) {
            Some(TokenKind::Name) => {
                let n = tokens[j].text.clone();
                j += 1;
                n
            }
            Some(TokenKind::LBrace) => ANON_NAMESPACE.to_string(),
            // `namespace A = B;` aliases and anything else: skip the keyword.
            _ => return i + 1,
        };
        if !tokens.get(j).map(|t| t.is(TokenKind::LBrace)).unwrap_or(false) {
            return i + 1;
        }
        let parent = scopes.last().map(|s| s.qualified.clone()).unwrap_or_default();
        let qualified = join_scope(&parent, &name);
        scopes.push(ScopeFrame {
            qualified,
            depth: 0,
        });
        j + 1
    }

    /// Parse a class/struct declaration starting at the `class`/`struct`
    /// keyword. Returns the index just past the class (or past the keyword
    /// for shapes that are not class definitions).
    fn parse_class(
        &mut self,
        file: &Path,
        tokens: &mut Vec<Token>,
        at: usize,
        scopes: &[ScopeFrame],
        template_params: Vec<TemplateParam>,
    ) -> Result<usize> {
        let is_struct = tokens[at].text == "struct";
        let mut j = at + 1;

        // Class name, optionally with nested qualification `Outer::Inner`.
        let mut name = match tokens.get(j) {
            Some(t) if t.is(TokenKind::Name) => t.text.clone(),
            _ => return Ok(at + 1), // anonymous struct or unsupported shape
        };
        let name_idx;
        loop {
            if tokens.get(j + 1).map(|t| t.is(TokenKind::Scope)).unwrap_or(false)
                && tokens.get(j + 2).map(|t| t.is(TokenKind::Name)).unwrap_or(false)
            {
                j += 2;
                name = tokens[j].text.clone();
            } else {
                name_idx = j;
                j += 1;
                break;
            }
        }

        // Skip `final` and explicit specialization arguments `<...>`.
        if tokens.get(j).map(|t| t.is_text(TokenKind::Name, "final")).unwrap_or(false) {
            j += 1;
        }
        if tokens.get(j).map(|t| t.is(TokenKind::LAngle)).unwrap_or(false) {
            j = matching_close(tokens, j)
                .ok_or_else(|| ShroudError::structure(file, "unbalanced template arguments"))?
                + 1;
        }

        // Base clause. Single inheritance: the last base seen wins.
        let mut base_name = None;
        if tokens.get(j).map(|t| t.is(TokenKind::Colon)).unwrap_or(false) {
            j += 1;
            while j < tokens.len() && !tokens[j].is(TokenKind::LBrace) {
                match tokens[j].kind {
                    TokenKind::Keyword | TokenKind::Comma | TokenKind::Scope => j += 1,
                    TokenKind::Name | TokenKind::Type => {
                        let is_last_segment = !tokens
                            .get(j + 1)
                            .map(|t| t.is(TokenKind::Scope))
                            .unwrap_or(false);
                        if is_last_segment && tokens[j].text != SHARED_FROM_THIS {
                            base_name = Some(tokens[j].text.clone());
                        }
                        j += 1;
                    }
                    TokenKind::LAngle => {
                        j = matching_close(tokens, j).ok_or_else(|| {
                            ShroudError::structure(file, "unbalanced template arguments")
                        })? + 1;
                    }
                    _ => j += 1,
                }
            }
        }

        match tokens.get(j).map(|t| t.kind) {
            Some(TokenKind::LBrace) => {}
            // Forward declaration or a `struct X v;` variable: not a definition.
            _ => return Ok(at + 1),
        }

        let owning_scope = scopes.last().map(|s| s.qualified.clone()).unwrap_or_default();
        let qualified_key = join_scope(&owning_scope, &name);
        debug!(class = %name, scope = %qualified_key, "class registered");

        tokens[name_idx].kind = TokenKind::Class;
        let body_open = j;
        let body_close = matching_brace_close(tokens, body_open)
            .ok_or_else(|| ShroudError::structure(file, format!("unbalanced class body: {name}")))?;
        tokens[body_open].kind = TokenKind::ClassBegin;
        tokens[body_open].owner = Some(name.clone());
        tokens[body_close].kind = TokenKind::ClassEnd;
        tokens[body_close].owner = Some(name.clone());

        self.classes.insert(
            name.clone(),
            ClassType {
                name: name.clone(),
                is_value_semantics: is_struct,
                is_template: !template_params.is_empty(),
                base_name,
                owning_scope,
                template_parameters: template_params.clone(),
            },
        );
        self.class_functions.entry(name.clone()).or_default();

        if !template_params.is_empty() {
            tag_template_params(&mut tokens[body_open..=body_close], &name, &template_params);
        }

        self.scan_class_body(
            file,
            tokens,
            &name,
            is_struct,
            body_open,
            body_close,
            &qualified_key,
        )?;
        Ok(body_close + 1)
    }

    /// Scan a class body at its outermost brace depth for access labels,
    /// constructors, destructors, member functions, operator overloads, and
    /// nested classes.
    #[allow(clippy::too_many_arguments)]
    fn scan_class_body(
        &mut self,
        file: &Path,
        tokens: &mut Vec<Token>,
        class: &str,
        is_struct: bool,
        body_open: usize,
        body_close: usize,
        qualified_key: &str,
    ) -> Result<()> {
        let mut access = if is_struct {
            Access::Public
        } else {
            Access::Private
        };
        let mut depth = 0usize;
        let mut i = body_open + 1;
        while i < body_close {
            match tokens[i].kind {
                TokenKind::LBrace | TokenKind::ClassBegin => {
                    depth += 1;
                    i += 1;
                }
                TokenKind::RBrace | TokenKind::ClassEnd => {
                    depth = depth.saturating_sub(1);
                    i += 1;
                }
                _ if depth > 0 => i += 1,
                TokenKind::Keyword
                    if matches!(tokens[i].text.as_str(), "public" | "protected" | "private")
                        && tokens.get(i + 1).map(|t| t.is(TokenKind::Colon)).unwrap_or(false) =>
                {
                    access = match tokens[i].text.as_str() {
                        "public" => Access::Public,
                        "protected" => Access::Protected,
                        _ => Access::Private,
                    };
                    i += 2;
                }
                TokenKind::Keyword if tokens[i].text == "template" => {
                    let params_end = skip_template_header(tokens, i);
                    let params = parse_template_params(&tokens[i..params_end]);
                    if tokens
                        .get(params_end)
                        .map(|t| {
                            t.is_text(TokenKind::Keyword, "class")
                                || t.is_text(TokenKind::Keyword, "struct")
                        })
                        .unwrap_or(false)
                    {
                        let scopes = vec![ScopeFrame {
                            qualified: qualified_key.to_string(),
                            depth: 0,
                        }];
                        let next = self.parse_class(file, tokens, params_end, &scopes, params)?;
                        i = next;
                    } else {
                        i = params_end;
                    }
                }
                TokenKind::Keyword
                    if (tokens[i].text == "class" || tokens[i].text == "struct")
                        && !(i > 0 && tokens[i - 1].is_text(TokenKind::Keyword, "enum")) =>
                {
                    let scopes = vec![ScopeFrame {
                        qualified: qualified_key.to_string(),
                        depth: 0,
                    }];
                    i = self.parse_class(file, tokens, i, &scopes, Vec::new())?;
                }
                TokenKind::Keyword if tokens[i].text == "operator" => {
                    i = self.record_operator(file, tokens, class, access, i)?;
                }
                TokenKind::Tilde
                    if tokens
                        .get(i + 1)
                        .map(|t| t.is_text(TokenKind::Name, class) || t.is_text(TokenKind::Class, class))
                        .unwrap_or(false) =>
                {
                    // Destructor: the name token doubles as a class-name
                    // occurrence; tag it so the method table sees it too.
                    tokens[i + 1].kind = TokenKind::MemberFunction;
                    tokens[i + 1].owner = Some(class.to_string());
                    self.record_function(class, format!("~{class}"), access, None, false);
                    i += 2;
                }
                TokenKind::Name
                    if tokens.get(i + 1).map(|t| t.is(TokenKind::LParen)).unwrap_or(false) =>
                {
                    i = self.maybe_member_function(file, tokens, class, access, i)?;
                }
                _ => i += 1,
            }
        }
        Ok(())
    }

    /// `operator` overload: every token between `operator` and the opening
    /// paren merges into the recorded function name.
    fn record_operator(
        &mut self,
        file: &Path,
        tokens: &mut [Token],
        class: &str,
        access: Access,
        at: usize,
    ) -> Result<usize> {
        let mut name = String::from("operator");
        let mut j = at + 1;
        while j < tokens.len() && !tokens[j].is(TokenKind::LParen) {
            name.push_str(&tokens[j].text);
            j += 1;
        }
        if j >= tokens.len() {
            return Err(ShroudError::structure(file, "operator without parameter list"));
        }
        let (return_type, is_virtual) = preceding_signature(tokens, at);
        self.record_function(class, name, access, return_type, is_virtual);
        let close = matching_close(tokens, j)
            .ok_or_else(|| ShroudError::structure(file, "unbalanced parameter list"))?;
        Ok(close + 1)
    }

    /// Decide whether `Name (` at class-body depth 0 is a constructor or a
    /// member function declaration, and record it if so.
    ///
    /// A constructor is the class name followed by a parameter list and then
    /// an initializer-list colon, a body, or a semicolon; the same trailing
    /// check separates member functions from stray call-shaped junk.
    fn maybe_member_function(
        &mut self,
        file: &Path,
        tokens: &mut Vec<Token>,
        class: &str,
        access: Access,
        at: usize,
    ) -> Result<usize> {
        let params_close = match matching_close(tokens, at + 1) {
            Some(c) => c,
            None => return Err(ShroudError::structure(file, "unbalanced parameter list")),
        };
        let after = tokens.get(params_close + 1);
        let is_ctor = tokens[at].text == *class;
        let terminates = match after.map(|t| (t.kind, t.text.as_str())) {
            Some((TokenKind::LBrace, _)) | Some((TokenKind::Semi, _)) => true,
            Some((TokenKind::Colon, _)) => is_ctor,
            Some((TokenKind::Keyword, "const"))
            | Some((TokenKind::Keyword, "throw"))
            | Some((TokenKind::Keyword, "noexcept")) => true,
            // pure virtual `= 0` or defaulted/deleted
            Some((TokenKind::Assign, _)) => true,
            _ => false,
        };
        if !terminates {
            return Ok(at + 1);
        }

        let (return_type, is_virtual) = if is_ctor {
            (None, false)
        } else {
            preceding_signature(tokens, at)
        };
        let name = tokens[at].text.clone();
        tokens[at].kind = TokenKind::MemberFunction;
        tokens[at].owner = Some(class.to_string());
        self.record_function(class, name, access, return_type, is_virtual);

        // Jump constructors past the initializer list so `member_(0)` is not
        // mistaken for a method declaration.
        if is_ctor
            && tokens
                .get(params_close + 1)
                .map(|t| t.is(TokenKind::Colon))
                .unwrap_or(false)
        {
            let mut j = params_close + 2;
            while j < tokens.len() && !tokens[j].is(TokenKind::LBrace) && !tokens[j].is(TokenKind::Semi) {
                j += 1;
            }
            return Ok(j);
        }
        Ok(params_close + 1)
    }

    fn record_function(
        &mut self,
        class: &str,
        name: String,
        access: Access,
        return_type: Option<Token>,
        is_virtual: bool,
    ) {
        let entry = self.class_functions.entry(class.to_string()).or_default();
        if entry.iter().any(|f| f.name == name) {
            return; // declaration seen twice (e.g. overloads), keep the first
        }
        entry.push(ClassFunction {
            owner_class: class.to_string(),
            name,
            access,
            return_type,
            is_virtual,
        });
    }
}

/// Return type and virtuality read backward from a member-name index: a
/// `Type` immediately before the name, and a `virtual` keyword one or two
/// positions before that.
fn preceding_signature(tokens: &[Token], name_idx: usize) -> (Option<Token>, bool) {
    let mut return_type = None;
    let mut type_idx = None;
    if name_idx >= 1 && tokens[name_idx - 1].is(TokenKind::Type) {
        return_type = Some(tokens[name_idx - 1].clone());
        type_idx = Some(name_idx - 1);
    }
    let anchor = type_idx.unwrap_or(name_idx);
    let is_virtual = (1..=2).any(|back| {
        anchor
            .checked_sub(back)
            .and_then(|k| tokens.get(k))
            .map(|t| t.is_text(TokenKind::Keyword, "virtual"))
            .unwrap_or(false)
    });
    (return_type, is_virtual)
}

/// Skip `template < ... >`, returning the index just past the closing `>`.
fn skip_template_header(tokens: &[Token], template_idx: usize) -> usize {
    let open = template_idx + 1;
    if tokens.get(open).map(|t| t.is(TokenKind::LAngle)).unwrap_or(false) {
        if let Some(close) = matching_close(tokens, open) {
            return close + 1;
        }
    }
    template_idx + 1
}

/// Extract template parameters from a `template < ... >` header slice.
///
/// Recognizes `typename T`, `class T`, `typename... Args`, and non-type
/// parameters `int N` (recording the constraint type).
fn parse_template_params(header: &[Token]) -> Vec<TemplateParam> {
    let mut params = Vec::new();
    let mut i = 0;
    while i < header.len() {
        let introducer = matches!(
            (header[i].kind, header[i].text.as_str()),
            (TokenKind::Keyword, "typename") | (TokenKind::Keyword, "class")
        );
        let non_type = header[i].is(TokenKind::Type);
        if introducer || non_type {
            let constraint = if non_type {
                Some(header[i].clone())
            } else {
                None
            };
            let mut j = i + 1;
            let mut is_variadic = false;
            // `...` lexes as three dots
            while header.get(j).map(|t| t.is(TokenKind::Dot)).unwrap_or(false) {
                is_variadic = true;
                j += 1;
            }
            if let Some(name_tok) = header.get(j) {
                if name_tok.is(TokenKind::Name) {
                    params.push(TemplateParam {
                        name: name_tok.text.clone(),
                        constraint,
                        is_variadic,
                    });
                    i = j + 1;
                    continue;
                }
            }
        }
        i += 1;
    }
    params
}

/// Tag every bare occurrence of a template parameter name inside the class
/// body as a `Type` owned by the class.
fn tag_template_params(body: &mut [Token], class: &str, params: &[TemplateParam]) {
    for tok in body.iter_mut() {
        if tok.is(TokenKind::Name) && params.iter().any(|p| p.name == tok.text) {
            tok.kind = TokenKind::Type;
            tok.owner = Some(class.to_string());
        }
    }
}

/// Corpus-level closure computation, run once after every file is scanned.
///
/// Produces the transitive-base map (with the external marker for undeclared
/// ancestors), the inverse child map, and the base-flattened member function
/// table. All by repeated relaxation until a full pass changes nothing;
/// termination holds because each step only adds entries bounded by the
/// finite class count.
pub struct ClassClosures {
    pub bases: FxHashMap<String, FxHashSet<String>>,
    pub children: FxHashMap<String, FxHashSet<String>>,
    pub class_functions_with_bases: FxHashMap<String, Vec<ClassFunction>>,
}

pub fn finalize(builder: &ClassModelBuilder) -> ClassClosures {
    let mut bases: FxHashMap<String, FxHashSet<String>> = FxHashMap::default();
    for (name, class) in &builder.classes {
        let mut direct = FxHashSet::default();
        if let Some(base) = &class.base_name {
            if builder.classes.contains_key(base) {
                direct.insert(base.clone());
            } else {
                direct.insert(EXTERNAL_BASE.to_string());
            }
        }
        bases.insert(name.clone(), direct);
    }

    // Transitive closure by relaxation.
    loop {
        let mut changed = false;
        let names: Vec<String> = bases.keys().cloned().collect();
        for name in &names {
            let reachable: Vec<String> = bases[name]
                .iter()
                .filter(|b| *b != EXTERNAL_BASE)
                .cloned()
                .collect();
            for base in reachable {
                let inherited: Vec<String> =
                    bases.get(&base).map(|s| s.iter().cloned().collect()).unwrap_or_default();
                if let Some(set) = bases.get_mut(name) {
                    for b in inherited {
                        changed |= set.insert(b);
                    }
                }
            }
        }
        if !changed {
            break;
        }
    }

    let mut children: FxHashMap<String, FxHashSet<String>> = FxHashMap::default();
    for name in builder.classes.keys() {
        children.entry(name.clone()).or_default();
    }
    for (name, base_set) in &bases {
        for base in base_set {
            if base != EXTERNAL_BASE {
                children.entry(base.clone()).or_default().insert(name.clone());
            }
        }
    }

    // Base-flattened member function table (access-unaware).
    let mut flattened: FxHashMap<String, Vec<ClassFunction>> = FxHashMap::default();
    for name in builder.classes.keys() {
        let mut fns: Vec<ClassFunction> = builder
            .class_functions
            .get(name)
            .cloned()
            .unwrap_or_default();
        if let Some(base_set) = bases.get(name) {
            for base in base_set {
                if let Some(base_fns) = builder.class_functions.get(base) {
                    for f in base_fns {
                        if !fns.iter().any(|existing| existing.name == f.name) {
                            fns.push(f.clone());
                        }
                    }
                }
            }
        }
        flattened.insert(name.clone(), fns);
    }

    ClassClosures {
        bases,
        children,
        class_functions_with_bases: flattened,
    }
}

/// Reclassify every bare occurrence of a known class name to `Type`,
/// absorbing a following `<...>` template-argument list into its children.
/// Declaration-site names (already `Class`) are left alone.
pub fn reclassify_class_names(
    tokens: &mut Vec<Token>,
    classes: &FxHashMap<String, ClassType>,
) {
    let mut i = 0;
    while i < tokens.len() {
        if tokens[i].is(TokenKind::Name) && classes.contains_key(&tokens[i].text) {
            tokens[i].kind = TokenKind::Type;
            if tokens.get(i + 1).map(|t| t.is(TokenKind::LAngle)).unwrap_or(false) {
                if let Some(close) = matching_close(tokens, i + 1) {
                    let args: Vec<Token> = tokens.drain(i + 1..=close).collect();
                    tokens[i].children = args[1..args.len() - 1].to_vec();
                }
            }
        }
        i += 1;
    }
}

/// Join scope path segments with `::`, treating the empty root specially.
pub fn join_scope(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}::{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize_text;
    use crate::passes::normalize;
    use std::path::PathBuf;

    fn scan(src: &str) -> (ClassModelBuilder, Vec<Token>) {
        let mut ts = tokenize_text(src);
        normalize::pass_one(&mut ts);
        normalize::pass_two(&mut ts);
        let mut builder = ClassModelBuilder::default();
        builder
            .scan_file(&PathBuf::from("test.h"), &mut ts)
            .unwrap();
        (builder, ts)
    }

    #[test]
    fn test_class_registration_with_base() {
        let (b, _) = scan("class Base { }; class Derived : public Base { };");
        assert!(b.classes.contains_key("Base"));
        let d = &b.classes["Derived"];
        assert_eq!(d.base_name.as_deref(), Some("Base"));
        assert!(!d.is_value_semantics);
    }

    #[test]
    fn test_struct_defaults_public() {
        let (b, _) = scan("struct P { int size() { return 0; } };");
        let f = &b.class_functions["P"][0];
        assert_eq!(f.access, Access::Public);
        assert_eq!(f.name, "size");
        assert_eq!(f.return_type.as_ref().unwrap().text, "int");
    }

    #[test]
    fn test_access_labels() {
        let (b, _) = scan(
            "class C { int hidden(); public: int shown(); protected: int mid(); };",
        );
        let fns = &b.class_functions["C"];
        assert_eq!(fns.iter().find(|f| f.name == "hidden").unwrap().access, Access::Private);
        assert_eq!(fns.iter().find(|f| f.name == "shown").unwrap().access, Access::Public);
        assert_eq!(fns.iter().find(|f| f.name == "mid").unwrap().access, Access::Protected);
    }

    #[test]
    fn test_constructor_and_destructor() {
        let (b, _) = scan("class C { public: C(int x) : v(x) { } ~C(); int v; };");
        let fns = &b.class_functions["C"];
        assert!(fns.iter().any(|f| f.name == "C"));
        assert!(fns.iter().any(|f| f.name == "~C"));
        // The initializer-list member must not be recorded as a method.
        assert!(!fns.iter().any(|f| f.name == "v"));
    }

    #[test]
    fn test_virtual_and_pure_virtual() {
        let (b, _) = scan("class C { public: virtual int run() = 0; virtual void stop(); };");
        let fns = &b.class_functions["C"];
        assert!(fns.iter().find(|f| f.name == "run").unwrap().is_virtual);
        assert!(fns.iter().find(|f| f.name == "stop").unwrap().is_virtual);
    }

    #[test]
    fn test_operator_overload_name_merging() {
        let (b, _) = scan("class C { public: bool operator == (const C& o) const; };");
        let fns = &b.class_functions["C"];
        assert!(fns.iter().any(|f| f.name == "operator=="));
    }

    #[test]
    fn test_nested_class_gets_own_entry() {
        let (b, _) = scan("class Outer { public: class Inner { public: void go(); }; void run(); };");
        assert!(b.classes.contains_key("Outer"));
        assert!(b.classes.contains_key("Inner"));
        assert_eq!(b.classes["Inner"].owning_scope, "Outer");
        assert!(b.class_functions["Inner"].iter().any(|f| f.name == "go"));
        assert!(b.class_functions["Outer"].iter().any(|f| f.name == "run"));
    }

    #[test]
    fn test_template_class_parameters() {
        let (b, ts) = scan("template <typename T> class Box { public: T value; };");
        let c = &b.classes["Box"];
        assert!(c.is_template);
        assert_eq!(c.template_parameters[0].name, "T");
        // Bare T inside the body is tagged as an owned type.
        let t = ts
            .iter()
            .find(|t| t.is(TokenKind::Type) && t.text == "T")
            .unwrap();
        assert_eq!(t.owner.as_deref(), Some("Box"));
    }

    #[test]
    fn test_namespace_scoping() {
        let (b, _) = scan("namespace app { namespace net { class Sock { }; } }");
        assert_eq!(b.classes["Sock"].owning_scope, "app::net");
    }

    #[test]
    fn test_anonymous_namespace() {
        let (b, _) = scan("namespace { class Hidden { }; }");
        assert_eq!(b.classes["Hidden"].owning_scope, ANON_NAMESPACE);
    }

    #[test]
    fn test_forward_declaration_not_registered() {
        let (b, _) = scan("class Fwd; class Real { };");
        assert!(!b.classes.contains_key("Fwd"));
        assert!(b.classes.contains_key("Real"));
    }

    #[test]
    fn test_enable_shared_from_this_base_skipped() {
        let (b, _) = scan("class S : public enable_shared_from_this { };");
        assert_eq!(b.classes["S"].base_name, None);
    }

    #[test]
    fn test_class_braces_retagged() {
        let (_, ts) = scan("class C { };");
        assert!(ts.iter().any(|t| t.is(TokenKind::ClassBegin)));
        assert!(ts.iter().any(|t| t.is(TokenKind::ClassEnd)));
    }

    #[test]
    fn test_unbalanced_braces_fatal() {
        let mut ts = tokenize_text("class C { ");
        normalize::pass_one(&mut ts);
        normalize::pass_two(&mut ts);
        let mut builder = ClassModelBuilder::default();
        assert!(builder
            .scan_file(&PathBuf::from("bad.h"), &mut ts)
            .is_err());
    }

    #[test]
    fn test_closures_with_external_marker() {
        let (b, _) = scan(
            "class A { }; class B : public A { }; class C : public B { }; class X : public Lib { };",
        );
        let closures = finalize(&b);
        let c_bases = &closures.bases["C"];
        assert!(c_bases.contains("A"));
        assert!(c_bases.contains("B"));
        assert!(!c_bases.contains(EXTERNAL_BASE));
        assert!(closures.bases["X"].contains(EXTERNAL_BASE));
        assert!(closures.children["A"].contains("B"));
        assert!(closures.children["A"].contains("C"));
    }

    #[test]
    fn test_external_marker_propagates_to_descendants() {
        let (b, _) = scan("class Mid : public Lib { }; class Leaf : public Mid { };");
        let closures = finalize(&b);
        assert!(closures.bases["Leaf"].contains(EXTERNAL_BASE));
    }

    #[test]
    fn test_flattened_functions_include_inherited() {
        let (b, _) = scan(
            "class A { public: void base_fn(); }; class B : public A { public: void own_fn(); };",
        );
        let closures = finalize(&b);
        let b_fns = &closures.class_functions_with_bases["B"];
        assert!(b_fns.iter().any(|f| f.name == "own_fn"));
        assert!(b_fns.iter().any(|f| f.name == "base_fn"));
        // Declared-only table stays narrow.
        assert!(!b.class_functions["B"].iter().any(|f| f.name == "base_fn"));
    }

    #[test]
    fn test_reclassify_class_names_absorbs_template_args() {
        let (b, _) = scan("class Foo { };");
        let mut ts = tokenize_text("Foo f; Wrapper<Foo> w;");
        normalize::pass_one(&mut ts);
        normalize::pass_two(&mut ts);
        reclassify_class_names(&mut ts, &b.classes);
        assert!(ts.iter().any(|t| t.is(TokenKind::Type) && t.text == "Foo"));
    }
}
