//! Normalized module AST produced by the parser front-end
//!
//! One `ModuleAst` per source file, uniform across languages. These
//! records are transient: the parser produces them and the graph
//! builder consumes them. They hold no cross-file references; all
//! relationships between modules live in the graph.

use serde::{Deserialize, Serialize};

use crate::model::Lang;

/// A single import statement (static or dynamic).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportDef {
    /// Module being imported, as written (`os.path`, `./util`, `fmt`).
    pub module: String,
    /// Imported names for `from X import a, b` style imports.
    #[serde(default)]
    pub names: Vec<String>,
    pub alias: Option<String>,
    /// True for `from X import ...` (and equivalents).
    pub is_from: bool,
    /// True when the import was detected heuristically at a call site
    /// (`importlib.import_module`, dynamic `import(...)`, `require`).
    pub is_dynamic: bool,
    pub dynamic_pattern: Option<String>,
    pub dynamic_source: Option<String>,
    pub line_number: u32,
}

/// One formal parameter of a function or method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDef {
    pub name: String,
    pub type_annotation: Option<String>,
    pub default_value: Option<String>,
    pub is_variadic: bool,
    pub is_keyword: bool,
}

/// An invocation recorded inside a function body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSiteDef {
    /// Simple name of the callee (`validate`, not `self.validate`).
    pub callee: String,
    pub line: u32,
    pub is_method_call: bool,
    /// Receiver text when the call is a method call (`self`, `cls`,
    /// `this`, or another identifier), preserved verbatim.
    pub receiver: Option<String>,
}

/// A function or method definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    #[serde(default)]
    pub decorators: Vec<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterDef>,
    pub return_type: Option<String>,
    pub is_async: bool,
    pub is_static: bool,
    pub is_classmethod: bool,
    pub is_property: bool,
    pub is_method: bool,
    pub docstring: Option<String>,
    /// McCabe cyclomatic complexity of the body, base 1.
    pub body_complexity: u32,
    pub body_source: Option<String>,
    #[serde(default)]
    pub call_sites: Vec<CallSiteDef>,
    pub start_line: u32,
    pub end_line: u32,
}

impl FunctionDef {
    /// A bare function skeleton; extractors fill in what the language
    /// actually provides.
    pub fn named(name: impl Into<String>) -> Self {
        FunctionDef {
            name: name.into(),
            decorators: Vec::new(),
            parameters: Vec::new(),
            return_type: None,
            is_async: false,
            is_static: false,
            is_classmethod: false,
            is_property: false,
            is_method: false,
            docstring: None,
            body_complexity: 1,
            body_source: None,
            call_sites: Vec::new(),
            start_line: 0,
            end_line: 0,
        }
    }
}

/// A class-level attribute with its declared type, when the language
/// provides one (`x: Foo`, `public Repo Repo { get; set; }`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDef {
    pub name: String,
    pub type_annotation: Option<String>,
}

/// A class, struct, interface, or trait definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDef {
    pub name: String,
    /// Base class / implemented interface names, as written.
    #[serde(default)]
    pub bases: Vec<String>,
    #[serde(default)]
    pub decorators: Vec<String>,
    pub docstring: Option<String>,
    #[serde(default)]
    pub methods: Vec<FunctionDef>,
    /// Attribute/field names (C# properties land here too).
    #[serde(default)]
    pub attributes: Vec<String>,
    /// The same attributes with their type annotations, where the
    /// source declares one. USES edges are derived from these.
    #[serde(default)]
    pub attribute_types: Vec<AttributeDef>,
    pub start_line: u32,
    pub end_line: u32,
}

/// The normalized record for one parsed source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleAst {
    /// Simple name derived from the path stem.
    pub name: String,
    /// Workspace-relative path with forward slashes.
    pub path: String,
    pub language: Lang,
    pub module_docstring: Option<String>,
    #[serde(default)]
    pub imports: Vec<ImportDef>,
    #[serde(default)]
    pub classes: Vec<ClassDef>,
    /// Top-level functions only; methods live on their class.
    #[serde(default)]
    pub functions: Vec<FunctionDef>,
    pub total_lines: u32,
}

impl ModuleAst {
    pub fn new(path: impl Into<String>, language: Lang) -> Self {
        let path = path.into();
        let name = path
            .rsplit('/')
            .next()
            .unwrap_or(&path)
            .split('.')
            .next()
            .unwrap_or("")
            .to_string();
        ModuleAst {
            name,
            path,
            language,
            module_docstring: None,
            imports: Vec::new(),
            classes: Vec::new(),
            functions: Vec::new(),
            total_lines: 0,
        }
    }

    /// Dotted qualified name of this module relative to the root
    /// (`src/kernel/mubase.py` → `src.kernel.mubase`).
    pub fn qualified_name(&self) -> String {
        let trimmed = match self.path.rsplit_once('.') {
            Some((stem, _ext)) => stem,
            None => self.path.as_str(),
        };
        trimmed.replace('/', ".")
    }

    /// Package prefix of this module (`src/kernel/mubase.py` → `src.kernel`).
    pub fn package(&self) -> String {
        match self.path.rsplit_once('/') {
            Some((dir, _file)) => dir.replace('/', "."),
            None => String::new(),
        }
    }
}
