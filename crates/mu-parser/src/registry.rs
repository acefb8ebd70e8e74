//! Closed registry of supported languages
//!
//! Maps a [`Lang`] to its tree-sitter grammar and extractor. There is
//! no runtime discovery; the match arms below are the complete set.

use mu_core::Lang;
use tree_sitter::Language;

use crate::extractor::LanguageExtractor;
use crate::languages::{
    csharp::CSharpExtractor, go::GoExtractor, java::JavaExtractor, javascript::JavaScriptExtractor,
    python::PythonExtractor, rust::RustExtractor, typescript::TypeScriptExtractor,
};

/// Tree-sitter grammar for a language. JSX shares the JavaScript
/// grammar (which parses JSX), TSX has its own.
pub fn grammar_for(lang: Lang) -> Language {
    match lang {
        Lang::Python => tree_sitter_python::LANGUAGE.into(),
        Lang::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        Lang::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        Lang::JavaScript | Lang::Jsx => tree_sitter_javascript::LANGUAGE.into(),
        Lang::CSharp => tree_sitter_c_sharp::LANGUAGE.into(),
        Lang::Go => tree_sitter_go::LANGUAGE.into(),
        Lang::Rust => tree_sitter_rust::LANGUAGE.into(),
        Lang::Java => tree_sitter_java::LANGUAGE.into(),
    }
}

static PYTHON: PythonExtractor = PythonExtractor;
static TYPESCRIPT: TypeScriptExtractor = TypeScriptExtractor;
static JAVASCRIPT: JavaScriptExtractor = JavaScriptExtractor;
static CSHARP: CSharpExtractor = CSharpExtractor;
static GO: GoExtractor = GoExtractor;
static RUST: RustExtractor = RustExtractor;
static JAVA: JavaExtractor = JavaExtractor;

/// Extractor for a language. TSX uses the TypeScript extractor, JSX
/// the JavaScript one; grammar differences are absorbed by tree-sitter.
pub fn extractor_for(lang: Lang) -> &'static dyn LanguageExtractor {
    match lang {
        Lang::Python => &PYTHON,
        Lang::TypeScript | Lang::Tsx => &TYPESCRIPT,
        Lang::JavaScript | Lang::Jsx => &JAVASCRIPT,
        Lang::CSharp => &CSHARP,
        Lang::Go => &GO,
        Lang::Rust => &RUST,
        Lang::Java => &JAVA,
    }
}
