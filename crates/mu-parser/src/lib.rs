//! MU Parser — multi-language tree-sitter front-end
//!
//! Converts source bytes into the normalized [`ModuleAst`] consumed by
//! the graph builder. One extractor per language, all registered in a
//! closed registry; adding a language is a code change.

pub mod complexity;
pub mod extractor;
pub mod incremental;
pub mod languages;
pub mod pool;
pub mod registry;
pub mod scanner;

/// Stdlib knowledge lives in `mu-core` so the graph builder can use it
/// without a parser dependency; re-exported here as part of the parser
/// front-end contract.
pub use mu_core::stdlib;

#[cfg(test)]
pub mod tests;

use mu_core::{Lang, ModuleAst, MuError};

pub use extractor::LanguageExtractor;
pub use incremental::IncrementalParser;
pub use pool::{ParserPool, create_parser_pool};
pub use scanner::{ScanEntry, Scanner, content_hash};
pub use stdlib::is_stdlib_import;

/// Result of parsing a single file.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    /// Display path, used only for identification in the output.
    pub path: String,
    pub language: Lang,
    pub module: Option<ModuleAst>,
    pub error: Option<String>,
    /// True when the parse tree contained error nodes; the module is
    /// still the best-effort extraction.
    pub has_errors: bool,
}

impl ParsedFile {
    pub fn success(&self) -> bool {
        self.module.is_some() && self.error.is_none()
    }
}

/// Parse raw source bytes with an explicit language tag.
///
/// Invalid UTF-8 sequences are replaced, not rejected. Unknown
/// language tags fail with [`MuError::UnsupportedLanguage`]; per-file
/// parser trouble is reported inside [`ParsedFile::error`] instead so
/// one bad file never aborts a build.
pub fn parse_file(source: &[u8], display_path: &str, language: &str) -> Result<ParsedFile, MuError> {
    let lang = Lang::from_tag(language)
        .ok_or_else(|| MuError::UnsupportedLanguage(language.to_string()))?;
    Ok(parse_source(source, display_path, lang))
}

/// Parse with an already-resolved [`Lang`].
pub fn parse_source(source: &[u8], display_path: &str, lang: Lang) -> ParsedFile {
    let text = String::from_utf8_lossy(source).into_owned();

    let mut parser = tree_sitter::Parser::new();
    if let Err(e) = parser.set_language(&registry::grammar_for(lang)) {
        return ParsedFile {
            path: display_path.to_string(),
            language: lang,
            module: None,
            error: Some(format!("failed to load {lang} grammar: {e}")),
            has_errors: false,
        };
    }

    let Some(tree) = parser.parse(&text, None) else {
        return ParsedFile {
            path: display_path.to_string(),
            language: lang,
            module: None,
            error: Some("parser returned no tree".to_string()),
            has_errors: true,
        };
    };

    let root = tree.root_node();
    let has_errors = root.has_error();
    if has_errors {
        tracing::warn!(path = display_path, "parse errors, extracting best effort");
    }

    let mut module = registry::extractor_for(lang).extract(root, text.as_bytes(), display_path);
    // Shared extractors (TS/TSX, JS/JSX) record the family language;
    // the precise tag comes from the caller.
    module.language = lang;
    ParsedFile {
        path: display_path.to_string(),
        language: lang,
        module: Some(module),
        error: None,
        has_errors,
    }
}
