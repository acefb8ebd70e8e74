//! JavaScript / JSX extractor
//!
//! The JS grammar is a strict subset of what the TypeScript walker
//! handles (no type annotations, no interfaces), so extraction is
//! delegated to the shared walker with the language tag swapped.

use mu_core::{Lang, ModuleAst};
use tree_sitter::Node;

use crate::extractor::LanguageExtractor;
use crate::languages::typescript::extract_module;

pub struct JavaScriptExtractor;

impl LanguageExtractor for JavaScriptExtractor {
    fn extract(&self, root: Node, source: &[u8], path: &str) -> ModuleAst {
        extract_module(root, source, path, Lang::JavaScript)
    }
}
