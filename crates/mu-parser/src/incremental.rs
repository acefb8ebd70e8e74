//! Incremental parsing
//!
//! Holds a parse tree together with its source bytes and re-parses
//! after byte-range edits, using the previous tree as a hint. After
//! any sequence of valid edits the extracted module is identical to a
//! full parse of the resulting source.

use mu_core::{Lang, ModuleAst, MuError};
use tree_sitter::{InputEdit, Parser, Point, Tree};

use crate::registry;

pub struct IncrementalParser {
    lang: Lang,
    parser: Parser,
    source: String,
    tree: Option<Tree>,
    path: String,
}

impl IncrementalParser {
    pub fn new(lang: Lang, source: &str, path: &str) -> Result<Self, MuError> {
        let mut parser = Parser::new();
        parser
            .set_language(&registry::grammar_for(lang))
            .map_err(|e| MuError::Parse {
                path: path.to_string(),
                message: format!("failed to load {lang} grammar: {e}"),
            })?;
        let tree = parser.parse(source, None);
        Ok(IncrementalParser {
            lang,
            parser,
            source: source.to_string(),
            tree,
            path: path.to_string(),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Splice `new_text` over `start_byte..old_end_byte`, update the
    /// tree with byte- and row/column-aware edit descriptors, and
    /// re-parse with the previous tree as a hint. `new_end_byte` must
    /// equal `start_byte + new_text.len()`.
    pub fn apply_edit(
        &mut self,
        start_byte: usize,
        old_end_byte: usize,
        new_end_byte: usize,
        new_text: &str,
    ) -> Result<(), MuError> {
        if start_byte > old_end_byte || old_end_byte > self.source.len() {
            return Err(MuError::Parse {
                path: self.path.clone(),
                message: format!(
                    "edit range {start_byte}..{old_end_byte} out of bounds (len {})",
                    self.source.len()
                ),
            });
        }
        if new_end_byte != start_byte + new_text.len() {
            return Err(MuError::Parse {
                path: self.path.clone(),
                message: format!(
                    "new_end_byte {new_end_byte} does not match edit text (expected {})",
                    start_byte + new_text.len()
                ),
            });
        }

        let start_position = point_at(&self.source, start_byte);
        let old_end_position = point_at(&self.source, old_end_byte);

        let mut next = String::with_capacity(self.source.len() + new_text.len());
        next.push_str(&self.source[..start_byte]);
        next.push_str(new_text);
        next.push_str(&self.source[old_end_byte..]);

        let new_end_position = point_at(&next, new_end_byte);

        if let Some(tree) = self.tree.as_mut() {
            tree.edit(&InputEdit {
                start_byte,
                old_end_byte,
                new_end_byte,
                start_position,
                old_end_position,
                new_end_position,
            });
        }

        self.source = next;
        self.tree = self.parser.parse(&self.source, self.tree.as_ref());
        Ok(())
    }

    /// Discard the tree and start over from `new_source`.
    pub fn reset(&mut self, new_source: &str) {
        self.source = new_source.to_string();
        self.tree = self.parser.parse(&self.source, None);
    }

    /// Extract the module from the current tree.
    pub fn module(&self) -> Option<ModuleAst> {
        let tree = self.tree.as_ref()?;
        let mut module = registry::extractor_for(self.lang).extract(
            tree.root_node(),
            self.source.as_bytes(),
            &self.path,
        );
        module.language = self.lang;
        Some(module)
    }

    pub fn has_errors(&self) -> bool {
        self.tree.as_ref().is_some_and(|t| t.root_node().has_error())
    }
}

/// Row/column of a byte offset.
fn point_at(text: &str, byte: usize) -> Point {
    let prefix = &text.as_bytes()[..byte.min(text.len())];
    let row = prefix.iter().filter(|&&b| b == b'\n').count();
    let column = match prefix.iter().rposition(|&b| b == b'\n') {
        Some(pos) => byte - pos - 1,
        None => byte,
    };
    Point { row, column }
}
