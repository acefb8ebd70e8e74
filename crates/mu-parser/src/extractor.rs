//! Language extractor trait and shared tree helpers

use mu_core::ModuleAst;
use tree_sitter::Node;

/// One implementation per language. Extractors are stateless and
/// infallible: a broken subtree contributes nothing rather than
/// failing the file.
pub trait LanguageExtractor: Send + Sync {
    fn extract(&self, root: Node, source: &[u8], path: &str) -> ModuleAst;
}

/// Text content of a node, with invalid UTF-8 replaced.
pub fn node_text(node: Node, source: &[u8]) -> String {
    node.utf8_text(source)
        .map(|s| s.to_string())
        .unwrap_or_else(|_| {
            String::from_utf8_lossy(&source[node.start_byte()..node.end_byte()]).into_owned()
        })
}

/// 1-based start line of a node.
pub fn start_line(node: Node) -> u32 {
    node.start_position().row as u32 + 1
}

/// 1-based end line of a node.
pub fn end_line(node: Node) -> u32 {
    node.end_position().row as u32 + 1
}

/// Direct children of a node, collected for repeated passes.
pub fn children_of<'a>(node: Node<'a>) -> Vec<Node<'a>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).collect()
}

/// First direct child with the given kind.
pub fn child_by_type<'a>(node: Node<'a>, kind: &str) -> Option<Node<'a>> {
    children_of(node).into_iter().find(|c| c.kind() == kind)
}

/// All direct children with the given kind.
pub fn children_by_type<'a>(node: Node<'a>, kind: &str) -> Vec<Node<'a>> {
    children_of(node)
        .into_iter()
        .filter(|c| c.kind() == kind)
        .collect()
}

/// All descendants with the given kind, depth-first.
pub fn descendants_by_type<'a>(node: Node<'a>, kind: &str) -> Vec<Node<'a>> {
    let mut found = Vec::new();
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if current.kind() == kind {
            found.push(current);
        }
        let mut cursor = current.walk();
        // Reverse keeps the depth-first order source-ordered.
        let mut kids: Vec<Node<'a>> = current.children(&mut cursor).collect();
        kids.reverse();
        stack.extend(kids);
    }
    found
}

/// True when any direct child has the given kind (keyword probes:
/// `async`, `static`, ...).
pub fn has_child_of_type(node: Node, kind: &str) -> bool {
    child_by_type(node, kind).is_some()
}

/// Strip matching quote pairs from a string literal's text.
pub fn strip_quotes(text: &str) -> String {
    let t = text.trim();
    let t = t
        .trim_start_matches("\"\"\"")
        .trim_end_matches("\"\"\"")
        .trim_start_matches("'''")
        .trim_end_matches("'''");
    t.trim_matches(|c| c == '"' || c == '\'' || c == '`').to_string()
}
