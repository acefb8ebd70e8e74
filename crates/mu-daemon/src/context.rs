//! Non-LLM context assembly for `/context`
//!
//! Resolves keywords from the question against node names, pulls each
//! hit's definition plus its direct neighbors, and renders a text
//! block bounded by an approximate token budget (four characters per
//! token).

use serde::Serialize;

use mu_core::{Node, NodeProperties};
use mu_query::QueryError;
use mu_store::GraphStore;

const CHARS_PER_TOKEN: usize = 4;
const MAX_KEYWORD_HITS: usize = 5;

#[derive(Debug, Serialize)]
pub struct ContextResponse {
    pub context: String,
    pub nodes: Vec<String>,
    pub token_estimate: usize,
}

/// Words too common to anchor a lookup.
const STOPWORDS: [&str; 18] = [
    "the", "and", "for", "what", "how", "why", "where", "which", "does", "this", "that", "with",
    "from", "into", "about", "are", "can", "use",
];

fn keywords(question: &str) -> Vec<String> {
    let mut words: Vec<String> = question
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|w| w.len() > 2)
        .map(|w| w.to_string())
        .filter(|w| !STOPWORDS.contains(&w.to_ascii_lowercase().as_str()))
        .collect();
    words.dedup();
    words
}

fn describe(node: &Node) -> String {
    let mut text = format!(
        "{} {} ({}:{}-{})",
        node.node_type.as_str(),
        node.qualified_name.as_deref().unwrap_or(&node.name),
        node.file_path,
        node.line_start.unwrap_or(0),
        node.line_end.unwrap_or(0),
    );
    match &node.properties {
        NodeProperties::Function {
            docstring,
            return_type,
            parameters,
            ..
        } => {
            let params: Vec<&str> = parameters.iter().map(|p| p.name.as_str()).collect();
            text.push_str(&format!("\n  signature: ({})", params.join(", ")));
            if let Some(ret) = return_type {
                text.push_str(&format!(" -> {ret}"));
            }
            if node.complexity > 1 {
                text.push_str(&format!("\n  complexity: {}", node.complexity));
            }
            if let Some(doc) = docstring {
                text.push_str(&format!("\n  doc: {doc}"));
            }
        }
        NodeProperties::Class {
            bases, docstring, ..
        } => {
            if !bases.is_empty() {
                text.push_str(&format!("\n  bases: {}", bases.join(", ")));
            }
            if let Some(doc) = docstring {
                text.push_str(&format!("\n  doc: {doc}"));
            }
        }
        NodeProperties::Module { docstring, .. } => {
            if let Some(doc) = docstring {
                text.push_str(&format!("\n  doc: {doc}"));
            }
        }
        NodeProperties::External { .. } => {}
    }
    text
}

pub fn assemble_context(
    store: &GraphStore,
    question: &str,
    max_tokens: usize,
) -> Result<ContextResponse, QueryError> {
    let budget_chars = max_tokens.saturating_mul(CHARS_PER_TOKEN).max(200);
    let mut sections: Vec<String> = Vec::new();
    let mut node_ids: Vec<String> = Vec::new();

    for word in keywords(question) {
        let hits = store.find_by_name(&format!("%{word}%"), None)?;
        for node in hits.into_iter().take(MAX_KEYWORD_HITS) {
            if node_ids.contains(&node.id) {
                continue;
            }
            let mut section = describe(&node);

            let neighbors = store.get_neighbors(&node.id, "both")?;
            if !neighbors.is_empty() {
                let names: Vec<&str> = neighbors.iter().take(8).map(|n| n.id.as_str()).collect();
                section.push_str(&format!("\n  related: {}", names.join(", ")));
            }

            node_ids.push(node.id.clone());
            sections.push(section);
        }
    }

    let mut context = String::new();
    for section in &sections {
        if context.len() + section.len() + 2 > budget_chars {
            break;
        }
        context.push_str(section);
        context.push_str("\n\n");
    }
    let token_estimate = context.len() / CHARS_PER_TOKEN;

    Ok(ContextResponse {
        context,
        nodes: node_ids,
        token_estimate,
    })
}
