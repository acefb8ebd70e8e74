//! Cyclomatic complexity by decision-point counting
//!
//! Base complexity is 1; every decision node in the body subtree adds
//! one. Binary/boolean expressions only count when the operator is a
//! short-circuit operator, checked by operator text.

use mu_core::Lang;
use tree_sitter::Node;

/// Binary operators that count as decision points.
pub const DECISION_OPERATORS: [&str; 5] = ["&&", "||", "and", "or", "??"];

/// Node kinds that are inspected for their operator text rather than
/// counted outright.
const OPERATOR_CHECKED: [&str; 2] = ["binary_expression", "boolean_operator"];

/// Decision-point node kinds per language (tree-sitter node names).
pub fn decision_points(lang: Lang) -> &'static [&'static str] {
    match lang {
        Lang::Python => &[
            "if_statement",
            "for_statement",
            "while_statement",
            "except_clause",
            "with_statement",
            "assert_statement",
            "boolean_operator",
            "conditional_expression",
            "match_statement",
            "case_clause",
            // comprehension clauses count each loop/condition inside
            "for_in_clause",
            "if_clause",
        ],
        Lang::TypeScript | Lang::Tsx | Lang::JavaScript | Lang::Jsx => &[
            "if_statement",
            "for_statement",
            "while_statement",
            "for_in_statement",
            "do_statement",
            "switch_case",
            "catch_clause",
            "ternary_expression",
            "binary_expression",
        ],
        Lang::Go => &[
            "if_statement",
            "for_statement",
            "expression_case",
            "type_case",
            "communication_case",
            "binary_expression",
        ],
        Lang::Java => &[
            "if_statement",
            "for_statement",
            "while_statement",
            "do_statement",
            "enhanced_for_statement",
            "switch_block_statement_group",
            "catch_clause",
            "ternary_expression",
            "binary_expression",
        ],
        Lang::Rust => &[
            "if_expression",
            "for_expression",
            "while_expression",
            "loop_expression",
            "match_expression",
            "match_arm",
            "binary_expression",
        ],
        Lang::CSharp => &[
            "if_statement",
            "for_statement",
            "while_statement",
            "do_statement",
            "foreach_statement",
            "switch_section",
            "catch_clause",
            "conditional_expression",
            "binary_expression",
            "switch_expression",
            "switch_expression_arm",
            "conditional_access_expression",
        ],
    }
}

fn has_decision_operator(node: Node, source: &[u8]) -> bool {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        let text = &source[child.start_byte()..child.end_byte()];
        let text = String::from_utf8_lossy(text);
        if DECISION_OPERATORS.contains(&text.as_ref()) {
            return true;
        }
    }
    false
}

/// McCabe cyclomatic complexity of a subtree (typically a function
/// body). Always ≥ 1.
pub fn cyclomatic_complexity(body: Node, lang: Lang, source: &[u8]) -> u32 {
    let decisions = decision_points(lang);
    let mut complexity = 1u32;
    let mut stack = vec![body];

    while let Some(node) = stack.pop() {
        if decisions.contains(&node.kind()) {
            if OPERATOR_CHECKED.contains(&node.kind()) {
                // Python's boolean_operator is always and/or; the
                // operator check is still cheap and uniform.
                if lang == Lang::Python || has_decision_operator(node, source) {
                    complexity += 1;
                }
            } else {
                complexity += 1;
            }
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            stack.push(child);
        }
    }
    complexity
}
