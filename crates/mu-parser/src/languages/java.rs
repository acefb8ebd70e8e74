//! Java extractor
//!
//! Constructors fold into methods named like the class; annotations
//! are recorded as decorator text.

use mu_core::{
    AttributeDef, CallSiteDef, ClassDef, FunctionDef, ImportDef, Lang, ModuleAst, ParameterDef,
};
use tree_sitter::Node;

use crate::complexity::cyclomatic_complexity;
use crate::extractor::{
    LanguageExtractor, child_by_type, children_of, descendants_by_type, end_line, node_text,
    start_line,
};

pub struct JavaExtractor;

impl LanguageExtractor for JavaExtractor {
    fn extract(&self, root: Node, source: &[u8], path: &str) -> ModuleAst {
        let mut module = ModuleAst::new(path, Lang::Java);
        module.total_lines = end_line(root);

        for child in children_of(root) {
            match child.kind() {
                "import_declaration" => {
                    if let Some(import) = extract_import(child, source) {
                        module.imports.push(import);
                    }
                }
                "class_declaration" | "interface_declaration" | "enum_declaration"
                | "record_declaration" => {
                    module.classes.push(extract_class(child, source));
                }
                _ => {}
            }
        }
        module
    }
}

fn extract_import(node: Node, source: &[u8]) -> Option<ImportDef> {
    let name = children_of(node)
        .into_iter()
        .find(|c| matches!(c.kind(), "scoped_identifier" | "identifier"))
        .map(|c| node_text(c, source))?;
    let wildcard = children_of(node).iter().any(|c| c.kind() == "asterisk");
    Some(ImportDef {
        module: name,
        names: if wildcard { vec!["*".to_string()] } else { Vec::new() },
        alias: None,
        is_from: false,
        is_dynamic: false,
        dynamic_pattern: None,
        dynamic_source: None,
        line_number: start_line(node),
    })
}

fn modifiers_of(node: Node, source: &[u8]) -> (Vec<String>, bool) {
    let mut annotations = Vec::new();
    let mut is_static = false;
    if let Some(mods) = child_by_type(node, "modifiers") {
        for child in children_of(mods) {
            match child.kind() {
                "marker_annotation" | "annotation" => {
                    annotations.push(node_text(child, source).trim_start_matches('@').to_string());
                }
                _ => {
                    if node_text(child, source) == "static" {
                        is_static = true;
                    }
                }
            }
        }
    }
    (annotations, is_static)
}

fn extract_parameters(node: Node, source: &[u8]) -> Vec<ParameterDef> {
    let Some(params) = node.child_by_field_name("parameters") else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for child in children_of(params) {
        match child.kind() {
            "formal_parameter" => {
                let name = child
                    .child_by_field_name("name")
                    .map(|n| node_text(n, source))
                    .unwrap_or_default();
                let annotation = child
                    .child_by_field_name("type")
                    .map(|t| node_text(t, source));
                out.push(ParameterDef {
                    name,
                    type_annotation: annotation,
                    default_value: None,
                    is_variadic: false,
                    is_keyword: false,
                });
            }
            "spread_parameter" => {
                let name = children_of(child)
                    .into_iter()
                    .find(|c| c.kind() == "variable_declarator")
                    .and_then(|d| d.child_by_field_name("name"))
                    .map(|n| node_text(n, source))
                    .unwrap_or_default();
                out.push(ParameterDef {
                    name,
                    type_annotation: None,
                    default_value: None,
                    is_variadic: true,
                    is_keyword: false,
                });
            }
            _ => {}
        }
    }
    out
}

fn extract_call_sites(body: Node, source: &[u8]) -> Vec<CallSiteDef> {
    let mut sites = Vec::new();
    for call in descendants_by_type(body, "method_invocation") {
        let Some(name) = call.child_by_field_name("name") else {
            continue;
        };
        let receiver = call.child_by_field_name("object").map(|o| node_text(o, source));
        sites.push(CallSiteDef {
            callee: node_text(name, source),
            line: start_line(call),
            is_method_call: receiver.is_some(),
            receiver,
        });
    }
    sites
}

fn extract_method(node: Node, source: &[u8], class_name: &str) -> FunctionDef {
    let is_constructor = node.kind() == "constructor_declaration";
    let name = if is_constructor {
        // Constructors fold into methods named like the class.
        class_name.to_string()
    } else {
        node.child_by_field_name("name")
            .map(|n| node_text(n, source))
            .unwrap_or_default()
    };
    let (decorators, is_static) = modifiers_of(node, source);
    let return_type = node
        .child_by_field_name("type")
        .map(|t| node_text(t, source));
    let body = node.child_by_field_name("body");

    let (complexity, call_sites, body_source) = match body {
        Some(b) => (
            cyclomatic_complexity(b, Lang::Java, source),
            extract_call_sites(b, source),
            Some(node_text(b, source)),
        ),
        None => (1, Vec::new(), None),
    };

    FunctionDef {
        name,
        decorators,
        parameters: extract_parameters(node, source),
        return_type,
        is_async: false,
        is_static,
        is_classmethod: false,
        is_property: false,
        is_method: true,
        docstring: None,
        body_complexity: complexity,
        body_source,
        call_sites,
        start_line: start_line(node),
        end_line: end_line(node),
    }
}

fn extract_class(node: Node, source: &[u8]) -> ClassDef {
    let name = node
        .child_by_field_name("name")
        .map(|n| node_text(n, source))
        .unwrap_or_default();
    let (decorators, _) = modifiers_of(node, source);

    let mut bases = Vec::new();
    if let Some(superclass) = node.child_by_field_name("superclass") {
        bases.extend(
            children_of(superclass)
                .into_iter()
                .filter(|c| matches!(c.kind(), "type_identifier" | "scoped_type_identifier" | "generic_type"))
                .map(|c| base_name(&node_text(c, source))),
        );
    }
    if let Some(interfaces) = node.child_by_field_name("interfaces") {
        for ty in descendants_by_type(interfaces, "type_identifier") {
            bases.push(node_text(ty, source));
        }
    }

    let mut methods = Vec::new();
    let mut attributes = Vec::new();
    let mut attribute_types = Vec::new();
    if let Some(body) = node.child_by_field_name("body") {
        for child in children_of(body) {
            match child.kind() {
                "method_declaration" | "constructor_declaration" => {
                    methods.push(extract_method(child, source, &name));
                }
                "field_declaration" => {
                    let declared_type = child
                        .child_by_field_name("type")
                        .map(|t| node_text(t, source));
                    for field_name in children_by_kind(child, "variable_declarator", source) {
                        attributes.push(field_name.clone());
                        attribute_types.push(AttributeDef {
                            name: field_name,
                            type_annotation: declared_type.clone(),
                        });
                    }
                }
                _ => {}
            }
        }
    }

    ClassDef {
        name,
        bases,
        decorators,
        docstring: None,
        methods,
        attributes,
        attribute_types,
        start_line: start_line(node),
        end_line: end_line(node),
    }
}

fn children_by_kind(node: Node, kind: &str, source: &[u8]) -> Vec<String> {
    children_of(node)
        .into_iter()
        .filter(|c| c.kind() == kind)
        .filter_map(|c| c.child_by_field_name("name").map(|n| node_text(n, source)))
        .collect()
}

/// Strip generics from a base type (`List<T>` → `List`).
fn base_name(text: &str) -> String {
    text.split('<').next().unwrap_or(text).trim().to_string()
}
