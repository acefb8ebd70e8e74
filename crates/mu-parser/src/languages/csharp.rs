//! C# extractor
//!
//! Properties are emitted as class attributes; attribute lists
//! (`[Fact]`) are recorded as decorator text.

use mu_core::{
    AttributeDef, CallSiteDef, ClassDef, FunctionDef, ImportDef, Lang, ModuleAst, ParameterDef,
};
use tree_sitter::Node;

use crate::complexity::cyclomatic_complexity;
use crate::extractor::{
    LanguageExtractor, children_of, descendants_by_type, end_line, node_text, start_line,
};

pub struct CSharpExtractor;

impl LanguageExtractor for CSharpExtractor {
    fn extract(&self, root: Node, source: &[u8], path: &str) -> ModuleAst {
        let mut module = ModuleAst::new(path, Lang::CSharp);
        module.total_lines = end_line(root);

        collect(root, source, &mut module);
        module
    }
}

/// Walk top-level and namespace bodies; C# nests declarations inside
/// (possibly file-scoped) namespaces.
fn collect(node: Node, source: &[u8], module: &mut ModuleAst) {
    for child in children_of(node) {
        match child.kind() {
            "using_directive" => {
                if let Some(import) = extract_using(child, source) {
                    module.imports.push(import);
                }
            }
            "namespace_declaration" | "file_scoped_namespace_declaration" => {
                collect(child, source, module);
            }
            "declaration_list" => {
                collect(child, source, module);
            }
            "class_declaration" | "interface_declaration" | "struct_declaration"
            | "record_declaration" => {
                module.classes.push(extract_class(child, source));
            }
            "global_statement" => {
                // Top-level statements: local functions become module
                // functions.
                for func in descendants_by_type(child, "local_function_statement") {
                    module.functions.push(extract_method(func, source, "", false));
                }
            }
            _ => {}
        }
    }
}

fn extract_using(node: Node, source: &[u8]) -> Option<ImportDef> {
    let name = children_of(node)
        .into_iter()
        .find(|c| matches!(c.kind(), "qualified_name" | "identifier"))
        .map(|c| node_text(c, source))?;
    Some(ImportDef {
        module: name,
        names: Vec::new(),
        alias: None,
        is_from: false,
        is_dynamic: false,
        dynamic_pattern: None,
        dynamic_source: None,
        line_number: start_line(node),
    })
}

fn attribute_decorators(node: Node, source: &[u8]) -> Vec<String> {
    children_of(node)
        .into_iter()
        .filter(|c| c.kind() == "attribute_list")
        .map(|c| {
            node_text(c, source)
                .trim_start_matches('[')
                .trim_end_matches(']')
                .to_string()
        })
        .collect()
}

fn modifier_texts(node: Node, source: &[u8]) -> Vec<String> {
    children_of(node)
        .into_iter()
        .filter(|c| c.kind() == "modifier")
        .map(|c| node_text(c, source))
        .collect()
}

fn extract_parameters(node: Node, source: &[u8]) -> Vec<ParameterDef> {
    let Some(params) = node.child_by_field_name("parameters") else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for child in children_of(params) {
        if child.kind() != "parameter" {
            continue;
        }
        let name = child
            .child_by_field_name("name")
            .map(|n| node_text(n, source))
            .unwrap_or_default();
        let annotation = child
            .child_by_field_name("type")
            .map(|t| node_text(t, source));
        let is_variadic = children_of(child)
            .iter()
            .any(|c| node_text(*c, source) == "params");
        out.push(ParameterDef {
            name,
            type_annotation: annotation,
            default_value: None,
            is_variadic,
            is_keyword: false,
        });
    }
    out
}

fn extract_call_sites(body: Node, source: &[u8]) -> Vec<CallSiteDef> {
    let mut sites = Vec::new();
    for call in descendants_by_type(body, "invocation_expression") {
        let Some(function) = call.child_by_field_name("function") else {
            continue;
        };
        match function.kind() {
            "identifier" => sites.push(CallSiteDef {
                callee: node_text(function, source),
                line: start_line(call),
                is_method_call: false,
                receiver: None,
            }),
            "member_access_expression" => {
                let callee = function
                    .child_by_field_name("name")
                    .map(|n| node_text(n, source))
                    .unwrap_or_default();
                if callee.is_empty() {
                    continue;
                }
                let receiver = function
                    .child_by_field_name("expression")
                    .map(|n| node_text(n, source));
                sites.push(CallSiteDef {
                    callee,
                    line: start_line(call),
                    is_method_call: true,
                    receiver,
                });
            }
            _ => {}
        }
    }
    sites
}

fn extract_method(node: Node, source: &[u8], class_name: &str, is_method: bool) -> FunctionDef {
    let is_constructor = node.kind() == "constructor_declaration";
    let name = if is_constructor {
        class_name.to_string()
    } else {
        node.child_by_field_name("name")
            .map(|n| node_text(n, source))
            .unwrap_or_default()
    };
    let modifiers = modifier_texts(node, source);
    let return_type = node
        .child_by_field_name("returns")
        .or_else(|| node.child_by_field_name("type"))
        .map(|t| node_text(t, source));
    let body = node
        .child_by_field_name("body")
        .or_else(|| node.child_by_field_name("expression_body"));

    let (complexity, call_sites, body_source) = match body {
        Some(b) => (
            cyclomatic_complexity(b, Lang::CSharp, source),
            extract_call_sites(b, source),
            Some(node_text(b, source)),
        ),
        None => (1, Vec::new(), None),
    };

    FunctionDef {
        name,
        decorators: attribute_decorators(node, source),
        parameters: extract_parameters(node, source),
        return_type,
        is_async: modifiers.iter().any(|m| m == "async"),
        is_static: modifiers.iter().any(|m| m == "static"),
        is_classmethod: false,
        is_property: false,
        is_method,
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

    let bases = children_of(node)
        .into_iter()
        .find(|c| c.kind() == "base_list")
        .map(|list| {
            children_of(list)
                .into_iter()
                .filter(|c| matches!(c.kind(), "identifier" | "qualified_name" | "generic_name"))
                .map(|c| {
                    let text = node_text(c, source);
                    text.split('<').next().unwrap_or(&text).trim().to_string()
                })
                .collect()
        })
        .unwrap_or_default();

    let mut methods = Vec::new();
    let mut attributes = Vec::new();
    let mut attribute_types = Vec::new();
    if let Some(body) = node.child_by_field_name("body") {
        for child in children_of(body) {
            match child.kind() {
                "method_declaration" | "constructor_declaration" => {
                    methods.push(extract_method(child, source, &name, true));
                }
                "property_declaration" => {
                    // C# properties are attributes in the uniform AST,
                    // keeping their declared type.
                    if let Some(prop_name) = child.child_by_field_name("name") {
                        let attr_name = node_text(prop_name, source);
                        attributes.push(attr_name.clone());
                        attribute_types.push(AttributeDef {
                            name: attr_name,
                            type_annotation: child
                                .child_by_field_name("type")
                                .map(|t| node_text(t, source)),
                        });
                    }
                }
                "field_declaration" => {
                    let declared_type = children_of(child)
                        .into_iter()
                        .find(|c| c.kind() == "variable_declaration")
                        .and_then(|d| d.child_by_field_name("type"))
                        .map(|t| node_text(t, source));
                    for declarator in descendants_by_type(child, "variable_declarator") {
                        let field_name = declarator
                            .child_by_field_name("name")
                            .or_else(|| {
                                children_of(declarator)
                                    .into_iter()
                                    .find(|c| c.kind() == "identifier")
                            })
                            .map(|n| node_text(n, source));
                        if let Some(field_name) = field_name {
                            attributes.push(field_name.clone());
                            attribute_types.push(AttributeDef {
                                name: field_name,
                                type_annotation: declared_type.clone(),
                            });
                        }
                    }
                }
                _ => {}
            }
        }
    }

    ClassDef {
        name,
        bases,
        decorators: attribute_decorators(node, source),
        docstring: None,
        methods,
        attributes,
        attribute_types,
        start_line: start_line(node),
        end_line: end_line(node),
    }
}
