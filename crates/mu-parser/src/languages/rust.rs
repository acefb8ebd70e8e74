//! Rust extractor
//!
//! Structs/enums/traits become classes. Methods from `impl` blocks
//! attach to the type of the same name when it is declared in the same
//! file; trait impls record the trait as a base.

use mu_core::{
    AttributeDef, CallSiteDef, ClassDef, FunctionDef, ImportDef, Lang, ModuleAst, ParameterDef,
};
use tree_sitter::Node;

use crate::complexity::cyclomatic_complexity;
use crate::extractor::{
    LanguageExtractor, children_of, descendants_by_type, end_line, node_text, start_line,
};

pub struct RustExtractor;

impl LanguageExtractor for RustExtractor {
    fn extract(&self, root: Node, source: &[u8], path: &str) -> ModuleAst {
        let mut module = ModuleAst::new(path, Lang::Rust);
        module.total_lines = end_line(root);

        let mut impls: Vec<(String, Option<String>, Vec<FunctionDef>)> = Vec::new();

        for child in children_of(root) {
            match child.kind() {
                "use_declaration" => {
                    if let Some(import) = extract_use(child, source) {
                        module.imports.push(import);
                    }
                }
                "function_item" => {
                    module.functions.push(extract_function(child, source, false));
                }
                "struct_item" | "enum_item" => {
                    module.classes.push(extract_struct_or_enum(child, source));
                }
                "trait_item" => {
                    module.classes.push(extract_trait(child, source));
                }
                "impl_item" => {
                    if let Some(block) = extract_impl(child, source) {
                        impls.push(block);
                    }
                }
                _ => {}
            }
        }

        for (type_name, trait_name, methods) in impls {
            match module.classes.iter_mut().find(|c| c.name == type_name) {
                Some(class) => {
                    if let Some(t) = trait_name {
                        class.bases.push(t);
                    }
                    class.methods.extend(methods);
                }
                None => {
                    // Impl for a type declared elsewhere: keep the
                    // functions as free functions so they still exist
                    // in the graph.
                    for mut m in methods {
                        m.is_method = false;
                        module.functions.push(m);
                    }
                }
            }
        }

        module
    }
}

fn extract_use(node: Node, source: &[u8]) -> Option<ImportDef> {
    let argument = node.child_by_field_name("argument")?;
    let text = node_text(argument, source);
    // `use a::b::{c, d}` keeps the path before the brace as the
    // module; the braced names land in `names`.
    let (module, names) = match text.split_once('{') {
        Some((prefix, rest)) => {
            let names = rest
                .trim_end_matches('}')
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            (prefix.trim_end_matches("::").to_string(), names)
        }
        None => (text.clone(), Vec::new()),
    };
    let (module, alias) = match module.split_once(" as ") {
        Some((m, a)) => (m.trim().to_string(), Some(a.trim().to_string())),
        None => (module, None),
    };
    Some(ImportDef {
        module,
        is_from: !names.is_empty(),
        names,
        alias,
        is_dynamic: false,
        dynamic_pattern: None,
        dynamic_source: None,
        line_number: start_line(node),
    })
}

fn extract_parameters(node: Node, source: &[u8]) -> Vec<ParameterDef> {
    let Some(params) = node.child_by_field_name("parameters") else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for child in children_of(params) {
        match child.kind() {
            "parameter" => {
                let name = child
                    .child_by_field_name("pattern")
                    .map(|p| node_text(p, source))
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
            "self_parameter" => out.push(ParameterDef {
                name: node_text(child, source),
                type_annotation: None,
                default_value: None,
                is_variadic: false,
                is_keyword: false,
            }),
            _ => {}
        }
    }
    out
}

fn extract_call_sites(body: Node, source: &[u8]) -> Vec<CallSiteDef> {
    let mut sites = Vec::new();
    for call in descendants_by_type(body, "call_expression") {
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
            "field_expression" => {
                // receiver.method()
                let callee = function
                    .child_by_field_name("field")
                    .map(|n| node_text(n, source))
                    .unwrap_or_default();
                if callee.is_empty() {
                    continue;
                }
                let receiver = function
                    .child_by_field_name("value")
                    .map(|n| node_text(n, source));
                sites.push(CallSiteDef {
                    callee,
                    line: start_line(call),
                    is_method_call: true,
                    receiver,
                });
            }
            "scoped_identifier" => {
                // Type::assoc() — record the final segment as callee.
                let text = node_text(function, source);
                let callee = text.rsplit("::").next().unwrap_or(&text).to_string();
                let receiver = text.rsplit_once("::").map(|(prefix, _)| prefix.to_string());
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

fn extract_function(node: Node, source: &[u8], is_method: bool) -> FunctionDef {
    let name = node
        .child_by_field_name("name")
        .map(|n| node_text(n, source))
        .unwrap_or_default();
    let is_async = children_of(node)
        .iter()
        .filter(|c| c.kind() == "function_modifiers")
        .any(|m| node_text(*m, source).contains("async"));
    let return_type = node
        .child_by_field_name("return_type")
        .map(|r| node_text(r, source));
    let body = node.child_by_field_name("body");

    let (complexity, call_sites, body_source) = match body {
        Some(b) => (
            cyclomatic_complexity(b, Lang::Rust, source),
            extract_call_sites(b, source),
            Some(node_text(b, source)),
        ),
        None => (1, Vec::new(), None),
    };

    let parameters = extract_parameters(node, source);
    let takes_self = parameters.iter().any(|p| p.name.contains("self"));

    FunctionDef {
        name,
        decorators: extract_attributes(node, source),
        parameters,
        return_type,
        is_async,
        is_static: is_method && !takes_self,
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

/// Outer attributes (`#[derive(..)]`, `#[tokio::main]`) recorded as
/// decorator text.
fn extract_attributes(node: Node, source: &[u8]) -> Vec<String> {
    let Some(parent) = node.parent() else {
        return Vec::new();
    };
    let mut attrs = Vec::new();
    let mut cursor = parent.walk();
    for sibling in parent.children(&mut cursor) {
        if sibling.end_byte() > node.start_byte() {
            break;
        }
        if sibling.kind() == "attribute_item" {
            attrs.push(
                node_text(sibling, source)
                    .trim_start_matches("#[")
                    .trim_end_matches(']')
                    .to_string(),
            );
        } else if sibling.kind() != "line_comment" && sibling.kind() != "block_comment" {
            attrs.clear();
        }
    }
    attrs
}

fn extract_struct_or_enum(node: Node, source: &[u8]) -> ClassDef {
    let name = node
        .child_by_field_name("name")
        .map(|n| node_text(n, source))
        .unwrap_or_default();

    let mut attributes = Vec::new();
    let mut attribute_types = Vec::new();
    if let Some(body) = node.child_by_field_name("body") {
        for child in children_of(body)
            .into_iter()
            .filter(|c| matches!(c.kind(), "field_declaration" | "enum_variant"))
        {
            let Some(field_name) = child.child_by_field_name("name").map(|n| node_text(n, source))
            else {
                continue;
            };
            attributes.push(field_name.clone());
            attribute_types.push(AttributeDef {
                name: field_name,
                type_annotation: child
                    .child_by_field_name("type")
                    .map(|t| node_text(t, source)),
            });
        }
    }

    ClassDef {
        name,
        bases: Vec::new(),
        decorators: extract_attributes(node, source),
        docstring: None,
        methods: Vec::new(),
        attributes,
        attribute_types,
        start_line: start_line(node),
        end_line: end_line(node),
    }
}

fn extract_trait(node: Node, source: &[u8]) -> ClassDef {
    let name = node
        .child_by_field_name("name")
        .map(|n| node_text(n, source))
        .unwrap_or_default();

    let mut methods = Vec::new();
    if let Some(body) = node.child_by_field_name("body") {
        for child in children_of(body) {
            match child.kind() {
                "function_item" => {
                    let mut m = extract_function(child, source, true);
                    m.is_method = true;
                    methods.push(m);
                }
                "function_signature_item" => {
                    let mut sig = FunctionDef::named(
                        child
                            .child_by_field_name("name")
                            .map(|n| node_text(n, source))
                            .unwrap_or_default(),
                    );
                    sig.is_method = true;
                    sig.parameters = extract_parameters(child, source);
                    sig.return_type = child
                        .child_by_field_name("return_type")
                        .map(|r| node_text(r, source));
                    sig.start_line = start_line(child);
                    sig.end_line = end_line(child);
                    methods.push(sig);
                }
                _ => {}
            }
        }
    }

    ClassDef {
        name,
        bases: Vec::new(),
        decorators: Vec::new(),
        docstring: None,
        methods,
        attributes: Vec::new(),
        attribute_types: Vec::new(),
        start_line: start_line(node),
        end_line: end_line(node),
    }
}

/// `(type_name, trait_name, methods)` for an impl block.
fn extract_impl(node: Node, source: &[u8]) -> Option<(String, Option<String>, Vec<FunctionDef>)> {
    let type_name = node
        .child_by_field_name("type")
        .map(|t| node_text(t, source))?;
    // Generic parameters are not part of the class name.
    let type_name = type_name
        .split('<')
        .next()
        .unwrap_or(&type_name)
        .trim()
        .to_string();
    let trait_name = node.child_by_field_name("trait").map(|t| {
        let text = node_text(t, source);
        text.split('<').next().unwrap_or(&text).trim().to_string()
    });

    let mut methods = Vec::new();
    if let Some(body) = node.child_by_field_name("body") {
        for child in children_of(body) {
            if child.kind() == "function_item" {
                methods.push(extract_function(child, source, true));
            }
        }
    }
    Some((type_name, trait_name, methods))
}
