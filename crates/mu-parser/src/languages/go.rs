//! Go extractor
//!
//! Structs and interfaces become classes; methods attach to their
//! receiver type when it is declared in the same file.

use mu_core::{
    AttributeDef, CallSiteDef, ClassDef, FunctionDef, ImportDef, Lang, ModuleAst, ParameterDef,
};
use tree_sitter::Node;

use crate::complexity::cyclomatic_complexity;
use crate::extractor::{
    LanguageExtractor, children_of, descendants_by_type, end_line, node_text, start_line,
    strip_quotes,
};

pub struct GoExtractor;

impl LanguageExtractor for GoExtractor {
    fn extract(&self, root: Node, source: &[u8], path: &str) -> ModuleAst {
        let mut module = ModuleAst::new(path, Lang::Go);
        module.total_lines = end_line(root);

        let mut loose_methods: Vec<(String, FunctionDef)> = Vec::new();

        for child in children_of(root) {
            match child.kind() {
                "import_declaration" => {
                    module.imports.extend(extract_imports(child, source));
                }
                "function_declaration" => {
                    module.functions.push(extract_function(child, source, false));
                }
                "method_declaration" => {
                    if let Some((receiver, func)) = extract_method(child, source) {
                        loose_methods.push((receiver, func));
                    }
                }
                "type_declaration" => {
                    for spec in children_of(child)
                        .into_iter()
                        .filter(|c| c.kind() == "type_spec")
                    {
                        if let Some(class) = extract_type(spec, source) {
                            module.classes.push(class);
                        }
                    }
                }
                _ => {}
            }
        }

        // Attach methods to receiver types declared in this file;
        // methods on foreign types stay top-level functions.
        for (receiver, func) in loose_methods {
            match module.classes.iter_mut().find(|c| c.name == receiver) {
                Some(class) => class.methods.push(func),
                None => {
                    let mut free = func;
                    free.is_method = false;
                    module.functions.push(free);
                }
            }
        }

        module
    }
}

fn extract_imports(node: Node, source: &[u8]) -> Vec<ImportDef> {
    descendants_by_type(node, "import_spec")
        .into_iter()
        .filter_map(|spec| {
            let path = spec
                .child_by_field_name("path")
                .map(|p| strip_quotes(&node_text(p, source)))?;
            let alias = spec
                .child_by_field_name("name")
                .map(|n| node_text(n, source));
            Some(ImportDef {
                module: path,
                names: Vec::new(),
                alias,
                is_from: false,
                is_dynamic: false,
                dynamic_pattern: None,
                dynamic_source: None,
                line_number: start_line(spec),
            })
        })
        .collect()
}

fn extract_parameters(node: Node, source: &[u8]) -> Vec<ParameterDef> {
    let Some(params) = node.child_by_field_name("parameters") else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for child in children_of(params) {
        match child.kind() {
            "parameter_declaration" => {
                let annotation = child
                    .child_by_field_name("type")
                    .map(|t| node_text(t, source));
                let names: Vec<String> = children_of(child)
                    .into_iter()
                    .filter(|c| c.kind() == "identifier")
                    .map(|c| node_text(c, source))
                    .collect();
                if names.is_empty() {
                    // Unnamed parameter (type only).
                    out.push(ParameterDef {
                        name: String::new(),
                        type_annotation: annotation,
                        default_value: None,
                        is_variadic: false,
                        is_keyword: false,
                    });
                } else {
                    for name in names {
                        out.push(ParameterDef {
                            name,
                            type_annotation: annotation.clone(),
                            default_value: None,
                            is_variadic: false,
                            is_keyword: false,
                        });
                    }
                }
            }
            "variadic_parameter_declaration" => {
                let name = children_of(child)
                    .into_iter()
                    .find(|c| c.kind() == "identifier")
                    .map(|c| node_text(c, source))
                    .unwrap_or_default();
                let annotation = child
                    .child_by_field_name("type")
                    .map(|t| node_text(t, source));
                out.push(ParameterDef {
                    name,
                    type_annotation: annotation,
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
            "selector_expression" => {
                let callee = function
                    .child_by_field_name("field")
                    .map(|n| node_text(n, source))
                    .unwrap_or_default();
                if callee.is_empty() {
                    continue;
                }
                let receiver = function
                    .child_by_field_name("operand")
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

fn extract_function(node: Node, source: &[u8], is_method: bool) -> FunctionDef {
    let name = node
        .child_by_field_name("name")
        .map(|n| node_text(n, source))
        .unwrap_or_default();
    let return_type = node
        .child_by_field_name("result")
        .map(|r| node_text(r, source));
    let body = node.child_by_field_name("body");

    let (complexity, call_sites, body_source) = match body {
        Some(b) => (
            cyclomatic_complexity(b, Lang::Go, source),
            extract_call_sites(b, source),
            Some(node_text(b, source)),
        ),
        None => (1, Vec::new(), None),
    };

    FunctionDef {
        name,
        decorators: Vec::new(),
        parameters: extract_parameters(node, source),
        return_type,
        is_async: false,
        is_static: false,
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

/// Receiver type name of a method declaration (`func (s *Server) Run`
/// → `Server`).
fn receiver_type(node: Node, source: &[u8]) -> Option<String> {
    let receiver = node.child_by_field_name("receiver")?;
    for decl in descendants_by_type(receiver, "parameter_declaration") {
        if let Some(ty) = decl.child_by_field_name("type") {
            let text = node_text(ty, source);
            return Some(text.trim_start_matches('*').to_string());
        }
    }
    None
}

fn extract_method(node: Node, source: &[u8]) -> Option<(String, FunctionDef)> {
    let receiver = receiver_type(node, source)?;
    let func = extract_function(node, source, true);
    Some((receiver, func))
}

fn extract_type(spec: Node, source: &[u8]) -> Option<ClassDef> {
    let name = spec
        .child_by_field_name("name")
        .map(|n| node_text(n, source))?;
    let ty = spec.child_by_field_name("type")?;

    match ty.kind() {
        "struct_type" => {
            let mut attributes = Vec::new();
            let mut attribute_types = Vec::new();
            for field in descendants_by_type(ty, "field_declaration") {
                let declared_type = field
                    .child_by_field_name("type")
                    .map(|t| node_text(t, source));
                for ident in children_of(field)
                    .into_iter()
                    .filter(|c| c.kind() == "field_identifier")
                {
                    let field_name = node_text(ident, source);
                    attributes.push(field_name.clone());
                    attribute_types.push(AttributeDef {
                        name: field_name,
                        type_annotation: declared_type.clone(),
                    });
                }
            }
            Some(ClassDef {
                name,
                bases: Vec::new(),
                decorators: Vec::new(),
                docstring: None,
                methods: Vec::new(),
                attributes,
                attribute_types,
                start_line: start_line(spec),
                end_line: end_line(spec),
            })
        }
        "interface_type" => {
            let mut methods = Vec::new();
            // Grammar versions differ on the element node name.
            for kind in ["method_elem", "method_spec"] {
                for elem in descendants_by_type(ty, kind) {
                    let mut sig = FunctionDef::named(
                        elem.child_by_field_name("name")
                            .map(|n| node_text(n, source))
                            .unwrap_or_default(),
                    );
                    sig.is_method = true;
                    sig.parameters = extract_parameters(elem, source);
                    sig.return_type = elem
                        .child_by_field_name("result")
                        .map(|r| node_text(r, source));
                    sig.start_line = start_line(elem);
                    sig.end_line = end_line(elem);
                    methods.push(sig);
                }
            }
            Some(ClassDef {
                name,
                bases: Vec::new(),
                decorators: Vec::new(),
                docstring: None,
                methods,
                attributes: Vec::new(),
                attribute_types: Vec::new(),
                start_line: start_line(spec),
                end_line: end_line(spec),
            })
        }
        _ => None,
    }
}
