//! TypeScript / TSX extractor

use mu_core::{
    AttributeDef, CallSiteDef, ClassDef, FunctionDef, ImportDef, Lang, ModuleAst, ParameterDef,
};
use tree_sitter::Node;

use crate::complexity::cyclomatic_complexity;
use crate::extractor::{
    LanguageExtractor, child_by_type, children_of, descendants_by_type, end_line, node_text,
    start_line, strip_quotes,
};

pub struct TypeScriptExtractor;

impl LanguageExtractor for TypeScriptExtractor {
    fn extract(&self, root: Node, source: &[u8], path: &str) -> ModuleAst {
        extract_module(root, source, path, Lang::TypeScript)
    }
}

/// Shared by the TypeScript and JavaScript extractors; the JS grammar
/// simply never produces the type-only nodes.
pub(crate) fn extract_module(root: Node, source: &[u8], path: &str, lang: Lang) -> ModuleAst {
    let mut module = ModuleAst::new(path, lang);
    module.total_lines = end_line(root);

    for child in children_of(root) {
        collect_top_level(child, source, lang, &mut module);
    }

    // require() and dynamic import() calls anywhere in the file.
    for call in descendants_by_type(root, "call_expression") {
        if let Some(import) = dynamic_import(call, source) {
            module.imports.push(import);
        }
    }

    module
}

fn collect_top_level(node: Node, source: &[u8], lang: Lang, module: &mut ModuleAst) {
    match node.kind() {
        "import_statement" => {
            if let Some(import) = extract_import(node, source) {
                module.imports.push(import);
            }
        }
        "function_declaration" | "generator_function_declaration" => {
            module.functions.push(extract_function(node, source, lang, &[], false));
        }
        "class_declaration" => {
            module.classes.push(extract_class(node, source, lang, &[]));
        }
        "abstract_class_declaration" => {
            module.classes.push(extract_class(node, source, lang, &[]));
        }
        "interface_declaration" => {
            module.classes.push(extract_interface(node, source));
        }
        "lexical_declaration" | "variable_declaration" => {
            // const f = () => {} / const f = function () {}
            for declarator in children_of(node)
                .into_iter()
                .filter(|c| c.kind() == "variable_declarator")
            {
                if let Some(func) = arrow_binding(declarator, source, lang) {
                    module.functions.push(func);
                }
            }
        }
        "export_statement" => {
            // export function f() {} / export class C {} / export const f = ...
            for child in children_of(node) {
                collect_top_level(child, source, lang, module);
            }
        }
        _ => {}
    }
}

fn extract_import(node: Node, source: &[u8]) -> Option<ImportDef> {
    let module = node
        .child_by_field_name("source")
        .map(|s| strip_quotes(&node_text(s, source)))?;
    let mut names = Vec::new();
    let mut alias = None;
    let mut is_from = false;

    if let Some(clause) = child_by_type(node, "import_clause") {
        for child in children_of(clause) {
            match child.kind() {
                "identifier" => names.push(node_text(child, source)),
                "named_imports" => {
                    is_from = true;
                    for spec in children_of(child)
                        .into_iter()
                        .filter(|c| c.kind() == "import_specifier")
                    {
                        if let Some(name) = spec.child_by_field_name("name") {
                            names.push(node_text(name, source));
                        }
                    }
                }
                "namespace_import" => {
                    // import * as ns from "..."
                    alias = children_of(child)
                        .into_iter()
                        .find(|c| c.kind() == "identifier")
                        .map(|c| node_text(c, source));
                }
                _ => {}
            }
        }
    }

    Some(ImportDef {
        module,
        names,
        alias,
        is_from,
        is_dynamic: false,
        dynamic_pattern: None,
        dynamic_source: None,
        line_number: start_line(node),
    })
}

fn dynamic_import(call: Node, source: &[u8]) -> Option<ImportDef> {
    let function = call.child_by_field_name("function")?;
    let callee = node_text(function, source);
    let pattern = match callee.as_str() {
        "require" => "require",
        "import" => "import()",
        _ => return None,
    };
    let args = call.child_by_field_name("arguments")?;
    let first = children_of(args)
        .into_iter()
        .find(|c| c.kind() == "string")?;
    Some(ImportDef {
        module: strip_quotes(&node_text(first, source)),
        names: Vec::new(),
        alias: None,
        is_from: false,
        is_dynamic: pattern == "import()",
        dynamic_pattern: (pattern == "import()").then(|| pattern.to_string()),
        dynamic_source: (pattern == "import()").then(|| node_text(call, source)),
        line_number: start_line(call),
    })
}

fn type_annotation_text(node: Node, source: &[u8]) -> Option<String> {
    node.child_by_field_name("return_type").map(|t| {
        node_text(t, source)
            .trim_start_matches(':')
            .trim()
            .to_string()
    })
}

fn extract_parameters(node: Node, source: &[u8]) -> Vec<ParameterDef> {
    let Some(params) = node.child_by_field_name("parameters") else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for child in children_of(params) {
        match child.kind() {
            "required_parameter" | "optional_parameter" => {
                let name = child
                    .child_by_field_name("pattern")
                    .map(|p| node_text(p, source))
                    .unwrap_or_default();
                let annotation = child.child_by_field_name("type").map(|t| {
                    node_text(t, source)
                        .trim_start_matches(':')
                        .trim()
                        .to_string()
                });
                let default = child
                    .child_by_field_name("value")
                    .map(|v| node_text(v, source));
                out.push(ParameterDef {
                    name,
                    type_annotation: annotation,
                    default_value: default,
                    is_variadic: false,
                    is_keyword: false,
                });
            }
            "rest_parameter" => out.push(ParameterDef {
                name: node_text(child, source)
                    .trim_start_matches('.')
                    .to_string(),
                type_annotation: None,
                default_value: None,
                is_variadic: true,
                is_keyword: false,
            }),
            "identifier" => out.push(ParameterDef {
                // Bare arrow parameter: (x) => ...
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
            "identifier" => {
                let callee = node_text(function, source);
                if callee == "require" || callee == "import" {
                    continue;
                }
                sites.push(CallSiteDef {
                    callee,
                    line: start_line(call),
                    is_method_call: false,
                    receiver: None,
                });
            }
            "member_expression" => {
                let callee = function
                    .child_by_field_name("property")
                    .map(|n| node_text(n, source))
                    .unwrap_or_default();
                if callee.is_empty() {
                    continue;
                }
                let receiver = function
                    .child_by_field_name("object")
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

fn extract_decorators(node: Node, source: &[u8]) -> Vec<String> {
    children_of(node)
        .into_iter()
        .filter(|c| c.kind() == "decorator")
        .map(|c| node_text(c, source).trim_start_matches('@').trim().to_string())
        .collect()
}

fn extract_function(
    node: Node,
    source: &[u8],
    lang: Lang,
    decorators: &[String],
    is_method: bool,
) -> FunctionDef {
    let name = node
        .child_by_field_name("name")
        .map(|n| node_text(n, source))
        .unwrap_or_default();
    let is_async = children_of(node).iter().any(|c| c.kind() == "async");
    let is_static = children_of(node).iter().any(|c| c.kind() == "static");
    let body = node.child_by_field_name("body");

    let (complexity, call_sites, body_source) = match body {
        Some(b) => (
            cyclomatic_complexity(b, lang, source),
            extract_call_sites(b, source),
            Some(node_text(b, source)),
        ),
        None => (1, Vec::new(), None),
    };

    FunctionDef {
        name,
        decorators: decorators.to_vec(),
        parameters: extract_parameters(node, source),
        return_type: type_annotation_text(node, source),
        is_async,
        is_static,
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

fn arrow_binding(declarator: Node, source: &[u8], lang: Lang) -> Option<FunctionDef> {
    let name_node = declarator.child_by_field_name("name")?;
    let value = declarator.child_by_field_name("value")?;
    if !matches!(value.kind(), "arrow_function" | "function_expression" | "function") {
        return None;
    }
    let mut func = extract_function(value, source, lang, &[], false);
    func.name = node_text(name_node, source);
    func.start_line = start_line(declarator);
    func.end_line = end_line(declarator);
    Some(func)
}

fn extract_class(node: Node, source: &[u8], lang: Lang, decorators: &[String]) -> ClassDef {
    let name = node
        .child_by_field_name("name")
        .map(|n| node_text(n, source))
        .unwrap_or_default();

    // TS wraps bases in extends/implements clauses; the JS grammar
    // puts the expression straight under class_heritage.
    let mut bases = Vec::new();
    if let Some(heritage) = child_by_type(node, "class_heritage") {
        for clause in children_of(heritage) {
            match clause.kind() {
                "extends_clause" | "implements_clause" => {
                    bases.extend(
                        children_of(clause)
                            .into_iter()
                            .filter(|c| {
                                matches!(c.kind(), "identifier" | "type_identifier" | "member_expression")
                            })
                            .map(|c| node_text(c, source)),
                    );
                }
                "identifier" | "member_expression" => {
                    bases.push(node_text(clause, source));
                }
                _ => {}
            }
        }
    }

    let mut methods = Vec::new();
    let mut attributes = Vec::new();
    let mut attribute_types = Vec::new();
    if let Some(body) = node.child_by_field_name("body") {
        for child in children_of(body) {
            match child.kind() {
                "method_definition" => {
                    methods.push(extract_function(child, source, lang, &[], true));
                }
                "public_field_definition" | "field_definition" => {
                    if let Some(name) = child.child_by_field_name("name") {
                        let attr_name = node_text(name, source);
                        attributes.push(attr_name.clone());
                        attribute_types.push(AttributeDef {
                            name: attr_name,
                            type_annotation: field_type(child, source),
                        });
                    }
                }
                _ => {}
            }
        }
    }

    let own_decorators = if decorators.is_empty() {
        extract_decorators(node, source)
    } else {
        decorators.to_vec()
    };

    ClassDef {
        name,
        bases,
        decorators: own_decorators,
        docstring: None,
        methods,
        attributes,
        attribute_types,
        start_line: start_line(node),
        end_line: end_line(node),
    }
}

/// Declared type of a class field or property signature, with the
/// leading `:` of the annotation stripped.
fn field_type(node: Node, source: &[u8]) -> Option<String> {
    node.child_by_field_name("type").map(|t| {
        node_text(t, source)
            .trim_start_matches(':')
            .trim()
            .to_string()
    })
}

fn extract_interface(node: Node, source: &[u8]) -> ClassDef {
    let name = node
        .child_by_field_name("name")
        .map(|n| node_text(n, source))
        .unwrap_or_default();

    let mut bases = Vec::new();
    if let Some(heritage) = child_by_type(node, "extends_type_clause") {
        bases.extend(
            children_of(heritage)
                .into_iter()
                .filter(|c| c.kind() == "type_identifier")
                .map(|c| node_text(c, source)),
        );
    }

    let mut methods = Vec::new();
    let mut attributes = Vec::new();
    let mut attribute_types = Vec::new();
    if let Some(body) = node.child_by_field_name("body") {
        for child in children_of(body) {
            match child.kind() {
                "method_signature" => {
                    let mut sig = FunctionDef::named(
                        child
                            .child_by_field_name("name")
                            .map(|n| node_text(n, source))
                            .unwrap_or_default(),
                    );
                    sig.is_method = true;
                    sig.parameters = extract_parameters(child, source);
                    sig.return_type = type_annotation_text(child, source);
                    sig.start_line = start_line(child);
                    sig.end_line = end_line(child);
                    methods.push(sig);
                }
                "property_signature" => {
                    if let Some(name) = child.child_by_field_name("name") {
                        let attr_name = node_text(name, source);
                        attributes.push(attr_name.clone());
                        attribute_types.push(AttributeDef {
                            name: attr_name,
                            type_annotation: field_type(child, source),
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
        decorators: Vec::new(),
        docstring: None,
        methods,
        attributes,
        attribute_types,
        start_line: start_line(node),
        end_line: end_line(node),
    }
}
