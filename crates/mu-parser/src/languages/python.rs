//! Python extractor

use mu_core::{
    AttributeDef, CallSiteDef, ClassDef, FunctionDef, ImportDef, Lang, ModuleAst, ParameterDef,
};
use tree_sitter::Node;

use crate::complexity::cyclomatic_complexity;
use crate::extractor::{
    LanguageExtractor, child_by_type, children_of, descendants_by_type, end_line, node_text,
    start_line, strip_quotes,
};

pub struct PythonExtractor;

impl LanguageExtractor for PythonExtractor {
    fn extract(&self, root: Node, source: &[u8], path: &str) -> ModuleAst {
        let mut module = ModuleAst::new(path, Lang::Python);
        module.total_lines = end_line(root);
        module.module_docstring = module_docstring(root, source);

        for child in children_of(root) {
            match child.kind() {
                "import_statement" | "import_from_statement" => {
                    module.imports.extend(extract_import(child, source));
                }
                "function_definition" => {
                    module.functions.push(extract_function(child, source, &[], false));
                }
                "class_definition" => {
                    module.classes.push(extract_class(child, source, &[]));
                }
                "decorated_definition" => {
                    let decorators = extract_decorators(child, source);
                    if let Some(def) = child_by_type(child, "function_definition") {
                        module
                            .functions
                            .push(extract_function(def, source, &decorators, false));
                    } else if let Some(def) = child_by_type(child, "class_definition") {
                        module.classes.push(extract_class(def, source, &decorators));
                    }
                }
                _ => {}
            }
        }

        // Dynamic imports anywhere in the file: importlib.import_module
        // and bare __import__ calls with a literal first argument.
        for call in descendants_by_type(root, "call") {
            if let Some(import) = dynamic_import(call, source) {
                module.imports.push(import);
            }
        }

        module
    }
}

fn module_docstring(root: Node, source: &[u8]) -> Option<String> {
    let first = children_of(root)
        .into_iter()
        .find(|c| c.kind() != "comment")?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let string = child_by_type(first, "string")?;
    Some(strip_quotes(&node_text(string, source)))
}

fn extract_import(node: Node, source: &[u8]) -> Vec<ImportDef> {
    let line = start_line(node);
    let mut imports = Vec::new();

    if node.kind() == "import_statement" {
        // import a.b, c as d
        for child in children_of(node) {
            match child.kind() {
                "dotted_name" => imports.push(ImportDef {
                    module: node_text(child, source),
                    names: Vec::new(),
                    alias: None,
                    is_from: false,
                    is_dynamic: false,
                    dynamic_pattern: None,
                    dynamic_source: None,
                    line_number: line,
                }),
                "aliased_import" => {
                    let module = child
                        .child_by_field_name("name")
                        .map(|n| node_text(n, source))
                        .unwrap_or_default();
                    let alias = child
                        .child_by_field_name("alias")
                        .map(|n| node_text(n, source));
                    imports.push(ImportDef {
                        module,
                        names: Vec::new(),
                        alias,
                        is_from: false,
                        is_dynamic: false,
                        dynamic_pattern: None,
                        dynamic_source: None,
                        line_number: line,
                    });
                }
                _ => {}
            }
        }
    } else {
        // from a.b import c, d as e
        let module = node
            .child_by_field_name("module_name")
            .map(|n| node_text(n, source))
            .unwrap_or_default();
        let mut names = Vec::new();
        let mut alias = None;
        let mut seen_import_kw = false;
        for child in children_of(node) {
            if child.kind() == "import" {
                seen_import_kw = true;
                continue;
            }
            if !seen_import_kw {
                continue;
            }
            match child.kind() {
                "dotted_name" => names.push(node_text(child, source)),
                "aliased_import" => {
                    if let Some(name) = child.child_by_field_name("name") {
                        names.push(node_text(name, source));
                    }
                    alias = child
                        .child_by_field_name("alias")
                        .map(|n| node_text(n, source));
                }
                "wildcard_import" => names.push("*".to_string()),
                _ => {}
            }
        }
        imports.push(ImportDef {
            module,
            names,
            alias,
            is_from: true,
            is_dynamic: false,
            dynamic_pattern: None,
            dynamic_source: None,
            line_number: line,
        });
    }
    imports
}

fn dynamic_import(call: Node, source: &[u8]) -> Option<ImportDef> {
    let function = call.child_by_field_name("function")?;
    let callee = node_text(function, source);
    let pattern = match callee.as_str() {
        "__import__" => "__import__",
        "importlib.import_module" => "importlib.import_module",
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
        is_dynamic: true,
        dynamic_pattern: Some(pattern.to_string()),
        dynamic_source: Some(node_text(call, source)),
        line_number: start_line(call),
    })
}

fn extract_decorators(decorated: Node, source: &[u8]) -> Vec<String> {
    children_of(decorated)
        .into_iter()
        .filter(|c| c.kind() == "decorator")
        .map(|c| node_text(c, source).trim_start_matches('@').trim().to_string())
        .collect()
}

fn extract_parameters(node: Node, source: &[u8]) -> Vec<ParameterDef> {
    let Some(params) = node.child_by_field_name("parameters") else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for child in children_of(params) {
        match child.kind() {
            "identifier" => out.push(ParameterDef {
                name: node_text(child, source),
                type_annotation: None,
                default_value: None,
                is_variadic: false,
                is_keyword: false,
            }),
            "typed_parameter" => {
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
                    is_variadic: false,
                    is_keyword: false,
                });
            }
            "default_parameter" | "typed_default_parameter" => {
                let name = child
                    .child_by_field_name("name")
                    .map(|n| node_text(n, source))
                    .unwrap_or_default();
                let annotation = child
                    .child_by_field_name("type")
                    .map(|t| node_text(t, source));
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
            "list_splat_pattern" => out.push(ParameterDef {
                name: node_text(child, source).trim_start_matches('*').to_string(),
                type_annotation: None,
                default_value: None,
                is_variadic: true,
                is_keyword: false,
            }),
            "dictionary_splat_pattern" => out.push(ParameterDef {
                name: node_text(child, source).trim_start_matches('*').to_string(),
                type_annotation: None,
                default_value: None,
                is_variadic: false,
                is_keyword: true,
            }),
            _ => {}
        }
    }
    out
}

fn extract_call_sites(body: Node, source: &[u8]) -> Vec<CallSiteDef> {
    let mut sites = Vec::new();
    for call in descendants_by_type(body, "call") {
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
            "attribute" => {
                let callee = function
                    .child_by_field_name("attribute")
                    .map(|n| node_text(n, source))
                    .unwrap_or_default();
                let receiver = function
                    .child_by_field_name("object")
                    .map(|n| node_text(n, source));
                if callee.is_empty() {
                    continue;
                }
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

fn docstring_of(body: Node, source: &[u8]) -> Option<String> {
    let first = children_of(body)
        .into_iter()
        .find(|c| c.kind() != "comment")?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let string = child_by_type(first, "string")?;
    Some(strip_quotes(&node_text(string, source)))
}

fn extract_function(node: Node, source: &[u8], decorators: &[String], is_method: bool) -> FunctionDef {
    let name = node
        .child_by_field_name("name")
        .map(|n| node_text(n, source))
        .unwrap_or_default();
    let is_async = children_of(node).iter().any(|c| c.kind() == "async");
    let return_type = node
        .child_by_field_name("return_type")
        .map(|n| node_text(n, source));
    let body = node.child_by_field_name("body");

    let (complexity, call_sites, docstring, body_source) = match body {
        Some(b) => (
            cyclomatic_complexity(b, Lang::Python, source),
            extract_call_sites(b, source),
            docstring_of(b, source),
            Some(node_text(b, source)),
        ),
        None => (1, Vec::new(), None, None),
    };

    FunctionDef {
        name,
        decorators: decorators.to_vec(),
        parameters: extract_parameters(node, source),
        return_type,
        is_async,
        is_static: decorators.iter().any(|d| d == "staticmethod"),
        is_classmethod: decorators.iter().any(|d| d == "classmethod"),
        is_property: decorators.iter().any(|d| d == "property" || d.ends_with(".setter")),
        is_method,
        docstring,
        body_complexity: complexity,
        body_source,
        call_sites,
        start_line: start_line(node),
        end_line: end_line(node),
    }
}

fn extract_class(node: Node, source: &[u8], decorators: &[String]) -> ClassDef {
    let name = node
        .child_by_field_name("name")
        .map(|n| node_text(n, source))
        .unwrap_or_default();

    let bases = node
        .child_by_field_name("superclasses")
        .map(|args| {
            children_of(args)
                .into_iter()
                .filter(|c| matches!(c.kind(), "identifier" | "attribute"))
                .map(|c| node_text(c, source))
                .collect()
        })
        .unwrap_or_default();

    let mut methods = Vec::new();
    let mut attributes = Vec::new();
    let mut attribute_types = Vec::new();
    let mut docstring = None;
    if let Some(body) = node.child_by_field_name("body") {
        docstring = docstring_of(body, source);
        for child in children_of(body) {
            match child.kind() {
                "function_definition" => {
                    methods.push(extract_function(child, source, &[], true));
                }
                "decorated_definition" => {
                    let decs = extract_decorators(child, source);
                    if let Some(def) = child_by_type(child, "function_definition") {
                        methods.push(extract_function(def, source, &decs, true));
                    }
                }
                "expression_statement" => {
                    // Class-level assignments become attributes; an
                    // `x: Foo` annotation keeps its declared type.
                    if let Some(assign) = child_by_type(child, "assignment") {
                        if let Some(left) = assign.child_by_field_name("left") {
                            if left.kind() == "identifier" {
                                let attr_name = node_text(left, source);
                                attributes.push(attr_name.clone());
                                attribute_types.push(AttributeDef {
                                    name: attr_name,
                                    type_annotation: assign
                                        .child_by_field_name("type")
                                        .map(|t| node_text(t, source)),
                                });
                            }
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
        decorators: decorators.to_vec(),
        docstring,
        methods,
        attributes,
        attribute_types,
        start_line: start_line(node),
        end_line: end_line(node),
    }
}
