//! Graph builder — derives typed nodes and edges from module ASTs
//!
//! All node ids are deterministic; re-running on unchanged inputs
//! yields identical node and edge sets byte-for-byte.

use std::collections::{BTreeMap, HashMap, HashSet};

use mu_core::model::{
    class_id, external_id, function_id, method_id, module_id,
};
use mu_core::stdlib::is_stdlib_import;
use mu_core::{
    ClassDef, Edge, EdgeProperties, EdgeType, FunctionDef, ImportDef, ModuleAst, Node,
    NodeProperties, NodeType,
};

/// Builder result plus diagnostics.
#[derive(Debug, Default)]
pub struct BuildOutput {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    /// Call sites whose callee could not be resolved to a node. These
    /// are dropped rather than materialized to EXTERNAL.
    pub dropped_calls: u32,
}

pub struct GraphBuilder;

impl GraphBuilder {
    /// Build nodes and edges for a set of modules. Import and
    /// inheritance targets are resolved against this set; anything
    /// unresolved becomes (or reuses) an `ext:` node.
    pub fn build(modules: &[ModuleAst]) -> BuildOutput {
        let mut out = BuildOutput::default();
        // qualified module name -> rel path
        let qualified: HashMap<String, String> = modules
            .iter()
            .map(|m| (m.qualified_name(), m.path.clone()))
            .collect();
        // class simple name -> (rel path, class name), first wins
        let mut classes_by_name: HashMap<&str, (&str, &str)> = HashMap::new();
        for module in modules {
            for class in &module.classes {
                classes_by_name
                    .entry(class.name.as_str())
                    .or_insert((module.path.as_str(), class.name.as_str()));
            }
        }

        // Shared across modules, keyed for reuse.
        let mut externals: BTreeMap<String, String> = BTreeMap::new();
        let mut edge_seen: HashSet<String> = HashSet::new();

        for module in modules {
            Self::build_module(
                module,
                &qualified,
                &classes_by_name,
                &mut externals,
                &mut edge_seen,
                &mut out,
            );
        }

        for (id, package) in externals {
            out.nodes.push(Node {
                id,
                node_type: NodeType::External,
                name: package.clone(),
                qualified_name: Some(package.clone()),
                file_path: String::new(),
                line_start: None,
                line_end: None,
                properties: NodeProperties::External { package },
                complexity: 0,
            });
        }

        out
    }

    fn build_module(
        module: &ModuleAst,
        qualified: &HashMap<String, String>,
        classes_by_name: &HashMap<&str, (&str, &str)>,
        externals: &mut BTreeMap<String, String>,
        edge_seen: &mut HashSet<String>,
        out: &mut BuildOutput,
    ) {
        let path = module.path.as_str();
        let mod_id = module_id(path);

        out.nodes.push(Node {
            id: mod_id.clone(),
            node_type: NodeType::Module,
            name: module.name.clone(),
            qualified_name: Some(module.qualified_name()),
            file_path: path.to_string(),
            line_start: Some(1),
            line_end: Some(module.total_lines.max(1)),
            properties: NodeProperties::Module {
                language: module.language,
                docstring: module.module_docstring.clone(),
                total_lines: module.total_lines,
                extra: Default::default(),
            },
            complexity: 0,
        });

        let own_classes: HashSet<&str> = module.classes.iter().map(|c| c.name.as_str()).collect();

        for class in &module.classes {
            let cls_id = class_id(path, &class.name);
            out.nodes.push(Self::class_node(module, class, &cls_id));
            push_edge(out, edge_seen, Edge::new(&mod_id, &cls_id, EdgeType::Contains));

            for base in &class.bases {
                let target = if own_classes.contains(base.as_str()) {
                    class_id(path, base)
                } else if let Some((base_path, base_name)) = classes_by_name.get(base.as_str()) {
                    class_id(base_path, base_name)
                } else {
                    intern_external(externals, base)
                };
                push_edge(out, edge_seen, Edge::new(&cls_id, &target, EdgeType::Inherits));
            }

            for method in &class.methods {
                let fn_id = method_id(path, &class.name, &method.name);
                out.nodes
                    .push(Self::function_node(module, method, &fn_id, Some(&class.name)));
                push_edge(out, edge_seen, Edge::new(&cls_id, &fn_id, EdgeType::Contains));
            }

            // Attribute type annotations referencing classes in the
            // module set become USES edges.
            for attribute in &class.attribute_types {
                let Some(annotation) = &attribute.type_annotation else {
                    continue;
                };
                let base = type_base_name(annotation);
                if base == class.name {
                    continue;
                }
                if let Some((uses_path, uses_name)) = classes_by_name.get(base) {
                    let target = class_id(uses_path, uses_name);
                    push_edge(out, edge_seen, Edge::new(&cls_id, &target, EdgeType::Uses));
                }
            }
        }

        for function in &module.functions {
            let fn_id = function_id(path, &function.name);
            out.nodes
                .push(Self::function_node(module, function, &fn_id, None));
            push_edge(out, edge_seen, Edge::new(&mod_id, &fn_id, EdgeType::Contains));
        }

        for import in &module.imports {
            if is_stdlib_import(&import.module, module.language) {
                continue;
            }
            let target = match resolve_import(module, import, qualified) {
                Some(target_path) => module_id(&target_path),
                None => intern_external(externals, &import_root(&import.module)),
            };
            let properties = EdgeProperties {
                names: import.names.clone(),
                alias: import.alias.clone(),
                is_dynamic: import.is_dynamic,
                line: Some(import.line_number),
            };
            push_edge(
                out,
                edge_seen,
                Edge::new(&mod_id, &target, EdgeType::Imports).with_properties(properties),
            );
        }

        Self::build_calls(module, edge_seen, out);
    }

    /// CALLS edges resolved within the module: top-level functions by
    /// name, sibling methods through `self`/`cls`/`this` receivers.
    /// Unresolved callees are dropped, not externalized.
    fn build_calls(module: &ModuleAst, edge_seen: &mut HashSet<String>, out: &mut BuildOutput) {
        let path = module.path.as_str();
        let top_level: HashSet<&str> = module.functions.iter().map(|f| f.name.as_str()).collect();

        for function in &module.functions {
            let caller_id = function_id(path, &function.name);
            for site in &function.call_sites {
                let target = (!site.is_method_call && top_level.contains(site.callee.as_str()))
                    .then(|| function_id(path, &site.callee));
                record_call(out, edge_seen, &caller_id, target);
            }
        }

        for class in &module.classes {
            for method in &class.methods {
                let caller_id = method_id(path, &class.name, &method.name);
                for site in &method.call_sites {
                    let receiver_is_self = matches!(
                        site.receiver.as_deref(),
                        Some("self") | Some("cls") | Some("this")
                    );
                    let target = if site.is_method_call && receiver_is_self {
                        class
                            .methods
                            .iter()
                            .any(|m| m.name == site.callee)
                            .then(|| method_id(path, &class.name, &site.callee))
                    } else if !site.is_method_call && top_level.contains(site.callee.as_str()) {
                        Some(function_id(path, &site.callee))
                    } else {
                        None
                    };
                    record_call(out, edge_seen, &caller_id, target);
                }
            }
        }
    }

    fn class_node(module: &ModuleAst, class: &ClassDef, id: &str) -> Node {
        Node {
            id: id.to_string(),
            node_type: NodeType::Class,
            name: class.name.clone(),
            qualified_name: Some(format!("{}.{}", module.qualified_name(), class.name)),
            file_path: module.path.clone(),
            line_start: Some(class.start_line),
            line_end: Some(class.end_line),
            properties: NodeProperties::Class {
                bases: class.bases.clone(),
                decorators: class.decorators.clone(),
                attributes: class.attributes.clone(),
                docstring: class.docstring.clone(),
                extra: Default::default(),
            },
            complexity: 0,
        }
    }

    fn function_node(module: &ModuleAst, function: &FunctionDef, id: &str, class: Option<&str>) -> Node {
        let qualified = match class {
            Some(class) => format!("{}.{}.{}", module.qualified_name(), class, function.name),
            None => format!("{}.{}", module.qualified_name(), function.name),
        };
        Node {
            id: id.to_string(),
            node_type: NodeType::Function,
            name: function.name.clone(),
            qualified_name: Some(qualified),
            file_path: module.path.clone(),
            line_start: Some(function.start_line),
            line_end: Some(function.end_line),
            properties: NodeProperties::Function {
                decorators: function.decorators.clone(),
                parameters: function.parameters.clone(),
                return_type: function.return_type.clone(),
                is_async: function.is_async,
                is_method: function.is_method,
                is_static: function.is_static,
                is_classmethod: function.is_classmethod,
                is_property: function.is_property,
                docstring: function.docstring.clone(),
                body_source: function.body_source.clone(),
                extra: Default::default(),
            },
            complexity: function.body_complexity.max(1),
        }
    }
}

fn push_edge(out: &mut BuildOutput, seen: &mut HashSet<String>, edge: Edge) {
    if seen.insert(edge.id.clone()) {
        out.edges.push(edge);
    }
}

fn record_call(out: &mut BuildOutput, seen: &mut HashSet<String>, caller_id: &str, target: Option<String>) {
    match target {
        Some(target) if target != caller_id => {
            push_edge(out, seen, Edge::new(caller_id, &target, EdgeType::Calls));
        }
        Some(_) => {} // self-recursion, no edge
        None => out.dropped_calls += 1,
    }
}

fn intern_external(externals: &mut BTreeMap<String, String>, package: &str) -> String {
    let id = external_id(package);
    externals.entry(id.clone()).or_insert_with(|| package.to_string());
    id
}

/// Simple-name base of a type annotation, for resolving against the
/// class set (`List<User>` → `List`, `Customer?` → `Customer`,
/// `models.Account` → `Account`, `*Server` → `Server`). Container
/// generics are not unwrapped.
fn type_base_name(annotation: &str) -> &str {
    let base = annotation.trim().trim_start_matches(':').trim();
    let base = base.split('<').next().unwrap_or(base);
    let base = base.split('[').next().unwrap_or(base);
    let base = base
        .trim_start_matches(['&', '*'])
        .trim_end_matches(['?', '*']);
    let base = base.rsplit('.').next().unwrap_or(base);
    base.trim()
}

/// Root segment used for EXTERNAL node identity (`requests.auth` →
/// `requests`, `@scope/pkg/sub` → `@scope/pkg`).
fn import_root(module: &str) -> String {
    if let Some(rest) = module.strip_prefix('@') {
        let mut parts = rest.splitn(2, '/');
        let scope = parts.next().unwrap_or("");
        let package = parts
            .next()
            .map(|r| r.split('/').next().unwrap_or(""))
            .unwrap_or("");
        if package.is_empty() {
            return format!("@{scope}");
        }
        return format!("@{scope}/{package}");
    }
    module
        .split(['/', '.', ':'])
        .find(|s| !s.is_empty())
        .unwrap_or(module)
        .to_string()
}

/// Resolve an import to a module path in the set: exact qualified name
/// first, then relative-path interpretation against the importing
/// module's package.
fn resolve_import(
    module: &ModuleAst,
    import: &ImportDef,
    qualified: &HashMap<String, String>,
) -> Option<String> {
    let target = import.module.as_str();

    // Path-style relative imports (./x, ../y) from JS-family sources.
    // Qualified names are the path sans extension, dotted, so the
    // resolved specifier maps straight onto them (with an `index`
    // probe for barrel files).
    if target.starts_with("./") || target.starts_with("../") {
        let resolved = resolve_path_relative(&module.path, target)?;
        let dotted = resolved.replace('/', ".");
        if let Some(path) = qualified.get(&dotted) {
            return Some(path.clone());
        }
        return qualified.get(&format!("{dotted}.index")).cloned();
    }

    // Python-style relative imports (.util, ..pkg.mod).
    if target.starts_with('.') {
        let dots = target.chars().take_while(|&c| c == '.').count();
        let rest = &target[dots..];
        let pkg = module.package();
        let mut package: Vec<String> = if pkg.is_empty() {
            Vec::new()
        } else {
            pkg.split('.').map(str::to_string).collect()
        };
        for _ in 1..dots {
            package.pop()?;
        }
        if !rest.is_empty() {
            package.extend(rest.split('.').map(str::to_string));
        }
        let dotted = package.join(".");
        return qualified.get(&dotted).cloned();
    }

    // Absolute: dotted form matches a module's qualified name.
    let dotted = target.replace('/', ".");
    qualified.get(&dotted).cloned()
}

/// Join a relative specifier against the importing file's directory.
fn resolve_path_relative(module_path: &str, spec: &str) -> Option<String> {
    let mut parts: Vec<&str> = module_path.split('/').collect();
    parts.pop(); // drop the file name
    for segment in spec.split('/') {
        match segment {
            "." | "" => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}
