//! Unit tests for mu-parser

use mu_core::Lang;

use crate::{IncrementalParser, parse_file, parse_source, stdlib::is_stdlib_import};

#[test]
fn test_parse_python_single_function() {
    let parsed = parse_file(b"def hello():\n    pass\n", "test.py", "python").unwrap();
    assert!(parsed.success());
    let module = parsed.module.unwrap();
    assert_eq!(module.name, "test");
    assert_eq!(module.functions.len(), 1);
    assert_eq!(module.functions[0].name, "hello");
    assert_eq!(module.functions[0].body_complexity, 1);
    assert!(module.imports.is_empty());
    assert!(module.classes.is_empty());
}

#[test]
fn test_parse_typescript_function_return_type() {
    let parsed = parse_file(b"function hello(): void {}", "test.ts", "typescript").unwrap();
    let module = parsed.module.unwrap();
    assert_eq!(module.functions.len(), 1);
    assert_eq!(module.functions[0].name, "hello");
    assert_eq!(module.functions[0].return_type.as_deref(), Some("void"));
    assert_eq!(module.functions[0].body_complexity, 1);
}

#[test]
fn test_unknown_language_rejected() {
    let err = parse_file(b"", "x.cob", "cobol").unwrap_err();
    assert!(matches!(err, mu_core::MuError::UnsupportedLanguage(_)));
}

#[test]
fn test_language_aliases_accepted() {
    assert!(parse_file(b"x = 1\n", "a.py", "py").is_ok());
    assert!(parse_file(b"let x = 1;", "a.ts", "ts").is_ok());
    assert!(parse_file(b"fn main() {}", "a.rs", "rs").is_ok());
}

#[test]
fn test_invalid_utf8_is_replaced_not_rejected() {
    let mut source = b"def ok():\n    pass\n# ".to_vec();
    source.extend_from_slice(&[0xff, 0xfe]);
    let parsed = parse_file(&source, "bad.py", "python").unwrap();
    assert!(parsed.module.is_some());
}

#[test]
fn test_parse_errors_tolerated() {
    let parsed = parse_file(b"def broken(:\n    pass\n\ndef ok():\n    pass\n", "b.py", "python").unwrap();
    assert!(parsed.has_errors);
    // Best-effort extraction still finds the well-formed function.
    let module = parsed.module.unwrap();
    assert!(module.functions.iter().any(|f| f.name == "ok"));
}

#[test]
fn test_python_imports() {
    let source = b"import os\nimport requests\nfrom pathlib import Path\nfrom .util import helper as h\n";
    let module = parse_source(source, "a.py", Lang::Python).module.unwrap();
    assert_eq!(module.imports.len(), 4);

    assert_eq!(module.imports[0].module, "os");
    assert!(!module.imports[0].is_from);

    let from_import = &module.imports[2];
    assert_eq!(from_import.module, "pathlib");
    assert!(from_import.is_from);
    assert_eq!(from_import.names, vec!["Path".to_string()]);

    let relative = &module.imports[3];
    assert_eq!(relative.module, ".util");
    assert_eq!(relative.alias.as_deref(), Some("h"));
}

#[test]
fn test_python_dynamic_import() {
    let source = b"import importlib\n\ndef load():\n    return importlib.import_module('plugins.auth')\n";
    let module = parse_source(source, "a.py", Lang::Python).module.unwrap();
    let dynamic: Vec<_> = module.imports.iter().filter(|i| i.is_dynamic).collect();
    assert_eq!(dynamic.len(), 1);
    assert_eq!(dynamic[0].module, "plugins.auth");
    assert_eq!(dynamic[0].dynamic_pattern.as_deref(), Some("importlib.import_module"));
}

#[test]
fn test_python_class_and_methods() {
    let source = br#"
class Worker(Base):
    """Does the work."""

    retries = 3
    backend: Store = None

    def __init__(self, name):
        self.name = name

    @staticmethod
    def helper():
        pass

    async def run(self):
        self.validate()
"#;
    let module = parse_source(source, "w.py", Lang::Python).module.unwrap();
    assert_eq!(module.classes.len(), 1);
    let class = &module.classes[0];
    assert_eq!(class.name, "Worker");
    assert_eq!(class.bases, vec!["Base".to_string()]);
    assert_eq!(class.docstring.as_deref(), Some("Does the work."));
    assert!(class.attributes.contains(&"retries".to_string()));
    assert!(class.attributes.contains(&"backend".to_string()));

    // Annotated class attributes keep their declared type.
    let backend = class
        .attribute_types
        .iter()
        .find(|a| a.name == "backend")
        .unwrap();
    assert_eq!(backend.type_annotation.as_deref(), Some("Store"));
    let retries = class
        .attribute_types
        .iter()
        .find(|a| a.name == "retries")
        .unwrap();
    assert_eq!(retries.type_annotation, None);
    assert_eq!(class.methods.len(), 3);

    let helper = class.methods.iter().find(|m| m.name == "helper").unwrap();
    assert!(helper.is_static);
    assert!(helper.is_method);

    let run = class.methods.iter().find(|m| m.name == "run").unwrap();
    assert!(run.is_async);
}

#[test]
fn test_python_call_sites() {
    let source = br#"
def main():
    result = process_data()
    validate(result)
    return result
"#;
    let module = parse_source(source, "m.py", Lang::Python).module.unwrap();
    let callees: Vec<&str> = module.functions[0]
        .call_sites
        .iter()
        .map(|c| c.callee.as_str())
        .collect();
    assert!(callees.contains(&"process_data"));
    assert!(callees.contains(&"validate"));
}

#[test]
fn test_python_method_call_receiver_preserved() {
    let source = br#"
class Worker:
    def process(self):
        self.validate()
        self.save()
"#;
    let module = parse_source(source, "w.py", Lang::Python).module.unwrap();
    let method = &module.classes[0].methods[0];
    let self_calls: Vec<_> = method
        .call_sites
        .iter()
        .filter(|c| c.receiver.as_deref() == Some("self"))
        .collect();
    assert_eq!(self_calls.len(), 2);
    assert!(self_calls.iter().all(|c| c.is_method_call));
}

#[test]
fn test_python_nested_calls() {
    let source = b"def process(x):\n    return outer(inner(x))\n";
    let module = parse_source(source, "n.py", Lang::Python).module.unwrap();
    let callees: Vec<&str> = module.functions[0]
        .call_sites
        .iter()
        .map(|c| c.callee.as_str())
        .collect();
    assert!(callees.contains(&"outer"));
    assert!(callees.contains(&"inner"));
}

#[test]
fn test_python_parameters() {
    let source = b"def f(a, b: int, c=1, *args, **kwargs):\n    pass\n";
    let module = parse_source(source, "p.py", Lang::Python).module.unwrap();
    let params = &module.functions[0].parameters;
    assert_eq!(params.len(), 5);
    assert_eq!(params[0].name, "a");
    assert_eq!(params[1].type_annotation.as_deref(), Some("int"));
    assert_eq!(params[2].default_value.as_deref(), Some("1"));
    assert!(params[3].is_variadic);
    assert!(params[4].is_keyword);
}

#[test]
fn test_complexity_decision_points() {
    let source = br#"
def complex(x):
    if x > 0:
        for i in range(x):
            if i % 2 == 0 and i > 2:
                pass
    return x
"#;
    let module = parse_source(source, "c.py", Lang::Python).module.unwrap();
    // base 1 + if + for + if + and = 5
    assert_eq!(module.functions[0].body_complexity, 5);
}

#[test]
fn test_complexity_base_is_one() {
    let module = parse_source(b"def trivial():\n    return 1\n", "t.py", Lang::Python)
        .module
        .unwrap();
    assert_eq!(module.functions[0].body_complexity, 1);

    let module = parse_source(b"function f() { return 1; }", "t.js", Lang::JavaScript)
        .module
        .unwrap();
    assert_eq!(module.functions[0].body_complexity, 1);
}

#[test]
fn test_complexity_short_circuit_operators_ts() {
    let source = b"function f(a, b) { if (a && b) { return a || b; } return a ?? b; }";
    let module = parse_source(source, "s.ts", Lang::TypeScript).module.unwrap();
    // base 1 + if + && + || + ?? = 5
    assert_eq!(module.functions[0].body_complexity, 5);
}

#[test]
fn test_complexity_plain_binary_ops_do_not_count() {
    let source = b"function f(a, b) { return a + b * 2; }";
    let module = parse_source(source, "s.ts", Lang::TypeScript).module.unwrap();
    assert_eq!(module.functions[0].body_complexity, 1);
}

#[test]
fn test_typescript_class() {
    let source = br#"
import { Base } from "./base";

export class Service extends Base {
    count = 0;
    client: HttpClient;

    async fetch(url: string): Promise<string> {
        return this.client.get(url);
    }
}
"#;
    let module = parse_source(source, "svc.ts", Lang::TypeScript).module.unwrap();
    assert_eq!(module.imports.len(), 1);
    assert_eq!(module.imports[0].module, "./base");
    assert_eq!(module.imports[0].names, vec!["Base".to_string()]);

    assert_eq!(module.classes.len(), 1);
    let class = &module.classes[0];
    assert_eq!(class.name, "Service");
    assert_eq!(class.bases, vec!["Base".to_string()]);
    assert!(class.attributes.contains(&"count".to_string()));

    let client = class
        .attribute_types
        .iter()
        .find(|a| a.name == "client")
        .unwrap();
    assert_eq!(client.type_annotation.as_deref(), Some("HttpClient"));

    let fetch = class.methods.iter().find(|m| m.name == "fetch").unwrap();
    assert!(fetch.is_async);
    assert!(fetch.is_method);
    let this_call = fetch.call_sites.iter().find(|c| c.callee == "get").unwrap();
    assert_eq!(this_call.receiver.as_deref(), Some("this.client"));
}

#[test]
fn test_typescript_arrow_binding() {
    let source = b"export const handler = async (req: Request) => { return respond(req); };";
    let module = parse_source(source, "h.ts", Lang::TypeScript).module.unwrap();
    assert_eq!(module.functions.len(), 1);
    assert_eq!(module.functions[0].name, "handler");
    assert!(module.functions[0].is_async);
}

#[test]
fn test_javascript_require_import() {
    let source = b"const fs = require('fs');\nconst local = require('./local');\n";
    let module = parse_source(source, "r.js", Lang::JavaScript).module.unwrap();
    assert_eq!(module.imports.len(), 2);
    assert_eq!(module.imports[0].module, "fs");
    assert_eq!(module.imports[1].module, "./local");
}

#[test]
fn test_go_structs_and_methods() {
    let source = br#"
package main

import (
    "fmt"
    "example.com/pkg/util"
)

type Server struct {
    Port int
}

func (s *Server) Run() {
    fmt.Println(s.Port)
}

func main() {
    helper()
}
"#;
    let module = parse_source(source, "main.go", Lang::Go).module.unwrap();
    assert_eq!(module.imports.len(), 2);
    assert_eq!(module.imports[0].module, "fmt");

    let server = module.classes.iter().find(|c| c.name == "Server").unwrap();
    assert!(server.attributes.contains(&"Port".to_string()));
    let port = server
        .attribute_types
        .iter()
        .find(|a| a.name == "Port")
        .unwrap();
    assert_eq!(port.type_annotation.as_deref(), Some("int"));
    assert_eq!(server.methods.len(), 1);
    assert_eq!(server.methods[0].name, "Run");

    let main = module.functions.iter().find(|f| f.name == "main").unwrap();
    assert!(main.call_sites.iter().any(|c| c.callee == "helper"));
}

#[test]
fn test_rust_impl_attaches_methods() {
    let source = br#"
use std::collections::HashMap;

pub struct Engine {
    cache: HashMap<String, String>,
}

impl Engine {
    pub fn new() -> Self {
        Engine { cache: HashMap::new() }
    }

    pub fn run(&self) -> bool {
        self.check()
    }
}
"#;
    let module = parse_source(source, "e.rs", Lang::Rust).module.unwrap();
    let engine = module.classes.iter().find(|c| c.name == "Engine").unwrap();
    assert_eq!(engine.methods.len(), 2);

    let new = engine.methods.iter().find(|m| m.name == "new").unwrap();
    assert!(new.is_static); // no self receiver

    let run = engine.methods.iter().find(|m| m.name == "run").unwrap();
    assert!(!run.is_static);
    assert!(run.call_sites.iter().any(|c| c.callee == "check"));
}

#[test]
fn test_java_constructor_folds_into_methods() {
    let source = br#"
import java.util.List;
import com.example.Base;

public class Account extends Base {
    private int balance;

    public Account(int balance) {
        this.balance = balance;
    }

    public int getBalance() {
        return balance;
    }
}
"#;
    let module = parse_source(source, "Account.java", Lang::Java).module.unwrap();
    assert_eq!(module.imports.len(), 2);

    let account = &module.classes[0];
    assert_eq!(account.name, "Account");
    assert_eq!(account.bases, vec!["Base".to_string()]);
    assert!(account.attributes.contains(&"balance".to_string()));
    // Constructor named like the class.
    assert!(account.methods.iter().filter(|m| m.name == "Account").count() == 1);
    assert!(account.methods.iter().any(|m| m.name == "getBalance"));
}

#[test]
fn test_csharp_properties_become_attributes() {
    let source = br#"
using System;
using MyCompany.Models;

namespace App
{
    public class Customer : IEntity
    {
        public string Name { get; set; }
        private int age;

        public void Greet()
        {
            Console.WriteLine(Name);
        }
    }
}
"#;
    let module = parse_source(source, "Customer.cs", Lang::CSharp).module.unwrap();
    assert_eq!(module.imports.len(), 2);

    let customer = &module.classes[0];
    assert_eq!(customer.name, "Customer");
    assert_eq!(customer.bases, vec!["IEntity".to_string()]);
    assert!(customer.attributes.contains(&"Name".to_string()));
    assert!(customer.attributes.contains(&"age".to_string()));

    // Properties and fields keep their declared type.
    let name_prop = customer
        .attribute_types
        .iter()
        .find(|a| a.name == "Name")
        .unwrap();
    assert_eq!(name_prop.type_annotation.as_deref(), Some("string"));
    let age_field = customer
        .attribute_types
        .iter()
        .find(|a| a.name == "age")
        .unwrap();
    assert_eq!(age_field.type_annotation.as_deref(), Some("int"));

    let greet = customer.methods.iter().find(|m| m.name == "Greet").unwrap();
    let call = greet.call_sites.iter().find(|c| c.callee == "WriteLine").unwrap();
    assert_eq!(call.receiver.as_deref(), Some("Console"));
}

#[test]
fn test_stdlib_suppression_sets() {
    assert!(is_stdlib_import("os", Lang::Python));
    assert!(is_stdlib_import("os.path", Lang::Python));
    assert!(!is_stdlib_import("requests", Lang::Python));

    assert!(is_stdlib_import("fs", Lang::TypeScript));
    assert!(is_stdlib_import("node:fs", Lang::TypeScript));
    assert!(!is_stdlib_import("react", Lang::TypeScript));

    assert!(is_stdlib_import("System.Text", Lang::CSharp));
    assert!(!is_stdlib_import("Newtonsoft.Json", Lang::CSharp));

    assert!(is_stdlib_import("fmt", Lang::Go));
    assert!(is_stdlib_import("net/http", Lang::Go));
    assert!(!is_stdlib_import("example.com/pkg", Lang::Go));

    assert!(is_stdlib_import("std", Lang::Rust));
    assert!(is_stdlib_import("std::collections::HashMap", Lang::Rust));
    assert!(!is_stdlib_import("serde", Lang::Rust));

    assert!(is_stdlib_import("java.util.List", Lang::Java));
    assert!(is_stdlib_import("com.sun.misc.Unsafe", Lang::Java));
    assert!(!is_stdlib_import("com.example.App", Lang::Java));
}

#[test]
fn test_relative_imports_never_stdlib() {
    assert!(!is_stdlib_import("./util", Lang::TypeScript));
    assert!(!is_stdlib_import(".util", Lang::Python));
    assert!(!is_stdlib_import("../lib", Lang::JavaScript));
}

#[test]
fn test_incremental_edit_matches_full_parse() {
    let source = "def hello():\n    pass\n";
    let mut incremental = IncrementalParser::new(Lang::Python, source, "i.py").unwrap();

    // Rename hello -> world (bytes 4..9).
    incremental.apply_edit(4, 9, 9, "world").unwrap();
    let edited = incremental.module().unwrap();

    let full = parse_source(b"def world():\n    pass\n", "i.py", Lang::Python)
        .module
        .unwrap();
    assert_eq!(edited, full);
}

#[test]
fn test_incremental_edit_sequence_roundtrip() {
    let mut incremental = IncrementalParser::new(Lang::Python, "x = 1\n", "s.py").unwrap();
    incremental
        .apply_edit(6, 6, 28, "def f():\n    return x\n")
        .unwrap();
    incremental.apply_edit(0, 0, 10, "import os\n").unwrap();

    let expected_source = "import os\nx = 1\ndef f():\n    return x\n";
    assert_eq!(incremental.source(), expected_source);

    let edited = incremental.module().unwrap();
    let full = parse_source(expected_source.as_bytes(), "s.py", Lang::Python)
        .module
        .unwrap();
    assert_eq!(edited, full);
}

#[test]
fn test_incremental_reset() {
    let mut incremental = IncrementalParser::new(Lang::Python, "x = 1\n", "r.py").unwrap();
    incremental.reset("def g():\n    pass\n");
    let module = incremental.module().unwrap();
    assert_eq!(module.functions.len(), 1);
    assert_eq!(module.functions[0].name, "g");
}

#[test]
fn test_incremental_rejects_out_of_bounds_edit() {
    let mut incremental = IncrementalParser::new(Lang::Python, "x = 1\n", "r.py").unwrap();
    assert!(incremental.apply_edit(100, 120, 121, "y").is_err());
}

#[test]
fn test_incremental_rejects_inconsistent_new_end() {
    let mut incremental = IncrementalParser::new(Lang::Python, "x = 1\n", "r.py").unwrap();
    // new_end_byte must equal start_byte + new_text.len().
    assert!(incremental.apply_edit(0, 0, 5, "ab").is_err());
    assert!(incremental.apply_edit(0, 0, 2, "ab").is_ok());
}

mod scanner_tests {
    use crate::scanner::{Scanner, content_hash};

    #[test]
    fn test_scan_orders_and_hashes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.py"), "x = 1\n").unwrap();
        std::fs::write(dir.path().join("a.py"), "y = 2\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let entries = Scanner::new(dir.path()).scan().unwrap();
        let paths: Vec<&str> = entries.iter().map(|e| e.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["a.py", "b.py"]);
        assert_eq!(entries[0].content_hash, content_hash(b"y = 2\n"));
        assert_eq!(entries[0].size_bytes, 6);
    }

    #[test]
    fn test_scan_skips_default_ignored_dirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        std::fs::write(dir.path().join("node_modules/pkg/index.js"), "x").unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/main.js"), "y").unwrap();

        let entries = Scanner::new(dir.path()).scan().unwrap();
        let paths: Vec<&str> = entries.iter().map(|e| e.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["src/main.js"]);
    }

    #[test]
    fn test_scan_missing_root_fails() {
        let err = Scanner::new("/definitely/not/here").scan().unwrap_err();
        assert!(matches!(err, mu_core::MuError::Scan { .. }));
    }

    #[test]
    fn test_content_hash_is_sha256_hex() {
        let hash = content_hash(b"");
        assert_eq!(
            hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}

mod pool_tests {
    use mu_core::Lang;

    use crate::pool::{ParseRequest, create_parser_pool};

    #[tokio::test]
    async fn test_pool_parses_async() {
        let pool = create_parser_pool();
        let parsed = pool
            .parse(ParseRequest {
                source: b"def f():\n    pass\n".to_vec(),
                display_path: "f.py".to_string(),
                language: Lang::Python,
            })
            .await
            .unwrap();
        assert!(parsed.success());
        assert_eq!(parsed.module.unwrap().functions.len(), 1);
    }

    #[test]
    fn test_pool_parses_blocking() {
        let pool = create_parser_pool();
        let parsed = pool
            .parse_blocking(ParseRequest {
                source: b"fn main() {}".to_vec(),
                display_path: "m.rs".to_string(),
                language: Lang::Rust,
            })
            .unwrap();
        assert!(parsed.success());
    }
}
