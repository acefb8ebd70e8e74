//! Well-known standard-library prefixes per language
//!
//! Used by the graph builder to suppress EXTERNAL nodes for imports
//! the workspace will never contain. Sets cover the module/package
//! roots, not full dotted paths; matching takes the root segment of
//! the import (plus a two-segment probe for Java-style prefixes like
//! `com.sun`).

use crate::model::Lang;

/// Python 3.12 standard library modules.
const PYTHON_STDLIB: &[&str] = &[
    "_thread", "abc", "argparse", "array", "ast", "asyncio", "atexit", "base64", "bdb", "binascii",
    "bisect", "builtins", "bz2", "calendar", "cmath", "cmd", "code", "codecs", "codeop",
    "collections", "colorsys", "compileall", "concurrent", "configparser", "contextlib",
    "contextvars", "copy", "copyreg", "csv", "ctypes", "dataclasses", "datetime", "dbm", "decimal",
    "difflib", "dis", "doctest", "email", "ensurepip", "enum", "errno", "faulthandler", "fcntl",
    "filecmp", "fileinput", "fnmatch", "fractions", "ftplib", "functools", "gc", "getopt",
    "gettext", "glob", "graphlib", "grp", "gzip", "hashlib", "heapq", "hmac", "html", "http",
    "idlelib", "imaplib", "imp", "importlib", "inspect", "io", "ipaddress", "itertools", "json",
    "keyword", "linecache", "locale", "logging", "lzma", "mailbox", "marshal", "math", "mimetypes",
    "mmap", "modulefinder", "msvcrt", "multiprocessing", "netrc", "numbers", "operator",
    "optparse", "os", "parser", "pathlib", "pdb", "pickle", "pickletools", "pkgutil", "platform",
    "plistlib", "poplib", "posix", "pprint", "pty", "pwd", "py_compile", "pyclbr", "pydoc",
    "queue", "quopri", "random", "re", "readline", "reprlib", "resource", "rlcompleter", "runpy",
    "sched", "secrets", "select", "selectors", "shelve", "shlex", "shutil", "signal", "site",
    "smtplib", "socket", "socketserver", "sqlite3", "ssl", "stat", "statistics", "string",
    "stringprep", "struct", "subprocess", "symtable", "sys", "sysconfig", "syslog", "tabnanny",
    "tarfile", "tempfile", "termios", "test", "textwrap", "threading", "time", "timeit", "tkinter",
    "token", "tokenize", "tomllib", "trace", "traceback", "tracemalloc", "tty", "turtle", "types",
    "typing", "unicodedata", "unittest", "urllib", "uu", "uuid", "venv", "warnings", "wave",
    "weakref", "webbrowser", "winreg", "winsound", "wsgiref", "xml", "xmlrpc", "zipapp", "zipfile",
    "zipimport", "zlib", "zoneinfo",
];

/// Node.js builtins; the `node:` prefix resolves to its root too.
const NODE_STDLIB: &[&str] = &[
    "assert", "async_hooks", "buffer", "child_process", "cluster", "console", "constants",
    "crypto", "dgram", "diagnostics_channel", "dns", "domain", "events", "fs", "http", "http2",
    "https", "inspector", "module", "net", "node", "os", "path", "perf_hooks", "process",
    "punycode", "querystring", "readline", "repl", "stream", "string_decoder", "sys", "test",
    "timers", "tls", "trace_events", "tty", "url", "util", "v8", "vm", "wasi", "worker_threads",
    "zlib",
];

/// Common .NET framework namespace roots.
const CSHARP_STDLIB: &[&str] = &["Internal", "Microsoft", "Mono", "System", "Windows"];

/// Go standard library package roots.
const GO_STDLIB: &[&str] = &[
    "archive", "bufio", "builtin", "bytes", "cmp", "compress", "container", "context", "crypto",
    "database", "debug", "embed", "encoding", "errors", "expvar", "flag", "fmt", "go", "hash",
    "html", "image", "index", "internal", "io", "iter", "log", "maps", "math", "mime", "net",
    "os", "path", "plugin", "reflect", "regexp", "runtime", "slices", "sort", "strconv",
    "strings", "sync", "syscall", "testing", "text", "time", "unicode", "unique", "unsafe",
    "vendor",
];

const RUST_STDLIB: &[&str] = &["alloc", "core", "proc_macro", "std", "test"];

/// Java prefixes; entries may be two segments (`com.sun`).
const JAVA_STDLIB: &[&str] = &[
    "com.sun", "java", "javax", "jdk", "org.ietf", "org.w3c", "org.xml", "sun",
];

fn set_for(lang: Lang) -> &'static [&'static str] {
    match lang {
        Lang::Python => PYTHON_STDLIB,
        Lang::TypeScript | Lang::Tsx | Lang::JavaScript | Lang::Jsx => NODE_STDLIB,
        Lang::CSharp => CSHARP_STDLIB,
        Lang::Go => GO_STDLIB,
        Lang::Rust => RUST_STDLIB,
        Lang::Java => JAVA_STDLIB,
    }
}

/// True when `name` is a standard-library import for `language`.
///
/// The root segment of the import is matched (`os.path` → `os`,
/// `node:fs` → `node`, `std::io` → `std`); Java also probes the first
/// two segments for prefixes like `com.sun`.
pub fn is_stdlib_import(name: &str, language: Lang) -> bool {
    let name = name.trim();
    if name.is_empty() {
        return false;
    }
    // Relative imports are never stdlib.
    if name.starts_with('.') || name.starts_with("./") || name.starts_with("../") {
        return false;
    }

    let root = name
        .split(['.', '/', ':'])
        .find(|s| !s.is_empty())
        .unwrap_or(name);
    let set = set_for(language);
    if set.contains(&root) {
        return true;
    }

    if language == Lang::Java {
        let mut parts = name.split('.');
        if let (Some(a), Some(b)) = (parts.next(), parts.next()) {
            let two = format!("{a}.{b}");
            return set.contains(&two.as_str());
        }
    }
    false
}
