//! Structural fact extraction from C#-style source text.
//!
//! Extraction is a pure function of `(path, text, config)`: it never consults
//! other files. Everything cross-file (which names are types, which
//! namespaces exist) is resolved later by the graph builder.
//!
//! ## Pipeline
//!
//! 1. [`source::code_lines`] blanks comments and literal contents.
//! 2. [`scope::declared_namespace`] and [`scope::type_declarations`] find the
//!    namespace and the top-level types.
//! 3. [`scope::extract_scope`] cuts out each type's header and body.
//! 4. Line scans collect `using` imports, qualified references and tokens.

pub mod patterns;
pub mod scope;
pub mod source;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::AnalyzerConfig;
use scope::{ScopeLine, TypeKeyword};

static IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:global\s+)?using\s+(?:static\s+)?(?:[A-Za-z_]\w*\s*=\s*)?([A-Za-z_][\w.]*)\s*;",
    )
    .expect("valid using regex")
});

static NAMESPACE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*namespace\b").expect("valid namespace line regex"));

static QUALIFIED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^\w.])([A-Z]\w*(?:\.[A-Z]\w*)+)(\s*[(<])?").expect("valid qualified regex")
});

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z_]\w*").expect("valid token regex"));

/// C# keywords and built-in type aliases. Sorted for binary search.
const KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "base", "bool", "break", "byte", "case", "catch",
    "char", "checked", "class", "const", "continue", "decimal", "default", "delegate", "do",
    "double", "dynamic", "else", "enum", "event", "explicit", "extern", "false", "finally",
    "fixed", "float", "for", "foreach", "get", "global", "goto", "if", "implicit", "in",
    "init", "int", "interface", "internal", "is", "lock", "long", "nameof", "namespace", "new",
    "null", "object", "operator", "out", "override", "params", "partial", "private",
    "protected", "public", "readonly", "record", "ref", "required", "return", "sbyte",
    "sealed", "set", "short", "sizeof", "stackalloc", "static", "string", "struct", "switch",
    "this", "throw", "true", "try", "typeof", "uint", "ulong", "unchecked", "unsafe",
    "ushort", "using", "value", "var", "virtual", "void", "volatile", "when", "where",
    "while", "yield",
];

/// Whether `word` is a C# keyword (never a dependency candidate).
#[must_use]
pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.binary_search(&word).is_ok()
}

/// A `using` directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportEdge {
    /// Imported namespace (or aliased target)
    pub namespace: String,
    /// 1-indexed line
    pub line: u32,
}

/// A dotted, capitalized token sequence implying a namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedRef {
    /// The sequence minus its final segment
    pub namespace: String,
    /// The matched sequence
    pub text: String,
    /// 1-indexed line
    pub line: u32,
}

/// A top-level type declared in a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredType {
    /// Short name
    pub name: String,
    /// Declaration keyword
    pub keyword: TypeKeyword,
    /// 1-indexed line of the declaration keyword
    pub line: u32,
    /// Base list as written (possibly dotted)
    pub bases: Vec<String>,
    /// Whether the type counts as an ECS system
    pub is_system: bool,
    /// Header and body lines
    pub scope: Vec<ScopeLine>,
}

/// Everything extracted from one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFacts {
    /// Path as discovered (relative to the workspace root)
    pub path: PathBuf,
    /// Declared namespace, or the configured default
    pub namespace: String,
    /// `using` directives in file order
    pub imports: Vec<ImportEdge>,
    /// Qualified references in file order
    pub qualified_refs: Vec<QualifiedRef>,
    /// Top-level types in declaration order
    pub types: Vec<DeclaredType>,
    /// Identifier tokens used anywhere in code (keywords excluded)
    pub tokens: BTreeSet<String>,
}

impl FileFacts {
    /// Short names of the file's top-level types.
    #[must_use]
    pub fn declared_names(&self) -> BTreeSet<String> {
        self.types.iter().map(|t| t.name.clone()).collect()
    }

    /// Names the file depends on: its tokens plus every namespace it imports
    /// or references by qualification. Its own namespace is left out.
    #[must_use]
    pub fn recorded_names(&self) -> BTreeSet<String> {
        let mut names = self.tokens.clone();
        names.extend(self.imports.iter().map(|i| i.namespace.clone()));
        names.extend(self.qualified_refs.iter().map(|q| q.namespace.clone()));
        names.remove(&self.namespace);
        names
    }

    /// Whether `namespace` is visible to code in this file.
    #[must_use]
    pub fn can_see(&self, namespace: &str, default_namespace: &str) -> bool {
        namespace == self.namespace
            || namespace == default_namespace
            || self.imports.iter().any(|i| i.namespace == namespace)
    }
}

/// Extract structural facts from one file's text.
#[must_use]
pub fn extract_facts(path: &Path, text: &str, config: &AnalyzerConfig) -> FileFacts {
    let lines = source::code_lines(text);

    let namespace =
        scope::declared_namespace(&lines).unwrap_or_else(|| config.default_namespace.clone());

    let mut imports = Vec::new();
    let mut qualified_refs = Vec::new();
    let mut tokens = BTreeSet::new();

    for (idx, line) in lines.iter().enumerate() {
        let number = line_number(idx);

        if let Some(caps) = IMPORT.captures(line) {
            if let Some(m) = caps.get(1) {
                imports.push(ImportEdge {
                    namespace: m.as_str().to_string(),
                    line: number,
                });
            }
        } else if !NAMESPACE_LINE.is_match(line) {
            qualified_refs.extend(qualified_in_line(line, number));
        }

        tokens.extend(
            TOKEN
                .find_iter(line)
                .map(|m| m.as_str())
                .filter(|t| !is_keyword(t))
                .map(ToString::to_string),
        );
    }

    let types = scope::type_declarations(&lines)
        .into_iter()
        .filter(|decl| !decl.nested)
        .map(|decl| {
            let scope_lines = scope::extract_scope(&lines, decl.line_index, decl.column);
            let bases = patterns::base_list(&declaration_header(&lines, decl.line_index, decl.column));
            let is_system = matches!(
                decl.keyword,
                TypeKeyword::Class | TypeKeyword::Struct | TypeKeyword::Record
            ) && config.system.is_system(&decl.name, &bases);
            DeclaredType {
                name: decl.name,
                keyword: decl.keyword,
                line: line_number(decl.line_index),
                bases,
                is_system,
                scope: scope_lines,
            }
        })
        .collect();

    FileFacts {
        path: path.to_path_buf(),
        namespace,
        imports,
        qualified_refs,
        types,
        tokens,
    }
}

/// Declaration text from the keyword up to the first `{` or `;`, joined
/// across lines so that wrapped base lists are seen whole.
fn declaration_header(lines: &[String], line_index: usize, column: usize) -> String {
    let mut header = String::new();
    for (idx, line) in lines.iter().enumerate().skip(line_index) {
        let text = if idx == line_index {
            line.get(column..).unwrap_or("")
        } else {
            line.as_str()
        };
        if let Some(end) = text.find(['{', ';']) {
            header.push_str(&text[..end]);
            break;
        }
        header.push_str(text);
        header.push(' ');
    }
    header
}

fn qualified_in_line(line: &str, number: u32) -> Vec<QualifiedRef> {
    let mut refs = Vec::new();
    for caps in QUALIFIED.captures_iter(line) {
        let Some(chain) = caps.get(1) else {
            continue;
        };
        // A trailing call or generic argument list means the last segment
        // is a member, not a type.
        let text = if caps.get(2).is_some() {
            match chain.as_str().rsplit_once('.') {
                Some((head, _)) => head,
                None => continue,
            }
        } else {
            chain.as_str()
        };
        if let Some((namespace, _)) = text.rsplit_once('.') {
            refs.push(QualifiedRef {
                namespace: namespace.to_string(),
                text: text.to_string(),
                line: number,
            });
        }
    }
    refs
}

#[allow(clippy::cast_possible_truncation)] // No source file has 4 billion lines
fn line_number(idx: usize) -> u32 {
    idx as u32 + 1
}
