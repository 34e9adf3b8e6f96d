//! Type declaration discovery, nesting, and per-type scope extraction.
//!
//! Works on code-only lines from [`super::source::code_lines`], so braces in
//! comments and literals never disturb the balance.
//!
//! ## Nesting
//!
//! A forward scan keeps a stack with one entry per open brace, tagged with
//! what opened it (namespace, type, or any other block). A declaration is
//! top-level when no enclosing entry is a type. A namespace block only raises
//! the balance to one, which still counts as "just inside the namespace".
//!
//! ## Scopes
//!
//! [`extract_scope`] walks forward from the declaration character by
//! character and collects lines from the first `{` until the balance returns
//! to zero. Unterminated scopes run to end of input.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub(crate) static TYPE_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(record\s+struct|record\s+class|record|class|struct|interface|enum)\s+([A-Za-z_]\w*)",
    )
    .expect("valid type declaration regex")
});

static NAMESPACE_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bnamespace\s+([A-Za-z_][\w.]*)").expect("valid namespace regex")
});

/// Declaration keyword of a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKeyword {
    /// `class`
    Class,
    /// `struct`
    Struct,
    /// `interface`
    Interface,
    /// `enum`
    Enum,
    /// `record`, `record class`, `record struct`
    Record,
}

impl TypeKeyword {
    fn parse(keyword: &str) -> Self {
        match keyword {
            "class" => Self::Class,
            "struct" => Self::Struct,
            "interface" => Self::Interface,
            "enum" => Self::Enum,
            _ => Self::Record,
        }
    }
}

/// A type declaration found in a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDeclaration {
    /// Declared name (generic parameters excluded)
    pub name: String,
    /// Declaration keyword
    pub keyword: TypeKeyword,
    /// 0-indexed line of the keyword
    pub line_index: usize,
    /// Byte column of the keyword
    pub column: usize,
    /// Whether the declaration sits inside another type's body
    pub nested: bool,
}

/// A line of a type's scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeLine {
    /// 1-indexed line number
    pub number: u32,
    /// Code-only text of the line
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeKind {
    Namespace,
    Type,
    Block,
}

#[derive(Debug, Clone, Copy)]
enum Event {
    Namespace,
    Type(usize),
    Open,
    Close,
    Semicolon,
}

/// First namespace declared in the file (block or file-scoped form).
#[must_use]
pub fn declared_namespace(lines: &[String]) -> Option<String> {
    lines.iter().find_map(|line| {
        NAMESPACE_DECL
            .captures(line)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    })
}

/// All type declarations in `lines`, with nesting resolved.
#[must_use]
pub fn type_declarations(lines: &[String]) -> Vec<TypeDeclaration> {
    let mut declarations = Vec::new();
    let mut stack: Vec<ScopeKind> = Vec::new();
    let mut pending: Option<ScopeKind> = None;

    for (line_index, line) in lines.iter().enumerate() {
        let mut events: Vec<(usize, Event)> = Vec::new();

        if let Some(m) = NAMESPACE_DECL.find(line) {
            events.push((m.start(), Event::Namespace));
        }
        for caps in TYPE_DECL.captures_iter(line) {
            let (Some(keyword), Some(name)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            if super::is_keyword(name.as_str()) {
                continue;
            }
            events.push((keyword.start(), Event::Type(declarations.len())));
            declarations.push(TypeDeclaration {
                name: name.as_str().to_string(),
                keyword: TypeKeyword::parse(
                    keyword.as_str().split_whitespace().next().unwrap_or("class"),
                ),
                line_index,
                column: keyword.start(),
                nested: false,
            });
        }
        for (col, c) in line.char_indices() {
            match c {
                '{' => events.push((col, Event::Open)),
                '}' => events.push((col, Event::Close)),
                ';' => events.push((col, Event::Semicolon)),
                _ => {}
            }
        }
        events.sort_by_key(|(col, _)| *col);

        for (_, event) in events {
            match event {
                Event::Namespace => pending = Some(ScopeKind::Namespace),
                Event::Type(idx) => {
                    declarations[idx].nested = stack.contains(&ScopeKind::Type);
                    pending = Some(ScopeKind::Type);
                }
                Event::Open => stack.push(pending.take().unwrap_or(ScopeKind::Block)),
                Event::Close => {
                    stack.pop();
                }
                Event::Semicolon => pending = None,
            }
        }
    }

    declarations
}

/// Index of the first line of the declaration header: the declaration line
/// itself, extended upward over directly preceding attribute lines.
#[must_use]
pub fn header_start(lines: &[String], line_index: usize) -> usize {
    let mut start = line_index;
    while start > 0 && lines[start - 1].trim_start().starts_with('[') {
        start -= 1;
    }
    start
}

/// Collect the header and body lines of the declaration at
/// `(line_index, column)`.
///
/// Header lines (attributes and the declaration up to the first `{`) come
/// first, followed by every line until the brace balance returns to zero. A
/// `;` before any `{` ends a body-less declaration. Running out of input
/// returns whatever was gathered.
#[must_use]
pub fn extract_scope(lines: &[String], line_index: usize, column: usize) -> Vec<ScopeLine> {
    let mut scope = Vec::new();
    if line_index >= lines.len() {
        return scope;
    }

    for (idx, line) in lines
        .iter()
        .enumerate()
        .take(line_index)
        .skip(header_start(lines, line_index))
    {
        scope.push(scope_line(idx, line));
    }

    let mut balance: usize = 0;
    let mut started = false;

    for (idx, line) in lines.iter().enumerate().skip(line_index) {
        let from = if idx == line_index { column } else { 0 };
        let mut finished = false;

        for c in line.get(from..).unwrap_or("").chars() {
            match c {
                '{' => {
                    balance += 1;
                    started = true;
                }
                '}' if started => {
                    balance = balance.saturating_sub(1);
                    if balance == 0 {
                        finished = true;
                        break;
                    }
                }
                ';' if !started => {
                    finished = true;
                    break;
                }
                _ => {}
            }
        }

        scope.push(scope_line(idx, line));
        if finished {
            break;
        }
    }

    scope
}

#[allow(clippy::cast_possible_truncation)] // No source file has 4 billion lines
fn scope_line(idx: usize, text: &str) -> ScopeLine {
    ScopeLine {
        number: idx as u32 + 1,
        text: text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(src: &str) -> Vec<String> {
        src.lines().map(ToString::to_string).collect()
    }

    #[test]
    fn finds_block_and_file_scoped_namespaces() {
        assert_eq!(
            declared_namespace(&lines("using X;\nnamespace Game.Core\n{\n}")),
            Some("Game.Core".to_string())
        );
        assert_eq!(
            declared_namespace(&lines("namespace Game.Ui;\nclass A {}")),
            Some("Game.Ui".to_string())
        );
        assert_eq!(declared_namespace(&lines("class A {}")), None);
    }

    #[test]
    fn types_inside_namespace_are_top_level() {
        let src = lines(
            "namespace Game\n{\n    public class Player\n    {\n    }\n    public struct Stats { }\n}",
        );

        let decls = type_declarations(&src);

        assert_eq!(decls.len(), 2);
        assert!(decls.iter().all(|d| !d.nested));
        assert_eq!(decls[0].name, "Player");
        assert_eq!(decls[1].keyword, TypeKeyword::Struct);
    }

    #[test]
    fn nested_types_are_flagged_even_after_sibling_closes() {
        let src = lines(
            "namespace Game {\nclass Outer {\n  class First { }\n  void M() { }\n  enum Second { A, B }\n}\nclass After { }\n}",
        );

        let decls = type_declarations(&src);
        let nested: Vec<_> = decls.iter().filter(|d| d.nested).map(|d| d.name.as_str()).collect();
        let top: Vec<_> = decls.iter().filter(|d| !d.nested).map(|d| d.name.as_str()).collect();

        assert_eq!(nested, vec!["First", "Second"]);
        assert_eq!(top, vec!["Outer", "After"]);
    }

    #[test]
    fn file_scoped_namespace_does_not_open_a_scope() {
        let src = lines("namespace Game;\npublic class A { class B {} }\npublic class C {}");

        let decls = type_declarations(&src);

        assert!(!decls[0].nested);
        assert!(decls[1].nested);
        assert!(!decls[2].nested);
    }

    #[test]
    fn generic_constraints_are_not_declarations() {
        let src = lines("class Pool<T> where T : class, new()\n{\n}");
        let decls = type_declarations(&src);
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].name, "Pool");
    }

    #[test]
    fn record_struct_keeps_its_name() {
        let src = lines("public record struct Point(int X, int Y);\npublic class After {}");
        let decls = type_declarations(&src);
        assert_eq!(decls[0].name, "Point");
        assert_eq!(decls[0].keyword, TypeKeyword::Record);
        assert!(!decls[1].nested);
    }

    #[test]
    fn scope_collects_header_attributes_and_body() {
        let src = lines(
            "namespace Game\n{\n    [UpdateAfter(typeof(Input))]\n    public class Mover : Base\n    {\n        Weapon w;\n    }\n    class Other { }\n}",
        );
        let decls = type_declarations(&src);

        let scope = extract_scope(&src, decls[0].line_index, decls[0].column);
        let numbers: Vec<u32> = scope.iter().map(|l| l.number).collect();

        assert_eq!(numbers, vec![3, 4, 5, 6, 7]);
    }

    #[test]
    fn unterminated_scope_stops_at_end_of_input() {
        let src = lines("class Broken {\n  Foo f;\n  void M() {\n    Bar();");
        let scope = extract_scope(&src, 0, 0);
        assert_eq!(scope.len(), 4);
    }

    #[test]
    fn body_less_declaration_ends_at_semicolon() {
        let src = lines("record Point(int X);\nclass Next { }");
        let scope = extract_scope(&src, 0, 0);
        assert_eq!(scope.len(), 1);
    }
}
