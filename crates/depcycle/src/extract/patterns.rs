//! Ranked line patterns for type-level dependencies.
//!
//! A rule table is an ordered list of `(kind, matcher)` pairs. Each matcher is
//! a pure function from one code-only line to the type names it implicates.
//! [`match_line`] runs a table and keeps, for each name, only the
//! highest-priority kind that matched it.
//!
//! Matchers are name-agnostic: they report every name in the position they
//! recognize, and the graph builder decides which of those names are known
//! types.

use std::sync::LazyLock;

use regex::Regex;

use super::scope::TYPE_DECL;
use crate::types::DependencyKind;

/// A single entry of a pattern table.
#[derive(Clone, Copy)]
pub struct PatternRule {
    /// Kind reported for names this rule finds
    pub kind: DependencyKind,
    /// Names (possibly dotted) implicated by a line
    pub matcher: fn(&str) -> Vec<String>,
}

impl std::fmt::Debug for PatternRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternRule").field("kind", &self.kind).finish_non_exhaustive()
    }
}

/// A type name matched on one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateMatch {
    /// Short type name (last segment of the matched text)
    pub name: String,
    /// Explicit namespace qualifier, when the text was dotted
    pub qualifier: Option<String>,
    /// Strongest kind that matched the name on this line
    pub kind: DependencyKind,
}

/// Rules for class-level edges.
pub const CLASS_RULES: &[PatternRule] = &[
    PatternRule { kind: DependencyKind::Inheritance, matcher: first_base },
    PatternRule { kind: DependencyKind::InterfaceImplementation, matcher: other_bases },
    PatternRule { kind: DependencyKind::FieldDeclaration, matcher: field_types },
    PatternRule { kind: DependencyKind::ComponentAccess, matcher: component_access },
    PatternRule { kind: DependencyKind::GenericParameter, matcher: generic_arguments },
    PatternRule { kind: DependencyKind::OrderingAttribute, matcher: ordering_targets },
    PatternRule { kind: DependencyKind::Instantiation, matcher: instantiated_types },
    PatternRule { kind: DependencyKind::TypeofReference, matcher: typeof_targets },
    PatternRule { kind: DependencyKind::StaticMemberAccess, matcher: member_receivers },
    PatternRule { kind: DependencyKind::VariableReference, matcher: variable_types },
    PatternRule { kind: DependencyKind::BareReference, matcher: identifiers },
];

/// Rules for system-level edges.
pub const SYSTEM_RULES: &[PatternRule] = &[
    PatternRule { kind: DependencyKind::OrderingAttribute, matcher: ordering_targets },
    PatternRule { kind: DependencyKind::ComponentAccess, matcher: component_access },
    PatternRule { kind: DependencyKind::TypeofReference, matcher: typeof_targets },
    PatternRule { kind: DependencyKind::FieldDeclaration, matcher: field_types },
    PatternRule { kind: DependencyKind::VariableReference, matcher: variable_types },
    PatternRule { kind: DependencyKind::BareReference, matcher: identifiers },
];

/// Run `rules` against `line`.
///
/// Results are in first-seen order; each short name appears once with the
/// highest-priority kind any rule gave it. Keywords are never reported.
#[must_use]
pub fn match_line(rules: &[PatternRule], line: &str) -> Vec<CandidateMatch> {
    let mut matches: Vec<CandidateMatch> = Vec::new();

    for rule in rules {
        for text in (rule.matcher)(line) {
            let (qualifier, name) = split_qualified(&text);
            if name.is_empty() || super::is_keyword(name) {
                continue;
            }
            if let Some(existing) = matches.iter_mut().find(|m| m.name == name) {
                if rule.kind.priority() > existing.kind.priority() {
                    existing.kind = rule.kind;
                }
                if existing.qualifier.is_none() {
                    existing.qualifier = qualifier.map(ToString::to_string);
                }
            } else {
                matches.push(CandidateMatch {
                    name: name.to_string(),
                    qualifier: qualifier.map(ToString::to_string),
                    kind: rule.kind,
                });
            }
        }
    }

    matches
}

/// Base list of the type declared on `line`, if any.
///
/// `class Pool<T> : Base<T>, IPool where T : new()` yields `["Base", "IPool"]`.
#[must_use]
pub fn base_list(line: &str) -> Vec<String> {
    let Some(decl) = TYPE_DECL.captures(line).and_then(|caps| caps.get(2)) else {
        return Vec::new();
    };
    let rest = &line[decl.end()..];

    let mut depth = 0usize;
    let mut start = None;
    for (idx, c) in rest.char_indices() {
        match c {
            '<' | '(' => depth += 1,
            '>' | ')' => depth = depth.saturating_sub(1),
            ':' if depth == 0 => {
                start = Some(idx + 1);
                break;
            }
            '{' | ';' => break,
            _ => {}
        }
    }
    let Some(start) = start else {
        return Vec::new();
    };

    let mut bases = Vec::new();
    let mut depth = 0usize;
    let mut piece = String::new();
    for c in rest[start..].chars() {
        match c {
            '<' | '(' => {
                depth += 1;
                piece.push(c);
            }
            '>' | ')' => {
                depth = depth.saturating_sub(1);
                piece.push(c);
            }
            ',' if depth == 0 => {
                bases.push(std::mem::take(&mut piece));
            }
            '{' | ';' if depth == 0 => break,
            _ => piece.push(c),
        }
    }
    bases.push(piece);

    let mut names = Vec::new();
    for piece in bases {
        let (head, stop) = match WHERE_CLAUSE.find(&piece) {
            Some(m) => (&piece[..m.start()], true),
            None => (piece.as_str(), false),
        };
        if let Some(name) = LEADING_NAME.find(head.trim_start()) {
            names.push(name.as_str().to_string());
        }
        if stop {
            break;
        }
    }
    names
}

/// Kind a name gets from a declared base list: the first base is inherited,
/// the rest are implemented. Dotted bases compare by their last segment.
#[must_use]
pub fn base_kind(bases: &[String], name: &str) -> Option<DependencyKind> {
    let position = bases
        .iter()
        .position(|base| base.rsplit('.').next().unwrap_or(base) == name)?;
    Some(if position == 0 {
        DependencyKind::Inheritance
    } else {
        DependencyKind::InterfaceImplementation
    })
}

fn split_qualified(text: &str) -> (Option<&str>, &str) {
    match text.rsplit_once('.') {
        Some((qualifier, name)) if !qualifier.is_empty() => (Some(qualifier), name),
        Some((_, name)) => (None, name),
        None => (None, text),
    }
}

static WHERE_CLAUSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bwhere\b").expect("valid where regex"));

static LEADING_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][\w.]*").expect("valid name regex"));

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z_]\w*").expect("valid identifier regex"));

static FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:public|private|protected|internal)\s+(?:(?:static|readonly|const|volatile|new|override|virtual|abstract|sealed|unsafe|extern|required|partial)\s+)*([A-Za-z_][\w.]*)(?:\s*<[^;=(){}]*>)?(?:\[\s*\])?\??\s+[A-Za-z_]\w*",
    )
    .expect("valid field regex")
});

static COMPONENT_ACCESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:Get|Has|Add|Remove|Set|Try|Create)\w*(?:Component|Singleton|System|Buffer|Lookup|Aspect)\w*\s*<([^<>]+)>|\bRef(?:RW|RO)\s*<\s*([A-Za-z_][\w.]*)|\bSystemAPI\.\w+\s*<([^<>]+)>",
    )
    .expect("valid component access regex")
});

static ADD_COMPONENT_NEW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bAddComponent\w*\s*\([^,]*,\s*new\s+([A-Za-z_][\w.]*)")
        .expect("valid AddComponent regex")
});

static GENERIC_ARGS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<\s*([\w\s,.?\[\]]+?)\s*>").expect("valid generic arguments regex")
});

static ORDERING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bUpdate(?:Before|After)\s*\(\s*typeof\s*\(\s*([A-Za-z_][\w.]*)\s*\)")
        .expect("valid ordering regex")
});

static NEW_EXPR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bnew\s+([A-Za-z_][\w.]*)\s*(?:<[^>]*>)?\s*[({\[]").expect("valid new regex")
});

static TYPEOF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\btypeof\s*\(\s*([A-Za-z_][\w.]*)").expect("valid typeof regex")
});

static MEMBER_RECEIVER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^\w.])([A-Za-z_]\w*)\s*\.\s*[A-Za-z_]").expect("valid receiver regex")
});

static VARIABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:^|[(,;]|\s)([A-Za-z_][\w.]*)(?:<[^;=(){}]*>)?(?:\[\s*\])?\??\s+[A-Za-z_]\w*\s*[;=,)]",
    )
    .expect("valid variable regex")
});

fn first_base(line: &str) -> Vec<String> {
    base_list(line).into_iter().take(1).collect()
}

fn other_bases(line: &str) -> Vec<String> {
    base_list(line).into_iter().skip(1).collect()
}

fn field_types(line: &str) -> Vec<String> {
    capture_group(&FIELD, line)
}

fn component_access(line: &str) -> Vec<String> {
    let mut names = Vec::new();
    for caps in COMPONENT_ACCESS.captures_iter(line) {
        for group in caps.iter().skip(1).flatten() {
            names.extend(dotted_names(group.as_str()));
        }
    }
    names.extend(capture_group(&ADD_COMPONENT_NEW, line));
    names
}

fn generic_arguments(line: &str) -> Vec<String> {
    GENERIC_ARGS
        .captures_iter(line)
        .filter_map(|caps| caps.get(1))
        .flat_map(|m| dotted_names(m.as_str()))
        .collect()
}

fn ordering_targets(line: &str) -> Vec<String> {
    capture_group(&ORDERING, line)
}

fn instantiated_types(line: &str) -> Vec<String> {
    capture_group(&NEW_EXPR, line)
}

fn typeof_targets(line: &str) -> Vec<String> {
    capture_group(&TYPEOF, line)
}

fn member_receivers(line: &str) -> Vec<String> {
    capture_group(&MEMBER_RECEIVER, line)
}

fn variable_types(line: &str) -> Vec<String> {
    capture_group(&VARIABLE, line)
}

fn identifiers(line: &str) -> Vec<String> {
    IDENTIFIER
        .find_iter(line)
        .map(|m| m.as_str().to_string())
        .collect()
}

fn capture_group(re: &Regex, line: &str) -> Vec<String> {
    re.captures_iter(line)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

fn dotted_names(text: &str) -> Vec<String> {
    LEADING_NAME_ANYWHERE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

static LEADING_NAME_ANYWHERE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z_][\w.]*").expect("valid dotted name regex"));
