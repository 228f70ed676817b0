//! Static conflict diagnostics.
//!
//! A [`Conflict`] is an immutable record attached to the node that caused
//! it, with an optional secondary site for context (e.g. the opening
//! delimiter of an unclosed literal). Conflicts are pure functions of
//! (node, context): recomputing them for the same tree and context yields
//! the same list. They are collected, never thrown.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::node::{NodeId, TokenKind};

// ══════════════════════════════════════════════════════════════════════════════
// Severity
// ══════════════════════════════════════════════════════════════════════════════

/// How serious a conflict is. Major conflicts block evaluation; minor
/// conflicts are advisory only. Severity is fixed per conflict kind, never
/// computed from context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Major,
    Minor,
}

// ══════════════════════════════════════════════════════════════════════════════
// Conflict kinds
// ══════════════════════════════════════════════════════════════════════════════

/// The closed set of conflict kinds. Type information is carried as
/// rendered text so the record stays a plain serializable value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConflictKind {
    /// A region of input the parser could not make sense of.
    UnparsableNode { node: NodeId },
    /// An opening delimiter with no matching close.
    UnclosedDelimiter {
        node: NodeId,
        open: NodeId,
        expected: TokenKind,
    },
    /// A query clause whose condition is not boolean.
    NonBooleanQuery { query: NodeId, actual: String },
    /// A map literal entry that is not a key-value pair.
    NotAKeyValue {
        map: NodeId,
        entry: NodeId,
        open: NodeId,
    },
    /// A binding reachable from its own initializer.
    ReferenceCycle { reference: NodeId, name: String },
    /// A structure that claims an interface but misses or mismatches one of
    /// its required functions.
    UnimplementedInterface {
        structure: NodeId,
        interface: String,
        function: String,
    },
    /// A reference that resolves to nothing.
    UnknownName { reference: NodeId, name: String },
    /// A bound value the declared type does not accept.
    IncompatibleBind {
        bind: NodeId,
        value: NodeId,
        expected: String,
        actual: String,
    },
    /// A conditional whose condition is not boolean.
    ExpectedBooleanCondition { conditional: NodeId, actual: String },
    /// A type test that can never be true.
    ImpossibleTypeTest { test: NodeId, actual: String },
    /// A conversion with no registered path to the target.
    UnknownConversion { convert: NodeId, target: String },
    /// An evaluation of something that is not callable.
    NotAFunction { evaluate: NodeId, callee: NodeId },
    /// A binding that nothing ever references.
    UnusedBind { bind: NodeId, name: String },
}

impl ConflictKind {
    /// Fixed severity per kind.
    pub fn severity(&self) -> Severity {
        match self {
            ConflictKind::UnusedBind { .. } => Severity::Minor,
            _ => Severity::Major,
        }
    }

    /// The node the conflict is primarily about.
    pub fn primary(&self) -> NodeId {
        match self {
            ConflictKind::UnparsableNode { node } => *node,
            ConflictKind::UnclosedDelimiter { open, .. } => *open,
            ConflictKind::NonBooleanQuery { query, .. } => *query,
            ConflictKind::NotAKeyValue { entry, .. } => *entry,
            ConflictKind::ReferenceCycle { reference, .. } => *reference,
            ConflictKind::UnimplementedInterface { structure, .. } => *structure,
            ConflictKind::UnknownName { reference, .. } => *reference,
            ConflictKind::IncompatibleBind { value, .. } => *value,
            ConflictKind::ExpectedBooleanCondition { conditional, .. } => *conditional,
            ConflictKind::ImpossibleTypeTest { test, .. } => *test,
            ConflictKind::UnknownConversion { convert, .. } => *convert,
            ConflictKind::NotAFunction { callee, .. } => *callee,
            ConflictKind::UnusedBind { bind, .. } => *bind,
        }
    }

    /// A secondary site giving context, where one exists.
    pub fn secondary(&self) -> Option<NodeId> {
        match self {
            ConflictKind::NotAKeyValue { open, .. } => Some(*open),
            ConflictKind::IncompatibleBind { bind, .. } => Some(*bind),
            _ => None,
        }
    }

    /// The primary explanation. Localization is an external concern; these
    /// are the plain renderings.
    pub fn explanation(&self) -> String {
        match self {
            ConflictKind::UnparsableNode { .. } => {
                "this could not be parsed".to_string()
            }
            ConflictKind::UnclosedDelimiter { expected, .. } => {
                format!("this is missing its closing {}", expected.glyph())
            }
            ConflictKind::NonBooleanQuery { actual, .. } => {
                format!("a query condition must be boolean, not {actual}")
            }
            ConflictKind::NotAKeyValue { .. } => {
                "map entries must be key:value pairs".to_string()
            }
            ConflictKind::ReferenceCycle { name, .. } => {
                format!("'{name}' refers to itself through its own value")
            }
            ConflictKind::UnimplementedInterface {
                interface, function, ..
            } => {
                format!("this does not implement '{function}' required by '{interface}'")
            }
            ConflictKind::UnknownName { name, .. } => {
                format!("'{name}' is not defined here")
            }
            ConflictKind::IncompatibleBind {
                expected, actual, ..
            } => {
                format!("expected {expected}, but this is {actual}")
            }
            ConflictKind::ExpectedBooleanCondition { actual, .. } => {
                format!("a condition must be boolean, not {actual}")
            }
            ConflictKind::ImpossibleTypeTest { actual, .. } => {
                format!("this is always {actual}, so the test can never be true")
            }
            ConflictKind::UnknownConversion { target, .. } => {
                format!("there is no conversion to {target}")
            }
            ConflictKind::NotAFunction { .. } => {
                "this is not a function, so it cannot be evaluated".to_string()
            }
            ConflictKind::UnusedBind { name, .. } => {
                format!("'{name}' is never used")
            }
        }
    }

    /// The explanation for the secondary site, where one exists.
    pub fn secondary_explanation(&self) -> Option<String> {
        match self {
            ConflictKind::NotAKeyValue { .. } => {
                Some("this map opened here".to_string())
            }
            ConflictKind::IncompatibleBind { expected, .. } => {
                Some(format!("the binding declared {expected} here"))
            }
            _ => None,
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Conflict
// ══════════════════════════════════════════════════════════════════════════════

/// A site a conflict points at: a node plus its explanation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictSite {
    pub node: NodeId,
    pub explanation: String,
}

/// An immutable static diagnostic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub kind: ConflictKind,
    pub severity: Severity,
    pub primary: ConflictSite,
    pub secondary: Option<ConflictSite>,
}

impl Conflict {
    pub fn new(kind: ConflictKind) -> Conflict {
        let severity = kind.severity();
        let primary = ConflictSite {
            node: kind.primary(),
            explanation: kind.explanation(),
        };
        let secondary = kind.secondary().map(|node| ConflictSite {
            node,
            explanation: kind.secondary_explanation().unwrap_or_default(),
        });
        Conflict {
            kind,
            severity,
            primary,
            secondary,
        }
    }

    pub fn is_minor(&self) -> bool {
        self.severity == Severity::Minor
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} at {}",
            match self.severity {
                Severity::Major => "major",
                Severity::Minor => "minor",
            },
            self.primary.explanation,
            self.primary.node
        )
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Tests
// ══════════════════════════════════════════════════════════════════════════════
