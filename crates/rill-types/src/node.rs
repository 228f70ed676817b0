//! The immutable node tree.
//!
//! Every syntactic and semantic form in a Rill program is a [`Node`]:
//! expressions, bindings, tokens, definitions, query clauses, and the
//! explicit [`NodeKind::Unparsable`] variant for input the parser could not
//! make sense of. Nodes are append-only: children are fixed at construction
//! and edits always produce a *new* node. Large recursive variants are boxed
//! to keep the enum size reasonable.
//!
//! [`Tree`] owns a root node and answers ancestry queries through a parent
//! table computed once per tree ("crystallization"). Replacing a node yields
//! a fresh [`Tree`] with fresh caches.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ty::{Type, Unit};

// ══════════════════════════════════════════════════════════════════════════════
// Node identity
// ══════════════════════════════════════════════════════════════════════════════

/// A node identifier, unique within a tree.
///
/// Identity is distinct from structure: two nodes may be structurally equal
/// (`==`) while carrying different ids. Binding resolution and flow narrowing
/// match on identity; tree equality matches on structure.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct NodeId(u64);

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

impl NodeId {
    fn fresh() -> Self {
        NodeId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Tokens
// ══════════════════════════════════════════════════════════════════════════════

/// The kind of a token node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    Name,
    Number,
    Text,
    /// `[`
    ListOpen,
    /// `]`
    ListClose,
    /// `{`
    SetOpen,
    /// `}`
    SetClose,
    /// `:`
    Bind,
    /// `→`
    Convert,
}

impl TokenKind {
    /// The canonical glyph for delimiter tokens, used in conflict messages.
    pub fn glyph(self) -> &'static str {
        match self {
            TokenKind::Name => "name",
            TokenKind::Number => "number",
            TokenKind::Text => "text",
            TokenKind::ListOpen => "[",
            TokenKind::ListClose => "]",
            TokenKind::SetOpen => "{",
            TokenKind::SetClose => "}",
            TokenKind::Bind => ":",
            TokenKind::Convert => "→",
        }
    }
}

/// Why a region of input failed to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyntaxFailure {
    UnexpectedToken,
    IncompleteExpression,
    UnknownSyntax,
}

// ══════════════════════════════════════════════════════════════════════════════
// Node
// ══════════════════════════════════════════════════════════════════════════════

/// A node in the tree: an id plus a structural kind.
///
/// Equality is structural and ignores ids, so replacing a node with an
/// equal node yields an equal tree.
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    kind: NodeKind,
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

/// The closed set of node kinds.
///
/// Per-kind behavior (conflict computation, step compilation, evaluation)
/// is dispatched by matching on this enum so the compiler checks
/// exhaustiveness whenever a kind is added.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    // ── Tokens ──
    /// A lexical token: delimiters, names, raw text.
    Token { kind: TokenKind, text: String },

    // ── Literals ──
    /// `⊤` / `⊥`
    BooleanLiteral { value: bool },
    /// `5`, `1.2m`, `33ms`
    MeasurementLiteral { value: Decimal, unit: Unit },
    /// `"hello"`, optionally tagged with a format such as `"hola"/es`
    TextLiteral { text: String, format: Option<String> },
    /// `ø`
    NoneLiteral,

    // ── Collections ──
    /// `[1 2 3]` — the close delimiter is absent when the parser never saw it.
    ListLiteral {
        open: Box<Node>,
        items: Vec<Node>,
        close: Option<Box<Node>>,
    },
    /// `{1 2 3}`
    SetLiteral {
        open: Box<Node>,
        items: Vec<Node>,
        close: Option<Box<Node>>,
    },
    /// `{1:"hi" 2:"bye"}` — entries should be key-value pairs; anything else
    /// is a conflict.
    MapLiteral {
        open: Box<Node>,
        entries: Vec<Node>,
        close: Option<Box<Node>>,
    },
    /// `key:value` inside a map literal or update clause.
    KeyValue { key: Box<Node>, value: Box<Node> },

    // ── Bindings & references ──
    /// `name: value`, with optional aliases and declared type.
    Bind {
        aliases: Vec<String>,
        ty: Option<Type>,
        value: Option<Box<Node>>,
    },
    /// A name referring to a binding in an enclosing scope.
    Reference { name: String },
    /// `subject.name`
    PropertyReference { subject: Box<Node>, name: String },

    // ── Expressions ──
    /// `callee(arg ...)` — function application or structure instantiation.
    Evaluate { callee: Box<Node>, args: Vec<Node> },
    /// `condition ? then else` — both branches compile, one executes.
    Conditional {
        condition: Box<Node>,
        then_branch: Box<Node>,
        else_branch: Box<Node>,
    },
    /// `expression • Type` — runtime type test, statically narrows.
    Is { expression: Box<Node>, target: Type },
    /// `expression → ''` — conversion to the type named by the marker.
    Convert { expression: Box<Node>, marker: String },
    /// A sequence of statements evaluating to its last expression.
    Block { statements: Vec<Node> },

    // ── Definitions ──
    /// `ƒ name(inputs) expression` — a body of `None` marks an interface
    /// member with no implementation.
    FunctionDefinition {
        aliases: Vec<String>,
        type_vars: Vec<String>,
        inputs: Vec<Node>,
        output: Option<Type>,
        body: Option<Box<Node>>,
    },
    /// `•name(inputs) block` — structure (custom type) definition; the block
    /// holds member function definitions.
    StructureDefinition {
        aliases: Vec<String>,
        interfaces: Vec<String>,
        type_vars: Vec<String>,
        inputs: Vec<Node>,
        members: Vec<Node>,
    },
    /// A reference to a registered stream definition with configuration
    /// arguments, e.g. `∆key("a")`.
    StreamReference { name: String, config: Vec<Node> },

    // ── Query clauses ──
    /// `table ?? query` — rows of `table` for which `query` holds.
    Select { table: Box<Node>, query: Box<Node> },
    /// `table ?: updates query` — matching rows with fields updated.
    Update {
        table: Box<Node>,
        updates: Vec<Node>,
        query: Box<Node>,
    },
    /// `table ?- query` — rows of `table` for which `query` does not hold.
    Delete { table: Box<Node>, query: Box<Node> },

    // ── Program & failure ──
    /// The root of a source: a single block.
    Program { block: Box<Node> },
    /// Input the parser could not make sense of. Carries the raw tokens and
    /// the syntactic failure; always yields exactly one conflict and halts
    /// evaluation if reached.
    Unparsable {
        reason: SyntaxFailure,
        tokens: Vec<Node>,
    },
}

// ══════════════════════════════════════════════════════════════════════════════
// Construction
// ══════════════════════════════════════════════════════════════════════════════

impl Node {
    fn make(kind: NodeKind) -> Node {
        Node {
            id: NodeId::fresh(),
            kind,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn token(kind: TokenKind, text: impl Into<String>) -> Node {
        Node::make(NodeKind::Token {
            kind,
            text: text.into(),
        })
    }

    pub fn boolean(value: bool) -> Node {
        Node::make(NodeKind::BooleanLiteral { value })
    }

    /// A unitless whole-number measurement literal.
    pub fn number(value: i64) -> Node {
        Node::make(NodeKind::MeasurementLiteral {
            value: Decimal::from(value),
            unit: Unit::none(),
        })
    }

    pub fn measurement(value: Decimal, unit: Unit) -> Node {
        Node::make(NodeKind::MeasurementLiteral { value, unit })
    }

    pub fn text(text: impl Into<String>) -> Node {
        Node::make(NodeKind::TextLiteral {
            text: text.into(),
            format: None,
        })
    }

    pub fn text_in_format(text: impl Into<String>, format: impl Into<String>) -> Node {
        Node::make(NodeKind::TextLiteral {
            text: text.into(),
            format: Some(format.into()),
        })
    }

    pub fn none() -> Node {
        Node::make(NodeKind::NoneLiteral)
    }

    pub fn list(items: Vec<Node>) -> Node {
        Node::make(NodeKind::ListLiteral {
            open: Box::new(Node::token(TokenKind::ListOpen, "[")),
            items,
            close: Some(Box::new(Node::token(TokenKind::ListClose, "]"))),
        })
    }

    /// A list literal whose closing delimiter never arrived.
    pub fn unclosed_list(items: Vec<Node>) -> Node {
        Node::make(NodeKind::ListLiteral {
            open: Box::new(Node::token(TokenKind::ListOpen, "[")),
            items,
            close: None,
        })
    }

    pub fn set(items: Vec<Node>) -> Node {
        Node::make(NodeKind::SetLiteral {
            open: Box::new(Node::token(TokenKind::SetOpen, "{")),
            items,
            close: Some(Box::new(Node::token(TokenKind::SetClose, "}"))),
        })
    }

    pub fn map(entries: Vec<Node>) -> Node {
        Node::make(NodeKind::MapLiteral {
            open: Box::new(Node::token(TokenKind::SetOpen, "{")),
            entries,
            close: Some(Box::new(Node::token(TokenKind::SetClose, "}"))),
        })
    }

    /// A map literal whose closing delimiter never arrived.
    pub fn unclosed_map(entries: Vec<Node>) -> Node {
        Node::make(NodeKind::MapLiteral {
            open: Box::new(Node::token(TokenKind::SetOpen, "{")),
            entries,
            close: None,
        })
    }

    pub fn key_value(key: Node, value: Node) -> Node {
        Node::make(NodeKind::KeyValue {
            key: Box::new(key),
            value: Box::new(value),
        })
    }

    pub fn bind(aliases: &[&str], ty: Option<Type>, value: Option<Node>) -> Node {
        Node::make(NodeKind::Bind {
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            ty,
            value: value.map(Box::new),
        })
    }

    pub fn reference(name: impl Into<String>) -> Node {
        Node::make(NodeKind::Reference { name: name.into() })
    }

    pub fn property(subject: Node, name: impl Into<String>) -> Node {
        Node::make(NodeKind::PropertyReference {
            subject: Box::new(subject),
            name: name.into(),
        })
    }

    pub fn evaluate(callee: Node, args: Vec<Node>) -> Node {
        Node::make(NodeKind::Evaluate {
            callee: Box::new(callee),
            args,
        })
    }

    pub fn conditional(condition: Node, then_branch: Node, else_branch: Node) -> Node {
        Node::make(NodeKind::Conditional {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        })
    }

    pub fn is(expression: Node, target: Type) -> Node {
        Node::make(NodeKind::Is {
            expression: Box::new(expression),
            target,
        })
    }

    pub fn convert(expression: Node, marker: impl Into<String>) -> Node {
        Node::make(NodeKind::Convert {
            expression: Box::new(expression),
            marker: marker.into(),
        })
    }

    pub fn block(statements: Vec<Node>) -> Node {
        Node::make(NodeKind::Block { statements })
    }

    pub fn function(
        aliases: &[&str],
        type_vars: &[&str],
        inputs: Vec<Node>,
        output: Option<Type>,
        body: Option<Node>,
    ) -> Node {
        Node::make(NodeKind::FunctionDefinition {
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            type_vars: type_vars.iter().map(|v| v.to_string()).collect(),
            inputs,
            output,
            body: body.map(Box::new),
        })
    }

    pub fn structure(
        aliases: &[&str],
        interfaces: &[&str],
        type_vars: &[&str],
        inputs: Vec<Node>,
        members: Vec<Node>,
    ) -> Node {
        Node::make(NodeKind::StructureDefinition {
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            interfaces: interfaces.iter().map(|i| i.to_string()).collect(),
            type_vars: type_vars.iter().map(|v| v.to_string()).collect(),
            inputs,
            members,
        })
    }

    pub fn stream(name: impl Into<String>, config: Vec<Node>) -> Node {
        Node::make(NodeKind::StreamReference {
            name: name.into(),
            config,
        })
    }

    pub fn select(table: Node, query: Node) -> Node {
        Node::make(NodeKind::Select {
            table: Box::new(table),
            query: Box::new(query),
        })
    }

    pub fn update(table: Node, updates: Vec<Node>, query: Node) -> Node {
        Node::make(NodeKind::Update {
            table: Box::new(table),
            updates,
            query: Box::new(query),
        })
    }

    pub fn delete(table: Node, query: Node) -> Node {
        Node::make(NodeKind::Delete {
            table: Box::new(table),
            query: Box::new(query),
        })
    }

    pub fn program(block: Node) -> Node {
        Node::make(NodeKind::Program {
            block: Box::new(block),
        })
    }

    pub fn unparsable(reason: SyntaxFailure, tokens: Vec<Node>) -> Node {
        Node::make(NodeKind::Unparsable { reason, tokens })
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Children & replacement
// ══════════════════════════════════════════════════════════════════════════════

impl Node {
    /// Immediate structural children in a fixed, documented order:
    /// delimiters first where present, then operands left to right. Tree
    /// walking, conflict discovery, and printing all share this order.
    pub fn children(&self) -> Vec<&Node> {
        match &self.kind {
            NodeKind::Token { .. }
            | NodeKind::BooleanLiteral { .. }
            | NodeKind::MeasurementLiteral { .. }
            | NodeKind::TextLiteral { .. }
            | NodeKind::NoneLiteral
            | NodeKind::Reference { .. } => Vec::new(),
            NodeKind::ListLiteral { open, items, close }
            | NodeKind::SetLiteral { open, items, close }
            | NodeKind::MapLiteral {
                open,
                entries: items,
                close,
            } => {
                let mut children: Vec<&Node> = vec![open];
                children.extend(items.iter());
                if let Some(close) = close {
                    children.push(close);
                }
                children
            }
            NodeKind::KeyValue { key, value } => vec![key, value],
            NodeKind::Bind { value, .. } => value.iter().map(|v| &**v).collect(),
            NodeKind::PropertyReference { subject, .. } => vec![subject],
            NodeKind::Evaluate { callee, args } => {
                let mut children: Vec<&Node> = vec![callee];
                children.extend(args.iter());
                children
            }
            NodeKind::Conditional {
                condition,
                then_branch,
                else_branch,
            } => vec![condition, then_branch, else_branch],
            NodeKind::Is { expression, .. } => vec![expression],
            NodeKind::Convert { expression, .. } => vec![expression],
            NodeKind::Block { statements } => statements.iter().collect(),
            NodeKind::FunctionDefinition { inputs, body, .. } => {
                let mut children: Vec<&Node> = inputs.iter().collect();
                if let Some(body) = body {
                    children.push(body);
                }
                children
            }
            NodeKind::StructureDefinition {
                inputs, members, ..
            } => inputs.iter().chain(members.iter()).collect(),
            NodeKind::StreamReference { config, .. } => config.iter().collect(),
            NodeKind::Select { table, query } | NodeKind::Delete { table, query } => {
                vec![table, query]
            }
            NodeKind::Update {
                table,
                updates,
                query,
            } => {
                let mut children: Vec<&Node> = vec![table];
                children.extend(updates.iter());
                children.push(query);
                children
            }
            NodeKind::Program { block } => vec![block],
            NodeKind::Unparsable { tokens, .. } => tokens.iter().collect(),
        }
    }

    /// Produce a copy of this subtree in which every occurrence of the node
    /// identified by `target` is substituted by `replacement`. Ancestors of
    /// substituted nodes are rebuilt; untouched subtrees are cloned as-is.
    pub fn with_replacement(&self, target: NodeId, replacement: &Node) -> Node {
        if self.id == target {
            return replacement.clone();
        }
        let sub = |n: &Node| n.with_replacement(target, replacement);
        let sub_box = |n: &Box<Node>| Box::new(n.with_replacement(target, replacement));
        let sub_vec = |ns: &[Node]| ns.iter().map(sub).collect::<Vec<_>>();
        let sub_opt =
            |n: &Option<Box<Node>>| n.as_ref().map(|n| Box::new(n.with_replacement(target, replacement)));
        let kind = match &self.kind {
            leaf @ (NodeKind::Token { .. }
            | NodeKind::BooleanLiteral { .. }
            | NodeKind::MeasurementLiteral { .. }
            | NodeKind::TextLiteral { .. }
            | NodeKind::NoneLiteral
            | NodeKind::Reference { .. }) => leaf.clone(),
            NodeKind::ListLiteral { open, items, close } => NodeKind::ListLiteral {
                open: sub_box(open),
                items: sub_vec(items),
                close: sub_opt(close),
            },
            NodeKind::SetLiteral { open, items, close } => NodeKind::SetLiteral {
                open: sub_box(open),
                items: sub_vec(items),
                close: sub_opt(close),
            },
            NodeKind::MapLiteral {
                open,
                entries,
                close,
            } => NodeKind::MapLiteral {
                open: sub_box(open),
                entries: sub_vec(entries),
                close: sub_opt(close),
            },
            NodeKind::KeyValue { key, value } => NodeKind::KeyValue {
                key: sub_box(key),
                value: sub_box(value),
            },
            NodeKind::Bind { aliases, ty, value } => NodeKind::Bind {
                aliases: aliases.clone(),
                ty: ty.clone(),
                value: sub_opt(value),
            },
            NodeKind::PropertyReference { subject, name } => NodeKind::PropertyReference {
                subject: sub_box(subject),
                name: name.clone(),
            },
            NodeKind::Evaluate { callee, args } => NodeKind::Evaluate {
                callee: sub_box(callee),
                args: sub_vec(args),
            },
            NodeKind::Conditional {
                condition,
                then_branch,
                else_branch,
            } => NodeKind::Conditional {
                condition: sub_box(condition),
                then_branch: sub_box(then_branch),
                else_branch: sub_box(else_branch),
            },
            NodeKind::Is { expression, target: ty } => NodeKind::Is {
                expression: sub_box(expression),
                target: ty.clone(),
            },
            NodeKind::Convert { expression, marker } => NodeKind::Convert {
                expression: sub_box(expression),
                marker: marker.clone(),
            },
            NodeKind::Block { statements } => NodeKind::Block {
                statements: sub_vec(statements),
            },
            NodeKind::FunctionDefinition {
                aliases,
                type_vars,
                inputs,
                output,
                body,
            } => NodeKind::FunctionDefinition {
                aliases: aliases.clone(),
                type_vars: type_vars.clone(),
                inputs: sub_vec(inputs),
                output: output.clone(),
                body: sub_opt(body),
            },
            NodeKind::StructureDefinition {
                aliases,
                interfaces,
                type_vars,
                inputs,
                members,
            } => NodeKind::StructureDefinition {
                aliases: aliases.clone(),
                interfaces: interfaces.clone(),
                type_vars: type_vars.clone(),
                inputs: sub_vec(inputs),
                members: sub_vec(members),
            },
            NodeKind::StreamReference { name, config } => NodeKind::StreamReference {
                name: name.clone(),
                config: sub_vec(config),
            },
            NodeKind::Select { table, query } => NodeKind::Select {
                table: sub_box(table),
                query: sub_box(query),
            },
            NodeKind::Update {
                table,
                updates,
                query,
            } => NodeKind::Update {
                table: sub_box(table),
                updates: sub_vec(updates),
                query: sub_box(query),
            },
            NodeKind::Delete { table, query } => NodeKind::Delete {
                table: sub_box(table),
                query: sub_box(query),
            },
            NodeKind::Program { block } => NodeKind::Program {
                block: sub_box(block),
            },
            NodeKind::Unparsable { reason, tokens } => NodeKind::Unparsable {
                reason: *reason,
                tokens: sub_vec(tokens),
            },
        };
        Node { id: self.id, kind }
    }

    /// Pre-order traversal of this subtree, self first.
    pub fn descendants(&self) -> Vec<&Node> {
        let mut out = Vec::new();
        self.collect(&mut out);
        out
    }

    fn collect<'a>(&'a self, out: &mut Vec<&'a Node>) {
        out.push(self);
        for child in self.children() {
            child.collect(out);
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            NodeKind::Token { text, .. } => write!(f, "{text}"),
            NodeKind::BooleanLiteral { value } => {
                write!(f, "{}", if *value { "⊤" } else { "⊥" })
            }
            NodeKind::MeasurementLiteral { value, unit } => write!(f, "{value}{unit}"),
            NodeKind::TextLiteral { text, .. } => write!(f, "\"{text}\""),
            NodeKind::NoneLiteral => write!(f, "ø"),
            NodeKind::ListLiteral { .. }
            | NodeKind::SetLiteral { .. }
            | NodeKind::MapLiteral { .. }
            | NodeKind::Unparsable { .. }
            | NodeKind::Block { .. }
            | NodeKind::Program { .. } => {
                let parts: Vec<String> =
                    self.children().iter().map(|c| c.to_string()).collect();
                write!(f, "{}", parts.join(" "))
            }
            NodeKind::KeyValue { key, value } => write!(f, "{key}:{value}"),
            NodeKind::Bind { aliases, .. } => write!(f, "{}: …", aliases.join("/")),
            NodeKind::Reference { name } => write!(f, "{name}"),
            NodeKind::PropertyReference { subject, name } => write!(f, "{subject}.{name}"),
            NodeKind::Evaluate { callee, .. } => write!(f, "{callee}(…)"),
            NodeKind::Conditional { condition, .. } => write!(f, "{condition} ? …"),
            NodeKind::Is { expression, target } => write!(f, "{expression}•{target}"),
            NodeKind::Convert { expression, marker } => write!(f, "{expression}→{marker}"),
            NodeKind::FunctionDefinition { aliases, .. } => {
                write!(f, "ƒ {}", aliases.join("/"))
            }
            NodeKind::StructureDefinition { aliases, .. } => {
                write!(f, "•{}", aliases.join("/"))
            }
            NodeKind::StreamReference { name, .. } => write!(f, "∆{name}"),
            NodeKind::Select { .. } => write!(f, "…??…"),
            NodeKind::Update { .. } => write!(f, "…?:…"),
            NodeKind::Delete { .. } => write!(f, "…?-…"),
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Tree
// ══════════════════════════════════════════════════════════════════════════════

/// An immutable tree with once-per-tree ancestry caches.
///
/// The parent table is a derived relation computed lazily on first query,
/// never a mutable pointer stored on nodes; replacing a node produces a new
/// `Tree` whose caches are rebuilt from scratch.
#[derive(Debug)]
pub struct Tree {
    root: Node,
    index: std::cell::OnceCell<TreeIndex>,
}

#[derive(Debug, Default)]
struct TreeIndex {
    parents: HashMap<NodeId, NodeId>,
    paths: HashMap<NodeId, Vec<usize>>,
}

impl Tree {
    pub fn new(root: Node) -> Tree {
        Tree {
            root,
            index: std::cell::OnceCell::new(),
        }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    fn index(&self) -> &TreeIndex {
        self.index.get_or_init(|| {
            let mut index = TreeIndex::default();
            let mut path = Vec::new();
            Self::crystallize(&self.root, None, &mut path, &mut index);
            index
        })
    }

    fn crystallize(
        node: &Node,
        parent: Option<NodeId>,
        path: &mut Vec<usize>,
        index: &mut TreeIndex,
    ) {
        if let Some(parent) = parent {
            index.parents.insert(node.id, parent);
        }
        index.paths.insert(node.id, path.clone());
        for (i, child) in node.children().into_iter().enumerate() {
            path.push(i);
            Self::crystallize(child, Some(node.id), path, index);
            path.pop();
        }
    }

    /// The parent of the identified node, or `None` for the root and for
    /// nodes not in this tree.
    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.index().parents.get(&id).copied()
    }

    /// Resolve a node id to its node within this tree.
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        let path = self.index().paths.get(&id)?;
        let mut node = &self.root;
        for &i in path {
            node = node.children().into_iter().nth(i)?;
        }
        Some(node)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.index().paths.contains_key(&id)
    }

    /// All nodes in pre-order.
    pub fn nodes(&self) -> Vec<&Node> {
        self.root.descendants()
    }

    /// Produce a new tree in which the node identified by `original` is
    /// substituted by `replacement`, rebuilding all ancestors up to the root.
    pub fn replace(&self, original: NodeId, replacement: Node) -> Tree {
        Tree::new(self.root.with_replacement(original, &replacement))
    }
}

impl PartialEq for Tree {
    fn eq(&self, other: &Self) -> bool {
        self.root == other.root
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Tests
// ══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn small_tree() -> Tree {
        Tree::new(Node::program(Node::block(vec![Node::list(vec![
            Node::number(1),
            Node::number(2),
            Node::number(3),
        ])])))
    }

    #[test]
    fn ids_are_unique() {
        let a = Node::number(1);
        let b = Node::number(1);
        assert_ne!(a.id(), b.id());
        assert_eq!(a, b);
    }

    #[test]
    fn children_order_includes_delimiters() {
        let list = Node::list(vec![Node::number(1), Node::number(2)]);
        let children = list.children();
        assert_eq!(children.len(), 4);
        assert!(matches!(
            children[0].kind(),
            NodeKind::Token {
                kind: TokenKind::ListOpen,
                ..
            }
        ));
        assert!(matches!(
            children[3].kind(),
            NodeKind::Token {
                kind: TokenKind::ListClose,
                ..
            }
        ));
    }

    #[test]
    fn parent_table_answers_ancestry() {
        let tree = small_tree();
        let list = tree
            .nodes()
            .into_iter()
            .find(|n| matches!(n.kind(), NodeKind::ListLiteral { .. }))
            .unwrap();
        let one = tree
            .nodes()
            .into_iter()
            .find(|n| matches!(n.kind(), NodeKind::MeasurementLiteral { .. }))
            .unwrap();
        assert_eq!(tree.parent_of(one.id()), Some(list.id()));
        assert_eq!(tree.parent_of(tree.root().id()), None);
    }

    #[test]
    fn get_resolves_ids() {
        let tree = small_tree();
        for node in tree.nodes() {
            assert_eq!(tree.get(node.id()).map(|n| n.id()), Some(node.id()));
        }
    }

    #[test]
    fn replace_substitutes_and_rebuilds() {
        let tree = small_tree();
        let two = tree
            .nodes()
            .into_iter()
            .find(|n| {
                matches!(n.kind(), NodeKind::MeasurementLiteral { value, .. } if *value == Decimal::from(2))
            })
            .unwrap()
            .id();
        let edited = tree.replace(two, Node::number(9));
        let expected = Tree::new(Node::program(Node::block(vec![Node::list(vec![
            Node::number(1),
            Node::number(9),
            Node::number(3),
        ])])));
        assert_eq!(edited, expected);
        // The original tree is untouched.
        assert!(tree.contains(two));
    }

    #[test]
    fn replacing_a_node_with_itself_is_identity() {
        let tree = small_tree();
        let target = tree
            .nodes()
            .into_iter()
            .find(|n| matches!(n.kind(), NodeKind::ListLiteral { .. }))
            .unwrap();
        let same = target.clone();
        let edited = tree.replace(target.id(), same);
        assert_eq!(&edited, &tree);
    }

    #[test]
    fn unparsable_carries_tokens() {
        let unparsable = Node::unparsable(
            SyntaxFailure::UnexpectedToken,
            vec![Node::token(TokenKind::Name, "oops")],
        );
        assert_eq!(unparsable.children().len(), 1);
    }
}
