//! Runtime values.
//!
//! Values are immutable: composite operations rebuild rather than mutate,
//! so `list.add(x)` returns a new list and the original is untouched. Sets
//! and maps hold their elements in insertion order and compare by structural
//! equality, which keeps arbitrary values usable as elements and keys.
//!
//! Exceptions are values too — they flow through step execution like any
//! other result rather than unwinding the host stack.

use std::fmt;

use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use rill_types::node::NodeId;
use rill_types::{BasisKind, Type, Unit};

// ══════════════════════════════════════════════════════════════════════════════
// Exceptions
// ══════════════════════════════════════════════════════════════════════════════

/// Why a runtime exception was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExceptionKind {
    /// A native function or conversion received a value of the wrong
    /// runtime kind.
    ExpectedType,
    /// Evaluation reached an unparsable node.
    UnparsableReached,
    /// The evaluator's step budget was exhausted.
    StepLimitExceeded,
    /// A name resolved to nothing at evaluation time.
    UnknownName,
    /// No conversion is registered for the requested target.
    UnknownConversion,
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExceptionKind::ExpectedType => "expected-type",
            ExceptionKind::UnparsableReached => "unparsable",
            ExceptionKind::StepLimitExceeded => "step-limit",
            ExceptionKind::UnknownName => "unknown-name",
            ExceptionKind::UnknownConversion => "unknown-conversion",
        };
        write!(f, "{label}")
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Identifiers for non-tree runtime artifacts
// ══════════════════════════════════════════════════════════════════════════════

/// Identifies a live stream owned by the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(pub usize);

/// What a function value refers to.
#[derive(Debug, Clone)]
pub enum FunctionValue {
    /// A function or structure definition in the tree.
    Definition {
        definition: NodeId,
        /// The subject a structure member is bound to, e.g. `point.distance`.
        this: Option<Box<Value>>,
    },
    /// A native basis member bound to its subject, e.g. `[1 2 3].first`.
    Native {
        kind: BasisKind,
        name: String,
        this: Box<Value>,
    },
}

// ══════════════════════════════════════════════════════════════════════════════
// Value
// ══════════════════════════════════════════════════════════════════════════════

/// A runtime value.
#[derive(Debug, Clone)]
pub enum Value {
    Bool(bool),
    /// An arbitrary-precision number with a unit.
    Measurement(Decimal, Unit),
    Text(String),
    List(Vec<Value>),
    /// Unique elements in insertion order.
    Set(Vec<Value>),
    /// Unique keys in insertion order.
    Map(Vec<(Value, Value)>),
    Structure {
        name: String,
        definition: NodeId,
        fields: IndexMap<String, Value>,
    },
    /// A handle to a live stream, carrying the stream's element type so the
    /// value's own type is self-describing.
    Stream(StreamId, Box<Type>),
    Function(FunctionValue),
    /// A first-class runtime failure pointing at the node that caused it.
    Exception { kind: ExceptionKind, node: NodeId },
    None,
}

impl Value {
    pub fn number(n: i64) -> Value {
        Value::Measurement(Decimal::from(n), Unit::none())
    }

    pub fn text(text: impl Into<String>) -> Value {
        Value::Text(text.into())
    }

    pub fn exception(kind: ExceptionKind, node: NodeId) -> Value {
        Value::Exception { kind, node }
    }

    pub fn is_exception(&self) -> bool {
        matches!(self, Value::Exception { .. })
    }

    /// The primitive kind of this value, used to key native lookups.
    pub fn basis_kind(&self) -> BasisKind {
        match self {
            Value::Bool(_) => BasisKind::Boolean,
            Value::Measurement(_, _) => BasisKind::Measurement,
            Value::Text(_) => BasisKind::Text,
            Value::List(_) => BasisKind::List,
            Value::Set(_) => BasisKind::Set,
            Value::Map(_) => BasisKind::Map,
            Value::Structure { .. } => BasisKind::Structure,
            Value::Stream(_, _) => BasisKind::Stream,
            Value::Function(_) => BasisKind::Function,
            Value::Exception { .. } => BasisKind::Never,
            Value::None => BasisKind::None,
        }
    }

    /// Re-derive the dynamic type of this value. Literal payloads are kept,
    /// so `5` has the literal type `5` and is accepted by the open `#`.
    pub fn type_of(&self) -> Type {
        match self {
            Value::Bool(_) => Type::Boolean,
            Value::Measurement(value, unit) => {
                Type::measurement_literal(*value, unit.clone())
            }
            Value::Text(text) => Type::text_literal(text.clone()),
            Value::List(items) => {
                if items.is_empty() {
                    Type::List(None)
                } else {
                    Type::list_of(Self::merged_type(items))
                }
            }
            Value::Set(items) => {
                if items.is_empty() {
                    Type::Set(None)
                } else {
                    Type::set_of(Self::merged_type(items))
                }
            }
            Value::Map(entries) => {
                if entries.is_empty() {
                    Type::Map(None, None)
                } else {
                    let keys: Vec<Value> =
                        entries.iter().map(|(k, _)| k.clone()).collect();
                    let values: Vec<Value> =
                        entries.iter().map(|(_, v)| v.clone()).collect();
                    Type::map_of(Self::merged_type(&keys), Self::merged_type(&values))
                }
            }
            Value::Structure {
                name,
                definition,
                fields,
            } => Type::Structure {
                name: name.clone(),
                definition: Some(*definition),
                members: fields
                    .iter()
                    .map(|(field, value)| (field.clone(), value.type_of()))
                    .collect(),
            },
            Value::Stream(_, element) => Type::Stream(element.clone()),
            Value::Function(_) => Type::Function {
                inputs: Vec::new(),
                output: Box::new(Type::Any),
            },
            Value::Exception { .. } => Type::Never,
            Value::None => Type::None,
        }
    }

    fn merged_type(values: &[Value]) -> Type {
        let context = rill_types::TypeContext::empty();
        Type::union_of(
            values
                .iter()
                .map(|v| v.type_of().generalize(&context))
                .collect(),
        )
    }

    /// The display text of this value without text delimiters, used by
    /// `join` and text conversion.
    pub fn as_plain_text(&self) -> String {
        match self {
            Value::Text(text) => text.clone(),
            other => other.to_string(),
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Structural equality
// ══════════════════════════════════════════════════════════════════════════════

impl PartialEq for Value {
    /// Deep structural equality. Functions are never equal; streams compare
    /// by handle.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Measurement(a, au), Value::Measurement(b, bu)) => {
                a == b && au == bu
            }
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => {
                a.len() == b.len() && a.iter().all(|v| b.contains(v))
            }
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(k, v)| {
                        b.iter().any(|(bk, bv)| bk == k && bv == v)
                    })
            }
            (
                Value::Structure {
                    definition: a,
                    fields: af,
                    ..
                },
                Value::Structure {
                    definition: b,
                    fields: bf,
                    ..
                },
            ) => a == b && af == bf,
            (Value::Stream(a, _), Value::Stream(b, _)) => a == b,
            (
                Value::Exception { kind: a, node: an },
                Value::Exception { kind: b, node: bn },
            ) => a == b && an == bn,
            (Value::None, Value::None) => true,
            // Functions never equal, including themselves.
            (Value::Function(_), _) | (_, Value::Function(_)) => false,
            _ => false,
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Display
// ══════════════════════════════════════════════════════════════════════════════

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(value) => write!(f, "{}", if *value { "⊤" } else { "⊥" }),
            Value::Measurement(value, unit) => write!(f, "{value}{unit}"),
            Value::Text(text) => write!(f, "\"{text}\""),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", parts.join(" "))
            }
            Value::Set(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "{{{}}}", parts.join(" "))
            }
            Value::Map(entries) => {
                if entries.is_empty() {
                    return write!(f, "{{:}}");
                }
                let parts: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| format!("{k}:{v}"))
                    .collect();
                write!(f, "{{{}}}", parts.join(" "))
            }
            Value::Structure { name, fields, .. } => {
                let parts: Vec<String> = fields
                    .iter()
                    .map(|(field, value)| format!("{field}: {value}"))
                    .collect();
                write!(f, "{name}({})", parts.join(" "))
            }
            Value::Stream(id, _) => write!(f, "∆{}", id.0),
            Value::Function(FunctionValue::Definition { .. }) => write!(f, "ƒ"),
            Value::Function(FunctionValue::Native { name, .. }) => write!(f, "ƒ {name}"),
            Value::Exception { kind, .. } => write!(f, "!{kind}"),
            Value::None => write!(f, "ø"),
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Tests
// ══════════════════════════════════════════════════════════════════════════════
