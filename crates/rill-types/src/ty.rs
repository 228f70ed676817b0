//! The structural type lattice.
//!
//! [`Type`] is a value object: structurally equal types are interchangeable
//! and types are never mutated after construction. The lattice is shared by
//! the conflict analyzer (static checking and narrowing) and the evaluator
//! (dynamic `•` type tests), so both agree on [`Type::accepts`].
//!
//! `accepts` is asymmetric and directional: the receiver is the expected
//! (declared) type and the candidate is the actual (inferred) type.

use std::fmt;

use indexmap::IndexMap;
use rust_decimal::Decimal;

use crate::node::NodeId;

// ══════════════════════════════════════════════════════════════════════════════
// Units
// ══════════════════════════════════════════════════════════════════════════════

/// The unit attached to a measurement, e.g. `ms` or `m`. `None` is the
/// unitless measurement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Unit(Option<String>);

impl Unit {
    pub fn none() -> Unit {
        Unit(None)
    }

    pub fn of(name: impl Into<String>) -> Unit {
        Unit(Some(name.into()))
    }

    pub fn name(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(name) => write!(f, "{name}"),
            None => Ok(()),
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Basis kinds
// ══════════════════════════════════════════════════════════════════════════════

/// The primitive kind a type or value belongs to, used to key native
/// function and conversion lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasisKind {
    Boolean,
    Measurement,
    Text,
    None,
    Never,
    Any,
    Unknown,
    List,
    Set,
    Map,
    Structure,
    Function,
    Union,
    Stream,
    Conversion,
    Name,
}

impl BasisKind {
    pub fn label(self) -> &'static str {
        match self {
            BasisKind::Boolean => "boolean",
            BasisKind::Measurement => "measurement",
            BasisKind::Text => "text",
            BasisKind::None => "none",
            BasisKind::Never => "never",
            BasisKind::Any => "any",
            BasisKind::Unknown => "unknown",
            BasisKind::List => "list",
            BasisKind::Set => "set",
            BasisKind::Map => "map",
            BasisKind::Structure => "structure",
            BasisKind::Function => "function",
            BasisKind::Union => "union",
            BasisKind::Stream => "stream",
            BasisKind::Conversion => "conversion",
            BasisKind::Name => "name",
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Type
// ══════════════════════════════════════════════════════════════════════════════

/// A structural type.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    // ── Primitives ──
    Boolean,
    /// A number with a unit; a literal payload restricts acceptance to that
    /// exact value.
    Measurement {
        literal: Option<Decimal>,
        unit: Unit,
    },
    /// Any text, specific text, or text in a specific format.
    Text {
        literal: Option<String>,
        format: Option<String>,
    },
    None,
    Never,
    Any,
    /// A type that could not be determined. Carries a causal chain: the node
    /// responsible and the prior unknown that led here.
    Unknown {
        node: Option<NodeId>,
        why: Option<Box<Type>>,
    },

    // ── Composites ──
    /// `[T]` — `None` is the open slot that accepts any element type.
    List(Option<Box<Type>>),
    /// `{T}`
    Set(Option<Box<Type>>),
    /// `{K:V}`
    Map(Option<Box<Type>>, Option<Box<Type>>),
    /// A custom type, compared by member shape rather than name identity.
    /// The definition id ties narrowing back to a specific declaration.
    Structure {
        name: String,
        definition: Option<NodeId>,
        members: Vec<(String, Type)>,
    },
    Function {
        inputs: Vec<Type>,
        output: Box<Type>,
    },
    Union(Box<Type>, Box<Type>),
    Stream(Box<Type>),
    Conversion {
        input: Box<Type>,
        output: Box<Type>,
    },
    /// A type-variable reference, resolved against a [`TypeContext`]
    /// substitution. Unresolved variables behave as `unknown`.
    Name(String),
}

impl Type {
    pub fn unknown(node: NodeId) -> Type {
        Type::Unknown {
            node: Some(node),
            why: None,
        }
    }

    /// An unknown caused by a prior unknown, preserving the causal chain.
    pub fn unknown_because(node: NodeId, why: Type) -> Type {
        Type::Unknown {
            node: Some(node),
            why: Some(Box::new(why)),
        }
    }

    /// The open (non-literal, unitless) measurement type.
    pub fn measurement() -> Type {
        Type::Measurement {
            literal: None,
            unit: Unit::none(),
        }
    }

    pub fn measurement_in(unit: Unit) -> Type {
        Type::Measurement {
            literal: None,
            unit,
        }
    }

    pub fn measurement_literal(value: Decimal, unit: Unit) -> Type {
        Type::Measurement {
            literal: Some(value),
            unit,
        }
    }

    /// The open text type accepting any text.
    pub fn text() -> Type {
        Type::Text {
            literal: None,
            format: None,
        }
    }

    pub fn text_literal(text: impl Into<String>) -> Type {
        Type::Text {
            literal: Some(text.into()),
            format: None,
        }
    }

    pub fn list_of(element: Type) -> Type {
        Type::List(Some(Box::new(element)))
    }

    pub fn set_of(element: Type) -> Type {
        Type::Set(Some(Box::new(element)))
    }

    pub fn map_of(key: Type, value: Type) -> Type {
        Type::Map(Some(Box::new(key)), Some(Box::new(value)))
    }

    pub fn function(inputs: Vec<Type>, output: Type) -> Type {
        Type::Function {
            inputs,
            output: Box::new(output),
        }
    }

    pub fn union(left: Type, right: Type) -> Type {
        Type::Union(Box::new(left), Box::new(right))
    }

    /// Fold a list of types into a union, deduplicating structurally equal
    /// branches. An empty list folds to `Never`.
    pub fn union_of(types: Vec<Type>) -> Type {
        let mut distinct: Vec<Type> = Vec::new();
        for ty in types {
            for branch in ty.branches() {
                if !distinct.contains(branch) {
                    distinct.push(branch.clone());
                }
            }
        }
        let mut iter = distinct.into_iter();
        match iter.next() {
            None => Type::Never,
            Some(first) => iter.fold(first, Type::union),
        }
    }

    pub fn stream_of(element: Type) -> Type {
        Type::Stream(Box::new(element))
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Type::Unknown { .. })
    }

    /// The branches of this type: unions flatten, everything else is a
    /// single branch.
    pub fn branches(&self) -> Vec<&Type> {
        match self {
            Type::Union(left, right) => {
                let mut out = left.branches();
                out.extend(right.branches());
                out
            }
            other => vec![other],
        }
    }

    /// The causal chain of an unknown type, outermost first.
    pub fn unknown_reasons(&self) -> Vec<&Type> {
        match self {
            Type::Unknown { why, .. } => {
                let mut out = vec![self];
                if let Some(why) = why {
                    out.extend(why.unknown_reasons());
                }
                out
            }
            _ => Vec::new(),
        }
    }

    /// The primitive kind of this type, used to key native lookups.
    pub fn basis_kind(&self) -> BasisKind {
        match self {
            Type::Boolean => BasisKind::Boolean,
            Type::Measurement { .. } => BasisKind::Measurement,
            Type::Text { .. } => BasisKind::Text,
            Type::None => BasisKind::None,
            Type::Never => BasisKind::Never,
            Type::Any => BasisKind::Any,
            Type::Unknown { .. } => BasisKind::Unknown,
            Type::List(_) => BasisKind::List,
            Type::Set(_) => BasisKind::Set,
            Type::Map(_, _) => BasisKind::Map,
            Type::Structure { .. } => BasisKind::Structure,
            Type::Function { .. } => BasisKind::Function,
            Type::Union(_, _) => BasisKind::Union,
            Type::Stream(_) => BasisKind::Stream,
            Type::Conversion { .. } => BasisKind::Conversion,
            Type::Name(_) => BasisKind::Name,
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Type context
// ══════════════════════════════════════════════════════════════════════════════

/// The explicit substitution map carried alongside a type query, binding
/// type-variable names captured at the call or instantiation site. Passed by
/// reference rather than held in ambient state so resolution stays
/// reentrant-safe.
#[derive(Debug, Clone, Default)]
pub struct TypeContext {
    substitutions: IndexMap<String, Type>,
}

impl TypeContext {
    pub fn empty() -> TypeContext {
        TypeContext::default()
    }

    pub fn with(mut self, name: impl Into<String>, ty: Type) -> TypeContext {
        self.substitutions.insert(name.into(), ty);
        self
    }

    /// Resolve a type variable. `None` means unresolved, which acceptance
    /// treats as `unknown` rather than an error.
    pub fn resolve(&self, name: &str) -> Option<&Type> {
        self.substitutions.get(name)
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Acceptance
// ══════════════════════════════════════════════════════════════════════════════

impl Type {
    /// Does this (expected) type accept the given (actual) candidate?
    ///
    /// - A union candidate is accepted iff *every* branch is accepted.
    /// - A union receiver accepts iff *some* branch accepts.
    /// - Open generic slots (`[?]`, `{?}`, `{?:?}`) accept any element type;
    ///   specified slots are checked recursively.
    /// - Literal text and measurement types accept only exactly matching
    ///   literals unless the receiver is the unconstrained form.
    /// - `unknown` never accepts anything and is never accepted.
    /// - Structural types accept any candidate that implements every
    ///   declared member by name and type, regardless of name identity.
    pub fn accepts(&self, candidate: &Type, context: &TypeContext) -> bool {
        match (self, candidate) {
            // Any comparison touching unknown is evidence of an upstream
            // conflict and never succeeds.
            (Type::Unknown { .. }, _) | (_, Type::Unknown { .. }) => false,

            // All of a union candidate's possibilities must be covered.
            (_, Type::Union(a, b)) => {
                self.accepts(a, context) && self.accepts(b, context)
            }
            (Type::Union(a, b), _) => {
                a.accepts(candidate, context) || b.accepts(candidate, context)
            }

            // Type variables resolve through the substitution map; an
            // unresolved variable behaves as unknown.
            (Type::Name(name), _) => match context.resolve(name) {
                Some(resolved) => resolved.clone().accepts(candidate, context),
                None => false,
            },
            (_, Type::Name(name)) => match context.resolve(name) {
                Some(resolved) => self.accepts(&resolved.clone(), context),
                None => false,
            },

            (Type::Any, _) | (_, Type::Any) => true,
            (Type::Never, Type::Never) => true,
            (Type::Never, _) | (_, Type::Never) => false,

            (Type::Boolean, Type::Boolean) => true,
            (Type::None, Type::None) => true,

            (
                Type::Measurement { literal, unit },
                Type::Measurement {
                    literal: candidate_literal,
                    unit: candidate_unit,
                },
            ) => {
                unit == candidate_unit
                    && (literal.is_none() || literal == candidate_literal)
            }

            (
                Type::Text { literal, format },
                Type::Text {
                    literal: candidate_literal,
                    format: candidate_format,
                },
            ) => {
                (literal.is_none() || literal == candidate_literal)
                    && (format.is_none() || format == candidate_format)
            }

            (Type::List(element), Type::List(candidate_element)) => {
                accepts_slot(element, candidate_element, context)
            }
            (Type::Set(element), Type::Set(candidate_element)) => {
                accepts_slot(element, candidate_element, context)
            }
            (Type::Map(key, value), Type::Map(candidate_key, candidate_value)) => {
                accepts_slot(key, candidate_key, context)
                    && accepts_slot(value, candidate_value, context)
            }

            (
                Type::Structure { members, .. },
                Type::Structure {
                    members: candidate_members,
                    ..
                },
            ) => members.iter().all(|(name, ty)| {
                candidate_members
                    .iter()
                    .find(|(candidate_name, _)| candidate_name == name)
                    .is_some_and(|(_, candidate_ty)| ty.accepts(candidate_ty, context))
            }),

            (
                Type::Function { inputs, output },
                Type::Function {
                    inputs: candidate_inputs,
                    output: candidate_output,
                },
            ) => {
                // Contravariant inputs, covariant output.
                inputs.len() == candidate_inputs.len()
                    && inputs
                        .iter()
                        .zip(candidate_inputs.iter())
                        .all(|(input, candidate_input)| {
                            candidate_input.accepts(input, context)
                        })
                    && output.accepts(candidate_output, context)
            }

            (Type::Stream(element), Type::Stream(candidate_element)) => {
                element.accepts(candidate_element, context)
            }

            (
                Type::Conversion { input, output },
                Type::Conversion {
                    input: candidate_input,
                    output: candidate_output,
                },
            ) => {
                input.accepts(candidate_input, context)
                    && output.accepts(candidate_output, context)
            }

            _ => false,
        }
    }

    /// Erase literal specificity, recursively: a literal text type becomes
    /// the open text type, a literal measurement keeps only its unit. Used
    /// when merging branches of conditional or union control flow.
    pub fn generalize(&self, context: &TypeContext) -> Type {
        match self {
            Type::Measurement { unit, .. } => Type::Measurement {
                literal: None,
                unit: unit.clone(),
            },
            Type::Text { format, .. } => Type::Text {
                literal: None,
                format: format.clone(),
            },
            Type::List(element) => {
                Type::List(element.as_ref().map(|e| Box::new(e.generalize(context))))
            }
            Type::Set(element) => {
                Type::Set(element.as_ref().map(|e| Box::new(e.generalize(context))))
            }
            Type::Map(key, value) => Type::Map(
                key.as_ref().map(|k| Box::new(k.generalize(context))),
                value.as_ref().map(|v| Box::new(v.generalize(context))),
            ),
            Type::Union(left, right) => Type::union_of(vec![
                left.generalize(context),
                right.generalize(context),
            ]),
            Type::Stream(element) => Type::Stream(Box::new(element.generalize(context))),
            other => other.clone(),
        }
    }

    /// Substitute type variables using the bindings captured at the call or
    /// instantiation site. Variables absent from the context are left in
    /// place (and behave as unknown under acceptance).
    pub fn substitute(&self, context: &TypeContext) -> Type {
        match self {
            Type::Name(name) => context
                .resolve(name)
                .cloned()
                .unwrap_or_else(|| self.clone()),
            Type::List(element) => {
                Type::List(element.as_ref().map(|e| Box::new(e.substitute(context))))
            }
            Type::Set(element) => {
                Type::Set(element.as_ref().map(|e| Box::new(e.substitute(context))))
            }
            Type::Map(key, value) => Type::Map(
                key.as_ref().map(|k| Box::new(k.substitute(context))),
                value.as_ref().map(|v| Box::new(v.substitute(context))),
            ),
            Type::Union(left, right) => Type::union(
                left.substitute(context),
                right.substitute(context),
            ),
            Type::Function { inputs, output } => Type::Function {
                inputs: inputs.iter().map(|i| i.substitute(context)).collect(),
                output: Box::new(output.substitute(context)),
            },
            Type::Stream(element) => Type::Stream(Box::new(element.substitute(context))),
            Type::Conversion { input, output } => Type::Conversion {
                input: Box::new(input.substitute(context)),
                output: Box::new(output.substitute(context)),
            },
            other => other.clone(),
        }
    }
}

/// Acceptance for an optional element slot: an unspecified receiver slot
/// accepts anything; a specified receiver requires a specified, accepted
/// candidate.
fn accepts_slot(
    slot: &Option<Box<Type>>,
    candidate: &Option<Box<Type>>,
    context: &TypeContext,
) -> bool {
    match (slot, candidate) {
        (None, _) => true,
        (Some(expected), Some(actual)) => expected.accepts(actual, context),
        (Some(_), None) => false,
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Type sets
// ══════════════════════════════════════════════════════════════════════════════

/// The candidate set of types a binding may have at a point in the program,
/// refined by flow-sensitive narrowing.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeSet {
    types: Vec<Type>,
}

impl TypeSet {
    pub fn new(types: Vec<Type>) -> TypeSet {
        TypeSet { types }
    }

    /// The candidate set of a type: its union branches.
    pub fn of(ty: &Type) -> TypeSet {
        TypeSet {
            types: ty.branches().into_iter().cloned().collect(),
        }
    }

    pub fn list(&self) -> &[Type] {
        &self.types
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// True when the receiver accepts every candidate in the set.
    pub fn accepted_by(&self, receiver: &Type, context: &TypeContext) -> bool {
        self.types.iter().all(|ty| receiver.accepts(ty, context))
    }

    /// True when the receiver accepts at least one candidate in the set —
    /// the precondition for narrowing to the receiver.
    pub fn any_accepted_by(&self, receiver: &Type, context: &TypeContext) -> bool {
        self.types.iter().any(|ty| receiver.accepts(ty, context))
    }

    /// Collapse the set back into a single type.
    pub fn as_type(&self) -> Type {
        Type::union_of(self.types.clone())
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Display
// ══════════════════════════════════════════════════════════════════════════════

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Boolean => write!(f, "?"),
            Type::Measurement { literal, unit } => match literal {
                Some(value) => write!(f, "{value}{unit}"),
                None => write!(f, "#{unit}"),
            },
            Type::Text { literal, format } => {
                match literal {
                    Some(text) => write!(f, "\"{text}\"")?,
                    None => write!(f, "''")?,
                }
                if let Some(format) = format {
                    write!(f, "/{format}")?;
                }
                Ok(())
            }
            Type::None => write!(f, "ø"),
            Type::Never => write!(f, "never"),
            Type::Any => write!(f, "any"),
            Type::Unknown { .. } => write!(f, "⁇"),
            Type::List(element) => match element {
                Some(element) => write!(f, "[{element}]"),
                None => write!(f, "[]"),
            },
            Type::Set(element) => match element {
                Some(element) => write!(f, "{{{element}}}"),
                None => write!(f, "{{}}"),
            },
            Type::Map(key, value) => {
                let key = key.as_ref().map(|k| k.to_string()).unwrap_or_default();
                let value = value.as_ref().map(|v| v.to_string()).unwrap_or_default();
                write!(f, "{{{key}:{value}}}")
            }
            Type::Structure { name, .. } => write!(f, "•{name}"),
            Type::Function { inputs, output } => {
                write!(f, "ƒ(")?;
                for (i, input) in inputs.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{input}")?;
                }
                write!(f, ") {output}")
            }
            Type::Union(left, right) => write!(f, "{left}|{right}"),
            Type::Stream(element) => write!(f, "∆{element}"),
            Type::Conversion { input, output } => write!(f, "{input}→{output}"),
            Type::Name(name) => write!(f, "{name}"),
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Tests
// ══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> TypeContext {
        TypeContext::empty()
    }

    /// Every constructible type accepts itself, with the sole exception of
    /// `unknown`, which never accepts and is never accepted.
    #[test]
    fn acceptance_is_reflexive() {
        let samples = vec![
            Type::Boolean,
            Type::measurement(),
            Type::measurement_in(Unit::of("ms")),
            Type::measurement_literal(Decimal::from(5), Unit::none()),
            Type::text(),
            Type::text_literal("hi"),
            Type::None,
            Type::Never,
            Type::Any,
            Type::List(None),
            Type::list_of(Type::measurement()),
            Type::Set(None),
            Type::set_of(Type::text()),
            Type::Map(None, None),
            Type::map_of(Type::measurement(), Type::text()),
            Type::Structure {
                name: "point".into(),
                definition: None,
                members: vec![
                    ("x".into(), Type::measurement()),
                    ("y".into(), Type::measurement()),
                ],
            },
            Type::function(vec![Type::measurement()], Type::Boolean),
            Type::union(Type::measurement(), Type::text()),
            Type::stream_of(Type::text()),
            Type::Conversion {
                input: Box::new(Type::list_of(Type::text())),
                output: Box::new(Type::text()),
            },
        ];
        for ty in &samples {
            assert!(ty.accepts(ty, &ctx()), "{ty} does not accept itself");
        }
    }

    #[test]
    fn unknown_is_not_even_reflexive() {
        let unknown = Type::Unknown {
            node: None,
            why: None,
        };
        assert!(!unknown.accepts(&unknown, &ctx()));
        assert!(!Type::Any.accepts(&unknown, &ctx()));
        assert!(!unknown.accepts(&Type::Any, &ctx()));
    }

    /// `R.accepts(A|B) == R.accepts(A) && R.accepts(B)`.
    #[test]
    fn union_covering_law() {
        let receivers = vec![
            Type::measurement(),
            Type::text(),
            Type::union(Type::measurement(), Type::text()),
            Type::union(Type::Boolean, Type::None),
            Type::Any,
        ];
        let pairs = vec![
            (Type::measurement(), Type::text()),
            (Type::Boolean, Type::None),
            (Type::measurement(), Type::measurement()),
        ];
        for receiver in &receivers {
            for (a, b) in &pairs {
                let union = Type::union(a.clone(), b.clone());
                assert_eq!(
                    receiver.accepts(&union, &ctx()),
                    receiver.accepts(a, &ctx()) && receiver.accepts(b, &ctx()),
                    "covering law failed for {receiver} vs {union}"
                );
            }
        }
    }

    #[test]
    fn literal_text_accepts_only_matching_literal() {
        let literal = Type::text_literal("hello");
        assert!(literal.accepts(&Type::text_literal("hello"), &ctx()));
        assert!(!literal.accepts(&Type::text_literal("goodbye"), &ctx()));
        assert!(!literal.accepts(&Type::text(), &ctx()));
        // The unconstrained form accepts any text.
        assert!(Type::text().accepts(&literal, &ctx()));
        assert!(Type::text().accepts(&Type::text(), &ctx()));
    }

    #[test]
    fn literal_measurement_respects_units() {
        let five = Type::measurement_literal(Decimal::from(5), Unit::of("m"));
        assert!(Type::measurement_in(Unit::of("m")).accepts(&five, &ctx()));
        assert!(!Type::measurement_in(Unit::of("s")).accepts(&five, &ctx()));
        assert!(!Type::measurement().accepts(&five, &ctx()));
        assert!(five.accepts(&five, &ctx()));
    }

    #[test]
    fn open_slots_accept_any_element() {
        let open = Type::List(None);
        assert!(open.accepts(&Type::list_of(Type::text()), &ctx()));
        assert!(open.accepts(&Type::List(None), &ctx()));
        let closed = Type::list_of(Type::measurement());
        assert!(closed.accepts(&Type::list_of(Type::measurement()), &ctx()));
        assert!(!closed.accepts(&Type::list_of(Type::text()), &ctx()));
        assert!(!closed.accepts(&Type::List(None), &ctx()));
        let map = Type::Map(None, None);
        assert!(map.accepts(&Type::map_of(Type::text(), Type::Boolean), &ctx()));
    }

    #[test]
    fn structures_accept_structurally() {
        let drawable = Type::Structure {
            name: "drawable".into(),
            definition: None,
            members: vec![(
                "draw".into(),
                Type::function(vec![], Type::text()),
            )],
        };
        let circle = Type::Structure {
            name: "circle".into(),
            definition: None,
            members: vec![
                ("radius".into(), Type::measurement()),
                ("draw".into(), Type::function(vec![], Type::text())),
            ],
        };
        let blob = Type::Structure {
            name: "blob".into(),
            definition: None,
            members: vec![("size".into(), Type::measurement())],
        };
        assert!(drawable.accepts(&circle, &ctx()));
        assert!(!drawable.accepts(&blob, &ctx()));
        assert!(!circle.accepts(&drawable, &ctx()));
    }

    #[test]
    fn functions_are_contravariant_in_inputs() {
        let takes_any_text = Type::function(vec![Type::text()], Type::Boolean);
        let takes_literal = Type::function(vec![Type::text_literal("x")], Type::Boolean);
        // A function that handles any text can stand in where only a
        // specific literal is required, not the other way around.
        assert!(takes_literal.accepts(&takes_any_text, &ctx()));
        assert!(!takes_any_text.accepts(&takes_literal, &ctx()));
    }

    #[test]
    fn type_variables_resolve_through_context() {
        let t = Type::Name("T".into());
        let bound = ctx().with("T", Type::measurement());
        assert!(t.accepts(&Type::measurement(), &bound));
        assert!(!t.accepts(&Type::text(), &bound));
        // Unresolved variables behave as unknown.
        assert!(!t.accepts(&Type::measurement(), &ctx()));
        assert!(!Type::measurement().accepts(&t, &ctx()));
    }

    #[test]
    fn generalize_erases_literals() {
        let literal = Type::text_literal("hi");
        assert_eq!(literal.generalize(&ctx()), Type::text());
        let five = Type::measurement_literal(Decimal::from(5), Unit::of("m"));
        assert_eq!(five.generalize(&ctx()), Type::measurement_in(Unit::of("m")));
        let list = Type::list_of(Type::text_literal("hi"));
        assert_eq!(list.generalize(&ctx()), Type::list_of(Type::text()));
    }

    #[test]
    fn union_of_deduplicates() {
        let merged = Type::union_of(vec![
            Type::measurement(),
            Type::text(),
            Type::measurement(),
        ]);
        assert_eq!(merged.branches().len(), 2);
        assert_eq!(Type::union_of(vec![]), Type::Never);
        assert_eq!(Type::union_of(vec![Type::Boolean]), Type::Boolean);
    }

    #[test]
    fn type_set_acceptance() {
        let set = TypeSet::of(&Type::union(Type::measurement(), Type::text()));
        assert_eq!(set.list().len(), 2);
        assert!(set.any_accepted_by(&Type::measurement(), &ctx()));
        assert!(!set.accepted_by(&Type::measurement(), &ctx()));
        assert!(set.accepted_by(&Type::union(Type::measurement(), Type::text()), &ctx()));
    }

    #[test]
    fn unknown_chain_records_reasons() {
        let first = Type::Unknown {
            node: None,
            why: None,
        };
        let second = Type::Unknown {
            node: None,
            why: Some(Box::new(first)),
        };
        assert_eq!(second.unknown_reasons().len(), 2);
    }
}
