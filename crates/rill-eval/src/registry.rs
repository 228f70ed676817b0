//! Native function, conversion, and stream registration.
//!
//! A function registration associates a primitive basis kind with name
//! aliases, type variables, an ordered parameter list, a declared output
//! type, and an evaluation hook `(activation) -> Value`. A conversion
//! registration associates a basis kind with a textual target-type marker
//! and a hook guarded by a runtime instance check of the input value.
//! Lookups return `None` for absent kinds and names rather than failing.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;

use rill_types::{BasisKind, Type, Unit};

use crate::evaluation::Evaluation;
use crate::stream::{InputSource, KeyboardSource, TimerSource};
use crate::value::{ExceptionKind, Value};

/// An evaluation hook for a native function body.
pub type NativeHook = Arc<dyn Fn(&Evaluation) -> Value + Send + Sync>;

/// A conversion hook; the input is instance-checked before invocation.
pub type ConversionHook = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// A hook creating a live input source from configuration values.
pub type StreamHook = Arc<dyn Fn(&[Value]) -> Box<dyn InputSource> + Send + Sync>;

// ══════════════════════════════════════════════════════════════════════════════
// Registration records
// ══════════════════════════════════════════════════════════════════════════════

/// One parameter of a native function or stream configuration.
#[derive(Debug, Clone)]
pub struct NativeParam {
    pub name: String,
    pub ty: Type,
    pub required: bool,
    pub rest: bool,
    pub default: Option<Value>,
}

impl NativeParam {
    pub fn required(name: &str, ty: Type) -> NativeParam {
        NativeParam {
            name: name.to_string(),
            ty,
            required: true,
            rest: false,
            default: None,
        }
    }

    pub fn optional(name: &str, ty: Type, default: Value) -> NativeParam {
        NativeParam {
            name: name.to_string(),
            ty,
            required: false,
            rest: false,
            default: Some(default),
        }
    }

    pub fn rest(name: &str, ty: Type) -> NativeParam {
        NativeParam {
            name: name.to_string(),
            ty,
            required: false,
            rest: true,
            default: None,
        }
    }
}

/// A registered native function.
pub struct NativeFunction {
    pub aliases: Vec<String>,
    pub type_vars: Vec<String>,
    pub params: Vec<NativeParam>,
    pub output: Type,
    pub hook: NativeHook,
}

/// A registered conversion, keyed by its textual target-type marker.
pub struct NativeConversion {
    pub marker: String,
    pub expects: BasisKind,
    pub output: Type,
    pub hook: ConversionHook,
}

/// A registered stream definition: configuration parameters plus the hook
/// that creates a live source. Reconfiguration goes through the live
/// source's `configure`, preserving its history.
pub struct StreamDefinition {
    pub name: String,
    pub config: Vec<NativeParam>,
    pub element: Type,
    pub initial: Value,
    pub create: StreamHook,
}

// ══════════════════════════════════════════════════════════════════════════════
// Registry
// ══════════════════════════════════════════════════════════════════════════════

/// The native basis: functions by `(kind, name)`, conversions by
/// `(kind, target marker)`, stream definitions by name.
pub struct NativeRegistry {
    functions: HashMap<(BasisKind, String), Arc<NativeFunction>>,
    conversions: HashMap<BasisKind, Vec<NativeConversion>>,
    streams: HashMap<String, Arc<StreamDefinition>>,
}

impl NativeRegistry {
    /// The standard basis.
    pub fn standard() -> NativeRegistry {
        let mut registry = NativeRegistry {
            functions: HashMap::new(),
            conversions: HashMap::new(),
            streams: HashMap::new(),
        };
        registry.register_list();
        registry.register_set();
        registry.register_map();
        registry.register_text();
        registry.register_conversions();
        registry.register_streams();
        registry
    }

    /// Look up a function by kind and name. Absent kinds and names are
    /// `None`, never an error.
    pub fn function(&self, kind: BasisKind, name: &str) -> Option<&Arc<NativeFunction>> {
        self.functions.get(&(kind, name.to_string()))
    }

    /// Look up a conversion by kind and target marker.
    pub fn conversion(&self, kind: BasisKind, marker: &str) -> Option<&NativeConversion> {
        self.conversions
            .get(&kind)?
            .iter()
            .find(|c| c.marker == marker)
    }

    /// Look up a stream definition by name.
    pub fn stream(&self, name: &str) -> Option<&Arc<StreamDefinition>> {
        self.streams.get(name)
    }

    // ──────────────────────────────────────────────────────────────────────
    // Registration
    // ──────────────────────────────────────────────────────────────────────

    /// Register a native function under each of its aliases.
    pub fn add_function(
        &mut self,
        kind: BasisKind,
        aliases: &[&str],
        type_vars: &[&str],
        params: Vec<NativeParam>,
        output: Type,
        hook: NativeHook,
    ) {
        let function = Arc::new(NativeFunction {
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            type_vars: type_vars.iter().map(|v| v.to_string()).collect(),
            params,
            output,
            hook,
        });
        for alias in aliases {
            self.functions
                .insert((kind, alias.to_string()), Arc::clone(&function));
        }
    }

    /// Register a conversion, guarded by an instance check of `expects`.
    pub fn add_conversion(
        &mut self,
        kind: BasisKind,
        marker: &str,
        expects: BasisKind,
        output: Type,
        hook: ConversionHook,
    ) {
        self.conversions
            .entry(kind)
            .or_default()
            .push(NativeConversion {
                marker: marker.to_string(),
                expects,
                output,
                hook,
            });
    }

    pub fn add_stream(&mut self, definition: StreamDefinition) {
        self.streams
            .insert(definition.name.clone(), Arc::new(definition));
    }

    // ──────────────────────────────────────────────────────────────────────
    // Lists
    // ──────────────────────────────────────────────────────────────────────

    fn register_list(&mut self) {
        let t = || Type::Name("T".into());
        let list_t = || Type::list_of(Type::Name("T".into()));

        self.add_function(
            BasisKind::List,
            &["add", "append"],
            &["T"],
            vec![NativeParam::required("value", t())],
            list_t(),
            Arc::new(|evaluation| {
                let (Some(Value::List(items)), Some(value)) =
                    (evaluation.context(), evaluation.resolve("value"))
                else {
                    return expected(evaluation);
                };
                let mut next = items.clone();
                next.push(value.clone());
                Value::List(next)
            }),
        );

        self.add_function(
            BasisKind::List,
            &["length"],
            &["T"],
            vec![],
            Type::measurement(),
            Arc::new(|evaluation| match evaluation.context() {
                Some(Value::List(items)) => Value::number(items.len() as i64),
                _ => expected(evaluation),
            }),
        );

        self.add_function(
            BasisKind::List,
            &["first"],
            &["T"],
            vec![],
            t(),
            Arc::new(|evaluation| match evaluation.context() {
                Some(Value::List(items)) => {
                    items.first().cloned().unwrap_or(Value::None)
                }
                _ => expected(evaluation),
            }),
        );

        self.add_function(
            BasisKind::List,
            &["last"],
            &["T"],
            vec![],
            t(),
            Arc::new(|evaluation| match evaluation.context() {
                Some(Value::List(items)) => {
                    items.last().cloned().unwrap_or(Value::None)
                }
                _ => expected(evaluation),
            }),
        );

        self.add_function(
            BasisKind::List,
            &["has"],
            &["T"],
            vec![NativeParam::required("value", t())],
            Type::Boolean,
            Arc::new(|evaluation| {
                let (Some(Value::List(items)), Some(value)) =
                    (evaluation.context(), evaluation.resolve("value"))
                else {
                    return expected(evaluation);
                };
                Value::Bool(items.contains(value))
            }),
        );

        self.add_function(
            BasisKind::List,
            &["join"],
            &["T"],
            vec![NativeParam::required("separator", Type::text())],
            Type::text(),
            Arc::new(|evaluation| {
                let (Some(Value::List(items)), Some(Value::Text(separator))) =
                    (evaluation.context(), evaluation.resolve("separator"))
                else {
                    return expected(evaluation);
                };
                let parts: Vec<String> =
                    items.iter().map(|v| v.as_plain_text()).collect();
                Value::Text(parts.join(separator))
            }),
        );

        self.add_function(
            BasisKind::List,
            &["reverse"],
            &["T"],
            vec![],
            list_t(),
            Arc::new(|evaluation| match evaluation.context() {
                Some(Value::List(items)) => {
                    Value::List(items.iter().rev().cloned().collect())
                }
                _ => expected(evaluation),
            }),
        );

        self.add_function(
            BasisKind::List,
            &["sansFirst"],
            &["T"],
            vec![],
            list_t(),
            Arc::new(|evaluation| match evaluation.context() {
                Some(Value::List(items)) => {
                    Value::List(items.iter().skip(1).cloned().collect())
                }
                _ => expected(evaluation),
            }),
        );

        self.add_function(
            BasisKind::List,
            &["sansLast"],
            &["T"],
            vec![],
            list_t(),
            Arc::new(|evaluation| match evaluation.context() {
                Some(Value::List(items)) => {
                    let keep = items.len().saturating_sub(1);
                    Value::List(items.iter().take(keep).cloned().collect())
                }
                _ => expected(evaluation),
            }),
        );

        self.add_function(
            BasisKind::List,
            &["sans"],
            &["T"],
            vec![NativeParam::required("value", t())],
            list_t(),
            Arc::new(|evaluation| {
                let (Some(Value::List(items)), Some(value)) =
                    (evaluation.context(), evaluation.resolve("value"))
                else {
                    return expected(evaluation);
                };
                let mut next = items.clone();
                if let Some(position) = next.iter().position(|v| v == value) {
                    next.remove(position);
                }
                Value::List(next)
            }),
        );

        self.add_function(
            BasisKind::List,
            &["sansAll"],
            &["T"],
            vec![NativeParam::required("value", t())],
            list_t(),
            Arc::new(|evaluation| {
                let (Some(Value::List(items)), Some(value)) =
                    (evaluation.context(), evaluation.resolve("value"))
                else {
                    return expected(evaluation);
                };
                Value::List(items.iter().filter(|v| *v != value).cloned().collect())
            }),
        );
    }

    // ──────────────────────────────────────────────────────────────────────
    // Sets
    // ──────────────────────────────────────────────────────────────────────

    fn register_set(&mut self) {
        let t = || Type::Name("T".into());
        let set_t = || Type::set_of(Type::Name("T".into()));

        self.add_function(
            BasisKind::Set,
            &["add"],
            &["T"],
            vec![NativeParam::required("value", t())],
            set_t(),
            Arc::new(|evaluation| {
                let (Some(Value::Set(items)), Some(value)) =
                    (evaluation.context(), evaluation.resolve("value"))
                else {
                    return expected(evaluation);
                };
                let mut next = items.clone();
                if !next.contains(value) {
                    next.push(value.clone());
                }
                Value::Set(next)
            }),
        );

        self.add_function(
            BasisKind::Set,
            &["remove"],
            &["T"],
            vec![NativeParam::required("value", t())],
            set_t(),
            Arc::new(|evaluation| {
                let (Some(Value::Set(items)), Some(value)) =
                    (evaluation.context(), evaluation.resolve("value"))
                else {
                    return expected(evaluation);
                };
                Value::Set(items.iter().filter(|v| *v != value).cloned().collect())
            }),
        );

        self.add_function(
            BasisKind::Set,
            &["union"],
            &["T"],
            vec![NativeParam::required("set", set_t())],
            set_t(),
            Arc::new(|evaluation| {
                let (Some(Value::Set(items)), Some(Value::Set(other))) =
                    (evaluation.context(), evaluation.resolve("set"))
                else {
                    return expected(evaluation);
                };
                let mut next = items.clone();
                for value in other {
                    if !next.contains(value) {
                        next.push(value.clone());
                    }
                }
                Value::Set(next)
            }),
        );

        self.add_function(
            BasisKind::Set,
            &["intersection"],
            &["T"],
            vec![NativeParam::required("set", set_t())],
            set_t(),
            Arc::new(|evaluation| {
                let (Some(Value::Set(items)), Some(Value::Set(other))) =
                    (evaluation.context(), evaluation.resolve("set"))
                else {
                    return expected(evaluation);
                };
                Value::Set(
                    items
                        .iter()
                        .filter(|v| other.contains(v))
                        .cloned()
                        .collect(),
                )
            }),
        );

        self.add_function(
            BasisKind::Set,
            &["difference"],
            &["T"],
            vec![NativeParam::required("set", set_t())],
            set_t(),
            Arc::new(|evaluation| {
                let (Some(Value::Set(items)), Some(Value::Set(other))) =
                    (evaluation.context(), evaluation.resolve("set"))
                else {
                    return expected(evaluation);
                };
                Value::Set(
                    items
                        .iter()
                        .filter(|v| !other.contains(v))
                        .cloned()
                        .collect(),
                )
            }),
        );
    }

    // ──────────────────────────────────────────────────────────────────────
    // Maps
    // ──────────────────────────────────────────────────────────────────────

    fn register_map(&mut self) {
        let k = || Type::Name("K".into());
        let v = || Type::Name("V".into());
        let map_kv = || Type::map_of(Type::Name("K".into()), Type::Name("V".into()));

        self.add_function(
            BasisKind::Map,
            &["set"],
            &["K", "V"],
            vec![
                NativeParam::required("key", k()),
                NativeParam::required("value", v()),
            ],
            map_kv(),
            Arc::new(|evaluation| {
                let (Some(Value::Map(entries)), Some(key), Some(value)) = (
                    evaluation.context(),
                    evaluation.resolve("key"),
                    evaluation.resolve("value"),
                ) else {
                    return expected(evaluation);
                };
                let mut next = entries.clone();
                match next.iter_mut().find(|(existing, _)| existing == key) {
                    Some(entry) => entry.1 = value.clone(),
                    None => next.push((key.clone(), value.clone())),
                }
                Value::Map(next)
            }),
        );

        self.add_function(
            BasisKind::Map,
            &["unset"],
            &["K", "V"],
            vec![NativeParam::required("key", k())],
            map_kv(),
            Arc::new(|evaluation| {
                let (Some(Value::Map(entries)), Some(key)) =
                    (evaluation.context(), evaluation.resolve("key"))
                else {
                    return expected(evaluation);
                };
                Value::Map(
                    entries
                        .iter()
                        .filter(|(existing, _)| existing != key)
                        .cloned()
                        .collect(),
                )
            }),
        );

        self.add_function(
            BasisKind::Map,
            &["remove"],
            &["K", "V"],
            vec![NativeParam::required("value", v())],
            map_kv(),
            Arc::new(|evaluation| {
                let (Some(Value::Map(entries)), Some(value)) =
                    (evaluation.context(), evaluation.resolve("value"))
                else {
                    return expected(evaluation);
                };
                Value::Map(
                    entries
                        .iter()
                        .filter(|(_, existing)| existing != value)
                        .cloned()
                        .collect(),
                )
            }),
        );
    }

    // ──────────────────────────────────────────────────────────────────────
    // Text
    // ──────────────────────────────────────────────────────────────────────

    fn register_text(&mut self) {
        self.add_function(
            BasisKind::Text,
            &["length"],
            &[],
            vec![],
            Type::measurement(),
            Arc::new(|evaluation| match evaluation.context() {
                Some(Value::Text(text)) => {
                    Value::number(text.chars().count() as i64)
                }
                _ => expected(evaluation),
            }),
        );
    }

    // ──────────────────────────────────────────────────────────────────────
    // Conversions
    // ──────────────────────────────────────────────────────────────────────

    fn register_conversions(&mut self) {
        self.add_conversion(
            BasisKind::List,
            "''",
            BasisKind::List,
            Type::text(),
            Arc::new(|value| Value::Text(value.to_string())),
        );
        self.add_conversion(
            BasisKind::List,
            "{}",
            BasisKind::List,
            Type::Set(None),
            Arc::new(|value| match value {
                Value::List(items) => {
                    let mut unique: Vec<Value> = Vec::new();
                    for item in items {
                        if !unique.contains(item) {
                            unique.push(item.clone());
                        }
                    }
                    Value::Set(unique)
                }
                _ => Value::None,
            }),
        );
        self.add_conversion(
            BasisKind::Set,
            "''",
            BasisKind::Set,
            Type::text(),
            Arc::new(|value| Value::Text(value.to_string())),
        );
        self.add_conversion(
            BasisKind::Set,
            "[]",
            BasisKind::Set,
            Type::List(None),
            Arc::new(|value| match value {
                Value::Set(items) => Value::List(items.clone()),
                _ => Value::None,
            }),
        );
        self.add_conversion(
            BasisKind::Map,
            "''",
            BasisKind::Map,
            Type::text(),
            Arc::new(|value| Value::Text(value.to_string())),
        );
        self.add_conversion(
            BasisKind::Map,
            "{}",
            BasisKind::Map,
            Type::Set(None),
            Arc::new(|value| match value {
                Value::Map(entries) => {
                    Value::Set(entries.iter().map(|(k, _)| k.clone()).collect())
                }
                _ => Value::None,
            }),
        );
        self.add_conversion(
            BasisKind::Map,
            "[]",
            BasisKind::Map,
            Type::List(None),
            Arc::new(|value| match value {
                Value::Map(entries) => {
                    Value::List(entries.iter().map(|(_, v)| v.clone()).collect())
                }
                _ => Value::None,
            }),
        );
        self.add_conversion(
            BasisKind::Boolean,
            "''",
            BasisKind::Boolean,
            Type::text(),
            Arc::new(|value| Value::Text(value.to_string())),
        );
        self.add_conversion(
            BasisKind::None,
            "''",
            BasisKind::None,
            Type::text(),
            Arc::new(|value| Value::Text(value.to_string())),
        );
        self.add_conversion(
            BasisKind::Measurement,
            "''",
            BasisKind::Measurement,
            Type::text(),
            Arc::new(|value| Value::Text(value.to_string())),
        );
        self.add_conversion(
            BasisKind::Text,
            "[]",
            BasisKind::Text,
            Type::list_of(Type::text()),
            Arc::new(|value| match value {
                Value::Text(text) => Value::List(
                    text.chars().map(|c| Value::Text(c.to_string())).collect(),
                ),
                _ => Value::None,
            }),
        );
    }

    // ──────────────────────────────────────────────────────────────────────
    // Streams
    // ──────────────────────────────────────────────────────────────────────

    fn register_streams(&mut self) {
        self.add_stream(StreamDefinition {
            name: "key".into(),
            config: vec![
                // Default to none, allowing all keys.
                NativeParam::optional(
                    "key",
                    Type::union(Type::text(), Type::None),
                    Value::None,
                ),
                // Default to none, allowing press and release.
                NativeParam::optional(
                    "down",
                    Type::union(Type::Boolean, Type::None),
                    Value::None,
                ),
            ],
            element: Type::text(),
            initial: Value::Text(String::new()),
            create: Arc::new(|config| {
                Box::new(KeyboardSource::from_config(config)) as Box<dyn InputSource>
            }),
        });

        self.add_stream(StreamDefinition {
            name: "time".into(),
            config: vec![NativeParam::optional(
                "period",
                Type::measurement_in(Unit::of("ms")),
                Value::Measurement(Decimal::from(33), Unit::of("ms")),
            )],
            element: Type::measurement_in(Unit::of("ms")),
            initial: Value::Measurement(Decimal::ZERO, Unit::of("ms")),
            create: Arc::new(|config| {
                Box::new(TimerSource::from_config(config)) as Box<dyn InputSource>
            }),
        });
    }
}

impl Default for NativeRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

/// The exception a native body raises when its activation holds values of
/// the wrong runtime kind.
fn expected(evaluation: &Evaluation) -> Value {
    Value::exception(ExceptionKind::ExpectedType, evaluation.node())
}
