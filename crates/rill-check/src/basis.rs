//! Signatures of the native basis, as the checker sees them.
//!
//! The evaluator registers the same surface with evaluation hooks attached;
//! the checker only needs names and types to derive the type of property
//! references, conversions, and stream references. Type variables in
//! signatures (`T`, `K`, `V`) are resolved per call site by substituting the
//! subject's element types.

use std::collections::HashMap;

use rill_types::{BasisKind, Type};

/// A native function signature.
#[derive(Debug, Clone)]
pub struct FnSig {
    pub params: Vec<(String, Type)>,
    pub output: Type,
}

impl FnSig {
    fn new(params: Vec<(&str, Type)>, output: Type) -> FnSig {
        FnSig {
            params: params
                .into_iter()
                .map(|(name, ty)| (name.to_string(), ty))
                .collect(),
            output,
        }
    }

    /// The function type of this signature.
    pub fn as_type(&self) -> Type {
        Type::function(
            self.params.iter().map(|(_, ty)| ty.clone()).collect(),
            self.output.clone(),
        )
    }
}

/// Registry mapping `(basis kind, member name)` → signature and
/// `(basis kind, conversion marker)` → output type.
#[derive(Debug)]
pub struct BasisSurface {
    members: HashMap<(BasisKind, String), FnSig>,
    conversions: HashMap<(BasisKind, String), Type>,
    streams: HashMap<String, Type>,
}

impl BasisSurface {
    /// The standard basis surface.
    pub fn standard() -> BasisSurface {
        let mut surface = BasisSurface {
            members: HashMap::new(),
            conversions: HashMap::new(),
            streams: HashMap::new(),
        };
        surface.register_list();
        surface.register_set();
        surface.register_map();
        surface.register_text();
        surface.register_conversions();
        surface.register_streams();
        surface
    }

    /// Look up a member signature. Absent kinds and names are `None`, never
    /// an error.
    pub fn member(&self, kind: BasisKind, name: &str) -> Option<&FnSig> {
        self.members.get(&(kind, name.to_string()))
    }

    /// Look up the output type of a conversion by target marker.
    pub fn conversion(&self, kind: BasisKind, marker: &str) -> Option<&Type> {
        self.conversions.get(&(kind, marker.to_string()))
    }

    /// Look up the element type of a registered stream definition.
    pub fn stream(&self, name: &str) -> Option<&Type> {
        self.streams.get(name)
    }

    // ──────────────────────────────────────────────────────────────────────
    // Registration
    // ──────────────────────────────────────────────────────────────────────

    fn add(&mut self, kind: BasisKind, aliases: &[&str], sig: FnSig) {
        for alias in aliases {
            self.members
                .insert((kind, alias.to_string()), sig.clone());
        }
    }

    fn add_conversion(&mut self, kind: BasisKind, marker: &str, output: Type) {
        self.conversions.insert((kind, marker.to_string()), output);
    }

    fn register_list(&mut self) {
        let t = || Type::Name("T".into());
        let list_t = || Type::list_of(Type::Name("T".into()));
        self.add(
            BasisKind::List,
            &["add", "append"],
            FnSig::new(vec![("value", t())], list_t()),
        );
        self.add(
            BasisKind::List,
            &["length"],
            FnSig::new(vec![], Type::measurement()),
        );
        self.add(BasisKind::List, &["first"], FnSig::new(vec![], t()));
        self.add(BasisKind::List, &["last"], FnSig::new(vec![], t()));
        self.add(
            BasisKind::List,
            &["has"],
            FnSig::new(vec![("value", t())], Type::Boolean),
        );
        self.add(
            BasisKind::List,
            &["join"],
            FnSig::new(vec![("separator", Type::text())], Type::text()),
        );
        self.add(BasisKind::List, &["reverse"], FnSig::new(vec![], list_t()));
        self.add(BasisKind::List, &["sansFirst"], FnSig::new(vec![], list_t()));
        self.add(BasisKind::List, &["sansLast"], FnSig::new(vec![], list_t()));
        self.add(
            BasisKind::List,
            &["sans"],
            FnSig::new(vec![("value", t())], list_t()),
        );
        self.add(
            BasisKind::List,
            &["sansAll"],
            FnSig::new(vec![("value", t())], list_t()),
        );
    }

    fn register_set(&mut self) {
        let t = || Type::Name("T".into());
        let set_t = || Type::set_of(Type::Name("T".into()));
        self.add(
            BasisKind::Set,
            &["add"],
            FnSig::new(vec![("value", t())], set_t()),
        );
        self.add(
            BasisKind::Set,
            &["remove"],
            FnSig::new(vec![("value", t())], set_t()),
        );
        self.add(
            BasisKind::Set,
            &["union"],
            FnSig::new(vec![("set", set_t())], set_t()),
        );
        self.add(
            BasisKind::Set,
            &["intersection"],
            FnSig::new(vec![("set", set_t())], set_t()),
        );
        self.add(
            BasisKind::Set,
            &["difference"],
            FnSig::new(vec![("set", set_t())], set_t()),
        );
    }

    fn register_map(&mut self) {
        let k = || Type::Name("K".into());
        let v = || Type::Name("V".into());
        let map_kv = || Type::map_of(Type::Name("K".into()), Type::Name("V".into()));
        self.add(
            BasisKind::Map,
            &["set"],
            FnSig::new(vec![("key", k()), ("value", v())], map_kv()),
        );
        self.add(
            BasisKind::Map,
            &["unset"],
            FnSig::new(vec![("key", k())], map_kv()),
        );
        self.add(
            BasisKind::Map,
            &["remove"],
            FnSig::new(vec![("value", v())], map_kv()),
        );
    }

    fn register_text(&mut self) {
        self.add(
            BasisKind::Text,
            &["length"],
            FnSig::new(vec![], Type::measurement()),
        );
    }

    fn register_conversions(&mut self) {
        let text = Type::text;
        self.add_conversion(BasisKind::List, "''", text());
        self.add_conversion(BasisKind::List, "{}", Type::Set(None));
        self.add_conversion(BasisKind::Set, "''", text());
        self.add_conversion(BasisKind::Set, "[]", Type::List(None));
        self.add_conversion(BasisKind::Map, "''", text());
        self.add_conversion(BasisKind::Map, "{}", Type::Set(None));
        self.add_conversion(BasisKind::Map, "[]", Type::List(None));
        self.add_conversion(BasisKind::Boolean, "''", text());
        self.add_conversion(BasisKind::None, "''", text());
        self.add_conversion(BasisKind::Measurement, "''", text());
        self.add_conversion(BasisKind::Text, "[]", Type::list_of(text()));
    }

    fn register_streams(&mut self) {
        self.streams.insert("key".into(), Type::text());
        self.streams.insert(
            "time".into(),
            Type::measurement_in(rill_types::Unit::of("ms")),
        );
    }
}

impl Default for BasisSurface {
    fn default() -> Self {
        Self::standard()
    }
}
