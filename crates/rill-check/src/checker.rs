//! The conflict analyzer.
//!
//! Entry point: [`ConflictAnalyzer::check`] — a whole-tree traversal that
//! asks each node kind for its conflicts given contextual type information,
//! and concatenates the results. The traversal never mutates the tree, and
//! recomputing conflicts for the same tree yields the same list.
//!
//! Contextual type derivation ([`ConflictAnalyzer::type_of`]) is memoized
//! per analyzer. Flow-sensitive narrowing is applied while walking the true
//! branch of a conditional guarded by a type test: the tested binding's
//! candidate set narrows to the tested type, matched by the identity of the
//! underlying definition rather than by name.

use std::collections::{HashMap, HashSet};

use rill_types::node::{Node, NodeId, NodeKind, TokenKind, Tree};
use rill_types::{Conflict, ConflictKind, Type, TypeContext, TypeSet};

use crate::basis::BasisSurface;

// ══════════════════════════════════════════════════════════════════════════════
// ConflictAnalyzer
// ══════════════════════════════════════════════════════════════════════════════

/// Walks a [`Tree`] and produces its static conflicts.
pub struct ConflictAnalyzer<'a> {
    tree: &'a Tree,
    basis: BasisSurface,
    /// Memoized node types. Skipped while a narrowing frame is active, since
    /// narrowed derivations are scope-local.
    memo: HashMap<NodeId, Type>,
    /// Definitions currently being resolved, for cycle detection.
    resolving: Vec<NodeId>,
    /// References that closed a resolution cycle.
    cycles: HashSet<NodeId>,
    /// Active narrowing frames: definition id → narrowed type.
    narrowings: Vec<(NodeId, Type)>,
}

impl<'a> ConflictAnalyzer<'a> {
    pub fn new(tree: &'a Tree) -> Self {
        Self {
            tree,
            basis: BasisSurface::standard(),
            memo: HashMap::new(),
            resolving: Vec::new(),
            cycles: HashSet::new(),
            narrowings: Vec::new(),
        }
    }

    /// Compute all conflicts for the tree, in pre-order.
    pub fn check(&mut self) -> Vec<Conflict> {
        let tree = self.tree;
        let mut out = Vec::new();
        self.walk(tree.root(), &mut out);
        out
    }

    fn walk(&mut self, node: &Node, out: &mut Vec<Conflict>) {
        out.extend(self.conflicts_for(node));
        if let NodeKind::Conditional {
            condition,
            then_branch,
            else_branch,
        } = node.kind()
        {
            self.walk(condition, out);
            let frame = self.narrowing_from(condition);
            if let Some(frame) = frame.clone() {
                self.narrowings.push(frame);
            }
            self.walk(then_branch, out);
            if frame.is_some() {
                self.narrowings.pop();
            }
            self.walk(else_branch, out);
        } else {
            for child in node.children() {
                self.walk(child, out);
            }
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Per-kind conflicts
    // ══════════════════════════════════════════════════════════════════════

    fn conflicts_for(&mut self, node: &Node) -> Vec<Conflict> {
        let mut out = Vec::new();
        match node.kind() {
            NodeKind::Unparsable { .. } => {
                // All syntax failures are conflicts — exactly one per node.
                out.push(Conflict::new(ConflictKind::UnparsableNode {
                    node: node.id(),
                }));
            }
            NodeKind::ListLiteral { open, close, .. } => {
                if close.is_none() {
                    out.push(Conflict::new(ConflictKind::UnclosedDelimiter {
                        node: node.id(),
                        open: open.id(),
                        expected: TokenKind::ListClose,
                    }));
                }
            }
            NodeKind::SetLiteral { open, close, .. } => {
                if close.is_none() {
                    out.push(Conflict::new(ConflictKind::UnclosedDelimiter {
                        node: node.id(),
                        open: open.id(),
                        expected: TokenKind::SetClose,
                    }));
                }
            }
            NodeKind::MapLiteral {
                open,
                entries,
                close,
            } => {
                if close.is_none() {
                    out.push(Conflict::new(ConflictKind::UnclosedDelimiter {
                        node: node.id(),
                        open: open.id(),
                        expected: TokenKind::SetClose,
                    }));
                }
                for entry in entries {
                    if !matches!(entry.kind(), NodeKind::KeyValue { .. }) {
                        out.push(Conflict::new(ConflictKind::NotAKeyValue {
                            map: node.id(),
                            entry: entry.id(),
                            open: open.id(),
                        }));
                    }
                }
            }
            NodeKind::Select { query, .. }
            | NodeKind::Update { query, .. }
            | NodeKind::Delete { query, .. } => {
                let query_ty = self.type_of(query);
                if !query_ty.is_unknown()
                    && !Type::Boolean.accepts(&query_ty, &TypeContext::empty())
                {
                    out.push(Conflict::new(ConflictKind::NonBooleanQuery {
                        query: query.id(),
                        actual: query_ty.to_string(),
                    }));
                }
            }
            NodeKind::Conditional { condition, .. } => {
                let condition_ty = self.type_of(condition);
                if !condition_ty.is_unknown()
                    && !Type::Boolean.accepts(&condition_ty, &TypeContext::empty())
                {
                    out.push(Conflict::new(ConflictKind::ExpectedBooleanCondition {
                        conditional: node.id(),
                        actual: condition_ty.to_string(),
                    }));
                }
            }
            NodeKind::Reference { name } => match self.resolve_name(node.id(), name) {
                None => {
                    out.push(Conflict::new(ConflictKind::UnknownName {
                        reference: node.id(),
                        name: name.clone(),
                    }));
                }
                Some(_) => {
                    // Derive the type to detect resolution cycles.
                    let _ = self.type_of(node);
                    if self.cycles.contains(&node.id()) {
                        out.push(Conflict::new(ConflictKind::ReferenceCycle {
                            reference: node.id(),
                            name: name.clone(),
                        }));
                    }
                }
            },
            NodeKind::Bind { ty, value, .. } => {
                if let (Some(declared), Some(value)) = (ty, value) {
                    let actual = self.type_of(value);
                    if !actual.is_unknown()
                        && !declared.accepts(&actual, &TypeContext::empty())
                    {
                        out.push(Conflict::new(ConflictKind::IncompatibleBind {
                            bind: node.id(),
                            value: value.id(),
                            expected: declared.to_string(),
                            actual: actual.to_string(),
                        }));
                    }
                }
            }
            NodeKind::Is { expression, target } => {
                let actual = self.type_of(expression);
                if !actual.is_unknown() {
                    let candidates = TypeSet::of(&actual);
                    if !candidates.any_accepted_by(target, &TypeContext::empty()) {
                        out.push(Conflict::new(ConflictKind::ImpossibleTypeTest {
                            test: node.id(),
                            actual: actual.to_string(),
                        }));
                    }
                }
            }
            NodeKind::Convert { expression, marker } => {
                let actual = self.type_of(expression);
                if !actual.is_unknown()
                    && self
                        .basis
                        .conversion(actual.basis_kind(), marker)
                        .is_none()
                {
                    out.push(Conflict::new(ConflictKind::UnknownConversion {
                        convert: node.id(),
                        target: marker.clone(),
                    }));
                }
            }
            NodeKind::Evaluate { callee, .. } => {
                let callee_ty = self.type_of(callee);
                if !callee_ty.is_unknown()
                    && !matches!(
                        callee_ty,
                        Type::Function { .. } | Type::Structure { .. }
                    )
                {
                    out.push(Conflict::new(ConflictKind::NotAFunction {
                        evaluate: node.id(),
                        callee: callee.id(),
                    }));
                }
            }
            NodeKind::StructureDefinition { interfaces, .. } => {
                out.extend(self.interface_conflicts(node, interfaces));
            }
            NodeKind::Block { statements } => {
                out.extend(self.unused_bind_conflicts(statements));
            }
            _ => {}
        }
        out
    }

    /// For each declared interface, require a structurally matching
    /// implementation of every one of its function members.
    fn interface_conflicts(
        &mut self,
        structure: &Node,
        interfaces: &[String],
    ) -> Vec<Conflict> {
        let tree = self.tree;
        let mut out = Vec::new();
        for interface_name in interfaces {
            let Some(interface_id) = self.resolve_name(structure.id(), interface_name)
            else {
                continue;
            };
            let Some(interface_node) = tree.get(interface_id) else {
                continue;
            };
            let NodeKind::StructureDefinition {
                members: required, ..
            } = interface_node.kind()
            else {
                continue;
            };
            for member in required {
                let NodeKind::FunctionDefinition { aliases, .. } = member.kind() else {
                    continue;
                };
                let Some(function_name) = aliases.first() else {
                    continue;
                };
                let implemented = self.implements(structure, function_name, member);
                if !implemented {
                    out.push(Conflict::new(ConflictKind::UnimplementedInterface {
                        structure: structure.id(),
                        interface: interface_name.clone(),
                        function: function_name.clone(),
                    }));
                }
            }
        }
        out
    }

    /// Does the structure provide a function with this name, with a body,
    /// whose type the interface member's type accepts? Checked by name and
    /// type, not by nominal identity.
    fn implements(&mut self, structure: &Node, name: &str, required: &Node) -> bool {
        let NodeKind::StructureDefinition { members, .. } = structure.kind() else {
            return false;
        };
        let Some(implementation) = members.iter().find(|member| {
            matches!(
                member.kind(),
                NodeKind::FunctionDefinition { aliases, body, .. }
                    if aliases.iter().any(|a| a == name) && body.is_some()
            )
        }) else {
            return false;
        };
        let required_ty = self.definition_type(required);
        let implementation_ty = self.definition_type(implementation);
        required_ty.accepts(&implementation_ty, &TypeContext::empty())
    }

    /// A bind no later statement ever references is advisory-unused.
    fn unused_bind_conflicts(&mut self, statements: &[Node]) -> Vec<Conflict> {
        let mut out = Vec::new();
        for (index, statement) in statements.iter().enumerate() {
            let NodeKind::Bind { aliases, .. } = statement.kind() else {
                continue;
            };
            let used = statements[index + 1..].iter().any(|later| {
                later.descendants().iter().any(|descendant| {
                    matches!(
                        descendant.kind(),
                        NodeKind::Reference { name } if aliases.contains(name)
                    )
                })
            });
            if !used {
                out.push(Conflict::new(ConflictKind::UnusedBind {
                    bind: statement.id(),
                    name: aliases.first().cloned().unwrap_or_default(),
                }));
            }
        }
        out
    }

    // ══════════════════════════════════════════════════════════════════════
    // Type derivation
    // ══════════════════════════════════════════════════════════════════════

    /// Derive the static type of a node in this context. Memoized, except
    /// while narrowing frames are active.
    pub fn type_of(&mut self, node: &Node) -> Type {
        let memoizable = self.narrowings.is_empty();
        if memoizable {
            if let Some(ty) = self.memo.get(&node.id()) {
                return ty.clone();
            }
        }
        let ty = self.derive_type(node);
        if memoizable {
            self.memo.insert(node.id(), ty.clone());
        }
        ty
    }

    fn derive_type(&mut self, node: &Node) -> Type {
        match node.kind() {
            NodeKind::BooleanLiteral { .. } => Type::Boolean,
            NodeKind::MeasurementLiteral { value, unit } => {
                Type::measurement_literal(*value, unit.clone())
            }
            NodeKind::TextLiteral { text, format } => Type::Text {
                literal: Some(text.clone()),
                format: format.clone(),
            },
            NodeKind::NoneLiteral => Type::None,
            NodeKind::ListLiteral { items, .. } => {
                if items.is_empty() {
                    Type::List(None)
                } else {
                    Type::list_of(self.merged_type_of(items))
                }
            }
            NodeKind::SetLiteral { items, .. } => {
                if items.is_empty() {
                    Type::Set(None)
                } else {
                    Type::set_of(self.merged_type_of(items))
                }
            }
            NodeKind::MapLiteral { entries, .. } => {
                let pairs: Vec<(&Node, &Node)> = entries
                    .iter()
                    .filter_map(|entry| match entry.kind() {
                        NodeKind::KeyValue { key, value } => Some((&**key, &**value)),
                        _ => None,
                    })
                    .collect();
                if pairs.is_empty() {
                    Type::Map(None, None)
                } else {
                    let keys: Vec<Type> = pairs
                        .iter()
                        .map(|(k, _)| {
                            self.type_of(k).generalize(&TypeContext::empty())
                        })
                        .collect();
                    let values: Vec<Type> = pairs
                        .iter()
                        .map(|(_, v)| {
                            self.type_of(v).generalize(&TypeContext::empty())
                        })
                        .collect();
                    Type::map_of(Type::union_of(keys), Type::union_of(values))
                }
            }
            NodeKind::KeyValue { key, value } => {
                let key_ty = self.type_of(key);
                let value_ty = self.type_of(value);
                Type::map_of(key_ty, value_ty)
            }
            NodeKind::Bind { .. }
            | NodeKind::FunctionDefinition { .. }
            | NodeKind::StructureDefinition { .. } => self.definition_type(node),
            NodeKind::Reference { name } => {
                let Some(definition_id) = self.resolve_name(node.id(), name) else {
                    return Type::unknown(node.id());
                };
                // Narrowed candidates win over the declared type, matched by
                // the identity of the definition.
                if let Some((_, narrowed)) = self
                    .narrowings
                    .iter()
                    .rev()
                    .find(|(bind, _)| *bind == definition_id)
                {
                    return narrowed.clone();
                }
                let tree = self.tree;
                let Some(definition) = tree.get(definition_id) else {
                    return Type::unknown(node.id());
                };
                // Value binds participate in cycle detection here; function
                // and structure definitions guard their own body derivation.
                if !matches!(definition.kind(), NodeKind::Bind { .. }) {
                    return self.definition_type(definition);
                }
                if self.resolving.contains(&definition_id) {
                    self.cycles.insert(node.id());
                    return Type::unknown(node.id());
                }
                self.resolving.push(definition_id);
                let ty = self.definition_type(definition);
                self.resolving.pop();
                ty
            }
            NodeKind::PropertyReference { subject, name } => {
                self.property_type(node, subject, name)
            }
            NodeKind::Evaluate { callee, .. } => {
                let callee_ty = self.type_of(callee);
                match callee_ty {
                    Type::Function { output, .. } => *output,
                    structure @ Type::Structure { .. } => structure,
                    unknown @ Type::Unknown { .. } => {
                        Type::unknown_because(node.id(), unknown)
                    }
                    _ => Type::unknown(node.id()),
                }
            }
            NodeKind::Conditional {
                then_branch,
                else_branch,
                ..
            } => {
                let then_ty = self.type_of(then_branch).generalize(&TypeContext::empty());
                let else_ty = self.type_of(else_branch).generalize(&TypeContext::empty());
                Type::union_of(vec![then_ty, else_ty])
            }
            NodeKind::Is { .. } => Type::Boolean,
            NodeKind::Convert { expression, marker } => {
                let input_ty = self.type_of(expression);
                if input_ty.is_unknown() {
                    return Type::unknown_because(node.id(), input_ty);
                }
                match self.basis.conversion(input_ty.basis_kind(), marker) {
                    Some(output) => output.clone(),
                    None => Type::unknown(node.id()),
                }
            }
            NodeKind::Block { statements } => match statements.last() {
                Some(last) => self.type_of(last),
                None => Type::None,
            },
            NodeKind::StreamReference { name, .. } => match self.basis.stream(name) {
                Some(element) => element.clone(),
                None => Type::unknown(node.id()),
            },
            NodeKind::Select { table, .. }
            | NodeKind::Update { table, .. }
            | NodeKind::Delete { table, .. } => self.type_of(table),
            NodeKind::Program { block } => self.type_of(block),
            NodeKind::Token { .. } => Type::unknown(node.id()),
            NodeKind::Unparsable { .. } => Type::unknown(node.id()),
        }
    }

    /// Generalized union of the types of a list of nodes.
    fn merged_type_of(&mut self, nodes: &[Node]) -> Type {
        let types: Vec<Type> = nodes
            .iter()
            .map(|n| self.type_of(n).generalize(&TypeContext::empty()))
            .collect();
        Type::union_of(types)
    }

    /// The type a definition gives to references that resolve to it.
    fn definition_type(&mut self, definition: &Node) -> Type {
        match definition.kind() {
            NodeKind::Bind { ty, value, .. } => match (ty, value) {
                (Some(declared), _) => declared.clone(),
                (None, Some(value)) => self.type_of(value),
                (None, None) => Type::unknown(definition.id()),
            },
            NodeKind::FunctionDefinition {
                inputs,
                output,
                body,
                ..
            } => {
                let input_types: Vec<Type> = inputs
                    .iter()
                    .map(|input| self.definition_type(input))
                    .collect();
                let output_ty = match (output, body) {
                    (Some(declared), _) => declared.clone(),
                    (None, Some(body)) => {
                        if self.resolving.contains(&definition.id()) {
                            Type::unknown(definition.id())
                        } else {
                            self.resolving.push(definition.id());
                            let ty = self.type_of(body);
                            self.resolving.pop();
                            ty
                        }
                    }
                    (None, None) => Type::unknown(definition.id()),
                };
                Type::function(input_types, output_ty)
            }
            NodeKind::StructureDefinition {
                aliases,
                inputs,
                members,
                ..
            } => {
                let mut member_types: Vec<(String, Type)> = Vec::new();
                for input in inputs {
                    if let NodeKind::Bind { aliases, .. } = input.kind() {
                        if let Some(name) = aliases.first() {
                            member_types
                                .push((name.clone(), self.definition_type(input)));
                        }
                    }
                }
                for member in members {
                    if let NodeKind::FunctionDefinition { aliases, .. } = member.kind() {
                        if let Some(name) = aliases.first() {
                            member_types
                                .push((name.clone(), self.definition_type(member)));
                        }
                    }
                }
                Type::Structure {
                    name: aliases.first().cloned().unwrap_or_default(),
                    definition: Some(definition.id()),
                    members: member_types,
                }
            }
            _ => Type::unknown(definition.id()),
        }
    }

    /// The type of `subject.name`: a structure member, or a native basis
    /// member with the subject's element types substituted for its type
    /// variables.
    fn property_type(&mut self, node: &Node, subject: &Node, name: &str) -> Type {
        let subject_ty = self.type_of(subject);
        if subject_ty.is_unknown() {
            return Type::unknown_because(node.id(), subject_ty);
        }
        if let Type::Structure {
            definition,
            members,
            ..
        } = &subject_ty
        {
            if let Some(definition) = definition {
                if let Some(property) = self.property_bind(*definition, name) {
                    if let Some((_, narrowed)) = self
                        .narrowings
                        .iter()
                        .rev()
                        .find(|(bind, _)| *bind == property)
                    {
                        return narrowed.clone();
                    }
                }
            }
            return members
                .iter()
                .find(|(member, _)| member == name)
                .map(|(_, ty)| ty.clone())
                .unwrap_or_else(|| Type::unknown(node.id()));
        }
        match self.basis.member(subject_ty.basis_kind(), name) {
            Some(signature) => {
                let substitutions = Self::substitutions_for(&subject_ty);
                signature.as_type().substitute(&substitutions)
            }
            None => Type::unknown(node.id()),
        }
    }

    /// The substitution map a subject provides for native type variables:
    /// `T` for list/set elements, `K`/`V` for map keys and values.
    fn substitutions_for(subject: &Type) -> TypeContext {
        match subject {
            Type::List(Some(element)) | Type::Set(Some(element)) => {
                TypeContext::empty().with("T", (**element).clone())
            }
            Type::Map(key, value) => {
                let mut context = TypeContext::empty();
                if let Some(key) = key {
                    context = context.with("K", (**key).clone());
                }
                if let Some(value) = value {
                    context = context.with("V", (**value).clone());
                }
                context
            }
            _ => TypeContext::empty(),
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Name resolution
    // ══════════════════════════════════════════════════════════════════════

    /// Resolve a name from a node's position, walking enclosing scopes
    /// outward: blocks, function and structure inputs, structure members,
    /// and the row fields of an enclosing query clause.
    pub fn resolve_name(&mut self, from: NodeId, name: &str) -> Option<NodeId> {
        let tree = self.tree;
        let mut at = from;
        loop {
            let parent_id = tree.parent_of(at)?;
            let parent = tree.get(parent_id)?;
            let found = match parent.kind() {
                NodeKind::Block { statements } => {
                    statements.iter().find_map(|s| Self::binds_name(s, name))
                }
                NodeKind::FunctionDefinition { inputs, .. } => {
                    inputs.iter().find_map(|i| Self::binds_name(i, name))
                }
                NodeKind::StructureDefinition {
                    inputs, members, ..
                } => inputs
                    .iter()
                    .chain(members.iter())
                    .find_map(|i| Self::binds_name(i, name)),
                NodeKind::Select { table, query } | NodeKind::Delete { table, query } => {
                    if at == query.id() {
                        self.row_field(table, name)
                    } else {
                        None
                    }
                }
                NodeKind::Update {
                    table,
                    updates,
                    query,
                } => {
                    // Both the condition and the update cells see row fields.
                    if at == query.id() || updates.iter().any(|u| u.id() == at) {
                        self.row_field(table, name)
                    } else {
                        None
                    }
                }
                _ => None,
            };
            if let Some(found) = found {
                return Some(found);
            }
            at = parent_id;
        }
    }

    fn binds_name(node: &Node, name: &str) -> Option<NodeId> {
        match node.kind() {
            NodeKind::Bind { aliases, .. }
            | NodeKind::FunctionDefinition { aliases, .. }
            | NodeKind::StructureDefinition { aliases, .. }
                if aliases.iter().any(|a| a == name) =>
            {
                Some(node.id())
            }
            _ => None,
        }
    }

    /// Resolve a name against the row structure of a query table: the
    /// table's element structure's input binds.
    fn row_field(&mut self, table: &Node, name: &str) -> Option<NodeId> {
        let table_ty = self.type_of(table);
        if let Type::List(Some(element)) = table_ty {
            if let Type::Structure {
                definition: Some(definition),
                ..
            } = *element
            {
                return self.property_bind(definition, name);
            }
        }
        None
    }

    /// The bind declaring `name` on a structure definition, by identity.
    fn property_bind(&self, definition: NodeId, name: &str) -> Option<NodeId> {
        let node = self.tree.get(definition)?;
        let NodeKind::StructureDefinition {
            inputs, members, ..
        } = node.kind()
        else {
            return None;
        };
        inputs
            .iter()
            .chain(members.iter())
            .find_map(|member| Self::binds_name(member, name))
    }

    // ══════════════════════════════════════════════════════════════════════
    // Flow-sensitive narrowing
    // ══════════════════════════════════════════════════════════════════════

    /// Narrow a binding's candidate set through a type test.
    ///
    /// The set narrows to exactly the tested type when the test's expression
    /// resolves to the same definition being narrowed and the tested type
    /// accepts at least one current candidate. A property test additionally
    /// requires the property to be declared on the subject's own structure
    /// definition. Otherwise the set is returned unchanged.
    pub fn evaluate_type_set(
        &mut self,
        test: &Node,
        bind: NodeId,
        current: &TypeSet,
    ) -> TypeSet {
        let NodeKind::Is { expression, target } = test.kind() else {
            return current.clone();
        };
        match expression.kind() {
            NodeKind::Reference { name } => {
                if self.resolve_name(expression.id(), name) == Some(bind)
                    && current.any_accepted_by(target, &TypeContext::empty())
                {
                    return TypeSet::new(vec![target.clone()]);
                }
            }
            NodeKind::PropertyReference { subject, name } => {
                let subject_ty = self.type_of(subject);
                if let Type::Structure {
                    definition: Some(definition),
                    ..
                } = subject_ty
                {
                    if self.property_bind(definition, name) == Some(bind)
                        && current.any_accepted_by(target, &TypeContext::empty())
                    {
                        return TypeSet::new(vec![target.clone()]);
                    }
                }
            }
            _ => {}
        }
        current.clone()
    }

    /// The narrowing frame a conditional's condition induces, if any.
    fn narrowing_from(&mut self, condition: &Node) -> Option<(NodeId, Type)> {
        let NodeKind::Is { expression, .. } = condition.kind() else {
            return None;
        };
        let bind = match expression.kind() {
            NodeKind::Reference { name } => self.resolve_name(expression.id(), name)?,
            NodeKind::PropertyReference { subject, name } => {
                let subject_ty = self.type_of(subject);
                let Type::Structure {
                    definition: Some(definition),
                    ..
                } = subject_ty
                else {
                    return None;
                };
                self.property_bind(definition, name)?
            }
            _ => return None,
        };
        let current = TypeSet::of(&self.type_of(expression));
        let narrowed = self.evaluate_type_set(condition, bind, &current);
        if narrowed == current {
            None
        } else {
            Some((bind, narrowed.as_type()))
        }
    }
}
