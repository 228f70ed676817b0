//! The step evaluator.
//!
//! The evaluator executes compiled steps against a stack of activation
//! records, each with its own value stack. Execution is single-threaded and
//! cooperative: suspension happens only between steps, so an external
//! driver can run one or more steps at a time and resume later.
//!
//! Exceptions are values. A step that produces one abandons the remaining
//! steps of its activation; the exception then propagates upward activation
//! by activation until it reaches the program boundary and becomes the
//! pass result. The step budget is checked on every step — the language's
//! only protection against non-terminating programs.
//!
//! External stream events are queued via [`Evaluator::record`] and applied
//! only between passes by [`Evaluator::pump`], never mid-step.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use rill_types::node::{Node, NodeId, NodeKind, Tree};
use rill_types::TypeContext;

use crate::compile::compile;
use crate::evaluation::Evaluation;
use crate::registry::{NativeParam, NativeRegistry, StreamDefinition};
use crate::step::{Step, StepKind};
use crate::stream::{InputSource, RawEvent};
use crate::value::{ExceptionKind, FunctionValue, StreamId, Value};

/// The default step budget per evaluation pass.
pub const DEFAULT_STEP_LIMIT: u64 = 100_000;

/// A live stream owned by the evaluator, keyed by the node that first
/// referenced it.
pub struct LiveStream {
    pub node: NodeId,
    pub definition: Arc<StreamDefinition>,
    pub source: Box<dyn InputSource>,
}

// ══════════════════════════════════════════════════════════════════════════════
// Evaluator
// ══════════════════════════════════════════════════════════════════════════════

/// Executes a program tree against the native registry.
pub struct Evaluator<'a> {
    tree: &'a Tree,
    registry: &'a NativeRegistry,
    evaluations: Vec<Evaluation>,
    compiled: HashMap<NodeId, Arc<Vec<Step>>>,
    steps_taken: u64,
    step_limit: u64,
    streams: Vec<LiveStream>,
    pending: VecDeque<RawEvent>,
    evaluating: bool,
    result: Option<Value>,
}

impl<'a> Evaluator<'a> {
    pub fn new(tree: &'a Tree, registry: &'a NativeRegistry) -> Self {
        Self::with_step_limit(tree, registry, DEFAULT_STEP_LIMIT)
    }

    pub fn with_step_limit(
        tree: &'a Tree,
        registry: &'a NativeRegistry,
        step_limit: u64,
    ) -> Self {
        Self {
            tree,
            registry,
            evaluations: Vec::new(),
            compiled: HashMap::new(),
            steps_taken: 0,
            step_limit,
            streams: Vec::new(),
            pending: VecDeque::new(),
            evaluating: false,
            result: None,
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Driving
    // ══════════════════════════════════════════════════════════════════════

    /// Begin a fresh pass over the program. Stream histories are retained.
    pub fn start_pass(&mut self) {
        debug!("evaluation pass started");
        let tree = self.tree;
        let root = tree.root();
        let steps = self.compiled_steps(root);
        self.evaluations = vec![Evaluation::new(root.id(), steps)];
        self.steps_taken = 0;
        self.evaluating = true;
    }

    /// Execute one unit of work. Returns `false` once the pass completes;
    /// the result is then available via [`Evaluator::result`].
    pub fn step(&mut self) -> bool {
        if !self.evaluating {
            return false;
        }
        match self.advance(0) {
            Some(value) => {
                self.finish_pass(value);
                false
            }
            None => true,
        }
    }

    /// Run a full pass to completion and return its result.
    pub fn evaluate(&mut self) -> Value {
        self.start_pass();
        let value = self.run(0);
        self.finish_pass(value.clone());
        value
    }

    /// The result of the most recently completed pass.
    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    pub fn is_evaluating(&self) -> bool {
        self.evaluating
    }

    pub fn steps_taken(&self) -> u64 {
        self.steps_taken
    }

    fn finish_pass(&mut self, value: Value) {
        debug!(steps = self.steps_taken, "evaluation pass finished");
        self.evaluating = false;
        self.result = Some(value);
    }

    fn run(&mut self, floor: usize) -> Value {
        loop {
            if let Some(value) = self.advance(floor) {
                return value;
            }
        }
    }

    /// One machine iteration: pop a completed activation or execute one
    /// step. Returns the drive's result once the activation stack returns
    /// to `floor`.
    fn advance(&mut self, floor: usize) -> Option<Value> {
        let Some(current) = self.evaluations.last() else {
            return Some(self.result.clone().unwrap_or(Value::None));
        };

        // Completed activations pop and hand their result to the caller.
        if current.is_complete() {
            let finished = self.evaluations.pop().expect("activation present");
            let value = finished.into_result();
            if self.evaluations.len() <= floor {
                return Some(value);
            }
            let parent = self.current_mut();
            if value.is_exception() {
                // The exception abandons the rest of the receiving
                // expression and becomes its result.
                parent.abandon();
            }
            parent.push(value);
            return None;
        }

        // The budget is checked on every step, not only at loop heads.
        self.steps_taken += 1;
        if self.steps_taken > self.step_limit {
            let current = self.current_mut();
            let node = current
                .peek_step()
                .map(|step| step.node)
                .unwrap_or_else(|| current.node());
            debug!(%node, "step budget exhausted");
            current.abandon();
            current.push(Value::exception(ExceptionKind::StepLimitExceeded, node));
            return None;
        }

        let step = self
            .current_mut()
            .next_step()
            .expect("incomplete activation has a next step");
        self.execute(step);

        // A step that produced an exception abandons its activation.
        if let Some(current) = self.evaluations.last_mut() {
            if current.top().is_some_and(Value::is_exception) {
                current.abandon();
            }
        }
        None
    }

    fn current_mut(&mut self) -> &mut Evaluation {
        self.evaluations.last_mut().expect("active evaluation")
    }

    fn compiled_steps(&mut self, node: &Node) -> Arc<Vec<Step>> {
        self.compiled
            .entry(node.id())
            .or_insert_with(|| Arc::new(compile(node)))
            .clone()
    }

    /// Drive a sub-expression to completion on the same machine, sharing
    /// the step budget: used for query conditions and parameter defaults.
    fn evaluate_nested(
        &mut self,
        node: &Node,
        bindings: IndexMap<String, Value>,
    ) -> Value {
        let floor = self.evaluations.len();
        let steps = self.compiled_steps(node);
        self.evaluations
            .push(Evaluation::new(node.id(), steps).with_bindings(bindings));
        self.run(floor)
    }

    // ══════════════════════════════════════════════════════════════════════
    // Step execution
    // ══════════════════════════════════════════════════════════════════════

    fn execute(&mut self, step: Step) {
        match step.kind {
            // A pause point; the work happens at Finish.
            StepKind::Start => {}
            StepKind::Finish => self.finish_node(step.node),
            StepKind::Halt(kind) => {
                debug!(node = %step.node, %kind, "halt");
                let current = self.current_mut();
                current.abandon();
                current.push(Value::exception(kind, step.node));
            }
            StepKind::Jump(n) => self.current_mut().jump(n),
            StepKind::JumpIfNot(n) => {
                let value = self.current_mut().pop().unwrap_or(Value::None);
                match value {
                    Value::Bool(true) => {}
                    Value::Bool(false) => self.current_mut().jump(n),
                    _ => self
                        .current_mut()
                        .push(Value::exception(ExceptionKind::ExpectedType, step.node)),
                }
            }
        }
    }

    fn finish_node(&mut self, id: NodeId) {
        let tree = self.tree;
        let Some(node) = tree.get(id) else {
            self.current_mut()
                .push(Value::exception(ExceptionKind::UnknownName, id));
            return;
        };
        match node.kind() {
            NodeKind::BooleanLiteral { value } => {
                self.current_mut().push(Value::Bool(*value));
            }
            NodeKind::MeasurementLiteral { value, unit } => {
                self.current_mut()
                    .push(Value::Measurement(*value, unit.clone()));
            }
            NodeKind::TextLiteral { text, .. } => {
                self.current_mut().push(Value::Text(text.clone()));
            }
            NodeKind::NoneLiteral => self.current_mut().push(Value::None),

            NodeKind::ListLiteral { items, .. } => {
                let values = self.current_mut().pop_many(items.len());
                self.current_mut().push(Value::List(values));
            }
            NodeKind::SetLiteral { items, .. } => {
                let values = self.current_mut().pop_many(items.len());
                let mut unique: Vec<Value> = Vec::new();
                for value in values {
                    if !unique.contains(&value) {
                        unique.push(value);
                    }
                }
                self.current_mut().push(Value::Set(unique));
            }
            NodeKind::MapLiteral { entries, .. } => {
                let values = self.current_mut().pop_many(entries.len());
                let mut merged: Vec<(Value, Value)> = Vec::new();
                for value in values {
                    let Value::Map(pairs) = value else {
                        self.current_mut()
                            .push(Value::exception(ExceptionKind::ExpectedType, id));
                        return;
                    };
                    for (key, val) in pairs {
                        match merged.iter_mut().find(|(existing, _)| *existing == key) {
                            Some(entry) => entry.1 = val,
                            None => merged.push((key, val)),
                        }
                    }
                }
                self.current_mut().push(Value::Map(merged));
            }
            NodeKind::KeyValue { .. } => {
                let mut pair = self.current_mut().pop_many(2);
                let value = pair.pop().unwrap_or(Value::None);
                let key = pair.pop().unwrap_or(Value::None);
                self.current_mut().push(Value::Map(vec![(key, value)]));
            }

            NodeKind::Bind { aliases, value, .. } => {
                let bound = if value.is_some() {
                    self.current_mut().pop().unwrap_or(Value::None)
                } else {
                    Value::None
                };
                let current = self.current_mut();
                for alias in aliases {
                    current.bind(alias, bound.clone());
                }
                current.push(bound);
            }

            NodeKind::Reference { name } => {
                let value = self.resolve_runtime(name);
                match value {
                    Some(value) => self.current_mut().push(value),
                    None => self
                        .current_mut()
                        .push(Value::exception(ExceptionKind::UnknownName, id)),
                }
            }

            NodeKind::PropertyReference { name, .. } => {
                let subject = self.current_mut().pop().unwrap_or(Value::None);
                let value = self.property_value(id, subject, name);
                self.current_mut().push(value);
            }

            NodeKind::Evaluate { args, .. } => {
                let argument_values = self.current_mut().pop_many(args.len());
                let callee = self.current_mut().pop().unwrap_or(Value::None);
                self.apply(id, callee, argument_values);
            }

            // The taken branch's value is already on the stack.
            NodeKind::Conditional { .. } => {}

            NodeKind::Is { target, .. } => {
                let value = self.current_mut().pop().unwrap_or(Value::None);
                // Re-derive the dynamic type and ask the lattice, matching
                // the static narrowing semantics.
                let accepted = target.accepts(&value.type_of(), &TypeContext::empty());
                self.current_mut().push(Value::Bool(accepted));
            }

            NodeKind::Convert { marker, .. } => {
                let value = self.current_mut().pop().unwrap_or(Value::None);
                let registry = self.registry;
                let result = match registry.conversion(value.basis_kind(), marker) {
                    None => Value::exception(ExceptionKind::UnknownConversion, id),
                    Some(conversion) => {
                        // Instance-check the input before invoking the hook.
                        if value.basis_kind() == conversion.expects {
                            (conversion.hook)(&value)
                        } else {
                            Value::exception(ExceptionKind::ExpectedType, id)
                        }
                    }
                };
                self.current_mut().push(result);
            }

            NodeKind::Block { statements } => {
                let mut values = self.current_mut().pop_many(statements.len());
                let last = values.pop().unwrap_or(Value::None);
                self.current_mut().push(last);
            }

            NodeKind::FunctionDefinition { aliases, .. }
            | NodeKind::StructureDefinition { aliases, .. } => {
                let function = Value::Function(FunctionValue::Definition {
                    definition: id,
                    this: None,
                });
                let current = self.current_mut();
                for alias in aliases {
                    current.bind(alias, function.clone());
                }
                current.push(function);
            }

            NodeKind::StreamReference { name, config } => {
                let values = self.current_mut().pop_many(config.len());
                self.reference_stream(id, name, values);
            }

            NodeKind::Select { query, .. } => {
                let table = self.current_mut().pop().unwrap_or(Value::None);
                let result = self.filter_rows(id, table, query, true);
                self.current_mut().push(result);
            }
            NodeKind::Delete { query, .. } => {
                let table = self.current_mut().pop().unwrap_or(Value::None);
                let result = self.filter_rows(id, table, query, false);
                self.current_mut().push(result);
            }
            NodeKind::Update { updates, query, .. } => {
                let table = self.current_mut().pop().unwrap_or(Value::None);
                let result = self.update_rows(id, table, updates, query);
                self.current_mut().push(result);
            }

            // The block value on the stack is the program result.
            NodeKind::Program { .. } => {}

            NodeKind::Token { .. } | NodeKind::Unparsable { .. } => {
                self.current_mut()
                    .push(Value::exception(ExceptionKind::UnparsableReached, id));
            }
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Names, properties, application
    // ══════════════════════════════════════════════════════════════════════

    /// Resolve a name at evaluation time: the current activation's bindings
    /// first, then the fields of its `this` context, then the program's
    /// root activation.
    fn resolve_runtime(&self, name: &str) -> Option<Value> {
        let current = self.evaluations.last()?;
        if let Some(value) = current.resolve(name) {
            return Some(value.clone());
        }
        if let Some(Value::Structure { fields, .. }) = current.context() {
            if let Some(value) = fields.get(name) {
                return Some(value.clone());
            }
        }
        self.evaluations
            .first()?
            .resolve(name)
            .cloned()
    }

    /// Resolve `subject.name`: structure fields, then structure member
    /// functions, then native basis members bound to the subject.
    fn property_value(&mut self, id: NodeId, subject: Value, name: &str) -> Value {
        if subject.is_exception() {
            return subject;
        }
        if let Value::Structure {
            definition, fields, ..
        } = &subject
        {
            if let Some(value) = fields.get(name) {
                return value.clone();
            }
            if let Some(member) = self.structure_member(*definition, name) {
                return Value::Function(FunctionValue::Definition {
                    definition: member,
                    this: Some(Box::new(subject.clone())),
                });
            }
        }
        let registry = self.registry;
        match registry.function(subject.basis_kind(), name) {
            Some(_) => Value::Function(FunctionValue::Native {
                kind: subject.basis_kind(),
                name: name.to_string(),
                this: Box::new(subject),
            }),
            None => Value::exception(ExceptionKind::UnknownName, id),
        }
    }

    fn structure_member(&self, definition: NodeId, name: &str) -> Option<NodeId> {
        let node = self.tree.get(definition)?;
        let NodeKind::StructureDefinition { members, .. } = node.kind() else {
            return None;
        };
        members.iter().find_map(|member| match member.kind() {
            NodeKind::FunctionDefinition { aliases, .. }
                if aliases.iter().any(|a| a == name) =>
            {
                Some(member.id())
            }
            _ => None,
        })
    }

    /// Apply a callee to its arguments: run a native hook, push a function
    /// body activation, or instantiate a structure.
    fn apply(&mut self, id: NodeId, callee: Value, arguments: Vec<Value>) {
        match callee {
            Value::Function(FunctionValue::Native { kind, name, this }) => {
                let registry = self.registry;
                let Some(function) = registry.function(kind, &name) else {
                    self.current_mut()
                        .push(Value::exception(ExceptionKind::UnknownName, id));
                    return;
                };
                let bindings =
                    match bind_native_params(&function.params, arguments, id) {
                        Ok(bindings) => bindings,
                        Err(exception) => {
                            self.current_mut().push(exception);
                            return;
                        }
                    };
                let activation = Evaluation::new(id, Arc::new(Vec::new()))
                    .with_context(*this)
                    .with_bindings(bindings);
                let result = (function.hook)(&activation);
                self.current_mut().push(result);
            }
            Value::Function(FunctionValue::Definition { definition, this }) => {
                self.apply_definition(id, definition, this.map(|b| *b), arguments);
            }
            exception @ Value::Exception { .. } => {
                self.current_mut().push(exception);
            }
            _ => {
                self.current_mut()
                    .push(Value::exception(ExceptionKind::ExpectedType, id));
            }
        }
    }

    fn apply_definition(
        &mut self,
        id: NodeId,
        definition: NodeId,
        this: Option<Value>,
        arguments: Vec<Value>,
    ) {
        let tree = self.tree;
        let Some(node) = tree.get(definition) else {
            self.current_mut()
                .push(Value::exception(ExceptionKind::UnknownName, id));
            return;
        };
        match node.kind() {
            NodeKind::FunctionDefinition {
                inputs,
                body: Some(body),
                ..
            } => {
                let bindings = match self.bind_function_params(inputs, arguments, id) {
                    Ok(bindings) => bindings,
                    Err(exception) => {
                        self.current_mut().push(exception);
                        return;
                    }
                };
                let steps = self.compiled_steps(body);
                let mut activation =
                    Evaluation::new(definition, steps).with_bindings(bindings);
                if let Some(this) = this {
                    activation = activation.with_context(this);
                }
                self.evaluations.push(activation);
            }
            // An interface member with no implementation cannot run.
            NodeKind::FunctionDefinition { body: None, .. } => {
                self.current_mut()
                    .push(Value::exception(ExceptionKind::ExpectedType, id));
            }
            NodeKind::StructureDefinition {
                aliases, inputs, ..
            } => {
                let fields = match self.bind_function_params(inputs, arguments, id) {
                    Ok(fields) => fields,
                    Err(exception) => {
                        self.current_mut().push(exception);
                        return;
                    }
                };
                self.current_mut().push(Value::Structure {
                    name: aliases.first().cloned().unwrap_or_default(),
                    definition,
                    fields,
                });
            }
            _ => {
                self.current_mut()
                    .push(Value::exception(ExceptionKind::ExpectedType, id));
            }
        }
    }

    fn bind_function_params(
        &mut self,
        inputs: &[Node],
        arguments: Vec<Value>,
        id: NodeId,
    ) -> Result<IndexMap<String, Value>, Value> {
        let mut bindings = IndexMap::new();
        for (index, input) in inputs.iter().enumerate() {
            let NodeKind::Bind { aliases, value, .. } = input.kind() else {
                continue;
            };
            let Some(name) = aliases.first() else {
                continue;
            };
            let bound = if let Some(argument) = arguments.get(index) {
                argument.clone()
            } else if let Some(default) = value {
                // Defaults evaluate on the same machine, within budget.
                self.evaluate_nested(default, IndexMap::new())
            } else {
                return Err(Value::exception(ExceptionKind::ExpectedType, id));
            };
            if bound.is_exception() {
                return Err(bound);
            }
            bindings.insert(name.clone(), bound);
        }
        Ok(bindings)
    }

    // ══════════════════════════════════════════════════════════════════════
    // Queries
    // ══════════════════════════════════════════════════════════════════════

    /// Keep the rows of a list of structures for which the query condition
    /// evaluates to `keep`.
    fn filter_rows(&mut self, id: NodeId, table: Value, query: &Node, keep: bool) -> Value {
        let Value::List(rows) = table else {
            return Value::exception(ExceptionKind::ExpectedType, id);
        };
        let mut kept = Vec::new();
        for row in rows {
            match self.query_row(id, &row, query) {
                Ok(matched) => {
                    if matched == keep {
                        kept.push(row);
                    }
                }
                Err(exception) => return exception,
            }
        }
        Value::List(kept)
    }

    /// Replace fields of matching rows with freshly evaluated updates.
    fn update_rows(
        &mut self,
        id: NodeId,
        table: Value,
        updates: &[Node],
        query: &Node,
    ) -> Value {
        let Value::List(rows) = table else {
            return Value::exception(ExceptionKind::ExpectedType, id);
        };
        let mut out = Vec::new();
        for row in rows {
            let matched = match self.query_row(id, &row, query) {
                Ok(matched) => matched,
                Err(exception) => return exception,
            };
            if !matched {
                out.push(row);
                continue;
            }
            let Value::Structure {
                name,
                definition,
                fields,
            } = &row
            else {
                return Value::exception(ExceptionKind::ExpectedType, id);
            };
            let mut next = fields.clone();
            for update in updates {
                let NodeKind::KeyValue { key, value } = update.kind() else {
                    return Value::exception(ExceptionKind::ExpectedType, id);
                };
                let NodeKind::Reference { name: field } = key.kind() else {
                    return Value::exception(ExceptionKind::ExpectedType, id);
                };
                let bindings = Self::row_bindings(fields);
                let updated = self.evaluate_nested(value, bindings);
                if updated.is_exception() {
                    return updated;
                }
                next.insert(field.clone(), updated);
            }
            out.push(Value::Structure {
                name: name.clone(),
                definition: *definition,
                fields: next,
            });
        }
        Value::List(out)
    }

    /// Evaluate a query condition against one row, with the row's fields
    /// bound by name.
    fn query_row(&mut self, id: NodeId, row: &Value, query: &Node) -> Result<bool, Value> {
        let Value::Structure { fields, .. } = row else {
            return Err(Value::exception(ExceptionKind::ExpectedType, id));
        };
        let result = self.evaluate_nested(query, Self::row_bindings(fields));
        match result {
            Value::Bool(matched) => Ok(matched),
            exception @ Value::Exception { .. } => Err(exception),
            _ => Err(Value::exception(ExceptionKind::ExpectedType, query.id())),
        }
    }

    fn row_bindings(fields: &IndexMap<String, Value>) -> IndexMap<String, Value> {
        fields.clone()
    }

    // ══════════════════════════════════════════════════════════════════════
    // Streams
    // ══════════════════════════════════════════════════════════════════════

    /// Evaluate a stream reference: create and start the live stream on
    /// first reference, reconfigure it in place afterwards, and yield its
    /// latest value.
    fn reference_stream(&mut self, id: NodeId, name: &str, values: Vec<Value>) {
        let existing = self.streams.iter_mut().find(|s| s.node == id).map(|stream| {
            let config = padded_config(&stream.definition.config, values.clone());
            stream.source.configure(&config);
            stream
                .source
                .latest()
                .cloned()
                .unwrap_or_else(|| stream.definition.initial.clone())
        });
        if let Some(value) = existing {
            self.current_mut().push(value);
            return;
        }
        let registry = self.registry;
        let Some(definition) = registry.stream(name) else {
            self.current_mut()
                .push(Value::exception(ExceptionKind::UnknownName, id));
            return;
        };
        let config = padded_config(&definition.config, values);
        let mut source = (definition.create)(&config);
        source.start();
        debug!(stream = name, %id, "stream started");
        let value = source
            .latest()
            .cloned()
            .unwrap_or_else(|| definition.initial.clone());
        self.streams.push(LiveStream {
            node: id,
            definition: Arc::clone(definition),
            source,
        });
        self.current_mut().push(value);
    }

    /// Queue an external raw event. Events are merged into the
    /// single-threaded model between passes, never mid-step.
    pub fn record(&mut self, event: RawEvent) {
        self.pending.push_back(event);
    }

    /// Apply queued events to the live streams and re-run the program if
    /// any stream emitted. Returns the new result, or `None` when nothing
    /// emitted or a pass is still in progress. Events apply in arrival
    /// order; a batch of emissions coalesces into a single re-evaluation.
    pub fn pump(&mut self) -> Option<Value> {
        if self.evaluating {
            return None;
        }
        let mut emitted = false;
        while let Some(event) = self.pending.pop_front() {
            for stream in &mut self.streams {
                if stream.source.record(&event) {
                    debug!(node = %stream.node, "stream emitted");
                    emitted = true;
                }
            }
        }
        if emitted {
            Some(self.evaluate())
        } else {
            None
        }
    }

    /// The append-only history of the stream first referenced at `node`.
    pub fn stream_history(&self, node: NodeId) -> Option<&[Value]> {
        self.streams
            .iter()
            .find(|s| s.node == node)
            .map(|s| s.source.history())
    }

    /// A stream handle value for host introspection.
    pub fn stream_value(&self, node: NodeId) -> Option<Value> {
        self.streams
            .iter()
            .position(|s| s.node == node)
            .map(|index| {
                let element = self.streams[index].definition.element.clone();
                Value::Stream(StreamId(index), Box::new(element))
            })
    }

    pub fn live_streams(&self) -> &[LiveStream] {
        &self.streams
    }
}

/// Discarding the evaluator stops all owned streams and abandons any
/// in-flight evaluation; values are immutable, so the stacks just drop.
impl Drop for Evaluator<'_> {
    fn drop(&mut self) {
        for stream in &mut self.streams {
            stream.source.stop();
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Parameter binding
// ══════════════════════════════════════════════════════════════════════════════

/// Bind arguments positionally against native parameter specs: required
/// params must be supplied, optional params fall back to their defaults,
/// and a rest param collects the remainder into a list.
fn bind_native_params(
    params: &[NativeParam],
    arguments: Vec<Value>,
    node: NodeId,
) -> Result<IndexMap<String, Value>, Value> {
    let mut bindings = IndexMap::new();
    let mut arguments = arguments.into_iter();
    for param in params {
        if param.rest {
            bindings.insert(
                param.name.clone(),
                Value::List(arguments.by_ref().collect()),
            );
            continue;
        }
        match arguments.next() {
            Some(value) => {
                bindings.insert(param.name.clone(), value);
            }
            None => match &param.default {
                Some(default) => {
                    bindings.insert(param.name.clone(), default.clone());
                }
                None if param.required => {
                    return Err(Value::exception(ExceptionKind::ExpectedType, node));
                }
                None => {
                    bindings.insert(param.name.clone(), Value::None);
                }
            },
        }
    }
    Ok(bindings)
}

/// Pad provided configuration values with parameter defaults.
fn padded_config(params: &[NativeParam], mut values: Vec<Value>) -> Vec<Value> {
    for param in params.iter().skip(values.len()) {
        values.push(param.default.clone().unwrap_or(Value::None));
    }
    values
}
