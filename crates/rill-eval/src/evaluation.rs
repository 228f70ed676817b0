//! Activation records.
//!
//! An [`Evaluation`] is one activation: the definition being evaluated, the
//! contextual `this` value, an insertion-ordered map of bound names (unique
//! within one record), the compiled steps, a step cursor, and a local value
//! stack. Evaluations are pushed on function or structure entry and popped
//! when their steps run out.

use std::sync::Arc;

use indexmap::IndexMap;

use rill_types::node::NodeId;

use crate::step::Step;
use crate::value::Value;

/// One activation record on the evaluation stack.
#[derive(Debug)]
pub struct Evaluation {
    /// The definition or expression this activation evaluates.
    node: NodeId,
    /// The contextual `this` value for member lookups.
    context: Option<Value>,
    /// Bound names, insertion-ordered and unique within this record.
    bindings: IndexMap<String, Value>,
    steps: Arc<Vec<Step>>,
    cursor: usize,
    stack: Vec<Value>,
}

impl Evaluation {
    pub fn new(node: NodeId, steps: Arc<Vec<Step>>) -> Evaluation {
        Evaluation {
            node,
            context: None,
            bindings: IndexMap::new(),
            steps,
            cursor: 0,
            stack: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: Value) -> Evaluation {
        self.context = Some(context);
        self
    }

    pub fn with_bindings(mut self, bindings: IndexMap<String, Value>) -> Evaluation {
        self.bindings = bindings;
        self
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    /// The contextual `this` value, if any.
    pub fn context(&self) -> Option<&Value> {
        self.context.as_ref()
    }

    /// Resolve a bound name in this record.
    pub fn resolve(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    /// Bind a name in this record. Names are unique: rebinding replaces.
    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    pub fn bindings(&self) -> &IndexMap<String, Value> {
        &self.bindings
    }

    // ── Step cursor ──────────────────────────────────────────────────────

    pub fn is_complete(&self) -> bool {
        self.cursor >= self.steps.len()
    }

    /// The next step to execute, without advancing.
    pub fn peek_step(&self) -> Option<&Step> {
        self.steps.get(self.cursor)
    }

    /// Take the next step, advancing the cursor.
    pub fn next_step(&mut self) -> Option<Step> {
        let step = self.steps.get(self.cursor).cloned();
        if step.is_some() {
            self.cursor += 1;
        }
        step
    }

    /// Skip the next `n` steps.
    pub fn jump(&mut self, n: usize) {
        self.cursor += n;
    }

    /// Abandon all remaining steps of this activation, so an exception on
    /// the stack becomes its result.
    pub fn abandon(&mut self) {
        self.cursor = self.steps.len();
    }

    // ── Value stack ──────────────────────────────────────────────────────

    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    pub fn pop(&mut self) -> Option<Value> {
        self.stack.pop()
    }

    /// Pop `n` values, restoring their push order.
    pub fn pop_many(&mut self, n: usize) -> Vec<Value> {
        let mut values = Vec::with_capacity(n);
        for _ in 0..n {
            values.push(self.stack.pop().unwrap_or(Value::None));
        }
        values.reverse();
        values
    }

    pub fn top(&self) -> Option<&Value> {
        self.stack.last()
    }

    /// The result of a completed activation: its top value, or none.
    pub fn into_result(mut self) -> Value {
        self.stack.pop().unwrap_or(Value::None)
    }
}
