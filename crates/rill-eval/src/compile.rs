//! The step compiler.
//!
//! [`compile`] is defined structurally per node kind: leaves compile to a
//! bare `Finish`, composites interleave `Start(self)`, the compiled steps of
//! each child in evaluation order (left to right), and `Finish(self)`.
//! Conditionals compile both branches and jump over the untaken one. Query
//! clause conditions and function bodies are not inlined here — they run as
//! their own activations when the owning step executes.

use rill_types::node::{Node, NodeKind};

use crate::step::{Step, StepKind};
use crate::value::ExceptionKind;

/// Compile an expression node into its ordered step sequence.
pub fn compile(node: &Node) -> Vec<Step> {
    match node.kind() {
        // ── Leaves ──
        NodeKind::Token { .. }
        | NodeKind::BooleanLiteral { .. }
        | NodeKind::MeasurementLiteral { .. }
        | NodeKind::TextLiteral { .. }
        | NodeKind::NoneLiteral
        | NodeKind::Reference { .. }
        | NodeKind::FunctionDefinition { .. }
        | NodeKind::StructureDefinition { .. } => vec![Step::finish(node.id())],

        // ── Composites: Start, children left to right, Finish ──
        NodeKind::ListLiteral { items, .. } | NodeKind::SetLiteral { items, .. } => {
            bracket(node, items.iter())
        }
        NodeKind::MapLiteral { entries, .. } => bracket(node, entries.iter()),
        NodeKind::KeyValue { key, value } => {
            bracket(node, [&**key, &**value].into_iter())
        }
        NodeKind::Bind { value, .. } => bracket(node, value.iter().map(|v| &**v)),
        NodeKind::PropertyReference { subject, .. } => {
            bracket(node, std::iter::once(&**subject))
        }
        NodeKind::Evaluate { callee, args } => {
            bracket(node, std::iter::once(&**callee).chain(args.iter()))
        }
        NodeKind::Is { expression, .. } | NodeKind::Convert { expression, .. } => {
            bracket(node, std::iter::once(&**expression))
        }
        NodeKind::Block { statements } => bracket(node, statements.iter()),
        NodeKind::StreamReference { config, .. } => bracket(node, config.iter()),
        NodeKind::Program { block } => bracket(node, std::iter::once(&**block)),

        // Queries evaluate the table up front; the condition runs per row.
        NodeKind::Select { table, .. }
        | NodeKind::Update { table, .. }
        | NodeKind::Delete { table, .. } => bracket(node, std::iter::once(&**table)),

        // ── Conditionals: both branches compile, one executes ──
        NodeKind::Conditional {
            condition,
            then_branch,
            else_branch,
        } => {
            let mut steps = vec![Step::start(node.id())];
            steps.extend(compile(condition));
            let then_steps = compile(then_branch);
            let else_steps = compile(else_branch);
            // Skip the then branch and its trailing jump when false.
            steps.push(Step {
                kind: StepKind::JumpIfNot(then_steps.len() + 1),
                node: node.id(),
            });
            steps.extend(then_steps);
            // Skip the else branch after taking the then branch.
            steps.push(Step {
                kind: StepKind::Jump(else_steps.len()),
                node: node.id(),
            });
            steps.extend(else_steps);
            steps.push(Step::finish(node.id()));
            steps
        }

        // ── Failure ──
        NodeKind::Unparsable { .. } => {
            vec![Step::halt(ExceptionKind::UnparsableReached, node.id())]
        }
    }
}

fn bracket<'a>(node: &Node, children: impl Iterator<Item = &'a Node>) -> Vec<Step> {
    let mut steps = vec![Step::start(node.id())];
    for child in children {
        steps.extend(compile(child));
    }
    steps.push(Step::finish(node.id()));
    steps
}
