//! Integration tests for the reactive stream runtime: creation on first
//! reference, filtering, queueing between passes, re-evaluation, and
//! history retention.

use pretty_assertions::assert_eq;
use rust_decimal::Decimal;

use rill_eval::{Evaluator, NativeRegistry, RawEvent, Value};
use rill_types::{Node, Tree, Type, Unit};

fn key_event(key: &str, down: bool) -> RawEvent {
    RawEvent::Key {
        key: key.into(),
        down,
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Creation & reads
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn a_stream_starts_when_first_referenced() {
    let stream = Node::stream("key", vec![]);
    let stream_id = stream.id();
    let tree = Tree::new(Node::program(Node::block(vec![stream])));
    let registry = NativeRegistry::standard();
    let mut evaluator = Evaluator::new(&tree, &registry);

    // Before the first pass there is no live stream.
    assert!(evaluator.stream_history(stream_id).is_none());
    // The initial value is the stream's default.
    assert_eq!(evaluator.evaluate(), Value::Text(String::new()));
    assert_eq!(evaluator.live_streams().len(), 1);
    assert!(evaluator.live_streams()[0].source.is_on());
}

#[test]
fn emissions_rerun_the_program_with_the_latest_value() {
    let stream = Node::stream("key", vec![]);
    let stream_id = stream.id();
    let tree = Tree::new(Node::program(Node::block(vec![stream])));
    let registry = NativeRegistry::standard();
    let mut evaluator = Evaluator::new(&tree, &registry);
    evaluator.evaluate();

    evaluator.record(key_event("a", true));
    assert_eq!(evaluator.pump(), Some(Value::text("a")));
    evaluator.record(key_event("b", true));
    assert_eq!(evaluator.pump(), Some(Value::text("b")));

    // The history is an append-only log across passes.
    assert_eq!(
        evaluator.stream_history(stream_id),
        Some(&[Value::text("a"), Value::text("b")][..])
    );
}

#[test]
fn filtered_events_are_dropped_silently() {
    // ∆key("b") only records the b key.
    let stream = Node::stream("key", vec![Node::text("b")]);
    let stream_id = stream.id();
    let tree = Tree::new(Node::program(Node::block(vec![stream])));
    let registry = NativeRegistry::standard();
    let mut evaluator = Evaluator::new(&tree, &registry);
    evaluator.evaluate();

    evaluator.record(key_event("a", true));
    // Nothing emitted, so nothing re-evaluates.
    assert_eq!(evaluator.pump(), None);
    assert_eq!(evaluator.stream_history(stream_id), Some(&[][..]));

    evaluator.record(key_event("b", true));
    assert_eq!(evaluator.pump(), Some(Value::text("b")));
}

// ══════════════════════════════════════════════════════════════════════════════
// Queueing between passes
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn events_are_queued_while_a_pass_is_in_flight() {
    let stream = Node::stream("key", vec![]);
    let tree = Tree::new(Node::program(Node::block(vec![stream])));
    let registry = NativeRegistry::standard();
    let mut evaluator = Evaluator::new(&tree, &registry);

    // Finish one pass so the stream exists.
    evaluator.evaluate();

    // Begin a second pass and interrupt it with an event.
    evaluator.start_pass();
    assert!(evaluator.step());
    evaluator.record(key_event("a", true));
    // Mid-pass, the event must not be applied.
    assert_eq!(evaluator.pump(), None);
    while evaluator.step() {}

    // Between passes, the queued event applies and triggers a re-run.
    assert_eq!(evaluator.pump(), Some(Value::text("a")));
}

#[test]
fn a_batch_of_events_coalesces_into_one_rerun() {
    let stream = Node::stream("key", vec![]);
    let stream_id = stream.id();
    let tree = Tree::new(Node::program(Node::block(vec![stream])));
    let registry = NativeRegistry::standard();
    let mut evaluator = Evaluator::new(&tree, &registry);
    evaluator.evaluate();

    evaluator.record(key_event("a", true));
    evaluator.record(key_event("b", true));
    // Events apply in arrival order; one pass observes both.
    assert_eq!(evaluator.pump(), Some(Value::text("b")));
    assert_eq!(
        evaluator.stream_history(stream_id),
        Some(&[Value::text("a"), Value::text("b")][..])
    );
}

// ══════════════════════════════════════════════════════════════════════════════
// Reconfiguration & history retention
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn reevaluation_reconfigures_without_discarding_history() {
    let stream = Node::stream("key", vec![]);
    let stream_id = stream.id();
    let tree = Tree::new(Node::program(Node::block(vec![stream])));
    let registry = NativeRegistry::standard();
    let mut evaluator = Evaluator::new(&tree, &registry);
    evaluator.evaluate();

    evaluator.record(key_event("a", true));
    evaluator.pump();
    // The re-run re-evaluated the stream reference, reconfiguring the
    // existing live stream rather than creating a new one.
    assert_eq!(evaluator.live_streams().len(), 1);
    assert_eq!(
        evaluator.stream_history(stream_id),
        Some(&[Value::text("a")][..])
    );
}

#[test]
fn timers_emit_measurements_in_milliseconds() {
    let stream = Node::stream(
        "time",
        vec![Node::measurement(Decimal::from(50), Unit::of("ms"))],
    );
    let tree = Tree::new(Node::program(Node::block(vec![stream])));
    let registry = NativeRegistry::standard();
    let mut evaluator = Evaluator::new(&tree, &registry);
    assert_eq!(
        evaluator.evaluate(),
        Value::Measurement(Decimal::ZERO, Unit::of("ms"))
    );

    evaluator.record(RawEvent::Tick {
        ms: Decimal::from(60),
    });
    assert_eq!(
        evaluator.pump(),
        Some(Value::Measurement(Decimal::from(60), Unit::of("ms")))
    );
}

#[test]
fn stream_handles_carry_their_element_type() {
    let stream = Node::stream("key", vec![]);
    let stream_id = stream.id();
    let tree = Tree::new(Node::program(Node::block(vec![stream])));
    let registry = NativeRegistry::standard();
    let mut evaluator = Evaluator::new(&tree, &registry);
    evaluator.evaluate();

    let handle = evaluator.stream_value(stream_id).unwrap();
    let Value::Stream(_, element) = handle else {
        panic!("expected a stream handle");
    };
    assert_eq!(*element, Type::text());
}
