//! End-to-end tests of the native basis: list, set, and map operations and
//! the conversion table, driven through compiled steps.

use pretty_assertions::assert_eq;
use rill_eval::{Evaluator, ExceptionKind, NativeRegistry, Value};
use rill_types::{BasisKind, Node, Tree, Type};

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

/// Evaluate a single expression as a whole program.
fn run(expression: Node) -> Value {
    let tree = Tree::new(Node::program(Node::block(vec![expression])));
    let registry = NativeRegistry::standard();
    let result = Evaluator::new(&tree, &registry).evaluate();
    result
}

/// `subject.name(args...)`
fn call(subject: Node, name: &str, args: Vec<Node>) -> Node {
    Node::evaluate(Node::property(subject, name), args)
}

fn numbers(values: &[i64]) -> Vec<Node> {
    values.iter().map(|n| Node::number(*n)).collect()
}

fn number_list(values: &[i64]) -> Node {
    Node::list(numbers(values))
}

fn number_set(values: &[i64]) -> Node {
    Node::set(numbers(values))
}

fn greeting_map() -> Node {
    Node::map(vec![
        Node::key_value(Node::number(1), Node::text("hi")),
        Node::key_value(Node::number(2), Node::text("bye")),
    ])
}

// ══════════════════════════════════════════════════════════════════════════════
// Lists
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn list_functions() {
    assert_eq!(run(call(number_list(&[1, 2, 3]), "first", vec![])).to_string(), "1");
    assert_eq!(run(call(number_list(&[1, 2, 3]), "last", vec![])).to_string(), "3");
    assert_eq!(
        run(call(number_list(&[1, 2, 3]), "reverse", vec![])).to_string(),
        "[3 2 1]"
    );
    assert_eq!(
        run(call(number_list(&[1, 2, 3]), "sansFirst", vec![])).to_string(),
        "[2 3]"
    );
    assert_eq!(
        run(call(number_list(&[1, 2, 3]), "sansLast", vec![])).to_string(),
        "[1 2]"
    );
    assert_eq!(
        run(call(number_list(&[1, 2, 3]), "sans", vec![Node::number(2)])).to_string(),
        "[1 3]"
    );
    assert_eq!(
        run(call(
            number_list(&[1, 2, 3, 1, 2, 3]),
            "sansAll",
            vec![Node::number(1)]
        ))
        .to_string(),
        "[2 3 2 3]"
    );
}

#[test]
fn list_add_and_queries() {
    assert_eq!(
        run(call(number_list(&[1, 2]), "add", vec![Node::number(3)])).to_string(),
        "[1 2 3]"
    );
    assert_eq!(
        run(call(number_list(&[1, 2]), "length", vec![])),
        Value::number(2)
    );
    assert_eq!(
        run(call(number_list(&[1, 2]), "has", vec![Node::number(2)])),
        Value::Bool(true)
    );
    assert_eq!(
        run(call(number_list(&[1, 2]), "has", vec![Node::number(9)])),
        Value::Bool(false)
    );
    assert_eq!(
        run(call(
            Node::list(vec![Node::text("a"), Node::text("b")]),
            "join",
            vec![Node::text("-")]
        )),
        Value::text("a-b")
    );
}

#[test]
fn first_of_empty_list_is_none() {
    assert_eq!(run(call(Node::list(vec![]), "first", vec![])), Value::None);
}

// ══════════════════════════════════════════════════════════════════════════════
// Sets
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn set_functions() {
    assert_eq!(
        run(call(number_set(&[1, 2, 3]), "add", vec![Node::number(1)])).to_string(),
        "{1 2 3}"
    );
    assert_eq!(
        run(call(number_set(&[1, 2, 3]), "add", vec![Node::number(4)])).to_string(),
        "{1 2 3 4}"
    );
    assert_eq!(
        run(call(number_set(&[1, 2, 3]), "remove", vec![Node::number(1)])).to_string(),
        "{2 3}"
    );
    assert_eq!(
        run(call(number_set(&[1, 2, 3]), "union", vec![number_set(&[3, 4])])).to_string(),
        "{1 2 3 4}"
    );
    assert_eq!(
        run(call(
            number_set(&[1, 2, 3]),
            "intersection",
            vec![number_set(&[2, 3, 4])]
        ))
        .to_string(),
        "{2 3}"
    );
    assert_eq!(
        run(call(
            number_set(&[1, 2, 3]),
            "difference",
            vec![number_set(&[3, 4, 5])]
        ))
        .to_string(),
        "{1 2}"
    );
}

#[test]
fn set_literals_deduplicate() {
    assert_eq!(run(number_set(&[1, 1, 2])).to_string(), "{1 2}");
}

// ══════════════════════════════════════════════════════════════════════════════
// Maps
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn map_functions() {
    assert_eq!(
        run(call(
            greeting_map(),
            "set",
            vec![Node::number(3), Node::text("hello")]
        ))
        .to_string(),
        "{1:\"hi\" 2:\"bye\" 3:\"hello\"}"
    );
    assert_eq!(
        run(call(
            greeting_map(),
            "set",
            vec![Node::number(1), Node::text("hello")]
        ))
        .to_string(),
        "{1:\"hello\" 2:\"bye\"}"
    );
    assert_eq!(
        run(call(greeting_map(), "unset", vec![Node::number(1)])).to_string(),
        "{2:\"bye\"}"
    );
    assert_eq!(
        run(call(greeting_map(), "remove", vec![Node::text("bye")])).to_string(),
        "{1:\"hi\"}"
    );
}

// ══════════════════════════════════════════════════════════════════════════════
// Conversions
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn conversions_follow_the_marker() {
    assert_eq!(
        run(Node::convert(number_list(&[1, 2, 3]), "''")),
        Value::text("[1 2 3]")
    );
    assert_eq!(
        run(Node::convert(number_list(&[1, 1, 2]), "{}")).to_string(),
        "{1 2}"
    );
    assert_eq!(
        run(Node::convert(number_set(&[1, 2]), "[]")).to_string(),
        "[1 2]"
    );
    assert_eq!(
        run(Node::convert(greeting_map(), "{}")).to_string(),
        "{1 2}"
    );
    assert_eq!(
        run(Node::convert(greeting_map(), "[]")).to_string(),
        "[\"hi\" \"bye\"]"
    );
    assert_eq!(
        run(Node::convert(Node::boolean(true), "''")),
        Value::text("⊤")
    );
    assert_eq!(run(Node::convert(Node::none(), "''")), Value::text("ø"));
    assert_eq!(
        run(Node::convert(Node::text("ab"), "[]")).to_string(),
        "[\"a\" \"b\"]"
    );
}

#[test]
fn missing_conversion_is_a_not_found_exception() {
    let result = run(Node::convert(Node::boolean(true), "[]"));
    assert!(matches!(
        result,
        Value::Exception {
            kind: ExceptionKind::UnknownConversion,
            ..
        }
    ));
}

#[test]
fn conversion_guard_rejects_a_mismatched_instance() {
    // A conversion registered under the list kind but expecting sets can
    // never pass its instance check.
    let mut registry = NativeRegistry::standard();
    registry.add_conversion(
        BasisKind::List,
        "§",
        BasisKind::Set,
        Type::text(),
        std::sync::Arc::new(|value| Value::Text(value.to_string())),
    );
    let tree = Tree::new(Node::program(Node::block(vec![Node::convert(
        number_list(&[1]),
        "§",
    )])));
    let result = Evaluator::new(&tree, &registry).evaluate();
    assert!(matches!(
        result,
        Value::Exception {
            kind: ExceptionKind::ExpectedType,
            ..
        }
    ));
}

// ══════════════════════════════════════════════════════════════════════════════
// Native failure modes
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn missing_required_argument_is_an_expected_type_exception() {
    let result = run(call(number_list(&[1, 2]), "add", vec![]));
    assert!(matches!(
        result,
        Value::Exception {
            kind: ExceptionKind::ExpectedType,
            ..
        }
    ));
}

#[test]
fn unknown_member_is_a_not_found_exception() {
    let result = run(call(number_list(&[1]), "explode", vec![]));
    assert!(matches!(
        result,
        Value::Exception {
            kind: ExceptionKind::UnknownName,
            ..
        }
    ));
}
