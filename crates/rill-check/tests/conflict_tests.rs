//! Integration tests for the conflict analyzer.
//!
//! Trees are built with the node constructors, the way the parser would
//! build them; each test checks the exact conflicts a construct produces.

use pretty_assertions::assert_eq;
use rill_check::ConflictAnalyzer;
use rill_types::node::{Node, NodeKind, SyntaxFailure, TokenKind};
use rill_types::{ConflictKind, Severity, Tree, Type, TypeSet};

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

fn tree_of(statements: Vec<Node>) -> Tree {
    Tree::new(Node::program(Node::block(statements)))
}

fn kinds(tree: &Tree) -> Vec<ConflictKind> {
    ConflictAnalyzer::new(tree)
        .check()
        .into_iter()
        .map(|c| c.kind)
        .collect()
}

// ══════════════════════════════════════════════════════════════════════════════
// Delimiters & map entries
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn unclosed_map_names_open_and_expected_close() {
    let map = Node::unclosed_map(vec![Node::key_value(Node::number(1), Node::text("hi"))]);
    let open = map.children()[0].id();
    let tree = tree_of(vec![map]);

    let conflicts = ConflictAnalyzer::new(&tree).check();
    assert_eq!(conflicts.len(), 1);
    let conflict = &conflicts[0];
    assert_eq!(conflict.severity, Severity::Major);
    assert_eq!(conflict.primary.node, open);
    match &conflict.kind {
        ConflictKind::UnclosedDelimiter { expected, .. } => {
            assert_eq!(*expected, TokenKind::SetClose);
        }
        other => panic!("expected UnclosedDelimiter, got {other:?}"),
    }
}

#[test]
fn closed_collections_are_clean() {
    let tree = tree_of(vec![
        Node::list(vec![Node::number(1)]),
        Node::set(vec![Node::number(1)]),
        Node::map(vec![Node::key_value(Node::number(1), Node::text("hi"))]),
    ]);
    assert_eq!(kinds(&tree), vec![]);
}

#[test]
fn non_pair_map_entry_points_back_at_open() {
    let map = Node::map(vec![
        Node::key_value(Node::number(1), Node::text("hi")),
        Node::number(2),
    ]);
    let open = map.children()[0].id();
    let tree = tree_of(vec![map]);

    let conflicts = ConflictAnalyzer::new(&tree).check();
    assert_eq!(conflicts.len(), 1);
    assert!(matches!(
        conflicts[0].kind,
        ConflictKind::NotAKeyValue { .. }
    ));
    assert_eq!(conflicts[0].secondary.as_ref().unwrap().node, open);
}

// ══════════════════════════════════════════════════════════════════════════════
// Unparsable
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn unparsable_yields_exactly_one_conflict() {
    let tree = tree_of(vec![Node::unparsable(
        SyntaxFailure::UnexpectedToken,
        vec![Node::token(TokenKind::Name, "oops")],
    )]);
    let conflicts = ConflictAnalyzer::new(&tree).check();
    assert_eq!(conflicts.len(), 1);
    assert!(matches!(
        conflicts[0].kind,
        ConflictKind::UnparsableNode { .. }
    ));
    assert_eq!(conflicts[0].severity, Severity::Major);
}

// ══════════════════════════════════════════════════════════════════════════════
// Queries
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn non_boolean_query_is_major() {
    let rows = Node::list(vec![]);
    let select = Node::select(rows, Node::number(1));
    let tree = tree_of(vec![select]);
    let conflicts = ConflictAnalyzer::new(&tree).check();
    assert_eq!(conflicts.len(), 1);
    assert!(matches!(
        conflicts[0].kind,
        ConflictKind::NonBooleanQuery { .. }
    ));
}

#[test]
fn boolean_query_is_clean() {
    let select = Node::select(Node::list(vec![]), Node::boolean(true));
    let tree = tree_of(vec![select]);
    assert_eq!(kinds(&tree), vec![]);
}

// ══════════════════════════════════════════════════════════════════════════════
// Names & cycles
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn unknown_name_is_reported() {
    let tree = tree_of(vec![Node::reference("ghost")]);
    let conflicts = ConflictAnalyzer::new(&tree).check();
    assert_eq!(conflicts.len(), 1);
    match &conflicts[0].kind {
        ConflictKind::UnknownName { name, .. } => assert_eq!(name, "ghost"),
        other => panic!("expected UnknownName, got {other:?}"),
    }
}

#[test]
fn self_referential_bind_is_a_cycle() {
    // x: x — the initializer reaches its own binding.
    let bind = Node::bind(&["x"], None, Some(Node::reference("x")));
    let tree = tree_of(vec![bind, Node::reference("x")]);
    let cycle_count = kinds(&tree)
        .into_iter()
        .filter(|k| matches!(k, ConflictKind::ReferenceCycle { .. }))
        .count();
    assert_eq!(cycle_count, 1);
}

#[test]
fn mutually_referential_binds_are_a_cycle() {
    let a = Node::bind(&["a"], None, Some(Node::reference("b")));
    let b = Node::bind(&["b"], None, Some(Node::reference("a")));
    let tree = tree_of(vec![a, b, Node::reference("a"), Node::reference("b")]);
    let cycles = kinds(&tree)
        .into_iter()
        .filter(|k| matches!(k, ConflictKind::ReferenceCycle { .. }))
        .count();
    assert!(cycles >= 1, "expected at least one ReferenceCycle");
}

#[test]
fn unused_bind_is_minor() {
    let tree = tree_of(vec![
        Node::bind(&["x"], None, Some(Node::number(1))),
        Node::number(2),
    ]);
    let conflicts = ConflictAnalyzer::new(&tree).check();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].severity, Severity::Minor);
    assert!(matches!(conflicts[0].kind, ConflictKind::UnusedBind { .. }));
}

// ══════════════════════════════════════════════════════════════════════════════
// Binds & conditionals
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn incompatible_bind_reports_both_types() {
    let bind = Node::bind(&["x"], Some(Type::measurement()), Some(Node::text("hi")));
    let tree = tree_of(vec![bind, Node::reference("x")]);
    let conflicts = ConflictAnalyzer::new(&tree).check();
    assert_eq!(conflicts.len(), 1);
    match &conflicts[0].kind {
        ConflictKind::IncompatibleBind { expected, .. } => {
            assert_eq!(expected, "#");
        }
        other => panic!("expected IncompatibleBind, got {other:?}"),
    }
    assert!(conflicts[0].secondary.is_some());
}

#[test]
fn non_boolean_condition_is_reported() {
    let conditional = Node::conditional(Node::number(1), Node::number(2), Node::number(3));
    let tree = tree_of(vec![conditional]);
    let conflicts = ConflictAnalyzer::new(&tree).check();
    assert_eq!(conflicts.len(), 1);
    assert!(matches!(
        conflicts[0].kind,
        ConflictKind::ExpectedBooleanCondition { .. }
    ));
}

// ══════════════════════════════════════════════════════════════════════════════
// Interfaces
// ══════════════════════════════════════════════════════════════════════════════

fn interface_with(name: &str) -> Node {
    Node::structure(
        &["Drawable"],
        &[],
        &[],
        vec![],
        vec![Node::function(&[name], &[], vec![], Some(Type::text()), None)],
    )
}

#[test]
fn missing_interface_function_names_the_function() {
    let interface = interface_with("draw");
    let implementor = Node::structure(&["Circle"], &["Drawable"], &[], vec![], vec![]);
    let tree = tree_of(vec![interface, implementor]);

    let conflicts = ConflictAnalyzer::new(&tree).check();
    assert_eq!(conflicts.len(), 1);
    match &conflicts[0].kind {
        ConflictKind::UnimplementedInterface {
            interface,
            function,
            ..
        } => {
            assert_eq!(interface, "Drawable");
            assert_eq!(function, "draw");
        }
        other => panic!("expected UnimplementedInterface, got {other:?}"),
    }
}

#[test]
fn implemented_interface_is_clean() {
    let interface = interface_with("draw");
    let implementor = Node::structure(
        &["Circle"],
        &["Drawable"],
        &[],
        vec![],
        vec![Node::function(
            &["draw"],
            &[],
            vec![],
            Some(Type::text()),
            Some(Node::text("o")),
        )],
    );
    let tree = tree_of(vec![interface, implementor]);
    assert_eq!(kinds(&tree), vec![]);
}

#[test]
fn mismatched_interface_signature_is_reported() {
    let interface = interface_with("draw");
    // Implemented, but with a measurement output instead of text.
    let implementor = Node::structure(
        &["Circle"],
        &["Drawable"],
        &[],
        vec![],
        vec![Node::function(
            &["draw"],
            &[],
            vec![],
            Some(Type::measurement()),
            Some(Node::number(0)),
        )],
    );
    let tree = tree_of(vec![interface, implementor]);
    let conflicts = ConflictAnalyzer::new(&tree).check();
    assert_eq!(conflicts.len(), 1);
    assert!(matches!(
        conflicts[0].kind,
        ConflictKind::UnimplementedInterface { .. }
    ));
}

// ══════════════════════════════════════════════════════════════════════════════
// Evaluate, conversions, type tests
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn evaluating_a_non_function_is_reported() {
    let tree = tree_of(vec![Node::evaluate(Node::number(1), vec![])]);
    let conflicts = ConflictAnalyzer::new(&tree).check();
    assert_eq!(conflicts.len(), 1);
    assert!(matches!(
        conflicts[0].kind,
        ConflictKind::NotAFunction { .. }
    ));
}

#[test]
fn unknown_conversion_is_reported() {
    // Booleans convert to text, not to list.
    let tree = tree_of(vec![Node::convert(Node::boolean(true), "[]")]);
    let conflicts = ConflictAnalyzer::new(&tree).check();
    assert_eq!(conflicts.len(), 1);
    assert!(matches!(
        conflicts[0].kind,
        ConflictKind::UnknownConversion { .. }
    ));
}

#[test]
fn known_conversion_is_clean() {
    let tree = tree_of(vec![Node::convert(Node::boolean(true), "''")]);
    assert_eq!(kinds(&tree), vec![]);
}

#[test]
fn impossible_type_test_is_reported() {
    let tree = tree_of(vec![Node::is(Node::text("hi"), Type::measurement())]);
    let conflicts = ConflictAnalyzer::new(&tree).check();
    assert_eq!(conflicts.len(), 1);
    assert!(matches!(
        conflicts[0].kind,
        ConflictKind::ImpossibleTypeTest { .. }
    ));
}

// ══════════════════════════════════════════════════════════════════════════════
// Type derivation through the basis
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn native_member_types_substitute_element_types() {
    let list = Node::list(vec![Node::number(1), Node::number(2)]);
    let first = Node::evaluate(Node::property(list, "first"), vec![]);
    let tree = tree_of(vec![first]);
    let root = tree.root().clone();
    let mut analyzer = ConflictAnalyzer::new(&tree);
    assert_eq!(analyzer.check(), vec![]);
    // [1 2].first() is a measurement.
    let ty = analyzer.type_of(&root);
    assert_eq!(ty, Type::measurement());
}

// ══════════════════════════════════════════════════════════════════════════════
// Narrowing
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn narrowing_refines_to_exactly_the_tested_type() {
    // x: (# | '') … x•# narrows x's candidates to exactly #.
    let union = Type::union(Type::measurement(), Type::text());
    let bind = Node::bind(&["x"], Some(union.clone()), Some(Node::number(1)));
    let bind_id = bind.id();
    let test = Node::is(Node::reference("x"), Type::measurement());
    let tree = tree_of(vec![
        bind,
        Node::conditional(test, Node::reference("x"), Node::reference("x")),
    ]);

    let mut analyzer = ConflictAnalyzer::new(&tree);
    let test_node = tree
        .nodes()
        .into_iter()
        .find(|n| matches!(n.kind(), NodeKind::Is { .. }))
        .unwrap();
    let narrowed = analyzer.evaluate_type_set(test_node, bind_id, &TypeSet::of(&union));
    assert_eq!(narrowed.list(), &[Type::measurement()]);
}

#[test]
fn narrowing_leaves_unrelated_bindings_unchanged() {
    let union = Type::union(Type::measurement(), Type::text());
    let x = Node::bind(&["x"], Some(union.clone()), Some(Node::number(1)));
    let y = Node::bind(&["y"], Some(union.clone()), Some(Node::number(2)));
    let y_id = y.id();
    let test = Node::is(Node::reference("x"), Type::measurement());
    let tree = tree_of(vec![
        x,
        y,
        Node::conditional(
            test,
            Node::reference("x"),
            Node::reference("y"),
        ),
    ]);

    let mut analyzer = ConflictAnalyzer::new(&tree);
    let test_node = tree
        .nodes()
        .into_iter()
        .find(|n| matches!(n.kind(), NodeKind::Is { .. }))
        .unwrap();
    // The test is about x, so y's candidate set is unchanged.
    let unchanged = analyzer.evaluate_type_set(test_node, y_id, &TypeSet::of(&union));
    assert_eq!(unchanged, TypeSet::of(&union));
}

#[test]
fn narrowing_applies_inside_the_true_branch() {
    // Inside the branch guarded by x•#, a further test x•'' can never be
    // true, and the analyzer knows it because x narrowed to #.
    let union = Type::union(Type::measurement(), Type::text());
    let bind = Node::bind(&["x"], Some(union), Some(Node::number(1)));
    let outer = Node::is(Node::reference("x"), Type::measurement());
    let inner = Node::is(Node::reference("x"), Type::text());
    let tree = tree_of(vec![
        bind,
        Node::conditional(
            outer,
            Node::conditional(inner, Node::number(1), Node::number(2)),
            Node::number(3),
        ),
    ]);

    let conflicts = ConflictAnalyzer::new(&tree).check();
    assert_eq!(conflicts.len(), 1);
    assert!(matches!(
        conflicts[0].kind,
        ConflictKind::ImpossibleTypeTest { .. }
    ));
}

// ══════════════════════════════════════════════════════════════════════════════
// Determinism
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn conflicts_are_deterministic() {
    let tree = tree_of(vec![
        Node::unclosed_map(vec![Node::number(1)]),
        Node::reference("ghost"),
        Node::bind(&["x"], Some(Type::measurement()), Some(Node::text("hi"))),
        Node::select(Node::list(vec![]), Node::number(1)),
    ]);
    let first = ConflictAnalyzer::new(&tree).check();
    let second = ConflictAnalyzer::new(&tree).check();
    assert_eq!(first, second);
    // Re-checking with the same analyzer is stable too.
    let mut analyzer = ConflictAnalyzer::new(&tree);
    let third = analyzer.check();
    let fourth = analyzer.check();
    assert_eq!(third, fourth);
    assert_eq!(first, third);
}
