//! Rill conflict analyzer: static checking over the shared node tree.
//!
//! The analyzer walks a [`rill_types::Tree`], asks each node kind for its
//! conflicts given contextual type information, and returns the list. Major
//! conflicts block evaluation; minor conflicts are advisory.

pub mod basis;
pub mod checker;

pub use basis::{BasisSurface, FnSig};
pub use checker::ConflictAnalyzer;

use rill_types::{Conflict, Severity, Tree};

/// Compute all conflicts for a tree.
pub fn check(tree: &Tree) -> Vec<Conflict> {
    ConflictAnalyzer::new(tree).check()
}

/// Compute only the major (evaluation-blocking) conflicts for a tree.
pub fn major_conflicts(tree: &Tree) -> Vec<Conflict> {
    check(tree)
        .into_iter()
        .filter(|c| c.severity == Severity::Major)
        .collect()
}
