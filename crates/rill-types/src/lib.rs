//! Shared types for the Rill semantic core.
//!
//! Three pieces used by both the conflict analyzer and the evaluator:
//! the immutable node [`Tree`], the structural type lattice ([`Type`],
//! [`TypeSet`]), and the [`Conflict`] diagnostic record.

pub mod conflict;
pub mod node;
pub mod ty;

pub use conflict::{Conflict, ConflictKind, ConflictSite, Severity};
pub use node::{Node, NodeId, NodeKind, SyntaxFailure, TokenKind, Tree};
pub use ty::{BasisKind, Type, TypeContext, TypeSet, Unit};
