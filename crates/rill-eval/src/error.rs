//! Host-boundary error types.
//!
//! These are errors for the embedding host, not for programs: a program
//! failure is an [`crate::value::Value::Exception`] result, never an `Err`.

use thiserror::Error;

use rill_types::Conflict;

/// Errors surfaced to the host when evaluation cannot proceed.
#[derive(Debug, Error)]
pub enum EvalError {
    /// The program has major static conflicts and is never executed.
    #[error("evaluation blocked by {} major conflict(s)", .conflicts.len())]
    Blocked { conflicts: Vec<Conflict> },
}

/// Result alias for host-facing evaluation entry points.
pub type EvalResult<T> = Result<T, EvalError>;
