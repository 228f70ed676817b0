//! Rill step compiler, evaluator, and reactive stream runtime.
//!
//! Expressions compile to ordered [`step::Step`] sequences; the
//! [`Evaluator`] executes them against a stack of activation records,
//! resumable at every step boundary. Runtime failures are
//! [`value::Value::Exception`] values that propagate to the program
//! boundary rather than host errors. Stream emissions queue between
//! passes and re-run the program from the top with histories retained.

pub mod compile;
pub mod error;
pub mod evaluation;
pub mod evaluator;
pub mod output;
pub mod registry;
pub mod step;
pub mod stream;
pub mod value;

pub use compile::compile;
pub use error::{EvalError, EvalResult};
pub use evaluation::Evaluation;
pub use evaluator::{Evaluator, DEFAULT_STEP_LIMIT};
pub use registry::{NativeParam, NativeRegistry, StreamDefinition};
pub use step::{Step, StepKind};
pub use stream::{InputSource, KeyboardSource, RawEvent, TimerSource};
pub use value::{ExceptionKind, FunctionValue, StreamId, Value};

use rill_types::Tree;

/// Check a program and evaluate it. A program with major static conflicts
/// is never executed; a program that raises a runtime exception still
/// completes its pass and reports the exception as the result.
pub fn evaluate(tree: &Tree, registry: &NativeRegistry) -> EvalResult<Value> {
    let majors = rill_check::major_conflicts(tree);
    if !majors.is_empty() {
        return Err(EvalError::Blocked { conflicts: majors });
    }
    Ok(Evaluator::new(tree, registry).evaluate())
}
