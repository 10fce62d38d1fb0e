//! Evaluation of the AST against an [`EvalContext`](crate::runner::plugin::types::EvalContext).
//!
//! Statements produce completion records, expressions produce values, and
//! every failure travels as a `JErrorType` through `Result`.

pub mod expression;
pub mod function;
pub mod property;
pub mod statement;
pub mod types;

pub use expression::evaluate_expression;
pub use function::{call_function, construct};
pub use statement::{execute_program, execute_statement};
pub use types::{Completion, CompletionType, Reference};
