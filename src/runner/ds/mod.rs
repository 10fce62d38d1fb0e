//! Runtime data structures: values, the heap and what lives in it.

pub mod error;
pub mod function_object;
pub mod heap;
pub mod lex_env;
pub mod object;
pub mod operations;
pub mod value;
