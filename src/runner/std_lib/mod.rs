//! Standard library built-in objects.
//!
//! Each module registers its globals and per-class prototype methods with a
//! [`BuiltInRegistry`](crate::runner::plugin::registry::BuiltInRegistry);
//! nothing is allocated until a script first names them.

pub mod array;
pub mod console;
pub mod core;
pub mod crypto;
pub mod encoding;
pub mod error;
pub mod global;
pub mod math;
pub mod number;
pub mod object;
pub mod string;
pub mod timers;
pub mod worker;
pub mod worker_scope;

pub use self::core::{register_core_builtins, register_extension_builtins, register_worker_scope_builtins};
