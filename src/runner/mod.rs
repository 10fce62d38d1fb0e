//! The engine: value model, evaluator, built-ins, workers and the host API.
//!
//! - **[`api`]**: [`Context`](api::Context), the host entry point
//! - **[`bridge`]**: conversion between script values and [`HostValue`](bridge::HostValue)s
//! - **[`ds`]**: heap, values, scopes and errors
//! - **[`eval`]**: the tree-walking evaluator
//! - **[`plugin`]**: the super-global scope and its resolvers
//! - **[`stack`]**: native stack growth for deep recursion
//! - **[`std_lib`]**: built-in globals
//! - **[`timer`]**: `setTimeout` and `setInterval` queues
//! - **[`worker`]**: worker threads and their channels

pub mod api;
pub mod bridge;
pub mod config;
pub mod ds;
pub mod eval;
pub mod plugin;
pub mod stack;
pub mod std_lib;
pub mod timer;
pub mod worker;
