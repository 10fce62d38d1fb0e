//! Plugin architecture and super-global scope.
//!
//! Built-ins are not preloaded into the global scope. They live in the
//! **super-global scope**, which sits below the global scope and resolves
//! names on first use:
//!
//! ```text
//! Variable Lookup Order:
//! 1. Local scope (function/block)
//! 2. Outer scopes (lexical chain)
//! 3. Global scope
//! 4. Super-global scope ← Built-ins and plugins live here
//! ```
//!
//! - **[`PluginResolver`]**: trait for providing objects and methods dynamically
//! - **[`SuperGlobalEnvironment`]**: container holding resolvers, with caching
//! - **[`CorePluginResolver`]**: adapter wrapping a [`BuiltInRegistry`] as a resolver
//! - **[`EvalContext`]**: execution state with super-global integration
//!
//! A host extends a context by adding its own resolver; a worker's context
//! gets one extra resolver that supplies `postMessage`, `close` and `self`.

pub mod core_resolver;
pub mod registry;
pub mod resolver;
pub mod super_global;
pub mod types;

pub use core_resolver::CorePluginResolver;
pub use registry::BuiltInRegistry;
pub use resolver::PluginResolver;
pub use super_global::SuperGlobalEnvironment;
pub use types::{BuiltInObject, EvalContext, NativeFn};
