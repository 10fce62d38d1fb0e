//! # jscore - an embeddable JavaScript execution context
//!
//! A small JavaScript engine meant to live inside a host program:
//! - PEG parser producing an immutable AST
//! - Tree-walking interpreter over an arena heap with mark/sweep collection
//! - Host-configurable limits on loop iterations, call depth and heap size
//! - `Worker`s running on their own threads, talking through cloned messages
//! - Host-environment globals: base64/hex/URI encodings, digests and HMACs,
//!   `crypto`, timers and `globalThis`
//! - Plugin architecture with lazy super-global scope resolution
//!
//! ## Quick Start
//!
//! ### Evaluating scripts
//!
//! ```
//! use jscore::{Context, HostValue};
//!
//! let mut context = Context::new();
//! context.eval("function add(a, b) { return a + b; }").unwrap();
//! assert_eq!(context.eval("add(2, 3)").unwrap(), HostValue::Number(5.0));
//! assert_eq!(context.eval("add('a', 'b')").unwrap(), HostValue::from("ab"));
//! ```
//!
//! Errors come back typed:
//!
//! ```
//! use jscore::{Context, JErrorType};
//!
//! let mut context = Context::new();
//! assert!(matches!(context.eval("doesNotExist"), Err(JErrorType::ReferenceError(_))));
//! assert!(matches!(context.eval("let = ;"), Err(JErrorType::SyntaxError { .. })));
//! ```
//!
//! ### Workers
//!
//! A script spawns workers with `new Worker(source)`. Their replies are
//! delivered when the host drains them:
//!
//! ```
//! use std::time::Duration;
//! use jscore::{Context, HostValue};
//!
//! let mut context = Context::new();
//! context.eval(r#"
//!     var reply;
//!     var w = new Worker("onmessage = function (e) { postMessage(e.data * 2); close(); }");
//!     w.onmessage = function (e) { reply = e.data; };
//!     w.postMessage(21);
//! "#).unwrap();
//! assert!(context.run_until_workers_idle(Duration::from_secs(10)).unwrap());
//! assert_eq!(context.eval("reply").unwrap(), HostValue::Number(42.0));
//! ```
//!
//! ### Timers
//!
//! `setTimeout` and `setInterval` callbacks run when the host drains the
//! context, like worker events:
//!
//! ```
//! use std::time::Duration;
//! use jscore::{Context, HostValue};
//!
//! let mut context = Context::new();
//! context.eval("var fired = []; setTimeout(function (x) { fired.push(x); }, 5, 'late');").unwrap();
//! assert_eq!(context.eval("fired.length").unwrap(), HostValue::Number(0.0));
//! assert!(context.run_until_workers_idle(Duration::from_secs(10)).unwrap());
//! assert_eq!(context.eval("fired[0]").unwrap(), HostValue::from("late"));
//! ```
//!
//! ## Super-Global Scope Architecture
//!
//! Built-in objects are not preloaded into the global scope. They live in the
//! **super-global scope** and are materialized the first time a script names
//! them:
//!
//! 1. **Lazy Resolution**: unused built-ins are never allocated.
//! 2. **Plugin Architecture**: objects come from resolvers implementing
//!    [`runner::plugin::resolver::PluginResolver`], queried in order.
//! 3. **Caching**: a resolved object is cached for the life of the context.
//! 4. **Immutable from JS**: scripts may shadow super-global names but not replace them.
//!
//! ### Example: Custom Plugin
//!
//! ```
//! use jscore::runner::ds::value::JsValue;
//! use jscore::runner::ds::error::JErrorType;
//! use jscore::runner::plugin::{BuiltInObject, BuiltInRegistry, CorePluginResolver, EvalContext};
//! use jscore::{Context, HostValue};
//!
//! fn triple(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
//!     let n = match args.first() {
//!         Some(value) => ctx.to_number(value)?,
//!         None => f64::NAN,
//!     };
//!     Ok(JsValue::Number(n * 3.0))
//! }
//!
//! let mut registry = BuiltInRegistry::new();
//! registry.register_object(BuiltInObject::new("MyMath").add_method("triple", triple));
//!
//! let mut context = Context::new();
//! context.add_resolver(Box::new(CorePluginResolver::named("my_math", registry)));
//! assert_eq!(context.eval("MyMath.triple(7)").unwrap(), HostValue::Number(21.0));
//! ```
//!
//! ## Architecture
//!
//! - **[`parser`]** - PEG parser and AST types
//! - **[`runner`]** - The execution engine
//!   - **[`runner::api`]** - [`Context`], the host-facing API
//!   - **[`runner::bridge`]** - [`HostValue`] and the host bridge
//!   - **[`runner::plugin`]** - Plugin system and super-global scope
//!   - **[`runner::ds`]** - Data structures (values, heap, scopes)
//!   - **[`runner::eval`]** - Tree-walking interpreter
//!   - **[`runner::worker`]** - Worker threads and messaging
//!   - **[`runner::timer`]** - Timer queues

#[macro_use]
extern crate lazy_static;

pub mod parser;
pub mod runner;

pub use runner::api::Context;
pub use runner::bridge::HostValue;
pub use runner::config::ContextConfig;
pub use runner::ds::error::JErrorType;
pub use runner::worker::{WorkerId, WorkerState};
