//! Plugin resolver trait for lazy, dynamic resolution of super-global objects.
//!
//! Plugins implement `PluginResolver` to provide objects (like `Math`, `console`)
//! that are available in the super-global scope. Objects are resolved lazily,
//! only when JS code actually references them.

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::heap::Heap;
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::types::NativeFn;

/// A plugin resolver that can dynamically provide named objects and methods.
///
/// Resolvers are queried in registration order when a name lookup reaches the
/// super-global scope. The first resolver that claims a name wins.
pub trait PluginResolver {
    /// Does this resolver provide a binding with the given name?
    ///
    /// This should be a cheap check. It must NOT allocate or materialize the object.
    fn has_binding(&self, name: &str) -> bool;

    /// Materialize the value for the given name on `heap`.
    ///
    /// Called only after `has_binding` returns `true`. The returned value is
    /// cached in the super-global environment, so this runs at most once per
    /// name per context.
    fn resolve(&self, name: &str, heap: &mut Heap) -> Result<JsValue, JErrorType>;

    /// A method shared by all values of `class_name`, such as `Array` `push`.
    ///
    /// Returns `None` if this resolver does not provide it, letting the next
    /// resolver answer.
    fn prototype_method(&self, _class_name: &str, _method_name: &str) -> Option<NativeFn> {
        None
    }

    /// Human-readable name for this resolver (for debugging/logging).
    fn name(&self) -> &str;
}
