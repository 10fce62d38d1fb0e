//! `globalThis`, an object view of the global scope.
//!
//! Reads see the global bindings and then the built-ins; writes and deletes
//! act on the global bindings. The routing lives in
//! [`property`](crate::runner::eval::property).

use crate::runner::eval::property::CLASS_GLOBAL;
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::BuiltInObject;

/// Register `globalThis` with the registry.
pub fn register(registry: &mut BuiltInRegistry) {
    registry.register_object(BuiltInObject::new("globalThis").with_class(CLASS_GLOBAL));
}
