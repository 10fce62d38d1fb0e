//! Core plugin resolver: wraps a `BuiltInRegistry` as a `PluginResolver`.
//!
//! This makes all built-in objects (Math, console, Worker, etc.) available
//! through the super-global scope's lazy resolution mechanism.

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::heap::Heap;
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::resolver::PluginResolver;
use crate::runner::plugin::types::NativeFn;

/// Wraps a `BuiltInRegistry` as a `PluginResolver`.
///
/// When the super-global scope queries for a name like `"Math"`, the
/// registered [`BuiltInObject`](super::types::BuiltInObject) is materialized
/// as a real heap object whose methods are native functions.
pub struct CorePluginResolver {
    name: String,
    registry: BuiltInRegistry,
}

impl CorePluginResolver {
    pub fn new(registry: BuiltInRegistry) -> Self {
        Self::named("core", registry)
    }

    pub fn named(name: &str, registry: BuiltInRegistry) -> Self {
        CorePluginResolver {
            name: name.to_string(),
            registry,
        }
    }

    pub fn registry(&self) -> &BuiltInRegistry {
        &self.registry
    }
}

impl PluginResolver for CorePluginResolver {
    fn has_binding(&self, name: &str) -> bool {
        self.registry.has_object(name)
    }

    fn resolve(&self, name: &str, heap: &mut Heap) -> Result<JsValue, JErrorType> {
        match self.registry.get_object(name) {
            Some(builtin) => builtin.materialize(heap),
            None => Err(JErrorType::ReferenceError(format!("{} is not defined", name))),
        }
    }

    fn prototype_method(&self, class_name: &str, method_name: &str) -> Option<NativeFn> {
        self.registry.get_prototype_method(class_name, method_name)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
