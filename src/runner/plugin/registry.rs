//! Built-in registry: the named objects and per-class prototype methods a
//! resolver can hand to the super-global scope.

use std::collections::HashMap;

use super::types::{BuiltInObject, NativeFn};
use crate::runner::std_lib::{register_core_builtins, register_extension_builtins, register_worker_scope_builtins};

/// Registry for built-in objects.
pub struct BuiltInRegistry {
    /// Global bindings, keyed by name.
    objects: HashMap<String, BuiltInObject>,

    /// Methods shared by every value of a class, keyed by class name
    /// (`"Array"`, `"String"`, `"Worker"`, ...).
    prototypes: HashMap<String, BuiltInObject>,
}

impl BuiltInRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        BuiltInRegistry {
            objects: HashMap::new(),
            prototypes: HashMap::new(),
        }
    }

    /// Create a registry with the core built-ins every context sees.
    pub fn with_core() -> Self {
        let mut registry = Self::new();
        register_core_builtins(&mut registry);
        registry
    }

    /// Create a registry with the host-environment extensions: encodings,
    /// hashing, randomness, timers and `globalThis`.
    pub fn with_extensions() -> Self {
        let mut registry = Self::new();
        register_extension_builtins(&mut registry);
        registry
    }

    /// Create a registry with the globals only a worker's scope provides.
    pub fn with_worker_scope() -> Self {
        let mut registry = Self::new();
        register_worker_scope_builtins(&mut registry);
        registry
    }

    /// Register a built-in object (programmatic API).
    pub fn register_object(&mut self, obj: BuiltInObject) {
        self.objects.insert(obj.name.clone(), obj);
    }

    /// Register the prototype methods of a class. Registering the same class
    /// twice merges the method sets, later methods overriding earlier ones.
    pub fn register_prototype(&mut self, proto: BuiltInObject) {
        match self.prototypes.get_mut(&proto.name) {
            Some(existing) => existing.methods.extend(proto.methods),
            None => {
                self.prototypes.insert(proto.name.clone(), proto);
            }
        }
    }

    /// Get a registered object by name.
    pub fn get_object(&self, name: &str) -> Option<&BuiltInObject> {
        self.objects.get(name)
    }

    /// Get a mutable reference to a registered object.
    pub fn get_object_mut(&mut self, name: &str) -> Option<&mut BuiltInObject> {
        self.objects.get_mut(name)
    }

    /// Override (or add) a prototype method.
    pub fn override_prototype_method(&mut self, class_name: &str, method: &str, func: NativeFn) {
        self.prototypes
            .entry(class_name.to_string())
            .or_insert_with(|| BuiltInObject::new(class_name))
            .methods
            .insert(method.to_string(), func);
    }

    pub fn get_prototype_method(&self, class_name: &str, method: &str) -> Option<NativeFn> {
        self.prototypes
            .get(class_name)
            .and_then(|proto| proto.method(method))
    }

    /// Check if an object exists in the registry.
    pub fn has_object(&self, name: &str) -> bool {
        self.objects.contains_key(name)
    }

    /// Get list of all registered object names.
    pub fn object_names(&self) -> Vec<&String> {
        self.objects.keys().collect()
    }
}

impl Default for BuiltInRegistry {
    fn default() -> Self {
        Self::with_core()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_registry_contents() {
        let registry = BuiltInRegistry::with_core();
        for name in ["Worker", "Math", "console", "Array", "Object", "undefined", "NaN"] {
            assert!(registry.has_object(name), "missing {}", name);
        }
        assert!(!registry.has_object("postMessage"));
        assert!(registry.get_prototype_method("Array", "push").is_some());
        assert!(registry.get_prototype_method("String", "slice").is_some());
        assert!(registry.get_prototype_method("Worker", "postMessage").is_some());
        assert!(registry.get_prototype_method("Array", "nope").is_none());
    }

    #[test]
    fn test_worker_scope_registry_contents() {
        let registry = BuiltInRegistry::with_worker_scope();
        for name in ["postMessage", "close", "self", "addEventListener", "removeEventListener"] {
            assert!(registry.has_object(name), "missing {}", name);
        }
        assert!(!registry.has_object("Math"));
    }
}
