//! Super-global environment: the bottom of the scope chain.
//!
//! This environment sits below the global scope and lazily resolves
//! built-in and plugin-provided objects on first access. Objects are
//! cached after first resolution so each name is materialized at most once
//! per context, and the cache is a garbage-collection root.
//!
//! ## How It Works
//!
//! ```text
//! JavaScript: Math.abs(-5)
//!      ↓
//! 1. Check local scope → not found
//! 2. Check outer scopes → not found
//! 3. Check global scope → not found
//! 4. Check super-global → "Math" found!
//!      ↓
//! 5. Query resolvers: Does anyone provide "Math"?
//! 6. CorePluginResolver says "yes" and materializes it on the heap
//! 7. Cache the result
//! ```
//!
//! Methods of primitive and array values (`"ab".slice`, `[].push`) go through
//! the same resolvers via [`PluginResolver::prototype_method`] and are cached
//! as native function objects, so `[].push === [1].push`.
//!
//! ## Example
//!
//! ```
//! use jscore::runner::ds::error::JErrorType;
//! use jscore::runner::ds::heap::{Heap, HeapConfig};
//! use jscore::runner::ds::value::JsValue;
//! use jscore::runner::plugin::resolver::PluginResolver;
//! use jscore::runner::plugin::super_global::SuperGlobalEnvironment;
//!
//! struct AnswerPlugin;
//!
//! impl PluginResolver for AnswerPlugin {
//!     fn has_binding(&self, name: &str) -> bool {
//!         name == "ANSWER"
//!     }
//!
//!     fn resolve(&self, _name: &str, _heap: &mut Heap) -> Result<JsValue, JErrorType> {
//!         Ok(JsValue::Number(42.0))
//!     }
//!
//!     fn name(&self) -> &str {
//!         "answer"
//!     }
//! }
//!
//! let mut heap = Heap::new(HeapConfig::unlimited());
//! let mut sg = SuperGlobalEnvironment::new();
//! sg.add_resolver(Box::new(AnswerPlugin));
//! assert!(sg.has_name("ANSWER"));
//! assert_eq!(sg.resolve_binding("ANSWER", &mut heap).unwrap(), JsValue::Number(42.0));
//! ```

use std::collections::HashMap;

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::function_object::FunctionObject;
use crate::runner::ds::heap::{Heap, HeapCell, HeapRef};
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::resolver::PluginResolver;

/// The super-global environment for lazy resolution of built-in objects.
///
/// Resolution order for a name:
/// 1. Check if it's in the cache → return cached value
/// 2. Query each resolver's `has_binding()` in registration order
/// 3. First resolver that claims the name wins
/// 4. Call resolver's `resolve()` to materialize the value
/// 5. Cache the value and resolver index
///
/// Script code can shadow these names with ordinary bindings but cannot
/// replace them here.
pub struct SuperGlobalEnvironment {
    /// Registered plugin resolvers, queried in order.
    resolvers: Vec<Box<dyn PluginResolver>>,
    /// Cache of already-resolved bindings (name → value).
    cache: HashMap<String, JsValue>,
    /// Cache of which resolver index owns which name.
    resolver_map: HashMap<String, usize>,
    /// Materialized prototype methods, keyed by (class, method).
    method_cache: HashMap<(String, String), JsValue>,
}

impl SuperGlobalEnvironment {
    pub fn new() -> Self {
        SuperGlobalEnvironment {
            resolvers: Vec::new(),
            cache: HashMap::new(),
            resolver_map: HashMap::new(),
            method_cache: HashMap::new(),
        }
    }

    /// Register a plugin resolver. Resolvers are queried in registration order.
    pub fn add_resolver(&mut self, resolver: Box<dyn PluginResolver>) {
        self.resolvers.push(resolver);
    }

    /// Find which resolver (if any) provides the given name.
    fn find_resolver_index(&self, name: &str) -> Option<usize> {
        if let Some(&idx) = self.resolver_map.get(name) {
            return Some(idx);
        }
        self.resolvers.iter().position(|r| r.has_binding(name))
    }

    /// Check if any resolver provides the given name.
    pub fn has_name(&self, name: &str) -> bool {
        self.cache.contains_key(name) || self.find_resolver_index(name).is_some()
    }

    /// The value of `name` if it has already been resolved.
    pub fn cached(&self, name: &str) -> Option<&JsValue> {
        self.cache.get(name)
    }

    /// Resolve a name, caching the result.
    pub fn resolve_binding(&mut self, name: &str, heap: &mut Heap) -> Result<JsValue, JErrorType> {
        if let Some(val) = self.cache.get(name) {
            return Ok(val.clone());
        }

        match self.find_resolver_index(name) {
            Some(idx) => {
                let value = self.resolvers[idx].resolve(name, heap)?;
                self.cache.insert(name.to_string(), value.clone());
                self.resolver_map.insert(name.to_string(), idx);
                Ok(value)
            }
            None => Err(JErrorType::ReferenceError(format!("{} is not defined", name))),
        }
    }

    /// Resolve a prototype method as a callable value, caching it.
    pub fn resolve_prototype_method(
        &mut self,
        class_name: &str,
        method_name: &str,
        heap: &mut Heap,
    ) -> Result<Option<JsValue>, JErrorType> {
        let key = (class_name.to_string(), method_name.to_string());
        if let Some(val) = self.method_cache.get(&key) {
            return Ok(Some(val.clone()));
        }
        let native = self
            .resolvers
            .iter()
            .find_map(|r| r.prototype_method(class_name, method_name));
        match native {
            Some(call) => {
                let function = FunctionObject::new_native(method_name, call, None);
                let value = JsValue::Function(heap.allocate(HeapCell::Function(function))?);
                self.method_cache.insert(key, value.clone());
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Heap cells held by the caches.
    pub fn roots(&self) -> impl Iterator<Item = HeapRef> + '_ {
        self.cache
            .values()
            .chain(self.method_cache.values())
            .filter_map(|v| v.heap_ref())
    }

    /// Get a reference to the resolvers (for inspection/testing).
    pub fn resolvers(&self) -> &[Box<dyn PluginResolver>] {
        &self.resolvers
    }
}

impl Default for SuperGlobalEnvironment {
    fn default() -> Self {
        Self::new()
    }
}
