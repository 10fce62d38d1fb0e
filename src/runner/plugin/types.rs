//! Core types for the plugin architecture.
//!
//! [`EvalContext`] is the state every evaluation step and every native
//! function works against: the heap, the scope chain, the super-global
//! resolvers, the execution limits and the workers this context owns.
//! [`BuiltInObject`] is the declarative description a plugin registers and
//! the super-global scope later materializes on the heap.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::trace;
use uuid::Uuid;

use crate::runner::config::ContextConfig;
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::function_object::FunctionObject;
use crate::runner::ds::heap::{Heap, HeapCell, HeapConfig, HeapRef};
use crate::runner::ds::lex_env::{Binding, Scope, ScopeKind};
use crate::runner::ds::object::{JsArray, JsObject};
use crate::runner::ds::operations::type_conversion;
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::core_resolver::CorePluginResolver;
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::resolver::PluginResolver;
use crate::runner::plugin::super_global::SuperGlobalEnvironment;
use crate::runner::timer::TimerQueue;
use crate::runner::worker::registry::WorkerRegistry;
use crate::runner::worker::runtime::WorkerScope;

/// Function signature for built-in methods.
/// Native functions receive the evaluation context, `this` value, and arguments.
pub type NativeFn = fn(
    ctx: &mut EvalContext,
    this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType>;

/// Built-in object definition, e.g. `Math`, `console` or the `Worker` constructor.
pub struct BuiltInObject {
    /// Name of the global binding.
    pub name: String,

    /// Methods installed as properties of the materialized object.
    pub methods: HashMap<String, NativeFn>,

    /// Static properties.
    pub properties: HashMap<String, JsValue>,

    /// Behavior when called as a plain function.
    pub call: Option<NativeFn>,

    /// Behavior under `new`.
    pub constructor: Option<NativeFn>,

    /// Set for value bindings such as `NaN`, which materialize to the value itself.
    pub value: Option<JsValue>,

    /// Class of the materialized plain object, `"Object"` when unset.
    pub class_name: Option<String>,
}

impl BuiltInObject {
    /// Create a new built-in object with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        BuiltInObject {
            name: name.into(),
            methods: HashMap::new(),
            properties: HashMap::new(),
            call: None,
            constructor: None,
            value: None,
            class_name: None,
        }
    }

    /// Add a native method.
    pub fn add_method(mut self, name: impl Into<String>, func: NativeFn) -> Self {
        self.methods.insert(name.into(), func);
        self
    }

    /// Add a property.
    pub fn add_property(mut self, name: impl Into<String>, value: JsValue) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    /// Set the constructor function.
    pub fn with_constructor(mut self, constructor: NativeFn) -> Self {
        self.constructor = Some(constructor);
        self
    }

    /// Make the object callable without `new`.
    pub fn with_call(mut self, call: NativeFn) -> Self {
        self.call = Some(call);
        self
    }

    /// Bind the name to a plain value instead of an object.
    pub fn with_value(mut self, value: JsValue) -> Self {
        self.value = Some(value);
        self
    }

    /// Materialize as a plain object of `class_name`, whose prototype methods
    /// then apply to it.
    pub fn with_class(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    pub fn method(&self, name: &str) -> Option<NativeFn> {
        self.methods.get(name).copied()
    }

    /// Allocate the script-visible form of this built-in: a native function
    /// when it is callable or constructible, a plain object otherwise.
    pub fn materialize(&self, heap: &mut Heap) -> Result<JsValue, JErrorType> {
        if let Some(value) = &self.value {
            return Ok(value.clone());
        }

        let mut method_names: Vec<&String> = self.methods.keys().collect();
        method_names.sort();
        let mut members = Vec::with_capacity(self.methods.len() + self.properties.len());
        for name in method_names {
            let function = FunctionObject::new_native(name, self.methods[name], None);
            let function_ref = heap.allocate(HeapCell::Function(function))?;
            members.push((name.to_string(), JsValue::Function(function_ref)));
        }
        let mut property_names: Vec<&String> = self.properties.keys().collect();
        property_names.sort();
        for name in property_names {
            members.push((name.to_string(), self.properties[name].clone()));
        }

        match self.call.or(self.constructor) {
            Some(call) => {
                let mut function = FunctionObject::new_native(&self.name, call, self.constructor);
                for (name, value) in members {
                    function.properties.set(&name, value);
                }
                Ok(JsValue::Function(heap.allocate(HeapCell::Function(function))?))
            }
            None => {
                let mut object = match &self.class_name {
                    Some(class_name) => JsObject::with_class(class_name),
                    None => JsObject::new(),
                };
                for (name, value) in members {
                    object.properties.set(&name, value);
                }
                Ok(JsValue::Object(heap.allocate(HeapCell::Object(object))?))
            }
        }
    }
}

/// Execution context passed to native functions and threaded through evaluation.
pub struct EvalContext {
    pub heap: Heap,

    /// Identifies this context's heap in bridged values and function tokens.
    pub realm_id: Uuid,

    pub global_env: HeapRef,

    /// The innermost scope of the running code.
    pub lex_env: HeapRef,

    pub this_value: JsValue,

    pub super_global: SuperGlobalEnvironment,

    pub config: ContextConfig,

    /// Workers spawned by code running in this context.
    pub workers: WorkerRegistry,

    /// Present when this context is the global scope of a worker.
    pub worker_scope: Option<WorkerScope>,

    /// Pending `setTimeout`/`setInterval` callbacks.
    pub timers: TimerQueue,

    iterations: u64,
    call_depth: usize,
    cancel: Option<Arc<AtomicBool>>,
    pinned: HashMap<HeapRef, usize>,
}

impl EvalContext {
    pub fn new() -> Self {
        Self::with_config(ContextConfig::default())
    }

    /// Create a context with the core built-ins installed in its super-global scope.
    pub fn with_config(config: ContextConfig) -> Self {
        let mut heap = Heap::new(HeapConfig {
            max_cells: config.max_heap_cells,
        });
        let global_env = heap.allocate_root(HeapCell::Scope(Scope::new(ScopeKind::Global, None)));
        let mut super_global = SuperGlobalEnvironment::new();
        super_global.add_resolver(Box::new(CorePluginResolver::new(BuiltInRegistry::with_core())));
        super_global.add_resolver(Box::new(CorePluginResolver::named(
            "extensions",
            BuiltInRegistry::with_extensions(),
        )));
        let workers = WorkerRegistry::new(config.max_workers);

        EvalContext {
            heap,
            realm_id: Uuid::new_v4(),
            global_env,
            lex_env: global_env,
            this_value: JsValue::Undefined,
            super_global,
            config,
            workers,
            worker_scope: None,
            timers: TimerQueue::new(),
            iterations: 0,
            call_depth: 0,
            cancel: None,
            pinned: HashMap::new(),
        }
    }

    /// Create the global context of a worker: the worker loop limit applies,
    /// the worker-scope globals resolve, and `cancel` stops evaluation.
    pub fn for_worker(config: &ContextConfig, scope: WorkerScope, cancel: Arc<AtomicBool>) -> Self {
        let mut ctx = Self::with_config(config.for_worker());
        ctx.add_resolver(Box::new(CorePluginResolver::named(
            "worker_scope",
            BuiltInRegistry::with_worker_scope(),
        )));
        ctx.worker_scope = Some(scope);
        ctx.cancel = Some(cancel);
        ctx
    }

    /// Register an additional plugin resolver, queried after the existing ones.
    pub fn add_resolver(&mut self, resolver: Box<dyn PluginResolver>) {
        self.super_global.add_resolver(resolver);
    }

    pub fn is_worker(&self) -> bool {
        self.worker_scope.is_some()
    }

    // ---- bindings ----

    fn find_binding_scope(&self, name: &str) -> Result<Option<HeapRef>, JErrorType> {
        let mut current = Some(self.lex_env);
        while let Some(scope_ref) = current {
            let scope = self.heap.scope(scope_ref)?;
            if scope.bindings.contains_key(name) {
                return Ok(Some(scope_ref));
            }
            current = scope.parent;
        }
        Ok(None)
    }

    /// Resolve `name` through the scope chain and then the super-global scope.
    /// `None` means the name is not bound anywhere.
    pub fn lookup_binding(&mut self, name: &str) -> Result<Option<JsValue>, JErrorType> {
        if let Some(scope_ref) = self.find_binding_scope(name)? {
            let binding = &self.heap.scope(scope_ref)?.bindings[name];
            if !binding.initialized {
                return Err(uninitialized(name));
            }
            return Ok(Some(binding.value.clone()));
        }
        if self.super_global.has_name(name) {
            return self
                .super_global
                .resolve_binding(name, &mut self.heap)
                .map(Some);
        }
        Ok(None)
    }

    pub fn get_binding(&mut self, name: &str) -> Result<JsValue, JErrorType> {
        self.lookup_binding(name)?
            .ok_or_else(|| JErrorType::ReferenceError(format!("{} is not defined", name)))
    }

    /// Assign to an existing binding. Assigning to an undeclared name creates a global.
    pub fn set_binding(&mut self, name: &str, value: JsValue) -> Result<(), JErrorType> {
        match self.find_binding_scope(name)? {
            Some(scope_ref) => {
                let scope = self.heap.scope_mut(scope_ref)?;
                match scope.bindings.get_mut(name) {
                    Some(binding) if !binding.initialized => Err(uninitialized(name)),
                    Some(binding) if !binding.mutable => Err(JErrorType::TypeError(
                        "Assignment to constant variable.".to_string(),
                    )),
                    Some(binding) => {
                        binding.value = value;
                        Ok(())
                    }
                    None => Ok(()),
                }
            }
            None => {
                let global = self.heap.scope_mut(self.global_env)?;
                global.bindings.insert(name.to_string(), Binding::var(value));
                Ok(())
            }
        }
    }

    /// Whether the global scope itself (not the super-global) binds `name`.
    pub fn has_global_binding(&self, name: &str) -> Result<bool, JErrorType> {
        Ok(self.heap.scope(self.global_env)?.bindings.contains_key(name))
    }

    /// The global scope's own binding for `name`, ignoring the dead zone.
    pub fn global_binding_value(&self, name: &str) -> Result<Option<JsValue>, JErrorType> {
        Ok(self
            .heap
            .scope(self.global_env)?
            .bindings
            .get(name)
            .filter(|b| b.initialized)
            .map(|b| b.value.clone()))
    }

    // ---- global object ----

    /// `globalThis[name]`: the global scope's binding, then the super-global.
    pub fn global_property(&mut self, name: &str) -> Result<JsValue, JErrorType> {
        if let Some(value) = self.global_binding_value(name)? {
            return Ok(value);
        }
        if !self.has_global_binding(name)? && self.super_global.has_name(name) {
            return self.super_global.resolve_binding(name, &mut self.heap);
        }
        Ok(JsValue::Undefined)
    }

    /// `globalThis[name] = value`, which always lands in the global scope.
    pub fn set_global_property(&mut self, name: &str, value: JsValue) -> Result<(), JErrorType> {
        let global = self.heap.scope_mut(self.global_env)?;
        match global.bindings.get_mut(name) {
            Some(binding) if !binding.initialized => Err(uninitialized(name)),
            Some(binding) if !binding.mutable => Err(JErrorType::TypeError(
                "Assignment to constant variable.".to_string(),
            )),
            Some(binding) => {
                binding.value = value;
                Ok(())
            }
            None => {
                global.bindings.insert(name.to_string(), Binding::var(value));
                Ok(())
            }
        }
    }

    pub fn has_global_property(&self, name: &str) -> Result<bool, JErrorType> {
        Ok(self.has_global_binding(name)? || self.super_global.has_name(name))
    }

    /// `delete globalThis[name]`. Only `var`-style bindings can be deleted;
    /// built-ins stay resolvable.
    pub fn delete_global_property(&mut self, name: &str) -> Result<bool, JErrorType> {
        let global = self.heap.scope_mut(self.global_env)?;
        match global.bindings.get(name) {
            Some(binding) if binding.lexical => Ok(false),
            Some(_) => {
                global.bindings.remove(name);
                Ok(true)
            }
            None => Ok(true),
        }
    }

    /// Names of the initialized global bindings, sorted.
    pub fn global_keys(&self) -> Result<Vec<String>, JErrorType> {
        let mut keys: Vec<String> = self
            .heap
            .scope(self.global_env)?
            .bindings
            .iter()
            .filter(|(_, b)| b.initialized)
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    /// Insert (or replace) a binding in `scope`.
    pub fn declare_binding(&mut self, scope: HeapRef, name: &str, binding: Binding) -> Result<(), JErrorType> {
        self.heap
            .scope_mut(scope)?
            .bindings
            .insert(name.to_string(), binding);
        Ok(())
    }

    /// Declare a `var` in `scope`, keeping any existing value.
    pub fn declare_var(&mut self, scope: HeapRef, name: &str) -> Result<(), JErrorType> {
        self.heap
            .scope_mut(scope)?
            .bindings
            .entry(name.to_string())
            .or_insert_with(|| Binding::var(JsValue::Undefined));
        Ok(())
    }

    /// Initialize a `let`/`const` of the current scope, ending its dead zone.
    pub fn initialize_binding(&mut self, name: &str, value: JsValue) -> Result<(), JErrorType> {
        let scope = self.heap.scope_mut(self.lex_env)?;
        match scope.bindings.get_mut(name) {
            Some(binding) => {
                binding.value = value;
                binding.initialized = true;
            }
            None => {
                let mut binding = Binding::uninitialized(false);
                binding.value = value;
                binding.initialized = true;
                scope.bindings.insert(name.to_string(), binding);
            }
        }
        Ok(())
    }

    /// Allocate a scope whose parent is the current one and make it current.
    pub fn push_scope(&mut self, kind: ScopeKind) -> Result<HeapRef, JErrorType> {
        let scope_ref = self.new_scope(kind, self.lex_env)?;
        self.lex_env = scope_ref;
        Ok(scope_ref)
    }

    pub fn new_scope(&mut self, kind: ScopeKind, parent: HeapRef) -> Result<HeapRef, JErrorType> {
        self.heap
            .allocate(HeapCell::Scope(Scope::new(kind, Some(parent))))
    }

    // ---- limits ----

    pub fn check_cancelled(&self) -> Result<(), JErrorType> {
        match &self.cancel {
            Some(cancel) if cancel.load(Ordering::Relaxed) => Err(JErrorType::Terminated),
            _ => Ok(()),
        }
    }

    /// Count one loop iteration against the budget and observe cancellation.
    pub fn tick_loop(&mut self) -> Result<(), JErrorType> {
        self.check_cancelled()?;
        self.iterations += 1;
        match self.config.max_loop_iterations {
            Some(max) if self.iterations > max => Err(JErrorType::ResourceExceeded(format!(
                "Loop iteration limit of {} exceeded",
                max
            ))),
            _ => Ok(()),
        }
    }

    pub fn enter_call(&mut self) -> Result<(), JErrorType> {
        self.check_cancelled()?;
        if self.call_depth >= self.config.max_call_depth {
            return Err(JErrorType::RangeError(
                "Maximum call stack size exceeded".to_string(),
            ));
        }
        self.call_depth += 1;
        Ok(())
    }

    pub fn exit_call(&mut self) {
        self.call_depth = self.call_depth.saturating_sub(1);
    }

    /// Start a fresh loop budget, at every host entry and worker dispatch.
    pub fn reset_budget(&mut self) {
        self.iterations = 0;
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    // ---- allocation ----

    pub fn alloc(&mut self, cell: HeapCell) -> Result<HeapRef, JErrorType> {
        self.heap.allocate(cell)
    }

    pub fn new_object(&mut self) -> Result<JsValue, JErrorType> {
        Ok(JsValue::Object(self.alloc(HeapCell::Object(JsObject::new()))?))
    }

    /// Allocate a plain object with the given properties, in order.
    pub fn new_object_with(&mut self, entries: Vec<(&str, JsValue)>) -> Result<JsValue, JErrorType> {
        let mut object = JsObject::new();
        for (key, value) in entries {
            object.properties.set(key, value);
        }
        Ok(JsValue::Object(self.alloc(HeapCell::Object(object))?))
    }

    pub fn new_array(&mut self, elements: Vec<JsValue>) -> Result<JsValue, JErrorType> {
        Ok(JsValue::Array(self.alloc(HeapCell::Array(JsArray::new(elements)))?))
    }

    pub fn new_error(&mut self, class_name: &str, message: &str) -> Result<JsValue, JErrorType> {
        let mut object = JsObject::with_class(class_name);
        object.properties.set("name", JsValue::from(class_name));
        object.properties.set("message", JsValue::from(message));
        Ok(JsValue::Object(self.alloc(HeapCell::Object(object))?))
    }

    pub fn new_native_function(&mut self, name: &str, call: NativeFn) -> Result<JsValue, JErrorType> {
        let function = FunctionObject::new_native(name, call, None);
        Ok(JsValue::Function(self.alloc(HeapCell::Function(function))?))
    }

    /// The value a `catch` clause binds for `error`.
    pub fn error_to_value(&mut self, error: JErrorType) -> Result<JsValue, JErrorType> {
        match error {
            JErrorType::Thrown(value) => Ok(value),
            other => {
                let class_name = other.class_name().unwrap_or("Error");
                let message = other.message();
                self.new_error(class_name, &message)
            }
        }
    }

    /// Convert an error leaving script code into the form the host receives.
    /// Thrown `Error` objects of the standard classes map to typed variants.
    pub fn uncaught_error(&self, error: JErrorType) -> JErrorType {
        let value = match error {
            JErrorType::Thrown(value) => value,
            other => return other,
        };
        if let JsValue::Object(object_ref) = &value {
            if let Ok(object) = self.heap.object(*object_ref) {
                if object.is_error() {
                    let message = match object.properties.get("message") {
                        Some(m) => self.to_string(m).unwrap_or_default(),
                        None => String::new(),
                    };
                    let name = match object.properties.get("name") {
                        Some(JsValue::String(name)) => name.as_str(),
                        _ => object.class_name.as_str(),
                    };
                    match name {
                        "TypeError" => return JErrorType::TypeError(message),
                        "ReferenceError" => return JErrorType::ReferenceError(message),
                        "RangeError" => return JErrorType::RangeError(message),
                        _ => {}
                    }
                }
            }
        }
        JErrorType::Uncaught(self.to_string(&value).unwrap_or_else(|_| value.to_string()))
    }

    // ---- conversions ----

    pub fn to_number(&self, value: &JsValue) -> Result<f64, JErrorType> {
        type_conversion::to_number(&self.heap, value)
    }

    pub fn to_string(&self, value: &JsValue) -> Result<String, JErrorType> {
        type_conversion::to_string(&self.heap, value)
    }

    pub fn to_property_key(&self, value: &JsValue) -> Result<String, JErrorType> {
        type_conversion::to_property_key(&self.heap, value)
    }

    /// A method shared by every value of `class_name` (`"Array"`, `"String"`, ...).
    pub fn prototype_method(&mut self, class_name: &str, name: &str) -> Result<Option<JsValue>, JErrorType> {
        self.super_global
            .resolve_prototype_method(class_name, name, &mut self.heap)
    }

    // ---- garbage collection ----

    /// Keep `heap_ref` alive across collections until a matching [`unpin`](Self::unpin).
    pub fn pin(&mut self, heap_ref: HeapRef) {
        *self.pinned.entry(heap_ref).or_insert(0) += 1;
    }

    /// Returns false when `heap_ref` was not pinned.
    pub fn unpin(&mut self, heap_ref: HeapRef) -> bool {
        match self.pinned.get_mut(&heap_ref) {
            Some(count) if *count > 1 => {
                *count -= 1;
                true
            }
            Some(_) => {
                self.pinned.remove(&heap_ref);
                true
            }
            None => false,
        }
    }

    fn gc_roots(&self) -> Vec<HeapRef> {
        let mut roots = vec![self.global_env, self.lex_env];
        roots.extend(self.this_value.heap_ref());
        roots.extend(self.super_global.roots());
        roots.extend(self.pinned.keys().copied());
        roots.extend(self.workers.roots());
        roots.extend(self.timers.roots());
        if let Some(scope) = &self.worker_scope {
            roots.extend(scope.roots());
        }
        roots
    }

    /// Collect unreachable cells. Must only run at a safe point, where no
    /// evaluation frame holds handles outside the roots.
    pub fn collect_garbage(&mut self) -> usize {
        let roots = self.gc_roots();
        let freed = self.heap.collect(roots);
        trace!("realm {} collected {} cells, {} live", self.realm_id, freed, self.heap.len());
        freed
    }

    /// Collect only once enough allocations happened since the last collection.
    pub fn maybe_collect_garbage(&mut self) -> usize {
        if self.heap.allocations_since_gc() >= self.config.gc_threshold {
            self.collect_garbage()
        } else {
            0
        }
    }
}

impl Default for EvalContext {
    fn default() -> Self {
        Self::new()
    }
}

fn uninitialized(name: &str) -> JErrorType {
    JErrorType::ReferenceError(format!("Cannot access '{}' before initialization", name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assignment_to_undeclared_creates_global() {
        let mut ctx = EvalContext::new();
        ctx.set_binding("x", JsValue::Number(1.0)).unwrap();
        assert_eq!(ctx.get_binding("x").unwrap(), JsValue::Number(1.0));
        assert!(ctx.has_global_binding("x").unwrap());
    }

    #[test]
    fn test_unbound_name_is_reference_error() {
        let mut ctx = EvalContext::new();
        assert_eq!(
            ctx.get_binding("nope"),
            Err(JErrorType::ReferenceError("nope is not defined".to_string()))
        );
    }

    #[test]
    fn test_dead_zone_and_const() {
        let mut ctx = EvalContext::new();
        let global = ctx.global_env;
        ctx.declare_binding(global, "c", Binding::uninitialized(true)).unwrap();
        assert!(matches!(ctx.get_binding("c"), Err(JErrorType::ReferenceError(_))));
        ctx.initialize_binding("c", JsValue::Number(2.0)).unwrap();
        assert_eq!(ctx.get_binding("c").unwrap(), JsValue::Number(2.0));
        assert_eq!(
            ctx.set_binding("c", JsValue::Null),
            Err(JErrorType::TypeError("Assignment to constant variable.".to_string()))
        );
    }

    #[test]
    fn test_super_global_resolves_and_is_shadowed() {
        let mut ctx = EvalContext::new();
        assert!(matches!(ctx.get_binding("Math").unwrap(), JsValue::Object(_)));
        ctx.set_binding("Math", JsValue::Number(3.0)).unwrap();
        assert_eq!(ctx.get_binding("Math").unwrap(), JsValue::Number(3.0));
    }

    #[test]
    fn test_loop_budget() {
        let config = ContextConfig::default().with_max_loop_iterations(Some(2));
        let mut ctx = EvalContext::with_config(config);
        ctx.tick_loop().unwrap();
        ctx.tick_loop().unwrap();
        assert!(matches!(ctx.tick_loop(), Err(JErrorType::ResourceExceeded(_))));
        ctx.reset_budget();
        assert!(ctx.tick_loop().is_ok());
    }

    #[test]
    fn test_pinned_values_survive_collection() {
        let mut ctx = EvalContext::new();
        let kept = ctx.new_object().unwrap().heap_ref().unwrap();
        let dropped = ctx.new_object().unwrap().heap_ref().unwrap();
        ctx.pin(kept);
        ctx.collect_garbage();
        assert!(ctx.heap.is_live(kept));
        assert!(!ctx.heap.is_live(dropped));
        assert!(ctx.unpin(kept));
        assert!(!ctx.unpin(kept));
    }

    #[test]
    fn test_thrown_type_error_maps_to_typed_variant() {
        let mut ctx = EvalContext::new();
        let error = ctx.new_error("TypeError", "bad").unwrap();
        assert_eq!(
            ctx.uncaught_error(JErrorType::Thrown(error)),
            JErrorType::TypeError("bad".to_string())
        );
        assert_eq!(
            ctx.uncaught_error(JErrorType::Thrown(JsValue::Number(4.0))),
            JErrorType::Uncaught("4".to_string())
        );
    }
}
