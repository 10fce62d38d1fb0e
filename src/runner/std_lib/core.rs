//! Registration of the built-in sets a context installs.

use crate::runner::plugin::registry::BuiltInRegistry;

use super::array;
use super::console;
use super::crypto;
use super::encoding;
use super::error;
use super::global;
use super::math;
use super::number;
use super::object;
use super::string;
use super::timers;
use super::worker;
use super::worker_scope;

/// Register the built-ins every context sees. `Object` goes first since the
/// other prototypes fall back to its methods.
pub fn register_core_builtins(registry: &mut BuiltInRegistry) {
    object::register(registry);
    array::register(registry);
    string::register(registry);
    number::register(registry);
    math::register(registry);
    error::register(registry);
    console::register(registry);
    worker::register(registry);
}

/// Register the host-environment globals: encodings, hashing, randomness,
/// timers and `globalThis`.
pub fn register_extension_builtins(registry: &mut BuiltInRegistry) {
    encoding::register(registry);
    crypto::register(registry);
    timers::register(registry);
    global::register(registry);
}

/// Register the globals only a worker's own scope provides.
pub fn register_worker_scope_builtins(registry: &mut BuiltInRegistry) {
    worker_scope::register(registry);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_and_worker_scope_are_disjoint() {
        let mut core = BuiltInRegistry::new();
        register_core_builtins(&mut core);
        let mut scope = BuiltInRegistry::new();
        register_worker_scope_builtins(&mut scope);

        assert!(core.has_object("Worker"));
        assert!(core.has_object("Math"));
        assert!(!core.has_object("postMessage"));
        assert!(scope.has_object("postMessage"));
        assert!(scope.has_object("self"));
        assert!(core.get_prototype_method("Worker", "postMessage").is_some());
    }

    #[test]
    fn test_extensions_do_not_shadow_core() {
        let mut core = BuiltInRegistry::new();
        register_core_builtins(&mut core);
        let mut extensions = BuiltInRegistry::new();
        register_extension_builtins(&mut extensions);

        for name in ["btoa", "sha256", "CryptoUtils", "crypto", "setTimeout", "globalThis"] {
            assert!(extensions.has_object(name), "missing {}", name);
            assert!(!core.has_object(name), "{} registered twice", name);
        }
        assert!(extensions.get_prototype_method("Hash", "digest").is_some());
        assert!(extensions.get_prototype_method("Hmac", "update").is_some());
    }
}
