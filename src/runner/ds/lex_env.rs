use std::collections::HashMap;

use crate::runner::ds::heap::HeapRef;
use crate::runner::ds::value::JsValue;

#[derive(Debug, Clone)]
pub struct Binding {
    pub value: JsValue,
    pub mutable: bool,
    /// `false` while a `let`/`const` is in its temporal dead zone.
    pub initialized: bool,
    /// Declared with `let`/`const` (as opposed to `var`/function/implicit global).
    pub lexical: bool,
}

impl Binding {
    pub fn var(value: JsValue) -> Self {
        Binding {
            value,
            mutable: true,
            initialized: true,
            lexical: false,
        }
    }

    pub fn uninitialized(is_const: bool) -> Self {
        Binding {
            value: JsValue::Undefined,
            mutable: !is_const,
            initialized: false,
            lexical: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    Function,
    Block,
}

/// One link of the scope chain. Scopes live in the heap so closures can keep them alive.
#[derive(Debug, Clone)]
pub struct Scope {
    pub bindings: HashMap<String, Binding>,
    pub parent: Option<HeapRef>,
    pub kind: ScopeKind,
}

impl Scope {
    pub fn new(kind: ScopeKind, parent: Option<HeapRef>) -> Self {
        Scope {
            bindings: HashMap::new(),
            parent,
            kind,
        }
    }

    /// `var` and function declarations land in the nearest function or global scope.
    pub fn is_var_scope(&self) -> bool {
        self.kind != ScopeKind::Block
    }
}
