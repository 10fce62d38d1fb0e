use std::fmt;
use std::rc::Rc;

use crate::parser::ast::FunctionData;
use crate::runner::ds::heap::HeapRef;
use crate::runner::ds::object::PropertyMap;
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::types::NativeFn;

/// A closure: the function's AST plus the scope it was created in.
pub struct ScriptFunction {
    pub data: Rc<FunctionData>,
    pub scope: HeapRef,
    /// `this` captured at creation, only for arrow functions.
    pub lexical_this: Option<JsValue>,
    /// Named function expressions see their own name inside the body.
    pub binds_own_name: bool,
}

pub struct NativeFunction {
    pub name: String,
    pub call: NativeFn,
    pub construct: Option<NativeFn>,
}

pub enum FunctionKind {
    Script(ScriptFunction),
    Native(NativeFunction),
}

pub struct FunctionObject {
    pub kind: FunctionKind,
    pub properties: PropertyMap,
}

impl FunctionObject {
    pub fn new_script(script: ScriptFunction) -> Self {
        FunctionObject {
            kind: FunctionKind::Script(script),
            properties: PropertyMap::new(),
        }
    }

    pub fn new_native(name: &str, call: NativeFn, construct: Option<NativeFn>) -> Self {
        FunctionObject {
            kind: FunctionKind::Native(NativeFunction {
                name: name.to_string(),
                call,
                construct,
            }),
            properties: PropertyMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        match &self.kind {
            FunctionKind::Script(s) => s.data.name(),
            FunctionKind::Native(n) => &n.name,
        }
    }

    /// Number of declared parameters, as reported by `fn.length`.
    pub fn arity(&self) -> usize {
        match &self.kind {
            FunctionKind::Script(s) => s
                .data
                .params
                .iter()
                .take_while(|p| p.default_value.is_none())
                .count(),
            FunctionKind::Native(_) => 0,
        }
    }

    pub fn is_arrow(&self) -> bool {
        matches!(&self.kind, FunctionKind::Script(s) if s.data.is_arrow)
    }
}

impl fmt::Debug for FunctionObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FunctionKind::Script(s) => write!(f, "ScriptFunction({:?})", s.data.name()),
            FunctionKind::Native(n) => write!(f, "NativeFunction({:?})", n.name),
        }
    }
}
