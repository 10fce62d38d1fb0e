use std::fmt;
use std::fmt::{Display, Formatter};

use crate::runner::ds::heap::HeapRef;
use crate::runner::ds::operations::type_conversion::{number_to_string, TYPE_STR_NULL, TYPE_STR_UNDEFINED};
use crate::runner::worker::WorkerId;

/// A script value. Composite values are handles into the owning context's heap,
/// so cloning a `JsValue` aliases the underlying object.
///
/// The derived `PartialEq` is JavaScript's `===`: numbers compare as IEEE-754
/// doubles (`NaN !== NaN`, `0 === -0`) and composites compare by identity.
#[derive(Debug, Clone, PartialEq)]
pub enum JsValue {
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    Object(HeapRef),
    Array(HeapRef),
    Function(HeapRef),
    Worker(WorkerId),
}

impl JsValue {
    pub fn is_nullish(&self) -> bool {
        matches!(self, JsValue::Undefined | JsValue::Null)
    }

    pub fn is_function(&self) -> bool {
        matches!(self, JsValue::Function(_))
    }

    /// The heap cell behind a composite value.
    pub fn heap_ref(&self) -> Option<HeapRef> {
        match self {
            JsValue::Object(r) | JsValue::Array(r) | JsValue::Function(r) => Some(*r),
            _ => None,
        }
    }
}

impl Display for JsValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            JsValue::Undefined => write!(f, "{}", TYPE_STR_UNDEFINED),
            JsValue::Null => write!(f, "{}", TYPE_STR_NULL),
            JsValue::Boolean(b) => write!(f, "{}", b),
            JsValue::Number(n) => write!(f, "{}", number_to_string(*n)),
            JsValue::String(s) => write!(f, "{:?}", s),
            JsValue::Object(_) => write!(f, "[object Object]"),
            JsValue::Array(_) => write!(f, "[object Array]"),
            JsValue::Function(_) => write!(f, "[object Function]"),
            JsValue::Worker(id) => write!(f, "[object Worker {}]", id),
        }
    }
}

impl From<f64> for JsValue {
    fn from(n: f64) -> Self {
        JsValue::Number(n)
    }
}

impl From<bool> for JsValue {
    fn from(b: bool) -> Self {
        JsValue::Boolean(b)
    }
}

impl From<&str> for JsValue {
    fn from(s: &str) -> Self {
        JsValue::String(s.to_string())
    }
}

impl From<String> for JsValue {
    fn from(s: String) -> Self {
        JsValue::String(s)
    }
}
