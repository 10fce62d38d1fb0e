//! Host bridge: conversion between heap-backed [`JsValue`]s and plain,
//! `Send` [`HostValue`]s.
//!
//! Composite host values remember the object they came from through an
//! [`ObjectIdentity`], so equality is reference equality and aliasing survives
//! a round trip. The same conversion in [`BridgeMode::Clone`] is the
//! structured clone used for worker messages.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::heap::{HeapCell, HeapRef};
use crate::runner::ds::object::{JsArray, JsObject};
use crate::runner::ds::operations::type_conversion::number_to_string;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::function::describe_value;
use crate::runner::plugin::types::EvalContext;
use crate::runner::stack;
use crate::runner::worker::WorkerId;

lazy_static! {
    /// The realm of composite values the host builds itself.
    static ref HOST_REALM: Uuid = Uuid::new_v4();
}

static NEXT_HOST_SLOT: AtomicU64 = AtomicU64::new(1);

/// Which heap (or the host) an object came from, and which object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectIdentity {
    realm: Uuid,
    slot: u64,
}

impl ObjectIdentity {
    /// A new identity for an object created on the host side.
    pub fn fresh() -> Self {
        ObjectIdentity {
            realm: *HOST_REALM,
            slot: NEXT_HOST_SLOT.fetch_add(1, Ordering::Relaxed),
        }
    }

    fn of(realm: Uuid, heap_ref: HeapRef) -> Self {
        ObjectIdentity {
            realm,
            slot: heap_ref.slot_id(),
        }
    }

    pub fn realm(&self) -> Uuid {
        self.realm
    }

    /// The heap cell this identity names, when it belongs to `realm`.
    fn heap_ref_in(&self, realm: Uuid) -> Option<HeapRef> {
        if self.realm == realm {
            Some(HeapRef::from_slot_id(self.slot))
        } else {
            None
        }
    }
}

/// A snapshot of a script object: its own enumerable properties, in order.
#[derive(Debug, Clone)]
pub struct HostObject {
    identity: ObjectIdentity,
    entries: Vec<(String, HostValue)>,
}

impl HostObject {
    pub fn new() -> Self {
        HostObject {
            identity: ObjectIdentity::fresh(),
            entries: Vec::new(),
        }
    }

    pub fn from_entries<K: Into<String>>(entries: impl IntoIterator<Item = (K, HostValue)>) -> Self {
        let mut object = HostObject::new();
        for (key, value) in entries {
            object.insert(key, value);
        }
        object
    }

    pub fn identity(&self) -> ObjectIdentity {
        self.identity
    }

    pub fn get(&self, key: &str) -> Option<&HostValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Set `key`, keeping its position when it already exists.
    pub fn insert(&mut self, key: impl Into<String>, value: HostValue) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn keys(&self) -> Vec<&str> {
        self.entries.iter().map(|(k, _)| k.as_str()).collect()
    }

    pub fn entries(&self) -> &[(String, HostValue)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for HostObject {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for HostObject {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity
    }
}

#[derive(Debug, Clone)]
pub struct HostArray {
    identity: ObjectIdentity,
    elements: Vec<HostValue>,
}

impl HostArray {
    pub fn new(elements: Vec<HostValue>) -> Self {
        HostArray {
            identity: ObjectIdentity::fresh(),
            elements,
        }
    }

    pub fn identity(&self) -> ObjectIdentity {
        self.identity
    }

    pub fn elements(&self) -> &[HostValue] {
        &self.elements
    }

    pub fn get(&self, index: usize) -> Option<&HostValue> {
        self.elements.get(index)
    }

    pub fn push(&mut self, value: HostValue) {
        self.elements.push(value);
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl PartialEq for HostArray {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity
    }
}

/// An opaque reference to a script function, callable through
/// [`Context::call`](crate::runner::api::Context::call). The function stays
/// alive until the token is released.
#[derive(Debug, Clone)]
pub struct FunctionToken {
    realm: Uuid,
    slot: u64,
    name: String,
}

impl FunctionToken {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn realm(&self) -> Uuid {
        self.realm
    }

    pub(crate) fn heap_ref_in(&self, realm: Uuid) -> Option<HeapRef> {
        if self.realm == realm {
            Some(HeapRef::from_slot_id(self.slot))
        } else {
            None
        }
    }
}

impl PartialEq for FunctionToken {
    fn eq(&self, other: &Self) -> bool {
        self.realm == other.realm && self.slot == other.slot
    }
}

/// A script value in host form.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    Array(HostArray),
    Object(HostObject),
    Function(FunctionToken),
    Worker(WorkerId),
}

impl HostValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            HostValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            HostValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&HostObject> {
        match self {
            HostValue::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&HostArray> {
        match self {
            HostValue::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionToken> {
        match self {
            HostValue::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, HostValue::Undefined)
    }

    /// Fails when the value holds something a structured clone cannot copy.
    pub fn check_cloneable(&self) -> Result<(), JErrorType> {
        match self {
            HostValue::Function(f) => Err(not_cloneable(&format!("function {}", f.name))),
            HostValue::Worker(_) => Err(not_cloneable("Worker")),
            HostValue::Array(a) => a.elements.iter().try_for_each(|v| v.check_cloneable()),
            HostValue::Object(o) => o.entries.iter().try_for_each(|(_, v)| v.check_cloneable()),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Undefined => f.write_str("undefined"),
            HostValue::Null => f.write_str("null"),
            HostValue::Boolean(b) => write!(f, "{}", b),
            HostValue::Number(n) => f.write_str(&number_to_string(*n)),
            HostValue::String(s) => f.write_str(s),
            HostValue::Array(a) => {
                for (i, element) in a.elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    match element {
                        HostValue::Undefined | HostValue::Null => {}
                        other => write!(f, "{}", other)?,
                    }
                }
                Ok(())
            }
            HostValue::Object(_) => f.write_str("[object Object]"),
            HostValue::Function(t) => write!(f, "function {}", t.name),
            HostValue::Worker(id) => write!(f, "[object Worker {}]", id),
        }
    }
}

impl From<f64> for HostValue {
    fn from(n: f64) -> Self {
        HostValue::Number(n)
    }
}

impl From<i32> for HostValue {
    fn from(n: i32) -> Self {
        HostValue::Number(n as f64)
    }
}

impl From<bool> for HostValue {
    fn from(b: bool) -> Self {
        HostValue::Boolean(b)
    }
}

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        HostValue::String(s.to_string())
    }
}

impl From<String> for HostValue {
    fn from(s: String) -> Self {
        HostValue::String(s)
    }
}

impl From<Vec<HostValue>> for HostValue {
    fn from(elements: Vec<HostValue>) -> Self {
        HostValue::Array(HostArray::new(elements))
    }
}

impl From<HostObject> for HostValue {
    fn from(object: HostObject) -> Self {
        HostValue::Object(object)
    }
}

/// How functions and worker handles cross the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeMode {
    /// To and from the embedding host: functions become pinned tokens,
    /// workers stay handles, live objects of the same context are reused.
    Host,
    /// Structured clone between isolated contexts: functions and workers
    /// are rejected and every object is copied.
    Clone,
}

/// Deepest composite value the bridge converts.
pub const MAX_CONVERSION_DEPTH: usize = 1000;

fn too_deep() -> JErrorType {
    JErrorType::ConversionError("Maximum nesting depth exceeded".to_string())
}

fn not_cloneable(what: &str) -> JErrorType {
    JErrorType::ConversionError(format!("{} could not be cloned", what))
}

/// Convert a script value to host form.
pub fn to_host(ctx: &mut EvalContext, value: &JsValue, mode: BridgeMode) -> Result<HostValue, JErrorType> {
    let mut converter = ToHost {
        mode,
        path: Vec::new(),
        done: HashMap::new(),
    };
    converter.convert(ctx, value)
}

struct ToHost {
    mode: BridgeMode,
    /// Composites being converted, outermost first.
    path: Vec<HeapRef>,
    /// Composites already converted, so shared sub-objects keep one identity.
    done: HashMap<HeapRef, HostValue>,
}

impl ToHost {
    fn convert(&mut self, ctx: &mut EvalContext, value: &JsValue) -> Result<HostValue, JErrorType> {
        Ok(match value {
            JsValue::Undefined => HostValue::Undefined,
            JsValue::Null => HostValue::Null,
            JsValue::Boolean(b) => HostValue::Boolean(*b),
            JsValue::Number(n) => HostValue::Number(*n),
            JsValue::String(s) => HostValue::String(s.clone()),
            JsValue::Worker(id) => match self.mode {
                BridgeMode::Host => HostValue::Worker(*id),
                BridgeMode::Clone => return Err(not_cloneable("Worker")),
            },
            JsValue::Function(r) => match self.mode {
                BridgeMode::Host => {
                    let name = ctx.heap.function(*r)?.name().to_string();
                    ctx.pin(*r);
                    HostValue::Function(FunctionToken {
                        realm: ctx.realm_id,
                        slot: r.slot_id(),
                        name,
                    })
                }
                BridgeMode::Clone => {
                    return Err(not_cloneable(&format!("function {}", describe_value(ctx, value))))
                }
            },
            JsValue::Object(r) | JsValue::Array(r) => {
                if let Some(converted) = self.done.get(r) {
                    return Ok(converted.clone());
                }
                if self.path.contains(r) {
                    return Err(JErrorType::ConversionError(
                        "Converting circular structure".to_string(),
                    ));
                }
                if self.path.len() >= MAX_CONVERSION_DEPTH {
                    return Err(too_deep());
                }
                self.path.push(*r);
                let converted = stack::guarded(|| self.convert_composite(ctx, value, *r));
                self.path.pop();
                let converted = converted?;
                self.done.insert(*r, converted.clone());
                converted
            }
        })
    }

    fn convert_composite(&mut self, ctx: &mut EvalContext, value: &JsValue, r: HeapRef) -> Result<HostValue, JErrorType> {
        let identity = ObjectIdentity::of(ctx.realm_id, r);
        if let JsValue::Array(_) = value {
            let elements = ctx.heap.array(r)?.elements.clone();
            let mut converted = Vec::with_capacity(elements.len());
            for element in &elements {
                converted.push(self.convert(ctx, element)?);
            }
            return Ok(HostValue::Array(HostArray {
                identity,
                elements: converted,
            }));
        }

        let entries: Vec<(String, JsValue)> = ctx
            .heap
            .object(r)?
            .properties
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let mut converted = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            let value = self.convert(ctx, &value)?;
            converted.push((key, value));
        }
        Ok(HostValue::Object(HostObject {
            identity,
            entries: converted,
        }))
    }
}

/// Convert a host value into script form, allocating on the context's heap.
pub fn from_host(ctx: &mut EvalContext, value: &HostValue, mode: BridgeMode) -> Result<JsValue, JErrorType> {
    let mut memo = HashMap::new();
    from_host_inner(ctx, value, mode, &mut memo, 0)
}

fn from_host_inner(
    ctx: &mut EvalContext,
    value: &HostValue,
    mode: BridgeMode,
    memo: &mut HashMap<ObjectIdentity, JsValue>,
    depth: usize,
) -> Result<JsValue, JErrorType> {
    if depth > MAX_CONVERSION_DEPTH {
        return Err(too_deep());
    }
    stack::guarded(|| from_host_value(ctx, value, mode, memo, depth))
}

fn from_host_value(
    ctx: &mut EvalContext,
    value: &HostValue,
    mode: BridgeMode,
    memo: &mut HashMap<ObjectIdentity, JsValue>,
    depth: usize,
) -> Result<JsValue, JErrorType> {
    Ok(match value {
        HostValue::Undefined => JsValue::Undefined,
        HostValue::Null => JsValue::Null,
        HostValue::Boolean(b) => JsValue::Boolean(*b),
        HostValue::Number(n) => JsValue::Number(*n),
        HostValue::String(s) => JsValue::String(s.clone()),
        HostValue::Worker(id) => match mode {
            BridgeMode::Host if ctx.workers.contains(*id) => JsValue::Worker(*id),
            BridgeMode::Host => {
                return Err(JErrorType::ConversionError(format!(
                    "Worker {} does not belong to this context",
                    id
                )))
            }
            BridgeMode::Clone => return Err(not_cloneable("Worker")),
        },
        HostValue::Function(token) => match (mode, token.heap_ref_in(ctx.realm_id)) {
            (BridgeMode::Host, Some(r)) if ctx.heap.function(r).is_ok() => JsValue::Function(r),
            (BridgeMode::Host, _) => {
                return Err(JErrorType::ConversionError(format!(
                    "function {} does not belong to this context",
                    token.name
                )))
            }
            (BridgeMode::Clone, _) => return Err(not_cloneable(&format!("function {}", token.name))),
        },
        HostValue::Array(array) => {
            if let Some(existing) = memo.get(&array.identity) {
                return Ok(existing.clone());
            }
            if let Some(r) = live_same_realm(ctx, array.identity, mode) {
                if ctx.heap.array(r).is_ok() {
                    return Ok(JsValue::Array(r));
                }
            }
            let mut elements = Vec::with_capacity(array.elements.len());
            for element in &array.elements {
                elements.push(from_host_inner(ctx, element, mode, memo, depth + 1)?);
            }
            let converted = JsValue::Array(ctx.alloc(HeapCell::Array(JsArray::new(elements)))?);
            memo.insert(array.identity, converted.clone());
            converted
        }
        HostValue::Object(object) => {
            if let Some(existing) = memo.get(&object.identity) {
                return Ok(existing.clone());
            }
            if let Some(r) = live_same_realm(ctx, object.identity, mode) {
                if ctx.heap.object(r).is_ok() {
                    return Ok(JsValue::Object(r));
                }
            }
            let mut converted = JsObject::new();
            for (key, value) in &object.entries {
                let value = from_host_inner(ctx, value, mode, memo, depth + 1)?;
                converted.properties.set(key, value);
            }
            let converted = JsValue::Object(ctx.alloc(HeapCell::Object(converted))?);
            memo.insert(object.identity, converted.clone());
            converted
        }
    })
}

fn live_same_realm(ctx: &EvalContext, identity: ObjectIdentity, mode: BridgeMode) -> Option<HeapRef> {
    match mode {
        BridgeMode::Host => identity.heap_ref_in(ctx.realm_id),
        BridgeMode::Clone => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_objects_compare_by_identity() {
        let a = HostObject::new();
        let b = HostObject::new();
        assert_ne!(HostValue::Object(a.clone()), HostValue::Object(b));
        assert_eq!(HostValue::Object(a.clone()), HostValue::Object(a));
    }

    #[test]
    fn test_cycle_is_conversion_error() {
        let mut ctx = EvalContext::new();
        let object = ctx.new_object().unwrap();
        let r = object.heap_ref().unwrap();
        ctx.heap.object_mut(r).unwrap().properties.set("me", object.clone());
        assert_eq!(
            to_host(&mut ctx, &object, BridgeMode::Host),
            Err(JErrorType::ConversionError("Converting circular structure".to_string()))
        );
    }

    #[test]
    fn test_shared_child_keeps_aliasing() {
        let mut ctx = EvalContext::new();
        let child = ctx.new_object().unwrap();
        let parent = ctx.new_array(vec![child.clone(), child]).unwrap();
        let host = to_host(&mut ctx, &parent, BridgeMode::Clone).unwrap();
        let array = host.as_array().unwrap();
        assert_eq!(array.get(0), array.get(1));

        let mut other = EvalContext::new();
        let back = from_host(&mut other, &host, BridgeMode::Clone).unwrap();
        let elements = other.heap.array(back.heap_ref().unwrap()).unwrap().elements.clone();
        assert_eq!(elements[0], elements[1]);
    }

    #[test]
    fn test_deep_nesting_is_conversion_error() {
        let mut ctx = EvalContext::new();
        let mut value = ctx.new_array(vec![]).unwrap();
        for _ in 0..MAX_CONVERSION_DEPTH + 5 {
            value = ctx.new_array(vec![value]).unwrap();
        }
        assert_eq!(
            to_host(&mut ctx, &value, BridgeMode::Clone),
            Err(JErrorType::ConversionError("Maximum nesting depth exceeded".to_string()))
        );

        let mut host = HostValue::from(vec![]);
        for _ in 0..MAX_CONVERSION_DEPTH + 5 {
            host = HostValue::from(vec![host]);
        }
        assert!(matches!(
            from_host(&mut ctx, &host, BridgeMode::Host),
            Err(JErrorType::ConversionError(_))
        ));
    }

    #[test]
    fn test_clone_rejects_functions() {
        let mut ctx = EvalContext::new();
        let function = ctx.get_binding("parseInt").unwrap();
        assert!(matches!(
            to_host(&mut ctx, &function, BridgeMode::Clone),
            Err(JErrorType::ConversionError(_))
        ));
        let token = to_host(&mut ctx, &function, BridgeMode::Host).unwrap();
        assert!(token.check_cloneable().is_err());
        assert_eq!(from_host(&mut ctx, &token, BridgeMode::Host).unwrap(), function);
    }
}
