//! Property access on every kind of value.
//!
//! Objects look up their own properties and then their prototype chain.
//! Primitives, arrays, functions and worker handles fall back to the
//! per-class methods the super-global resolvers provide, then to the
//! `Object` methods.

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::function_object::FunctionKind;
use crate::runner::ds::heap::HeapRef;
use crate::runner::ds::object::as_array_index;
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::types::EvalContext;
use crate::runner::worker::message::EventType;

use super::types::ValueResult;

/// How far a single write may grow an array past its current length.
const MAX_ARRAY_GROWTH: usize = 1_000_000;

/// Class of `globalThis`, whose properties are the global bindings.
pub const CLASS_GLOBAL: &str = "Global";

pub fn get_property(ctx: &mut EvalContext, base: &JsValue, key: &str) -> ValueResult {
    match base {
        JsValue::Undefined | JsValue::Null => Err(JErrorType::TypeError(format!(
            "Cannot read properties of {} (reading '{}')",
            base, key
        ))),
        JsValue::Boolean(_) => class_method(ctx, "Boolean", key),
        JsValue::Number(_) => class_method(ctx, "Number", key),
        JsValue::String(s) => {
            if key == "length" {
                return Ok(JsValue::Number(s.encode_utf16().count() as f64));
            }
            if let Some(index) = as_array_index(key) {
                return Ok(code_unit_at(s, index)
                    .map(JsValue::String)
                    .unwrap_or(JsValue::Undefined));
            }
            class_method(ctx, "String", key)
        }
        JsValue::Array(r) => {
            let array = ctx.heap.array(*r)?;
            if key == "length" {
                return Ok(JsValue::Number(array.elements.len() as f64));
            }
            if let Some(index) = as_array_index(key) {
                return Ok(array.elements.get(index).cloned().unwrap_or(JsValue::Undefined));
            }
            if let Some(value) = array.properties.get(key) {
                return Ok(value.clone());
            }
            class_method(ctx, "Array", key)
        }
        JsValue::Object(r) => {
            let class_name = ctx.heap.object(*r)?.class_name.clone();
            if class_name == CLASS_GLOBAL && ctx.has_global_property(key)? {
                return ctx.global_property(key);
            }
            let mut current = Some(*r);
            while let Some(object_ref) = current {
                let object = ctx.heap.object(object_ref)?;
                if let Some(value) = object.properties.get(key) {
                    return Ok(value.clone());
                }
                current = object.prototype;
            }
            class_method(ctx, &class_name, key)
        }
        JsValue::Function(r) => {
            let function = ctx.heap.function(*r)?;
            if let Some(value) = function.properties.get(key) {
                return Ok(value.clone());
            }
            match key {
                "name" => return Ok(JsValue::from(function.name())),
                "length" => return Ok(JsValue::Number(function.arity() as f64)),
                "prototype" if has_own_prototype(&function.kind) => {
                    return function_prototype(ctx, *r)
                }
                _ => {}
            }
            class_method(ctx, "Function", key)
        }
        JsValue::Worker(id) => {
            if let Some(event) = EventType::from_handler_property(key) {
                return Ok(ctx.workers.handler(*id, event));
            }
            if let Some(value) = ctx.workers.property(*id, key) {
                return Ok(value);
            }
            class_method(ctx, "Worker", key)
        }
    }
}

/// `base[key]` with an arbitrary key value; integer keys on arrays skip the
/// string conversion.
pub fn get_element(ctx: &mut EvalContext, base: &JsValue, key: &JsValue) -> ValueResult {
    if let (JsValue::Array(r), Some(index)) = (base, integer_index(key)) {
        return Ok(ctx
            .heap
            .array(*r)?
            .elements
            .get(index)
            .cloned()
            .unwrap_or(JsValue::Undefined));
    }
    let key = ctx.to_property_key(key)?;
    get_property(ctx, base, &key)
}

pub fn set_property(ctx: &mut EvalContext, base: &JsValue, key: &str, value: JsValue) -> Result<(), JErrorType> {
    match base {
        JsValue::Undefined | JsValue::Null => Err(JErrorType::TypeError(format!(
            "Cannot set properties of {} (setting '{}')",
            base, key
        ))),
        // Writes to primitives are silently discarded.
        JsValue::Boolean(_) | JsValue::Number(_) | JsValue::String(_) => Ok(()),
        JsValue::Array(r) => {
            if key == "length" {
                let len = array_length(ctx, &value)?;
                let array = ctx.heap.array_mut(*r)?;
                check_growth(array.elements.len(), len)?;
                array.elements.resize(len, JsValue::Undefined);
                return Ok(());
            }
            if let Some(index) = as_array_index(key) {
                return set_index(ctx, *r, index, value);
            }
            ctx.heap.array_mut(*r)?.properties.set(key, value);
            Ok(())
        }
        JsValue::Object(r) => {
            if is_global_object(ctx, *r)? {
                return ctx.set_global_property(key, value);
            }
            ctx.heap.object_mut(*r)?.properties.set(key, value);
            Ok(())
        }
        JsValue::Function(r) => {
            ctx.heap.function_mut(*r)?.properties.set(key, value);
            Ok(())
        }
        JsValue::Worker(id) => {
            match EventType::from_handler_property(key) {
                Some(event) => ctx.workers.set_handler(*id, event, value),
                None => ctx.workers.set_property(*id, key, value),
            }
            Ok(())
        }
    }
}

pub fn set_element(ctx: &mut EvalContext, base: &JsValue, key: &JsValue, value: JsValue) -> Result<(), JErrorType> {
    if let (JsValue::Array(r), Some(index)) = (base, integer_index(key)) {
        return set_index(ctx, *r, index, value);
    }
    let key = ctx.to_property_key(key)?;
    set_property(ctx, base, &key, value)
}

fn set_index(ctx: &mut EvalContext, array_ref: HeapRef, index: usize, value: JsValue) -> Result<(), JErrorType> {
    let array = ctx.heap.array_mut(array_ref)?;
    if index >= array.elements.len() {
        check_growth(array.elements.len(), index + 1)?;
        array.elements.resize(index + 1, JsValue::Undefined);
    }
    array.elements[index] = value;
    Ok(())
}

/// `delete base[key]`. Deleting an array element leaves a hole (`undefined`).
pub fn delete_property(ctx: &mut EvalContext, base: &JsValue, key: &str) -> Result<bool, JErrorType> {
    match base {
        JsValue::Undefined | JsValue::Null => Err(JErrorType::TypeError(
            "Cannot convert undefined or null to object".to_string(),
        )),
        JsValue::Boolean(_) | JsValue::Number(_) | JsValue::String(_) => Ok(true),
        JsValue::Array(r) => {
            let array = ctx.heap.array_mut(*r)?;
            if key == "length" {
                return Ok(false);
            }
            if let Some(index) = as_array_index(key) {
                if let Some(slot) = array.elements.get_mut(index) {
                    *slot = JsValue::Undefined;
                }
                return Ok(true);
            }
            array.properties.remove(key);
            Ok(true)
        }
        JsValue::Object(r) => {
            if is_global_object(ctx, *r)? {
                return ctx.delete_global_property(key);
            }
            ctx.heap.object_mut(*r)?.properties.remove(key);
            Ok(true)
        }
        JsValue::Function(r) => {
            ctx.heap.function_mut(*r)?.properties.remove(key);
            Ok(true)
        }
        JsValue::Worker(id) => {
            match EventType::from_handler_property(key) {
                Some(event) => ctx.workers.set_handler(*id, event, JsValue::Undefined),
                None => ctx.workers.remove_property(*id, key),
            }
            Ok(true)
        }
    }
}

/// The `in` operator.
pub fn has_property(ctx: &mut EvalContext, base: &JsValue, key: &str) -> Result<bool, JErrorType> {
    let (own, class_name) = match base {
        JsValue::Object(r) => {
            let class_name = ctx.heap.object(*r)?.class_name.clone();
            if class_name == CLASS_GLOBAL {
                return ctx.has_global_property(key);
            }
            let mut current = Some(*r);
            let mut found = false;
            while let Some(object_ref) = current {
                let object = ctx.heap.object(object_ref)?;
                if object.properties.contains(key) {
                    found = true;
                    break;
                }
                current = object.prototype;
            }
            if found {
                return Ok(true);
            }
            return Ok(class_method(ctx, &class_name, key)? != JsValue::Undefined);
        }
        JsValue::Array(r) => {
            let array = ctx.heap.array(*r)?;
            let own = key == "length"
                || as_array_index(key).map_or(false, |i| i < array.elements.len())
                || array.properties.contains(key);
            (own, "Array")
        }
        JsValue::Function(r) => {
            let function = ctx.heap.function(*r)?;
            let own = function.properties.contains(key)
                || key == "name"
                || key == "length"
                || (key == "prototype" && has_own_prototype(&function.kind));
            (own, "Function")
        }
        JsValue::Worker(id) => {
            let own = EventType::from_handler_property(key).is_some()
                || ctx.workers.property(*id, key).is_some();
            (own, "Worker")
        }
        _ => {
            let shown = ctx.to_string(base)?;
            return Err(JErrorType::TypeError(format!(
                "Cannot use 'in' operator to search for '{}' in {}",
                key, shown
            )));
        }
    };
    if own {
        return Ok(true);
    }
    Ok(class_method(ctx, class_name, key)? != JsValue::Undefined)
}

/// Own enumerable keys in insertion order, as `Object.keys` reports them.
pub fn own_keys(ctx: &EvalContext, value: &JsValue) -> Result<Vec<String>, JErrorType> {
    Ok(match value {
        JsValue::Object(r) => {
            let object = ctx.heap.object(*r)?;
            if object.class_name == CLASS_GLOBAL {
                return ctx.global_keys();
            }
            object.properties.keys()
        }
        JsValue::Array(r) => {
            let array = ctx.heap.array(*r)?;
            let mut keys: Vec<String> = (0..array.elements.len()).map(|i| i.to_string()).collect();
            keys.extend(array.properties.keys());
            keys
        }
        JsValue::Function(r) => ctx.heap.function(*r)?.properties.keys(),
        JsValue::String(s) => (0..s.encode_utf16().count()).map(|i| i.to_string()).collect(),
        JsValue::Worker(id) => ctx.workers.property_keys(*id),
        _ => Vec::new(),
    })
}

/// Keys visited by `for...in`: own keys, then inherited ones not shadowed.
pub fn for_in_keys(ctx: &EvalContext, value: &JsValue) -> Result<Vec<String>, JErrorType> {
    let mut keys = own_keys(ctx, value)?;
    if let JsValue::Object(r) = value {
        let mut current = ctx.heap.object(*r)?.prototype;
        while let Some(object_ref) = current {
            let object = ctx.heap.object(object_ref)?;
            for key in object.properties.keys() {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
            current = object.prototype;
        }
    }
    Ok(keys)
}

/// `F.prototype` of a script function, created on first use.
pub fn function_prototype(ctx: &mut EvalContext, function_ref: HeapRef) -> ValueResult {
    if let Some(existing) = ctx.heap.function(function_ref)?.properties.get("prototype") {
        return Ok(existing.clone());
    }
    let prototype = ctx.new_object_with(vec![("constructor", JsValue::Function(function_ref))])?;
    ctx.heap
        .function_mut(function_ref)?
        .properties
        .set("prototype", prototype.clone());
    Ok(prototype)
}

fn is_global_object(ctx: &EvalContext, object_ref: HeapRef) -> Result<bool, JErrorType> {
    Ok(ctx.heap.object(object_ref)?.class_name == CLASS_GLOBAL)
}

fn has_own_prototype(kind: &FunctionKind) -> bool {
    matches!(kind, FunctionKind::Script(s) if !s.data.is_arrow)
}

fn class_method(ctx: &mut EvalContext, class_name: &str, key: &str) -> ValueResult {
    if let Some(method) = ctx.prototype_method(class_name, key)? {
        return Ok(method);
    }
    if class_name != "Object" {
        if let Some(method) = ctx.prototype_method("Object", key)? {
            return Ok(method);
        }
    }
    Ok(JsValue::Undefined)
}

fn integer_index(key: &JsValue) -> Option<usize> {
    match key {
        JsValue::Number(n) if *n >= 0.0 && n.fract() == 0.0 && *n < u32::MAX as f64 => Some(*n as usize),
        _ => None,
    }
}

fn array_length(ctx: &EvalContext, value: &JsValue) -> Result<usize, JErrorType> {
    let n = ctx.to_number(value)?;
    if n.is_nan() || n < 0.0 || n.fract() != 0.0 || n > u32::MAX as f64 {
        return Err(invalid_length());
    }
    Ok(n as usize)
}

fn check_growth(current: usize, requested: usize) -> Result<(), JErrorType> {
    if requested > current.saturating_add(MAX_ARRAY_GROWTH) {
        Err(invalid_length())
    } else {
        Ok(())
    }
}

fn invalid_length() -> JErrorType {
    JErrorType::RangeError("Invalid array length".to_string())
}

/// The UTF-16 code unit at `index`, as a one-unit string.
pub fn code_unit_at(s: &str, index: usize) -> Option<String> {
    s.encode_utf16()
        .nth(index)
        .map(|unit| String::from_utf16_lossy(&[unit]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_length_and_holes() {
        let mut ctx = EvalContext::new();
        let array = ctx.new_array(vec![JsValue::Number(1.0)]).unwrap();
        set_property(&mut ctx, &array, "3", JsValue::Number(4.0)).unwrap();
        assert_eq!(get_property(&mut ctx, &array, "length").unwrap(), JsValue::Number(4.0));
        assert_eq!(get_property(&mut ctx, &array, "2").unwrap(), JsValue::Undefined);
        set_property(&mut ctx, &array, "length", JsValue::Number(1.0)).unwrap();
        assert_eq!(get_element(&mut ctx, &array, &JsValue::Number(3.0)).unwrap(), JsValue::Undefined);
        assert!(matches!(
            set_property(&mut ctx, &array, "length", JsValue::Number(-1.0)),
            Err(JErrorType::RangeError(_))
        ));
        assert!(matches!(
            set_element(&mut ctx, &array, &JsValue::Number(5e9), JsValue::Null),
            Err(JErrorType::RangeError(_))
        ));
    }

    #[test]
    fn test_string_indexing_uses_code_units() {
        let mut ctx = EvalContext::new();
        let s = JsValue::from("a😀");
        assert_eq!(get_property(&mut ctx, &s, "length").unwrap(), JsValue::Number(3.0));
        assert_eq!(get_property(&mut ctx, &s, "0").unwrap(), JsValue::from("a"));
        assert_eq!(get_property(&mut ctx, &s, "9").unwrap(), JsValue::Undefined);
    }

    #[test]
    fn test_reading_from_undefined() {
        let mut ctx = EvalContext::new();
        assert_eq!(
            get_property(&mut ctx, &JsValue::Undefined, "x"),
            Err(JErrorType::TypeError(
                "Cannot read properties of undefined (reading 'x')".to_string()
            ))
        );
    }

    #[test]
    fn test_in_requires_object() {
        let mut ctx = EvalContext::new();
        let object = ctx.new_object_with(vec![("a", JsValue::Null)]).unwrap();
        assert!(has_property(&mut ctx, &object, "a").unwrap());
        assert!(!has_property(&mut ctx, &object, "b").unwrap());
        assert!(matches!(
            has_property(&mut ctx, &JsValue::from("abc"), "a"),
            Err(JErrorType::TypeError(_))
        ));
    }
}
