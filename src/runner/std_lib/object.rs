//! Object built-in, plus the methods every object and every function share.

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::as_array_index;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::function::call_function;
use crate::runner::eval::property::{get_property, own_keys, set_property, CLASS_GLOBAL};
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::{BuiltInObject, EvalContext};

/// Register the Object built-in with the registry.
pub fn register(registry: &mut BuiltInRegistry) {
    let object = BuiltInObject::new("Object")
        .with_call(object_constructor)
        .with_constructor(object_constructor)
        .add_method("keys", object_keys)
        .add_method("values", object_values)
        .add_method("entries", object_entries)
        .add_method("assign", object_assign);
    registry.register_object(object);

    let prototype = BuiltInObject::new("Object")
        .add_method("hasOwnProperty", object_has_own_property)
        .add_method("toString", object_to_string);
    registry.register_prototype(prototype);

    let function_prototype = BuiltInObject::new("Function")
        .add_method("call", function_call)
        .add_method("apply", function_apply);
    registry.register_prototype(function_prototype);
}

/// `Object(value)`: composites are returned as they are, anything else
/// yields a fresh empty object. Primitives are not boxed.
fn object_constructor(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    match args.into_iter().next() {
        Some(value @ (JsValue::Object(_) | JsValue::Array(_) | JsValue::Function(_) | JsValue::Worker(_))) => Ok(value),
        _ => ctx.new_object(),
    }
}

fn target_keys(ctx: &EvalContext, args: &[JsValue]) -> Result<(JsValue, Vec<String>), JErrorType> {
    let target = args.first().cloned().unwrap_or(JsValue::Undefined);
    if target.is_nullish() {
        return Err(JErrorType::TypeError(
            "Cannot convert undefined or null to object".to_string(),
        ));
    }
    let keys = own_keys(ctx, &target)?;
    Ok((target, keys))
}

fn object_keys(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let (_, keys) = target_keys(ctx, &args)?;
    ctx.new_array(keys.into_iter().map(JsValue::String).collect())
}

fn object_values(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let (target, keys) = target_keys(ctx, &args)?;
    let mut values = Vec::with_capacity(keys.len());
    for key in &keys {
        values.push(get_property(ctx, &target, key)?);
    }
    ctx.new_array(values)
}

fn object_entries(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let (target, keys) = target_keys(ctx, &args)?;
    let mut entries = Vec::with_capacity(keys.len());
    for key in keys {
        let value = get_property(ctx, &target, &key)?;
        entries.push(ctx.new_array(vec![JsValue::String(key), value])?);
    }
    ctx.new_array(entries)
}

/// `Object.assign(target, ...sources)`
fn object_assign(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let (target, _) = target_keys(ctx, &args)?;
    for source in args.iter().skip(1) {
        if source.is_nullish() {
            continue;
        }
        for key in own_keys(ctx, source)? {
            let value = get_property(ctx, source, &key)?;
            set_property(ctx, &target, &key, value)?;
        }
    }
    Ok(target)
}

fn object_has_own_property(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let key = match args.first() {
        Some(value) => ctx.to_property_key(value)?,
        None => "undefined".to_string(),
    };
    let own = match &this {
        JsValue::Object(r) => {
            let object = ctx.heap.object(*r)?;
            if object.class_name == CLASS_GLOBAL {
                ctx.has_global_binding(&key)?
            } else {
                object.properties.contains(&key)
            }
        }
        JsValue::Array(r) => {
            let array = ctx.heap.array(*r)?;
            key == "length"
                || as_array_index(&key).map_or(false, |i| i < array.elements.len())
                || array.properties.contains(&key)
        }
        JsValue::Function(r) => {
            ctx.heap.function(*r)?.properties.contains(&key) || key == "name" || key == "length"
        }
        JsValue::String(s) => {
            key == "length" || as_array_index(&key).map_or(false, |i| i < s.encode_utf16().count())
        }
        JsValue::Worker(id) => ctx.workers.property(*id, &key).is_some(),
        JsValue::Undefined | JsValue::Null => {
            return Err(JErrorType::TypeError(
                "Cannot convert undefined or null to object".to_string(),
            ))
        }
        _ => false,
    };
    Ok(JsValue::Boolean(own))
}

/// Error objects render as `Name: message`, everything else by its tag.
fn object_to_string(ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let tag = match &this {
        JsValue::Object(r) if ctx.heap.object(*r)?.is_error() => return Ok(JsValue::String(ctx.to_string(&this)?)),
        JsValue::Undefined => "Undefined",
        JsValue::Null => "Null",
        JsValue::Array(_) => "Array",
        JsValue::Function(_) => "Function",
        JsValue::Worker(_) => "Worker",
        JsValue::String(_) => "String",
        JsValue::Number(_) => "Number",
        JsValue::Boolean(_) => "Boolean",
        JsValue::Object(_) => "Object",
    };
    Ok(JsValue::String(format!("[object {}]", tag)))
}

/// `f.call(thisArg, ...args)`
fn function_call(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let mut args = args.into_iter();
    let this_arg = args.next().unwrap_or(JsValue::Undefined);
    call_function(ctx, &this, this_arg, args.collect())
}

/// `f.apply(thisArg, argsArray)`
fn function_apply(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let mut args = args.into_iter();
    let this_arg = args.next().unwrap_or(JsValue::Undefined);
    let call_args = match args.next() {
        None | Some(JsValue::Undefined) | Some(JsValue::Null) => Vec::new(),
        Some(JsValue::Array(r)) => ctx.heap.array(r)?.elements.clone(),
        Some(_) => {
            return Err(JErrorType::TypeError(
                "CreateListFromArrayLike called on non-object".to_string(),
            ))
        }
    };
    call_function(ctx, &this, this_arg, call_args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_preserve_insertion_order() {
        let mut ctx = EvalContext::new();
        let object = ctx
            .new_object_with(vec![("b", JsValue::Null), ("a", JsValue::Null)])
            .unwrap();
        let keys = object_keys(&mut ctx, JsValue::Undefined, vec![object]).unwrap();
        assert_eq!(ctx.to_string(&keys).unwrap(), "b,a");
    }

    #[test]
    fn test_keys_of_null_is_type_error() {
        let mut ctx = EvalContext::new();
        assert!(matches!(
            object_keys(&mut ctx, JsValue::Undefined, vec![JsValue::Null]),
            Err(JErrorType::TypeError(_))
        ));
    }

    #[test]
    fn test_to_string_tags() {
        let mut ctx = EvalContext::new();
        let array = ctx.new_array(vec![]).unwrap();
        assert_eq!(
            object_to_string(&mut ctx, array, vec![]).unwrap(),
            JsValue::from("[object Array]")
        );
        let error = ctx.new_error("TypeError", "bad").unwrap();
        assert_eq!(
            object_to_string(&mut ctx, error, vec![]).unwrap(),
            JsValue::from("TypeError: bad")
        );
    }
}
