//! Array built-in.
//!
//! Provides the Array constructor and the methods shared by every array.
//! Iterating methods snapshot the length when they start and read each
//! element when they reach it, so callbacks that mutate the array see a
//! consistent walk.

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::heap::HeapRef;
use crate::runner::ds::operations::test_and_comparison::{same_value_zero, strict_equality_comparison};
use crate::runner::ds::operations::type_conversion::{relative_index, to_boolean, to_integer_or_infinity};
use crate::runner::ds::value::JsValue;
use crate::runner::eval::function::{call_function, describe_value};
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::{BuiltInObject, EvalContext};

/// Register the Array built-in with the registry.
pub fn register(registry: &mut BuiltInRegistry) {
    let array = BuiltInObject::new("Array")
        .with_call(array_constructor)
        .with_constructor(array_constructor)
        .add_method("isArray", is_array);
    registry.register_object(array);

    let prototype = BuiltInObject::new("Array")
        .add_method("push", array_push)
        .add_method("pop", array_pop)
        .add_method("shift", array_shift)
        .add_method("unshift", array_unshift)
        .add_method("slice", array_slice)
        .add_method("splice", array_splice)
        .add_method("concat", array_concat)
        .add_method("join", array_join)
        .add_method("reverse", array_reverse)
        .add_method("indexOf", array_index_of)
        .add_method("includes", array_includes)
        .add_method("map", array_map)
        .add_method("filter", array_filter)
        .add_method("forEach", array_for_each)
        .add_method("reduce", array_reduce)
        .add_method("some", array_some)
        .add_method("every", array_every)
        .add_method("find", array_find)
        .add_method("toString", array_to_string);
    registry.register_prototype(prototype);
}

fn this_array(this: &JsValue, method: &str) -> Result<HeapRef, JErrorType> {
    match this {
        JsValue::Array(r) => Ok(*r),
        _ => Err(JErrorType::TypeError(format!(
            "Array.prototype.{} called on non-array",
            method
        ))),
    }
}

fn length(ctx: &EvalContext, array: HeapRef) -> Result<usize, JErrorType> {
    Ok(ctx.heap.array(array)?.elements.len())
}

fn element(ctx: &EvalContext, array: HeapRef, index: usize) -> Result<JsValue, JErrorType> {
    Ok(ctx
        .heap
        .array(array)?
        .elements
        .get(index)
        .cloned()
        .unwrap_or(JsValue::Undefined))
}

fn arg(args: &[JsValue], index: usize) -> JsValue {
    args.get(index).cloned().unwrap_or(JsValue::Undefined)
}

fn callback(ctx: &EvalContext, args: &[JsValue]) -> Result<JsValue, JErrorType> {
    let f = arg(args, 0);
    if f.is_function() {
        Ok(f)
    } else {
        Err(JErrorType::TypeError(format!("{} is not a function", describe_value(ctx, &f))))
    }
}

/// Calls `f(element, index, array)` for each index below the starting
/// length, stopping early when `visit` returns `false`.
fn each_element<F>(ctx: &mut EvalContext, this: &JsValue, args: &[JsValue], method: &str, mut visit: F) -> Result<(), JErrorType>
where
    F: FnMut(&mut EvalContext, usize, JsValue, JsValue) -> Result<bool, JErrorType>,
{
    let array = this_array(this, method)?;
    let f = callback(ctx, args)?;
    let this_arg = arg(args, 1);
    let len = length(ctx, array)?;
    for index in 0..len {
        let value = element(ctx, array, index)?;
        let result = call_function(
            ctx,
            &f,
            this_arg.clone(),
            vec![value.clone(), JsValue::Number(index as f64), this.clone()],
        )?;
        if !visit(ctx, index, value, result)? {
            break;
        }
    }
    Ok(())
}

/// `Array(n)` makes `n` empty slots; any other arguments become the elements.
fn array_constructor(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    if let [JsValue::Number(n)] = args.as_slice() {
        if *n < 0.0 || n.fract() != 0.0 || *n > u32::MAX as f64 {
            return Err(JErrorType::RangeError("Invalid array length".to_string()));
        }
        let array = ctx.new_array(Vec::new())?;
        crate::runner::eval::property::set_property(ctx, &array, "length", JsValue::Number(*n))?;
        return Ok(array);
    }
    ctx.new_array(args)
}

fn is_array(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(JsValue::Boolean(matches!(args.first(), Some(JsValue::Array(_)))))
}

fn array_push(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let array = ctx.heap.array_mut(this_array(&this, "push")?)?;
    array.elements.extend(args);
    Ok(JsValue::Number(array.elements.len() as f64))
}

fn array_pop(ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let array = ctx.heap.array_mut(this_array(&this, "pop")?)?;
    Ok(array.elements.pop().unwrap_or(JsValue::Undefined))
}

fn array_shift(ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let array = ctx.heap.array_mut(this_array(&this, "shift")?)?;
    if array.elements.is_empty() {
        return Ok(JsValue::Undefined);
    }
    Ok(array.elements.remove(0))
}

fn array_unshift(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let array = ctx.heap.array_mut(this_array(&this, "unshift")?)?;
    array.elements.splice(0..0, args);
    Ok(JsValue::Number(array.elements.len() as f64))
}

fn relative_arg(ctx: &EvalContext, args: &[JsValue], index: usize, len: usize, default: usize) -> Result<usize, JErrorType> {
    match args.get(index) {
        None | Some(JsValue::Undefined) => Ok(default),
        Some(value) => Ok(relative_index(ctx.to_number(value)?, len)),
    }
}

fn array_slice(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let array = this_array(&this, "slice")?;
    let len = length(ctx, array)?;
    let start = relative_arg(ctx, &args, 0, len, 0)?;
    let end = relative_arg(ctx, &args, 1, len, len)?;
    let elements = if start < end {
        ctx.heap.array(array)?.elements[start..end].to_vec()
    } else {
        Vec::new()
    };
    ctx.new_array(elements)
}

/// `splice(start, deleteCount, ...items)`; returns the removed elements.
fn array_splice(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let array = this_array(&this, "splice")?;
    let len = length(ctx, array)?;
    let start = relative_arg(ctx, &args, 0, len, 0)?;
    let delete_count = match args.len() {
        0 => 0,
        1 => len - start,
        _ => {
            let n = to_integer_or_infinity(ctx.to_number(&args[1])?);
            n.max(0.0).min((len - start) as f64) as usize
        }
    };
    let items: Vec<JsValue> = args.into_iter().skip(2).collect();
    let removed: Vec<JsValue> = ctx
        .heap
        .array_mut(array)?
        .elements
        .splice(start..start + delete_count, items)
        .collect();
    ctx.new_array(removed)
}

/// Array arguments are spread one level; anything else is appended as is.
fn array_concat(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let array = this_array(&this, "concat")?;
    let mut elements = ctx.heap.array(array)?.elements.clone();
    for value in args {
        match value {
            JsValue::Array(r) => elements.extend(ctx.heap.array(r)?.elements.iter().cloned()),
            other => elements.push(other),
        }
    }
    ctx.new_array(elements)
}

fn array_join(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let array = this_array(&this, "join")?;
    let separator = match args.first() {
        None | Some(JsValue::Undefined) => ",".to_string(),
        Some(value) => ctx.to_string(value)?,
    };
    let elements = ctx.heap.array(array)?.elements.clone();
    let mut parts = Vec::with_capacity(elements.len());
    for value in &elements {
        parts.push(if value.is_nullish() {
            String::new()
        } else {
            ctx.to_string(value)?
        });
    }
    Ok(JsValue::String(parts.join(&separator)))
}

fn array_to_string(ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    this_array(&this, "toString")?;
    Ok(JsValue::String(ctx.to_string(&this)?))
}

fn array_reverse(ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    ctx.heap.array_mut(this_array(&this, "reverse")?)?.elements.reverse();
    Ok(this)
}

fn array_index_of(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let array = this_array(&this, "indexOf")?;
    let len = length(ctx, array)?;
    let target = arg(&args, 0);
    let from = relative_arg(ctx, &args, 1, len, 0)?;
    let elements = &ctx.heap.array(array)?.elements;
    let found = (from..len).find(|&i| strict_equality_comparison(&elements[i], &target));
    Ok(JsValue::Number(found.map_or(-1.0, |i| i as f64)))
}

/// Unlike `indexOf`, finds `NaN`.
fn array_includes(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let array = this_array(&this, "includes")?;
    let len = length(ctx, array)?;
    let target = arg(&args, 0);
    let from = relative_arg(ctx, &args, 1, len, 0)?;
    let elements = &ctx.heap.array(array)?.elements;
    Ok(JsValue::Boolean(elements[from..].iter().any(|e| same_value_zero(e, &target))))
}

fn array_map(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let mut mapped = Vec::new();
    each_element(ctx, &this, &args, "map", |_, _, _, result| {
        mapped.push(result);
        Ok(true)
    })?;
    ctx.new_array(mapped)
}

fn array_filter(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let mut kept = Vec::new();
    each_element(ctx, &this, &args, "filter", |_, _, value, result| {
        if to_boolean(&result) {
            kept.push(value);
        }
        Ok(true)
    })?;
    ctx.new_array(kept)
}

fn array_for_each(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    each_element(ctx, &this, &args, "forEach", |_, _, _, _| Ok(true))?;
    Ok(JsValue::Undefined)
}

fn array_some(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let mut found = false;
    each_element(ctx, &this, &args, "some", |_, _, _, result| {
        found = to_boolean(&result);
        Ok(!found)
    })?;
    Ok(JsValue::Boolean(found))
}

fn array_every(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let mut all = true;
    each_element(ctx, &this, &args, "every", |_, _, _, result| {
        all = to_boolean(&result);
        Ok(all)
    })?;
    Ok(JsValue::Boolean(all))
}

fn array_find(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let mut found = JsValue::Undefined;
    each_element(ctx, &this, &args, "find", |_, _, value, result| {
        if to_boolean(&result) {
            found = value;
            return Ok(false);
        }
        Ok(true)
    })?;
    Ok(found)
}

/// `reduce(f, initial)`; without an initial value the first element seeds
/// the accumulator, and an empty array is a TypeError.
fn array_reduce(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let array = this_array(&this, "reduce")?;
    let f = callback(ctx, &args)?;
    let len = length(ctx, array)?;
    let (mut accumulator, start) = match args.get(1) {
        Some(initial) => (initial.clone(), 0),
        None if len == 0 => {
            return Err(JErrorType::TypeError(
                "Reduce of empty array with no initial value".to_string(),
            ))
        }
        None => (element(ctx, array, 0)?, 1),
    };
    for index in start..len {
        let value = element(ctx, array, index)?;
        accumulator = call_function(
            ctx,
            &f,
            JsValue::Undefined,
            vec![accumulator, value, JsValue::Number(index as f64), this.clone()],
        )?;
    }
    Ok(accumulator)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers(ctx: &EvalContext, value: &JsValue) -> Vec<f64> {
        match value {
            JsValue::Array(r) => ctx
                .heap
                .array(*r)
                .unwrap()
                .elements
                .iter()
                .map(|v| match v {
                    JsValue::Number(n) => *n,
                    _ => f64::NAN,
                })
                .collect(),
            other => panic!("expected array, got {:?}", other),
        }
    }

    fn array_of(ctx: &mut EvalContext, values: &[f64]) -> JsValue {
        ctx.new_array(values.iter().map(|n| JsValue::Number(*n)).collect()).unwrap()
    }

    #[test]
    fn test_splice_removes_and_inserts() {
        let mut ctx = EvalContext::new();
        let array = array_of(&mut ctx, &[1.0, 2.0, 3.0, 4.0]);
        let removed = array_splice(
            &mut ctx,
            array.clone(),
            vec![JsValue::Number(1.0), JsValue::Number(2.0), JsValue::Number(9.0)],
        )
        .unwrap();
        assert_eq!(numbers(&ctx, &removed), vec![2.0, 3.0]);
        assert_eq!(numbers(&ctx, &array), vec![1.0, 9.0, 4.0]);
    }

    #[test]
    fn test_slice_with_negative_bounds() {
        let mut ctx = EvalContext::new();
        let array = array_of(&mut ctx, &[1.0, 2.0, 3.0, 4.0]);
        let sliced = array_slice(&mut ctx, array, vec![JsValue::Number(-3.0), JsValue::Number(-1.0)]).unwrap();
        assert_eq!(numbers(&ctx, &sliced), vec![2.0, 3.0]);
    }

    #[test]
    fn test_includes_finds_nan_but_index_of_does_not() {
        let mut ctx = EvalContext::new();
        let array = array_of(&mut ctx, &[f64::NAN]);
        let nan = vec![JsValue::Number(f64::NAN)];
        assert_eq!(array_includes(&mut ctx, array.clone(), nan.clone()).unwrap(), JsValue::Boolean(true));
        assert_eq!(array_index_of(&mut ctx, array, nan).unwrap(), JsValue::Number(-1.0));
    }

    #[test]
    fn test_array_constructor_length() {
        let mut ctx = EvalContext::new();
        let array = array_constructor(&mut ctx, JsValue::Undefined, vec![JsValue::Number(3.0)]).unwrap();
        assert_eq!(length(&ctx, array.heap_ref().unwrap()).unwrap(), 3);
        assert!(matches!(
            array_constructor(&mut ctx, JsValue::Undefined, vec![JsValue::Number(-1.0)]),
            Err(JErrorType::RangeError(_))
        ));
    }

    #[test]
    fn test_reduce_empty_without_initial_value() {
        let mut ctx = EvalContext::new();
        let array = array_of(&mut ctx, &[]);
        let f = ctx.new_native_function("f", is_array).unwrap();
        assert!(matches!(
            array_reduce(&mut ctx, array, vec![f]),
            Err(JErrorType::TypeError(_))
        ));
    }
}
