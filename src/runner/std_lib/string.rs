//! String built-in.
//!
//! Positions and lengths are counted in UTF-16 code units, as script code
//! observes them.

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::operations::type_conversion::{relative_index, to_integer_or_infinity, to_uint32};
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::{BuiltInObject, EvalContext};

/// Longest string `repeat` may build, in code units.
const MAX_STRING_LENGTH: usize = 1 << 28;

/// Register the String built-in with the registry.
pub fn register(registry: &mut BuiltInRegistry) {
    let string = BuiltInObject::new("String")
        .with_call(string_constructor)
        .with_constructor(string_constructor)
        .add_method("fromCharCode", string_from_char_code);
    registry.register_object(string);

    let prototype = BuiltInObject::new("String")
        .add_method("charAt", string_char_at)
        .add_method("charCodeAt", string_char_code_at)
        .add_method("indexOf", string_index_of)
        .add_method("lastIndexOf", string_last_index_of)
        .add_method("includes", string_includes)
        .add_method("startsWith", string_starts_with)
        .add_method("endsWith", string_ends_with)
        .add_method("slice", string_slice)
        .add_method("substring", string_substring)
        .add_method("toUpperCase", string_to_upper_case)
        .add_method("toLowerCase", string_to_lower_case)
        .add_method("trim", string_trim)
        .add_method("split", string_split)
        .add_method("repeat", string_repeat)
        .add_method("toString", string_to_string);
    registry.register_prototype(prototype);
}

/// `this` as a string; methods called on other values convert them first.
fn this_string(ctx: &EvalContext, this: &JsValue) -> Result<String, JErrorType> {
    match this {
        JsValue::String(s) => Ok(s.clone()),
        JsValue::Undefined | JsValue::Null => Err(JErrorType::TypeError(
            "String.prototype method called on null or undefined".to_string(),
        )),
        other => ctx.to_string(other),
    }
}

fn units(s: &str) -> Vec<u16> {
    s.encode_utf16().collect()
}

fn from_units(units: &[u16]) -> JsValue {
    JsValue::String(String::from_utf16_lossy(units))
}

fn string_arg(ctx: &EvalContext, args: &[JsValue], index: usize) -> Result<String, JErrorType> {
    match args.get(index) {
        Some(value) => ctx.to_string(value),
        None => Ok("undefined".to_string()),
    }
}

/// An integer position argument, `default` when absent.
fn position_arg(ctx: &EvalContext, args: &[JsValue], index: usize, default: f64) -> Result<f64, JErrorType> {
    match args.get(index) {
        None | Some(JsValue::Undefined) => Ok(default),
        Some(value) => Ok(to_integer_or_infinity(ctx.to_number(value)?)),
    }
}

fn clamp(position: f64, len: usize) -> usize {
    position.max(0.0).min(len as f64) as usize
}

fn find_from(haystack: &[u16], needle: &[u16], from: usize) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    (from..=haystack.len() - needle.len()).find(|&i| haystack[i..].starts_with(needle))
}

fn string_constructor(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    match args.first() {
        Some(value) => Ok(JsValue::String(ctx.to_string(value)?)),
        None => Ok(JsValue::from("")),
    }
}

fn string_from_char_code(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let mut code_units = Vec::with_capacity(args.len());
    for value in &args {
        code_units.push(to_uint32(ctx.to_number(value)?) as u16);
    }
    Ok(from_units(&code_units))
}

fn string_char_at(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let s = units(&this_string(ctx, &this)?);
    let index = position_arg(ctx, &args, 0, 0.0)?;
    if index < 0.0 || index >= s.len() as f64 {
        return Ok(JsValue::from(""));
    }
    Ok(from_units(&s[index as usize..index as usize + 1]))
}

fn string_char_code_at(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let s = units(&this_string(ctx, &this)?);
    let index = position_arg(ctx, &args, 0, 0.0)?;
    if index < 0.0 || index >= s.len() as f64 {
        return Ok(JsValue::Number(f64::NAN));
    }
    Ok(JsValue::Number(s[index as usize] as f64))
}

fn string_index_of(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let s = units(&this_string(ctx, &this)?);
    let search = units(&string_arg(ctx, &args, 0)?);
    let from = clamp(position_arg(ctx, &args, 1, 0.0)?, s.len());
    let found = find_from(&s, &search, from);
    Ok(JsValue::Number(found.map_or(-1.0, |i| i as f64)))
}

fn string_last_index_of(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let s = units(&this_string(ctx, &this)?);
    let search = units(&string_arg(ctx, &args, 0)?);
    let from = match args.get(1) {
        Some(value) => {
            let n = ctx.to_number(value)?;
            if n.is_nan() {
                f64::INFINITY
            } else {
                n.trunc()
            }
        }
        None => f64::INFINITY,
    };
    if search.len() > s.len() {
        return Ok(JsValue::Number(-1.0));
    }
    let last_start = clamp(from, s.len() - search.len());
    let found = (0..=last_start).rev().find(|&i| s[i..].starts_with(&search));
    Ok(JsValue::Number(found.map_or(-1.0, |i| i as f64)))
}

fn string_includes(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let s = units(&this_string(ctx, &this)?);
    let search = units(&string_arg(ctx, &args, 0)?);
    let from = clamp(position_arg(ctx, &args, 1, 0.0)?, s.len());
    Ok(JsValue::Boolean(find_from(&s, &search, from).is_some()))
}

fn string_starts_with(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let s = units(&this_string(ctx, &this)?);
    let search = units(&string_arg(ctx, &args, 0)?);
    let start = clamp(position_arg(ctx, &args, 1, 0.0)?, s.len());
    Ok(JsValue::Boolean(s[start..].starts_with(&search)))
}

fn string_ends_with(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let s = units(&this_string(ctx, &this)?);
    let search = units(&string_arg(ctx, &args, 0)?);
    let end = clamp(position_arg(ctx, &args, 1, s.len() as f64)?, s.len());
    Ok(JsValue::Boolean(s[..end].ends_with(&search)))
}

fn string_slice(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let s = units(&this_string(ctx, &this)?);
    let start = relative_index(position_arg(ctx, &args, 0, 0.0)?, s.len());
    let end = relative_index(position_arg(ctx, &args, 1, s.len() as f64)?, s.len());
    if start >= end {
        return Ok(JsValue::from(""));
    }
    Ok(from_units(&s[start..end]))
}

/// Negative positions clamp to 0 and the bounds are swapped when reversed.
fn string_substring(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let s = units(&this_string(ctx, &this)?);
    let a = clamp(position_arg(ctx, &args, 0, 0.0)?, s.len());
    let b = clamp(position_arg(ctx, &args, 1, s.len() as f64)?, s.len());
    Ok(from_units(&s[a.min(b)..a.max(b)]))
}

fn string_to_upper_case(ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(JsValue::String(this_string(ctx, &this)?.to_uppercase()))
}

fn string_to_lower_case(ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(JsValue::String(this_string(ctx, &this)?.to_lowercase()))
}

fn string_trim(ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let s = this_string(ctx, &this)?;
    Ok(JsValue::from(s.trim_matches(|c: char| c.is_whitespace() || c == '\u{FEFF}')))
}

/// `split(separator, limit)`. An undefined separator yields `[s]`, the
/// empty separator splits into code units.
fn string_split(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let s = this_string(ctx, &this)?;
    let limit = match args.get(1) {
        None | Some(JsValue::Undefined) => u32::MAX as usize,
        Some(value) => to_uint32(ctx.to_number(value)?) as usize,
    };
    let parts: Vec<JsValue> = match args.first() {
        None | Some(JsValue::Undefined) => vec![JsValue::String(s)],
        Some(separator) => {
            let separator = ctx.to_string(separator)?;
            if separator.is_empty() {
                units(&s).chunks(1).map(from_units).collect()
            } else {
                s.split(separator.as_str()).map(JsValue::from).collect()
            }
        }
    };
    ctx.new_array(parts.into_iter().take(limit).collect())
}

fn string_repeat(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let s = this_string(ctx, &this)?;
    let count = position_arg(ctx, &args, 0, 0.0)?;
    if count < 0.0 || count.is_infinite() {
        return Err(JErrorType::RangeError(format!(
            "Invalid count value: {}",
            ctx.to_string(&JsValue::Number(count))?
        )));
    }
    let count = count as usize;
    if s.encode_utf16().count().saturating_mul(count) > MAX_STRING_LENGTH {
        return Err(JErrorType::RangeError("Invalid string length".to_string()));
    }
    Ok(JsValue::String(s.repeat(count)))
}

fn string_to_string(ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(JsValue::String(this_string(ctx, &this)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(f: fn(&mut EvalContext, JsValue, Vec<JsValue>) -> Result<JsValue, JErrorType>, this: &str, args: Vec<JsValue>) -> JsValue {
        let mut ctx = EvalContext::new();
        f(&mut ctx, JsValue::from(this), args).unwrap()
    }

    #[test]
    fn test_substring_swaps_and_clamps() {
        let args = vec![JsValue::Number(4.0), JsValue::Number(-2.0)];
        assert_eq!(call(string_substring, "hello", args), JsValue::from("hell"));
    }

    #[test]
    fn test_slice_negative() {
        let args = vec![JsValue::Number(-3.0)];
        assert_eq!(call(string_slice, "hello", args), JsValue::from("llo"));
    }

    #[test]
    fn test_index_of_and_last_index_of() {
        assert_eq!(call(string_index_of, "abcabc", vec![JsValue::from("c")]), JsValue::Number(2.0));
        assert_eq!(call(string_last_index_of, "abcabc", vec![JsValue::from("c")]), JsValue::Number(5.0));
        assert_eq!(call(string_index_of, "abc", vec![JsValue::from("")]), JsValue::Number(0.0));
        assert_eq!(call(string_index_of, "abc", vec![JsValue::from("x")]), JsValue::Number(-1.0));
    }

    #[test]
    fn test_char_code_at_counts_code_units() {
        assert_eq!(call(string_char_code_at, "😀", vec![JsValue::Number(1.0)]), JsValue::Number(56832.0));
        assert!(matches!(call(string_char_code_at, "a", vec![JsValue::Number(5.0)]), JsValue::Number(n) if n.is_nan()));
    }

    #[test]
    fn test_repeat_rejects_negative_counts() {
        let mut ctx = EvalContext::new();
        assert!(matches!(
            string_repeat(&mut ctx, JsValue::from("a"), vec![JsValue::Number(-1.0)]),
            Err(JErrorType::RangeError(_))
        ));
        assert_eq!(call(string_repeat, "ab", vec![JsValue::Number(3.0)]), JsValue::from("ababab"));
    }
}
