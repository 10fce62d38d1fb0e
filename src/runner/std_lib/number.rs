//! Number and Boolean built-ins, and the numeric globals (`parseInt`,
//! `parseFloat`, `isNaN`, `isFinite`, `NaN`, `Infinity`, `undefined`).

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::operations::type_conversion::{
    number_to_string, number_to_string_radix, to_boolean, to_integer_or_infinity,
};
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::{BuiltInObject, EvalContext};

/// Register the Number built-in with the registry.
pub fn register(registry: &mut BuiltInRegistry) {
    let number = BuiltInObject::new("Number")
        .with_call(number_constructor)
        .with_constructor(number_constructor)
        .add_property("MAX_VALUE", JsValue::Number(f64::MAX))
        .add_property("MIN_VALUE", JsValue::Number(5e-324))
        .add_property("POSITIVE_INFINITY", JsValue::Number(f64::INFINITY))
        .add_property("NEGATIVE_INFINITY", JsValue::Number(f64::NEG_INFINITY))
        .add_property("NaN", JsValue::Number(f64::NAN))
        .add_property("MAX_SAFE_INTEGER", JsValue::Number(9007199254740991.0))
        .add_property("MIN_SAFE_INTEGER", JsValue::Number(-9007199254740991.0))
        .add_property("EPSILON", JsValue::Number(f64::EPSILON))
        .add_method("isNaN", number_is_nan)
        .add_method("isFinite", number_is_finite)
        .add_method("isInteger", number_is_integer)
        .add_method("parseFloat", parse_float)
        .add_method("parseInt", parse_int);
    registry.register_object(number);

    let boolean = BuiltInObject::new("Boolean")
        .with_call(boolean_constructor)
        .with_constructor(boolean_constructor);
    registry.register_object(boolean);

    registry.register_object(BuiltInObject::new("parseInt").with_call(parse_int));
    registry.register_object(BuiltInObject::new("parseFloat").with_call(parse_float));
    registry.register_object(BuiltInObject::new("isNaN").with_call(global_is_nan));
    registry.register_object(BuiltInObject::new("isFinite").with_call(global_is_finite));
    registry.register_object(BuiltInObject::new("NaN").with_value(JsValue::Number(f64::NAN)));
    registry.register_object(BuiltInObject::new("Infinity").with_value(JsValue::Number(f64::INFINITY)));
    registry.register_object(BuiltInObject::new("undefined").with_value(JsValue::Undefined));

    let prototype = BuiltInObject::new("Number")
        .add_method("toString", number_to_string_method)
        .add_method("toFixed", number_to_fixed);
    registry.register_prototype(prototype);

    let boolean_prototype = BuiltInObject::new("Boolean").add_method("toString", boolean_to_string);
    registry.register_prototype(boolean_prototype);
}

fn number_arg(ctx: &EvalContext, args: &[JsValue]) -> Result<f64, JErrorType> {
    match args.first() {
        Some(value) => ctx.to_number(value),
        None => Ok(f64::NAN),
    }
}

fn this_number(this: &JsValue, method: &str) -> Result<f64, JErrorType> {
    match this {
        JsValue::Number(n) => Ok(*n),
        _ => Err(JErrorType::TypeError(format!(
            "Number.prototype.{} requires that 'this' be a Number",
            method
        ))),
    }
}

fn number_constructor(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    match args.first() {
        Some(value) => Ok(JsValue::Number(ctx.to_number(value)?)),
        None => Ok(JsValue::Number(0.0)),
    }
}

fn boolean_constructor(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(JsValue::Boolean(args.first().map_or(false, to_boolean)))
}

/// Number.isNaN does not convert its argument.
fn number_is_nan(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(JsValue::Boolean(matches!(args.first(), Some(JsValue::Number(n)) if n.is_nan())))
}

fn number_is_finite(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(JsValue::Boolean(matches!(args.first(), Some(JsValue::Number(n)) if n.is_finite())))
}

fn number_is_integer(_ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(JsValue::Boolean(
        matches!(args.first(), Some(JsValue::Number(n)) if n.is_finite() && n.fract() == 0.0),
    ))
}

fn global_is_nan(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(JsValue::Boolean(number_arg(ctx, &args)?.is_nan()))
}

fn global_is_finite(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(JsValue::Boolean(number_arg(ctx, &args)?.is_finite()))
}

fn trim_start(s: &str) -> &str {
    s.trim_start_matches(|c: char| c.is_whitespace() || c == '\u{FEFF}')
}

/// `parseInt(string, radix)`: parses the longest valid prefix. Without a
/// radix, a `0x` prefix selects base 16.
fn parse_int(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let input = match args.first() {
        Some(value) => ctx.to_string(value)?,
        None => return Ok(JsValue::Number(f64::NAN)),
    };
    let mut radix = match args.get(1) {
        None | Some(JsValue::Undefined) => 0,
        Some(value) => to_integer_or_infinity(ctx.to_number(value)?) as i64,
    };
    let mut s = trim_start(&input);
    let negative = s.starts_with('-');
    if s.starts_with('-') || s.starts_with('+') {
        s = &s[1..];
    }
    if radix == 0 || radix == 16 {
        if let Some(rest) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            s = rest;
            radix = 16;
        }
    }
    if radix == 0 {
        radix = 10;
    }
    if !(2..=36).contains(&radix) {
        return Ok(JsValue::Number(f64::NAN));
    }

    let mut value = 0f64;
    let mut any = false;
    for c in s.chars() {
        match c.to_digit(radix as u32) {
            Some(d) => {
                value = value * radix as f64 + d as f64;
                any = true;
            }
            None => break,
        }
    }
    if !any {
        return Ok(JsValue::Number(f64::NAN));
    }
    Ok(JsValue::Number(if negative { -value } else { value }))
}

/// `parseFloat(string)`: the longest prefix that is a decimal literal.
fn parse_float(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let input = match args.first() {
        Some(value) => ctx.to_string(value)?,
        None => return Ok(JsValue::Number(f64::NAN)),
    };
    let s = trim_start(&input);
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    if s[end..].starts_with("Infinity") {
        return Ok(JsValue::Number(if s.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        }));
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut saw_digit = end > digits_start;
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
            saw_digit = true;
        }
    }
    if !saw_digit {
        return Ok(JsValue::Number(f64::NAN));
    }
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+') | Some(b'-')) {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            end = exp_end;
        }
    }
    Ok(JsValue::Number(s[..end].parse::<f64>().unwrap_or(f64::NAN)))
}

fn number_to_string_method(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let n = this_number(&this, "toString")?;
    let radix = match args.first() {
        None | Some(JsValue::Undefined) => 10.0,
        Some(value) => to_integer_or_infinity(ctx.to_number(value)?),
    };
    if !(2.0..=36.0).contains(&radix) {
        return Err(JErrorType::RangeError(
            "toString() radix must be between 2 and 36".to_string(),
        ));
    }
    Ok(JsValue::String(number_to_string_radix(n, radix as u32)))
}

fn number_to_fixed(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let n = this_number(&this, "toFixed")?;
    let digits = match args.first() {
        None | Some(JsValue::Undefined) => 0.0,
        Some(value) => to_integer_or_infinity(ctx.to_number(value)?),
    };
    if !(0.0..=100.0).contains(&digits) {
        return Err(JErrorType::RangeError(
            "toFixed() digits argument must be between 0 and 100".to_string(),
        ));
    }
    if !n.is_finite() || n.abs() >= 1e21 {
        return Ok(JsValue::String(number_to_string(n)));
    }
    Ok(JsValue::String(to_fixed(n, digits as usize)))
}

/// Fixed-point formatting with ties rounded away from zero.
fn to_fixed(n: f64, digits: usize) -> String {
    let expanded = format!("{:.*}", digits + 30, n.abs());
    let (int_part, frac_part) = expanded.split_once('.').unwrap_or((expanded.as_str(), ""));
    let mut kept: Vec<u8> = int_part
        .bytes()
        .chain(frac_part.bytes().take(digits))
        .map(|b| b - b'0')
        .collect();
    if frac_part.as_bytes().get(digits).map_or(false, |b| *b >= b'5') {
        let mut i = kept.len();
        loop {
            if i == 0 {
                kept.insert(0, 1);
                break;
            }
            i -= 1;
            if kept[i] == 9 {
                kept[i] = 0;
            } else {
                kept[i] += 1;
                break;
            }
        }
    }
    let int_len = kept.len() - digits;
    let mut out = String::with_capacity(kept.len() + 2);
    if n < 0.0 {
        out.push('-');
    }
    out.extend(kept[..int_len].iter().map(|d| (b'0' + d) as char));
    if digits > 0 {
        out.push('.');
        out.extend(kept[int_len..].iter().map(|d| (b'0' + d) as char));
    }
    out
}

fn boolean_to_string(_ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    match this {
        JsValue::Boolean(b) => Ok(JsValue::String(b.to_string())),
        _ => Err(JErrorType::TypeError(
            "Boolean.prototype.toString requires that 'this' be a Boolean".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_fixed_rounds_ties_up() {
        assert_eq!(to_fixed(2.5, 0), "3");
        assert_eq!(to_fixed(1.005, 2), "1.00");
        assert_eq!(to_fixed(9.999, 2), "10.00");
        assert_eq!(to_fixed(-0.0001, 2), "-0.00");
        assert_eq!(to_fixed(3.0, 3), "3.000");
    }

    fn parse(f: fn(&mut EvalContext, JsValue, Vec<JsValue>) -> Result<JsValue, JErrorType>, args: Vec<JsValue>) -> f64 {
        let mut ctx = EvalContext::new();
        match f(&mut ctx, JsValue::Undefined, args).unwrap() {
            JsValue::Number(n) => n,
            other => panic!("expected number, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_int_prefixes() {
        assert_eq!(parse(parse_int, vec![JsValue::from("  42px")]), 42.0);
        assert_eq!(parse(parse_int, vec![JsValue::from("0x1f")]), 31.0);
        assert_eq!(parse(parse_int, vec![JsValue::from("-101"), JsValue::Number(2.0)]), -5.0);
        assert!(parse(parse_int, vec![JsValue::from("z")]).is_nan());
        assert!(parse(parse_int, vec![JsValue::from("1"), JsValue::Number(40.0)]).is_nan());
    }

    #[test]
    fn test_parse_float_prefixes() {
        assert_eq!(parse(parse_float, vec![JsValue::from("3.14abc")]), 3.14);
        assert_eq!(parse(parse_float, vec![JsValue::from(".5")]), 0.5);
        assert_eq!(parse(parse_float, vec![JsValue::from("1e3x")]), 1000.0);
        assert_eq!(parse(parse_float, vec![JsValue::from("2e")]), 2.0);
        assert_eq!(parse(parse_float, vec![JsValue::from("-Infinity")]), f64::NEG_INFINITY);
        assert!(parse(parse_float, vec![JsValue::from("abc")]).is_nan());
    }
}
