use std::collections::HashSet;

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::heap::{Heap, HeapRef};
use crate::runner::ds::value::JsValue;
use crate::runner::stack;

pub const TYPE_STR_UNDEFINED: &str = "undefined";
pub const TYPE_STR_NULL: &str = "null";
pub const TYPE_STR_BOOLEAN: &str = "boolean";
pub const TYPE_STR_STRING: &str = "string";
pub const TYPE_STR_NUMBER: &str = "number";
pub const TYPE_STR_OBJECT: &str = "object";
pub const TYPE_STR_FUNCTION: &str = "function";

/// The result of `typeof`.
pub fn get_type(a: &JsValue) -> &'static str {
    match a {
        JsValue::Undefined => TYPE_STR_UNDEFINED,
        JsValue::Null => TYPE_STR_OBJECT,
        JsValue::Boolean(_) => TYPE_STR_BOOLEAN,
        JsValue::String(_) => TYPE_STR_STRING,
        JsValue::Number(_) => TYPE_STR_NUMBER,
        JsValue::Object(_) | JsValue::Array(_) | JsValue::Worker(_) => TYPE_STR_OBJECT,
        JsValue::Function(_) => TYPE_STR_FUNCTION,
    }
}

pub fn to_boolean(v: &JsValue) -> bool {
    match v {
        JsValue::Undefined | JsValue::Null => false,
        JsValue::Boolean(b) => *b,
        JsValue::Number(n) => !(*n == 0.0 || n.is_nan()),
        JsValue::String(s) => !s.is_empty(),
        JsValue::Object(_) | JsValue::Array(_) | JsValue::Function(_) | JsValue::Worker(_) => true,
    }
}

/// Composite values become their string form; primitives are returned unchanged.
pub fn to_primitive(heap: &Heap, v: &JsValue) -> Result<JsValue, JErrorType> {
    match v {
        JsValue::Object(_) | JsValue::Array(_) | JsValue::Function(_) | JsValue::Worker(_) => {
            Ok(JsValue::String(to_string(heap, v)?))
        }
        _ => Ok(v.clone()),
    }
}

pub fn to_number(heap: &Heap, v: &JsValue) -> Result<f64, JErrorType> {
    Ok(match v {
        JsValue::Undefined => f64::NAN,
        JsValue::Null => 0.0,
        JsValue::Boolean(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        JsValue::Number(n) => *n,
        JsValue::String(s) => string_to_number(s),
        _ => match to_primitive(heap, v)? {
            JsValue::String(s) => string_to_number(&s),
            _ => f64::NAN,
        },
    })
}

/// `Number(text)`: surrounding whitespace is ignored, the empty string is 0
/// and anything that is not a complete numeric literal is `NaN`.
pub fn string_to_number(s: &str) -> f64 {
    let t = s.trim_matches(|c: char| c.is_whitespace() || c == '\u{FEFF}');
    if t.is_empty() {
        return 0.0;
    }
    match t {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    let lower = t.to_ascii_lowercase();
    for (prefix, radix) in [("0x", 16), ("0o", 8), ("0b", 2)] {
        if let Some(digits) = lower.strip_prefix(prefix) {
            if digits.is_empty() {
                return f64::NAN;
            }
            return digits.chars().fold(0f64, |acc, c| match c.to_digit(radix) {
                Some(d) => acc * radix as f64 + d as f64,
                None => f64::NAN,
            });
        }
    }
    let well_formed = t
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
        && t.chars().any(|c| c.is_ascii_digit());
    if !well_formed {
        return f64::NAN;
    }
    t.parse::<f64>().unwrap_or(f64::NAN)
}

/// Formats a number the way `String(n)` does: shortest round-trip digits,
/// exponent notation outside `1e-7 < |n| < 1e21`.
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n < 0.0 {
        return format!("-{}", number_to_string(-n));
    }
    let formatted = format!("{:e}", n);
    let (mantissa, exponent) = match formatted.split_once('e') {
        Some(parts) => parts,
        None => (formatted.as_str(), "0"),
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let k = digits.len() as i32;
    let point = exponent + 1;
    if k <= point && point <= 21 {
        format!("{}{}", digits, "0".repeat((point - k) as usize))
    } else if 0 < point && point <= 21 {
        format!("{}.{}", &digits[..point as usize], &digits[point as usize..])
    } else if -6 < point && point <= 0 {
        format!("0.{}{}", "0".repeat((-point) as usize), digits)
    } else {
        let sign = if point - 1 >= 0 { "+" } else { "-" };
        let e = (point - 1).abs();
        if k == 1 {
            format!("{}e{}{}", digits, sign, e)
        } else {
            format!("{}.{}e{}{}", &digits[..1], &digits[1..], sign, e)
        }
    }
}

/// `n.toString(radix)` for radix other than 10.
pub fn number_to_string_radix(n: f64, radix: u32) -> String {
    if !n.is_finite() || radix == 10 {
        return number_to_string(n);
    }
    let negative = n < 0.0;
    let n = n.abs();
    let mut integer = n.trunc();
    let mut fraction = n - integer;
    let mut int_digits = Vec::new();
    loop {
        let d = (integer % radix as f64) as u32;
        int_digits.push(std::char::from_digit(d, radix).unwrap_or('0'));
        integer = (integer / radix as f64).trunc();
        if integer < 1.0 {
            break;
        }
    }
    let mut out: String = int_digits.iter().rev().collect();
    if fraction > 0.0 {
        out.push('.');
        let mut count = 0;
        while fraction > 0.0 && count < 20 {
            fraction *= radix as f64;
            let d = fraction.trunc() as u32;
            out.push(std::char::from_digit(d, radix).unwrap_or('0'));
            fraction -= d as f64;
            count += 1;
        }
    }
    if negative {
        format!("-{}", out)
    } else {
        out
    }
}

pub fn to_string(heap: &Heap, v: &JsValue) -> Result<String, JErrorType> {
    let mut visiting = HashSet::new();
    to_string_guarded(heap, v, &mut visiting)
}

fn to_string_guarded(heap: &Heap, v: &JsValue, visiting: &mut HashSet<HeapRef>) -> Result<String, JErrorType> {
    Ok(match v {
        JsValue::Undefined => TYPE_STR_UNDEFINED.to_string(),
        JsValue::Null => TYPE_STR_NULL.to_string(),
        JsValue::Boolean(b) => b.to_string(),
        JsValue::Number(n) => number_to_string(*n),
        JsValue::String(s) => s.to_string(),
        JsValue::Array(r) => {
            if !visiting.insert(*r) {
                return Ok(String::new());
            }
            let mut parts = Vec::new();
            for element in &heap.array(*r)?.elements {
                parts.push(if element.is_nullish() {
                    String::new()
                } else {
                    stack::guarded(|| to_string_guarded(heap, element, visiting))?
                });
            }
            visiting.remove(r);
            parts.join(",")
        }
        JsValue::Object(r) => {
            let object = heap.object(*r)?;
            if object.is_error() {
                let name = match object.properties.get("name") {
                    Some(JsValue::String(s)) => s.to_string(),
                    _ => object.class_name.to_string(),
                };
                match object.properties.get("message") {
                    Some(m) if !matches!(m, JsValue::String(s) if s.is_empty()) => {
                        format!("{}: {}", name, to_string_guarded(heap, m, visiting)?)
                    }
                    _ => name,
                }
            } else {
                "[object Object]".to_string()
            }
        }
        JsValue::Function(r) => format!("function {}() {{ [native code] }}", heap.function(*r)?.name()),
        JsValue::Worker(_) => "[object Worker]".to_string(),
    })
}

/// Property keys are strings; numbers use their canonical string form.
pub fn to_property_key(heap: &Heap, v: &JsValue) -> Result<String, JErrorType> {
    match v {
        JsValue::String(s) => Ok(s.to_string()),
        JsValue::Number(n) => Ok(number_to_string(*n)),
        _ => to_string(heap, v),
    }
}

pub fn to_int32(n: f64) -> i32 {
    to_uint32(n) as i32
}

pub fn to_uint32(n: f64) -> u32 {
    if !n.is_finite() {
        return 0;
    }
    let m = n.trunc() % 4294967296.0;
    let m = if m < 0.0 { m + 4294967296.0 } else { m };
    m as u32
}

/// Truncates toward zero, mapping `NaN` to 0.
pub fn to_integer_or_infinity(n: f64) -> f64 {
    if n.is_nan() {
        0.0
    } else {
        n.trunc()
    }
}

/// Resolves a relative index argument (`slice(-2)`) against a length.
pub fn relative_index(n: f64, len: usize) -> usize {
    let n = to_integer_or_infinity(n);
    let len_f = len as f64;
    if n < 0.0 {
        (len_f + n).max(0.0) as usize
    } else {
        n.min(len_f) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_to_string() {
        assert_eq!(number_to_string(5.0), "5");
        assert_eq!(number_to_string(-0.0), "0");
        assert_eq!(number_to_string(1.5), "1.5");
        assert_eq!(number_to_string(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(number_to_string(1e21), "1e+21");
        assert_eq!(number_to_string(123456789012345680000.0), "123456789012345680000");
        assert_eq!(number_to_string(0.000001), "0.000001");
        assert_eq!(number_to_string(1e-7), "1e-7");
        assert_eq!(number_to_string(-2.5e-8), "-2.5e-8");
        assert_eq!(number_to_string(f64::NAN), "NaN");
        assert_eq!(number_to_string(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn test_string_to_number() {
        assert_eq!(string_to_number("  42  "), 42.0);
        assert_eq!(string_to_number(""), 0.0);
        assert_eq!(string_to_number("0x10"), 16.0);
        assert_eq!(string_to_number("-1.5e2"), -150.0);
        assert_eq!(string_to_number("-Infinity"), f64::NEG_INFINITY);
        assert!(string_to_number("12px").is_nan());
        assert!(string_to_number("inf").is_nan());
        assert!(string_to_number(".").is_nan());
    }

    #[test]
    fn test_int32_wrapping() {
        assert_eq!(to_int32(4294967295.0), -1);
        assert_eq!(to_int32(2147483648.0), -2147483648);
        assert_eq!(to_uint32(-1.0), 4294967295);
        assert_eq!(to_int32(f64::NAN), 0);
        assert_eq!(to_int32(-5.7), -5);
    }

    #[test]
    fn test_radix_formatting() {
        assert_eq!(number_to_string_radix(255.0, 16), "ff");
        assert_eq!(number_to_string_radix(-5.0, 2), "-101");
        assert_eq!(number_to_string_radix(0.5, 2), "0.1");
    }

    #[test]
    fn test_relative_index() {
        assert_eq!(relative_index(-2.0, 5), 3);
        assert_eq!(relative_index(10.0, 5), 5);
        assert_eq!(relative_index(-10.0, 5), 0);
        assert_eq!(relative_index(f64::NAN, 5), 0);
    }
}
