use crate::runner::ds::error::JErrorType;
use crate::runner::ds::heap::Heap;
use crate::runner::ds::operations::type_conversion::{string_to_number, to_number, to_primitive};
use crate::runner::ds::value::JsValue;

/// `===`
pub fn strict_equality_comparison(a: &JsValue, b: &JsValue) -> bool {
    a == b
}

/// SameValueZero, as used by `includes`: like `===` except `NaN` equals itself.
pub fn same_value_zero(a: &JsValue, b: &JsValue) -> bool {
    match (a, b) {
        (JsValue::Number(x), JsValue::Number(y)) if x.is_nan() && y.is_nan() => true,
        _ => a == b,
    }
}

fn is_composite(v: &JsValue) -> bool {
    matches!(
        v,
        JsValue::Object(_) | JsValue::Array(_) | JsValue::Function(_) | JsValue::Worker(_)
    )
}

/// `==`
pub fn abstract_equality_comparison(heap: &Heap, a: &JsValue, b: &JsValue) -> Result<bool, JErrorType> {
    Ok(match (a, b) {
        (JsValue::Undefined | JsValue::Null, JsValue::Undefined | JsValue::Null) => true,
        (JsValue::Undefined | JsValue::Null, _) | (_, JsValue::Undefined | JsValue::Null) => false,
        (JsValue::Number(x), JsValue::String(s)) => *x == string_to_number(s),
        (JsValue::String(s), JsValue::Number(y)) => string_to_number(s) == *y,
        (JsValue::Boolean(x), _) => {
            abstract_equality_comparison(heap, &JsValue::Number(if *x { 1.0 } else { 0.0 }), b)?
        }
        (_, JsValue::Boolean(y)) => {
            abstract_equality_comparison(heap, a, &JsValue::Number(if *y { 1.0 } else { 0.0 }))?
        }
        (x, y) if is_composite(x) && !is_composite(y) => {
            abstract_equality_comparison(heap, &to_primitive(heap, x)?, y)?
        }
        (x, y) if !is_composite(x) && is_composite(y) => {
            abstract_equality_comparison(heap, x, &to_primitive(heap, y)?)?
        }
        _ => a == b,
    })
}

/// `a < b`. `None` stands for the undefined result of comparing with `NaN`.
pub fn abstract_relational_comparison(heap: &Heap, a: &JsValue, b: &JsValue) -> Result<Option<bool>, JErrorType> {
    let pa = to_primitive(heap, a)?;
    let pb = to_primitive(heap, b)?;
    if let (JsValue::String(x), JsValue::String(y)) = (&pa, &pb) {
        return Ok(Some(x.encode_utf16().lt(y.encode_utf16())));
    }
    let x = to_number(heap, &pa)?;
    let y = to_number(heap, &pb)?;
    if x.is_nan() || y.is_nan() {
        Ok(None)
    } else {
        Ok(Some(x < y))
    }
}
