//! Math built-in object.
//!
//! Provides mathematical constants and functions.

use rand::Rng;

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::operations::type_conversion::to_uint32;
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::{BuiltInObject, EvalContext};

/// Register the Math object with the registry.
pub fn register(registry: &mut BuiltInRegistry) {
    let math = BuiltInObject::new("Math")
        // Constants
        .add_property("E", JsValue::Number(std::f64::consts::E))
        .add_property("LN10", JsValue::Number(std::f64::consts::LN_10))
        .add_property("LN2", JsValue::Number(std::f64::consts::LN_2))
        .add_property("LOG10E", JsValue::Number(std::f64::consts::LOG10_E))
        .add_property("LOG2E", JsValue::Number(std::f64::consts::LOG2_E))
        .add_property("PI", JsValue::Number(std::f64::consts::PI))
        .add_property("SQRT1_2", JsValue::Number(std::f64::consts::FRAC_1_SQRT_2))
        .add_property("SQRT2", JsValue::Number(std::f64::consts::SQRT_2))
        // Methods
        .add_method("abs", math_abs)
        .add_method("floor", math_floor)
        .add_method("ceil", math_ceil)
        .add_method("round", math_round)
        .add_method("trunc", math_trunc)
        .add_method("sign", math_sign)
        .add_method("min", math_min)
        .add_method("max", math_max)
        .add_method("sqrt", math_sqrt)
        .add_method("cbrt", math_cbrt)
        .add_method("pow", math_pow)
        .add_method("exp", math_exp)
        .add_method("log", math_log)
        .add_method("log10", math_log10)
        .add_method("log2", math_log2)
        .add_method("sin", math_sin)
        .add_method("cos", math_cos)
        .add_method("tan", math_tan)
        .add_method("atan", math_atan)
        .add_method("atan2", math_atan2)
        .add_method("hypot", math_hypot)
        .add_method("random", math_random)
        .add_method("clz32", math_clz32);

    registry.register_object(math);
}

/// The numeric value of argument `index`, `NaN` when absent.
fn arg_number(ctx: &EvalContext, args: &[JsValue], index: usize) -> Result<f64, JErrorType> {
    match args.get(index) {
        Some(value) => ctx.to_number(value),
        None => Ok(f64::NAN),
    }
}

/// Defines a native function applying `f` to the first argument.
macro_rules! unary_math {
    ($name:ident, $f:expr) => {
        fn $name(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
            let f: fn(f64) -> f64 = $f;
            Ok(JsValue::Number(f(arg_number(ctx, &args, 0)?)))
        }
    };
}

unary_math!(math_abs, f64::abs);
unary_math!(math_floor, f64::floor);
unary_math!(math_ceil, f64::ceil);
unary_math!(math_trunc, f64::trunc);
unary_math!(math_sqrt, f64::sqrt);
unary_math!(math_cbrt, f64::cbrt);
unary_math!(math_exp, f64::exp);
unary_math!(math_log, f64::ln);
unary_math!(math_log10, f64::log10);
unary_math!(math_log2, f64::log2);
unary_math!(math_sin, f64::sin);
unary_math!(math_cos, f64::cos);
unary_math!(math_tan, f64::tan);
unary_math!(math_atan, f64::atan);

/// Math.round rounds halves toward +Infinity, unlike `f64::round`.
fn math_round(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let x = arg_number(ctx, &args, 0)?;
    if !x.is_finite() || x == 0.0 {
        return Ok(JsValue::Number(x));
    }
    let rounded = (x + 0.5).floor();
    // -0.5 < x < 0 rounds to -0
    if rounded == 0.0 && x < 0.0 {
        return Ok(JsValue::Number(-0.0));
    }
    Ok(JsValue::Number(rounded))
}

fn math_sign(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let x = arg_number(ctx, &args, 0)?;
    Ok(JsValue::Number(if x.is_nan() || x == 0.0 {
        x
    } else if x > 0.0 {
        1.0
    } else {
        -1.0
    }))
}

/// Math.min, `Infinity` with no arguments; any `NaN` argument wins.
fn math_min(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let mut result = f64::INFINITY;
    for value in &args {
        let x = ctx.to_number(value)?;
        if x.is_nan() {
            return Ok(JsValue::Number(f64::NAN));
        }
        if x < result || (x == 0.0 && result == 0.0 && x.is_sign_negative()) {
            result = x;
        }
    }
    Ok(JsValue::Number(result))
}

/// Math.max, `-Infinity` with no arguments; any `NaN` argument wins.
fn math_max(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let mut result = f64::NEG_INFINITY;
    for value in &args {
        let x = ctx.to_number(value)?;
        if x.is_nan() {
            return Ok(JsValue::Number(f64::NAN));
        }
        if x > result || (x == 0.0 && result == 0.0 && x.is_sign_positive()) {
            result = x;
        }
    }
    Ok(JsValue::Number(result))
}

fn math_pow(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let base = arg_number(ctx, &args, 0)?;
    let exp = arg_number(ctx, &args, 1)?;
    if exp.is_nan() || (base.abs() == 1.0 && exp.is_infinite()) {
        return Ok(JsValue::Number(f64::NAN));
    }
    Ok(JsValue::Number(base.powf(exp)))
}

fn math_atan2(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let y = arg_number(ctx, &args, 0)?;
    let x = arg_number(ctx, &args, 1)?;
    Ok(JsValue::Number(y.atan2(x)))
}

fn math_hypot(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let mut sum = 0.0;
    let mut saw_nan = false;
    for value in &args {
        let x = ctx.to_number(value)?;
        if x.is_infinite() {
            return Ok(JsValue::Number(f64::INFINITY));
        }
        saw_nan |= x.is_nan();
        sum += x * x;
    }
    Ok(JsValue::Number(if saw_nan { f64::NAN } else { sum.sqrt() }))
}

/// Math.random, uniform in [0, 1).
fn math_random(_ctx: &mut EvalContext, _this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(JsValue::Number(rand::thread_rng().gen::<f64>()))
}

/// Math.clz32 - Count leading zeros in 32-bit integer.
fn math_clz32(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let x = to_uint32(arg_number(ctx, &args, 0)?);
    Ok(JsValue::Number(x.leading_zeros() as f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(f: fn(&mut EvalContext, JsValue, Vec<JsValue>) -> Result<JsValue, JErrorType>, args: Vec<f64>) -> f64 {
        let mut ctx = EvalContext::new();
        let args = args.into_iter().map(JsValue::Number).collect();
        match f(&mut ctx, JsValue::Undefined, args).unwrap() {
            JsValue::Number(n) => n,
            other => panic!("expected number, got {:?}", other),
        }
    }

    #[test]
    fn test_round_halves_toward_positive_infinity() {
        assert_eq!(call(math_round, vec![2.5]), 3.0);
        assert_eq!(call(math_round, vec![-2.5]), -2.0);
        assert!(call(math_round, vec![-0.2]).is_sign_negative());
    }

    #[test]
    fn test_min_max_edges() {
        assert_eq!(call(math_min, vec![]), f64::INFINITY);
        assert_eq!(call(math_max, vec![]), f64::NEG_INFINITY);
        assert!(call(math_max, vec![1.0, f64::NAN]).is_nan());
        assert_eq!(call(math_max, vec![1.0, 7.0, 3.0]), 7.0);
    }

    #[test]
    fn test_random_in_unit_interval() {
        for _ in 0..100 {
            let r = call(math_random, vec![]);
            assert!((0.0..1.0).contains(&r));
        }
    }

    #[test]
    fn test_clz32() {
        assert_eq!(call(math_clz32, vec![1.0]), 31.0);
        assert_eq!(call(math_clz32, vec![0.0]), 32.0);
    }
}
