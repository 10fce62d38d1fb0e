//! `setTimeout`, `setInterval`, `clearTimeout` and `clearInterval`.
//!
//! Callbacks are queued on the calling context's
//! [`TimerQueue`](crate::runner::timer::TimerQueue) and only run when its
//! owner drains it.

use std::time::Duration;

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::{BuiltInObject, EvalContext, NativeFn};

/// Delays above this many milliseconds overflow to 0, as in browsers.
const MAX_DELAY_MS: f64 = 2_147_483_647.0;

/// Register the timer globals with the registry.
pub fn register(registry: &mut BuiltInRegistry) {
    let functions: [(&str, NativeFn); 4] = [
        ("setTimeout", set_timeout),
        ("setInterval", set_interval),
        ("clearTimeout", clear_timer),
        ("clearInterval", clear_timer),
    ];
    for (name, function) in functions {
        registry.register_object(BuiltInObject::new(name).with_call(function));
    }
}

fn schedule(ctx: &mut EvalContext, args: Vec<JsValue>, repeat: bool) -> Result<JsValue, JErrorType> {
    let mut args = args.into_iter();
    let callback = args.next().unwrap_or(JsValue::Undefined);
    if !callback.is_function() {
        return Err(JErrorType::TypeError(
            "The callback argument must be a function".to_string(),
        ));
    }
    let delay = match args.next() {
        Some(value) => delay_from_ms(ctx.to_number(&value)?),
        None => Duration::ZERO,
    };
    let id = ctx.timers.schedule(callback, args.collect(), delay, repeat);
    Ok(JsValue::Number(id as f64))
}

/// `NaN`, negative and overflowing delays mean "as soon as possible".
fn delay_from_ms(ms: f64) -> Duration {
    if ms.is_nan() || ms <= 0.0 || ms > MAX_DELAY_MS {
        Duration::ZERO
    } else {
        Duration::from_secs_f64(ms / 1000.0)
    }
}

fn set_timeout(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    schedule(ctx, args, false)
}

fn set_interval(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    schedule(ctx, args, true)
}

/// Unknown or malformed ids are ignored.
fn clear_timer(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    if let Some(value) = args.first() {
        let id = ctx.to_number(value)?;
        if id >= 1.0 && id.fract() == 0.0 && id <= u32::MAX as f64 {
            ctx.timers.cancel(id as u32);
        }
    }
    Ok(JsValue::Undefined)
}
