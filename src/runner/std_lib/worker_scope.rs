//! Globals of a worker's own scope: `postMessage`, `close`,
//! `addEventListener`, `removeEventListener` and `self`.

use crate::runner::bridge::{to_host, BridgeMode};
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::{BuiltInObject, EvalContext, NativeFn};
use crate::runner::worker::message::EventType;
use crate::runner::worker::runtime::WorkerScope;

use super::worker::listener_args;

/// Register the worker-scope globals with the registry.
pub fn register(registry: &mut BuiltInRegistry) {
    let functions: [(&str, NativeFn); 4] = [
        ("postMessage", scope_post_message),
        ("close", scope_close),
        ("addEventListener", scope_add_event_listener),
        ("removeEventListener", scope_remove_event_listener),
    ];

    let mut this_scope = BuiltInObject::new("self");
    for (name, function) in functions {
        registry.register_object(BuiltInObject::new(name).with_call(function));
        this_scope = this_scope.add_method(name, function);
    }
    registry.register_object(this_scope);
}

fn scope(ctx: &mut EvalContext) -> Result<&mut WorkerScope, JErrorType> {
    ctx.worker_scope
        .as_mut()
        .ok_or_else(|| JErrorType::TypeError("not running inside a worker".to_string()))
}

fn scope_post_message(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let value = args.into_iter().next().unwrap_or(JsValue::Undefined);
    let message = to_host(ctx, &value, BridgeMode::Clone)?;
    scope(ctx)?.post(message);
    Ok(JsValue::Undefined)
}

fn scope_close(ctx: &mut EvalContext, _this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    scope(ctx)?.closing = true;
    Ok(JsValue::Undefined)
}

fn scope_add_event_listener(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    if let Some((EventType::Message, listener)) = listener_args(ctx, &args)? {
        scope(ctx)?.add_listener(listener);
    }
    Ok(JsValue::Undefined)
}

fn scope_remove_event_listener(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    if let Some((EventType::Message, listener)) = listener_args(ctx, &args)? {
        scope(ctx)?.remove_listener(&listener);
    }
    Ok(JsValue::Undefined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outside_a_worker_is_type_error() {
        let mut ctx = EvalContext::new();
        let result = scope_close(&mut ctx, JsValue::Undefined, vec![]);
        assert!(matches!(result, Err(JErrorType::TypeError(_))));
    }
}
