//! The `Worker` constructor and the methods of worker handles.
//!
//! `Worker(source)` and `new Worker(source)` both spawn. A bare reference to
//! `Worker` only resolves the constructor.

use crate::runner::bridge::{to_host, BridgeMode};
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::{BuiltInObject, EvalContext};
use crate::runner::worker::message::EventType;
use crate::runner::worker::WorkerId;

/// Register the Worker constructor and its prototype methods.
pub fn register(registry: &mut BuiltInRegistry) {
    registry.register_object(
        BuiltInObject::new("Worker")
            .with_call(worker_constructor)
            .with_constructor(worker_constructor),
    );

    registry.register_prototype(
        BuiltInObject::new("Worker")
            .add_method("postMessage", worker_post_message)
            .add_method("terminate", worker_terminate)
            .add_method("addEventListener", worker_add_event_listener)
            .add_method("removeEventListener", worker_remove_event_listener),
    );
}

fn worker_constructor(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let source = match args.first() {
        Some(value) => ctx.to_string(value)?,
        None => {
            return Err(JErrorType::TypeError(
                "Worker requires a script source".to_string(),
            ))
        }
    };
    let config = ctx.config.clone();
    let id = ctx.workers.spawn(source, &config)?;
    Ok(JsValue::Worker(id))
}

fn this_worker(this: &JsValue, method: &str) -> Result<WorkerId, JErrorType> {
    match this {
        JsValue::Worker(id) => Ok(*id),
        _ => Err(JErrorType::TypeError(format!(
            "Worker.prototype.{} called on incompatible receiver",
            method
        ))),
    }
}

fn worker_post_message(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let id = this_worker(&this, "postMessage")?;
    let value = args.into_iter().next().unwrap_or(JsValue::Undefined);
    let message = to_host(ctx, &value, BridgeMode::Clone)?;
    ctx.workers.post(id, message)?;
    Ok(JsValue::Undefined)
}

fn worker_terminate(ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let id = this_worker(&this, "terminate")?;
    ctx.workers.terminate(id)?;
    Ok(JsValue::Undefined)
}

/// The event type and listener of an `add/removeEventListener` call, or
/// `None` when the call has no effect.
pub fn listener_args(ctx: &EvalContext, args: &[JsValue]) -> Result<Option<(EventType, JsValue)>, JErrorType> {
    let name = match args.first() {
        Some(value) => ctx.to_string(value)?,
        None => return Ok(None),
    };
    match (EventType::from_name(&name), args.get(1)) {
        (Some(event), Some(listener)) if listener.is_function() => Ok(Some((event, listener.clone()))),
        _ => Ok(None),
    }
}

fn worker_add_event_listener(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let id = this_worker(&this, "addEventListener")?;
    if let Some((event, listener)) = listener_args(ctx, &args)? {
        ctx.workers.add_listener(id, event, listener);
    }
    Ok(JsValue::Undefined)
}

fn worker_remove_event_listener(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let id = this_worker(&this, "removeEventListener")?;
    if let Some((event, listener)) = listener_args(ctx, &args)? {
        ctx.workers.remove_listener(id, event, &listener);
    }
    Ok(JsValue::Undefined)
}
