//! Turning channel traffic into script calls.
//!
//! [`dispatch_event`] runs on the owner side for events coming out of a
//! worker; [`dispatch_inbound`] runs inside a worker for messages coming in.
//! Both only ever run at a safe point, between evaluations.

use log::{debug, trace, warn};

use crate::runner::bridge::{from_host, BridgeMode, HostValue};
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::function::call_function;
use crate::runner::eval::property::get_property;
use crate::runner::plugin::types::EvalContext;
use crate::runner::timer::run_due_timers;

use super::message::{EventType, WorkerEvent, WorkerEventKind};

/// Deliver one event from a worker this context owns.
pub fn dispatch_event(ctx: &mut EvalContext, event: WorkerEvent) -> Result<(), JErrorType> {
    let id = event.worker;
    match event.kind {
        WorkerEventKind::Exited(state) => {
            debug!("worker {} exited as {}", id, state);
            ctx.workers.handle_exit(id);
        }
        _ if ctx.workers.was_terminated(id) => {
            trace!("dropping event of terminated worker {}", id);
        }
        WorkerEventKind::Message(value) => {
            let handlers = ctx.workers.handlers(id, EventType::Message);
            if handlers.is_empty() {
                ctx.workers.push_unclaimed(id, value);
                return Ok(());
            }
            let data = from_host(ctx, &value, BridgeMode::Clone)?;
            let event = ctx.new_object_with(vec![("type", JsValue::from("message")), ("data", data)])?;
            call_handlers(ctx, &handlers, JsValue::Worker(id), event)?;
        }
        WorkerEventKind::Error { message } => {
            let handlers = ctx.workers.handlers(id, EventType::Error);
            if handlers.is_empty() {
                warn!("unhandled error in worker {}: {}", id, message);
                ctx.workers.push_error(JErrorType::WorkerCrash { worker: id, message });
                return Ok(());
            }
            let event = ctx.new_object_with(vec![
                ("type", JsValue::from("error")),
                ("message", JsValue::from(message)),
            ])?;
            call_handlers(ctx, &handlers, JsValue::Worker(id), event)?;
        }
    }
    Ok(())
}

/// Deliver a message posted to the worker whose global context is `ctx`.
pub fn dispatch_inbound(ctx: &mut EvalContext, value: &HostValue) -> Result<(), JErrorType> {
    let handlers = inbound_handlers(ctx)?;
    if handlers.is_empty() {
        trace!("worker has no message handler, dropping message");
        return Ok(());
    }
    let data = from_host(ctx, value, BridgeMode::Clone)?;
    let event = ctx.new_object_with(vec![("type", JsValue::from("message")), ("data", data)])?;
    let this = worker_self(ctx)?;
    call_handlers(ctx, &handlers, this, event)
}

/// Whether a message posted to this worker would reach any script code.
pub fn has_message_handler(ctx: &mut EvalContext) -> Result<bool, JErrorType> {
    Ok(!inbound_handlers(ctx)?.is_empty())
}

/// The global `onmessage`, then `self.onmessage`, then listeners.
fn inbound_handlers(ctx: &mut EvalContext) -> Result<Vec<JsValue>, JErrorType> {
    let mut handlers = Vec::new();
    if let Some(global) = ctx.global_binding_value("onmessage")? {
        if global.is_function() {
            handlers.push(global);
        }
    }
    let this = worker_self(ctx)?;
    if let JsValue::Object(_) = this {
        let on = get_property(ctx, &this, "onmessage")?;
        if on.is_function() && !handlers.contains(&on) {
            handlers.push(on);
        }
    }
    if let Some(scope) = &ctx.worker_scope {
        for listener in &scope.message_listeners {
            if !handlers.contains(listener) {
                handlers.push(listener.clone());
            }
        }
    }
    Ok(handlers)
}

fn worker_self(ctx: &mut EvalContext) -> Result<JsValue, JErrorType> {
    if !ctx.super_global.has_name("self") {
        return Ok(JsValue::Undefined);
    }
    ctx.super_global.resolve_binding("self", &mut ctx.heap)
}

fn call_handlers(ctx: &mut EvalContext, handlers: &[JsValue], this: JsValue, event: JsValue) -> Result<(), JErrorType> {
    for handler in handlers {
        call_function(ctx, handler, this.clone(), vec![event.clone()])?;
    }
    Ok(())
}

/// Dispatch every event already waiting, then every timer already due,
/// without blocking. Returns how many events and timers were handled.
pub fn pump(ctx: &mut EvalContext) -> Result<usize, JErrorType> {
    let events = ctx.workers.events().clone();
    let mut handled = 0;
    while let Ok(event) = events.try_recv() {
        ctx.reset_budget();
        dispatch_event(ctx, event)?;
        handled += 1;
    }
    handled += run_due_timers(ctx)?;
    Ok(handled)
}
