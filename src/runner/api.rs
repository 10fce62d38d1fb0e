//! The host-facing execution context.

use std::time::{Duration, Instant};

use crossbeam_channel::RecvTimeoutError;
use log::trace;
use uuid::Uuid;

use crate::parser::JsParser;
use crate::runner::bridge::{from_host, to_host, BridgeMode, FunctionToken, HostValue};
use crate::runner::config::ContextConfig;
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::function::call_function;
use crate::runner::eval::statement::execute_program;
use crate::runner::plugin::resolver::PluginResolver;
use crate::runner::plugin::types::EvalContext;
use crate::runner::worker::events::{dispatch_event, pump};
use crate::runner::worker::{WorkerId, WorkerState};

/// An isolated script environment whose global bindings persist across
/// [`eval`](Context::eval) calls.
///
/// Workers spawned by scripts of this context report back through a channel
/// that is only drained when the host asks: [`pump_worker_events`],
/// [`wait_for_worker_event`] or [`run_until_workers_idle`]. The same calls
/// run due `setTimeout`/`setInterval` callbacks. `eval` itself never runs
/// worker handlers or timers. Dropping the context terminates and joins all
/// of its workers.
///
/// [`pump_worker_events`]: Context::pump_worker_events
/// [`wait_for_worker_event`]: Context::wait_for_worker_event
/// [`run_until_workers_idle`]: Context::run_until_workers_idle
pub struct Context {
    ctx: EvalContext,
}

impl Context {
    pub fn new() -> Self {
        Self::with_config(ContextConfig::default())
    }

    pub fn with_config(config: ContextConfig) -> Self {
        Context {
            ctx: EvalContext::with_config(config),
        }
    }

    /// Identifies this context in function tokens and object identities.
    pub fn id(&self) -> Uuid {
        self.ctx.realm_id
    }

    pub fn config(&self) -> &ContextConfig {
        &self.ctx.config
    }

    /// Make `resolver`'s bindings visible to later evaluations.
    pub fn add_resolver(&mut self, resolver: Box<dyn PluginResolver>) {
        self.ctx.add_resolver(resolver);
    }

    /// Parse and run `source` against the global scope, returning the
    /// completion value of its last statement.
    pub fn eval(&mut self, source: &str) -> Result<HostValue, JErrorType> {
        let program = JsParser::parse_to_ast_from_str(source)?;
        self.enter();
        trace!("context {} evaluating {} statements", self.ctx.realm_id, program.body.len());
        let value = execute_program(&program, source, &mut self.ctx).map_err(|e| self.leave(e))?;
        to_host(&mut self.ctx, &value, BridgeMode::Host)
    }

    /// Bind `name` in the global scope, replacing a previous `var` binding.
    pub fn set_global(&mut self, name: &str, value: HostValue) -> Result<(), JErrorType> {
        self.enter();
        let value = from_host(&mut self.ctx, &value, BridgeMode::Host)?;
        self.ctx.set_binding(name, value)
    }

    pub fn get_global(&mut self, name: &str) -> Result<HostValue, JErrorType> {
        self.enter();
        let value = self.ctx.get_binding(name)?;
        to_host(&mut self.ctx, &value, BridgeMode::Host)
    }

    /// Call a function previously returned to the host, with `this` undefined.
    pub fn call(&mut self, function: &FunctionToken, args: Vec<HostValue>) -> Result<HostValue, JErrorType> {
        self.enter();
        let callee = from_host(&mut self.ctx, &HostValue::Function(function.clone()), BridgeMode::Host)?;
        let mut js_args = Vec::with_capacity(args.len());
        for arg in &args {
            js_args.push(from_host(&mut self.ctx, arg, BridgeMode::Host)?);
        }
        let value = call_function(&mut self.ctx, &callee, JsValue::Undefined, js_args).map_err(|e| self.leave(e))?;
        to_host(&mut self.ctx, &value, BridgeMode::Host)
    }

    /// Let the function behind `function` be collected once scripts no
    /// longer reference it. Returns false for an unknown or released token.
    pub fn release_function(&mut self, function: &FunctionToken) -> bool {
        match function.heap_ref_in(self.ctx.realm_id) {
            Some(heap_ref) => self.ctx.unpin(heap_ref),
            None => false,
        }
    }

    // ---- workers ----

    /// Dispatch every worker event already received and run every timer
    /// already due, without blocking. Returns how many were handled.
    pub fn pump_worker_events(&mut self) -> Result<usize, JErrorType> {
        self.enter();
        pump(&mut self.ctx).map_err(|e| self.leave(e))
    }

    /// Block until a worker event arrives, a timer falls due or `timeout`
    /// passes, then dispatch everything pending. Returns false when nothing
    /// was handled.
    pub fn wait_for_worker_event(&mut self, timeout: Duration) -> Result<bool, JErrorType> {
        let deadline = Instant::now() + timeout;
        let wake = match self.ctx.timers.next_due() {
            Some(due) if due < deadline => due,
            _ => deadline,
        };
        let events = self.ctx.workers.events().clone();
        match events.recv_timeout(wake.saturating_duration_since(Instant::now())) {
            Ok(event) => {
                self.enter();
                dispatch_event(&mut self.ctx, event).map_err(|e| self.leave(e))?;
                self.pump_worker_events()?;
                Ok(true)
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) if wake < deadline => {
                Ok(self.pump_worker_events()? > 0)
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => Ok(false),
        }
    }

    /// Dispatch worker events and run timers until no worker is live, no
    /// timer is pending and no event is waiting. Returns false when
    /// `timeout` passes first.
    pub fn run_until_workers_idle(&mut self, timeout: Duration) -> Result<bool, JErrorType> {
        let deadline = Instant::now() + timeout;
        loop {
            self.pump_worker_events()?;
            if !self.ctx.workers.has_live_workers()
                && self.ctx.workers.events().is_empty()
                && self.ctx.timers.is_empty()
            {
                return Ok(true);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(false);
            }
            self.wait_for_worker_event(remaining)?;
        }
    }

    /// Every worker this context spawned, in spawn order.
    pub fn worker_ids(&self) -> Vec<WorkerId> {
        self.ctx.workers.ids()
    }

    /// The number of workers still running.
    pub fn worker_count(&self) -> usize {
        self.ctx.workers.live_count()
    }

    pub fn worker_state(&self, id: WorkerId) -> Option<WorkerState> {
        self.ctx.workers.state(id)
    }

    /// Send a message to a worker as if the script had called `postMessage`.
    pub fn post_to_worker(&mut self, id: WorkerId, message: HostValue) -> Result<(), JErrorType> {
        message.check_cloneable()?;
        self.ctx.workers.post(id, message)
    }

    pub fn terminate_worker(&mut self, id: WorkerId) -> Result<(), JErrorType> {
        self.ctx.workers.terminate(id)
    }

    /// Messages from `id` that arrived while it had no message handler.
    pub fn take_worker_messages(&mut self, id: WorkerId) -> Vec<HostValue> {
        self.ctx.workers.take_unclaimed(id)
    }

    /// Worker crashes no `onerror` handler observed.
    pub fn take_worker_errors(&mut self) -> Vec<JErrorType> {
        self.ctx.workers.take_errors()
    }

    /// Drop the records of workers whose exit was already dispatched,
    /// including messages never taken with [`take_worker_messages`].
    /// Returns how many workers were forgotten.
    ///
    /// [`take_worker_messages`]: Context::take_worker_messages
    pub fn reap_workers(&mut self) -> usize {
        self.ctx.workers.reap()
    }

    /// `setTimeout`/`setInterval` callbacks still scheduled.
    pub fn pending_timers(&self) -> usize {
        self.ctx.timers.len()
    }

    // ---- memory ----

    /// Collect unreachable heap cells now. Returns how many were freed.
    pub fn collect_garbage(&mut self) -> usize {
        self.reset_scope();
        self.ctx.collect_garbage()
    }

    /// Live heap cells.
    pub fn heap_size(&self) -> usize {
        self.ctx.heap.len()
    }

    /// Every host entry is a safe point: no evaluation is in progress.
    fn enter(&mut self) {
        self.reset_scope();
        self.ctx.reset_budget();
        self.ctx.maybe_collect_garbage();
    }

    fn reset_scope(&mut self) {
        self.ctx.lex_env = self.ctx.global_env;
        self.ctx.this_value = JsValue::Undefined;
    }

    /// Map an error leaving script code to its host form.
    fn leave(&mut self, error: JErrorType) -> JErrorType {
        let error = self.ctx.uncaught_error(error);
        self.reset_scope();
        error
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
