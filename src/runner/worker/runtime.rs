//! The worker thread: run the script, then serve messages until there is
//! nothing left to wait for.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{after, never, select, Receiver, Sender};
use log::{debug, trace};

use crate::parser::JsParser;
use crate::runner::bridge::HostValue;
use crate::runner::config::ContextConfig;
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::heap::HeapRef;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::statement::execute_program;
use crate::runner::plugin::types::EvalContext;
use crate::runner::timer::run_due_timers;

use super::events::{dispatch_event, dispatch_inbound, has_message_handler};
use super::message::{WorkerCommand, WorkerEvent, WorkerEventKind};
use super::{WorkerId, WorkerShared, WorkerState};

/// The worker side of the channel pair, reachable from native functions
/// through `EvalContext::worker_scope`.
pub struct WorkerScope {
    pub id: WorkerId,
    outbox: Sender<WorkerEvent>,
    /// Set by `close()`; the worker stops after the current task.
    pub closing: bool,
    /// Listeners added with `addEventListener("message", f)`.
    pub message_listeners: Vec<JsValue>,
}

impl WorkerScope {
    pub fn new(id: WorkerId, outbox: Sender<WorkerEvent>) -> Self {
        WorkerScope {
            id,
            outbox,
            closing: false,
            message_listeners: Vec::new(),
        }
    }

    /// Send a message to the owner. Never blocks.
    pub fn post(&self, value: HostValue) {
        self.send(WorkerEventKind::Message(value));
    }

    fn send(&self, kind: WorkerEventKind) {
        let event = WorkerEvent { worker: self.id, kind };
        if self.outbox.send(event).is_err() {
            trace!("owner of worker {} is gone", self.id);
        }
    }

    pub fn add_listener(&mut self, listener: JsValue) {
        if !self.message_listeners.contains(&listener) {
            self.message_listeners.push(listener);
        }
    }

    pub fn remove_listener(&mut self, listener: &JsValue) {
        self.message_listeners.retain(|l| l != listener);
    }

    pub fn roots(&self) -> Vec<HeapRef> {
        self.message_listeners.iter().filter_map(|l| l.heap_ref()).collect()
    }
}

/// Start the thread of a worker.
pub fn spawn(
    shared: Arc<WorkerShared>,
    source: String,
    config: ContextConfig,
    inbox: Receiver<WorkerCommand>,
    outbox: Sender<WorkerEvent>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("js-worker-{}", shared.id))
        .stack_size(config.worker_stack_size)
        .spawn(move || run_worker(shared, source, config, inbox, outbox))
}

fn run_worker(
    shared: Arc<WorkerShared>,
    source: String,
    config: ContextConfig,
    inbox: Receiver<WorkerCommand>,
    outbox: Sender<WorkerEvent>,
) {
    let id = shared.id;
    shared.mark_running();
    let scope = WorkerScope::new(id, outbox.clone());
    let mut ctx = EvalContext::for_worker(&config, scope, shared.cancel_flag());

    let outcome = match run(&mut ctx, &source, &inbox) {
        Ok(state) => state,
        Err(JErrorType::Terminated) => WorkerState::Terminated,
        Err(error) => {
            let error = ctx.uncaught_error(error);
            debug!("worker {} failed: {}", id, error);
            if let Some(scope) = &ctx.worker_scope {
                scope.send(WorkerEventKind::Error {
                    message: error.to_string(),
                });
            }
            WorkerState::Crashed
        }
    };
    let state = shared.finish(outcome);

    // Nested workers end with this one.
    drop(ctx);
    let _ = outbox.send(WorkerEvent {
        worker: id,
        kind: WorkerEventKind::Exited(state),
    });
}

fn run(ctx: &mut EvalContext, source: &str, inbox: &Receiver<WorkerCommand>) -> Result<WorkerState, JErrorType> {
    let program = JsParser::parse_to_ast_from_str(source)?;
    ctx.reset_budget();
    execute_program(&program, source, ctx)?;

    let nested = ctx.workers.events().clone();
    loop {
        ctx.check_cancelled()?;
        run_due_timers(ctx)?;
        if ctx.worker_scope.as_ref().map_or(false, |s| s.closing) {
            return Ok(WorkerState::Terminated);
        }
        if !has_message_handler(ctx)?
            && !ctx.workers.has_live_workers()
            && nested.is_empty()
            && ctx.timers.is_empty()
        {
            return Ok(WorkerState::Finished);
        }
        ctx.maybe_collect_garbage();

        let timer = match ctx.timers.next_due() {
            Some(due) => after(due.saturating_duration_since(Instant::now())),
            None => never(),
        };
        select! {
            recv(inbox) -> command => match command {
                Ok(WorkerCommand::Message(value)) => {
                    ctx.reset_budget();
                    dispatch_inbound(ctx, &value)?;
                }
                Ok(WorkerCommand::Terminate) | Err(_) => return Ok(WorkerState::Terminated),
            },
            recv(nested) -> event => {
                if let Ok(event) = event {
                    ctx.reset_budget();
                    dispatch_event(ctx, event)?;
                }
            }
            recv(timer) -> _ => {}
        }
    }
}
