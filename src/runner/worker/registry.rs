//! The owner-side record of every worker a context spawned.
//!
//! Script-visible state of a worker handle (its `onmessage`/`onerror`
//! handlers, listeners and expando properties) lives here rather than on the
//! heap, since a `JsValue::Worker` is only an id.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, warn};

use crate::runner::bridge::HostValue;
use crate::runner::config::ContextConfig;
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::heap::HeapRef;
use crate::runner::ds::object::PropertyMap;
use crate::runner::ds::value::JsValue;

use super::message::{EventType, WorkerCommand, WorkerEvent};
use super::runtime;
use super::{WorkerId, WorkerShared, WorkerState};

struct WorkerEntry {
    shared: Arc<WorkerShared>,
    commands: Sender<WorkerCommand>,
    thread: Option<JoinHandle<()>>,
    onmessage: JsValue,
    onerror: JsValue,
    listeners: Vec<(EventType, JsValue)>,
    properties: PropertyMap,
    /// Messages that arrived while no message handler was attached.
    unclaimed: Vec<HostValue>,
}

pub struct WorkerRegistry {
    entries: HashMap<WorkerId, WorkerEntry>,
    order: Vec<WorkerId>,
    events_tx: Sender<WorkerEvent>,
    events_rx: Receiver<WorkerEvent>,
    /// Crash reports nobody handled.
    errors: Vec<JErrorType>,
    max_workers: Option<usize>,
}

impl WorkerRegistry {
    pub fn new(max_workers: Option<usize>) -> Self {
        let (events_tx, events_rx) = unbounded();
        WorkerRegistry {
            entries: HashMap::new(),
            order: Vec::new(),
            events_tx,
            events_rx,
            errors: Vec::new(),
            max_workers,
        }
    }

    /// Start a worker running `source` on its own thread.
    pub fn spawn(&mut self, source: String, config: &ContextConfig) -> Result<WorkerId, JErrorType> {
        if let Some(max) = self.max_workers {
            if self.live_count() >= max {
                return Err(JErrorType::ResourceExceeded(format!(
                    "Worker limit of {} reached",
                    max
                )));
            }
        }

        let id = WorkerId::new();
        let shared = Arc::new(WorkerShared::new(id));
        let (commands, inbox) = unbounded();
        let thread = runtime::spawn(shared.clone(), source, config.clone(), inbox, self.events_tx.clone())
            .map_err(|e| JErrorType::ResourceExceeded(format!("Failed to start worker thread: {}", e)))?;
        debug!("spawned worker {}", id);

        self.entries.insert(
            id,
            WorkerEntry {
                shared,
                commands,
                thread: Some(thread),
                onmessage: JsValue::Undefined,
                onerror: JsValue::Undefined,
                listeners: Vec::new(),
                properties: PropertyMap::new(),
                unclaimed: Vec::new(),
            },
        );
        self.order.push(id);
        Ok(id)
    }

    fn entry(&self, id: WorkerId) -> Result<&WorkerEntry, JErrorType> {
        self.entries
            .get(&id)
            .ok_or_else(|| JErrorType::TypeError(format!("Unknown worker {}", id)))
    }

    pub fn contains(&self, id: WorkerId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn state(&self, id: WorkerId) -> Option<WorkerState> {
        self.entries.get(&id).map(|e| e.shared.state())
    }

    /// Whether the owner terminated this worker. Unlike a worker closing
    /// itself, this also discards the events it already sent.
    pub fn was_terminated(&self, id: WorkerId) -> bool {
        self.entries.get(&id).map_or(false, |e| e.shared.is_cancelled())
    }

    /// Queue a message for the worker. Never blocks.
    pub fn post(&self, id: WorkerId, value: HostValue) -> Result<(), JErrorType> {
        let entry = self.entry(id)?;
        match entry.shared.state() {
            WorkerState::Terminated => Err(JErrorType::TypeError(
                "Worker has been terminated".to_string(),
            )),
            state @ (WorkerState::Finished | WorkerState::Crashed) => {
                warn!("dropping message to {} worker {}", state, id);
                Ok(())
            }
            WorkerState::Created | WorkerState::Running => {
                if entry.commands.send(WorkerCommand::Message(value)).is_err() {
                    warn!("dropping message to exited worker {}", id);
                }
                Ok(())
            }
        }
    }

    /// Stop a worker. Returns at once; the thread notices at its next
    /// loop iteration, call or wait.
    pub fn terminate(&self, id: WorkerId) -> Result<(), JErrorType> {
        let entry = self.entry(id)?;
        entry.shared.terminate();
        let _ = entry.commands.send(WorkerCommand::Terminate);
        Ok(())
    }

    /// Every worker this registry spawned, in spawn order.
    pub fn ids(&self) -> Vec<WorkerId> {
        self.order.clone()
    }

    pub fn live_count(&self) -> usize {
        self.entries.values().filter(|e| e.shared.state().is_live()).count()
    }

    pub fn has_live_workers(&self) -> bool {
        self.entries.values().any(|e| e.shared.state().is_live())
    }

    /// Events from every worker of this registry, in arrival order.
    pub fn events(&self) -> &Receiver<WorkerEvent> {
        &self.events_rx
    }

    /// Reap the thread of a worker that reported its exit.
    pub fn handle_exit(&mut self, id: WorkerId) {
        if let Some(thread) = self.entries.get_mut(&id).and_then(|e| e.thread.take()) {
            if thread.join().is_err() {
                warn!("worker {} thread panicked", id);
            }
        }
    }

    /// Forget every worker that exited and whose exit was already handled,
    /// along with its handlers, properties and unclaimed messages. Handles
    /// scripts still hold then behave like unknown workers. Returns how many
    /// workers were removed.
    pub fn reap(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|id, entry| {
            let keep = entry.shared.state().is_live() || entry.thread.is_some();
            if !keep {
                debug!("reaped worker {}", id);
            }
            keep
        });
        let entries = &self.entries;
        self.order.retain(|id| entries.contains_key(id));
        before - self.entries.len()
    }

    // ---- script-visible handle state ----

    pub fn handler(&self, id: WorkerId, event: EventType) -> JsValue {
        match self.entries.get(&id) {
            Some(entry) => match event {
                EventType::Message => entry.onmessage.clone(),
                EventType::Error => entry.onerror.clone(),
            },
            None => JsValue::Undefined,
        }
    }

    pub fn set_handler(&mut self, id: WorkerId, event: EventType, value: JsValue) {
        if let Some(entry) = self.entries.get_mut(&id) {
            match event {
                EventType::Message => entry.onmessage = value,
                EventType::Error => entry.onerror = value,
            }
        }
    }

    /// Adding the same listener twice has no effect.
    pub fn add_listener(&mut self, id: WorkerId, event: EventType, listener: JsValue) {
        if let Some(entry) = self.entries.get_mut(&id) {
            if !entry.listeners.iter().any(|(e, l)| *e == event && *l == listener) {
                entry.listeners.push((event, listener));
            }
        }
    }

    pub fn remove_listener(&mut self, id: WorkerId, event: EventType, listener: &JsValue) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.listeners.retain(|(e, l)| !(*e == event && l == listener));
        }
    }

    /// The functions to call for `event`: the `on*` handler, then listeners
    /// in registration order.
    pub fn handlers(&self, id: WorkerId, event: EventType) -> Vec<JsValue> {
        let entry = match self.entries.get(&id) {
            Some(entry) => entry,
            None => return Vec::new(),
        };
        let mut handlers = Vec::new();
        let on = match event {
            EventType::Message => &entry.onmessage,
            EventType::Error => &entry.onerror,
        };
        if on.is_function() {
            handlers.push(on.clone());
        }
        handlers.extend(
            entry
                .listeners
                .iter()
                .filter(|(e, _)| *e == event)
                .map(|(_, l)| l.clone()),
        );
        handlers
    }

    pub fn property(&self, id: WorkerId, key: &str) -> Option<JsValue> {
        self.entries.get(&id).and_then(|e| e.properties.get(key).cloned())
    }

    pub fn set_property(&mut self, id: WorkerId, key: &str, value: JsValue) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.properties.set(key, value);
        }
    }

    pub fn remove_property(&mut self, id: WorkerId, key: &str) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.properties.remove(key);
        }
    }

    pub fn property_keys(&self, id: WorkerId) -> Vec<String> {
        self.entries.get(&id).map(|e| e.properties.keys()).unwrap_or_default()
    }

    pub fn push_unclaimed(&mut self, id: WorkerId, value: HostValue) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.unclaimed.push(value);
        }
    }

    pub fn take_unclaimed(&mut self, id: WorkerId) -> Vec<HostValue> {
        self.entries
            .get_mut(&id)
            .map(|e| std::mem::take(&mut e.unclaimed))
            .unwrap_or_default()
    }

    pub fn push_error(&mut self, error: JErrorType) {
        self.errors.push(error);
    }

    pub fn take_errors(&mut self) -> Vec<JErrorType> {
        std::mem::take(&mut self.errors)
    }

    /// Heap cells reachable from worker handles.
    pub fn roots(&self) -> Vec<HeapRef> {
        let mut roots = Vec::new();
        for entry in self.entries.values() {
            roots.extend(entry.onmessage.heap_ref());
            roots.extend(entry.onerror.heap_ref());
            roots.extend(entry.listeners.iter().filter_map(|(_, l)| l.heap_ref()));
            roots.extend(entry.properties.values().filter_map(|v| v.heap_ref()));
        }
        roots
    }
}

impl Drop for WorkerRegistry {
    /// Workers do not outlive their owner.
    fn drop(&mut self) {
        for entry in self.entries.values() {
            entry.shared.terminate();
            let _ = entry.commands.send(WorkerCommand::Terminate);
        }
        for (id, entry) in self.entries.iter_mut() {
            if let Some(thread) = entry.thread.take() {
                if thread.join().is_err() {
                    warn!("worker {} thread panicked", id);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_worker() {
        let registry = WorkerRegistry::new(None);
        let id = WorkerId::new();
        assert!(matches!(registry.post(id, HostValue::Null), Err(JErrorType::TypeError(_))));
        assert_eq!(registry.state(id), None);
        assert_eq!(registry.handler(id, EventType::Message), JsValue::Undefined);
        assert!(!registry.has_live_workers());
    }

    #[test]
    fn test_worker_limit() {
        let mut registry = WorkerRegistry::new(Some(0));
        let result = registry.spawn("1".to_string(), &ContextConfig::default());
        assert!(matches!(result, Err(JErrorType::ResourceExceeded(_))));
    }
}
