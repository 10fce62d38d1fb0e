//! What travels over worker channels. Payloads are [`HostValue`]s, so no
//! heap handle ever crosses a thread.

use crate::runner::bridge::HostValue;

use super::{WorkerId, WorkerState};

/// Owner to worker.
#[derive(Debug, Clone)]
pub enum WorkerCommand {
    Message(HostValue),
    Terminate,
}

/// Worker to owner.
#[derive(Debug, Clone)]
pub struct WorkerEvent {
    pub worker: WorkerId,
    pub kind: WorkerEventKind,
}

#[derive(Debug, Clone)]
pub enum WorkerEventKind {
    Message(HostValue),
    /// An uncaught error; the worker is crashing.
    Error { message: String },
    /// The worker thread is done; always the last event of a worker.
    Exited(WorkerState),
}

/// The script-visible event kinds a worker handle dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Message,
    Error,
}

impl EventType {
    /// `"message"` / `"error"`, as given to `addEventListener`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "message" => Some(EventType::Message),
            "error" => Some(EventType::Error),
            _ => None,
        }
    }

    /// `"onmessage"` / `"onerror"`.
    pub fn from_handler_property(name: &str) -> Option<Self> {
        name.strip_prefix("on").and_then(Self::from_name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            EventType::Message => "message",
            EventType::Error => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_names() {
        assert_eq!(EventType::from_handler_property("onmessage"), Some(EventType::Message));
        assert_eq!(EventType::from_handler_property("onerror"), Some(EventType::Error));
        assert_eq!(EventType::from_handler_property("message"), None);
        assert_eq!(EventType::from_name("close"), None);
        assert_eq!(EventType::Error.name(), "error");
    }
}
