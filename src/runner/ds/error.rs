use thiserror::Error;

use crate::runner::ds::value::JsValue;
use crate::runner::worker::WorkerId;

/// Every failure the engine can report, from parsing through worker crashes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum JErrorType {
    #[error("SyntaxError: {message} ({line}:{column})")]
    SyntaxError {
        line: usize,
        column: usize,
        message: String,
    },
    #[error("ReferenceError: {0}")]
    ReferenceError(String),
    #[error("TypeError: {0}")]
    TypeError(String),
    #[error("RangeError: {0}")]
    RangeError(String),
    #[error("ConversionError: {0}")]
    ConversionError(String),
    #[error("ResourceExceededError: {0}")]
    ResourceExceeded(String),
    #[error("WorkerCrashError: worker {worker} crashed: {message}")]
    WorkerCrash { worker: WorkerId, message: String },
    #[error("Uncaught {0}")]
    Uncaught(String),
    #[error("execution terminated")]
    Terminated,
    /// A `throw`n script value on its way to the nearest `catch`.
    #[error("Uncaught exception")]
    Thrown(JsValue),
}

impl JErrorType {
    /// Whether script code may observe this error in a `catch` clause.
    pub fn is_catchable(&self) -> bool {
        matches!(
            self,
            JErrorType::Thrown(_)
                | JErrorType::ReferenceError(_)
                | JErrorType::TypeError(_)
                | JErrorType::RangeError(_)
                | JErrorType::ConversionError(_)
        )
    }

    /// The message without the class prefix, as stored in an error object's `message`.
    pub fn message(&self) -> String {
        match self {
            JErrorType::SyntaxError { message, .. } | JErrorType::WorkerCrash { message, .. } => {
                message.to_string()
            }
            JErrorType::ReferenceError(m)
            | JErrorType::TypeError(m)
            | JErrorType::RangeError(m)
            | JErrorType::ConversionError(m)
            | JErrorType::ResourceExceeded(m)
            | JErrorType::Uncaught(m) => m.to_string(),
            JErrorType::Terminated => self.to_string(),
            JErrorType::Thrown(v) => v.to_string(),
        }
    }

    /// The script-visible error class name, for errors that have one.
    pub fn class_name(&self) -> Option<&'static str> {
        match self {
            JErrorType::SyntaxError { .. } => Some("SyntaxError"),
            JErrorType::ReferenceError(_) => Some("ReferenceError"),
            JErrorType::TypeError(_) => Some("TypeError"),
            JErrorType::RangeError(_) => Some("RangeError"),
            JErrorType::ConversionError(_) => Some("ConversionError"),
            _ => None,
        }
    }
}
