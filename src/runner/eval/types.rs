//! Core types for the evaluation engine.

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::value::JsValue;

/// Completion record type.
/// `throw` is not a completion type here: it travels as `Err(JErrorType::Thrown)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionType {
    /// Normal completion - execution continues.
    Normal,
    /// Return completion - function returns.
    Return,
    /// Break completion - break from loop/switch.
    Break,
    /// Continue completion - continue loop iteration.
    Continue,
}

/// Completion record.
/// Every statement evaluation returns a completion record.
#[derive(Debug, Clone)]
pub struct Completion {
    /// The type of completion.
    pub completion_type: CompletionType,
    /// The value, if any. `None` is an empty completion.
    pub value: Option<JsValue>,
}

impl Completion {
    /// Create a normal completion with no value.
    pub fn normal() -> Self {
        Completion {
            completion_type: CompletionType::Normal,
            value: None,
        }
    }

    /// Create a normal completion with a value.
    pub fn normal_with_value(value: JsValue) -> Self {
        Completion {
            completion_type: CompletionType::Normal,
            value: Some(value),
        }
    }

    /// Create a return completion.
    pub fn return_value(value: JsValue) -> Self {
        Completion {
            completion_type: CompletionType::Return,
            value: Some(value),
        }
    }

    pub fn break_completion() -> Self {
        Completion {
            completion_type: CompletionType::Break,
            value: None,
        }
    }

    pub fn continue_completion() -> Self {
        Completion {
            completion_type: CompletionType::Continue,
            value: None,
        }
    }

    pub fn is_normal(&self) -> bool {
        self.completion_type == CompletionType::Normal
    }

    /// Check if this is an abrupt completion (not normal).
    pub fn is_abrupt(&self) -> bool {
        !self.is_normal()
    }

    /// Get the value, or undefined if none.
    pub fn get_value(&self) -> JsValue {
        self.value.clone().unwrap_or(JsValue::Undefined)
    }

    /// Fill an empty completion with `value`, keeping its type.
    pub fn update_empty(self, value: Option<JsValue>) -> Self {
        if self.value.is_none() {
            Completion { value, ..self }
        } else {
            self
        }
    }
}

/// What an assignment, update or `delete` operates on.
#[derive(Debug, Clone)]
pub enum Reference {
    /// A name resolved through the scope chain.
    Binding(String),
    /// A property of a value. The key is converted on access.
    Property { base: JsValue, key: JsValue },
}

/// Result type for evaluation operations.
pub type EvalResult = Result<Completion, JErrorType>;

/// Result type for value-returning operations.
pub type ValueResult = Result<JsValue, JErrorType>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_empty_keeps_existing_value() {
        let filled = Completion::break_completion().update_empty(Some(JsValue::Number(1.0)));
        assert_eq!(filled.completion_type, CompletionType::Break);
        assert_eq!(filled.get_value(), JsValue::Number(1.0));

        let kept = Completion::normal_with_value(JsValue::Null).update_empty(Some(JsValue::Number(1.0)));
        assert_eq!(kept.get_value(), JsValue::Null);
        assert!(Completion::continue_completion().is_abrupt());
    }
}
