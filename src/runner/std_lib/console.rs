//! Console built-in object.
//!
//! `console.log` and friends forward to the `log` facade under the
//! `js_console` target; the host decides where (and whether) they appear.

use log::{debug, error, info, warn, Level};

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::{BuiltInObject, EvalContext};

const TARGET: &str = "js_console";

/// Nesting shown before composites are abbreviated.
const MAX_DEPTH: usize = 2;

/// Register the console object with the registry.
pub fn register(registry: &mut BuiltInRegistry) {
    let console = BuiltInObject::new("console")
        .add_method("log", console_log)
        .add_method("info", console_info)
        .add_method("debug", console_debug)
        .add_method("warn", console_warn)
        .add_method("error", console_error);

    registry.register_object(console);
}

/// Format a value for console output. Top-level strings print bare, nested
/// ones quoted.
pub fn format_value(ctx: &EvalContext, value: &JsValue, depth: usize) -> String {
    match value {
        JsValue::String(s) if depth == 0 => s.clone(),
        JsValue::String(s) => format!("'{}'", s),
        JsValue::Array(r) => {
            let elements = match ctx.heap.array(*r) {
                Ok(array) => array.elements.clone(),
                Err(_) => return "[]".to_string(),
            };
            if depth >= MAX_DEPTH {
                return "[Array]".to_string();
            }
            let parts: Vec<String> = elements.iter().map(|e| format_value(ctx, e, depth + 1)).collect();
            if parts.is_empty() {
                "[]".to_string()
            } else {
                format!("[ {} ]", parts.join(", "))
            }
        }
        JsValue::Object(r) => {
            let entries: Vec<(String, JsValue)> = match ctx.heap.object(*r) {
                Ok(object) => object.properties.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                Err(_) => return "{}".to_string(),
            };
            if depth >= MAX_DEPTH {
                return "[Object]".to_string();
            }
            let parts: Vec<String> = entries
                .iter()
                .map(|(k, v)| format!("{}: {}", k, format_value(ctx, v, depth + 1)))
                .collect();
            if parts.is_empty() {
                "{}".to_string()
            } else {
                format!("{{ {} }}", parts.join(", "))
            }
        }
        JsValue::Function(r) => match ctx.heap.function(*r) {
            Ok(f) if !f.name().is_empty() => format!("[Function: {}]", f.name()),
            _ => "[Function (anonymous)]".to_string(),
        },
        JsValue::Worker(id) => format!("Worker {{ id: {} }}", id),
        other => ctx.to_string(other).unwrap_or_default(),
    }
}

/// Format all arguments for console output.
pub fn format_args(ctx: &EvalContext, args: &[JsValue]) -> String {
    args.iter()
        .map(|v| format_value(ctx, v, 0))
        .collect::<Vec<_>>()
        .join(" ")
}

fn emit(ctx: &EvalContext, level: Level, args: &[JsValue]) {
    if !log::log_enabled!(target: TARGET, level) {
        return;
    }
    let line = format_args(ctx, args);
    match level {
        Level::Error => error!(target: TARGET, "{}", line),
        Level::Warn => warn!(target: TARGET, "{}", line),
        Level::Debug | Level::Trace => debug!(target: TARGET, "{}", line),
        Level::Info => info!(target: TARGET, "{}", line),
    }
}

fn console_log(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    emit(ctx, Level::Info, &args);
    Ok(JsValue::Undefined)
}

fn console_info(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    emit(ctx, Level::Info, &args);
    Ok(JsValue::Undefined)
}

fn console_debug(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    emit(ctx, Level::Debug, &args);
    Ok(JsValue::Undefined)
}

fn console_warn(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    emit(ctx, Level::Warn, &args);
    Ok(JsValue::Undefined)
}

fn console_error(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    emit(ctx, Level::Error, &args);
    Ok(JsValue::Undefined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_nested_values() {
        let mut ctx = EvalContext::new();
        let inner = ctx.new_array(vec![JsValue::from("x"), JsValue::Number(2.0)]).unwrap();
        let object = ctx
            .new_object_with(vec![("a", JsValue::Number(1.0)), ("b", inner)])
            .unwrap();
        assert_eq!(format_value(&ctx, &object, 0), "{ a: 1, b: [ 'x', 2 ] }");
        assert_eq!(
            format_args(&ctx, &[JsValue::from("n ="), JsValue::Number(0.5), JsValue::Null]),
            "n = 0.5 null"
        );
    }

    #[test]
    fn test_format_abbreviates_deep_values() {
        let mut ctx = EvalContext::new();
        let deep = ctx.new_array(vec![]).unwrap();
        let mid = ctx.new_array(vec![deep]).unwrap();
        let outer = ctx.new_array(vec![mid]).unwrap();
        assert_eq!(format_value(&ctx, &outer, 0), "[ [ [Array] ] ]");
    }
}
