//! Error built-in objects.
//!
//! Provides the Error, TypeError, RangeError and ReferenceError constructors.
//! Each works with or without `new` and builds an object tagged with its class,
//! carrying `name` and `message`.

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::{BuiltInObject, EvalContext, NativeFn};

/// Register all error types with the registry.
pub fn register(registry: &mut BuiltInRegistry) {
    let constructors: [(&str, NativeFn); 4] = [
        ("Error", error_constructor),
        ("TypeError", type_error_constructor),
        ("RangeError", range_error_constructor),
        ("ReferenceError", reference_error_constructor),
    ];
    for (name, constructor) in constructors {
        registry.register_object(
            BuiltInObject::new(name)
                .with_call(constructor)
                .with_constructor(constructor),
        );
    }
}

/// Get message from arguments.
fn get_message(ctx: &EvalContext, args: &[JsValue]) -> Result<String, JErrorType> {
    match args.first() {
        None | Some(JsValue::Undefined) => Ok(String::new()),
        Some(value) => ctx.to_string(value),
    }
}

fn build(ctx: &mut EvalContext, class_name: &str, args: &[JsValue]) -> Result<JsValue, JErrorType> {
    let message = get_message(ctx, args)?;
    ctx.new_error(class_name, &message)
}

fn error_constructor(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    build(ctx, "Error", &args)
}

fn type_error_constructor(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    build(ctx, "TypeError", &args)
}

fn range_error_constructor(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    build(ctx, "RangeError", &args)
}

fn reference_error_constructor(ctx: &mut EvalContext, _this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    build(ctx, "ReferenceError", &args)
}
