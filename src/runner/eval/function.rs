//! Function calls, construction and closures.
//!
//! A call creates a function scope whose parent is the scope captured when
//! the function was created, never the caller's. Scopes created during a call
//! that produced no closures are released as soon as the call returns.

use std::rc::Rc;

use crate::parser::ast::{FunctionBodyOrExpression, FunctionData, HoistedDeclarations};
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::function_object::{FunctionKind, FunctionObject, ScriptFunction};
use crate::runner::ds::heap::{HeapCell, HeapRef};
use crate::runner::ds::lex_env::{Binding, ScopeKind};
use crate::runner::ds::object::JsObject;
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::types::{EvalContext, NativeFn};
use crate::runner::stack;

use super::expression::evaluate_expression;
use super::property::{function_prototype, get_property};
use super::statement::execute_statements;
use super::types::{CompletionType, ValueResult};

/// Create a closure over the current scope.
pub fn create_function(ctx: &mut EvalContext, data: &Rc<FunctionData>, binds_own_name: bool) -> ValueResult {
    let lexical_this = if data.is_arrow {
        Some(ctx.this_value.clone())
    } else {
        None
    };
    ctx.heap.note_closure();
    let function = FunctionObject::new_script(ScriptFunction {
        data: data.clone(),
        scope: ctx.lex_env,
        lexical_this,
        binds_own_name,
    });
    Ok(JsValue::Function(ctx.alloc(HeapCell::Function(function))?))
}

/// Bind the declarations of a statement list in `scope`: `var`s (when `scope`
/// is a var scope) start as `undefined`, `let`/`const` start in their dead
/// zone and function declarations are created up front.
///
/// `ctx.lex_env` must already be `scope` so hoisted functions capture it.
pub fn hoist_declarations(
    ctx: &mut EvalContext,
    scope: HeapRef,
    declarations: &HoistedDeclarations,
    var_scope: bool,
) -> Result<(), JErrorType> {
    if var_scope {
        for name in &declarations.var_names {
            ctx.declare_var(scope, name)?;
        }
    }
    for lexical in &declarations.lexical_names {
        ctx.declare_binding(scope, &lexical.name, Binding::uninitialized(lexical.is_const))?;
    }
    for function in &declarations.functions {
        let value = create_function(ctx, function, false)?;
        ctx.declare_binding(scope, function.name(), Binding::var(value))?;
    }
    Ok(())
}

struct ScriptCall {
    data: Rc<FunctionData>,
    scope: HeapRef,
    lexical_this: Option<JsValue>,
    binds_own_name: bool,
}

enum Callee {
    Native(NativeFn),
    Script(ScriptCall),
}

/// Call `callee` with `this` and `args`.
pub fn call_function(ctx: &mut EvalContext, callee: &JsValue, this: JsValue, args: Vec<JsValue>) -> ValueResult {
    let function_ref = match callee {
        JsValue::Function(r) => *r,
        other => {
            return Err(JErrorType::TypeError(format!(
                "{} is not a function",
                describe_value(ctx, other)
            )))
        }
    };
    let target = match &ctx.heap.function(function_ref)?.kind {
        FunctionKind::Native(native) => Callee::Native(native.call),
        FunctionKind::Script(script) => Callee::Script(ScriptCall {
            data: script.data.clone(),
            scope: script.scope,
            lexical_this: script.lexical_this.clone(),
            binds_own_name: script.binds_own_name,
        }),
    };

    ctx.enter_call()?;
    let result = stack::guarded(|| match target {
        Callee::Native(call) => call(ctx, this, args),
        Callee::Script(script) => call_script(ctx, function_ref, script, this, args),
    });
    ctx.exit_call();
    result
}

fn call_script(
    ctx: &mut EvalContext,
    function_ref: HeapRef,
    script: ScriptCall,
    this: JsValue,
    args: Vec<JsValue>,
) -> ValueResult {
    let saved_env = ctx.lex_env;
    let this = script.lexical_this.clone().unwrap_or(this);
    let saved_this = std::mem::replace(&mut ctx.this_value, this);
    let checkpoint = ctx.heap.scope_checkpoint();

    let result = run_function_body(ctx, function_ref, &script, args);

    ctx.lex_env = saved_env;
    ctx.this_value = saved_this;
    ctx.heap.release_scopes(&checkpoint);
    result
}

fn run_function_body(
    ctx: &mut EvalContext,
    function_ref: HeapRef,
    script: &ScriptCall,
    args: Vec<JsValue>,
) -> ValueResult {
    let scope = ctx.new_scope(ScopeKind::Function, script.scope)?;
    ctx.lex_env = scope;
    let data = &script.data;

    if script.binds_own_name {
        ctx.declare_binding(scope, data.name(), Binding::var(JsValue::Function(function_ref)))?;
    }

    let mut args = args.into_iter();
    for param in &data.params {
        let mut value = args.next().unwrap_or(JsValue::Undefined);
        if value == JsValue::Undefined {
            if let Some(default_value) = &param.default_value {
                value = evaluate_expression(default_value, ctx)?;
            }
        }
        ctx.declare_binding(scope, &param.name.name, Binding::var(value))?;
    }

    match &data.body {
        FunctionBodyOrExpression::Expression(expression) => evaluate_expression(expression, ctx),
        FunctionBodyOrExpression::FunctionBody(body) => {
            hoist_declarations(ctx, scope, &body.declarations, true)?;
            let completion = execute_statements(&body.body, ctx)?;
            Ok(match completion.completion_type {
                CompletionType::Return => completion.get_value(),
                _ => JsValue::Undefined,
            })
        }
    }
}

/// `new callee(...args)`.
pub fn construct(ctx: &mut EvalContext, callee: &JsValue, args: Vec<JsValue>) -> ValueResult {
    let function_ref = match callee {
        JsValue::Function(r) => *r,
        other => return Err(not_a_constructor(describe_value(ctx, other))),
    };
    let native_constructor = match &ctx.heap.function(function_ref)?.kind {
        FunctionKind::Native(native) => match native.construct {
            Some(construct) => Some(construct),
            None => return Err(not_a_constructor(native.name.to_string())),
        },
        FunctionKind::Script(script) if script.data.is_arrow => {
            return Err(not_a_constructor(describe_value(ctx, callee)))
        }
        FunctionKind::Script(_) => None,
    };

    if let Some(construct) = native_constructor {
        ctx.enter_call()?;
        let result = stack::guarded(|| construct(ctx, JsValue::Undefined, args));
        ctx.exit_call();
        return result;
    }

    let mut object = JsObject::new();
    if let JsValue::Object(prototype) = function_prototype(ctx, function_ref)? {
        object.prototype = Some(prototype);
    }
    let this = JsValue::Object(ctx.alloc(HeapCell::Object(object))?);
    let result = call_function(ctx, callee, this.clone(), args)?;
    Ok(match result {
        JsValue::Object(_) | JsValue::Array(_) | JsValue::Function(_) | JsValue::Worker(_) => result,
        _ => this,
    })
}

/// `value instanceof constructor`.
///
/// Script constructors are checked through the prototype chain. Native
/// constructors match by name: `Error` covers every error class, `Object`
/// every composite value.
pub fn instance_of(ctx: &mut EvalContext, value: &JsValue, constructor: &JsValue) -> Result<bool, JErrorType> {
    let function_ref = match constructor {
        JsValue::Function(r) => *r,
        _ => {
            return Err(JErrorType::TypeError(
                "Right-hand side of 'instanceof' is not callable".to_string(),
            ))
        }
    };
    let native_name = match &ctx.heap.function(function_ref)?.kind {
        FunctionKind::Native(native) => Some(native.name.to_string()),
        FunctionKind::Script(script) if script.data.is_arrow => return Ok(false),
        FunctionKind::Script(_) => None,
    };

    if let Some(name) = native_name {
        return Ok(match (name.as_str(), value) {
            ("Object", v) => v.heap_ref().is_some() || matches!(v, JsValue::Worker(_)),
            ("Array", JsValue::Array(_)) => true,
            ("Function", JsValue::Function(_)) => true,
            ("Worker", JsValue::Worker(_)) => true,
            ("Error", JsValue::Object(r)) => ctx.heap.object(*r)?.is_error(),
            (class_name, JsValue::Object(r)) => ctx.heap.object(*r)?.class_name == class_name,
            _ => false,
        });
    }

    let target = match get_property(ctx, constructor, "prototype")? {
        JsValue::Object(r) => r,
        _ => return Ok(false),
    };
    let mut current = match value {
        JsValue::Object(r) => ctx.heap.object(*r)?.prototype,
        _ => None,
    };
    while let Some(prototype) = current {
        if prototype == target {
            return Ok(true);
        }
        current = ctx.heap.object(prototype)?.prototype;
    }
    Ok(false)
}

fn not_a_constructor(name: String) -> JErrorType {
    JErrorType::TypeError(format!("{} is not a constructor", name))
}

/// Short description of a value for error messages.
pub fn describe_value(ctx: &EvalContext, value: &JsValue) -> String {
    match value {
        JsValue::String(s) => format!("\"{}\"", s),
        JsValue::Function(r) => match ctx.heap.function(*r) {
            Ok(f) if !f.name().is_empty() => f.name().to_string(),
            _ => "anonymous".to_string(),
        },
        JsValue::Object(_) => "object".to_string(),
        JsValue::Array(_) => "array".to_string(),
        other => ctx.to_string(other).unwrap_or_else(|_| other.to_string()),
    }
}
