//! Statement execution.
//!
//! Loops count every iteration against the context's budget (which also
//! observes worker cancellation) and release the scopes an iteration created
//! when it created no closures.

use crate::parser::ast::{
    BlockStatementData, CatchClauseData, DeclarationType, ExpressionType, ForIteratorData,
    ForStatementData, ProgramData, StatementType, SwitchStatementData, VariableDeclarationData,
    VariableDeclarationKind, VariableDeclarationOrExpression,
};
use crate::parser::JsParser;
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::heap::HeapCell;
use crate::runner::ds::lex_env::{Binding, ScopeKind};
use crate::runner::ds::operations::test_and_comparison::strict_equality_comparison;
use crate::runner::ds::operations::type_conversion::to_boolean;
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::types::EvalContext;
use crate::runner::stack;

use super::expression::evaluate_expression;
use super::function::{describe_value, hoist_declarations};
use super::property::for_in_keys;
use super::types::{Completion, CompletionType, EvalResult, ValueResult};

/// Run a whole program against the context's global scope and return its
/// completion value. `source` is the text `program` was parsed from.
pub fn execute_program(program: &ProgramData, source: &str, ctx: &mut EvalContext) -> ValueResult {
    ctx.lex_env = ctx.global_env;
    ctx.this_value = JsValue::Undefined;
    check_global_redeclarations(program, source, ctx)?;

    let global = ctx.global_env;
    hoist_declarations(ctx, global, &program.declarations, true)?;
    let completion = execute_statements(&program.body, ctx)?;
    Ok(completion.get_value())
}

/// Bindings persist across programs on one context, so a `let`/`const` may
/// not reuse a name an earlier program declared.
fn check_global_redeclarations(program: &ProgramData, source: &str, ctx: &EvalContext) -> Result<(), JErrorType> {
    let global = ctx.heap.scope(ctx.global_env)?;
    for lexical in &program.declarations.lexical_names {
        if global.bindings.contains_key(&lexical.name) {
            return Err(JsParser::syntax_error_at(
                source,
                lexical.meta.start_index,
                already_declared(&lexical.name),
            ));
        }
    }
    for function in &program.declarations.functions {
        if global.bindings.get(function.name()).map_or(false, |b| b.lexical) {
            return Err(JsParser::syntax_error_at(
                source,
                function.meta.start_index,
                already_declared(function.name()),
            ));
        }
    }
    for name in &program.declarations.var_names {
        if global.bindings.get(name).map_or(false, |b| b.lexical) {
            return Err(JsParser::syntax_error_at(source, 0, already_declared(name)));
        }
    }
    Ok(())
}

fn already_declared(name: &str) -> String {
    format!("Identifier '{}' has already been declared", name)
}

/// Execute statements in order. The completion value is that of the last
/// statement that produced one.
pub fn execute_statements(statements: &[StatementType], ctx: &mut EvalContext) -> EvalResult {
    let mut last = None;
    for stmt in statements {
        let completion = execute_statement(stmt, ctx)?;
        if completion.value.is_some() {
            last = completion.value.clone();
        }
        if completion.is_abrupt() {
            return Ok(completion.update_empty(last));
        }
    }
    Ok(Completion {
        completion_type: CompletionType::Normal,
        value: last,
    })
}

/// Execute a statement and return its completion.
pub fn execute_statement(stmt: &StatementType, ctx: &mut EvalContext) -> EvalResult {
    stack::guarded(|| execute_statement_inner(stmt, ctx))
}

fn execute_statement_inner(stmt: &StatementType, ctx: &mut EvalContext) -> EvalResult {
    match stmt {
        StatementType::EmptyStatement { .. } => Ok(Completion::normal()),

        StatementType::ExpressionStatement { expression, .. } => {
            let value = evaluate_expression(expression, ctx)?;
            Ok(Completion::normal_with_value(value))
        }

        StatementType::BlockStatement(block) => execute_block_statement(block, ctx),

        StatementType::DeclarationStatement(DeclarationType::VariableDeclaration(data)) => {
            execute_variable_declaration(data, ctx)
        }

        // Hoisted when the enclosing scope was entered.
        StatementType::DeclarationStatement(DeclarationType::FunctionDeclaration(_)) => {
            Ok(Completion::normal())
        }

        StatementType::IfStatement {
            test,
            consequent,
            alternate,
            ..
        } => {
            if to_boolean(&evaluate_expression(test, ctx)?) {
                execute_statement(consequent, ctx)
            } else if let Some(alternate) = alternate {
                execute_statement(alternate, ctx)
            } else {
                Ok(Completion::normal())
            }
        }

        StatementType::WhileStatement { test, body, .. } => execute_while_statement(test, body, ctx),

        StatementType::DoWhileStatement { body, test, .. } => execute_do_while_statement(body, test, ctx),

        StatementType::ForStatement(data) => {
            let saved_env = ctx.lex_env;
            let result = execute_for_statement(data, ctx);
            ctx.lex_env = saved_env;
            result
        }

        StatementType::ForInStatement(data) => execute_for_in_of_statement(data, false, ctx),

        StatementType::ForOfStatement(data) => execute_for_in_of_statement(data, true, ctx),

        StatementType::SwitchStatement(data) => {
            let saved_env = ctx.lex_env;
            let result = execute_switch_statement(data, ctx);
            ctx.lex_env = saved_env;
            result
        }

        StatementType::BreakStatement { .. } => Ok(Completion::break_completion()),

        StatementType::ContinueStatement { .. } => Ok(Completion::continue_completion()),

        StatementType::ReturnStatement { argument, .. } => {
            let value = match argument {
                Some(argument) => evaluate_expression(argument, ctx)?,
                None => JsValue::Undefined,
            };
            Ok(Completion::return_value(value))
        }

        StatementType::ThrowStatement { argument, .. } => {
            let value = evaluate_expression(argument, ctx)?;
            Err(JErrorType::Thrown(value))
        }

        StatementType::TryStatement {
            block,
            handler,
            finalizer,
            ..
        } => execute_try_statement(block, handler.as_ref(), finalizer.as_ref(), ctx),
    }
}

/// Execute a block statement. A scope is only created when the block
/// declares something block scoped.
pub fn execute_block_statement(block: &BlockStatementData, ctx: &mut EvalContext) -> EvalResult {
    if !block.declarations.has_lexical_scope() {
        return execute_statements(&block.body, ctx);
    }

    let saved_env = ctx.lex_env;
    let checkpoint = ctx.heap.scope_checkpoint();
    let result = ctx.push_scope(ScopeKind::Block).and_then(|scope| {
        hoist_declarations(ctx, scope, &block.declarations, false)?;
        execute_statements(&block.body, ctx)
    });
    ctx.lex_env = saved_env;
    ctx.heap.release_scopes(&checkpoint);
    result
}

fn execute_variable_declaration(data: &VariableDeclarationData, ctx: &mut EvalContext) -> EvalResult {
    for declarator in &data.declarations {
        let name = &declarator.id.name;
        match data.kind {
            VariableDeclarationKind::Var => {
                // Already hoisted; only an initializer has an effect.
                if let Some(init) = &declarator.init {
                    let value = evaluate_expression(init, ctx)?;
                    ctx.set_binding(name, value)?;
                }
            }
            VariableDeclarationKind::Let | VariableDeclarationKind::Const => {
                let value = match &declarator.init {
                    Some(init) => evaluate_expression(init, ctx)?,
                    None => JsValue::Undefined,
                };
                ctx.initialize_binding(name, value)?;
            }
        }
    }
    Ok(Completion::normal())
}

/// What a loop does after running its body once.
enum LoopControl {
    Next,
    Exit,
    Return(Completion),
}

/// Run one iteration of a loop body, releasing the scopes it created when it
/// created no closures. Returns whether closures were created.
fn run_loop_body<F>(ctx: &mut EvalContext, last: &mut Option<JsValue>, body: F) -> Result<(LoopControl, bool), JErrorType>
where
    F: FnOnce(&mut EvalContext) -> EvalResult,
{
    let checkpoint = ctx.heap.scope_checkpoint();
    let result = body(ctx);
    let captured = ctx.heap.closures_since(&checkpoint);
    ctx.heap.release_scopes(&checkpoint);

    let completion = result?;
    if completion.value.is_some() {
        *last = completion.value.clone();
    }
    let control = match completion.completion_type {
        CompletionType::Normal | CompletionType::Continue => LoopControl::Next,
        CompletionType::Break => LoopControl::Exit,
        CompletionType::Return => LoopControl::Return(completion),
    };
    Ok((control, captured))
}

fn loop_completion(last: Option<JsValue>) -> EvalResult {
    Ok(Completion {
        completion_type: CompletionType::Normal,
        value: last,
    })
}

fn execute_while_statement(test: &ExpressionType, body: &StatementType, ctx: &mut EvalContext) -> EvalResult {
    let mut last = None;
    loop {
        ctx.tick_loop()?;
        if !to_boolean(&evaluate_expression(test, ctx)?) {
            break;
        }
        match run_loop_body(ctx, &mut last, |ctx| execute_statement(body, ctx))?.0 {
            LoopControl::Next => {}
            LoopControl::Exit => break,
            LoopControl::Return(completion) => return Ok(completion),
        }
    }
    loop_completion(last)
}

fn execute_do_while_statement(body: &StatementType, test: &ExpressionType, ctx: &mut EvalContext) -> EvalResult {
    let mut last = None;
    loop {
        ctx.tick_loop()?;
        match run_loop_body(ctx, &mut last, |ctx| execute_statement(body, ctx))?.0 {
            LoopControl::Next => {}
            LoopControl::Exit => break,
            LoopControl::Return(completion) => return Ok(completion),
        }
        if !to_boolean(&evaluate_expression(test, ctx)?) {
            break;
        }
    }
    loop_completion(last)
}

/// `for (init; test; update)`. A `let` declared in the header gets a fresh
/// copy per iteration once a closure may have captured the current one.
fn execute_for_statement(data: &ForStatementData, ctx: &mut EvalContext) -> EvalResult {
    let mut per_iteration = false;
    match &data.init {
        Some(VariableDeclarationOrExpression::VariableDeclaration(decl)) => {
            if decl.kind != VariableDeclarationKind::Var {
                let scope = ctx.push_scope(ScopeKind::Block)?;
                for declarator in &decl.declarations {
                    let binding = Binding::uninitialized(decl.kind == VariableDeclarationKind::Const);
                    ctx.declare_binding(scope, &declarator.id.name, binding)?;
                }
                per_iteration = true;
            }
            execute_variable_declaration(decl, ctx)?;
        }
        Some(VariableDeclarationOrExpression::Expression(expression)) => {
            evaluate_expression(expression, ctx)?;
        }
        None => {}
    }

    let mut last = None;
    loop {
        ctx.tick_loop()?;
        if let Some(test) = &data.test {
            if !to_boolean(&evaluate_expression(test, ctx)?) {
                break;
            }
        }
        let (control, captured) = run_loop_body(ctx, &mut last, |ctx| execute_statement(&data.body, ctx))?;
        match control {
            LoopControl::Next => {}
            LoopControl::Exit => break,
            LoopControl::Return(completion) => return Ok(completion),
        }
        if per_iteration && captured {
            let copy = ctx.heap.scope(ctx.lex_env)?.clone();
            ctx.lex_env = ctx.alloc(HeapCell::Scope(copy))?;
        }
        if let Some(update) = &data.update {
            evaluate_expression(update, ctx)?;
        }
    }
    loop_completion(last)
}

/// `for (x in o)` walks keys, `for (x of a)` walks array elements (re-reading
/// the length each step) or the characters of a string.
fn execute_for_in_of_statement(data: &ForIteratorData, is_of: bool, ctx: &mut EvalContext) -> EvalResult {
    enum Items {
        Values(Vec<JsValue>),
        Array(crate::runner::ds::heap::HeapRef),
    }

    let iterable = evaluate_expression(&data.right, ctx)?;
    let items = if is_of {
        match &iterable {
            JsValue::Array(r) => Items::Array(*r),
            JsValue::String(s) => Items::Values(s.chars().map(|c| JsValue::String(c.to_string())).collect()),
            other => {
                return Err(JErrorType::TypeError(format!(
                    "{} is not iterable",
                    describe_value(ctx, other)
                )))
            }
        }
    } else {
        Items::Values(for_in_keys(ctx, &iterable)?.into_iter().map(JsValue::String).collect())
    };

    let mut last = None;
    let mut index = 0;
    loop {
        ctx.tick_loop()?;
        let item = match &items {
            Items::Values(values) => values.get(index).cloned(),
            Items::Array(r) => ctx.heap.array(*r)?.elements.get(index).cloned(),
        };
        let item = match item {
            Some(item) => item,
            None => break,
        };
        index += 1;
        let control = run_loop_body(ctx, &mut last, |ctx| bind_and_run(data, item, ctx))?.0;
        match control {
            LoopControl::Next => {}
            LoopControl::Exit => break,
            LoopControl::Return(completion) => return Ok(completion),
        }
    }
    loop_completion(last)
}

fn bind_and_run(data: &ForIteratorData, item: JsValue, ctx: &mut EvalContext) -> EvalResult {
    match data.kind {
        Some(kind @ (VariableDeclarationKind::Let | VariableDeclarationKind::Const)) => {
            let saved_env = ctx.lex_env;
            let result = ctx.push_scope(ScopeKind::Block).and_then(|scope| {
                let mut binding = Binding::uninitialized(kind == VariableDeclarationKind::Const);
                binding.value = item;
                binding.initialized = true;
                ctx.declare_binding(scope, &data.binding.name, binding)?;
                execute_statement(&data.body, ctx)
            });
            ctx.lex_env = saved_env;
            result
        }
        Some(VariableDeclarationKind::Var) | None => {
            ctx.set_binding(&data.binding.name, item)?;
            execute_statement(&data.body, ctx)
        }
    }
}

/// Cases compare with `===`; execution falls through until `break`.
fn execute_switch_statement(data: &SwitchStatementData, ctx: &mut EvalContext) -> EvalResult {
    let discriminant = evaluate_expression(&data.discriminant, ctx)?;
    if data.declarations.has_lexical_scope() {
        let scope = ctx.push_scope(ScopeKind::Block)?;
        hoist_declarations(ctx, scope, &data.declarations, false)?;
    }

    let mut start = None;
    for (i, case) in data.cases.iter().enumerate() {
        if let Some(test) = &case.test {
            let value = evaluate_expression(test, ctx)?;
            if strict_equality_comparison(&discriminant, &value) {
                start = Some(i);
                break;
            }
        }
    }
    let start = match start.or_else(|| data.cases.iter().position(|c| c.test.is_none())) {
        Some(start) => start,
        None => return Ok(Completion::normal()),
    };

    let mut last = None;
    for case in &data.cases[start..] {
        let completion = execute_statements(&case.consequent, ctx)?;
        if completion.value.is_some() {
            last = completion.value.clone();
        }
        match completion.completion_type {
            CompletionType::Normal => {}
            CompletionType::Break => break,
            CompletionType::Continue | CompletionType::Return => return Ok(completion.update_empty(last)),
        }
    }
    Ok(Completion {
        completion_type: CompletionType::Normal,
        value: last,
    })
}

/// Only catchable errors reach the `catch` clause; an abrupt `finally`
/// (or an error inside it) replaces the outcome of the `try`.
fn execute_try_statement(
    block: &BlockStatementData,
    handler: Option<&CatchClauseData>,
    finalizer: Option<&BlockStatementData>,
    ctx: &mut EvalContext,
) -> EvalResult {
    let saved_env = ctx.lex_env;
    let mut result = execute_block_statement(block, ctx);
    ctx.lex_env = saved_env;

    if let Some(handler) = handler {
        result = match result {
            Err(error) if error.is_catchable() => {
                let caught = execute_catch_clause(handler, error, ctx);
                ctx.lex_env = saved_env;
                caught
            }
            other => other,
        };
    }

    if let Some(finalizer) = finalizer {
        let finally = execute_block_statement(finalizer, ctx);
        ctx.lex_env = saved_env;
        let finally = finally?;
        if finally.is_abrupt() {
            return Ok(finally);
        }
    }
    result
}

fn execute_catch_clause(handler: &CatchClauseData, error: JErrorType, ctx: &mut EvalContext) -> EvalResult {
    let value = ctx.error_to_value(error)?;
    let scope = ctx.push_scope(ScopeKind::Block)?;
    if let Some(param) = &handler.param {
        ctx.declare_binding(scope, &param.name, Binding::var(value))?;
    }
    execute_block_statement(&handler.body, ctx)
}
