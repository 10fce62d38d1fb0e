//! Expression evaluation.

use crate::parser::ast::{
    BinaryOperator, ExpressionType, LiteralType, LogicalOperator, MemberExpressionType,
    PropertyKeyType, UnaryOperator, UpdateOperator,
};
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::operations::test_and_comparison::{
    abstract_equality_comparison, abstract_relational_comparison, strict_equality_comparison,
};
use crate::runner::ds::operations::type_conversion::{
    get_type, number_to_string, to_boolean, to_int32, to_primitive, to_uint32, TYPE_STR_UNDEFINED,
};
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::types::EvalContext;
use crate::runner::stack;

use super::function::{call_function, construct, create_function, instance_of};
use super::property::{delete_property, get_element, has_property, set_element};
use super::types::{Reference, ValueResult};

/// Evaluate an expression to a value.
pub fn evaluate_expression(expr: &ExpressionType, ctx: &mut EvalContext) -> ValueResult {
    stack::guarded(|| evaluate_expression_inner(expr, ctx))
}

fn evaluate_expression_inner(expr: &ExpressionType, ctx: &mut EvalContext) -> ValueResult {
    match expr {
        ExpressionType::Literal(literal) => Ok(match &literal.value {
            LiteralType::StringLiteral(s) => JsValue::String(s.clone()),
            LiteralType::BooleanLiteral(b) => JsValue::Boolean(*b),
            LiteralType::NullLiteral => JsValue::Null,
            LiteralType::NumberLiteral(n) => JsValue::Number(*n),
        }),

        ExpressionType::Identifier(id) => ctx.get_binding(&id.name),

        ExpressionType::ThisExpression { .. } => Ok(ctx.this_value.clone()),

        ExpressionType::ArrayExpression { elements, .. } => {
            let mut values = Vec::with_capacity(elements.len());
            for element in elements {
                values.push(evaluate_expression(element, ctx)?);
            }
            ctx.new_array(values)
        }

        ExpressionType::ObjectExpression { properties, .. } => {
            let object = ctx.new_object()?;
            for property in properties {
                let key = match &property.key {
                    PropertyKeyType::Static(name) => name.clone(),
                    PropertyKeyType::Numeric(n) => number_to_string(*n),
                    PropertyKeyType::Computed(key) => {
                        let key = evaluate_expression(key, ctx)?;
                        ctx.to_property_key(&key)?
                    }
                };
                let value = evaluate_expression(&property.value, ctx)?;
                set_element(ctx, &object, &JsValue::String(key), value)?;
            }
            Ok(object)
        }

        ExpressionType::FunctionExpression(data) => create_function(ctx, data, data.id.is_some()),

        ExpressionType::ArrowFunctionExpression(data) => create_function(ctx, data, false),

        ExpressionType::UnaryExpression {
            operator, argument, ..
        } => evaluate_unary(*operator, argument, ctx),

        ExpressionType::UpdateExpression {
            operator,
            argument,
            prefix,
            ..
        } => {
            let reference = evaluate_reference(argument, ctx)?;
            let old = get_reference_value(&reference, ctx)?;
            let old = ctx.to_number(&old)?;
            let new = match operator {
                UpdateOperator::PlusPlus => old + 1.0,
                UpdateOperator::MinusMinus => old - 1.0,
            };
            put_reference_value(&reference, JsValue::Number(new), ctx)?;
            Ok(JsValue::Number(if *prefix { new } else { old }))
        }

        ExpressionType::BinaryExpression {
            operator,
            left,
            right,
            ..
        } => {
            let lval = evaluate_expression(left, ctx)?;
            let rval = evaluate_expression(right, ctx)?;
            apply_binary(*operator, &lval, &rval, ctx)
        }

        ExpressionType::LogicalExpression {
            operator,
            left,
            right,
            ..
        } => {
            let lval = evaluate_expression(left, ctx)?;
            let short_circuit = match operator {
                LogicalOperator::Or => to_boolean(&lval),
                LogicalOperator::And => !to_boolean(&lval),
                LogicalOperator::NullishCoalescing => !lval.is_nullish(),
            };
            if short_circuit {
                Ok(lval)
            } else {
                evaluate_expression(right, ctx)
            }
        }

        ExpressionType::AssignmentExpression {
            operator,
            left,
            right,
            ..
        } => {
            let reference = evaluate_reference(left, ctx)?;
            let value = match operator.binary_operator() {
                None => evaluate_expression(right, ctx)?,
                Some(binary) => {
                    let current = get_reference_value(&reference, ctx)?;
                    let rval = evaluate_expression(right, ctx)?;
                    apply_binary(binary, &current, &rval, ctx)?
                }
            };
            put_reference_value(&reference, value.clone(), ctx)?;
            Ok(value)
        }

        ExpressionType::ConditionalExpression {
            test,
            consequent,
            alternate,
            ..
        } => {
            if to_boolean(&evaluate_expression(test, ctx)?) {
                evaluate_expression(consequent, ctx)
            } else {
                evaluate_expression(alternate, ctx)
            }
        }

        ExpressionType::CallExpression {
            callee, arguments, ..
        } => {
            let (function, this) = match callee.as_ref() {
                ExpressionType::MemberExpression(member) => {
                    let (base, key) = evaluate_member_parts(member, ctx)?;
                    let function = get_element(ctx, &base, &key)?;
                    (function, base)
                }
                other => (evaluate_expression(other, ctx)?, JsValue::Undefined),
            };
            let args = evaluate_arguments(arguments, ctx)?;
            if !function.is_function() {
                return Err(JErrorType::TypeError(format!(
                    "{} is not a function",
                    describe_expression(callee)
                )));
            }
            call_function(ctx, &function, this, args)
        }

        ExpressionType::NewExpression {
            callee, arguments, ..
        } => {
            let constructor = evaluate_expression(callee, ctx)?;
            let args = evaluate_arguments(arguments, ctx)?;
            if !constructor.is_function() {
                return Err(JErrorType::TypeError(format!(
                    "{} is not a constructor",
                    describe_expression(callee)
                )));
            }
            construct(ctx, &constructor, args)
        }

        ExpressionType::SequenceExpression { expressions, .. } => {
            let mut value = JsValue::Undefined;
            for expression in expressions {
                value = evaluate_expression(expression, ctx)?;
            }
            Ok(value)
        }

        ExpressionType::MemberExpression(member) => {
            let (base, key) = evaluate_member_parts(member, ctx)?;
            get_element(ctx, &base, &key)
        }
    }
}

fn evaluate_arguments(arguments: &[ExpressionType], ctx: &mut EvalContext) -> Result<Vec<JsValue>, JErrorType> {
    let mut args = Vec::with_capacity(arguments.len());
    for argument in arguments {
        args.push(evaluate_expression(argument, ctx)?);
    }
    Ok(args)
}

fn evaluate_member_parts(member: &MemberExpressionType, ctx: &mut EvalContext) -> Result<(JsValue, JsValue), JErrorType> {
    match member {
        MemberExpressionType::SimpleMemberExpression {
            object, property, ..
        } => {
            let base = evaluate_expression(object, ctx)?;
            Ok((base, JsValue::String(property.name.clone())))
        }
        MemberExpressionType::ComputedMemberExpression {
            object, property, ..
        } => {
            let base = evaluate_expression(object, ctx)?;
            let key = evaluate_expression(property, ctx)?;
            Ok((base, key))
        }
    }
}

fn evaluate_unary(operator: UnaryOperator, argument: &ExpressionType, ctx: &mut EvalContext) -> ValueResult {
    match operator {
        UnaryOperator::TypeOf => {
            let value = match argument {
                ExpressionType::Identifier(id) => match ctx.lookup_binding(&id.name)? {
                    Some(value) => value,
                    None => return Ok(JsValue::from(TYPE_STR_UNDEFINED)),
                },
                other => evaluate_expression(other, ctx)?,
            };
            Ok(JsValue::from(get_type(&value)))
        }
        UnaryOperator::Delete => match argument {
            ExpressionType::MemberExpression(member) => {
                let (base, key) = evaluate_member_parts(member, ctx)?;
                let key = ctx.to_property_key(&key)?;
                Ok(JsValue::Boolean(delete_property(ctx, &base, &key)?))
            }
            other => {
                evaluate_expression(other, ctx)?;
                Ok(JsValue::Boolean(true))
            }
        },
        UnaryOperator::Void => {
            evaluate_expression(argument, ctx)?;
            Ok(JsValue::Undefined)
        }
        UnaryOperator::Minus => {
            let value = evaluate_expression(argument, ctx)?;
            Ok(JsValue::Number(-ctx.to_number(&value)?))
        }
        UnaryOperator::Plus => {
            let value = evaluate_expression(argument, ctx)?;
            Ok(JsValue::Number(ctx.to_number(&value)?))
        }
        UnaryOperator::LogicalNot => {
            let value = evaluate_expression(argument, ctx)?;
            Ok(JsValue::Boolean(!to_boolean(&value)))
        }
        UnaryOperator::BitwiseNot => {
            let value = evaluate_expression(argument, ctx)?;
            Ok(JsValue::Number(!to_int32(ctx.to_number(&value)?) as f64))
        }
    }
}

/// Resolve an assignment target without reading it.
pub fn evaluate_reference(expr: &ExpressionType, ctx: &mut EvalContext) -> Result<Reference, JErrorType> {
    match expr {
        ExpressionType::Identifier(id) => Ok(Reference::Binding(id.name.clone())),
        ExpressionType::MemberExpression(member) => {
            let (base, key) = evaluate_member_parts(member, ctx)?;
            Ok(Reference::Property { base, key })
        }
        _ => Err(JErrorType::ReferenceError(
            "Invalid left-hand side in assignment".to_string(),
        )),
    }
}

pub fn get_reference_value(reference: &Reference, ctx: &mut EvalContext) -> ValueResult {
    match reference {
        Reference::Binding(name) => ctx.get_binding(name),
        Reference::Property { base, key } => get_element(ctx, base, key),
    }
}

pub fn put_reference_value(reference: &Reference, value: JsValue, ctx: &mut EvalContext) -> Result<(), JErrorType> {
    match reference {
        Reference::Binding(name) => ctx.set_binding(name, value),
        Reference::Property { base, key } => set_element(ctx, base, key, value),
    }
}

/// Apply a binary operator to two evaluated operands.
pub fn apply_binary(operator: BinaryOperator, lval: &JsValue, rval: &JsValue, ctx: &mut EvalContext) -> ValueResult {
    let number = |n: f64| -> ValueResult { Ok(JsValue::Number(n)) };
    match operator {
        BinaryOperator::Add => {
            let lprim = to_primitive(&ctx.heap, lval)?;
            let rprim = to_primitive(&ctx.heap, rval)?;
            if matches!(lprim, JsValue::String(_)) || matches!(rprim, JsValue::String(_)) {
                let mut s = ctx.to_string(&lprim)?;
                s.push_str(&ctx.to_string(&rprim)?);
                Ok(JsValue::String(s))
            } else {
                number(ctx.to_number(&lprim)? + ctx.to_number(&rprim)?)
            }
        }
        BinaryOperator::Subtract => number(ctx.to_number(lval)? - ctx.to_number(rval)?),
        BinaryOperator::Multiply => number(ctx.to_number(lval)? * ctx.to_number(rval)?),
        BinaryOperator::Divide => number(ctx.to_number(lval)? / ctx.to_number(rval)?),
        // Rust's `%` on f64 truncates like JavaScript's.
        BinaryOperator::Modulo => number(ctx.to_number(lval)? % ctx.to_number(rval)?),
        BinaryOperator::Exponent => number(exponent(ctx.to_number(lval)?, ctx.to_number(rval)?)),

        BinaryOperator::LooselyEqual => Ok(JsValue::Boolean(abstract_equality_comparison(&ctx.heap, lval, rval)?)),
        BinaryOperator::LooselyUnequal => Ok(JsValue::Boolean(!abstract_equality_comparison(&ctx.heap, lval, rval)?)),
        BinaryOperator::StrictlyEqual => Ok(JsValue::Boolean(strict_equality_comparison(lval, rval))),
        BinaryOperator::StrictlyUnequal => Ok(JsValue::Boolean(!strict_equality_comparison(lval, rval))),

        BinaryOperator::LessThan => {
            let r = abstract_relational_comparison(&ctx.heap, lval, rval)?;
            Ok(JsValue::Boolean(r == Some(true)))
        }
        BinaryOperator::GreaterThan => {
            let r = abstract_relational_comparison(&ctx.heap, rval, lval)?;
            Ok(JsValue::Boolean(r == Some(true)))
        }
        BinaryOperator::LessThanEqual => {
            let r = abstract_relational_comparison(&ctx.heap, rval, lval)?;
            Ok(JsValue::Boolean(r == Some(false)))
        }
        BinaryOperator::GreaterThanEqual => {
            let r = abstract_relational_comparison(&ctx.heap, lval, rval)?;
            Ok(JsValue::Boolean(r == Some(false)))
        }

        BinaryOperator::BitwiseLeftShift => {
            let shift = to_uint32(ctx.to_number(rval)?) & 31;
            number(to_int32(ctx.to_number(lval)?).wrapping_shl(shift) as f64)
        }
        BinaryOperator::BitwiseRightShift => {
            let shift = to_uint32(ctx.to_number(rval)?) & 31;
            number((to_int32(ctx.to_number(lval)?) >> shift) as f64)
        }
        BinaryOperator::BitwiseUnsignedRightShift => {
            let shift = to_uint32(ctx.to_number(rval)?) & 31;
            number((to_uint32(ctx.to_number(lval)?) >> shift) as f64)
        }
        BinaryOperator::BitwiseOr => number((to_int32(ctx.to_number(lval)?) | to_int32(ctx.to_number(rval)?)) as f64),
        BinaryOperator::BitwiseAnd => number((to_int32(ctx.to_number(lval)?) & to_int32(ctx.to_number(rval)?)) as f64),
        BinaryOperator::BitwiseXor => number((to_int32(ctx.to_number(lval)?) ^ to_int32(ctx.to_number(rval)?)) as f64),

        BinaryOperator::In => {
            let key = ctx.to_property_key(lval)?;
            Ok(JsValue::Boolean(has_property(ctx, rval, &key)?))
        }
        BinaryOperator::InstanceOf => Ok(JsValue::Boolean(instance_of(ctx, lval, rval)?)),
    }
}

/// `**`: unlike `powf`, `(±1) ** ±Infinity` and `1 ** NaN` are `NaN`.
fn exponent(base: f64, exp: f64) -> f64 {
    if exp.is_nan() || (base.abs() == 1.0 && exp.is_infinite()) {
        f64::NAN
    } else {
        base.powf(exp)
    }
}

/// Source-like rendering of a callee for "is not a function" messages.
pub fn describe_expression(expr: &ExpressionType) -> String {
    match expr {
        ExpressionType::Identifier(id) => id.name.clone(),
        ExpressionType::ThisExpression { .. } => "this".to_string(),
        ExpressionType::MemberExpression(MemberExpressionType::SimpleMemberExpression {
            object,
            property,
            ..
        }) => format!("{}.{}", describe_expression(object), property.name),
        ExpressionType::MemberExpression(MemberExpressionType::ComputedMemberExpression { object, .. }) => {
            format!("{}[...]", describe_expression(object))
        }
        ExpressionType::CallExpression { callee, .. } => format!("{}(...)", describe_expression(callee)),
        _ => "expression".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponent_edge_cases() {
        assert!(exponent(1.0, f64::INFINITY).is_nan());
        assert!(exponent(-1.0, f64::NEG_INFINITY).is_nan());
        assert!(exponent(1.0, f64::NAN).is_nan());
        assert_eq!(exponent(2.0, 10.0), 1024.0);
        assert_eq!(exponent(f64::NAN, 0.0), 1.0);
    }

    #[test]
    fn test_add_concatenates_with_strings() {
        let mut ctx = EvalContext::new();
        let r = apply_binary(BinaryOperator::Add, &JsValue::from("a"), &JsValue::Number(1.0), &mut ctx).unwrap();
        assert_eq!(r, JsValue::from("a1"));
        let r = apply_binary(BinaryOperator::Add, &JsValue::Boolean(true), &JsValue::Number(1.0), &mut ctx).unwrap();
        assert_eq!(r, JsValue::Number(2.0));
    }

    #[test]
    fn test_shifts_mask_their_count() {
        let mut ctx = EvalContext::new();
        let r = apply_binary(BinaryOperator::BitwiseLeftShift, &JsValue::Number(1.0), &JsValue::Number(33.0), &mut ctx).unwrap();
        assert_eq!(r, JsValue::Number(2.0));
        let r = apply_binary(BinaryOperator::BitwiseUnsignedRightShift, &JsValue::Number(-1.0), &JsValue::Number(0.0), &mut ctx).unwrap();
        assert_eq!(r, JsValue::Number(4294967295.0));
    }

    #[test]
    fn test_comparisons_with_nan_are_false() {
        let mut ctx = EvalContext::new();
        for op in [
            BinaryOperator::LessThan,
            BinaryOperator::LessThanEqual,
            BinaryOperator::GreaterThan,
            BinaryOperator::GreaterThanEqual,
        ] {
            let r = apply_binary(op, &JsValue::Number(f64::NAN), &JsValue::Number(1.0), &mut ctx).unwrap();
            assert_eq!(r, JsValue::Boolean(false));
        }
    }
}
