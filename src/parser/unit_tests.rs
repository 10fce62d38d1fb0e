use super::api::JsParser;
use super::api::Rule;
use super::ast::*;
use crate::runner::ds::error::JErrorType;

use pest::consumes_to;
use pest::parses_to;
use pest::Parser;

fn parse_ok(script: &str) -> ProgramData {
    match JsParser::parse_to_ast_from_str(script) {
        Ok(program) => program,
        Err(e) => panic!("failed to parse {:?}: {}", script, e),
    }
}

fn parse_err(script: &str) -> (usize, usize, String) {
    match JsParser::parse_to_ast_from_str(script) {
        Err(JErrorType::SyntaxError {
            line,
            column,
            message,
        }) => (line, column, message),
        other => panic!("expected a syntax error for {:?}, got {:?}", script, other),
    }
}

fn only_expression(program: &ProgramData) -> &ExpressionType {
    match program.body.as_slice() {
        [StatementType::ExpressionStatement { expression, .. }] => expression,
        other => panic!("expected a single expression statement, got {:?}", other),
    }
}

#[test]
fn test_decimal_number() {
    parses_to! {
        parser: JsParser,
        input: "10",
        rule: Rule::numeric_literal,
        tokens: [
            numeric_literal(0, 2)
        ]
    };
}

#[test]
fn test_decimal_number_with_exp() {
    parses_to! {
        parser: JsParser,
        input: "1.123e10",
        rule: Rule::numeric_literal,
        tokens: [
            numeric_literal(0, 8)
        ]
    };
}

#[test]
fn test_hex_number() {
    parses_to! {
        parser: JsParser,
        input: "0x1F",
        rule: Rule::numeric_literal,
        tokens: [
            numeric_literal(0, 4)
        ]
    };
}

#[test]
fn test_number_followed_by_identifier_is_rejected() {
    assert!(JsParser::parse(Rule::numeric_literal, "3in").is_err());
}

#[test]
fn test_single_quoted_string() {
    parses_to! {
        parser: JsParser,
        input: "'ab'",
        rule: Rule::string_literal,
        tokens: [
            string_literal(0, 4, [
                single_quoted_text(1, 3)
            ])
        ]
    };
}

#[test]
fn test_double_quoted_string_with_escaped_quote() {
    parses_to! {
        parser: JsParser,
        input: "\"a\\\"b\"",
        rule: Rule::string_literal,
        tokens: [
            string_literal(0, 6, [
                double_quoted_text(1, 5)
            ])
        ]
    };
}

#[test]
fn test_identifier_with_keyword_prefix() {
    parses_to! {
        parser: JsParser,
        input: "returned",
        rule: Rule::identifier,
        tokens: [
            identifier(0, 8)
        ]
    };
    assert!(JsParser::parse(Rule::identifier, "return").is_err());
}

#[test]
fn test_property_access() {
    parses_to! {
        parser: JsParser,
        input: ".default",
        rule: Rule::property_access,
        tokens: [
            property_access(0, 8, [
                identifier_name(1, 8)
            ])
        ]
    };
}

#[test]
fn test_return_followed_by_newline() {
    parses_to! {
        parser: JsParser,
        input: "return\nx",
        rule: Rule::return_statement,
        tokens: [
            return_statement(0, 7, [
                statement_end(7, 7)
            ])
        ]
    };
}

#[test]
fn test_expression_precedence_chain() {
    parses_to! {
        parser: JsParser,
        input: "1",
        rule: Rule::assignment_expression,
        tokens: [
            assignment_expression(0, 1, [
                conditional_expression(0, 1, [
                    logical_or_expression(0, 1, [
                        logical_and_expression(0, 1, [
                            bitwise_or_expression(0, 1, [
                                bitwise_xor_expression(0, 1, [
                                    bitwise_and_expression(0, 1, [
                                        equality_expression(0, 1, [
                                            relational_expression(0, 1, [
                                                shift_expression(0, 1, [
                                                    additive_expression(0, 1, [
                                                        multiplicative_expression(0, 1, [
                                                            exponentiation_expression(0, 1, [
                                                                unary_expression(0, 1, [
                                                                    update_expression(0, 1, [
                                                                        left_hand_side_expression(0, 1, [
                                                                            numeric_literal(0, 1)
                                                                        ])
                                                                    ])
                                                                ])
                                                            ])
                                                        ])
                                                    ])
                                                ])
                                            ])
                                        ])
                                    ])
                                ])
                            ])
                        ])
                    ])
                ])
            ])
        ]
    };
}

#[test]
fn test_multiplication_binds_tighter_than_addition() {
    let program = parse_ok("1 + 2 * 3");
    match only_expression(&program) {
        ExpressionType::BinaryExpression {
            operator: BinaryOperator::Add,
            right,
            ..
        } => assert!(matches!(
            **right,
            ExpressionType::BinaryExpression {
                operator: BinaryOperator::Multiply,
                ..
            }
        )),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_subtraction_is_left_associative() {
    let program = parse_ok("8 - 4 - 2");
    match only_expression(&program) {
        ExpressionType::BinaryExpression {
            operator: BinaryOperator::Subtract,
            left,
            right,
            ..
        } => {
            assert!(matches!(**left, ExpressionType::BinaryExpression { .. }));
            assert!(matches!(**right, ExpressionType::Literal(_)));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_exponent_is_right_associative() {
    let program = parse_ok("2 ** 3 ** 2");
    match only_expression(&program) {
        ExpressionType::BinaryExpression {
            operator: BinaryOperator::Exponent,
            left,
            right,
            ..
        } => {
            assert!(matches!(**left, ExpressionType::Literal(_)));
            assert!(matches!(
                **right,
                ExpressionType::BinaryExpression {
                    operator: BinaryOperator::Exponent,
                    ..
                }
            ));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_call_and_member_chain() {
    let program = parse_ok("a.b(c)[0]");
    match only_expression(&program) {
        ExpressionType::MemberExpression(MemberExpressionType::ComputedMemberExpression {
            object,
            meta,
            ..
        }) => {
            assert_eq!(meta.start_index, 0);
            assert_eq!(meta.end_index, 9);
            match &**object {
                ExpressionType::CallExpression {
                    callee, arguments, ..
                } => {
                    assert_eq!(arguments.len(), 1);
                    assert!(matches!(
                        **callee,
                        ExpressionType::MemberExpression(
                            MemberExpressionType::SimpleMemberExpression { .. }
                        )
                    ));
                }
                other => panic!("unexpected {:?}", other),
            }
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_new_with_member_callee() {
    let program = parse_ok("new a.B(1, 2)");
    match only_expression(&program) {
        ExpressionType::NewExpression {
            callee, arguments, ..
        } => {
            assert_eq!(arguments.len(), 2);
            assert!(matches!(**callee, ExpressionType::MemberExpression(_)));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_bare_identifier_statement() {
    let program = parse_ok("Worker");
    match only_expression(&program) {
        ExpressionType::Identifier(id) => assert_eq!(id.name, "Worker"),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_string_literal_escapes_are_decoded() {
    let program = parse_ok(r#"'a\tb\x41'"#);
    match only_expression(&program) {
        ExpressionType::Literal(LiteralData {
            value: LiteralType::StringLiteral(s),
            ..
        }) => assert_eq!(s, "a\tbA"),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_object_literal_forms() {
    let program = parse_ok("({ a: 1, 'b c': 2, 3: x, [k]: 4, m() { return 1 }, short })");
    match only_expression(&program) {
        ExpressionType::ObjectExpression { properties, .. } => {
            assert_eq!(properties.len(), 6);
            assert!(matches!(&properties[0].key, PropertyKeyType::Static(s) if s == "a"));
            assert!(matches!(&properties[1].key, PropertyKeyType::Static(s) if s == "b c"));
            assert!(matches!(properties[2].key, PropertyKeyType::Numeric(n) if n == 3.0));
            assert!(matches!(properties[3].key, PropertyKeyType::Computed(_)));
            assert!(matches!(properties[4].value, ExpressionType::FunctionExpression(_)));
            assert!(matches!(&properties[5].value, ExpressionType::Identifier(id) if id.name == "short"));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_arrow_functions() {
    let program = parse_ok("x => x * 2");
    match only_expression(&program) {
        ExpressionType::ArrowFunctionExpression(f) => {
            assert!(f.is_arrow);
            assert_eq!(f.params.len(), 1);
            assert!(matches!(f.body, FunctionBodyOrExpression::Expression(_)));
        }
        other => panic!("unexpected {:?}", other),
    }
    let program = parse_ok("(a, b = 1) => { return a + b }");
    match only_expression(&program) {
        ExpressionType::ArrowFunctionExpression(f) => {
            assert_eq!(f.params.len(), 2);
            assert!(f.params[1].default_value.is_some());
            assert!(matches!(f.body, FunctionBodyOrExpression::FunctionBody(_)));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_compound_assignment_and_update() {
    let program = parse_ok("a.b += 2; i++; --j");
    assert_eq!(program.body.len(), 3);
    match &program.body[0] {
        StatementType::ExpressionStatement {
            expression:
                ExpressionType::AssignmentExpression {
                    operator: AssignmentOperator::AddEquals,
                    ..
                },
            ..
        } => {}
        other => panic!("unexpected {:?}", other),
    }
    match &program.body[1] {
        StatementType::ExpressionStatement {
            expression: ExpressionType::UpdateExpression { prefix: false, .. },
            ..
        } => {}
        other => panic!("unexpected {:?}", other),
    }
    match &program.body[2] {
        StatementType::ExpressionStatement {
            expression: ExpressionType::UpdateExpression { prefix: true, .. },
            ..
        } => {}
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_automatic_semicolon_on_new_line() {
    let program = parse_ok("var a = 1\nvar b = 2\n// trailing\n");
    assert_eq!(program.body.len(), 2);
    assert_eq!(program.declarations.var_names, vec!["a", "b"]);
}

#[test]
fn test_automatic_semicolon_before_closing_brace() {
    let program = parse_ok("function f() { return 1 }");
    assert_eq!(program.declarations.functions.len(), 1);
    assert_eq!(program.declarations.functions[0].name(), "f");
}

#[test]
fn test_missing_semicolon_on_same_line() {
    let (line, column, message) = parse_err("var a = 1 var b = 2");
    assert_eq!((line, column), (1, 11));
    assert_eq!(message, "Unexpected token 'var'");
}

#[test]
fn test_return_on_its_own_line_returns_nothing() {
    let program = parse_ok("function f() {\n  return\n  42\n}");
    match &program.body[0] {
        StatementType::DeclarationStatement(DeclarationType::FunctionDeclaration(f)) => match &f.body {
            FunctionBodyOrExpression::FunctionBody(body) => {
                assert!(matches!(
                    body.body[0],
                    StatementType::ReturnStatement { argument: None, .. }
                ));
                assert_eq!(body.body.len(), 2);
            }
            other => panic!("unexpected {:?}", other),
        },
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_unexpected_token_position() {
    let (line, column, message) = parse_err("let x = 1;\nlet y = ;");
    assert_eq!((line, column), (2, 9));
    assert_eq!(message, "Unexpected token ';'");
}

#[test]
fn test_unterminated_input() {
    let (_, _, message) = parse_err("function f() {");
    assert_eq!(message, "Unexpected end of input");
}

#[test]
fn test_const_requires_initializer() {
    let (_, _, message) = parse_err("const a;");
    assert_eq!(message, "Missing initializer in const declaration");
}

#[test]
fn test_invalid_assignment_target() {
    let (_, _, message) = parse_err("1 = 2");
    assert_eq!(message, "Invalid left-hand side in assignment");
}

#[test]
fn test_duplicate_lexical_declaration() {
    let (_, _, message) = parse_err("let a = 1; let a = 2;");
    assert_eq!(message, "Identifier 'a' has already been declared");
    let (_, _, message) = parse_err("{ var b; let b; }");
    assert_eq!(message, "Identifier 'b' has already been declared");
}

#[test]
fn test_duplicate_default_clause() {
    let (_, _, message) = parse_err("switch (x) { default: break; default: break; }");
    assert_eq!(message, "More than one default clause in switch statement");
}

#[test]
fn test_hoisted_declarations() {
    let program = parse_ok("var a; { var b; let c; } for (var i = 0; i < 1; i++) {} function f() { var inner; }");
    assert_eq!(program.declarations.var_names, vec!["a", "b", "i"]);
    assert!(program.declarations.lexical_names.is_empty());
    assert_eq!(program.declarations.functions.len(), 1);
    match &program.body[1] {
        StatementType::BlockStatement(block) => {
            assert!(block.declarations.has_lexical_scope());
            assert_eq!(block.declarations.lexical_names[0].name, "c");
            assert!(!block.declarations.lexical_names[0].is_const);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_loops_and_try() {
    let program = parse_ok(
        "for (const v of list) {}\nfor (k in obj) {}\ndo { n-- } while (n > 0)\ntry { f() } catch (e) { g(e) } finally { h() }",
    );
    assert!(matches!(
        &program.body[0],
        StatementType::ForOfStatement(ForIteratorData {
            kind: Some(VariableDeclarationKind::Const),
            ..
        })
    ));
    assert!(matches!(
        &program.body[1],
        StatementType::ForInStatement(ForIteratorData { kind: None, .. })
    ));
    assert!(matches!(&program.body[2], StatementType::DoWhileStatement { .. }));
    match &program.body[3] {
        StatementType::TryStatement {
            handler, finalizer, ..
        } => {
            assert_eq!(
                handler.as_ref().and_then(|h| h.param.as_ref()).map(|p| p.name.as_str()),
                Some("e")
            );
            assert!(finalizer.is_some());
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_keywords_need_word_boundary() {
    let program = parse_ok("var dox = 1; var iffy = dox; newer = iffy");
    assert_eq!(program.body.len(), 3);
}
