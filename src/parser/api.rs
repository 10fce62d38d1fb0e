use std::cell::Cell;
use std::rc::Rc;

use pest::error::{Error, ErrorVariant, InputLocation, LineColLocation};
use pest::iterators::{Pair, Pairs};
use pest::{Parser, Position, Span};
use pest_derive::Parser;

use super::ast::*;
use super::static_semantics::collect_declarations;
use super::util::{
    find_excessive_nesting, parse_numeric_literal, preceded_by_line_terminator, unescape_string_literal,
    MAX_NESTING_DEPTH,
};
use crate::runner::ds::error::JErrorType;
use crate::runner::stack::{self, PARSER_STACK_SIZE};

/// Deepest AST the builder produces. Long left-nested chains (`a + b + ...`,
/// `a.b.c...`) count one level per link.
const MAX_AST_DEPTH: usize = 4096;

const NESTING_ERROR: &str = "Maximum nesting depth exceeded";

#[derive(Parser)]
#[grammar = "parser/js_grammar.pest"] // relative to src
pub struct JsParser;

impl JsParser {
    /// Parses `script` into a [`ProgramData`], turning any failure into a
    /// `SyntaxError` that carries the 1-based line and column of the offending token.
    pub fn parse_to_ast_from_str(script: &str) -> Result<ProgramData, JErrorType> {
        parse_to_ast(script).map_err(|e| to_syntax_error(&e, script))
    }

    /// A `SyntaxError` located at byte offset `index` of `script`, for early
    /// errors found after parsing.
    pub fn syntax_error_at(script: &str, index: usize, message: impl Into<String>) -> JErrorType {
        let (line, column) = Position::new(script, index)
            .map(|pos| pos.line_col())
            .unwrap_or((1, 1));
        JErrorType::SyntaxError {
            line,
            column,
            message: message.into(),
        }
    }
}

pub fn parse_to_ast(script: &str) -> Result<ProgramData, Error<Rule>> {
    if let Some(index) = find_excessive_nesting(script, MAX_NESTING_DEPTH) {
        let position = Position::new(script, index).unwrap_or_else(|| Position::from_start(script));
        return Err(Error::new_from_pos(
            ErrorVariant::CustomError {
                message: NESTING_ERROR.to_string(),
            },
            position,
        ));
    }
    stack::with_stack(PARSER_STACK_SIZE, || {
        let mut pairs = JsParser::parse(Rule::program, script)?;
        match pairs.next() {
            Some(program) => AstBuilder::new(script).build_ast_from_program(program),
            None => Err(Error::new_from_pos(
                ErrorVariant::CustomError {
                    message: "Unexpected end of input".to_string(),
                },
                Position::from_start(script),
            )),
        }
    })
}

fn to_syntax_error(error: &Error<Rule>, script: &str) -> JErrorType {
    let (line, column) = match error.line_col {
        LineColLocation::Pos(pos) => pos,
        LineColLocation::Span(start, _) => start,
    };
    let message = match &error.variant {
        ErrorVariant::CustomError { message } => message.to_string(),
        ErrorVariant::ParsingError { .. } => {
            let pos = match error.location {
                InputLocation::Pos(pos) => pos,
                InputLocation::Span((start, _)) => start,
            };
            describe_unexpected_token(script, pos)
        }
    };
    JErrorType::SyntaxError {
        line,
        column,
        message,
    }
}

fn describe_unexpected_token(script: &str, pos: usize) -> String {
    let rest = script.get(pos..).unwrap_or("");
    let mut chars = rest.char_indices();
    match chars.next() {
        None => "Unexpected end of input".to_string(),
        Some((_, c)) if c.is_alphanumeric() || c == '_' || c == '$' => {
            let end = rest
                .char_indices()
                .find(|(_, c)| !(c.is_alphanumeric() || *c == '_' || *c == '$'))
                .map(|(i, _)| i)
                .unwrap_or(rest.len());
            format!("Unexpected token '{}'", &rest[..end])
        }
        Some((_, c)) => format!("Unexpected token '{}'", c),
    }
}

fn get_unexpected_error(id: i32, pair: &Pair<Rule>) -> Error<Rule> {
    let message = format!("Unexpected state reached [{:?}] - {}", pair.as_rule(), id);
    Error::new_from_span(ErrorVariant::CustomError { message }, pair.as_span())
}

fn custom_error(message: impl Into<String>, span: Span) -> Error<Rule> {
    Error::new_from_span(
        ErrorVariant::CustomError {
            message: message.into(),
        },
        span,
    )
}

fn next_pair<'i>(pairs: &mut Pairs<'i, Rule>, parent: Span<'i>) -> Result<Pair<'i, Rule>, Error<Rule>> {
    pairs
        .next()
        .ok_or_else(|| custom_error("Unexpected end of input", parent))
}

fn get_meta(pair: &Pair<Rule>) -> Meta {
    let span = pair.as_span();
    Meta {
        start_index: span.start(),
        end_index: span.end(),
    }
}

fn get_identifier_data(pair: &Pair<Rule>) -> IdentifierData {
    IdentifierData {
        name: pair.as_str().to_string(),
        meta: get_meta(pair),
    }
}

fn declarations_for<'a, I>(statements: I, span: Span) -> Result<HoistedDeclarations, Error<Rule>>
where
    I: IntoIterator<Item = &'a StatementType>,
{
    collect_declarations(statements).map_err(|message| custom_error(message, span))
}

fn get_declaration_kind(pair: &Pair<Rule>) -> Result<VariableDeclarationKind, Error<Rule>> {
    match pair.as_str() {
        "var" => Ok(VariableDeclarationKind::Var),
        "let" => Ok(VariableDeclarationKind::Let),
        "const" => Ok(VariableDeclarationKind::Const),
        _ => Err(get_unexpected_error(1, pair)),
    }
}

fn get_assignment_operator(pair: &Pair<Rule>) -> Result<AssignmentOperator, Error<Rule>> {
    Ok(match pair.as_str() {
        "=" => AssignmentOperator::Equals,
        "+=" => AssignmentOperator::AddEquals,
        "-=" => AssignmentOperator::SubtractEquals,
        "*=" => AssignmentOperator::MultiplyEquals,
        "/=" => AssignmentOperator::DivideEquals,
        "%=" => AssignmentOperator::ModuloEquals,
        "**=" => AssignmentOperator::ExponentEquals,
        "<<=" => AssignmentOperator::BitwiseLeftShiftEquals,
        ">>=" => AssignmentOperator::BitwiseRightShiftEquals,
        ">>>=" => AssignmentOperator::BitwiseUnsignedRightShiftEquals,
        "|=" => AssignmentOperator::BitwiseOrEquals,
        "&=" => AssignmentOperator::BitwiseAndEquals,
        "^=" => AssignmentOperator::BitwiseXorEquals,
        _ => return Err(get_unexpected_error(2, pair)),
    })
}

fn get_binary_operator(pair: &Pair<Rule>) -> Result<BinaryOperator, Error<Rule>> {
    Ok(match pair.as_str() {
        "==" => BinaryOperator::LooselyEqual,
        "!=" => BinaryOperator::LooselyUnequal,
        "===" => BinaryOperator::StrictlyEqual,
        "!==" => BinaryOperator::StrictlyUnequal,
        "<" => BinaryOperator::LessThan,
        "<=" => BinaryOperator::LessThanEqual,
        ">" => BinaryOperator::GreaterThan,
        ">=" => BinaryOperator::GreaterThanEqual,
        "<<" => BinaryOperator::BitwiseLeftShift,
        ">>" => BinaryOperator::BitwiseRightShift,
        ">>>" => BinaryOperator::BitwiseUnsignedRightShift,
        "+" => BinaryOperator::Add,
        "-" => BinaryOperator::Subtract,
        "*" => BinaryOperator::Multiply,
        "/" => BinaryOperator::Divide,
        "%" => BinaryOperator::Modulo,
        "**" => BinaryOperator::Exponent,
        "|" => BinaryOperator::BitwiseOr,
        "&" => BinaryOperator::BitwiseAnd,
        "^" => BinaryOperator::BitwiseXor,
        "in" => BinaryOperator::In,
        "instanceof" => BinaryOperator::InstanceOf,
        _ => return Err(get_unexpected_error(3, pair)),
    })
}

fn get_logical_operator(pair: &Pair<Rule>) -> Result<LogicalOperator, Error<Rule>> {
    Ok(match pair.as_str() {
        "||" => LogicalOperator::Or,
        "&&" => LogicalOperator::And,
        "??" => LogicalOperator::NullishCoalescing,
        _ => return Err(get_unexpected_error(4, pair)),
    })
}

fn get_unary_operator(pair: &Pair<Rule>) -> Result<UnaryOperator, Error<Rule>> {
    Ok(match pair.as_str() {
        "typeof" => UnaryOperator::TypeOf,
        "void" => UnaryOperator::Void,
        "delete" => UnaryOperator::Delete,
        "!" => UnaryOperator::LogicalNot,
        "~" => UnaryOperator::BitwiseNot,
        "+" => UnaryOperator::Plus,
        "-" => UnaryOperator::Minus,
        _ => return Err(get_unexpected_error(5, pair)),
    })
}

fn get_update_operator(pair: &Pair<Rule>) -> Result<UpdateOperator, Error<Rule>> {
    match pair.as_str() {
        "++" => Ok(UpdateOperator::PlusPlus),
        "--" => Ok(UpdateOperator::MinusMinus),
        _ => Err(get_unexpected_error(6, pair)),
    }
}

/// Converts pest pairs into the AST. The source text is kept around to
/// resolve automatic semicolon insertion.
struct AstBuilder<'s> {
    script: &'s str,
    depth: Cell<usize>,
}

/// Releases one level of builder depth when dropped.
struct DepthGuard<'b> {
    depth: &'b Cell<usize>,
    level: usize,
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.depth.set(self.level);
    }
}

impl<'s> AstBuilder<'s> {
    fn new(script: &'s str) -> Self {
        AstBuilder {
            script,
            depth: Cell::new(0),
        }
    }

    /// Enter one more level of AST nesting, for the lifetime of the guard.
    fn descend(&self, span: Span) -> Result<DepthGuard<'_>, Error<Rule>> {
        let level = self.depth.get();
        self.extend_chain(span)?;
        Ok(DepthGuard {
            depth: &self.depth,
            level,
        })
    }

    /// Account for one more link of a left-nested chain. Links accumulate
    /// until the enclosing guard releases them, so this overestimates.
    fn extend_chain(&self, span: Span) -> Result<(), Error<Rule>> {
        let depth = self.depth.get() + 1;
        if depth > MAX_AST_DEPTH {
            return Err(custom_error(NESTING_ERROR, span));
        }
        self.depth.set(depth);
        Ok(())
    }

    fn build_ast_from_program(&self, pair: Pair<Rule>) -> Result<ProgramData, Error<Rule>> {
        let meta = get_meta(&pair);
        let span = pair.as_span();
        let body = self.build_ast_from_statement_list(pair.into_inner())?;
        let declarations = declarations_for(&body, span)?;
        Ok(ProgramData {
            meta,
            body,
            declarations,
        })
    }

    fn build_ast_from_statement_list(&self, pairs: Pairs<Rule>) -> Result<Vec<StatementType>, Error<Rule>> {
        let mut statements = vec![];
        for pair in pairs {
            if pair.as_rule() == Rule::EOI {
                continue;
            }
            statements.push(self.build_ast_from_statement(pair)?);
        }
        Ok(statements)
    }

    /// An empty `statement_end` is only acceptable where a semicolon would be inserted.
    fn check_statement_end(&self, pair: &Pair<Rule>) -> Result<(), Error<Rule>> {
        let span = pair.as_span();
        if span.end() > span.start() {
            return Ok(());
        }
        let pos = span.start();
        let rest = self.script.get(pos..).unwrap_or("");
        if rest.is_empty() || rest.starts_with('}') || preceded_by_line_terminator(self.script, pos) {
            Ok(())
        } else {
            Err(custom_error(describe_unexpected_token(self.script, pos), span))
        }
    }

    fn build_ast_from_statement(&self, pair: Pair<Rule>) -> Result<StatementType, Error<Rule>> {
        let meta = get_meta(&pair);
        let span = pair.as_span();
        let _level = self.descend(span)?;
        match pair.as_rule() {
            Rule::function_declaration => Ok(StatementType::DeclarationStatement(
                DeclarationType::FunctionDeclaration(Rc::new(self.build_ast_from_function(pair)?)),
            )),
            Rule::variable_statement => {
                let mut inner = pair.into_inner();
                let list = next_pair(&mut inner, span)?;
                self.check_statement_end(&next_pair(&mut inner, span)?)?;
                Ok(StatementType::DeclarationStatement(
                    DeclarationType::VariableDeclaration(self.build_ast_from_variable_declaration_list(list)?),
                ))
            }
            Rule::block_statement => Ok(StatementType::BlockStatement(self.build_ast_from_block(pair)?)),
            Rule::empty_statement => Ok(StatementType::EmptyStatement { meta }),
            Rule::expression_statement => {
                let mut inner = pair.into_inner();
                let expression = self.build_ast_from_expression(next_pair(&mut inner, span)?)?;
                self.check_statement_end(&next_pair(&mut inner, span)?)?;
                Ok(StatementType::ExpressionStatement { meta, expression })
            }
            Rule::if_statement => {
                let mut inner = pair.into_inner();
                let test = self.build_ast_from_expression(next_pair(&mut inner, span)?)?;
                let consequent = Box::new(self.build_ast_from_statement(next_pair(&mut inner, span)?)?);
                let alternate = match inner.next() {
                    Some(p) => Some(Box::new(self.build_ast_from_statement(p)?)),
                    None => None,
                };
                Ok(StatementType::IfStatement {
                    meta,
                    test,
                    consequent,
                    alternate,
                })
            }
            Rule::while_statement => {
                let mut inner = pair.into_inner();
                let test = self.build_ast_from_expression(next_pair(&mut inner, span)?)?;
                let body = Box::new(self.build_ast_from_statement(next_pair(&mut inner, span)?)?);
                Ok(StatementType::WhileStatement { meta, test, body })
            }
            Rule::do_while_statement => {
                let mut inner = pair.into_inner();
                let body = Box::new(self.build_ast_from_statement(next_pair(&mut inner, span)?)?);
                let test = self.build_ast_from_expression(next_pair(&mut inner, span)?)?;
                Ok(StatementType::DoWhileStatement { meta, body, test })
            }
            Rule::for_statement => self.build_ast_from_for_statement(pair),
            Rule::for_in_of_statement => self.build_ast_from_for_in_of_statement(pair),
            Rule::return_statement => {
                let mut argument = None;
                for inner in pair.into_inner() {
                    match inner.as_rule() {
                        Rule::expression => argument = Some(self.build_ast_from_expression(inner)?),
                        Rule::statement_end => self.check_statement_end(&inner)?,
                        _ => return Err(get_unexpected_error(10, &inner)),
                    }
                }
                Ok(StatementType::ReturnStatement { meta, argument })
            }
            Rule::break_statement => {
                self.check_statement_end(&next_pair(&mut pair.into_inner(), span)?)?;
                Ok(StatementType::BreakStatement { meta })
            }
            Rule::continue_statement => {
                self.check_statement_end(&next_pair(&mut pair.into_inner(), span)?)?;
                Ok(StatementType::ContinueStatement { meta })
            }
            Rule::throw_statement => {
                let mut inner = pair.into_inner();
                let argument = self.build_ast_from_expression(next_pair(&mut inner, span)?)?;
                self.check_statement_end(&next_pair(&mut inner, span)?)?;
                Ok(StatementType::ThrowStatement { meta, argument })
            }
            Rule::try_statement => self.build_ast_from_try_statement(pair),
            Rule::switch_statement => self.build_ast_from_switch_statement(pair),
            _ => Err(get_unexpected_error(11, &pair)),
        }
    }

    fn build_ast_from_block(&self, pair: Pair<Rule>) -> Result<BlockStatementData, Error<Rule>> {
        let meta = get_meta(&pair);
        let span = pair.as_span();
        let body = self.build_ast_from_statement_list(pair.into_inner())?;
        let declarations = declarations_for(&body, span)?;
        Ok(BlockStatementData {
            meta,
            body,
            declarations,
        })
    }

    fn build_ast_from_variable_declaration_list(
        &self,
        pair: Pair<Rule>,
    ) -> Result<VariableDeclarationData, Error<Rule>> {
        let meta = get_meta(&pair);
        let span = pair.as_span();
        let mut inner = pair.into_inner();
        let kind = get_declaration_kind(&next_pair(&mut inner, span)?)?;
        let mut declarations = vec![];
        for declarator in inner {
            let declarator_meta = get_meta(&declarator);
            let declarator_span = declarator.as_span();
            let mut parts = declarator.into_inner();
            let id = get_identifier_data(&next_pair(&mut parts, declarator_span)?);
            let init = match parts.next() {
                Some(p) => Some(self.build_ast_from_expression(p)?),
                None => None,
            };
            if init.is_none() && kind == VariableDeclarationKind::Const {
                return Err(custom_error(
                    "Missing initializer in const declaration",
                    declarator_span,
                ));
            }
            declarations.push(VariableDeclaratorData {
                meta: declarator_meta,
                id,
                init,
            });
        }
        Ok(VariableDeclarationData {
            meta,
            declarations,
            kind,
        })
    }

    fn build_ast_from_for_statement(&self, pair: Pair<Rule>) -> Result<StatementType, Error<Rule>> {
        let meta = get_meta(&pair);
        let span = pair.as_span();
        let mut init = None;
        let mut test = None;
        let mut update = None;
        let mut body = None;
        for inner in pair.into_inner() {
            let inner_span = inner.as_span();
            match inner.as_rule() {
                Rule::for_init => {
                    let child = next_pair(&mut inner.into_inner(), inner_span)?;
                    init = Some(if child.as_rule() == Rule::variable_declaration_list {
                        VariableDeclarationOrExpression::VariableDeclaration(
                            self.build_ast_from_variable_declaration_list(child)?,
                        )
                    } else {
                        VariableDeclarationOrExpression::Expression(self.build_ast_from_expression(child)?)
                    });
                }
                Rule::for_test => {
                    test = Some(self.build_ast_from_expression(next_pair(&mut inner.into_inner(), inner_span)?)?)
                }
                Rule::for_update => {
                    update = Some(self.build_ast_from_expression(next_pair(&mut inner.into_inner(), inner_span)?)?)
                }
                _ => body = Some(Box::new(self.build_ast_from_statement(inner)?)),
            }
        }
        let body = body.ok_or_else(|| custom_error("Missing loop body", span))?;
        Ok(StatementType::ForStatement(ForStatementData {
            meta,
            init,
            test,
            update,
            body,
        }))
    }

    fn build_ast_from_for_in_of_statement(&self, pair: Pair<Rule>) -> Result<StatementType, Error<Rule>> {
        let meta = get_meta(&pair);
        let span = pair.as_span();
        let mut inner = pair.into_inner();
        let binding_pair = next_pair(&mut inner, span)?;
        let iteration_kind = next_pair(&mut inner, span)?;
        let right = self.build_ast_from_expression(next_pair(&mut inner, span)?)?;
        let body = Box::new(self.build_ast_from_statement(next_pair(&mut inner, span)?)?);

        let binding_span = binding_pair.as_span();
        let mut binding_inner = binding_pair.into_inner();
        let first = next_pair(&mut binding_inner, binding_span)?;
        let (kind, binding) = if first.as_rule() == Rule::declaration_kind {
            let kind = get_declaration_kind(&first)?;
            let id = next_pair(&mut binding_inner, binding_span)?;
            (Some(kind), get_identifier_data(&id))
        } else {
            (None, get_identifier_data(&first))
        };
        let data = ForIteratorData {
            meta,
            kind,
            binding,
            right,
            body,
        };
        match iteration_kind.as_str() {
            "in" => Ok(StatementType::ForInStatement(data)),
            "of" => Ok(StatementType::ForOfStatement(data)),
            _ => Err(get_unexpected_error(12, &iteration_kind)),
        }
    }

    fn build_ast_from_try_statement(&self, pair: Pair<Rule>) -> Result<StatementType, Error<Rule>> {
        let meta = get_meta(&pair);
        let span = pair.as_span();
        let mut inner = pair.into_inner();
        let block = self.build_ast_from_block(next_pair(&mut inner, span)?)?;
        let mut handler = None;
        let mut finalizer = None;
        for clause in inner {
            let clause_meta = get_meta(&clause);
            let clause_span = clause.as_span();
            match clause.as_rule() {
                Rule::catch_clause => {
                    let mut param = None;
                    let mut body = None;
                    for part in clause.into_inner() {
                        match part.as_rule() {
                            Rule::identifier => param = Some(get_identifier_data(&part)),
                            Rule::block_statement => body = Some(self.build_ast_from_block(part)?),
                            _ => return Err(get_unexpected_error(13, &part)),
                        }
                    }
                    let body = body.ok_or_else(|| custom_error("Missing catch block", clause_span))?;
                    handler = Some(CatchClauseData {
                        meta: clause_meta,
                        param,
                        body,
                    });
                }
                Rule::finally_clause => {
                    let block_pair = next_pair(&mut clause.into_inner(), clause_span)?;
                    finalizer = Some(self.build_ast_from_block(block_pair)?);
                }
                _ => return Err(get_unexpected_error(14, &clause)),
            }
        }
        Ok(StatementType::TryStatement {
            meta,
            block,
            handler,
            finalizer,
        })
    }

    fn build_ast_from_switch_statement(&self, pair: Pair<Rule>) -> Result<StatementType, Error<Rule>> {
        let meta = get_meta(&pair);
        let span = pair.as_span();
        let mut inner = pair.into_inner();
        let discriminant = self.build_ast_from_expression(next_pair(&mut inner, span)?)?;
        let mut cases = vec![];
        let mut seen_default = false;
        for clause in inner {
            let clause_meta = get_meta(&clause);
            let clause_span = clause.as_span();
            let mut test = None;
            let mut consequent = vec![];
            for (i, child) in clause.into_inner().enumerate() {
                if i == 0 && child.as_rule() == Rule::expression {
                    test = Some(self.build_ast_from_expression(child)?);
                } else {
                    consequent.push(self.build_ast_from_statement(child)?);
                }
            }
            if test.is_none() {
                if seen_default {
                    return Err(custom_error(
                        "More than one default clause in switch statement",
                        clause_span,
                    ));
                }
                seen_default = true;
            }
            cases.push(SwitchCaseData {
                meta: clause_meta,
                test,
                consequent,
            });
        }
        let declarations = declarations_for(cases.iter().flat_map(|c| c.consequent.iter()), span)?;
        Ok(StatementType::SwitchStatement(SwitchStatementData {
            meta,
            discriminant,
            cases,
            declarations,
        }))
    }

    fn build_ast_from_function(&self, pair: Pair<Rule>) -> Result<FunctionData, Error<Rule>> {
        let meta = get_meta(&pair);
        let span = pair.as_span();
        let mut id = None;
        let mut params = vec![];
        let mut body = None;
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::identifier => id = Some(get_identifier_data(&inner)),
                Rule::formal_parameters => params = self.build_ast_from_formal_parameters(inner)?,
                Rule::function_body => body = Some(self.build_ast_from_function_body(inner)?),
                _ => return Err(get_unexpected_error(20, &inner)),
            }
        }
        let body = body.ok_or_else(|| custom_error("Missing function body", span))?;
        Ok(FunctionData {
            meta,
            id,
            params,
            body: FunctionBodyOrExpression::FunctionBody(body),
            is_arrow: false,
        })
    }

    fn build_ast_from_formal_parameters(&self, pair: Pair<Rule>) -> Result<Vec<FormalParameterData>, Error<Rule>> {
        let mut params = vec![];
        for param in pair.into_inner() {
            let meta = get_meta(&param);
            let span = param.as_span();
            let mut inner = param.into_inner();
            let name = get_identifier_data(&next_pair(&mut inner, span)?);
            let default_value = match inner.next() {
                Some(p) => Some(self.build_ast_from_expression(p)?),
                None => None,
            };
            params.push(FormalParameterData {
                meta,
                name,
                default_value,
            });
        }
        Ok(params)
    }

    fn build_ast_from_function_body(&self, pair: Pair<Rule>) -> Result<FunctionBodyData, Error<Rule>> {
        let meta = get_meta(&pair);
        let span = pair.as_span();
        let body = self.build_ast_from_statement_list(pair.into_inner())?;
        let declarations = declarations_for(&body, span)?;
        Ok(FunctionBodyData {
            meta,
            body,
            declarations,
        })
    }

    fn build_ast_from_arrow_function(&self, pair: Pair<Rule>) -> Result<FunctionData, Error<Rule>> {
        let meta = get_meta(&pair);
        let span = pair.as_span();
        let mut inner = pair.into_inner();
        let params_pair = next_pair(&mut inner, span)?;
        let params_span = params_pair.as_span();
        let param = next_pair(&mut params_pair.into_inner(), params_span)?;
        let params = match param.as_rule() {
            Rule::identifier => vec![FormalParameterData {
                meta: get_meta(&param),
                name: get_identifier_data(&param),
                default_value: None,
            }],
            Rule::formal_parameters => self.build_ast_from_formal_parameters(param)?,
            _ => return Err(get_unexpected_error(21, &param)),
        };
        let body_pair = next_pair(&mut inner, span)?;
        let body_span = body_pair.as_span();
        let body_inner = next_pair(&mut body_pair.into_inner(), body_span)?;
        let body = match body_inner.as_rule() {
            Rule::function_body => FunctionBodyOrExpression::FunctionBody(self.build_ast_from_function_body(body_inner)?),
            _ => FunctionBodyOrExpression::Expression(Box::new(self.build_ast_from_expression(body_inner)?)),
        };
        Ok(FunctionData {
            meta,
            id: None,
            params,
            body,
            is_arrow: true,
        })
    }

    fn build_ast_from_expression(&self, pair: Pair<Rule>) -> Result<ExpressionType, Error<Rule>> {
        let meta = get_meta(&pair);
        let span = pair.as_span();
        match pair.as_rule() {
            Rule::expression => {
                let mut expressions = vec![];
                for inner in pair.into_inner() {
                    expressions.push(self.build_ast_from_expression(inner)?);
                }
                if expressions.len() == 1 {
                    expressions.pop().ok_or_else(|| custom_error("Expected expression", span))
                } else {
                    Ok(ExpressionType::SequenceExpression { meta, expressions })
                }
            }
            Rule::assignment_expression => {
                let _level = self.descend(span)?;
                let mut inner = pair.into_inner();
                let first = next_pair(&mut inner, span)?;
                let left_span = first.as_span();
                let left = self.build_ast_from_expression(first)?;
                match inner.next() {
                    None => Ok(left),
                    Some(operator_pair) => {
                        let operator = get_assignment_operator(&operator_pair)?;
                        if !left.is_assignment_target() {
                            return Err(custom_error("Invalid left-hand side in assignment", left_span));
                        }
                        let right = self.build_ast_from_expression(next_pair(&mut inner, span)?)?;
                        Ok(ExpressionType::AssignmentExpression {
                            meta,
                            operator,
                            left: Box::new(left),
                            right: Box::new(right),
                        })
                    }
                }
            }
            Rule::arrow_function => Ok(ExpressionType::ArrowFunctionExpression(Rc::new(
                self.build_ast_from_arrow_function(pair)?,
            ))),
            Rule::conditional_expression => {
                let mut inner = pair.into_inner();
                let test = self.build_ast_from_expression(next_pair(&mut inner, span)?)?;
                match inner.next() {
                    None => Ok(test),
                    Some(consequent) => {
                        let _level = self.descend(span)?;
                        let consequent = self.build_ast_from_expression(consequent)?;
                        let alternate = self.build_ast_from_expression(next_pair(&mut inner, span)?)?;
                        Ok(ExpressionType::ConditionalExpression {
                            meta,
                            test: Box::new(test),
                            consequent: Box::new(consequent),
                            alternate: Box::new(alternate),
                        })
                    }
                }
            }
            Rule::logical_or_expression
            | Rule::logical_and_expression
            | Rule::bitwise_or_expression
            | Rule::bitwise_xor_expression
            | Rule::bitwise_and_expression
            | Rule::equality_expression
            | Rule::relational_expression
            | Rule::shift_expression
            | Rule::additive_expression
            | Rule::multiplicative_expression => self.build_ast_from_binary_chain(pair),
            Rule::exponentiation_expression => {
                let mut inner = pair.into_inner();
                let base = self.build_ast_from_expression(next_pair(&mut inner, span)?)?;
                match inner.next() {
                    None => Ok(base),
                    Some(_operator) => {
                        let _level = self.descend(span)?;
                        let exponent = self.build_ast_from_expression(next_pair(&mut inner, span)?)?;
                        Ok(ExpressionType::BinaryExpression {
                            meta,
                            operator: BinaryOperator::Exponent,
                            left: Box::new(base),
                            right: Box::new(exponent),
                        })
                    }
                }
            }
            Rule::unary_expression => {
                let mut inner = pair.into_inner();
                let first = next_pair(&mut inner, span)?;
                if first.as_rule() == Rule::unary_operator {
                    let _level = self.descend(span)?;
                    let operator = get_unary_operator(&first)?;
                    let argument = self.build_ast_from_expression(next_pair(&mut inner, span)?)?;
                    Ok(ExpressionType::UnaryExpression {
                        meta,
                        operator,
                        argument: Box::new(argument),
                    })
                } else {
                    self.build_ast_from_expression(first)
                }
            }
            Rule::update_expression => {
                let mut inner = pair.into_inner();
                let first = next_pair(&mut inner, span)?;
                if first.as_rule() == Rule::update_operator {
                    let _level = self.descend(span)?;
                    let operator = get_update_operator(&first)?;
                    let argument_pair = next_pair(&mut inner, span)?;
                    let argument_span = argument_pair.as_span();
                    let argument = self.build_ast_from_expression(argument_pair)?;
                    if !argument.is_assignment_target() {
                        return Err(custom_error(
                            "Invalid left-hand side expression in prefix operation",
                            argument_span,
                        ));
                    }
                    return Ok(ExpressionType::UpdateExpression {
                        meta,
                        operator,
                        argument: Box::new(argument),
                        prefix: true,
                    });
                }
                let argument_span = first.as_span();
                let argument = self.build_ast_from_expression(first)?;
                match inner.next() {
                    None => Ok(argument),
                    Some(operator_pair) => {
                        if !argument.is_assignment_target() {
                            return Err(custom_error(
                                "Invalid left-hand side expression in postfix operation",
                                argument_span,
                            ));
                        }
                        Ok(ExpressionType::UpdateExpression {
                            meta,
                            operator: get_update_operator(&operator_pair)?,
                            argument: Box::new(argument),
                            prefix: false,
                        })
                    }
                }
            }
            Rule::left_hand_side_expression => {
                let mut inner = pair.into_inner();
                let mut expression = self.build_ast_from_expression(next_pair(&mut inner, span)?)?;
                for suffix in inner {
                    self.extend_chain(span)?;
                    expression = match suffix.as_rule() {
                        Rule::arguments => {
                            let call_meta = Meta {
                                start_index: expression.get_meta().start_index,
                                end_index: suffix.as_span().end(),
                            };
                            ExpressionType::CallExpression {
                                meta: call_meta,
                                callee: Box::new(expression),
                                arguments: self.build_ast_from_arguments(suffix)?,
                            }
                        }
                        _ => self.build_ast_from_member_suffix(expression, suffix)?,
                    };
                }
                Ok(expression)
            }
            Rule::new_expression => {
                let _level = self.descend(span)?;
                let mut inner = pair.into_inner();
                let mut callee = self.build_ast_from_expression(next_pair(&mut inner, span)?)?;
                let mut arguments = vec![];
                for suffix in inner {
                    self.extend_chain(span)?;
                    match suffix.as_rule() {
                        Rule::arguments => arguments = self.build_ast_from_arguments(suffix)?,
                        _ => callee = self.build_ast_from_member_suffix(callee, suffix)?,
                    }
                }
                Ok(ExpressionType::NewExpression {
                    meta,
                    callee: Box::new(callee),
                    arguments,
                })
            }
            Rule::parenthesized_expression => {
                self.build_ast_from_expression(next_pair(&mut pair.into_inner(), span)?)
            }
            Rule::this_expression => Ok(ExpressionType::ThisExpression { meta }),
            Rule::identifier => Ok(ExpressionType::Identifier(get_identifier_data(&pair))),
            Rule::null_literal => Ok(ExpressionType::Literal(LiteralData {
                meta,
                value: LiteralType::NullLiteral,
            })),
            Rule::boolean_literal => Ok(ExpressionType::Literal(LiteralData {
                meta,
                value: LiteralType::BooleanLiteral(pair.as_str() == "true"),
            })),
            Rule::numeric_literal => Ok(ExpressionType::Literal(LiteralData {
                meta,
                value: LiteralType::NumberLiteral(self.build_number(&pair)?),
            })),
            Rule::string_literal => Ok(ExpressionType::Literal(LiteralData {
                meta,
                value: LiteralType::StringLiteral(self.build_string(pair)?),
            })),
            Rule::array_literal => {
                let mut elements = vec![];
                for inner in pair.into_inner() {
                    elements.push(self.build_ast_from_expression(inner)?);
                }
                Ok(ExpressionType::ArrayExpression { meta, elements })
            }
            Rule::object_literal => self.build_ast_from_object_literal(pair),
            Rule::function_expression => Ok(ExpressionType::FunctionExpression(Rc::new(
                self.build_ast_from_function(pair)?,
            ))),
            _ => Err(get_unexpected_error(30, &pair)),
        }
    }

    fn build_ast_from_binary_chain(&self, pair: Pair<Rule>) -> Result<ExpressionType, Error<Rule>> {
        let span = pair.as_span();
        let mut inner = pair.into_inner();
        let mut left = self.build_ast_from_expression(next_pair(&mut inner, span)?)?;
        while let Some(operator_pair) = inner.next() {
            self.extend_chain(span)?;
            let right = self.build_ast_from_expression(next_pair(&mut inner, span)?)?;
            let meta = Meta::spanning(left.get_meta(), right.get_meta());
            left = match operator_pair.as_rule() {
                Rule::logical_or_operator | Rule::logical_and_operator => ExpressionType::LogicalExpression {
                    meta,
                    operator: get_logical_operator(&operator_pair)?,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                _ => ExpressionType::BinaryExpression {
                    meta,
                    operator: get_binary_operator(&operator_pair)?,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            };
        }
        Ok(left)
    }

    fn build_ast_from_member_suffix(
        &self,
        object: ExpressionType,
        suffix: Pair<Rule>,
    ) -> Result<ExpressionType, Error<Rule>> {
        let span = suffix.as_span();
        let meta = Meta {
            start_index: object.get_meta().start_index,
            end_index: span.end(),
        };
        match suffix.as_rule() {
            Rule::property_access => {
                let name = next_pair(&mut suffix.into_inner(), span)?;
                Ok(ExpressionType::MemberExpression(MemberExpressionType::SimpleMemberExpression {
                    meta,
                    object: Box::new(object),
                    property: get_identifier_data(&name),
                }))
            }
            Rule::computed_access => {
                let property = self.build_ast_from_expression(next_pair(&mut suffix.into_inner(), span)?)?;
                Ok(ExpressionType::MemberExpression(MemberExpressionType::ComputedMemberExpression {
                    meta,
                    object: Box::new(object),
                    property: Box::new(property),
                }))
            }
            _ => Err(get_unexpected_error(31, &suffix)),
        }
    }

    fn build_ast_from_arguments(&self, pair: Pair<Rule>) -> Result<Vec<ExpressionType>, Error<Rule>> {
        let mut arguments = vec![];
        for inner in pair.into_inner() {
            arguments.push(self.build_ast_from_expression(inner)?);
        }
        Ok(arguments)
    }

    fn build_ast_from_object_literal(&self, pair: Pair<Rule>) -> Result<ExpressionType, Error<Rule>> {
        let meta = get_meta(&pair);
        let mut properties = vec![];
        for property in pair.into_inner() {
            let property_meta = get_meta(&property);
            let span = property.as_span();
            match property.as_rule() {
                Rule::property_assignment => {
                    let mut inner = property.into_inner();
                    let key = self.build_ast_from_property_name(next_pair(&mut inner, span)?)?;
                    let value = self.build_ast_from_expression(next_pair(&mut inner, span)?)?;
                    properties.push(PropertyData {
                        meta: property_meta,
                        key,
                        value,
                    });
                }
                Rule::method_definition => {
                    let mut inner = property.into_inner();
                    let key = self.build_ast_from_property_name(next_pair(&mut inner, span)?)?;
                    let params = self.build_ast_from_formal_parameters(next_pair(&mut inner, span)?)?;
                    let body = self.build_ast_from_function_body(next_pair(&mut inner, span)?)?;
                    let method = FunctionData {
                        meta: property_meta,
                        id: None,
                        params,
                        body: FunctionBodyOrExpression::FunctionBody(body),
                        is_arrow: false,
                    };
                    properties.push(PropertyData {
                        meta: property_meta,
                        key,
                        value: ExpressionType::FunctionExpression(Rc::new(method)),
                    });
                }
                Rule::shorthand_property => {
                    let id = get_identifier_data(&next_pair(&mut property.into_inner(), span)?);
                    properties.push(PropertyData {
                        meta: property_meta,
                        key: PropertyKeyType::Static(id.name.to_string()),
                        value: ExpressionType::Identifier(id),
                    });
                }
                _ => return Err(get_unexpected_error(32, &property)),
            }
        }
        Ok(ExpressionType::ObjectExpression { meta, properties })
    }

    fn build_ast_from_property_name(&self, pair: Pair<Rule>) -> Result<PropertyKeyType, Error<Rule>> {
        let span = pair.as_span();
        let inner = next_pair(&mut pair.into_inner(), span)?;
        match inner.as_rule() {
            Rule::identifier_name => Ok(PropertyKeyType::Static(inner.as_str().to_string())),
            Rule::string_literal => Ok(PropertyKeyType::Static(self.build_string(inner)?)),
            Rule::numeric_literal => Ok(PropertyKeyType::Numeric(self.build_number(&inner)?)),
            Rule::computed_property_name => {
                let inner_span = inner.as_span();
                let expression = self.build_ast_from_expression(next_pair(&mut inner.into_inner(), inner_span)?)?;
                Ok(PropertyKeyType::Computed(Box::new(expression)))
            }
            _ => Err(get_unexpected_error(33, &inner)),
        }
    }

    fn build_number(&self, pair: &Pair<Rule>) -> Result<f64, Error<Rule>> {
        parse_numeric_literal(pair.as_str())
            .ok_or_else(|| custom_error("Invalid or unexpected token", pair.as_span()))
    }

    fn build_string(&self, pair: Pair<Rule>) -> Result<String, Error<Rule>> {
        let span = pair.as_span();
        let text = next_pair(&mut pair.into_inner(), span)?;
        unescape_string_literal(text.as_str()).map_err(|message| custom_error(message, span))
    }
}
