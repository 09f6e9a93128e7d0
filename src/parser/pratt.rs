// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Pratt parser for formula scripts
//!
//! Statements are parsed by recursive descent; expressions use precedence
//! climbing over a `#[repr(u8)]` precedence table. Missing semicolons are
//! tolerated before a line break, a closing brace or the end of input.

use super::error::{ParseError, ParseResult};
use super::tokenizer::{Token, Tokenizer};
use crate::ast::{
    AssignOperator, BinaryOperator, Expression, FunctionDefinition, LiteralValue,
    LogicalOperator, Program, Statement, UnaryOperator, UpdateOperator,
};
use std::sync::Arc;

/// Nesting budget shared by statements, expressions and operator chains
pub const MAX_NESTING_DEPTH: usize = 256;

/// Budget taken by one level of recursive descent
///
/// Descent costs several stack frames per level while extending a chain of
/// binary operators, calls or member accesses only deepens the tree.
const DESCENT_COST: usize = 3;

/// Binary operator precedence levels (higher = tighter binding)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    /// Logical OR (||)
    Or = 1,
    /// Logical AND (&&)
    And = 2,
    /// Equality operators (==, !=, ===, !==)
    Equality = 3,
    /// Relational operators (<, >, <=, >=)
    Relational = 4,
    /// Additive operators (+, -)
    Additive = 5,
    /// Multiplicative operators (*, /, %)
    Multiplicative = 6,
    /// Prefix operators; no binary operator binds this tightly
    Unary = 7,
}

impl Precedence {
    /// Get the next higher precedence level for left-associative operators
    #[inline(always)]
    pub const fn next_level(self) -> Self {
        match self {
            Precedence::Or => Precedence::And,
            Precedence::And => Precedence::Equality,
            Precedence::Equality => Precedence::Relational,
            Precedence::Relational => Precedence::Additive,
            Precedence::Additive => Precedence::Multiplicative,
            Precedence::Multiplicative => Precedence::Unary,
            Precedence::Unary => Precedence::Unary,
        }
    }
}

#[inline(always)]
fn get_precedence(token: &Token<'_>) -> Option<Precedence> {
    match token {
        Token::Plus | Token::Minus => Some(Precedence::Additive),
        Token::Multiply | Token::Divide | Token::Percent => Some(Precedence::Multiplicative),
        Token::Equal | Token::NotEqual | Token::StrictEqual | Token::StrictNotEqual => {
            Some(Precedence::Equality)
        }
        Token::LessThan
        | Token::LessThanOrEqual
        | Token::GreaterThan
        | Token::GreaterThanOrEqual => Some(Precedence::Relational),
        Token::And => Some(Precedence::And),
        Token::Or => Some(Precedence::Or),
        _ => None,
    }
}

/// Operator produced by a binary-position token
enum Infix {
    Binary(BinaryOperator),
    Logical(LogicalOperator),
}

#[inline(always)]
fn token_to_infix(token: &Token<'_>) -> Option<Infix> {
    let op = match token {
        Token::Plus => BinaryOperator::Add,
        Token::Minus => BinaryOperator::Subtract,
        Token::Multiply => BinaryOperator::Multiply,
        Token::Divide => BinaryOperator::Divide,
        Token::Percent => BinaryOperator::Modulo,
        Token::Equal => BinaryOperator::Equal,
        Token::NotEqual => BinaryOperator::NotEqual,
        Token::StrictEqual => BinaryOperator::StrictEqual,
        Token::StrictNotEqual => BinaryOperator::StrictNotEqual,
        Token::LessThan => BinaryOperator::LessThan,
        Token::LessThanOrEqual => BinaryOperator::LessThanOrEqual,
        Token::GreaterThan => BinaryOperator::GreaterThan,
        Token::GreaterThanOrEqual => BinaryOperator::GreaterThanOrEqual,
        Token::And => return Some(Infix::Logical(LogicalOperator::And)),
        Token::Or => return Some(Infix::Logical(LogicalOperator::Or)),
        _ => return None,
    };
    Some(Infix::Binary(op))
}

#[inline(always)]
fn token_to_assign_op(token: &Token<'_>) -> Option<AssignOperator> {
    match token {
        Token::Assign => Some(AssignOperator::Assign),
        Token::PlusAssign => Some(AssignOperator::Add),
        Token::MinusAssign => Some(AssignOperator::Subtract),
        Token::MultiplyAssign => Some(AssignOperator::Multiply),
        Token::DivideAssign => Some(AssignOperator::Divide),
        Token::PercentAssign => Some(AssignOperator::Modulo),
        _ => None,
    }
}

/// Parser state: one token of lookahead plus its position and line-break flag
pub struct PrattParser<'input> {
    tokenizer: Tokenizer<'input>,
    current_token: Option<Token<'input>>,
    current_start: usize,
    newline_before: bool,
    depth: usize,
}

impl<'input> PrattParser<'input> {
    /// Create a new parser; call [`PrattParser::parse`] to run it
    pub fn new(input: &'input str) -> Self {
        Self {
            tokenizer: Tokenizer::new(input),
            current_token: None,
            current_start: 0,
            newline_before: false,
            depth: 0,
        }
    }

    /// Take `cost` from the nesting budget
    fn descend(&mut self, cost: usize) -> ParseResult<()> {
        if self.depth + cost > MAX_NESTING_DEPTH {
            return Err(ParseError::NestingTooDeep {
                limit: MAX_NESTING_DEPTH,
                position: self.current_start,
            });
        }
        self.depth += cost;
        Ok(())
    }

    /// Run `parse` one descent level deeper
    fn nested<T>(&mut self, parse: fn(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        self.descend(DESCENT_COST)?;
        let result = parse(self);
        self.depth -= DESCENT_COST;
        result
    }

    #[inline(always)]
    fn advance(&mut self) -> ParseResult<()> {
        self.current_token = self.tokenizer.next_token()?;
        self.current_start = self.tokenizer.token_start();
        self.newline_before = self.tokenizer.newline_before();
        Ok(())
    }

    #[inline(always)]
    fn current(&self) -> Option<&Token<'input>> {
        self.current_token.as_ref()
    }

    #[inline(always)]
    fn at(&self, expected: &Token<'input>) -> bool {
        self.current_token.as_ref() == Some(expected)
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        match &self.current_token {
            Some(token) => ParseError::UnexpectedToken {
                token: token.to_string(),
                position: self.current_start,
            },
            None => ParseError::UnexpectedEof {
                expected: expected.to_string(),
            },
        }
    }

    fn expect(&mut self, expected: Token<'static>) -> ParseResult<()> {
        if self.at(&expected) {
            self.advance()
        } else {
            Err(self.unexpected(&format!("'{expected}'")))
        }
    }

    fn expect_identifier(&mut self) -> ParseResult<String> {
        match self.current() {
            Some(Token::Identifier(name)) => {
                let name = name.to_string();
                self.advance()?;
                Ok(name)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    /// Accept an explicit `;` or an inserted one
    fn consume_semicolon(&mut self) -> ParseResult<()> {
        match self.current() {
            Some(Token::Semicolon) => self.advance(),
            None | Some(Token::RightBrace) => Ok(()),
            Some(_) if self.newline_before => Ok(()),
            Some(_) => Err(self.unexpected("';'")),
        }
    }

    /// Parse the complete input as a program
    pub fn parse(&mut self) -> ParseResult<Program> {
        self.advance()?;
        let mut body = Vec::new();
        while self.current_token.is_some() {
            body.push(self.parse_statement()?);
        }
        Ok(Program { body })
    }

    fn parse_statement(&mut self) -> ParseResult<Statement> {
        self.nested(Self::parse_statement_kind)
    }

    fn parse_statement_kind(&mut self) -> ParseResult<Statement> {
        let Some(token) = self.current() else {
            return Err(self.unexpected("statement"));
        };

        match token {
            Token::Semicolon => {
                self.advance()?;
                Ok(Statement::Empty)
            }
            Token::LeftBrace => Ok(Statement::Block(self.parse_block()?)),
            Token::Var | Token::Let | Token::Const => {
                let declaration = self.parse_declaration()?;
                self.consume_semicolon()?;
                Ok(declaration)
            }
            Token::Function => {
                let definition = self.parse_function()?;
                if definition.name.is_some() {
                    Ok(Statement::Function(Arc::new(definition)))
                } else {
                    let callee = self.parse_postfix(Expression::Function(Arc::new(definition)))?;
                    self.consume_semicolon()?;
                    Ok(Statement::Expression(callee))
                }
            }
            Token::Return => {
                self.advance()?;
                let value = match self.current() {
                    None | Some(Token::Semicolon) | Some(Token::RightBrace) => None,
                    Some(_) if self.newline_before => None,
                    Some(_) => Some(self.parse_expression()?),
                };
                self.consume_semicolon()?;
                Ok(Statement::Return(value))
            }
            Token::If => self.parse_if(),
            Token::While => {
                self.advance()?;
                self.expect(Token::LeftParen)?;
                let test = self.parse_expression()?;
                self.expect(Token::RightParen)?;
                let body = Box::new(self.parse_statement()?);
                Ok(Statement::While { test, body })
            }
            Token::For => self.parse_for(),
            Token::Break => {
                self.advance()?;
                self.consume_semicolon()?;
                Ok(Statement::Break)
            }
            Token::Continue => {
                self.advance()?;
                self.consume_semicolon()?;
                Ok(Statement::Continue)
            }
            _ => {
                let expression = self.parse_expression()?;
                self.consume_semicolon()?;
                Ok(Statement::Expression(expression))
            }
        }
    }

    /// `{ statements }`
    fn parse_block(&mut self) -> ParseResult<Vec<Statement>> {
        self.expect(Token::LeftBrace)?;
        let mut statements = Vec::new();
        while !self.at(&Token::RightBrace) {
            if self.current_token.is_none() {
                return Err(self.unexpected("'}'"));
            }
            statements.push(self.parse_statement()?);
        }
        self.advance()?;
        Ok(statements)
    }

    /// `var a = 1, b` without the trailing semicolon
    fn parse_declaration(&mut self) -> ParseResult<Statement> {
        self.advance()?;
        let mut declarations = Vec::new();
        loop {
            let name = self.expect_identifier()?;
            let init = if self.at(&Token::Assign) {
                self.advance()?;
                Some(self.parse_assignment()?)
            } else {
                None
            };
            declarations.push((name, init));

            if !self.at(&Token::Comma) {
                break;
            }
            self.advance()?;
        }
        Ok(Statement::Declaration(declarations))
    }

    /// `function [name](params) { body }`
    fn parse_function(&mut self) -> ParseResult<FunctionDefinition> {
        self.expect(Token::Function)?;
        let name = match self.current() {
            Some(Token::Identifier(name)) => {
                let name = name.to_string();
                self.advance()?;
                Some(name)
            }
            _ => None,
        };

        self.expect(Token::LeftParen)?;
        let mut params = Vec::new();
        while !self.at(&Token::RightParen) {
            params.push(self.expect_identifier()?);
            if !self.at(&Token::Comma) {
                break;
            }
            self.advance()?;
        }
        self.expect(Token::RightParen)?;

        let body = self.parse_block()?;
        Ok(FunctionDefinition { name, params, body })
    }

    fn parse_if(&mut self) -> ParseResult<Statement> {
        self.advance()?;
        self.expect(Token::LeftParen)?;
        let test = self.parse_expression()?;
        self.expect(Token::RightParen)?;
        let consequent = Box::new(self.parse_statement()?);
        let alternate = if self.at(&Token::Else) {
            self.advance()?;
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Statement::If {
            test,
            consequent,
            alternate,
        })
    }

    fn parse_for(&mut self) -> ParseResult<Statement> {
        self.advance()?;
        self.expect(Token::LeftParen)?;

        let init = match self.current() {
            Some(Token::Semicolon) => None,
            Some(Token::Var | Token::Let | Token::Const) => {
                Some(Box::new(self.parse_declaration()?))
            }
            _ => Some(Box::new(Statement::Expression(self.parse_expression()?))),
        };
        self.expect(Token::Semicolon)?;

        let test = if self.at(&Token::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(Token::Semicolon)?;

        let update = if self.at(&Token::RightParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(Token::RightParen)?;

        let body = Box::new(self.parse_statement()?);
        Ok(Statement::For {
            init,
            test,
            update,
            body,
        })
    }

    /// Parse a full expression (assignment level)
    pub fn parse_expression(&mut self) -> ParseResult<Expression> {
        self.parse_assignment()
    }

    /// Assignment is right associative and binds loosest
    fn parse_assignment(&mut self) -> ParseResult<Expression> {
        self.nested(Self::parse_assignment_level)
    }

    fn parse_assignment_level(&mut self) -> ParseResult<Expression> {
        let target = self.parse_conditional()?;

        let Some(op) = self.current().and_then(token_to_assign_op) else {
            return Ok(target);
        };
        if !target.is_assignable() {
            return Err(ParseError::InvalidAssignmentTarget {
                position: self.current_start,
            });
        }
        self.advance()?;
        let value = self.parse_assignment()?;

        Ok(Expression::Assign {
            op,
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    fn parse_conditional(&mut self) -> ParseResult<Expression> {
        let test = self.parse_expression_with_precedence(Precedence::Or)?;
        if !self.at(&Token::Question) {
            return Ok(test);
        }

        self.advance()?;
        let consequent = self.parse_assignment()?;
        self.expect(Token::Colon)?;
        let alternate = self.parse_assignment()?;

        Ok(Expression::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    /// Precedence climbing over binary and logical operators
    fn parse_expression_with_precedence(
        &mut self,
        min_precedence: Precedence,
    ) -> ParseResult<Expression> {
        let depth = self.depth;
        let result = self.parse_binary_chain(min_precedence);
        self.depth = depth;
        result
    }

    fn parse_binary_chain(&mut self, min_precedence: Precedence) -> ParseResult<Expression> {
        let mut left = self.parse_unary()?;

        while let Some(token) = self.current() {
            let precedence = match get_precedence(token) {
                Some(precedence) if precedence >= min_precedence => precedence,
                _ => break,
            };
            let Some(infix) = token_to_infix(token) else {
                break;
            };
            self.descend(1)?;
            self.advance()?;

            let right = self.parse_expression_with_precedence(precedence.next_level())?;
            left = match infix {
                Infix::Binary(op) => Expression::binary(op, left, right),
                Infix::Logical(op) => Expression::Logical {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            };
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Expression> {
        let op = match self.current() {
            Some(Token::Not) => UnaryOperator::Not,
            Some(Token::Minus) => UnaryOperator::Minus,
            Some(Token::Plus) => UnaryOperator::Plus,
            Some(Token::Typeof) => UnaryOperator::TypeOf,
            Some(Token::Increment | Token::Decrement) => {
                let op = if self.at(&Token::Increment) {
                    UpdateOperator::Increment
                } else {
                    UpdateOperator::Decrement
                };
                let position = self.current_start;
                self.advance()?;
                let target = self.nested(Self::parse_unary)?;
                if !target.is_assignable() {
                    return Err(ParseError::InvalidAssignmentTarget { position });
                }
                return Ok(Expression::Update {
                    op,
                    prefix: true,
                    target: Box::new(target),
                });
            }
            _ => {
                let primary = self.parse_primary()?;
                return self.parse_postfix(primary);
            }
        };

        self.advance()?;
        let operand = self.nested(Self::parse_unary)?;
        Ok(Expression::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    /// Member access, indexing, calls and postfix update
    fn parse_postfix(&mut self, expression: Expression) -> ParseResult<Expression> {
        let depth = self.depth;
        let result = self.parse_postfix_chain(expression);
        self.depth = depth;
        result
    }

    fn parse_postfix_chain(&mut self, mut expression: Expression) -> ParseResult<Expression> {
        loop {
            match self.current() {
                Some(Token::Dot) => {
                    self.descend(1)?;
                    self.advance()?;
                    let property = match self.current() {
                        Some(Token::Identifier(name)) => name.to_string(),
                        Some(token) => match token.keyword_text() {
                            Some(keyword) => keyword.to_string(),
                            None => return Err(self.unexpected("property name")),
                        },
                        None => return Err(self.unexpected("property name")),
                    };
                    self.advance()?;
                    expression = Expression::Member {
                        object: Box::new(expression),
                        property,
                    };
                }
                Some(Token::LeftBracket) => {
                    self.descend(1)?;
                    self.advance()?;
                    let index = self.parse_expression()?;
                    self.expect(Token::RightBracket)?;
                    expression = Expression::Index {
                        object: Box::new(expression),
                        index: Box::new(index),
                    };
                }
                Some(Token::LeftParen) => {
                    self.descend(1)?;
                    let arguments = self.parse_arguments()?;
                    expression = Expression::call(expression, arguments);
                }
                Some(Token::Increment | Token::Decrement) if !self.newline_before => {
                    let op = if self.at(&Token::Increment) {
                        UpdateOperator::Increment
                    } else {
                        UpdateOperator::Decrement
                    };
                    if !expression.is_assignable() {
                        return Err(ParseError::InvalidAssignmentTarget {
                            position: self.current_start,
                        });
                    }
                    self.advance()?;
                    return Ok(Expression::Update {
                        op,
                        prefix: false,
                        target: Box::new(expression),
                    });
                }
                _ => return Ok(expression),
            }
        }
    }

    /// `(a, b, c)`, trailing comma allowed
    fn parse_arguments(&mut self) -> ParseResult<Vec<Expression>> {
        self.expect(Token::LeftParen)?;
        let mut arguments = Vec::new();
        while !self.at(&Token::RightParen) {
            arguments.push(self.parse_assignment()?);
            if !self.at(&Token::Comma) {
                break;
            }
            self.advance()?;
        }
        self.expect(Token::RightParen)?;
        Ok(arguments)
    }

    fn parse_primary(&mut self) -> ParseResult<Expression> {
        let Some(token) = self.current_token.clone() else {
            return Err(self.unexpected("expression"));
        };

        let expression = match token {
            Token::Number(literal) => {
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| ParseError::InvalidNumber {
                        literal: literal.to_string(),
                        position: self.current_start,
                    })?;
                Expression::number(value)
            }
            Token::String(raw) => {
                Expression::string(Self::process_string_escapes(raw, self.current_start)?)
            }
            Token::True => Expression::Literal(LiteralValue::Boolean(true)),
            Token::False => Expression::Literal(LiteralValue::Boolean(false)),
            Token::Null => Expression::Literal(LiteralValue::Null),
            Token::Undefined => Expression::Literal(LiteralValue::Undefined),
            Token::Identifier(name) => Expression::identifier(name),
            Token::LeftParen => {
                self.advance()?;
                let inner = self.parse_expression()?;
                self.expect(Token::RightParen)?;
                return Ok(inner);
            }
            Token::LeftBracket => return self.parse_array(),
            Token::LeftBrace => return self.parse_object(),
            Token::Function => {
                let definition = self.parse_function()?;
                return Ok(Expression::Function(Arc::new(definition)));
            }
            _ => return Err(self.unexpected("expression")),
        };

        self.advance()?;
        Ok(expression)
    }

    fn parse_array(&mut self) -> ParseResult<Expression> {
        self.expect(Token::LeftBracket)?;
        let mut elements = Vec::new();
        while !self.at(&Token::RightBracket) {
            elements.push(self.parse_assignment()?);
            if !self.at(&Token::Comma) {
                break;
            }
            self.advance()?;
        }
        self.expect(Token::RightBracket)?;
        Ok(Expression::Array(elements))
    }

    fn parse_object(&mut self) -> ParseResult<Expression> {
        self.expect(Token::LeftBrace)?;
        let mut properties = Vec::new();
        while !self.at(&Token::RightBrace) {
            let key = match self.current() {
                Some(Token::Identifier(name)) | Some(Token::Number(name)) => name.to_string(),
                Some(Token::String(raw)) => Self::process_string_escapes(raw, self.current_start)?,
                Some(token) if token.is_keyword() => token.to_string(),
                _ => return Err(self.unexpected("property key")),
            };
            self.advance()?;
            self.expect(Token::Colon)?;
            properties.push((key, self.parse_assignment()?));

            if !self.at(&Token::Comma) {
                break;
            }
            self.advance()?;
        }
        self.expect(Token::RightBrace)?;
        Ok(Expression::Object(properties))
    }

    /// Process escape sequences in string literals, including Unicode escapes
    fn process_string_escapes(input: &str, position: usize) -> ParseResult<String> {
        if !input.contains('\\') {
            return Ok(input.to_string());
        }

        let mut result = String::with_capacity(input.len());
        let mut chars = input.chars();

        while let Some(ch) = chars.next() {
            if ch != '\\' {
                result.push(ch);
                continue;
            }
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('t') => result.push('\t'),
                Some('r') => result.push('\r'),
                Some('b') => result.push('\u{8}'),
                Some('f') => result.push('\u{c}'),
                Some('v') => result.push('\u{b}'),
                Some('0') => result.push('\0'),
                Some('u') => {
                    let hex: String = chars.by_ref().take(4).collect();
                    let decoded = (hex.len() == 4)
                        .then(|| u32::from_str_radix(&hex, 16).ok())
                        .flatten()
                        .and_then(char::from_u32);
                    match decoded {
                        Some(unicode_char) => result.push(unicode_char),
                        None => {
                            return Err(ParseError::InvalidEscape {
                                sequence: format!("\\u{hex}"),
                                position,
                            });
                        }
                    }
                }
                // Any other escaped character stands for itself
                Some(escaped) => result.push(escaped),
                None => {
                    return Err(ParseError::InvalidEscape {
                        sequence: "\\".to_string(),
                        position,
                    });
                }
            }
        }

        Ok(result)
    }
}

/// Parse a script into a [`Program`]
pub fn parse_program(input: &str) -> ParseResult<Program> {
    PrattParser::new(input).parse()
}
