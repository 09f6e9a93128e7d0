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

//! Expression and statement nodes

use super::operator::{
    AssignOperator, BinaryOperator, LogicalOperator, UnaryOperator, UpdateOperator,
};
use std::sync::Arc;

/// A parsed script
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    /// Top-level statements in source order
    pub body: Vec<Statement>,
}

/// A named or anonymous function
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDefinition {
    /// Declared name, absent for anonymous function expressions
    pub name: Option<String>,
    /// Parameter names
    pub params: Vec<String>,
    /// Function body
    pub body: Vec<Statement>,
}

/// Literal values
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    /// Numeric literal
    Number(f64),
    /// String literal with escapes already processed
    String(String),
    /// Boolean literal
    Boolean(bool),
    /// `null`
    Null,
    /// `undefined`
    Undefined,
}

/// Script expressions
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Literal value
    Literal(LiteralValue),

    /// Variable reference
    Identifier(String),

    /// Array literal `[a, b]`
    Array(Vec<Expression>),

    /// Object literal `{ key: value }`
    Object(Vec<(String, Expression)>),

    /// Property access `object.property`
    Member {
        /// Object expression
        object: Box<Expression>,
        /// Property name
        property: String,
    },

    /// Computed access `object[index]`
    Index {
        /// Object expression
        object: Box<Expression>,
        /// Key or index expression
        index: Box<Expression>,
    },

    /// Function or method call
    Call {
        /// Callee expression
        callee: Box<Expression>,
        /// Call arguments
        arguments: Vec<Expression>,
    },

    /// Prefix operation
    Unary {
        /// The operator
        op: UnaryOperator,
        /// The operand
        operand: Box<Expression>,
    },

    /// Eager binary operation
    Binary {
        /// The operator
        op: BinaryOperator,
        /// Left operand
        left: Box<Expression>,
        /// Right operand
        right: Box<Expression>,
    },

    /// Short-circuit operation
    Logical {
        /// The operator
        op: LogicalOperator,
        /// Left operand
        left: Box<Expression>,
        /// Right operand
        right: Box<Expression>,
    },

    /// Ternary `test ? consequent : alternate`
    Conditional {
        /// Condition
        test: Box<Expression>,
        /// Value when the condition is truthy
        consequent: Box<Expression>,
        /// Value otherwise
        alternate: Box<Expression>,
    },

    /// Assignment to an identifier, member or index target
    Assign {
        /// The operator
        op: AssignOperator,
        /// Assignment target
        target: Box<Expression>,
        /// Assigned value
        value: Box<Expression>,
    },

    /// `++`/`--` in prefix or postfix position
    Update {
        /// The operator
        op: UpdateOperator,
        /// Whether the operator precedes its operand
        prefix: bool,
        /// Updated target
        target: Box<Expression>,
    },

    /// Function expression
    Function(Arc<FunctionDefinition>),
}

/// Script statements
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Expression evaluated for its value or side effects
    Expression(Expression),

    /// `var`/`let`/`const` declarations
    Declaration(Vec<(String, Option<Expression>)>),

    /// Function declaration, hoisted to the top of its body
    Function(Arc<FunctionDefinition>),

    /// `return` with optional value
    Return(Option<Expression>),

    /// `if`/`else`
    If {
        /// Condition
        test: Expression,
        /// Branch taken when truthy
        consequent: Box<Statement>,
        /// Optional `else` branch
        alternate: Option<Box<Statement>>,
    },

    /// `while` loop
    While {
        /// Loop condition
        test: Expression,
        /// Loop body
        body: Box<Statement>,
    },

    /// C-style `for` loop
    For {
        /// Initializer
        init: Option<Box<Statement>>,
        /// Condition, absent means always true
        test: Option<Expression>,
        /// Update expression
        update: Option<Expression>,
        /// Loop body
        body: Box<Statement>,
    },

    /// Braced statement list
    Block(Vec<Statement>),

    /// `break`
    Break,

    /// `continue`
    Continue,

    /// Lone `;`
    Empty,
}

impl Expression {
    /// Create a number literal
    pub fn number(value: f64) -> Self {
        Expression::Literal(LiteralValue::Number(value))
    }

    /// Create a string literal
    pub fn string(value: impl Into<String>) -> Self {
        Expression::Literal(LiteralValue::String(value.into()))
    }

    /// Create an identifier reference
    pub fn identifier(name: impl Into<String>) -> Self {
        Expression::Identifier(name.into())
    }

    /// Create a binary operation
    pub fn binary(op: BinaryOperator, left: Expression, right: Expression) -> Self {
        Expression::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Create a call expression
    pub fn call(callee: Expression, arguments: Vec<Expression>) -> Self {
        Expression::Call {
            callee: Box::new(callee),
            arguments,
        }
    }

    /// Whether the expression may appear on the left of an assignment
    pub fn is_assignable(&self) -> bool {
        matches!(
            self,
            Expression::Identifier(_) | Expression::Member { .. } | Expression::Index { .. }
        )
    }
}

impl Program {
    /// Iterate function declarations at the top level of the program
    pub fn function_declarations(&self) -> impl Iterator<Item = &Arc<FunctionDefinition>> {
        self.body.iter().filter_map(|statement| match statement {
            Statement::Function(definition) => Some(definition),
            _ => None,
        })
    }
}
