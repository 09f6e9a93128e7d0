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

//! Operator definitions for formula scripts

use std::fmt;

/// Binary operators that always evaluate both operands
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    // Arithmetic operators
    /// Addition or string concatenation (+)
    Add,
    /// Subtraction (-)
    Subtract,
    /// Multiplication (*)
    Multiply,
    /// Division (/)
    Divide,
    /// Remainder (%)
    Modulo,

    // Comparison operators
    /// Loose equality (==)
    Equal,
    /// Loose inequality (!=)
    NotEqual,
    /// Strict equality (===)
    StrictEqual,
    /// Strict inequality (!==)
    StrictNotEqual,
    /// Less than (<)
    LessThan,
    /// Less than or equal (<=)
    LessThanOrEqual,
    /// Greater than (>)
    GreaterThan,
    /// Greater than or equal (>=)
    GreaterThanOrEqual,
}

/// Short-circuiting operators; the result is one of the operands
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOperator {
    /// Logical AND (&&)
    And,
    /// Logical OR (||)
    Or,
}

/// Prefix operators
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    /// Logical negation (!)
    Not,
    /// Arithmetic negation (-)
    Minus,
    /// Numeric conversion (+)
    Plus,
    /// Type name of the operand (typeof)
    TypeOf,
}

/// Assignment operators; compound forms apply a binary operator first
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssignOperator {
    /// Plain assignment (=)
    Assign,
    /// Add and assign (+=)
    Add,
    /// Subtract and assign (-=)
    Subtract,
    /// Multiply and assign (*=)
    Multiply,
    /// Divide and assign (/=)
    Divide,
    /// Remainder and assign (%=)
    Modulo,
}

/// Increment and decrement
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateOperator {
    /// Increment (++)
    Increment,
    /// Decrement (--)
    Decrement,
}

impl BinaryOperator {
    /// Source symbol of this operator
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Modulo => "%",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::StrictEqual => "===",
            Self::StrictNotEqual => "!==",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
        }
    }

    /// Check if this is an arithmetic operator
    pub const fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            Self::Add | Self::Subtract | Self::Multiply | Self::Divide | Self::Modulo
        )
    }
}

impl AssignOperator {
    /// The binary operator a compound assignment applies, `None` for `=`
    pub const fn binary_operator(&self) -> Option<BinaryOperator> {
        match self {
            Self::Assign => None,
            Self::Add => Some(BinaryOperator::Add),
            Self::Subtract => Some(BinaryOperator::Subtract),
            Self::Multiply => Some(BinaryOperator::Multiply),
            Self::Divide => Some(BinaryOperator::Divide),
            Self::Modulo => Some(BinaryOperator::Modulo),
        }
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Self::Not => "!",
            Self::Minus => "-",
            Self::Plus => "+",
            Self::TypeOf => "typeof",
        };
        f.write_str(symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compound_assignment_maps_to_binary() {
        assert_eq!(AssignOperator::Assign.binary_operator(), None);
        assert_eq!(
            AssignOperator::Multiply.binary_operator(),
            Some(BinaryOperator::Multiply)
        );
    }

    #[test]
    fn test_operator_symbols() {
        assert_eq!(BinaryOperator::StrictNotEqual.to_string(), "!==");
        assert_eq!(UnaryOperator::TypeOf.to_string(), "typeof");
        assert!(BinaryOperator::Modulo.is_arithmetic());
        assert!(!BinaryOperator::LessThan.is_arithmetic());
    }
}
