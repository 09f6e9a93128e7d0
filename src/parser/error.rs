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

//! Parser error types

use thiserror::Error;

/// Result type for parser operations
pub type ParseResult<T> = Result<T, ParseError>;

/// Parse error with byte position information
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Token that does not fit the grammar at this point
    #[error("Unexpected token '{token}' at position {position}")]
    UnexpectedToken {
        /// The unexpected token
        token: String,
        /// Position where the token starts
        position: usize,
    },

    /// Input ended early
    #[error("Unexpected end of input, expected {expected}")]
    UnexpectedEof {
        /// What the parser was looking for
        expected: String,
    },

    /// Unclosed string literal
    #[error("Unclosed string literal starting at position {position}")]
    UnclosedString {
        /// Position where the string started
        position: usize,
    },

    /// Unclosed block comment
    #[error("Unclosed comment starting at position {position}")]
    UnclosedComment {
        /// Position where the comment started
        position: usize,
    },

    /// Number literal that does not parse as a float
    #[error("Invalid number literal '{literal}' at position {position}")]
    InvalidNumber {
        /// The literal text
        literal: String,
        /// Position of the literal
        position: usize,
    },

    /// Invalid escape sequence
    #[error("Invalid escape sequence at position {position}: {sequence}")]
    InvalidEscape {
        /// The invalid escape sequence
        sequence: String,
        /// Position of the string containing it
        position: usize,
    },

    /// Left side of an assignment or update is not a variable or property
    #[error("Invalid assignment target at position {position}")]
    InvalidAssignmentTarget {
        /// Position of the operator
        position: usize,
    },

    /// Statements or expressions nested beyond the parser's limit
    #[error("Nesting deeper than {limit} levels at position {position}")]
    NestingTooDeep {
        /// Maximum nesting depth
        limit: usize,
        /// Position of the token that went over the limit
        position: usize,
    },
}

impl ParseError {
    /// Byte position the error refers to, if known
    pub fn position(&self) -> Option<usize> {
        match self {
            ParseError::UnexpectedToken { position, .. }
            | ParseError::UnclosedString { position }
            | ParseError::UnclosedComment { position }
            | ParseError::InvalidNumber { position, .. }
            | ParseError::InvalidEscape { position, .. }
            | ParseError::InvalidAssignmentTarget { position }
            | ParseError::NestingTooDeep { position, .. } => Some(*position),
            ParseError::UnexpectedEof { .. } => None,
        }
    }
}
