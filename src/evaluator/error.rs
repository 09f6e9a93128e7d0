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

// Error types for script evaluation

use crate::model::ValueError;
use crate::registry::FunctionError;
use thiserror::Error;

/// Result type for evaluation operations
pub type EvaluationResult<T> = Result<T, EvaluationError>;

/// Errors that can occur while running a script
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    /// Read of a name that is declared nowhere in the scope chain
    #[error("ReferenceError: {name} is not defined")]
    Reference {
        /// Unresolved name
        name: String,
    },

    /// Operation applied to a value of the wrong kind
    #[error("TypeError: {message}")]
    TypeError {
        /// Error message
        message: String,
    },

    /// Call of something that is not a function
    #[error("TypeError: {name} is not a function")]
    NotCallable {
        /// Callee description
        name: String,
    },

    /// Assignment to something other than a name, property or index
    #[error("Invalid assignment target")]
    InvalidAssignmentTarget,

    /// Nested calls went deeper than the configured limit
    #[error("RangeError: maximum call depth of {limit} exceeded")]
    CallDepthExceeded {
        /// Configured limit
        limit: usize,
    },

    /// Expression tree deeper than the evaluator walks
    #[error("RangeError: expression nesting deeper than {limit} levels")]
    NestingTooDeep {
        /// Nesting limit
        limit: usize,
    },

    /// `break`, `continue` or `return` outside the construct that accepts it
    #[error("Illegal {statement} statement")]
    IllegalStatement {
        /// Offending keyword
        statement: &'static str,
    },

    /// Error raised by a host function
    #[error("{0}")]
    Function(#[from] FunctionError),

    /// Value conversion failure
    #[error("{0}")]
    Value(#[from] ValueError),
}

impl EvaluationError {
    /// Create a type error
    pub fn type_error(message: impl Into<String>) -> Self {
        EvaluationError::TypeError {
            message: message.into(),
        }
    }

    /// Create a reference error
    pub fn reference(name: impl Into<String>) -> Self {
        EvaluationError::Reference { name: name.into() }
    }
}
