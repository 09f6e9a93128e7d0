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

//! Error types for the formula engine
//!
//! Script-level errors keep their own types and are wrapped unchanged, so a
//! caller of `execute` sees exactly what the script raised.

use crate::evaluator::EvaluationError;
use crate::model::ValueError;
use crate::parser::ParseError;
use crate::registry::FunctionError;
use thiserror::Error;

/// Result type alias for formula operations
pub type Result<T> = std::result::Result<T, FormulaError>;

/// Crate-level error
#[derive(Error, Debug)]
pub enum FormulaError {
    /// Script source failed to parse
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Script raised an error while running
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    /// Script value could not be converted for the host
    #[error(transparent)]
    Value(#[from] ValueError),

    /// A referenced function has no built-in and no custom body (strict mode)
    #[error("unresolved function reference - {0}")]
    UnresolvedFunction(String),

    /// No trigger with the requested id
    #[error("trigger not found - {0}")]
    TriggerNotFound(String),

    /// The trigger's filter accepted no formula
    #[error("no matched formula found for trigger - {0}")]
    NoMatchingFormula(String),

    /// A trigger filter produced something other than a boolean
    #[error("filter of trigger {trigger} returned a non-boolean value for formula {formula}")]
    FilterNotBoolean {
        /// Trigger id
        trigger: String,
        /// Formula id being tested
        formula: String,
    },

    /// The output variable did not hold an object after output mapping
    #[error("output variable {0} is not an object")]
    InvalidOutput(String),

    /// Failure inside an external catalog backend
    #[error("catalog error: {0}")]
    Catalog(String),

    /// JSON (de)serialisation failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O failure reading a catalog document
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<FunctionError> for FormulaError {
    fn from(error: FunctionError) -> Self {
        FormulaError::Evaluation(EvaluationError::Function(error))
    }
}

impl FormulaError {
    /// Create a catalog error
    pub fn catalog(message: impl Into<String>) -> Self {
        FormulaError::Catalog(message.into())
    }

    /// The built-in contract violation behind this error, if any
    pub fn function_error(&self) -> Option<&FunctionError> {
        match self {
            FormulaError::Evaluation(EvaluationError::Function(error)) => Some(error),
            _ => None,
        }
    }
}
