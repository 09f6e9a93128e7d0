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

//! Built-in function traits, dispatch table and call arguments

use crate::model::ScriptValue;
use crate::registry::signature::FunctionSignature;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use thiserror::Error;

/// Result type for function operations
pub type FunctionResult<T> = Result<T, FunctionError>;

/// Function evaluation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FunctionError {
    /// Invalid number of arguments
    #[error("Function '{name}' expects {min}-{} arguments, got {actual}", max.map_or("∞".to_string(), |n| n.to_string()))]
    InvalidArity {
        /// Function name
        name: String,
        /// Minimum arguments
        min: usize,
        /// Maximum arguments (None for unlimited)
        max: Option<usize>,
        /// Actual arguments provided
        actual: usize,
    },

    /// Argument converted fine but lies outside the accepted range
    #[error("Function '{name}' argument {index} out of range: {message}")]
    ArgumentOutOfRange {
        /// Function name
        name: String,
        /// Argument index
        index: usize,
        /// Error message
        message: String,
    },

    /// Argument cannot be converted to what the function needs
    #[error("Function '{name}' argument {index} is invalid: {message}")]
    InvalidArgument {
        /// Function name
        name: String,
        /// Argument index
        index: usize,
        /// Error message
        message: String,
    },

    /// No provider knows the function
    #[error("Function '{name}' not found")]
    NotFound {
        /// Function name
        name: String,
    },

    /// Runtime evaluation error
    #[error("Function '{name}' evaluation error: {message}")]
    EvaluationError {
        /// Function name
        name: String,
        /// Error message
        message: String,
    },
}

/// Arguments of one native call, with per-argument coercions
#[derive(Debug, Clone, Copy)]
pub struct CallArguments<'a> {
    name: &'a str,
    values: &'a [ScriptValue],
}

impl<'a> CallArguments<'a> {
    /// Wrap the evaluated arguments of a call to `name`
    pub fn new(name: &'a str, values: &'a [ScriptValue]) -> Self {
        Self { name, values }
    }

    /// Name the function was called under
    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// All arguments in call order
    pub fn values(&self) -> &'a [ScriptValue] {
        self.values
    }

    pub fn iter(&self) -> std::slice::Iter<'a, ScriptValue> {
        self.values.iter()
    }

    /// Argument as-is; `undefined` past the end
    pub fn value(&self, index: usize) -> ScriptValue {
        self.values
            .get(index)
            .cloned()
            .unwrap_or(ScriptValue::Undefined)
    }

    pub fn float(&self, index: usize) -> f64 {
        self.values
            .get(index)
            .map_or(f64::NAN, ScriptValue::to_float)
    }

    /// Argument truncated to an integer; NaN and infinities are rejected
    pub fn integer(&self, index: usize) -> FunctionResult<i64> {
        self.value(index)
            .to_integer()
            .map_err(|e| FunctionError::InvalidArgument {
                name: self.name.to_string(),
                index,
                message: e.to_string(),
            })
    }

    pub fn boolean(&self, index: usize) -> bool {
        self.values
            .get(index)
            .is_some_and(ScriptValue::to_boolean)
    }

    pub fn string(&self, index: usize) -> String {
        self.value(index).to_display_string()
    }

    /// Fail with [`FunctionError::InvalidArity`] unless the count fits `signature`
    pub fn check_arity(&self, signature: &FunctionSignature) -> FunctionResult<()> {
        if signature.accepts(self.len()) {
            Ok(())
        } else {
            Err(FunctionError::InvalidArity {
                name: self.name.to_string(),
                min: signature.min_arity,
                max: signature.max_arity,
                actual: self.len(),
            })
        }
    }
}

/// Trait for built-in functions
pub trait BuiltinFunction: Send + Sync {
    /// Get the function name
    fn name(&self) -> &str;

    /// Get the function signature
    fn signature(&self) -> &FunctionSignature;

    /// Evaluate with arguments that already passed [`BuiltinFunction::validate_args`]
    fn evaluate(&self, args: &CallArguments<'_>) -> FunctionResult<ScriptValue>;

    /// Get function documentation
    fn documentation(&self) -> &str {
        ""
    }

    /// Validate arguments before evaluation
    fn validate_args(&self, args: &CallArguments<'_>) -> FunctionResult<()> {
        args.check_arity(self.signature())
    }
}

/// Closure type accepted by [`BuiltinRegistry::register_closure`]
pub type BuiltinClosure =
    Arc<dyn Fn(&CallArguments<'_>) -> FunctionResult<ScriptValue> + Send + Sync>;

/// Entry of the built-in dispatch table
#[derive(Clone)]
pub enum FunctionImpl {
    /// Trait-based function
    Trait(Arc<dyn BuiltinFunction>),
    /// Lightweight closure-based function
    Closure {
        /// Function name
        name: String,
        /// Function signature
        signature: FunctionSignature,
        /// The actual function implementation
        func: BuiltinClosure,
    },
}

impl std::fmt::Debug for FunctionImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FunctionImpl::Trait(func) => {
                f.debug_struct("Trait").field("name", &func.name()).finish()
            }
            FunctionImpl::Closure { name, .. } => {
                f.debug_struct("Closure").field("name", name).finish()
            }
        }
    }
}

impl FunctionImpl {
    /// Signature the arity check runs against
    pub fn signature(&self) -> &FunctionSignature {
        match self {
            FunctionImpl::Trait(func) => func.signature(),
            FunctionImpl::Closure { signature, .. } => signature,
        }
    }

    pub fn documentation(&self) -> &str {
        match self {
            FunctionImpl::Trait(func) => func.documentation(),
            FunctionImpl::Closure { .. } => "",
        }
    }

    /// Validate the arguments, then evaluate
    pub fn call(&self, args: &CallArguments<'_>) -> FunctionResult<ScriptValue> {
        match self {
            FunctionImpl::Trait(func) => {
                func.validate_args(args)?;
                func.evaluate(args)
            }
            FunctionImpl::Closure {
                signature, func, ..
            } => {
                args.check_arity(signature)?;
                func(args)
            }
        }
    }
}

/// A source of native functions
///
/// Several providers can be chained in a [`crate::FunctionRegistry`]; the first
/// one whose [`BuiltinProvider::has`] answers `true` serves the name.
pub trait BuiltinProvider: Send + Sync {
    /// Whether this provider serves `name`
    fn has(&self, name: &str) -> bool;

    /// Run `name`; `None` when this provider does not know it
    fn execute(&self, name: &str, args: &CallArguments<'_>) -> Option<FunctionResult<ScriptValue>>;

    /// Every name this provider serves
    fn names(&self) -> Vec<String>;
}

/// Name-keyed table of built-in functions
#[derive(Debug, Clone, Default)]
pub struct BuiltinRegistry {
    functions: FxHashMap<String, FunctionImpl>,
}

impl BuiltinRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the shipped `$` functions
    pub fn standard() -> Self {
        let mut registry = Self::new();
        crate::registry::functions::register_standard_functions(&mut registry);
        registry
    }

    /// Register a trait-based function
    pub fn register<F: BuiltinFunction + 'static>(&mut self, function: F) {
        let name = function.name().to_string();
        self.functions
            .insert(name, FunctionImpl::Trait(Arc::new(function)));
    }

    /// Register a closure-based function
    pub fn register_closure<F>(&mut self, signature: FunctionSignature, func: F)
    where
        F: Fn(&CallArguments<'_>) -> FunctionResult<ScriptValue> + Send + Sync + 'static,
    {
        let name = signature.name.clone();
        self.functions.insert(
            name.clone(),
            FunctionImpl::Closure {
                name,
                signature,
                func: Arc::new(func),
            },
        );
    }

    /// Serve `alias` with the implementation registered as `target`
    ///
    /// Returns false when `target` is unknown.
    pub fn register_alias(&mut self, alias: impl Into<String>, target: &str) -> bool {
        match self.functions.get(target).cloned() {
            Some(function) => {
                self.functions.insert(alias.into(), function);
                true
            }
            None => false,
        }
    }

    /// Get a function by name
    pub fn get(&self, name: &str) -> Option<&FunctionImpl> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl BuiltinProvider for BuiltinRegistry {
    fn has(&self, name: &str) -> bool {
        self.contains(name)
    }

    fn execute(&self, name: &str, args: &CallArguments<'_>) -> Option<FunctionResult<ScriptValue>> {
        self.functions.get(name).map(|function| function.call(args))
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.keys().cloned().collect();
        names.sort();
        names
    }
}
