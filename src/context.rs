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

//! Execution context: one engine plus the functions loaded into it

use crate::engine::ScriptEngine;
use crate::error::Result;
use crate::model::ScriptValue;
use crate::resolver::{DependencyResolver, LoadLedger, LoadState};
use serde_json::{Map, Value};
use std::fmt;

/// Caller-supplied input values, keyed by name
pub type ContextMap = Map<String, Value>;

/// Unit of isolation for formula runs
///
/// Each context owns its engine exclusively. Functions injected into one context
/// are invisible to every other context. Not thread-safe.
pub struct ExecutionContext {
    engine: Box<dyn ScriptEngine>,
    ledger: LoadLedger,
    resolver: DependencyResolver,
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("ledger", &self.ledger)
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}

impl ExecutionContext {
    pub fn new(engine: Box<dyn ScriptEngine>, resolver: DependencyResolver) -> Self {
        Self {
            engine,
            ledger: LoadLedger::new(),
            resolver,
        }
    }

    /// Run a snippet in this context's engine
    pub fn run(&mut self, script: &str) -> Result<ScriptValue> {
        self.engine.run(script)
    }

    pub fn get(&self, name: &str) -> Result<ScriptValue> {
        self.engine.get(name)
    }

    pub fn set(&mut self, name: &str, value: impl Into<ScriptValue>) -> Result<()> {
        self.engine.set(name, value.into())
    }

    /// Bind every entry of `values` as a global
    pub fn set_all(&mut self, values: &ContextMap) -> Result<()> {
        for (name, value) in values {
            self.engine.set(name, ScriptValue::from(value))?;
        }
        Ok(())
    }

    /// Load every function `text` references
    ///
    /// Safe to call repeatedly with overlapping texts; nothing loads twice.
    pub fn prepare(&mut self, text: &str) -> Result<()> {
        self.resolver
            .load_all(&mut self.ledger, self.engine.as_mut(), text)
    }

    /// Load a single function and its dependencies
    pub fn inject(&mut self, name: &str) -> Result<()> {
        self.resolver
            .inject(&mut self.ledger, self.engine.as_mut(), name)
    }

    pub fn load_state(&self, name: &str) -> LoadState {
        self.ledger.state(name)
    }

    pub fn loaded_functions(&self) -> Vec<String> {
        self.ledger.loaded_names()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UnresolvedPolicy;
    use crate::engine::ScriptEngineFactory;
    use crate::evaluator::InterpreterFactory;
    use crate::registry::FunctionRegistry;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn context(registry: FunctionRegistry) -> ExecutionContext {
        let engine = InterpreterFactory::default().create().unwrap();
        let resolver = DependencyResolver::new(Arc::new(registry), UnresolvedPolicy::Strict);
        ExecutionContext::new(engine, resolver)
    }

    #[test]
    fn test_prepare_then_run() {
        let mut ctx = context(FunctionRegistry::standard());
        let script = "i = $SUMI(1, 2, $SUMI(1, $MIN(2,3)), $SUMI(2, 2), 5); \
                      f = $SUMF(1.5, $SUMF($MAX(1.2, 1.1), $ABS(-1.39)), $IF(i == 15, 5.0, 6.0));";

        ctx.prepare(script).unwrap();
        ctx.run(script).unwrap();

        assert_eq!(ctx.get("i").unwrap().to_integer().unwrap(), 15);
        assert_eq!(ctx.get("f").unwrap().to_float(), 9.09);
        assert_eq!(
            ctx.loaded_functions(),
            vec!["$ABS", "$IF", "$MAX", "$MIN", "$SUMF", "$SUMI"]
        );
    }

    #[test]
    fn test_run_without_prepare_fails() {
        let mut ctx = context(FunctionRegistry::standard());
        let error = ctx.run("$ABS(-1)").unwrap_err();
        assert_eq!(error.to_string(), "ReferenceError: $ABS is not defined");
    }

    #[test]
    fn test_set_and_get() {
        let mut ctx = context(FunctionRegistry::new());
        ctx.set("rate", 0.5).unwrap();

        assert_eq!(ctx.run("rate * 4").unwrap(), ScriptValue::from(2.0));
        assert!(ctx.get("unknown").unwrap().is_undefined());
    }

    #[test]
    fn test_set_all() {
        let mut ctx = context(FunctionRegistry::new());
        let values: ContextMap = serde_json::from_str(r#"{"a": 2, "b": "x", "c": [1, 2]}"#).unwrap();
        ctx.set_all(&values).unwrap();

        assert_eq!(ctx.run("a + b + c.length").unwrap(), ScriptValue::from("2x2"));
    }

    #[test]
    fn test_contexts_are_isolated() {
        let registry = FunctionRegistry::standard();
        registry.register_custom_function("$ONE", "function $ONE() { return 1 }");
        let registry = Arc::new(registry);
        let factory = InterpreterFactory::default();
        let resolver = DependencyResolver::new(Arc::clone(&registry), UnresolvedPolicy::Strict);

        let mut first = ExecutionContext::new(factory.create().unwrap(), resolver.clone());
        let second = ExecutionContext::new(factory.create().unwrap(), resolver);

        first.inject("$ONE").unwrap();

        assert_eq!(first.load_state("$ONE"), LoadState::Loaded);
        assert_eq!(second.load_state("$ONE"), LoadState::NotLoaded);
        assert!(second.get("$ONE").unwrap().is_undefined());
    }
}
