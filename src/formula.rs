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

//! Formula facade: function registry plus engine factory

use crate::config::EngineConfig;
use crate::context::{ContextMap, ExecutionContext};
use crate::engine::ScriptEngineFactory;
use crate::error::Result;
use crate::evaluator::InterpreterFactory;
use crate::model::ScriptValue;
use crate::registry::{
    BuiltinProvider, BuiltinRegistry, CustomFunctionStore, FunctionRegistry,
    InMemoryCustomFunctionStore,
};
use crate::resolver::DependencyResolver;
use std::fmt;
use std::sync::Arc;

/// Everything needed to assemble a [`Formula`]
///
/// The shipped built-ins and an in-memory custom store always head their
/// chains; providers listed here are consulted after them, in order.
#[derive(Default)]
pub struct FormulaOptions {
    pub config: EngineConfig,
    pub builtin_providers: Vec<Arc<dyn BuiltinProvider>>,
    pub custom_stores: Vec<Arc<dyn CustomFunctionStore>>,
    /// Engine factory; the bundled interpreter when `None`
    pub engine_factory: Option<Arc<dyn ScriptEngineFactory>>,
}

impl fmt::Debug for FormulaOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormulaOptions")
            .field("config", &self.config)
            .field("builtin_providers", &self.builtin_providers.len())
            .field("custom_stores", &self.custom_stores.len())
            .field("engine_factory", &self.engine_factory.is_some())
            .finish()
    }
}

impl FormulaOptions {
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }
}

/// Creates execution contexts wired to one function registry
///
/// Shareable across threads; every context it creates is independent.
#[derive(Clone)]
pub struct Formula {
    config: EngineConfig,
    registry: Arc<FunctionRegistry>,
    factory: Arc<dyn ScriptEngineFactory>,
}

impl fmt::Debug for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Formula")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl Default for Formula {
    fn default() -> Self {
        Self::new()
    }
}

impl Formula {
    /// Formula with the default configuration and providers
    pub fn new() -> Self {
        Self::with_options(FormulaOptions::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self::with_options(FormulaOptions::with_config(config))
    }

    pub fn with_options(options: FormulaOptions) -> Self {
        let FormulaOptions {
            config,
            builtin_providers,
            custom_stores,
            engine_factory,
        } = options;

        let mut registry = FunctionRegistry::new();
        registry.add_builtin_provider(Arc::new(BuiltinRegistry::standard()));
        for provider in builtin_providers {
            registry.add_builtin_provider(provider);
        }
        registry.add_custom_store(Arc::new(InMemoryCustomFunctionStore::new()));
        for store in custom_stores {
            registry.add_custom_store(store);
        }

        let factory = engine_factory.unwrap_or_else(|| {
            Arc::new(InterpreterFactory::new(
                config.max_call_depth,
                config.program_cache_size,
            ))
        });

        Self {
            config,
            registry: Arc::new(registry),
            factory,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<FunctionRegistry> {
        &self.registry
    }

    /// Fresh context with nothing loaded
    pub fn new_context(&self) -> Result<ExecutionContext> {
        let engine = self.factory.create()?;
        let resolver =
            DependencyResolver::new(Arc::clone(&self.registry), self.config.unresolved_functions);
        Ok(ExecutionContext::new(engine, resolver))
    }

    /// Fresh context with every function `text` references loaded
    pub fn prepare_context(&self, text: &str) -> Result<ExecutionContext> {
        let mut context = self.new_context()?;
        context.prepare(text)?;
        Ok(context)
    }

    /// Prepare and run `script` in a throwaway context
    pub fn evaluate(&self, script: &str) -> Result<ScriptValue> {
        self.evaluate_with(script, &ContextMap::new())
    }

    /// Like [`Formula::evaluate`], with `variables` bound as globals first
    pub fn evaluate_with(&self, script: &str, variables: &ContextMap) -> Result<ScriptValue> {
        let mut context = self.prepare_context(script)?;
        context.set_all(variables)?;
        context.run(script)
    }

    /// Store a custom function body; returns whether one was replaced
    pub fn register_custom_function(&self, name: &str, body: &str) -> bool {
        self.registry.register_custom_function(name, body)
    }

    pub fn custom_function_body(&self, name: &str) -> Option<String> {
        self.registry.custom_body(name)
    }

    pub fn builtin_names(&self) -> Vec<String> {
        self.registry.builtin_names()
    }

    pub fn custom_function_names(&self) -> Vec<String> {
        self.registry.custom_function_names()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UnresolvedPolicy;
    use crate::error::FormulaError;
    use crate::registry::{FunctionSignature, FunctionError};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const PREMIUM1: &str = "function $PREMIUM1(gender, age) { \
        if (gender == 'M') { return $SUMI(age, 300) } \
        return $SUMF(age, 150.5) }";

    #[test]
    fn test_formula_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Formula>();
    }

    #[rstest]
    #[case("$ABS(-65.2285)", 65.2285)]
    #[case("$SUMI(1, 2, 3, 4, 5, 6, 7, 8, 9, 10)", 55.0)]
    #[case("$SUMF(1.0, 2.0, 3.0, 4.0, 5.1, 6.1, 7.1, 8.2, 9, 10)", 55.5)]
    #[case("$AVG(6, 7, 8, 9, 10, 5.2, 5.5, 5.1)", 6.975)]
    #[case("$RND(-65.2285, 3)", -65.229)]
    #[case("$FLR(-65.2244, 2)", -65.23)]
    #[case("$CEIL(-65.2244, 2)", -65.22)]
    fn test_evaluate_builtins(#[case] script: &str, #[case] expected: f64) {
        let formula = Formula::new();
        assert_eq!(formula.evaluate(script).unwrap(), ScriptValue::from(expected));
    }

    #[test]
    fn test_custom_function_roundtrip() {
        let formula = Formula::new();
        assert!(!formula.register_custom_function("$PREMIUM1", PREMIUM1));
        assert_eq!(formula.custom_function_body("$PREMIUM1").as_deref(), Some(PREMIUM1));
        assert_eq!(formula.custom_function_names(), vec!["$PREMIUM1"]);

        assert_eq!(
            formula.evaluate("$PREMIUM1('M', 23)").unwrap(),
            ScriptValue::from(323)
        );
        assert_eq!(
            formula.evaluate("$PREMIUM1('F', 11)").unwrap(),
            ScriptValue::from(161.5)
        );
    }

    #[test]
    fn test_evaluate_with_variables() {
        let formula = Formula::new();
        let variables: ContextMap = serde_json::from_str(r#"{"x": -3.456}"#).unwrap();
        assert_eq!(
            formula.evaluate_with("$RND(x, 1)", &variables).unwrap(),
            ScriptValue::from(-3.5)
        );
    }

    #[test]
    fn test_out_of_range_precision() {
        let formula = Formula::new();
        let error = formula.evaluate("$RND(1.5, 11)").unwrap_err();
        assert!(matches!(
            error.function_error(),
            Some(FunctionError::ArgumentOutOfRange { .. })
        ));
    }

    #[test]
    fn test_extra_provider_after_standard() {
        let mut extra = BuiltinRegistry::new();
        extra.register_closure(FunctionSignature::variadic("$DOUBLE", vec![]), |args| {
            Ok(ScriptValue::from(args.float(0) * 2.0))
        });
        extra.register_closure(FunctionSignature::variadic("$ABS", vec![]), |_| {
            Ok(ScriptValue::from("shadowed"))
        });

        let formula = Formula::with_options(FormulaOptions {
            builtin_providers: vec![Arc::new(extra)],
            ..FormulaOptions::default()
        });

        assert_eq!(formula.evaluate("$DOUBLE(21)").unwrap(), ScriptValue::from(42));
        assert_eq!(formula.evaluate("$ABS(-1)").unwrap(), ScriptValue::from(1));
        assert!(formula.builtin_names().contains(&"$DOUBLE".to_string()));
    }

    #[test]
    fn test_strict_config_rejects_unknown() {
        let formula = Formula::with_config(EngineConfig::strict());
        assert_eq!(formula.config().unresolved_functions, UnresolvedPolicy::Strict);

        let error = formula.evaluate("$NOPE(1)").unwrap_err();
        assert!(matches!(error, FormulaError::UnresolvedFunction(name) if name == "$NOPE"));
    }

    #[test]
    fn test_default_config_defers_unknown_to_runtime() {
        let formula = Formula::new();
        let error = formula.evaluate("$NOPE(1)").unwrap_err();
        assert_eq!(error.to_string(), "ReferenceError: $NOPE is not defined");
    }
}
