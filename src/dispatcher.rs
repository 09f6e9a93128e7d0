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

//! Trigger dispatch
//!
//! `execute` resolves a trigger, picks the first formula configuration its
//! filter accepts, and runs that formula in a fresh context:
//!
//! 1. bind the caller context and run the trigger's input mapping
//! 2. run the formula body
//! 3. run the output mapping against an empty output object
//!
//! The output object comes back with the body's value under [`RETURN_KEY`].

use crate::catalog::{FormulaCatalog, Trigger, TriggerCatalog};
use crate::context::{ContextMap, ExecutionContext};
use crate::error::{FormulaError, Result};
use crate::formula::Formula;
use crate::model::ScriptValue;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Values produced by one dispatch, keyed by output name
pub type ResultMap = Map<String, Value>;

/// Result key holding the exported value of the formula body
pub const RETURN_KEY: &str = "_return";

/// Runs formulas on behalf of named triggers
#[derive(Clone)]
pub struct TriggerDispatcher {
    formula: Formula,
    triggers: Arc<dyn TriggerCatalog>,
    formulas: Arc<dyn FormulaCatalog>,
}

impl fmt::Debug for TriggerDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerDispatcher")
            .field("formula", &self.formula)
            .finish_non_exhaustive()
    }
}

impl TriggerDispatcher {
    pub fn new(
        formula: Formula,
        triggers: Arc<dyn TriggerCatalog>,
        formulas: Arc<dyn FormulaCatalog>,
    ) -> Self {
        Self {
            formula,
            triggers,
            formulas,
        }
    }

    pub fn formula(&self) -> &Formula {
        &self.formula
    }

    pub fn triggers(&self) -> &Arc<dyn TriggerCatalog> {
        &self.triggers
    }

    pub fn formulas(&self) -> &Arc<dyn FormulaCatalog> {
        &self.formulas
    }

    /// Fire `trigger_id` with `context` as input
    ///
    /// Any failure aborts the whole dispatch; no partial result is returned.
    pub fn execute(&self, trigger_id: &str, context: &ContextMap) -> Result<ResultMap> {
        let trigger = self
            .triggers
            .trigger(trigger_id)?
            .ok_or_else(|| FormulaError::TriggerNotFound(trigger_id.to_string()))?;
        log::debug!("dispatching {trigger_id}");

        let config = self
            .formulas
            .matching(&trigger, context, &self.formula)?
            .into_iter()
            .next()
            .ok_or_else(|| FormulaError::NoMatchingFormula(trigger_id.to_string()))?;
        log::debug!("{trigger_id} selected formula {}", config.id);

        let mut formula_context = self.formula.prepare_context(&config.body)?;
        map_inputs(&mut formula_context, &trigger, context)?;

        let returned = formula_context.run(&config.body)?;
        log::debug!("{trigger_id} formula {} returned {returned}", config.id);

        let mut result = map_outputs(&mut formula_context, &trigger)?;
        result.insert(RETURN_KEY.to_string(), returned.export()?);
        Ok(result)
    }
}

fn map_inputs(
    formula_context: &mut ExecutionContext,
    trigger: &Trigger,
    context: &ContextMap,
) -> Result<()> {
    if trigger.input_mapping.is_empty() {
        return Ok(());
    }

    if !trigger.context_var_name.is_empty() {
        formula_context.set(&trigger.context_var_name, ScriptValue::from(context))?;
    }
    formula_context.prepare(&trigger.input_mapping)?;
    formula_context.run(&trigger.input_mapping)?;
    Ok(())
}

fn map_outputs(formula_context: &mut ExecutionContext, trigger: &Trigger) -> Result<ResultMap> {
    if trigger.output_mapping.is_empty() {
        return Ok(ResultMap::new());
    }

    if !trigger.output_var_name.is_empty() {
        formula_context.set(&trigger.output_var_name, ScriptValue::empty_object())?;
    }
    formula_context.prepare(&trigger.output_mapping)?;
    formula_context.run(&trigger.output_mapping)?;

    if trigger.output_var_name.is_empty() {
        return Ok(ResultMap::new());
    }

    match formula_context.get(&trigger.output_var_name)?.export()? {
        Value::Object(map) => Ok(map),
        _ => Err(FormulaError::InvalidOutput(trigger.output_var_name.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FormulaConfig, InMemoryFormulaCatalog, InMemoryTriggerCatalog};
    use crate::model::ValueError;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn dispatcher(triggers: Vec<Trigger>, configs: Vec<FormulaConfig>) -> TriggerDispatcher {
        TriggerDispatcher::new(
            Formula::new(),
            Arc::new(InMemoryTriggerCatalog::new(triggers)),
            Arc::new(InMemoryFormulaCatalog::new(configs)),
        )
    }

    fn context(value: Value) -> ContextMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("context must be an object"),
        }
    }

    #[test]
    fn test_dispatcher_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TriggerDispatcher>();
    }

    #[test]
    fn test_execute_with_mappings() {
        let dispatcher = dispatcher(
            vec![
                Trigger::new("double", "config.ID == 'F1'")
                    .with_inputs("ctx", "x = ctx.x")
                    .with_outputs("out", "out.half = $RND(y / 4, 1); out.label = 'done'"),
            ],
            vec![FormulaConfig::new("F1", "y = $SUMF(x, x); y")],
        );

        let result = dispatcher
            .execute("double", &context(json!({"x": 2.5})))
            .unwrap();

        assert_eq!(
            Value::Object(result),
            json!({"half": 1.3, "label": "done", "_return": 5})
        );
    }

    #[test]
    fn test_circular_results_are_rejected() {
        let dispatcher = dispatcher(
            vec![
                Trigger::new("self output", "true").with_outputs("out", "out.me = out"),
                Trigger::new("self return", "config.ID == 'LOOP'"),
            ],
            vec![
                FormulaConfig::new("A", "1"),
                FormulaConfig::new("LOOP", "o = {}; o.me = o; o"),
            ],
        );

        for trigger in ["self output", "self return"] {
            let error = dispatcher.execute(trigger, &ContextMap::new()).unwrap_err();
            assert!(
                matches!(
                    error,
                    FormulaError::Value(ValueError::NotExportable { kind: "circular" })
                ),
                "unexpected error for {trigger}: {error}"
            );
        }
    }

    #[test]
    fn test_first_match_wins() {
        let dispatcher = dispatcher(
            vec![Trigger::new("any", "true")],
            vec![FormulaConfig::new("B", "'second'"), FormulaConfig::new("A", "'first'")],
        );

        let result = dispatcher.execute("any", &ContextMap::new()).unwrap();
        assert_eq!(result.get(RETURN_KEY), Some(&json!("first")));
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_unknown_trigger() {
        let dispatcher = dispatcher(vec![], vec![]);
        let error = dispatcher.execute("nope", &ContextMap::new()).unwrap_err();
        assert!(matches!(error, FormulaError::TriggerNotFound(id) if id == "nope"));
    }

    #[test]
    fn test_no_matching_formula() {
        let dispatcher = dispatcher(
            vec![Trigger::new("none", "false")],
            vec![FormulaConfig::new("A", "1")],
        );
        let error = dispatcher.execute("none", &ContextMap::new()).unwrap_err();
        assert_eq!(error.to_string(), "no matched formula found for trigger - none");
    }

    #[test]
    fn test_output_must_stay_object() {
        let dispatcher = dispatcher(
            vec![Trigger::new("t", "true").with_outputs("out", "out = 3")],
            vec![FormulaConfig::new("A", "1")],
        );
        let error = dispatcher.execute("t", &ContextMap::new()).unwrap_err();
        assert!(matches!(error, FormulaError::InvalidOutput(name) if name == "out"));
    }

    #[test]
    fn test_missing_input_mapping_is_reference_error() {
        let dispatcher = dispatcher(
            vec![Trigger::new("t", "true").with_inputs("context", "")],
            vec![FormulaConfig::new("A", "principal * 2")],
        );
        let error = dispatcher
            .execute("t", &context(json!({"principal": 1})))
            .unwrap_err();
        assert_eq!(error.to_string(), "ReferenceError: principal is not defined");
    }
}
