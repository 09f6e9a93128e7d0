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

//! Read-only catalogs of triggers and formula configurations
//!
//! Entries are kept sorted by id. A lookup of a missing id is `Ok(None)`; errors
//! are reserved for backends that fail.

mod document;
mod formula;
mod trigger;

pub use document::CatalogDocument;
pub use formula::{FormulaConfig, InMemoryFormulaCatalog};
pub use trigger::{InMemoryTriggerCatalog, Trigger};

use crate::context::ContextMap;
use crate::error::{FormulaError, Result};
use crate::formula::Formula;
use crate::model::ScriptValue;

/// Name under which a filter sees the candidate configuration
pub const CONFIG_VAR_NAME: &str = "config";

/// Source of trigger definitions
pub trait TriggerCatalog: Send + Sync {
    /// Trigger with exactly this id
    fn trigger(&self, id: &str) -> Result<Option<Trigger>>;

    /// Every trigger, in id order
    fn triggers(&self) -> Result<Vec<Trigger>>;
}

/// Source of formula configurations
pub trait FormulaCatalog: Send + Sync {
    /// Configuration with exactly this id
    fn formula(&self, id: &str) -> Result<Option<FormulaConfig>>;

    /// Every configuration, in id order
    fn formulas(&self) -> Result<Vec<FormulaConfig>>;

    /// Configurations accepted by the trigger's filter, in id order
    ///
    /// The filter runs once per candidate with `config` bound to the candidate
    /// and, when the trigger names one, the caller context bound as well.
    fn matching(
        &self,
        trigger: &Trigger,
        context: &ContextMap,
        formula: &Formula,
    ) -> Result<Vec<FormulaConfig>> {
        let mut filter_context = formula.prepare_context(&trigger.filter)?;
        let mut matched = Vec::new();

        for config in self.formulas()? {
            filter_context.set(CONFIG_VAR_NAME, ScriptValue::from(serde_json::to_value(&config)?))?;
            if !trigger.context_var_name.is_empty() {
                filter_context.set(&trigger.context_var_name, ScriptValue::from(context))?;
            }

            let verdict = filter_context.run(&trigger.filter)?;
            if !verdict.is_boolean() {
                return Err(FormulaError::FilterNotBoolean {
                    trigger: trigger.id.clone(),
                    formula: config.id,
                });
            }

            let accepted = verdict.to_boolean();
            log::debug!(
                "filter of {} {} {}",
                trigger.id,
                if accepted { "accepted" } else { "rejected" },
                config.id
            );
            if accepted {
                matched.push(config);
            }
        }

        Ok(matched)
    }
}

/// Index of the first entry whose id is not less than `id`, if it is `id`
pub(crate) fn find_by_id<T>(entries: &[T], id: &str, key: impl Fn(&T) -> &str) -> Option<usize> {
    let index = entries.partition_point(|entry| key(entry) < id);
    entries
        .get(index)
        .filter(|entry| key(entry) == id)
        .map(|_| index)
}
