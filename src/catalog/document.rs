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

//! JSON catalog documents
//!
//! ```json
//! {
//!   "functions": { "$DOUBLE": "function $DOUBLE(x) { return x * 2 }" },
//!   "formulas": [ { "ID": "F1", "Body": "$DOUBLE(v)", "Enabled": true } ],
//!   "triggers": [ { "ID": "T1", "Filter": "config.ID == 'F1'" } ]
//! }
//! ```

use super::{FormulaConfig, InMemoryFormulaCatalog, InMemoryTriggerCatalog, Trigger};
use crate::dispatcher::TriggerDispatcher;
use crate::error::{FormulaError, Result};
use crate::formula::Formula;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Custom functions, formulas and triggers loaded together
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogDocument {
    /// Custom function name to source body
    pub functions: BTreeMap<String, String>,
    pub formulas: Vec<FormulaConfig>,
    pub triggers: Vec<Trigger>,
}

impl CatalogDocument {
    /// Parse a document; the top level must be a JSON object
    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        if !value.is_object() {
            return Err(FormulaError::catalog(
                "catalog document must be a JSON object",
            ));
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Register the functions with `formula` and wrap the rest in catalogs
    pub fn into_dispatcher(self, formula: Formula) -> TriggerDispatcher {
        for (name, body) in &self.functions {
            if formula.register_custom_function(name, body) {
                log::debug!("catalog document replaced custom function {name}");
            }
        }

        TriggerDispatcher::new(
            formula,
            Arc::new(InMemoryTriggerCatalog::new(self.triggers)),
            Arc::new(InMemoryFormulaCatalog::new(self.formulas)),
        )
    }
}
