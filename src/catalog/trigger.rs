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

//! Trigger definitions and the in-memory trigger catalog

use super::{TriggerCatalog, find_by_id};
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// A named point where the host asks for a formula result
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Trigger {
    #[serde(rename = "ID", alias = "id")]
    pub id: String,

    #[serde(alias = "description")]
    pub description: String,

    /// Boolean script choosing the formula configurations this trigger runs
    #[serde(alias = "filter")]
    pub filter: String,

    /// Name the caller context is bound under; unbound when empty
    #[serde(alias = "context_var_name")]
    pub context_var_name: String,

    /// Script copying values out of the caller context into variables
    #[serde(alias = "input_mapping")]
    pub input_mapping: String,

    /// Name of the object the output mapping fills; unbound when empty
    #[serde(alias = "output_var_name")]
    pub output_var_name: String,

    /// Script copying variables into the output object
    #[serde(alias = "output_mapping")]
    pub output_mapping: String,
}

impl Trigger {
    pub fn new(id: impl Into<String>, filter: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            filter: filter.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_inputs(
        mut self,
        context_var_name: impl Into<String>,
        input_mapping: impl Into<String>,
    ) -> Self {
        self.context_var_name = context_var_name.into();
        self.input_mapping = input_mapping.into();
        self
    }

    pub fn with_outputs(
        mut self,
        output_var_name: impl Into<String>,
        output_mapping: impl Into<String>,
    ) -> Self {
        self.output_var_name = output_var_name.into();
        self.output_mapping = output_mapping.into();
        self
    }
}

/// Process-local [`TriggerCatalog`], sorted by id on construction
#[derive(Debug, Clone, Default)]
pub struct InMemoryTriggerCatalog {
    triggers: Vec<Trigger>,
}

impl InMemoryTriggerCatalog {
    pub fn new(mut triggers: Vec<Trigger>) -> Self {
        triggers.sort_by(|a, b| a.id.cmp(&b.id));
        Self { triggers }
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Trigger> {
        self.triggers.iter()
    }
}

impl TriggerCatalog for InMemoryTriggerCatalog {
    fn trigger(&self, id: &str) -> Result<Option<Trigger>> {
        Ok(find_by_id(&self.triggers, id, |t| t.id.as_str()).map(|index| self.triggers[index].clone()))
    }

    fn triggers(&self) -> Result<Vec<Trigger>> {
        Ok(self.triggers.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sorted_on_construction() {
        let catalog = InMemoryTriggerCatalog::new(vec![
            Trigger::new("T3", "true"),
            Trigger::new("T1", "true"),
            Trigger::new("T2", "true"),
        ]);

        let ids: Vec<&str> = catalog.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["T1", "T2", "T3"]);
        assert_eq!(catalog.trigger("T2").unwrap().map(|t| t.id), Some("T2".to_string()));
        assert_eq!(catalog.trigger("T4").unwrap(), None);
    }

    #[test]
    fn test_serde_names() {
        let trigger = Trigger::new("T1", "true").with_inputs("context", "x = context.x");
        let json = serde_json::to_value(&trigger).unwrap();

        assert_eq!(json["ID"], "T1");
        assert_eq!(json["ContextVarName"], "context");
        assert_eq!(json["InputMapping"], "x = context.x");

        let parsed: Trigger =
            serde_json::from_str(r#"{"id": "T9", "filter": "false", "output_var_name": "out"}"#)
                .unwrap();
        assert_eq!(parsed.id, "T9");
        assert_eq!(parsed.filter, "false");
        assert_eq!(parsed.output_var_name, "out");
        assert_eq!(parsed.input_mapping, "");
    }
}
