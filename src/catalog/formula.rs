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

//! Formula configurations and the in-memory formula catalog

use super::{FormulaCatalog, find_by_id};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A stored formula plus the attributes trigger filters match on
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct FormulaConfig {
    #[serde(rename = "ID", alias = "id")]
    pub id: String,

    #[serde(alias = "description")]
    pub description: String,

    /// Script run when a trigger selects this configuration
    #[serde(alias = "body")]
    pub body: String,

    #[serde(alias = "attributes")]
    pub attributes: BTreeMap<String, String>,

    /// Visible to filters as `config.Enabled`; not consulted otherwise
    #[serde(alias = "enabled")]
    pub enabled: bool,
}

impl FormulaConfig {
    pub fn new(id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            body: body.into(),
            enabled: true,
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Process-local [`FormulaCatalog`], sorted by id on construction
#[derive(Debug, Clone, Default)]
pub struct InMemoryFormulaCatalog {
    configs: Vec<FormulaConfig>,
}

impl InMemoryFormulaCatalog {
    pub fn new(mut configs: Vec<FormulaConfig>) -> Self {
        configs.sort_by(|a, b| a.id.cmp(&b.id));
        Self { configs }
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FormulaConfig> {
        self.configs.iter()
    }
}

impl FormulaCatalog for InMemoryFormulaCatalog {
    fn formula(&self, id: &str) -> Result<Option<FormulaConfig>> {
        Ok(find_by_id(&self.configs, id, |c| c.id.as_str()).map(|index| self.configs[index].clone()))
    }

    fn formulas(&self) -> Result<Vec<FormulaConfig>> {
        Ok(self.configs.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Trigger;
    use crate::context::ContextMap;
    use crate::error::FormulaError;
    use crate::formula::Formula;
    use pretty_assertions::assert_eq;

    fn catalog() -> InMemoryFormulaCatalog {
        InMemoryFormulaCatalog::new(
            (1..=6)
                .rev()
                .map(|n| {
                    FormulaConfig::new(format!("Formula {n}"), format!("{n}"))
                        .with_attribute("tier", if n % 2 == 0 { "gold" } else { "basic" })
                })
                .collect(),
        )
    }

    fn ids(configs: &[FormulaConfig]) -> Vec<&str> {
        configs.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn test_sorted_lookup() {
        let catalog = catalog();
        assert_eq!(catalog.len(), 6);
        assert_eq!(catalog.iter().next().map(|c| c.id.as_str()), Some("Formula 1"));
        assert_eq!(
            catalog.formula("Formula 4").unwrap().map(|c| c.body),
            Some("4".to_string())
        );
        assert_eq!(catalog.formula("Formula 7").unwrap(), None);
        assert_eq!(InMemoryFormulaCatalog::default().formula("Formula 1").unwrap(), None);
    }

    #[test]
    fn test_matching_by_id() {
        let trigger = Trigger::new(
            "pick",
            "config.ID == 'Formula 5' || config.ID == 'Formula 3'",
        );
        let matched = catalog()
            .matching(&trigger, &ContextMap::new(), &Formula::new())
            .unwrap();
        assert_eq!(ids(&matched), vec!["Formula 3", "Formula 5"]);
    }

    #[test]
    fn test_matching_by_attribute_and_context() {
        let trigger = Trigger::new("pick", "config.Attributes.tier == ctx.tier && config.Enabled")
            .with_inputs("ctx", "");
        let context: ContextMap = serde_json::from_str(r#"{"tier": "gold"}"#).unwrap();

        let matched = catalog()
            .matching(&trigger, &context, &Formula::new())
            .unwrap();
        assert_eq!(ids(&matched), vec!["Formula 2", "Formula 4", "Formula 6"]);
    }

    #[test]
    fn test_matching_non_boolean_filter() {
        let trigger = Trigger::new("bad", "config.ID");
        let error = catalog()
            .matching(&trigger, &ContextMap::new(), &Formula::new())
            .unwrap_err();
        assert!(matches!(
            error,
            FormulaError::FilterNotBoolean { trigger, formula }
                if trigger == "bad" && formula == "Formula 1"
        ));
    }

    #[test]
    fn test_serde_names() {
        let config = FormulaConfig::new("F1", "$ABS(x)").with_attribute("kind", "loan");
        let json = serde_json::to_value(&config).unwrap();

        assert_eq!(json["ID"], "F1");
        assert_eq!(json["Body"], "$ABS(x)");
        assert_eq!(json["Attributes"]["kind"], "loan");
        assert_eq!(json["Enabled"], true);

        let parsed: FormulaConfig =
            serde_json::from_str(r#"{"id": "F2", "body": "1", "enabled": true}"#).unwrap();
        assert_eq!(parsed, FormulaConfig::new("F2", "1"));
    }
}
