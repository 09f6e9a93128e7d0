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

//! Engine configuration options

use crate::error::Result;
use crate::evaluator::DEFAULT_MAX_CALL_DEPTH;
use serde::{Deserialize, Serialize};

/// What to do when a referenced `$` function has no definition anywhere
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnresolvedPolicy {
    /// Skip silently; the script fails later if it actually calls the name
    Ignore,
    /// Skip and log a warning
    #[default]
    Warn,
    /// Fail preparation with `FormulaError::UnresolvedFunction`
    Strict,
}

/// Configuration for formula evaluation behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Handling of references nothing can resolve
    pub unresolved_functions: UnresolvedPolicy,

    /// Maximum nesting of script function calls
    ///
    /// Every script call takes Rust stack, so raising this may also require
    /// running engines on a thread with a larger stack.
    pub max_call_depth: usize,

    /// Maximum number of parsed programs kept per factory (0 disables caching)
    pub program_cache_size: usize,
}

impl EngineConfig {
    /// Create a new configuration with custom settings
    pub fn new(
        unresolved_functions: UnresolvedPolicy,
        max_call_depth: usize,
        program_cache_size: usize,
    ) -> Self {
        Self {
            unresolved_functions,
            max_call_depth,
            program_cache_size,
        }
    }

    /// Fail on every unresolved reference
    pub fn strict() -> Self {
        Self {
            unresolved_functions: UnresolvedPolicy::Strict,
            ..Self::default()
        }
    }

    /// Ignore unresolved references and allow deeper recursion
    ///
    /// Run engines built from this preset on a thread with at least 8 MiB of stack.
    pub fn lenient() -> Self {
        Self {
            unresolved_functions: UnresolvedPolicy::Ignore,
            max_call_depth: 1_024,
            program_cache_size: 1_024,
        }
    }

    /// Create a configuration for testing
    pub fn testing() -> Self {
        Self {
            unresolved_functions: UnresolvedPolicy::Strict,
            max_call_depth: 32,
            program_cache_size: 16,
        }
    }

    /// Load a configuration from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            unresolved_functions: UnresolvedPolicy::Warn,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            program_cache_size: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_engine_config_default() {
        let config = EngineConfig::default();
        assert_eq!(config.unresolved_functions, UnresolvedPolicy::Warn);
        assert_eq!(config.max_call_depth, 256);
        assert_eq!(config.program_cache_size, 256);
    }

    #[test]
    fn test_engine_config_strict() {
        let config = EngineConfig::strict();
        assert_eq!(config.unresolved_functions, UnresolvedPolicy::Strict);
        assert_eq!(config.max_call_depth, 256);
    }

    #[test]
    fn test_engine_config_lenient() {
        let config = EngineConfig::lenient();
        assert_eq!(config.unresolved_functions, UnresolvedPolicy::Ignore);
        assert_eq!(config.max_call_depth, 1_024);
        assert_eq!(config.program_cache_size, 1_024);
    }

    #[test]
    fn test_engine_config_custom() {
        let config = EngineConfig::new(UnresolvedPolicy::Ignore, 8, 0);
        assert_eq!(config.unresolved_functions, UnresolvedPolicy::Ignore);
        assert_eq!(config.max_call_depth, 8);
        assert_eq!(config.program_cache_size, 0);
    }

    #[test]
    fn test_engine_config_from_json() {
        let config =
            EngineConfig::from_json_str(r#"{"unresolved_functions": "strict", "max_call_depth": 10}"#)
                .unwrap();
        assert_eq!(config.unresolved_functions, UnresolvedPolicy::Strict);
        assert_eq!(config.max_call_depth, 10);
        assert_eq!(config.program_cache_size, 256);

        assert!(EngineConfig::from_json_str(r#"{"unresolved_functions": "loud"}"#).is_err());
    }
}
