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

//! Function dependency resolution
//!
//! A formula names the `$` functions it calls. Before the formula runs, every
//! one of those names is injected into the context's engine: built-ins as
//! native handlers, custom functions by running their source. Custom sources
//! may reference further functions, so injection recurses, and the load ledger
//! keeps every name to a single injection per context even through cycles.

use crate::config::UnresolvedPolicy;
use crate::engine::ScriptEngine;
use crate::error::{FormulaError, Result};
use crate::model::NativeFunction;
use crate::registry::{BuiltinProvider, FunctionError, FunctionRegistry};
use indexmap::IndexSet;
use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashMap;
use std::sync::Arc;

static FUNCTION_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\$[^\$()\s]+)\(").expect("function reference pattern is valid"));

/// Every `$NAME(` call site in `text`, sigil included, de-duplicated
///
/// Names come back in first-occurrence order.
pub fn extract_references(text: &str) -> IndexSet<String> {
    FUNCTION_REFERENCE
        .captures_iter(text)
        .filter_map(|captures| captures.get(1))
        .map(|name| name.as_str().to_string())
        .collect()
}

/// Load progress of one function name within a context
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoadState {
    #[default]
    NotLoaded,
    Loading,
    Loaded,
}

/// Per-context record of which functions have been injected
#[derive(Debug, Default)]
pub struct LoadLedger {
    states: FxHashMap<String, LoadState>,
}

impl LoadLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of `name`; unknown names are `NotLoaded`
    pub fn state(&self, name: &str) -> LoadState {
        self.states.get(name).copied().unwrap_or_default()
    }

    fn mark(&mut self, name: &str, state: LoadState) {
        log::trace!("{name}: {:?} -> {state:?}", self.state(name));
        self.states.insert(name.to_string(), state);
    }

    /// Names that finished loading, sorted
    pub fn loaded_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .states
            .iter()
            .filter(|(_, state)| **state == LoadState::Loaded)
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// Injects referenced functions from a [`FunctionRegistry`] into engines
#[derive(Debug, Clone)]
pub struct DependencyResolver {
    registry: Arc<FunctionRegistry>,
    policy: UnresolvedPolicy,
}

impl DependencyResolver {
    pub fn new(registry: Arc<FunctionRegistry>, policy: UnresolvedPolicy) -> Self {
        Self { registry, policy }
    }

    pub fn registry(&self) -> &Arc<FunctionRegistry> {
        &self.registry
    }

    pub fn policy(&self) -> UnresolvedPolicy {
        self.policy
    }

    /// Make `name` callable in `engine`, loading its dependencies first
    ///
    /// A name that is already loaded, or is being loaded further up the call
    /// chain, is left alone. Errors raised by a custom body propagate unchanged.
    pub fn inject(
        &self,
        ledger: &mut LoadLedger,
        engine: &mut dyn ScriptEngine,
        name: &str,
    ) -> Result<()> {
        match ledger.state(name) {
            LoadState::Loaded => return Ok(()),
            LoadState::Loading => {
                log::debug!("{name} is already loading, skipping");
                return Ok(());
            }
            LoadState::NotLoaded => {}
        }

        if let Some(provider) = self.registry.builtin_provider(name) {
            log::debug!("injecting built-in {name}");
            ledger.mark(name, LoadState::Loading);
            engine.install_native(name, native_handler(name, provider))?;
            ledger.mark(name, LoadState::Loaded);
            return Ok(());
        }

        if let Some(body) = self.registry.custom_body(name) {
            log::debug!("injecting custom function {name}");
            ledger.mark(name, LoadState::Loading);
            for dependency in extract_references(&body) {
                if dependency != name {
                    self.inject(ledger, engine, &dependency)?;
                }
            }
            ledger.mark(name, LoadState::Loaded);
            engine.run(&body)?;
            return Ok(());
        }

        match self.policy {
            UnresolvedPolicy::Ignore => Ok(()),
            UnresolvedPolicy::Warn => {
                log::warn!("function {name} is neither built-in nor registered");
                Ok(())
            }
            UnresolvedPolicy::Strict => Err(FormulaError::UnresolvedFunction(name.to_string())),
        }
    }

    /// Inject every function `text` references, stopping at the first failure
    pub fn load_all(
        &self,
        ledger: &mut LoadLedger,
        engine: &mut dyn ScriptEngine,
        text: &str,
    ) -> Result<()> {
        for name in extract_references(text) {
            self.inject(ledger, engine, &name)?;
        }
        Ok(())
    }
}

fn native_handler(name: &str, provider: Arc<dyn BuiltinProvider>) -> NativeFunction {
    let name = name.to_string();
    NativeFunction::new(move |args| match provider.execute(&name, args) {
        Some(result) => result,
        None => Err(FunctionError::NotFound { name: name.clone() }),
    })
}
