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

//! Function registry for formulas
//!
//! Two kinds of providers are chained here: built-in providers serving native
//! `$` functions and custom stores holding script source. Within each chain the
//! first provider that knows a name wins, and built-ins shadow custom bodies.

pub mod custom;
pub mod function;
pub mod functions;
pub mod signature;

pub use custom::{CustomFunctionStore, InMemoryCustomFunctionStore};
pub use function::{
    BuiltinClosure, BuiltinFunction, BuiltinProvider, BuiltinRegistry, CallArguments,
    FunctionError, FunctionImpl, FunctionResult,
};
pub use signature::{FunctionSignature, ParameterInfo, ParameterKind};

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Ordered chains of built-in providers and custom function stores
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    builtins: Vec<Arc<dyn BuiltinProvider>>,
    custom_stores: Vec<Arc<dyn CustomFunctionStore>>,
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("builtin_providers", &self.builtins.len())
            .field("custom_stores", &self.custom_stores.len())
            .finish()
    }
}

impl FunctionRegistry {
    /// Create a registry with no providers
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the shipped built-ins and an empty in-memory store
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add_builtin_provider(Arc::new(BuiltinRegistry::standard()));
        registry.add_custom_store(Arc::new(InMemoryCustomFunctionStore::new()));
        registry
    }

    /// Append a built-in provider; returns false if it is already chained
    pub fn add_builtin_provider(&mut self, provider: Arc<dyn BuiltinProvider>) -> bool {
        if self.builtins.iter().any(|p| Arc::ptr_eq(p, &provider)) {
            return false;
        }
        self.builtins.push(provider);
        true
    }

    /// Append a custom store; returns false if it is already chained
    pub fn add_custom_store(&mut self, store: Arc<dyn CustomFunctionStore>) -> bool {
        if self.custom_stores.iter().any(|s| Arc::ptr_eq(s, &store)) {
            return false;
        }
        self.custom_stores.push(store);
        true
    }

    /// First built-in provider serving `name`
    pub fn builtin_provider(&self, name: &str) -> Option<Arc<dyn BuiltinProvider>> {
        self.builtins
            .iter()
            .find(|provider| provider.has(name))
            .cloned()
    }

    /// First non-empty custom body for `name`
    pub fn custom_body(&self, name: &str) -> Option<String> {
        self.custom_stores.iter().find_map(|store| store.body(name))
    }

    /// Write a custom body into the primary store
    ///
    /// Returns whether a body already existed there. Without any store the body
    /// is dropped and `false` is returned.
    pub fn register_custom_function(&self, name: &str, body: &str) -> bool {
        match self.custom_stores.first() {
            Some(store) => store.register(name, body),
            None => {
                log::warn!("no custom function store configured, dropping body of {name}");
                false
            }
        }
    }

    /// Every name served by any built-in provider, sorted and de-duplicated
    pub fn builtin_names(&self) -> Vec<String> {
        self.builtins
            .iter()
            .flat_map(|provider| provider.names())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Every name held by any custom store, sorted and de-duplicated
    pub fn custom_function_names(&self) -> Vec<String> {
        self.custom_stores
            .iter()
            .flat_map(|store| store.names())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn builtin_provider_count(&self) -> usize {
        self.builtins.len()
    }

    pub fn custom_store_count(&self) -> usize {
        self.custom_stores.len()
    }
}
