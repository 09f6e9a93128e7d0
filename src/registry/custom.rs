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

//! Custom functions: script source registered by name

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

/// Storage for custom function bodies
///
/// A body is script source that defines the function when run, for example
/// `function $CIRCLE(r) { return Math.PI * r * r }`.
pub trait CustomFunctionStore: Send + Sync {
    /// Store `body` under `name`, returning whether a body was already present
    fn register(&self, name: &str, body: &str) -> bool;

    /// The body registered under `name`; empty bodies count as absent
    fn body(&self, name: &str) -> Option<String>;

    /// Every registered name, sorted
    fn names(&self) -> Vec<String>;
}

/// Process-local [`CustomFunctionStore`]
#[derive(Debug, Default)]
pub struct InMemoryCustomFunctionStore {
    bodies: RwLock<FxHashMap<String, String>>,
}

impl InMemoryCustomFunctionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bodies.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.read().is_empty()
    }
}

impl CustomFunctionStore for InMemoryCustomFunctionStore {
    fn register(&self, name: &str, body: &str) -> bool {
        self.bodies
            .write()
            .insert(name.to_string(), body.to_string())
            .is_some()
    }

    fn body(&self, name: &str) -> Option<String> {
        self.bodies
            .read()
            .get(name)
            .filter(|body| !body.is_empty())
            .cloned()
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.bodies.read().keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_register_reports_overwrite() {
        let store = InMemoryCustomFunctionStore::new();

        assert!(!store.register("$F", "function $F() { return 1 }"));
        assert!(store.register("$F", "function $F() { return 2 }"));
        assert_eq!(store.body("$F").as_deref(), Some("function $F() { return 2 }"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_empty_body_is_absent() {
        let store = InMemoryCustomFunctionStore::new();
        store.register("$EMPTY", "");

        assert_eq!(store.body("$EMPTY"), None);
        assert_eq!(store.body("$MISSING"), None);
    }
}
