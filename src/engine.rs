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

//! Script engine contract
//!
//! The rest of the crate talks to scripts only through these two traits, so an
//! alternative engine can be plugged in with `FormulaOptions::engine_factory`.

use crate::error::Result;
use crate::model::{NativeFunction, ScriptValue};

/// One script environment with its own global variables
///
/// Engines are single-threaded; one instance backs exactly one execution context.
pub trait ScriptEngine {
    /// Run a snippet and return its completion value
    fn run(&mut self, script: &str) -> Result<ScriptValue>;

    /// Read a global variable; unknown names yield `undefined`
    fn get(&self, name: &str) -> Result<ScriptValue>;

    /// Bind a global variable, replacing any previous value
    fn set(&mut self, name: &str, value: ScriptValue) -> Result<()>;

    /// Expose a host function as a global under `name`
    fn install_native(&mut self, name: &str, function: NativeFunction) -> Result<()>;
}

/// Creates fresh engines; shared across threads by [`crate::Formula`]
pub trait ScriptEngineFactory: Send + Sync {
    /// Create an engine with nothing but the standard globals (and any prelude)
    fn create(&self) -> Result<Box<dyn ScriptEngine>>;
}
