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

//! Bundled script engine
//!
//! A tree-walking interpreter for the JavaScript-like subset formulas are
//! written in. Parsed programs are shared between engines through a
//! [`ProgramCache`]; everything else is per engine.

mod cache;
mod error;
mod globals;
mod interpreter;
mod scope;

pub use cache::ProgramCache;
pub use error::{EvaluationError, EvaluationResult};
pub use globals::CONSOLE_TARGET;
pub use interpreter::{
    DEFAULT_MAX_CALL_DEPTH, Interpreter, InterpreterFactory, MAX_EXPRESSION_DEPTH,
};
pub use scope::{Scope, ScopeRef};
