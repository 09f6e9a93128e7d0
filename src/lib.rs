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

//! Formula and rule evaluation engine
//!
//! Business rules are short scripts ("formulas") calling `$`-prefixed functions.
//! Built-in functions are native; custom functions are script source loaded on
//! first use, together with everything they reference. Applications fire named
//! triggers, which pick a formula from a catalog and map inputs and outputs.
//!
//! ```
//! use formula_engine::Formula;
//!
//! let formula = Formula::new();
//! formula.register_custom_function("$AREA", "function $AREA(r) { return $RND(Math.PI * r * r, 2) }");
//! let area = formula.evaluate("$AREA(2)").unwrap();
//! assert_eq!(area.to_float(), 12.57);
//! ```

pub mod ast;
pub mod catalog;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod formula;
pub mod model;
pub mod parser;
pub mod registry;
pub mod resolver;

// Re-export main types
pub use catalog::{
    CatalogDocument, FormulaCatalog, FormulaConfig, InMemoryFormulaCatalog,
    InMemoryTriggerCatalog, Trigger, TriggerCatalog,
};
pub use config::{EngineConfig, UnresolvedPolicy};
pub use context::{ContextMap, ExecutionContext};
pub use dispatcher::{RETURN_KEY, ResultMap, TriggerDispatcher};
pub use engine::{ScriptEngine, ScriptEngineFactory};
pub use error::{FormulaError, Result};
pub use evaluator::{Interpreter, InterpreterFactory};
pub use formula::{Formula, FormulaOptions};
pub use model::{NativeFunction, ScriptValue, ValueError};
pub use parser::{ParseError, parse_program};
pub use registry::{
    BuiltinProvider, BuiltinRegistry, CallArguments, CustomFunctionStore, FunctionError,
    FunctionRegistry, InMemoryCustomFunctionStore,
};
pub use resolver::{DependencyResolver, LoadLedger, LoadState, extract_references};
