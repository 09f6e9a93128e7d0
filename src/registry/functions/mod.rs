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

//! Shipped `$` functions

pub mod boolean;
pub mod math;

// Re-export all functions for convenience
pub use boolean::*;
pub use math::*;

use crate::registry::function::BuiltinRegistry;

/// Register every shipped built-in into `registry`
pub fn register_standard_functions(registry: &mut BuiltinRegistry) {
    register_math_functions(registry);
    register_boolean_functions(registry);
}
