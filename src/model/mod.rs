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

//! Value model shared by the script engine and host code
//!
//! Script values cross the engine boundary in both directions: host JSON is
//! imported with `From`, results are exported back with [`ScriptValue::export`].

pub mod type_coercion;
pub mod value;

pub use type_coercion::{
    CoercionResult, ValueError, format_number, loose_equals, parse_number_str, same_reference,
    strict_equals,
};
pub use value::{ArrayRef, Callable, NativeFunction, ObjectRef, ScriptValue};
