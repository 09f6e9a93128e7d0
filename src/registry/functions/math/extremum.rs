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

//! $MIN() and $MAX() functions

use crate::model::ScriptValue;
use crate::registry::function::{BuiltinFunction, CallArguments, FunctionResult};
use crate::registry::signature::FunctionSignature;
use std::sync::LazyLock;

static MIN_SIG: LazyLock<FunctionSignature> =
    LazyLock::new(|| FunctionSignature::variadic("$MIN", vec![]));
static MAX_SIG: LazyLock<FunctionSignature> =
    LazyLock::new(|| FunctionSignature::variadic("$MAX", vec![]));

/// $MIN(...) and $MAX(...)
///
/// Arguments are compared by their numeric value but the winning argument is
/// returned untouched, so `$MAX("10", 9)` is the string `"10"`.
pub struct ExtremumFunction {
    largest: bool,
}

impl ExtremumFunction {
    /// $MIN(...)
    pub const fn min() -> Self {
        Self { largest: false }
    }

    /// $MAX(...)
    pub const fn max() -> Self {
        Self { largest: true }
    }
}

impl BuiltinFunction for ExtremumFunction {
    fn name(&self) -> &str {
        &self.signature().name
    }

    fn signature(&self) -> &FunctionSignature {
        if self.largest { &MAX_SIG } else { &MIN_SIG }
    }

    fn documentation(&self) -> &str {
        if self.largest {
            "Returns the argument with the largest numeric value; ties keep the earlier argument."
        } else {
            "Returns the argument with the smallest numeric value; ties keep the earlier argument."
        }
    }

    fn evaluate(&self, args: &CallArguments<'_>) -> FunctionResult<ScriptValue> {
        let mut values = args.iter();
        let Some(first) = values.next() else {
            return Ok(ScriptValue::Undefined);
        };

        let mut best = first;
        let mut best_number = first.to_float();
        for value in values {
            let number = value.to_float();
            let better = if self.largest {
                number > best_number
            } else {
                number < best_number
            };
            if better {
                best = value;
                best_number = number;
            }
        }
        Ok(best.clone())
    }
}
