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

//! $AVG() function - arithmetic mean

use crate::model::ScriptValue;
use crate::registry::function::{BuiltinFunction, CallArguments, FunctionError, FunctionResult};
use crate::registry::signature::{FunctionSignature, ParameterInfo, ParameterKind};
use rust_decimal::prelude::*;

/// $AVG(x, ...) - mean of the arguments
///
/// The sum is accumulated in decimal, so `$AVG(0.1, 0.2)` is exactly `0.15`.
pub struct AvgFunction;

impl BuiltinFunction for AvgFunction {
    fn name(&self) -> &str {
        "$AVG"
    }

    fn signature(&self) -> &FunctionSignature {
        static SIG: std::sync::LazyLock<FunctionSignature> = std::sync::LazyLock::new(|| {
            FunctionSignature::variadic(
                "$AVG",
                vec![ParameterInfo::required("value", ParameterKind::Number)],
            )
        });
        &SIG
    }

    fn documentation(&self) -> &str {
        "Returns the arithmetic mean of the arguments, accumulated in decimal precision."
    }

    fn evaluate(&self, args: &CallArguments<'_>) -> FunctionResult<ScriptValue> {
        if args.is_empty() {
            return Err(FunctionError::InvalidArity {
                name: args.name().to_string(),
                min: 1,
                max: None,
                actual: 0,
            });
        }

        let values: Vec<f64> = args.iter().map(ScriptValue::to_float).collect();
        let mean = decimal_mean(&values).unwrap_or_else(|| float_mean(&values));
        Ok(ScriptValue::from(mean))
    }
}

/// Mean in decimal; `None` when a value or the sum leaves the decimal range
fn decimal_mean(values: &[f64]) -> Option<f64> {
    let mut sum = Decimal::ZERO;
    for value in values {
        sum = sum.checked_add(to_decimal(*value)?)?;
    }
    let mean = sum.checked_div(Decimal::from(values.len()))?;

    // Shortest decimal text parses to the nearest double
    mean.normalize()
        .to_string()
        .parse::<f64>()
        .ok()
        .or_else(|| mean.to_f64())
}

/// Decimal from the shortest text form of `value`, which keeps `5.1` as `5.1`
fn to_decimal(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_str(&value.to_string())
        .ok()
        .or_else(|| Decimal::from_f64(value))
}

fn float_mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}
