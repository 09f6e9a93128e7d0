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

//! $SUMI() and $SUMF() functions

use crate::model::ScriptValue;
use crate::registry::function::{BuiltinFunction, CallArguments, FunctionError, FunctionResult};
use crate::registry::signature::FunctionSignature;

/// $SUMI(...) - integer sum, each argument truncated first
pub struct SumIntegerFunction;

impl BuiltinFunction for SumIntegerFunction {
    fn name(&self) -> &str {
        "$SUMI"
    }

    fn signature(&self) -> &FunctionSignature {
        static SIG: std::sync::LazyLock<FunctionSignature> =
            std::sync::LazyLock::new(|| FunctionSignature::variadic("$SUMI", vec![]));
        &SIG
    }

    fn documentation(&self) -> &str {
        "Sums the arguments as integers. Each argument is truncated toward zero; NaN is rejected."
    }

    fn evaluate(&self, args: &CallArguments<'_>) -> FunctionResult<ScriptValue> {
        let mut total: i64 = 0;
        for index in 0..args.len() {
            let value = args.integer(index)?;
            total = total
                .checked_add(value)
                .ok_or_else(|| FunctionError::EvaluationError {
                    name: args.name().to_string(),
                    message: "integer overflow".to_string(),
                })?;
        }
        Ok(ScriptValue::from(total))
    }
}

/// $SUMF(...) - float sum
pub struct SumFloatFunction;

impl BuiltinFunction for SumFloatFunction {
    fn name(&self) -> &str {
        "$SUMF"
    }

    fn signature(&self) -> &FunctionSignature {
        static SIG: std::sync::LazyLock<FunctionSignature> =
            std::sync::LazyLock::new(|| FunctionSignature::variadic("$SUMF", vec![]));
        &SIG
    }

    fn documentation(&self) -> &str {
        "Sums the arguments as floating point numbers."
    }

    fn evaluate(&self, args: &CallArguments<'_>) -> FunctionResult<ScriptValue> {
        let total = args.iter().map(ScriptValue::to_float).sum::<f64>();
        Ok(ScriptValue::from(total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn numbers(values: &[f64]) -> Vec<ScriptValue> {
        values.iter().copied().map(ScriptValue::from).collect()
    }

    #[test]
    fn test_sumi_truncates() {
        let values = numbers(&[1.9, 2.2, 3.7, 4.1, 5.5]);
        let result = SumIntegerFunction.evaluate(&CallArguments::new("$SUMI", &values));
        assert_eq!(result, Ok(ScriptValue::from(15.0)));
    }

    #[test]
    fn test_sumi_rejects_nan() {
        let values = vec![ScriptValue::from(1.0), ScriptValue::from("abc")];
        let result = SumIntegerFunction.evaluate(&CallArguments::new("$SUMI", &values));
        assert!(matches!(result, Err(FunctionError::InvalidArgument { index: 1, .. })));
    }

    #[test]
    fn test_sumi_overflow() {
        let values = numbers(&[9.0e18, 9.0e18]);
        let result = SumIntegerFunction.evaluate(&CallArguments::new("$SUMI", &values));
        assert!(matches!(result, Err(FunctionError::EvaluationError { .. })));
    }

    #[test]
    fn test_sumf() {
        let values = numbers(&[1.01, 2.02, 3.03, 3.03]);
        let result = SumFloatFunction.evaluate(&CallArguments::new("$SUMF", &values));
        assert_eq!(result, Ok(ScriptValue::from(9.09)));
    }

    #[test]
    fn test_empty_sums_are_zero() {
        assert_eq!(
            SumFloatFunction.evaluate(&CallArguments::new("$SUMF", &[])),
            Ok(ScriptValue::from(0.0))
        );
        assert_eq!(
            SumIntegerFunction.evaluate(&CallArguments::new("$SUMI", &[])),
            Ok(ScriptValue::from(0.0))
        );
    }
}
