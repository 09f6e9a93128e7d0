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

//! $RND(), $FLOOR() and $CEIL() - rounding to a number of decimal digits

use crate::model::ScriptValue;
use crate::registry::function::{BuiltinFunction, CallArguments, FunctionError, FunctionResult};
use crate::registry::signature::{FunctionSignature, ParameterInfo, ParameterKind};
use std::sync::LazyLock;

/// Largest accepted precision
pub const MAX_PRECISION: i64 = 10;

/// Which way a digit-rounding function goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundingMode {
    /// Nearest, halves away from zero
    Nearest,
    /// Toward negative infinity
    Floor,
    /// Toward positive infinity
    Ceil,
}

/// $RND(x, p), $FLOOR(x, p) and $CEIL(x, p)
pub struct DigitRoundFunction {
    mode: RoundingMode,
}

impl DigitRoundFunction {
    /// $RND(x, p)
    pub const fn round() -> Self {
        Self {
            mode: RoundingMode::Nearest,
        }
    }

    /// $FLOOR(x, p)
    pub const fn floor() -> Self {
        Self {
            mode: RoundingMode::Floor,
        }
    }

    /// $CEIL(x, p)
    pub const fn ceil() -> Self {
        Self {
            mode: RoundingMode::Ceil,
        }
    }
}

fn digit_signature(name: &str) -> FunctionSignature {
    FunctionSignature::new(
        name,
        vec![
            ParameterInfo::required("value", ParameterKind::Number),
            ParameterInfo::required("precision", ParameterKind::Integer),
        ],
    )
}

static RND_SIG: LazyLock<FunctionSignature> = LazyLock::new(|| digit_signature("$RND"));
static FLOOR_SIG: LazyLock<FunctionSignature> = LazyLock::new(|| digit_signature("$FLOOR"));
static CEIL_SIG: LazyLock<FunctionSignature> = LazyLock::new(|| digit_signature("$CEIL"));

impl BuiltinFunction for DigitRoundFunction {
    fn name(&self) -> &str {
        &self.signature().name
    }

    fn signature(&self) -> &FunctionSignature {
        match self.mode {
            RoundingMode::Nearest => &RND_SIG,
            RoundingMode::Floor => &FLOOR_SIG,
            RoundingMode::Ceil => &CEIL_SIG,
        }
    }

    fn documentation(&self) -> &str {
        match self.mode {
            RoundingMode::Nearest => {
                "Rounds the value to the given number of decimal digits (0 to 10), halves away from zero."
            }
            RoundingMode::Floor => {
                "Rounds the value down to the given number of decimal digits (0 to 10)."
            }
            RoundingMode::Ceil => {
                "Rounds the value up to the given number of decimal digits (0 to 10)."
            }
        }
    }

    fn evaluate(&self, args: &CallArguments<'_>) -> FunctionResult<ScriptValue> {
        let value = args.float(0);
        let precision = precision_argument(args, 1)?;
        Ok(ScriptValue::from(round_to_digits(value, precision, self.mode)))
    }
}

/// Read a precision argument, enforcing `0..=MAX_PRECISION`
pub fn precision_argument(args: &CallArguments<'_>, index: usize) -> FunctionResult<i32> {
    let precision = args.integer(index)?;
    if !(0..=MAX_PRECISION).contains(&precision) {
        return Err(FunctionError::ArgumentOutOfRange {
            name: args.name().to_string(),
            index,
            message: format!("precision should be between 0 and {MAX_PRECISION}, got {precision}"),
        });
    }
    // Bounded above, so the cast is lossless
    Ok(precision as i32)
}

/// `op(value * 10^precision) / 10^precision`
pub fn round_to_digits(value: f64, precision: i32, mode: RoundingMode) -> f64 {
    let factor = 10f64.powi(precision);
    let scaled = value * factor;
    let rounded = match mode {
        RoundingMode::Nearest => scaled.round(),
        RoundingMode::Floor => scaled.floor(),
        RoundingMode::Ceil => scaled.ceil(),
    };
    rounded / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn call(function: &DigitRoundFunction, value: f64, precision: f64) -> FunctionResult<ScriptValue> {
        let values = vec![ScriptValue::from(value), ScriptValue::from(precision)];
        function.evaluate(&CallArguments::new(function.name(), &values))
    }

    #[rstest]
    #[case(-65.2285, 3.0, -65.229)]
    #[case(-65.2285, 2.0, -65.23)]
    #[case(-65.2285, 0.0, -65.0)]
    #[case(2.5, 0.0, 3.0)]
    fn test_round(#[case] value: f64, #[case] precision: f64, #[case] expected: f64) {
        assert_eq!(
            call(&DigitRoundFunction::round(), value, precision),
            Ok(ScriptValue::from(expected))
        );
    }

    #[rstest]
    #[case(-65.2244, 3.0, -65.225)]
    #[case(-65.2244, 2.0, -65.23)]
    #[case(-65.2285, 0.0, -66.0)]
    fn test_floor(#[case] value: f64, #[case] precision: f64, #[case] expected: f64) {
        assert_eq!(
            call(&DigitRoundFunction::floor(), value, precision),
            Ok(ScriptValue::from(expected))
        );
    }

    #[rstest]
    #[case(-65.2244, 3.0, -65.224)]
    #[case(-65.2244, 2.0, -65.22)]
    #[case(-65.2285, 0.0, -65.0)]
    fn test_ceil(#[case] value: f64, #[case] precision: f64, #[case] expected: f64) {
        assert_eq!(
            call(&DigitRoundFunction::ceil(), value, precision),
            Ok(ScriptValue::from(expected))
        );
    }

    #[rstest]
    #[case(-1.0)]
    #[case(11.0)]
    fn test_precision_out_of_range(#[case] precision: f64) {
        let result = call(&DigitRoundFunction::round(), 1.5, precision);
        assert!(matches!(
            result,
            Err(FunctionError::ArgumentOutOfRange { index: 1, .. })
        ));
    }

    #[test]
    fn test_precision_not_a_number() {
        let values = vec![ScriptValue::from(1.5), ScriptValue::from("x")];
        let result = DigitRoundFunction::round().evaluate(&CallArguments::new("$RND", &values));
        assert!(matches!(
            result,
            Err(FunctionError::InvalidArgument { index: 1, .. })
        ));
    }
}
