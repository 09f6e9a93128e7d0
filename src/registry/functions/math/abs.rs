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

//! $ABS() function - absolute value

use crate::model::ScriptValue;
use crate::registry::function::{BuiltinFunction, CallArguments, FunctionResult};
use crate::registry::signature::{FunctionSignature, ParameterInfo, ParameterKind};

/// $ABS(x) function - absolute value
pub struct AbsFunction;

impl BuiltinFunction for AbsFunction {
    fn name(&self) -> &str {
        "$ABS"
    }

    fn signature(&self) -> &FunctionSignature {
        static SIG: std::sync::LazyLock<FunctionSignature> = std::sync::LazyLock::new(|| {
            FunctionSignature::new(
                "$ABS",
                vec![ParameterInfo::required("value", ParameterKind::Number)],
            )
        });
        &SIG
    }

    fn documentation(&self) -> &str {
        "Returns the absolute value of the argument after numeric conversion."
    }

    fn evaluate(&self, args: &CallArguments<'_>) -> FunctionResult<ScriptValue> {
        Ok(ScriptValue::from(args.float(0).abs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_abs() {
        let values = vec![ScriptValue::from(-65.2285)];
        let result = AbsFunction.evaluate(&CallArguments::new("$ABS", &values));
        assert_eq!(result, Ok(ScriptValue::from(65.2285)));
    }

    #[test]
    fn test_abs_of_numeric_string() {
        let values = vec![ScriptValue::from("-3")];
        let result = AbsFunction.evaluate(&CallArguments::new("$ABS", &values));
        assert_eq!(result, Ok(ScriptValue::from(3.0)));
    }
}
