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

//! $IF() function

use crate::model::ScriptValue;
use crate::registry::function::{BuiltinFunction, CallArguments, FunctionResult};
use crate::registry::signature::{FunctionSignature, ParameterInfo, ParameterKind};

/// $IF(condition, then, otherwise)
///
/// Both branches are evaluated by the caller before the call; only the
/// condition is coerced.
pub struct IfFunction;

impl BuiltinFunction for IfFunction {
    fn name(&self) -> &str {
        "$IF"
    }

    fn signature(&self) -> &FunctionSignature {
        static SIG: std::sync::LazyLock<FunctionSignature> = std::sync::LazyLock::new(|| {
            FunctionSignature::new(
                "$IF",
                vec![
                    ParameterInfo::required("condition", ParameterKind::Boolean),
                    ParameterInfo::required("then", ParameterKind::Any),
                    ParameterInfo::required("otherwise", ParameterKind::Any),
                ],
            )
        });
        &SIG
    }

    fn documentation(&self) -> &str {
        "Returns the second argument when the first is truthy, otherwise the third."
    }

    fn evaluate(&self, args: &CallArguments<'_>) -> FunctionResult<ScriptValue> {
        Ok(if args.boolean(0) {
            args.value(1)
        } else {
            args.value(2)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(ScriptValue::from(true), 1.0)]
    #[case(ScriptValue::from(false), 2.0)]
    #[case(ScriptValue::from(""), 2.0)]
    #[case(ScriptValue::from("yes"), 1.0)]
    #[case(ScriptValue::Undefined, 2.0)]
    fn test_if(#[case] condition: ScriptValue, #[case] expected: f64) {
        let values = vec![condition, ScriptValue::from(1.0), ScriptValue::from(2.0)];
        let result = IfFunction.evaluate(&CallArguments::new("$IF", &values));
        assert_eq!(result, Ok(ScriptValue::from(expected)));
    }
}
