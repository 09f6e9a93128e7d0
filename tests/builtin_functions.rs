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

//! Built-in `$` functions evaluated through a full formula context

use formula_engine::{Formula, FunctionError, ScriptValue};
use pretty_assertions::assert_eq;
use rstest::{fixture, rstest};

#[fixture]
fn formula() -> Formula {
    Formula::new()
}

#[rstest]
#[case::sumi("$SUMI(1, 2, 3, 4, 5, 6, 7, 8, 9, 10)", 55.0)]
#[case::sumf("$SUMF(1.0, 2.0, 3.0, 4.0, 5.1, 6.1, 7.1, 8.2, 9, 10)", 55.5)]
#[case::min("$MIN(6, 7, 8, 9, 10, 5.2, 5.5, 5.1)", 5.1)]
#[case::max("$MAX(6, 7, 8, 9, 10, 5.2, 5.5, 5.1)", 10.0)]
#[case::avg("$AVG(6, 7, 8, 9, 10, 5.2, 5.5, 5.1)", 6.975)]
#[case::abs("$ABS(-65.2285)", 65.2285)]
#[case::rnd_3("$RND(-65.2285, 3)", -65.229)]
#[case::rnd_2("$RND(-65.2285, 2)", -65.23)]
#[case::rnd_0("$RND(-65.2285, 0)", -65.0)]
#[case::rnd_left_to_right("$RND(100000 / 1000 * 3.23, 2)", 323.0)]
#[case::ceil_3("$CEIL(-65.2244, 3)", -65.224)]
#[case::ceil_2("$CEIL(-65.2244, 2)", -65.22)]
#[case::ceil_0("$CEIL(-65.2285, 0)", -65.0)]
#[case::floor_3("$FLOOR(-65.2244, 3)", -65.225)]
#[case::floor_2("$FLOOR(-65.2244, 2)", -65.23)]
#[case::floor_0("$FLOOR(-65.2285, 0)", -66.0)]
#[case::flr("$FLR(-65.2244, 2)", -65.23)]
#[case::if_true("$IF(true, 1, 2)", 1.0)]
#[case::if_false("$IF(false, 1, 2)", 2.0)]
fn test_builtin_values(formula: Formula, #[case] script: &str, #[case] expected: f64) {
    let value = formula.evaluate(script).unwrap();
    assert_eq!(value.to_float(), expected);
}

#[rstest]
fn test_nested_builtins(formula: Formula) {
    let script = "
        i = $SUMI(1, 2, $SUMI(1, $MIN(2,3)), $SUMI(2, 2), 5);
        f = $SUMF(1.5, $SUMF($MAX(1.2, 1.1), $ABS(-1.39)), $IF(i == 15, 5.0, 6.0));
        console.log('i = ' + i);
        console.log('f = ' + f);
    ";

    let mut context = formula.prepare_context(script).unwrap();
    context.run(script).unwrap();

    assert_eq!(context.get("i").unwrap().to_integer().unwrap(), 15);
    assert_eq!(context.get("f").unwrap().to_float(), 9.09);
}

#[rstest]
fn test_min_max_keep_original_argument(formula: Formula) {
    assert_eq!(formula.evaluate("$MIN('3', 2, 2.0)").unwrap(), ScriptValue::from(2));
    assert_eq!(formula.evaluate("$MAX('3', 2)").unwrap(), ScriptValue::from("3"));
    assert!(formula.evaluate("$MIN()").unwrap().is_undefined());
    assert!(formula.evaluate("$MAX()").unwrap().is_undefined());
}

#[rstest]
#[case("$RND(1.5, 11)")]
#[case("$RND(1.5, -1)")]
#[case("$FLOOR(1.5, 20)")]
#[case("$CEIL(1.5, -3)")]
fn test_precision_out_of_range(formula: Formula, #[case] script: &str) {
    let error = formula.evaluate(script).unwrap_err();
    assert!(
        matches!(
            error.function_error(),
            Some(FunctionError::ArgumentOutOfRange { index: 1, .. })
        ),
        "unexpected error: {error}"
    );
}

#[rstest]
#[case("$RND(1.5)")]
#[case("$ABS()")]
#[case("$ABS(1, 2)")]
#[case("$IF(true, 1)")]
#[case("$AVG()")]
fn test_invalid_arity(formula: Formula, #[case] script: &str) {
    let error = formula.evaluate(script).unwrap_err();
    assert!(
        matches!(error.function_error(), Some(FunctionError::InvalidArity { .. })),
        "unexpected error: {error}"
    );
}

#[rstest]
fn test_builtin_error_is_catchable_by_caller(formula: Formula) {
    let mut context = formula.prepare_context("$RND(1, 99); $ABS(-1)").unwrap();

    assert!(context.run("$RND(1, 99)").is_err());
    assert_eq!(context.run("$ABS(-1)").unwrap(), ScriptValue::from(1));
}

#[rstest]
fn test_builtin_names(formula: Formula) {
    assert_eq!(
        formula.builtin_names(),
        vec![
            "$ABS", "$AVG", "$CEIL", "$FLOOR", "$FLR", "$IF", "$MAX", "$MIN", "$RND", "$SUMF",
            "$SUMI"
        ]
    );
}
