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

//! Custom functions loaded into contexts through their references

use formula_engine::evaluator::EvaluationError;
use formula_engine::{
    CustomFunctionStore, EngineConfig, Formula, FormulaError, FormulaOptions,
    InMemoryCustomFunctionStore, LoadState, ScriptValue, extract_references,
};
use pretty_assertions::assert_eq;
use rstest::{fixture, rstest};
use std::sync::Arc;

const PREMIUM1: &str = r#"
function $PREMIUM1(gender, age, rates, sa) {
    console.log("$PREMIUM1 - rates=" + rates);
    r = rates[age];
    r = $IF(gender=="M", $RND(r*2, 2), r)
    return $RND(sa / 1000 * r, 2);
}
"#;

const PREMIUM2: &str = r#"
function $PREMIUM2(gender, age, rates1, sa1, rates2, sa2, rates3, sa3) {
    console.log("$PREMIUM2 - gender=" + gender);
    r1 = rates1[age];
    r2 = rates2[age];

    rates1[age] = $IF(gender=="M", $RND(r1*2, 2), r1)
    rates2[age] = $IF(gender=="F", $RND(r2*3, 2), r2)

    sa4 = $MAX(sa1, sa2, sa3)
    sa5 = $FLOOR($AVG(sa1, sa2, sa3), 2)

    p = $RND($SUMF(
            $PREMIUM1(gender, age, rates1, sa1),
            $PREMIUM1(gender, age, rates2, sa2),
            $PREMIUM1(gender, age, rates3, sa3),
            $PREMIUM1(gender, age, rates3, sa4),
            $PREMIUM1(gender, age, rates3, sa5)
        ), 2)

    return p;
}
"#;

const CIRCLE: &str = "
function $CIRCLE(radius) {
    return $RND(Math.PI * Math.pow(radius, 2), 10);
}
";

#[fixture]
fn formula() -> Formula {
    let formula = Formula::new();
    formula.register_custom_function("$PREMIUM1", PREMIUM1);
    formula.register_custom_function("$PREMIUM2", PREMIUM2);
    formula.register_custom_function("$CIRCLE", CIRCLE);
    formula
}

#[test]
fn test_extraction_deduplicates() {
    let source = "
        $function(){
            var xyzzy = NaN;
            return xyzzy;
        };
        $sum(5, $length(8) * 15);
        $if(a > 5, $if( b < 2, $int($left(x, 2)) + 5, $sum(5, 6, 7)), -1)
        function(){ return; };
    ";

    let names: Vec<String> = extract_references(source).into_iter().collect();
    assert_eq!(
        names,
        vec!["$function", "$sum", "$length", "$if", "$int", "$left"]
    );
}

#[rstest]
fn test_custom_function_with_builtins(formula: Formula) {
    let rates = "[1.1, 1.2, 1.3, 1.4, 1.5, 1.615]";
    assert_eq!(
        formula
            .evaluate(&format!("$PREMIUM1(\"M\", 5, {rates}, 100000)"))
            .unwrap(),
        ScriptValue::from(323)
    );
    assert_eq!(
        formula
            .evaluate(&format!("$PREMIUM1(\"F\", 5, {rates}, 100000)"))
            .unwrap(),
        ScriptValue::from(161.5)
    );
}

#[rstest]
fn test_nested_custom_functions_share_context(formula: Formula) {
    let male = r#"$PREMIUM2("M", 1, [1.1, 1.2, 1.3], 100000, [2.1, 2.2, 2.3], 50000, [3.1, 3.2, 3.3], 4555)"#;
    let female = r#"$PREMIUM2("F", 1, [1.1, 1.2, 1.3], 100000, [2.1, 2.2, 2.3], 50000, [3.1, 3.2, 3.3], 4555)"#;

    let mut context = formula.prepare_context(male).unwrap();
    assert_eq!(context.load_state("$PREMIUM1"), LoadState::Loaded);
    assert_eq!(context.load_state("$AVG"), LoadState::Loaded);
    assert_eq!(context.run(male).unwrap().to_float(), 1698.87);

    context.prepare(female).unwrap();
    assert_eq!(context.run(female).unwrap().to_float(), 949.44);
}

#[rstest]
fn test_host_variables(formula: Formula) {
    let script = "
        area1 = $RND(Math.sqrt($SUMF($RND(a*3,2), $RND(b*4,2), $RND(c*5,2))), 10);
        area2 = $CIRCLE(radius);
    ";

    let mut context = formula.prepare_context(script).unwrap();
    context.set("a", 2).unwrap();
    context.set("b", 3).unwrap();
    context.set("c", 4).unwrap();
    context.set("radius", 5).unwrap();
    context.run(script).unwrap();

    assert_eq!(context.get("area1").unwrap().to_float(), 6.164414003);
    assert_eq!(context.get("area2").unwrap().to_float(), 78.5398163397);
}

#[rstest]
fn test_prepare_is_idempotent(formula: Formula) {
    formula.register_custom_function(
        "$TALLY",
        "tally = (typeof tally == 'undefined' ? 0 : tally) + 1; function $TALLY() { return tally }",
    );

    let mut context = formula.prepare_context("$TALLY()").unwrap();
    context.prepare("$TALLY() + $TALLY()").unwrap();
    context.inject("$TALLY").unwrap();

    assert_eq!(context.run("$TALLY()").unwrap(), ScriptValue::from(1));
}

#[rstest]
fn test_self_recursion(formula: Formula) {
    formula.register_custom_function(
        "$FACT",
        "function $FACT(n) { return n <= 1 ? 1 : n * $FACT(n - 1) }",
    );

    assert_eq!(formula.evaluate("$FACT(10)").unwrap(), ScriptValue::from(3628800));
}

#[rstest]
fn test_mutual_recursion_across_three_functions(formula: Formula) {
    formula.register_custom_function("$A", "function $A(n) { return n <= 0 ? 'A' : $B(n - 1) }");
    formula.register_custom_function("$B", "function $B(n) { return n <= 0 ? 'B' : $C(n - 1) }");
    formula.register_custom_function("$C", "function $C(n) { return n <= 0 ? 'C' : $A(n - 1) }");

    let context = formula.prepare_context("$A(4)").unwrap();
    assert_eq!(context.loaded_functions(), vec!["$A", "$B", "$C"]);
    assert_eq!(formula.evaluate("$A(4)").unwrap(), ScriptValue::from("B"));
}

#[test]
fn test_recursion_a_hundred_levels_deep() {
    let handle = std::thread::Builder::new()
        .stack_size(8 * 1024 * 1024)
        .spawn(|| {
            let formula = Formula::new();
            formula.register_custom_function(
                "$FACT",
                "function $FACT(n) { return n <= 1 ? 1 : n * $FACT(n - 1) }",
            );
            // ScriptValue is !Send; carry it out of the thread as JSON
            formula
                .evaluate("$FACT(100) == 100 * $FACT(99)")
                .map_err(|e| e.to_string())
                .and_then(|v| v.export().map_err(|e| e.to_string()))
        })
        .unwrap();

    let result = handle.join().unwrap().map(ScriptValue::from);
    assert_eq!(result.unwrap(), ScriptValue::from(true));
}

#[test]
fn test_runaway_recursion_is_an_error() {
    let handle = std::thread::Builder::new()
        .stack_size(16 * 1024 * 1024)
        .spawn(|| {
            let formula = Formula::new();
            formula.register_custom_function("$LOOP", "function $LOOP(n) { return $LOOP(n + 1) }");
            formula.evaluate("$LOOP(0)").map(|_| ()).map_err(|e| e.to_string())
        })
        .unwrap();

    let error = handle.join().unwrap().unwrap_err();
    assert_eq!(error, "RangeError: maximum call depth of 256 exceeded");
}

#[test]
fn test_strict_policy() {
    let formula = Formula::with_config(EngineConfig::strict());
    formula.register_custom_function("$OUTER", "function $OUTER() { return $INNER() }");

    let error = formula.prepare_context("$OUTER()").unwrap_err();
    assert!(matches!(error, FormulaError::UnresolvedFunction(name) if name == "$INNER"));
}

#[test]
fn test_custom_body_errors_propagate() {
    let formula = Formula::new();
    formula.register_custom_function("$BAD", "function $BAD() { return 1 }; notDefined + 1");

    let error = formula.prepare_context("$BAD()").unwrap_err();
    assert!(matches!(
        error,
        FormulaError::Evaluation(EvaluationError::Reference { ref name }) if name == "notDefined"
    ));
}

#[test]
fn test_secondary_store_consulted() {
    let shared: Arc<InMemoryCustomFunctionStore> = Arc::new(InMemoryCustomFunctionStore::new());
    shared.register("$SHARED", "function $SHARED(x) { return $ABS(x) + 1 }");

    let formula = Formula::with_options(FormulaOptions {
        custom_stores: vec![shared],
        ..FormulaOptions::default()
    });

    assert_eq!(formula.evaluate("$SHARED(-2)").unwrap(), ScriptValue::from(3));
    // the primary store takes precedence once it has a body
    formula.register_custom_function("$SHARED", "function $SHARED(x) { return 0 }");
    assert_eq!(formula.evaluate("$SHARED(-2)").unwrap(), ScriptValue::from(0));
}

#[test]
fn test_builtins_shadow_custom_bodies() {
    let formula = Formula::new();
    formula.register_custom_function("$ABS", "function $ABS(x) { return 'custom' }");

    assert_eq!(formula.evaluate("$ABS(-4)").unwrap(), ScriptValue::from(4));
}
