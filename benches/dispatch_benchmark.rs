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

//! Formula engine benchmarks
//!
//! Covers reference extraction, parsing, context preparation and full trigger
//! dispatch.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use formula_engine::parser::tokenizer::Tokenizer;
use formula_engine::{
    ContextMap, Formula, FormulaConfig, InMemoryFormulaCatalog, InMemoryTriggerCatalog, Trigger,
    TriggerDispatcher, extract_references, parse_program,
};
use serde_json::json;
use std::hint::black_box;
use std::sync::Arc;

const LOAN: &str = "function $LOAN(principal, dow_payment, interest_rate, term, is_vat) {
    initial_loan = principal - dow_payment
    i1 = $RND(initial_loan * interest_rate * term / 12, 2)
    i2 = $IF(is_vat, i1 * 1.07, i1)
    gross_loan = $SUMF(initial_loan, i2)
    return gross_loan
}";

const TEST_SCRIPTS: &[(&str, &str)] = &[
    ("simple", "$ABS(-1.5)"),
    ("medium", "$RND($SUMF(1.5, $MAX(1.2, 1.1), $ABS(-1.39)), 2)"),
    (
        "complex",
        "i = $SUMI(1, 2, $SUMI(1, $MIN(2,3)), $SUMI(2, 2), 5); \
         f = $SUMF(1.5, $SUMF($MAX(1.2, 1.1), $ABS(-1.39)), $IF(i == 15, 5.0, 6.0));",
    ),
];

fn bench_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("extraction");
    group.throughput(Throughput::Elements(1));

    for (complexity, script) in TEST_SCRIPTS {
        group.bench_with_input(
            BenchmarkId::new("extract_references", complexity),
            script,
            |b, script| b.iter(|| black_box(extract_references(black_box(script)))),
        );
    }

    group.finish();
}

fn bench_parser(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser");
    group.throughput(Throughput::Elements(1));

    for (complexity, script) in TEST_SCRIPTS {
        group.bench_with_input(BenchmarkId::new("tokenize", complexity), script, |b, script| {
            b.iter(|| {
                let mut tokenizer = Tokenizer::new(black_box(script));
                let mut count = 0usize;
                while let Ok(Some(token)) = tokenizer.next_token() {
                    black_box(token);
                    count += 1;
                }
                count
            })
        });
        group.bench_with_input(BenchmarkId::new("parse", complexity), script, |b, script| {
            b.iter(|| black_box(parse_program(black_box(script))))
        });
    }

    group.finish();
}

fn bench_prepare(c: &mut Criterion) {
    let mut group = c.benchmark_group("prepare");
    group.throughput(Throughput::Elements(1));

    let formula = Formula::new();
    formula.register_custom_function("$LOAN", LOAN);

    for (complexity, script) in TEST_SCRIPTS {
        group.bench_with_input(BenchmarkId::new("builtins", complexity), script, |b, script| {
            b.iter(|| black_box(formula.prepare_context(black_box(script))))
        });
    }
    group.bench_function("custom", |b| {
        b.iter(|| black_box(formula.prepare_context(black_box("$LOAN(p, d, r, t, v)"))))
    });

    group.finish();
}

fn bench_dispatch(c: &mut Criterion) {
    let formula = Formula::new();
    formula.register_custom_function("$LOAN", LOAN);

    let dispatcher = TriggerDispatcher::new(
        formula,
        Arc::new(InMemoryTriggerCatalog::new(vec![
            Trigger::new("loan", "config.ID == 'LOAN_FORMULA1'").with_inputs(
                "context",
                "p = context['principal']
                 d = context['dow']
                 r = context['rate']
                 t = context['term']
                 v = context['vat']",
            ),
        ])),
        Arc::new(InMemoryFormulaCatalog::new(vec![FormulaConfig::new(
            "LOAN_FORMULA1",
            "$LOAN(p, d, r, t, v)",
        )])),
    );

    let context: ContextMap = match json!({
        "principal": 1_000_000,
        "dow": 100_000,
        "rate": 0.0099,
        "term": 12,
        "vat": false,
    }) {
        serde_json::Value::Object(map) => map,
        _ => unreachable!(),
    };

    c.bench_function("dispatch_loan", |b| {
        b.iter(|| black_box(dispatcher.execute(black_box("loan"), black_box(&context))))
    });
}

criterion_group!(
    benches,
    bench_extraction,
    bench_parser,
    bench_prepare,
    bench_dispatch
);
criterion_main!(benches);
