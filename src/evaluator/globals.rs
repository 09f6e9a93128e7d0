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

//! Global bindings available to every script: `Math`, `console`, `JSON` and
//! the conversion functions.

use super::scope::Scope;
use crate::model::{NativeFunction, ScriptValue, parse_number_str};
use crate::registry::{CallArguments, FunctionError, FunctionResult};
use indexmap::IndexMap;

/// Log target for `console` output
pub const CONSOLE_TARGET: &str = "formula::console";

/// Bind the standard globals into a root scope
pub fn install_globals(scope: &Scope) {
    scope.declare("NaN", ScriptValue::from(f64::NAN));
    scope.declare("Infinity", ScriptValue::from(f64::INFINITY));
    scope.declare("Math", math_object());
    scope.declare("console", console_object());
    scope.declare("JSON", json_object());

    scope.declare(
        "isNaN",
        native("isNaN", |args| Ok(args.float(0).is_nan().into())),
    );
    scope.declare(
        "isFinite",
        native("isFinite", |args| Ok(args.float(0).is_finite().into())),
    );
    scope.declare(
        "parseFloat",
        native("parseFloat", |args| {
            Ok(parse_float_prefix(&args.string(0)).into())
        }),
    );
    scope.declare(
        "parseInt",
        native("parseInt", |args| {
            let radix = if args.len() > 1 { args.integer(1)? } else { 0 };
            Ok(parse_int_prefix(&args.string(0), radix).into())
        }),
    );
    scope.declare(
        "Number",
        native("Number", |args| {
            Ok(if args.is_empty() { 0.0 } else { args.float(0) }.into())
        }),
    );
    scope.declare(
        "String",
        native("String", |args| {
            Ok(if args.is_empty() {
                ScriptValue::from("")
            } else {
                ScriptValue::from(args.string(0))
            })
        }),
    );
    scope.declare(
        "Boolean",
        native("Boolean", |args| Ok(args.boolean(0).into())),
    );
}

fn native<F>(name: &str, function: F) -> ScriptValue
where
    F: Fn(&CallArguments<'_>) -> FunctionResult<ScriptValue> + 'static,
{
    ScriptValue::native(name, NativeFunction::new(function))
}

fn unary_math(name: &str, op: fn(f64) -> f64) -> ScriptValue {
    native(name, move |args| Ok(op(args.float(0)).into()))
}

fn math_object() -> ScriptValue {
    let mut math = IndexMap::new();
    math.insert("PI".to_string(), ScriptValue::from(std::f64::consts::PI));
    math.insert("E".to_string(), ScriptValue::from(std::f64::consts::E));

    let unary: [(&str, fn(f64) -> f64); 9] = [
        ("abs", f64::abs),
        ("ceil", f64::ceil),
        ("floor", f64::floor),
        ("trunc", f64::trunc),
        ("sqrt", f64::sqrt),
        ("log", f64::ln),
        ("exp", f64::exp),
        // Halves round toward positive infinity
        ("round", |x| (x + 0.5).floor()),
        ("sign", |x| if x == 0.0 || x.is_nan() { x } else { x.signum() }),
    ];
    for (name, op) in unary {
        math.insert(name.to_string(), unary_math(name, op));
    }

    math.insert(
        "pow".to_string(),
        native("pow", |args| Ok(args.float(0).powf(args.float(1)).into())),
    );
    math.insert(
        "min".to_string(),
        native("min", |args| {
            Ok(fold_numbers(args, f64::INFINITY, f64::min).into())
        }),
    );
    math.insert(
        "max".to_string(),
        native("max", |args| {
            Ok(fold_numbers(args, f64::NEG_INFINITY, f64::max).into())
        }),
    );

    ScriptValue::object(math)
}

/// NaN if any argument is NaN, otherwise the fold of all arguments
fn fold_numbers(args: &CallArguments<'_>, initial: f64, op: fn(f64, f64) -> f64) -> f64 {
    let mut result = initial;
    for value in args.iter() {
        let number = value.to_float();
        if number.is_nan() {
            return f64::NAN;
        }
        result = op(result, number);
    }
    result
}

fn console_object() -> ScriptValue {
    let mut console = IndexMap::new();
    let levels = [
        ("log", log::Level::Info),
        ("info", log::Level::Info),
        ("debug", log::Level::Debug),
        ("warn", log::Level::Warn),
        ("error", log::Level::Error),
    ];
    for (name, level) in levels {
        console.insert(
            name.to_string(),
            native(name, move |args| {
                let message = args
                    .iter()
                    .map(ScriptValue::to_display_string)
                    .collect::<Vec<_>>()
                    .join(" ");
                log::log!(target: CONSOLE_TARGET, level, "{message}");
                Ok(ScriptValue::Undefined)
            }),
        );
    }
    ScriptValue::object(console)
}

fn json_object() -> ScriptValue {
    let mut json = IndexMap::new();
    json.insert(
        "stringify".to_string(),
        native("stringify", |args| {
            let exported = args.value(0).export().map_err(|e| FunctionError::InvalidArgument {
                name: args.name().to_string(),
                index: 0,
                message: e.to_string(),
            })?;
            Ok(exported.to_string().into())
        }),
    );
    json.insert(
        "parse".to_string(),
        native("parse", |args| {
            serde_json::from_str::<serde_json::Value>(&args.string(0))
                .map(ScriptValue::from)
                .map_err(|e| FunctionError::InvalidArgument {
                    name: args.name().to_string(),
                    index: 0,
                    message: e.to_string(),
                })
        }),
    );
    ScriptValue::object(json)
}

/// Longest numeric prefix of `text`, NaN when there is none
fn parse_float_prefix(text: &str) -> f64 {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    if text[end..].starts_with("Infinity") {
        return parse_number_str(&text[..end + "Infinity".len()]);
    }

    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }
    if end == digits_start || &text[digits_start..end] == "." {
        return f64::NAN;
    }

    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exponent_end = end + 1;
        if exponent_end < bytes.len() && matches!(bytes[exponent_end], b'+' | b'-') {
            exponent_end += 1;
        }
        let exponent_digits = exponent_end;
        while exponent_end < bytes.len() && bytes[exponent_end].is_ascii_digit() {
            exponent_end += 1;
        }
        if exponent_end > exponent_digits {
            end = exponent_end;
        }
    }

    parse_number_str(&text[..end])
}

/// Integer prefix of `text` in `radix`, 0 meaning auto-detect
fn parse_int_prefix(text: &str, radix: i64) -> f64 {
    let text = text.trim_start();
    let (sign, mut rest) = match text.as_bytes().first() {
        Some(b'-') => (-1.0, &text[1..]),
        Some(b'+') => (1.0, &text[1..]),
        _ => (1.0, text),
    };

    let mut radix = radix;
    if radix == 0 || radix == 16 {
        if let Some(hex) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
            rest = hex;
            radix = 16;
        }
    }
    if radix == 0 {
        radix = 10;
    }
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }

    let mut result = 0.0;
    let mut seen_digit = false;
    for ch in rest.chars() {
        match ch.to_digit(radix as u32) {
            Some(digit) => {
                result = result * radix as f64 + f64::from(digit);
                seen_digit = true;
            }
            None => break,
        }
    }

    if seen_digit { sign * result } else { f64::NAN }
}
