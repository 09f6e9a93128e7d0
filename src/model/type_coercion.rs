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

//! Type coercion and comparison rules for script values

use super::value::ScriptValue;
use std::rc::Rc;
use thiserror::Error;

/// Result type for coercion operations
pub type CoercionResult<T> = Result<T, ValueError>;

/// Errors raised when a value cannot be converted
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValueError {
    /// The value has no representation in the target type
    #[error("Cannot convert {from} to {to}")]
    NotConvertible {
        /// Source kind
        from: &'static str,
        /// Target type
        to: &'static str,
    },

    /// The value has no host (JSON) representation
    #[error("Cannot export {kind} value")]
    NotExportable {
        /// Kind of the offending value
        kind: &'static str,
    },
}

/// Parse a string with the script language's ToNumber rules
///
/// Surrounding whitespace is ignored, the empty string is zero and anything
/// that is not a complete numeric literal is NaN.
pub fn parse_number_str(text: &str) -> f64 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }

    let (sign, unsigned) = match trimmed.as_bytes()[0] {
        b'-' => (-1.0, &trimmed[1..]),
        b'+' => (1.0, &trimmed[1..]),
        _ => (1.0, trimmed),
    };

    if unsigned == "Infinity" {
        return sign * f64::INFINITY;
    }
    if let Some(hex) = unsigned
        .strip_prefix("0x")
        .or_else(|| unsigned.strip_prefix("0X"))
    {
        return match i64::from_str_radix(hex, 16) {
            Ok(value) if trimmed == unsigned => value as f64,
            _ => f64::NAN,
        };
    }

    // Rust accepts "inf" and "nan" spellings that the script language does not
    let numeric = unsigned
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'));
    if !numeric {
        return f64::NAN;
    }

    unsigned
        .parse::<f64>()
        .map(|value| sign * value)
        .unwrap_or(f64::NAN)
}

/// Format a number the way the script language prints it
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }

    let magnitude = value.abs();
    if (1e-6..1e21).contains(&magnitude) {
        return format!("{value}");
    }

    let formatted = format!("{value:e}");
    match formatted.split_once('e') {
        Some((mantissa, exponent)) if !exponent.starts_with('-') => {
            format!("{mantissa}e+{exponent}")
        }
        _ => formatted,
    }
}

/// Identity comparison for reference values
pub fn same_reference(left: &ScriptValue, right: &ScriptValue) -> bool {
    match (left, right) {
        (ScriptValue::Array(a), ScriptValue::Array(b)) => Rc::ptr_eq(a, b),
        (ScriptValue::Object(a), ScriptValue::Object(b)) => Rc::ptr_eq(a, b),
        (ScriptValue::Function(a), ScriptValue::Function(b)) => Rc::ptr_eq(a, b),
        _ => false,
    }
}

/// `===`: same type and value, references compared by identity, NaN unequal to itself
pub fn strict_equals(left: &ScriptValue, right: &ScriptValue) -> bool {
    match (left, right) {
        (ScriptValue::Undefined, ScriptValue::Undefined) => true,
        (ScriptValue::Null, ScriptValue::Null) => true,
        (ScriptValue::Boolean(a), ScriptValue::Boolean(b)) => a == b,
        (ScriptValue::Number(a), ScriptValue::Number(b)) => a == b,
        (ScriptValue::String(a), ScriptValue::String(b)) => a == b,
        _ => same_reference(left, right),
    }
}

/// `==`: equality after the script language's implicit conversions
pub fn loose_equals(left: &ScriptValue, right: &ScriptValue) -> bool {
    use ScriptValue::*;

    match (left, right) {
        (Undefined | Null, Undefined | Null) => true,
        (Undefined | Null, _) | (_, Undefined | Null) => false,
        (Number(a), Number(b)) => a == b,
        (String(a), String(b)) => a == b,
        (Boolean(a), Boolean(b)) => a == b,
        (Number(_), String(_)) | (String(_), Number(_)) => left.to_float() == right.to_float(),
        (Boolean(_), _) => loose_equals(&Number(left.to_float()), right),
        (_, Boolean(_)) => loose_equals(left, &Number(right.to_float())),
        _ if !left.is_primitive() && !right.is_primitive() => same_reference(left, right),
        _ if !left.is_primitive() => loose_equals(&left.to_primitive(), right),
        _ => loose_equals(left, &right.to_primitive()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_number_str() {
        assert_eq!(parse_number_str(" 42 "), 42.0);
        assert_eq!(parse_number_str("-1.5e2"), -150.0);
        assert_eq!(parse_number_str(""), 0.0);
        assert_eq!(parse_number_str("0x1F"), 31.0);
        assert_eq!(parse_number_str("-Infinity"), f64::NEG_INFINITY);
        assert!(parse_number_str("inf").is_nan());
        assert!(parse_number_str("12abc").is_nan());
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(4.0), "4");
        assert_eq!(format_number(9.09), "9.09");
        assert_eq!(format_number(-65.229), "-65.229");
        assert_eq!(format_number(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(format_number(1e21), "1e+21");
        assert_eq!(format_number(1.5e-7), "1.5e-7");
        assert_eq!(format_number(f64::NAN), "NaN");
    }

    #[test]
    fn test_loose_equality() {
        assert!(loose_equals(&ScriptValue::Null, &ScriptValue::Undefined));
        assert!(loose_equals(&ScriptValue::from(1.0), &ScriptValue::from("1")));
        assert!(loose_equals(&ScriptValue::from(true), &ScriptValue::from(1.0)));
        assert!(!loose_equals(&ScriptValue::from(0.0), &ScriptValue::Null));
        assert!(loose_equals(
            &ScriptValue::array(vec![ScriptValue::from(5.0)]),
            &ScriptValue::from(5.0)
        ));
    }

    #[test]
    fn test_strict_equality() {
        assert!(!strict_equals(&ScriptValue::from(1.0), &ScriptValue::from("1")));
        assert!(!strict_equals(
            &ScriptValue::from(f64::NAN),
            &ScriptValue::from(f64::NAN)
        ));
        let shared = ScriptValue::array(vec![]);
        assert!(strict_equals(&shared, &shared.clone()));
        assert!(!strict_equals(&shared, &ScriptValue::array(vec![])));
    }
}
