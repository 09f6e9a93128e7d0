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

//! Value types for script evaluation

use super::type_coercion::{CoercionResult, ValueError, format_number, parse_number_str};
use crate::ast::FunctionDefinition;
use crate::evaluator::ScopeRef;
use crate::registry::{CallArguments, FunctionResult};
use indexmap::IndexMap;
use serde_json::{Map, Number, Value};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

/// Shared, mutable array storage
pub type ArrayRef = Rc<RefCell<Vec<ScriptValue>>>;

/// Shared, mutable object storage preserving insertion order
pub type ObjectRef = Rc<RefCell<IndexMap<String, ScriptValue>>>;

/// 2^53, the largest magnitude at which every integer is exactly representable
const MAX_SAFE_MAGNITUDE: f64 = 9_007_199_254_740_992.0;

/// Deepest array/object nesting walked by export and string conversion
const MAX_NESTING_DEPTH: usize = 128;

/// A value produced or consumed by a script
///
/// Arrays, objects and functions are reference values: cloning shares the
/// underlying storage, the way assignment does inside a script.
#[derive(Clone)]
pub enum ScriptValue {
    /// Absence of a value
    Undefined,
    /// Explicit null
    Null,
    /// Boolean value
    Boolean(bool),
    /// IEEE-754 double
    Number(f64),
    /// Immutable string
    String(Rc<str>),
    /// Array reference
    Array(ArrayRef),
    /// Object reference
    Object(ObjectRef),
    /// Callable reference
    Function(Rc<Callable>),
}

/// Something a script can call
pub enum Callable {
    /// Function defined in script source, closing over its defining scope
    Script {
        /// Parsed definition
        definition: Arc<FunctionDefinition>,
        /// Scope captured at definition time
        closure: ScopeRef,
    },
    /// Host function installed into the engine
    Native {
        /// Name used in diagnostics
        name: String,
        /// Host handler
        function: NativeFunction,
    },
}

impl Callable {
    /// Name of the callable, `"anonymous"` when it has none
    pub fn name(&self) -> &str {
        match self {
            Callable::Script { definition, .. } => {
                definition.name.as_deref().unwrap_or("anonymous")
            }
            Callable::Native { name, .. } => name,
        }
    }
}

/// Host function callable from scripts
#[derive(Clone)]
pub struct NativeFunction(Rc<dyn Fn(&CallArguments<'_>) -> FunctionResult<ScriptValue>>);

impl NativeFunction {
    /// Wrap a host closure
    pub fn new<F>(function: F) -> Self
    where
        F: Fn(&CallArguments<'_>) -> FunctionResult<ScriptValue> + 'static,
    {
        Self(Rc::new(function))
    }

    /// Invoke the handler
    pub fn call(&self, args: &CallArguments<'_>) -> FunctionResult<ScriptValue> {
        (self.0)(args)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NativeFunction")
    }
}

impl ScriptValue {
    /// Create a string value
    pub fn string(value: impl AsRef<str>) -> Self {
        ScriptValue::String(Rc::from(value.as_ref()))
    }

    /// Create an array value
    pub fn array(items: Vec<ScriptValue>) -> Self {
        ScriptValue::Array(Rc::new(RefCell::new(items)))
    }

    /// Create an object value
    pub fn object(properties: IndexMap<String, ScriptValue>) -> Self {
        ScriptValue::Object(Rc::new(RefCell::new(properties)))
    }

    /// Create an empty object value
    pub fn empty_object() -> Self {
        Self::object(IndexMap::new())
    }

    /// Create a native function value
    pub fn native(name: impl Into<String>, function: NativeFunction) -> Self {
        ScriptValue::Function(Rc::new(Callable::Native {
            name: name.into(),
            function,
        }))
    }

    /// Result of the `typeof` operator
    pub fn type_name(&self) -> &'static str {
        match self {
            ScriptValue::Undefined => "undefined",
            ScriptValue::Boolean(_) => "boolean",
            ScriptValue::Number(_) => "number",
            ScriptValue::String(_) => "string",
            ScriptValue::Function(_) => "function",
            ScriptValue::Null | ScriptValue::Array(_) | ScriptValue::Object(_) => "object",
        }
    }

    /// Finer-grained kind used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            ScriptValue::Null => "null",
            ScriptValue::Array(_) => "array",
            other => other.type_name(),
        }
    }

    /// Anything but undefined
    pub fn is_defined(&self) -> bool {
        !self.is_undefined()
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, ScriptValue::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ScriptValue::Null)
    }

    /// Not a reference value
    pub fn is_primitive(&self) -> bool {
        !matches!(
            self,
            ScriptValue::Array(_) | ScriptValue::Object(_) | ScriptValue::Function(_)
        )
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, ScriptValue::Boolean(_))
    }

    pub fn is_number(&self) -> bool {
        matches!(self, ScriptValue::Number(_))
    }

    /// A number holding NaN
    pub fn is_nan(&self) -> bool {
        matches!(self, ScriptValue::Number(n) if n.is_nan())
    }

    pub fn is_string(&self) -> bool {
        matches!(self, ScriptValue::String(_))
    }

    /// Arrays, objects and functions
    pub fn is_object(&self) -> bool {
        !self.is_primitive()
    }

    pub fn is_array(&self) -> bool {
        matches!(self, ScriptValue::Array(_))
    }

    pub fn is_function(&self) -> bool {
        matches!(self, ScriptValue::Function(_))
    }

    /// Truthiness
    pub fn to_boolean(&self) -> bool {
        match self {
            ScriptValue::Undefined | ScriptValue::Null => false,
            ScriptValue::Boolean(b) => *b,
            ScriptValue::Number(n) => !(*n == 0.0 || n.is_nan()),
            ScriptValue::String(s) => !s.is_empty(),
            ScriptValue::Array(_) | ScriptValue::Object(_) | ScriptValue::Function(_) => true,
        }
    }

    /// Numeric conversion, NaN when there is no sensible number
    pub fn to_float(&self) -> f64 {
        match self {
            ScriptValue::Undefined => f64::NAN,
            ScriptValue::Null => 0.0,
            ScriptValue::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            ScriptValue::Number(n) => *n,
            ScriptValue::String(s) => parse_number_str(s),
            ScriptValue::Array(_) => parse_number_str(&self.to_display_string()),
            ScriptValue::Object(_) | ScriptValue::Function(_) => f64::NAN,
        }
    }

    /// Integer conversion truncating toward zero
    pub fn to_integer(&self) -> CoercionResult<i64> {
        let value = self.to_float();
        if !value.is_finite() {
            return Err(ValueError::NotConvertible {
                from: self.kind(),
                to: "integer",
            });
        }
        Ok(value.trunc() as i64)
    }

    /// String conversion as performed by concatenation
    ///
    /// An array reached again while it is being joined contributes an empty
    /// string.
    pub fn to_display_string(&self) -> String {
        self.display_within(&mut Vec::new())
    }

    fn display_within(&self, path: &mut Vec<*const ()>) -> String {
        match self {
            ScriptValue::Undefined => "undefined".to_string(),
            ScriptValue::Null => "null".to_string(),
            ScriptValue::Boolean(b) => b.to_string(),
            ScriptValue::Number(n) => format_number(*n),
            ScriptValue::String(s) => s.to_string(),
            ScriptValue::Array(items) => {
                let id = Rc::as_ptr(items) as *const ();
                if path.contains(&id) || path.len() >= MAX_NESTING_DEPTH {
                    return String::new();
                }
                path.push(id);
                let joined = items
                    .borrow()
                    .iter()
                    .map(|item| match item {
                        ScriptValue::Undefined | ScriptValue::Null => String::new(),
                        other => other.display_within(path),
                    })
                    .collect::<Vec<_>>()
                    .join(",");
                path.pop();
                joined
            }
            ScriptValue::Object(_) => "[object Object]".to_string(),
            ScriptValue::Function(callable) => match callable.as_ref() {
                Callable::Script { definition, .. } => format!(
                    "function {}({}) {{ ... }}",
                    definition.name.as_deref().unwrap_or(""),
                    definition.params.join(", ")
                ),
                Callable::Native { name, .. } => {
                    format!("function {name}() {{ [native code] }}")
                }
            },
        }
    }

    /// Primitive form of a reference value, primitives unchanged
    pub fn to_primitive(&self) -> ScriptValue {
        if self.is_primitive() {
            self.clone()
        } else {
            ScriptValue::string(self.to_display_string())
        }
    }

    /// Convert to a host JSON value
    ///
    /// Undefined becomes null, integral numbers within the exactly representable
    /// range become JSON integers and non-finite numbers become null. Circular
    /// structures and nesting deeper than 128 levels cannot be exported.
    pub fn export(&self) -> CoercionResult<Value> {
        self.export_within(&mut Vec::new())
    }

    fn export_within(&self, path: &mut Vec<*const ()>) -> CoercionResult<Value> {
        let id = match self {
            ScriptValue::Undefined | ScriptValue::Null => return Ok(Value::Null),
            ScriptValue::Boolean(b) => return Ok(Value::Bool(*b)),
            ScriptValue::Number(n) => return Ok(export_number(*n)),
            ScriptValue::String(s) => return Ok(Value::String(s.to_string())),
            ScriptValue::Function(_) => {
                return Err(ValueError::NotExportable { kind: self.kind() });
            }
            ScriptValue::Array(items) => Rc::as_ptr(items) as *const (),
            ScriptValue::Object(properties) => Rc::as_ptr(properties) as *const (),
        };
        if path.contains(&id) {
            return Err(ValueError::NotExportable { kind: "circular" });
        }
        if path.len() >= MAX_NESTING_DEPTH {
            return Err(ValueError::NotExportable {
                kind: "deeply nested",
            });
        }

        path.push(id);
        let exported = match self {
            ScriptValue::Array(items) => items
                .borrow()
                .iter()
                .map(|item| item.export_within(path))
                .collect::<CoercionResult<Vec<_>>>()
                .map(Value::Array),
            ScriptValue::Object(properties) => properties
                .borrow()
                .iter()
                .map(|(key, value)| Ok((key.clone(), value.export_within(path)?)))
                .collect::<CoercionResult<Map<_, _>>>()
                .map(Value::Object),
            _ => Ok(Value::Null),
        };
        path.pop();
        exported
    }
}

fn export_number(value: f64) -> Value {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < MAX_SAFE_MAGNITUDE {
        // -0 exports as 0
        return Value::Number(Number::from(value as i64));
    }
    Number::from_f64(value).map_or(Value::Null, Value::Number)
}

/// Structural equality, used by host code and tests
///
/// The script operators use [`super::strict_equals`] and [`super::loose_equals`].
impl PartialEq for ScriptValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ScriptValue::Undefined, ScriptValue::Undefined) => true,
            (ScriptValue::Null, ScriptValue::Null) => true,
            (ScriptValue::Boolean(a), ScriptValue::Boolean(b)) => a == b,
            (ScriptValue::Number(a), ScriptValue::Number(b)) => a == b,
            (ScriptValue::String(a), ScriptValue::String(b)) => a == b,
            (ScriptValue::Array(a), ScriptValue::Array(b)) => {
                Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow()
            }
            (ScriptValue::Object(a), ScriptValue::Object(b)) => {
                Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow()
            }
            (ScriptValue::Function(a), ScriptValue::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for ScriptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}

impl fmt::Debug for ScriptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptValue::Undefined => write!(f, "Undefined"),
            ScriptValue::Null => write!(f, "Null"),
            ScriptValue::Boolean(b) => write!(f, "Boolean({b})"),
            ScriptValue::Number(n) => write!(f, "Number({n})"),
            ScriptValue::String(s) => write!(f, "String({s:?})"),
            ScriptValue::Array(items) => f.debug_list().entries(items.borrow().iter()).finish(),
            ScriptValue::Object(properties) => f
                .debug_map()
                .entries(properties.borrow().iter())
                .finish(),
            ScriptValue::Function(callable) => write!(f, "Function({})", callable.name()),
        }
    }
}

impl From<f64> for ScriptValue {
    fn from(value: f64) -> Self {
        ScriptValue::Number(value)
    }
}

impl From<i64> for ScriptValue {
    fn from(value: i64) -> Self {
        ScriptValue::Number(value as f64)
    }
}

impl From<i32> for ScriptValue {
    fn from(value: i32) -> Self {
        ScriptValue::Number(f64::from(value))
    }
}

impl From<bool> for ScriptValue {
    fn from(value: bool) -> Self {
        ScriptValue::Boolean(value)
    }
}

impl From<&str> for ScriptValue {
    fn from(value: &str) -> Self {
        ScriptValue::string(value)
    }
}

impl From<String> for ScriptValue {
    fn from(value: String) -> Self {
        ScriptValue::String(Rc::from(value))
    }
}

impl From<Vec<ScriptValue>> for ScriptValue {
    fn from(items: Vec<ScriptValue>) -> Self {
        ScriptValue::array(items)
    }
}

impl From<&Map<String, Value>> for ScriptValue {
    fn from(map: &Map<String, Value>) -> Self {
        ScriptValue::object(
            map.iter()
                .map(|(key, value)| (key.clone(), ScriptValue::from(value)))
                .collect(),
        )
    }
}

impl From<&Value> for ScriptValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => ScriptValue::Null,
            Value::Bool(b) => ScriptValue::Boolean(*b),
            Value::Number(n) => ScriptValue::Number(n.as_f64().unwrap_or(f64::NAN)),
            Value::String(s) => ScriptValue::string(s),
            Value::Array(items) => ScriptValue::array(items.iter().map(ScriptValue::from).collect()),
            Value::Object(map) => ScriptValue::from(map),
        }
    }
}

impl From<Value> for ScriptValue {
    fn from(value: Value) -> Self {
        ScriptValue::from(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(ScriptValue::Undefined, false)]
    #[case(ScriptValue::Null, false)]
    #[case(ScriptValue::from(0.0), false)]
    #[case(ScriptValue::from(f64::NAN), false)]
    #[case(ScriptValue::from(""), false)]
    #[case(ScriptValue::from("0"), true)]
    #[case(ScriptValue::from(-1.5), true)]
    #[case(ScriptValue::array(vec![]), true)]
    #[case(ScriptValue::empty_object(), true)]
    fn test_truthiness(#[case] value: ScriptValue, #[case] expected: bool) {
        assert_eq!(value.to_boolean(), expected);
    }

    #[rstest]
    #[case(ScriptValue::Null, 0.0)]
    #[case(ScriptValue::from(true), 1.0)]
    #[case(ScriptValue::from(" 12.5 "), 12.5)]
    #[case(ScriptValue::from(""), 0.0)]
    #[case(ScriptValue::array(vec![ScriptValue::from(7.0)]), 7.0)]
    #[case(ScriptValue::array(vec![]), 0.0)]
    fn test_to_float(#[case] value: ScriptValue, #[case] expected: f64) {
        assert_eq!(value.to_float(), expected);
    }

    #[test]
    fn test_to_float_nan() {
        assert!(ScriptValue::Undefined.to_float().is_nan());
        assert!(ScriptValue::from("abc").to_float().is_nan());
        assert!(ScriptValue::empty_object().to_float().is_nan());
    }

    #[test]
    fn test_to_integer() {
        assert_eq!(ScriptValue::from(12.9).to_integer(), Ok(12));
        assert_eq!(ScriptValue::from(-12.9).to_integer(), Ok(-12));
        assert_eq!(ScriptValue::from("3").to_integer(), Ok(3));
        assert_eq!(
            ScriptValue::Undefined.to_integer(),
            Err(ValueError::NotConvertible {
                from: "undefined",
                to: "integer"
            })
        );
        assert!(ScriptValue::from(f64::INFINITY).to_integer().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(ScriptValue::from(908910.0).to_string(), "908910");
        assert_eq!(ScriptValue::from(-0.0).to_string(), "0");
        assert_eq!(
            ScriptValue::array(vec![
                ScriptValue::from(1.0),
                ScriptValue::Null,
                ScriptValue::from("x")
            ])
            .to_string(),
            "1,,x"
        );
        assert_eq!(ScriptValue::empty_object().to_string(), "[object Object]");
    }

    #[test]
    fn test_type_names() {
        assert_eq!(ScriptValue::Null.type_name(), "object");
        assert_eq!(ScriptValue::Null.kind(), "null");
        assert_eq!(ScriptValue::array(vec![]).type_name(), "object");
        assert_eq!(ScriptValue::array(vec![]).kind(), "array");
        assert!(ScriptValue::array(vec![]).is_object());
    }

    #[test]
    fn test_export() {
        let value = ScriptValue::from(json!({
            "area": 78.5,
            "count": 3,
            "tags": ["a", null],
            "flag": true
        }));
        value_set(&value, "missing", ScriptValue::Undefined);

        assert_eq!(
            value.export().unwrap(),
            json!({
                "area": 78.5,
                "count": 3,
                "tags": ["a", null],
                "flag": true,
                "missing": null
            })
        );
        assert_eq!(ScriptValue::from(908910.0).export().unwrap(), json!(908910));
        assert_eq!(ScriptValue::from(f64::NAN).export().unwrap(), Value::Null);
    }

    #[test]
    fn test_export_function_fails() {
        let function = ScriptValue::native("f", NativeFunction::new(|_| Ok(ScriptValue::Null)));
        assert_eq!(
            function.export(),
            Err(ValueError::NotExportable { kind: "function" })
        );
    }

    #[test]
    fn test_export_circular_fails() {
        let object = ScriptValue::empty_object();
        value_set(&object, "me", object.clone());

        assert_eq!(
            object.export(),
            Err(ValueError::NotExportable { kind: "circular" })
        );
        value_set(&object, "me", ScriptValue::Null);
    }

    #[test]
    fn test_export_shared_reference_is_not_circular() {
        let shared = ScriptValue::array(vec![ScriptValue::from(1.0)]);
        let object = ScriptValue::empty_object();
        value_set(&object, "a", shared.clone());
        value_set(&object, "b", shared);

        assert_eq!(object.export().unwrap(), json!({"a": [1], "b": [1]}));
    }

    #[test]
    fn test_export_depth_is_bounded() {
        let mut value = ScriptValue::from(1.0);
        for _ in 0..200 {
            value = ScriptValue::array(vec![value]);
        }
        assert_eq!(
            value.export(),
            Err(ValueError::NotExportable {
                kind: "deeply nested"
            })
        );
    }

    #[test]
    fn test_display_circular_array() {
        let array = ScriptValue::array(vec![ScriptValue::from(1.0)]);
        if let ScriptValue::Array(items) = &array {
            items.borrow_mut().push(array.clone());
        }

        assert_eq!(array.to_display_string(), "1,");
        if let ScriptValue::Array(items) = &array {
            items.borrow_mut().clear();
        }
    }

    #[test]
    fn test_reference_semantics() {
        let original = ScriptValue::array(vec![]);
        let alias = original.clone();
        if let ScriptValue::Array(items) = &alias {
            items.borrow_mut().push(ScriptValue::from(1.0));
        }
        assert_eq!(original.to_string(), "1");
    }

    fn value_set(target: &ScriptValue, key: &str, value: ScriptValue) {
        if let ScriptValue::Object(properties) = target {
            properties.borrow_mut().insert(key.to_string(), value);
        }
    }
}
