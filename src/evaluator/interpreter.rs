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

//! Tree-walking interpreter for formula scripts

use super::cache::ProgramCache;
use super::error::{EvaluationError, EvaluationResult};
use super::globals::install_globals;
use super::scope::{Scope, ScopeRef};
use crate::ast::{
    AssignOperator, BinaryOperator, Expression, FunctionDefinition, LiteralValue,
    LogicalOperator, Program, Statement, UnaryOperator, UpdateOperator,
};
use crate::engine::{ScriptEngine, ScriptEngineFactory};
use crate::error::Result;
use crate::model::{Callable, NativeFunction, ScriptValue, loose_equals, strict_equals};
use crate::registry::CallArguments;
use indexmap::IndexMap;
use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

/// Default bound on nested function calls
pub const DEFAULT_MAX_CALL_DEPTH: usize = 256;

/// Bound on expression nesting within one function call
pub const MAX_EXPRESSION_DEPTH: usize = 512;

/// Largest array an index assignment may grow to
const MAX_ARRAY_LENGTH: usize = 1 << 24;

/// How a statement completed
#[derive(Debug)]
enum Flow {
    Normal(Option<ScriptValue>),
    Return(ScriptValue),
    Break,
    Continue,
}

/// An assignable location, with its object and key already evaluated
enum Reference {
    Name(String),
    Property(ScriptValue, String),
    Index(ScriptValue, ScriptValue),
}

/// Script engine executing parsed programs directly
pub struct Interpreter {
    globals: ScopeRef,
    cache: Arc<ProgramCache>,
    max_call_depth: usize,
    depth: Cell<usize>,
    nesting: Cell<usize>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Create an interpreter with a private program cache
    pub fn new() -> Self {
        Self::with_cache(Arc::new(ProgramCache::default()), DEFAULT_MAX_CALL_DEPTH)
    }

    /// Create an interpreter sharing `cache`
    pub fn with_cache(cache: Arc<ProgramCache>, max_call_depth: usize) -> Self {
        let globals = Scope::root();
        install_globals(&globals);
        Self {
            globals,
            cache,
            max_call_depth,
            depth: Cell::new(0),
            nesting: Cell::new(0),
        }
    }

    /// The global scope
    pub fn globals(&self) -> &ScopeRef {
        &self.globals
    }

    /// Evaluate a parsed program in the global scope, returning its completion value
    pub fn evaluate(&self, program: &Program) -> EvaluationResult<ScriptValue> {
        match self.execute_body(&program.body, &self.globals)? {
            Flow::Normal(value) => Ok(value.unwrap_or(ScriptValue::Undefined)),
            Flow::Return(_) => Err(EvaluationError::IllegalStatement { statement: "return" }),
            Flow::Break => Err(EvaluationError::IllegalStatement { statement: "break" }),
            Flow::Continue => Err(EvaluationError::IllegalStatement {
                statement: "continue",
            }),
        }
    }

    // Statements

    fn execute_body(&self, statements: &[Statement], scope: &ScopeRef) -> EvaluationResult<Flow> {
        self.hoist(statements, scope);
        self.execute_statements(statements, scope)
    }

    /// Bind function declarations and pre-declare `var` names in this frame
    fn hoist(&self, statements: &[Statement], scope: &ScopeRef) {
        for statement in statements {
            match statement {
                Statement::Function(definition) => {
                    if let Some(name) = &definition.name {
                        scope.declare(name.clone(), closure(definition, scope));
                    }
                }
                other => hoist_variables(other, scope),
            }
        }
    }

    fn execute_statements(
        &self,
        statements: &[Statement],
        scope: &ScopeRef,
    ) -> EvaluationResult<Flow> {
        let mut completion = None;
        for statement in statements {
            match self.execute_statement(statement, scope)? {
                Flow::Normal(Some(value)) => completion = Some(value),
                Flow::Normal(None) => {}
                abrupt => return Ok(abrupt),
            }
        }
        Ok(Flow::Normal(completion))
    }

    fn execute_statement(&self, statement: &Statement, scope: &ScopeRef) -> EvaluationResult<Flow> {
        match statement {
            Statement::Expression(expression) => {
                Ok(Flow::Normal(Some(self.evaluate_expression(expression, scope)?)))
            }
            Statement::Declaration(declarations) => self.execute_declaration(declarations, scope),
            Statement::Function(definition) => {
                if let Some(name) = &definition.name {
                    scope.declare(name.clone(), closure(definition, scope));
                }
                Ok(Flow::Normal(None))
            }
            Statement::Return(value) => {
                let value = match value {
                    Some(expression) => self.evaluate_expression(expression, scope)?,
                    None => ScriptValue::Undefined,
                };
                Ok(Flow::Return(value))
            }
            Statement::If {
                test,
                consequent,
                alternate,
            } => {
                if self.evaluate_expression(test, scope)?.to_boolean() {
                    self.execute_statement(consequent, scope)
                } else if let Some(alternate) = alternate {
                    self.execute_statement(alternate, scope)
                } else {
                    Ok(Flow::Normal(None))
                }
            }
            Statement::While { test, body } => self.execute_loop(None, Some(test), None, body, scope),
            Statement::For {
                init,
                test,
                update,
                body,
            } => self.execute_loop(init.as_deref(), test.as_ref(), update.as_ref(), body, scope),
            Statement::Block(statements) => self.execute_statements(statements, scope),
            Statement::Break => Ok(Flow::Break),
            Statement::Continue => Ok(Flow::Continue),
            Statement::Empty => Ok(Flow::Normal(None)),
        }
    }

    fn execute_declaration(
        &self,
        declarations: &[(String, Option<Expression>)],
        scope: &ScopeRef,
    ) -> EvaluationResult<Flow> {
        for (name, init) in declarations {
            match init {
                Some(expression) => {
                    let value = self.evaluate_expression(expression, scope)?;
                    scope.declare(name.clone(), value);
                }
                None if !scope.has_own(name) => scope.declare(name.clone(), ScriptValue::Undefined),
                None => {}
            }
        }
        Ok(Flow::Normal(None))
    }

    /// `while` and `for(;;)`; a missing test loops until `break` or `return`
    fn execute_loop(
        &self,
        init: Option<&Statement>,
        test: Option<&Expression>,
        update: Option<&Expression>,
        body: &Statement,
        scope: &ScopeRef,
    ) -> EvaluationResult<Flow> {
        if let Some(init) = init {
            self.execute_statement(init, scope)?;
        }
        let mut completion = None;
        loop {
            if let Some(test) = test {
                if !self.evaluate_expression(test, scope)?.to_boolean() {
                    break;
                }
            }
            match self.execute_statement(body, scope)? {
                Flow::Break => break,
                Flow::Continue => {}
                Flow::Normal(value) => completion = value.or(completion),
                flow @ Flow::Return(_) => return Ok(flow),
            }
            if let Some(update) = update {
                self.evaluate_expression(update, scope)?;
            }
        }
        Ok(Flow::Normal(completion))
    }

    // Expressions

    /// Evaluate one expression node
    ///
    /// Each arm delegates to its own method so that a level of nesting costs
    /// little stack.
    fn evaluate_expression(
        &self,
        expression: &Expression,
        scope: &ScopeRef,
    ) -> EvaluationResult<ScriptValue> {
        let nesting = self.nesting.get();
        if nesting >= MAX_EXPRESSION_DEPTH {
            return Err(EvaluationError::NestingTooDeep {
                limit: MAX_EXPRESSION_DEPTH,
            });
        }
        self.nesting.set(nesting + 1);

        let result = match expression {
            Expression::Literal(literal) => Ok(literal_value(literal)),
            Expression::Identifier(name) => scope.lookup(name),
            Expression::Array(elements) => {
                self.evaluate_list(elements, scope).map(ScriptValue::array)
            }
            Expression::Object(properties) => self.evaluate_object(properties, scope),
            Expression::Member { object, property } => {
                self.evaluate_member(object, property, scope)
            }
            Expression::Index { object, index } => self.evaluate_index(object, index, scope),
            Expression::Call { callee, arguments } => self.evaluate_call(callee, arguments, scope),
            Expression::Unary { op, operand } => self.evaluate_unary(*op, operand, scope),
            Expression::Binary { op, left, right } => {
                self.evaluate_binary(*op, left, right, scope)
            }
            Expression::Logical { op, left, right } => {
                self.evaluate_logical(*op, left, right, scope)
            }
            Expression::Conditional {
                test,
                consequent,
                alternate,
            } => self.evaluate_conditional(test, consequent, alternate, scope),
            Expression::Assign { op, target, value } => {
                self.evaluate_assignment(*op, target, value, scope)
            }
            Expression::Update { op, prefix, target } => {
                self.evaluate_update(*op, *prefix, target, scope)
            }
            Expression::Function(definition) => Ok(closure(definition, scope)),
        };

        self.nesting.set(nesting);
        result
    }

    fn evaluate_object(
        &self,
        properties: &[(String, Expression)],
        scope: &ScopeRef,
    ) -> EvaluationResult<ScriptValue> {
        let mut map = IndexMap::with_capacity(properties.len());
        for (key, value) in properties {
            let value = self.evaluate_expression(value, scope)?;
            map.insert(key.clone(), value);
        }
        Ok(ScriptValue::object(map))
    }

    fn evaluate_member(
        &self,
        object: &Expression,
        property: &str,
        scope: &ScopeRef,
    ) -> EvaluationResult<ScriptValue> {
        let object = self.evaluate_expression(object, scope)?;
        get_property(&object, property)
    }

    fn evaluate_index(
        &self,
        object: &Expression,
        index: &Expression,
        scope: &ScopeRef,
    ) -> EvaluationResult<ScriptValue> {
        let object = self.evaluate_expression(object, scope)?;
        let index = self.evaluate_expression(index, scope)?;
        get_indexed(&object, &index)
    }

    fn evaluate_binary(
        &self,
        op: BinaryOperator,
        left: &Expression,
        right: &Expression,
        scope: &ScopeRef,
    ) -> EvaluationResult<ScriptValue> {
        let left = self.evaluate_expression(left, scope)?;
        let right = self.evaluate_expression(right, scope)?;
        Ok(binary_operation(op, &left, &right))
    }

    fn evaluate_logical(
        &self,
        op: LogicalOperator,
        left: &Expression,
        right: &Expression,
        scope: &ScopeRef,
    ) -> EvaluationResult<ScriptValue> {
        let left = self.evaluate_expression(left, scope)?;
        let short_circuit = match op {
            LogicalOperator::And => !left.to_boolean(),
            LogicalOperator::Or => left.to_boolean(),
        };
        if short_circuit {
            Ok(left)
        } else {
            self.evaluate_expression(right, scope)
        }
    }

    fn evaluate_conditional(
        &self,
        test: &Expression,
        consequent: &Expression,
        alternate: &Expression,
        scope: &ScopeRef,
    ) -> EvaluationResult<ScriptValue> {
        if self.evaluate_expression(test, scope)?.to_boolean() {
            self.evaluate_expression(consequent, scope)
        } else {
            self.evaluate_expression(alternate, scope)
        }
    }

    fn evaluate_assignment(
        &self,
        op: AssignOperator,
        target: &Expression,
        value: &Expression,
        scope: &ScopeRef,
    ) -> EvaluationResult<ScriptValue> {
        let reference = self.resolve_reference(target, scope)?;
        let value = match op.binary_operator() {
            None => self.evaluate_expression(value, scope)?,
            Some(binary) => {
                let current = read_reference(&reference, scope)?;
                let operand = self.evaluate_expression(value, scope)?;
                binary_operation(binary, &current, &operand)
            }
        };
        write_reference(reference, value.clone(), scope)?;
        Ok(value)
    }

    fn evaluate_update(
        &self,
        op: UpdateOperator,
        prefix: bool,
        target: &Expression,
        scope: &ScopeRef,
    ) -> EvaluationResult<ScriptValue> {
        let reference = self.resolve_reference(target, scope)?;
        let old = read_reference(&reference, scope)?.to_float();
        let new = match op {
            UpdateOperator::Increment => old + 1.0,
            UpdateOperator::Decrement => old - 1.0,
        };
        write_reference(reference, ScriptValue::Number(new), scope)?;
        Ok(ScriptValue::Number(if prefix { new } else { old }))
    }

    fn evaluate_list(
        &self,
        expressions: &[Expression],
        scope: &ScopeRef,
    ) -> EvaluationResult<Vec<ScriptValue>> {
        expressions
            .iter()
            .map(|expression| self.evaluate_expression(expression, scope))
            .collect()
    }

    fn evaluate_unary(
        &self,
        op: UnaryOperator,
        operand: &Expression,
        scope: &ScopeRef,
    ) -> EvaluationResult<ScriptValue> {
        if let (UnaryOperator::TypeOf, Expression::Identifier(name)) = (op, operand) {
            let type_name = scope.get(name).map_or("undefined", |value| value.type_name());
            return Ok(ScriptValue::from(type_name));
        }

        let value = self.evaluate_expression(operand, scope)?;
        Ok(match op {
            UnaryOperator::Not => ScriptValue::Boolean(!value.to_boolean()),
            UnaryOperator::Minus => ScriptValue::Number(-value.to_float()),
            UnaryOperator::Plus => ScriptValue::Number(value.to_float()),
            UnaryOperator::TypeOf => ScriptValue::from(value.type_name()),
        })
    }

    fn evaluate_call(
        &self,
        callee: &Expression,
        arguments: &[Expression],
        scope: &ScopeRef,
    ) -> EvaluationResult<ScriptValue> {
        match callee {
            Expression::Member { object, property } => {
                let receiver = self.evaluate_expression(object, scope)?;
                let args = self.evaluate_list(arguments, scope)?;
                self.call_method(&receiver, property, args)
            }
            Expression::Index { object, index } => {
                let receiver = self.evaluate_expression(object, scope)?;
                let key = self.evaluate_expression(index, scope)?.to_display_string();
                let args = self.evaluate_list(arguments, scope)?;
                self.call_method(&receiver, &key, args)
            }
            _ => {
                let function = self.evaluate_expression(callee, scope)?;
                let args = self.evaluate_list(arguments, scope)?;
                match function {
                    ScriptValue::Function(callable) => self.call_function(&callable, args),
                    _ => Err(EvaluationError::NotCallable {
                        name: callee_name(callee),
                    }),
                }
            }
        }
    }

    fn call_method(
        &self,
        receiver: &ScriptValue,
        name: &str,
        args: Vec<ScriptValue>,
    ) -> EvaluationResult<ScriptValue> {
        let builtin = match receiver {
            ScriptValue::Array(_) => array_method(receiver, name, &args),
            ScriptValue::String(text) => string_method(text, name, &args),
            ScriptValue::Number(number) => number_method(*number, name, &args),
            _ => None,
        };
        if let Some(result) = builtin {
            return result;
        }

        match get_property(receiver, name)? {
            ScriptValue::Function(callable) => self.call_function(&callable, args),
            _ => Err(EvaluationError::NotCallable {
                name: name.to_string(),
            }),
        }
    }

    /// Invoke a callable, enforcing the call depth limit
    pub fn call_function(
        &self,
        callable: &Rc<Callable>,
        args: Vec<ScriptValue>,
    ) -> EvaluationResult<ScriptValue> {
        let depth = self.depth.get();
        if depth >= self.max_call_depth {
            return Err(EvaluationError::CallDepthExceeded {
                limit: self.max_call_depth,
            });
        }

        self.depth.set(depth + 1);
        let nesting = self.nesting.replace(0);
        let result = self.invoke(callable, args);
        self.nesting.set(nesting);
        self.depth.set(depth);
        result
    }

    fn invoke(&self, callable: &Callable, args: Vec<ScriptValue>) -> EvaluationResult<ScriptValue> {
        match callable {
            Callable::Native { name, function } => Ok(function.call(&CallArguments::new(name, &args))?),
            Callable::Script {
                definition,
                closure,
            } => {
                let frame = Scope::child(closure);
                for (index, param) in definition.params.iter().enumerate() {
                    let value = args.get(index).cloned().unwrap_or(ScriptValue::Undefined);
                    frame.declare(param.clone(), value);
                }
                frame.declare("arguments", ScriptValue::array(args));

                let result = match self.execute_body(&definition.body, &frame) {
                    Ok(Flow::Return(value)) => Ok(value),
                    Ok(Flow::Normal(_)) => Ok(ScriptValue::Undefined),
                    Ok(Flow::Break) => Err(EvaluationError::IllegalStatement { statement: "break" }),
                    Ok(Flow::Continue) => Err(EvaluationError::IllegalStatement {
                        statement: "continue",
                    }),
                    Err(error) => Err(error),
                };
                Scope::release(&frame);
                result
            }
        }
    }

    // References

    fn resolve_reference(
        &self,
        target: &Expression,
        scope: &ScopeRef,
    ) -> EvaluationResult<Reference> {
        match target {
            Expression::Identifier(name) => Ok(Reference::Name(name.clone())),
            Expression::Member { object, property } => {
                let object = self.evaluate_expression(object, scope)?;
                Ok(Reference::Property(object, property.clone()))
            }
            Expression::Index { object, index } => {
                let object = self.evaluate_expression(object, scope)?;
                let index = self.evaluate_expression(index, scope)?;
                Ok(Reference::Index(object, index))
            }
            _ => Err(EvaluationError::InvalidAssignmentTarget),
        }
    }
}

impl Drop for Interpreter {
    fn drop(&mut self) {
        // Global functions capture the global scope; break that cycle
        self.globals.clear();
    }
}

impl ScriptEngine for Interpreter {
    fn run(&mut self, script: &str) -> Result<ScriptValue> {
        let program = self.cache.get_or_parse(script)?;
        Ok(self.evaluate(&program)?)
    }

    fn get(&self, name: &str) -> Result<ScriptValue> {
        Ok(self.globals.get(name).unwrap_or(ScriptValue::Undefined))
    }

    fn set(&mut self, name: &str, value: ScriptValue) -> Result<()> {
        self.globals.declare(name, value);
        Ok(())
    }

    fn install_native(&mut self, name: &str, function: NativeFunction) -> Result<()> {
        self.globals.declare(name, ScriptValue::native(name, function));
        Ok(())
    }
}

/// Creates [`Interpreter`]s that share one program cache
#[derive(Debug)]
pub struct InterpreterFactory {
    cache: Arc<ProgramCache>,
    max_call_depth: usize,
    prelude: Option<Arc<Program>>,
}

impl Default for InterpreterFactory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CALL_DEPTH, 256)
    }
}

impl InterpreterFactory {
    /// Create a factory with the given call depth limit and cache size
    pub fn new(max_call_depth: usize, program_cache_size: usize) -> Self {
        Self {
            cache: Arc::new(ProgramCache::new(program_cache_size)),
            max_call_depth,
            prelude: None,
        }
    }

    /// Run `script` in every engine before handing it out
    ///
    /// The prelude is parsed once, here.
    pub fn with_prelude(mut self, script: &str) -> Result<Self> {
        self.prelude = Some(Arc::new(crate::parser::parse_program(script)?));
        Ok(self)
    }

    /// The cache shared by created engines
    pub fn cache(&self) -> &Arc<ProgramCache> {
        &self.cache
    }
}

impl ScriptEngineFactory for InterpreterFactory {
    fn create(&self) -> Result<Box<dyn ScriptEngine>> {
        let interpreter = Interpreter::with_cache(Arc::clone(&self.cache), self.max_call_depth);
        if let Some(prelude) = &self.prelude {
            interpreter.evaluate(prelude)?;
        }
        Ok(Box::new(interpreter))
    }
}

fn closure(definition: &Arc<FunctionDefinition>, scope: &ScopeRef) -> ScriptValue {
    ScriptValue::Function(Rc::new(Callable::Script {
        definition: Arc::clone(definition),
        closure: Rc::clone(scope),
    }))
}

fn hoist_variables(statement: &Statement, scope: &ScopeRef) {
    match statement {
        Statement::Declaration(declarations) => {
            for (name, _) in declarations {
                if !scope.has_own(name) {
                    scope.declare(name.clone(), ScriptValue::Undefined);
                }
            }
        }
        Statement::If {
            consequent,
            alternate,
            ..
        } => {
            hoist_variables(consequent, scope);
            if let Some(alternate) = alternate {
                hoist_variables(alternate, scope);
            }
        }
        Statement::While { body, .. } => hoist_variables(body, scope),
        Statement::For { init, body, .. } => {
            if let Some(init) = init {
                hoist_variables(init, scope);
            }
            hoist_variables(body, scope);
        }
        Statement::Block(statements) => {
            for statement in statements {
                hoist_variables(statement, scope);
            }
        }
        _ => {}
    }
}

fn literal_value(literal: &LiteralValue) -> ScriptValue {
    match literal {
        LiteralValue::Number(n) => ScriptValue::Number(*n),
        LiteralValue::String(s) => ScriptValue::string(s),
        LiteralValue::Boolean(b) => ScriptValue::Boolean(*b),
        LiteralValue::Null => ScriptValue::Null,
        LiteralValue::Undefined => ScriptValue::Undefined,
    }
}

fn callee_name(callee: &Expression) -> String {
    match callee {
        Expression::Identifier(name) => name.clone(),
        Expression::Function(definition) => definition
            .name
            .clone()
            .unwrap_or_else(|| "anonymous function".to_string()),
        _ => "expression".to_string(),
    }
}

fn binary_operation(op: BinaryOperator, left: &ScriptValue, right: &ScriptValue) -> ScriptValue {
    match op {
        BinaryOperator::Add => {
            let left = left.to_primitive();
            let right = right.to_primitive();
            if left.is_string() || right.is_string() {
                let mut text = left.to_display_string();
                text.push_str(&right.to_display_string());
                ScriptValue::from(text)
            } else {
                ScriptValue::Number(left.to_float() + right.to_float())
            }
        }
        BinaryOperator::Subtract => ScriptValue::Number(left.to_float() - right.to_float()),
        BinaryOperator::Multiply => ScriptValue::Number(left.to_float() * right.to_float()),
        BinaryOperator::Divide => ScriptValue::Number(left.to_float() / right.to_float()),
        BinaryOperator::Modulo => ScriptValue::Number(left.to_float() % right.to_float()),
        BinaryOperator::Equal => ScriptValue::Boolean(loose_equals(left, right)),
        BinaryOperator::NotEqual => ScriptValue::Boolean(!loose_equals(left, right)),
        BinaryOperator::StrictEqual => ScriptValue::Boolean(strict_equals(left, right)),
        BinaryOperator::StrictNotEqual => ScriptValue::Boolean(!strict_equals(left, right)),
        BinaryOperator::LessThan
        | BinaryOperator::LessThanOrEqual
        | BinaryOperator::GreaterThan
        | BinaryOperator::GreaterThanOrEqual => ScriptValue::Boolean(compare(op, left, right)),
    }
}

/// Relational comparison: strings lexicographically, everything else numerically
fn compare(op: BinaryOperator, left: &ScriptValue, right: &ScriptValue) -> bool {
    let left = left.to_primitive();
    let right = right.to_primitive();

    if let (ScriptValue::String(a), ScriptValue::String(b)) = (&left, &right) {
        return match op {
            BinaryOperator::LessThan => a < b,
            BinaryOperator::LessThanOrEqual => a <= b,
            BinaryOperator::GreaterThan => a > b,
            _ => a >= b,
        };
    }

    // Any comparison involving NaN is false
    let (a, b) = (left.to_float(), right.to_float());
    match op {
        BinaryOperator::LessThan => a < b,
        BinaryOperator::LessThanOrEqual => a <= b,
        BinaryOperator::GreaterThan => a > b,
        _ => a >= b,
    }
}

fn get_property(object: &ScriptValue, name: &str) -> EvaluationResult<ScriptValue> {
    match object {
        ScriptValue::Undefined | ScriptValue::Null => Err(EvaluationError::type_error(format!(
            "Cannot read property '{name}' of {}",
            object.kind()
        ))),
        ScriptValue::Object(properties) => Ok(properties
            .borrow()
            .get(name)
            .cloned()
            .unwrap_or(ScriptValue::Undefined)),
        ScriptValue::Array(items) => {
            if name == "length" {
                return Ok(ScriptValue::from(items.borrow().len() as f64));
            }
            Ok(array_index(name)
                .and_then(|index| items.borrow().get(index).cloned())
                .unwrap_or(ScriptValue::Undefined))
        }
        ScriptValue::String(text) => {
            if name == "length" {
                return Ok(ScriptValue::from(text.chars().count() as f64));
            }
            Ok(array_index(name)
                .and_then(|index| text.chars().nth(index))
                .map_or(ScriptValue::Undefined, |ch| ScriptValue::from(ch.to_string())))
        }
        ScriptValue::Function(callable) if name == "name" => Ok(ScriptValue::from(callable.name())),
        _ => Ok(ScriptValue::Undefined),
    }
}

fn get_indexed(object: &ScriptValue, index: &ScriptValue) -> EvaluationResult<ScriptValue> {
    if let (ScriptValue::Array(items), Some(position)) = (object, numeric_index(index)) {
        return Ok(items
            .borrow()
            .get(position)
            .cloned()
            .unwrap_or(ScriptValue::Undefined));
    }
    get_property(object, &index.to_display_string())
}

fn set_property(object: &ScriptValue, name: &str, value: ScriptValue) -> EvaluationResult<()> {
    match object {
        ScriptValue::Undefined | ScriptValue::Null => Err(EvaluationError::type_error(format!(
            "Cannot set property '{name}' of {}",
            object.kind()
        ))),
        ScriptValue::Object(properties) => {
            properties.borrow_mut().insert(name.to_string(), value);
            Ok(())
        }
        ScriptValue::Array(_) => match array_index(name) {
            Some(index) => set_element(object, index, value),
            None if name == "length" => {
                let length = numeric_index(&value)
                    .ok_or_else(|| EvaluationError::type_error("Invalid array length"))?;
                resize_array(object, length)
            }
            None => Err(EvaluationError::type_error(format!(
                "Cannot set property '{name}' of array"
            ))),
        },
        // Writes to primitives are silently dropped
        _ => Ok(()),
    }
}

fn set_indexed(object: &ScriptValue, index: &ScriptValue, value: ScriptValue) -> EvaluationResult<()> {
    if let (ScriptValue::Array(_), Some(position)) = (object, numeric_index(index)) {
        return set_element(object, position, value);
    }
    set_property(object, &index.to_display_string(), value)
}

fn set_element(array: &ScriptValue, index: usize, value: ScriptValue) -> EvaluationResult<()> {
    if index >= MAX_ARRAY_LENGTH {
        return Err(EvaluationError::type_error("Invalid array length"));
    }
    if let ScriptValue::Array(items) = array {
        let mut items = items.borrow_mut();
        if index >= items.len() {
            items.resize(index + 1, ScriptValue::Undefined);
        }
        items[index] = value;
    }
    Ok(())
}

fn resize_array(array: &ScriptValue, length: usize) -> EvaluationResult<()> {
    if length > MAX_ARRAY_LENGTH {
        return Err(EvaluationError::type_error("Invalid array length"));
    }
    if let ScriptValue::Array(items) = array {
        items.borrow_mut().resize(length, ScriptValue::Undefined);
    }
    Ok(())
}

fn read_reference(reference: &Reference, scope: &ScopeRef) -> EvaluationResult<ScriptValue> {
    match reference {
        Reference::Name(name) => scope.lookup(name),
        Reference::Property(object, name) => get_property(object, name),
        Reference::Index(object, index) => get_indexed(object, index),
    }
}

fn write_reference(reference: Reference, value: ScriptValue, scope: &ScopeRef) -> EvaluationResult<()> {
    match reference {
        Reference::Name(name) => {
            scope.assign(&name, value);
            Ok(())
        }
        Reference::Property(object, name) => set_property(&object, &name, value),
        Reference::Index(object, index) => set_indexed(&object, &index, value),
    }
}

/// A canonical non-negative integer property name such as `"3"`
fn array_index(name: &str) -> Option<usize> {
    if name.is_empty() || (name.len() > 1 && name.starts_with('0')) {
        return None;
    }
    if !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    name.parse().ok()
}

fn numeric_index(value: &ScriptValue) -> Option<usize> {
    match value {
        ScriptValue::Number(n) if *n >= 0.0 && n.fract() == 0.0 && n.is_finite() => {
            Some(*n as usize)
        }
        ScriptValue::String(s) => array_index(s),
        _ => None,
    }
}

/// Relative slice position: negative counts from the end
fn relative_position(value: Option<&ScriptValue>, length: usize, default: usize) -> usize {
    match value {
        None | Some(ScriptValue::Undefined) => default,
        Some(value) => {
            let position = value.to_float();
            if position.is_nan() {
                0
            } else if position < 0.0 {
                (length as f64 + position.trunc()).max(0.0) as usize
            } else {
                position.trunc().min(length as f64) as usize
            }
        }
    }
}

fn array_method(
    receiver: &ScriptValue,
    name: &str,
    args: &[ScriptValue],
) -> Option<EvaluationResult<ScriptValue>> {
    let ScriptValue::Array(items) = receiver else {
        return None;
    };

    let result = match name {
        "push" => {
            let mut items = items.borrow_mut();
            items.extend(args.iter().cloned());
            ScriptValue::from(items.len() as f64)
        }
        "pop" => items.borrow_mut().pop().unwrap_or(ScriptValue::Undefined),
        "join" => {
            let separator = match args.first() {
                None | Some(ScriptValue::Undefined) => ",".to_string(),
                Some(value) => value.to_display_string(),
            };
            let joined = items
                .borrow()
                .iter()
                .map(|item| match item {
                    ScriptValue::Undefined | ScriptValue::Null => String::new(),
                    other => other.to_display_string(),
                })
                .collect::<Vec<_>>()
                .join(&separator);
            ScriptValue::from(joined)
        }
        "indexOf" => {
            let needle = args.first().cloned().unwrap_or(ScriptValue::Undefined);
            let position = items
                .borrow()
                .iter()
                .position(|item| strict_equals(item, &needle));
            ScriptValue::from(position.map_or(-1.0, |p| p as f64))
        }
        "includes" => {
            let needle = args.first().cloned().unwrap_or(ScriptValue::Undefined);
            let found = items.borrow().iter().any(|item| {
                strict_equals(item, &needle) || (item.is_nan() && needle.is_nan())
            });
            ScriptValue::from(found)
        }
        "slice" => {
            let items = items.borrow();
            let start = relative_position(args.first(), items.len(), 0);
            let end = relative_position(args.get(1), items.len(), items.len());
            let slice = if start < end {
                items[start..end].to_vec()
            } else {
                Vec::new()
            };
            ScriptValue::array(slice)
        }
        _ => return None,
    };
    Some(Ok(result))
}

fn string_method(
    text: &str,
    name: &str,
    args: &[ScriptValue],
) -> Option<EvaluationResult<ScriptValue>> {
    let argument = |index: usize| {
        args.get(index)
            .map_or_else(|| "undefined".to_string(), ScriptValue::to_display_string)
    };

    let result = match name {
        "toUpperCase" => ScriptValue::from(text.to_uppercase()),
        "toLowerCase" => ScriptValue::from(text.to_lowercase()),
        "trim" => ScriptValue::from(text.trim()),
        "charAt" => {
            let index = args.first().map_or(0.0, ScriptValue::to_float);
            let ch = if index >= 0.0 {
                text.chars().nth(index as usize)
            } else {
                None
            };
            ScriptValue::from(ch.map(String::from).unwrap_or_default())
        }
        "indexOf" => {
            let needle = argument(0);
            let position = text
                .find(&needle)
                .map_or(-1.0, |byte| text[..byte].chars().count() as f64);
            ScriptValue::from(position)
        }
        "substring" => {
            let chars: Vec<char> = text.chars().collect();
            let clamp = |value: Option<&ScriptValue>, default: usize| match value {
                None | Some(ScriptValue::Undefined) => default,
                Some(value) => {
                    let position = value.to_float();
                    if position.is_nan() || position < 0.0 {
                        0
                    } else {
                        position.min(chars.len() as f64) as usize
                    }
                }
            };
            let start = clamp(args.first(), 0);
            let end = clamp(args.get(1), chars.len());
            let (start, end) = if start > end { (end, start) } else { (start, end) };
            ScriptValue::from(chars[start..end].iter().collect::<String>())
        }
        "split" => {
            let parts = match args.first() {
                None | Some(ScriptValue::Undefined) => vec![ScriptValue::from(text)],
                Some(separator) => {
                    let separator = separator.to_display_string();
                    if separator.is_empty() {
                        text.chars().map(|ch| ScriptValue::from(ch.to_string())).collect()
                    } else {
                        text.split(separator.as_str()).map(ScriptValue::from).collect()
                    }
                }
            };
            ScriptValue::array(parts)
        }
        _ => return None,
    };
    Some(Ok(result))
}

fn number_method(
    number: f64,
    name: &str,
    args: &[ScriptValue],
) -> Option<EvaluationResult<ScriptValue>> {
    match name {
        "toFixed" => {
            let digits = match args.first() {
                None | Some(ScriptValue::Undefined) => 0,
                Some(value) => match value.to_integer() {
                    Ok(digits @ 0..=100) => digits as usize,
                    _ => {
                        return Some(Err(EvaluationError::type_error(
                            "toFixed() digits argument must be between 0 and 100",
                        )));
                    }
                },
            };
            Some(Ok(ScriptValue::from(format!("{number:.digits$}"))))
        }
        "toString" => Some(Ok(ScriptValue::from(
            ScriptValue::Number(number).to_display_string(),
        ))),
        _ => None,
    }
}
