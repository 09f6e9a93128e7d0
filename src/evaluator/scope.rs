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

//! Lexical scopes

use super::error::{EvaluationError, EvaluationResult};
use crate::model::{Callable, ScriptValue};
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::rc::Rc;

/// Shared scope handle, captured by closures
pub type ScopeRef = Rc<Scope>;

/// A variable frame linked to its enclosing frame
///
/// The root frame holds the engine globals. Function calls push a child frame;
/// blocks do not.
#[derive(Debug, Default)]
pub struct Scope {
    vars: RefCell<FxHashMap<String, ScriptValue>>,
    parent: Option<ScopeRef>,
}

impl Scope {
    /// Create a root scope
    pub fn root() -> ScopeRef {
        Rc::new(Self::default())
    }

    /// Create a child of `parent`
    pub fn child(parent: &ScopeRef) -> ScopeRef {
        Rc::new(Self {
            vars: RefCell::new(FxHashMap::default()),
            parent: Some(Rc::clone(parent)),
        })
    }

    /// Find the nearest binding of `name`
    pub fn get(&self, name: &str) -> Option<ScriptValue> {
        if let Some(value) = self.vars.borrow().get(name) {
            return Some(value.clone());
        }
        self.parent.as_ref().and_then(|parent| parent.get(name))
    }

    /// Like [`Scope::get`], failing for undeclared names
    pub fn lookup(&self, name: &str) -> EvaluationResult<ScriptValue> {
        self.get(name)
            .ok_or_else(|| EvaluationError::reference(name))
    }

    /// Whether `name` is bound anywhere in the chain
    pub fn contains(&self, name: &str) -> bool {
        self.vars.borrow().contains_key(name)
            || self.parent.as_ref().is_some_and(|parent| parent.contains(name))
    }

    /// Whether `name` is bound in this frame itself
    pub fn has_own(&self, name: &str) -> bool {
        self.vars.borrow().contains_key(name)
    }

    /// Bind `name` in this frame
    pub fn declare(&self, name: impl Into<String>, value: ScriptValue) {
        self.vars.borrow_mut().insert(name.into(), value);
    }

    /// Drop every binding in this frame
    pub fn clear(&self) {
        // Values are dropped after the borrow ends
        let vars = std::mem::take(&mut *self.vars.borrow_mut());
        drop(vars);
    }

    /// Clear a finished call frame whose closures nothing else holds
    ///
    /// A function declared inside a call captures the frame it is bound in,
    /// which makes a reference cycle. Once the caller's handle, plus one per
    /// such closure, is all that keeps the frame alive, the frame is cleared
    /// so both sides can drop. Frames reachable any other way are left as is.
    pub fn release(frame: &ScopeRef) {
        let unreachable = {
            let vars = frame.vars.borrow();
            let mut captured: Vec<(&Rc<Callable>, usize)> = Vec::new();
            for value in vars.values() {
                let ScriptValue::Function(callable) = value else {
                    continue;
                };
                let Callable::Script { closure, .. } = callable.as_ref() else {
                    continue;
                };
                if !Rc::ptr_eq(closure, frame) {
                    continue;
                }
                match captured.iter_mut().find(|(seen, _)| Rc::ptr_eq(*seen, callable)) {
                    Some((_, bindings)) => *bindings += 1,
                    None => captured.push((callable, 1)),
                }
            }

            !captured.is_empty()
                && Rc::strong_count(frame) == 1 + captured.len()
                && captured
                    .iter()
                    .all(|(callable, bindings)| Rc::strong_count(callable) == *bindings)
        };

        if unreachable {
            log::trace!("releasing call frame with captured closures");
            frame.clear();
        }
    }

    /// Update the nearest binding, or create a global if there is none
    pub fn assign(&self, name: &str, value: ScriptValue) {
        if let Some(slot) = self.vars.borrow_mut().get_mut(name) {
            *slot = value;
            return;
        }
        match &self.parent {
            Some(parent) if parent.contains(name) => parent.assign(name, value),
            Some(parent) => parent.assign_global(name, value),
            None => self.declare(name, value),
        }
    }

    fn assign_global(&self, name: &str, value: ScriptValue) {
        match &self.parent {
            Some(parent) => parent.assign_global(name, value),
            None => self.declare(name, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::FunctionDefinition;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[test]
    fn test_lookup_walks_chain() {
        let root = Scope::root();
        root.declare("x", ScriptValue::from(1.0));
        let child = Scope::child(&root);

        assert_eq!(child.lookup("x").unwrap(), ScriptValue::from(1.0));
        assert_eq!(
            child.lookup("y"),
            Err(EvaluationError::Reference {
                name: "y".to_string()
            })
        );
    }

    #[test]
    fn test_assign_updates_nearest_binding() {
        let root = Scope::root();
        root.declare("x", ScriptValue::from(1.0));
        let child = Scope::child(&root);
        child.declare("x", ScriptValue::from(2.0));

        child.assign("x", ScriptValue::from(3.0));
        assert_eq!(child.get("x"), Some(ScriptValue::from(3.0)));
        assert_eq!(root.get("x"), Some(ScriptValue::from(1.0)));
    }

    fn capture(frame: &ScopeRef) -> ScriptValue {
        ScriptValue::Function(Rc::new(Callable::Script {
            definition: Arc::new(FunctionDefinition {
                name: Some("inner".to_string()),
                params: vec![],
                body: vec![],
            }),
            closure: Rc::clone(frame),
        }))
    }

    #[test]
    fn test_release_breaks_closure_cycle() {
        let root = Scope::root();
        let frame = Scope::child(&root);
        frame.declare("inner", capture(&frame));
        frame.declare("alias", frame.get("inner").unwrap());
        let weak = Rc::downgrade(&frame);

        Scope::release(&frame);
        drop(frame);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_release_keeps_escaping_closure() {
        let root = Scope::root();
        let frame = Scope::child(&root);
        frame.declare("count", ScriptValue::from(1.0));
        frame.declare("inner", capture(&frame));
        let escaped = frame.get("inner").unwrap();

        Scope::release(&frame);
        assert_eq!(frame.get("count"), Some(ScriptValue::from(1.0)));

        drop(escaped);
        frame.clear();
    }

    #[test]
    fn test_release_keeps_frame_with_nested_scope() {
        let root = Scope::root();
        let frame = Scope::child(&root);
        frame.declare("inner", capture(&frame));
        let nested = Scope::child(&frame);

        Scope::release(&frame);
        assert!(frame.has_own("inner"));

        drop(nested);
        frame.clear();
    }

    #[test]
    fn test_undeclared_assignment_creates_global() {
        let root = Scope::root();
        let inner = Scope::child(&Scope::child(&root));

        inner.assign("total", ScriptValue::from(5.0));
        assert_eq!(root.get("total"), Some(ScriptValue::from(5.0)));
    }
}
