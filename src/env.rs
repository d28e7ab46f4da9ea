// ABOUTME: Scope chains for variable bindings with late-bound closure capture

use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// A frame in the scope chain. Closures capture a pointer to their defining
/// frame rather than a snapshot, so lookups at invocation time see the
/// current bindings.
#[derive(Debug)]
pub struct Scope {
    bindings: RefCell<HashMap<String, Value>>,
    parent: Option<Rc<Scope>>,
}

impl Scope {
    /// Creates a new root scope with no parent
    pub fn new() -> Rc<Self> {
        Rc::new(Scope {
            bindings: RefCell::new(HashMap::new()),
            parent: None,
        })
    }

    /// Creates a new child scope with a parent
    pub fn with_parent(parent: Rc<Scope>) -> Rc<Self> {
        Rc::new(Scope {
            bindings: RefCell::new(HashMap::new()),
            parent: Some(parent),
        })
    }

    /// Defines a binding in THIS frame (doesn't walk the parent chain).
    /// Used for `$`, `$@`, and closure parameters.
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.bindings.borrow_mut().insert(name.into(), value);
    }

    /// Looks up a name in this frame and parent frames, innermost first.
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.bindings.borrow().get(name) {
            return Some(value.clone());
        }
        if let Some(ref parent) = self.parent {
            return parent.get(name);
        }
        None
    }

    /// Capture assignment (`:>` / `=>`). Updates the frame where the name is
    /// already bound so captured closures and later iterations observe the
    /// new value; defines in the current frame otherwise.
    pub fn assign(&self, name: &str, value: Value) {
        if self.bindings.borrow().contains_key(name) {
            self.bindings.borrow_mut().insert(name.to_string(), value);
            return;
        }
        if let Some(ref parent) = self.parent {
            if parent.update(name, &value) {
                return;
            }
        }
        self.bindings.borrow_mut().insert(name.to_string(), value);
    }

    fn update(&self, name: &str, value: &Value) -> bool {
        if self.bindings.borrow().contains_key(name) {
            self.bindings
                .borrow_mut()
                .insert(name.to_string(), value.clone());
            return true;
        }
        if let Some(ref parent) = self.parent {
            return parent.update(name, value);
        }
        false
    }
}
