use std::{cell::RefCell, mem, rc::Rc};

use indexmap::IndexMap;

use crate::value::Value;

pub type ScopeRef = Rc<RefCell<Scope>>;

/// A block of key bindings chained to its enclosing scope.
#[derive(Debug, Default)]
pub struct Scope {
    parent: Option<ScopeRef>,
    bindings: IndexMap<String, Value>,
}

impl Scope {
    pub fn root() -> ScopeRef {
        Rc::new(RefCell::new(Self::default()))
    }

    pub fn child(parent: &ScopeRef) -> ScopeRef {
        Rc::new(RefCell::new(Self {
            parent: Some(Rc::clone(parent)),
            bindings: IndexMap::new(),
        }))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Looks `key` up through the chain, innermost scope first.
    pub fn get(scope: &ScopeRef, key: &str) -> Option<Value> {
        let mut current = Rc::clone(scope);
        loop {
            let parent = {
                let borrowed = current.borrow();
                if let Some(value) = borrowed.bindings.get(key) {
                    return Some(value.clone());
                }
                borrowed.parent.clone()?
            };
            current = parent;
        }
    }

    /// Rebinds `key` in the nearest scope that already holds it, or binds
    /// it in `scope` itself.
    pub fn set(scope: &ScopeRef, key: &str, value: Value) {
        let mut current = Rc::clone(scope);
        loop {
            let parent = {
                let mut borrowed = current.borrow_mut();
                if let Some(slot) = borrowed.bindings.get_mut(key) {
                    *slot = value;
                    return;
                }
                borrowed.parent.clone()
            };
            match parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        Scope::set_local(scope, key, value);
    }

    /// Binds `key` in `scope`, shadowing any outer binding.
    pub fn set_local(scope: &ScopeRef, key: &str, value: Value) {
        scope.borrow_mut().bindings.insert(key.to_string(), value);
    }

    /// Drops every binding. Values are released after the borrow ends so
    /// that destructors may touch this scope again.
    pub fn clear(scope: &ScopeRef) {
        let bindings = mem::take(&mut scope.borrow_mut().bindings);
        drop(bindings);
    }
}
