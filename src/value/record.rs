use std::cell::RefCell;

use indexmap::IndexMap;

use super::Value;

/// A named table of bindings produced by `load`.
#[derive(Debug)]
pub struct Module {
    pub name: String,
    bindings: RefCell<IndexMap<String, Value>>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bindings: RefCell::new(IndexMap::new()),
        }
    }

    pub fn with(self, key: impl Into<String>, value: Value) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.bindings.borrow().get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.bindings.borrow_mut().insert(key.into(), value);
    }

    pub fn repr(&self) -> String {
        format!("module(:{})", self.name)
    }
}

/// A named record of fields.
#[derive(Debug)]
pub struct Struct {
    pub name: String,
    fields: RefCell<IndexMap<String, Value>>,
}

impl Struct {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: RefCell::new(IndexMap::new()),
        }
    }

    pub fn with(self, key: impl Into<String>, value: Value) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.fields.borrow().get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.fields.borrow_mut().insert(key.into(), value);
    }

    pub fn len(&self) -> usize {
        self.fields.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.borrow().is_empty()
    }

    pub(super) fn write_repr(&self, out: &mut String, depth: usize) {
        out.push_str("[Struct ");
        out.push_str(&self.name);
        if depth > super::MAX_NESTING_DEPTH {
            out.push_str(" { ... }]");
            return;
        }
        out.push_str(" { ");
        let fields: Vec<(String, Value)> = self
            .fields
            .borrow()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        for (index, (key, value)) in fields.iter().enumerate() {
            if index > 0 {
                out.push_str(", ");
            }
            out.push(':');
            out.push_str(key);
            out.push_str(" ?= ");
            value.write_repr(out, depth + 1);
        }
        out.push_str(" }]");
    }
}
