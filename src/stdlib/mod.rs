//! Built-in modules made available through `load`.

use indexmap::IndexMap;

use crate::{runtime::Interpreter, value::Value};

mod math;
mod system;
mod time;
mod types;

/// Builds a module value for the running interpreter.
pub type ModuleConstructor = fn(&mut Interpreter) -> Value;

/// Name to constructor mapping consulted by `load`.
#[derive(Clone, Default)]
pub struct ModuleRegistry {
    constructors: IndexMap<&'static str, ModuleConstructor>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("Math", math::module);
        registry.register("Types", types::module);
        registry.register("Time", time::module);
        registry.register("System", system::module);
        registry
    }

    pub fn register(&mut self, name: &'static str, constructor: ModuleConstructor) {
        self.constructors.insert(name, constructor);
    }

    pub fn get(&self, name: &str) -> Option<ModuleConstructor> {
        self.constructors.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.constructors.keys().copied()
    }
}
