//! Core library for the Rael scripting language.
//! Covers lexing, backtracking parsing, the value model, lexical scopes,
//! the tree-walking evaluator and the built-in module registry.

pub mod ast;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod lexer;
pub mod logging;
pub mod parser;
pub mod runtime;
pub mod scope;
pub mod stdlib;
pub mod value;

pub use config::InterpreterConfig;
pub use diagnostics::{Diagnostic, DiagnosticKind, Position, RaelError, Source};
pub use runtime::{Interpreter, OutputBuffer};
pub use stdlib::ModuleRegistry;
pub use value::{Value, ValueKind, ValueType};
