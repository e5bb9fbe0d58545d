//! The tree-walking interpreter: instance management, teardown, and the
//! shared state the instruction and expression walkers run against.

use std::{
    cell::RefCell,
    io::{self, BufRead, Write},
    mem,
    rc::{Rc, Weak},
};

use crate::{
    ast::{Expr, Program},
    config::InterpreterConfig,
    diagnostics::{Result, Source},
    parser,
    scope::{Scope, ScopeRef},
    stdlib::ModuleRegistry,
    value::{Blame, Value},
};

mod eval;
mod exec;

const PRUNE_THRESHOLD: usize = 128;

/// Pending unwinding requested by `break`, `skip` or `^`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    Break,
    Skip,
    Return,
}

/// What an instance executes.
pub enum InstanceBody {
    Program(Program),
    Expression(Expr),
}

/// A parsed program or expression bound to its source and scope.
pub struct Instance {
    pub source: Rc<Source>,
    pub scope: ScopeRef,
    pub body: InstanceBody,
}

/// Caller state saved while a nested instance runs.
struct Frame {
    source: Rc<Source>,
    scope: ScopeRef,
    interrupt: Option<Interrupt>,
    returned: Option<Value>,
    capture_base: usize,
}

/// A `Write` sink that can be inspected after the interpreter is done.
#[derive(Debug, Clone, Default)]
pub struct OutputBuffer(Rc<RefCell<Vec<u8>>>);

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for OutputBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub struct Interpreter {
    config: InterpreterConfig,
    modules: ModuleRegistry,
    output: Box<dyn Write>,
    input: Box<dyn BufRead>,
    source: Rc<Source>,
    scope: ScopeRef,
    interrupt: Option<Interrupt>,
    returned: Option<Value>,
    captured: Vec<Weak<RefCell<Scope>>>,
    capture_base: usize,
    prune_at: usize,
    depth: usize,
}

impl Interpreter {
    pub fn new(config: InterpreterConfig) -> Self {
        Self::with_io(
            config,
            Box::new(io::stdout()),
            Box::new(io::BufReader::new(io::stdin())),
        )
    }

    pub fn with_io(
        config: InterpreterConfig,
        output: Box<dyn Write>,
        input: Box<dyn BufRead>,
    ) -> Self {
        Self {
            config,
            modules: ModuleRegistry::with_defaults(),
            output,
            input,
            source: Source::anonymous(""),
            scope: Scope::root(),
            interrupt: None,
            returned: None,
            captured: Vec::new(),
            capture_base: 0,
            prune_at: PRUNE_THRESHOLD,
            depth: 0,
        }
    }

    pub fn with_modules(mut self, modules: ModuleRegistry) -> Self {
        self.modules = modules;
        self
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    pub fn source(&self) -> &Rc<Source> {
        &self.source
    }

    pub fn scope(&self) -> &ScopeRef {
        &self.scope
    }

    /// Parses and runs a whole program in a fresh root scope.
    pub fn run_source(&mut self, source: Rc<Source>) -> Result<()> {
        let program = parser::parse_program(Rc::clone(&source))?;
        let result = self.run_program(source, program);
        self.output.flush()?;
        result
    }

    pub fn run_str(&mut self, code: &str) -> Result<()> {
        let source = match &self.config.filename {
            Some(name) => Source::named(name.clone(), code),
            None => Source::anonymous(code),
        };
        self.run_source(source)
    }

    /// Runs `program` in a fresh root scope, then releases every scope it
    /// created, whether it finished normally or not.
    pub fn run_program(&mut self, source: Rc<Source>, program: Program) -> Result<()> {
        let root = self.fresh_root();
        let base = self.captured.len();
        let result = self.execute_instance(Instance {
            source,
            scope: Rc::clone(&root),
            body: InstanceBody::Program(program),
        });
        self.release_scopes(base, &root);
        result.map(drop)
    }

    /// Evaluates an expression in the current scope without exploding a
    /// blame result.
    pub fn eval_in_current_scope(&mut self, source: Rc<Source>) -> Result<Value> {
        let expr = parser::parse_expression(Rc::clone(&source))?;
        let scope = Rc::clone(&self.scope);
        self.execute_instance(Instance {
            source,
            scope,
            body: InstanceBody::Expression(expr),
        })
    }

    pub fn execute_instance(&mut self, instance: Instance) -> Result<Value> {
        tracing::debug!(
            source = instance.source.display_name(),
            depth = self.depth,
            "entering instance"
        );
        let frame = self.enter(Rc::clone(&instance.source), Rc::clone(&instance.scope));
        let result = match &instance.body {
            InstanceBody::Program(program) => self
                .execute_block(&program.instructions)
                .map(|()| Value::void()),
            InstanceBody::Expression(expr) => self.eval(expr, false),
        };
        self.leave(frame);
        result
    }

    fn enter(&mut self, source: Rc<Source>, scope: ScopeRef) -> Frame {
        self.depth += 1;
        Frame {
            source: mem::replace(&mut self.source, source),
            scope: mem::replace(&mut self.scope, scope),
            interrupt: self.interrupt.take(),
            returned: self.returned.take(),
            capture_base: mem::replace(&mut self.capture_base, self.captured.len()),
        }
    }

    fn leave(&mut self, frame: Frame) {
        self.depth -= 1;
        self.source = frame.source;
        self.scope = frame.scope;
        self.interrupt = frame.interrupt;
        self.returned = frame.returned;
        self.capture_base = frame.capture_base;
    }

    /// A root scope holding `_Argv` and `_Filename`.
    fn fresh_root(&self) -> ScopeRef {
        let root = Scope::root();
        let argv = self
            .config
            .program_args
            .iter()
            .map(|arg| Value::string(arg.as_str()))
            .collect();
        Scope::set_local(&root, "_Argv", Value::stack(argv));
        let filename = match &self.config.filename {
            Some(name) => Value::string(name.as_str()),
            None => Value::void(),
        };
        Scope::set_local(&root, "_Filename", filename);
        root
    }

    /// Remembers a scope captured by a routine so teardown can break the
    /// routine/scope cycle.
    fn track_scope(&mut self, scope: &ScopeRef) {
        let already = self
            .captured
            .last()
            .is_some_and(|last| last.as_ptr() == Rc::as_ptr(scope));
        if already {
            return;
        }
        self.captured.push(Rc::downgrade(scope));

        let tracked = self.captured.len() - self.capture_base;
        if tracked >= self.prune_at {
            let mut own = self.captured.split_off(self.capture_base);
            own.retain(|scope| scope.strong_count() > 0);
            self.prune_at = (own.len() * 2).max(PRUNE_THRESHOLD);
            self.captured.extend(own);
        }
    }

    /// Clears every scope captured since `base`, innermost first, then `root`.
    fn release_scopes(&mut self, base: usize, root: &ScopeRef) {
        let captured = self.captured.split_off(base.min(self.captured.len()));
        tracing::trace!(scopes = captured.len(), "releasing captured scopes");
        for scope in captured.iter().rev().filter_map(Weak::upgrade) {
            Scope::clear(&scope);
        }
        Scope::clear(root);
    }

    fn write_output(&mut self, bytes: &[u8]) -> Result<()> {
        self.output.write_all(bytes)?;
        Ok(())
    }

    /// Reads one line from the input, without its line terminator.
    fn read_line(&mut self) -> Result<Option<String>> {
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        Ok(Some(line))
    }

    fn warn_undefined(&self, key: &str) {
        if self.config.warn_undefined {
            eprintln!("Warning: Tried to get the value of undefined key ':{key}'");
        }
    }

    /// Turns a blame that reached a consumption point into a fatal error.
    fn explode(&self, blame: &Blame) -> crate::diagnostics::RaelError {
        let diagnostic = blame.to_diagnostic();
        tracing::debug!(message = %diagnostic.message, "blame exploded");
        diagnostic.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(code: &str) -> (Result<()>, String) {
        let output = OutputBuffer::new();
        let mut interpreter = Interpreter::with_io(
            InterpreterConfig::default(),
            Box::new(output.clone()),
            Box::new(io::empty()),
        );
        let result = interpreter.run_str(code);
        (result, output.contents())
    }

    #[test]
    fn injected_names_are_visible() {
        let (result, output) = run("log sizeof :_Argv, :_Filename");
        assert!(result.is_ok());
        assert_eq!(output, "0 Void\n");
    }

    #[test]
    fn nested_frames_restore_the_caller() {
        let output = OutputBuffer::new();
        let mut interpreter = Interpreter::with_io(
            InterpreterConfig::default(),
            Box::new(output.clone()),
            Box::new(io::empty()),
        );
        let outer = Rc::clone(interpreter.scope());
        Scope::set_local(&outer, "a", Value::int(4));
        let value = interpreter
            .eval_in_current_scope(Source::anonymous(":a * 2"))
            .unwrap();
        assert_eq!(value.repr(), "8");
        assert!(Rc::ptr_eq(interpreter.scope(), &outer));
        assert_eq!(interpreter.depth, 0);
    }

    #[test]
    fn teardown_breaks_routine_cycles() {
        let output = OutputBuffer::new();
        let mut interpreter = Interpreter::with_io(
            InterpreterConfig::default(),
            Box::new(output.clone()),
            Box::new(io::empty()),
        );
        let result = interpreter.run_str(":f ?= routine() { ^1 }\nlog :f()");
        assert!(result.is_ok());
        assert!(interpreter.captured.is_empty());
        assert_eq!(output.contents(), "1\n");
    }
}
