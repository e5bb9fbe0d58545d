use std::{fmt, rc::Rc};

use crate::{
    ast::RoutineDecl,
    diagnostics::{Diagnostic, Position, RaelError, Source},
    runtime::Interpreter,
    scope::ScopeRef,
};

use super::{blame::Blame, number::Number, stack::Stack, string::RaelString, Value, ValueKind};

/// How many arguments a callable accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    pub min: usize,
    pub max: Option<usize>,
}

impl Arity {
    pub const fn exact(count: usize) -> Self {
        Self {
            min: count,
            max: Some(count),
        }
    }

    pub const fn range(min: usize, max: usize) -> Self {
        Self {
            min,
            max: Some(max),
        }
    }

    pub const fn at_least(min: usize) -> Self {
        Self { min, max: None }
    }

    pub fn check(&self, count: usize) -> Result<(), Blame> {
        if count < self.min {
            return Err(Blame::message("Too few arguments"));
        }
        match self.max {
            Some(max) if count > max => Err(Blame::message("Too many arguments")),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) if max == self.min => write!(f, "{}", self.min),
            Some(max) => write!(f, "{}-{}", self.min, max),
            None => write!(f, "{} or more", self.min),
        }
    }
}

/// An evaluated argument and where it was written.
#[derive(Debug, Clone)]
pub struct Argument {
    pub value: Value,
    pub position: Position,
}

/// The ordered `(value, position)` list handed to natives and methods.
#[derive(Debug)]
pub struct Arguments {
    source: Rc<Source>,
    items: Vec<Argument>,
}

impl Arguments {
    pub fn new(source: Rc<Source>, items: Vec<Argument>) -> Self {
        Self { source, items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.items.get(index).map(|argument| &argument.value)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.items.iter().map(|argument| &argument.value)
    }

    pub fn into_values(self) -> Vec<Value> {
        self.items
            .into_iter()
            .map(|argument| argument.value)
            .collect()
    }

    pub fn source(&self) -> &Rc<Source> {
        &self.source
    }

    /// Points `blame` at the argument written at `index`.
    pub fn locate(&self, index: usize, blame: Blame) -> Blame {
        if let Some(argument) = self.items.get(index) {
            blame.locate(&self.source, argument.position);
        }
        blame
    }

    pub fn blame(&self, index: usize, message: &str) -> Blame {
        self.locate(index, Blame::message(message))
    }

    pub fn number(&self, index: usize) -> Result<Number, Blame> {
        match self.get(index).map(Value::kind) {
            Some(ValueKind::Number(number)) => Ok(*number),
            _ => Err(self.blame(index, "Expected a number")),
        }
    }

    pub fn whole(&self, index: usize) -> Result<i64, Blame> {
        self.number(index)?
            .to_whole()
            .ok_or_else(|| self.blame(index, "Expected a whole number"))
    }

    pub fn string(&self, index: usize) -> Result<&RaelString, Blame> {
        match self.get(index).map(Value::kind) {
            Some(ValueKind::String(string)) => Ok(string),
            _ => Err(self.blame(index, "Expected a string")),
        }
    }
}

/// A native method in a type's method table.
pub struct Method<T: 'static> {
    pub name: &'static str,
    pub arity: Arity,
    pub function: fn(&T, &Arguments) -> Result<Value, Blame>,
}

impl<T> Method<T> {
    pub const fn new(
        name: &'static str,
        arity: Arity,
        function: fn(&T, &Arguments) -> Result<Value, Blame>,
    ) -> Self {
        Self {
            name,
            arity,
            function,
        }
    }
}

fn find<T>(table: &'static [Method<T>], name: &str) -> Option<&'static Method<T>> {
    table.iter().find(|method| method.name == name)
}

#[derive(Clone, Copy)]
pub enum MethodRef {
    Number(&'static Method<Number>),
    String(&'static Method<RaelString>),
    Stack(&'static Method<Stack>),
}

impl MethodRef {
    pub fn lookup(receiver: &Value, name: &str) -> Option<Self> {
        match receiver.kind() {
            ValueKind::Number(_) => find(&super::number::METHODS, name).map(MethodRef::Number),
            ValueKind::String(_) => find(&super::string::METHODS, name).map(MethodRef::String),
            ValueKind::Stack(_) => find(&super::stack::METHODS, name).map(MethodRef::Stack),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MethodRef::Number(method) => method.name,
            MethodRef::String(method) => method.name,
            MethodRef::Stack(method) => method.name,
        }
    }

    pub fn arity(self) -> Arity {
        match self {
            MethodRef::Number(method) => method.arity,
            MethodRef::String(method) => method.arity,
            MethodRef::Stack(method) => method.arity,
        }
    }
}

/// A method looked up on a value, ready to be called.
pub struct BoundMethod {
    pub receiver: Value,
    pub method: MethodRef,
}

impl BoundMethod {
    pub fn call(&self, args: &Arguments) -> Result<Value, Blame> {
        match (self.receiver.kind(), self.method) {
            (ValueKind::Number(number), MethodRef::Number(method)) => {
                (method.function)(number, args)
            }
            (ValueKind::String(string), MethodRef::String(method)) => {
                (method.function)(string, args)
            }
            (ValueKind::Stack(stack), MethodRef::Stack(method)) => (method.function)(stack, args),
            _ => Err(Blame::message("Call not possible on a non-callable")),
        }
    }

    pub fn repr(&self) -> String {
        format!(
            "[cfunc method '{}' for type '{}']",
            self.method.name(),
            self.receiver.value_type().name()
        )
    }
}

/// A user-defined closure. The scope is shared with the defining block.
pub struct Routine {
    pub decl: Rc<RoutineDecl>,
    pub scope: ScopeRef,
    pub source: Rc<Source>,
}

impl Routine {
    pub fn arity(&self) -> Arity {
        Arity::exact(self.decl.params.len())
    }

    pub fn repr(&self) -> String {
        let params: Vec<String> = self
            .decl
            .params
            .iter()
            .map(|param| format!(":{param}"))
            .collect();
        format!("routine({})", params.join(", "))
    }
}

impl fmt::Debug for Routine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Routine")
            .field("params", &self.decl.params)
            .finish()
    }
}

/// Failure of a native call: a catchable blame, or something that must
/// end the program (an exit request or a fatal diagnostic).
#[derive(Debug)]
pub enum CallError {
    Blame(Blame),
    Fatal(RaelError),
}

impl From<Blame> for CallError {
    fn from(blame: Blame) -> Self {
        CallError::Blame(blame)
    }
}

impl From<RaelError> for CallError {
    fn from(err: RaelError) -> Self {
        CallError::Fatal(err)
    }
}

impl From<Diagnostic> for CallError {
    fn from(diagnostic: Diagnostic) -> Self {
        CallError::Fatal(RaelError::Diagnostic(diagnostic))
    }
}

pub type CallResult = Result<Value, CallError>;

pub type NativeFn = fn(&mut Interpreter, &Arguments) -> CallResult;

pub struct NativeFunction {
    pub name: &'static str,
    pub arity: Arity,
    pub function: NativeFn,
}

impl NativeFunction {
    pub fn repr(&self) -> String {
        format!("[cfunc '{}' for {} arguments]", self.name, self.arity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_checks_both_bounds() {
        let arity = Arity::range(1, 2);
        assert!(arity.check(1).is_ok());
        assert_eq!(
            arity.check(0).unwrap_err().message_text().as_deref(),
            Some("Too few arguments")
        );
        assert_eq!(
            arity.check(3).unwrap_err().message_text().as_deref(),
            Some("Too many arguments")
        );
        assert!(Arity::at_least(0).check(100).is_ok());
    }

    #[test]
    fn arity_display_matches_native_repr() {
        assert_eq!(Arity::exact(1).to_string(), "1");
        assert_eq!(Arity::range(0, 1).to_string(), "0-1");
        assert_eq!(Arity::at_least(2).to_string(), "2 or more");
    }

    #[test]
    fn argument_blames_point_at_argument() {
        let source = Source::anonymous(":f(1, \"x\")");
        let args = Arguments::new(
            Rc::clone(&source),
            vec![
                Argument {
                    value: Value::int(1),
                    position: Position::new(3, 1, 4),
                },
                Argument {
                    value: Value::string("x"),
                    position: Position::new(6, 1, 7),
                },
            ],
        );
        assert!(args.whole(0).is_ok());
        let blame = args.number(1).unwrap_err();
        assert_eq!(
            blame.origin().map(|origin| origin.position),
            Some(Position::new(6, 1, 7))
        );
    }
}
