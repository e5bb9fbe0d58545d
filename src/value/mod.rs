use std::{fmt, rc::Rc};

pub mod blame;
pub mod callable;
pub mod number;
pub mod ops;
pub mod range;
pub mod record;
pub mod stack;
pub mod string;

pub use blame::{Blame, Origin};
pub use callable::{
    Argument, Arguments, Arity, BoundMethod, CallError, CallResult, Method, MethodRef,
    NativeFn, NativeFunction, Routine,
};
pub use number::Number;
pub use range::Range;
pub use record::{Module, Struct};
pub use stack::Stack;
pub use string::RaelString;

const MAX_NESTING_DEPTH: usize = 64;

thread_local! {
    static VOID: Value = Value::new(ValueKind::Void);
}

/// A reference-counted runtime value. Cloning shares the underlying value.
#[derive(Clone)]
pub struct Value(pub Rc<ValueKind>);

pub enum ValueKind {
    Void,
    Number(Number),
    String(RaelString),
    Stack(Stack),
    Range(Range),
    Routine(Routine),
    NativeFunction(NativeFunction),
    BoundMethod(BoundMethod),
    Blame(Blame),
    Module(Module),
    Type(ValueType),
    Struct(Struct),
}

/// Type descriptors, as returned by `typeof` and exported from `Types`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Void,
    Number,
    String,
    Stack,
    Range,
    Routine,
    NativeFunction,
    Blame,
    Module,
    Type,
    Struct,
}

impl ValueType {
    pub const ALL: [ValueType; 11] = [
        ValueType::Void,
        ValueType::Number,
        ValueType::String,
        ValueType::Stack,
        ValueType::Range,
        ValueType::Routine,
        ValueType::NativeFunction,
        ValueType::Blame,
        ValueType::Module,
        ValueType::Type,
        ValueType::Struct,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ValueType::Void => "Void",
            ValueType::Number => "Number",
            ValueType::String => "String",
            ValueType::Stack => "Stack",
            ValueType::Range => "Range",
            ValueType::Routine => "Routine",
            ValueType::NativeFunction => "NativeFunction",
            ValueType::Blame => "Blame",
            ValueType::Module => "Module",
            ValueType::Type => "Type",
            ValueType::Struct => "Struct",
        }
    }

    pub fn constructor_arity(self) -> Option<Arity> {
        match self {
            ValueType::Stack => Some(Arity::at_least(0)),
            ValueType::Range => Some(Arity::range(1, 2)),
            _ => None,
        }
    }

    /// Builds a value of this type from call arguments.
    pub fn construct(self, args: &Arguments) -> Result<Value, Blame> {
        let arity = self
            .constructor_arity()
            .ok_or_else(|| Blame::message("Tried to construct a non-constructable type"))?;
        arity.check(args.len())?;

        match self {
            ValueType::Range if args.len() == 1 => {
                let end = match args.get(0).map(Value::kind) {
                    Some(ValueKind::Number(number)) => number
                        .to_whole()
                        .ok_or_else(|| args.blame(0, "Expected a whole number"))?,
                    _ => return Err(args.blame(0, "Expected number")),
                };
                Ok(Value::range(Range::new(0, end)))
            }
            ValueType::Range => {
                let start = args.whole(0)?;
                let end = args.whole(1)?;
                Ok(Value::range(Range::new(start, end)))
            }
            _ => Ok(Value::stack(args.values().cloned().collect())),
        }
    }
}

impl Value {
    pub fn new(kind: ValueKind) -> Self {
        Self(Rc::new(kind))
    }

    pub fn void() -> Self {
        VOID.with(Value::clone)
    }

    pub fn int(value: i64) -> Self {
        Self::number(Number::Int(value))
    }

    pub fn float(value: f64) -> Self {
        Self::number(Number::Float(value))
    }

    pub fn number(value: Number) -> Self {
        Self::new(ValueKind::Number(value))
    }

    /// Numeric truth value: 1 or 0.
    pub fn bool(value: bool) -> Self {
        Self::int(i64::from(value))
    }

    pub fn string(value: impl Into<RaelString>) -> Self {
        Self::new(ValueKind::String(value.into()))
    }

    pub fn stack(items: Vec<Value>) -> Self {
        Self::new(ValueKind::Stack(Stack::new(items)))
    }

    pub fn range(range: Range) -> Self {
        Self::new(ValueKind::Range(range))
    }

    pub fn native(name: &'static str, arity: Arity, function: NativeFn) -> Self {
        Self::new(ValueKind::NativeFunction(NativeFunction {
            name,
            arity,
            function,
        }))
    }

    pub fn type_value(value_type: ValueType) -> Self {
        Self::new(ValueKind::Type(value_type))
    }

    pub fn kind(&self) -> &ValueKind {
        &self.0
    }

    pub fn is_void(&self) -> bool {
        matches!(self.kind(), ValueKind::Void)
    }

    pub fn as_blame(&self) -> Option<&Blame> {
        match self.kind() {
            ValueKind::Blame(blame) => Some(blame),
            _ => None,
        }
    }

    pub fn value_type(&self) -> ValueType {
        match self.kind() {
            ValueKind::Void => ValueType::Void,
            ValueKind::Number(_) => ValueType::Number,
            ValueKind::String(_) => ValueType::String,
            ValueKind::Stack(_) => ValueType::Stack,
            ValueKind::Range(_) => ValueType::Range,
            ValueKind::Routine(_) => ValueType::Routine,
            ValueKind::NativeFunction(_) | ValueKind::BoundMethod(_) => ValueType::NativeFunction,
            ValueKind::Blame(_) => ValueType::Blame,
            ValueKind::Module(_) => ValueType::Module,
            ValueKind::Type(_) => ValueType::Type,
            ValueKind::Struct(_) => ValueType::Struct,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self.kind() {
            ValueKind::Void => false,
            ValueKind::Number(number) => number.is_truthy(),
            ValueKind::String(string) => !string.is_empty(),
            ValueKind::Stack(stack) => !stack.is_empty(),
            ValueKind::Range(range) => !range.is_empty(),
            _ => true,
        }
    }

    pub fn equals(&self, other: &Value) -> bool {
        self.equals_at(other, 0)
    }

    /// Past `MAX_NESTING_DEPTH` only identical values compare equal, so
    /// self-containing stacks terminate.
    fn equals_at(&self, other: &Value, depth: usize) -> bool {
        if Rc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        if depth > MAX_NESTING_DEPTH {
            return false;
        }
        match (self.kind(), other.kind()) {
            (ValueKind::Void, ValueKind::Void) => true,
            (ValueKind::Number(a), ValueKind::Number(b)) => a.equals(*b),
            (ValueKind::String(a), ValueKind::String(b)) => a.as_bytes() == b.as_bytes(),
            (ValueKind::Stack(a), ValueKind::Stack(b)) => {
                let (a, b) = (a.snapshot(), b.snapshot());
                a.len() == b.len()
                    && a.iter().zip(&b).all(|(x, y)| x.equals_at(y, depth + 1))
            }
            (ValueKind::Range(a), ValueKind::Range(b)) => a == b,
            (ValueKind::Type(a), ValueKind::Type(b)) => a == b,
            _ => false,
        }
    }

    /// Length of an iterable (Stack, String or Range).
    pub fn length(&self) -> Option<usize> {
        match self.kind() {
            ValueKind::Stack(stack) => Some(stack.len()),
            ValueKind::String(string) => Some(string.len()),
            ValueKind::Range(range) => Some(range.len()),
            _ => None,
        }
    }

    /// The `index`-th element an iteration over this value produces.
    pub fn item(&self, index: usize) -> Option<Value> {
        match self.kind() {
            ValueKind::Stack(stack) => stack.get(index),
            ValueKind::String(string) => string.char_at(index).map(Value::from),
            ValueKind::Range(range) => range.get(index).map(Value::int),
            _ => None,
        }
    }

    /// A binding or bound method reachable through `value :key`.
    pub fn member(&self, key: &str) -> Option<Value> {
        match self.kind() {
            ValueKind::Module(module) => module.get(key),
            ValueKind::Struct(record) => record.get(key),
            _ => MethodRef::lookup(self, key).map(|method| {
                Value::new(ValueKind::BoundMethod(BoundMethod {
                    receiver: self.clone(),
                    method,
                }))
            }),
        }
    }

    pub fn repr(&self) -> String {
        let mut out = String::new();
        self.write_repr(&mut out, 0);
        out
    }

    fn write_repr(&self, out: &mut String, depth: usize) {
        match self.kind() {
            ValueKind::Void => out.push_str("Void"),
            ValueKind::Number(number) => out.push_str(&number.to_string()),
            ValueKind::String(string) => out.push_str(&string.repr()),
            ValueKind::Stack(stack) => stack.write_repr(out, depth),
            ValueKind::Range(range) => out.push_str(&range.to_string()),
            ValueKind::Routine(routine) => out.push_str(&routine.repr()),
            ValueKind::NativeFunction(native) => out.push_str(&native.repr()),
            ValueKind::BoundMethod(method) => out.push_str(&method.repr()),
            ValueKind::Blame(blame) => out.push_str(&blame.repr()),
            ValueKind::Module(module) => out.push_str(&module.repr()),
            ValueKind::Type(value_type) => out.push_str(value_type.name()),
            ValueKind::Struct(record) => record.write_repr(out, depth),
        }
    }

    /// What `log` and `show` print: strings raw, everything else as repr.
    pub fn display(&self) -> String {
        match self.kind() {
            ValueKind::String(string) => string.display(),
            _ => self.repr(),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::void()
    }
}

impl From<RaelString> for Value {
    fn from(string: RaelString) -> Self {
        Value::string(string)
    }
}

impl From<Module> for Value {
    fn from(module: Module) -> Self {
        Value::new(ValueKind::Module(module))
    }
}

impl From<Struct> for Value {
    fn from(record: Struct) -> Self {
        Value::new(ValueKind::Struct(record))
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.repr())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn void_is_a_singleton() {
        assert!(Rc::ptr_eq(&Value::void().0, &Value::void().0));
        assert!(!Value::void().is_truthy());
    }

    #[test]
    fn nested_stack_repr() {
        let inner = Value::stack(vec![Value::string("a"), Value::float(1.5)]);
        let outer = Value::stack(vec![Value::int(1), inner, Value::void()]);
        assert_eq!(outer.repr(), "{ 1, { \"a\", 1.5 }, Void }");
    }

    #[test]
    fn self_containing_stack_repr_terminates() {
        let stack = Value::stack(vec![]);
        if let ValueKind::Stack(inner) = stack.kind() {
            inner.push(stack.clone());
        }
        assert!(stack.repr().contains("{ ... }"));
    }

    #[test]
    fn self_containing_stacks_compare_without_overflow() {
        let (a, b) = (Value::stack(vec![]), Value::stack(vec![]));
        for stack in [&a, &b] {
            if let ValueKind::Stack(items) = stack.kind() {
                items.push(stack.clone());
            }
        }
        assert!(!a.equals(&b));
        assert!(a.equals(&a));
    }

    #[test]
    fn equality_rules() {
        assert!(Value::int(2).equals(&Value::float(2.0)));
        assert!(Value::string("ab").equals(&Value::string("ab")));
        assert!(!Value::int(1).equals(&Value::string("1")));
        let a = Value::stack(vec![Value::int(1), Value::string("x")]);
        let b = Value::stack(vec![Value::int(1), Value::string("x")]);
        assert!(a.equals(&b));
        assert!(Value::range(Range::new(0, 3)).equals(&Value::range(Range::new(0, 3))));
        assert!(!Value::from(Blame::new(None)).equals(&Value::from(Blame::new(None))));
    }

    #[test]
    fn struct_repr_lists_fields() {
        let info = Value::from(
            Struct::new("Info")
                .with("Os", Value::string("linux"))
                .with("Version", Value::int(1)),
        );
        assert_eq!(info.repr(), "[Struct Info { :Os ?= \"linux\", :Version ?= 1 }]");
    }

    #[test]
    fn methods_bind_to_their_receiver() {
        let method = Value::string("abc").member("toUpper").expect("string method");
        assert_eq!(method.value_type(), ValueType::NativeFunction);
        assert_eq!(method.repr(), "[cfunc method 'toUpper' for type 'String']");
        assert!(Value::int(1).member("nope").is_none());
    }

    #[test]
    fn range_construction() {
        let args = Arguments::new(
            crate::diagnostics::Source::anonymous(""),
            vec![Argument {
                value: Value::int(3),
                position: crate::diagnostics::Position::start(),
            }],
        );
        let range = ValueType::Range.construct(&args).unwrap();
        assert_eq!(range.repr(), "0 to 3");
        let blame = ValueType::Number.construct(&args).unwrap_err();
        assert_eq!(
            blame.message_text().as_deref(),
            Some("Tried to construct a non-constructable type")
        );
    }
}
