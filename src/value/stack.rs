use std::{cell::RefCell, rc::Rc};

use super::{
    blame::Blame,
    callable::{Arguments, Arity, Method},
    Value, ValueKind,
};

/// A growable, shared sequence. Mutation through one handle is visible
/// through every other handle to the same stack.
#[derive(Debug, Default)]
pub struct Stack {
    items: RefCell<Vec<Value>>,
}

impl Stack {
    pub fn new(items: Vec<Value>) -> Self {
        Self {
            items: RefCell::new(items),
        }
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.items.borrow().get(index).cloned()
    }

    /// Replaces the value at `index`; `false` when out of bounds.
    pub fn set(&self, index: usize, value: Value) -> bool {
        match self.items.borrow_mut().get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn push(&self, value: Value) {
        self.items.borrow_mut().push(value);
    }

    pub fn remove(&self, index: usize) -> Option<Value> {
        let mut items = self.items.borrow_mut();
        (index < items.len()).then(|| items.remove(index))
    }

    pub fn slice(&self, start: usize, end: usize) -> Vec<Value> {
        self.items.borrow()[start..end].to_vec()
    }

    /// A copy of the current items, safe to hold while the stack changes.
    pub fn snapshot(&self) -> Vec<Value> {
        self.items.borrow().clone()
    }

    pub(super) fn write_repr(&self, out: &mut String, depth: usize) {
        if depth > super::MAX_NESTING_DEPTH {
            out.push_str("{ ... }");
            return;
        }
        out.push_str("{ ");
        for (index, item) in self.snapshot().iter().enumerate() {
            if index > 0 {
                out.push_str(", ");
            }
            item.write_repr(out, depth + 1);
        }
        out.push_str(" }");
    }
}

pub static METHODS: [Method<Stack>; 2] = [
    Method::new("pop", Arity::range(0, 1), pop),
    Method::new("findIndexOf", Arity::range(1, 2), find_index_of),
];

fn pop(this: &Stack, args: &Arguments) -> Result<Value, Blame> {
    if args.is_empty() {
        let last = this.items.borrow_mut().pop();
        return last.ok_or_else(|| Blame::message("Can't pop from an empty stack"));
    }

    let index = match args.get(0).map(Value::kind) {
        Some(ValueKind::Number(number)) => number
            .to_whole()
            .filter(|&index| index >= 0)
            .ok_or_else(|| args.blame(0, "Expected a positive whole number"))?,
        _ => return Err(args.blame(0, "Expected number")),
    };
    this.remove(index as usize)
        .ok_or_else(|| args.blame(0, "Index too big"))
}

/// With a truthy second argument the search matches the identical value
/// rather than an equal one.
fn find_index_of(this: &Stack, args: &Arguments) -> Result<Value, Blame> {
    let wanted = args.get(0).cloned().unwrap_or_default();
    let identity = args.get(1).is_some_and(Value::is_truthy);

    let index = this.items.borrow().iter().position(|item| {
        if identity {
            Rc::ptr_eq(&item.0, &wanted.0)
        } else {
            item.equals(&wanted)
        }
    });
    Ok(Value::int(index.map_or(-1, |index| index as i64)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        diagnostics::{Position, Source},
        value::callable::Argument,
    };

    fn args(values: Vec<Value>) -> Arguments {
        Arguments::new(
            Source::anonymous(""),
            values
                .into_iter()
                .map(|value| Argument {
                    value,
                    position: Position::start(),
                })
                .collect(),
        )
    }

    fn numbers(values: &[i64]) -> Stack {
        Stack::new(values.iter().map(|&n| Value::int(n)).collect())
    }

    #[test]
    fn pop_without_index_takes_the_top() {
        let stack = numbers(&[1, 2, 3]);
        assert_eq!(pop(&stack, &args(vec![])).map(|v| v.repr()).ok(), Some("3".into()));
        assert_eq!(stack.len(), 2);
    }

    #[test]
    fn pop_with_index_shifts_the_rest() {
        let stack = numbers(&[1, 2, 3]);
        assert_eq!(
            pop(&stack, &args(vec![Value::int(1)])).map(|v| v.repr()).ok(),
            Some("2".into())
        );
        let mut out = String::new();
        stack.write_repr(&mut out, 0);
        assert_eq!(out, "{ 1, 3 }");
    }

    #[test]
    fn pop_errors() {
        let empty = Stack::default();
        let blame = pop(&empty, &args(vec![])).unwrap_err();
        assert_eq!(
            blame.message_text().as_deref(),
            Some("Can't pop from an empty stack")
        );

        let stack = numbers(&[1]);
        let blame = pop(&stack, &args(vec![Value::int(5)])).unwrap_err();
        assert_eq!(blame.message_text().as_deref(), Some("Index too big"));
        let blame = pop(&stack, &args(vec![Value::int(-1)])).unwrap_err();
        assert_eq!(
            blame.message_text().as_deref(),
            Some("Expected a positive whole number")
        );
    }

    #[test]
    fn find_index_of_by_value_and_identity() {
        let shared = Value::string("x");
        let stack = Stack::new(vec![Value::int(1), Value::string("x"), shared.clone()]);

        let found = find_index_of(&stack, &args(vec![Value::string("x")])).unwrap();
        assert_eq!(found.repr(), "1");

        let found = find_index_of(&stack, &args(vec![shared, Value::int(1)])).unwrap();
        assert_eq!(found.repr(), "2");

        let missing = find_index_of(&stack, &args(vec![Value::int(87)])).unwrap();
        assert_eq!(missing.repr(), "-1");
    }
}
