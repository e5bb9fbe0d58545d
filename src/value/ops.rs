//! Operators on values. Failures come back as blames tagged with the
//! operand they should point at; the evaluator fills in the position.

use crate::ast::{BinaryOp, UnaryOp};

use super::{Blame, Number, Range, Value, ValueKind, ValueType};

/// The part of an expression a failed operation is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Culprit {
    Expression,
    Left,
    Right,
}

#[derive(Debug)]
pub struct OpError {
    pub blame: Blame,
    pub culprit: Culprit,
}

impl OpError {
    fn left(message: &str) -> Self {
        Self {
            blame: Blame::message(message),
            culprit: Culprit::Left,
        }
    }

    fn right(message: &str) -> Self {
        Self {
            blame: Blame::message(message),
            culprit: Culprit::Right,
        }
    }
}

impl From<Blame> for OpError {
    fn from(blame: Blame) -> Self {
        Self {
            blame,
            culprit: Culprit::Expression,
        }
    }
}

pub type OpResult = Result<Value, OpError>;

fn invalid(op: BinaryOp, left: &Value, right: &Value) -> OpError {
    Blame::message(format!(
        "Invalid operation ({}) on types '{}' and '{}'",
        op.symbol(),
        left.value_type().name(),
        right.value_type().name()
    ))
    .into()
}

pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> OpResult {
    match op {
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
            arithmetic(op, left, right)
        }
        BinaryOp::Equal => Ok(Value::bool(left.equals(right))),
        BinaryOp::NotEqual => Ok(Value::bool(!left.equals(right))),
        BinaryOp::Less | BinaryOp::Greater | BinaryOp::LessEqual | BinaryOp::GreaterEqual => {
            compare(op, left, right)
        }
        BinaryOp::At => index(left, right),
        BinaryOp::To => to(left, right),
        BinaryOp::Redirect => redirect(left, right),
    }
}

pub fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> OpResult {
    match (left.kind(), right.kind()) {
        (ValueKind::Number(a), ValueKind::Number(b)) => {
            let result = match op {
                BinaryOp::Add => a.add(*b),
                BinaryOp::Sub => a.sub(*b),
                BinaryOp::Mul => a.mul(*b),
                BinaryOp::Div => a.div(*b)?,
                BinaryOp::Mod => a.rem(*b)?,
                _ => return Err(invalid(op, left, right)),
            };
            Ok(Value::number(result))
        }
        (ValueKind::String(a), ValueKind::String(b)) if op == BinaryOp::Add => {
            let mut bytes = Vec::with_capacity(a.len() + b.len());
            bytes.extend_from_slice(a.as_bytes());
            bytes.extend_from_slice(b.as_bytes());
            Ok(Value::string(bytes))
        }
        (ValueKind::Number(number), ValueKind::String(string)) if op == BinaryOp::Add => {
            let byte = ascii_byte(*number).map_err(OpError::left)?;
            let mut bytes = Vec::with_capacity(string.len() + 1);
            bytes.push(byte);
            bytes.extend_from_slice(string.as_bytes());
            Ok(Value::string(bytes))
        }
        (ValueKind::String(string), ValueKind::Number(number)) if op == BinaryOp::Add => {
            let byte = ascii_byte(*number).map_err(OpError::right)?;
            let mut bytes = Vec::with_capacity(string.len() + 1);
            bytes.extend_from_slice(string.as_bytes());
            bytes.push(byte);
            Ok(Value::string(bytes))
        }
        _ => Err(invalid(op, left, right)),
    }
}

fn ascii_byte(number: Number) -> Result<u8, &'static str> {
    let code = number
        .to_whole()
        .ok_or("Expected the number to be a whole number")?;
    u8::try_from(code)
        .ok()
        .filter(u8::is_ascii)
        .ok_or("Expected the number to be in ascii")
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> OpResult {
    let (ValueKind::Number(a), ValueKind::Number(b)) = (left.kind(), right.kind()) else {
        return Err(invalid(op, left, right));
    };
    let Some(ordering) = a.compare(*b) else {
        return Ok(Value::bool(false));
    };
    let result = match op {
        BinaryOp::Less => ordering.is_lt(),
        BinaryOp::Greater => ordering.is_gt(),
        BinaryOp::LessEqual => ordering.is_le(),
        _ => ordering.is_ge(),
    };
    Ok(Value::bool(result))
}

fn redirect(left: &Value, right: &Value) -> OpResult {
    let ValueKind::Stack(stack) = left.kind() else {
        return Err(OpError::left("Expected a stack value"));
    };
    stack.push(right.clone());
    Ok(left.clone())
}

/// A non-negative whole index.
pub fn element_index(index: &Value) -> Result<usize, OpError> {
    let ValueKind::Number(number) = index.kind() else {
        return Err(OpError::right("Expected a number"));
    };
    let index = number
        .to_whole()
        .ok_or_else(|| OpError::right("Float index is not allowed"))?;
    usize::try_from(index).map_err(|_| OpError::right("A negative index is not allowed"))
}

fn slice_bounds(range: &Range, length: usize) -> Result<(usize, usize), OpError> {
    if range.start < 0 || range.end < 0 {
        return Err(OpError::right(
            "Negative range numbers for slicing are not allowed",
        ));
    }
    if range.end < range.start {
        return Err(OpError::right(
            "Range end is smaller than its start when slicing",
        ));
    }
    let (start, end) = (range.start as usize, range.end as usize);
    if start > length || end > length {
        return Err(OpError::right("Slicing out of range"));
    }
    Ok((start, end))
}

/// `left at right`: element access or slicing.
pub fn index(left: &Value, right: &Value) -> OpResult {
    let length = match left.kind() {
        ValueKind::Stack(_) | ValueKind::String(_) | ValueKind::Range(_) => {
            left.length().unwrap_or(0)
        }
        _ => {
            return Err(OpError::left(
                "Expected a stack, string or range on the left of 'at'",
            ))
        }
    };

    match right.kind() {
        ValueKind::Number(_) => {
            let index = element_index(right)?;
            match left.kind() {
                ValueKind::String(string) if index == length => {
                    Ok(Value::from(string.slice(length, length)))
                }
                _ => left
                    .item(index)
                    .ok_or_else(|| OpError::right("Index too big")),
            }
        }
        ValueKind::Range(range) => {
            let (start, end) = slice_bounds(range, length)?;
            Ok(match left.kind() {
                ValueKind::Stack(stack) => Value::stack(stack.slice(start, end)),
                ValueKind::String(string) => Value::from(string.slice(start, end)),
                ValueKind::Range(outer) => {
                    Value::range(outer.slice(start, end).unwrap_or(*outer))
                }
                _ => Value::void(),
            })
        }
        _ => Err(OpError::right("Expected range or number")),
    }
}

/// `left to right`: a range when the right side is a number, a cast
/// when it is a type.
pub fn to(left: &Value, right: &Value) -> OpResult {
    match right.kind() {
        ValueKind::Number(end) => {
            let ValueKind::Number(start) = left.kind() else {
                return Err(OpError::left("Expected number"));
            };
            let start = start
                .to_whole()
                .ok_or_else(|| OpError::left("Expected a whole number"))?;
            let end = end
                .to_whole()
                .ok_or_else(|| OpError::right("Expected a whole number"))?;
            Ok(Value::range(Range::new(start, end)))
        }
        ValueKind::Type(target) => Ok(cast(left, *target)?),
        _ => Err(OpError::right("Expected number or type")),
    }
}

pub fn cast(value: &Value, target: ValueType) -> Result<Value, Blame> {
    if value.value_type() == target {
        return Ok(value.clone());
    }
    let cast = match (value.kind(), target) {
        (ValueKind::Void, ValueType::String) => Some(Value::string("Void")),
        (ValueKind::Number(number), ValueType::String) => Some(Value::string(number.to_string())),
        (ValueKind::Type(value_type), ValueType::String) => Some(Value::string(value_type.name())),
        (ValueKind::Void, ValueType::Number) => Some(Value::int(0)),
        (ValueKind::String(string), ValueType::Number) => {
            return Number::parse(string.as_bytes())
                .map(Value::number)
                .ok_or_else(|| {
                    Blame::message(format!(
                        "The string '{}' can't be parsed as a number",
                        string.display()
                    ))
                })
        }
        (ValueKind::String(string), ValueType::Stack) => Some(Value::stack(
            string
                .as_bytes()
                .iter()
                .map(|&byte| Value::int(i64::from(byte)))
                .collect(),
        )),
        (ValueKind::Range(range), ValueType::Stack) => {
            Some(Value::stack(range.iter().map(Value::int).collect()))
        }
        _ => None,
    };
    cast.ok_or_else(|| {
        Blame::message(format!(
            "Cannot cast value of type '{}' to a value of type '{}'",
            value.value_type().name(),
            target.name()
        ))
    })
}

/// Number of elements `sizeof` reports.
pub fn size_of(value: &Value) -> Result<usize, Blame> {
    match value.kind() {
        ValueKind::Void => Ok(0),
        ValueKind::Struct(record) => Ok(record.len()),
        _ => value
            .length()
            .ok_or_else(|| Blame::message("Unsupported type for 'sizeof' operation")),
    }
}

/// Unary operators. For `getstring` this yields the prompt; reading the
/// line is left to the interpreter.
pub fn unary(op: UnaryOp, operand: &Value) -> Result<Value, Blame> {
    match op {
        UnaryOp::Negate => match operand.kind() {
            ValueKind::Number(number) => Ok(Value::number(number.neg())),
            _ => Err(Blame::message("Expected number")),
        },
        UnaryOp::Not => Ok(Value::bool(!operand.is_truthy())),
        UnaryOp::Sizeof => size_of(operand).map(|size| {
            i64::try_from(size).map_or_else(|_| Value::float(size as f64), Value::int)
        }),
        UnaryOp::Typeof => Ok(Value::type_value(operand.value_type())),
        UnaryOp::GetString => Ok(Value::string(operand.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(result: OpResult) -> String {
        result
            .unwrap_err()
            .blame
            .message_text()
            .unwrap_or_default()
    }

    #[test]
    fn mismatched_arithmetic_names_both_types() {
        assert_eq!(
            message(binary(BinaryOp::Sub, &Value::string("a"), &Value::int(1))),
            "Invalid operation (-) on types 'String' and 'Number'"
        );
    }

    #[test]
    fn numbers_and_strings_concatenate_as_characters() {
        let value = binary(BinaryOp::Add, &Value::int(72), &Value::string("i")).unwrap();
        assert_eq!(value.display(), "Hi");
        let value = binary(BinaryOp::Add, &Value::string("H"), &Value::int(105)).unwrap();
        assert_eq!(value.display(), "Hi");
        let err = binary(BinaryOp::Add, &Value::string("H"), &Value::int(300)).unwrap_err();
        assert_eq!(err.culprit, Culprit::Right);
    }

    #[test]
    fn indexing_strings_allows_the_end() {
        let text = Value::string("abc");
        assert_eq!(index(&text, &Value::int(1)).unwrap().repr(), "\"b\"");
        assert_eq!(index(&text, &Value::int(3)).unwrap().repr(), "\"\"");
        assert_eq!(message(index(&text, &Value::int(4))), "Index too big");
    }

    #[test]
    fn index_errors_blame_the_index() {
        let stack = Value::stack(vec![Value::int(1)]);
        let err = index(&stack, &Value::float(0.5)).unwrap_err();
        assert_eq!(err.culprit, Culprit::Right);
        assert_eq!(
            err.blame.message_text().as_deref(),
            Some("Float index is not allowed")
        );
        assert_eq!(
            message(index(&stack, &Value::int(-1))),
            "A negative index is not allowed"
        );
        assert_eq!(
            message(index(&Value::int(1), &Value::int(0))),
            "Expected a stack, string or range on the left of 'at'"
        );
    }

    #[test]
    fn slicing() {
        let stack = Value::stack(vec![Value::int(1), Value::int(2), Value::int(3)]);
        let slice = index(&stack, &Value::range(Range::new(1, 3))).unwrap();
        assert_eq!(slice.repr(), "{ 2, 3 }");
        assert_eq!(
            message(index(&stack, &Value::range(Range::new(2, 1)))),
            "Range end is smaller than its start when slicing"
        );
        assert_eq!(
            message(index(&stack, &Value::range(Range::new(0, 4)))),
            "Slicing out of range"
        );
        let range = Value::range(Range::new(10, 0));
        assert_eq!(
            index(&range, &Value::range(Range::new(1, 3))).unwrap().repr(),
            "9 to 7"
        );
    }

    #[test]
    fn casts() {
        let number = cast(&Value::string("-12"), ValueType::Number).unwrap();
        assert_eq!(number.repr(), "-12");
        assert_eq!(
            cast(&Value::string("x1"), ValueType::Number)
                .unwrap_err()
                .message_text()
                .as_deref(),
            Some("The string 'x1' can't be parsed as a number")
        );
        assert_eq!(cast(&Value::void(), ValueType::String).unwrap().display(), "Void");
        assert_eq!(
            cast(&Value::range(Range::new(0, 3)), ValueType::Stack)
                .unwrap()
                .repr(),
            "{ 0, 1, 2 }"
        );
        assert_eq!(
            cast(&Value::int(1), ValueType::Routine)
                .unwrap_err()
                .message_text()
                .as_deref(),
            Some("Cannot cast value of type 'Number' to a value of type 'Routine'")
        );
    }

    #[test]
    fn redirect_pushes_and_yields_the_stack() {
        let stack = Value::stack(vec![]);
        let result = redirect(&stack, &Value::int(5)).unwrap();
        assert_eq!(result.repr(), "{ 5 }");
        assert_eq!(
            message(redirect(&Value::int(1), &Value::int(5))),
            "Expected a stack value"
        );
    }

    #[test]
    fn sizeof_counts_elements() {
        assert_eq!(size_of(&Value::string("abcd")).unwrap(), 4);
        assert_eq!(size_of(&Value::void()).unwrap(), 0);
        assert!(size_of(&Value::int(3)).is_err());
        let widest = Value::range(Range::new(i64::MIN, i64::MAX));
        assert_eq!(
            unary(UnaryOp::Sizeof, &widest).unwrap().repr(),
            Number::Float(u64::MAX as f64).to_string()
        );
    }
}
