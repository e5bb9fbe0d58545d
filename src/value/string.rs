use std::rc::Rc;

use super::{
    blame::Blame,
    callable::{Arguments, Arity, Method},
    Value,
};

/// An immutable byte string. Slices share the buffer they were cut from.
#[derive(Debug, Clone)]
pub struct RaelString {
    buffer: Rc<[u8]>,
    start: usize,
    len: usize,
}

impl RaelString {
    pub fn new(bytes: impl Into<Rc<[u8]>>) -> Self {
        let buffer = bytes.into();
        let len = buffer.len();
        Self {
            buffer,
            start: 0,
            len,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer[self.start..self.start + self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// `start..end` without copying. Callers check the bounds.
    pub fn slice(&self, start: usize, end: usize) -> Self {
        debug_assert!(start <= end && end <= self.len);
        Self {
            buffer: Rc::clone(&self.buffer),
            start: self.start + start,
            len: end - start,
        }
    }

    pub fn char_at(&self, index: usize) -> Option<Self> {
        (index < self.len).then(|| self.slice(index, index + 1))
    }

    pub fn find(&self, needle: &[u8], from: usize) -> Option<usize> {
        find_bytes(self.as_bytes(), needle, from)
    }

    pub fn display(&self) -> String {
        String::from_utf8_lossy(self.as_bytes()).into_owned()
    }

    pub fn repr(&self) -> String {
        let mut out = String::with_capacity(self.len + 2);
        out.push('"');
        for ch in String::from_utf8_lossy(self.as_bytes()).chars() {
            match ch {
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                '"' => out.push_str("\\\""),
                '\\' => out.push_str("\\\\"),
                _ => out.push(ch),
            }
        }
        out.push('"');
        out
    }
}

impl From<&str> for RaelString {
    fn from(text: &str) -> Self {
        Self::new(text.as_bytes())
    }
}

impl From<String> for RaelString {
    fn from(text: String) -> Self {
        Self::new(text.into_bytes())
    }
}

impl From<Vec<u8>> for RaelString {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

fn find_bytes(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    if needle.is_empty() {
        return Some(from);
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|index| index + from)
}

pub static METHODS: [Method<RaelString>; 14] = [
    Method::new("toLower", Arity::exact(0), to_lower),
    Method::new("toUpper", Arity::exact(0), to_upper),
    Method::new("toCharStack", Arity::exact(0), to_char_stack),
    Method::new("charAt", Arity::exact(1), char_at),
    Method::new("isLower", Arity::exact(0), is_lower),
    Method::new("isUpper", Arity::exact(0), is_upper),
    Method::new("isDigit", Arity::exact(0), is_digit),
    Method::new("chunkSplit", Arity::exact(1), chunk_split),
    Method::new("split", Arity::exact(1), split),
    Method::new("findIndexOf", Arity::exact(1), find_index_of),
    Method::new("contains", Arity::exact(1), contains),
    Method::new("replace", Arity::exact(2), replace),
    Method::new("timesContains", Arity::exact(1), times_contains),
    Method::new("seperate", Arity::exact(1), seperate),
];

fn to_lower(this: &RaelString, _: &Arguments) -> Result<Value, Blame> {
    Ok(Value::string(this.as_bytes().to_ascii_lowercase()))
}

fn to_upper(this: &RaelString, _: &Arguments) -> Result<Value, Blame> {
    Ok(Value::string(this.as_bytes().to_ascii_uppercase()))
}

fn to_char_stack(this: &RaelString, _: &Arguments) -> Result<Value, Blame> {
    Ok(Value::stack(
        this.as_bytes()
            .iter()
            .map(|&byte| Value::int(i64::from(byte)))
            .collect(),
    ))
}

fn char_at(this: &RaelString, args: &Arguments) -> Result<Value, Blame> {
    let index = args.whole(0)?;
    if index < 0 {
        return Err(args.blame(0, "Expected a positive number"));
    }
    this.as_bytes()
        .get(index as usize)
        .map(|&byte| Value::int(i64::from(byte)))
        .ok_or_else(|| args.blame(0, "Index out of range"))
}

/// 1 only for a non-empty string whose every byte passes `test`.
fn all_bytes(this: &RaelString, test: fn(&u8) -> bool) -> Value {
    Value::bool(!this.is_empty() && this.as_bytes().iter().all(test))
}

fn is_lower(this: &RaelString, _: &Arguments) -> Result<Value, Blame> {
    Ok(all_bytes(this, u8::is_ascii_lowercase))
}

fn is_upper(this: &RaelString, _: &Arguments) -> Result<Value, Blame> {
    Ok(all_bytes(this, u8::is_ascii_uppercase))
}

fn is_digit(this: &RaelString, _: &Arguments) -> Result<Value, Blame> {
    Ok(all_bytes(this, u8::is_ascii_digit))
}

fn chunk_split(this: &RaelString, args: &Arguments) -> Result<Value, Blame> {
    let size = args.whole(0)?;
    if size < 1 {
        return Err(args.blame(0, "Expected a number bigger than 0"));
    }
    let size = size as usize;
    let chunks = (0..this.len())
        .step_by(size)
        .map(|start| Value::from(this.slice(start, (start + size).min(this.len()))))
        .collect();
    Ok(Value::stack(chunks))
}

fn split(this: &RaelString, args: &Arguments) -> Result<Value, Blame> {
    let separator = args.string(0)?.as_bytes();
    if separator.is_empty() {
        return Err(args.blame(0, "Empty seperator not allowed"));
    }

    let mut parts = Vec::new();
    let mut last = 0;
    while let Some(found) = this.find(separator, last) {
        parts.push(Value::from(this.slice(last, found)));
        last = found + separator.len();
    }
    parts.push(Value::from(this.slice(last, this.len())));
    Ok(Value::stack(parts))
}

fn find_index_of(this: &RaelString, args: &Arguments) -> Result<Value, Blame> {
    let needle = args.string(0)?;
    let index = this
        .find(needle.as_bytes(), 0)
        .map_or(-1, |index| index as i64);
    Ok(Value::int(index))
}

fn contains(this: &RaelString, args: &Arguments) -> Result<Value, Blame> {
    let needle = args.string(0)?;
    Ok(Value::bool(this.find(needle.as_bytes(), 0).is_some()))
}

fn replace(this: &RaelString, args: &Arguments) -> Result<Value, Blame> {
    let search = args.string(0)?.as_bytes();
    let replacement = args.string(1)?.as_bytes();
    if search.is_empty() {
        return Err(args.blame(0, "Empty search string not allowed"));
    }

    let bytes = this.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut last = 0;
    while let Some(found) = this.find(search, last) {
        out.extend_from_slice(&bytes[last..found]);
        out.extend_from_slice(replacement);
        last = found + search.len();
    }
    out.extend_from_slice(&bytes[last..]);
    Ok(Value::string(out))
}

fn times_contains(this: &RaelString, args: &Arguments) -> Result<Value, Blame> {
    let needle = args.string(0)?.as_bytes();
    let step = needle.len().max(1);
    let mut count = 0;
    let mut from = 0;
    while let Some(found) = this.find(needle, from) {
        count += 1;
        from = found + step;
    }
    Ok(Value::int(count))
}

fn seperate(this: &RaelString, args: &Arguments) -> Result<Value, Blame> {
    let iterable = args.get(0).cloned().unwrap_or_default();
    let length = iterable
        .length()
        .ok_or_else(|| args.blame(0, "Expected an iterable"))?;

    let mut out = Vec::new();
    for index in 0..length {
        let item = iterable.item(index).unwrap_or_default();
        let super::ValueKind::String(part) = item.kind() else {
            return Err(args.blame(0, "Iterable does not produce strings"));
        };
        if index > 0 {
            out.extend_from_slice(this.as_bytes());
        }
        out.extend_from_slice(part.as_bytes());
    }
    Ok(Value::string(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        diagnostics::{Position, Source},
        value::callable::Argument,
    };

    fn call(receiver: &str, name: &str, values: Vec<Value>) -> Result<Value, Blame> {
        let method = METHODS
            .iter()
            .find(|method| method.name == name)
            .expect("known method");
        let args = Arguments::new(
            Source::anonymous(""),
            values
                .into_iter()
                .map(|value| Argument {
                    value,
                    position: Position::start(),
                })
                .collect(),
        );
        (method.function)(&RaelString::from(receiver), &args)
    }

    fn repr(result: Result<Value, Blame>) -> String {
        result.expect("method succeeds").repr()
    }

    #[test]
    fn slices_share_their_buffer() {
        let text = RaelString::from("Hello world");
        let world = text.slice(6, 11);
        assert_eq!(world.as_bytes(), b"world");
        assert_eq!(world.slice(1, 3).as_bytes(), b"or");
    }

    #[test]
    fn repr_escapes_control_characters() {
        assert_eq!(RaelString::from("a\"b\n").repr(), "\"a\\\"b\\n\"");
    }

    #[test]
    fn split_keeps_the_rest() {
        assert_eq!(
            repr(call("Apple, Banana, Orange", "split", vec![Value::string(", ")])),
            "{ \"Apple\", \"Banana\", \"Orange\" }"
        );
        assert_eq!(
            repr(call("a,", "split", vec![Value::string(",")])),
            "{ \"a\", \"\" }"
        );
        assert!(call("abc", "split", vec![Value::string("")]).is_err());
    }

    #[test]
    fn chunk_split_leaves_a_short_tail() {
        assert_eq!(
            repr(call("abcde", "chunkSplit", vec![Value::int(2)])),
            "{ \"ab\", \"cd\", \"e\" }"
        );
        let blame = call("abc", "chunkSplit", vec![Value::int(0)]).unwrap_err();
        assert_eq!(
            blame.message_text().as_deref(),
            Some("Expected a number bigger than 0")
        );
    }

    #[test]
    fn searching() {
        assert_eq!(repr(call("Banana", "findIndexOf", vec![Value::string("na")])), "2");
        assert_eq!(repr(call("Banana", "findIndexOf", vec![Value::string("x")])), "-1");
        assert_eq!(repr(call("abcdef", "contains", vec![Value::string("Def")])), "0");
        assert_eq!(
            repr(call("a string is a string", "timesContains", vec![Value::string("string")])),
            "2"
        );
    }

    #[test]
    fn replace_rewrites_every_occurrence() {
        assert_eq!(
            repr(call(
                "a-b-c",
                "replace",
                vec![Value::string("-"), Value::string("+")]
            )),
            "\"a+b+c\""
        );
    }

    #[test]
    fn char_at_returns_the_byte() {
        assert_eq!(repr(call("Abc", "charAt", vec![Value::int(0)])), "65");
        let blame = call("Abc", "charAt", vec![Value::int(3)]).unwrap_err();
        assert_eq!(blame.message_text().as_deref(), Some("Index out of range"));
    }

    #[test]
    fn case_predicates_reject_empty_strings() {
        assert_eq!(repr(call("abc", "isLower", vec![])), "1");
        assert_eq!(repr(call("", "isLower", vec![])), "0");
        assert_eq!(repr(call("12a", "isDigit", vec![])), "0");
    }

    #[test]
    fn seperate_joins_strings() {
        let parts = Value::stack(vec![Value::string("Banana"), Value::string("Apple")]);
        assert_eq!(
            repr(call(", ", "seperate", vec![parts])),
            "\"Banana, Apple\""
        );
        let numbers = Value::stack(vec![Value::int(1)]);
        assert!(call(", ", "seperate", vec![numbers]).is_err());
    }
}
