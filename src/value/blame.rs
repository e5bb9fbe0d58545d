use std::{cell::RefCell, rc::Rc};

use crate::diagnostics::{Diagnostic, DiagnosticKind, Position, Source};

use super::Value;

/// Where a blame was first raised.
#[derive(Debug, Clone)]
pub struct Origin {
    pub source: Rc<Source>,
    pub position: Position,
}

/// A runtime fault carried around as an ordinary value.
///
/// The origin is assigned at most once: the innermost expression that
/// produced the blame wins, and outer expressions leave it untouched.
#[derive(Debug)]
pub struct Blame {
    message: Option<Value>,
    origin: RefCell<Option<Origin>>,
}

impl Blame {
    pub fn new(message: Option<Value>) -> Self {
        Self {
            message,
            origin: RefCell::new(None),
        }
    }

    pub fn message(text: impl AsRef<str>) -> Self {
        Self::new(Some(Value::string(text.as_ref())))
    }

    pub fn at(self, source: &Rc<Source>, position: Position) -> Self {
        self.locate(source, position);
        self
    }

    /// Records an origin unless one is already set.
    pub fn locate(&self, source: &Rc<Source>, position: Position) {
        let mut origin = self.origin.borrow_mut();
        if origin.is_none() {
            *origin = Some(Origin {
                source: Rc::clone(source),
                position,
            });
        }
    }

    pub fn origin(&self) -> Option<Origin> {
        self.origin.borrow().clone()
    }

    pub fn message_value(&self) -> Option<&Value> {
        self.message.as_ref()
    }

    pub fn message_text(&self) -> Option<String> {
        self.message.as_ref().map(Value::display)
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let message = self
            .message_text()
            .unwrap_or_else(|| "Unhandled blame".to_string());
        let diagnostic = Diagnostic::new(DiagnosticKind::Runtime, message);
        match self.origin() {
            Some(origin) => diagnostic
                .with_position(origin.position)
                .with_source(origin.source),
            None => diagnostic,
        }
    }

    pub fn repr(&self) -> String {
        match &self.message {
            Some(message) => format!("[Blame: {}]", message.display()),
            None => "[Blame]".to_string(),
        }
    }
}

impl From<Blame> for Value {
    fn from(blame: Blame) -> Self {
        Value::new(super::ValueKind::Blame(blame))
    }
}
