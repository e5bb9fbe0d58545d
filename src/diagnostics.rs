use std::{fmt, rc::Rc};

use thiserror::Error;

const ANONYMOUS_SOURCE: &str = "<string>";

/// A read-only source buffer with an optional display name.
#[derive(Debug)]
pub struct Source {
    name: Option<String>,
    bytes: Box<[u8]>,
}

impl Source {
    pub fn new(name: Option<String>, bytes: impl Into<Box<[u8]>>) -> Rc<Self> {
        Rc::new(Self {
            name,
            bytes: bytes.into(),
        })
    }

    pub fn named(name: impl Into<String>, text: &str) -> Rc<Self> {
        Self::new(Some(name.into()), text.as_bytes())
    }

    pub fn anonymous(text: &str) -> Rc<Self> {
        Self::new(None, text.as_bytes())
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(ANONYMOUS_SOURCE)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The line holding `offset`, located by walking back to the previous
    /// newline, together with the offset at which that line starts.
    pub fn line_at(&self, offset: usize) -> (&[u8], usize) {
        let offset = offset.min(self.bytes.len());
        let start = self.bytes[..offset]
            .iter()
            .rposition(|&byte| byte == b'\n')
            .map_or(0, |newline| newline + 1);
        let end = self.bytes[offset..]
            .iter()
            .position(|&byte| byte == b'\n')
            .map_or(self.bytes.len(), |len| offset + len);
        (&self.bytes[start..end], start)
    }
}

/// Location of a token inside its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub const fn new(offset: usize, line: usize, column: usize) -> Self {
        Self {
            offset,
            line,
            column,
        }
    }

    pub const fn start() -> Self {
        Self::new(0, 1, 1)
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::start()
    }
}

/// Classification of a diagnostic event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    Lexer,
    Parser,
    Runtime,
}

/// A fatal error, ready to be shown with its source line and caret.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub position: Option<Position>,
    pub source: Option<Rc<Source>>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            position: None,
            source: None,
        }
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_source(mut self, source: Rc<Source>) -> Self {
        self.source = Some(source);
        self
    }

    fn write_line_display(
        f: &mut fmt::Formatter<'_>,
        source: &Source,
        position: Position,
    ) -> fmt::Result {
        let (line, line_start) = source.line_at(position.offset);
        let caret_offset = position.offset.saturating_sub(line_start).min(line.len());

        write!(f, "\n| ")?;
        for &byte in line {
            match byte {
                b'\t' => write!(f, "    ")?,
                b'\r' => {}
                _ => write!(f, "{}", String::from_utf8_lossy(&[byte]))?,
            }
        }
        write!(f, "\n| ")?;
        for &byte in &line[..caret_offset] {
            if byte == b'\t' {
                write!(f, "    ")?;
            } else {
                write!(f, " ")?;
            }
        }
        write!(f, "^")
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.source, self.position) {
            (Some(source), Some(position)) => {
                write!(
                    f,
                    "Error [{}:{}:{}]: {}",
                    source.display_name(),
                    position.line,
                    position.column,
                    self.message
                )?;
                Self::write_line_display(f, source, position)
            }
            (None, Some(position)) => write!(
                f,
                "Error [{}:{}]: {}",
                position.line, position.column, self.message
            ),
            _ => write!(f, "Error: {}", self.message),
        }
    }
}

impl std::error::Error for Diagnostic {}

/// Unified error type for the Rael toolchain.
#[derive(Debug, Error)]
pub enum RaelError {
    #[error("{0}")]
    Diagnostic(#[from] Diagnostic),
    #[error("program requested exit with code {0}")]
    Exit(i32),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RaelError {
    /// Process exit status matching this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            RaelError::Exit(code) => *code,
            RaelError::Diagnostic(_) | RaelError::Io(_) => 1,
        }
    }

    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            RaelError::Diagnostic(diagnostic) => Some(diagnostic),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, RaelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_at_finds_enclosing_line() {
        let source = Source::anonymous("first\nsecond line\nthird");
        let (line, start) = source.line_at(9);
        assert_eq!(line, b"second line");
        assert_eq!(start, 6);
    }

    #[test]
    fn renders_caret_under_position() {
        let source = Source::named("demo.rael", "log 1 / 0");
        let diagnostic = Diagnostic::new(DiagnosticKind::Runtime, "Division by zero")
            .with_position(Position::new(4, 1, 5))
            .with_source(source);
        assert_eq!(
            diagnostic.to_string(),
            "Error [demo.rael:1:5]: Division by zero\n| log 1 / 0\n|     ^"
        );
    }

    #[test]
    fn tabs_are_widened_in_line_display() {
        let source = Source::anonymous("\tlog :x");
        let diagnostic = Diagnostic::new(DiagnosticKind::Parser, "oops")
            .with_position(Position::new(5, 1, 6))
            .with_source(source);
        assert_eq!(
            diagnostic.to_string(),
            "Error [<string>:1:6]: oops\n|     log :x\n|         ^"
        );
    }

    #[test]
    fn exit_error_carries_code() {
        assert_eq!(RaelError::Exit(3).exit_code(), 3);
        let diagnostic = Diagnostic::new(DiagnosticKind::Lexer, "bad");
        assert_eq!(RaelError::from(diagnostic).exit_code(), 1);
    }
}
