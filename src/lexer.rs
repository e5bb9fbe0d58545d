use std::rc::Rc;

use crate::diagnostics::{Diagnostic, DiagnosticKind, Position, Source};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Log,
    Show,
    Routine,
    If,
    Else,
    Loop,
    Void,
    At,
    Sizeof,
    Through,
    Break,
    Skip,
    To,
    Blame,
    Catch,
    With,
    Typeof,
    GetString,
    Match,
    Load,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Newline,
    Key(String),
    Int(i64),
    Float(f64),
    String(Rc<[u8]>),
    Keyword(Keyword),
    Caret,
    Redirect,
    SetEqual,
    PlusEqual,
    MinusEqual,
    StarEqual,
    SlashEqual,
    PercentEqual,
    BangEqual,
    LessEqual,
    GreaterEqual,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Equal,
    Less,
    Greater,
    Ampersand,
    Pipe,
    Bang,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: Position,
}

/// Saved lexer position used by the parser to rewind after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexerState(Position);

impl LexerState {
    pub fn position(&self) -> Position {
        self.0
    }
}

pub struct Lexer {
    source: Rc<Source>,
    position: Position,
}

impl Lexer {
    pub fn new(source: Rc<Source>) -> Self {
        Self {
            source,
            position: Position::start(),
        }
    }

    pub fn source(&self) -> &Rc<Source> {
        &self.source
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn snapshot(&self) -> LexerState {
        LexerState(self.position)
    }

    pub fn restore(&mut self, state: LexerState) {
        self.position = state.0;
    }

    pub fn is_at_end(&self) -> bool {
        self.position.offset >= self.source.len()
    }

    fn peek(&self) -> Option<u8> {
        self.peek_at(0)
    }

    fn peek_at(&self, distance: usize) -> Option<u8> {
        self.source.bytes().get(self.position.offset + distance).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.position.offset += 1;
        if byte == b'\n' {
            self.position.line += 1;
            self.position.column = 1;
        } else {
            self.position.column += 1;
        }
        Some(byte)
    }

    fn match_next(&mut self, expected: u8) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn error(&self, position: Position, message: &str) -> Diagnostic {
        Diagnostic::new(DiagnosticKind::Lexer, message)
            .with_position(position)
            .with_source(Rc::clone(&self.source))
    }

    /// Skips spaces, comments and line continuations, but never a newline.
    fn skip_trivia(&mut self) -> Result<(), Diagnostic> {
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\r') => {
                    self.bump();
                }
                Some(b'%') if self.peek_at(1) == Some(b'%') => {
                    while let Some(byte) = self.peek() {
                        if byte == b'\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some(b'\\') => {
                    let start = self.position;
                    self.bump();
                    self.match_next(b'\r');
                    if !self.match_next(b'\n') {
                        return Err(self.error(start, "Expected a newline after '\\'"));
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn is_line_break(byte: Option<u8>) -> bool {
        matches!(byte, Some(b'\n' | b';'))
    }

    pub fn next_token(&mut self) -> Result<Option<Token>, Diagnostic> {
        self.skip_trivia()?;
        let start = self.position;
        let Some(byte) = self.bump() else {
            return Ok(None);
        };

        let kind = match byte {
            b'\n' | b';' => {
                loop {
                    self.skip_trivia()?;
                    if Self::is_line_break(self.peek()) {
                        self.bump();
                    } else {
                        break;
                    }
                }
                TokenKind::Newline
            }
            b':' => self.key(start)?,
            b'0'..=b'9' => self.number(start),
            b'"' => self.string(start)?,
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.keyword(start)?,
            b'^' => TokenKind::Caret,
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'{' => TokenKind::LBrace,
            b'}' => TokenKind::RBrace,
            b',' => TokenKind::Comma,
            b'&' => TokenKind::Ampersand,
            b'|' => TokenKind::Pipe,
            b'=' => TokenKind::Equal,
            b'?' if self.match_next(b'=') => TokenKind::SetEqual,
            b'+' => self.with_equal(TokenKind::PlusEqual, TokenKind::Plus),
            b'-' => self.with_equal(TokenKind::MinusEqual, TokenKind::Minus),
            b'*' => self.with_equal(TokenKind::StarEqual, TokenKind::Star),
            b'/' => self.with_equal(TokenKind::SlashEqual, TokenKind::Slash),
            b'%' => self.with_equal(TokenKind::PercentEqual, TokenKind::Percent),
            b'!' => self.with_equal(TokenKind::BangEqual, TokenKind::Bang),
            b'>' => self.with_equal(TokenKind::GreaterEqual, TokenKind::Greater),
            b'<' => {
                if self.match_next(b'<') {
                    TokenKind::Redirect
                } else {
                    self.with_equal(TokenKind::LessEqual, TokenKind::Less)
                }
            }
            _ => return Err(self.error(start, "Unrecognized token")),
        };

        Ok(Some(Token {
            kind,
            position: start,
        }))
    }

    fn with_equal(&mut self, combined: TokenKind, single: TokenKind) -> TokenKind {
        if self.match_next(b'=') {
            combined
        } else {
            single
        }
    }

    fn is_word_byte(byte: u8) -> bool {
        byte.is_ascii_alphanumeric() || byte == b'_'
    }

    fn collect_word(&mut self, start: usize) -> String {
        while self.peek().is_some_and(Self::is_word_byte) {
            self.bump();
        }
        String::from_utf8_lossy(&self.source.bytes()[start..self.position.offset]).into_owned()
    }

    fn key(&mut self, start: Position) -> Result<TokenKind, Diagnostic> {
        if !self.peek().is_some_and(Self::is_word_byte) {
            return Err(self.error(self.position, "Unexpected character after ':'"));
        }
        let name = self.collect_word(start.offset + 1);
        Ok(TokenKind::Key(name))
    }

    fn keyword(&mut self, start: Position) -> Result<TokenKind, Diagnostic> {
        let word = self.collect_word(start.offset);
        keyword_for(&word)
            .map(TokenKind::Keyword)
            .ok_or_else(|| self.error(start, "Unrecognized token"))
    }

    fn number(&mut self, start: Position) -> TokenKind {
        while self.peek().is_some_and(|byte| byte.is_ascii_digit()) {
            self.bump();
        }
        let is_float = self.peek() == Some(b'.')
            && self.peek_at(1).is_some_and(|byte| byte.is_ascii_digit());
        if is_float {
            self.bump();
            while self.peek().is_some_and(|byte| byte.is_ascii_digit()) {
                self.bump();
            }
        }
        let text = String::from_utf8_lossy(&self.source.bytes()[start.offset..self.position.offset])
            .into_owned();
        if !is_float {
            if let Ok(value) = text.parse::<i64>() {
                return TokenKind::Int(value);
            }
        }
        TokenKind::Float(text.parse::<f64>().unwrap_or(f64::INFINITY))
    }

    fn string(&mut self, start: Position) -> Result<TokenKind, Diagnostic> {
        let mut value = Vec::new();
        loop {
            match self.peek() {
                None | Some(b'\n') => {
                    return Err(self.error(
                        start,
                        "Unexpected end-of-line while parsing a string",
                    ));
                }
                Some(b'"') => {
                    self.bump();
                    return Ok(TokenKind::String(value.into()));
                }
                Some(b'\\') => {
                    self.bump();
                    match self.bump() {
                        Some(b'n') => value.push(b'\n'),
                        Some(b't') => value.push(b'\t'),
                        Some(b'r') => value.push(b'\r'),
                        Some(b'"') => value.push(b'"'),
                        Some(b'\\') => value.push(b'\\'),
                        Some(b'\n') | None => {
                            return Err(self.error(
                                start,
                                "Unexpected end-of-line while parsing a string",
                            ));
                        }
                        Some(other) => {
                            value.push(b'\\');
                            value.push(other);
                        }
                    }
                }
                Some(byte) => {
                    self.bump();
                    value.push(byte);
                }
            }
        }
    }

    /// Lexes the remaining input in one go.
    pub fn tokenize(mut self) -> Result<Vec<Token>, Diagnostic> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }
}

fn keyword_for(word: &str) -> Option<Keyword> {
    use self::Keyword as Kw;
    let keyword = match word {
        "log" => Kw::Log,
        "show" => Kw::Show,
        "routine" => Kw::Routine,
        "if" => Kw::If,
        "else" => Kw::Else,
        "loop" => Kw::Loop,
        "Void" => Kw::Void,
        "at" => Kw::At,
        "sizeof" => Kw::Sizeof,
        "through" => Kw::Through,
        "break" => Kw::Break,
        "skip" => Kw::Skip,
        "to" => Kw::To,
        "blame" => Kw::Blame,
        "catch" => Kw::Catch,
        "with" => Kw::With,
        "typeof" => Kw::Typeof,
        "getstring" => Kw::GetString,
        "match" => Kw::Match,
        "load" => Kw::Load,
        _ => return None,
    };
    Some(keyword)
}
