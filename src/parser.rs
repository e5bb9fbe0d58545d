use std::rc::Rc;

use crate::{
    ast::{
        Arm, AssignOp, AssignTarget, BinaryOp, Expr, ExprKind, Instruction, InstructionKind,
        LogicalOp, LoopKind, MatchCase, MatchExpr, Program, RoutineDecl, UnaryOp,
    },
    diagnostics::{Diagnostic, DiagnosticKind, Position, Source},
    lexer::{Keyword, Lexer, LexerState, Token, TokenKind},
};

type ParseResult<T> = Result<T, Diagnostic>;

/// Parses a whole program.
pub fn parse_program(source: Rc<Source>) -> Result<Program, Diagnostic> {
    let program = Parser::new(source).parse_program()?;
    tracing::debug!(
        instructions = program.instructions.len(),
        "parsed program"
    );
    Ok(program)
}

/// Parses a single expression (or assignment) spanning the whole source.
pub fn parse_expression(source: Rc<Source>) -> Result<Expr, Diagnostic> {
    Parser::new(source).parse_standalone_expression()
}

#[derive(Clone, Copy)]
enum Infix {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

impl Infix {
    fn symbol(self) -> &'static str {
        match self {
            Infix::Binary(op) => op.symbol(),
            Infix::Logical(LogicalOp::And) => "&",
            Infix::Logical(LogicalOp::Or) => "|",
        }
    }

    fn build(self, left: Expr, right: Expr, position: Position) -> Expr {
        let kind = match self {
            Infix::Binary(op) => ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            Infix::Logical(op) => ExprKind::Logical {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
        };
        Expr::new(kind, position)
    }
}

type Operand = fn(&mut Parser) -> ParseResult<Option<Expr>>;
type Operator = fn(&TokenKind) -> Option<Infix>;

fn redirect_operator(kind: &TokenKind) -> Option<Infix> {
    match kind {
        TokenKind::Redirect => Some(Infix::Binary(BinaryOp::Redirect)),
        _ => None,
    }
}

fn or_operator(kind: &TokenKind) -> Option<Infix> {
    match kind {
        TokenKind::Pipe => Some(Infix::Logical(LogicalOp::Or)),
        _ => None,
    }
}

fn and_operator(kind: &TokenKind) -> Option<Infix> {
    match kind {
        TokenKind::Ampersand => Some(Infix::Logical(LogicalOp::And)),
        _ => None,
    }
}

fn comparison_operator(kind: &TokenKind) -> Option<Infix> {
    let op = match kind {
        TokenKind::Equal => BinaryOp::Equal,
        TokenKind::BangEqual => BinaryOp::NotEqual,
        TokenKind::Less => BinaryOp::Less,
        TokenKind::Greater => BinaryOp::Greater,
        TokenKind::LessEqual => BinaryOp::LessEqual,
        TokenKind::GreaterEqual => BinaryOp::GreaterEqual,
        _ => return None,
    };
    Some(Infix::Binary(op))
}

/// Reads an already parsed expression as an assignment target, handing it
/// back unchanged when it cannot be assigned to.
fn assign_target(expr: Expr) -> Result<AssignTarget, Expr> {
    let position = expr.position;
    match expr.kind {
        ExprKind::Key(name) => Ok(AssignTarget::Key(name)),
        ExprKind::Member { target, key } => Ok(AssignTarget::Member { target, key }),
        ExprKind::Binary {
            op: BinaryOp::At,
            left,
            right,
        } => Ok(AssignTarget::At {
            target: left,
            index: right,
        }),
        kind => Err(Expr::new(kind, position)),
    }
}

struct Parser {
    lexer: Lexer,
    can_return: bool,
    in_loop: bool,
    furthest: Position,
}

impl Parser {
    fn new(source: Rc<Source>) -> Self {
        Self {
            lexer: Lexer::new(source),
            can_return: false,
            in_loop: false,
            furthest: Position::start(),
        }
    }

    fn parse_program(&mut self) -> ParseResult<Program> {
        self.accept(&TokenKind::Newline)?;
        let mut instructions = Vec::new();
        while let Some(instruction) = self.parse_instruction()? {
            instructions.push(instruction);
        }
        if self.peek()?.is_some() {
            return Err(self.error_here("Unexpected token"));
        }
        Ok(Program { instructions })
    }

    fn parse_standalone_expression(&mut self) -> ParseResult<Expr> {
        self.accept(&TokenKind::Newline)?;
        let Some(expr) = self.parse_assign_or_expr()? else {
            return Err(self.error_here("Expected an expression"));
        };
        self.accept(&TokenKind::Newline)?;
        if self.peek()?.is_some() {
            return Err(self.error_here("Unexpected token after expression"));
        }
        Ok(expr)
    }

    // ----- token helpers -----

    fn next(&mut self) -> ParseResult<Option<Token>> {
        let token = self.lexer.next_token()?;
        if let Some(token) = &token {
            if token.position.offset > self.furthest.offset {
                self.furthest = token.position;
            }
        }
        Ok(token)
    }

    fn snapshot(&self) -> LexerState {
        self.lexer.snapshot()
    }

    fn restore(&mut self, state: LexerState) {
        self.lexer.restore(state);
    }

    fn peek(&mut self) -> ParseResult<Option<Token>> {
        let state = self.snapshot();
        let token = self.lexer.next_token();
        self.restore(state);
        token
    }

    fn peek_position(&mut self) -> Position {
        let state = self.snapshot();
        let position = match self.lexer.next_token() {
            Ok(Some(token)) => token.position,
            _ => self.lexer.position(),
        };
        self.restore(state);
        position
    }

    fn accept(&mut self, kind: &TokenKind) -> ParseResult<bool> {
        let state = self.snapshot();
        match self.next()? {
            Some(token) if token.kind == *kind => Ok(true),
            _ => {
                self.restore(state);
                Ok(false)
            }
        }
    }

    fn accept_keyword(&mut self, keyword: Keyword) -> ParseResult<bool> {
        self.accept(&TokenKind::Keyword(keyword))
    }

    fn skip_newline(&mut self) -> ParseResult<()> {
        self.accept(&TokenKind::Newline)?;
        Ok(())
    }

    fn accept_key(&mut self) -> ParseResult<Option<(String, Position)>> {
        let state = self.snapshot();
        match self.next()? {
            Some(Token {
                kind: TokenKind::Key(name),
                position,
            }) => Ok(Some((name, position))),
            _ => {
                self.restore(state);
                Ok(None)
            }
        }
    }

    fn at_terminator(&mut self) -> ParseResult<bool> {
        Ok(matches!(
            self.peek()?.map(|token| token.kind),
            None | Some(TokenKind::Newline) | Some(TokenKind::RBrace)
        ))
    }

    fn error_at(&self, position: Position, message: &str) -> Diagnostic {
        Diagnostic::new(DiagnosticKind::Parser, message)
            .with_position(position)
            .with_source(Rc::clone(self.lexer.source()))
    }

    /// An error at the furthest point the parser has reached.
    fn error_here(&mut self, message: &str) -> Diagnostic {
        let next = self.peek_position();
        let position = if self.furthest.offset > next.offset {
            self.furthest
        } else {
            next
        };
        self.error_at(position, message)
    }

    fn with_flags<T>(
        &mut self,
        can_return: bool,
        in_loop: bool,
        parse: impl FnOnce(&mut Self) -> ParseResult<T>,
    ) -> ParseResult<T> {
        let saved = (self.can_return, self.in_loop);
        self.can_return = can_return;
        self.in_loop = in_loop;
        let result = parse(self);
        (self.can_return, self.in_loop) = saved;
        result
    }

    // ----- instructions -----

    fn parse_instruction(&mut self) -> ParseResult<Option<Instruction>> {
        let Some(instruction) = self.parse_instruction_body()? else {
            return Ok(None);
        };
        self.expect_terminator()?;
        Ok(Some(instruction))
    }

    fn expect_terminator(&mut self) -> ParseResult<()> {
        let state = self.snapshot();
        match self.next()? {
            None | Some(Token {
                kind: TokenKind::Newline,
                ..
            }) => Ok(()),
            Some(Token {
                kind: TokenKind::RBrace,
                ..
            }) => {
                self.restore(state);
                Ok(())
            }
            Some(token) => Err(self.error_at(token.position, "Expected a newline after instruction")),
        }
    }

    fn parse_instruction_body(&mut self) -> ParseResult<Option<Instruction>> {
        let state = self.snapshot();
        let Some(token) = self.next()? else {
            return Ok(None);
        };
        let position = token.position;

        let kind = match token.kind {
            TokenKind::Keyword(Keyword::Log) => {
                let values = if self.at_terminator()? {
                    Vec::new()
                } else {
                    self.parse_csv("log")?
                };
                InstructionKind::Log(values)
            }
            TokenKind::Keyword(Keyword::Show) => InstructionKind::Show(self.parse_csv("show")?),
            TokenKind::Keyword(Keyword::If) => self.parse_if()?,
            TokenKind::Keyword(Keyword::Loop) => self.parse_loop()?,
            TokenKind::Keyword(Keyword::Catch) => self.parse_catch()?,
            TokenKind::Keyword(Keyword::Load) => match self.accept_key()? {
                Some((name, _)) => InstructionKind::Load(name),
                None => return Err(self.error_here("Expected a module key after 'load'")),
            },
            TokenKind::Caret => {
                if !self.can_return {
                    return Err(self.error_at(position, "Unexpected '^' outside of a routine"));
                }
                if self.at_terminator()? {
                    InstructionKind::Return(None)
                } else {
                    match self.parse_assign_or_expr()? {
                        Some(expr) => InstructionKind::Return(Some(expr)),
                        None => {
                            return Err(
                                self.error_here("Expected an expression or nothing after '^'")
                            );
                        }
                    }
                }
            }
            TokenKind::Keyword(Keyword::Break) => {
                if !self.in_loop {
                    return Err(self.error_at(position, "Unexpected 'break' outside of a loop"));
                }
                InstructionKind::Break
            }
            TokenKind::Keyword(Keyword::Skip) => {
                if !self.in_loop {
                    return Err(self.error_at(position, "Unexpected 'skip' outside of a loop"));
                }
                InstructionKind::Skip
            }
            _ => {
                self.restore(state);
                match self.parse_assign_or_expr()? {
                    Some(expr) => InstructionKind::Expr(expr),
                    None => return Ok(None),
                }
            }
        };

        Ok(Some(Instruction { kind, position }))
    }

    fn parse_csv(&mut self, after: &str) -> ParseResult<Vec<Expr>> {
        let Some(first) = self.parse_expr()? else {
            return Err(self.error_here(&format!("Expected a value after '{after}'")));
        };
        let mut values = vec![first];
        while self.accept(&TokenKind::Comma)? {
            self.skip_newline()?;
            match self.parse_expr()? {
                Some(value) => values.push(value),
                None => return Err(self.error_here("Expected a value after ','")),
            }
        }
        Ok(values)
    }

    fn parse_block(&mut self) -> ParseResult<Option<Vec<Instruction>>> {
        if !self.accept(&TokenKind::LBrace)? {
            return Ok(None);
        }
        self.skip_newline()?;
        let mut body = Vec::new();
        loop {
            if self.accept(&TokenKind::RBrace)? {
                return Ok(Some(body));
            }
            match self.parse_instruction()? {
                Some(instruction) => body.push(instruction),
                None => return Err(self.error_here("Expected '}'")),
            }
        }
    }

    fn expect_block(&mut self, message: &str) -> ParseResult<Vec<Instruction>> {
        match self.parse_block()? {
            Some(block) => Ok(block),
            None => Err(self.error_here(message)),
        }
    }

    fn parse_arm(&mut self) -> ParseResult<Option<Arm>> {
        if let Some(block) = self.parse_block()? {
            return Ok(Some(Arm::Block(block)));
        }
        Ok(self
            .parse_instruction_body()?
            .map(|instruction| Arm::Single(Box::new(instruction))))
    }

    fn parse_if(&mut self) -> ParseResult<InstructionKind> {
        let Some(condition) = self.parse_expr()? else {
            return Err(self.error_here("Expected a condition after 'if'"));
        };
        let Some(then_arm) = self.parse_arm()? else {
            return Err(self.error_here("Expected a block or an instruction after the condition"));
        };

        let state = self.snapshot();
        self.skip_newline()?;
        let else_arm = if self.accept_keyword(Keyword::Else)? {
            match self.parse_arm()? {
                Some(arm) => Some(arm),
                None => {
                    return Err(self.error_here("Expected a block or an instruction after 'else'"))
                }
            }
        } else {
            self.restore(state);
            None
        };

        Ok(InstructionKind::If {
            condition,
            then_arm,
            else_arm,
        })
    }

    fn parse_loop(&mut self) -> ParseResult<InstructionKind> {
        if matches!(self.peek()?.map(|token| token.kind), Some(TokenKind::LBrace)) {
            let body = self.parse_loop_body()?;
            return Ok(InstructionKind::Loop {
                kind: LoopKind::Forever,
                body,
            });
        }

        if let Some(kind) = self.parse_through()? {
            let body = self.parse_loop_body()?;
            return Ok(InstructionKind::Loop { kind, body });
        }

        let Some(condition) = self.parse_expr()? else {
            return Err(self.error_here("Expected a block, a condition or a key after 'loop'"));
        };
        let body = self.parse_loop_body()?;
        Ok(InstructionKind::Loop {
            kind: LoopKind::While(condition),
            body,
        })
    }

    fn parse_through(&mut self) -> ParseResult<Option<LoopKind>> {
        let state = self.snapshot();
        let Some((key, _)) = self.accept_key()? else {
            return Ok(None);
        };
        if !self.accept_keyword(Keyword::Through)? {
            self.restore(state);
            return Ok(None);
        }
        let Some(iterable) = self.parse_expr()? else {
            return Err(self.error_here("Expected an iterable after 'through'"));
        };
        let condition = if self.accept(&TokenKind::Comma)? {
            match self.parse_expr()? {
                Some(condition) => Some(condition),
                None => return Err(self.error_here("Expected a condition after ','")),
            }
        } else {
            None
        };
        Ok(Some(LoopKind::Through {
            key,
            iterable,
            condition,
        }))
    }

    fn parse_loop_body(&mut self) -> ParseResult<Vec<Instruction>> {
        let can_return = self.can_return;
        self.with_flags(can_return, true, |parser| {
            parser.expect_block("Expected a block after loop header")
        })
    }

    fn parse_catch(&mut self) -> ParseResult<InstructionKind> {
        let Some(expr) = self.parse_expr()? else {
            return Err(self.error_here("Expected an expression after 'catch'"));
        };
        let binding = if self.accept_keyword(Keyword::With)? {
            match self.accept_key()? {
                Some((name, _)) => Some(name),
                None => return Err(self.error_here("Expected a key after 'with'")),
            }
        } else {
            None
        };
        let handler = self.expect_block("Expected a block after catch expression")?;

        let state = self.snapshot();
        self.skip_newline()?;
        let otherwise = if self.accept_keyword(Keyword::Else)? {
            Some(self.expect_block("Expected a block after 'else'")?)
        } else {
            self.restore(state);
            None
        };

        Ok(InstructionKind::Catch {
            expr,
            binding,
            handler,
            otherwise,
        })
    }

    // ----- expressions -----

    /// Parses an assignment or a plain expression. The left-hand side is
    /// parsed once; without an assignment operator it becomes the first
    /// operand of the expression.
    fn parse_assign_or_expr(&mut self) -> ParseResult<Option<Expr>> {
        let position = self.peek_position();
        let Some(lhs) = self.parse_at()? else {
            return Ok(None);
        };

        let state = self.snapshot();
        let lhs = match self.accept_assign_op()? {
            Some(op) => match assign_target(lhs) {
                Ok(target) => return self.finish_assignment(target, op, position).map(Some),
                Err(lhs) => {
                    self.restore(state);
                    lhs
                }
            },
            None => lhs,
        };
        self.continue_expr(lhs).map(Some)
    }

    fn finish_assignment(
        &mut self,
        target: AssignTarget,
        op: AssignOp,
        position: Position,
    ) -> ParseResult<Expr> {
        let Some(value) = self.parse_assign_or_expr()? else {
            return Err(self.error_here("Expected a value after the assignment operator"));
        };
        Ok(Expr::new(
            ExprKind::Assign {
                target,
                op,
                value: Box::new(value),
            },
            position,
        ))
    }

    fn accept_assign_op(&mut self) -> ParseResult<Option<AssignOp>> {
        let state = self.snapshot();
        let op = match self.next()?.map(|token| token.kind) {
            Some(TokenKind::SetEqual) => AssignOp::Set,
            Some(TokenKind::PlusEqual) => AssignOp::Add,
            Some(TokenKind::MinusEqual) => AssignOp::Sub,
            Some(TokenKind::StarEqual) => AssignOp::Mul,
            Some(TokenKind::SlashEqual) => AssignOp::Div,
            Some(TokenKind::PercentEqual) => AssignOp::Mod,
            _ => {
                self.restore(state);
                return Ok(None);
            }
        };
        Ok(Some(op))
    }

    fn parse_expr(&mut self) -> ParseResult<Option<Expr>> {
        self.parse_redirect()
    }

    /// Finishes an expression whose `at`-level prefix is already parsed.
    fn continue_expr(&mut self, prefix: Expr) -> ParseResult<Expr> {
        let expr = self.continue_infix(prefix, Self::parse_at, comparison_operator)?;
        let expr = self.continue_infix(expr, Self::parse_comparison, and_operator)?;
        let expr = self.continue_infix(expr, Self::parse_and, or_operator)?;
        self.continue_infix(expr, Self::parse_or, redirect_operator)
    }

    fn parse_infix(&mut self, operand: Operand, operator: Operator) -> ParseResult<Option<Expr>> {
        let Some(left) = operand(self)? else {
            return Ok(None);
        };
        self.continue_infix(left, operand, operator).map(Some)
    }

    fn continue_infix(
        &mut self,
        mut left: Expr,
        operand: Operand,
        operator: Operator,
    ) -> ParseResult<Expr> {
        loop {
            let state = self.snapshot();
            let infix = self
                .next()?
                .and_then(|token| operator(&token.kind).map(|infix| (infix, token.position)));
            let Some((infix, position)) = infix else {
                self.restore(state);
                return Ok(left);
            };
            let Some(right) = operand(self)? else {
                return Err(
                    self.error_here(&format!("Expected a value after '{}'", infix.symbol()))
                );
            };
            left = infix.build(left, right, position);
        }
    }

    fn parse_redirect(&mut self) -> ParseResult<Option<Expr>> {
        self.parse_infix(Self::parse_or, redirect_operator)
    }

    fn parse_or(&mut self) -> ParseResult<Option<Expr>> {
        self.parse_infix(Self::parse_and, or_operator)
    }

    fn parse_and(&mut self) -> ParseResult<Option<Expr>> {
        self.parse_infix(Self::parse_comparison, and_operator)
    }

    fn parse_comparison(&mut self) -> ParseResult<Option<Expr>> {
        self.parse_infix(Self::parse_at, comparison_operator)
    }

    fn parse_at(&mut self) -> ParseResult<Option<Expr>> {
        self.parse_infix(Self::parse_range, |kind| match kind {
            TokenKind::Keyword(Keyword::At) => Some(Infix::Binary(BinaryOp::At)),
            _ => None,
        })
    }

    fn parse_range(&mut self) -> ParseResult<Option<Expr>> {
        self.parse_infix(Self::parse_sum, |kind| match kind {
            TokenKind::Keyword(Keyword::To) => Some(Infix::Binary(BinaryOp::To)),
            _ => None,
        })
    }

    fn parse_sum(&mut self) -> ParseResult<Option<Expr>> {
        self.parse_infix(Self::parse_product, |kind| match kind {
            TokenKind::Plus => Some(Infix::Binary(BinaryOp::Add)),
            TokenKind::Minus => Some(Infix::Binary(BinaryOp::Sub)),
            _ => None,
        })
    }

    fn parse_product(&mut self) -> ParseResult<Option<Expr>> {
        self.parse_infix(Self::parse_unary, |kind| match kind {
            TokenKind::Star => Some(Infix::Binary(BinaryOp::Mul)),
            TokenKind::Slash => Some(Infix::Binary(BinaryOp::Div)),
            TokenKind::Percent => Some(Infix::Binary(BinaryOp::Mod)),
            _ => None,
        })
    }

    fn parse_unary(&mut self) -> ParseResult<Option<Expr>> {
        let state = self.snapshot();
        let Some(token) = self.next()? else {
            return Ok(None);
        };
        let (op, symbol) = match token.kind {
            TokenKind::Minus => (UnaryOp::Negate, "-"),
            TokenKind::Bang => (UnaryOp::Not, "!"),
            TokenKind::Keyword(Keyword::Sizeof) => (UnaryOp::Sizeof, "sizeof"),
            TokenKind::Keyword(Keyword::Typeof) => (UnaryOp::Typeof, "typeof"),
            TokenKind::Keyword(Keyword::GetString) => (UnaryOp::GetString, "getstring"),
            TokenKind::Keyword(Keyword::Blame) => {
                let message = self.parse_unary()?.map(Box::new);
                return Ok(Some(Expr::new(ExprKind::Blame(message), token.position)));
            }
            _ => {
                self.restore(state);
                return self.parse_suffix();
            }
        };
        let Some(operand) = self.parse_unary()? else {
            return Err(self.error_here(&format!("Expected a value after '{symbol}'")));
        };
        Ok(Some(Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            token.position,
        )))
    }

    fn parse_suffix(&mut self) -> ParseResult<Option<Expr>> {
        let Some(mut expr) = self.parse_single()? else {
            return Ok(None);
        };
        loop {
            let state = self.snapshot();
            match self.next()?.map(|token| token.kind) {
                Some(TokenKind::LParen) => {
                    let args = self.parse_arguments()?;
                    let position = expr.position;
                    expr = Expr::new(
                        ExprKind::Call {
                            callee: Box::new(expr),
                            args,
                        },
                        position,
                    );
                }
                Some(TokenKind::Key(key)) => {
                    let position = expr.position;
                    expr = Expr::new(
                        ExprKind::Member {
                            target: Box::new(expr),
                            key,
                        },
                        position,
                    );
                }
                _ => {
                    self.restore(state);
                    return Ok(Some(expr));
                }
            }
        }
    }

    fn parse_arguments(&mut self) -> ParseResult<Vec<Expr>> {
        self.skip_newline()?;
        let mut args = Vec::new();
        if self.accept(&TokenKind::RParen)? {
            return Ok(args);
        }
        loop {
            match self.parse_expr()? {
                Some(arg) => args.push(arg),
                None => return Err(self.error_here("Expected an argument")),
            }
            self.skip_newline()?;
            if self.accept(&TokenKind::RParen)? {
                return Ok(args);
            }
            if !self.accept(&TokenKind::Comma)? {
                return Err(self.error_here("Expected ',' or ')' in argument list"));
            }
            self.skip_newline()?;
        }
    }

    fn parse_single(&mut self) -> ParseResult<Option<Expr>> {
        let state = self.snapshot();
        let Some(token) = self.next()? else {
            return Ok(None);
        };
        let position = token.position;
        let kind = match token.kind {
            TokenKind::Int(value) => ExprKind::Int(value),
            TokenKind::Float(value) => ExprKind::Float(value),
            TokenKind::String(bytes) => ExprKind::String(bytes),
            TokenKind::Key(name) => ExprKind::Key(name),
            TokenKind::Keyword(Keyword::Void) => ExprKind::Void,
            TokenKind::Keyword(Keyword::Routine) => self.parse_routine()?,
            TokenKind::Keyword(Keyword::Match) => self.parse_match()?,
            TokenKind::LBrace => self.parse_stack()?,
            TokenKind::LParen => return self.parse_paren(position).map(Some),
            _ => {
                self.restore(state);
                return Ok(None);
            }
        };
        Ok(Some(Expr::new(kind, position)))
    }

    fn parse_paren(&mut self, open: Position) -> ParseResult<Expr> {
        let Some(expr) = self.parse_assign_or_expr()? else {
            if matches!(self.peek()?.map(|token| token.kind), Some(TokenKind::RParen)) {
                return Err(self.error_here("Expected an expression inside parentheses"));
            }
            return Err(self.error_at(open, "Unmatched '('"));
        };
        if self.accept(&TokenKind::RParen)? {
            return Ok(expr);
        }
        Err(self.error_at(open, "Unmatched '('"))
    }

    fn parse_stack(&mut self) -> ParseResult<ExprKind> {
        self.skip_newline()?;
        let mut entries = Vec::new();
        if self.accept(&TokenKind::RBrace)? {
            return Ok(ExprKind::Stack(entries));
        }
        loop {
            match self.parse_expr()? {
                Some(entry) => entries.push(entry),
                None => return Err(self.error_here("Expected a value in stack literal")),
            }
            self.skip_newline()?;
            if self.accept(&TokenKind::RBrace)? {
                return Ok(ExprKind::Stack(entries));
            }
            if !self.accept(&TokenKind::Comma)? {
                return Err(self.error_here("Expected ',' or '}' in stack literal"));
            }
            self.skip_newline()?;
        }
    }

    fn parse_routine(&mut self) -> ParseResult<ExprKind> {
        if !self.accept(&TokenKind::LParen)? {
            return Err(self.error_here("Expected '(' after 'routine'"));
        }
        self.skip_newline()?;
        let mut params: Vec<String> = Vec::new();
        if !self.accept(&TokenKind::RParen)? {
            loop {
                let Some((name, position)) = self.accept_key()? else {
                    return Err(self.error_here("Expected a key as routine parameter"));
                };
                if params.contains(&name) {
                    return Err(self.error_at(
                        position,
                        &format!("Duplicate parameter name ':{name}'"),
                    ));
                }
                params.push(name);
                self.skip_newline()?;
                if self.accept(&TokenKind::RParen)? {
                    break;
                }
                if !self.accept(&TokenKind::Comma)? {
                    return Err(self.error_here("Expected ',' or ')' after routine parameter"));
                }
                self.skip_newline()?;
            }
        }

        let body = self.with_flags(true, false, |parser| {
            parser.expect_block("Expected a block after routine declaration")
        })?;
        Ok(ExprKind::Routine(Rc::new(RoutineDecl { params, body })))
    }

    fn parse_match(&mut self) -> ParseResult<ExprKind> {
        let Some(subject) = self.parse_expr()? else {
            return Err(self.error_here("Expected a value after 'match'"));
        };
        if !self.accept(&TokenKind::LBrace)? {
            return Err(self.error_here("Expected '{' after match value"));
        }
        self.skip_newline()?;

        let in_loop = self.in_loop;
        let mut cases = Vec::new();
        let mut otherwise = None;
        loop {
            if self.accept(&TokenKind::RBrace)? {
                break;
            }
            if otherwise.is_none() && self.accept_keyword(Keyword::With)? {
                let values = self.parse_csv("with")?;
                let body = self.with_flags(true, in_loop, |parser| {
                    parser.expect_block("Expected a block after match case")
                })?;
                cases.push(MatchCase { values, body });
            } else if otherwise.is_none() && self.accept_keyword(Keyword::Else)? {
                otherwise = Some(self.with_flags(true, in_loop, |parser| {
                    parser.expect_block("Expected a block after 'else'")
                })?);
            } else {
                return Err(self.error_here("Expected 'with', 'else' or '}' inside match"));
            }
            self.skip_newline()?;
        }

        Ok(ExprKind::Match(Box::new(MatchExpr {
            subject,
            cases,
            otherwise,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Program {
        parse_program(Source::anonymous(text)).expect("parse should succeed")
    }

    fn parse_error(text: &str) -> Diagnostic {
        match parse_program(Source::anonymous(text)) {
            Ok(program) => panic!("expected parse error, got {program:?}"),
            Err(err) => err,
        }
    }

    fn single_expr(text: &str) -> Expr {
        let mut program = parse(text);
        assert_eq!(program.instructions.len(), 1);
        match program.instructions.remove(0).kind {
            InstructionKind::Expr(expr) => expr,
            other => panic!("expected expression statement, got {other:?}"),
        }
    }

    #[test]
    fn product_binds_tighter_than_sum() {
        let expr = single_expr("1 + 2 * 3");
        match expr.kind {
            ExprKind::Binary {
                op: BinaryOp::Add,
                right,
                ..
            } => assert!(matches!(
                right.kind,
                ExprKind::Binary {
                    op: BinaryOp::Mul,
                    ..
                }
            )),
            other => panic!("unexpected tree {other:?}"),
        }
    }

    #[test]
    fn key_assignment_is_not_a_comparison() {
        let expr = single_expr(":a ?= 1");
        assert!(matches!(
            expr.kind,
            ExprKind::Assign {
                target: AssignTarget::Key(ref name),
                op: AssignOp::Set,
                ..
            } if name == "a"
        ));
    }

    #[test]
    fn unmatched_paren_reports_open_position() {
        let err = parse_error("log (1");
        assert_eq!(err.message, "Unmatched '('");
        assert_eq!(err.position, Some(Position::new(4, 1, 5)));
    }

    #[test]
    fn paren_holds_an_assignment() {
        let expr = single_expr("(:a ?= 2) + 1");
        match expr.kind {
            ExprKind::Binary { left, .. } => {
                assert!(matches!(left.kind, ExprKind::Assign { .. }))
            }
            other => panic!("unexpected tree {other:?}"),
        }
    }

    #[test]
    fn target_without_operator_continues_as_expression() {
        let mut parser = Parser::new(Source::anonymous(":a at 1 + 2 = 3 & :b"));
        let expr = parser.parse_assign_or_expr().unwrap().unwrap();
        assert!(matches!(
            expr.kind,
            ExprKind::Logical {
                op: LogicalOp::And,
                ..
            }
        ));
        assert!(parser.next().unwrap().is_none());
    }

    #[test]
    fn unassignable_target_is_left_for_the_caller() {
        let mut parser = Parser::new(Source::anonymous("1 ?= 2"));
        let expr = parser.parse_assign_or_expr().unwrap().unwrap();
        assert!(matches!(expr.kind, ExprKind::Int(1)));
        assert_eq!(
            parser.next().unwrap().map(|token| token.kind),
            Some(TokenKind::SetEqual)
        );
    }

    #[test]
    fn assignment_targets_by_shape() {
        let cases = [
            (":s at 0 ?= 1", "at"),
            (":m:k += 1", "member"),
            (":k -= 1", "key"),
        ];
        for (text, expected) in cases {
            let kind = match single_expr(text).kind {
                ExprKind::Assign { target, .. } => match target {
                    AssignTarget::At { .. } => "at",
                    AssignTarget::Member { .. } => "member",
                    AssignTarget::Key(_) => "key",
                },
                other => panic!("expected an assignment, got {other:?}"),
            };
            assert_eq!(kind, expected, "{text}");
        }
    }

    #[test]
    fn nested_routine_assignments_parse_in_linear_time() {
        let depth = 40;
        let mut code = String::new();
        for level in 0..depth {
            code.push_str(&format!(":f{level} ?= routine() {{\n"));
        }
        code.push_str("^1\n");
        for level in (0..depth).rev() {
            code.push_str(&format!("^:f{level}\n}}\n"));
        }
        let program = parse(code.trim_end());
        assert_eq!(program.instructions.len(), 1);

        let nested = format!("{}1{}", "(:a ?= ".repeat(depth), ")".repeat(depth));
        assert!(matches!(single_expr(&nested).kind, ExprKind::Assign { .. }));
    }

    #[test]
    fn return_requires_routine_context() {
        assert_eq!(
            parse_error("^ 1").message,
            "Unexpected '^' outside of a routine"
        );
        parse("routine() { ^ 1 }");
    }

    #[test]
    fn break_requires_loop_context() {
        assert_eq!(
            parse_error("break").message,
            "Unexpected 'break' outside of a loop"
        );
        assert_eq!(
            parse_error("loop { :f ?= routine() { skip } }").message,
            "Unexpected 'skip' outside of a loop"
        );
    }

    #[test]
    fn duplicate_parameters_are_rejected() {
        let err = parse_error(":f ?= routine(:a, :b, :a) { }");
        assert_eq!(err.message, "Duplicate parameter name ':a'");
    }

    #[test]
    fn standalone_expression_rejects_trailing_tokens() {
        assert!(parse_expression(Source::anonymous("1 + 2")).is_ok());
        assert!(parse_expression(Source::anonymous("1 + 2 )")).is_err());
    }
}
