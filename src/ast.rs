use std::rc::Rc;

use crate::diagnostics::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Equal,
    NotEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    At,
    To,
    Redirect,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Equal => "=",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::Greater => ">",
            BinaryOp::LessEqual => "<=",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::At => "at",
            BinaryOp::To => "to",
            BinaryOp::Redirect => "<<",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
    Sizeof,
    Typeof,
    GetString,
}

/// `?=` plain assignment, or one of the compound forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Set,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl AssignOp {
    /// The arithmetic applied by a compound assignment.
    pub fn binary(self) -> Option<BinaryOp> {
        match self {
            AssignOp::Set => None,
            AssignOp::Add => Some(BinaryOp::Add),
            AssignOp::Sub => Some(BinaryOp::Sub),
            AssignOp::Mul => Some(BinaryOp::Mul),
            AssignOp::Div => Some(BinaryOp::Div),
            AssignOp::Mod => Some(BinaryOp::Mod),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub position: Position,
}

impl Expr {
    pub fn new(kind: ExprKind, position: Position) -> Self {
        Self { kind, position }
    }
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Int(i64),
    Float(f64),
    String(Rc<[u8]>),
    Void,
    Key(String),
    Stack(Vec<Expr>),
    Routine(Rc<RoutineDecl>),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Blame(Option<Box<Expr>>),
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Member {
        target: Box<Expr>,
        key: String,
    },
    Assign {
        target: AssignTarget,
        op: AssignOp,
        value: Box<Expr>,
    },
    Match(Box<MatchExpr>),
}

#[derive(Debug, Clone)]
pub enum AssignTarget {
    At { target: Box<Expr>, index: Box<Expr> },
    Member { target: Box<Expr>, key: String },
    Key(String),
}

#[derive(Debug)]
pub struct RoutineDecl {
    pub params: Vec<String>,
    pub body: Vec<Instruction>,
}

#[derive(Debug, Clone)]
pub struct MatchExpr {
    pub subject: Expr,
    pub cases: Vec<MatchCase>,
    pub otherwise: Option<Vec<Instruction>>,
}

#[derive(Debug, Clone)]
pub struct MatchCase {
    pub values: Vec<Expr>,
    pub body: Vec<Instruction>,
}

#[derive(Debug, Clone)]
pub struct Instruction {
    pub kind: InstructionKind,
    pub position: Position,
}

/// The body of an `if` or `else` arm.
#[derive(Debug, Clone)]
pub enum Arm {
    Block(Vec<Instruction>),
    Single(Box<Instruction>),
}

#[derive(Debug, Clone)]
pub enum LoopKind {
    Forever,
    While(Expr),
    Through {
        key: String,
        iterable: Expr,
        condition: Option<Expr>,
    },
}

#[derive(Debug, Clone)]
pub enum InstructionKind {
    Log(Vec<Expr>),
    Show(Vec<Expr>),
    If {
        condition: Expr,
        then_arm: Arm,
        else_arm: Option<Arm>,
    },
    Loop {
        kind: LoopKind,
        body: Vec<Instruction>,
    },
    Expr(Expr),
    Return(Option<Expr>),
    Break,
    Skip,
    Catch {
        expr: Expr,
        binding: Option<String>,
        handler: Vec<Instruction>,
        otherwise: Option<Vec<Instruction>>,
    },
    Load(String),
}

/// A parsed source file or code string.
#[derive(Debug, Default)]
pub struct Program {
    pub instructions: Vec<Instruction>,
}
