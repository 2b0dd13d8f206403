//! Abstract syntax tree produced by the parser.
//!
//! Nodes are immutable once built. Children are held through `Rc` so the
//! stepwise evaluator can keep a handle on any subtree between steps; a
//! function literal is additionally shared by every closure created from it.

use std::fmt;
use std::rc::Rc;

use crate::token::{Position, Token};

/// Source range of a node: the start of its first token and the start of
/// its last token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    pub fn between(start: &Token, end: &Token) -> Self {
        Self::new(start.position, end.position)
    }

    pub fn to(self, end: Span) -> Self {
        Self::new(self.start, end.end)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Rc<Statement>>,
    pub span: Span,
}

impl Program {
    pub fn position(&self) -> Position {
        self.span.start
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Statements
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// `let name = value;` (a missing initializer binds `null`).
    Let {
        name: Identifier,
        value: Option<Rc<Expression>>,
    },

    /// `const name = value;`
    Const {
        name: Identifier,
        value: Rc<Expression>,
    },

    Return {
        value: Option<Rc<Expression>>,
    },

    Expression {
        expression: Rc<Expression>,
    },

    Block(Rc<BlockStatement>),

    While {
        condition: Rc<Expression>,
        body: Rc<BlockStatement>,
    },

    /// `for (init; condition; update) body`; every header part is optional.
    For {
        init: Option<Rc<Statement>>,
        condition: Option<Rc<Expression>>,
        update: Option<Rc<Expression>>,
        body: Rc<BlockStatement>,
    },

    Break,

    Continue,

    Class(Rc<ClassStatement>),
}

impl Statement {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn position(&self) -> Position {
        self.span.start
    }

    /// Node kind name as shown by visualizers.
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            StmtKind::Let { .. } => "LetStatement",
            StmtKind::Const { .. } => "ConstStatement",
            StmtKind::Return { .. } => "ReturnStatement",
            StmtKind::Expression { .. } => "ExpressionStatement",
            StmtKind::Block(_) => "BlockStatement",
            StmtKind::While { .. } => "WhileStatement",
            StmtKind::For { .. } => "ForStatement",
            StmtKind::Break => "BreakStatement",
            StmtKind::Continue => "ContinueStatement",
            StmtKind::Class(_) => "ClassStatement",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BlockStatement {
    pub statements: Vec<Rc<Statement>>,
    pub span: Span,
}

/// `class Name extends Base { init(..) {..} method(..) {..} }`
#[derive(Debug, Clone, PartialEq)]
pub struct ClassStatement {
    pub name: Identifier,
    /// Identifier expression naming the superclass.
    pub superclass: Option<Rc<Expression>>,
    pub constructor: Option<Rc<FunctionLiteral>>,
    pub methods: Vec<Rc<FunctionLiteral>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    pub name: String,
    pub span: Span,
}

impl Identifier {
    pub fn from_token(token: &Token) -> Self {
        Self {
            name: token.literal.clone(),
            span: Span::between(token, token),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Expressions
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Identifier(String),

    Prefix {
        operator: PrefixOp,
        right: Rc<Expression>,
    },

    Infix {
        left: Rc<Expression>,
        operator: InfixOp,
        right: Rc<Expression>,
    },

    /// `target = value`; the target is an identifier or member expression.
    Assign {
        target: Rc<Expression>,
        value: Rc<Expression>,
    },

    Call {
        function: Rc<Expression>,
        arguments: Vec<Rc<Expression>>,
    },

    /// `if`/`elif`/`else` chain: `conditions[i]` guards `consequences[i]`.
    If {
        conditions: Vec<Rc<Expression>>,
        consequences: Vec<Rc<BlockStatement>>,
        alternative: Option<Rc<BlockStatement>>,
    },

    Index {
        left: Rc<Expression>,
        index: Rc<Expression>,
    },

    Member {
        object: Rc<Expression>,
        property: Identifier,
    },

    /// `new Name(args)`; `class` is an identifier expression.
    New {
        class: Rc<Expression>,
        arguments: Vec<Rc<Expression>>,
    },

    /// `super.method`, or bare `super` standing for the superclass `init`.
    Super {
        method: Option<Identifier>,
    },

    Literal(Literal),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    Str(String),
    FString(Vec<FStringPart>),
    Boolean(bool),
    Null,
    Array(Vec<Rc<Expression>>),
    Function(Rc<FunctionLiteral>),
    Hash(Vec<(Rc<Expression>, Rc<Expression>)>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FStringPart {
    Text(String),
    Expr(Rc<Expression>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionLiteral {
    /// Name inferred from a `let`/`const` binding or a class method.
    pub name: Option<String>,
    pub parameters: Vec<Identifier>,
    pub body: Rc<BlockStatement>,
    pub span: Span,
}

impl FunctionLiteral {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<anonymous>")
    }
}

impl Expression {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn position(&self) -> Position {
        self.span.start
    }

    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            ExprKind::Identifier(_) => "Identifier",
            ExprKind::Prefix { .. } => "PrefixExpression",
            ExprKind::Infix { .. } => "InfixExpression",
            ExprKind::Assign { .. } => "AssignmentExpression",
            ExprKind::Call { .. } => "CallExpression",
            ExprKind::If { .. } => "IfExpression",
            ExprKind::Index { .. } => "IndexExpression",
            ExprKind::Member { .. } => "MemberExpression",
            ExprKind::New { .. } => "NewExpression",
            ExprKind::Super { .. } => "SuperExpression",
            ExprKind::Literal(lit) => match lit {
                Literal::Integer(_) => "IntegerLiteral",
                Literal::Float(_) => "FloatLiteral",
                Literal::Str(_) => "StringLiteral",
                Literal::FString(_) => "FStringLiteral",
                Literal::Boolean(_) => "BooleanLiteral",
                Literal::Null => "NullLiteral",
                Literal::Array(_) => "ArrayLiteral",
                Literal::Function(_) => "FunctionLiteral",
                Literal::Hash(_) => "HashLiteral",
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixOp {
    Not,
    Negate,
}

impl fmt::Display for PrefixOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PrefixOp::Not => "!",
            PrefixOp::Negate => "-",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfixOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    And,
    Or,
}

impl InfixOp {
    pub fn is_logical(self) -> bool {
        matches!(self, InfixOp::And | InfixOp::Or)
    }
}

impl fmt::Display for InfixOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InfixOp::Add => "+",
            InfixOp::Sub => "-",
            InfixOp::Mul => "*",
            InfixOp::Div => "/",
            InfixOp::Mod => "%",
            InfixOp::Eq => "==",
            InfixOp::NotEq => "!=",
            InfixOp::Lt => "<",
            InfixOp::Gt => ">",
            InfixOp::LtEq => "<=",
            InfixOp::GtEq => ">=",
            InfixOp::And => "&&",
            InfixOp::Or => "||",
        })
    }
}
