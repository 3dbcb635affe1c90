use crate::error::Span;
use std::rc::Rc;

/// The parsed source unit. Nodes are immutable once built; function and class
/// declarations are reference counted so runtime values can share them.
#[derive(Debug, Clone)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Expression {
        expr: Expr,
        priority: i32,
        debug: bool,
        span: Span,
    },
    Assignment {
        target: Expr,
        value: Expr,
        priority: i32,
        debug: bool,
        span: Span,
    },
    VariableDeclaration(VariableDecl),
    /// `const const const name = value`
    GlobalConstant {
        name: String,
        value: Expr,
        priority: i32,
        span: Span,
    },
    Function(Rc<FunctionDecl>),
    Class(Rc<ClassDecl>),
    If {
        condition: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Option<Vec<Stmt>>,
        span: Span,
    },
    When {
        condition: Expr,
        body: Vec<Stmt>,
        span: Span,
    },
    Return {
        value: Option<Expr>,
        span: Span,
    },
    Delete {
        target: Expr,
        span: Span,
    },
    Import {
        name: String,
        span: Span,
    },
    Export {
        name: String,
        target_file: String,
        span: Span,
    },
    Reverse {
        span: Span,
    },
    FileBlock {
        name: Option<String>,
        body: Vec<Stmt>,
        span: Span,
    },
    /// A bare string in statement position; kept as inert content.
    Noop {
        content: String,
        span: Span,
    },
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Expression { span, .. } => *span,
            Stmt::Assignment { span, .. } => *span,
            Stmt::VariableDeclaration(decl) => decl.span,
            Stmt::GlobalConstant { span, .. } => *span,
            Stmt::Function(decl) => decl.span,
            Stmt::Class(decl) => decl.span,
            Stmt::If { span, .. } => *span,
            Stmt::When { span, .. } => *span,
            Stmt::Return { span, .. } => *span,
            Stmt::Delete { span, .. } => *span,
            Stmt::Import { span, .. } => *span,
            Stmt::Export { span, .. } => *span,
            Stmt::Reverse { span } => *span,
            Stmt::FileBlock { span, .. } => *span,
            Stmt::Noop { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VariableDecl {
    pub const_count: usize,
    pub var_count: usize,
    pub name: String,
    pub value: Option<Expr>,
    /// Raw annotation text such as `Infinity`, `20s` or `-1`.
    pub lifetime: Option<String>,
    pub type_annotation: Option<String>,
    pub priority: i32,
    pub debug: bool,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    /// The spelling used: `function`, `func`, `fun`, `fn`, `functi`, `f` or `union`.
    pub keyword: String,
    pub name: String,
    pub parameters: Vec<String>,
    pub body: FunctionBody,
    pub is_async: bool,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum FunctionBody {
    Expression(Expr),
    Block(Vec<Stmt>),
}

#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub keyword: String,
    pub name: String,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Literal {
        value: Literal,
        span: Span,
    },
    Identifier {
        name: String,
        span: Span,
    },
    Array {
        elements: Vec<Expr>,
        span: Span,
    },
    Index {
        array: Box<Expr>,
        index: Box<Expr>,
        span: Span,
    },
    Binary {
        left: Box<Expr>,
        operator: BinaryOp,
        right: Box<Expr>,
        span: Span,
    },
    Unary {
        operator: UnaryOp,
        operand: Box<Expr>,
        span: Span,
    },
    /// `++x`, `x++`, `--x`, `x--`
    Step {
        target: Box<Expr>,
        direction: StepDirection,
        prefix: bool,
        span: Span,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        span: Span,
    },
    Member {
        object: Box<Expr>,
        property: String,
        span: Span,
    },
    Previous {
        target: Box<Expr>,
        span: Span,
    },
    Next {
        target: Box<Expr>,
        span: Span,
    },
    Current {
        target: Box<Expr>,
        span: Span,
    },
    /// `use(initial)` signal constructor
    Use {
        initial: Box<Expr>,
        span: Span,
    },
    New {
        class_name: String,
        args: Vec<Expr>,
        span: Span,
    },
    Await {
        expr: Box<Expr>,
        span: Span,
    },
    Interpolation {
        segments: Vec<Segment>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Literal { span, .. } => *span,
            Expr::Identifier { span, .. } => *span,
            Expr::Array { span, .. } => *span,
            Expr::Index { span, .. } => *span,
            Expr::Binary { span, .. } => *span,
            Expr::Unary { span, .. } => *span,
            Expr::Step { span, .. } => *span,
            Expr::Call { span, .. } => *span,
            Expr::Member { span, .. } => *span,
            Expr::Previous { span, .. } => *span,
            Expr::Next { span, .. } => *span,
            Expr::Current { span, .. } => *span,
            Expr::Use { span, .. } => *span,
            Expr::New { span, .. } => *span,
            Expr::Await { span, .. } => *span,
            Expr::Interpolation { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    /// `a/b` kept as text for lazy division
    Fraction(String),
    Str(String),
    Bool(bool),
    Maybe,
    Undefined,
    Null,
}

#[derive(Debug, Clone)]
pub enum Segment {
    Text(String),
    Expr { expr: Expr, currency: char },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
    Modulo,
    /// `=`
    VeryLooseEqual,
    /// `==`
    LooseEqual,
    /// `===`
    StrictEqual,
    /// `====`
    SuperStrictEqual,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Power => "^",
            BinaryOp::Modulo => "%",
            BinaryOp::VeryLooseEqual => "=",
            BinaryOp::LooseEqual => "==",
            BinaryOp::StrictEqual => "===",
            BinaryOp::SuperStrictEqual => "====",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `;`
    Not,
    Negate,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDirection {
    Increment,
    Decrement,
}
