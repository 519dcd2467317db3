use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};

/// Byte range into the source text. Diagnostics convert this to
/// line/column on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Smallest span covering both operands.
    pub fn to(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl From<std::ops::Range<usize>> for Span {
    fn from(r: std::ops::Range<usize>) -> Self {
        Span {
            start: r.start,
            end: r.end,
        }
    }
}

/// Stable identity of an AST node, used as the key for the compiler's
/// side tables (scope, resolved type, call resolution, desugarings).
///
/// Ids are process-unique so annotations from separately parsed programs
/// (the prelude and the user program share one compilation session) never
/// collide. The checker also mints ids for desugared nodes it synthesizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

static NEXT_NODE_ID: AtomicU32 = AtomicU32::new(0);

impl NodeId {
    pub fn fresh() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Root of the Abstract Syntax Tree.
///
/// Top-level items and statements keep their source order: the statements
/// form the program body executed after all declarations are processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub decls: Vec<TopLevel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TopLevel {
    Item(Item),
    Stmt(Stmt),
}

/// Top-level items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Item {
    Function(FunctionDef),
    Struct(StructDef),
    Trait(TraitDef),
    TraitImpl(TraitImplDef),
}

/// Generic type parameter with optional trait bounds
/// Examples: T, T: Printable, T: Into<String>
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeParam {
    pub name: String,
    pub bounds: Vec<TraitBound>,
    pub span: Span,
}

/// A trait bound at a specific instantiation: Printable, Into<String>
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitBound {
    pub name: String,
    pub args: Vec<TypeNode>,
    pub span: Span,
}

/// A type as written in the source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeNode {
    /// Named, possibly parametric: Int, Box<T>, Pair<Int, String>
    Named {
        name: String,
        args: Vec<TypeNode>,
        span: Span,
    },
    /// Existential sugar: `impl Trait<X>`. Allowed in return position and
    /// in argument position (where it desugars to a fresh type parameter).
    ImplTrait { bounds: Vec<TraitBound>, span: Span },
}

impl TypeNode {
    pub fn span(&self) -> Span {
        match self {
            TypeNode::Named { span, .. } => *span,
            TypeNode::ImplTrait { span, .. } => *span,
        }
    }
}

/// Function definition: `def name<T, ...>(a: A, ...) -> R { ... }`
///
/// Also used for trait-impl methods; a missing return annotation means Unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub type_params: Vec<TypeParam>,
    pub params: Vec<Param>,
    pub return_type: Option<TypeNode>,
    pub body: Block,
    pub span: Span,
    pub id: NodeId,
}

/// Function parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: TypeNode,
    pub span: Span,
}

/// Struct definition: `struct Name<T, ...> { field: Type, ... }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructDef {
    pub name: String,
    pub type_params: Vec<TypeParam>,
    pub fields: Vec<Field>,
    pub span: Span,
    pub id: NodeId,
}

/// Struct field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub ty: TypeNode,
    pub span: Span,
}

/// Trait definition: `trait Name<T, ...> { def m(...) -> R; ... }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitDef {
    pub name: String,
    pub type_params: Vec<TypeParam>,
    pub functions: Vec<TraitFunction>,
    pub span: Span,
    pub id: NodeId,
}

/// Trait method signature (no body)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitFunction {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: Option<TypeNode>,
    pub span: Span,
    pub id: NodeId,
}

/// Trait implementation: `impl<T, ...> Trait<...> for Target { def m ... }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitImplDef {
    pub type_params: Vec<TypeParam>,
    pub trait_name: String,
    pub trait_args: Vec<TypeNode>,
    pub target: TypeNode,
    pub functions: Vec<FunctionDef>,
    pub span: Span,
    pub id: NodeId,
}

/// A braced statement sequence. Each block owns a scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
    pub id: NodeId,
}

/// Statements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    /// `let name[: Type] = expr;`
    Let {
        name: String,
        ty: Option<TypeNode>,
        value: Expr,
        span: Span,
        id: NodeId,
    },
    /// `name = expr;`
    Assign {
        name: String,
        value: Expr,
        span: Span,
        id: NodeId,
    },
    /// Bare expression statement
    Expr(Expr),
    /// `if E { } elif E { } else { }` — branches hold (condition, body)
    If {
        branches: Vec<(Expr, Block)>,
        else_block: Option<Block>,
        span: Span,
        id: NodeId,
    },
    /// `while E { }`
    While {
        cond: Expr,
        body: Block,
        span: Span,
        id: NodeId,
    },
    /// `return [expr];`
    Return {
        value: Option<Expr>,
        span: Span,
        id: NodeId,
    },
    Break {
        span: Span,
        id: NodeId,
    },
    Continue {
        span: Span,
        id: NodeId,
    },
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Let { span, .. }
            | Stmt::Assign { span, .. }
            | Stmt::If { span, .. }
            | Stmt::While { span, .. }
            | Stmt::Return { span, .. }
            | Stmt::Break { span, .. }
            | Stmt::Continue { span, .. } => *span,
            Stmt::Expr(e) => e.span(),
        }
    }
}

/// Binary operators. All of them desugar to calls during type checking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Gt,
    LtEq,
    GtEq,
    EqEq,
    NotEq,
    And,
    Or,
}

/// Literal payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LitKind {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

/// Expressions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Literal {
        kind: LitKind,
        span: Span,
        id: NodeId,
    },
    /// Variable (or function) reference
    Var {
        name: String,
        span: Span,
        id: NodeId,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        span: Span,
        id: NodeId,
    },
    /// `object.name`
    Attr {
        object: Box<Expr>,
        name: String,
        span: Span,
        id: NodeId,
    },
    /// `source(args...)`
    Call {
        source: Box<Expr>,
        args: Vec<Expr>,
        span: Span,
        id: NodeId,
    },
    /// `Name { field: expr, ... }`
    StructInit {
        name: String,
        fields: Vec<(String, Expr)>,
        span: Span,
        id: NodeId,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Literal { span, .. }
            | Expr::Var { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Attr { span, .. }
            | Expr::Call { span, .. }
            | Expr::StructInit { span, .. } => *span,
        }
    }

    pub fn id(&self) -> NodeId {
        match self {
            Expr::Literal { id, .. }
            | Expr::Var { id, .. }
            | Expr::Binary { id, .. }
            | Expr::Attr { id, .. }
            | Expr::Call { id, .. }
            | Expr::StructInit { id, .. } => *id,
        }
    }
}
