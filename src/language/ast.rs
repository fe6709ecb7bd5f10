use crate::language::{span::Span, types::Mutability};
use std::path::PathBuf;

/// Raw AST for one RuleScript source file, as handed over by the parsing
/// collaborator. Every node carries the span the parser recorded; the core
/// never re-reads source text.
#[derive(Clone, Debug)]
pub struct FileAst {
    pub module_name: String,
    pub path: PathBuf,
    pub imports: Vec<Import>,
    pub items: Vec<Item>,
    pub span: Span,
}

/// `use host;` / `use "./helpers.rsc" as h;` / `use "./helpers.rsc" { a, b } as h;`
#[derive(Clone, Debug)]
pub struct Import {
    pub path: ImportPath,
    pub alias: Option<String>,
    /// Selective symbol list; empty means the whole namespace is bound.
    pub selected: Vec<SelectedSymbol>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImportPath {
    /// Bare module name, e.g. `use host;`
    Bare(String),
    /// Quoted file path, e.g. `use "./helpers.rsc";`
    Quoted(String),
}

impl ImportPath {
    pub fn as_str(&self) -> &str {
        match self {
            ImportPath::Bare(name) => name,
            ImportPath::Quoted(path) => path,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SelectedSymbol {
    pub name: String,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum Item {
    Plugin(PluginDef),
    Struct(StructDef),
    Enum(EnumDef),
    Function(FunctionDef),
}

/// `plugin Name { ... }` — the unit both backends compile to a tree visitor.
#[derive(Clone, Debug)]
pub struct PluginDef {
    pub name: String,
    pub items: Vec<Item>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct StructDef {
    pub name: String,
    pub fields: Vec<StructField>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct StructField {
    pub name: String,
    pub ty: TypeRef,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct EnumDef {
    pub name: String,
    pub variants: Vec<EnumVariant>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct EnumVariant {
    pub name: String,
    pub fields: Vec<TypeRef>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<FunctionParam>,
    pub ret: Option<TypeRef>,
    pub body: Block,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct FunctionParam {
    pub name: String,
    pub ty: TypeRef,
    pub mutability: Mutability,
    pub span: Span,
}

/// Syntactic type annotation, resolved to a semantic `Type` against the
/// frozen definitions table.
#[derive(Clone, Debug)]
pub enum TypeRef {
    Named(String, Vec<TypeRef>),
    Reference { mutable: bool, inner: Box<TypeRef> },
    Unit,
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        TypeRef::Named(name.into(), Vec::new())
    }

    pub fn reference(mutable: bool, inner: TypeRef) -> Self {
        TypeRef::Reference {
            mutable,
            inner: Box::new(inner),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Block {
    pub statements: Vec<Statement>,
    pub tail: Option<Box<Expr>>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum Statement {
    Let(LetStmt),
    Assign(AssignStmt),
    Expr(ExprStmt),
    Return(ReturnStmt),
    While(WhileStmt),
    For(ForStmt),
    Traverse(TraverseStmt),
    Break(Span),
    Continue(Span),
}

#[derive(Clone, Debug)]
pub struct LetStmt {
    pub pattern: Pattern,
    pub ty: Option<TypeRef>,
    pub value: Expr,
    pub mutability: Mutability,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct AssignStmt {
    pub target: Expr,
    pub value: Expr,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct ExprStmt {
    pub expr: Expr,
}

#[derive(Clone, Debug)]
pub struct ReturnStmt {
    pub value: Option<Expr>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct WhileStmt {
    pub condition: Expr,
    pub body: Block,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct ForStmt {
    pub binding: String,
    pub iter: Expr,
    pub body: Block,
    pub span: Span,
}

/// Scoped traversal: `traverse(node) capturing [&mut names, &depth] { ... }`.
/// The capture list is the only context in which in-place mutation of outer
/// state is sanctioned.
#[derive(Clone, Debug)]
pub struct TraverseStmt {
    pub target: Expr,
    pub captures: Vec<Capture>,
    pub state: Vec<LetStmt>,
    pub visitors: Vec<FunctionDef>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct Capture {
    pub name: String,
    pub mutable: bool,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum Pattern {
    Wildcard(Span),
    Binding {
        name: String,
        by_ref: bool,
        span: Span,
    },
    Literal(Literal),
    /// Path-qualified or bare variant pattern: `Shape::Circle(r)`, `Some(x)`,
    /// `None`. A no-payload variant carries an empty field list.
    Variant {
        enum_name: Option<String>,
        variant: String,
        fields: Vec<Pattern>,
        span: Span,
    },
    Struct {
        name: String,
        fields: Vec<(String, Pattern)>,
        span: Span,
    },
}

impl Pattern {
    pub fn span(&self) -> Span {
        match self {
            Pattern::Wildcard(span) => *span,
            Pattern::Binding { span, .. } => *span,
            Pattern::Literal(lit) => lit.span(),
            Pattern::Variant { span, .. } => *span,
            Pattern::Struct { span, .. } => *span,
        }
    }
}

#[derive(Clone, Debug)]
pub enum Expr {
    Literal(Literal),
    Identifier(Identifier),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
        span: Span,
    },
    /// Direct call of a named function; the DSL has no first-class functions.
    Call {
        function: Identifier,
        args: Vec<Expr>,
        span: Span,
    },
    MethodCall {
        receiver: Box<Expr>,
        method: String,
        args: Vec<Expr>,
        span: Span,
    },
    FieldAccess {
        base: Box<Expr>,
        field: String,
        span: Span,
    },
    StructLiteral {
        name: String,
        fields: Vec<(String, Expr)>,
        /// Functional update: `Component { field: x, ..comp }`
        spread: Option<Box<Expr>>,
        span: Span,
    },
    VariantLiteral {
        enum_name: Option<String>,
        variant: String,
        args: Vec<Expr>,
        span: Span,
    },
    VecLiteral {
        elements: Vec<Expr>,
        span: Span,
    },
    If(Box<IfExpr>),
    Match(Box<MatchExpr>),
    Block(Box<Block>),
    Reference {
        mutable: bool,
        expr: Box<Expr>,
        span: Span,
    },
    Deref {
        expr: Box<Expr>,
        span: Span,
    },
    /// `panic("...")` — diverges on both backends.
    Panic {
        message: Option<Box<Expr>>,
        span: Span,
    },
}

#[derive(Clone, Debug)]
pub struct Identifier {
    pub name: String,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum Literal {
    Int(i64, Span),
    Float(f64, Span),
    Bool(bool, Span),
    Str(String, Span),
}

impl Literal {
    pub fn span(&self) -> Span {
        match self {
            Literal::Int(_, span)
            | Literal::Float(_, span)
            | Literal::Bool(_, span)
            | Literal::Str(_, span) => *span,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    And,
    Or,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::Lt
                | BinaryOp::LtEq
                | BinaryOp::Gt
                | BinaryOp::GtEq
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Clone, Debug)]
pub struct IfExpr {
    pub condition: IfCondition,
    pub then_branch: Block,
    pub else_branch: Option<ElseBranch>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum IfCondition {
    Expr(Expr),
    Let { pattern: Pattern, value: Expr },
}

#[derive(Clone, Debug)]
pub enum ElseBranch {
    Block(Block),
    ElseIf(Box<IfExpr>),
}

#[derive(Clone, Debug)]
pub struct MatchExpr {
    pub scrutinee: Expr,
    pub arms: Vec<MatchArm>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct MatchArm {
    pub pattern: Pattern,
    pub guard: Option<Expr>,
    pub value: Expr,
    pub span: Span,
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Literal(lit) => lit.span(),
            Expr::Identifier(ident) => ident.span,
            Expr::Binary { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Call { span, .. }
            | Expr::MethodCall { span, .. }
            | Expr::FieldAccess { span, .. }
            | Expr::StructLiteral { span, .. }
            | Expr::VariantLiteral { span, .. }
            | Expr::VecLiteral { span, .. }
            | Expr::Reference { span, .. }
            | Expr::Deref { span, .. }
            | Expr::Panic { span, .. } => *span,
            Expr::If(if_expr) => if_expr.span,
            Expr::Match(match_expr) => match_expr.span,
            Expr::Block(block) => block.span,
        }
    }

    /// Root identifier of a field/deref access path, if the path bottoms out
    /// in a plain binding.
    pub fn path_root(&self) -> Option<&Identifier> {
        match self {
            Expr::Identifier(ident) => Some(ident),
            Expr::FieldAccess { base, .. } => base.path_root(),
            Expr::Deref { expr, .. } => expr.path_root(),
            _ => None,
        }
    }
}
