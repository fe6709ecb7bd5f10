//! Shared output AST.
//!
//! Both emitters produce this one tree; a textual printer collaborator turns
//! it into backend source. The variant set is the union of what the two
//! profiles need: `MatchArms` and by-reference bindings only ever come out of
//! the static emitter, `ShapeTest` and payload extraction only out of the
//! dynamic one.

use crate::language::ast::{BinaryOp, UnaryOp};
use crate::language::lower::IrLiteral;

#[derive(Clone, Debug, PartialEq)]
pub struct OutProgram {
    pub module_name: String,
    pub plugins: Vec<OutPlugin>,
    pub functions: Vec<OutFunction>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OutPlugin {
    pub name: String,
    pub functions: Vec<OutFunction>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OutFunction {
    pub name: String,
    pub params: Vec<OutParam>,
    pub returns_value: bool,
    pub body: Vec<OutStmt>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OutParam {
    pub name: String,
    pub by_ref: bool,
    pub mutable: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum OutStmt {
    /// Uninitialized slot later filled by every branch of a chain.
    Declare { name: String },
    /// Immutable single-assignment binding.
    ConstBind { name: String, value: OutExpr },
    LetBind {
        name: String,
        mutable: bool,
        value: OutExpr,
    },
    Assign { target: OutExpr, value: OutExpr },
    If {
        condition: OutExpr,
        then_body: Vec<OutStmt>,
        else_body: Vec<OutStmt>,
    },
    /// Native tagged-union dispatch over one subject.
    MatchArms {
        subject: OutExpr,
        arms: Vec<OutMatchArm>,
        default: Vec<OutStmt>,
    },
    While {
        condition: OutExpr,
        body: Vec<OutStmt>,
    },
    For {
        binding: String,
        iter: OutExpr,
        body: Vec<OutStmt>,
    },
    Traverse {
        target: OutExpr,
        mut_captures: Vec<String>,
        shared_captures: Vec<String>,
        state: Vec<OutStmt>,
        visitors: Vec<OutFunction>,
    },
    Scope(Vec<OutStmt>),
    Return(Option<OutExpr>),
    /// Dynamic-profile abort: raised as a host exception.
    Throw(Option<OutExpr>),
    /// Static-profile abort: unrecoverable failure.
    Fail(Option<OutExpr>),
    Break,
    Continue,
    Eval(OutExpr),
}

#[derive(Clone, Debug, PartialEq)]
pub struct OutMatchArm {
    pub pattern: OutPattern,
    pub guard: Option<OutExpr>,
    pub body: Vec<OutStmt>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum OutPattern {
    Variant {
        enum_name: String,
        variant: String,
        fields: Vec<OutFieldBinding>,
    },
    Some(Option<OutBinding>),
    None,
    Literal(IrLiteral),
    Binding(OutBinding),
    Wildcard,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OutBinding {
    pub name: String,
    pub by_ref: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OutFieldBinding {
    pub index: usize,
    pub name: String,
    pub by_ref: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum OutExpr {
    Unit,
    Literal(IrLiteral),
    Var(String),
    Binary {
        op: BinaryOp,
        left: Box<OutExpr>,
        right: Box<OutExpr>,
    },
    Unary {
        op: UnaryOp,
        value: Box<OutExpr>,
    },
    Call {
        function: String,
        args: Vec<OutExpr>,
    },
    NamespaceCall {
        namespace: String,
        function: String,
        args: Vec<OutExpr>,
    },
    MethodCall {
        receiver: Box<OutExpr>,
        method: String,
        args: Vec<OutExpr>,
    },
    Field {
        base: Box<OutExpr>,
        field: String,
    },
    StructNew {
        name: String,
        fields: Vec<(String, OutExpr)>,
        spread: Option<Box<OutExpr>>,
    },
    VariantNew {
        enum_name: Option<String>,
        variant: String,
        args: Vec<OutExpr>,
    },
    VecNew(Vec<OutExpr>),
    Ref {
        mutable: bool,
        value: Box<OutExpr>,
    },
    Deref(Box<OutExpr>),
    /// Dynamic-profile runtime shape check of a tagged value.
    ShapeTest {
        subject: Box<OutExpr>,
        shape: ShapeKind,
    },
    /// Dynamic-profile positional payload extraction.
    PayloadAt {
        subject: Box<OutExpr>,
        index: usize,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub enum ShapeKind {
    Variant { enum_name: String, variant: String },
    Some,
    None,
}
