//! Hand-built ASTs for driving the pipeline in tests, standing in for the
//! parsing collaborator. Every builder hands out a distinct span so the
//! span-keyed inference tables never collide.

use crate::language::{
    ast::*,
    modules::ModuleTable,
    pipeline::{analyze_file, FileAnalysis},
    span::Span,
    types::Mutability,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

static NEXT_SPAN: AtomicUsize = AtomicUsize::new(1);

pub fn sp() -> Span {
    let n = NEXT_SPAN.fetch_add(1, Ordering::Relaxed);
    Span::new(n * 8, n * 8 + 4, n, 1)
}

// ---- expressions ------------------------------------------------------

pub fn ident(name: &str) -> Expr {
    Expr::Identifier(Identifier {
        name: name.to_string(),
        span: sp(),
    })
}

pub fn int(value: i64) -> Expr {
    Expr::Literal(Literal::Int(value, sp()))
}

pub fn float(value: f64) -> Expr {
    Expr::Literal(Literal::Float(value, sp()))
}

pub fn boolean(value: bool) -> Expr {
    Expr::Literal(Literal::Bool(value, sp()))
}

pub fn string(value: &str) -> Expr {
    Expr::Literal(Literal::Str(value.to_string(), sp()))
}

pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
        span: sp(),
    }
}

pub fn call(function: &str, args: Vec<Expr>) -> Expr {
    Expr::Call {
        function: Identifier {
            name: function.to_string(),
            span: sp(),
        },
        args,
        span: sp(),
    }
}

pub fn method(receiver: Expr, name: &str, args: Vec<Expr>) -> Expr {
    Expr::MethodCall {
        receiver: Box::new(receiver),
        method: name.to_string(),
        args,
        span: sp(),
    }
}

pub fn field(base: Expr, name: &str) -> Expr {
    Expr::FieldAccess {
        base: Box::new(base),
        field: name.to_string(),
        span: sp(),
    }
}

pub fn struct_lit(name: &str, fields: Vec<(&str, Expr)>) -> Expr {
    Expr::StructLiteral {
        name: name.to_string(),
        fields: fields
            .into_iter()
            .map(|(f, v)| (f.to_string(), v))
            .collect(),
        spread: None,
        span: sp(),
    }
}

pub fn struct_update(name: &str, fields: Vec<(&str, Expr)>, spread: Expr) -> Expr {
    Expr::StructLiteral {
        name: name.to_string(),
        fields: fields
            .into_iter()
            .map(|(f, v)| (f.to_string(), v))
            .collect(),
        spread: Some(Box::new(spread)),
        span: sp(),
    }
}

pub fn variant_lit(enum_name: Option<&str>, variant: &str, args: Vec<Expr>) -> Expr {
    Expr::VariantLiteral {
        enum_name: enum_name.map(str::to_string),
        variant: variant.to_string(),
        args,
        span: sp(),
    }
}

pub fn some(value: Expr) -> Expr {
    variant_lit(None, "Some", vec![value])
}

pub fn vec_lit(elements: Vec<Expr>) -> Expr {
    Expr::VecLiteral {
        elements,
        span: sp(),
    }
}

pub fn reference(mutable: bool, expr: Expr) -> Expr {
    Expr::Reference {
        mutable,
        expr: Box::new(expr),
        span: sp(),
    }
}

pub fn panic_expr(message: &str) -> Expr {
    Expr::Panic {
        message: Some(Box::new(string(message))),
        span: sp(),
    }
}

pub fn if_expr(condition: Expr, then_branch: Block, else_branch: Option<Block>) -> Expr {
    Expr::If(Box::new(IfExpr {
        condition: IfCondition::Expr(condition),
        then_branch,
        else_branch: else_branch.map(ElseBranch::Block),
        span: sp(),
    }))
}

pub fn if_let(pattern: Pattern, value: Expr, then_branch: Block, else_branch: Option<Block>) -> Expr {
    Expr::If(Box::new(IfExpr {
        condition: IfCondition::Let { pattern, value },
        then_branch,
        else_branch: else_branch.map(ElseBranch::Block),
        span: sp(),
    }))
}

pub fn match_expr(scrutinee: Expr, arms: Vec<MatchArm>) -> Expr {
    Expr::Match(Box::new(MatchExpr {
        scrutinee,
        arms,
        span: sp(),
    }))
}

pub fn arm(pattern: Pattern, value: Expr) -> MatchArm {
    MatchArm {
        pattern,
        guard: None,
        value,
        span: sp(),
    }
}

pub fn arm_if(pattern: Pattern, guard: Expr, value: Expr) -> MatchArm {
    MatchArm {
        pattern,
        guard: Some(guard),
        value,
        span: sp(),
    }
}

// ---- patterns ---------------------------------------------------------

pub fn pat_wild() -> Pattern {
    Pattern::Wildcard(sp())
}

pub fn pat_bind(name: &str) -> Pattern {
    Pattern::Binding {
        name: name.to_string(),
        by_ref: false,
        span: sp(),
    }
}

pub fn pat_ref(name: &str) -> Pattern {
    Pattern::Binding {
        name: name.to_string(),
        by_ref: true,
        span: sp(),
    }
}

pub fn pat_variant(enum_name: Option<&str>, variant: &str, fields: Vec<Pattern>) -> Pattern {
    Pattern::Variant {
        enum_name: enum_name.map(str::to_string),
        variant: variant.to_string(),
        fields,
        span: sp(),
    }
}

pub fn pat_some(inner: Pattern) -> Pattern {
    pat_variant(None, "Some", vec![inner])
}

pub fn pat_none() -> Pattern {
    pat_variant(None, "None", Vec::new())
}

// ---- statements and blocks --------------------------------------------

pub fn block(statements: Vec<Statement>, tail: Option<Expr>) -> Block {
    Block {
        statements,
        tail: tail.map(Box::new),
        span: sp(),
    }
}

pub fn let_stmt(name: &str, value: Expr) -> Statement {
    Statement::Let(LetStmt {
        pattern: pat_bind(name),
        ty: None,
        value,
        mutability: Mutability::Immutable,
        span: sp(),
    })
}

pub fn let_mut(name: &str, value: Expr) -> Statement {
    Statement::Let(LetStmt {
        pattern: pat_bind(name),
        ty: None,
        value,
        mutability: Mutability::Mutable,
        span: sp(),
    })
}

pub fn let_typed(name: &str, ty: TypeRef, value: Expr) -> Statement {
    Statement::Let(LetStmt {
        pattern: pat_bind(name),
        ty: Some(ty),
        value,
        mutability: Mutability::Immutable,
        span: sp(),
    })
}

pub fn let_pat(pattern: Pattern, value: Expr) -> Statement {
    Statement::Let(LetStmt {
        pattern,
        ty: None,
        value,
        mutability: Mutability::Immutable,
        span: sp(),
    })
}

pub fn while_stmt(condition: Expr, body: Block) -> Statement {
    Statement::While(WhileStmt {
        condition,
        body,
        span: sp(),
    })
}

pub fn assign(target: Expr, value: Expr) -> Statement {
    Statement::Assign(AssignStmt {
        target,
        value,
        span: sp(),
    })
}

pub fn expr_stmt(expr: Expr) -> Statement {
    Statement::Expr(ExprStmt { expr })
}

pub fn ret(value: Option<Expr>) -> Statement {
    Statement::Return(ReturnStmt { value, span: sp() })
}

// ---- items ------------------------------------------------------------

pub fn ty(name: &str) -> TypeRef {
    TypeRef::named(name)
}

pub fn ty_args(name: &str, args: Vec<TypeRef>) -> TypeRef {
    TypeRef::Named(name.to_string(), args)
}

pub fn ty_shared(inner: TypeRef) -> TypeRef {
    TypeRef::reference(false, inner)
}

pub fn ty_mut(inner: TypeRef) -> TypeRef {
    TypeRef::reference(true, inner)
}

pub fn param(name: &str, ty: TypeRef) -> FunctionParam {
    FunctionParam {
        name: name.to_string(),
        ty,
        mutability: Mutability::Immutable,
        span: sp(),
    }
}

pub fn func(name: &str, params: Vec<FunctionParam>, ret: Option<TypeRef>, body: Block) -> FunctionDef {
    FunctionDef {
        name: name.to_string(),
        params,
        ret,
        body,
        span: sp(),
    }
}

pub fn struct_def(name: &str, fields: Vec<(&str, TypeRef)>) -> Item {
    Item::Struct(StructDef {
        name: name.to_string(),
        fields: fields
            .into_iter()
            .map(|(f, ty)| StructField {
                name: f.to_string(),
                ty,
                span: sp(),
            })
            .collect(),
        span: sp(),
    })
}

pub fn enum_def(name: &str, variants: Vec<(&str, Vec<TypeRef>)>) -> Item {
    Item::Enum(EnumDef {
        name: name.to_string(),
        variants: variants
            .into_iter()
            .map(|(v, fields)| EnumVariant {
                name: v.to_string(),
                fields,
                span: sp(),
            })
            .collect(),
        span: sp(),
    })
}

pub fn file(items: Vec<Item>) -> FileAst {
    file_with_imports(Vec::new(), items)
}

pub fn file_with_imports(imports: Vec<Import>, items: Vec<Item>) -> FileAst {
    FileAst {
        module_name: "test_module".to_string(),
        path: PathBuf::from("test.rsc"),
        imports,
        items,
        span: sp(),
    }
}

pub fn import_quoted(path: &str, selected: Vec<&str>, alias: Option<&str>) -> Import {
    Import {
        path: ImportPath::Quoted(path.to_string()),
        alias: alias.map(str::to_string),
        selected: selected
            .into_iter()
            .map(|name| SelectedSymbol {
                name: name.to_string(),
                span: sp(),
            })
            .collect(),
        span: sp(),
    }
}

// ---- pipeline shortcuts -----------------------------------------------

pub fn analyze(file: &FileAst) -> FileAnalysis {
    analyze_with(file, &ModuleTable::new())
}

pub fn analyze_with(file: &FileAst, modules: &ModuleTable) -> FileAnalysis {
    analyze_file(file, modules).expect("pipeline should not hit an internal error")
}

pub fn codes_of(analysis: &FileAnalysis) -> Vec<&str> {
    analysis.diagnostics.iter().map(|d| d.code).collect()
}

pub fn assert_clean(analysis: &FileAnalysis) {
    assert!(
        analysis.diagnostics.is_empty(),
        "expected no diagnostics, got {:?}",
        analysis.diagnostics
    );
}
