//! Lowering to the shared backend-neutral IR.
//!
//! Both emitters consume the same IR, which is the single reason the two
//! backends stay behaviorally equivalent: every conditional construct is
//! normalized into a *chain* of arms, each carrying an explicit test, the
//! bindings it introduces, and its body, followed by an explicit fallthrough.
//! Early exits become [`IrAbort`] steps; value-position branches become a
//! declared result slot assigned at the end of each arm. Nothing in here is
//! backend-specific.
//!
//! Lowering runs only on diagnostic-clean files, so the inference tables are
//! complete and concrete; any hole found here is an internal invariant
//! violation, not a user error.

use crate::language::{
    ast::*,
    errors::InternalError,
    infer::InferOutput,
    resolve::Definitions,
    types::Type,
};

#[derive(Clone, Debug, PartialEq)]
pub struct IrProgram {
    pub module_name: String,
    pub plugins: Vec<IrPlugin>,
    pub functions: Vec<IrFunction>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct IrPlugin {
    pub name: String,
    pub functions: Vec<IrFunction>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct IrFunction {
    pub name: String,
    pub params: Vec<IrParam>,
    pub returns_value: bool,
    pub body: Vec<IrStep>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct IrParam {
    pub name: String,
    pub by_ref: bool,
    pub mutable: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum IrStep {
    /// Uninitialized result slot for a value-position chain or block.
    Declare { name: String },
    Let {
        name: String,
        mutable: bool,
        value: IrValue,
    },
    Assign { target: IrPlace, value: IrValue },
    Eval(IrValue),
    Chain(IrChain),
    While {
        condition: IrValue,
        body: Vec<IrStep>,
    },
    For {
        binding: String,
        iter: IrValue,
        body: Vec<IrStep>,
    },
    Traverse(IrTraverse),
    /// Nested lexical scope, preserved so flattened blocks cannot capture
    /// each other's shadowed names.
    Scope(Vec<IrStep>),
    Abort(IrAbort),
    Break,
    Continue,
}

/// Normalized conditional: arms tried in order, first passing test wins,
/// explicit fallthrough if none does.
#[derive(Clone, Debug, PartialEq)]
pub struct IrChain {
    pub arms: Vec<IrArm>,
    pub fallthrough: Vec<IrStep>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct IrArm {
    /// Value the test inspects. `Unit` for `Always` arms; for `Cond` arms the
    /// subject *is* the boolean condition.
    pub subject: IrValue,
    pub test: IrTest,
    pub bindings: Vec<IrBindingIntro>,
    pub guard: Option<IrValue>,
    pub body: Vec<IrStep>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum IrTest {
    /// Subject is a boolean; arm runs when it is true.
    Cond,
    Variant { enum_name: String, variant: String },
    IsSome,
    IsNone,
    Eq(IrLiteral),
    Always,
}

/// One name an arm introduces, extracted from the arm's subject.
#[derive(Clone, Debug, PartialEq)]
pub struct IrBindingIntro {
    pub name: String,
    pub source: IrBindingSource,
    pub by_ref: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum IrBindingSource {
    VariantField(usize),
    OptionPayload,
    StructField(String),
    Whole,
}

/// Early exit from the plugin function being emitted. Which surface syntax
/// this becomes is the one real difference between the two backends.
#[derive(Clone, Debug, PartialEq)]
pub enum IrAbort {
    Return(Option<IrValue>),
    Panic(Option<IrValue>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct IrTraverse {
    pub target: IrValue,
    pub mut_captures: Vec<String>,
    pub shared_captures: Vec<String>,
    pub state: Vec<IrStep>,
    pub visitors: Vec<IrFunction>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct IrPlace {
    pub root: String,
    pub path: Vec<IrProjection>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum IrProjection {
    Field(String),
    Deref,
}

#[derive(Clone, Debug, PartialEq)]
pub enum IrValue {
    Unit,
    Literal(IrLiteral),
    Var(String),
    Binary {
        op: BinaryOp,
        left: Box<IrValue>,
        right: Box<IrValue>,
    },
    Unary {
        op: UnaryOp,
        value: Box<IrValue>,
    },
    Call {
        function: String,
        args: Vec<IrValue>,
    },
    NamespaceCall {
        namespace: String,
        function: String,
        args: Vec<IrValue>,
    },
    MethodCall {
        receiver: Box<IrValue>,
        method: String,
        args: Vec<IrValue>,
    },
    Field {
        base: Box<IrValue>,
        field: String,
    },
    StructNew {
        name: String,
        fields: Vec<(String, IrValue)>,
        spread: Option<Box<IrValue>>,
    },
    VariantNew {
        enum_name: Option<String>,
        variant: String,
        args: Vec<IrValue>,
    },
    VecNew(Vec<IrValue>),
    Ref {
        mutable: bool,
        value: Box<IrValue>,
    },
    Deref(Box<IrValue>),
    /// Payload extraction from an already-tested subject; used by lowered
    /// destructuring `let`s and synthesized sub-pattern guards.
    Extract {
        subject: Box<IrValue>,
        source: IrBindingSource,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub enum IrLiteral {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

pub fn lower_file(
    file: &FileAst,
    defs: &Definitions,
    types: &InferOutput,
) -> Result<IrProgram, InternalError> {
    let mut lowerer = Lowerer {
        defs,
        types,
        temp: 0,
    };
    let mut plugins = Vec::new();
    let mut functions = Vec::new();
    for item in &file.items {
        match item {
            Item::Plugin(plugin) => {
                let mut plugin_functions = Vec::new();
                for nested in &plugin.items {
                    if let Item::Function(def) = nested {
                        plugin_functions.push(lowerer.lower_function(def)?);
                    }
                }
                plugins.push(IrPlugin {
                    name: plugin.name.clone(),
                    functions: plugin_functions,
                });
            }
            Item::Function(def) => functions.push(lowerer.lower_function(def)?),
            Item::Struct(_) | Item::Enum(_) => {}
        }
    }
    Ok(IrProgram {
        module_name: file.module_name.clone(),
        plugins,
        functions,
    })
}

struct Lowerer<'a> {
    defs: &'a Definitions,
    types: &'a InferOutput,
    temp: usize,
}

impl<'a> Lowerer<'a> {
    fn fresh_temp(&mut self) -> String {
        let name = format!("__v{}", self.temp);
        self.temp += 1;
        name
    }

    fn lower_function(&mut self, def: &FunctionDef) -> Result<IrFunction, InternalError> {
        let params = def
            .params
            .iter()
            .map(|p| {
                let (by_ref, mutable) = match &p.ty {
                    TypeRef::Reference { mutable, .. } => (true, *mutable),
                    _ => (false, p.mutability.is_mutable()),
                };
                IrParam {
                    name: p.name.clone(),
                    by_ref,
                    mutable,
                }
            })
            .collect();
        let returns_value = matches!(&def.ret, Some(TypeRef::Named(..) | TypeRef::Reference { .. }));
        let mut body = Vec::new();
        self.lower_block_stmts(&def.body, &mut body)?;
        if returns_value {
            if let Some(tail) = &def.body.tail {
                let value = self.lower_expr(tail, &mut body)?;
                if !self.types.type_of(tail.span()).is_never() {
                    body.push(IrStep::Abort(IrAbort::Return(Some(value))));
                }
            }
        } else if let Some(tail) = &def.body.tail {
            let value = self.lower_expr(tail, &mut body)?;
            body.push(IrStep::Eval(value));
        }
        Ok(IrFunction {
            name: def.name.clone(),
            params,
            returns_value,
            body,
        })
    }

    fn lower_block_stmts(
        &mut self,
        block: &Block,
        out: &mut Vec<IrStep>,
    ) -> Result<(), InternalError> {
        for stmt in &block.statements {
            self.lower_stmt(stmt, out)?;
        }
        Ok(())
    }

    /// Lowers a block in value position: its result lands in `dest`.
    fn lower_block_value(
        &mut self,
        block: &Block,
        dest: &str,
    ) -> Result<Vec<IrStep>, InternalError> {
        let mut steps = Vec::new();
        self.lower_block_stmts(block, &mut steps)?;
        match &block.tail {
            Some(tail) => {
                let value = self.lower_expr(tail, &mut steps)?;
                if !self.types.type_of(tail.span()).is_never() {
                    steps.push(IrStep::Assign {
                        target: IrPlace {
                            root: dest.to_string(),
                            path: Vec::new(),
                        },
                        value,
                    });
                }
            }
            None => {}
        }
        Ok(steps)
    }

    /// Lowers a block in statement position: the tail, if any, runs for
    /// effect.
    fn lower_block_effect(&mut self, block: &Block) -> Result<Vec<IrStep>, InternalError> {
        let mut steps = Vec::new();
        self.lower_block_stmts(block, &mut steps)?;
        if let Some(tail) = &block.tail {
            let value = self.lower_expr(tail, &mut steps)?;
            if !matches!(value, IrValue::Unit) {
                steps.push(IrStep::Eval(value));
            }
        }
        Ok(steps)
    }

    fn lower_stmt(&mut self, stmt: &Statement, out: &mut Vec<IrStep>) -> Result<(), InternalError> {
        match stmt {
            Statement::Let(stmt) => self.lower_let(stmt, out),
            Statement::Assign(stmt) => {
                let value = self.lower_expr(&stmt.value, out)?;
                let target = self.lower_place(&stmt.target)?;
                out.push(IrStep::Assign { target, value });
                Ok(())
            }
            Statement::Expr(stmt) => {
                let value = self.lower_expr(&stmt.expr, out)?;
                if !matches!(value, IrValue::Unit) {
                    out.push(IrStep::Eval(value));
                }
                Ok(())
            }
            Statement::Return(stmt) => {
                let value = match &stmt.value {
                    Some(value) => Some(self.lower_expr(value, out)?),
                    None => None,
                };
                out.push(IrStep::Abort(IrAbort::Return(value)));
                Ok(())
            }
            Statement::While(stmt) => {
                let mut prelude = Vec::new();
                let condition = self.lower_expr(&stmt.condition, &mut prelude)?;
                if !prelude.is_empty() {
                    return Err(InternalError::malformed(
                        "branching expression in loop condition",
                        stmt.span,
                    ));
                }
                let body = self.lower_block_effect(&stmt.body)?;
                out.push(IrStep::While { condition, body });
                Ok(())
            }
            Statement::For(stmt) => {
                let iter = self.lower_expr(&stmt.iter, out)?;
                let body = self.lower_block_effect(&stmt.body)?;
                out.push(IrStep::For {
                    binding: stmt.binding.clone(),
                    iter,
                    body,
                });
                Ok(())
            }
            Statement::Traverse(stmt) => {
                let target = self.lower_expr(&stmt.target, out)?;
                let mut state = Vec::new();
                for let_stmt in &stmt.state {
                    self.lower_let(let_stmt, &mut state)?;
                }
                let visitors = stmt
                    .visitors
                    .iter()
                    .map(|v| self.lower_function(v))
                    .collect::<Result<Vec<_>, _>>()?;
                out.push(IrStep::Traverse(IrTraverse {
                    target,
                    mut_captures: stmt
                        .captures
                        .iter()
                        .filter(|c| c.mutable)
                        .map(|c| c.name.clone())
                        .collect(),
                    shared_captures: stmt
                        .captures
                        .iter()
                        .filter(|c| !c.mutable)
                        .map(|c| c.name.clone())
                        .collect(),
                    state,
                    visitors,
                }));
                Ok(())
            }
            Statement::Break(_) => {
                out.push(IrStep::Break);
                Ok(())
            }
            Statement::Continue(_) => {
                out.push(IrStep::Continue);
                Ok(())
            }
        }
    }

    fn lower_let(&mut self, stmt: &LetStmt, out: &mut Vec<IrStep>) -> Result<(), InternalError> {
        let value = self.lower_expr(&stmt.value, out)?;
        match &stmt.pattern {
            Pattern::Binding { name, .. } => {
                out.push(IrStep::Let {
                    name: name.clone(),
                    mutable: stmt.mutability.is_mutable(),
                    value,
                });
                Ok(())
            }
            Pattern::Wildcard(_) => {
                out.push(IrStep::Eval(value));
                Ok(())
            }
            pattern => {
                // Destructuring binding. The shape check stays in a chain so
                // a refutable pattern aborts on mismatch; the bindings are
                // extracted afterwards at the outer level, where later
                // statements can see them.
                let subject = self.bind_to_temp(value, out);
                let (test, bindings, guard) = self.lower_pattern(pattern, &subject, stmt.span)?;
                if !matches!(test, IrTest::Always) || guard.is_some() {
                    out.push(IrStep::Chain(IrChain {
                        arms: vec![IrArm {
                            subject: subject.clone(),
                            test,
                            bindings: Vec::new(),
                            guard,
                            body: Vec::new(),
                        }],
                        fallthrough: vec![IrStep::Abort(IrAbort::Panic(Some(
                            IrValue::Literal(IrLiteral::Str(
                                "unmatched value in binding".to_string(),
                            )),
                        )))],
                    }));
                }
                for binding in bindings {
                    let extracted = IrValue::Extract {
                        subject: Box::new(subject.clone()),
                        source: binding.source,
                    };
                    let value = if binding.by_ref {
                        IrValue::Ref {
                            mutable: false,
                            value: Box::new(extracted),
                        }
                    } else {
                        extracted
                    };
                    out.push(IrStep::Let {
                        name: binding.name,
                        mutable: stmt.mutability.is_mutable(),
                        value,
                    });
                }
                Ok(())
            }
        }
    }

    fn lower_place(&mut self, target: &Expr) -> Result<IrPlace, InternalError> {
        fn walk(expr: &Expr, path: &mut Vec<IrProjection>) -> Result<String, InternalError> {
            match expr {
                Expr::Identifier(ident) => Ok(ident.name.clone()),
                Expr::FieldAccess { base, field, .. } => {
                    let root = walk(base, path)?;
                    path.push(IrProjection::Field(field.clone()));
                    Ok(root)
                }
                Expr::Deref { expr, .. } => {
                    let root = walk(expr, path)?;
                    path.push(IrProjection::Deref);
                    Ok(root)
                }
                other => Err(InternalError::malformed(
                    "assignment target is not a place",
                    other.span(),
                )),
            }
        }
        let mut path = Vec::new();
        let root = walk(target, &mut path)?;
        Ok(IrPlace { root, path })
    }

    /// Lowers an expression, pushing any control-flow prelude into `out` and
    /// returning the resulting value.
    fn lower_expr(&mut self, expr: &Expr, out: &mut Vec<IrStep>) -> Result<IrValue, InternalError> {
        match expr {
            Expr::Literal(lit) => Ok(IrValue::Literal(lower_literal(lit))),
            Expr::Identifier(ident) => Ok(IrValue::Var(ident.name.clone())),
            Expr::Binary {
                op, left, right, ..
            } => {
                let left = self.lower_expr(left, out)?;
                let right = self.lower_expr(right, out)?;
                Ok(IrValue::Binary {
                    op: *op,
                    left: Box::new(left),
                    right: Box::new(right),
                })
            }
            Expr::Unary { op, expr, .. } => {
                let value = self.lower_expr(expr, out)?;
                Ok(IrValue::Unary {
                    op: *op,
                    value: Box::new(value),
                })
            }
            Expr::Call { function, args, .. } => {
                let args = self.lower_args(args, out)?;
                Ok(IrValue::Call {
                    function: function.name.clone(),
                    args,
                })
            }
            Expr::MethodCall {
                receiver,
                method,
                args,
                ..
            } => {
                if let Expr::Identifier(ident) = receiver.as_ref() {
                    // A local binding shadows an imported namespace. Shadowed
                    // receivers were typed as ordinary expressions, so the
                    // inference table decides which form this call takes.
                    if self.defs.namespaces.contains_key(&ident.name)
                        && !self.types.has_type(ident.span)
                    {
                        let args = self.lower_args(args, out)?;
                        return Ok(IrValue::NamespaceCall {
                            namespace: ident.name.clone(),
                            function: method.clone(),
                            args,
                        });
                    }
                }
                let receiver = self.lower_expr(receiver, out)?;
                let args = self.lower_args(args, out)?;
                Ok(IrValue::MethodCall {
                    receiver: Box::new(receiver),
                    method: method.clone(),
                    args,
                })
            }
            Expr::FieldAccess { base, field, .. } => {
                let base = self.lower_expr(base, out)?;
                Ok(IrValue::Field {
                    base: Box::new(base),
                    field: field.clone(),
                })
            }
            Expr::StructLiteral {
                name,
                fields,
                spread,
                ..
            } => {
                let fields = fields
                    .iter()
                    .map(|(f, v)| Ok((f.clone(), self.lower_expr(v, out)?)))
                    .collect::<Result<Vec<_>, InternalError>>()?;
                let spread = match spread {
                    Some(spread) => Some(Box::new(self.lower_expr(spread, out)?)),
                    None => None,
                };
                Ok(IrValue::StructNew {
                    name: name.clone(),
                    fields,
                    spread,
                })
            }
            Expr::VariantLiteral {
                enum_name,
                variant,
                args,
                ..
            } => {
                let args = self.lower_args(args, out)?;
                let enum_name = enum_name
                    .clone()
                    .or_else(|| self.defs.variant_owners.get(variant).cloned());
                Ok(IrValue::VariantNew {
                    enum_name,
                    variant: variant.clone(),
                    args,
                })
            }
            Expr::VecLiteral { elements, .. } => {
                let elements = elements
                    .iter()
                    .map(|e| self.lower_expr(e, out))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(IrValue::VecNew(elements))
            }
            Expr::Reference { mutable, expr, .. } => {
                let value = self.lower_expr(expr, out)?;
                Ok(IrValue::Ref {
                    mutable: *mutable,
                    value: Box::new(value),
                })
            }
            Expr::Deref { expr, .. } => {
                let value = self.lower_expr(expr, out)?;
                Ok(IrValue::Deref(Box::new(value)))
            }
            Expr::Panic { message, .. } => {
                let message = match message {
                    Some(message) => Some(self.lower_expr(message, out)?),
                    None => None,
                };
                out.push(IrStep::Abort(IrAbort::Panic(message)));
                Ok(IrValue::Unit)
            }
            Expr::Block(block) => {
                if self.types.type_of(block.span) == Type::Unit {
                    let steps = self.lower_block_effect(block)?;
                    out.push(IrStep::Scope(steps));
                    return Ok(IrValue::Unit);
                }
                let dest = self.fresh_temp();
                out.push(IrStep::Declare { name: dest.clone() });
                let steps = self.lower_block_value(block, &dest)?;
                out.push(IrStep::Scope(steps));
                Ok(IrValue::Var(dest))
            }
            Expr::If(if_expr) => self.lower_if_value(if_expr, out),
            Expr::Match(match_expr) => self.lower_match_value(match_expr, out),
        }
    }

    fn lower_args(
        &mut self,
        args: &[Expr],
        out: &mut Vec<IrStep>,
    ) -> Result<Vec<IrValue>, InternalError> {
        args.iter().map(|arg| self.lower_expr(arg, out)).collect()
    }

    fn bind_to_temp(&mut self, value: IrValue, out: &mut Vec<IrStep>) -> IrValue {
        match value {
            IrValue::Var(_) | IrValue::Literal(_) => value,
            other => {
                let tmp = self.fresh_temp();
                out.push(IrStep::Let {
                    name: tmp.clone(),
                    mutable: false,
                    value: other,
                });
                IrValue::Var(tmp)
            }
        }
    }

    fn lower_if_value(
        &mut self,
        if_expr: &IfExpr,
        out: &mut Vec<IrStep>,
    ) -> Result<IrValue, InternalError> {
        let produces_value = !matches!(
            self.types.type_of(if_expr.span),
            Type::Unit | Type::Never
        );
        let dest = if produces_value {
            let dest = self.fresh_temp();
            out.push(IrStep::Declare { name: dest.clone() });
            Some(dest)
        } else {
            None
        };
        let mut arms = Vec::new();
        let fallthrough = self.lower_if_arms(if_expr, dest.as_deref(), &mut arms, out)?;
        out.push(IrStep::Chain(IrChain { arms, fallthrough }));
        Ok(match dest {
            Some(dest) => IrValue::Var(dest),
            None => IrValue::Unit,
        })
    }

    /// Flattens an `if`/`else if` ladder into chain arms; returns the
    /// fallthrough steps contributed by a final `else` block, if any.
    fn lower_if_arms(
        &mut self,
        if_expr: &IfExpr,
        dest: Option<&str>,
        arms: &mut Vec<IrArm>,
        out: &mut Vec<IrStep>,
    ) -> Result<Vec<IrStep>, InternalError> {
        let (subject, test, bindings, guard) = match &if_expr.condition {
            IfCondition::Expr(cond) => {
                let condition = self.lower_expr(cond, out)?;
                (condition, IrTest::Cond, Vec::new(), None)
            }
            IfCondition::Let { pattern, value } => {
                let value = self.lower_expr(value, out)?;
                let subject = self.bind_to_temp(value, out);
                let (test, bindings, guard) = self.lower_pattern(pattern, &subject, if_expr.span)?;
                (subject, test, bindings, guard)
            }
        };
        let body = match dest {
            Some(dest) => self.lower_block_value(&if_expr.then_branch, dest)?,
            None => self.lower_block_effect(&if_expr.then_branch)?,
        };
        arms.push(IrArm {
            subject,
            test,
            bindings,
            guard,
            body,
        });
        match &if_expr.else_branch {
            None => Ok(Vec::new()),
            Some(ElseBranch::Block(block)) => match dest {
                Some(dest) => self.lower_block_value(block, dest),
                None => self.lower_block_effect(block),
            },
            Some(ElseBranch::ElseIf(nested)) => {
                // Nested condition preludes must run only after earlier arms
                // fail, so they lower inside the fallthrough.
                let mut prelude = Vec::new();
                let mut nested_arms = Vec::new();
                let nested_fallthrough =
                    self.lower_if_arms(nested, dest, &mut nested_arms, &mut prelude)?;
                if prelude.is_empty() {
                    arms.append(&mut nested_arms);
                    Ok(nested_fallthrough)
                } else {
                    prelude.push(IrStep::Chain(IrChain {
                        arms: nested_arms,
                        fallthrough: nested_fallthrough,
                    }));
                    Ok(prelude)
                }
            }
        }
    }

    fn lower_match_value(
        &mut self,
        match_expr: &MatchExpr,
        out: &mut Vec<IrStep>,
    ) -> Result<IrValue, InternalError> {
        let produces_value = !matches!(
            self.types.type_of(match_expr.span),
            Type::Unit | Type::Never
        );
        let dest = if produces_value {
            let dest = self.fresh_temp();
            out.push(IrStep::Declare { name: dest.clone() });
            Some(dest)
        } else {
            None
        };
        let scrutinee = self.lower_expr(&match_expr.scrutinee, out)?;
        let subject = self.bind_to_temp(scrutinee, out);
        let mut arms = Vec::new();
        let mut exhaustive = false;
        for arm in &match_expr.arms {
            let (test, bindings, mut guard) =
                self.lower_pattern(&arm.pattern, &subject, arm.span)?;
            if let Some(user_guard) = &arm.guard {
                let mut prelude = Vec::new();
                let lowered = self.lower_expr(user_guard, &mut prelude)?;
                if !prelude.is_empty() {
                    return Err(InternalError::malformed(
                        "branching expression in match guard",
                        arm.span,
                    ));
                }
                guard = Some(match guard {
                    Some(existing) => IrValue::Binary {
                        op: BinaryOp::And,
                        left: Box::new(existing),
                        right: Box::new(lowered),
                    },
                    None => lowered,
                });
            }
            if matches!(test, IrTest::Always) && guard.is_none() {
                exhaustive = true;
            }
            let mut body = Vec::new();
            let value = self.lower_expr(&arm.value, &mut body)?;
            match (&dest, self.types.type_of(arm.value.span()).is_never()) {
                (Some(dest), false) => body.push(IrStep::Assign {
                    target: IrPlace {
                        root: dest.clone(),
                        path: Vec::new(),
                    },
                    value,
                }),
                _ => {
                    if !matches!(value, IrValue::Unit) {
                        body.push(IrStep::Eval(value));
                    }
                }
            }
            arms.push(IrArm {
                subject: subject.clone(),
                test,
                bindings,
                guard,
                body,
            });
            if exhaustive {
                break;
            }
        }
        let fallthrough = if exhaustive {
            Vec::new()
        } else {
            vec![IrStep::Abort(IrAbort::Panic(Some(IrValue::Literal(
                IrLiteral::Str("unmatched value".to_string()),
            ))))]
        };
        out.push(IrStep::Chain(IrChain { arms, fallthrough }));
        Ok(match dest {
            Some(dest) => IrValue::Var(dest),
            None => IrValue::Unit,
        })
    }

    /// Turns a pattern into a chain test plus binding introductions. Nested
    /// sub-patterns one level deep are supported: bindings directly, literals
    /// via a synthesized guard. Anything deeper is out of the source
    /// language's shape.
    fn lower_pattern(
        &mut self,
        pattern: &Pattern,
        subject: &IrValue,
        span: crate::language::span::Span,
    ) -> Result<(IrTest, Vec<IrBindingIntro>, Option<IrValue>), InternalError> {
        match pattern {
            Pattern::Wildcard(_) => Ok((IrTest::Always, Vec::new(), None)),
            Pattern::Binding { name, by_ref, .. } => Ok((
                IrTest::Always,
                vec![IrBindingIntro {
                    name: name.clone(),
                    source: IrBindingSource::Whole,
                    by_ref: *by_ref,
                }],
                None,
            )),
            Pattern::Literal(lit) => Ok((IrTest::Eq(lower_literal(lit)), Vec::new(), None)),
            Pattern::Variant {
                enum_name,
                variant,
                fields,
                ..
            } => {
                let (test, payload_source) = match (enum_name.as_deref(), variant.as_str()) {
                    (None, "Some") => (IrTest::IsSome, Some(IrBindingSource::OptionPayload)),
                    (None, "None") => (IrTest::IsNone, None),
                    _ => {
                        let owner = enum_name
                            .clone()
                            .or_else(|| self.defs.variant_owners.get(variant).cloned())
                            .ok_or_else(|| {
                                InternalError::malformed("variant with unknown enum", span)
                            })?;
                        (
                            IrTest::Variant {
                                enum_name: owner,
                                variant: variant.clone(),
                            },
                            None,
                        )
                    }
                };
                let mut bindings = Vec::new();
                let mut guard = None;
                for (index, field) in fields.iter().enumerate() {
                    let source = match &payload_source {
                        Some(source) => source.clone(),
                        None => IrBindingSource::VariantField(index),
                    };
                    self.lower_sub_pattern(field, source, subject, &mut bindings, &mut guard, span)?;
                }
                Ok((test, bindings, guard))
            }
            Pattern::Struct { fields, .. } => {
                let mut bindings = Vec::new();
                let mut guard = None;
                for (field, sub) in fields {
                    self.lower_sub_pattern(
                        sub,
                        IrBindingSource::StructField(field.clone()),
                        subject,
                        &mut bindings,
                        &mut guard,
                        span,
                    )?;
                }
                Ok((IrTest::Always, bindings, guard))
            }
        }
    }

    fn lower_sub_pattern(
        &mut self,
        pattern: &Pattern,
        source: IrBindingSource,
        subject: &IrValue,
        bindings: &mut Vec<IrBindingIntro>,
        guard: &mut Option<IrValue>,
        span: crate::language::span::Span,
    ) -> Result<(), InternalError> {
        match pattern {
            Pattern::Wildcard(_) => Ok(()),
            Pattern::Binding { name, by_ref, .. } => {
                bindings.push(IrBindingIntro {
                    name: name.clone(),
                    source,
                    by_ref: *by_ref,
                });
                Ok(())
            }
            Pattern::Literal(lit) => {
                // The payload is compared in place instead of bound; the
                // synthesized guard runs only after the shape test passes.
                let check = IrValue::Binary {
                    op: BinaryOp::Eq,
                    left: Box::new(IrValue::Extract {
                        subject: Box::new(subject.clone()),
                        source,
                    }),
                    right: Box::new(IrValue::Literal(lower_literal(lit))),
                };
                *guard = Some(match guard.take() {
                    Some(existing) => IrValue::Binary {
                        op: BinaryOp::And,
                        left: Box::new(existing),
                        right: Box::new(check),
                    },
                    None => check,
                });
                Ok(())
            }
            Pattern::Variant { .. } | Pattern::Struct { .. } => Err(InternalError::malformed(
                "destructuring nested deeper than one level",
                span,
            )),
        }
    }
}

fn lower_literal(lit: &Literal) -> IrLiteral {
    match lit {
        Literal::Int(value, _) => IrLiteral::Int(*value),
        Literal::Float(value, _) => IrLiteral::Float(*value),
        Literal::Bool(value, _) => IrLiteral::Bool(*value),
        Literal::Str(value, _) => IrLiteral::Str(value.clone()),
    }
}
