//! Divergence-aware type inference.
//!
//! Walks every function body after resolution, assigning each expression a
//! semantic [`Type`]. Diverging constructs (`return`, `break`, `continue`,
//! `panic(...)`) produce the bottom type `Never`, which branch unification
//! absorbs: a two-armed `if` where one arm diverges takes the other arm's
//! type, and a block whose statements diverge is itself `Never` regardless of
//! its tail. Mismatches surface as RS003 with both offending spans; inference
//! then recovers with the first branch's type and keeps walking so one pass
//! reports every independent error.

use crate::language::{
    ast::*,
    diagnostics::{codes, Diagnostic, Diagnostics},
    errors::{InternalError, MAX_DEPTH},
    modules::ExportedSymbol,
    resolve::Definitions,
    span::Span,
    types::Type,
};
use std::collections::HashMap;

/// One name introduced by a pattern, with the type the scrutinee gave it.
#[derive(Clone, Debug, PartialEq)]
pub struct PatternBinding {
    pub name: String,
    pub ty: Type,
    pub by_ref: bool,
    pub span: Span,
}

/// Inference results, keyed by span so the raw AST stays untouched. Lowering
/// and the discipline checker both read these tables; neither writes them.
#[derive(Debug, Default)]
pub struct InferOutput {
    pub expr_types: HashMap<Span, Type>,
    pub pattern_bindings: HashMap<Span, Vec<PatternBinding>>,
}

impl InferOutput {
    pub fn type_of(&self, span: Span) -> Type {
        self.expr_types.get(&span).cloned().unwrap_or(Type::Unknown)
    }

    /// Whether inference visited an expression at this span. Namespace
    /// receivers are resolved against the import table instead of being
    /// typed, so they have no entry.
    pub fn has_type(&self, span: Span) -> bool {
        self.expr_types.contains_key(&span)
    }

    pub fn bindings_of(&self, span: Span) -> &[PatternBinding] {
        self.pattern_bindings
            .get(&span)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

pub fn infer_file(
    file: &FileAst,
    defs: &Definitions,
    diagnostics: &mut Diagnostics,
) -> Result<InferOutput, InternalError> {
    let mut inferencer = Inferencer {
        defs,
        diagnostics,
        scopes: Vec::new(),
        ret_ty: Type::Unit,
        in_loop: false,
        depth: 0,
        output: InferOutput::default(),
    };
    inferencer.infer_items(&file.items)?;
    Ok(inferencer.output)
}

struct Inferencer<'a> {
    defs: &'a Definitions,
    diagnostics: &'a mut Diagnostics,
    scopes: Vec<HashMap<String, Type>>,
    ret_ty: Type,
    in_loop: bool,
    depth: usize,
    output: InferOutput,
}

impl<'a> Inferencer<'a> {
    fn infer_items(&mut self, items: &[Item]) -> Result<(), InternalError> {
        for item in items {
            match item {
                Item::Function(def) => self.infer_function(def)?,
                Item::Plugin(plugin) => self.infer_items(&plugin.items)?,
                Item::Struct(_) | Item::Enum(_) => {}
            }
        }
        Ok(())
    }

    fn infer_function(&mut self, def: &FunctionDef) -> Result<(), InternalError> {
        let saved_ret = std::mem::replace(
            &mut self.ret_ty,
            def.ret
                .as_ref()
                .map(|ty| self.defs.type_of_ref(ty))
                .unwrap_or(Type::Unit),
        );
        let saved_loop = std::mem::replace(&mut self.in_loop, false);
        self.push_scope();
        for param in &def.params {
            let ty = self.defs.type_of_ref(&param.ty);
            self.declare(&param.name, ty);
        }
        let body_ty = self.infer_block(&def.body)?;
        if !body_ty.is_assignable_to(&self.ret_ty) {
            let span = def
                .body
                .tail
                .as_ref()
                .map(|tail| tail.span())
                .unwrap_or(def.body.span);
            self.mismatch(&self.ret_ty.clone(), &body_ty, span, def.span);
        }
        self.pop_scope();
        self.ret_ty = saved_ret;
        self.in_loop = saved_loop;
        Ok(())
    }

    /// Type of a block: `Never` if any statement diverges, otherwise the tail
    /// expression's type, otherwise `Unit`. A block never defaults to `Unit`
    /// when its tail is a branching expression; it takes the unified branch
    /// type, divergent arms included.
    fn infer_block(&mut self, block: &Block) -> Result<Type, InternalError> {
        self.push_scope();
        let mut diverged = false;
        for stmt in &block.statements {
            if self.infer_stmt(stmt)? {
                diverged = true;
            }
        }
        let tail_ty = match &block.tail {
            Some(tail) => self.infer_expr(tail)?,
            None => Type::Unit,
        };
        self.pop_scope();
        if diverged {
            Ok(Type::Never)
        } else {
            Ok(tail_ty)
        }
    }

    /// Returns whether the statement unconditionally diverges.
    fn infer_stmt(&mut self, stmt: &Statement) -> Result<bool, InternalError> {
        match stmt {
            Statement::Let(stmt) => {
                let value_ty = self.infer_expr(&stmt.value)?;
                let bound_ty = match &stmt.ty {
                    Some(annotation) => {
                        let declared = self.defs.type_of_ref(annotation);
                        if !value_ty.is_assignable_to(&declared) {
                            self.mismatch(&declared, &value_ty, stmt.value.span(), stmt.span);
                        }
                        declared
                    }
                    None => value_ty.clone(),
                };
                self.bind_pattern(&stmt.pattern, &bound_ty)?;
                Ok(value_ty.is_never())
            }
            Statement::Assign(stmt) => {
                let target_ty = self.infer_expr(&stmt.target)?;
                let value_ty = self.infer_expr(&stmt.value)?;
                let expected = target_ty.strip_refs();
                if !value_ty.is_assignable_to(expected) {
                    self.mismatch(expected, &value_ty, stmt.value.span(), stmt.target.span());
                }
                Ok(value_ty.is_never())
            }
            Statement::Expr(stmt) => {
                let ty = self.infer_expr(&stmt.expr)?;
                Ok(ty.is_never())
            }
            Statement::Return(stmt) => {
                let value_ty = match &stmt.value {
                    Some(value) => self.infer_expr(value)?,
                    None => Type::Unit,
                };
                if !value_ty.is_assignable_to(&self.ret_ty) {
                    let span = stmt
                        .value
                        .as_ref()
                        .map(|v| v.span())
                        .unwrap_or(stmt.span);
                    self.mismatch(&self.ret_ty.clone(), &value_ty, span, stmt.span);
                }
                Ok(true)
            }
            Statement::While(stmt) => {
                self.expect_bool(&stmt.condition)?;
                let saved = std::mem::replace(&mut self.in_loop, true);
                self.infer_block(&stmt.body)?;
                self.in_loop = saved;
                Ok(false)
            }
            Statement::For(stmt) => {
                let iter_ty = self.infer_expr(&stmt.iter)?;
                let element = match iter_ty.strip_refs() {
                    Type::Vec(inner) => (**inner).clone(),
                    Type::Unknown | Type::Never => Type::Unknown,
                    other => {
                        self.diagnostics.push(Diagnostic::error(
                            codes::TYPE_MISMATCH,
                            format!("cannot iterate over `{}`", other),
                            stmt.iter.span(),
                        ));
                        Type::Unknown
                    }
                };
                self.push_scope();
                self.declare(&stmt.binding, element);
                let saved = std::mem::replace(&mut self.in_loop, true);
                self.infer_block(&stmt.body)?;
                self.in_loop = saved;
                self.pop_scope();
                Ok(false)
            }
            Statement::Traverse(stmt) => {
                self.infer_traverse(stmt)?;
                Ok(false)
            }
            Statement::Break(span) | Statement::Continue(span) => {
                if !self.in_loop {
                    self.diagnostics.push(Diagnostic::error(
                        codes::TYPE_MISMATCH,
                        "loop control outside of a loop".to_string(),
                        *span,
                    ));
                }
                Ok(true)
            }
        }
    }

    fn infer_traverse(&mut self, stmt: &TraverseStmt) -> Result<(), InternalError> {
        self.infer_expr(&stmt.target)?;
        self.push_scope();
        for state in &stmt.state {
            let value_ty = self.infer_expr(&state.value)?;
            let bound_ty = match &state.ty {
                Some(annotation) => {
                    let declared = self.defs.type_of_ref(annotation);
                    if !value_ty.is_assignable_to(&declared) {
                        self.mismatch(&declared, &value_ty, state.value.span(), state.span);
                    }
                    declared
                }
                None => value_ty,
            };
            self.bind_pattern(&state.pattern, &bound_ty)?;
        }
        for visitor in &stmt.visitors {
            self.infer_function(visitor)?;
        }
        self.pop_scope();
        Ok(())
    }

    fn infer_expr(&mut self, expr: &Expr) -> Result<Type, InternalError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(InternalError::DepthExceeded { span: expr.span() });
        }
        let ty = self.infer_expr_inner(expr)?;
        self.depth -= 1;
        self.output.expr_types.insert(expr.span(), ty.clone());
        Ok(ty)
    }

    fn infer_expr_inner(&mut self, expr: &Expr) -> Result<Type, InternalError> {
        match expr {
            Expr::Literal(lit) => Ok(literal_type(lit)),
            Expr::Identifier(ident) => Ok(self.lookup(&ident.name)),
            Expr::Binary {
                op,
                left,
                right,
                span,
            } => self.infer_binary(*op, left, right, *span),
            Expr::Unary { op, expr, span } => {
                let ty = self.infer_expr(expr)?;
                match op {
                    UnaryOp::Not => {
                        if !matches!(ty.strip_refs(), Type::Bool | Type::Unknown | Type::Never) {
                            self.diagnostics.push(Diagnostic::error(
                                codes::TYPE_MISMATCH,
                                format!("cannot apply `!` to `{}`", ty),
                                *span,
                            ));
                        }
                        Ok(Type::Bool)
                    }
                    UnaryOp::Neg => match ty.strip_refs() {
                        Type::Int => Ok(Type::Int),
                        Type::Float => Ok(Type::Float),
                        Type::Unknown | Type::Never => Ok(Type::Unknown),
                        other => {
                            self.diagnostics.push(Diagnostic::error(
                                codes::TYPE_MISMATCH,
                                format!("cannot negate `{}`", other),
                                *span,
                            ));
                            Ok(Type::Unknown)
                        }
                    },
                }
            }
            Expr::Call {
                function,
                args,
                span,
            } => self.infer_call(function, args, *span),
            Expr::MethodCall {
                receiver,
                method,
                args,
                span,
            } => self.infer_method_call(receiver, method, args, *span),
            Expr::FieldAccess { base, field, span } => {
                let base_ty = self.infer_expr(base)?;
                match base_ty.strip_refs() {
                    Type::Struct(name) => match self.defs.struct_field(name, field) {
                        Some(ty) => Ok(ty),
                        None => {
                            self.diagnostics.push(Diagnostic::error(
                                codes::TYPE_MISMATCH,
                                format!("struct `{}` has no field `{}`", name, field),
                                *span,
                            ));
                            Ok(Type::Unknown)
                        }
                    },
                    // Host tree nodes are opaque; their fields type as opaque
                    // nodes too.
                    Type::Named(name, _) => Ok(Type::Named(name.clone(), Vec::new())),
                    Type::Unknown | Type::Never => Ok(Type::Unknown),
                    other => {
                        self.diagnostics.push(Diagnostic::error(
                            codes::TYPE_MISMATCH,
                            format!("`{}` has no fields", other),
                            *span,
                        ));
                        Ok(Type::Unknown)
                    }
                }
            }
            Expr::StructLiteral {
                name,
                fields,
                spread,
                span,
            } => self.infer_struct_literal(name, fields, spread.as_deref(), *span),
            Expr::VariantLiteral {
                enum_name,
                variant,
                args,
                span,
            } => self.infer_variant_literal(enum_name.as_deref(), variant, args, *span),
            Expr::VecLiteral { elements, span } => {
                let mut element_ty = Type::Unknown;
                let mut first_span = *span;
                for element in elements {
                    let ty = self.infer_expr(element)?;
                    match element_ty.unify(&ty) {
                        Some(unified) => {
                            if element_ty.is_unknown() {
                                first_span = element.span();
                            }
                            element_ty = unified;
                        }
                        None => {
                            self.mismatch(&element_ty.clone(), &ty, element.span(), first_span);
                        }
                    }
                }
                Ok(Type::vec(element_ty))
            }
            Expr::If(if_expr) => self.infer_if(if_expr),
            Expr::Match(match_expr) => self.infer_match(match_expr),
            Expr::Block(block) => self.infer_block(block),
            Expr::Reference {
                mutable,
                expr,
                span: _,
            } => {
                let inner = self.infer_expr(expr)?;
                Ok(Type::reference(*mutable, inner))
            }
            Expr::Deref { expr, span } => {
                let ty = self.infer_expr(expr)?;
                match ty.deref() {
                    Some(inner) => Ok(inner.clone()),
                    None if ty.is_unknown() || ty.is_never() => Ok(Type::Unknown),
                    None => {
                        self.diagnostics.push(Diagnostic::error(
                            codes::TYPE_MISMATCH,
                            format!("cannot dereference `{}`", ty),
                            *span,
                        ));
                        Ok(Type::Unknown)
                    }
                }
            }
            Expr::Panic { message, .. } => {
                if let Some(message) = message {
                    let ty = self.infer_expr(message)?;
                    if !ty.is_assignable_to(&Type::Str) {
                        self.mismatch(&Type::Str, &ty, message.span(), message.span());
                    }
                }
                Ok(Type::Never)
            }
        }
    }

    fn infer_binary(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        span: Span,
    ) -> Result<Type, InternalError> {
        let lhs = self.infer_expr(left)?;
        let rhs = self.infer_expr(right)?;
        if op.is_logical() {
            for (ty, operand) in [(&lhs, left), (&rhs, right)] {
                if !matches!(ty.strip_refs(), Type::Bool | Type::Unknown | Type::Never) {
                    self.diagnostics.push(Diagnostic::error(
                        codes::TYPE_MISMATCH,
                        format!("logical operand must be `Bool`, found `{}`", ty),
                        operand.span(),
                    ));
                }
            }
            return Ok(Type::Bool);
        }
        if op.is_comparison() {
            if lhs.strip_refs().unify(rhs.strip_refs()).is_none() {
                self.mismatch(&lhs, &rhs, right.span(), left.span());
            }
            return Ok(Type::Bool);
        }
        // Arithmetic. `+` doubles as string concatenation.
        match (lhs.strip_refs(), rhs.strip_refs()) {
            (Type::Never, _) | (_, Type::Never) => Ok(Type::Never),
            (Type::Unknown, _) | (_, Type::Unknown) => Ok(Type::Unknown),
            (Type::Int, Type::Int) => Ok(Type::Int),
            (Type::Int | Type::Float, Type::Int | Type::Float) => Ok(Type::Float),
            (Type::Str, Type::Str) if op == BinaryOp::Add => Ok(Type::Str),
            (a, b) => {
                self.diagnostics.push(Diagnostic::error(
                    codes::TYPE_MISMATCH,
                    format!("invalid operands `{}` and `{}`", a, b),
                    span,
                ));
                Ok(Type::Unknown)
            }
        }
    }

    fn infer_call(
        &mut self,
        function: &Identifier,
        args: &[Expr],
        span: Span,
    ) -> Result<Type, InternalError> {
        let sig = self.defs.functions.get(&function.name).cloned();
        let Some(sig) = sig else {
            for arg in args {
                self.infer_expr(arg)?;
            }
            return Ok(Type::Unknown);
        };
        self.check_call_args(&sig.name, &sig.params, sig.ret.clone(), args, span)
    }

    fn check_call_args(
        &mut self,
        name: &str,
        params: &[Type],
        ret: Type,
        args: &[Expr],
        span: Span,
    ) -> Result<Type, InternalError> {
        if args.len() != params.len() {
            self.diagnostics.push(Diagnostic::error(
                codes::TYPE_MISMATCH,
                format!(
                    "`{}` takes {} argument(s), {} supplied",
                    name,
                    params.len(),
                    args.len()
                ),
                span,
            ));
        }
        for (arg, param) in args.iter().zip(params) {
            let arg_ty = self.infer_expr(arg)?;
            if !arg_ty.is_assignable_to(param) {
                self.mismatch(param, &arg_ty, arg.span(), span);
            }
        }
        for arg in args.iter().skip(params.len()) {
            self.infer_expr(arg)?;
        }
        Ok(ret)
    }

    fn infer_method_call(
        &mut self,
        receiver: &Expr,
        method: &str,
        args: &[Expr],
        span: Span,
    ) -> Result<Type, InternalError> {
        // A namespace member call looks like a method call on the bound
        // namespace name; resolve it against the import's export list.
        if let Expr::Identifier(ident) = receiver {
            if self.lookup_local(&ident.name).is_none()
                && self.defs.namespaces.contains_key(&ident.name)
            {
                let symbol = self.defs.namespace_symbol(&ident.name, method).cloned();
                return match symbol {
                    Some(ExportedSymbol::Function { name, params, ret }) => {
                        self.check_call_args(&name, &params, ret, args, span)
                    }
                    _ => {
                        self.diagnostics.push(Diagnostic::error(
                            codes::UNDEFINED_VARIABLE,
                            format!("`{}` has no function `{}`", ident.name, method),
                            span,
                        ));
                        for arg in args {
                            self.infer_expr(arg)?;
                        }
                        Ok(Type::Unknown)
                    }
                };
            }
        }
        let recv_ty = self.infer_expr(receiver)?;
        let arg_tys = args
            .iter()
            .map(|arg| self.infer_expr(arg))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.builtin_method(recv_ty, method, &arg_tys, args, span))
    }

    /// Built-in method table. Receivers are matched after stripping references
    /// since the DSL auto-derefs on method dispatch.
    fn builtin_method(
        &mut self,
        recv_ty: Type,
        method: &str,
        arg_tys: &[Type],
        args: &[Expr],
        span: Span,
    ) -> Type {
        let recv = recv_ty.strip_refs();
        if recv.is_unknown() || recv.is_never() {
            return Type::Unknown;
        }
        match (recv, method, arg_tys.len()) {
            (_, "clone", 0) => recv.clone(),
            (Type::Vec(_) | Type::Str, "len", 0) => Type::Int,
            (Type::Str, "is_empty", 0) | (Type::Vec(_), "is_empty", 0) => Type::Bool,
            (Type::Vec(inner), "push", 1) => {
                self.expect_arg(inner, &arg_tys[0], args[0].span());
                Type::Unit
            }
            (Type::Vec(inner), "insert", 2) => {
                self.expect_arg(&Type::Int, &arg_tys[0], args[0].span());
                self.expect_arg(inner, &arg_tys[1], args[1].span());
                Type::Unit
            }
            (Type::Vec(inner), "remove", 1) => {
                self.expect_arg(&Type::Int, &arg_tys[0], args[0].span());
                (**inner).clone()
            }
            (Type::Vec(inner), "pop", 0) => Type::option((**inner).clone()),
            (Type::Vec(_), "clear", 0) => Type::Unit,
            (Type::Vec(inner), "get", 1) => {
                self.expect_arg(&Type::Int, &arg_tys[0], args[0].span());
                Type::option(Type::reference(false, (**inner).clone()))
            }
            (Type::Vec(inner), "contains", 1) => {
                self.expect_arg(inner, &arg_tys[0], args[0].span());
                Type::Bool
            }
            (Type::Option(_), "is_some", 0) | (Type::Option(_), "is_none", 0) => Type::Bool,
            (Type::Option(inner), "unwrap", 0) => (**inner).clone(),
            (Type::Option(inner), "unwrap_or", 1) => {
                self.expect_arg(inner, &arg_tys[0], args[0].span());
                (**inner).clone()
            }
            (Type::Str, "contains", 1) | (Type::Str, "starts_with", 1) => {
                self.expect_arg(&Type::Str, &arg_tys[0], args[0].span());
                Type::Bool
            }
            (Type::Int | Type::Float | Type::Bool | Type::Str, "to_str", 0) => Type::Str,
            (Type::Str, "into", 0) => Type::Str,
            // Methods on opaque host nodes cannot be checked here; the host
            // binding layer validates them at plugin load time.
            (Type::Named(_, _), _, _) => Type::Named("Node".to_string(), Vec::new()),
            _ => {
                self.diagnostics.push(Diagnostic::error(
                    codes::TYPE_MISMATCH,
                    format!("no method `{}` on `{}`", method, recv),
                    span,
                ));
                Type::Unknown
            }
        }
    }

    fn infer_struct_literal(
        &mut self,
        name: &str,
        fields: &[(String, Expr)],
        spread: Option<&Expr>,
        span: Span,
    ) -> Result<Type, InternalError> {
        let info = self.defs.structs.get(name).cloned();
        let Some(info) = info else {
            for (_, value) in fields {
                self.infer_expr(value)?;
            }
            if let Some(spread) = spread {
                self.infer_expr(spread)?;
            }
            return Ok(Type::Unknown);
        };
        for (field, value) in fields {
            let value_ty = self.infer_expr(value)?;
            if info.opaque {
                continue;
            }
            match info.fields.iter().find(|(f, _)| f == field) {
                Some((_, field_ty)) => {
                    if !value_ty.is_assignable_to(field_ty) {
                        self.mismatch(field_ty, &value_ty, value.span(), span);
                    }
                }
                None => {
                    self.diagnostics.push(Diagnostic::error(
                        codes::TYPE_MISMATCH,
                        format!("struct `{}` has no field `{}`", name, field),
                        value.span(),
                    ));
                }
            }
        }
        match spread {
            Some(spread) => {
                let spread_ty = self.infer_expr(spread)?;
                if !spread_ty
                    .strip_refs()
                    .is_assignable_to(&Type::Struct(name.to_string()))
                {
                    self.mismatch(
                        &Type::Struct(name.to_string()),
                        &spread_ty,
                        spread.span(),
                        span,
                    );
                }
            }
            None => {
                if !info.opaque {
                    for (field, _) in &info.fields {
                        if !fields.iter().any(|(f, _)| f == field) {
                            self.diagnostics.push(Diagnostic::error(
                                codes::TYPE_MISMATCH,
                                format!("missing field `{}` in `{}` literal", field, name),
                                span,
                            ));
                        }
                    }
                }
            }
        }
        Ok(Type::Struct(name.to_string()))
    }

    fn infer_variant_literal(
        &mut self,
        enum_name: Option<&str>,
        variant: &str,
        args: &[Expr],
        span: Span,
    ) -> Result<Type, InternalError> {
        // Some/None are built in; every other bare variant resolves through
        // the unqualified-variant index the resolver built.
        if enum_name.is_none() && variant == "Some" {
            let inner = match args {
                [arg] => self.infer_expr(arg)?,
                _ => {
                    self.diagnostics.push(Diagnostic::error(
                        codes::TYPE_MISMATCH,
                        format!("`Some` takes 1 argument, {} supplied", args.len()),
                        span,
                    ));
                    for arg in args {
                        self.infer_expr(arg)?;
                    }
                    Type::Unknown
                }
            };
            return Ok(Type::option(inner));
        }
        if enum_name.is_none() && variant == "None" {
            if !args.is_empty() {
                self.diagnostics.push(Diagnostic::error(
                    codes::TYPE_MISMATCH,
                    "`None` takes no arguments".to_string(),
                    span,
                ));
            }
            return Ok(Type::option(Type::Unknown));
        }
        let owner = enum_name
            .map(str::to_string)
            .or_else(|| self.defs.variant_owners.get(variant).cloned());
        let Some(owner) = owner else {
            for arg in args {
                self.infer_expr(arg)?;
            }
            return Ok(Type::Unknown);
        };
        let fields = self
            .defs
            .variant(&owner, variant)
            .map(|v| v.fields.clone())
            .unwrap_or_default();
        if args.len() != fields.len() {
            self.diagnostics.push(Diagnostic::error(
                codes::TYPE_MISMATCH,
                format!(
                    "variant `{}::{}` takes {} argument(s), {} supplied",
                    owner,
                    variant,
                    fields.len(),
                    args.len()
                ),
                span,
            ));
        }
        for (arg, field_ty) in args.iter().zip(&fields) {
            let arg_ty = self.infer_expr(arg)?;
            if !arg_ty.is_assignable_to(field_ty) {
                self.mismatch(field_ty, &arg_ty, arg.span(), span);
            }
        }
        for arg in args.iter().skip(fields.len()) {
            self.infer_expr(arg)?;
        }
        Ok(self.defs.enum_type(&owner).unwrap_or(Type::Unknown))
    }

    fn infer_if(&mut self, if_expr: &IfExpr) -> Result<Type, InternalError> {
        let then_ty = match &if_expr.condition {
            IfCondition::Expr(cond) => {
                self.expect_bool(cond)?;
                self.infer_block(&if_expr.then_branch)?
            }
            IfCondition::Let { pattern, value } => {
                let value_ty = self.infer_expr(value)?;
                self.push_scope();
                self.bind_refutable(pattern, &value_ty)?;
                let ty = self.infer_block(&if_expr.then_branch)?;
                self.pop_scope();
                ty
            }
        };
        let then_span = if_expr.then_branch.span;
        match &if_expr.else_branch {
            None => Ok(Type::Unit),
            Some(branch) => {
                let (else_ty, else_span) = match branch {
                    ElseBranch::Block(block) => (self.infer_block(block)?, block.span),
                    ElseBranch::ElseIf(nested) => (self.infer_if(nested)?, nested.span),
                };
                Ok(self.unify_branches(then_ty, then_span, else_ty, else_span))
            }
        }
    }

    fn infer_match(&mut self, match_expr: &MatchExpr) -> Result<Type, InternalError> {
        let scrutinee_ty = self.infer_expr(&match_expr.scrutinee)?;
        let mut result: Option<(Type, Span)> = None;
        for arm in &match_expr.arms {
            self.push_scope();
            self.bind_refutable(&arm.pattern, &scrutinee_ty)?;
            if let Some(guard) = &arm.guard {
                self.expect_bool(guard)?;
            }
            let arm_ty = self.infer_expr(&arm.value)?;
            self.pop_scope();
            result = Some(match result {
                None => (arm_ty, arm.value.span()),
                Some((acc, acc_span)) => {
                    let unified =
                        self.unify_branches(acc, acc_span, arm_ty, arm.value.span());
                    (unified, acc_span)
                }
            });
        }
        Ok(result.map(|(ty, _)| ty).unwrap_or(Type::Unit))
    }

    /// Unifies two branch types, reporting RS003 with both spans on failure
    /// and recovering with the first branch's type.
    fn unify_branches(&mut self, a: Type, a_span: Span, b: Type, b_span: Span) -> Type {
        match a.unify(&b) {
            Some(unified) => unified,
            None => {
                self.diagnostics.push(
                    Diagnostic::error(
                        codes::TYPE_MISMATCH,
                        format!("branches have mismatched types `{}` and `{}`", a, b),
                        b_span,
                    )
                    .with_related(a_span)
                    .with_help("every non-diverging branch must produce the same type"),
                );
                a
            }
        }
    }

    // ---- patterns -----------------------------------------------------

    /// Irrefutable binding position (`let`, traversal state).
    fn bind_pattern(&mut self, pattern: &Pattern, ty: &Type) -> Result<(), InternalError> {
        self.bind_refutable(pattern, ty)
    }

    fn bind_refutable(&mut self, pattern: &Pattern, ty: &Type) -> Result<(), InternalError> {
        let mut bindings = Vec::new();
        self.collect_bindings(pattern, ty, &mut bindings, 0)?;
        for binding in &bindings {
            self.declare(&binding.name, binding.ty.clone());
        }
        self.output
            .pattern_bindings
            .insert(pattern.span(), bindings);
        Ok(())
    }

    fn collect_bindings(
        &mut self,
        pattern: &Pattern,
        ty: &Type,
        out: &mut Vec<PatternBinding>,
        depth: usize,
    ) -> Result<(), InternalError> {
        if depth > MAX_DEPTH {
            return Err(InternalError::DepthExceeded {
                span: pattern.span(),
            });
        }
        let ty = ty.strip_refs();
        match pattern {
            Pattern::Wildcard(_) => {}
            Pattern::Literal(lit) => {
                let lit_ty = literal_type(lit);
                if ty.unify(&lit_ty).is_none() {
                    self.mismatch(ty, &lit_ty, lit.span(), lit.span());
                }
            }
            Pattern::Binding { name, by_ref, span } => {
                let bound = if *by_ref {
                    Type::reference(false, ty.clone())
                } else {
                    ty.clone()
                };
                out.push(PatternBinding {
                    name: name.clone(),
                    ty: bound,
                    by_ref: *by_ref,
                    span: *span,
                });
            }
            Pattern::Variant {
                enum_name,
                variant,
                fields,
                span,
            } => {
                let field_types =
                    self.variant_field_types(enum_name.as_deref(), variant, ty, *span);
                if field_types.len() != fields.len() {
                    self.diagnostics.push(Diagnostic::error(
                        codes::TYPE_MISMATCH,
                        format!(
                            "variant `{}` has {} field(s), pattern binds {}",
                            variant,
                            field_types.len(),
                            fields.len()
                        ),
                        *span,
                    ));
                }
                for (field, field_ty) in fields.iter().zip(&field_types) {
                    self.collect_bindings(field, field_ty, out, depth + 1)?;
                }
                for field in fields.iter().skip(field_types.len()) {
                    self.collect_bindings(field, &Type::Unknown, out, depth + 1)?;
                }
            }
            Pattern::Struct { name, fields, span } => {
                for (field, sub) in fields {
                    let field_ty = match ty {
                        Type::Struct(struct_name) => {
                            let found = self.defs.struct_field(struct_name, field);
                            if found.is_none() {
                                self.diagnostics.push(Diagnostic::error(
                                    codes::TYPE_MISMATCH,
                                    format!("struct `{}` has no field `{}`", struct_name, field),
                                    *span,
                                ));
                            }
                            found.unwrap_or(Type::Unknown)
                        }
                        Type::Unknown | Type::Never => Type::Unknown,
                        other => {
                            self.mismatch(
                                &Type::Struct(name.clone()),
                                other,
                                *span,
                                *span,
                            );
                            Type::Unknown
                        }
                    };
                    self.collect_bindings(sub, &field_ty, out, depth + 1)?;
                }
            }
        }
        Ok(())
    }

    /// Field types a variant pattern destructures, driven by the scrutinee
    /// type when it is known and by the variant index otherwise.
    fn variant_field_types(
        &mut self,
        enum_name: Option<&str>,
        variant: &str,
        scrutinee: &Type,
        span: Span,
    ) -> Vec<Type> {
        match scrutinee {
            Type::Option(inner) => {
                return match variant {
                    "Some" => vec![(**inner).clone()],
                    "None" => Vec::new(),
                    other => {
                        self.diagnostics.push(Diagnostic::error(
                            codes::TYPE_MISMATCH,
                            format!("`{}` is not an `Option` variant", other),
                            span,
                        ));
                        Vec::new()
                    }
                };
            }
            Type::Enum { name, variants } => {
                if let Some(expected) = enum_name {
                    if expected != name {
                        self.mismatch(
                            scrutinee,
                            &Type::Named(expected.to_string(), Vec::new()),
                            span,
                            span,
                        );
                    }
                }
                return match variants.iter().find(|v| v.name == variant) {
                    Some(v) => v.fields.clone(),
                    None => {
                        self.diagnostics.push(Diagnostic::error(
                            codes::TYPE_MISMATCH,
                            format!("enum `{}` has no variant `{}`", name, variant),
                            span,
                        ));
                        Vec::new()
                    }
                };
            }
            _ => {}
        }
        if variant == "Some" && enum_name.is_none() {
            return vec![Type::Unknown];
        }
        if variant == "None" && enum_name.is_none() {
            return Vec::new();
        }
        let owner = enum_name
            .map(str::to_string)
            .or_else(|| self.defs.variant_owners.get(variant).cloned());
        owner
            .and_then(|owner| self.defs.variant(&owner, variant).cloned())
            .map(|v| v.fields)
            .unwrap_or_default()
    }

    // ---- helpers ------------------------------------------------------

    fn expect_bool(&mut self, expr: &Expr) -> Result<(), InternalError> {
        let ty = self.infer_expr(expr)?;
        if !matches!(ty.strip_refs(), Type::Bool | Type::Unknown | Type::Never) {
            self.diagnostics.push(Diagnostic::error(
                codes::TYPE_MISMATCH,
                format!("condition must be `Bool`, found `{}`", ty),
                expr.span(),
            ));
        }
        Ok(())
    }

    fn expect_arg(&mut self, expected: &Type, found: &Type, span: Span) {
        if !found.is_assignable_to(expected) {
            self.mismatch(expected, found, span, span);
        }
    }

    fn mismatch(&mut self, expected: &Type, found: &Type, span: Span, related: Span) {
        let mut diagnostic = Diagnostic::error(
            codes::TYPE_MISMATCH,
            format!("expected `{}`, found `{}`", expected, found),
            span,
        );
        if related != span {
            diagnostic = diagnostic.with_related(related);
        }
        self.diagnostics.push(diagnostic);
    }

    fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &str, ty: Type) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), ty);
        }
    }

    fn lookup_local(&self, name: &str) -> Option<&Type> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    fn lookup(&self, name: &str) -> Type {
        // Undefined names were already reported by the resolver; recover with
        // `Unknown` so inference keeps going.
        self.lookup_local(name).cloned().unwrap_or(Type::Unknown)
    }
}

fn literal_type(lit: &Literal) -> Type {
    match lit {
        Literal::Int(..) => Type::Int,
        Literal::Float(..) => Type::Float,
        Literal::Bool(..) => Type::Bool,
        Literal::Str(..) => Type::Str,
    }
}
