//! Mutation and aliasing discipline.
//!
//! This is not an alias analysis. The checker keeps one [`AccessMode`] per
//! binding in a scope-indexed table and enforces two rules on access paths:
//!
//! * RS001 — a non-copy field may not be moved out of a borrowed path without
//!   an explicit `.clone()`.
//! * RS002 — a field may not be assigned in place unless the path root is a
//!   freshly constructed value, an exclusive reference, or a mutable capture
//!   of an enclosing traversal. Whole-value replacement of a binding is always
//!   permitted.
//!
//! Both backends rely on these rules: the static backend turns plugins into
//! borrow-checked visitors, so anything this pass admits must be expressible
//! without interior mutability there.

use crate::language::{
    ast::*,
    diagnostics::{codes, Diagnostic, Diagnostics},
    infer::InferOutput,
    span::Span,
};
use std::collections::{HashMap, HashSet};

/// How a binding may be accessed. Tracked per scope, never merged across
/// branches; the lattice is deliberately flat.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessMode {
    /// The binding owns its value. `fresh` means the value was constructed or
    /// cloned in the initializer and no reference to it has been taken since,
    /// so in-place field writes cannot be observed through an alias.
    Owned { fresh: bool },
    SharedRef,
    ExclusiveRef,
}

impl AccessMode {
    fn is_borrowed(self) -> bool {
        matches!(self, AccessMode::SharedRef | AccessMode::ExclusiveRef)
    }
}

pub fn check_file(file: &FileAst, types: &InferOutput, diagnostics: &mut Diagnostics) {
    let mut checker = DisciplineChecker {
        types,
        diagnostics,
        scopes: Vec::new(),
        mut_captures: Vec::new(),
    };
    checker.check_items(&file.items);
}

struct DisciplineChecker<'a> {
    types: &'a InferOutput,
    diagnostics: &'a mut Diagnostics,
    scopes: Vec<HashMap<String, AccessMode>>,
    /// One set per enclosing `traverse` block; names captured `&mut` there
    /// may be field-assigned inside visitor bodies.
    mut_captures: Vec<HashSet<String>>,
}

impl<'a> DisciplineChecker<'a> {
    fn check_items(&mut self, items: &[Item]) {
        for item in items {
            match item {
                Item::Function(def) => self.check_function(def),
                Item::Plugin(plugin) => self.check_items(&plugin.items),
                Item::Struct(_) | Item::Enum(_) => {}
            }
        }
    }

    fn check_function(&mut self, def: &FunctionDef) {
        self.push_scope();
        for param in &def.params {
            let mode = match &param.ty {
                TypeRef::Reference { mutable: true, .. } => AccessMode::ExclusiveRef,
                TypeRef::Reference { mutable: false, .. } => AccessMode::SharedRef,
                _ => AccessMode::Owned { fresh: false },
            };
            self.declare(&param.name, mode);
        }
        self.check_block(&def.body);
        self.pop_scope();
    }

    fn check_block(&mut self, block: &Block) {
        self.push_scope();
        for stmt in &block.statements {
            self.check_stmt(stmt);
        }
        if let Some(tail) = &block.tail {
            self.check_expr(tail);
        }
        self.pop_scope();
    }

    fn check_stmt(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Let(stmt) => self.check_let(stmt),
            Statement::Assign(stmt) => self.check_assign(stmt),
            Statement::Expr(stmt) => self.check_expr(&stmt.expr),
            Statement::Return(stmt) => {
                if let Some(value) = &stmt.value {
                    self.check_move(value);
                }
            }
            Statement::While(stmt) => {
                self.check_expr(&stmt.condition);
                self.check_block(&stmt.body);
            }
            Statement::For(stmt) => {
                self.check_expr(&stmt.iter);
                self.push_scope();
                // Loop elements are views into the iterated collection.
                self.declare(&stmt.binding, AccessMode::SharedRef);
                self.check_block(&stmt.body);
                self.pop_scope();
            }
            Statement::Traverse(stmt) => self.check_traverse(stmt),
            Statement::Break(_) | Statement::Continue(_) => {}
        }
    }

    fn check_let(&mut self, stmt: &LetStmt) {
        self.check_move(&stmt.value);
        let mode = self.initializer_mode(&stmt.value);
        self.bind_pattern(&stmt.pattern, mode);
    }

    /// Mode a binding gets from its initializer expression.
    fn initializer_mode(&mut self, value: &Expr) -> AccessMode {
        match value {
            Expr::StructLiteral { .. }
            | Expr::VariantLiteral { .. }
            | Expr::VecLiteral { .. }
            | Expr::Literal(_) => AccessMode::Owned { fresh: true },
            Expr::MethodCall { method, .. } if method == "clone" => {
                AccessMode::Owned { fresh: true }
            }
            Expr::Reference { mutable, expr, .. } => {
                if let Some(root) = expr.path_root() {
                    self.mark_unfresh(&root.name);
                }
                if *mutable {
                    AccessMode::ExclusiveRef
                } else {
                    AccessMode::SharedRef
                }
            }
            Expr::Identifier(ident) => match self.mode_of(&ident.name) {
                Some(mode) if mode.is_borrowed() => mode,
                // Rebinding an owned value drops the fresh bit; the original
                // name may still be reachable in an outer scope.
                _ => AccessMode::Owned { fresh: false },
            },
            Expr::FieldAccess { .. } | Expr::Deref { .. } => match value
                .path_root()
                .and_then(|root| self.mode_of(&root.name))
            {
                Some(mode) if mode.is_borrowed() => AccessMode::SharedRef,
                _ => AccessMode::Owned { fresh: false },
            },
            _ => AccessMode::Owned { fresh: false },
        }
    }

    fn check_assign(&mut self, stmt: &AssignStmt) {
        self.check_move(&stmt.value);
        match &stmt.target {
            // Whole-value replacement of a binding is always fine.
            Expr::Identifier(_) => {}
            Expr::Deref { expr, span } => {
                let root_mode = expr.path_root().and_then(|root| self.mode_of(&root.name));
                if root_mode == Some(AccessMode::SharedRef) {
                    self.direct_mutation("cannot write through a shared reference", *span);
                }
            }
            Expr::FieldAccess { base, field, span } => {
                let Some(root) = base.path_root() else {
                    self.check_expr(base);
                    return;
                };
                if self.is_mut_captured(&root.name) {
                    return;
                }
                match self.mode_of(&root.name) {
                    Some(AccessMode::Owned { fresh: true }) | Some(AccessMode::ExclusiveRef) => {}
                    _ => {
                        self.diagnostics.push(
                            Diagnostic::error(
                                codes::DIRECT_MUTATION,
                                format!(
                                    "cannot assign to field `{}` through `{}`",
                                    field, root.name
                                ),
                                *span,
                            )
                            .with_help(
                                "rebuild the value with a struct literal and replace it whole, \
                                 or capture the binding mutably in a traversal",
                            ),
                        );
                    }
                }
            }
            other => self.check_expr(other),
        }
    }

    fn check_traverse(&mut self, stmt: &TraverseStmt) {
        self.check_expr(&stmt.target);
        let mut captured = HashSet::new();
        for capture in &stmt.captures {
            if capture.mutable {
                captured.insert(capture.name.clone());
            }
        }
        self.mut_captures.push(captured);
        self.push_scope();
        for capture in &stmt.captures {
            let mode = if capture.mutable {
                AccessMode::ExclusiveRef
            } else {
                AccessMode::SharedRef
            };
            self.declare(&capture.name, mode);
        }
        for state in &stmt.state {
            self.check_let(state);
        }
        for visitor in &stmt.visitors {
            self.check_function(visitor);
        }
        self.pop_scope();
        self.mut_captures.pop();
    }

    fn check_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal(_) | Expr::Identifier(_) => {}
            Expr::Binary { left, right, .. } => {
                // Comparison and arithmetic read operands in place; no move.
                self.check_expr(left);
                self.check_expr(right);
            }
            Expr::Unary { expr, .. } => self.check_expr(expr),
            Expr::Call { args, .. } => {
                for arg in args {
                    self.check_move(arg);
                }
            }
            Expr::MethodCall {
                receiver,
                method,
                args,
                ..
            } => {
                self.check_mutating_method(receiver, method, expr.span());
                self.check_expr(receiver);
                for arg in args {
                    self.check_move(arg);
                }
            }
            Expr::FieldAccess { base, .. } => self.check_expr(base),
            Expr::StructLiteral { fields, spread, .. } => {
                for (_, value) in fields {
                    self.check_move(value);
                }
                if let Some(spread) = spread {
                    self.check_move(spread);
                }
            }
            Expr::VariantLiteral { args, .. } => {
                for arg in args {
                    self.check_move(arg);
                }
            }
            Expr::VecLiteral { elements, .. } => {
                for element in elements {
                    self.check_move(element);
                }
            }
            Expr::If(if_expr) => self.check_if(if_expr),
            Expr::Match(match_expr) => {
                self.check_expr(&match_expr.scrutinee);
                for arm in &match_expr.arms {
                    self.push_scope();
                    self.bind_refutable(&arm.pattern);
                    if let Some(guard) = &arm.guard {
                        self.check_expr(guard);
                    }
                    self.check_move(&arm.value);
                    self.pop_scope();
                }
            }
            Expr::Block(block) => self.check_block(block),
            Expr::Reference { expr, .. } => {
                if let Some(root) = expr.path_root() {
                    self.mark_unfresh(&root.name);
                }
                self.check_expr(expr);
            }
            Expr::Deref { expr, .. } => self.check_expr(expr),
            Expr::Panic { message, .. } => {
                if let Some(message) = message {
                    self.check_expr(message);
                }
            }
        }
    }

    fn check_if(&mut self, if_expr: &IfExpr) {
        match &if_expr.condition {
            IfCondition::Expr(cond) => {
                self.check_expr(cond);
                self.check_block(&if_expr.then_branch);
            }
            IfCondition::Let { pattern, value } => {
                self.check_expr(value);
                self.push_scope();
                self.bind_refutable(pattern);
                for stmt in &if_expr.then_branch.statements {
                    self.check_stmt(stmt);
                }
                if let Some(tail) = &if_expr.then_branch.tail {
                    self.check_expr(tail);
                }
                self.pop_scope();
            }
        }
        match &if_expr.else_branch {
            Some(ElseBranch::Block(block)) => self.check_block(block),
            Some(ElseBranch::ElseIf(nested)) => self.check_if(nested),
            None => {}
        }
    }

    /// Move-position check: the expression's value is consumed. A non-copy
    /// field read through a borrowed path must be cloned explicitly.
    fn check_move(&mut self, expr: &Expr) {
        if let Expr::FieldAccess { base, field, span } = expr {
            let field_ty = self.types.type_of(*span);
            let borrowed_root = base
                .path_root()
                .and_then(|root| self.mode_of(&root.name))
                .map(AccessMode::is_borrowed)
                .unwrap_or(false);
            let through_ref = self.types.type_of(base.span()).is_ref();
            if (borrowed_root || through_ref) && !field_ty.is_copy() && !field_ty.is_ref() {
                self.diagnostics.push(
                    Diagnostic::error(
                        codes::IMPLICIT_BORROW,
                        format!("cannot move field `{}` out of a borrowed value", field),
                        *span,
                    )
                    .with_help(format!("clone the field explicitly: `.{}.clone()`", field)),
                );
                return;
            }
        }
        self.check_expr(expr);
    }

    /// Container mutation through a binding the checker cannot prove unique.
    fn check_mutating_method(&mut self, receiver: &Expr, method: &str, span: Span) {
        if !matches!(method, "push" | "pop" | "insert" | "remove" | "clear") {
            return;
        }
        let Some(root) = receiver.path_root() else {
            return;
        };
        if self.is_mut_captured(&root.name) {
            return;
        }
        match self.mode_of(&root.name) {
            Some(AccessMode::Owned { fresh: true }) | Some(AccessMode::ExclusiveRef) | None => {}
            _ => {
                self.diagnostics.push(
                    Diagnostic::error(
                        codes::DIRECT_MUTATION,
                        format!("cannot call `{}` through `{}`", method, root.name),
                        span,
                    )
                    .with_help(
                        "rebuild the collection and replace it whole, or capture the binding \
                         mutably in a traversal",
                    ),
                );
            }
        }
    }

    fn direct_mutation(&mut self, message: &str, span: Span) {
        self.diagnostics.push(Diagnostic::error(
            codes::DIRECT_MUTATION,
            message.to_string(),
            span,
        ));
    }

    // ---- binding table ------------------------------------------------

    fn bind_pattern(&mut self, pattern: &Pattern, mode: AccessMode) {
        match pattern {
            Pattern::Binding { name, by_ref, .. } => {
                let mode = if *by_ref { AccessMode::SharedRef } else { mode };
                self.declare(name, mode);
            }
            // Destructured pieces never inherit freshness from the whole.
            _ => self.bind_refutable(pattern),
        }
    }

    fn bind_refutable(&mut self, pattern: &Pattern) {
        for binding in self.types.bindings_of(pattern.span()).to_vec() {
            let mode = if binding.by_ref {
                AccessMode::SharedRef
            } else {
                AccessMode::Owned { fresh: false }
            };
            self.declare(&binding.name, mode);
        }
    }

    fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &str, mode: AccessMode) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), mode);
        }
    }

    fn mode_of(&self, name: &str) -> Option<AccessMode> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }

    /// Taking any reference to a binding means later field writes could be
    /// observed through the alias; the fresh bit does not come back.
    fn mark_unfresh(&mut self, name: &str) {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(mode) = scope.get_mut(name) {
                if let AccessMode::Owned { fresh } = mode {
                    *fresh = false;
                }
                return;
            }
        }
    }

    fn is_mut_captured(&self, name: &str) -> bool {
        self.mut_captures.iter().any(|set| set.contains(name))
    }
}
