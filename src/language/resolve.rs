use crate::language::{
    ast::*,
    diagnostics::{codes, Diagnostic, Diagnostics},
    modules::{ExportedSymbol, ModuleTable},
    span::Span,
    types::{Type, VariantType},
};
use std::collections::HashMap;

/// Signature of a file-local or imported function.
#[derive(Clone, Debug)]
pub struct FnSig {
    pub name: String,
    pub params: Vec<Type>,
    pub ret: Type,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct StructInfo {
    pub fields: Vec<(String, Type)>,
    /// Imported structs arrive without field lists; lookups on them recover
    /// with `Unknown` instead of erroring.
    pub opaque: bool,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct EnumInfo {
    pub variants: Vec<VariantType>,
    pub span: Span,
}

/// Everything the resolver learned about a file's top level. Built once per
/// file, frozen before inference runs, read-only afterward.
#[derive(Debug, Default)]
pub struct Definitions {
    pub structs: HashMap<String, StructInfo>,
    pub enums: HashMap<String, EnumInfo>,
    pub functions: HashMap<String, FnSig>,
    /// Unqualified variant name → owning enum, for bare variant patterns.
    pub variant_owners: HashMap<String, String>,
    /// Whole-namespace imports: bound name → exported symbols.
    pub namespaces: HashMap<String, Vec<ExportedSymbol>>,
}

impl Definitions {
    pub fn enum_type(&self, name: &str) -> Option<Type> {
        let info = self.enums.get(name)?;
        Some(Type::Enum {
            name: name.to_string(),
            variants: info.variants.clone(),
        })
    }

    pub fn struct_field(&self, name: &str, field: &str) -> Option<Type> {
        let info = self.structs.get(name)?;
        if info.opaque {
            return Some(Type::Unknown);
        }
        info.fields
            .iter()
            .find(|(f, _)| f == field)
            .map(|(_, ty)| ty.clone())
    }

    pub fn variant(&self, enum_name: &str, variant: &str) -> Option<&VariantType> {
        self.enums
            .get(enum_name)?
            .variants
            .iter()
            .find(|v| v.name == variant)
    }

    pub fn namespace_symbol(&self, namespace: &str, name: &str) -> Option<&ExportedSymbol> {
        self.namespaces
            .get(namespace)?
            .iter()
            .find(|s| s.name() == name)
    }

    /// Converts a syntactic annotation against the frozen registry. Inference
    /// calls this for `let` annotations and function signatures nested inside
    /// traversal blocks; unresolved names stay opaque rather than erroring, so
    /// the resolver remains the single source of name diagnostics.
    pub fn type_of_ref(&self, ty: &TypeRef) -> Type {
        match ty {
            TypeRef::Unit => Type::Unit,
            TypeRef::Reference { mutable, inner } => {
                Type::reference(*mutable, self.type_of_ref(inner))
            }
            TypeRef::Named(name, args) => match (name.as_str(), args.len()) {
                ("Int", 0) => Type::Int,
                ("Float", 0) => Type::Float,
                ("Bool", 0) => Type::Bool,
                ("Str", 0) => Type::Str,
                ("Option", 1) => Type::option(self.type_of_ref(&args[0])),
                ("Vec", 1) => Type::vec(self.type_of_ref(&args[0])),
                _ => {
                    if self.structs.contains_key(name) {
                        Type::Struct(name.clone())
                    } else if let Some(ty) = self.enum_type(name) {
                        ty
                    } else {
                        Type::Named(
                            name.clone(),
                            args.iter().map(|arg| self.type_of_ref(arg)).collect(),
                        )
                    }
                }
            },
        }
    }
}

/// Resolves one file: imports against the module table, top-level definitions
/// into a frozen registry, and every identifier against nested scope tables.
/// All findings go into the shared per-file collector; resolution never fails,
/// it only reports.
pub fn resolve_file(
    file: &FileAst,
    modules: &ModuleTable,
    diagnostics: &mut Diagnostics,
) -> Definitions {
    let mut resolver = Resolver {
        defs: Definitions::default(),
        raw_structs: HashMap::new(),
        raw_enums: HashMap::new(),
        scopes: Vec::new(),
        diagnostics,
    };
    resolver.resolve_imports(file, modules);
    resolver.collect_items(&file.items);
    resolver.freeze_types();
    resolver.collect_signatures(&file.items);
    resolver.resolve_bodies(&file.items);
    resolver.defs
}

struct Resolver<'a> {
    defs: Definitions,
    raw_structs: HashMap<String, &'a StructDef>,
    raw_enums: HashMap<String, &'a EnumDef>,
    scopes: Vec<HashMap<String, Span>>,
    diagnostics: &'a mut Diagnostics,
}

impl<'a> Resolver<'a> {
    fn resolve_imports(&mut self, file: &FileAst, modules: &ModuleTable) {
        for import in &file.imports {
            let path = import.path.as_str();
            let Some(exports) = modules.lookup(path) else {
                self.diagnostics.push(Diagnostic::error(
                    codes::UNRESOLVED_MODULE,
                    format!("unresolved module `{}`", path),
                    import.span,
                ));
                continue;
            };
            if import.selected.is_empty() {
                let bound = import
                    .alias
                    .clone()
                    .unwrap_or_else(|| namespace_name(&import.path));
                self.defs.namespaces.insert(bound, exports.to_vec());
                continue;
            }
            for symbol in &import.selected {
                match modules.lookup_symbol(path, &symbol.name) {
                    Some(export) => self.register_import(export, symbol.span),
                    None => self.diagnostics.push(Diagnostic::error(
                        codes::UNDEFINED_VARIABLE,
                        format!("module `{}` does not export `{}`", path, symbol.name),
                        symbol.span,
                    )),
                }
            }
            if let Some(alias) = &import.alias {
                self.defs.namespaces.insert(alias.clone(), exports.to_vec());
            }
        }
    }

    fn register_import(&mut self, export: &ExportedSymbol, span: Span) {
        match export {
            ExportedSymbol::Function { name, params, ret } => {
                self.defs.functions.insert(
                    name.clone(),
                    FnSig {
                        name: name.clone(),
                        params: params.clone(),
                        ret: ret.clone(),
                        span,
                    },
                );
            }
            ExportedSymbol::Struct { name } => {
                self.defs.structs.insert(
                    name.clone(),
                    StructInfo {
                        fields: Vec::new(),
                        opaque: true,
                        span,
                    },
                );
            }
            ExportedSymbol::Enum { name, variants } => {
                for variant in variants {
                    self.defs
                        .variant_owners
                        .insert(variant.name.clone(), name.clone());
                }
                self.defs.enums.insert(
                    name.clone(),
                    EnumInfo {
                        variants: variants.clone(),
                        span,
                    },
                );
            }
        }
    }

    /// First pass: record every struct/enum name (plugins are flattened into
    /// the file-level registry) so annotations can refer to types declared
    /// later in the file.
    fn collect_items(&mut self, items: &'a [Item]) {
        for item in items {
            match item {
                Item::Struct(def) => {
                    if self.raw_structs.insert(def.name.clone(), def).is_some() {
                        self.duplicate(&def.name, def.span);
                    }
                }
                Item::Enum(def) => {
                    if self.raw_enums.insert(def.name.clone(), def).is_some() {
                        self.duplicate(&def.name, def.span);
                    }
                    for variant in &def.variants {
                        self.defs
                            .variant_owners
                            .insert(variant.name.clone(), def.name.clone());
                    }
                }
                Item::Plugin(plugin) => self.collect_items(&plugin.items),
                Item::Function(_) => {}
            }
        }
    }

    /// Second pass: convert the recorded declarations into semantic types.
    fn freeze_types(&mut self) {
        let enum_names: Vec<String> = self.raw_enums.keys().cloned().collect();
        for name in enum_names {
            let ty = self.convert_enum(&name, &mut Vec::new());
            if let Type::Enum { variants, .. } = ty {
                let span = self.raw_enums[name.as_str()].span;
                self.defs.enums.insert(name, EnumInfo { variants, span });
            }
        }
        let struct_names: Vec<String> = self.raw_structs.keys().cloned().collect();
        for name in struct_names {
            let def = self.raw_structs[name.as_str()];
            let fields = def
                .fields
                .iter()
                .map(|f| (f.name.clone(), self.convert_type(&f.ty, &mut Vec::new())))
                .collect();
            self.defs.structs.insert(
                name,
                StructInfo {
                    fields,
                    opaque: false,
                    span: def.span,
                },
            );
        }
    }

    fn collect_signatures(&mut self, items: &'a [Item]) {
        for item in items {
            match item {
                Item::Function(def) => {
                    let params = def
                        .params
                        .iter()
                        .map(|p| self.convert_type(&p.ty, &mut Vec::new()))
                        .collect();
                    let ret = def
                        .ret
                        .as_ref()
                        .map(|ty| self.convert_type(ty, &mut Vec::new()))
                        .unwrap_or(Type::Unit);
                    let sig = FnSig {
                        name: def.name.clone(),
                        params,
                        ret,
                        span: def.span,
                    };
                    if self.defs.functions.insert(def.name.clone(), sig).is_some() {
                        self.duplicate(&def.name, def.span);
                    }
                }
                Item::Plugin(plugin) => self.collect_signatures(&plugin.items),
                _ => {}
            }
        }
    }

    /// Converts a syntactic annotation. The `visiting` stack breaks cycles in
    /// mutually recursive enums by falling back to a nominal reference.
    pub(crate) fn convert_type(&self, ty: &TypeRef, visiting: &mut Vec<String>) -> Type {
        match ty {
            TypeRef::Unit => Type::Unit,
            TypeRef::Reference { mutable, inner } => {
                Type::reference(*mutable, self.convert_type(inner, visiting))
            }
            TypeRef::Named(name, args) => match (name.as_str(), args.len()) {
                ("Int", 0) => Type::Int,
                ("Float", 0) => Type::Float,
                ("Bool", 0) => Type::Bool,
                ("Str", 0) => Type::Str,
                ("Option", 1) => Type::option(self.convert_type(&args[0], visiting)),
                ("Vec", 1) => Type::vec(self.convert_type(&args[0], visiting)),
                _ => {
                    if self.raw_structs.contains_key(name)
                        || self.defs.structs.contains_key(name)
                    {
                        Type::Struct(name.clone())
                    } else if self.raw_enums.contains_key(name) {
                        self.convert_enum(name, visiting)
                    } else if let Some(info) = self.defs.enums.get(name) {
                        Type::Enum {
                            name: name.clone(),
                            variants: info.variants.clone(),
                        }
                    } else {
                        // Host tree node kinds and type parameters stay opaque.
                        let args = args
                            .iter()
                            .map(|arg| self.convert_type(arg, visiting))
                            .collect();
                        Type::Named(name.clone(), args)
                    }
                }
            },
        }
    }

    fn convert_enum(&self, name: &str, visiting: &mut Vec<String>) -> Type {
        if visiting.iter().any(|n| n == name) {
            return Type::Named(name.to_string(), Vec::new());
        }
        let Some(def) = self.raw_enums.get(name) else {
            return Type::Named(name.to_string(), Vec::new());
        };
        visiting.push(name.to_string());
        let variants = def
            .variants
            .iter()
            .map(|v| VariantType {
                name: v.name.clone(),
                fields: v
                    .fields
                    .iter()
                    .map(|f| self.convert_type(f, visiting))
                    .collect(),
            })
            .collect();
        visiting.pop();
        Type::Enum {
            name: name.to_string(),
            variants,
        }
    }

    // ---- body resolution ----------------------------------------------

    fn resolve_bodies(&mut self, items: &'a [Item]) {
        for item in items {
            match item {
                Item::Function(def) => self.resolve_function(def),
                Item::Plugin(plugin) => self.resolve_bodies(&plugin.items),
                _ => {}
            }
        }
    }

    fn resolve_function(&mut self, def: &FunctionDef) {
        self.push_scope();
        for param in &def.params {
            self.declare(&param.name, param.span);
        }
        self.resolve_block(&def.body);
        self.pop_scope();
    }

    fn resolve_block(&mut self, block: &Block) {
        self.push_scope();
        for stmt in &block.statements {
            self.resolve_stmt(stmt);
        }
        if let Some(tail) = &block.tail {
            self.resolve_expr(tail);
        }
        self.pop_scope();
    }

    fn resolve_stmt(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Let(stmt) => {
                self.resolve_expr(&stmt.value);
                self.declare_pattern(&stmt.pattern);
            }
            Statement::Assign(stmt) => {
                self.resolve_expr(&stmt.target);
                self.resolve_expr(&stmt.value);
            }
            Statement::Expr(stmt) => self.resolve_expr(&stmt.expr),
            Statement::Return(stmt) => {
                if let Some(value) = &stmt.value {
                    self.resolve_expr(value);
                }
            }
            Statement::While(stmt) => {
                self.resolve_expr(&stmt.condition);
                self.resolve_block(&stmt.body);
            }
            Statement::For(stmt) => {
                self.resolve_expr(&stmt.iter);
                self.push_scope();
                self.declare(&stmt.binding, stmt.span);
                self.resolve_block(&stmt.body);
                self.pop_scope();
            }
            Statement::Traverse(stmt) => self.resolve_traverse(stmt),
            Statement::Break(_) | Statement::Continue(_) => {}
        }
    }

    fn resolve_traverse(&mut self, stmt: &TraverseStmt) {
        self.resolve_expr(&stmt.target);
        for capture in &stmt.captures {
            if self.lookup(&capture.name).is_none() {
                self.diagnostics.push(Diagnostic::error(
                    codes::UNDEFINED_VARIABLE,
                    format!("captured variable `{}` is not in scope", capture.name),
                    capture.span,
                ));
            }
        }
        self.push_scope();
        for state in &stmt.state {
            self.resolve_expr(&state.value);
            self.declare_pattern(&state.pattern);
        }
        for visitor in &stmt.visitors {
            self.resolve_function(visitor);
        }
        self.pop_scope();
    }

    fn resolve_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Identifier(ident) => {
                if self.lookup(&ident.name).is_none()
                    && !self.defs.functions.contains_key(&ident.name)
                    && !self.defs.namespaces.contains_key(&ident.name)
                {
                    self.diagnostics.push(Diagnostic::error(
                        codes::UNDEFINED_VARIABLE,
                        format!("undefined variable `{}`", ident.name),
                        ident.span,
                    ));
                }
            }
            Expr::Literal(_) => {}
            Expr::Binary { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }
            Expr::Unary { expr, .. }
            | Expr::Reference { expr, .. }
            | Expr::Deref { expr, .. } => self.resolve_expr(expr),
            Expr::Call {
                function, args, ..
            } => {
                if !self.defs.functions.contains_key(&function.name)
                    && self.lookup(&function.name).is_none()
                {
                    self.diagnostics.push(Diagnostic::error(
                        codes::UNDEFINED_VARIABLE,
                        format!("undefined function `{}`", function.name),
                        function.span,
                    ));
                }
                for arg in args {
                    self.resolve_expr(arg);
                }
            }
            Expr::MethodCall { receiver, args, .. } => {
                self.resolve_expr(receiver);
                for arg in args {
                    self.resolve_expr(arg);
                }
            }
            Expr::FieldAccess { base, .. } => self.resolve_expr(base),
            Expr::StructLiteral {
                name,
                fields,
                spread,
                span,
            } => {
                if !self.defs.structs.contains_key(name) && !self.raw_structs.contains_key(name.as_str()) {
                    self.diagnostics.push(Diagnostic::error(
                        codes::UNDEFINED_VARIABLE,
                        format!("unknown struct `{}`", name),
                        *span,
                    ));
                }
                for (_, value) in fields {
                    self.resolve_expr(value);
                }
                if let Some(spread) = spread {
                    self.resolve_expr(spread);
                }
            }
            Expr::VariantLiteral {
                enum_name,
                variant,
                args,
                span,
            } => {
                self.check_variant_path(enum_name.as_deref(), variant, *span);
                for arg in args {
                    self.resolve_expr(arg);
                }
            }
            Expr::VecLiteral { elements, .. } => {
                for element in elements {
                    self.resolve_expr(element);
                }
            }
            Expr::If(if_expr) => self.resolve_if(if_expr),
            Expr::Match(match_expr) => {
                self.resolve_expr(&match_expr.scrutinee);
                for arm in &match_expr.arms {
                    self.push_scope();
                    self.declare_pattern(&arm.pattern);
                    if let Some(guard) = &arm.guard {
                        self.resolve_expr(guard);
                    }
                    self.resolve_expr(&arm.value);
                    self.pop_scope();
                }
            }
            Expr::Block(block) => self.resolve_block(block),
            Expr::Panic { message, .. } => {
                if let Some(message) = message {
                    self.resolve_expr(message);
                }
            }
        }
    }

    fn resolve_if(&mut self, if_expr: &IfExpr) {
        match &if_expr.condition {
            IfCondition::Expr(cond) => {
                self.resolve_expr(cond);
                self.resolve_block(&if_expr.then_branch);
            }
            IfCondition::Let { pattern, value } => {
                self.resolve_expr(value);
                // Pattern names are visible throughout the then branch,
                // including nested matches that reference them.
                self.push_scope();
                self.declare_pattern(pattern);
                for stmt in &if_expr.then_branch.statements {
                    self.resolve_stmt(stmt);
                }
                if let Some(tail) = &if_expr.then_branch.tail {
                    self.resolve_expr(tail);
                }
                self.pop_scope();
            }
        }
        match &if_expr.else_branch {
            Some(ElseBranch::Block(block)) => self.resolve_block(block),
            Some(ElseBranch::ElseIf(nested)) => self.resolve_if(nested),
            None => {}
        }
    }

    fn check_variant_path(&mut self, enum_name: Option<&str>, variant: &str, span: Span) {
        match enum_name {
            Some(name) => {
                if !self.defs.enums.contains_key(name) {
                    self.diagnostics.push(Diagnostic::error(
                        codes::UNDEFINED_VARIABLE,
                        format!("unknown enum `{}`", name),
                        span,
                    ));
                } else if self.defs.variant(name, variant).is_none() {
                    self.diagnostics.push(Diagnostic::error(
                        codes::UNDEFINED_VARIABLE,
                        format!("enum `{}` has no variant `{}`", name, variant),
                        span,
                    ));
                }
            }
            None => {
                let builtin = variant == "Some" || variant == "None";
                if !builtin && !self.defs.variant_owners.contains_key(variant) {
                    self.diagnostics.push(Diagnostic::error(
                        codes::UNDEFINED_VARIABLE,
                        format!("unknown variant `{}`", variant),
                        span,
                    ));
                }
            }
        }
    }

    // ---- scopes -------------------------------------------------------

    fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &str, span: Span) {
        if let Some(scope) = self.scopes.last_mut() {
            if let Some(previous) = scope.insert(name.to_string(), span) {
                self.diagnostics.push(
                    Diagnostic::error(
                        codes::DUPLICATE_BINDING,
                        format!("`{}` is already defined in this scope", name),
                        span,
                    )
                    .with_related(previous),
                );
            }
        }
    }

    fn declare_pattern(&mut self, pattern: &Pattern) {
        match pattern {
            Pattern::Binding { name, span, .. } => self.declare(name, *span),
            Pattern::Variant { enum_name, variant, fields, span } => {
                self.check_variant_path(enum_name.as_deref(), variant, *span);
                for field in fields {
                    self.declare_pattern(field);
                }
            }
            Pattern::Struct { fields, .. } => {
                for (_, field) in fields {
                    self.declare_pattern(field);
                }
            }
            Pattern::Wildcard(_) | Pattern::Literal(_) => {}
        }
    }

    fn lookup(&self, name: &str) -> Option<Span> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }

    fn duplicate(&mut self, name: &str, span: Span) {
        self.diagnostics.push(Diagnostic::error(
            codes::DUPLICATE_BINDING,
            format!("`{}` is already defined in this scope", name),
            span,
        ));
    }
}

fn namespace_name(path: &ImportPath) -> String {
    match path {
        ImportPath::Bare(name) => name.clone(),
        ImportPath::Quoted(path) => {
            let trimmed = path.trim_end_matches(".rsc");
            trimmed
                .rsplit('/')
                .next()
                .unwrap_or(trimmed)
                .to_string()
        }
    }
}
