use std::fmt;

/// Semantic type of a RuleScript expression or binding.
///
/// The variant set is closed: the language has no user-extensible type
/// constructors beyond named structs and enums. `Never` is the bottom type
/// assigned to diverging expressions and is absorbed by any other type during
/// branch unification. `Unknown` exists only for error recovery so one
/// analysis pass can surface every independent error in a file; a
/// diagnostic-clean program never carries it.
#[derive(Clone, Debug, PartialEq)]
pub enum Type {
    Unit,
    Bool,
    Int,
    Float,
    Str,
    Never,
    Unknown,
    Option(Box<Type>),
    Vec(Box<Type>),
    /// Reference to a nominal type that is not (or not yet) expanded, e.g. a
    /// recursive enum payload or an opaque host-tree node kind.
    Named(String, Vec<Type>),
    /// Nominal struct type. Field types live in the frozen `Definitions`
    /// registry so that deeply nested structs stay cheap to compare.
    Struct(String),
    /// Tagged union with an explicit discriminant and an ordered field list
    /// per variant, so both backends can lower matches mechanically.
    Enum {
        name: String,
        variants: Vec<VariantType>,
    },
    Reference {
        mutable: bool,
        inner: Box<Type>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct VariantType {
    pub name: String,
    pub fields: Vec<Type>,
}

impl Type {
    pub fn option(inner: Type) -> Type {
        Type::Option(Box::new(inner))
    }

    pub fn vec(inner: Type) -> Type {
        Type::Vec(Box::new(inner))
    }

    pub fn reference(mutable: bool, inner: Type) -> Type {
        Type::Reference {
            mutable,
            inner: Box::new(inner),
        }
    }

    pub fn is_never(&self) -> bool {
        matches!(self, Type::Never)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Type::Unknown)
    }

    /// Types that duplicate implicitly; moving these out of a shared path is
    /// always a plain read.
    pub fn is_copy(&self) -> bool {
        matches!(
            self,
            Type::Unit | Type::Bool | Type::Int | Type::Float | Type::Never | Type::Unknown
        )
    }

    pub fn is_ref(&self) -> bool {
        matches!(self, Type::Reference { .. })
    }

    /// Strips any number of reference layers.
    pub fn strip_refs(&self) -> &Type {
        match self {
            Type::Reference { inner, .. } => inner.strip_refs(),
            other => other,
        }
    }

    pub fn deref(&self) -> Option<&Type> {
        match self {
            Type::Reference { inner, .. } => Some(inner),
            _ => None,
        }
    }

    /// Branch unification. `Never` is absorbed by the other side; `Unknown`
    /// matches anything; structs and enums compare nominally; a mutable
    /// reference unifies with a shared one as shared.
    pub fn unify(&self, other: &Type) -> Option<Type> {
        match (self, other) {
            (Type::Never, t) | (t, Type::Never) => Some(t.clone()),
            (Type::Unknown, t) | (t, Type::Unknown) => Some(t.clone()),
            (Type::Struct(a), Type::Struct(b)) if a == b => Some(self.clone()),
            (Type::Enum { name: a, .. }, Type::Enum { name: b, .. }) if a == b => {
                Some(self.clone())
            }
            (Type::Named(a, xs), Type::Named(b, ys)) if a == b && xs == ys => Some(self.clone()),
            // Nominal bridge between an expanded type and a reference to it.
            (Type::Struct(a), Type::Named(b, args)) | (Type::Named(b, args), Type::Struct(a))
                if a == b && args.is_empty() =>
            {
                Some(Type::Struct(a.clone()))
            }
            (Type::Enum { name: a, .. }, Type::Named(b, args))
                if a == b && args.is_empty() =>
            {
                Some(self.clone())
            }
            (Type::Named(b, args), Type::Enum { name: a, .. })
                if a == b && args.is_empty() =>
            {
                Some(other.clone())
            }
            (Type::Int, Type::Float) | (Type::Float, Type::Int) => Some(Type::Float),
            (Type::Option(a), Type::Option(b)) => Some(Type::option(a.unify(b)?)),
            (Type::Vec(a), Type::Vec(b)) => Some(Type::vec(a.unify(b)?)),
            (
                Type::Reference {
                    mutable: ma,
                    inner: a,
                },
                Type::Reference {
                    mutable: mb,
                    inner: b,
                },
            ) => Some(Type::reference(*ma && *mb, a.unify(b)?)),
            // Deref bridge: a reference unifies with its referent's type.
            (Type::Reference { inner, .. }, t) | (t, Type::Reference { inner, .. }) => {
                inner.unify(t)
            }
            (a, b) if a == b => Some(a.clone()),
            _ => None,
        }
    }

    /// One-way compatibility used for annotated `let` bindings, arguments and
    /// returns. Slightly looser than `unify`: a mutable reference coerces to a
    /// shared one but not the other way around.
    pub fn is_assignable_to(&self, target: &Type) -> bool {
        match (self, target) {
            (Type::Never, _) => true,
            (Type::Unknown, _) | (_, Type::Unknown) => true,
            (Type::Struct(a), Type::Struct(b)) => a == b,
            (Type::Enum { name: a, .. }, Type::Enum { name: b, .. }) => a == b,
            (Type::Struct(a), Type::Named(b, args)) | (Type::Named(b, args), Type::Struct(a)) => {
                a == b && args.is_empty()
            }
            (Type::Enum { name: a, .. }, Type::Named(b, args))
            | (Type::Named(b, args), Type::Enum { name: a, .. }) => a == b && args.is_empty(),
            (Type::Int, Type::Float) => true,
            (Type::Option(a), Type::Option(b)) => a.is_assignable_to(b),
            (Type::Vec(a), Type::Vec(b)) => a.is_assignable_to(b),
            (
                Type::Reference {
                    mutable: ma,
                    inner: a,
                },
                Type::Reference {
                    mutable: mb,
                    inner: b,
                },
            ) => (*ma || !*mb) && a.is_assignable_to(b),
            // Auto-deref: a reference is usable wherever its referent is.
            (Type::Reference { inner, .. }, t) => inner.is_assignable_to(t),
            (a, b) => a == b,
        }
    }

    /// Human-readable rendering used in diagnostics.
    pub fn display_name(&self) -> String {
        match self {
            Type::Unit => "()".into(),
            Type::Bool => "Bool".into(),
            Type::Int => "Int".into(),
            Type::Float => "Float".into(),
            Type::Str => "Str".into(),
            Type::Never => "!".into(),
            Type::Unknown => "_".into(),
            Type::Option(inner) => format!("Option<{}>", inner.display_name()),
            Type::Vec(inner) => format!("Vec<{}>", inner.display_name()),
            Type::Named(name, args) => {
                if args.is_empty() {
                    name.clone()
                } else {
                    let rendered: Vec<String> = args.iter().map(Type::display_name).collect();
                    format!("{}<{}>", name, rendered.join(", "))
                }
            }
            Type::Struct(name) => name.clone(),
            Type::Enum { name, .. } => name.clone(),
            Type::Reference { mutable, inner } => {
                if *mutable {
                    format!("&mut {}", inner.display_name())
                } else {
                    format!("&{}", inner.display_name())
                }
            }
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mutability {
    Immutable,
    Mutable,
}

impl Mutability {
    pub fn is_mutable(self) -> bool {
        matches!(self, Mutability::Mutable)
    }
}
