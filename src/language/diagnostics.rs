use crate::language::span::Span;
use miette::SourceSpan;
use std::path::Path;

/// Stable diagnostic codes shared with editor tooling and the test suites of
/// downstream plugin authors. Never renumber these.
pub mod codes {
    /// Field moved out of a shared/borrowed path without explicit duplication.
    pub const IMPLICIT_BORROW: &str = "RS001";
    /// Field assigned in place outside a sanctioned context.
    pub const DIRECT_MUTATION: &str = "RS002";
    /// Branch or annotation types could not unify.
    pub const TYPE_MISMATCH: &str = "RS003";
    /// Same-scope name collision.
    pub const DUPLICATE_BINDING: &str = "RS005";
    /// Identifier referenced outside scope, or unknown symbol in a selective
    /// import.
    pub const UNDEFINED_VARIABLE: &str = "RS006";
    /// Import path not present in the module export table.
    pub const UNRESOLVED_MODULE: &str = "RS007";
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

/// One structured finding from any analysis stage. Created once, accumulated,
/// never mutated afterward.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub code: &'static str,
    pub severity: Severity,
    pub message: String,
    pub primary_span: Span,
    pub related_spans: Vec<Span>,
    pub help: Option<String>,
}

impl Diagnostic {
    pub fn error(code: &'static str, message: impl Into<String>, span: Span) -> Self {
        Self {
            code,
            severity: Severity::Error,
            message: message.into(),
            primary_span: span,
            related_spans: Vec::new(),
            help: None,
        }
    }

    pub fn warning(code: &'static str, message: impl Into<String>, span: Span) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(code, message, span)
        }
    }

    pub fn with_related(mut self, span: Span) -> Self {
        self.related_spans.push(span);
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn to_source_span(&self) -> SourceSpan {
        (self.primary_span.start, self.primary_span.len().max(1)).into()
    }
}

/// Per-file collector. One instance per pipeline run; instances for different
/// files share nothing, so batches need no locking.
#[derive(Debug, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    pub fn has_errors(&self) -> bool {
        self.items
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    /// Consumes the collector, yielding diagnostics sorted by source position.
    pub fn into_sorted(mut self) -> Vec<Diagnostic> {
        self.items
            .sort_by_key(|d| d.primary_span.position_key());
        self.items
    }
}

/// External row shape consumed by the reporting collaborator.
#[derive(Clone, Debug, PartialEq)]
pub struct DiagnosticRow {
    pub code: String,
    pub severity: Severity,
    pub message: String,
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

impl DiagnosticRow {
    pub fn from_diagnostic(diagnostic: &Diagnostic, file: &Path) -> Self {
        let span = diagnostic.primary_span;
        Self {
            code: diagnostic.code.to_string(),
            severity: diagnostic.severity,
            message: diagnostic.message.clone(),
            file: file.display().to_string(),
            line: span.line,
            column: span.column,
            end_line: span.end_line,
            end_column: span.end_column,
        }
    }
}
