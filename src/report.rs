use crate::language::diagnostics::Diagnostic as AnalysisDiagnostic;
use crate::language::errors::InternalError;
use crate::language::pipeline::FileAnalysis;
use miette::{Diagnostic, NamedSource, Report, SourceSpan};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
pub struct RenderedDiagnostic {
    #[source_code]
    src: NamedSource,
    #[label("{code}")]
    span: SourceSpan,
    #[help]
    help: Option<String>,
    message: String,
    code: String,
}

impl RenderedDiagnostic {
    pub fn from_diagnostic(path: &Path, source: &str, diagnostic: &AnalysisDiagnostic) -> Self {
        Self {
            src: NamedSource::new(path.display().to_string(), source.to_string()),
            span: diagnostic.to_source_span(),
            help: diagnostic.help.clone(),
            message: diagnostic.message.clone(),
            code: diagnostic.code.to_string(),
        }
    }
}

/// Pretty-prints every diagnostic of one analyzed file. The caller supplies
/// the source text; the analysis core never re-reads files.
pub fn emit_diagnostics(analysis: &FileAnalysis, source: &str) {
    for diagnostic in &analysis.diagnostics {
        let rendered = RenderedDiagnostic::from_diagnostic(&analysis.path, source, diagnostic);
        eprintln!("{:?}", Report::new(rendered));
    }
}

pub fn report_internal_error(path: &Path, error: &InternalError) {
    eprintln!("Failed to compile {}: {}", path.display(), error);
}

pub fn report_io_error(path: &Path, error: &std::io::Error) {
    eprintln!("Failed to access {}: {}", path.display(), error);
}
