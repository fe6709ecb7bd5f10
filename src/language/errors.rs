use crate::language::span::Span;
use thiserror::Error;

/// Maximum expression/pattern nesting depth a single file may reach before the
/// pipeline gives up on it. Guards against degenerate machine-generated input;
/// legitimate plugins sit far below this.
pub const MAX_DEPTH: usize = 256;

/// Internal invariant violations. Unlike user diagnostics these are fatal for
/// the file being analyzed: the pipeline abandons the file wholesale and the
/// caller reports the failure separately from user-facing diagnostics.
#[derive(Debug, Error)]
pub enum InternalError {
    #[error("malformed AST: {detail} (line {})", span.line)]
    MalformedAst { detail: String, span: Span },

    #[error("nesting exceeds the depth limit of {MAX_DEPTH} (line {})", span.line)]
    DepthExceeded { span: Span },
}

impl InternalError {
    pub fn malformed(detail: impl Into<String>, span: Span) -> Self {
        InternalError::MalformedAst {
            detail: detail.into(),
            span,
        }
    }
}
