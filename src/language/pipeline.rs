//! Per-file analysis pipeline: resolve → infer → discipline → lower → emit.
//!
//! Each file runs the stages sequentially against the shared read-only module
//! table; per-file state (definitions, inference tables, diagnostics) is
//! owned by the run, so a batch of files needs no synchronization. User
//! diagnostics accumulate and never stop a stage; internal invariant
//! violations abandon the file and surface as a separate failure.

use crate::language::{
    ast::FileAst,
    diagnostics::{Diagnostic, DiagnosticRow, Diagnostics, Severity},
    discipline,
    emit::{emit_program, out::OutProgram, DynamicEmitter, NativeEmitter},
    errors::InternalError,
    infer::{infer_file, InferOutput},
    lower::lower_file,
    modules::ModuleTable,
    resolve::resolve_file,
};
use std::path::PathBuf;

#[derive(Clone, Copy, Debug)]
pub struct PipelineOptions {
    /// Skip lowering and emission entirely; useful for editor diagnostics
    /// where only the analysis half matters.
    pub codegen: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self { codegen: true }
    }
}

/// Everything one pipeline run produced for one file. Code is only generated
/// for diagnostic-clean files; both backend outputs are always produced
/// together or not at all.
#[derive(Debug)]
pub struct FileAnalysis {
    pub path: PathBuf,
    pub module_name: String,
    pub diagnostics: Vec<Diagnostic>,
    pub types: InferOutput,
    pub dynamic: Option<OutProgram>,
    pub native: Option<OutProgram>,
}

impl FileAnalysis {
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Position-ordered rows for the reporting collaborator.
    pub fn rows(&self) -> Vec<DiagnosticRow> {
        self.diagnostics
            .iter()
            .map(|d| DiagnosticRow::from_diagnostic(d, &self.path))
            .collect()
    }
}

pub fn analyze_file(file: &FileAst, modules: &ModuleTable) -> Result<FileAnalysis, InternalError> {
    analyze_file_with(file, modules, PipelineOptions::default())
}

pub fn analyze_file_with(
    file: &FileAst,
    modules: &ModuleTable,
    options: PipelineOptions,
) -> Result<FileAnalysis, InternalError> {
    let mut diagnostics = Diagnostics::new();
    let defs = resolve_file(file, modules, &mut diagnostics);
    let types = infer_file(file, &defs, &mut diagnostics)?;
    discipline::check_file(file, &types, &mut diagnostics);
    let (dynamic, native) = if options.codegen && !diagnostics.has_errors() {
        let ir = lower_file(file, &defs, &types)?;
        (
            Some(emit_program(&ir, &DynamicEmitter::new())),
            Some(emit_program(&ir, &NativeEmitter::new())),
        )
    } else {
        (None, None)
    };
    Ok(FileAnalysis {
        path: file.path.clone(),
        module_name: file.module_name.clone(),
        diagnostics: diagnostics.into_sorted(),
        types,
        dynamic,
        native,
    })
}

/// Result of analyzing a batch: per-file analyses for the files that ran to
/// completion, plus the files the pipeline had to abandon.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub analyses: Vec<FileAnalysis>,
    pub failures: Vec<(PathBuf, InternalError)>,
}

impl BatchOutcome {
    pub fn has_errors(&self) -> bool {
        !self.failures.is_empty() || self.analyses.iter().any(FileAnalysis::has_errors)
    }
}

/// Analyzes every file independently against one shared module table. A
/// malformed file never takes its siblings down with it.
pub fn analyze_batch(files: &[FileAst], modules: &ModuleTable) -> BatchOutcome {
    analyze_batch_with(files, modules, PipelineOptions::default())
}

pub fn analyze_batch_with(
    files: &[FileAst],
    modules: &ModuleTable,
    options: PipelineOptions,
) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();
    for file in files {
        match analyze_file_with(file, modules, options) {
            Ok(analysis) => outcome.analyses.push(analysis),
            Err(error) => outcome.failures.push((file.path.clone(), error)),
        }
    }
    outcome
}
