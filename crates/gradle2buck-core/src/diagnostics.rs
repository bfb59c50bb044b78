//! Diagnostics collected during a run and the final run report.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{error, warn};

use crate::errors::GeneratorError;
use crate::graph::cycles::CycleViolation;
use crate::models::{BuildFile, PackagePath};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    Unresolved,
    PackageMismatch,
    DuplicateClass,
    ParseError,
    DuplicateSymbol,
    CyclicDependency,
    DependsOnCycle,
    ArtifactConflict,
    WriteFailure,
    /// The run stopped before emitting anything.
    Fatal,
}

/// One actionable finding, carrying enough identity to act on without
/// re-running.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<PackagePath>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn warning(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            kind,
            package: None,
            file: None,
            symbol: None,
            message: message.into(),
        }
    }

    pub fn error(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Error,
            ..Diagnostic::warning(kind, message)
        }
    }

    pub fn with_package(mut self, package: &PackagePath) -> Self {
        self.package = Some(package.clone());
        self
    }

    pub fn with_file(mut self, file: &Path) -> Self {
        self.file = Some(file.to_path_buf());
        self
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    /// Emit this diagnostic on the tracing stream.
    pub fn log(&self) {
        let package = self.package.as_ref().map(PackagePath::as_str).unwrap_or("-");
        let file = self
            .file
            .as_ref()
            .map(|f| f.display().to_string())
            .unwrap_or_else(|| "-".to_string());
        let symbol = self.symbol.as_deref().unwrap_or("-");
        match self.severity {
            Severity::Warning => {
                warn!(kind = ?self.kind, package, file = %file, symbol, "{}", self.message)
            }
            Severity::Error => {
                error!(kind = ?self.kind, package, file = %file, symbol, "{}", self.message)
            }
        }
    }
}

/// Process exit status of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitStatus {
    /// Every package emitted.
    Success,
    /// Cycles or write failures; unaffected packages were still emitted.
    Partial,
    /// Nothing emitted: configuration, manifest or indexing failed.
    Fatal,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::Partial => 1,
            ExitStatus::Fatal => 2,
        }
    }
}

/// Everything a run produced.
#[derive(Clone, Debug, Default, Serialize)]
pub struct RunReport {
    pub packages_indexed: usize,
    pub files_indexed: usize,
    pub build_files: Vec<BuildFile>,
    pub written: Vec<PathBuf>,
    pub cycles: Vec<CycleViolation>,
    pub diagnostics: Vec<Diagnostic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buckconfig: Option<PathBuf>,
    /// Android module build files written next to `AndroidManifest.xml`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub android_modules: Vec<PathBuf>,
    pub fatal: bool,
    pub elapsed_ms: u64,
}

impl RunReport {
    /// Report for a run that stopped on `error`. Each duplicate class pair
    /// becomes its own diagnostic.
    pub fn fatal(error: &GeneratorError) -> Self {
        let diagnostics = match error {
            GeneratorError::DuplicateSymbols(duplicates) => duplicates
                .iter()
                .map(|duplicate| {
                    Diagnostic::error(DiagnosticKind::DuplicateSymbol, duplicate.to_string())
                        .with_file(&duplicate.second)
                        .with_symbol(duplicate.class_name.clone())
                })
                .collect(),
            other => vec![Diagnostic::error(DiagnosticKind::Fatal, other.to_string())],
        };
        RunReport {
            diagnostics,
            fatal: true,
            ..RunReport::default()
        }
    }

    /// Record and log a diagnostic.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        diagnostic.log();
        self.diagnostics.push(diagnostic);
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        for diagnostic in diagnostics {
            self.push(diagnostic);
        }
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.diagnostics.iter().filter(|d| d.kind == kind).count()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    pub fn exit_status(&self) -> ExitStatus {
        if self.fatal {
            ExitStatus::Fatal
        } else if self.has_errors() || !self.cycles.is_empty() {
            ExitStatus::Partial
        } else {
            ExitStatus::Success
        }
    }
}
