//! Parallel build file writer.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::models::{BuildFile, PackagePath};

/// Result of writing one build file.
#[derive(Clone, Debug)]
pub struct WriteOutcome {
    pub package: PackagePath,
    /// Project-relative output path.
    pub path: PathBuf,
    pub error_message: Option<String>,
}

impl WriteOutcome {
    pub fn is_ok(&self) -> bool {
        self.error_message.is_none()
    }

    /// The failure as a diagnostic, attributed to its package.
    pub fn diagnostic(&self) -> Option<Diagnostic> {
        self.error_message.as_ref().map(|message| {
            Diagnostic::error(DiagnosticKind::WriteFailure, message.clone())
                .with_package(&self.package)
                .with_file(&self.path)
        })
    }
}

fn write_one(project_root: &Path, file: &BuildFile) -> WriteOutcome {
    let target = project_root.join(&file.path);
    let error_message = match std::fs::write(&target, file.contents.as_bytes()) {
        Ok(()) => {
            debug!(package = %file.package, "wrote {}", file.path.display());
            None
        }
        Err(e) => Some(format!("failed to write {}: {e}", target.display())),
    };
    WriteOutcome {
        package: file.package.clone(),
        path: file.path.clone(),
        error_message,
    }
}

/// Output paths claimed by more than one package. None of those are written.
fn colliding_paths(files: &[BuildFile]) -> BTreeMap<&Path, Vec<&PackagePath>> {
    let mut owners: BTreeMap<&Path, Vec<&PackagePath>> = BTreeMap::new();
    for file in files {
        owners.entry(file.path.as_path()).or_default().push(&file.package);
    }
    owners.retain(|_, packages| packages.len() > 1);
    owners
}

/// Write every build file, overwriting existing ones, `jobs` at a time.
///
/// Outcomes are returned in input order.
pub fn write_build_files(project_root: &Path, files: &[BuildFile], jobs: usize) -> Vec<WriteOutcome> {
    if files.is_empty() {
        return vec![];
    }

    let collisions = colliding_paths(files);
    let write = |file: &BuildFile| -> WriteOutcome {
        match collisions.get(file.path.as_path()) {
            Some(owners) => WriteOutcome {
                package: file.package.clone(),
                path: file.path.clone(),
                error_message: Some(format!(
                    "{} is claimed by {} packages",
                    file.path.display(),
                    owners.len()
                )),
            },
            None => write_one(project_root, file),
        }
    };

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.max(1))
        .build();

    match pool {
        Ok(pool) => pool.install(|| files.par_iter().map(write).collect()),
        Err(e) => {
            warn!("failed to build writer pool, writing sequentially: {e}");
            files.iter().map(write).collect()
        }
    }
}
