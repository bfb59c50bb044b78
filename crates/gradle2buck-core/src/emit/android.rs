//! Module-level build files for Android application modules.
//!
//! Each `<module>/src/main` holding an `AndroidManifest.xml` gets an
//! `android_build_config` rule and, when a `res/` directory sits next to the
//! manifest, an `android_resource` rule. Both carry the manifest's `package`.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use roxmltree::Document;
use tracing::{debug, info};

use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::errors::{GeneratorError, GeneratorResult};
use crate::indexer::filesystem::ANDROID_MANIFEST;

const RESOURCE_DIR: &str = "res";

/// An Android module ready to be rendered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AndroidModule {
    /// Project-relative `<module>/src/main`.
    pub dir: PathBuf,
    /// Application package from the manifest root.
    pub package: String,
    pub has_resources: bool,
}

/// The `package` attribute of the manifest's root element.
pub fn manifest_package(text: &str) -> Result<String, String> {
    let doc = Document::parse(text).map_err(|e| e.to_string())?;
    doc.root_element()
        .attribute("package")
        .map(str::trim)
        .filter(|package| !package.is_empty())
        .map(str::to_string)
        .ok_or_else(|| "manifest has no package attribute".to_string())
}

pub fn load_android_module(project_root: &Path, dir: &Path) -> GeneratorResult<AndroidModule> {
    let manifest = project_root.join(dir).join(ANDROID_MANIFEST);
    let bytes = std::fs::read(&manifest).map_err(|e| GeneratorError::io(&manifest, e))?;
    let package = manifest_package(&String::from_utf8_lossy(&bytes))
        .map_err(|message| GeneratorError::manifest(&manifest, message))?;
    Ok(AndroidModule {
        dir: dir.to_path_buf(),
        package,
        has_resources: project_root.join(dir).join(RESOURCE_DIR).is_dir(),
    })
}

pub fn render_android_module(module: &AndroidModule) -> String {
    let package = &module.package;
    let mut out = String::new();
    out.push_str("android_build_config(\n");
    out.push_str("  name = 'build-config',\n");
    let _ = writeln!(out, "  package = '{package}',");
    out.push_str("  visibility = [\n    'PUBLIC',\n  ],\n");
    out.push_str(")\n");
    if module.has_resources {
        out.push('\n');
        out.push_str("android_resource(\n");
        out.push_str("  name = 'res',\n");
        let _ = writeln!(out, "  package = '{package}',");
        let _ = writeln!(out, "  res = '{RESOURCE_DIR}',");
        out.push_str("  deps = [\n  ],\n");
        out.push_str("  visibility = [\n    'PUBLIC',\n  ],\n");
        out.push_str(")\n");
    }
    out
}

/// Write a build file into every module in `dirs` that has none yet.
///
/// Returns the paths written. An unreadable manifest is a warning for that
/// module; a failed write is an error.
pub fn write_android_modules(
    project_root: &Path,
    dirs: &[PathBuf],
    build_file_name: &str,
) -> (Vec<PathBuf>, Vec<Diagnostic>) {
    let mut written = Vec::new();
    let mut diagnostics = Vec::new();

    for dir in dirs {
        let path = dir.join(build_file_name);
        let absolute = project_root.join(&path);
        if absolute.exists() {
            debug!("keeping existing {}", path.display());
            continue;
        }
        let module = match load_android_module(project_root, dir) {
            Ok(module) => module,
            Err(e) => {
                diagnostics.push(
                    Diagnostic::warning(DiagnosticKind::ParseError, e.to_string())
                        .with_file(&dir.join(ANDROID_MANIFEST)),
                );
                continue;
            }
        };
        match std::fs::write(&absolute, render_android_module(&module)) {
            Ok(()) => written.push(path),
            Err(e) => diagnostics.push(
                Diagnostic::error(DiagnosticKind::WriteFailure, format!("write failed: {e}"))
                    .with_file(&path),
            ),
        }
    }

    info!(modules = written.len(), "android module build files written");
    (written, diagnostics)
}
