//! Filesystem scanning: Gradle modules, source roots and Java files.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use tracing::debug;
use walkdir::WalkDir;

use crate::errors::{GeneratorError, GeneratorResult};
use crate::models::PackagePath;

const GRADLE_BUILD_FILES: &[&str] = &["build.gradle", "build.gradle.kts"];

/// Directories that never hold project sources.
const IMPLICIT_IGNORED_DIRS: &[&str] = &["build", "buck-out", "out", "node_modules"];

const MAIN_ROOT: &str = "src/main";
const MAIN_JAVA_ROOT: &str = "src/main/java";

pub const ANDROID_MANIFEST: &str = "AndroidManifest.xml";

/// A Java file found under a source root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScannedFile {
    /// Project-relative path.
    pub path: PathBuf,
    pub package: PackagePath,
    /// Project-relative source root that owns this file.
    pub source_root: PathBuf,
    /// Java package implied by the directory layout under the source root.
    pub conventional_package: String,
}

/// Result of walking all source roots.
#[derive(Clone, Debug, Default)]
pub struct SourceScan {
    pub files: Vec<ScannedFile>,
}

impl SourceScan {
    pub fn package_count(&self) -> usize {
        self.files
            .iter()
            .map(|f| &f.package)
            .collect::<BTreeSet<_>>()
            .len()
    }
}

fn project_walker(project_root: &Path) -> ignore::Walk {
    WalkBuilder::new(project_root)
        .hidden(true)
        .git_ignore(true)
        .require_git(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(|entry| {
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            !(is_dir
                && IMPLICIT_IGNORED_DIRS
                    .iter()
                    .any(|name| entry.file_name() == *name))
        })
        .build()
}

fn relative_to(path: &Path, root: &Path) -> PathBuf {
    path.strip_prefix(root).unwrap_or(path).to_path_buf()
}

/// Every Gradle build script in the project, project-relative and sorted.
pub fn find_gradle_files(project_root: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    for entry in project_walker(project_root) {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                debug!("skipping unreadable entry: {err}");
                continue;
            }
        };
        let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
        if !is_file {
            continue;
        }
        if GRADLE_BUILD_FILES
            .iter()
            .any(|name| entry.file_name() == *name)
        {
            found.push(relative_to(entry.path(), project_root));
        }
    }
    found.sort();
    found
}

/// Source roots of every Gradle module: `<module>/src/main/java` when it
/// exists next to a build script.
pub fn discover_source_roots(project_root: &Path) -> Vec<PathBuf> {
    let roots: BTreeSet<PathBuf> = find_gradle_files(project_root)
        .into_iter()
        .filter_map(|script| {
            let module = script.parent().map(Path::to_path_buf).unwrap_or_default();
            let root = module.join(MAIN_JAVA_ROOT);
            project_root.join(&root).is_dir().then_some(root)
        })
        .collect();
    debug!("discovered {} source root(s)", roots.len());
    roots.into_iter().collect()
}

fn is_java_file(path: &Path) -> bool {
    path.extension().map(|e| e == "java").unwrap_or(false)
}

/// `<module>/src/main` of every Gradle module that carries an
/// `AndroidManifest.xml`.
pub fn find_android_modules(project_root: &Path) -> Vec<PathBuf> {
    let modules: BTreeSet<PathBuf> = find_gradle_files(project_root)
        .into_iter()
        .filter_map(|script| {
            let module = script.parent().map(Path::to_path_buf).unwrap_or_default();
            let main = module.join(MAIN_ROOT);
            project_root
                .join(&main)
                .join(ANDROID_MANIFEST)
                .is_file()
                .then_some(main)
        })
        .collect();
    debug!("found {} android module(s)", modules.len());
    modules.into_iter().collect()
}

/// Walk each source root and collect Java files grouped into packages.
///
/// A file under nested roots belongs to the innermost one.
pub fn scan_source_roots(project_root: &Path, roots: &[PathBuf]) -> GeneratorResult<SourceScan> {
    let normalized: Vec<PathBuf> = roots
        .iter()
        .map(|r| PackagePath::from_relative(r).to_path_buf())
        .collect();
    let mut by_path: BTreeMap<PathBuf, ScannedFile> = BTreeMap::new();

    for root in &normalized {
        let absolute_root = project_root.join(root);
        if !absolute_root.is_dir() {
            return Err(GeneratorError::Config(format!(
                "source root {} does not exist",
                root.display()
            )));
        }
        for entry in WalkDir::new(&absolute_root)
            .follow_links(false)
            .sort_by_file_name()
        {
            let entry = entry?;
            if !entry.file_type().is_file() || !is_java_file(entry.path()) {
                continue;
            }
            let rel_path = relative_to(entry.path(), project_root);
            let owner = normalized
                .iter()
                .filter(|candidate| rel_path.starts_with(candidate))
                .max_by_key(|candidate| candidate.components().count());
            if owner != Some(root) {
                continue;
            }
            let dir = rel_path.parent().map(Path::to_path_buf).unwrap_or_default();
            let conventional_package = dir
                .strip_prefix(root)
                .map(|p| PackagePath::from_relative(p).as_str().replace('/', "."))
                .unwrap_or_default();
            by_path.insert(
                rel_path.clone(),
                ScannedFile {
                    path: rel_path,
                    package: PackagePath::from_relative(&dir),
                    source_root: root.clone(),
                    conventional_package,
                },
            );
        }
    }

    Ok(SourceScan {
        files: by_path.into_values().collect(),
    })
}
