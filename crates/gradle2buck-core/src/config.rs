//! Generator configuration and validation.

use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::errors::{GeneratorError, GeneratorResult};

pub const DEFAULT_BUILD_FILE_NAME: &str = "BUCK";
pub const DEFAULT_THIRD_PARTY_PATH: &str = "libs";

/// Packages provided by the JDK or the Android platform. References under
/// these prefixes are neither dependencies nor unresolved.
pub const DEFAULT_PLATFORM_PREFIXES: &[&str] = &[
    "java.",
    "javax.",
    "jdk.",
    "sun.",
    "com.sun.",
    "org.w3c.dom.",
    "org.xml.sax.",
    "android.",
    "dalvik.",
];

#[derive(Clone, Debug, Serialize)]
pub struct GeneratorConfig {
    pub project_root: PathBuf,
    /// Project-relative source roots. Empty means discover from Gradle
    /// build scripts.
    pub source_roots: Vec<PathBuf>,
    pub manifest: Option<PathBuf>,
    pub third_party_path: String,
    pub build_file_name: String,
    pub platform_prefixes: Vec<String>,
    pub jobs: usize,
    pub dry_run: bool,
    pub write_buckconfig: bool,
    pub report: Option<PathBuf>,
}

impl GeneratorConfig {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        GeneratorConfig {
            project_root: project_root.into(),
            source_roots: Vec::new(),
            manifest: None,
            third_party_path: DEFAULT_THIRD_PARTY_PATH.to_string(),
            build_file_name: DEFAULT_BUILD_FILE_NAME.to_string(),
            platform_prefixes: DEFAULT_PLATFORM_PREFIXES
                .iter()
                .map(|p| p.to_string())
                .collect(),
            jobs: default_jobs(),
            dry_run: false,
            write_buckconfig: false,
            report: None,
        }
    }

    pub fn with_source_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.source_roots.push(root.into());
        self
    }

    pub fn with_manifest(mut self, manifest: impl Into<PathBuf>) -> Self {
        self.manifest = Some(manifest.into());
        self
    }

    /// Append extra platform prefixes, normalising them to end with `.`.
    pub fn add_platform_prefixes<I, S>(&mut self, prefixes: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for prefix in prefixes {
            let trimmed = prefix.as_ref().trim().trim_end_matches('.');
            if trimmed.is_empty() {
                continue;
            }
            let normalized = format!("{trimmed}.");
            if !self.platform_prefixes.contains(&normalized) {
                self.platform_prefixes.push(normalized);
            }
        }
    }

    /// Resolve a path given on the command line against the project root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }

    pub fn validate(&self) -> GeneratorResult<()> {
        if !self.project_root.is_dir() {
            return Err(GeneratorError::Config(format!(
                "project root {} is not a directory",
                self.project_root.display()
            )));
        }
        for root in &self.source_roots {
            if root.is_absolute() || root.components().any(|c| c == Component::ParentDir) {
                return Err(GeneratorError::Config(format!(
                    "source root {} must be relative to the project root",
                    root.display()
                )));
            }
            if !self.project_root.join(root).is_dir() {
                return Err(GeneratorError::Config(format!(
                    "source root {} does not exist",
                    root.display()
                )));
            }
        }
        let name = self.build_file_name.trim();
        if name.is_empty() || name.contains('/') || name.contains('\\') {
            return Err(GeneratorError::Config(format!(
                "invalid build file name {:?}",
                self.build_file_name
            )));
        }
        if self.third_party_path.contains(':') {
            return Err(GeneratorError::Config(format!(
                "third party path {:?} must be a directory, not a target",
                self.third_party_path
            )));
        }
        if self.jobs == 0 {
            return Err(GeneratorError::Config("jobs must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Whether `name` lives under one of `prefixes`. A prefix also matches its
/// bare package name, so `java.` covers a wildcard import of `java`.
pub fn is_platform_name(prefixes: &[String], name: &str) -> bool {
    prefixes.iter().any(|prefix| {
        let bare = prefix.trim_end_matches('.');
        name == bare || name.starts_with(prefix.as_str())
    })
}

pub fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
