//! Core data model shared by the indexing, graph and emission stages.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

// ---------------------------------------------------------------------------
// Packages and files
// ---------------------------------------------------------------------------

/// Project-relative directory of a source package, always `/`-separated.
///
/// This is the identity of a [`SourcePackage`] and the basis of its Buck
/// target (`//<path>:<last component>`).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct PackagePath(String);

impl PackagePath {
    pub fn from_relative(path: &Path) -> Self {
        let normalized = path
            .components()
            .filter_map(|c| match c {
                std::path::Component::Normal(os) => Some(os.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/");
        PackagePath(normalized)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last directory component, used as the Buck rule name.
    pub fn target_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Fully-qualified Buck target for this package.
    pub fn target(&self) -> String {
        format!("//{}:{}", self.0, self.target_name())
    }

    pub fn to_path_buf(&self) -> PathBuf {
        PathBuf::from(&self.0)
    }
}

impl fmt::Display for PackagePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PackagePath {
    fn from(value: &str) -> Self {
        PackagePath::from_relative(Path::new(value))
    }
}

/// One directory of Java sources.
#[derive(Clone, Debug, Serialize)]
pub struct SourcePackage {
    pub path: PackagePath,
    /// Project-relative source root this package was found under.
    pub source_root: PathBuf,
    /// Project-relative paths of the member `.java` files.
    pub files: BTreeSet<PathBuf>,
    /// Java package name, from the sources or the directory convention.
    pub declared_name: String,
}

/// A single Java source file and the package that owns it.
#[derive(Clone, Debug, Serialize)]
pub struct SourceFile {
    pub path: PathBuf,
    pub package: PackagePath,
}

// ---------------------------------------------------------------------------
// External artifacts
// ---------------------------------------------------------------------------

/// A third-party artifact identified by its Maven coordinate.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ExternalArtifact {
    pub coordinate: String,
    pub group: String,
    pub artifact: String,
    pub version: String,
}

impl ExternalArtifact {
    /// Name of the prebuilt rule. `qualified` prefixes the group, for artifact
    /// ids that more than one group publishes.
    pub fn rule_name(&self, qualified: bool) -> String {
        if qualified {
            format!("{}-{}", self.group, self.artifact)
        } else {
            self.artifact.clone()
        }
    }

    /// Buck target of the prebuilt rule for this artifact.
    pub fn target(&self, third_party_path: &str, qualified: bool) -> String {
        format!(
            "//{}:{}",
            third_party_path.trim_matches('/'),
            self.rule_name(qualified)
        )
    }
}

// ---------------------------------------------------------------------------
// Edges and graph
// ---------------------------------------------------------------------------

/// Where a dependency edge points.
///
/// Variant order matters: internal targets sort before external ones, which
/// is the order build files list them in.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(tag = "kind", content = "target", rename_all = "snake_case")]
pub enum EdgeTarget {
    Internal(PackagePath),
    External(String),
}

impl EdgeTarget {
    pub fn is_internal(&self) -> bool {
        matches!(self, EdgeTarget::Internal(_))
    }
}

/// A referencing file together with the symbol it referenced.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Provenance {
    pub file: PathBuf,
    pub symbol: String,
}

/// A derived package dependency with the files that caused it.
#[derive(Clone, Debug, Serialize)]
pub struct DependencyEdge<'a> {
    pub source: &'a PackagePath,
    pub target: &'a EdgeTarget,
    pub provenance: &'a BTreeSet<Provenance>,
}

/// A reference that matched neither the index nor the manifest.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct UnresolvedReference {
    pub package: PackagePath,
    pub file: PathBuf,
    pub symbol: String,
    pub line: usize,
}

/// All packages plus every resolved dependency edge.
#[derive(Clone, Debug, Default)]
pub struct DependencyGraph {
    pub packages: BTreeSet<PackagePath>,
    pub edges: BTreeMap<PackagePath, BTreeMap<EdgeTarget, BTreeSet<Provenance>>>,
    pub artifacts: BTreeMap<String, ExternalArtifact>,
    pub unresolved: Vec<UnresolvedReference>,
    pub android: BTreeSet<PackagePath>,
}

impl DependencyGraph {
    /// Every edge, ordered by source package then target.
    pub fn edges(&self) -> impl Iterator<Item = DependencyEdge<'_>> {
        self.edges.iter().flat_map(|(source, targets)| {
            targets.iter().map(move |(target, provenance)| DependencyEdge {
                source,
                target,
                provenance,
            })
        })
    }

    /// Internal targets of `package`, sorted by package path.
    pub fn internal_targets<'a>(
        &'a self,
        package: &PackagePath,
    ) -> impl Iterator<Item = &'a PackagePath> + 'a {
        self.edges
            .get(package)
            .into_iter()
            .flat_map(|targets| targets.keys())
            .filter_map(|target| match target {
                EdgeTarget::Internal(path) => Some(path),
                EdgeTarget::External(_) => None,
            })
    }

    /// External coordinates of `package`, sorted by coordinate.
    pub fn external_targets<'a>(
        &'a self,
        package: &PackagePath,
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.edges
            .get(package)
            .into_iter()
            .flat_map(|targets| targets.keys())
            .filter_map(|target| match target {
                EdgeTarget::External(coordinate) => Some(coordinate.as_str()),
                EdgeTarget::Internal(_) => None,
            })
    }

    pub fn provenance(&self, source: &PackagePath, target: &EdgeTarget) -> Option<&BTreeSet<Provenance>> {
        self.edges.get(source).and_then(|targets| targets.get(target))
    }
}

// ---------------------------------------------------------------------------
// Emission
// ---------------------------------------------------------------------------

/// Buck rule type chosen for a package.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    JavaLibrary,
    AndroidLibrary,
}

impl RuleKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RuleKind::JavaLibrary => "java_library",
            RuleKind::AndroidLibrary => "android_library",
        }
    }
}

/// A rendered build file, ready to be written.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BuildFile {
    pub package: PackagePath,
    /// Project-relative output path.
    pub path: PathBuf,
    pub target_name: String,
    pub rule: RuleKind,
    pub deps: Vec<String>,
    #[serde(skip)]
    pub contents: String,
}
