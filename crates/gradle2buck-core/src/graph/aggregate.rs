//! Dependency aggregation: file references resolved to package edges.
//!
//! Resolution order for every reference is internal index, then external
//! manifest, then platform prefixes. Anything left is unresolved. Internal
//! wins when a name matches both the index and the manifest.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::config::is_platform_name;
use crate::graph::manifest::ExternalManifest;
use crate::indexer::pipeline::ExtractionResult;
use crate::indexer::source_index::SourceIndex;
use crate::indexer::symbols::{class_guess, ExtractedReference, ReferenceKind};
use crate::models::{
    DependencyGraph, EdgeTarget, ExternalArtifact, PackagePath, Provenance, UnresolvedReference,
};

const ANDROID_PREFIXES: &[&str] = &["android.", "androidx.", "com.android."];

/// What a single reference resolved to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution<'a> {
    /// One or more project packages; several only for wildcard imports of a
    /// package split across directories.
    Internal {
        packages: Vec<&'a PackagePath>,
        symbol: String,
    },
    External(&'a ExternalArtifact),
    /// Provided by the JDK or Android platform.
    Platform,
    /// An in-line chain that does not start at any known package root, so it
    /// is most likely a field access rather than a class reference.
    NotAClass,
    Unresolved,
}

/// Resolves references against the index, the manifest and platform
/// prefixes.
pub struct Resolver<'a> {
    index: &'a SourceIndex,
    manifest: &'a ExternalManifest,
    platform_prefixes: &'a [String],
    known_roots: BTreeSet<&'a str>,
}

impl<'a> Resolver<'a> {
    pub fn new(
        index: &'a SourceIndex,
        manifest: &'a ExternalManifest,
        platform_prefixes: &'a [String],
    ) -> Self {
        let mut known_roots = index.package_roots();
        known_roots.extend(manifest.roots());
        known_roots.extend(
            platform_prefixes
                .iter()
                .filter_map(|prefix| prefix.split('.').next()),
        );
        Resolver {
            index,
            manifest,
            platform_prefixes,
            known_roots,
        }
    }

    pub fn resolve(&self, reference: &ExtractedReference) -> Resolution<'a> {
        let name = reference.name.as_str();
        if reference.kind == ReferenceKind::Inline {
            let root = name.split('.').next().unwrap_or(name);
            if !self.known_roots.contains(root) {
                return Resolution::NotAClass;
            }
        }

        if reference.kind == ReferenceKind::Wildcard {
            let packages: Vec<&'a PackagePath> = self.index.packages_named(name).collect();
            if !packages.is_empty() {
                return Resolution::Internal {
                    packages,
                    symbol: format!("{name}.*"),
                };
            }
        }
        if let Some(class) = self.index.resolve_class(name) {
            return Resolution::Internal {
                packages: vec![&class.package],
                symbol: class.name.clone(),
            };
        }
        if let Some(artifact) = self.manifest.resolve(name) {
            return Resolution::External(artifact);
        }
        if is_platform_name(self.platform_prefixes, name) {
            return Resolution::Platform;
        }
        Resolution::Unresolved
    }
}

fn display_symbol(reference: &ExtractedReference) -> String {
    match reference.kind {
        ReferenceKind::Wildcard => format!("{}.*", reference.name),
        _ => class_guess(&reference.name).to_string(),
    }
}

fn is_android(name: &str) -> bool {
    ANDROID_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
}

/// Build the package dependency graph from every file's references.
///
/// The result does not depend on the order of `results`.
pub fn aggregate(
    index: &SourceIndex,
    results: &[ExtractionResult],
    manifest: &ExternalManifest,
    platform_prefixes: &[String],
) -> DependencyGraph {
    let resolver = Resolver::new(index, manifest, platform_prefixes);
    let mut graph = DependencyGraph::default();
    let mut platform_references = 0usize;

    for package in index.packages() {
        graph.packages.insert(package.path.clone());
    }

    for result in results {
        let package = &result.file.package;
        graph.packages.insert(package.clone());
        let Some(source) = &result.source else {
            continue;
        };

        for reference in &source.references {
            if is_android(&reference.name) {
                graph.android.insert(package.clone());
            }
            match resolver.resolve(reference) {
                Resolution::Internal { packages, symbol } => {
                    for target in packages {
                        if target == package {
                            continue;
                        }
                        graph
                            .edges
                            .entry(package.clone())
                            .or_default()
                            .entry(EdgeTarget::Internal(target.clone()))
                            .or_default()
                            .insert(Provenance {
                                file: result.file.path.clone(),
                                symbol: symbol.clone(),
                            });
                    }
                }
                Resolution::External(artifact) => {
                    graph
                        .artifacts
                        .entry(artifact.coordinate.clone())
                        .or_insert_with(|| artifact.clone());
                    graph
                        .edges
                        .entry(package.clone())
                        .or_default()
                        .entry(EdgeTarget::External(artifact.coordinate.clone()))
                        .or_default()
                        .insert(Provenance {
                            file: result.file.path.clone(),
                            symbol: display_symbol(reference),
                        });
                }
                Resolution::Platform => platform_references += 1,
                Resolution::NotAClass => {}
                Resolution::Unresolved => graph.unresolved.push(UnresolvedReference {
                    package: package.clone(),
                    file: result.file.path.clone(),
                    symbol: display_symbol(reference),
                    line: reference.line,
                }),
            }
        }
    }

    graph.unresolved.sort();
    graph.unresolved.dedup();

    debug!(platform_references, "skipped platform references");
    info!(
        packages = graph.packages.len(),
        edges = graph.edges().count(),
        unresolved = graph.unresolved.len(),
        "dependency graph aggregated"
    );
    graph
}
