//! BUCK file planning and rendering.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::fmt::Write as _;

use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::graph::manifest::parse_coordinate;
use crate::models::{BuildFile, DependencyGraph, EdgeTarget, ExternalArtifact, PackagePath, RuleKind};

const JAVA_SRCS: &str = "glob(['*.java'])";

/// Where emitted files go and how external targets are named.
#[derive(Clone, Debug)]
pub struct EmitOptions<'a> {
    pub build_file_name: &'a str,
    pub third_party_path: &'a str,
}

/// Packages that must be `android_library`: those referencing the Android
/// platform directly, and everything that depends on them.
pub fn android_packages(graph: &DependencyGraph) -> BTreeSet<PackagePath> {
    let mut dependents: BTreeMap<&PackagePath, Vec<&PackagePath>> = BTreeMap::new();
    for package in &graph.packages {
        for target in graph.internal_targets(package) {
            dependents.entry(target).or_default().push(package);
        }
    }

    let mut android: BTreeSet<PackagePath> = graph.android.clone();
    let mut queue: VecDeque<&PackagePath> = graph.android.iter().collect();
    while let Some(current) = queue.pop_front() {
        for dependent in dependents.get(current).into_iter().flatten() {
            if android.insert((*dependent).clone()) {
                queue.push_back(*dependent);
            }
        }
    }
    android
}

/// Buck targets of every external coordinate in a graph.
///
/// Names are chosen over the whole graph so a package's file does not depend
/// on which other artifacts it happens to use. An artifact id published by
/// more than one group is named `<group>-<artifact>`.
#[derive(Clone, Debug, Default)]
pub struct ExternalTargets<'a> {
    targets: BTreeMap<&'a str, String>,
}

impl<'a> ExternalTargets<'a> {
    pub fn new(graph: &'a DependencyGraph, third_party_path: &str) -> Self {
        let artifacts: BTreeMap<&'a str, ExternalArtifact> = graph
            .edges
            .values()
            .flat_map(|targets| targets.keys())
            .filter_map(|target| match target {
                EdgeTarget::External(coordinate) => Some(coordinate.as_str()),
                EdgeTarget::Internal(_) => None,
            })
            .filter_map(|coordinate| {
                graph
                    .artifacts
                    .get(coordinate)
                    .cloned()
                    .or_else(|| parse_coordinate(coordinate))
                    .map(|artifact| (coordinate, artifact))
            })
            .collect();

        let mut groups: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for artifact in artifacts.values() {
            groups
                .entry(artifact.artifact.as_str())
                .or_default()
                .insert(artifact.group.as_str());
        }

        let targets = artifacts
            .iter()
            .map(|(coordinate, artifact)| {
                let qualified = groups
                    .get(artifact.artifact.as_str())
                    .is_some_and(|publishers| publishers.len() > 1);
                (*coordinate, artifact.target(third_party_path, qualified))
            })
            .collect();
        ExternalTargets { targets }
    }

    pub fn target(&self, coordinate: &str) -> Option<&str> {
        self.targets.get(coordinate).map(String::as_str)
    }
}

/// Ordered, de-duplicated dependency targets for `package`: internal
/// packages by path, then external artifacts by coordinate.
pub fn dependency_targets(
    graph: &DependencyGraph,
    externals: &ExternalTargets<'_>,
    package: &PackagePath,
) -> Vec<String> {
    let internal = graph
        .internal_targets(package)
        .filter(|target| *target != package)
        .map(PackagePath::target);
    let external = graph
        .external_targets(package)
        .filter_map(|coordinate| externals.target(coordinate).map(str::to_string));

    let own_target = package.target();
    let mut seen = HashSet::new();
    internal
        .chain(external)
        .filter(|target| *target != own_target && seen.insert(target.clone()))
        .collect()
}

/// Warnings for coordinates of `package` that share one prebuilt target,
/// typically two versions of the same artifact. Only one reaches the build.
pub fn artifact_conflicts(
    graph: &DependencyGraph,
    externals: &ExternalTargets<'_>,
    package: &PackagePath,
) -> Vec<Diagnostic> {
    let mut by_target: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for coordinate in graph.external_targets(package) {
        if let Some(target) = externals.target(coordinate) {
            by_target.entry(target).or_default().push(coordinate);
        }
    }
    by_target
        .into_iter()
        .filter(|(_, coordinates)| coordinates.len() > 1)
        .map(|(target, coordinates)| {
            Diagnostic::warning(
                DiagnosticKind::ArtifactConflict,
                format!("{} all map to {target}", coordinates.join(", ")),
            )
            .with_package(package)
        })
        .collect()
}

/// Render one build rule. Output is byte-identical for identical input.
pub fn render_build_file(target_name: &str, rule: RuleKind, deps: &[String]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}(", rule.as_str());
    let _ = writeln!(out, "  name = '{target_name}',");
    let _ = writeln!(out, "  srcs = {JAVA_SRCS},");
    out.push_str("  deps = [\n");
    for dep in deps {
        let _ = writeln!(out, "    '{dep}',");
    }
    out.push_str("  ],\n");
    out.push_str("  visibility = [\n    'PUBLIC',\n  ],\n");
    out.push_str(")\n");
    out
}

/// Plan a build file for every package outside `blocked`.
///
/// Packages that depend on a blocked package are still planned, with a
/// warning: their target list is right but the dependency has no build file
/// until the cycle is broken.
pub fn plan_build_files(
    graph: &DependencyGraph,
    blocked: &BTreeSet<PackagePath>,
    options: &EmitOptions<'_>,
) -> (Vec<BuildFile>, Vec<Diagnostic>) {
    let android = android_packages(graph);
    let externals = ExternalTargets::new(graph, options.third_party_path);
    let mut files = Vec::new();
    let mut diagnostics = Vec::new();

    for package in &graph.packages {
        if blocked.contains(package) {
            continue;
        }
        for target in graph.internal_targets(package) {
            if blocked.contains(target) {
                diagnostics.push(
                    Diagnostic::warning(
                        DiagnosticKind::DependsOnCycle,
                        format!("depends on {target}, which is part of a dependency cycle"),
                    )
                    .with_package(package),
                );
            }
        }

        let rule = if android.contains(package) {
            RuleKind::AndroidLibrary
        } else {
            RuleKind::JavaLibrary
        };
        diagnostics.extend(artifact_conflicts(graph, &externals, package));
        let deps = dependency_targets(graph, &externals, package);
        let target_name = package.target_name().to_string();
        let contents = render_build_file(&target_name, rule, &deps);
        files.push(BuildFile {
            package: package.clone(),
            path: package.to_path_buf().join(options.build_file_name),
            target_name,
            rule,
            deps,
            contents,
        });
    }
    (files, diagnostics)
}
