//! Cycle detection over internal package edges (Tarjan's SCC algorithm).

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::Serialize;

use crate::indexer::source_index::SourceIndex;
use crate::models::{DependencyGraph, EdgeTarget, PackagePath};

/// Evidence entries shown per edge in a cycle message.
const MESSAGE_EVIDENCE_PER_EDGE: usize = 1;

/// One reference that contributes to a cycle edge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CycleEvidence {
    /// File in the source package that makes the reference.
    pub file: PathBuf,
    pub symbol: String,
    /// File in the target package that declares `symbol`, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declared_in: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CycleEdge {
    pub from: PackagePath,
    pub to: PackagePath,
    pub evidence: Vec<CycleEvidence>,
}

/// A strongly connected set of packages.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CycleViolation {
    /// Sorted.
    pub packages: Vec<PackagePath>,
    pub edges: Vec<CycleEdge>,
}

impl CycleViolation {
    pub fn contains(&self, package: &PackagePath) -> bool {
        self.packages.binary_search(package).is_ok()
    }

    /// Human-readable summary naming each edge and its first evidence.
    pub fn describe(&self) -> String {
        let packages = self
            .packages
            .iter()
            .map(PackagePath::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        let edges = self
            .edges
            .iter()
            .map(|edge| {
                let evidence = edge
                    .evidence
                    .iter()
                    .take(MESSAGE_EVIDENCE_PER_EDGE)
                    .map(|e| match &e.declared_in {
                        Some(declared) => format!(
                            "{} uses {} from {}",
                            e.file.display(),
                            e.symbol,
                            declared.display()
                        ),
                        None => format!("{} uses {}", e.file.display(), e.symbol),
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{} -> {} ({evidence})", edge.from, edge.to)
            })
            .collect::<Vec<_>>()
            .join("; ");
        format!("cyclic dependency between {{{packages}}}: {edges}")
    }
}

/// Tarjan's algorithm, iterative. Returns every component in discovery order.
fn strongly_connected_components(adjacency: &[Vec<usize>]) -> Vec<Vec<usize>> {
    const UNVISITED: usize = usize::MAX;
    let n = adjacency.len();
    let mut index = vec![UNVISITED; n];
    let mut lowlink = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<usize> = Vec::new();
    let mut next_index = 0usize;
    let mut components = Vec::new();

    for start in 0..n {
        if index[start] != UNVISITED {
            continue;
        }
        // (node, next neighbour position)
        let mut frames: Vec<(usize, usize)> = vec![(start, 0)];
        index[start] = next_index;
        lowlink[start] = next_index;
        next_index += 1;
        stack.push(start);
        on_stack[start] = true;

        while let Some(frame) = frames.last_mut() {
            let v = frame.0;
            if frame.1 < adjacency[v].len() {
                let w = adjacency[v][frame.1];
                frame.1 += 1;
                if index[w] == UNVISITED {
                    index[w] = next_index;
                    lowlink[w] = next_index;
                    next_index += 1;
                    stack.push(w);
                    on_stack[w] = true;
                    frames.push((w, 0));
                } else if on_stack[w] {
                    lowlink[v] = lowlink[v].min(index[w]);
                }
                continue;
            }

            frames.pop();
            if let Some(&(parent, _)) = frames.last() {
                lowlink[parent] = lowlink[parent].min(lowlink[v]);
            }
            if lowlink[v] == index[v] {
                let mut component = Vec::new();
                while let Some(w) = stack.pop() {
                    on_stack[w] = false;
                    component.push(w);
                    if w == v {
                        break;
                    }
                }
                components.push(component);
            }
        }
    }
    components
}

/// Find every cycle among internal edges.
///
/// A component with more than one package is a cycle, as is a package with
/// an edge to itself. Violations are ordered by their first package.
pub fn detect_cycles(graph: &DependencyGraph, index: &SourceIndex) -> Vec<CycleViolation> {
    let nodes: Vec<&PackagePath> = graph.packages.iter().collect();
    let position: BTreeMap<&PackagePath, usize> =
        nodes.iter().enumerate().map(|(i, p)| (*p, i)).collect();
    let adjacency: Vec<Vec<usize>> = nodes
        .iter()
        .map(|package| {
            graph
                .internal_targets(package)
                .filter_map(|target| position.get(target).copied())
                .collect()
        })
        .collect();

    let mut violations: Vec<CycleViolation> = strongly_connected_components(&adjacency)
        .into_iter()
        .filter(|component| {
            component.len() > 1 || adjacency[component[0]].contains(&component[0])
        })
        .map(|component| {
            let members: BTreeSet<&PackagePath> = component.iter().map(|&i| nodes[i]).collect();
            build_violation(graph, index, &members)
        })
        .collect();
    violations.sort_by(|a, b| a.packages.cmp(&b.packages));
    violations
}

fn build_violation(
    graph: &DependencyGraph,
    index: &SourceIndex,
    members: &BTreeSet<&PackagePath>,
) -> CycleViolation {
    let mut edges = Vec::new();
    for from in members {
        for to in graph.internal_targets(from) {
            if !members.contains(to) {
                continue;
            }
            let evidence = graph
                .provenance(from, &EdgeTarget::Internal(to.clone()))
                .into_iter()
                .flatten()
                .map(|p| CycleEvidence {
                    file: p.file.clone(),
                    symbol: p.symbol.clone(),
                    declared_in: declaring_file(index, &p.symbol, to),
                })
                .collect();
            edges.push(CycleEdge {
                from: (*from).clone(),
                to: to.clone(),
                evidence,
            });
        }
    }
    CycleViolation {
        packages: members.iter().map(|p| (*p).clone()).collect(),
        edges,
    }
}

/// File in `target` that answers for `symbol`.
///
/// Wildcard symbols (`b.*`) name no class, so any file of the target package
/// stands in for them.
fn declaring_file(index: &SourceIndex, symbol: &str, target: &PackagePath) -> Option<PathBuf> {
    index
        .resolve_class(symbol)
        .filter(|class| &class.package == target)
        .map(|class| class.file.clone())
        .or_else(|| {
            index
                .package(target)
                .and_then(|package| package.files.iter().next().cloned())
        })
}

/// Packages that must not be emitted.
pub fn blocked_packages(violations: &[CycleViolation]) -> BTreeSet<PackagePath> {
    violations
        .iter()
        .flat_map(|v| v.packages.iter().cloned())
        .collect()
}
