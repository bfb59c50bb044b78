//! Project-wide index of packages, files and declared classes.
//!
//! Built once from the scan and extraction results, then only read. Later
//! stages receive it by reference.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use tracing::info;

use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::errors::{DuplicateSymbol, GeneratorError, GeneratorResult};
use crate::indexer::pipeline::ExtractionResult;
use crate::models::{PackagePath, SourceFile, SourcePackage};

/// Owner of a fully-qualified class name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassSymbol {
    pub name: String,
    pub package: PackagePath,
    pub file: PathBuf,
}

#[derive(Clone, Debug, Default)]
pub struct SourceIndex {
    packages: BTreeMap<PackagePath, SourcePackage>,
    files: BTreeMap<PathBuf, SourceFile>,
    classes: BTreeMap<String, ClassSymbol>,
    by_java_package: BTreeMap<String, BTreeSet<PackagePath>>,
}

impl SourceIndex {
    /// Index every extracted file.
    ///
    /// Fails with [`GeneratorError::DuplicateSymbols`] when one class name is
    /// declared by files in two different packages. Non-fatal findings are
    /// returned alongside the index.
    pub fn build(results: &[ExtractionResult]) -> GeneratorResult<(SourceIndex, Vec<Diagnostic>)> {
        let mut index = SourceIndex::default();
        let mut diagnostics = Vec::new();
        let mut duplicates = Vec::new();

        for result in results {
            let scanned = &result.file;
            let declared_package = result
                .source
                .as_ref()
                .and_then(|s| s.declared_package.clone());
            let java_package = declared_package
                .clone()
                .unwrap_or_else(|| scanned.conventional_package.clone());

            if let Some(declared) = &declared_package {
                if *declared != scanned.conventional_package {
                    diagnostics.push(
                        Diagnostic::warning(
                            DiagnosticKind::PackageMismatch,
                            format!(
                                "declares package {declared} but its directory implies {}",
                                display_package(&scanned.conventional_package)
                            ),
                        )
                        .with_package(&scanned.package)
                        .with_file(&scanned.path),
                    );
                }
            }

            let package = index
                .packages
                .entry(scanned.package.clone())
                .or_insert_with(|| SourcePackage {
                    path: scanned.package.clone(),
                    source_root: scanned.source_root.clone(),
                    files: BTreeSet::new(),
                    declared_name: java_package.clone(),
                });
            package.files.insert(scanned.path.clone());
            index
                .by_java_package
                .entry(java_package.clone())
                .or_default()
                .insert(scanned.package.clone());
            index.files.insert(
                scanned.path.clone(),
                SourceFile {
                    path: scanned.path.clone(),
                    package: scanned.package.clone(),
                },
            );

            if let Some(message) = &result.error_message {
                diagnostics.push(
                    Diagnostic::warning(DiagnosticKind::ParseError, message.clone())
                        .with_package(&scanned.package)
                        .with_file(&scanned.path),
                );
            }

            let Some(source) = &result.source else {
                continue;
            };
            for declared in &source.declared_types {
                let class_name = qualify(&java_package, &declared.name);
                match index.classes.get(&class_name) {
                    Some(existing) if existing.package != scanned.package => {
                        duplicates.push(DuplicateSymbol {
                            class_name,
                            first: existing.file.clone(),
                            second: scanned.path.clone(),
                        });
                    }
                    Some(existing) => {
                        if existing.file != scanned.path {
                            diagnostics.push(
                                Diagnostic::warning(
                                    DiagnosticKind::DuplicateClass,
                                    format!(
                                        "{class_name} is also declared in {}",
                                        existing.file.display()
                                    ),
                                )
                                .with_package(&scanned.package)
                                .with_file(&scanned.path)
                                .with_symbol(class_name.clone()),
                            );
                        }
                    }
                    None => {
                        index.classes.insert(
                            class_name.clone(),
                            ClassSymbol {
                                name: class_name,
                                package: scanned.package.clone(),
                                file: scanned.path.clone(),
                            },
                        );
                    }
                }
            }
        }

        if !duplicates.is_empty() {
            return Err(GeneratorError::DuplicateSymbols(duplicates));
        }

        info!(
            packages = index.packages.len(),
            files = index.files.len(),
            classes = index.classes.len(),
            "source index built"
        );
        Ok((index, diagnostics))
    }

    pub fn packages(&self) -> impl Iterator<Item = &SourcePackage> {
        self.packages.values()
    }

    pub fn package(&self, path: &PackagePath) -> Option<&SourcePackage> {
        self.packages.get(path)
    }

    pub fn package_count(&self) -> usize {
        self.packages.len()
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn class(&self, class_name: &str) -> Option<&ClassSymbol> {
        self.classes.get(class_name)
    }

    /// Longest known class that `name` starts with, stripping trailing
    /// segments (`a.b.Outer.Inner.CONST` → `a.b.Outer`).
    pub fn resolve_class(&self, name: &str) -> Option<&ClassSymbol> {
        let mut candidate = name;
        loop {
            if let Some(symbol) = self.classes.get(candidate) {
                return Some(symbol);
            }
            match candidate.rfind('.') {
                Some(pos) => candidate = &candidate[..pos],
                None => return None,
            }
        }
    }

    /// Source packages whose Java package name is `java_package`.
    ///
    /// More than one when a package is split across modules.
    pub fn packages_named(&self, java_package: &str) -> impl Iterator<Item = &PackagePath> {
        self.by_java_package
            .get(java_package)
            .into_iter()
            .flat_map(|paths| paths.iter())
    }

    /// First segments of every indexed Java package (`com`, `org`, ...).
    pub fn package_roots(&self) -> BTreeSet<&str> {
        self.by_java_package
            .keys()
            .filter_map(|name| name.split('.').next())
            .filter(|root| !root.is_empty())
            .collect()
    }
}

fn qualify(java_package: &str, type_name: &str) -> String {
    if java_package.is_empty() {
        type_name.to_string()
    } else {
        format!("{java_package}.{type_name}")
    }
}

fn display_package(name: &str) -> &str {
    if name.is_empty() {
        "the default package"
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::filesystem::ScannedFile;
    use crate::indexer::symbols::extract_java;

    fn result(path: &str, conventional: &str, source: &str) -> ExtractionResult {
        let path = PathBuf::from(path);
        let dir = path.parent().unwrap().to_path_buf();
        ExtractionResult {
            source: Some(extract_java(source, &path).unwrap()),
            file: ScannedFile {
                package: PackagePath::from_relative(&dir),
                path,
                source_root: PathBuf::from("src"),
                conventional_package: conventional.to_string(),
            },
            error_message: None,
        }
    }

    #[test]
    fn test_build_maps_classes_to_packages() {
        let results = vec![
            result("src/app/App.java", "app", "package app;\nclass App {}\n"),
            result(
                "src/util/Helper.java",
                "util",
                "package util;\nclass Helper {}\nclass Extra {}\n",
            ),
        ];
        let (index, diagnostics) = SourceIndex::build(&results).unwrap();
        assert!(diagnostics.is_empty());
        assert_eq!(index.package_count(), 2);
        assert_eq!(index.file_count(), 2);
        assert_eq!(
            index.class("util.Extra").map(|c| c.package.as_str()),
            Some("src/util")
        );
        assert_eq!(
            index.resolve_class("util.Helper.Inner.VALUE").map(|c| c.name.as_str()),
            Some("util.Helper")
        );
        assert!(index.resolve_class("util").is_none());
        assert_eq!(index.package_roots().into_iter().collect::<Vec<_>>(), vec!["app", "util"]);
    }

    #[test]
    fn test_duplicate_symbol_across_packages_is_fatal() {
        let results = vec![
            result("a/src/com/x/Foo.java", "com.x", "package com.x;\nclass Foo {}\n"),
            result("b/src/com/x/Foo.java", "com.x", "package com.x;\nclass Foo {}\n"),
        ];
        match SourceIndex::build(&results) {
            Err(GeneratorError::DuplicateSymbols(duplicates)) => {
                assert_eq!(duplicates.len(), 1);
                assert_eq!(duplicates[0].class_name, "com.x.Foo");
                assert_eq!(duplicates[0].first, PathBuf::from("a/src/com/x/Foo.java"));
                assert_eq!(duplicates[0].second, PathBuf::from("b/src/com/x/Foo.java"));
            }
            other => panic!("expected duplicate symbol error, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_within_package_is_warning() {
        let results = vec![
            result("src/p/A.java", "p", "package p;\nclass A {}\nclass Shared {}\n"),
            result("src/p/B.java", "p", "package p;\nclass Shared {}\n"),
        ];
        let (index, diagnostics) = SourceIndex::build(&results).unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::DuplicateClass);
        assert_eq!(
            index.class("p.Shared").map(|c| c.file.clone()),
            Some(PathBuf::from("src/p/A.java"))
        );
    }

    #[test]
    fn test_package_mismatch_indexes_declared_package() {
        let results = vec![result(
            "src/wrong/Thing.java",
            "wrong",
            "package right;\nclass Thing {}\n",
        )];
        let (index, diagnostics) = SourceIndex::build(&results).unwrap();
        assert_eq!(diagnostics[0].kind, DiagnosticKind::PackageMismatch);
        assert!(index.class("right.Thing").is_some());
        assert!(index.class("wrong.Thing").is_none());
        assert_eq!(
            index.packages_named("right").map(|p| p.as_str()).collect::<Vec<_>>(),
            vec!["src/wrong"]
        );
    }

    #[test]
    fn test_unreadable_file_recorded_as_parse_error() {
        let mut failed = result("src/p/A.java", "p", "package p;\nclass A {}\n");
        failed.source = None;
        failed.error_message = Some("read failed: denied".to_string());
        let (index, diagnostics) = SourceIndex::build(&[failed]).unwrap();
        assert_eq!(diagnostics[0].kind, DiagnosticKind::ParseError);
        assert!(index.class("p.A").is_none());
        assert_eq!(index.file_count(), 1);
    }
}
