//! End-to-end generation run.

use std::path::PathBuf;
use std::time::Instant;

use tracing::{info, warn};

use crate::config::GeneratorConfig;
use crate::diagnostics::{Diagnostic, DiagnosticKind, ExitStatus, RunReport};
use crate::emit::android::write_android_modules;
use crate::emit::buck::{plan_build_files, EmitOptions};
use crate::emit::buckconfig::write_buckconfig_if_absent;
use crate::emit::writer::write_build_files;
use crate::errors::{GeneratorError, GeneratorResult};
use crate::graph::aggregate::aggregate;
use crate::graph::cycles::{blocked_packages, detect_cycles};
use crate::graph::manifest::ExternalManifest;
use crate::indexer::filesystem::{
    discover_source_roots, find_android_modules, find_gradle_files, scan_source_roots,
};
use crate::indexer::pipeline::parallel_extract;
use crate::indexer::source_index::SourceIndex;

fn source_roots(config: &GeneratorConfig) -> GeneratorResult<Vec<PathBuf>> {
    if !config.source_roots.is_empty() {
        return Ok(config.source_roots.clone());
    }
    let discovered = discover_source_roots(&config.project_root);
    if discovered.is_empty() {
        return Err(GeneratorError::Config(format!(
            "no source roots given and none found under {} (expected <module>/src/main/java next to a build.gradle)",
            config.project_root.display()
        )));
    }
    Ok(discovered)
}

/// Generate build files for every package under `config.project_root`.
///
/// Returns `Err` only for run-wide failures, in which case nothing has been
/// written. Per-package problems are reported in the returned [`RunReport`].
pub fn run(config: &GeneratorConfig) -> GeneratorResult<RunReport> {
    let started = Instant::now();
    config.validate()?;
    let roots = source_roots(config)?;
    info!(
        project = %config.project_root.display(),
        roots = roots.len(),
        jobs = config.jobs,
        "starting generation"
    );

    let scan = scan_source_roots(&config.project_root, &roots)?;
    info!(
        files = scan.files.len(),
        packages = scan.package_count(),
        "scanned source roots"
    );

    let results = parallel_extract(&config.project_root, &scan.files, config.jobs);
    let (index, index_diagnostics) = SourceIndex::build(&results)?;

    let manifest = match &config.manifest {
        Some(path) => ExternalManifest::load(&config.resolve(path))?,
        None => ExternalManifest::empty(),
    };

    let mut report = RunReport {
        packages_indexed: index.package_count(),
        files_indexed: index.file_count(),
        ..RunReport::default()
    };
    report.extend(index_diagnostics);

    let graph = aggregate(&index, &results, &manifest, &config.platform_prefixes);
    report.extend(graph.unresolved.iter().map(|u| {
        Diagnostic::warning(
            DiagnosticKind::Unresolved,
            format!("unresolved reference {} at line {}", u.symbol, u.line),
        )
        .with_package(&u.package)
        .with_file(&u.file)
        .with_symbol(u.symbol.clone())
    }));

    let cycles = detect_cycles(&graph, &index);
    for violation in &cycles {
        let mut diagnostic =
            Diagnostic::error(DiagnosticKind::CyclicDependency, violation.describe());
        if let Some(first) = violation.packages.first() {
            diagnostic = diagnostic.with_package(first);
        }
        report.push(diagnostic);
    }
    let blocked = blocked_packages(&cycles);
    report.cycles = cycles;

    let options = EmitOptions {
        build_file_name: &config.build_file_name,
        third_party_path: &config.third_party_path,
    };
    let (build_files, plan_diagnostics) = plan_build_files(&graph, &blocked, &options);
    report.extend(plan_diagnostics);

    if config.dry_run {
        info!(planned = build_files.len(), "dry run, nothing written");
    } else {
        for outcome in write_build_files(&config.project_root, &build_files, config.jobs) {
            match outcome.diagnostic() {
                Some(diagnostic) => report.push(diagnostic),
                None => report.written.push(outcome.path),
            }
        }
    }
    report.build_files = build_files;

    if !config.dry_run {
        let modules = find_android_modules(&config.project_root);
        let (written, diagnostics) =
            write_android_modules(&config.project_root, &modules, &config.build_file_name);
        report.android_modules = written;
        report.extend(diagnostics);
    }

    if config.write_buckconfig && !config.dry_run {
        let gradle_files = find_gradle_files(&config.project_root);
        match write_buckconfig_if_absent(&config.project_root, &roots, &gradle_files) {
            Ok(path) => report.buckconfig = path,
            Err(e) => {
                warn!("could not write .buckconfig: {e}");
                report.push(Diagnostic::error(DiagnosticKind::WriteFailure, e.to_string()));
            }
        }
    }

    report.elapsed_ms = started.elapsed().as_millis() as u64;
    info!(
        planned = report.build_files.len(),
        written = report.written.len(),
        blocked = blocked.len(),
        cycles = report.cycles.len(),
        unresolved = report.count(DiagnosticKind::Unresolved),
        elapsed_ms = report.elapsed_ms,
        "generation finished"
    );
    Ok(report)
}

/// Exit status for the outcome of [`run`]. Any `Err` is fatal.
pub fn exit_status_of(outcome: &GeneratorResult<RunReport>) -> ExitStatus {
    match outcome {
        Ok(report) => report.exit_status(),
        Err(_) => ExitStatus::Fatal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    const ROOT: &str = "src/main/java";

    fn write_source(root: &Path, rel: &str, contents: &str) {
        let path = root.join(ROOT).join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    fn buck(root: &Path, package: &str) -> Option<String> {
        std::fs::read_to_string(root.join(ROOT).join(package).join("BUCK")).ok()
    }

    fn config(root: &Path) -> GeneratorConfig {
        let mut config = GeneratorConfig::new(root).with_source_root(ROOT);
        config.jobs = 2;
        config
    }

    fn app_and_util(root: &Path) {
        write_source(
            root,
            "com/example/app/App.java",
            "package com.example.app;\n\nimport com.example.util.Util;\n\npublic class App {\n  Util util = new Util();\n}\n",
        );
        write_source(
            root,
            "com/example/util/Util.java",
            "package com.example.util;\n\npublic class Util {}\n",
        );
    }

    #[test]
    fn test_simple_dependency_is_emitted() {
        let dir = TempDir::new().unwrap();
        app_and_util(dir.path());

        let report = run(&config(dir.path())).unwrap();
        assert_eq!(report.exit_status(), ExitStatus::Success);
        assert_eq!(report.packages_indexed, 2);
        assert_eq!(report.written.len(), 2);

        let app = buck(dir.path(), "com/example/app").unwrap();
        assert!(app.contains("  name = 'app',\n"));
        assert!(app.contains("    '//src/main/java/com/example/util:util',\n"));
        let util = buck(dir.path(), "com/example/util").unwrap();
        assert!(util.contains("  deps = [\n  ],\n"));
    }

    #[test]
    fn test_cycle_blocks_members_only() {
        let dir = TempDir::new().unwrap();
        write_source(
            dir.path(),
            "com/example/a/A.java",
            "package com.example.a;\nimport com.example.b.B;\npublic class A { B b; }\n",
        );
        write_source(
            dir.path(),
            "com/example/b/B.java",
            "package com.example.b;\nimport com.example.a.A;\npublic class B { A a; }\n",
        );
        write_source(
            dir.path(),
            "com/example/c/C.java",
            "package com.example.c;\npublic class C {}\n",
        );

        let report = run(&config(dir.path())).unwrap();
        assert_eq!(report.exit_status(), ExitStatus::Partial);
        assert_eq!(report.cycles.len(), 1);
        assert_eq!(report.count(DiagnosticKind::CyclicDependency), 1);
        let cycle = report
            .diagnostics
            .iter()
            .find(|d| d.kind == DiagnosticKind::CyclicDependency)
            .unwrap();
        assert!(cycle
            .message
            .contains("src/main/java/com/example/a -> src/main/java/com/example/b"));
        assert!(buck(dir.path(), "com/example/a").is_none());
        assert!(buck(dir.path(), "com/example/b").is_none());
        assert!(buck(dir.path(), "com/example/c").is_some());
    }

    #[test]
    fn test_duplicate_class_is_fatal() {
        let dir = TempDir::new().unwrap();
        write_source(dir.path(), "one/X.java", "package com.dup;\npublic class X {}\n");
        write_source(dir.path(), "two/X.java", "package com.dup;\npublic class X {}\n");

        let outcome = run(&config(dir.path()));
        assert_eq!(exit_status_of(&outcome), ExitStatus::Fatal);
        assert_eq!(exit_status_of(&outcome).code(), 2);
        let err = outcome.unwrap_err();
        assert!(matches!(err, GeneratorError::DuplicateSymbols(_)));
        assert!(buck(dir.path(), "one").is_none());
        assert!(buck(dir.path(), "two").is_none());

        let report = RunReport::fatal(&err);
        assert_eq!(report.count(DiagnosticKind::DuplicateSymbol), 1);
        assert_eq!(report.diagnostics[0].symbol.as_deref(), Some("com.dup.X"));
    }

    #[test]
    fn test_exit_status_of_outcomes() {
        let dir = TempDir::new().unwrap();
        app_and_util(dir.path());
        let clean = run(&config(dir.path()));
        assert_eq!(exit_status_of(&clean).code(), 0);

        write_source(
            dir.path(),
            "com/example/util/Back.java",
            "package com.example.util;\nimport com.example.app.App;\npublic class Back {}\n",
        );
        let cyclic = run(&config(dir.path()));
        assert_eq!(exit_status_of(&cyclic).code(), 1);

        let missing = run(&config(dir.path()).with_manifest("absent.json"));
        assert_eq!(exit_status_of(&missing).code(), 2);
    }

    #[test]
    fn test_latin1_source_keeps_its_dependencies() {
        let dir = TempDir::new().unwrap();
        app_and_util(dir.path());
        let path = dir.path().join(ROOT).join("com/example/app/Legacy.java");
        std::fs::write(
            path,
            b"package com.example.app;\n// r\xe9sum\xe9 helper\nimport com.example.util.Util;\npublic class Legacy {}\n",
        )
        .unwrap();

        let report = run(&config(dir.path())).unwrap();
        assert_eq!(report.exit_status(), ExitStatus::Success);
        assert_eq!(report.count(DiagnosticKind::ParseError), 0);
        assert_eq!(report.files_indexed, 3);
        let app = buck(dir.path(), "com/example/app").unwrap();
        assert!(app.contains("    '//src/main/java/com/example/util:util',\n"));
    }

    #[test]
    fn test_android_module_gets_build_config() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("build.gradle"), "").unwrap();
        write_source(
            dir.path(),
            "com/example/ui/Main.java",
            "package com.example.ui;\nimport android.app.Activity;\npublic class Main extends Activity {}\n",
        );
        std::fs::write(
            dir.path().join("src/main/AndroidManifest.xml"),
            "<manifest package=\"com.example.ui\"/>\n",
        )
        .unwrap();
        std::fs::create_dir_all(dir.path().join("src/main/res/layout")).unwrap();

        let report = run(&GeneratorConfig::new(dir.path())).unwrap();
        assert_eq!(report.android_modules, vec![PathBuf::from("src/main/BUCK")]);
        let module = std::fs::read_to_string(dir.path().join("src/main/BUCK")).unwrap();
        assert!(module.contains("  package = 'com.example.ui',\n"));
        assert!(module.contains("android_resource(\n"));
        let ui = buck(dir.path(), "com/example/ui").unwrap();
        assert!(ui.starts_with("android_library(\n"));
    }

    #[test]
    fn test_manifest_and_unresolved_references() {
        let dir = TempDir::new().unwrap();
        write_source(
            dir.path(),
            "com/example/app/App.java",
            "package com.example.app;\nimport com.ext.Foo;\nimport com.ext.Bar;\nimport java.util.List;\npublic class App {}\n",
        );
        std::fs::write(dir.path().join("deps.json"), r#"{ "com.ext.Foo": "com.ext:lib:1.0" }"#).unwrap();

        let report = run(&config(dir.path()).with_manifest("deps.json")).unwrap();
        assert_eq!(report.exit_status(), ExitStatus::Success);
        assert_eq!(report.count(DiagnosticKind::Unresolved), 1);
        let unresolved = report
            .diagnostics
            .iter()
            .find(|d| d.kind == DiagnosticKind::Unresolved)
            .unwrap();
        assert_eq!(unresolved.symbol.as_deref(), Some("com.ext.Bar"));

        let app = buck(dir.path(), "com/example/app").unwrap();
        assert!(app.contains("    '//libs:lib',\n"));
        assert!(!app.contains("//src"));
    }

    #[test]
    fn test_missing_manifest_is_fatal() {
        let dir = TempDir::new().unwrap();
        app_and_util(dir.path());
        let err = run(&config(dir.path()).with_manifest("nope.json")).unwrap_err();
        assert!(matches!(err, GeneratorError::Io { .. }));
        assert!(buck(dir.path(), "com/example/app").is_none());
    }

    #[test]
    fn test_runs_are_byte_identical() {
        let dir = TempDir::new().unwrap();
        app_and_util(dir.path());
        write_source(
            dir.path(),
            "com/example/app/Main.java",
            "package com.example.app;\nimport com.example.util.*;\npublic class Main {}\n",
        );

        run(&config(dir.path())).unwrap();
        let first = buck(dir.path(), "com/example/app").unwrap();
        let mut single = config(dir.path());
        single.jobs = 1;
        run(&single).unwrap();
        assert_eq!(first, buck(dir.path(), "com/example/app").unwrap());
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let dir = TempDir::new().unwrap();
        app_and_util(dir.path());
        let mut config = config(dir.path());
        config.dry_run = true;

        let report = run(&config).unwrap();
        assert_eq!(report.build_files.len(), 2);
        assert!(report.written.is_empty());
        assert!(buck(dir.path(), "com/example/app").is_none());
    }

    #[test]
    fn test_discovers_roots_and_writes_buckconfig() {
        let dir = TempDir::new().unwrap();
        app_and_util(dir.path());
        std::fs::write(
            dir.path().join("build.gradle"),
            "repositories {\n    mavenCentral()\n}\n",
        )
        .unwrap();
        let mut config = GeneratorConfig::new(dir.path());
        config.write_buckconfig = true;

        let report = run(&config).unwrap();
        assert_eq!(report.written.len(), 2);
        let buckconfig = std::fs::read_to_string(report.buckconfig.unwrap()).unwrap();
        assert!(buckconfig.contains("src_roots = /src/main/java"));
        assert!(buckconfig.contains("https://repo1.maven.org/maven2"));
    }

    #[test]
    fn test_no_roots_is_config_error() {
        let dir = TempDir::new().unwrap();
        let err = run(&GeneratorConfig::new(dir.path())).unwrap_err();
        assert!(matches!(err, GeneratorError::Config(_)));
    }
}
