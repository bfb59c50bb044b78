//! Parallel extraction over scanned files with Rayon.

use std::path::Path;

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::indexer::filesystem::ScannedFile;
use crate::indexer::parser::java_parser;
use crate::indexer::symbols::{extract_java_with, ExtractedSource};

/// Outcome of extracting a single file.
#[derive(Clone, Debug)]
pub struct ExtractionResult {
    pub file: ScannedFile,
    /// `None` when the file could not be read or parsed.
    pub source: Option<ExtractedSource>,
    pub error_message: Option<String>,
}

impl ExtractionResult {
    fn failed(file: &ScannedFile, message: String) -> Self {
        ExtractionResult {
            file: file.clone(),
            source: None,
            error_message: Some(message),
        }
    }
}

fn extract_file_worker(
    project_root: &Path,
    parser: &mut Option<tree_sitter::Parser>,
    file: &ScannedFile,
) -> ExtractionResult {
    let absolute = project_root.join(&file.path);
    let bytes = match std::fs::read(&absolute) {
        Ok(bytes) => bytes,
        Err(e) => return ExtractionResult::failed(file, format!("read failed: {e}")),
    };
    // Latin-1 bytes in comments or literals are replaced, not rejected.
    let text = String::from_utf8_lossy(&bytes);
    let Some(parser) = parser.as_mut() else {
        return ExtractionResult::failed(file, "Java parser unavailable".to_string());
    };
    match extract_java_with(parser, &text, &file.path) {
        Ok(source) => {
            if source.has_syntax_errors {
                debug!(file = %file.path.display(), "syntax errors, extraction is best-effort");
            }
            ExtractionResult {
                file: file.clone(),
                source: Some(source),
                error_message: None,
            }
        }
        Err(e) => ExtractionResult::failed(file, e.to_string()),
    }
}

fn new_parser() -> Option<tree_sitter::Parser> {
    match java_parser() {
        Ok(parser) => Some(parser),
        Err(e) => {
            warn!("failed to create Java parser: {e}");
            None
        }
    }
}

/// Read and extract every file, `workers` at a time.
///
/// Results are returned sorted by path regardless of completion order.
pub fn parallel_extract(
    project_root: &Path,
    files: &[ScannedFile],
    workers: usize,
) -> Vec<ExtractionResult> {
    if files.is_empty() {
        return vec![];
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build();

    let mut results: Vec<ExtractionResult> = match pool {
        Ok(pool) => pool.install(|| {
            files
                .par_iter()
                .map_init(new_parser, |parser, file| {
                    extract_file_worker(project_root, parser, file)
                })
                .collect()
        }),
        Err(_) => {
            // Fallback to sequential
            let mut parser = new_parser();
            files
                .iter()
                .map(|file| extract_file_worker(project_root, &mut parser, file))
                .collect()
        }
    };
    results.sort_by(|a, b| a.file.path.cmp(&b.file.path));
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PackagePath;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn scanned(path: &str) -> ScannedFile {
        let path = PathBuf::from(path);
        let dir = path.parent().unwrap().to_path_buf();
        ScannedFile {
            package: PackagePath::from_relative(&dir),
            path,
            source_root: PathBuf::from("src"),
            conventional_package: "p".to_string(),
        }
    }

    #[test]
    fn test_parallel_extract_sorted_and_reports_missing() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("src/p")).unwrap();
        for name in ["C", "A", "B"] {
            std::fs::write(
                dir.path().join(format!("src/p/{name}.java")),
                format!("package p;\nimport q.Dep{name};\nclass {name} {{}}\n"),
            )
            .unwrap();
        }
        let files = vec![
            scanned("src/p/C.java"),
            scanned("src/p/Missing.java"),
            scanned("src/p/A.java"),
            scanned("src/p/B.java"),
        ];

        let results = parallel_extract(dir.path(), &files, 2);
        let paths: Vec<_> = results
            .iter()
            .map(|r| r.file.path.to_string_lossy().to_string())
            .collect();
        assert_eq!(
            paths,
            vec!["src/p/A.java", "src/p/B.java", "src/p/C.java", "src/p/Missing.java"]
        );
        let missing = &results[3];
        assert!(missing.source.is_none());
        assert!(missing.error_message.as_deref().unwrap().contains("read failed"));
        let a = results[0].source.as_ref().unwrap();
        assert_eq!(a.references[0].name, "q.DepA");
    }

    #[test]
    fn test_parallel_extract_tolerates_non_utf8_bytes() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("src/p")).unwrap();
        std::fs::write(
            dir.path().join("src/p/A.java"),
            b"package p;\n// caf\xe9\nimport q.Dep;\nclass A {}\n",
        )
        .unwrap();

        let results = parallel_extract(dir.path(), &[scanned("src/p/A.java")], 1);
        assert_eq!(results.len(), 1);
        assert!(results[0].error_message.is_none());
        let source = results[0].source.as_ref().unwrap();
        assert_eq!(source.declared_package.as_deref(), Some("p"));
        assert_eq!(source.references[0].name, "q.Dep");
        assert_eq!(source.declared_types[0].name, "A");
    }

    #[test]
    fn test_parallel_extract_empty() {
        let dir = TempDir::new().unwrap();
        assert!(parallel_extract(dir.path(), &[], 4).is_empty());
    }
}
