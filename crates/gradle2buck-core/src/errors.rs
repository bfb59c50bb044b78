//! Error types for the generator.

use std::fmt;
use std::path::PathBuf;

/// Two packages claiming the same fully-qualified class name.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct DuplicateSymbol {
    pub class_name: String,
    pub first: PathBuf,
    pub second: PathBuf,
}

impl fmt::Display for DuplicateSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} is declared in both {} and {}",
            self.class_name,
            self.first.display(),
            self.second.display()
        )
    }
}

/// Top-level error enum for run-wide failures.
///
/// Per-file and per-package problems are not errors; they travel as
/// [`crate::diagnostics::Diagnostic`] values in the run report.
#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Manifest error in {}: {message}", .path.display())]
    Manifest { path: PathBuf, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("{} duplicate class declaration(s): {}", .0.len(), join_duplicates(.0))]
    DuplicateSymbols(Vec<DuplicateSymbol>),
}

impl GeneratorError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GeneratorError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn manifest(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        GeneratorError::Manifest {
            path: path.into(),
            message: message.into(),
        }
    }
}

fn join_duplicates(duplicates: &[DuplicateSymbol]) -> String {
    duplicates
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type GeneratorResult<T> = Result<T, GeneratorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_symbols_message_names_both_files() {
        let err = GeneratorError::DuplicateSymbols(vec![DuplicateSymbol {
            class_name: "com.example.Foo".to_string(),
            first: PathBuf::from("a/src/main/java/com/example/Foo.java"),
            second: PathBuf::from("b/src/main/java/com/example/Foo.java"),
        }]);
        let message = err.to_string();
        assert!(message.starts_with("1 duplicate class declaration(s)"));
        assert!(message.contains("a/src/main/java/com/example/Foo.java"));
        assert!(message.contains("b/src/main/java/com/example/Foo.java"));
    }

    #[test]
    fn test_manifest_error_includes_path() {
        let err = GeneratorError::manifest("deps.json", "bad coordinate");
        assert_eq!(err.to_string(), "Manifest error in deps.json: bad coordinate");
    }
}
