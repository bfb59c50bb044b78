//! tree-sitter wrapper for Java sources.

use tree_sitter::{Parser, Tree};

use crate::errors::{GeneratorError, GeneratorResult};

/// Build a parser configured for Java.
pub fn java_parser() -> GeneratorResult<Parser> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_java::LANGUAGE.into())
        .map_err(|e| GeneratorError::Parse(format!("Failed to set language: {e}")))?;
    Ok(parser)
}

/// Parse Java source. Syntax errors are tolerated; callers can inspect
/// `tree.root_node().has_error()`.
pub fn parse_java(parser: &mut Parser, source: &str) -> GeneratorResult<Tree> {
    parser
        .parse(source.as_bytes(), None)
        .ok_or_else(|| GeneratorError::Parse("tree-sitter returned no tree".to_string()))
}
