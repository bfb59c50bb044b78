//! Declaration and reference extraction from Java source.
//!
//! Extraction is purely syntactic. The tree-sitter tree gives us package and
//! import declarations, top-level type declarations, and dotted chains that
//! look like fully-qualified class references (`com.ext.Foo`, `new
//! com.ext.Foo()`, `@com.ext.Ann`, `com.ext.Util.call()`). Comments and
//! string literals never produce references. Which chains are real
//! dependencies is decided later, during aggregation.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tree_sitter::{Node, Parser};

use crate::errors::GeneratorResult;
use crate::indexer::parser::{java_parser, parse_java};

// ---------------------------------------------------------------------------
// Extracted types
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    /// `import a.b.C;`
    Import,
    /// `import static a.b.C.member;` or `import static a.b.C.*;`
    StaticImport,
    /// `import a.b.*;`: the name is the package (or enclosing class).
    Wildcard,
    /// A fully-qualified chain used in code.
    Inline,
}

/// A name the file refers to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExtractedReference {
    pub name: String,
    pub kind: ReferenceKind,
    /// 1-based line of the first occurrence.
    pub line: usize,
}

/// A top-level type declared by the file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DeclaredType {
    pub name: String,
    pub line: usize,
}

/// Everything extracted from a single source file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ExtractedSource {
    pub path: PathBuf,
    pub declared_package: Option<String>,
    pub declared_types: Vec<DeclaredType>,
    pub references: Vec<ExtractedReference>,
    pub has_syntax_errors: bool,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

static DOTTED_CHAIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*(?:\.[A-Za-z_$][A-Za-z0-9_$]*)+$").unwrap()
});

const TYPE_DECLARATIONS: &[&str] = &[
    "class_declaration",
    "interface_declaration",
    "enum_declaration",
    "record_declaration",
    "annotation_type_declaration",
];

const CHAIN_NODES: &[&str] = &["scoped_type_identifier", "scoped_identifier", "field_access"];

fn starts_uppercase(segment: &str) -> bool {
    segment.chars().next().is_some_and(|c| c.is_uppercase())
}

fn starts_lowercase(segment: &str) -> bool {
    segment.chars().next().is_some_and(|c| c.is_lowercase())
}

fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// The class a dotted name most likely refers to: everything up to and
/// including the first segment that starts with an uppercase letter.
///
/// `com.ext.Foo.BAR` → `com.ext.Foo`. Names without such a segment are
/// returned unchanged.
pub fn class_guess(name: &str) -> &str {
    let mut end = 0;
    for segment in name.split('.') {
        end += segment.len();
        if starts_uppercase(segment) {
            return &name[..end];
        }
        end += 1;
    }
    name
}

/// Accept a chain as a possible qualified class reference: it starts with a
/// package-like lowercase segment and contains a type-like segment.
fn qualified_chain(text: &str) -> Option<String> {
    let compact = strip_whitespace(text);
    if !DOTTED_CHAIN_RE.is_match(&compact) {
        return None;
    }
    let mut segments = compact.split('.');
    let first = segments.next()?;
    if !starts_lowercase(first) || first == "this" || first == "super" {
        return None;
    }
    if !segments.any(starts_uppercase) {
        return None;
    }
    Some(compact)
}

fn line_of(node: Node<'_>) -> usize {
    node.start_position().row + 1
}

fn node_text<'s>(node: Node<'_>, source: &'s [u8]) -> Option<&'s str> {
    node.utf8_text(source).ok()
}

fn name_child<'t>(node: Node<'t>) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let found = node
        .named_children(&mut cursor)
        .find(|child| matches!(child.kind(), "scoped_identifier" | "identifier"));
    found
}

struct ReferenceSet {
    seen: HashSet<(ReferenceKind, String)>,
    references: Vec<ExtractedReference>,
}

impl ReferenceSet {
    fn new() -> Self {
        ReferenceSet {
            seen: HashSet::new(),
            references: Vec::new(),
        }
    }

    fn push(&mut self, kind: ReferenceKind, name: String, line: usize) {
        if name.is_empty() || !self.seen.insert((kind, name.clone())) {
            return;
        }
        self.references.push(ExtractedReference { name, kind, line });
    }
}

// ---------------------------------------------------------------------------
// Java extraction
// ---------------------------------------------------------------------------

fn import_reference(node: Node<'_>, source: &[u8]) -> Option<(ReferenceKind, String)> {
    let mut cursor = node.walk();
    let mut is_static = false;
    let mut is_wildcard = false;
    for child in node.children(&mut cursor) {
        match child.kind() {
            "static" => is_static = true,
            "asterisk" => is_wildcard = true,
            _ => {}
        }
    }
    let name = strip_whitespace(node_text(name_child(node)?, source)?);
    let kind = match (is_static, is_wildcard) {
        (true, _) => ReferenceKind::StaticImport,
        (false, true) => ReferenceKind::Wildcard,
        (false, false) => ReferenceKind::Import,
    };
    Some((kind, name))
}

fn collect_inline_references(root: Node<'_>, source: &[u8], references: &mut ReferenceSet) {
    let mut cursor = root.walk();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        let kind = node.kind();
        if kind == "package_declaration" || kind == "import_declaration" {
            continue;
        }
        if CHAIN_NODES.contains(&kind) {
            if let Some(chain) = node_text(node, source).and_then(qualified_chain) {
                references.push(ReferenceKind::Inline, chain, line_of(node));
                continue;
            }
        }
        let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
}

/// Extract declarations and references using an existing parser.
pub fn extract_java_with(
    parser: &mut Parser,
    source: &str,
    path: &Path,
) -> GeneratorResult<ExtractedSource> {
    let tree = parse_java(parser, source)?;
    let root = tree.root_node();
    let bytes = source.as_bytes();

    let mut declared_package = None;
    let mut declared_types = Vec::new();
    let mut references = ReferenceSet::new();

    let mut cursor = root.walk();
    for node in root.named_children(&mut cursor) {
        match node.kind() {
            "package_declaration" => {
                declared_package = name_child(node)
                    .and_then(|n| node_text(n, bytes))
                    .map(strip_whitespace);
            }
            "import_declaration" => {
                if let Some((kind, name)) = import_reference(node, bytes) {
                    references.push(kind, name, line_of(node));
                }
            }
            kind if TYPE_DECLARATIONS.contains(&kind) => {
                if let Some(name) = node
                    .child_by_field_name("name")
                    .and_then(|n| node_text(n, bytes))
                {
                    declared_types.push(DeclaredType {
                        name: name.to_string(),
                        line: line_of(node),
                    });
                }
            }
            _ => {}
        }
    }

    collect_inline_references(root, bytes, &mut references);

    Ok(ExtractedSource {
        path: path.to_path_buf(),
        declared_package,
        declared_types,
        references: references.references,
        has_syntax_errors: root.has_error(),
    })
}

/// Extract declarations and references from Java source text.
pub fn extract_java(source: &str, path: &Path) -> GeneratorResult<ExtractedSource> {
    let mut parser = java_parser()?;
    extract_java_with(&mut parser, source, path)
}
