//! External artifact manifest: package prefixes and class names mapped to
//! Maven coordinates.
//!
//! The manifest is produced outside this tool (from Gradle's resolved
//! dependencies) and read as JSON in one of two shapes:
//!
//! ```json
//! { "com.ext.Foo": "com.ext:lib:1.0", "org.slf4j": "org.slf4j:slf4j-api:2.0.9" }
//! ```
//!
//! ```json
//! { "artifacts": [ { "coordinate": "com.ext:lib:1.0", "provides": ["com.ext"] } ] }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::info;

use crate::errors::{GeneratorError, GeneratorResult};
use crate::models::ExternalArtifact;

/// `group:artifact[:type]:version`
static MAVEN_COORDINATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^:\s]+):([^:\s]+):(?:([^:\s]+):)?([^:\s]+)$").unwrap());

#[derive(Deserialize)]
struct ArtifactEntry {
    coordinate: String,
    provides: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ManifestFile {
    Grouped { artifacts: Vec<ArtifactEntry> },
    Flat(BTreeMap<String, String>),
}

/// Parse and validate a Maven coordinate.
pub fn parse_coordinate(coordinate: &str) -> Option<ExternalArtifact> {
    let caps = MAVEN_COORDINATE_RE.captures(coordinate.trim())?;
    Some(ExternalArtifact {
        coordinate: caps[0].to_string(),
        group: caps[1].to_string(),
        artifact: caps[2].to_string(),
        version: caps[4].to_string(),
    })
}

fn normalize_prefix(prefix: &str) -> &str {
    let trimmed = prefix.trim();
    let trimmed = trimmed.strip_suffix(".*").unwrap_or(trimmed);
    trimmed.trim_end_matches('.')
}

#[derive(Clone, Debug, Default)]
pub struct ExternalManifest {
    entries: BTreeMap<String, ExternalArtifact>,
}

impl ExternalManifest {
    pub fn empty() -> Self {
        ExternalManifest::default()
    }

    /// Build from `(prefix, coordinate)` pairs. `origin` names the source in
    /// error messages.
    pub fn from_entries<I, P, C>(origin: &Path, entries: I) -> GeneratorResult<Self>
    where
        I: IntoIterator<Item = (P, C)>,
        P: AsRef<str>,
        C: AsRef<str>,
    {
        let mut manifest = ExternalManifest::default();
        for (prefix, coordinate) in entries {
            let prefix = normalize_prefix(prefix.as_ref());
            if prefix.is_empty() {
                return Err(GeneratorError::manifest(origin, "empty package prefix"));
            }
            let artifact = parse_coordinate(coordinate.as_ref()).ok_or_else(|| {
                GeneratorError::manifest(
                    origin,
                    format!(
                        "invalid coordinate {:?} for {prefix} (expected group:artifact:version)",
                        coordinate.as_ref()
                    ),
                )
            })?;
            match manifest.entries.get(prefix) {
                Some(existing) if existing.coordinate != artifact.coordinate => {
                    return Err(GeneratorError::manifest(
                        origin,
                        format!(
                            "{prefix} is mapped to both {} and {}",
                            existing.coordinate, artifact.coordinate
                        ),
                    ));
                }
                Some(_) => {}
                None => {
                    manifest.entries.insert(prefix.to_string(), artifact);
                }
            }
        }
        Ok(manifest)
    }

    pub fn from_json_str(origin: &Path, text: &str) -> GeneratorResult<Self> {
        let parsed: ManifestFile = serde_json::from_str(text)
            .map_err(|e| GeneratorError::manifest(origin, e.to_string()))?;
        match parsed {
            ManifestFile::Flat(map) => ExternalManifest::from_entries(origin, map),
            ManifestFile::Grouped { artifacts } => ExternalManifest::from_entries(
                origin,
                artifacts.iter().flat_map(|entry| {
                    entry
                        .provides
                        .iter()
                        .map(move |prefix| (prefix.as_str(), entry.coordinate.as_str()))
                }),
            ),
        }
    }

    pub fn load(path: &Path) -> GeneratorResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| GeneratorError::io(path, e))?;
        let manifest = ExternalManifest::from_json_str(path, &text)?;
        info!(
            entries = manifest.len(),
            artifacts = manifest.artifacts().len(),
            "loaded external manifest {}",
            path.display()
        );
        Ok(manifest)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Longest entry matching `name` on a segment boundary.
    pub fn resolve(&self, name: &str) -> Option<&ExternalArtifact> {
        let mut candidate = name;
        loop {
            if let Some(artifact) = self.entries.get(candidate) {
                return Some(artifact);
            }
            match candidate.rfind('.') {
                Some(pos) => candidate = &candidate[..pos],
                None => return None,
            }
        }
    }

    /// Distinct artifacts named by the manifest.
    pub fn artifacts(&self) -> BTreeSet<&ExternalArtifact> {
        self.entries.values().collect()
    }

    /// First segments of every entry.
    pub fn roots(&self) -> BTreeSet<&str> {
        self.entries
            .keys()
            .filter_map(|key| key.split('.').next())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> &'static Path {
        Path::new("deps.json")
    }

    #[test]
    fn test_parse_coordinate_variants() {
        let plain = parse_coordinate("com.ext:lib:1.0").unwrap();
        assert_eq!(plain.group, "com.ext");
        assert_eq!(plain.artifact, "lib");
        assert_eq!(plain.version, "1.0");

        let typed = parse_coordinate("com.android.support:appcompat-v7:aar:28.0.0").unwrap();
        assert_eq!(typed.artifact, "appcompat-v7");
        assert_eq!(typed.version, "28.0.0");

        assert!(parse_coordinate("just-a-name").is_none());
        assert!(parse_coordinate("a:b").is_none());
        assert!(parse_coordinate("a:b:c:d:e").is_none());
    }

    #[test]
    fn test_flat_manifest_resolves_class_and_prefix() {
        let manifest = ExternalManifest::from_json_str(
            origin(),
            r#"{ "com.ext.Foo": "com.ext:lib:1.0", "org.slf4j.*": "org.slf4j:slf4j-api:2.0.9" }"#,
        )
        .unwrap();
        assert_eq!(
            manifest.resolve("com.ext.Foo").map(|a| a.coordinate.as_str()),
            Some("com.ext:lib:1.0")
        );
        assert_eq!(
            manifest.resolve("com.ext.Foo.Inner").map(|a| a.coordinate.as_str()),
            Some("com.ext:lib:1.0")
        );
        assert!(manifest.resolve("com.ext.Bar").is_none());
        assert!(manifest.resolve("com.ext.FooBar").is_none());
        assert_eq!(
            manifest.resolve("org.slf4j.Logger").map(|a| a.artifact.as_str()),
            Some("slf4j-api")
        );
    }

    #[test]
    fn test_longest_prefix_wins() {
        let manifest = ExternalManifest::from_entries(
            origin(),
            [
                ("com.google", "com.google.guava:guava:31.1-jre"),
                ("com.google.gson", "com.google.code.gson:gson:2.10"),
            ],
        )
        .unwrap();
        assert_eq!(
            manifest.resolve("com.google.gson.Gson").map(|a| a.artifact.as_str()),
            Some("gson")
        );
        assert_eq!(
            manifest
                .resolve("com.google.common.collect.ImmutableList")
                .map(|a| a.artifact.as_str()),
            Some("guava")
        );
    }

    #[test]
    fn test_grouped_manifest() {
        let manifest = ExternalManifest::from_json_str(
            origin(),
            r#"{ "artifacts": [
                { "coordinate": "junit:junit:4.13.2", "provides": ["org.junit", "junit.framework"] }
            ] }"#,
        )
        .unwrap();
        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.artifacts().len(), 1);
        assert_eq!(
            manifest.roots().into_iter().collect::<Vec<_>>(),
            vec!["junit", "org"]
        );
    }

    #[test]
    fn test_conflicting_prefix_is_error() {
        let err = ExternalManifest::from_entries(
            origin(),
            [("com.ext", "com.ext:a:1"), ("com.ext", "com.ext:b:1")],
        )
        .unwrap_err();
        assert!(err.to_string().contains("mapped to both"));
    }

    #[test]
    fn test_invalid_coordinate_is_error() {
        let err = ExternalManifest::from_json_str(origin(), r#"{ "com.ext": "nope" }"#).unwrap_err();
        assert!(matches!(err, GeneratorError::Manifest { .. }));
    }

    #[test]
    fn test_malformed_json_is_error() {
        let err = ExternalManifest::from_json_str(origin(), "[1, 2").unwrap_err();
        assert!(matches!(err, GeneratorError::Manifest { .. }));
    }
}
