//! `.buckconfig` generation for projects that have none.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::info;

use crate::errors::{GeneratorError, GeneratorResult};

pub const BUCKCONFIG_FILE_NAME: &str = ".buckconfig";

static REPOSITORIES_START_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\brepositories\s*\{").unwrap());

/// `maven { url 'x' }`, `url = "x"`, `url = uri("x")`, `setUrl("x")`
static REPOSITORY_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:\burl|setUrl)\s*(?:=\s*)?\(?\s*(?:uri\s*\(\s*)?["']([^"']+)["']"#).unwrap()
});

static REPOSITORY_FUNCTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(mavenCentral|jcenter|google)\s*\(\s*\)").unwrap());

fn well_known_repository(function: &str) -> Option<&'static str> {
    match function {
        "mavenCentral" => Some("https://repo1.maven.org/maven2"),
        "jcenter" => Some("https://jcenter.bintray.com"),
        "google" => Some("https://maven.google.com"),
        _ => None,
    }
}

const PROJECT_IGNORE: &[&str] = &[".git", ".buckd", ".gradle", "build", "proguard"];

/// Repository URLs declared in `repositories { ... }` blocks of a Gradle
/// build script, including nested `buildscript` and `allprojects` blocks.
pub fn gradle_repositories(script: &str) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    let mut depth: usize = 0;
    let mut in_block = false;

    for line in script.lines() {
        if line.trim_start().starts_with("//") {
            continue;
        }
        let body = if in_block {
            line
        } else {
            match REPOSITORIES_START_RE.find(line) {
                Some(m) => {
                    in_block = true;
                    depth = 0;
                    &line[m.start()..]
                }
                None => continue,
            }
        };

        for caps in REPOSITORY_URL_RE.captures_iter(body) {
            found.insert(caps[1].trim_end_matches('/').to_string());
        }
        for caps in REPOSITORY_FUNCTION_RE.captures_iter(body) {
            if let Some(url) = well_known_repository(&caps[1]) {
                found.insert(url.to_string());
            }
        }

        for ch in body.chars() {
            match ch {
                '{' => depth += 1,
                '}' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        in_block = false;
                        break;
                    }
                }
                _ => {}
            }
        }
    }
    found
}

/// Render `.buckconfig` contents. Source roots are project-relative.
pub fn render_buckconfig(source_roots: &[PathBuf], repositories: &BTreeSet<String>) -> String {
    let roots = source_roots
        .iter()
        .map(|root| {
            let normalized = root.to_string_lossy().replace('\\', "/");
            format!("/{}", normalized.trim_matches('/'))
        })
        .collect::<Vec<_>>()
        .join(", ");

    let mut out = String::new();
    out.push_str("[java]\n");
    let _ = writeln!(out, "  src_roots = {roots}");
    out.push_str("[project]\n  ignore = \\\n");
    for (i, entry) in PROJECT_IGNORE.iter().enumerate() {
        let continuation = if i + 1 < PROJECT_IGNORE.len() { ", \\" } else { "" };
        let _ = writeln!(out, "    {entry}{continuation}");
    }
    out.push_str("[download]\n  in_build = true\n");
    if !repositories.is_empty() {
        out.push_str("\n[maven_repositories]\n");
        for (i, url) in repositories.iter().enumerate() {
            let _ = writeln!(out, "  mvn{i} = {url}");
        }
    }
    out
}

/// Write `.buckconfig` under `project_root` unless one already exists.
///
/// Returns the path written, or `None` when an existing file was kept.
pub fn write_buckconfig_if_absent(
    project_root: &Path,
    source_roots: &[PathBuf],
    gradle_files: &[PathBuf],
) -> GeneratorResult<Option<PathBuf>> {
    let target = project_root.join(BUCKCONFIG_FILE_NAME);
    if target.exists() {
        info!("keeping existing {}", target.display());
        return Ok(None);
    }

    let mut repositories = BTreeSet::new();
    for script in gradle_files {
        let path = project_root.join(script);
        let text = std::fs::read_to_string(&path).map_err(|e| GeneratorError::io(&path, e))?;
        repositories.extend(gradle_repositories(&text));
    }

    let contents = render_buckconfig(source_roots, &repositories);
    std::fs::write(&target, contents).map_err(|e| GeneratorError::io(&target, e))?;
    info!(
        repositories = repositories.len(),
        "wrote {}",
        target.display()
    );
    Ok(Some(target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SCRIPT: &str = r#"
buildscript {
    repositories {
        google()
        jcenter()
    }
    dependencies {
        classpath 'com.android.tools.build:gradle:3.1.0'
    }
}

allprojects {
    repositories {
        mavenCentral()
        maven { url 'https://jitpack.io/' }
        maven {
            url "https://repo.example.com/releases"
        }
        // maven { url 'https://commented.out' }
    }
}

dependencies {
    implementation 'com.google.guava:guava:31.1-jre'
}
"#;

    #[test]
    fn test_repositories_from_groovy_script() {
        let repos: Vec<String> = gradle_repositories(SCRIPT).into_iter().collect();
        assert_eq!(
            repos,
            vec![
                "https://jcenter.bintray.com",
                "https://jitpack.io",
                "https://maven.google.com",
                "https://repo.example.com/releases",
                "https://repo1.maven.org/maven2",
            ]
        );
    }

    #[test]
    fn test_repositories_from_kotlin_script() {
        let script = "repositories {\n    mavenCentral()\n    maven { url = uri(\"https://kts.example.com\") }\n}\n";
        let repos = gradle_repositories(script);
        assert!(repos.contains("https://kts.example.com"));
        assert!(repos.contains("https://repo1.maven.org/maven2"));
    }

    #[test]
    fn test_urls_outside_repositories_are_ignored() {
        let script = "android {\n    url 'https://not.a.repo'\n}\n";
        assert!(gradle_repositories(script).is_empty());
    }

    #[test]
    fn test_render_lists_roots_and_repositories() {
        let repos: BTreeSet<String> = ["https://repo1.maven.org/maven2".to_string()].into();
        let rendered = render_buckconfig(
            &[PathBuf::from("app/src/main/java"), PathBuf::from("lib/src/main/java")],
            &repos,
        );
        assert!(rendered.starts_with("[java]\n  src_roots = /app/src/main/java, /lib/src/main/java\n"));
        assert!(rendered.contains("    proguard\n"));
        assert!(rendered.contains("[download]\n  in_build = true\n"));
        assert!(rendered.contains("[maven_repositories]\n  mvn0 = https://repo1.maven.org/maven2\n"));
    }

    #[test]
    fn test_existing_buckconfig_is_kept() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".buckconfig"), "[java]\n").unwrap();
        let written = write_buckconfig_if_absent(dir.path(), &[PathBuf::from("src")], &[]).unwrap();
        assert!(written.is_none());
        assert_eq!(
            std::fs::read_to_string(dir.path().join(".buckconfig")).unwrap(),
            "[java]\n"
        );
    }

    #[test]
    fn test_writes_buckconfig_from_gradle_scripts() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("build.gradle"), SCRIPT).unwrap();
        let written = write_buckconfig_if_absent(
            dir.path(),
            &[PathBuf::from("src/main/java")],
            &[PathBuf::from("build.gradle")],
        )
        .unwrap();
        let path = written.unwrap();
        let contents = std::fs::read_to_string(path).unwrap();
        assert!(contents.contains("src_roots = /src/main/java"));
        assert!(contents.contains("https://jitpack.io"));
    }
}
