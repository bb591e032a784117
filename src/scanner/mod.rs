// Filesystem scanner
//
// Enumerates candidate files under a root with a layered ignore policy:
// built-in ignores, .gitignore semantics, the project-local ignore file,
// sensitive-path patterns (default on), then caller include/exclude globs.
// Output ordering is stable across runs: sorted by repo-relative path.

pub mod language;

pub use language::Language;

use crate::config::{Config, IGNORE_FILE_NAME};
use crate::error::{BombeError, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Directories skipped regardless of ignore files.
const BUILT_IN_IGNORE_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    ".bombe",
    "node_modules",
    "vendor",
    "target",
    "dist",
    "build",
    "__pycache__",
    ".venv",
    "venv",
];

/// Default exclusions for key and credential material. Matching is on the
/// repo-relative path.
const SENSITIVE_PATH_PATTERNS: &[&str] = &[
    "**/.ssh/**",
    "**/.aws/**",
    "**/.gnupg/**",
    "**/secrets/**",
    "**/credentials/**",
    "**/*.pem",
    "**/*.key",
    "**/*.p12",
    "**/*.pfx",
    "**/id_rsa*",
    "**/.env",
    "**/.env.*",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    pub path: PathBuf,
    /// Unix-style path relative to the scanned root.
    pub relative_path: String,
    pub language: Language,
}

pub struct Scanner {
    root: PathBuf,
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
    sensitive: Option<GlobSet>,
    max_file_bytes: u64,
}

impl Scanner {
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &config.repo_root,
            &config.include,
            &config.exclude,
            config.sensitive_exclusion_enabled,
            config.max_file_bytes,
        )
    }

    pub fn new(
        root: &Path,
        include: &[String],
        exclude: &[String],
        sensitive_exclusion: bool,
        max_file_bytes: u64,
    ) -> Result<Self> {
        let sensitive = if sensitive_exclusion {
            let patterns: Vec<String> = SENSITIVE_PATH_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect();
            Some(build_globset(&patterns)?)
        } else {
            None
        };

        Ok(Self {
            root: root.to_path_buf(),
            include: if include.is_empty() {
                None
            } else {
                Some(build_globset(include)?)
            },
            exclude: if exclude.is_empty() {
                None
            } else {
                Some(build_globset(exclude)?)
            },
            sensitive,
            max_file_bytes,
        })
    }

    /// Enumerate indexable files, ordered and deduplicated by relative path.
    /// The size cap is enforced later by the pipeline, which owns the
    /// diagnostic for oversized skips.
    pub fn enumerate(&self) -> Result<Vec<ScannedFile>> {
        let mut walker = WalkBuilder::new(&self.root);
        walker
            .hidden(false)
            .git_ignore(true)
            .git_exclude(true)
            .git_global(false)
            .require_git(false)
            .ignore(false)
            .add_custom_ignore_filename(IGNORE_FILE_NAME);
        walker.filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            !(entry.file_type().is_some_and(|t| t.is_dir())
                && BUILT_IN_IGNORE_DIRS.contains(&name.as_ref()))
        });

        // BTreeMap gives the stable ordering and deduplication in one pass.
        let mut found: BTreeMap<String, ScannedFile> = BTreeMap::new();
        for entry in walker.build() {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("scan error under {}: {}", self.root.display(), e);
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let path = entry.path();
            let Some(language) = Language::from_path(path) else {
                continue;
            };
            let relative = relative_unix_path(path, &self.root);
            if !self.passes_filters(&relative) {
                continue;
            }
            found.insert(
                relative.clone(),
                ScannedFile {
                    path: path.to_path_buf(),
                    relative_path: relative,
                    language,
                },
            );
        }

        debug!(
            "scanner enumerated {} files under {}",
            found.len(),
            self.root.display()
        );
        Ok(found.into_values().collect())
    }

    /// Whether a file exceeds the configured size cap.
    pub fn oversized(&self, path: &Path) -> bool {
        std::fs::metadata(path).is_ok_and(|m| m.len() > self.max_file_bytes)
    }

    fn passes_filters(&self, relative: &str) -> bool {
        if let Some(sensitive) = &self.sensitive
            && sensitive.is_match(relative)
        {
            return false;
        }
        if let Some(include) = &self.include
            && !include.is_match(relative)
        {
            return false;
        }
        if let Some(exclude) = &self.exclude
            && exclude.is_match(relative)
        {
            return false;
        }
        true
    }
}

/// SHA-256 of the file contents, lowercase hex.
pub fn content_hash(path: &Path) -> Result<String> {
    let bytes =
        std::fs::read(path).map_err(|e| BombeError::io(path.display().to_string(), e))?;
    Ok(hash_bytes(&bytes))
}

pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

pub fn relative_unix_path(path: &Path, root: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.to_string_lossy().replace('\\', "/")
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| BombeError::Config(format!("bad glob '{pattern}': {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| BombeError::Config(format!("glob set: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn enumerates_sorted_and_language_tagged() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b.py", "x = 1\n");
        write(dir.path(), "a/main.go", "package a\n");
        write(dir.path(), "notes.txt", "not code\n");

        let scanner = Scanner::new(dir.path(), &[], &[], true, 1 << 20).unwrap();
        let files = scanner.enumerate().unwrap();
        let rels: Vec<&str> = files.iter().map(|f| f.relative_path.as_str()).collect();
        assert_eq!(rels, vec!["a/main.go", "b.py"]);
        assert_eq!(files[0].language, Language::Go);
    }

    #[test]
    fn sensitive_paths_excluded_by_default() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "secrets/token.py", "TOKEN = 'x'\n");
        write(dir.path(), "app.py", "pass\n");

        let scanner = Scanner::new(dir.path(), &[], &[], true, 1 << 20).unwrap();
        let files = scanner.enumerate().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative_path, "app.py");

        // Explicit opt-out brings them back.
        let scanner = Scanner::new(dir.path(), &[], &[], false, 1 << 20).unwrap();
        assert_eq!(scanner.enumerate().unwrap().len(), 2);
    }

    #[test]
    fn include_exclude_globs_apply_after_ignores() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/a.py", "pass\n");
        write(dir.path(), "src/b.py", "pass\n");
        write(dir.path(), "docs/c.py", "pass\n");

        let scanner = Scanner::new(
            dir.path(),
            &["src/**".to_string()],
            &["**/b.py".to_string()],
            true,
            1 << 20,
        )
        .unwrap();
        let files = scanner.enumerate().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative_path, "src/a.py");
    }

    #[test]
    fn bombeignore_honored() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), ".bombeignore", "generated/\n");
        write(dir.path(), "generated/g.py", "pass\n");
        write(dir.path(), "app.py", "pass\n");

        let scanner = Scanner::new(dir.path(), &[], &[], true, 1 << 20).unwrap();
        let files = scanner.enumerate().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative_path, "app.py");
    }

    #[test]
    fn content_hash_is_sha256_hex() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.py");
        fs::write(&path, b"hello").unwrap();
        let hash = content_hash(&path).unwrap();
        assert_eq!(hash.len(), 64);
        assert_eq!(
            hash,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert!(content_hash(&dir.path().join("missing.py")).is_err());
    }
}
