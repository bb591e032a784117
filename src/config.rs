// Engine configuration
//
// Mirrors the recognized options from the external contract. Everything has a
// default except `repo_root`; the workspace file under `.bombe/` records
// multi-root setups for the inspector and sync tooling.

use crate::error::{BombeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Name of the project-local ignore file, honored with gitignore semantics.
pub const IGNORE_FILE_NAME: &str = ".bombeignore";

/// Directory under the repo root holding the store and workspace config.
pub const BOMBE_DIR: &str = ".bombe";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeProfile {
    #[default]
    Default,
    /// Refuse to start if any declared required parser grammar is unavailable.
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SigningAlgorithm {
    HmacSha256,
    Ed25519,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningConfig {
    pub algorithm: SigningAlgorithm,
    pub key_id: String,
    /// Hex-encoded key material (HMAC secret or Ed25519 keypair seed).
    pub key_material: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory to index.
    pub repo_root: PathBuf,

    /// Store location; defaults to `<repo>/.bombe/bombe.db`.
    pub db_path: Option<PathBuf>,

    pub runtime_profile: RuntimeProfile,

    /// Glob filters applied after the ignore policy.
    pub include: Vec<String>,
    pub exclude: Vec<String>,

    /// Extractor pool size; defaults to `max(1, physical_cores - 1)`.
    pub workers: Option<usize>,

    /// Per-call budget for hybrid push/pull.
    pub sync_timeout_ms: u64,

    /// Default-on exclusion of key/credential paths from scanning.
    pub sensitive_exclusion_enabled: bool,

    pub signing: Option<SigningConfig>,

    /// Optional receiver-type hint file: JSON map of "file:line" to type names.
    pub semantic_hints_path: Option<PathBuf>,

    /// Files larger than this are skipped with a diagnostic.
    pub max_file_bytes: u64,
}

impl Config {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
            db_path: None,
            runtime_profile: RuntimeProfile::Default,
            include: Vec::new(),
            exclude: Vec::new(),
            workers: None,
            sync_timeout_ms: 5_000,
            sensitive_exclusion_enabled: true,
            signing: None,
            semantic_hints_path: None,
            max_file_bytes: 1024 * 1024,
        }
    }

    pub fn bombe_dir(&self) -> PathBuf {
        self.repo_root.join(BOMBE_DIR)
    }

    pub fn db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| self.bombe_dir().join("bombe.db"))
    }

    pub fn workspace_file(&self) -> PathBuf {
        self.bombe_dir().join("workspace.json")
    }

    /// Worker-pool size. Physical core detection keeps hyperthreaded hosts
    /// from oversubscribing native parsers.
    pub fn effective_workers(&self) -> usize {
        self.workers
            .unwrap_or_else(|| num_cpus::get_physical().saturating_sub(1))
            .max(1)
    }

    /// Load receiver-type hints, keyed by (relative file path, line).
    pub fn load_semantic_hints(&self) -> Result<HashMap<(String, u32), Vec<String>>> {
        let Some(path) = &self.semantic_hints_path else {
            return Ok(HashMap::new());
        };
        let raw = std::fs::read_to_string(path)
            .map_err(|e| BombeError::io(path.display().to_string(), e))?;
        let parsed: HashMap<String, Vec<String>> = serde_json::from_str(&raw)
            .map_err(|e| BombeError::Config(format!("invalid semantic hints file: {e}")))?;

        let mut hints = HashMap::new();
        for (key, types) in parsed {
            let Some((file, line)) = key.rsplit_once(':') else {
                return Err(BombeError::Config(format!(
                    "semantic hint key '{key}' is not in file:line form"
                )));
            };
            let line: u32 = line
                .parse()
                .map_err(|_| BombeError::Config(format!("bad line number in hint key '{key}'")))?;
            hints.insert((file.to_string(), line), types);
        }
        Ok(hints)
    }
}

/// Multi-root workspace description persisted at `.bombe/workspace.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    pub version: String,
    pub roots: Vec<PathBuf>,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            version: "1".to_string(),
            roots: Vec::new(),
        }
    }
}

impl WorkspaceConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| BombeError::io(path.display().to_string(), e))?;
        serde_json::from_str(&raw)
            .map_err(|e| BombeError::Config(format!("invalid workspace config: {e}")))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| BombeError::io(parent.display().to_string(), e))?;
        }
        let raw = serde_json::to_string_pretty(self)
            .map_err(|e| BombeError::Config(format!("workspace config serialization: {e}")))?;
        std::fs::write(path, raw).map_err(|e| BombeError::io(path.display().to_string(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = Config::new("/tmp/repo");
        assert!(config.sensitive_exclusion_enabled);
        assert_eq!(config.runtime_profile, RuntimeProfile::Default);
        assert!(config.effective_workers() >= 1);
        assert!(config.db_path().ends_with(".bombe/bombe.db"));
    }

    #[test]
    fn workspace_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".bombe").join("workspace.json");
        let ws = WorkspaceConfig {
            version: "1".into(),
            roots: vec![PathBuf::from("/a"), PathBuf::from("/b")],
        };
        ws.save(&path).unwrap();
        let loaded = WorkspaceConfig::load(&path).unwrap();
        assert_eq!(loaded.roots.len(), 2);
    }
}
