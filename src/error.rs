// Library error taxonomy
//
// Every failure that crosses the tool boundary carries a stable `code` string.
// Per-file conditions (parse, io) are recoverable and usually degrade to
// diagnostics instead of surfacing here; see the pipeline's propagation policy.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BombeError>;

#[derive(Debug, Error)]
pub enum BombeError {
    /// Per-file, non-fatal: the file contributes no symbols this run.
    #[error("parse failure in {file}: {message}")]
    Parse { file: String, message: String },

    /// File read/hash failure: the file is skipped this run.
    #[error("io failure on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Transactional store failure. The current mutation has rolled back.
    #[error("store failure: {0}")]
    Store(#[from] rusqlite::Error),

    /// The on-disk schema is newer than this build understands.
    #[error("store schema version {found} is newer than supported {supported}")]
    SchemaIncompatible { found: i64, supported: i64 },

    /// A migration step failed and was rolled back; the store stays at the
    /// prior version and the operator must intervene.
    #[error("migration to schema version {version} failed: {message}")]
    MigrationFailed { version: i64, message: String },

    #[error("remote call failed: {0}")]
    Remote(String),

    #[error("remote call timed out after {0}ms")]
    RemoteTimeout(u64),

    /// Artifact schema_version is newer than this build; the artifact is skipped.
    #[error("artifact {artifact_id} has incompatible schema version {version}")]
    ArtifactIncompatible { artifact_id: String, version: u32 },

    /// Checksum verification failed; the artifact id goes to quarantine.
    #[error("artifact {artifact_id} failed checksum verification")]
    ArtifactCorrupt { artifact_id: String },

    /// Signature verification failed; the artifact id goes to quarantine.
    #[error("artifact {artifact_id} failed signature verification")]
    SignatureMismatch { artifact_id: String },

    #[error("configuration error: {0}")]
    Config(String),
}

impl BombeError {
    /// Stable machine-readable code for the tool boundary.
    pub fn code(&self) -> &'static str {
        match self {
            BombeError::Parse { .. } => "PARSE_ERROR",
            BombeError::Io { .. } => "IO_ERROR",
            BombeError::Store(_) => "STORE_ERROR",
            BombeError::SchemaIncompatible { .. } => "SCHEMA_INCOMPATIBLE",
            BombeError::MigrationFailed { .. } => "MIGRATION_FAILED",
            BombeError::Remote(_) => "REMOTE_ERROR",
            BombeError::RemoteTimeout(_) => "REMOTE_TIMEOUT",
            BombeError::ArtifactIncompatible { .. } => "ARTIFACT_INCOMPATIBLE",
            BombeError::ArtifactCorrupt { .. } => "ARTIFACT_CORRUPT",
            BombeError::SignatureMismatch { .. } => "SIGNATURE_MISMATCH",
            BombeError::Config(_) => "CONFIG_ERROR",
        }
    }

    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        BombeError::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        let err = BombeError::SchemaIncompatible {
            found: 9,
            supported: 3,
        };
        assert_eq!(err.code(), "SCHEMA_INCOMPATIBLE");

        let err = BombeError::ArtifactCorrupt {
            artifact_id: "a1".into(),
        };
        assert_eq!(err.code(), "ARTIFACT_CORRUPT");
    }
}
