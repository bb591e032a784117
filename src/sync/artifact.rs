// Hybrid wire format
//
// Artifacts and deltas are JSON with an explicit schema_version. The checksum
// is SHA-256 over the canonical serialisation (lexicographically sorted keys,
// no whitespace) with the checksum and signature fields absent, so any
// reordering-safe transport preserves verifiability.

use crate::scanner::hash_bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const SYNC_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactSymbol {
    pub qualified_name: String,
    pub name: String,
    pub kind: String,
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub signature: String,
    pub pagerank: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactEdge {
    pub from_qualified: String,
    pub to_qualified: String,
    pub relationship: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactSignature {
    pub algorithm: String,
    pub key_id: String,
    pub value: String,
}

/// A promoted, versioned bundle of symbols, edges and rank priors shared via
/// the hybrid plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub schema_version: u32,
    pub artifact_id: String,
    pub repo: String,
    pub snapshot: String,
    pub created_at: i64,
    pub symbols: Vec<ArtifactSymbol>,
    pub edges: Vec<ArtifactEdge>,
    #[serde(default)]
    pub checksum: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<ArtifactSignature>,
}

/// The incremental payload describing a change from one snapshot to the next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    pub schema_version: u32,
    pub delta_id: String,
    pub repo: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_snapshot: Option<String>,
    pub snapshot: String,
    pub changed_files: Vec<String>,
    pub created_at: i64,
}

impl Artifact {
    /// The canonical bytes the checksum and signature cover.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut value = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Some(map) = value.as_object_mut() {
            map.remove("checksum");
            map.remove("signature");
        }
        canonical_json(&value).into_bytes()
    }

    pub fn compute_checksum(&self) -> String {
        hash_bytes(&self.canonical_bytes())
    }

    /// Stamp the checksum; call after the payload is final and before signing.
    pub fn seal(&mut self) {
        self.checksum = self.compute_checksum();
    }

    pub fn checksum_valid(&self) -> bool {
        !self.checksum.is_empty() && self.checksum == self.compute_checksum()
    }
}

/// Deterministic JSON rendering: object keys sorted lexicographically, no
/// whitespace. Arrays keep their order.
pub fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let entries: Vec<String> = keys
                .into_iter()
                .map(|key| {
                    format!(
                        "{}:{}",
                        serde_json::to_string(key).unwrap_or_default(),
                        canonical_json(&map[key])
                    )
                })
                .collect();
            format!("{{{}}}", entries.join(","))
        }
        Value::Array(items) => {
            let rendered: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", rendered.join(","))
        }
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}
