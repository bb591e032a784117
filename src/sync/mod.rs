// Hybrid sync plane, core side
//
// The file-backed transport and its operator tooling live outside the core;
// this module owns what the core is responsible for: building and sealing
// artifacts, verifying inbound ones (schema, checksum, signature), routing
// failures to quarantine, applying verified artifacts under one transaction,
// the outbound delta queue, and the per-remote circuit breaker. The local
// path always succeeds; remote failures only ever degrade to local_fallback.

pub mod artifact;
pub mod signing;

pub use artifact::{
    Artifact, ArtifactEdge, ArtifactSignature, ArtifactSymbol, Delta, SYNC_SCHEMA_VERSION,
    canonical_json,
};

use crate::config::SigningConfig;
use crate::error::{BombeError, Result};
use crate::store::GraphStore;
use crate::store::ops::BreakerState;
use tracing::{info, warn};

/// Failures after this many consecutive errors open the breaker.
pub const BREAKER_FAILURE_THRESHOLD: i64 = 3;
/// Seconds an open breaker waits before allowing a half-open probe.
pub const BREAKER_COOLDOWN_SECS: i64 = 60;

/// How many top-ranked symbols a promoted artifact carries.
const ARTIFACT_SYMBOL_LIMIT: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub artifact_id: String,
    pub priors_applied: usize,
}

/// Build a promoted artifact from the local graph: the top-ranked symbols and
/// the edges among them, sealed and optionally signed.
pub fn build_artifact(
    store: &GraphStore,
    repo: &str,
    snapshot: &str,
    signing: Option<&SigningConfig>,
) -> Result<Artifact> {
    let mut symbols = Vec::new();
    let mut ids = Vec::new();
    for file in store.all_files()? {
        for row in store.top_symbols_for_file(&file.path, ARTIFACT_SYMBOL_LIMIT)? {
            ids.push(row.id);
            symbols.push(ArtifactSymbol {
                qualified_name: row.qualified_name,
                name: row.name,
                kind: row.kind.as_str().to_string(),
                file_path: row.file_path,
                start_line: row.start_line,
                end_line: row.end_line,
                signature: row.signature,
                pagerank: row.pagerank,
            });
        }
    }
    symbols.sort_by(|a, b| {
        b.pagerank
            .partial_cmp(&a.pagerank)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    symbols.truncate(ARTIFACT_SYMBOL_LIMIT);
    let kept: std::collections::HashSet<&str> =
        symbols.iter().map(|s| s.qualified_name.as_str()).collect();

    let names: std::collections::HashMap<i64, String> = store
        .symbols_by_ids(&ids)?
        .into_iter()
        .map(|row| (row.id, row.qualified_name))
        .collect();
    let edges: Vec<ArtifactEdge> = store
        .edges_among(&ids)?
        .into_iter()
        .filter_map(|edge| {
            let from = names.get(&edge.source_id)?;
            let to = names.get(&edge.target_id)?;
            (kept.contains(from.as_str()) && kept.contains(to.as_str())).then(|| ArtifactEdge {
                from_qualified: from.clone(),
                to_qualified: to.clone(),
                relationship: edge.relationship.as_str().to_string(),
                confidence: edge.confidence,
            })
        })
        .collect();

    let mut artifact = Artifact {
        schema_version: SYNC_SCHEMA_VERSION,
        artifact_id: uuid::Uuid::new_v4().to_string(),
        repo: repo.to_string(),
        snapshot: snapshot.to_string(),
        created_at: chrono::Utc::now().timestamp(),
        symbols,
        edges,
        checksum: String::new(),
        signature: None,
    };
    artifact.seal();
    if let Some(config) = signing {
        artifact.signature = Some(signing::sign(config, &artifact.canonical_bytes())?);
    }
    Ok(artifact)
}

/// Verify an inbound artifact. Quarantined ids are rejected outright;
/// incompatible schema versions are skipped; checksum and signature failures
/// are routed to quarantine and never applied again until released.
pub fn verify_artifact(store: &GraphStore, artifact: &Artifact) -> Result<()> {
    if store.is_quarantined(&artifact.artifact_id)? {
        return Err(BombeError::ArtifactCorrupt {
            artifact_id: artifact.artifact_id.clone(),
        });
    }

    if artifact.schema_version > SYNC_SCHEMA_VERSION {
        store.record_sync_event(
            "artifact_incompatible",
            Some(&format!(
                "{} schema_version {}",
                artifact.artifact_id, artifact.schema_version
            )),
        )?;
        return Err(BombeError::ArtifactIncompatible {
            artifact_id: artifact.artifact_id.clone(),
            version: artifact.schema_version,
        });
    }

    if !artifact.checksum_valid() {
        warn!("artifact {} failed checksum; quarantining", artifact.artifact_id);
        store.quarantine_artifact(&artifact.artifact_id, "checksum mismatch")?;
        store.record_sync_event("artifact_quarantined", Some(&artifact.artifact_id))?;
        return Err(BombeError::ArtifactCorrupt {
            artifact_id: artifact.artifact_id.clone(),
        });
    }

    if let Some(signature) = &artifact.signature {
        let trusted = store.trusted_key(&signature.key_id)?;
        let valid = trusted.is_some_and(|(algorithm, key_material)| {
            algorithm == signature.algorithm
                && signing::verify(
                    &signature.algorithm,
                    &key_material,
                    &artifact.canonical_bytes(),
                    &signature.value,
                )
        });
        if !valid {
            warn!(
                "artifact {} failed signature verification; quarantining",
                artifact.artifact_id
            );
            store.quarantine_artifact(&artifact.artifact_id, "signature mismatch")?;
            store.record_sync_event("artifact_quarantined", Some(&artifact.artifact_id))?;
            return Err(BombeError::SignatureMismatch {
                artifact_id: artifact.artifact_id.clone(),
            });
        }
    }

    Ok(())
}

/// Apply a verified artifact: rank priors merge onto local symbols matched by
/// qualified name (keeping the higher score), the artifact is pinned for its
/// (repo, snapshot), and the event is logged. The merge, pin, event and epoch
/// bump land in one store transaction.
pub fn apply_artifact(store: &mut GraphStore, artifact: &Artifact) -> Result<ApplyOutcome> {
    verify_artifact(store, artifact)?;

    let mut priors = Vec::new();
    for symbol in &artifact.symbols {
        if let Some(local) = store.symbol_by_qualified_name(&symbol.qualified_name)?
            && symbol.pagerank > local.pagerank
        {
            priors.push((local.id, symbol.pagerank));
        }
    }
    let applied = store.apply_artifact_outcome(
        &priors,
        &artifact.repo,
        &artifact.snapshot,
        &artifact.artifact_id,
    )?;
    info!(
        "applied artifact {} ({} rank priors)",
        artifact.artifact_id, applied
    );
    Ok(ApplyOutcome {
        artifact_id: artifact.artifact_id.clone(),
        priors_applied: applied,
    })
}

/// Queue a delta for the transport to pick up.
pub fn enqueue_delta(store: &GraphStore, delta: &Delta) -> Result<()> {
    let payload = serde_json::to_string(delta)
        .map_err(|e| BombeError::Config(format!("delta serialization: {e}")))?;
    store.enqueue_outbound(&delta.delta_id, &payload)?;
    store.record_sync_event("delta_enqueued", Some(&delta.delta_id))?;
    Ok(())
}

/// Whether a remote may be called right now.
pub fn remote_allowed(store: &GraphStore, remote: &str) -> Result<bool> {
    let (state, _, opened_at) = store.breaker_state(remote)?;
    Ok(match state {
        BreakerState::Closed | BreakerState::HalfOpen => true,
        BreakerState::Open => {
            let now = chrono::Utc::now().timestamp();
            if opened_at.is_some_and(|at| now - at >= BREAKER_COOLDOWN_SECS) {
                store.set_breaker_state(remote, BreakerState::HalfOpen, 0)?;
                true
            } else {
                false
            }
        }
    })
}

/// Record the outcome of a remote call and advance the breaker state machine.
pub fn record_remote_result(store: &GraphStore, remote: &str, success: bool) -> Result<BreakerState> {
    let (state, failures, _) = store.breaker_state(remote)?;
    let next = match (state, success) {
        (_, true) => {
            store.set_breaker_state(remote, BreakerState::Closed, 0)?;
            BreakerState::Closed
        }
        (BreakerState::HalfOpen, false) => {
            store.set_breaker_state(remote, BreakerState::Open, failures + 1)?;
            BreakerState::Open
        }
        (_, false) => {
            let failures = failures + 1;
            if failures >= BREAKER_FAILURE_THRESHOLD {
                warn!("remote {remote} breaker opened after {failures} failures");
                store.set_breaker_state(remote, BreakerState::Open, failures)?;
                BreakerState::Open
            } else {
                store.set_breaker_state(remote, BreakerState::Closed, failures)?;
                BreakerState::Closed
            }
        }
    };
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SigningAlgorithm;
    use crate::extractor::{SymbolKind, SymbolRecord};
    use crate::scanner::Language;
    use crate::store::FileUpsert;

    fn seeded_store() -> GraphStore {
        let mut store = GraphStore::open_in_memory().unwrap();
        store
            .replace_file_symbols(
                &FileUpsert {
                    path: "m.py",
                    language: Language::Python,
                    hash: "h",
                    size: 1,
                    content: None,
                },
                &[SymbolRecord::new("f", "m.f", SymbolKind::Function, 1, 3)],
            )
            .unwrap();
        store
    }

    #[test]
    fn build_verify_apply_round_trip() {
        let mut store = seeded_store();
        let mut artifact = build_artifact(&store, "repo-a", "snap-1", None).unwrap();
        artifact.symbols[0].pagerank = 0.75;
        artifact.seal();

        let outcome = apply_artifact(&mut store, &artifact).unwrap();
        assert_eq!(outcome.priors_applied, 1);
        let local = store.symbol_by_qualified_name("m.f").unwrap().unwrap();
        assert_eq!(local.pagerank, 0.75);
        assert_eq!(
            store.pinned_artifact("repo-a", "snap-1").unwrap().as_deref(),
            Some(artifact.artifact_id.as_str())
        );
        // pin, event and priors land together
        let events = store.recent_sync_events(5).unwrap();
        assert!(
            events
                .iter()
                .any(|e| e.event == "artifact_applied"
                    && e.detail.as_deref() == Some(artifact.artifact_id.as_str()))
        );
    }

    #[test]
    fn corrupt_artifact_goes_to_quarantine_and_stays_out() {
        let mut store = seeded_store();
        let mut artifact = build_artifact(&store, "repo-a", "snap-1", None).unwrap();
        artifact.seal();
        artifact.symbols[0].pagerank = 0.9; // tamper after sealing

        let err = apply_artifact(&mut store, &artifact).unwrap_err();
        assert_eq!(err.code(), "ARTIFACT_CORRUPT");
        assert!(store.is_quarantined(&artifact.artifact_id).unwrap());

        // fixing the checksum is not enough while quarantined
        artifact.seal();
        let err = apply_artifact(&mut store, &artifact).unwrap_err();
        assert_eq!(err.code(), "ARTIFACT_CORRUPT");

        store.release_from_quarantine(&artifact.artifact_id).unwrap();
        assert!(apply_artifact(&mut store, &artifact).is_ok());
    }

    #[test]
    fn newer_schema_is_skipped_not_quarantined() {
        let store = seeded_store();
        let mut artifact = build_artifact(&store, "r", "s", None).unwrap();
        artifact.schema_version = SYNC_SCHEMA_VERSION + 1;
        artifact.seal();
        let err = verify_artifact(&store, &artifact).unwrap_err();
        assert_eq!(err.code(), "ARTIFACT_INCOMPATIBLE");
        assert!(!store.is_quarantined(&artifact.artifact_id).unwrap());
    }

    #[test]
    fn signature_mismatch_quarantines() {
        let store = seeded_store();
        let config = SigningConfig {
            algorithm: SigningAlgorithm::HmacSha256,
            key_id: "k1".into(),
            key_material: hex::encode(b"first secret value padded long"),
        };
        let artifact = build_artifact(&store, "r", "s", Some(&config)).unwrap();

        // trusted set holds a different secret
        store
            .add_trusted_key("k1", "hmac-sha256", &hex::encode(b"another secret entirely here"))
            .unwrap();
        let err = verify_artifact(&store, &artifact).unwrap_err();
        assert_eq!(err.code(), "SIGNATURE_MISMATCH");
        assert!(store.is_quarantined(&artifact.artifact_id).unwrap());
    }

    #[test]
    fn signed_artifact_verifies_with_trusted_key() {
        let store = seeded_store();
        let config = SigningConfig {
            algorithm: SigningAlgorithm::Ed25519,
            key_id: "k2".into(),
            key_material: hex::encode([3u8; 32]),
        };
        let artifact = build_artifact(&store, "r", "s", Some(&config)).unwrap();
        let public = signing::verification_key_material(&config).unwrap();
        store.add_trusted_key("k2", "ed25519", &public).unwrap();
        assert!(verify_artifact(&store, &artifact).is_ok());
    }

    #[test]
    fn breaker_opens_after_threshold_and_recovers() {
        let store = seeded_store();
        for _ in 0..2 {
            assert_eq!(
                record_remote_result(&store, "remote-a", false).unwrap(),
                BreakerState::Closed
            );
        }
        assert_eq!(
            record_remote_result(&store, "remote-a", false).unwrap(),
            BreakerState::Open
        );
        assert!(!remote_allowed(&store, "remote-a").unwrap());

        // success closes it again (after a half-open probe in production)
        assert_eq!(
            record_remote_result(&store, "remote-a", true).unwrap(),
            BreakerState::Closed
        );
        assert!(remote_allowed(&store, "remote-a").unwrap());
    }

    #[test]
    fn delta_queue_flow() {
        let store = seeded_store();
        let delta = Delta {
            schema_version: SYNC_SCHEMA_VERSION,
            delta_id: "d1".into(),
            repo: "r".into(),
            base_snapshot: None,
            snapshot: "s1".into(),
            changed_files: vec!["m.py".into()],
            created_at: 0,
        };
        enqueue_delta(&store, &delta).unwrap();
        let pending = store.pending_outbound().unwrap();
        assert_eq!(pending.len(), 1);
        let parsed: Delta = serde_json::from_str(&pending[0].payload).unwrap();
        assert_eq!(parsed, delta);
    }
}
