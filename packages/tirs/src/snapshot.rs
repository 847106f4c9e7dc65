//! Forensic snapshots.
//!
//! Captures agent state at enforcement moments (pause, kill, manual) for
//! post-incident analysis. Snapshots are hash-chained per agent: each
//! snapshot's `content_hash` covers its identifying fields plus the
//! previous snapshot's hash, so any post-hoc edit breaks the chain.
//!
//! Storage layout: `{storage_dir}/{snapshot_id}.json.gz` (gzipped UTF-8
//! JSON). The in-memory chain remains authoritative for the process
//! lifetime; persistence failures are logged and never block enforcement.

use std::collections::HashMap;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Local, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::TirsError;

/// Compact intent record carried inside a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IntentRecord {
    pub timestamp: DateTime<Utc>,
    pub intent_text: String,
    pub capabilities: Vec<String>,
    pub allowed: bool,
    pub policy_triggered: Option<String>,
}

/// Point-in-time view of an agent profile, supplied by the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileView {
    pub risk_score: f64,
    pub risk_level: String,
    pub risk_history_tail: Vec<f64>,
    pub recent_intents: Vec<IntentRecord>,
    pub total_intents: u64,
    pub violation_count: u64,
    pub capability_distribution: HashMap<String, f64>,
    pub unusual_capabilities: Vec<String>,
    pub policies_triggered: Vec<String>,
}

/// Complete forensic snapshot of agent state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForensicSnapshot {
    pub snapshot_id: String,
    pub agent_id: String,
    /// What triggered the snapshot (critical_threshold, terminal_threshold,
    /// manual_kill, ...)
    pub trigger: String,
    pub timestamp: DateTime<Utc>,

    // Risk state
    pub risk_score: f64,
    pub risk_level: String,
    pub risk_history: Vec<f64>,

    // Intent history
    pub recent_intents: Vec<IntentRecord>,
    pub total_intents: u64,
    pub violation_count: u64,

    // Capability analysis
    pub capability_distribution: HashMap<String, f64>,
    pub unusual_capabilities: Vec<String>,

    // Policy context
    pub policies_triggered: Vec<String>,

    // Environmental context
    pub environment: HashMap<String, serde_json::Value>,

    // Hash chain
    pub content_hash: String,
    pub previous_snapshot_hash: Option<String>,
}

/// Canonical hashed subset of a snapshot. Field order is the canonical
/// order; any change here invalidates existing chains.
#[derive(Serialize)]
struct HashContent<'a> {
    snapshot_id: &'a str,
    agent_id: &'a str,
    trigger: &'a str,
    timestamp: String,
    risk_score: f64,
    total_intents: u64,
    violation_count: u64,
    previous_hash: &'a Option<String>,
}

impl ForensicSnapshot {
    fn compute_hash(&self) -> String {
        let content = HashContent {
            snapshot_id: &self.snapshot_id,
            agent_id: &self.agent_id,
            trigger: &self.trigger,
            timestamp: self.timestamp.to_rfc3339(),
            risk_score: self.risk_score,
            total_intents: self.total_intents,
            violation_count: self.violation_count,
            previous_hash: &self.previous_snapshot_hash,
        };
        // Infallible for this shape; an empty digest would only hide a bug.
        let canonical = serde_json::to_string(&content).unwrap_or_default();
        hex::encode(Sha256::digest(canonical.as_bytes()))
    }

    /// Has this snapshot been tampered with since creation?
    pub fn verify_integrity(&self) -> bool {
        self.content_hash == self.compute_hash()
    }

    /// JSON value with `integrity_valid` computed at read time.
    pub fn to_json_value(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(map) = value.as_object_mut() {
            map.insert(
                "integrity_valid".to_string(),
                serde_json::Value::Bool(self.verify_integrity()),
            );
        }
        value
    }
}

/// Result of a chain verification pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainVerification {
    pub agent_id: String,
    pub valid: bool,
    pub snapshot_count: usize,
    pub issues: Vec<String>,
}

/// Manages per-agent hash-chained forensic snapshots.
pub struct SnapshotManager {
    storage_dir: PathBuf,
    snapshots: RwLock<HashMap<String, ForensicSnapshot>>,
    chains: RwLock<HashMap<String, Vec<String>>>,
    counter: AtomicU64,
}

impl SnapshotManager {
    /// Create a manager rooted at `storage_dir` (created if missing).
    pub fn new(storage_dir: impl Into<PathBuf>) -> Result<Self, TirsError> {
        let storage_dir = storage_dir.into();
        fs::create_dir_all(&storage_dir)?;
        Ok(Self {
            storage_dir,
            snapshots: RwLock::new(HashMap::new()),
            chains: RwLock::new(HashMap::new()),
            counter: AtomicU64::new(0),
        })
    }

    /// Snapshot storage directory.
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Create a snapshot, link it into the agent's chain, and persist it.
    ///
    /// The chain is extended under the lock; the gzip write happens after
    /// release so disk I/O never blocks profile evaluation. Returns the
    /// snapshot even when persistence fails.
    pub fn create(
        &self,
        agent_id: &str,
        trigger: &str,
        profile: ProfileView,
        environment: HashMap<String, serde_json::Value>,
    ) -> ForensicSnapshot {
        let seq = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot_id = format!("SNAP-{}-{:04}", Local::now().format("%Y%m%d%H%M%S"), seq);

        let previous_hash = {
            let chains = self.chains.read();
            let snapshots = self.snapshots.read();
            chains
                .get(agent_id)
                .and_then(|chain| chain.last())
                .and_then(|id| snapshots.get(id))
                .map(|snap| snap.content_hash.clone())
        };

        let mut snapshot = ForensicSnapshot {
            snapshot_id: snapshot_id.clone(),
            agent_id: agent_id.to_string(),
            trigger: trigger.to_string(),
            timestamp: Utc::now(),
            risk_score: profile.risk_score,
            risk_level: profile.risk_level,
            risk_history: profile.risk_history_tail,
            recent_intents: profile.recent_intents,
            total_intents: profile.total_intents,
            violation_count: profile.violation_count,
            capability_distribution: profile.capability_distribution,
            unusual_capabilities: profile.unusual_capabilities,
            policies_triggered: profile.policies_triggered,
            environment,
            content_hash: String::new(),
            previous_snapshot_hash: previous_hash,
        };
        snapshot.content_hash = snapshot.compute_hash();

        {
            let mut snapshots = self.snapshots.write();
            let mut chains = self.chains.write();
            snapshots.insert(snapshot_id.clone(), snapshot.clone());
            chains
                .entry(agent_id.to_string())
                .or_default()
                .push(snapshot_id.clone());
        }

        if let Err(e) = self.persist(&snapshot) {
            tracing::error!(
                snapshot_id = %snapshot.snapshot_id,
                error = %e,
                "Failed to persist forensic snapshot; in-memory chain remains authoritative"
            );
        }

        tracing::warn!(
            snapshot_id = %snapshot.snapshot_id,
            agent_id = %agent_id,
            trigger = %trigger,
            "Forensic snapshot created"
        );
        snapshot
    }

    fn path_for(&self, snapshot_id: &str) -> PathBuf {
        self.storage_dir.join(format!("{snapshot_id}.json.gz"))
    }

    fn persist(&self, snapshot: &ForensicSnapshot) -> Result<(), TirsError> {
        let json = serde_json::to_string_pretty(&snapshot.to_json_value())?;
        let file = fs::File::create(self.path_for(&snapshot.snapshot_id))?;
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(json.as_bytes())?;
        encoder.finish()?;
        Ok(())
    }

    fn load_from_disk(&self, snapshot_id: &str) -> Result<ForensicSnapshot, TirsError> {
        let file = fs::File::open(self.path_for(snapshot_id)).map_err(|_| {
            TirsError::SnapshotNotFound {
                snapshot_id: snapshot_id.to_string(),
            }
        })?;
        let mut decoder = GzDecoder::new(file);
        let mut json = String::new();
        decoder.read_to_string(&mut json)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Load a snapshot, preferring memory then disk.
    pub fn load(&self, snapshot_id: &str) -> Result<ForensicSnapshot, TirsError> {
        if let Some(snapshot) = self.snapshots.read().get(snapshot_id) {
            return Ok(snapshot.clone());
        }
        self.load_from_disk(snapshot_id)
    }

    /// Most recent snapshot for an agent.
    pub fn latest(&self, agent_id: &str) -> Option<ForensicSnapshot> {
        let chains = self.chains.read();
        let id = chains.get(agent_id)?.last()?.clone();
        drop(chains);
        self.load(&id).ok()
    }

    /// Ordered snapshot chain for an agent.
    pub fn chain(&self, agent_id: &str) -> Vec<ForensicSnapshot> {
        let ids: Vec<String> = self
            .chains
            .read()
            .get(agent_id)
            .cloned()
            .unwrap_or_default();
        ids.iter().filter_map(|id| self.load(id).ok()).collect()
    }

    /// Verify the integrity of an agent's snapshot chain.
    ///
    /// Prefers on-disk bytes so tampering after persistence is caught:
    /// each snapshot's hash is recomputed and every link is checked
    /// against the prior snapshot's `content_hash`.
    pub fn verify_chain(&self, agent_id: &str) -> ChainVerification {
        let ids: Vec<String> = self
            .chains
            .read()
            .get(agent_id)
            .cloned()
            .unwrap_or_default();

        let mut issues = Vec::new();
        let mut previous_hash: Option<String> = None;

        for (index, id) in ids.iter().enumerate() {
            let snapshot = match self.load_from_disk(id) {
                Ok(snapshot) => snapshot,
                Err(TirsError::SnapshotNotFound { .. }) => match self.load(id) {
                    Ok(snapshot) => snapshot,
                    Err(e) => {
                        issues.push(format!("snapshot {id} unreadable: {e}"));
                        continue;
                    }
                },
                Err(e) => {
                    issues.push(format!("snapshot {id} unreadable: {e}"));
                    continue;
                }
            };

            if !snapshot.verify_integrity() {
                issues.push(format!("snapshot {id} failed integrity check"));
            }

            if index > 0 && snapshot.previous_snapshot_hash != previous_hash {
                issues.push(format!(
                    "chain broken at {id}: expected prev={}, got {}",
                    previous_hash.as_deref().unwrap_or("none"),
                    snapshot.previous_snapshot_hash.as_deref().unwrap_or("none"),
                ));
            }

            previous_hash = Some(snapshot.content_hash.clone());
        }

        let valid = issues.is_empty();
        if !valid {
            tracing::error!(agent_id = %agent_id, issues = issues.len(), "Snapshot chain flagged");
        }

        ChainVerification {
            agent_id: agent_id.to_string(),
            valid,
            snapshot_count: ids.len(),
            issues,
        }
    }

    /// Export the full ordered chain for an agent as gzipped JSON.
    pub fn export_chain(&self, agent_id: &str, path: &Path) -> Result<(), TirsError> {
        let snapshots = self.chain(agent_id);
        if snapshots.is_empty() {
            return Err(TirsError::UnknownAgent {
                agent_id: agent_id.to_string(),
            });
        }

        let export = serde_json::json!({
            "agent_id": agent_id,
            "exported_at": Utc::now().to_rfc3339(),
            "snapshot_count": snapshots.len(),
            "chain_valid": self.verify_chain(agent_id).valid,
            "snapshots": snapshots.iter().map(|s| s.to_json_value()).collect::<Vec<_>>(),
        });

        let file = fs::File::create(path)?;
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(serde_json::to_string_pretty(&export)?.as_bytes())?;
        encoder.finish()?;
        Ok(())
    }

    /// Total snapshots held in memory.
    pub fn count(&self) -> usize {
        self.snapshots.read().len()
    }
}
