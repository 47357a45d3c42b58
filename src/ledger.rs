// ABOUTME: Durable status ledger mapping service identity to lifecycle status.
// ABOUTME: Upsert-by-identity in memory, full JSON snapshot rewritten atomically.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::manifest::ManifestUniqueId;

/// Default ledger location, relative to the working directory.
pub const DEFAULT_LEDGER_FILE: &str = "known_manifests.json";

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("failed to read ledger {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("ledger {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to persist ledger {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Lifecycle status vocabulary. Persisted as the uppercase wire form the
/// status consumers expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceStatus {
    #[serde(rename = "DEPLOYED")]
    Deployed,
    #[serde(rename = "REDEPLOYED")]
    Redeployed,
    #[serde(rename = "LOCAL_DEPLOYED")]
    LocalDeployed,
    #[serde(rename = "STOPPED")]
    Stopped,
    #[serde(rename = "STARTED")]
    Started,
    #[serde(rename = "UNDEPLOYED")]
    Undeployed,
    #[serde(rename = "REMOVED")]
    Removed,
    #[serde(rename = "DEPLOY_FAILED")]
    DeployFailed,
    #[serde(rename = "REDEPLOY_FAILED")]
    RedeployFailed,
    #[serde(rename = "LOCAL_DEPLOY_FAILED")]
    LocalDeployFailed,
    #[serde(rename = "STOP_CONTAINER_FAILED")]
    StopContainerFailed,
    #[serde(rename = "START_FAILED")]
    StartFailed,
    #[serde(rename = "UNDEPLOY_FAILED")]
    UndeployFailed,
    #[serde(rename = "REMOVE_FAILED")]
    RemoveFailed,
}

impl ServiceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceStatus::Deployed => "DEPLOYED",
            ServiceStatus::Redeployed => "REDEPLOYED",
            ServiceStatus::LocalDeployed => "LOCAL_DEPLOYED",
            ServiceStatus::Stopped => "STOPPED",
            ServiceStatus::Started => "STARTED",
            ServiceStatus::Undeployed => "UNDEPLOYED",
            ServiceStatus::Removed => "REMOVED",
            ServiceStatus::DeployFailed => "DEPLOY_FAILED",
            ServiceStatus::RedeployFailed => "REDEPLOY_FAILED",
            ServiceStatus::LocalDeployFailed => "LOCAL_DEPLOY_FAILED",
            ServiceStatus::StopContainerFailed => "STOP_CONTAINER_FAILED",
            ServiceStatus::StartFailed => "START_FAILED",
            ServiceStatus::UndeployFailed => "UNDEPLOY_FAILED",
            ServiceStatus::RemoveFailed => "REMOVE_FAILED",
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ledger row. Exactly one exists per identity; rows are never deleted,
/// so a removed service leaves a tombstone recording its final status.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestStatus {
    pub manifest_id: String,
    pub manifest_unique_id: ManifestUniqueId,
    pub status: ServiceStatus,
    pub container_count: usize,
    pub in_transition: bool,
    pub updated_at: DateTime<Utc>,
}

/// The status ledger: an in-process ordered collection persisted as one JSON
/// array, rewritten wholesale on every change.
///
/// The mutex makes concurrent updates from independent identities safe; the
/// snapshot write itself is atomic (temp file + rename), so a crash never
/// leaves a partial file behind.
#[derive(Debug)]
pub struct StatusLedger {
    path: PathBuf,
    entries: Mutex<Vec<ManifestStatus>>,
}

impl StatusLedger {
    /// Open the ledger, loading persisted state. A missing file is not an
    /// error: the agent may never have deployed anything.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        let entries = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| LedgerError::Corrupt {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(source) => {
                return Err(LedgerError::Read {
                    path: path.clone(),
                    source,
                });
            }
        };

        tracing::debug!(path = %path.display(), entries = entries.len(), "ledger loaded");

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Upsert the row for an identity and persist the whole snapshot.
    pub fn set_status(
        &self,
        manifest_id: &str,
        container_count: usize,
        unique_id: &ManifestUniqueId,
        status: ServiceStatus,
        in_transition: bool,
    ) -> Result<(), LedgerError> {
        tracing::debug!(manifest = %unique_id, %status, in_transition, "setting status");

        let mut entries = self.entries.lock();

        match entries
            .iter_mut()
            .find(|e| &e.manifest_unique_id == unique_id)
        {
            Some(entry) => {
                entry.status = status;
                entry.in_transition = in_transition;
                entry.container_count = container_count;
                entry.updated_at = Utc::now();
                if !manifest_id.is_empty() {
                    entry.manifest_id = manifest_id.to_string();
                }
            }
            None => entries.push(ManifestStatus {
                manifest_id: manifest_id.to_string(),
                manifest_unique_id: unique_id.clone(),
                status,
                container_count,
                in_transition,
                updated_at: Utc::now(),
            }),
        }

        self.persist(&entries)
    }

    /// The row for an identity, if one was ever written.
    pub fn get(&self, unique_id: &ManifestUniqueId) -> Option<ManifestStatus> {
        self.entries
            .lock()
            .iter()
            .find(|e| &e.manifest_unique_id == unique_id)
            .cloned()
    }

    /// Read-only snapshot of every row, for external reporting.
    pub fn snapshot(&self) -> Vec<ManifestStatus> {
        self.entries.lock().clone()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomic full-snapshot write: serialize to a temp file next to the
    /// target, then rename over it.
    fn persist(&self, entries: &[ManifestStatus]) -> Result<(), LedgerError> {
        let write_err = |source: std::io::Error| LedgerError::Write {
            path: self.path.clone(),
            source,
        };

        let encoded = serde_json::to_vec_pretty(entries)
            .map_err(|e| write_err(std::io::Error::other(e)))?;

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(&encoded).map_err(write_err)?;
        tmp.persist(&self.path)
            .map_err(|e| write_err(e.error))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_ledger() -> (tempfile::TempDir, StatusLedger) {
        let dir = tempfile::tempdir().unwrap();
        let ledger = StatusLedger::open(dir.path().join("ledger.json")).unwrap();
        (dir, ledger)
    }

    #[test]
    fn upsert_updates_in_place() {
        let (_dir, ledger) = temp_ledger();
        let id = ManifestUniqueId::new("demo", "1");

        ledger
            .set_status("m1", 2, &id, ServiceStatus::Deployed, false)
            .unwrap();
        ledger
            .set_status("m1", 2, &id, ServiceStatus::Stopped, false)
            .unwrap();

        let rows = ledger.snapshot();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, ServiceStatus::Stopped);
    }

    #[test]
    fn distinct_identities_get_distinct_rows() {
        let (_dir, ledger) = temp_ledger();

        ledger
            .set_status(
                "m1",
                1,
                &ManifestUniqueId::new("demo", "1"),
                ServiceStatus::Deployed,
                false,
            )
            .unwrap();
        ledger
            .set_status(
                "m2",
                1,
                &ManifestUniqueId::new("demo", "2"),
                ServiceStatus::Deployed,
                false,
            )
            .unwrap();

        assert_eq!(ledger.snapshot().len(), 2);
    }

    #[test]
    fn status_wire_form_is_uppercase() {
        assert_eq!(ServiceStatus::StopContainerFailed.to_string(), "STOP_CONTAINER_FAILED");
        assert_eq!(
            serde_json::to_string(&ServiceStatus::Deployed).unwrap(),
            "\"DEPLOYED\""
        );
    }
}
