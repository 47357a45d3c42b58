// ABOUTME: ManifestUniqueId, the stable identity of a deployable service.
// ABOUTME: Produces the label set used to scope every runtime query.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::{LABEL_MANAGED, LABEL_MANIFEST, LABEL_VERSION};

/// The `{name, version}` pair identifying a data service across its whole
/// lifecycle. Used as the ledger key and, through `labels()`, as the label
/// selector against the container runtime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestUniqueId {
    pub manifest_name: String,
    #[serde(deserialize_with = "deserialize_version")]
    pub version_number: String,
}

impl ManifestUniqueId {
    pub fn new(manifest_name: impl Into<String>, version_number: impl Into<String>) -> Self {
        Self {
            manifest_name: manifest_name.into(),
            version_number: version_number.into(),
        }
    }

    /// Identity labels for runtime queries, plus the managed marker so
    /// a prune never touches resources this agent does not own.
    pub fn labels(&self) -> HashMap<String, String> {
        HashMap::from([
            (LABEL_MANIFEST.to_string(), self.manifest_name.clone()),
            (LABEL_VERSION.to_string(), self.version_number.clone()),
            (LABEL_MANAGED.to_string(), "true".to_string()),
        ])
    }
}

impl fmt::Display for ManifestUniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.manifest_name, self.version_number)
    }
}

/// Manifest producers are inconsistent about the version field: some emit a
/// string, some a bare number. Accept both and normalize to a string.
fn deserialize_version<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Version {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Version::deserialize(deserializer)? {
        Version::Text(s) => s,
        Version::Number(n) => n.to_string(),
    })
}
