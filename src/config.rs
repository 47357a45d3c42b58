// ABOUTME: Agent configuration loaded from gantry.yml in the working directory.
// ABOUTME: Socket path, ledger location, and timeouts; everything has a default.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::deploy::OrchestratorOptions;
use crate::error::Result;
use crate::ledger::DEFAULT_LEDGER_FILE;

pub const CONFIG_FILENAME: &str = "gantry.yml";

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Container engine socket path. Unset means the environment's default
    /// (DOCKER_HOST or the standard socket location).
    #[serde(default)]
    pub socket: Option<String>,

    /// Status ledger file.
    #[serde(default = "default_ledger_path")]
    pub ledger: PathBuf,

    /// Grace period before a stopped container is killed.
    #[serde(default = "default_stop_timeout", with = "humantime_serde")]
    pub stop_timeout: Duration,

    /// Optional ceiling on each runtime call, e.g. "2m".
    #[serde(default, with = "humantime_serde")]
    pub call_timeout: Option<Duration>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            socket: None,
            ledger: default_ledger_path(),
            stop_timeout: default_stop_timeout(),
            call_timeout: None,
        }
    }
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from(DEFAULT_LEDGER_FILE)
}

fn default_stop_timeout() -> Duration {
    Duration::from_secs(30)
}

impl AgentConfig {
    /// Load `gantry.yml` from the given directory. A missing file yields the
    /// defaults; a malformed one is an error.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILENAME);
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(serde_yaml::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn orchestrator_options(&self) -> OrchestratorOptions {
        OrchestratorOptions {
            stop_timeout: self.stop_timeout,
            call_timeout: self.call_timeout,
        }
    }
}
