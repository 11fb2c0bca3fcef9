//! Ledger configuration.
//!
//! Values come from a TOML file layered under environment variables:
//!
//! ```toml
//! snapshot_path = "/var/lib/relayvote/store.cbor"
//! history_limit = 10000
//! enforce_monotonic_clock = true
//! ```

use confique::Config;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::Result;

#[derive(Config, Clone, Debug, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Where the store snapshot is restored from and saved to. Without it the
    /// ledger is memory-only.
    #[config(env = "RELAYVOTE_SNAPSHOT_PATH")]
    pub snapshot_path: Option<PathBuf>,

    /// Number of committed receipts kept in memory.
    #[config(default = 10000, env = "RELAYVOTE_HISTORY_LIMIT")]
    pub history_limit: usize,

    /// Reject calls whose `now` is earlier than the last committed one.
    #[config(default = true, env = "RELAYVOTE_ENFORCE_MONOTONIC_CLOCK")]
    pub enforce_monotonic_clock: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            snapshot_path: None,
            history_limit: 10_000,
            enforce_monotonic_clock: true,
        }
    }
}

impl LedgerConfig {
    /// Load from `path`, with environment variables taking precedence.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::builder().env().file(path.as_ref()).load()?)
    }

    /// Load from environment variables alone.
    pub fn from_env() -> Result<Self> {
        Ok(Self::builder().env().load()?)
    }

    pub fn with_snapshot_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }
}
