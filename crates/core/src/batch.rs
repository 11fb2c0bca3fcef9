//! Append-only vote batch ledger.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::{Error, ProcessId, Result};

/// Ordered batch references per process. The vector length is the count.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteBatchLedger {
    batches: BTreeMap<ProcessId, Vec<String>>,
}

impl VoteBatchLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a batch reference, returning its index.
    pub(crate) fn append(&mut self, process: ProcessId, data_content_uri: String) -> usize {
        let batches = self.batches.entry(process).or_default();
        batches.push(data_content_uri);
        let index = batches.len() - 1;
        debug!(%process, index, "vote batch appended");
        index
    }

    pub fn count(&self, process: &ProcessId) -> usize {
        self.batches.get(process).map_or(0, Vec::len)
    }

    pub fn get(&self, process: &ProcessId, index: usize) -> Result<&str> {
        let batches = self.batches.get(process).map(Vec::as_slice).unwrap_or_default();
        batches
            .get(index)
            .map(String::as_str)
            .ok_or(Error::IndexOutOfRange {
                index,
                len: batches.len(),
            })
    }
}
