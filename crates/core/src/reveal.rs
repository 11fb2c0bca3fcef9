//! One-shot publication of process decryption keys.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::{Error, ProcessId, Result, Timestamp};

/// Revealed private keys, write-once per process.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRevealGate {
    keys: BTreeMap<ProcessId, String>,
}

impl KeyRevealGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check that a reveal would be accepted without storing anything.
    ///
    /// The time gate is lifted for canceled processes.
    fn check(
        &self,
        process: &ProcessId,
        end_time: Timestamp,
        canceled: bool,
        now: Timestamp,
    ) -> Result<()> {
        if now < end_time && !canceled {
            return Err(Error::TooEarly {
                process: *process,
                end: end_time,
                now,
            });
        }
        if self.is_revealed(process) {
            return Err(Error::AlreadyRevealed(*process));
        }
        Ok(())
    }

    pub(crate) fn reveal(
        &mut self,
        process: ProcessId,
        end_time: Timestamp,
        canceled: bool,
        now: Timestamp,
        private_key: String,
    ) -> Result<()> {
        self.check(&process, end_time, canceled, now)?;
        self.keys.insert(process, private_key);
        debug!(%process, "private key stored");
        Ok(())
    }

    pub fn is_revealed(&self, process: &ProcessId) -> bool {
        self.keys.contains_key(process)
    }

    /// The revealed key, or `""` while it is still secret.
    pub fn get(&self, process: &ProcessId) -> &str {
        self.keys.get(process).map_or("", String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Hash;

    #[test]
    fn reveal_gated_on_end_time() {
        let mut gate = KeyRevealGate::new();
        let p = Hash::of(b"p");

        let err = gate.reveal(p, 100, false, 99, "k".into()).unwrap_err();
        assert!(matches!(err, Error::TooEarly { end: 100, now: 99, .. }));
        assert_eq!(gate.get(&p), "");

        gate.reveal(p, 100, false, 100, "k".into()).unwrap();
        assert_eq!(gate.get(&p), "k");
    }

    #[test]
    fn cancel_lifts_time_gate() {
        let mut gate = KeyRevealGate::new();
        let p = Hash::of(b"p");
        gate.reveal(p, 100, true, 5, "k".into()).unwrap();
        assert!(gate.is_revealed(&p));
    }

    #[test]
    fn second_reveal_keeps_first_key() {
        let mut gate = KeyRevealGate::new();
        let p = Hash::of(b"p");
        gate.reveal(p, 10, false, 20, "first".into()).unwrap();

        let err = gate.reveal(p, 10, false, 30, "second".into()).unwrap_err();
        assert!(matches!(err, Error::AlreadyRevealed(_)));
        assert_eq!(gate.get(&p), "first");
    }
}
