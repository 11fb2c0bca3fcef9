//! Relay directory.
//!
//! Relays are stored arena-style per process: an ordered slot vector plus an
//! address index into it. Disabling flips `active`; slots are never removed,
//! so historical indexes stay valid.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::{Address, Error, ProcessId, Result};

/// A relay registered for one process.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayData {
    pub address: Address,
    pub public_key: String,
    pub messaging_uri: String,
    pub active: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
struct RelaySet {
    slots: Vec<RelayData>,
    by_address: BTreeMap<Address, usize>,
}

/// Relays of every process, keyed by `(process, address)`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayDirectory {
    processes: BTreeMap<ProcessId, RelaySet>,
}

impl RelayDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new active relay. Fails if the address was ever registered.
    pub(crate) fn register(
        &mut self,
        process: ProcessId,
        address: Address,
        public_key: String,
        messaging_uri: String,
    ) -> Result<()> {
        if self.contains(&process, &address) {
            return Err(Error::DuplicateRelay {
                process,
                relay: address,
            });
        }

        let set = self.processes.entry(process).or_default();
        set.by_address.insert(address, set.slots.len());
        set.slots.push(RelayData {
            address,
            public_key,
            messaging_uri,
            active: true,
        });

        debug!(%process, relay = %address, slot = set.slots.len() - 1, "relay registered");
        Ok(())
    }

    /// Mark a relay inactive. Returns whether the flag changed.
    pub(crate) fn disable(&mut self, process: ProcessId, address: Address) -> Result<bool> {
        let relay = self
            .processes
            .get_mut(&process)
            .and_then(|set| {
                let slot = *set.by_address.get(&address)?;
                set.slots.get_mut(slot)
            })
            .ok_or(Error::RelayNotFound {
                process,
                relay: address,
            })?;

        let changed = relay.active;
        relay.active = false;
        if changed {
            debug!(%process, relay = %address, "relay disabled");
        }
        Ok(changed)
    }

    pub fn contains(&self, process: &ProcessId, address: &Address) -> bool {
        self.processes
            .get(process)
            .is_some_and(|set| set.by_address.contains_key(address))
    }

    /// All relay addresses ever added, in insertion order.
    pub fn index(&self, process: &ProcessId) -> Vec<Address> {
        self.processes
            .get(process)
            .map(|set| set.slots.iter().map(|r| r.address).collect())
            .unwrap_or_default()
    }

    pub fn is_active(&self, process: &ProcessId, address: &Address) -> bool {
        self.lookup(process, address).is_some_and(|r| r.active)
    }

    pub fn get(&self, process: &ProcessId, address: &Address) -> Result<&RelayData> {
        self.lookup(process, address).ok_or(Error::RelayNotFound {
            process: *process,
            relay: *address,
        })
    }

    pub fn len(&self, process: &ProcessId) -> usize {
        self.processes.get(process).map_or(0, |set| set.slots.len())
    }

    fn lookup(&self, process: &ProcessId, address: &Address) -> Option<&RelayData> {
        let set = self.processes.get(process)?;
        set.slots.get(*set.by_address.get(address)?)
    }
}
