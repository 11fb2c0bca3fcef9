//! Process registry: lifecycle of voting processes and the sole entry point
//! into the relay directory, the batch ledger and the key reveal gate.
//!
//! ```text
//! Created -> Active -> Ended -> KeyRevealed
//!    \________\_________\_____> canceled (orthogonal flag)
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::{
    Address, CallerContext, Error, Hash, KeyRevealGate, RelayData, RelayDirectory, Result,
    Timestamp, VoteBatchLedger,
};

/// Opaque process identifier.
pub type ProcessId = Hash;

/// Domain separator for process id derivation.
pub const PROCESS_ID_DOMAIN: &[u8] = b"relayvote.process";

/// Id of the `index`-th process created by `entity`:
/// `BLAKE3("relayvote.process" || entity || index as u64 big-endian)`.
pub fn process_id(entity: &Address, index: u64) -> ProcessId {
    Hash::of_parts(&[PROCESS_ID_DOMAIN, entity.as_bytes(), &index.to_be_bytes()])
}

/// Arguments to [`ProcessRegistry::create`], in call order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessParams {
    pub entity_resolver: Address,
    pub process_name: String,
    pub metadata_content_uri: String,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub vote_encryption_public_key: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct ProcessRecord {
    entity_address: Address,
    params: ProcessParams,
    canceled: bool,
}

/// A process as seen by readers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessData {
    pub id: ProcessId,
    pub entity_resolver: Address,
    pub entity_address: Address,
    pub process_name: String,
    pub metadata_content_uri: String,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub vote_encryption_public_key: String,
    pub canceled: bool,
    pub private_key: Option<String>,
}

/// Time-derived lifecycle phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Created,
    Active,
    Ended,
    KeyRevealed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessStatus {
    pub phase: Phase,
    pub canceled: bool,
}

/// Owner of all process records and their child components.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRegistry {
    processes: BTreeMap<ProcessId, ProcessRecord>,
    counters: BTreeMap<Address, u64>,
    relays: RelayDirectory,
    batches: VoteBatchLedger,
    keys: KeyRevealGate,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of processes `entity` has created so far.
    pub fn process_count(&self, entity: &Address) -> u64 {
        self.counters.get(entity).copied().unwrap_or(0)
    }

    /// The id `entity`'s next `create` will be assigned.
    pub fn next_process_id(&self, entity: &Address) -> ProcessId {
        process_id(entity, self.process_count(entity))
    }

    pub fn create(&mut self, ctx: &CallerContext, params: ProcessParams) -> Result<ProcessId> {
        if params.start_time >= params.end_time {
            return Err(Error::InvalidWindow {
                start: params.start_time,
                end: params.end_time,
            });
        }

        let entity = ctx.sender;
        let id = self.next_process_id(&entity);
        self.processes.insert(
            id,
            ProcessRecord {
                entity_address: entity,
                params,
                canceled: false,
            },
        );
        *self.counters.entry(entity).or_insert(0) += 1;

        debug!(process = %id, %entity, index = self.process_count(&entity) - 1, "process stored");
        Ok(id)
    }

    pub fn get(&self, id: &ProcessId) -> Result<ProcessData> {
        let record = self.record(id)?;
        let params = &record.params;
        Ok(ProcessData {
            id: *id,
            entity_resolver: params.entity_resolver,
            entity_address: record.entity_address,
            process_name: params.process_name.clone(),
            metadata_content_uri: params.metadata_content_uri.clone(),
            start_time: params.start_time,
            end_time: params.end_time,
            vote_encryption_public_key: params.vote_encryption_public_key.clone(),
            canceled: record.canceled,
            private_key: self
                .keys
                .is_revealed(id)
                .then(|| self.keys.get(id).to_string()),
        })
    }

    pub fn cancel(&mut self, ctx: &CallerContext, id: &ProcessId) -> Result<()> {
        let revealed = self.keys.is_revealed(id);
        let record = self.owned_record_mut(ctx, id)?;
        if record.canceled {
            return Err(Error::AlreadyCanceled(*id));
        }
        if revealed {
            return Err(Error::AlreadyRevealed(*id));
        }

        record.canceled = true;
        debug!(process = %id, "process canceled");
        Ok(())
    }

    pub fn status(&self, id: &ProcessId, now: Timestamp) -> Result<ProcessStatus> {
        let record = self.record(id)?;
        let phase = if self.keys.is_revealed(id) {
            Phase::KeyRevealed
        } else if now < record.params.start_time {
            Phase::Created
        } else if now < record.params.end_time {
            Phase::Active
        } else {
            Phase::Ended
        };
        Ok(ProcessStatus {
            phase,
            canceled: record.canceled,
        })
    }

    /// `!canceled && start_time <= now < end_time`
    pub fn is_active(&self, id: &ProcessId, now: Timestamp) -> Result<bool> {
        let record = self.record(id)?;
        Ok(!record.canceled
            && record.params.start_time <= now
            && now < record.params.end_time)
    }

    pub fn add_relay(
        &mut self,
        ctx: &CallerContext,
        id: &ProcessId,
        relay: Address,
        public_key: String,
        messaging_uri: String,
    ) -> Result<()> {
        self.owned_record_mut(ctx, id)?;
        self.relays.register(*id, relay, public_key, messaging_uri)
    }

    /// Disabling an already-disabled relay succeeds without change.
    pub fn disable_relay(&mut self, ctx: &CallerContext, id: &ProcessId, relay: Address) -> Result<()> {
        self.owned_record_mut(ctx, id)?;
        self.relays.disable(*id, relay).map(|_| ())
    }

    pub fn relay_index(&self, id: &ProcessId) -> Result<Vec<Address>> {
        self.record(id)?;
        Ok(self.relays.index(id))
    }

    pub fn is_active_relay(&self, id: &ProcessId, relay: &Address) -> bool {
        self.relays.is_active(id, relay)
    }

    pub fn get_relay(&self, id: &ProcessId, relay: &Address) -> Result<&RelayData> {
        self.record(id)?;
        self.relays.get(id, relay)
    }

    /// Append a batch on behalf of an active relay. Returns the batch index.
    pub fn register_vote_batch(
        &mut self,
        ctx: &CallerContext,
        id: &ProcessId,
        data_content_uri: String,
    ) -> Result<usize> {
        self.record(id)?;
        if !self.relays.is_active(id, &ctx.sender) {
            return Err(Error::Unauthorized(ctx.sender));
        }
        if !self.is_active(id, ctx.now)? {
            return Err(Error::ProcessNotActive(*id));
        }
        Ok(self.batches.append(*id, data_content_uri))
    }

    pub fn vote_batch_count(&self, id: &ProcessId) -> Result<usize> {
        self.record(id)?;
        Ok(self.batches.count(id))
    }

    pub fn get_batch(&self, id: &ProcessId, index: usize) -> Result<&str> {
        self.record(id)?;
        self.batches.get(id, index)
    }

    /// Publish the decryption key. Any relay ever registered for the process
    /// may do so, disabled ones included.
    pub fn reveal_private_key(
        &mut self,
        ctx: &CallerContext,
        id: &ProcessId,
        private_key: String,
    ) -> Result<()> {
        let record = self.record(id)?;
        if !self.relays.contains(id, &ctx.sender) {
            return Err(Error::Unauthorized(ctx.sender));
        }
        let (end_time, canceled) = (record.params.end_time, record.canceled);
        self.keys.reveal(*id, end_time, canceled, ctx.now, private_key)
    }

    /// The revealed key, or `""` while it is still secret.
    pub fn get_private_key(&self, id: &ProcessId) -> Result<&str> {
        self.record(id)?;
        Ok(self.keys.get(id))
    }

    pub fn relays(&self) -> &RelayDirectory {
        &self.relays
    }

    pub fn batches(&self) -> &VoteBatchLedger {
        &self.batches
    }

    pub fn keys(&self) -> &KeyRevealGate {
        &self.keys
    }

    fn record(&self, id: &ProcessId) -> Result<&ProcessRecord> {
        self.processes.get(id).ok_or(Error::NotFound(*id))
    }

    fn owned_record_mut(&mut self, ctx: &CallerContext, id: &ProcessId) -> Result<&mut ProcessRecord> {
        let record = self.processes.get_mut(id).ok_or(Error::NotFound(*id))?;
        if record.entity_address != ctx.sender {
            return Err(Error::Unauthorized(ctx.sender));
        }
        Ok(record)
    }
}
