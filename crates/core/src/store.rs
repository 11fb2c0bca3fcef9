//! The persistent store shared by all components.
//!
//! `Store` owns one partition per component and is the only thing that is
//! snapshotted. [`Store::apply`] dispatches a [`Call`] to the owning
//! component; each component checks every rejection condition before its
//! first write, so a failed call leaves the store untouched.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::{
    Address, Call, CallerContext, EntityResolver, Event, Hash, Outcome, ProcessRegistry, Result,
    Timestamp,
};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    registry: ProcessRegistry,
    resolver: EntityResolver,
    /// Committed signed-call count per sender.
    nonces: BTreeMap<Address, u64>,
    /// `now` of the most recent committed call.
    last_now: Timestamp,
    /// Calls committed since the store was created.
    commits: u64,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> &EntityResolver {
        &self.resolver
    }

    pub fn nonce(&self, sender: &Address) -> u64 {
        self.nonces.get(sender).copied().unwrap_or(0)
    }

    pub(crate) fn bump_nonce(&mut self, sender: Address) {
        *self.nonces.entry(sender).or_insert(0) += 1;
    }

    pub fn last_now(&self) -> Timestamp {
        self.last_now
    }

    /// Number of committed calls; also the sequence number of the next one.
    pub fn commits(&self) -> u64 {
        self.commits
    }

    /// Apply one call as `ctx.sender` at `ctx.now`.
    pub fn apply(&mut self, ctx: &CallerContext, call: Call) -> Result<(Outcome, Vec<Event>)> {
        let applied = match call {
            Call::Create(params) => {
                let process_id = self.registry.create(ctx, params)?;
                (
                    Outcome::Created(process_id),
                    vec![Event::ProcessCreated {
                        entity: ctx.sender,
                        process_id,
                    }],
                )
            }
            Call::Cancel { process_id } => {
                self.registry.cancel(ctx, &process_id)?;
                (Outcome::Done, vec![Event::ProcessCanceled { process_id }])
            }
            Call::AddRelay {
                process_id,
                relay,
                public_key,
                messaging_uri,
            } => {
                self.registry
                    .add_relay(ctx, &process_id, relay, public_key, messaging_uri)?;
                (Outcome::Done, vec![Event::RelayAdded { process_id, relay }])
            }
            Call::DisableRelay { process_id, relay } => {
                let was_active = self.registry.is_active_relay(&process_id, &relay);
                self.registry.disable_relay(ctx, &process_id, relay)?;
                let events = if was_active {
                    vec![Event::RelayDisabled { process_id, relay }]
                } else {
                    Vec::new()
                };
                (Outcome::Done, events)
            }
            Call::RegisterVoteBatch {
                process_id,
                data_content_uri,
            } => {
                let index = self
                    .registry
                    .register_vote_batch(ctx, &process_id, data_content_uri)?;
                (
                    Outcome::Done,
                    vec![Event::BatchRegistered { process_id, index }],
                )
            }
            Call::RevealPrivateKey {
                process_id,
                private_key,
            } => {
                self.registry
                    .reveal_private_key(ctx, &process_id, private_key.clone())?;
                (
                    Outcome::Done,
                    vec![Event::PrivateKeyRevealed {
                        process_id,
                        private_key,
                    }],
                )
            }
            Call::SetAddr { node, address } => {
                self.resolver.set_addr(ctx, &node, address)?;
                (Outcome::Done, vec![Event::AddrChanged { node, address }])
            }
            Call::SetText { node, key, value } => {
                self.resolver.set_text(ctx, &node, &key, value)?;
                (Outcome::Done, vec![Event::TextChanged { node, key }])
            }
            Call::SetListText {
                node,
                key,
                index,
                value,
            } => {
                self.resolver.set_list_text(ctx, &node, &key, index, value)?;
                (
                    Outcome::Done,
                    vec![Event::ListItemChanged { node, key, index }],
                )
            }
            Call::PushListText { node, key, value } => {
                let len = self.resolver.push_list_text(ctx, &node, &key, value)?;
                (
                    Outcome::Length(len),
                    vec![Event::ListItemChanged {
                        node,
                        key,
                        index: len - 1,
                    }],
                )
            }
            Call::RemoveListIndex { node, key, index } => {
                self.resolver.remove_list_index(ctx, &node, &key, index)?;
                (
                    Outcome::Done,
                    vec![Event::ListItemRemoved { node, key, index }],
                )
            }
        };

        self.last_now = self.last_now.max(ctx.now);
        self.commits += 1;
        Ok(applied)
    }

    /// CBOR encoding of the whole store.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)?;
        Ok(buf)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(ciborium::from_reader(bytes)?)
    }

    /// Content hash of the store. Replicas that applied the same calls agree.
    pub fn state_hash(&self) -> Result<Hash> {
        Hash::of_value(self)
    }

    /// Write a snapshot, replacing any previous one only once fully written.
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes()?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let tmp = path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_bytes(&fs::read(path)?)
    }
}
