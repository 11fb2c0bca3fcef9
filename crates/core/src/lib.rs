//! relayvote-core: process lifecycle and relay coordination for relayed,
//! encrypted voting.
//!
//! - `ProcessRegistry`: voting processes, their relays, vote batches and the
//!   post-election key reveal
//! - `EntityResolver`: per-entity metadata (address, text, text lists)
//! - `Ledger`: orders calls, commits them atomically and keeps receipts

mod hash;
mod error;
mod identity;
mod relay;
mod batch;
mod reveal;
mod process;
mod resolver;
mod call;
mod store;
mod config;
mod ledger;

pub use hash::Hash;
pub use error::{Error, Result};
pub use identity::{Address, CallerContext, Clock, ManualClock, SystemClock, Timestamp};
pub use relay::{RelayData, RelayDirectory};
pub use batch::VoteBatchLedger;
pub use reveal::KeyRevealGate;
pub use process::{
    Phase, ProcessData, ProcessId, ProcessParams, ProcessRegistry, ProcessStatus,
    PROCESS_ID_DOMAIN, process_id,
};
pub use resolver::{
    ADDR_SIGNATURES, EntityResolver, InterfaceId, LIST_TEXT_SIGNATURES, META_SIGNATURES, Node,
    TEXT_SIGNATURES, entity_id,
};
pub use call::{Call, Event, Outcome, SignedCall};
pub use store::Store;
pub use config::LedgerConfig;
pub use ledger::{Ledger, Receipt};

/// Re-export for convenience
pub use ed25519_dalek::{SigningKey, VerifyingKey};
