//! The ledger: the single point where calls are ordered and committed.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, info, warn};

use crate::{
    Address, Call, CallerContext, Clock, EntityResolver, Error, Event, Hash, LedgerConfig, Outcome,
    ProcessRegistry, Result, SignedCall, Store, Timestamp,
};

/// Record of one committed call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Position in the global commit order, starting at 0.
    pub seq: u64,
    pub sender: Address,
    pub now: Timestamp,
    pub call: Call,
    pub outcome: Outcome,
    pub events: Vec<Event>,
}

/// Applies calls one at a time against the store.
pub struct Ledger {
    store: Store,
    clock: Box<dyn Clock>,
    config: LedgerConfig,
    receipts: VecDeque<Receipt>,
}

impl Ledger {
    /// Create an empty in-memory ledger.
    pub fn new(clock: Box<dyn Clock>) -> Self {
        Self::with_store(Store::new(), clock, LedgerConfig::default())
    }

    pub fn with_store(store: Store, clock: Box<dyn Clock>, config: LedgerConfig) -> Self {
        Self {
            store,
            clock,
            config,
            receipts: VecDeque::new(),
        }
    }

    /// Open a ledger, restoring the configured snapshot if one exists.
    pub fn open(config: LedgerConfig, clock: Box<dyn Clock>) -> Result<Self> {
        let store = match &config.snapshot_path {
            Some(path) if path.exists() => {
                let store = Store::load(path)?;
                info!(
                    path = %path.display(),
                    commits = store.commits(),
                    last_now = store.last_now(),
                    "restored snapshot"
                );
                store
            }
            _ => Store::new(),
        };
        Ok(Self::with_store(store, clock, config))
    }

    /// Write the store to the configured snapshot path. A no-op without one.
    pub fn save(&self) -> Result<()> {
        if let Some(path) = &self.config.snapshot_path {
            self.store.save(path)?;
            debug!(path = %path.display(), "snapshot saved");
        }
        Ok(())
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn registry(&self) -> &ProcessRegistry {
        self.store.registry()
    }

    pub fn resolver(&self) -> &EntityResolver {
        self.store.resolver()
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Current reading of the ledger's clock.
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn state_hash(&self) -> Result<Hash> {
        self.store.state_hash()
    }

    /// Retained receipts, oldest first.
    pub fn receipts(&self) -> impl Iterator<Item = &Receipt> {
        self.receipts.iter()
    }

    /// Events of the retained receipts in commit order.
    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.receipts.iter().flat_map(|r| r.events.iter())
    }

    /// Authenticate a signed call and execute it at the clock's current time.
    ///
    /// A rejected envelope does not consume its nonce, so anyone holding it
    /// may resubmit it until the sender commits another call.
    pub fn submit(&mut self, signed: SignedCall) -> Result<Outcome> {
        let sender = signed.authenticate()?;
        let expected = self.store.nonce(&sender);
        if signed.nonce != expected {
            warn!(%sender, expected, got = signed.nonce, "signed call out of sequence");
            return Err(Error::InvalidNonce {
                expected,
                got: signed.nonce,
            });
        }

        let ctx = CallerContext::new(sender, self.clock.now());
        let outcome = self.execute(ctx, signed.call)?;
        self.store.bump_nonce(sender);
        Ok(outcome)
    }

    /// Execute a call for an already-authenticated caller.
    pub fn execute(&mut self, ctx: CallerContext, call: Call) -> Result<Outcome> {
        let last = self.store.last_now();
        if self.config.enforce_monotonic_clock && ctx.now < last {
            warn!(sender = %ctx.sender, last, now = ctx.now, "clock regression");
            return Err(Error::ClockRegression { last, now: ctx.now });
        }

        let name = call.name();
        let seq = self.store.commits();
        let (outcome, events) = match self.store.apply(&ctx, call.clone()) {
            Ok(applied) => applied,
            Err(e) => {
                warn!(call = name, sender = %ctx.sender, error = %e, "call rejected");
                return Err(e);
            }
        };

        for event in &events {
            match event {
                Event::ProcessCreated { entity, process_id } => {
                    info!(%entity, process = %process_id, "process created")
                }
                Event::ProcessCanceled { process_id } => {
                    info!(process = %process_id, "process canceled")
                }
                Event::PrivateKeyRevealed { process_id, .. } => {
                    info!(process = %process_id, "private key revealed")
                }
                _ => {}
            }
        }

        self.record(Receipt {
            seq,
            sender: ctx.sender,
            now: ctx.now,
            call,
            outcome,
            events,
        });
        Ok(outcome)
    }

    fn record(&mut self, receipt: Receipt) {
        debug!(seq = receipt.seq, call = receipt.call.name(), "committed");
        self.receipts.push_back(receipt);
        while self.receipts.len() > self.config.history_limit {
            self.receipts.pop_front();
        }
    }
}
