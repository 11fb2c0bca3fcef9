//! Caller identities and time.
//!
//! Every mutating call carries a [`CallerContext`]: the authenticated sender
//! and the single `now` reading the call executes against.

use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::Hash;

/// Absolute time in seconds since the UNIX epoch.
pub type Timestamp = u64;

/// A 20-byte caller identity.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// The unset sentinel.
    pub const ZERO: Self = Self([0u8; 20]);

    /// Derive the address owned by an ed25519 key: the trailing 20 bytes of
    /// BLAKE3(public key).
    pub fn from_public_key(key: &VerifyingKey) -> Self {
        let digest = Hash::of(key.as_bytes());
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest.0[12..]);
        Self(bytes)
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address(0x{})", hex::encode(self.0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(s.strip_prefix("0x").unwrap_or(s), &mut bytes)?;
        Ok(Self(bytes))
    }
}

/// Identity and time attached to a single call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerContext {
    pub sender: Address,
    pub now: Timestamp,
}

impl CallerContext {
    pub fn new(sender: Address, now: Timestamp) -> Self {
        Self { sender, now }
    }
}

/// Source of `now` for calls that arrive without one.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock seconds.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// A clock that only moves when told to. Clones share the same reading.
#[derive(Clone, Default)]
pub struct ManualClock(Arc<AtomicU64>);

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self(Arc::new(AtomicU64::new(start)))
    }

    pub fn set(&self, now: Timestamp) {
        self.0.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;

    #[test]
    fn address_is_stable_per_key() {
        let key = SigningKey::generate(&mut OsRng).verifying_key();
        assert_eq!(Address::from_public_key(&key), Address::from_public_key(&key));
        assert!(!Address::from_public_key(&key).is_zero());
    }

    #[test]
    fn address_parses_with_and_without_prefix() {
        let a = Address([7u8; 20]);
        assert_eq!(a.to_string().parse::<Address>().unwrap(), a);
        assert_eq!(hex::encode(a.0).parse::<Address>().unwrap(), a);
        assert!("0x1234".parse::<Address>().is_err());
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new(100);
        let handle = clock.clone();
        handle.advance(5);
        assert_eq!(clock.now(), 105);
        handle.set(10);
        assert_eq!(clock.now(), 10);
    }
}
