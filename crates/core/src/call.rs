//! Calls, their outcomes, and the events they leave behind.
//!
//! A [`SignedCall`] is the authenticated envelope callers submit: the call is
//! signed with the sender's ed25519 key and the sender address is derived
//! from that key, so it cannot be forged.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::{Address, Error, Node, ProcessId, ProcessParams, Result};

/// Every mutating operation, with its arguments in call order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Call {
    Create(ProcessParams),
    Cancel {
        process_id: ProcessId,
    },
    AddRelay {
        process_id: ProcessId,
        relay: Address,
        public_key: String,
        messaging_uri: String,
    },
    DisableRelay {
        process_id: ProcessId,
        relay: Address,
    },
    RegisterVoteBatch {
        process_id: ProcessId,
        data_content_uri: String,
    },
    RevealPrivateKey {
        process_id: ProcessId,
        private_key: String,
    },
    SetAddr {
        node: Node,
        address: Address,
    },
    SetText {
        node: Node,
        key: String,
        value: String,
    },
    SetListText {
        node: Node,
        key: String,
        index: usize,
        value: String,
    },
    PushListText {
        node: Node,
        key: String,
        value: String,
    },
    RemoveListIndex {
        node: Node,
        key: String,
        index: usize,
    },
}

impl Call {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Call::Create(_) => "create",
            Call::Cancel { .. } => "cancel",
            Call::AddRelay { .. } => "add_relay",
            Call::DisableRelay { .. } => "disable_relay",
            Call::RegisterVoteBatch { .. } => "register_vote_batch",
            Call::RevealPrivateKey { .. } => "reveal_private_key",
            Call::SetAddr { .. } => "set_addr",
            Call::SetText { .. } => "set_text",
            Call::SetListText { .. } => "set_list_text",
            Call::PushListText { .. } => "push_list_text",
            Call::RemoveListIndex { .. } => "remove_list_index",
        }
    }
}

/// What a successful call returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// A process was created with this id.
    Created(ProcessId),
    /// New length of a list after a push.
    Length(usize),
    Done,
}

/// Audit record of a committed change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ProcessCreated {
        entity: Address,
        process_id: ProcessId,
    },
    ProcessCanceled {
        process_id: ProcessId,
    },
    RelayAdded {
        process_id: ProcessId,
        relay: Address,
    },
    RelayDisabled {
        process_id: ProcessId,
        relay: Address,
    },
    BatchRegistered {
        process_id: ProcessId,
        index: usize,
    },
    PrivateKeyRevealed {
        process_id: ProcessId,
        private_key: String,
    },
    AddrChanged {
        node: Node,
        address: Address,
    },
    TextChanged {
        node: Node,
        key: String,
    },
    ListItemChanged {
        node: Node,
        key: String,
        index: usize,
    },
    ListItemRemoved {
        node: Node,
        key: String,
        index: usize,
    },
}

/// A call signed by its sender.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignedCall {
    /// Sender's ed25519 public key.
    pub public_key: [u8; 32],

    /// Per-sender sequence number; must equal the number of calls the
    /// sender has committed so far.
    pub nonce: u64,

    pub call: Call,

    /// Ed25519 signature over `(public_key, nonce, call)`.
    pub signature: Vec<u8>,
}

#[derive(Serialize)]
struct SignableCall<'a> {
    public_key: &'a [u8; 32],
    nonce: u64,
    call: &'a Call,
}

impl SignedCall {
    /// Sign `call` with `signing_key`.
    pub fn new(call: Call, nonce: u64, signing_key: &SigningKey) -> Result<Self> {
        let mut signed = Self {
            public_key: signing_key.verifying_key().to_bytes(),
            nonce,
            call,
            signature: Vec::new(),
        };
        let content = signed.signable_content()?;
        signed.signature = signing_key.sign(&content).to_bytes().to_vec();
        Ok(signed)
    }

    fn signable_content(&self) -> Result<Vec<u8>> {
        let signable = SignableCall {
            public_key: &self.public_key,
            nonce: self.nonce,
            call: &self.call,
        };
        let mut buf = Vec::new();
        ciborium::into_writer(&signable, &mut buf)?;
        Ok(buf)
    }

    /// Address the envelope claims to come from.
    pub fn sender(&self) -> Result<Address> {
        let key = VerifyingKey::from_bytes(&self.public_key)
            .map_err(|_| Error::InvalidSignature(Address::ZERO))?;
        Ok(Address::from_public_key(&key))
    }

    /// Verify the signature and return the authenticated sender.
    pub fn authenticate(&self) -> Result<Address> {
        let key = VerifyingKey::from_bytes(&self.public_key)
            .map_err(|_| Error::InvalidSignature(Address::ZERO))?;
        let sender = Address::from_public_key(&key);

        let sig_bytes: [u8; 64] = self
            .signature
            .as_slice()
            .try_into()
            .map_err(|_| Error::InvalidSignature(sender))?;
        let signature = Signature::from_bytes(&sig_bytes);

        key.verify(&self.signable_content()?, &signature)
            .map_err(|_| Error::InvalidSignature(sender))?;
        Ok(sender)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    fn cancel_call() -> Call {
        Call::Cancel {
            process_id: crate::Hash::of(b"p"),
        }
    }

    #[test]
    fn signed_call_authenticates_sender() {
        let key = SigningKey::generate(&mut OsRng);
        let signed = SignedCall::new(cancel_call(), 0, &key).unwrap();

        let sender = signed.authenticate().unwrap();
        assert_eq!(sender, Address::from_public_key(&key.verifying_key()));
        assert_eq!(signed.sender().unwrap(), sender);
    }

    #[test]
    fn tampered_call_rejected() {
        let key = SigningKey::generate(&mut OsRng);
        let mut signed = SignedCall::new(cancel_call(), 0, &key).unwrap();
        signed.nonce = 1;
        assert!(matches!(signed.authenticate(), Err(Error::InvalidSignature(_))));
    }

    #[test]
    fn swapped_key_rejected() {
        let key = SigningKey::generate(&mut OsRng);
        let other = SigningKey::generate(&mut OsRng);
        let mut signed = SignedCall::new(cancel_call(), 0, &key).unwrap();
        signed.public_key = other.verifying_key().to_bytes();
        assert!(signed.authenticate().is_err());
    }

    #[test]
    fn truncated_signature_rejected() {
        let key = SigningKey::generate(&mut OsRng);
        let mut signed = SignedCall::new(cancel_call(), 0, &key).unwrap();
        signed.signature.truncate(10);
        assert!(signed.authenticate().is_err());
    }
}
