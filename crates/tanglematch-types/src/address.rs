//! Ledger addresses.
//!
//! An address is the Blake2b-256 digest of an ed25519 public key. Addresses
//! are serialized as `0x`-prefixed hex; the human bech32 rendering belongs to
//! outer UI layers, not the engine.

use std::fmt;

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::hexser;

type Blake2b256 = Blake2b<U32>;

/// A 32-byte ed25519 ledger address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct Address(pub [u8; 32]);

impl Address {
    #[must_use]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derive the address of an ed25519 public key.
    #[must_use]
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        let mut hasher = Blake2b256::new();
        hasher.update(key.as_bytes());
        Self(hasher.finalize().into())
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Abbreviated form for log lines.
    #[must_use]
    pub fn short(&self) -> String {
        format!("0x{}..", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hexser::encode(&self.0))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        hexser::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        hexser::deserialize_fixed::<D, 32>(deserializer).map(Self)
    }
}

#[cfg(any(test, feature = "test-helpers"))]
impl Address {
    pub fn dummy() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }
}
