//! Globally unique identifiers used throughout TangleMatch.
//!
//! Platform-side entities (orders, members, ledger entries, domain records)
//! use UUIDv7 for time-ordered lexicographic sorting. Chain-side entities
//! (transfers, outputs, tokens, identities, NFTs) use the fixed-size byte
//! identifiers the ledger itself assigns, hex-serialized.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::hexser;

// ---------------------------------------------------------------------------
// OrderId
// ---------------------------------------------------------------------------

/// Globally unique order identifier. Uses UUIDv7 for time-ordered sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct OrderId(pub Uuid);

impl OrderId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Extract the embedded timestamp (milliseconds since UNIX epoch) from UUIDv7.
    #[must_use]
    pub fn timestamp_ms(&self) -> u64 {
        let bytes = self.0.as_bytes();
        u64::from_be_bytes([
            0, 0, bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5],
        ])
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// MemberId
// ---------------------------------------------------------------------------

/// Unique identifier for a platform member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct MemberId(pub Uuid);

impl MemberId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }
}

impl Default for MemberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// EntryId
// ---------------------------------------------------------------------------

/// Globally unique ledger-entry identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct EntryId(pub Uuid);

impl EntryId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Deterministic `EntryId` from the order, the satisfying transfer and the
    /// entry's role within the reconciliation.
    ///
    /// A redelivered transfer produces the **exact same** entry ids, so a
    /// retried commit overwrites its own documents instead of minting new ones.
    #[must_use]
    pub fn deterministic(order: OrderId, transfer: TransferId, role: &str) -> Self {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(b"tanglematch:entry_id:v1:");
        hasher.update(order.0.as_bytes());
        hasher.update(transfer.0);
        hasher.update(role.as_bytes());
        let hash = hasher.finalize();
        let bytes: [u8; 16] = hash[..16].try_into().expect("SHA-256 produces 32 bytes");
        Self(Uuid::from_bytes(bytes))
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// TransferId
// ---------------------------------------------------------------------------

/// Identifier of a confirmed ledger block carrying a transfer (32 bytes).
///
/// This is the idempotence key of the whole reconciliation path: one
/// `TransferId` reconciles an order at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct TransferId(pub [u8; 32]);

impl TransferId {
    #[must_use]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hexser::encode(&self.0))
    }
}

impl Serialize for TransferId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        hexser::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for TransferId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        hexser::deserialize_fixed::<D, 32>(deserializer).map(Self)
    }
}

// ---------------------------------------------------------------------------
// OutputId
// ---------------------------------------------------------------------------

/// Identifier of a single transaction output on the ledger:
/// 32-byte transaction id followed by a little-endian u16 output index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct OutputId(pub [u8; 34]);

impl OutputId {
    #[must_use]
    pub fn from_parts(transaction_id: [u8; 32], index: u16) -> Self {
        let mut bytes = [0u8; 34];
        bytes[..32].copy_from_slice(&transaction_id);
        bytes[32..].copy_from_slice(&index.to_le_bytes());
        Self(bytes)
    }

    #[must_use]
    pub fn transaction_id(&self) -> [u8; 32] {
        self.0[..32].try_into().expect("34-byte id has a 32-byte prefix")
    }

    #[must_use]
    pub fn index(&self) -> u16 {
        u16::from_le_bytes([self.0[32], self.0[33]])
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 34] {
        &self.0
    }
}

impl fmt::Display for OutputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hexser::encode(&self.0))
    }
}

impl Serialize for OutputId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        hexser::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for OutputId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        hexser::deserialize_fixed::<D, 34>(deserializer).map(Self)
    }
}

// ---------------------------------------------------------------------------
// TokenId
// ---------------------------------------------------------------------------

/// Identifier of a native token class (38 bytes: the id of the foundry that
/// minted it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct TokenId(pub [u8; 38]);

impl TokenId {
    #[must_use]
    pub fn from_bytes(bytes: [u8; 38]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 38] {
        &self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hexser::encode(&self.0))
    }
}

impl Serialize for TokenId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        hexser::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for TokenId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        hexser::deserialize_fixed::<D, 38>(deserializer).map(Self)
    }
}

// ---------------------------------------------------------------------------
// IdentityId
// ---------------------------------------------------------------------------

/// Identifier of an on-chain identity container (32 bytes, assigned by the
/// ledger when the identity output is first created).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct IdentityId(pub [u8; 32]);

impl IdentityId {
    /// The all-zero id a freshly minted identity output carries before the
    /// ledger assigns its real id.
    #[must_use]
    pub fn null() -> Self {
        Self([0u8; 32])
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hexser::encode(&self.0))
    }
}

impl Serialize for IdentityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        hexser::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for IdentityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        hexser::deserialize_fixed::<D, 32>(deserializer).map(Self)
    }
}

// ---------------------------------------------------------------------------
// NftId
// ---------------------------------------------------------------------------

/// Identifier of an NFT (32 bytes, assigned by the ledger on first mint).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct NftId(pub [u8; 32]);

impl NftId {
    /// The all-zero id a freshly minted NFT output carries before the ledger
    /// assigns its real id.
    #[must_use]
    pub fn null() -> Self {
        Self([0u8; 32])
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Display for NftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hexser::encode(&self.0))
    }
}

impl Serialize for NftId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        hexser::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for NftId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        hexser::deserialize_fixed::<D, 32>(deserializer).map(Self)
    }
}

// ---------------------------------------------------------------------------
// Domain record identifiers
// ---------------------------------------------------------------------------

/// Unique identifier for an award campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct AwardId(pub Uuid);

impl AwardId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for AwardId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AwardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "award:{}", self.0)
    }
}

/// Unique identifier for a governance proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ProposalId(pub Uuid);

impl ProposalId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ProposalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "proposal:{}", self.0)
    }
}

/// Unique identifier for a content stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct StampId(pub Uuid);

impl StampId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for StampId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StampId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stamp:{}", self.0)
    }
}

/// Unique identifier for a two-party asset swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct SwapId(pub Uuid);

impl SwapId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SwapId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SwapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "swap:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

#[cfg(any(test, feature = "test-helpers"))]
impl TransferId {
    pub fn dummy() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }
}

#[cfg(any(test, feature = "test-helpers"))]
impl OutputId {
    pub fn dummy() -> Self {
        use rand::RngCore;
        let mut tx = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut tx);
        Self::from_parts(tx, 0)
    }
}

#[cfg(any(test, feature = "test-helpers"))]
impl TokenId {
    pub fn dummy() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; 38];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }
}

#[cfg(any(test, feature = "test-helpers"))]
impl NftId {
    pub fn dummy() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }
}

#[cfg(any(test, feature = "test-helpers"))]
impl IdentityId {
    pub fn dummy() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_id_uniqueness() {
        let a = OrderId::new();
        let b = OrderId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn order_id_ordering() {
        let a = OrderId::new();
        let b = OrderId::new();
        assert!(a < b);
    }

    #[test]
    fn entry_id_deterministic() {
        let order = OrderId::new();
        let transfer = TransferId::dummy();
        let a = EntryId::deterministic(order, transfer, "credit");
        let b = EntryId::deterministic(order, transfer, "credit");
        assert_eq!(a, b);
        let c = EntryId::deterministic(order, transfer, "payment");
        assert_ne!(a, c);
        let d = EntryId::deterministic(order, TransferId::dummy(), "credit");
        assert_ne!(a, d);
    }

    #[test]
    fn output_id_parts() {
        let tx = [7u8; 32];
        let id = OutputId::from_parts(tx, 513);
        assert_eq!(id.transaction_id(), tx);
        assert_eq!(id.index(), 513);
    }

    #[test]
    fn output_id_hex_serde() {
        let id = OutputId::dummy();
        let json = serde_json::to_string(&id).unwrap();
        assert!(json.starts_with("\"0x"));
        let back: OutputId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn transfer_id_hex_serde() {
        let id = TransferId::dummy();
        let json = serde_json::to_string(&id).unwrap();
        let back: TransferId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn token_id_display_is_prefixed_hex() {
        let id = TokenId([0x11u8; 38]);
        let shown = id.to_string();
        assert!(shown.starts_with("0x1111"));
        assert_eq!(shown.len(), 2 + 38 * 2);
    }

    #[test]
    fn null_chain_ids() {
        assert!(NftId::null().is_null());
        assert!(IdentityId::null().is_null());
        assert!(!NftId::dummy().is_null());
    }
}
