//! Transaction essences, unlocks, and submitted blocks.
//!
//! These are plain data; assembly, commitment hashing and signing live in
//! the chain crate.

use ed25519_dalek::{Signature, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::{hexser, Network, Output, OutputId, TransferId};

/// The signable core of a transaction.
///
/// `inputs` and `outputs` are **ordered**; unlocks are matched to inputs by
/// position, and the commitment binds the exact consumed outputs in input
/// order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Essence {
    pub network: Network,
    pub inputs: Vec<OutputId>,
    /// Digest of the consumed outputs, in input order. Proves the signer saw
    /// the same outputs the node will spend.
    #[serde(
        serialize_with = "hexser::serialize",
        deserialize_with = "hexser::deserialize_fixed"
    )]
    pub inputs_commitment: [u8; 32],
    pub outputs: Vec<Output>,
}

/// Authorization for one input, by position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Unlock {
    /// An ed25519 signature over the essence digest.
    Signature {
        public_key: VerifyingKey,
        signature: Signature,
    },
    /// Reuses the signature unlock at `index` (an earlier input locked to
    /// the same address).
    Reference { index: u16 },
}

/// A fully signed transaction ready for submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedTransactionPayload {
    pub essence: Essence,
    pub unlocks: Vec<Unlock>,
}

/// A transaction accepted by a node, with the block id it travels in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmittedBlock {
    pub block_id: TransferId,
    pub payload: SignedTransactionPayload,
}
