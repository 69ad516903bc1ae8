//! Essence assembly and canonical digests.
//!
//! The inputs commitment binds the exact outputs being consumed, in input
//! order: a Blake2b-256 over the per-output Blake2b-256 digests of their
//! canonical JSON encoding. A node holding a different view of any consumed
//! output computes a different commitment and rejects the transaction.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use tanglematch_types::{Essence, Network, Output, Result, TanglematchError};

use tanglematch_nodes::UnspentOutput;

type Blake2b256 = Blake2b<U32>;

/// Protocol ceiling on inputs per transaction.
pub const MAX_TX_INPUTS: usize = 128;

/// Protocol ceiling on outputs per transaction.
pub const MAX_TX_OUTPUTS: usize = 128;

/// Digest of the consumed outputs, in input order.
pub fn inputs_commitment(inputs: &[UnspentOutput]) -> Result<[u8; 32]> {
    let mut acc = Blake2b256::new();
    acc.update(b"tanglematch:inputs:v1:");
    acc.update((inputs.len() as u64).to_le_bytes());
    for input in inputs {
        let mut output_hash = Blake2b256::new();
        output_hash.update(serde_json::to_vec(&input.output)?);
        acc.update(output_hash.finalize());
    }
    Ok(acc.finalize().into())
}

/// The digest unlock signatures are computed over.
pub fn signing_digest(essence: &Essence) -> Result<[u8; 32]> {
    let mut hasher = Blake2b256::new();
    hasher.update(b"tanglematch:essence:v1:");
    hasher.update(serde_json::to_vec(essence)?);
    Ok(hasher.finalize().into())
}

/// Assemble an essence from the outputs to consume and the outputs to create.
///
/// Input order is preserved exactly as given; unlocks are later matched to
/// inputs by position.
pub fn assemble(
    network: Network,
    inputs: &[UnspentOutput],
    outputs: Vec<Output>,
) -> Result<Essence> {
    if inputs.is_empty() {
        return Err(TanglematchError::Internal(
            "transaction needs at least one input".into(),
        ));
    }
    if inputs.len() > MAX_TX_INPUTS {
        return Err(TanglematchError::TransactionRejected {
            reason: format!("{} inputs exceed the protocol maximum", inputs.len()),
        });
    }
    if outputs.is_empty() || outputs.len() > MAX_TX_OUTPUTS {
        return Err(TanglematchError::TransactionRejected {
            reason: format!("{} outputs outside the protocol bounds", outputs.len()),
        });
    }

    Ok(Essence {
        network,
        inputs: inputs.iter().map(|i| i.output_id).collect(),
        inputs_commitment: inputs_commitment(inputs)?,
        outputs,
    })
}
