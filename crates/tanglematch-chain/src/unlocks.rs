//! Unlock planning and signing.
//!
//! Each distinct owning address signs exactly once, at the position of its
//! first input. Every later input owned by the same address carries a
//! reference unlock pointing back at that signature. Unlock order mirrors
//! input order, so `unlocks[i]` always authorizes `essence.inputs[i]`.

use std::collections::HashMap;

use ed25519_dalek::{Signer, SigningKey};
use tanglematch_types::{Address, Essence, Result, TanglematchError, Unlock};

use crate::essence::signing_digest;

/// What position `i` in the unlock list must contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockPlan {
    /// First input owned by `address`; a fresh signature goes here.
    Sign { address: Address },
    /// Later input owned by an address that already signed at `index`.
    Reference { index: u16 },
}

/// Plan unlocks for inputs owned by `owners`, in input order.
#[must_use]
pub fn plan_unlocks(owners: &[Address]) -> Vec<UnlockPlan> {
    let mut first_seen: HashMap<Address, u16> = HashMap::new();
    let mut plans = Vec::with_capacity(owners.len());
    for (position, owner) in owners.iter().enumerate() {
        match first_seen.get(owner) {
            Some(&index) => plans.push(UnlockPlan::Reference { index }),
            None => {
                first_seen.insert(*owner, position as u16);
                plans.push(UnlockPlan::Sign { address: *owner });
            }
        }
    }
    plans
}

/// Produce the unlock list for `essence`, one entry per input.
///
/// `owners[i]` must be the address that owns `essence.inputs[i]`. Fails with
/// [`TanglematchError::KeyRecordMissing`] when a signing key for an owning
/// address is absent.
pub fn sign_unlocks(
    essence: &Essence,
    owners: &[Address],
    keys: &HashMap<Address, SigningKey>,
) -> Result<Vec<Unlock>> {
    if owners.len() != essence.inputs.len() {
        return Err(TanglematchError::Internal(format!(
            "{} owners for {} inputs",
            owners.len(),
            essence.inputs.len()
        )));
    }

    let digest = signing_digest(essence)?;
    let mut unlocks = Vec::with_capacity(owners.len());
    for plan in plan_unlocks(owners) {
        match plan {
            UnlockPlan::Sign { address } => {
                let key = keys
                    .get(&address)
                    .ok_or(TanglematchError::KeyRecordMissing(address))?;
                unlocks.push(Unlock::Signature {
                    public_key: key.verifying_key(),
                    signature: key.sign(&digest),
                });
            }
            UnlockPlan::Reference { index } => unlocks.push(Unlock::Reference { index }),
        }
    }
    Ok(unlocks)
}
