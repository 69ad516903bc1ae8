//! Confirmed inbound transfers, as reported by the chain watcher.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    Address, IdentityId, NativeToken, Network, NftId, RequestPayload, TransferId, UnlockCondition,
};

/// What kind of output the sender consumed to make the transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ConsumedOutputKind {
    Value,
    Nft { id: NftId },
    Identity { id: IdentityId },
}

/// An immutable record of one confirmed transfer into a deposit address.
///
/// Produced by the out-of-process chain watcher, delivered at least once.
/// The matcher treats it as a pure fact and never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservedTransfer {
    pub transfer_id: TransferId,
    pub network: Network,
    pub source_address: Address,
    pub target_address: Address,
    pub amount: u64,
    pub native_tokens: Vec<NativeToken>,
    pub consumed: ConsumedOutputKind,
    /// Unlock conditions present on the consumed output. Drives the
    /// refundability screen.
    pub unlock_conditions: Vec<UnlockCondition>,
    /// Request payload embedded in the transfer itself, when the sender used
    /// the on-chain request path instead of a pre-created order.
    pub request: Option<RequestPayload>,
    pub observed_at: DateTime<Utc>,
}

impl ObservedTransfer {
    /// True when the consumed output is time-locked.
    #[must_use]
    pub fn has_timelock(&self) -> bool {
        self.unlock_conditions
            .iter()
            .any(|c| matches!(c, UnlockCondition::Timelock { .. }))
    }

    /// True when the consumed output demands a storage-deposit return to an
    /// address other than the transfer's source. Refunding such a deposit to
    /// the source would strand the return obligation.
    #[must_use]
    pub fn has_foreign_storage_return(&self) -> bool {
        self.unlock_conditions.iter().any(|c| {
            matches!(
                c,
                UnlockCondition::StorageDepositReturn { return_address, .. }
                    if *return_address != self.source_address
            )
        })
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl ObservedTransfer {
    pub fn dummy(source_address: Address, target_address: Address, amount: u64) -> Self {
        Self {
            transfer_id: TransferId::dummy(),
            network: Network::Rms,
            source_address,
            target_address,
            amount,
            native_tokens: Vec::new(),
            consumed: ConsumedOutputKind::Value,
            unlock_conditions: vec![UnlockCondition::Address {
                address: target_address,
            }],
            request: None,
            observed_at: Utc::now(),
        }
    }
}
