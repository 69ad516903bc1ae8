//! The transaction output model.
//!
//! Three output kinds exist on the ledger from the engine's perspective:
//!
//! - **Value** — plain funds (base coin + native tokens) locked to an address.
//! - **Identity** — a stateful container with separate state-controller and
//!   governor owners; carries a minting counter for outputs created under it.
//! - **Nft** — a unique token with immutable issuer/metadata.
//!
//! Unlock-condition and feature lists are **ordered**; the ledger's binary
//! encoding is position-sensitive, so transformations must preserve element
//! order.

use serde::{Deserialize, Serialize};

use crate::{Address, IdentityId, NativeToken, NftId};

/// Discriminator for the three output kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputKind {
    Value,
    Identity,
    Nft,
}

impl std::fmt::Display for OutputKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value => write!(f, "VALUE"),
            Self::Identity => write!(f, "IDENTITY"),
            Self::Nft => write!(f, "NFT"),
        }
    }
}

/// A spending restriction attached to an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum UnlockCondition {
    /// Spendable by `address`.
    Address { address: Address },
    /// The consumer must send `amount` back to `return_address` in the same
    /// transaction.
    StorageDepositReturn { return_address: Address, amount: u64 },
    /// Not spendable before `unix_time` (seconds).
    Timelock { unix_time: u32 },
    /// Ownership reverts to `return_address` at `unix_time` if unspent.
    Expiration { return_address: Address, unix_time: u32 },
    /// May perform state transitions on an identity output.
    StateControllerAddress { address: Address },
    /// May perform governance transitions on an identity output.
    GovernorAddress { address: Address },
}

/// Kind tag of an [`UnlockCondition`], for replace-by-kind transformations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnlockConditionKind {
    Address,
    StorageDepositReturn,
    Timelock,
    Expiration,
    StateControllerAddress,
    GovernorAddress,
}

impl UnlockCondition {
    #[must_use]
    pub fn kind(&self) -> UnlockConditionKind {
        match self {
            Self::Address { .. } => UnlockConditionKind::Address,
            Self::StorageDepositReturn { .. } => UnlockConditionKind::StorageDepositReturn,
            Self::Timelock { .. } => UnlockConditionKind::Timelock,
            Self::Expiration { .. } => UnlockConditionKind::Expiration,
            Self::StateControllerAddress { .. } => UnlockConditionKind::StateControllerAddress,
            Self::GovernorAddress { .. } => UnlockConditionKind::GovernorAddress,
        }
    }

    /// The address this condition points at, if it carries one.
    #[must_use]
    pub fn address(&self) -> Option<Address> {
        match self {
            Self::Address { address }
            | Self::StateControllerAddress { address }
            | Self::GovernorAddress { address } => Some(*address),
            Self::StorageDepositReturn { return_address, .. }
            | Self::Expiration { return_address, .. } => Some(*return_address),
            Self::Timelock { .. } => None,
        }
    }
}

/// A data annotation attached to an output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Feature {
    Sender { address: Address },
    Issuer { address: Address },
    Metadata { data: String },
    Tag { tag: String },
}

/// Plain funds locked to an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueOutput {
    pub amount: u64,
    pub native_tokens: Vec<NativeToken>,
    pub unlock_conditions: Vec<UnlockCondition>,
    pub features: Vec<Feature>,
}

/// A stateful identity container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityOutput {
    pub amount: u64,
    pub native_tokens: Vec<NativeToken>,
    pub identity_id: IdentityId,
    /// Incremented on every state transition.
    pub state_index: u32,
    pub state_metadata: String,
    /// Counts outputs minted under this identity.
    pub mint_counter: u32,
    pub unlock_conditions: Vec<UnlockCondition>,
    pub features: Vec<Feature>,
    pub immutable_features: Vec<Feature>,
}

/// A unique token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftOutput {
    pub amount: u64,
    pub native_tokens: Vec<NativeToken>,
    pub nft_id: NftId,
    pub unlock_conditions: Vec<UnlockCondition>,
    pub features: Vec<Feature>,
    pub immutable_features: Vec<Feature>,
}

/// A transaction output of any kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Output {
    Value(ValueOutput),
    Identity(IdentityOutput),
    Nft(NftOutput),
}

impl Output {
    #[must_use]
    pub fn kind(&self) -> OutputKind {
        match self {
            Self::Value(_) => OutputKind::Value,
            Self::Identity(_) => OutputKind::Identity,
            Self::Nft(_) => OutputKind::Nft,
        }
    }

    #[must_use]
    pub fn amount(&self) -> u64 {
        match self {
            Self::Value(o) => o.amount,
            Self::Identity(o) => o.amount,
            Self::Nft(o) => o.amount,
        }
    }

    #[must_use]
    pub fn native_tokens(&self) -> &[NativeToken] {
        match self {
            Self::Value(o) => &o.native_tokens,
            Self::Identity(o) => &o.native_tokens,
            Self::Nft(o) => &o.native_tokens,
        }
    }

    #[must_use]
    pub fn unlock_conditions(&self) -> &[UnlockCondition] {
        match self {
            Self::Value(o) => &o.unlock_conditions,
            Self::Identity(o) => &o.unlock_conditions,
            Self::Nft(o) => &o.unlock_conditions,
        }
    }

    pub fn unlock_conditions_mut(&mut self) -> &mut Vec<UnlockCondition> {
        match self {
            Self::Value(o) => &mut o.unlock_conditions,
            Self::Identity(o) => &mut o.unlock_conditions,
            Self::Nft(o) => &mut o.unlock_conditions,
        }
    }

    #[must_use]
    pub fn features(&self) -> &[Feature] {
        match self {
            Self::Value(o) => &o.features,
            Self::Identity(o) => &o.features,
            Self::Nft(o) => &o.features,
        }
    }

    /// The address whose signature consumes this output.
    ///
    /// For identity outputs that is the state controller (the engine only
    /// ever performs state transitions, never governance).
    #[must_use]
    pub fn owner_address(&self) -> Option<Address> {
        let wanted = match self {
            Self::Identity(_) => UnlockConditionKind::StateControllerAddress,
            Self::Value(_) | Self::Nft(_) => UnlockConditionKind::Address,
        };
        self.unlock_conditions()
            .iter()
            .find(|c| c.kind() == wanted)
            .and_then(UnlockCondition::address)
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl Output {
    pub fn dummy_value(amount: u64, owner: Address) -> Self {
        Self::Value(ValueOutput {
            amount,
            native_tokens: Vec::new(),
            unlock_conditions: vec![UnlockCondition::Address { address: owner }],
            features: Vec::new(),
        })
    }

    pub fn dummy_nft(amount: u64, owner: Address, nft_id: NftId) -> Self {
        Self::Nft(NftOutput {
            amount,
            native_tokens: Vec::new(),
            nft_id,
            unlock_conditions: vec![UnlockCondition::Address { address: owner }],
            features: Vec::new(),
            immutable_features: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_tags_output_kind() {
        let output = Output::dummy_value(100, Address::dummy());
        let json = serde_json::to_string(&output).unwrap();
        assert!(json.contains("\"kind\":\"Value\""));
        let back: Output = serde_json::from_str(&json).unwrap();
        assert_eq!(output, back);
    }

    #[test]
    fn owner_of_value_output_is_address_condition() {
        let owner = Address::dummy();
        let output = Output::dummy_value(50, owner);
        assert_eq!(output.owner_address(), Some(owner));
    }

    #[test]
    fn owner_of_identity_output_is_state_controller() {
        let state = Address::dummy();
        let governor = Address::dummy();
        let output = Output::Identity(IdentityOutput {
            amount: 100,
            native_tokens: Vec::new(),
            identity_id: IdentityId::null(),
            state_index: 0,
            state_metadata: String::new(),
            mint_counter: 0,
            unlock_conditions: vec![
                UnlockCondition::StateControllerAddress { address: state },
                UnlockCondition::GovernorAddress { address: governor },
            ],
            features: Vec::new(),
            immutable_features: Vec::new(),
        });
        assert_eq!(output.owner_address(), Some(state));
    }

    #[test]
    fn condition_kind_mapping() {
        let cond = UnlockCondition::StorageDepositReturn {
            return_address: Address::dummy(),
            amount: 42,
        };
        assert_eq!(cond.kind(), UnlockConditionKind::StorageDepositReturn);
        assert!(cond.address().is_some());
        assert_eq!(
            UnlockCondition::Timelock { unix_time: 1 }.address(),
            None
        );
    }
}
