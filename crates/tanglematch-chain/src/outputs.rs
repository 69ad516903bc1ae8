//! Output construction and transformation.
//!
//! Every constructor enforces the storage-deposit floor: an amount below
//! the output's byte-cost minimum fails with `TM_ERR_201` carrying the
//! required value. The builder never rounds an amount up on its own — the
//! caller decides where extra base units come from.

use tanglematch_types::{
    Address, Feature, IdentityId, IdentityOutput, NativeToken, NftId, NftOutput, Output,
    RentStructure, Result, TanglematchError, UnlockCondition, ValueOutput,
};

use crate::rent;

/// A storage-deposit-return obligation to attach to an output.
#[derive(Debug, Clone, Copy)]
pub struct StorageReturn {
    pub return_address: Address,
    pub amount: u64,
}

/// An expiration term to attach to an output.
#[derive(Debug, Clone, Copy)]
pub struct ExpirationTerm {
    pub return_address: Address,
    pub unix_time: u32,
}

/// Parameters for a value output.
#[derive(Debug, Clone)]
pub struct ValueOutputParams {
    pub amount: u64,
    pub owner: Address,
    pub native_tokens: Vec<NativeToken>,
    pub sender: Option<Address>,
    pub metadata: Option<String>,
    pub tag: Option<String>,
    /// Lock the output until this unix time.
    pub timelock_unix: Option<u32>,
    pub expiration: Option<ExpirationTerm>,
    pub storage_return: Option<StorageReturn>,
}

impl ValueOutputParams {
    /// Plain transfer of `amount` to `owner`, no extras.
    #[must_use]
    pub fn transfer(amount: u64, owner: Address) -> Self {
        Self {
            amount,
            owner,
            native_tokens: Vec::new(),
            sender: None,
            metadata: None,
            tag: None,
            timelock_unix: None,
            expiration: None,
            storage_return: None,
        }
    }
}

/// Parameters for an identity output.
#[derive(Debug, Clone)]
pub struct IdentityOutputParams {
    pub amount: u64,
    /// [`IdentityId::null`] mints a fresh identity.
    pub identity_id: IdentityId,
    pub state_index: u32,
    pub state_metadata: String,
    pub mint_counter: u32,
    /// State controller and governor of the identity.
    pub owner: Address,
    /// Recorded immutably as the creator.
    pub issuer: Address,
}

/// Parameters for an NFT output.
#[derive(Debug, Clone)]
pub struct NftOutputParams {
    pub amount: u64,
    /// [`NftId::null`] mints a fresh NFT.
    pub nft_id: NftId,
    pub owner: Address,
    pub issuer: Option<Address>,
    pub immutable_metadata: Option<String>,
    /// Mutable metadata, replaceable by later state transitions.
    pub metadata: Option<String>,
    pub tag: Option<String>,
    /// Lock the output until this unix time.
    pub timelock_unix: Option<u32>,
}

/// Builds protocol-valid outputs against one rent structure.
#[derive(Debug, Clone, Copy)]
pub struct OutputBuilder<'a> {
    rent: &'a RentStructure,
}

impl<'a> OutputBuilder<'a> {
    #[must_use]
    pub fn new(rent: &'a RentStructure) -> Self {
        Self { rent }
    }

    /// The storage-deposit minimum of an already-built output.
    #[must_use]
    pub fn min_deposit(&self, output: &Output) -> u64 {
        rent::min_deposit(self.rent, output)
    }

    /// The storage-deposit minimum of the identity output `params` describes.
    ///
    /// Floors depend only on the output's serialized shape, never on the
    /// amount written into it, so callers may price a draft before deciding
    /// how to split a deposit across outputs.
    #[must_use]
    pub fn identity_floor(&self, params: &IdentityOutputParams) -> u64 {
        rent::min_deposit(self.rent, &Self::raw_identity(params.clone()))
    }

    /// The storage-deposit minimum of the NFT output `params` describes.
    #[must_use]
    pub fn nft_floor(&self, params: &NftOutputParams) -> u64 {
        rent::min_deposit(self.rent, &Self::raw_nft(params.clone()))
    }

    pub fn value(&self, params: ValueOutputParams) -> Result<Output> {
        self.check_floor(Self::raw_value(params))
    }

    pub fn identity(&self, params: IdentityOutputParams) -> Result<Output> {
        self.check_floor(Self::raw_identity(params))
    }

    pub fn nft(&self, params: NftOutputParams) -> Result<Output> {
        self.check_floor(Self::raw_nft(params))
    }

    fn raw_value(params: ValueOutputParams) -> Output {
        let mut unlock_conditions = vec![UnlockCondition::Address {
            address: params.owner,
        }];
        if let Some(ret) = params.storage_return {
            unlock_conditions.push(UnlockCondition::StorageDepositReturn {
                return_address: ret.return_address,
                amount: ret.amount,
            });
        }
        if let Some(unix_time) = params.timelock_unix {
            unlock_conditions.push(UnlockCondition::Timelock { unix_time });
        }
        if let Some(exp) = params.expiration {
            unlock_conditions.push(UnlockCondition::Expiration {
                return_address: exp.return_address,
                unix_time: exp.unix_time,
            });
        }

        let mut features = Vec::new();
        if let Some(address) = params.sender {
            features.push(Feature::Sender { address });
        }
        if let Some(data) = params.metadata {
            features.push(Feature::Metadata { data });
        }
        if let Some(tag) = params.tag {
            features.push(Feature::Tag { tag });
        }

        Output::Value(ValueOutput {
            amount: params.amount,
            native_tokens: params.native_tokens,
            unlock_conditions,
            features,
        })
    }

    fn raw_identity(params: IdentityOutputParams) -> Output {
        Output::Identity(IdentityOutput {
            amount: params.amount,
            native_tokens: Vec::new(),
            identity_id: params.identity_id,
            state_index: params.state_index,
            state_metadata: params.state_metadata,
            mint_counter: params.mint_counter,
            unlock_conditions: vec![
                UnlockCondition::StateControllerAddress {
                    address: params.owner,
                },
                UnlockCondition::GovernorAddress {
                    address: params.owner,
                },
            ],
            features: Vec::new(),
            immutable_features: vec![Feature::Issuer {
                address: params.issuer,
            }],
        })
    }

    fn raw_nft(params: NftOutputParams) -> Output {
        let mut unlock_conditions = vec![UnlockCondition::Address {
            address: params.owner,
        }];
        if let Some(unix_time) = params.timelock_unix {
            unlock_conditions.push(UnlockCondition::Timelock { unix_time });
        }

        let mut features = Vec::new();
        if let Some(data) = params.metadata {
            features.push(Feature::Metadata { data });
        }
        if let Some(tag) = params.tag {
            features.push(Feature::Tag { tag });
        }

        let mut immutable_features = Vec::new();
        if let Some(address) = params.issuer {
            immutable_features.push(Feature::Issuer { address });
        }
        if let Some(data) = params.immutable_metadata {
            immutable_features.push(Feature::Metadata { data });
        }

        Output::Nft(NftOutput {
            amount: params.amount,
            native_tokens: Vec::new(),
            nft_id: params.nft_id,
            unlock_conditions,
            features,
            immutable_features,
        })
    }

    /// Deep-copy `source` with `condition` swapped in.
    ///
    /// Removes only conditions of the **same kind**, then appends the new
    /// one. The relative order of the untouched conditions is preserved —
    /// the ledger's binary encoding is position-sensitive.
    #[must_use]
    pub fn replace_unlock_condition(
        &self,
        source: &Output,
        condition: UnlockCondition,
    ) -> Output {
        let mut transformed = source.clone();
        let conditions = transformed.unlock_conditions_mut();
        conditions.retain(|c| c.kind() != condition.kind());
        conditions.push(condition);
        transformed
    }

    fn check_floor(&self, output: Output) -> Result<Output> {
        let required = rent::min_deposit(self.rent, &output);
        if output.amount() < required {
            return Err(TanglematchError::InsufficientStorageDeposit { required });
        }
        Ok(output)
    }
}
