//! Deposit orders and their request payloads.
//!
//! An order publishes a one-time deposit address and states what should
//! happen when funds arrive there. Orders are created by feature code
//! upstream; the matcher is the only writer afterwards and only ever sets
//! `reconciled` / `reconciled_by`. Orders are never deleted, only voided.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    Address, AwardId, IdentityId, MemberId, NativeToken, Network, NftId, OrderId, ProposalId,
    StampId, SwapId, TokenId, TransferId,
};

/// How an inbound transfer is validated against the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValidationMode {
    /// Any amount qualifies; the sender is identified by source address.
    AddressOnly,
    /// The transfer must deliver exactly the expected amount (and expected
    /// native tokens, when set).
    AddressAndAmount,
}

impl std::fmt::Display for ValidationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AddressOnly => write!(f, "ADDRESS_ONLY"),
            Self::AddressAndAmount => write!(f, "ADDRESS_AND_AMOUNT"),
        }
    }
}

/// Staking flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StakeType {
    Static,
    Dynamic,
}

impl std::fmt::Display for StakeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static => write!(f, "STATIC"),
            Self::Dynamic => write!(f, "DYNAMIC"),
        }
    }
}

/// What the deposit is for. Closed set; the matcher matches exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum RequestPayload {
    /// Prove control of the source address and bind it to the member.
    ValidateAddress,
    /// Buy `count` tokens at `price` base units each.
    TokenBuy {
        token: TokenId,
        count: u64,
        price: Decimal,
    },
    /// Sell `count` tokens at `price` base units each.
    TokenSell {
        token: TokenId,
        count: u64,
        price: Decimal,
    },
    /// Lock the deposit for `weeks` weeks.
    Stake { weeks: u32, stake_type: StakeType },
    /// Re-lock the delivered NFT for `weeks` weeks.
    NftStake { weeks: u32 },
    /// Fund an award campaign.
    AwardFund { award: AwardId },
    /// Vote on a proposal; the delivered amount is the vote weight.
    ProposalVote { proposal: ProposalId, values: Vec<u64> },
    /// Mint a metadata NFT, or update one when `nft` is set.
    MetadataNft {
        identity: Option<IdentityId>,
        nft: Option<NftId>,
        metadata: String,
    },
    /// Fund a content stamp.
    Stamp { stamp: StampId },
    /// Fund one leg of a two-party swap.
    Swap { swap: SwapId },
}

impl RequestPayload {
    /// Stable name of the request kind, for logs and error messages.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::ValidateAddress => "VALIDATE_ADDRESS",
            Self::TokenBuy { .. } => "TOKEN_BUY",
            Self::TokenSell { .. } => "TOKEN_SELL",
            Self::Stake { .. } => "STAKE",
            Self::NftStake { .. } => "NFT_STAKE",
            Self::AwardFund { .. } => "AWARD_FUND",
            Self::ProposalVote { .. } => "PROPOSAL_VOTE",
            Self::MetadataNft { .. } => "METADATA_NFT",
            Self::Stamp { .. } => "STAMP",
            Self::Swap { .. } => "SWAP",
        }
    }
}

/// Exact base-unit total of a token trade, or `None` when `count × price`
/// overflows or is not a whole number of base units.
#[must_use]
pub fn trade_total(count: u64, price: Decimal) -> Option<u64> {
    let total = price.checked_mul(Decimal::from(count))?;
    if total.is_sign_negative() || !total.fract().is_zero() {
        return None;
    }
    total.to_u64()
}

/// A pending deposit request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Known up front for most requests; resolved from the source address
    /// for [`ValidationMode::AddressOnly`] orders.
    pub member: Option<MemberId>,
    pub network: Network,
    /// The published one-time deposit address.
    pub target_address: Address,
    pub validation: ValidationMode,
    pub expected_amount: Option<u64>,
    pub expected_native_tokens: Vec<NativeToken>,
    pub request: RequestPayload,
    /// Set by the expiry sweep; a void order only ever refunds.
    pub void: bool,
    pub reconciled: bool,
    /// The transfer that satisfied this order, once reconciled.
    pub reconciled_by: Option<TransferId>,
    pub created_at: DateTime<Utc>,
    pub expires_on: DateTime<Utc>,
}

impl Order {
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.void && !self.reconciled
    }

    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_on
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl Order {
    /// An open `AddressOnly` order on the Shimmer testnet.
    pub fn dummy_with_request(target_address: Address, request: RequestPayload) -> Self {
        Self {
            id: OrderId::new(),
            member: None,
            network: Network::Rms,
            target_address,
            validation: ValidationMode::AddressOnly,
            expected_amount: None,
            expected_native_tokens: Vec::new(),
            request,
            void: false,
            reconciled: false,
            reconciled_by: None,
            created_at: Utc::now(),
            expires_on: Utc::now() + chrono::Duration::hours(24),
        }
    }

    /// An open `AddressAndAmount` order for a known member.
    pub fn dummy_expecting(
        member: MemberId,
        target_address: Address,
        amount: u64,
        request: RequestPayload,
    ) -> Self {
        Self {
            id: OrderId::new(),
            member: Some(member),
            network: Network::Rms,
            target_address,
            validation: ValidationMode::AddressAndAmount,
            expected_amount: Some(amount),
            expected_native_tokens: Vec::new(),
            request,
            void: false,
            reconciled: false,
            reconciled_by: None,
            created_at: Utc::now(),
            expires_on: Utc::now() + chrono::Duration::hours(24),
        }
    }
}
