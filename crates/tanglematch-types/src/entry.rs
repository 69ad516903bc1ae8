//! Ledger entries — the financial outcome records of a reconciliation.
//!
//! Exactly three kinds exist, each its own record type:
//!
//! - **Payment** — value accepted into the platform for a fulfilled request.
//! - **BillPayment** — value the platform must pay out on-chain (carries the
//!   prebuilt output when the payout shape matters, e.g. timelocked stakes).
//! - **Credit** — value returned to the sender.
//!
//! Entries are written once by the matcher; the chain watcher maintains only
//! the nested [`WalletReference`] afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    constants, Address, EntryId, MemberId, NativeToken, Network, OrderId, Output, TransferId,
};

/// Submission bookkeeping the chain watcher maintains on an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletReference {
    pub confirmed: bool,
    pub confirmed_on: Option<DateTime<Utc>>,
    /// Submission attempts so far.
    pub count: u32,
    /// Block id of the latest submission attempt.
    pub chain_reference: Option<TransferId>,
    pub error: Option<String>,
}

impl WalletReference {
    /// A fresh reference for an entry that has not been submitted yet.
    #[must_use]
    pub fn unprocessed() -> Self {
        Self {
            confirmed: false,
            confirmed_on: None,
            count: 0,
            chain_reference: None,
            error: None,
        }
    }

    /// True once the retry budget is spent; the entry is terminally failed.
    #[must_use]
    pub fn exhausted(&self) -> bool {
        !self.confirmed && self.count >= constants::MAX_WALLET_RETRIES
    }
}

impl Default for WalletReference {
    fn default() -> Self {
        Self::unprocessed()
    }
}

/// Why a credit was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreditReason {
    /// The deposit itself was the product (address validation and similar).
    DepositReturned,
    /// The order was already satisfied by a different transfer.
    OrderAlreadyReconciled,
    /// The order was voided before the transfer arrived.
    OrderVoided,
    /// The consumed output is time-locked; refunding would strand it.
    UnrefundableTimelock,
    /// The consumed output owes its storage deposit to a third address.
    UnrefundableStorageReturn,
    /// More than one member has validated the source address.
    AmbiguousOwner,
    /// No member has validated the source address.
    UnknownOwner,
    /// The delivered amount or tokens did not satisfy the request.
    InsufficientReceived,
    /// The request payload could not be acted on.
    InvalidPayload,
}

impl std::fmt::Display for CreditReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::DepositReturned => "DEPOSIT_RETURNED",
            Self::OrderAlreadyReconciled => "ORDER_ALREADY_RECONCILED",
            Self::OrderVoided => "ORDER_VOIDED",
            Self::UnrefundableTimelock => "UNREFUNDABLE_TIMELOCK",
            Self::UnrefundableStorageReturn => "UNREFUNDABLE_STORAGE_RETURN",
            Self::AmbiguousOwner => "AMBIGUOUS_OWNER",
            Self::UnknownOwner => "UNKNOWN_OWNER",
            Self::InsufficientReceived => "INSUFFICIENT_RECEIVED",
            Self::InvalidPayload => "INVALID_PAYLOAD",
        };
        write!(f, "{name}")
    }
}

/// Value accepted into the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEntry {
    pub id: EntryId,
    pub order: OrderId,
    pub member: Option<MemberId>,
    pub network: Network,
    pub source_address: Address,
    pub target_address: Address,
    pub amount: u64,
    pub native_tokens: Vec<NativeToken>,
    pub wallet_reference: WalletReference,
    pub created_at: DateTime<Utc>,
}

/// Value the platform pays out on-chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillPaymentEntry {
    pub id: EntryId,
    pub order: OrderId,
    pub member: Option<MemberId>,
    pub network: Network,
    pub source_address: Address,
    pub target_address: Address,
    pub amount: u64,
    pub native_tokens: Vec<NativeToken>,
    pub royalty: bool,
    /// Prebuilt on-chain output when the payout shape matters (timelocked
    /// stakes, re-locked NFTs). `None` means a plain value transfer.
    pub output: Option<Output>,
    pub wallet_reference: WalletReference,
    pub created_at: DateTime<Utc>,
}

/// Value returned to the sender.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditEntry {
    pub id: EntryId,
    pub order: OrderId,
    pub member: Option<MemberId>,
    pub network: Network,
    /// The deposit address holding the funds.
    pub source_address: Address,
    /// Where the refund goes (the original sender).
    pub target_address: Address,
    pub amount: u64,
    pub native_tokens: Vec<NativeToken>,
    /// When set, the executor must never submit this credit on-chain; the
    /// funds stay parked because sending them back is hazardous.
    pub ignore_wallet: bool,
    pub reason: Option<CreditReason>,
    /// The sender may retry the same request after topping up.
    pub should_retry: bool,
    pub wallet_reference: WalletReference,
    pub created_at: DateTime<Utc>,
}

/// Any ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum LedgerEntry {
    Payment(PaymentEntry),
    BillPayment(BillPaymentEntry),
    Credit(CreditEntry),
}

impl LedgerEntry {
    #[must_use]
    pub fn id(&self) -> EntryId {
        match self {
            Self::Payment(e) => e.id,
            Self::BillPayment(e) => e.id,
            Self::Credit(e) => e.id,
        }
    }

    #[must_use]
    pub fn order(&self) -> OrderId {
        match self {
            Self::Payment(e) => e.order,
            Self::BillPayment(e) => e.order,
            Self::Credit(e) => e.order,
        }
    }

    #[must_use]
    pub fn amount(&self) -> u64 {
        match self {
            Self::Payment(e) => e.amount,
            Self::BillPayment(e) => e.amount,
            Self::Credit(e) => e.amount,
        }
    }

    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Payment(_) => "PAYMENT",
            Self::BillPayment(_) => "BILL_PAYMENT",
            Self::Credit(_) => "CREDIT",
        }
    }

    #[must_use]
    pub fn as_credit(&self) -> Option<&CreditEntry> {
        match self {
            Self::Credit(e) => Some(e),
            _ => None,
        }
    }
}
