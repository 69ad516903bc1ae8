//! Ledger-entry constructors.
//!
//! Every id is deterministic over `(order, transfer, role)`, so a
//! redelivered reconciliation rewrites the documents it already created
//! instead of minting new ones. One role produces at most one document per
//! transfer.

use chrono::{DateTime, Utc};

use tanglematch_types::{
    Address, BillPaymentEntry, CreditEntry, CreditReason, EntryId, MemberId, ObservedTransfer,
    Order, Output, PaymentEntry, WalletReference,
};

pub const ROLE_CREDIT: &str = "credit";
pub const ROLE_PAYMENT: &str = "payment";
pub const ROLE_BILL: &str = "bill";
pub const ROLE_BILL_IDENTITY: &str = "bill_identity";
pub const ROLE_BILL_NFT: &str = "bill_nft";

/// A credit returning the full delivered amount (and native tokens) to the
/// sender. Callers flip `ignore_wallet` / `should_retry` as needed.
#[must_use]
pub fn full_credit(
    order: &Order,
    member: Option<MemberId>,
    transfer: &ObservedTransfer,
    reason: CreditReason,
    now: DateTime<Utc>,
) -> CreditEntry {
    CreditEntry {
        id: EntryId::deterministic(order.id, transfer.transfer_id, ROLE_CREDIT),
        order: order.id,
        member,
        network: order.network,
        source_address: transfer.target_address,
        target_address: transfer.source_address,
        amount: transfer.amount,
        native_tokens: transfer.native_tokens.clone(),
        ignore_wallet: false,
        reason: Some(reason),
        should_retry: false,
        wallet_reference: WalletReference::unprocessed(),
        created_at: now,
    }
}

/// A payment accepting the full delivered amount into the platform.
#[must_use]
pub fn payment(
    order: &Order,
    member: Option<MemberId>,
    transfer: &ObservedTransfer,
    now: DateTime<Utc>,
) -> PaymentEntry {
    PaymentEntry {
        id: EntryId::deterministic(order.id, transfer.transfer_id, ROLE_PAYMENT),
        order: order.id,
        member,
        network: order.network,
        source_address: transfer.source_address,
        target_address: transfer.target_address,
        amount: transfer.amount,
        native_tokens: transfer.native_tokens.clone(),
        wallet_reference: WalletReference::unprocessed(),
        created_at: now,
    }
}

/// A payout the platform owes on-chain, carrying the prebuilt `output`.
/// The entry's amount and native tokens mirror the output's.
#[must_use]
pub fn bill_payment(
    order: &Order,
    member: Option<MemberId>,
    transfer: &ObservedTransfer,
    role: &str,
    target_address: Address,
    output: Output,
    now: DateTime<Utc>,
) -> BillPaymentEntry {
    BillPaymentEntry {
        id: EntryId::deterministic(order.id, transfer.transfer_id, role),
        order: order.id,
        member,
        network: order.network,
        source_address: transfer.target_address,
        target_address,
        amount: output.amount(),
        native_tokens: output.native_tokens().to_vec(),
        royalty: false,
        output: Some(output),
        wallet_reference: WalletReference::unprocessed(),
        created_at: now,
    }
}
