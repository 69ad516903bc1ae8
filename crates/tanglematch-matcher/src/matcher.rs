//! The reconciliation pipeline.
//!
//! ```text
//! handle(order, transfer)
//!      │
//!      ▼
//!   gate ──► safety screen ──► owner ──► amount ──► dispatch ──► commit
//!   (reconciled/void)  (timelock/      (resolve    (exact       (one
//!                       storage ret.)   member)     match)       group)
//! ```
//!
//! Every outcome is terminal for the transfer: either the order reconciles,
//! or the deposit comes back as a credit entry. A business failure never
//! propagates out of [`OrderMatcher::handle`]; the only error a caller sees
//! before a write is node unavailability, and retrying the same transfer is
//! always safe.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use tanglematch_nodes::NodeClientPool;
use tanglematch_types::{
    same_token_set, CreditReason, LedgerEntry, MemberId, ObservedTransfer, Order, OrderId, Result,
    TanglematchError, ValidationMode,
};

use crate::entries;
use crate::handlers::{self, HandlerContext};
use crate::store::{DocumentStore, WriteGroup, WriteOp};

/// What [`OrderMatcher::handle`] did with a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    /// The order reconciled and its side effects committed.
    Reconciled,
    /// This exact transfer already reconciled the order; nothing was written.
    AlreadyReconciled,
    /// The deposit was credited back.
    Credited { reason: CreditReason },
    /// More than one member has validated the source address. The deposit
    /// was credited back; the count is surfaced for operator follow-up.
    AmbiguousOwner { candidates: usize },
}

/// Matches observed transfers against deposit orders.
pub struct OrderMatcher {
    store: Arc<dyn DocumentStore>,
    pool: Arc<NodeClientPool>,
}

impl OrderMatcher {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, pool: Arc<NodeClientPool>) -> Self {
        Self { store, pool }
    }

    /// Reconcile one observed transfer against its order.
    ///
    /// Redelivery of a transfer that already reconciled the order is a
    /// no-op, so callers may retry freely.
    pub async fn handle(
        &self,
        order_id: OrderId,
        transfer: &ObservedTransfer,
    ) -> Result<MatchOutcome> {
        let order = self
            .store
            .order(order_id)
            .await?
            .ok_or(TanglematchError::OrderNotFound(order_id))?;

        // Gate: redelivery, stale matches, voided orders.
        if order.reconciled_by == Some(transfer.transfer_id) {
            debug!(order = %order.id, transfer = %transfer.transfer_id, "transfer already reconciled this order");
            return Ok(MatchOutcome::AlreadyReconciled);
        }
        if order.reconciled {
            return self
                .credit_only(
                    &order,
                    order.member,
                    transfer,
                    CreditReason::OrderAlreadyReconciled,
                    false,
                    false,
                )
                .await;
        }
        if order.void {
            return self
                .credit_only(&order, order.member, transfer, CreditReason::OrderVoided, false, false)
                .await;
        }

        // Safety screen: a deposit we could not refund without stranding an
        // obligation is parked for manual handling, whatever else is wrong
        // with it.
        if transfer.has_timelock() {
            return self
                .credit_only(
                    &order,
                    order.member,
                    transfer,
                    CreditReason::UnrefundableTimelock,
                    true,
                    false,
                )
                .await;
        }
        if transfer.has_foreign_storage_return() {
            return self
                .credit_only(
                    &order,
                    order.member,
                    transfer,
                    CreditReason::UnrefundableStorageReturn,
                    true,
                    false,
                )
                .await;
        }

        // Owner resolution: an order without a member identifies the sender
        // through previously validated addresses.
        let member = match order.member {
            Some(member) => Some(member),
            None => {
                let candidates = self
                    .store
                    .members_for_address(&transfer.source_address, order.network)
                    .await?;
                match candidates.as_slice() {
                    [] => {
                        return self
                            .credit_only(
                                &order,
                                None,
                                transfer,
                                CreditReason::UnknownOwner,
                                false,
                                false,
                            )
                            .await;
                    }
                    [member] => Some(*member),
                    _ => {
                        let candidates = candidates.len();
                        self.credit_only(
                            &order,
                            None,
                            transfer,
                            CreditReason::AmbiguousOwner,
                            false,
                            false,
                        )
                        .await?;
                        return Ok(MatchOutcome::AmbiguousOwner { candidates });
                    }
                }
            }
        };

        // Amount validation: expected orders take exactly what they quoted.
        if order.validation == ValidationMode::AddressAndAmount {
            let amount_matches = order
                .expected_amount
                .is_none_or(|expected| transfer.amount == expected);
            let tokens_match =
                same_token_set(&order.expected_native_tokens, &transfer.native_tokens);
            if !amount_matches || !tokens_match {
                warn!(
                    order = %order.id,
                    transfer = %transfer.transfer_id,
                    amount = transfer.amount,
                    required = ?order.expected_amount,
                    "delivered value does not match the order"
                );
                return self
                    .credit_only(
                        &order,
                        member,
                        transfer,
                        CreditReason::InsufficientReceived,
                        false,
                        true,
                    )
                    .await;
            }
        }

        // Output-building handlers need the network's rent parameters; fetch
        // them before dispatch so node trouble surfaces before any write.
        let acquired = if handlers::needs_rent(&order.request) {
            Some(self.pool.acquire(order.network, None).await?)
        } else {
            None
        };
        let ctx = HandlerContext {
            store: self.store.as_ref(),
            rent: acquired.as_ref().map(|a| &a.info.protocol.rent),
            now: Utc::now(),
        };

        match handlers::dispatch(&ctx, &order, member, transfer).await {
            Ok(mut ops) => {
                ops.push(WriteOp::MarkReconciled {
                    order: order.id,
                    transfer: transfer.transfer_id,
                });
                self.store.commit(WriteGroup::new(order.id, ops)).await?;
                info!(
                    order = %order.id,
                    transfer = %transfer.transfer_id,
                    kind = order.request.kind_name(),
                    "order reconciled"
                );
                Ok(MatchOutcome::Reconciled)
            }
            Err(err) if err.is_transient() => Err(err),
            Err(
                err @ (TanglematchError::InsufficientAmount { .. }
                | TanglematchError::InsufficientStorageDeposit { .. }
                | TanglematchError::AmountOverflow
                | TanglematchError::NativeTokenMismatch { .. }),
            ) => {
                warn!(
                    order = %order.id,
                    transfer = %transfer.transfer_id,
                    error = %err,
                    "deposit does not cover the request, crediting back"
                );
                self.credit_only(
                    &order,
                    member,
                    transfer,
                    CreditReason::InsufficientReceived,
                    false,
                    true,
                )
                .await
            }
            Err(err) => {
                warn!(
                    order = %order.id,
                    transfer = %transfer.transfer_id,
                    error = %err,
                    "request failed, crediting back"
                );
                self.credit_only(&order, member, transfer, CreditReason::InvalidPayload, false, false)
                    .await
            }
        }
    }

    /// Credit the whole deposit back and leave the order untouched.
    async fn credit_only(
        &self,
        order: &Order,
        member: Option<MemberId>,
        transfer: &ObservedTransfer,
        reason: CreditReason,
        ignore_wallet: bool,
        should_retry: bool,
    ) -> Result<MatchOutcome> {
        let mut credit = entries::full_credit(order, member, transfer, reason, Utc::now());
        credit.ignore_wallet = ignore_wallet;
        credit.should_retry = should_retry;
        warn!(
            order = %order.id,
            transfer = %transfer.transfer_id,
            credit = %credit.id,
            reason = %reason,
            "crediting deposit back"
        );
        self.store
            .commit(WriteGroup::new(
                order.id,
                vec![WriteOp::PutEntry(LedgerEntry::Credit(credit))],
            ))
            .await?;
        Ok(MatchOutcome::Credited { reason })
    }
}
