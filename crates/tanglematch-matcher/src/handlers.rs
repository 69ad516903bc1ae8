//! Request handlers: one pure function per request kind.
//!
//! Every handler shares the contract
//! `(order, transfer, fetched state) -> Vec<WriteOp>`. State is read through
//! the [`HandlerContext`]; the writes are only *described* — nothing touches
//! the store until the matcher commits the whole group. A failing handler
//! therefore never leaves partial state behind.
//!
//! Handlers raise [`TanglematchError`] business errors
//! (`InvalidPayload`, `InsufficientAmount`) and let the matcher convert them
//! into full-amount credits.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::debug;

use tanglematch_chain::{
    storage_fee_for_bytes, IdentityOutputParams, NftOutputParams, OutputBuilder, ValueOutputParams,
};
use tanglematch_types::{
    constants, trade_total, AwardId, ConsumedOutputKind, CreditReason, IdentityId, LedgerEntry,
    MemberId, NftId, ObservedTransfer, Order, Output, ProposalId, RentStructure, RequestPayload,
    Result, StakeType, StampId, SwapId, TanglematchError, TokenId,
};

use crate::entries::{self, ROLE_BILL, ROLE_BILL_IDENTITY, ROLE_BILL_NFT};
use crate::store::{
    AwardPayment, DocumentStore, DomainRecord, MemberAddress, MintedNftRecord, NftStakeRecord,
    StakeRecord, StampRecord, SwapFundingRecord, TradeOrderRecord, TradeSide, VoteRecord, WriteOp,
};

/// Read-only state a handler may consult.
pub struct HandlerContext<'a> {
    pub store: &'a dyn DocumentStore,
    /// Rent parameters of an acquired node. Present only for request kinds
    /// that build outputs; see [`needs_rent`].
    pub rent: Option<&'a RentStructure>,
    pub now: DateTime<Utc>,
}

impl HandlerContext<'_> {
    fn rent(&self) -> Result<&RentStructure> {
        self.rent.ok_or_else(|| {
            TanglematchError::Internal("rent parameters not loaded for an output-building handler".into())
        })
    }
}

/// True when the request kind builds on-chain outputs and therefore needs
/// the network's rent parameters before dispatch.
#[must_use]
pub fn needs_rent(request: &RequestPayload) -> bool {
    matches!(
        request,
        RequestPayload::Stake { .. }
            | RequestPayload::NftStake { .. }
            | RequestPayload::MetadataNft { .. }
            | RequestPayload::Stamp { .. }
    )
}

/// Route `order.request` to its handler. The match is exhaustive: a request
/// kind without a handler does not compile.
pub async fn dispatch(
    ctx: &HandlerContext<'_>,
    order: &Order,
    member: Option<MemberId>,
    transfer: &ObservedTransfer,
) -> Result<Vec<WriteOp>> {
    debug!(order = %order.id, kind = order.request.kind_name(), "dispatching request");
    match &order.request {
        RequestPayload::ValidateAddress => validate_address(ctx, order, member, transfer),
        RequestPayload::TokenBuy { token, count, price } => {
            token_trade(ctx, order, member, transfer, TradeSide::Buy, *token, *count, *price).await
        }
        RequestPayload::TokenSell { token, count, price } => {
            token_trade(ctx, order, member, transfer, TradeSide::Sell, *token, *count, *price).await
        }
        RequestPayload::Stake { weeks, stake_type } => {
            stake(ctx, order, member, transfer, *weeks, *stake_type)
        }
        RequestPayload::NftStake { weeks } => nft_stake(ctx, order, member, transfer, *weeks).await,
        RequestPayload::AwardFund { award } => {
            award_fund(ctx, order, member, transfer, *award).await
        }
        RequestPayload::ProposalVote { proposal, values } => {
            proposal_vote(ctx, order, member, transfer, *proposal, values).await
        }
        RequestPayload::MetadataNft { identity, nft, metadata } => {
            metadata_nft(ctx, order, member, transfer, *identity, *nft, metadata).await
        }
        RequestPayload::Stamp { stamp: id } => stamp(ctx, order, member, transfer, *id).await,
        RequestPayload::Swap { swap: id } => swap(ctx, order, member, transfer, *id).await,
    }
}

// ---------------------------------------------------------------------------
// Address validation
// ---------------------------------------------------------------------------

/// Bind the source address to the member; the deposit itself was only the
/// proof of control and goes straight back.
fn validate_address(
    ctx: &HandlerContext<'_>,
    order: &Order,
    member: Option<MemberId>,
    transfer: &ObservedTransfer,
) -> Result<Vec<WriteOp>> {
    let Some(member) = member else {
        return Err(TanglematchError::InvalidPayload {
            reason: "address validation requires a member".into(),
        });
    };
    Ok(vec![
        WriteOp::PutDomain(DomainRecord::MemberAddress(MemberAddress {
            member,
            address: transfer.source_address,
            network: order.network,
            order: order.id,
            validated_at: ctx.now,
        })),
        WriteOp::PutEntry(LedgerEntry::Credit(entries::full_credit(
            order,
            Some(member),
            transfer,
            CreditReason::DepositReturned,
            ctx.now,
        ))),
    ])
}

// ---------------------------------------------------------------------------
// Token trades
// ---------------------------------------------------------------------------

/// Register an open buy or sell against a tradable listing.
///
/// Buys must deliver at least `count × price` base units; sells must deliver
/// at least `count` units of the token itself.
#[allow(clippy::too_many_arguments)]
async fn token_trade(
    ctx: &HandlerContext<'_>,
    order: &Order,
    member: Option<MemberId>,
    transfer: &ObservedTransfer,
    side: TradeSide,
    token: TokenId,
    count: u64,
    price: Decimal,
) -> Result<Vec<WriteOp>> {
    let listing = ctx.store.token_listing(token).await?.ok_or_else(|| {
        TanglematchError::InvalidPayload {
            reason: format!("unknown token {token}"),
        }
    })?;
    if !listing.tradable {
        return Err(TanglematchError::InvalidPayload {
            reason: format!("token {} is not tradable", listing.symbol),
        });
    }

    match side {
        TradeSide::Buy => {
            let required =
                trade_total(count, price).ok_or_else(|| TanglematchError::InvalidPayload {
                    reason: "count × price is not a whole amount of base units".into(),
                })?;
            if transfer.amount < required {
                return Err(TanglematchError::InsufficientAmount { required });
            }
        }
        TradeSide::Sell => {
            let delivered = transfer
                .native_tokens
                .iter()
                .find(|t| t.token_id == token)
                .map_or(0, |t| t.amount);
            if delivered < count {
                return Err(TanglematchError::InsufficientAmount { required: count });
            }
        }
    }

    Ok(vec![
        WriteOp::PutDomain(DomainRecord::TradeOrder(TradeOrderRecord {
            order: order.id,
            member,
            token,
            side,
            count,
            price,
            created_at: ctx.now,
        })),
        WriteOp::PutEntry(LedgerEntry::Payment(entries::payment(
            order, member, transfer, ctx.now,
        ))),
    ])
}

// ---------------------------------------------------------------------------
// Staking
// ---------------------------------------------------------------------------

fn check_stake_weeks(weeks: u32) -> Result<()> {
    if !(constants::MIN_STAKE_WEEKS..=constants::MAX_STAKE_WEEKS).contains(&weeks) {
        return Err(TanglematchError::InvalidPayload {
            reason: format!(
                "stake duration must be between {} and {} weeks, got {weeks}",
                constants::MIN_STAKE_WEEKS,
                constants::MAX_STAKE_WEEKS
            ),
        });
    }
    Ok(())
}

/// Unix time `weeks` weeks from `now`.
fn lock_expiry(now: DateTime<Utc>, weeks: u32) -> Result<u32> {
    let start = u64::try_from(now.timestamp())
        .map_err(|_| TanglematchError::Internal("system clock is before the unix epoch".into()))?;
    let span = u64::from(weeks) * u64::from(constants::SECONDS_PER_WEEK);
    u32::try_from(start + span)
        .map_err(|_| TanglematchError::Internal("lock expiry does not fit a 32-bit unix time".into()))
}

/// An output floor miss means the sender did not deliver enough to lock.
fn floor_as_required(err: TanglematchError) -> TanglematchError {
    match err {
        TanglematchError::InsufficientStorageDeposit { required } => {
            TanglematchError::InsufficientAmount { required }
        }
        other => other,
    }
}

/// Lock the whole deposit back to the sender for the requested duration.
fn stake(
    ctx: &HandlerContext<'_>,
    order: &Order,
    member: Option<MemberId>,
    transfer: &ObservedTransfer,
    weeks: u32,
    stake_type: StakeType,
) -> Result<Vec<WriteOp>> {
    check_stake_weeks(weeks)?;
    let locked_until = lock_expiry(ctx.now, weeks)?;
    let builder = OutputBuilder::new(ctx.rent()?);
    let locked = builder
        .value(ValueOutputParams {
            amount: transfer.amount,
            owner: transfer.source_address,
            native_tokens: transfer.native_tokens.clone(),
            sender: None,
            metadata: None,
            tag: None,
            timelock_unix: Some(locked_until),
            expiration: None,
            storage_return: None,
        })
        .map_err(floor_as_required)?;

    Ok(vec![
        WriteOp::PutDomain(DomainRecord::Stake(StakeRecord {
            order: order.id,
            member,
            amount: transfer.amount,
            weeks,
            stake_type,
            locked_until,
            created_at: ctx.now,
        })),
        WriteOp::PutEntry(LedgerEntry::Payment(entries::payment(
            order, member, transfer, ctx.now,
        ))),
        WriteOp::PutEntry(LedgerEntry::BillPayment(entries::bill_payment(
            order,
            member,
            transfer,
            ROLE_BILL,
            transfer.source_address,
            locked,
            ctx.now,
        ))),
    ])
}

/// Re-lock a delivered NFT for the requested duration. The deposit must
/// cover the re-locked output's storage floor.
async fn nft_stake(
    ctx: &HandlerContext<'_>,
    order: &Order,
    member: Option<MemberId>,
    transfer: &ObservedTransfer,
    weeks: u32,
) -> Result<Vec<WriteOp>> {
    check_stake_weeks(weeks)?;
    let ConsumedOutputKind::Nft { id } = transfer.consumed else {
        return Err(TanglematchError::InvalidPayload {
            reason: "staking requires a delivered non-fungible output".into(),
        });
    };
    let record = ctx.store.minted_nft(id).await?.ok_or_else(|| {
        TanglematchError::InvalidPayload {
            reason: format!("unknown nft {id}"),
        }
    })?;

    let locked_until = lock_expiry(ctx.now, weeks)?;
    let builder = OutputBuilder::new(ctx.rent()?);
    let params = NftOutputParams {
        amount: transfer.amount,
        nft_id: record.nft,
        owner: transfer.source_address,
        issuer: Some(record.issuer),
        immutable_metadata: None,
        metadata: (!record.metadata.is_empty()).then(|| record.metadata.clone()),
        tag: None,
        timelock_unix: Some(locked_until),
    };
    let required = builder.nft_floor(&params);
    if transfer.amount < required {
        return Err(TanglematchError::InsufficientAmount { required });
    }
    let relocked = builder.nft(params)?;

    Ok(vec![
        WriteOp::PutDomain(DomainRecord::NftStake(NftStakeRecord {
            order: order.id,
            member,
            nft: record.nft,
            weeks,
            locked_until,
            created_at: ctx.now,
        })),
        WriteOp::PutEntry(LedgerEntry::Payment(entries::payment(
            order, member, transfer, ctx.now,
        ))),
        WriteOp::PutEntry(LedgerEntry::BillPayment(entries::bill_payment(
            order,
            member,
            transfer,
            ROLE_BILL,
            transfer.source_address,
            relocked,
            ctx.now,
        ))),
    ])
}

// ---------------------------------------------------------------------------
// Awards and votes
// ---------------------------------------------------------------------------

/// Fund an award campaign at its listed price.
async fn award_fund(
    ctx: &HandlerContext<'_>,
    order: &Order,
    member: Option<MemberId>,
    transfer: &ObservedTransfer,
    award: AwardId,
) -> Result<Vec<WriteOp>> {
    let record = ctx.store.award(award).await?.ok_or_else(|| {
        TanglematchError::InvalidPayload {
            reason: format!("unknown {award}"),
        }
    })?;
    if record.funded {
        return Err(TanglematchError::InvalidPayload {
            reason: format!("{award} is already funded"),
        });
    }
    if record.amount == 0 {
        return Err(TanglematchError::InvalidPayload {
            reason: format!("{award} has no funding price"),
        });
    }
    if transfer.amount < record.amount {
        return Err(TanglematchError::InsufficientAmount {
            required: record.amount,
        });
    }

    Ok(vec![
        WriteOp::MarkAwardFunded { award },
        WriteOp::PutDomain(DomainRecord::AwardPayment(AwardPayment {
            award,
            order: order.id,
            member,
            amount: transfer.amount,
            created_at: ctx.now,
        })),
        WriteOp::PutEntry(LedgerEntry::Payment(entries::payment(
            order, member, transfer, ctx.now,
        ))),
    ])
}

/// Record a vote weighted by the delivered amount. The deposit only proves
/// token ownership and goes straight back.
async fn proposal_vote(
    ctx: &HandlerContext<'_>,
    order: &Order,
    member: Option<MemberId>,
    transfer: &ObservedTransfer,
    proposal: ProposalId,
    values: &[u64],
) -> Result<Vec<WriteOp>> {
    let record = ctx.store.proposal(proposal).await?.ok_or_else(|| {
        TanglematchError::InvalidPayload {
            reason: format!("unknown {proposal}"),
        }
    })?;
    if !record.open {
        return Err(TanglematchError::InvalidPayload {
            reason: format!("{proposal} is closed"),
        });
    }
    if values.is_empty() {
        return Err(TanglematchError::InvalidPayload {
            reason: "a vote needs at least one answer".into(),
        });
    }

    Ok(vec![
        WriteOp::PutDomain(DomainRecord::Vote(VoteRecord {
            proposal,
            order: order.id,
            member,
            values: values.to_vec(),
            weight: transfer.amount,
            created_at: ctx.now,
        })),
        WriteOp::PutEntry(LedgerEntry::Credit(entries::full_credit(
            order,
            member,
            transfer,
            CreditReason::DepositReturned,
            ctx.now,
        ))),
    ])
}

// ---------------------------------------------------------------------------
// Metadata NFTs
// ---------------------------------------------------------------------------

/// Mint a metadata NFT, or update one when `nft` names an existing record.
async fn metadata_nft(
    ctx: &HandlerContext<'_>,
    order: &Order,
    member: Option<MemberId>,
    transfer: &ObservedTransfer,
    identity: Option<IdentityId>,
    nft: Option<NftId>,
    metadata: &str,
) -> Result<Vec<WriteOp>> {
    if metadata.is_empty() {
        return Err(TanglematchError::InvalidPayload {
            reason: "metadata must not be empty".into(),
        });
    }
    match nft {
        Some(id) => update_metadata_nft(ctx, order, member, transfer, identity, id, metadata).await,
        None => mint_metadata_nft(ctx, order, member, transfer, identity, metadata),
    }
}

/// Price the identity/NFT pair, split the deposit across both and build
/// them. The identity keeps its exact floor; the rest of the deposit rides
/// on the NFT so nothing is stranded on the deposit address.
fn build_identity_nft_pair(
    builder: &OutputBuilder<'_>,
    mut identity_params: IdentityOutputParams,
    mut nft_params: NftOutputParams,
    deposit: u64,
) -> Result<(Output, Output)> {
    let identity_floor = builder.identity_floor(&identity_params);
    let nft_floor = builder.nft_floor(&nft_params);
    let required = identity_floor
        .checked_add(nft_floor)
        .ok_or(TanglematchError::AmountOverflow)?;
    if deposit < required {
        return Err(TanglematchError::InsufficientAmount { required });
    }
    identity_params.amount = identity_floor;
    nft_params.amount = deposit - identity_floor;
    Ok((builder.identity(identity_params)?, builder.nft(nft_params)?))
}

fn mint_metadata_nft(
    ctx: &HandlerContext<'_>,
    order: &Order,
    member: Option<MemberId>,
    transfer: &ObservedTransfer,
    identity: Option<IdentityId>,
    metadata: &str,
) -> Result<Vec<WriteOp>> {
    let builder = OutputBuilder::new(ctx.rent()?);
    let identity_id = identity.unwrap_or_else(IdentityId::null);
    let identity_params = IdentityOutputParams {
        amount: 0,
        identity_id,
        state_index: 0,
        state_metadata: String::new(),
        mint_counter: 1,
        owner: order.target_address,
        issuer: order.target_address,
    };
    let nft_params = NftOutputParams {
        amount: 0,
        nft_id: NftId::null(),
        owner: transfer.source_address,
        issuer: Some(order.target_address),
        immutable_metadata: None,
        metadata: Some(metadata.to_owned()),
        tag: None,
        timelock_unix: None,
    };
    let (identity_out, nft_out) =
        build_identity_nft_pair(&builder, identity_params, nft_params, transfer.amount)?;

    let record = MintedNftRecord {
        nft: MintedNftRecord::provisional_nft_id(order.id, transfer.transfer_id),
        identity: identity_id,
        order: order.id,
        member,
        issuer: order.target_address,
        metadata: metadata.to_owned(),
        state_index: 0,
        mint_counter: 1,
        created_at: ctx.now,
    };

    Ok(vec![
        WriteOp::PutDomain(DomainRecord::MintedNft(record)),
        WriteOp::PutEntry(LedgerEntry::Payment(entries::payment(
            order, member, transfer, ctx.now,
        ))),
        WriteOp::PutEntry(LedgerEntry::BillPayment(entries::bill_payment(
            order,
            member,
            transfer,
            ROLE_BILL_IDENTITY,
            order.target_address,
            identity_out,
            ctx.now,
        ))),
        WriteOp::PutEntry(LedgerEntry::BillPayment(entries::bill_payment(
            order,
            member,
            transfer,
            ROLE_BILL_NFT,
            transfer.source_address,
            nft_out,
            ctx.now,
        ))),
    ])
}

async fn update_metadata_nft(
    ctx: &HandlerContext<'_>,
    order: &Order,
    member: Option<MemberId>,
    transfer: &ObservedTransfer,
    identity: Option<IdentityId>,
    id: NftId,
    metadata: &str,
) -> Result<Vec<WriteOp>> {
    let record = ctx.store.minted_nft(id).await?.ok_or_else(|| {
        TanglematchError::InvalidPayload {
            reason: format!("unknown nft {id}"),
        }
    })?;
    if let Some(requested) = identity {
        if requested != record.identity {
            return Err(TanglematchError::InvalidPayload {
                reason: format!("nft {id} belongs to a different identity"),
            });
        }
    }

    let builder = OutputBuilder::new(ctx.rent()?);
    let identity_params = IdentityOutputParams {
        amount: 0,
        identity_id: record.identity,
        state_index: record.state_index + 1,
        state_metadata: String::new(),
        mint_counter: record.mint_counter,
        owner: record.issuer,
        issuer: record.issuer,
    };
    let nft_params = NftOutputParams {
        amount: 0,
        nft_id: record.nft,
        owner: transfer.source_address,
        issuer: Some(record.issuer),
        immutable_metadata: None,
        metadata: Some(metadata.to_owned()),
        tag: None,
        timelock_unix: None,
    };
    let (identity_out, nft_out) =
        build_identity_nft_pair(&builder, identity_params, nft_params, transfer.amount)?;

    let updated = MintedNftRecord {
        metadata: metadata.to_owned(),
        state_index: record.state_index + 1,
        ..record
    };

    Ok(vec![
        WriteOp::PutDomain(DomainRecord::MintedNft(updated)),
        WriteOp::PutEntry(LedgerEntry::Payment(entries::payment(
            order, member, transfer, ctx.now,
        ))),
        WriteOp::PutEntry(LedgerEntry::BillPayment(entries::bill_payment(
            order,
            member,
            transfer,
            ROLE_BILL_IDENTITY,
            record.issuer,
            identity_out,
            ctx.now,
        ))),
        WriteOp::PutEntry(LedgerEntry::BillPayment(entries::bill_payment(
            order,
            member,
            transfer,
            ROLE_BILL_NFT,
            transfer.source_address,
            nft_out,
            ctx.now,
        ))),
    ])
}

// ---------------------------------------------------------------------------
// Stamps and swaps
// ---------------------------------------------------------------------------

/// Fund content stamping; the deposit must cover the byte-cost fee.
async fn stamp(
    ctx: &HandlerContext<'_>,
    order: &Order,
    member: Option<MemberId>,
    transfer: &ObservedTransfer,
    id: StampId,
) -> Result<Vec<WriteOp>> {
    let record = ctx.store.stamp(id).await?.ok_or_else(|| {
        TanglematchError::InvalidPayload {
            reason: format!("unknown {id}"),
        }
    })?;
    if record.funded {
        return Err(TanglematchError::InvalidPayload {
            reason: format!("{id} is already funded"),
        });
    }
    let fee = storage_fee_for_bytes(ctx.rent()?, record.bytes);
    if transfer.amount < fee {
        return Err(TanglematchError::InsufficientAmount { required: fee });
    }

    Ok(vec![
        WriteOp::MarkStampFunded { stamp: id },
        WriteOp::PutDomain(DomainRecord::Stamp(StampRecord {
            stamp: id,
            order: order.id,
            member,
            amount: transfer.amount,
            fee,
            created_at: ctx.now,
        })),
        WriteOp::PutEntry(LedgerEntry::Payment(entries::payment(
            order, member, transfer, ctx.now,
        ))),
    ])
}

/// Fund one side of a two-party swap. The store derives fulfilment when the
/// second side lands.
async fn swap(
    ctx: &HandlerContext<'_>,
    order: &Order,
    member: Option<MemberId>,
    transfer: &ObservedTransfer,
    id: SwapId,
) -> Result<Vec<WriteOp>> {
    let record = ctx.store.swap(id).await?.ok_or_else(|| {
        TanglematchError::InvalidPayload {
            reason: format!("unknown {id}"),
        }
    })?;
    if record.fulfilled {
        return Err(TanglematchError::InvalidPayload {
            reason: format!("{id} is already fulfilled"),
        });
    }
    if record.maker_order != order.id && record.taker_order != order.id {
        return Err(TanglematchError::InvalidPayload {
            reason: format!("order {} is not a side of {id}", order.id),
        });
    }

    Ok(vec![
        WriteOp::PutDomain(DomainRecord::SwapFunding(SwapFundingRecord {
            swap: id,
            order: order.id,
            member,
            amount: transfer.amount,
            native_tokens: transfer.native_tokens.clone(),
            created_at: ctx.now,
        })),
        WriteOp::MarkSwapSideFunded {
            swap: id,
            order: order.id,
        },
        WriteOp::PutEntry(LedgerEntry::Payment(entries::payment(
            order, member, transfer, ctx.now,
        ))),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use tanglematch_types::{Address, NativeToken, OrderId, UnlockCondition};

    use crate::store::{Award, MemoryStore, Proposal, Stamp as StampDoc, Swap as SwapDoc};

    fn fixed_now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).single().unwrap()
    }

    fn ctx<'a>(store: &'a MemoryStore, rent: &'a RentStructure) -> HandlerContext<'a> {
        HandlerContext {
            store,
            rent: Some(rent),
            now: fixed_now(),
        }
    }

    fn required_of(result: Result<Vec<WriteOp>>) -> u64 {
        match result {
            Err(TanglematchError::InsufficientAmount { required }) => required,
            other => panic!("expected insufficient amount, got {other:?}"),
        }
    }

    fn payload_err(result: Result<Vec<WriteOp>>) -> String {
        match result {
            Err(TanglematchError::InvalidPayload { reason }) => reason,
            other => panic!("expected invalid payload, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn validate_address_binds_and_credits_back() {
        let store = MemoryStore::new();
        let member = MemberId::new();
        let sender = Address::dummy();
        let order = Order::dummy_with_request(Address::dummy(), RequestPayload::ValidateAddress);
        let transfer = ObservedTransfer::dummy(sender, order.target_address, 1_000_000);

        let ctx = HandlerContext {
            store: &store,
            rent: None,
            now: fixed_now(),
        };
        let ops = dispatch(&ctx, &order, Some(member), &transfer).await.unwrap();
        assert_eq!(ops.len(), 2);

        let WriteOp::PutDomain(DomainRecord::MemberAddress(binding)) = &ops[0] else {
            panic!("expected a member-address binding");
        };
        assert_eq!(binding.member, member);
        assert_eq!(binding.address, sender);
        assert_eq!(binding.order, order.id);

        let WriteOp::PutEntry(LedgerEntry::Credit(credit)) = &ops[1] else {
            panic!("expected a credit entry");
        };
        assert_eq!(credit.reason, Some(CreditReason::DepositReturned));
        assert_eq!(credit.amount, 1_000_000);
        assert_eq!(credit.target_address, sender);
    }

    #[tokio::test]
    async fn validate_address_requires_a_member() {
        let store = MemoryStore::new();
        let order = Order::dummy_with_request(Address::dummy(), RequestPayload::ValidateAddress);
        let transfer = ObservedTransfer::dummy(Address::dummy(), order.target_address, 100);
        let ctx = HandlerContext {
            store: &store,
            rent: None,
            now: fixed_now(),
        };
        let reason = payload_err(dispatch(&ctx, &order, None, &transfer).await);
        assert!(reason.contains("member"));
    }

    #[tokio::test]
    async fn token_buy_validates_listing_and_total() {
        let store = MemoryStore::new();
        let rent = RentStructure::default();
        let token = TokenId::dummy();
        let request = RequestPayload::TokenBuy {
            token,
            count: 4,
            price: Decimal::new(250, 0),
        };
        let order = Order::dummy_with_request(Address::dummy(), request);
        let transfer = ObservedTransfer::dummy(Address::dummy(), order.target_address, 1_000);

        let ctx = ctx(&store, &rent);
        let reason = payload_err(dispatch(&ctx, &order, None, &transfer).await);
        assert!(reason.contains("unknown token"));

        store
            .insert_token_listing(crate::store::TokenListing {
                id: token,
                symbol: "SOON".into(),
                tradable: false,
            })
            .await;
        let reason = payload_err(dispatch(&ctx, &order, None, &transfer).await);
        assert!(reason.contains("not tradable"));

        store
            .insert_token_listing(crate::store::TokenListing {
                id: token,
                symbol: "SOON".into(),
                tradable: true,
            })
            .await;

        let short = ObservedTransfer::dummy(Address::dummy(), order.target_address, 999);
        assert_eq!(required_of(dispatch(&ctx, &order, None, &short).await), 1_000);

        let ops = dispatch(&ctx, &order, None, &transfer).await.unwrap();
        let WriteOp::PutDomain(DomainRecord::TradeOrder(trade)) = &ops[0] else {
            panic!("expected a trade-order record");
        };
        assert_eq!(trade.side, TradeSide::Buy);
        assert_eq!(trade.count, 4);
        assert!(matches!(&ops[1], WriteOp::PutEntry(LedgerEntry::Payment(_))));
    }

    #[tokio::test]
    async fn fractional_trade_total_is_rejected() {
        let store = MemoryStore::new();
        let rent = RentStructure::default();
        let token = TokenId::dummy();
        store
            .insert_token_listing(crate::store::TokenListing {
                id: token,
                symbol: "SOON".into(),
                tradable: true,
            })
            .await;
        // 3 × 0.5 = 1.5 base units: not payable.
        let order = Order::dummy_with_request(
            Address::dummy(),
            RequestPayload::TokenBuy {
                token,
                count: 3,
                price: Decimal::new(5, 1),
            },
        );
        let transfer = ObservedTransfer::dummy(Address::dummy(), order.target_address, 1_000);
        let ctx = ctx(&store, &rent);
        let reason = payload_err(dispatch(&ctx, &order, None, &transfer).await);
        assert!(reason.contains("whole amount"));
    }

    #[tokio::test]
    async fn token_sell_requires_the_tokens_delivered() {
        let store = MemoryStore::new();
        let rent = RentStructure::default();
        let token = TokenId::dummy();
        store
            .insert_token_listing(crate::store::TokenListing {
                id: token,
                symbol: "SOON".into(),
                tradable: true,
            })
            .await;
        let order = Order::dummy_with_request(
            Address::dummy(),
            RequestPayload::TokenSell {
                token,
                count: 10,
                price: Decimal::new(100, 0),
            },
        );
        let ctx = ctx(&store, &rent);

        let mut transfer = ObservedTransfer::dummy(Address::dummy(), order.target_address, 50_000);
        transfer.native_tokens = vec![NativeToken::new(token, 7)];
        assert_eq!(required_of(dispatch(&ctx, &order, None, &transfer).await), 10);

        transfer.native_tokens = vec![NativeToken::new(token, 10)];
        let ops = dispatch(&ctx, &order, None, &transfer).await.unwrap();
        let WriteOp::PutDomain(DomainRecord::TradeOrder(trade)) = &ops[0] else {
            panic!("expected a trade-order record");
        };
        assert_eq!(trade.side, TradeSide::Sell);
    }

    #[tokio::test]
    async fn stake_locks_the_whole_deposit_back_to_the_sender() {
        let store = MemoryStore::new();
        let rent = RentStructure::default();
        let sender = Address::dummy();
        let order = Order::dummy_with_request(
            Address::dummy(),
            RequestPayload::Stake {
                weeks: 4,
                stake_type: StakeType::Dynamic,
            },
        );
        let transfer = ObservedTransfer::dummy(sender, order.target_address, 1_000_000);
        let ctx = ctx(&store, &rent);

        let ops = dispatch(&ctx, &order, None, &transfer).await.unwrap();
        assert_eq!(ops.len(), 3);
        // 4 weeks from the fixed clock.
        let expected_until = 1_700_000_000 + 4 * constants::SECONDS_PER_WEEK;
        let WriteOp::PutDomain(DomainRecord::Stake(record)) = &ops[0] else {
            panic!("expected a stake record");
        };
        assert_eq!(record.locked_until, expected_until);
        assert_eq!(record.amount, 1_000_000);
        assert_eq!(record.stake_type, StakeType::Dynamic);

        let WriteOp::PutEntry(LedgerEntry::BillPayment(bill)) = &ops[2] else {
            panic!("expected a bill payment");
        };
        assert_eq!(bill.amount, 1_000_000);
        assert_eq!(bill.target_address, sender);
        let output = bill.output.as_ref().unwrap();
        assert!(output
            .unlock_conditions()
            .iter()
            .any(|c| matches!(c, UnlockCondition::Timelock { unix_time } if *unix_time == expected_until)));
    }

    #[tokio::test]
    async fn stake_below_the_locked_floor_reports_required() {
        let store = MemoryStore::new();
        let rent = RentStructure::default();
        let order = Order::dummy_with_request(
            Address::dummy(),
            RequestPayload::Stake {
                weeks: 12,
                stake_type: StakeType::Static,
            },
        );
        // One below the floor of a timelocked value output.
        let transfer = ObservedTransfer::dummy(Address::dummy(), order.target_address, 42_799);
        let ctx = ctx(&store, &rent);
        assert_eq!(required_of(dispatch(&ctx, &order, None, &transfer).await), 42_800);
    }

    #[tokio::test]
    async fn stake_weeks_out_of_bounds_are_rejected() {
        let store = MemoryStore::new();
        let rent = RentStructure::default();
        let ctx = ctx(&store, &rent);
        for weeks in [0, 53] {
            let order = Order::dummy_with_request(
                Address::dummy(),
                RequestPayload::Stake {
                    weeks,
                    stake_type: StakeType::Static,
                },
            );
            let transfer = ObservedTransfer::dummy(Address::dummy(), order.target_address, 1_000_000);
            let reason = payload_err(dispatch(&ctx, &order, None, &transfer).await);
            assert!(reason.contains("between"), "weeks {weeks}: {reason}");
        }
    }

    #[tokio::test]
    async fn nft_stake_needs_a_delivered_nft() {
        let store = MemoryStore::new();
        let rent = RentStructure::default();
        let order = Order::dummy_with_request(
            Address::dummy(),
            RequestPayload::NftStake { weeks: 2 },
        );
        let transfer = ObservedTransfer::dummy(Address::dummy(), order.target_address, 1_000_000);
        let ctx = ctx(&store, &rent);
        let reason = payload_err(dispatch(&ctx, &order, None, &transfer).await);
        assert!(reason.contains("non-fungible"));
    }

    #[tokio::test]
    async fn nft_stake_prices_the_relocked_output() {
        let store = MemoryStore::new();
        let rent = RentStructure::default();
        let sender = Address::dummy();
        let nft = NftId::dummy();
        store
            .insert_minted_nft(MintedNftRecord {
                nft,
                identity: IdentityId::dummy(),
                order: OrderId::new(),
                member: None,
                issuer: Address::dummy(),
                metadata: "art".into(),
                state_index: 0,
                mint_counter: 1,
                created_at: fixed_now(),
            })
            .await;
        let order = Order::dummy_with_request(
            Address::dummy(),
            RequestPayload::NftStake { weeks: 2 },
        );
        let ctx = ctx(&store, &rent);

        // Re-locked shape: address + timelock + issuer + 3-byte metadata.
        let mut transfer = ObservedTransfer::dummy(sender, order.target_address, 49_999);
        transfer.consumed = ConsumedOutputKind::Nft { id: nft };
        assert_eq!(required_of(dispatch(&ctx, &order, None, &transfer).await), 50_000);

        transfer.amount = 50_000;
        let ops = dispatch(&ctx, &order, None, &transfer).await.unwrap();
        let WriteOp::PutDomain(DomainRecord::NftStake(record)) = &ops[0] else {
            panic!("expected an nft-stake record");
        };
        assert_eq!(record.nft, nft);
        assert_eq!(record.locked_until, 1_700_000_000 + 2 * constants::SECONDS_PER_WEEK);

        let WriteOp::PutEntry(LedgerEntry::BillPayment(bill)) = &ops[2] else {
            panic!("expected a bill payment");
        };
        let Some(Output::Nft(relocked)) = &bill.output else {
            panic!("expected an NFT output");
        };
        assert_eq!(relocked.nft_id, nft);
        assert_eq!(relocked.amount, 50_000);
        assert!(relocked
            .unlock_conditions
            .iter()
            .any(|c| matches!(c, UnlockCondition::Timelock { .. })));
    }

    #[tokio::test]
    async fn award_funding_validates_the_campaign() {
        let store = MemoryStore::new();
        let rent = RentStructure::default();
        let award = AwardId::new();
        let order = Order::dummy_with_request(
            Address::dummy(),
            RequestPayload::AwardFund { award },
        );
        let transfer = ObservedTransfer::dummy(Address::dummy(), order.target_address, 1_000);
        let ctx = ctx(&store, &rent);

        let reason = payload_err(dispatch(&ctx, &order, None, &transfer).await);
        assert!(reason.contains("unknown"));

        store
            .insert_award(Award {
                id: award,
                amount: 1_000,
                funded: true,
            })
            .await;
        let reason = payload_err(dispatch(&ctx, &order, None, &transfer).await);
        assert!(reason.contains("already funded"));

        store
            .insert_award(Award {
                id: award,
                amount: 0,
                funded: false,
            })
            .await;
        let reason = payload_err(dispatch(&ctx, &order, None, &transfer).await);
        assert!(reason.contains("no funding price"));

        store
            .insert_award(Award {
                id: award,
                amount: 1_000,
                funded: false,
            })
            .await;
        let short = ObservedTransfer::dummy(Address::dummy(), order.target_address, 999);
        assert_eq!(required_of(dispatch(&ctx, &order, None, &short).await), 1_000);

        let ops = dispatch(&ctx, &order, None, &transfer).await.unwrap();
        assert!(matches!(&ops[0], WriteOp::MarkAwardFunded { award: a } if *a == award));
        assert!(matches!(
            &ops[1],
            WriteOp::PutDomain(DomainRecord::AwardPayment(_))
        ));
        assert!(matches!(&ops[2], WriteOp::PutEntry(LedgerEntry::Payment(_))));
    }

    #[tokio::test]
    async fn vote_records_weight_and_credits_the_deposit_back() {
        let store = MemoryStore::new();
        let rent = RentStructure::default();
        let proposal = ProposalId::new();
        let order = Order::dummy_with_request(
            Address::dummy(),
            RequestPayload::ProposalVote {
                proposal,
                values: vec![2],
            },
        );
        let transfer = ObservedTransfer::dummy(Address::dummy(), order.target_address, 5_000);
        let ctx = ctx(&store, &rent);

        store
            .insert_proposal(Proposal {
                id: proposal,
                open: false,
            })
            .await;
        let reason = payload_err(dispatch(&ctx, &order, None, &transfer).await);
        assert!(reason.contains("closed"));

        store
            .insert_proposal(Proposal {
                id: proposal,
                open: true,
            })
            .await;
        let ops = dispatch(&ctx, &order, None, &transfer).await.unwrap();
        let WriteOp::PutDomain(DomainRecord::Vote(vote)) = &ops[0] else {
            panic!("expected a vote record");
        };
        assert_eq!(vote.weight, 5_000);
        assert_eq!(vote.values, vec![2]);

        let WriteOp::PutEntry(LedgerEntry::Credit(credit)) = &ops[1] else {
            panic!("expected a credit entry");
        };
        assert_eq!(credit.reason, Some(CreditReason::DepositReturned));
        assert_eq!(credit.amount, 5_000);
    }

    #[tokio::test]
    async fn empty_ballot_is_rejected() {
        let store = MemoryStore::new();
        let rent = RentStructure::default();
        let proposal = ProposalId::new();
        store
            .insert_proposal(Proposal {
                id: proposal,
                open: true,
            })
            .await;
        let order = Order::dummy_with_request(
            Address::dummy(),
            RequestPayload::ProposalVote {
                proposal,
                values: Vec::new(),
            },
        );
        let transfer = ObservedTransfer::dummy(Address::dummy(), order.target_address, 5_000);
        let ctx = ctx(&store, &rent);
        let reason = payload_err(dispatch(&ctx, &order, None, &transfer).await);
        assert!(reason.contains("answer"));
    }

    #[tokio::test]
    async fn metadata_mint_splits_the_deposit_across_both_outputs() {
        let store = MemoryStore::new();
        let rent = RentStructure::default();
        let sender = Address::dummy();
        let order = Order::dummy_with_request(
            Address::dummy(),
            RequestPayload::MetadataNft {
                identity: None,
                nft: None,
                metadata: "hello".into(),
            },
        );
        let ctx = ctx(&store, &rent);

        // Identity floor 53_500 + NFT floor 49_700 for 5-byte metadata.
        let short = ObservedTransfer::dummy(sender, order.target_address, 103_199);
        assert_eq!(required_of(dispatch(&ctx, &order, None, &short).await), 103_200);

        let transfer = ObservedTransfer::dummy(sender, order.target_address, 110_000);
        let ops = dispatch(&ctx, &order, None, &transfer).await.unwrap();
        assert_eq!(ops.len(), 4);

        let WriteOp::PutDomain(DomainRecord::MintedNft(record)) = &ops[0] else {
            panic!("expected a minted-nft record");
        };
        assert_eq!(
            record.nft,
            MintedNftRecord::provisional_nft_id(order.id, transfer.transfer_id)
        );
        assert!(record.identity.is_null());
        assert_eq!(record.metadata, "hello");
        assert_eq!(record.state_index, 0);

        let WriteOp::PutEntry(LedgerEntry::BillPayment(identity_bill)) = &ops[2] else {
            panic!("expected the identity bill");
        };
        assert_eq!(identity_bill.amount, 53_500);
        assert_eq!(identity_bill.target_address, order.target_address);

        let WriteOp::PutEntry(LedgerEntry::BillPayment(nft_bill)) = &ops[3] else {
            panic!("expected the nft bill");
        };
        assert_eq!(nft_bill.amount, 110_000 - 53_500);
        assert_eq!(nft_bill.target_address, sender);
        let Some(Output::Nft(minted)) = &nft_bill.output else {
            panic!("expected an NFT output");
        };
        // A fresh mint carries the null id until the ledger assigns one.
        assert!(minted.nft_id.is_null());
    }

    #[tokio::test]
    async fn metadata_update_remints_under_the_existing_identity() {
        let store = MemoryStore::new();
        let rent = RentStructure::default();
        let sender = Address::dummy();
        let custody = Address::dummy();
        let nft = NftId::dummy();
        let identity = IdentityId::dummy();
        store
            .insert_minted_nft(MintedNftRecord {
                nft,
                identity,
                order: OrderId::new(),
                member: None,
                issuer: custody,
                metadata: "old".into(),
                state_index: 3,
                mint_counter: 7,
                created_at: fixed_now(),
            })
            .await;
        let ctx = ctx(&store, &rent);

        let mismatched = Order::dummy_with_request(
            Address::dummy(),
            RequestPayload::MetadataNft {
                identity: Some(IdentityId::dummy()),
                nft: Some(nft),
                metadata: "new".into(),
            },
        );
        let transfer = ObservedTransfer::dummy(sender, mismatched.target_address, 110_000);
        let reason = payload_err(dispatch(&ctx, &mismatched, None, &transfer).await);
        assert!(reason.contains("different identity"));

        let order = Order::dummy_with_request(
            Address::dummy(),
            RequestPayload::MetadataNft {
                identity: Some(identity),
                nft: Some(nft),
                metadata: "new".into(),
            },
        );
        let transfer = ObservedTransfer::dummy(sender, order.target_address, 110_000);
        let ops = dispatch(&ctx, &order, None, &transfer).await.unwrap();

        let WriteOp::PutDomain(DomainRecord::MintedNft(updated)) = &ops[0] else {
            panic!("expected the updated record");
        };
        assert_eq!(updated.state_index, 4);
        assert_eq!(updated.metadata, "new");
        assert_eq!(updated.nft, nft);

        let WriteOp::PutEntry(LedgerEntry::BillPayment(identity_bill)) = &ops[2] else {
            panic!("expected the identity bill");
        };
        let Some(Output::Identity(reminted)) = &identity_bill.output else {
            panic!("expected an identity output");
        };
        assert_eq!(reminted.identity_id, identity);
        assert_eq!(reminted.state_index, 4);
        assert_eq!(reminted.mint_counter, 7);

        let WriteOp::PutEntry(LedgerEntry::BillPayment(nft_bill)) = &ops[3] else {
            panic!("expected the nft bill");
        };
        let Some(Output::Nft(rebuilt)) = &nft_bill.output else {
            panic!("expected an NFT output");
        };
        assert_eq!(rebuilt.nft_id, nft);
    }

    #[tokio::test]
    async fn stamp_fee_derives_from_content_bytes() {
        let store = MemoryStore::new();
        let rent = RentStructure::default();
        let id = StampId::new();
        store
            .insert_stamp(StampDoc {
                id,
                bytes: 1024,
                funded: false,
            })
            .await;
        let order =
            Order::dummy_with_request(Address::dummy(), RequestPayload::Stamp { stamp: id });
        let ctx = ctx(&store, &rent);

        // 1024 bytes at the default cost.
        let short = ObservedTransfer::dummy(Address::dummy(), order.target_address, 102_399);
        assert_eq!(required_of(dispatch(&ctx, &order, None, &short).await), 102_400);

        let transfer = ObservedTransfer::dummy(Address::dummy(), order.target_address, 102_400);
        let ops = dispatch(&ctx, &order, None, &transfer).await.unwrap();
        assert!(matches!(&ops[0], WriteOp::MarkStampFunded { stamp } if *stamp == id));
        let WriteOp::PutDomain(DomainRecord::Stamp(record)) = &ops[1] else {
            panic!("expected a stamp record");
        };
        assert_eq!(record.fee, 102_400);

        store
            .insert_stamp(StampDoc {
                id,
                bytes: 1024,
                funded: true,
            })
            .await;
        let reason = payload_err(dispatch(&ctx, &order, None, &transfer).await);
        assert!(reason.contains("already funded"));
    }

    #[tokio::test]
    async fn swap_funding_validates_membership_and_state() {
        let store = MemoryStore::new();
        let rent = RentStructure::default();
        let id = SwapId::new();
        let maker_order =
            Order::dummy_with_request(Address::dummy(), RequestPayload::Swap { swap: id });
        store
            .insert_swap(SwapDoc {
                id,
                maker_order: maker_order.id,
                taker_order: OrderId::new(),
                maker_funded: false,
                taker_funded: false,
                fulfilled: false,
            })
            .await;
        let ctx = ctx(&store, &rent);
        let transfer = ObservedTransfer::dummy(Address::dummy(), maker_order.target_address, 9_000);

        let foreign = Order::dummy_with_request(
            Address::dummy(),
            RequestPayload::Swap { swap: id },
        );
        let reason = payload_err(dispatch(&ctx, &foreign, None, &transfer).await);
        assert!(reason.contains("not a side"));

        let ops = dispatch(&ctx, &maker_order, None, &transfer).await.unwrap();
        let WriteOp::PutDomain(DomainRecord::SwapFunding(funding)) = &ops[0] else {
            panic!("expected a swap-funding record");
        };
        assert_eq!(funding.swap, id);
        assert_eq!(funding.amount, 9_000);
        assert!(matches!(
            &ops[1],
            WriteOp::MarkSwapSideFunded { swap, order }
                if *swap == id && *order == maker_order.id
        ));

        store
            .insert_swap(SwapDoc {
                id,
                maker_order: maker_order.id,
                taker_order: OrderId::new(),
                maker_funded: true,
                taker_funded: true,
                fulfilled: true,
            })
            .await;
        let reason = payload_err(dispatch(&ctx, &maker_order, None, &transfer).await);
        assert!(reason.contains("already fulfilled"));
    }

    #[tokio::test]
    async fn output_building_kinds_need_rent_parameters() {
        assert!(needs_rent(&RequestPayload::Stake {
            weeks: 1,
            stake_type: StakeType::Static
        }));
        assert!(needs_rent(&RequestPayload::NftStake { weeks: 1 }));
        assert!(needs_rent(&RequestPayload::MetadataNft {
            identity: None,
            nft: None,
            metadata: "m".into()
        }));
        assert!(needs_rent(&RequestPayload::Stamp {
            stamp: StampId::new()
        }));
        assert!(!needs_rent(&RequestPayload::ValidateAddress));
        assert!(!needs_rent(&RequestPayload::Swap {
            swap: SwapId::new()
        }));

        // Dispatching an output-building kind without rent is an internal
        // error, not a business failure.
        let store = MemoryStore::new();
        let ctx = HandlerContext {
            store: &store,
            rent: None,
            now: fixed_now(),
        };
        let order = Order::dummy_with_request(
            Address::dummy(),
            RequestPayload::Stake {
                weeks: 1,
                stake_type: StakeType::Static,
            },
        );
        let transfer = ObservedTransfer::dummy(Address::dummy(), order.target_address, 1_000_000);
        let err = dispatch(&ctx, &order, None, &transfer).await.unwrap_err();
        assert!(matches!(err, TanglematchError::Internal(_)));
    }
}
