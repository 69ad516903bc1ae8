//! Document store: platform records, domain records, atomic write groups.
//!
//! The matcher never writes documents one at a time. Every invocation
//! collects its effects into a [`WriteGroup`] keyed by the order id and
//! commits the group in one shot:
//!
//! ```text
//!   handlers ──► Vec<WriteOp> ──► WriteGroup ──► DocumentStore::commit
//!                                                (all or nothing)
//! ```
//!
//! Platform records (token listings, awards, proposals, stamps, swaps) are
//! created by feature code upstream; the matcher only reads them and flips
//! their funding flags inside a committed group. Ledger entries are keyed by
//! their deterministic ids, so a redelivered commit overwrites its own
//! documents instead of minting duplicates.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use tanglematch_types::{
    Address, AwardId, EntryId, IdentityId, LedgerEntry, MemberId, NativeToken, Network, NftId,
    Order, OrderId, ProposalId, Result, StakeType, StampId, SwapId, TanglematchError, TokenId,
    TransferId,
};

// ---------------------------------------------------------------------------
// Platform records (read side)
// ---------------------------------------------------------------------------

/// A token listed for trading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenListing {
    pub id: TokenId,
    pub symbol: String,
    /// Buy and sell requests are refused while this is false.
    pub tradable: bool,
}

/// An award campaign awaiting funding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Award {
    pub id: AwardId,
    /// Base units required to fund the campaign. Zero means unpriced.
    pub amount: u64,
    pub funded: bool,
}

/// A governance proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub open: bool,
}

/// Content awaiting its storage-fee payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stamp {
    pub id: StampId,
    /// Size of the stamped content; drives the fee.
    pub bytes: u64,
    pub funded: bool,
}

/// A two-party swap. Each side funds through its own deposit order; the
/// store derives `fulfilled` the moment both sides are funded, inside the
/// same committed group that funds the second side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Swap {
    pub id: SwapId,
    pub maker_order: OrderId,
    pub taker_order: OrderId,
    pub maker_funded: bool,
    pub taker_funded: bool,
    pub fulfilled: bool,
}

// ---------------------------------------------------------------------------
// Domain records (write side)
// ---------------------------------------------------------------------------

/// Side of a token trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSide {
    Buy,
    Sell,
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// A member's proven control of a source address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberAddress {
    pub member: MemberId,
    pub address: Address,
    pub network: Network,
    /// The validation order that established the binding.
    pub order: OrderId,
    pub validated_at: DateTime<Utc>,
}

/// An open token buy or sell registered by a funded trade request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeOrderRecord {
    pub order: OrderId,
    pub member: Option<MemberId>,
    pub token: TokenId,
    pub side: TradeSide,
    pub count: u64,
    pub price: Decimal,
    pub created_at: DateTime<Utc>,
}

/// A funded value stake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StakeRecord {
    pub order: OrderId,
    pub member: Option<MemberId>,
    pub amount: u64,
    pub weeks: u32,
    pub stake_type: StakeType,
    /// Unix time the locked output becomes spendable again.
    pub locked_until: u32,
    pub created_at: DateTime<Utc>,
}

/// A re-locked NFT stake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NftStakeRecord {
    pub order: OrderId,
    pub member: Option<MemberId>,
    pub nft: NftId,
    pub weeks: u32,
    pub locked_until: u32,
    pub created_at: DateTime<Utc>,
}

/// The payment that funded an award campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AwardPayment {
    pub award: AwardId,
    pub order: OrderId,
    pub member: Option<MemberId>,
    pub amount: u64,
    pub created_at: DateTime<Utc>,
}

/// One vote on a proposal, weighted by the delivered amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub proposal: ProposalId,
    pub order: OrderId,
    pub member: Option<MemberId>,
    /// Selected answer values, in ballot order.
    pub values: Vec<u64>,
    pub weight: u64,
    pub created_at: DateTime<Utc>,
}

/// A metadata NFT minted or re-minted by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MintedNftRecord {
    /// Provisional until the chain watcher backfills the ledger-assigned id
    /// after the mint confirms.
    pub nft: NftId,
    /// Null for a fresh mint until the ledger assigns it.
    pub identity: IdentityId,
    pub order: OrderId,
    pub member: Option<MemberId>,
    /// Address the mint was issued from; updates re-mint through it.
    pub issuer: Address,
    pub metadata: String,
    pub state_index: u32,
    pub mint_counter: u32,
    pub created_at: DateTime<Utc>,
}

impl MintedNftRecord {
    /// Deterministic stand-in id for a mint whose ledger-assigned [`NftId`]
    /// is not known yet. Redelivery derives the same id, so a retried mint
    /// overwrites its own record.
    #[must_use]
    pub fn provisional_nft_id(order: OrderId, transfer: TransferId) -> NftId {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(b"tanglematch:nft_id:v1:");
        hasher.update(order.0.as_bytes());
        hasher.update(transfer.0);
        NftId::from_bytes(hasher.finalize().into())
    }
}

/// The payment that funded a content stamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StampRecord {
    pub stamp: StampId,
    pub order: OrderId,
    pub member: Option<MemberId>,
    pub amount: u64,
    /// Byte-cost fee the stamped content required.
    pub fee: u64,
    pub created_at: DateTime<Utc>,
}

/// The funding of one swap side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapFundingRecord {
    pub swap: SwapId,
    pub order: OrderId,
    pub member: Option<MemberId>,
    pub amount: u64,
    pub native_tokens: Vec<NativeToken>,
    pub created_at: DateTime<Utc>,
}

/// Any domain record a handler can emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum DomainRecord {
    MemberAddress(MemberAddress),
    TradeOrder(TradeOrderRecord),
    Stake(StakeRecord),
    NftStake(NftStakeRecord),
    AwardPayment(AwardPayment),
    Vote(VoteRecord),
    MintedNft(MintedNftRecord),
    Stamp(StampRecord),
    SwapFunding(SwapFundingRecord),
}

impl DomainRecord {
    /// The order that produced this record.
    #[must_use]
    pub fn order(&self) -> OrderId {
        match self {
            Self::MemberAddress(r) => r.order,
            Self::TradeOrder(r) => r.order,
            Self::Stake(r) => r.order,
            Self::NftStake(r) => r.order,
            Self::AwardPayment(r) => r.order,
            Self::Vote(r) => r.order,
            Self::MintedNft(r) => r.order,
            Self::Stamp(r) => r.order,
            Self::SwapFunding(r) => r.order,
        }
    }

    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::MemberAddress(_) => "MEMBER_ADDRESS",
            Self::TradeOrder(_) => "TRADE_ORDER",
            Self::Stake(_) => "STAKE",
            Self::NftStake(_) => "NFT_STAKE",
            Self::AwardPayment(_) => "AWARD_PAYMENT",
            Self::Vote(_) => "VOTE",
            Self::MintedNft(_) => "MINTED_NFT",
            Self::Stamp(_) => "STAMP",
            Self::SwapFunding(_) => "SWAP_FUNDING",
        }
    }
}

// ---------------------------------------------------------------------------
// Write groups
// ---------------------------------------------------------------------------

/// One write inside an atomic group.
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Insert or overwrite a ledger entry, keyed by its deterministic id.
    PutEntry(LedgerEntry),
    /// Append a domain record.
    PutDomain(DomainRecord),
    /// Terminally mark the order reconciled by `transfer`.
    MarkReconciled { order: OrderId, transfer: TransferId },
    /// Flip an award to funded.
    MarkAwardFunded { award: AwardId },
    /// Flip a stamp to funded.
    MarkStampFunded { stamp: StampId },
    /// Mark one swap side funded. The store recomputes `fulfilled` under the
    /// same lock, so two concurrently funding sides cannot both miss it.
    MarkSwapSideFunded { swap: SwapId, order: OrderId },
}

/// All writes of one matcher invocation, applied atomically.
#[derive(Debug, Clone)]
pub struct WriteGroup {
    /// The order being reconciled; the store's atomicity key.
    pub order: OrderId,
    pub ops: Vec<WriteOp>,
}

impl WriteGroup {
    #[must_use]
    pub fn new(order: OrderId, ops: Vec<WriteOp>) -> Self {
        Self { order, ops }
    }
}

// ---------------------------------------------------------------------------
// DocumentStore
// ---------------------------------------------------------------------------

/// Read and commit surface of the document database.
///
/// Reads are point lookups feeding the matcher and its handlers. The only
/// write path is [`commit`](DocumentStore::commit), which must apply a whole
/// [`WriteGroup`] or none of it.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Members that have validated `address` on `network`, deduplicated.
    async fn members_for_address(
        &self,
        address: &Address,
        network: Network,
    ) -> Result<Vec<MemberId>>;

    async fn token_listing(&self, id: TokenId) -> Result<Option<TokenListing>>;

    async fn award(&self, id: AwardId) -> Result<Option<Award>>;

    async fn proposal(&self, id: ProposalId) -> Result<Option<Proposal>>;

    async fn minted_nft(&self, id: NftId) -> Result<Option<MintedNftRecord>>;

    async fn stamp(&self, id: StampId) -> Result<Option<Stamp>>;

    async fn swap(&self, id: SwapId) -> Result<Option<Swap>>;

    /// Ledger entries created for `order`, in entry-id order.
    async fn entries_for_order(&self, order: OrderId) -> Result<Vec<LedgerEntry>>;

    async fn commit(&self, group: WriteGroup) -> Result<()>;
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory [`DocumentStore`] for tests and embedded deployments.
///
/// One `RwLock` guards all collections. `commit` stages the whole group on a
/// copy and swaps it in only when every op succeeded, so a failing group
/// leaves no trace.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default, Clone)]
struct Inner {
    orders: HashMap<OrderId, Order>,
    entries: BTreeMap<EntryId, LedgerEntry>,
    tokens: HashMap<TokenId, TokenListing>,
    awards: HashMap<AwardId, Award>,
    proposals: HashMap<ProposalId, Proposal>,
    stamps: HashMap<StampId, Stamp>,
    swaps: HashMap<SwapId, Swap>,
    minted_nfts: HashMap<NftId, MintedNftRecord>,
    member_addresses: Vec<MemberAddress>,
    domain_log: Vec<DomainRecord>,
}

impl Inner {
    fn apply(&mut self, op: WriteOp) -> Result<()> {
        match op {
            WriteOp::PutEntry(entry) => {
                self.entries.insert(entry.id(), entry);
            }
            WriteOp::PutDomain(record) => {
                match &record {
                    DomainRecord::MemberAddress(r) => self.member_addresses.push(r.clone()),
                    DomainRecord::MintedNft(r) => {
                        self.minted_nfts.insert(r.nft, r.clone());
                    }
                    _ => {}
                }
                self.domain_log.push(record);
            }
            WriteOp::MarkReconciled { order, transfer } => {
                let record = self
                    .orders
                    .get_mut(&order)
                    .ok_or(TanglematchError::OrderNotFound(order))?;
                record.reconciled = true;
                record.reconciled_by = Some(transfer);
            }
            WriteOp::MarkAwardFunded { award } => {
                let record = self.awards.get_mut(&award).ok_or_else(|| {
                    TanglematchError::Internal(format!("write group references missing {award}"))
                })?;
                record.funded = true;
            }
            WriteOp::MarkStampFunded { stamp } => {
                let record = self.stamps.get_mut(&stamp).ok_or_else(|| {
                    TanglematchError::Internal(format!("write group references missing {stamp}"))
                })?;
                record.funded = true;
            }
            WriteOp::MarkSwapSideFunded { swap, order } => {
                let record = self.swaps.get_mut(&swap).ok_or_else(|| {
                    TanglematchError::Internal(format!("write group references missing {swap}"))
                })?;
                if record.maker_order == order {
                    record.maker_funded = true;
                } else if record.taker_order == order {
                    record.taker_funded = true;
                } else {
                    return Err(TanglematchError::Internal(format!(
                        "order {order} is not a side of {swap}"
                    )));
                }
                record.fulfilled = record.maker_funded && record.taker_funded;
            }
        }
        Ok(())
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_order(&self, order: Order) {
        self.inner.write().await.orders.insert(order.id, order);
    }

    pub async fn insert_token_listing(&self, listing: TokenListing) {
        self.inner.write().await.tokens.insert(listing.id, listing);
    }

    pub async fn insert_award(&self, award: Award) {
        self.inner.write().await.awards.insert(award.id, award);
    }

    pub async fn insert_proposal(&self, proposal: Proposal) {
        self.inner
            .write()
            .await
            .proposals
            .insert(proposal.id, proposal);
    }

    pub async fn insert_stamp(&self, stamp: Stamp) {
        self.inner.write().await.stamps.insert(stamp.id, stamp);
    }

    pub async fn insert_swap(&self, swap: Swap) {
        self.inner.write().await.swaps.insert(swap.id, swap);
    }

    pub async fn insert_minted_nft(&self, record: MintedNftRecord) {
        self.inner
            .write()
            .await
            .minted_nfts
            .insert(record.nft, record);
    }

    pub async fn insert_member_address(&self, record: MemberAddress) {
        self.inner.write().await.member_addresses.push(record);
    }

    /// Domain records written for `order`, in commit order.
    pub async fn domain_records_for_order(&self, order: OrderId) -> Vec<DomainRecord> {
        self.inner
            .read()
            .await
            .domain_log
            .iter()
            .filter(|r| r.order() == order)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.inner.read().await.orders.get(&id).cloned())
    }

    async fn members_for_address(
        &self,
        address: &Address,
        network: Network,
    ) -> Result<Vec<MemberId>> {
        let inner = self.inner.read().await;
        let mut members: Vec<MemberId> = inner
            .member_addresses
            .iter()
            .filter(|r| r.address == *address && r.network == network)
            .map(|r| r.member)
            .collect();
        members.sort_unstable();
        members.dedup();
        Ok(members)
    }

    async fn token_listing(&self, id: TokenId) -> Result<Option<TokenListing>> {
        Ok(self.inner.read().await.tokens.get(&id).cloned())
    }

    async fn award(&self, id: AwardId) -> Result<Option<Award>> {
        Ok(self.inner.read().await.awards.get(&id).cloned())
    }

    async fn proposal(&self, id: ProposalId) -> Result<Option<Proposal>> {
        Ok(self.inner.read().await.proposals.get(&id).cloned())
    }

    async fn minted_nft(&self, id: NftId) -> Result<Option<MintedNftRecord>> {
        Ok(self.inner.read().await.minted_nfts.get(&id).cloned())
    }

    async fn stamp(&self, id: StampId) -> Result<Option<Stamp>> {
        Ok(self.inner.read().await.stamps.get(&id).cloned())
    }

    async fn swap(&self, id: SwapId) -> Result<Option<Swap>> {
        Ok(self.inner.read().await.swaps.get(&id).cloned())
    }

    async fn entries_for_order(&self, order: OrderId) -> Result<Vec<LedgerEntry>> {
        Ok(self
            .inner
            .read()
            .await
            .entries
            .values()
            .filter(|e| e.order() == order)
            .cloned()
            .collect())
    }

    async fn commit(&self, group: WriteGroup) -> Result<()> {
        let mut inner = self.inner.write().await;
        let mut staged = inner.clone();
        let ops = group.ops.len();
        for op in group.ops {
            staged.apply(op)?;
        }
        *inner = staged;
        debug!(order = %group.order, ops, "write group committed");
        Ok(())
    }
}
