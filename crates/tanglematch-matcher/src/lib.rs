//! # tanglematch-matcher
//!
//! **Reconciliation Plane**: matches observed deposits to open orders and
//! turns them into ledger entries and domain records.
//!
//! ## Architecture
//!
//! 1. **DocumentStore**: platform reads plus atomic write groups
//! 2. **entries**: deterministic ledger-entry construction
//! 3. **handlers**: one pure function per request kind
//! 4. **OrderMatcher**: the pipeline tying them together
//!
//! ## Reconciliation Flow
//!
//! ```text
//! watcher → OrderMatcher.handle(order, transfer)
//!         → gate → safety screen → owner → amount → dispatch
//!         → store.commit(one WriteGroup)
//! ```
//!
//! Every transfer ends in exactly one of: the order reconciled, the deposit
//! credited back, or (for node trouble only) an error the caller may retry.

pub mod entries;
pub mod handlers;
pub mod matcher;
pub mod store;

pub use handlers::{dispatch, needs_rent, HandlerContext};
pub use matcher::{MatchOutcome, OrderMatcher};
pub use store::{
    Award, AwardPayment, DocumentStore, DomainRecord, MemberAddress, MemoryStore, MintedNftRecord,
    NftStakeRecord, Proposal, Stamp, StakeRecord, StampRecord, Swap, SwapFundingRecord,
    TokenListing, TradeOrderRecord, TradeSide, VoteRecord, WriteGroup, WriteOp,
};
