//! # tanglematch-types
//!
//! Shared types, errors, and configuration for the **TangleMatch**
//! reconciliation engine.
//!
//! This crate is the leaf dependency of the workspace — every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`OrderId`], [`MemberId`], [`EntryId`], [`TransferId`], [`OutputId`], [`TokenId`], [`IdentityId`], [`NftId`]
//! - **Network model**: [`Network`], [`Address`], [`NativeToken`]
//! - **Output model**: [`Output`], [`UnlockCondition`], [`Feature`]
//! - **Order model**: [`Order`], [`ValidationMode`], [`RequestPayload`]
//! - **Transfer model**: [`ObservedTransfer`], [`ConsumedOutputKind`]
//! - **Ledger entries**: [`LedgerEntry`], [`PaymentEntry`], [`BillPaymentEntry`], [`CreditEntry`]
//! - **Transactions**: [`Essence`], [`Unlock`], [`SignedTransactionPayload`], [`SubmittedBlock`]
//! - **Protocol**: [`ProtocolParameters`], [`RentStructure`]
//! - **Errors**: [`TanglematchError`] with `TM_ERR_` prefix codes
//! - **Configuration**: [`NodesConfig`], [`PoolConfig`], [`KeystoreConfig`]
//! - **Constants**: system-wide limits and defaults

pub mod address;
pub mod config;
pub mod constants;
pub mod entry;
pub mod error;
pub mod essence;
mod hexser;
pub mod ids;
pub mod network;
pub mod order;
pub mod output;
pub mod protocol;
pub mod token;
pub mod transfer;

// Re-export all primary types at crate root for ergonomic imports:
//   use tanglematch_types::{Order, ObservedTransfer, Output, ...};

pub use address::*;
pub use config::*;
pub use entry::*;
pub use error::*;
pub use essence::*;
pub use ids::*;
pub use network::*;
pub use order::*;
pub use output::*;
pub use protocol::*;
pub use token::*;
pub use transfer::*;

// Constants are accessed via `tanglematch_types::constants::FOO`
// (not re-exported to avoid name collisions).
