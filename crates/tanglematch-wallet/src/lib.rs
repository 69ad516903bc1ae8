//! Deposit-address custody and the outbound wallet.
//!
//! ```text
//!   seed ──seal──► SealedSeed ──┐
//!                               ▼
//!               AddressKeyRecord { sealed seed, 3 reservation sets, version }
//!                               │
//!          AddressLedger (versioned writes over a KeyRecordStore)
//!                               │
//!                               ▼
//!     WalletProvider ──► Wallet (one node client): new_address, balance,
//!                        spendable_outputs, send, send_to_many
//! ```
//!
//! Seeds exist in memory only while signing and are zeroed on drop; at rest
//! they are sealed with a passphrase-derived AES-256-GCM key. Reservation
//! sets keep in-flight spends from reusing each other's inputs; the node
//! remains the final arbiter against a true double spend.

pub mod keystore;
pub mod sealed;
pub mod seed;
pub mod wallet;

pub use keystore::{AddressKeyRecord, AddressLedger, KeyRecordStore, MemoryKeyStore};
pub use sealed::{seal, unseal, KdfParams, SealedSeed};
pub use seed::Seed;
pub use wallet::{Wallet, WalletProvider};
