//! Transaction construction plane.
//!
//! Everything between "these outputs exist" and "a signed payload is on the
//! wire" lives here:
//!
//! ```text
//!   rent          outputs             essence            unlocks     submit
//!   ----          -------             -------            -------     ------
//!   byte cost --> OutputBuilder --+-> assemble() ------> sign    --> TransactionSubmitter
//!   (floor)       (value/identity |   (ordered inputs    (1 sig per
//!                  /nft outputs)  |    + commitment)      address +
//!                                 |                       references)
//!                 inputs ---------+
//! ```
//!
//! The rent module prices outputs in weighted bytes; the builder refuses to
//! create an output funded below its storage floor. Essence assembly fixes
//! input order and commits to the consumed outputs; unlock planning collapses
//! repeated owners into reference unlocks; the submitter remembers rejections
//! so a known-bad payload never goes out twice.

pub mod essence;
pub mod outputs;
pub mod rent;
pub mod submit;
pub mod unlocks;

pub use essence::{assemble, inputs_commitment, signing_digest, MAX_TX_INPUTS, MAX_TX_OUTPUTS};
pub use outputs::{
    ExpirationTerm, IdentityOutputParams, NftOutputParams, OutputBuilder, StorageReturn,
    ValueOutputParams,
};
pub use rent::{min_deposit, storage_fee_for_bytes, weighted_bytes};
pub use submit::TransactionSubmitter;
pub use unlocks::{plan_unlocks, sign_unlocks, UnlockPlan};
