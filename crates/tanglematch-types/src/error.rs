//! Error types for the TangleMatch engine.
//!
//! All errors use the `TM_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Order / payload errors
//! - 2xx: Amount errors
//! - 3xx: Owner resolution errors
//! - 4xx: Keystore / wallet errors
//! - 5xx: Node errors
//! - 6xx: Submission errors
//! - 9xx: General / internal errors
//!
//! Three behavioral classes matter to callers:
//! - **transient** (5xx): nothing was committed; retry the whole operation.
//! - **business** (1xx–3xx): resolved by the matcher with a full-amount
//!   credit, never surfaced to the watcher.
//! - **permanent** (6xx): the same transaction must not be resubmitted.

use thiserror::Error;

use crate::{Address, Network, OrderId, TokenId};

/// Central error enum for all TangleMatch operations.
#[derive(Debug, Error)]
pub enum TanglematchError {
    // =================================================================
    // Order / Payload Errors (1xx)
    // =================================================================
    /// The referenced order does not exist.
    #[error("TM_ERR_100: Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The request payload cannot be acted on (missing record, bad fields).
    #[error("TM_ERR_101: Invalid payload: {reason}")]
    InvalidPayload { reason: String },

    /// The request kind is not supported on this deployment.
    #[error("TM_ERR_102: Unknown request type: {kind}")]
    UnknownRequestType { kind: String },

    // =================================================================
    // Amount Errors (2xx)
    // =================================================================
    /// The delivered amount does not cover the request.
    #[error("TM_ERR_200: Insufficient amount: required {required}")]
    InsufficientAmount { required: u64 },

    /// An output's amount is below its storage-deposit minimum.
    #[error("TM_ERR_201: Insufficient storage deposit: required {required}")]
    InsufficientStorageDeposit { required: u64 },

    /// An amount computation overflowed u64.
    #[error("TM_ERR_202: Amount overflow")]
    AmountOverflow,

    /// Native token balances do not line up for the operation.
    #[error("TM_ERR_203: Native token mismatch for {token}")]
    NativeTokenMismatch { token: TokenId },

    // =================================================================
    // Owner Resolution Errors (3xx)
    // =================================================================
    /// More than one member has validated the source address.
    #[error("TM_ERR_300: Ambiguous owner: {candidates} members share the source address")]
    AmbiguousOwner { candidates: usize },

    /// No member has validated the source address.
    #[error("TM_ERR_301: Unknown owner for source address")]
    UnknownOwner,

    // =================================================================
    // Keystore / Wallet Errors (4xx)
    // =================================================================
    /// No key record exists for the address.
    #[error("TM_ERR_400: Key record missing for {0}")]
    KeyRecordMissing(Address),

    /// A concurrent writer kept invalidating the record version.
    #[error("TM_ERR_401: Key record write conflict for {0}")]
    KeyRecordConflict(Address),

    /// Sealing a seed failed.
    #[error("TM_ERR_402: Seal failed: {reason}")]
    SealFailed { reason: String },

    /// Unsealing a seed failed (wrong passphrase or corrupted record).
    #[error("TM_ERR_403: Unseal failed: {reason}")]
    UnsealFailed { reason: String },

    // =================================================================
    // Node Errors (5xx)
    // =================================================================
    /// No healthy node could be acquired within the attempt budget.
    #[error("TM_ERR_500: No healthy node available for {network}")]
    NodeUnavailable { network: Network },

    /// A single node request failed (transport, timeout, bad response).
    #[error("TM_ERR_501: Node request failed: {reason}")]
    NodeRequestFailed { reason: String },

    // =================================================================
    // Submission Errors (6xx)
    // =================================================================
    /// The node rejected the transaction on semantic grounds. Resubmitting
    /// the identical transaction can never succeed.
    #[error("TM_ERR_600: Transaction rejected: {reason}")]
    TransactionRejected { reason: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("TM_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("TM_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (bad URLs, empty candidate lists, etc.).
    #[error("TM_ERR_902: Configuration error: {0}")]
    Configuration(String),
}

impl TanglematchError {
    /// True for errors where nothing was committed and the whole operation
    /// may simply be retried later.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::NodeUnavailable { .. } | Self::NodeRequestFailed { .. }
        )
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, TanglematchError>;

impl From<serde_json::Error> for TanglematchError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
