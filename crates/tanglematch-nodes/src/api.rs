//! The node API surface the engine depends on.
//!
//! Everything the engine asks of a ledger node fits four calls: a liveness
//! probe, the info/parameters document, the unspent outputs of an address,
//! and block submission. Implementations speak whatever wire protocol the
//! deployment needs; [`crate::HttpNodeApi`] is the REST one.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tanglematch_types::{
    Address, Output, OutputId, OutputKind, ProtocolParameters, Result, SignedTransactionPayload,
    TransferId,
};

/// What a node reports about itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub name: String,
    pub version: String,
    pub healthy: bool,
    pub protocol: ProtocolParameters,
}

/// One unspent output on the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnspentOutput {
    pub output_id: OutputId,
    pub output: Output,
}

/// Async client for a single ledger node.
#[async_trait]
pub trait NodeApi: Send + Sync {
    /// Cheap liveness probe.
    async fn health(&self) -> Result<bool>;

    /// Node info including protocol parameters.
    async fn info(&self) -> Result<NodeInfo>;

    /// Unspent outputs of `kind` currently locked to `address`.
    async fn outputs_for_address(
        &self,
        address: Address,
        kind: OutputKind,
    ) -> Result<Vec<UnspentOutput>>;

    /// Submit a signed transaction; returns the id of the block carrying it.
    async fn submit(&self, payload: &SignedTransactionPayload) -> Result<TransferId>;
}
