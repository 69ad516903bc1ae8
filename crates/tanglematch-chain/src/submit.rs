//! Transaction submission with rejection memory.
//!
//! A node rejection is permanent for that exact payload: resubmitting an
//! identical transaction can only fail again. The submitter remembers the
//! essence digests of rejected transactions (bounded, oldest evicted first)
//! and refuses them locally. Transient transport failures are not recorded,
//! so callers are free to retry those with the same payload.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use tanglematch_nodes::NodeApi;
use tanglematch_types::{
    Essence, Result, SignedTransactionPayload, SubmittedBlock, TanglematchError, Unlock,
};

use crate::essence::signing_digest;

const REJECTION_GUARD_CAPACITY: usize = 1024;

/// Remembers essence digests of rejected transactions, FIFO-bounded.
struct RejectionGuard {
    capacity: usize,
    seen: HashSet<[u8; 32]>,
    insertion_order: VecDeque<[u8; 32]>,
}

impl RejectionGuard {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            seen: HashSet::with_capacity(capacity),
            insertion_order: VecDeque::with_capacity(capacity),
        }
    }

    fn contains(&self, digest: &[u8; 32]) -> bool {
        self.seen.contains(digest)
    }

    fn record(&mut self, digest: [u8; 32]) {
        if self.seen.contains(&digest) {
            return;
        }
        if self.insertion_order.len() == self.capacity {
            if let Some(oldest) = self.insertion_order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.insertion_order.push_back(digest);
        self.seen.insert(digest);
    }
}

/// Submits signed transactions to a node, refusing known-rejected payloads.
pub struct TransactionSubmitter {
    api: Arc<dyn NodeApi>,
    rejected: Mutex<RejectionGuard>,
}

impl TransactionSubmitter {
    #[must_use]
    pub fn new(api: Arc<dyn NodeApi>) -> Self {
        Self {
            api,
            rejected: Mutex::new(RejectionGuard::new(REJECTION_GUARD_CAPACITY)),
        }
    }

    /// Submit `essence` with its unlocks.
    ///
    /// Unlocks must line up with inputs one to one. A rejection from the node
    /// is recorded and the same essence will be refused without another
    /// network round trip; transient failures leave no trace and may be
    /// retried.
    pub async fn submit(&self, essence: Essence, unlocks: Vec<Unlock>) -> Result<SubmittedBlock> {
        if unlocks.len() != essence.inputs.len() {
            return Err(TanglematchError::Internal(format!(
                "{} unlocks for {} inputs",
                unlocks.len(),
                essence.inputs.len()
            )));
        }

        let digest = signing_digest(&essence)?;
        if self.rejected.lock().await.contains(&digest) {
            return Err(TanglematchError::TransactionRejected {
                reason: "identical transaction was already rejected".into(),
            });
        }

        let payload = SignedTransactionPayload { essence, unlocks };
        match self.api.submit(&payload).await {
            Ok(block_id) => {
                info!(
                    %block_id,
                    inputs = payload.essence.inputs.len(),
                    outputs = payload.essence.outputs.len(),
                    "transaction submitted"
                );
                Ok(SubmittedBlock { block_id, payload })
            }
            Err(err @ TanglematchError::TransactionRejected { .. }) => {
                self.rejected.lock().await.record(digest);
                warn!(%err, "node rejected transaction");
                Err(err)
            }
            Err(err) => {
                warn!(%err, "transaction submission failed");
                Err(err)
            }
        }
    }
}
