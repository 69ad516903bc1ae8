//! Address key records and the reservation ledger.
//!
//! Every deposit address the engine controls has one [`AddressKeyRecord`]:
//! its sealed seed plus three reservation sets naming the outputs an already
//! submitted, not yet confirmed spend is consuming. Unspent-output queries
//! subtract the set matching the queried kind, so a second spend never
//! selects an input the first one is sitting on.
//!
//! Writes are version-checked. [`AddressLedger::reserve`] swaps the record
//! only if the caller's copy is still current; a racing writer gets
//! `KeyRecordConflict` and must re-read before writing again. The node is
//! still the final arbiter against a true double spend — the reservation
//! sets only avoid wasted submission attempts.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use tanglematch_types::{Address, Network, OutputId, OutputKind, Result, TanglematchError};

use crate::sealed::SealedSeed;

/// Per-address key material and in-flight spend reservations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressKeyRecord {
    pub address: Address,
    pub network: Network,
    pub sealed_seed: SealedSeed,
    pub reserved_value_outputs: BTreeSet<OutputId>,
    pub reserved_nft_outputs: BTreeSet<OutputId>,
    pub reserved_identity_outputs: BTreeSet<OutputId>,
    /// Bumped on every write; [`KeyRecordStore::swap`] refuses stale versions.
    pub version: u64,
    pub created_at: DateTime<Utc>,
}

impl AddressKeyRecord {
    #[must_use]
    pub fn new(address: Address, network: Network, sealed_seed: SealedSeed) -> Self {
        Self {
            address,
            network,
            sealed_seed,
            reserved_value_outputs: BTreeSet::new(),
            reserved_nft_outputs: BTreeSet::new(),
            reserved_identity_outputs: BTreeSet::new(),
            version: 1,
            created_at: Utc::now(),
        }
    }

    /// The reservation set covering outputs of `kind`.
    #[must_use]
    pub fn reserved_for(&self, kind: OutputKind) -> &BTreeSet<OutputId> {
        match kind {
            OutputKind::Value => &self.reserved_value_outputs,
            OutputKind::Nft => &self.reserved_nft_outputs,
            OutputKind::Identity => &self.reserved_identity_outputs,
        }
    }
}

/// Persistence for key records. `swap` is the only mutation of an existing
/// record and is conditional on the version the caller read.
#[async_trait]
pub trait KeyRecordStore: Send + Sync {
    async fn get(&self, address: &Address) -> Result<Option<AddressKeyRecord>>;

    /// Create the record; `false` when one already exists for the address.
    async fn put_if_absent(&self, record: AddressKeyRecord) -> Result<bool>;

    /// Replace the record keyed by `record.address` only if the stored
    /// version equals `expected_version`; `false` on a version mismatch.
    async fn swap(&self, expected_version: u64, record: AddressKeyRecord) -> Result<bool>;
}

/// In-memory store for tests and single-process embeddings.
#[derive(Default)]
pub struct MemoryKeyStore {
    records: RwLock<HashMap<Address, AddressKeyRecord>>,
}

impl MemoryKeyStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyRecordStore for MemoryKeyStore {
    async fn get(&self, address: &Address) -> Result<Option<AddressKeyRecord>> {
        Ok(self.records.read().await.get(address).cloned())
    }

    async fn put_if_absent(&self, record: AddressKeyRecord) -> Result<bool> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.address) {
            return Ok(false);
        }
        records.insert(record.address, record);
        Ok(true)
    }

    async fn swap(&self, expected_version: u64, record: AddressKeyRecord) -> Result<bool> {
        let mut records = self.records.write().await;
        match records.get_mut(&record.address) {
            Some(current) if current.version == expected_version => {
                *current = record;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Record lifecycle over a [`KeyRecordStore`].
pub struct AddressLedger {
    records: Arc<dyn KeyRecordStore>,
}

impl AddressLedger {
    #[must_use]
    pub fn new(records: Arc<dyn KeyRecordStore>) -> Self {
        Self { records }
    }

    /// Idempotently create the record for a freshly derived address.
    ///
    /// Must precede any spend from the address. A repeated call returns the
    /// record already stored, sealed seed included.
    pub async fn store(
        &self,
        address: Address,
        network: Network,
        sealed_seed: SealedSeed,
    ) -> Result<AddressKeyRecord> {
        let record = AddressKeyRecord::new(address, network, sealed_seed);
        if self.records.put_if_absent(record.clone()).await? {
            debug!(address = %address.short(), %network, "key record created");
            return Ok(record);
        }
        self.require(&address).await
    }

    pub async fn load(&self, address: &Address) -> Result<Option<AddressKeyRecord>> {
        self.records.get(address).await
    }

    /// The record, or `KeyRecordMissing` when the address was never stored.
    pub async fn require(&self, address: &Address) -> Result<AddressKeyRecord> {
        self.load(address)
            .await?
            .ok_or(TanglematchError::KeyRecordMissing(*address))
    }

    /// Overwrite the three reservation sets.
    ///
    /// Each set is replaced wholesale with the given ids. A caller changing
    /// only one output kind must pass the other two sets' current contents
    /// back or they are cleared.
    ///
    /// The write succeeds only if `expected` is still the stored version;
    /// otherwise `KeyRecordConflict` — re-read and reselect before retrying,
    /// since the conflicting writer may have reserved the same outputs.
    pub async fn reserve(
        &self,
        expected: &AddressKeyRecord,
        value: BTreeSet<OutputId>,
        nft: BTreeSet<OutputId>,
        identity: BTreeSet<OutputId>,
    ) -> Result<AddressKeyRecord> {
        let mut updated = expected.clone();
        updated.reserved_value_outputs = value;
        updated.reserved_nft_outputs = nft;
        updated.reserved_identity_outputs = identity;
        updated.version = expected.version + 1;

        if self.records.swap(expected.version, updated.clone()).await? {
            debug!(
                address = %updated.address.short(),
                version = updated.version,
                reserved_value = updated.reserved_value_outputs.len(),
                reserved_nft = updated.reserved_nft_outputs.len(),
                reserved_identity = updated.reserved_identity_outputs.len(),
                "reservations updated"
            );
            Ok(updated)
        } else {
            Err(TanglematchError::KeyRecordConflict(expected.address))
        }
    }
}
