//! The outbound wallet facade.
//!
//! A [`Wallet`] is bound to one healthy node client acquired from the pool.
//! Every spend runs the same cycle:
//!
//! ```text
//!   load record ──► query outputs ──► select inputs ──► reserve (versioned)
//!                   minus reserved      largest first         │
//!                                                             ▼
//!   rollback reservation ◄── submit failed ◄── sign ◄── assemble essence
//! ```
//!
//! A version conflict at the reserve step means another spend won the race;
//! the cycle restarts against fresh state and selects from what is left. The
//! caller of a failed wallet operation passes `Wallet::node_index` back into
//! the next acquisition so the pool avoids the node that just failed.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::{debug, warn};

use tanglematch_chain::{
    assemble, sign_unlocks, OutputBuilder, TransactionSubmitter, ValueOutputParams, MAX_TX_INPUTS,
};
use tanglematch_nodes::{AcquiredClient, NodeClientPool, UnspentOutput};
use tanglematch_types::constants::KEY_RECORD_CAS_RETRIES;
use tanglematch_types::token::{merge_into, subtract};
use tanglematch_types::{
    Address, KeystoreConfig, NativeToken, Network, Output, OutputKind, RentStructure, Result,
    SubmittedBlock, TanglematchError,
};

use crate::keystore::{AddressKeyRecord, AddressLedger};
use crate::sealed::{seal, unseal, KdfParams};
use crate::seed::Seed;

/// Opens wallets against healthy nodes.
pub struct WalletProvider {
    pool: Arc<NodeClientPool>,
    ledger: Arc<AddressLedger>,
    keystore: KeystoreConfig,
    kdf: KdfParams,
}

impl WalletProvider {
    #[must_use]
    pub fn new(
        pool: Arc<NodeClientPool>,
        ledger: Arc<AddressLedger>,
        keystore: KeystoreConfig,
    ) -> Self {
        Self {
            pool,
            ledger,
            keystore,
            kdf: KdfParams::default(),
        }
    }

    /// Override the seed-sealing cost parameters.
    #[must_use]
    pub fn with_kdf(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }

    /// Acquire a node for `network` and open a wallet on it.
    ///
    /// Pass the `node_index` of a wallet whose operation just failed as
    /// `exclude` so the first pick avoids that node.
    pub async fn new_wallet(&self, network: Network, exclude: Option<usize>) -> Result<Wallet> {
        let client = self.pool.acquire(network, exclude).await?;
        Ok(Wallet {
            network,
            ledger: Arc::clone(&self.ledger),
            keystore: self.keystore.clone(),
            kdf: self.kdf,
            submitter: TransactionSubmitter::new(Arc::clone(&client.api)),
            client,
        })
    }
}

/// A wallet bound to one node client.
pub struct Wallet {
    network: Network,
    client: AcquiredClient,
    ledger: Arc<AddressLedger>,
    keystore: KeystoreConfig,
    kdf: KdfParams,
    submitter: TransactionSubmitter,
}

impl Wallet {
    #[must_use]
    pub fn network(&self) -> Network {
        self.network
    }

    /// Candidate index of the node this wallet talks to.
    #[must_use]
    pub fn node_index(&self) -> usize {
        self.client.index
    }

    /// Rent parameters of the connected node.
    #[must_use]
    pub fn rent(&self) -> &RentStructure {
        &self.client.info.protocol.rent
    }

    /// Derive a fresh address and persist its sealed seed.
    pub async fn new_address(&self) -> Result<AddressKeyRecord> {
        let seed = Seed::generate();
        let address = seed.address();
        let sealed = seal(&seed, &self.keystore.passphrase, &address, self.kdf)?;
        self.ledger.store(address, self.network, sealed).await
    }

    pub async fn address_details(&self, address: &Address) -> Result<AddressKeyRecord> {
        self.ledger.require(address).await
    }

    /// Unspent outputs of `kind` on `address`, minus the matching
    /// reservation set.
    pub async fn spendable_outputs(
        &self,
        address: &Address,
        kind: OutputKind,
    ) -> Result<Vec<UnspentOutput>> {
        let record = self.ledger.require(address).await?;
        let reserved = record.reserved_for(kind);
        let mut outputs = self.client.api.outputs_for_address(*address, kind).await?;
        outputs.retain(|o| !reserved.contains(&o.output_id));
        Ok(outputs)
    }

    /// Spendable base-token balance of `address`.
    pub async fn balance(&self, address: &Address) -> Result<u64> {
        let outputs = self.spendable_outputs(address, OutputKind::Value).await?;
        let mut total: u64 = 0;
        for unspent in &outputs {
            total = total
                .checked_add(unspent.output.amount())
                .ok_or(TanglematchError::AmountOverflow)?;
        }
        Ok(total)
    }

    /// Send one value output.
    pub async fn send(
        &self,
        from: &Address,
        to: Address,
        amount: u64,
        native_tokens: Vec<NativeToken>,
    ) -> Result<SubmittedBlock> {
        let mut params = ValueOutputParams::transfer(amount, to);
        params.native_tokens = native_tokens;
        self.send_to_many(from, &[params]).await
    }

    /// Spend from `from` into the given value outputs, one transaction.
    ///
    /// Restarts the select-reserve cycle when a concurrent spend wins the
    /// reservation race, up to a bounded number of rounds.
    pub async fn send_to_many(
        &self,
        from: &Address,
        targets: &[ValueOutputParams],
    ) -> Result<SubmittedBlock> {
        for round in 0..KEY_RECORD_CAS_RETRIES {
            match self.try_send(from, targets).await {
                Err(TanglematchError::KeyRecordConflict(address)) => {
                    debug!(
                        address = %address.short(),
                        round,
                        "reservation raced, reselecting inputs"
                    );
                }
                other => return other,
            }
        }
        Err(TanglematchError::KeyRecordConflict(*from))
    }

    async fn try_send(
        &self,
        from: &Address,
        targets: &[ValueOutputParams],
    ) -> Result<SubmittedBlock> {
        if targets.is_empty() {
            return Err(TanglematchError::InvalidPayload {
                reason: "a spend needs at least one target output".into(),
            });
        }

        let builder = OutputBuilder::new(self.rent());
        let mut outputs = Vec::with_capacity(targets.len() + 1);
        let mut required_amount: u64 = 0;
        let mut required_tokens: Vec<NativeToken> = Vec::new();
        for params in targets {
            let output = builder.value(params.clone())?;
            required_amount = required_amount
                .checked_add(output.amount())
                .ok_or(TanglematchError::AmountOverflow)?;
            merge_into(&mut required_tokens, output.native_tokens())?;
            outputs.push(output);
        }

        let record = self.ledger.require(from).await?;
        let mut candidates = self
            .client
            .api
            .outputs_for_address(*from, OutputKind::Value)
            .await?;
        candidates.retain(|o| !record.reserved_value_outputs.contains(&o.output_id));
        candidates.sort_by(|a, b| b.output.amount().cmp(&a.output.amount()));

        let selection =
            select_inputs(&builder, *from, &candidates, required_amount, &required_tokens)?;

        // Union, not overwrite: inputs another in-flight spend reserved were
        // already excluded from the candidates above.
        let mut reserved_value = record.reserved_value_outputs.clone();
        reserved_value.extend(selection.inputs.iter().map(|i| i.output_id));
        let reserved = self
            .ledger
            .reserve(
                &record,
                reserved_value,
                record.reserved_nft_outputs.clone(),
                record.reserved_identity_outputs.clone(),
            )
            .await?;

        if let Some(remainder) = selection.remainder {
            outputs.push(remainder);
        }

        match self.sign_and_submit(from, &reserved, &selection.inputs, outputs).await {
            Ok(block) => Ok(block),
            Err(err) => {
                self.rollback_reservation(&reserved, &selection.inputs).await;
                Err(err)
            }
        }
    }

    async fn sign_and_submit(
        &self,
        from: &Address,
        record: &AddressKeyRecord,
        inputs: &[UnspentOutput],
        outputs: Vec<Output>,
    ) -> Result<SubmittedBlock> {
        let essence = assemble(self.network, inputs, outputs)?;
        let seed = unseal(&record.sealed_seed, &self.keystore.passphrase, from)?;
        let keys = HashMap::from([(*from, seed.signing_key())]);
        let owners = vec![*from; inputs.len()];
        let unlocks = sign_unlocks(&essence, &owners, &keys)?;
        self.submitter.submit(essence, unlocks).await
    }

    /// Drop our input ids from the value reservation set after a failed
    /// submission. A conflict here means another writer already replaced the
    /// record, taking our ids with it; nothing is left to clean up.
    async fn rollback_reservation(&self, reserved: &AddressKeyRecord, inputs: &[UnspentOutput]) {
        let our_ids: BTreeSet<_> = inputs.iter().map(|i| i.output_id).collect();
        let remaining = reserved
            .reserved_value_outputs
            .difference(&our_ids)
            .copied()
            .collect();
        if let Err(err) = self
            .ledger
            .reserve(
                reserved,
                remaining,
                reserved.reserved_nft_outputs.clone(),
                reserved.reserved_identity_outputs.clone(),
            )
            .await
        {
            warn!(
                address = %reserved.address.short(),
                %err,
                "reservation rollback skipped"
            );
        }
    }
}

#[derive(Debug)]
struct SelectedInputs {
    inputs: Vec<UnspentOutput>,
    remainder: Option<Output>,
}

/// Pick inputs largest first until the targets and the remainder's own
/// storage floor are both covered.
///
/// A remainder below its floor is not an error by itself: more inputs are
/// consumed until it grows past the floor or candidates run out.
fn select_inputs(
    builder: &OutputBuilder<'_>,
    owner: Address,
    candidates: &[UnspentOutput],
    required_amount: u64,
    required_tokens: &[NativeToken],
) -> Result<SelectedInputs> {
    let mut inputs = Vec::new();
    let mut gathered: u64 = 0;
    let mut gathered_tokens: Vec<NativeToken> = Vec::new();

    for candidate in candidates.iter().take(MAX_TX_INPUTS) {
        gathered = gathered
            .checked_add(candidate.output.amount())
            .ok_or(TanglematchError::AmountOverflow)?;
        merge_into(&mut gathered_tokens, candidate.output.native_tokens())?;
        inputs.push(candidate.clone());

        if gathered < required_amount {
            continue;
        }
        let Ok(spare_tokens) = subtract(&gathered_tokens, required_tokens) else {
            continue;
        };
        let spare = gathered - required_amount;
        if spare == 0 && spare_tokens.is_empty() {
            return Ok(SelectedInputs {
                inputs,
                remainder: None,
            });
        }

        let mut params = ValueOutputParams::transfer(spare, owner);
        params.native_tokens = spare_tokens;
        match builder.value(params) {
            Ok(remainder) => {
                return Ok(SelectedInputs {
                    inputs,
                    remainder: Some(remainder),
                })
            }
            Err(TanglematchError::InsufficientStorageDeposit { .. }) => continue,
            Err(err) => return Err(err),
        }
    }

    // Report the precise missing token when that is what blocked selection.
    subtract(&gathered_tokens, required_tokens)?;
    Err(TanglematchError::InsufficientAmount {
        required: required_amount,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tanglematch_types::{OutputId, TokenId};

    fn rent() -> RentStructure {
        RentStructure::default()
    }

    fn unspent(amount: u64, owner: Address) -> UnspentOutput {
        UnspentOutput {
            output_id: OutputId::dummy(),
            output: Output::dummy_value(amount, owner),
        }
    }

    fn unspent_with_token(amount: u64, owner: Address, token: NativeToken) -> UnspentOutput {
        let mut output = Output::dummy_value(amount, owner);
        if let Output::Value(v) = &mut output {
            v.native_tokens.push(token);
        }
        UnspentOutput {
            output_id: OutputId::dummy(),
            output,
        }
    }

    #[test]
    fn exact_cover_needs_no_remainder() {
        let rent = rent();
        let builder = OutputBuilder::new(&rent);
        let owner = Address::dummy();
        let candidates = vec![unspent(1_000_000, owner), unspent(500_000, owner)];

        let selection = select_inputs(&builder, owner, &candidates, 1_500_000, &[]).unwrap();
        assert_eq!(selection.inputs.len(), 2);
        assert!(selection.remainder.is_none());
    }

    #[test]
    fn remainder_goes_back_to_the_owner() {
        let rent = rent();
        let builder = OutputBuilder::new(&rent);
        let owner = Address::dummy();
        let candidates = vec![unspent(2_000_000, owner)];

        let selection = select_inputs(&builder, owner, &candidates, 1_000_000, &[]).unwrap();
        let remainder = selection.remainder.unwrap();
        assert_eq!(remainder.amount(), 1_000_000);
        assert_eq!(remainder.owner_address(), Some(owner));
    }

    #[test]
    fn dust_remainder_consumes_another_input() {
        let rent = rent();
        let builder = OutputBuilder::new(&rent);
        let owner = Address::dummy();
        // Spending 1_000_000 from the first input alone leaves 100 behind,
        // which cannot pay the remainder's own storage floor.
        let candidates = vec![unspent(1_000_100, owner), unspent(1_000_000, owner)];

        let selection = select_inputs(&builder, owner, &candidates, 1_000_000, &[]).unwrap();
        assert_eq!(selection.inputs.len(), 2);
        assert_eq!(selection.remainder.unwrap().amount(), 1_000_100);
    }

    #[test]
    fn dust_remainder_with_no_more_inputs_is_insufficient() {
        let rent = rent();
        let builder = OutputBuilder::new(&rent);
        let owner = Address::dummy();
        let candidates = vec![unspent(1_000_100, owner)];

        let err = select_inputs(&builder, owner, &candidates, 1_000_000, &[]).unwrap_err();
        assert!(
            matches!(err, TanglematchError::InsufficientAmount { required } if required == 1_000_000)
        );
    }

    #[test]
    fn missing_native_token_is_named() {
        let rent = rent();
        let builder = OutputBuilder::new(&rent);
        let owner = Address::dummy();
        let token_id = TokenId::dummy();
        let candidates = vec![unspent(5_000_000, owner)];

        let err = select_inputs(
            &builder,
            owner,
            &candidates,
            1_000_000,
            &[NativeToken {
                token_id,
                amount: 10,
            }],
        )
        .unwrap_err();
        assert!(matches!(err, TanglematchError::NativeTokenMismatch { token } if token == token_id));
    }

    #[test]
    fn token_spend_carries_surplus_tokens_into_the_remainder() {
        let rent = rent();
        let builder = OutputBuilder::new(&rent);
        let owner = Address::dummy();
        let token_id = TokenId::dummy();
        let candidates = vec![unspent_with_token(
            5_000_000,
            owner,
            NativeToken {
                token_id,
                amount: 25,
            },
        )];

        let selection = select_inputs(
            &builder,
            owner,
            &candidates,
            1_000_000,
            &[NativeToken {
                token_id,
                amount: 10,
            }],
        )
        .unwrap();
        let remainder = selection.remainder.unwrap();
        assert_eq!(remainder.amount(), 4_000_000);
        assert_eq!(remainder.native_tokens()[0].amount, 15);
    }
}
