//! Storage-deposit (rent) computation.
//!
//! Every output must carry enough base units to pay for the bytes it adds
//! to the ledger: `min_deposit = v_byte_cost × weighted_size`. Weighted
//! size counts an output's serialized fields at the data factor plus a
//! fixed offset for the ledger's own bookkeeping (the output id is indexed,
//! so it weighs in at the key factor).
//!
//! Byte model per field:
//!
//! ```text
//! offset                 key·34 + data·40
//! kind tag               1
//! amount                 8
//! native token           46         (38 id + 8 amount)
//! address condition      34         (1 tag + 33 address)
//! storage return         42         (1 tag + 33 address + 8 amount)
//! timelock               5          (1 tag + 4 unix time)
//! expiration             38         (1 tag + 33 address + 4 unix time)
//! sender / issuer        34
//! metadata               3 + len    (1 tag + 2 length + bytes)
//! tag feature            2 + len    (1 tag + 1 length + bytes)
//! identity extras        44 + len(state metadata)
//! nft extras             32
//! ```

use tanglematch_types::{Feature, Output, RentStructure, UnlockCondition};

const OFFSET_KEY_BYTES: u64 = 34;
const OFFSET_DATA_BYTES: u64 = 40;

fn condition_bytes(condition: &UnlockCondition) -> u64 {
    match condition {
        UnlockCondition::Address { .. }
        | UnlockCondition::StateControllerAddress { .. }
        | UnlockCondition::GovernorAddress { .. } => 34,
        UnlockCondition::StorageDepositReturn { .. } => 42,
        UnlockCondition::Timelock { .. } => 5,
        UnlockCondition::Expiration { .. } => 38,
    }
}

fn feature_bytes(feature: &Feature) -> u64 {
    match feature {
        Feature::Sender { .. } | Feature::Issuer { .. } => 34,
        Feature::Metadata { data } => 3 + data.len() as u64,
        Feature::Tag { tag } => 2 + tag.len() as u64,
    }
}

fn field_bytes(output: &Output) -> u64 {
    let mut bytes: u64 = 1 + 8; // kind tag + amount
    bytes += 46 * output.native_tokens().len() as u64;
    bytes += output
        .unlock_conditions()
        .iter()
        .map(condition_bytes)
        .sum::<u64>();
    bytes += output.features().iter().map(feature_bytes).sum::<u64>();
    match output {
        Output::Value(_) => {}
        Output::Identity(o) => {
            bytes += 44 + o.state_metadata.len() as u64;
            bytes += o.immutable_features.iter().map(feature_bytes).sum::<u64>();
        }
        Output::Nft(o) => {
            bytes += 32;
            bytes += o.immutable_features.iter().map(feature_bytes).sum::<u64>();
        }
    }
    bytes
}

/// Weighted size of an output in virtual bytes.
#[must_use]
pub fn weighted_bytes(rent: &RentStructure, output: &Output) -> u64 {
    let offset = rent
        .v_byte_factor_key
        .saturating_mul(OFFSET_KEY_BYTES)
        .saturating_add(rent.v_byte_factor_data.saturating_mul(OFFSET_DATA_BYTES));
    offset.saturating_add(rent.v_byte_factor_data.saturating_mul(field_bytes(output)))
}

/// Minimum base units an output must carry to stay on the ledger.
#[must_use]
pub fn min_deposit(rent: &RentStructure, output: &Output) -> u64 {
    rent.v_byte_cost.saturating_mul(weighted_bytes(rent, output))
}

/// Fee for anchoring `file_bytes` of external content on the ledger.
#[must_use]
pub fn storage_fee_for_bytes(rent: &RentStructure, file_bytes: u64) -> u64 {
    rent.v_byte_cost
        .saturating_mul(rent.v_byte_factor_data)
        .saturating_mul(file_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tanglematch_types::{Address, NativeToken, TokenId};

    fn rent() -> RentStructure {
        RentStructure::default()
    }

    #[test]
    fn plain_value_output_minimum() {
        let output = Output::dummy_value(0, Address::dummy());
        // offset 10·34 + 1·40 = 380; fields 1 + 8 + 34 = 43; total 423 vbytes.
        assert_eq!(weighted_bytes(&rent(), &output), 423);
        assert_eq!(min_deposit(&rent(), &output), 42_300);
    }

    #[test]
    fn native_tokens_raise_the_minimum() {
        let plain = Output::dummy_value(0, Address::dummy());
        let mut with_token = plain.clone();
        if let Output::Value(o) = &mut with_token {
            o.native_tokens.push(NativeToken::new(TokenId::dummy(), 5));
        }
        assert_eq!(
            min_deposit(&rent(), &with_token),
            min_deposit(&rent(), &plain) + 46 * 100
        );
    }

    #[test]
    fn timelock_raises_the_minimum() {
        let plain = Output::dummy_value(0, Address::dummy());
        let mut locked = plain.clone();
        locked
            .unlock_conditions_mut()
            .push(UnlockCondition::Timelock { unix_time: 1_700_000_000 });
        assert_eq!(
            min_deposit(&rent(), &locked),
            min_deposit(&rent(), &plain) + 5 * 100
        );
    }

    #[test]
    fn doubled_byte_cost_doubles_the_minimum() {
        let output = Output::dummy_value(0, Address::dummy());
        let base = min_deposit(&rent(), &output);
        let pricier = RentStructure {
            v_byte_cost: 200,
            ..rent()
        };
        assert_eq!(min_deposit(&pricier, &output), base * 2);
    }

    #[test]
    fn stamp_fee_scales_linearly() {
        assert_eq!(storage_fee_for_bytes(&rent(), 0), 0);
        assert_eq!(storage_fee_for_bytes(&rent(), 1024), 102_400);
    }
}
