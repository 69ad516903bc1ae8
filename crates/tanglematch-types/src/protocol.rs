//! Protocol parameters reported by nodes.

use serde::{Deserialize, Serialize};

use crate::constants;

/// Byte-cost pricing for on-chain storage.
///
/// Every output must carry at least `v_byte_cost × weighted_size` base units
/// as its storage deposit, where weighted size counts key bytes at
/// `v_byte_factor_key` and data bytes at `v_byte_factor_data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentStructure {
    pub v_byte_cost: u64,
    pub v_byte_factor_data: u64,
    pub v_byte_factor_key: u64,
}

impl Default for RentStructure {
    fn default() -> Self {
        Self {
            v_byte_cost: constants::DEFAULT_V_BYTE_COST,
            v_byte_factor_data: constants::V_BYTE_FACTOR_DATA,
            v_byte_factor_key: constants::V_BYTE_FACTOR_KEY,
        }
    }
}

/// The protocol parameters a node advertises in its info response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolParameters {
    pub version: u8,
    pub network_name: String,
    pub token_supply: u64,
    pub rent: RentStructure,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rent_matches_constants() {
        let rent = RentStructure::default();
        assert_eq!(rent.v_byte_cost, constants::DEFAULT_V_BYTE_COST);
        assert_eq!(rent.v_byte_factor_key, 10);
        assert_eq!(rent.v_byte_factor_data, 1);
    }
}
