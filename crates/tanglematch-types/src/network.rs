//! The closed set of ledger networks the engine operates against.

use serde::{Deserialize, Serialize};

/// A supported ledger network.
///
/// Every order, transfer and key record is pinned to exactly one network;
/// the engine never moves value across networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Network {
    /// Shimmer mainnet.
    Smr,
    /// Shimmer testnet.
    Rms,
    /// IOTA mainnet.
    Iota,
    /// IOTA testnet.
    Atoi,
}

impl Network {
    /// Ticker symbol of the network's base token.
    #[must_use]
    pub fn token_symbol(&self) -> &'static str {
        match self {
            Self::Smr => "SMR",
            Self::Rms => "RMS",
            Self::Iota => "IOTA",
            Self::Atoi => "ATOI",
        }
    }

    #[must_use]
    pub fn is_testnet(&self) -> bool {
        matches!(self, Self::Rms | Self::Atoi)
    }

    /// All supported networks, testnets included.
    #[must_use]
    pub fn all() -> [Network; 4] {
        [Self::Smr, Self::Rms, Self::Iota, Self::Atoi]
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Smr => write!(f, "smr"),
            Self::Rms => write!(f, "rms"),
            Self::Iota => write!(f, "iota"),
            Self::Atoi => write!(f, "atoi"),
        }
    }
}
