//! Serde helpers for fixed-size byte identifiers rendered as `0x`-prefixed hex.
//!
//! Chain-facing identifiers (block ids, output ids, token ids, addresses) are
//! stored and logged as hex strings rather than JSON byte arrays, matching
//! what node APIs return.

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serializer};

pub(crate) fn encode(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

pub(crate) fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], String> {
    let stripped = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(stripped).map_err(|e| format!("invalid hex: {e}"))?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| format!("expected {N} bytes, got {len}"))
}

pub(crate) fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&encode(bytes))
}

pub(crate) fn deserialize_fixed<'de, D: Deserializer<'de>, const N: usize>(
    deserializer: D,
) -> Result<[u8; N], D::Error> {
    let s = String::deserialize(deserializer)?;
    decode_fixed(&s).map_err(D::Error::custom)
}
