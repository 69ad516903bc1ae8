//! Seed sealing at rest.
//!
//! The configured passphrase is stretched with scrypt into an AES-256-GCM
//! key; the owning address is fed in as associated data, so a sealed seed
//! copied onto another address's record fails authentication. KDF parameters
//! travel inside the sealed record, which lets them be raised later without
//! re-sealing every existing record at once.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use tanglematch_types::constants::{SCRYPT_LOG_N, SCRYPT_P, SCRYPT_R, SEAL_VERSION};
use tanglematch_types::{Address, Result, TanglematchError};

use crate::seed::Seed;

/// scrypt cost parameters stored alongside each sealed seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub log_n: u8,
    pub r: u32,
    pub p: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            log_n: SCRYPT_LOG_N,
            r: SCRYPT_R,
            p: SCRYPT_P,
        }
    }
}

impl KdfParams {
    /// Cheap parameters for tests. Never seal a production seed with these.
    #[must_use]
    pub fn fast() -> Self {
        Self {
            log_n: 4,
            r: 1,
            p: 1,
        }
    }

    fn to_scrypt(self) -> Result<scrypt::Params> {
        scrypt::Params::new(self.log_n, self.r, self.p, 32).map_err(|e| {
            TanglematchError::SealFailed {
                reason: format!("invalid kdf parameters: {e}"),
            }
        })
    }
}

/// An encrypted seed as persisted in a key record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedSeed {
    pub version: u8,
    pub kdf: KdfParams,
    pub salt: [u8; 16],
    pub nonce: [u8; 12],
    pub ciphertext: Vec<u8>,
}

fn derive_key(passphrase: &str, salt: &[u8; 16], kdf: KdfParams) -> Result<[u8; 32]> {
    let params = kdf.to_scrypt()?;
    let mut key = [0u8; 32];
    scrypt::scrypt(passphrase.as_bytes(), salt, &params, &mut key).map_err(|e| {
        TanglematchError::SealFailed {
            reason: format!("key derivation failed: {e}"),
        }
    })?;
    Ok(key)
}

/// Seal `seed` for storage, bound to its owning `address`.
pub fn seal(seed: &Seed, passphrase: &str, address: &Address, kdf: KdfParams) -> Result<SealedSeed> {
    let mut salt = [0u8; 16];
    OsRng.fill_bytes(&mut salt);
    let mut nonce = [0u8; 12];
    OsRng.fill_bytes(&mut nonce);

    let mut key = derive_key(passphrase, &salt, kdf)?;
    let cipher = Aes256Gcm::new_from_slice(&key).map_err(|e| TanglematchError::SealFailed {
        reason: e.to_string(),
    })?;
    key.zeroize();

    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: seed.as_bytes(),
                aad: address.as_bytes(),
            },
        )
        .map_err(|e| TanglematchError::SealFailed {
            reason: e.to_string(),
        })?;

    Ok(SealedSeed {
        version: SEAL_VERSION,
        kdf,
        salt,
        nonce,
        ciphertext,
    })
}

/// Recover the seed sealed for `address`.
///
/// Fails on a wrong passphrase, a wrong address, any ciphertext tampering,
/// or an unknown seal version.
pub fn unseal(sealed: &SealedSeed, passphrase: &str, address: &Address) -> Result<Seed> {
    if sealed.version != SEAL_VERSION {
        return Err(TanglematchError::UnsealFailed {
            reason: format!("unsupported seal version {}", sealed.version),
        });
    }

    let mut key = derive_key(passphrase, &sealed.salt, sealed.kdf)?;
    let cipher = Aes256Gcm::new_from_slice(&key).map_err(|e| TanglematchError::UnsealFailed {
        reason: e.to_string(),
    })?;
    key.zeroize();

    let mut plaintext = cipher
        .decrypt(
            Nonce::from_slice(&sealed.nonce),
            Payload {
                msg: &sealed.ciphertext,
                aad: address.as_bytes(),
            },
        )
        .map_err(|_| TanglematchError::UnsealFailed {
            reason: "authentication failed".into(),
        })?;

    if plaintext.len() != 32 {
        plaintext.zeroize();
        return Err(TanglematchError::UnsealFailed {
            reason: "sealed payload is not a 32-byte seed".into(),
        });
    }
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&plaintext);
    plaintext.zeroize();
    Ok(Seed::from_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sealed_fixture() -> (Seed, Address, SealedSeed) {
        let seed = Seed::from_bytes([42u8; 32]);
        let address = seed.address();
        let sealed = seal(&seed, "passphrase", &address, KdfParams::fast()).unwrap();
        (seed, address, sealed)
    }

    #[test]
    fn seal_then_unseal_recovers_the_seed() {
        let (seed, address, sealed) = sealed_fixture();
        let opened = unseal(&sealed, "passphrase", &address).unwrap();
        assert_eq!(opened.as_bytes(), seed.as_bytes());
    }

    #[test]
    fn wrong_passphrase_is_refused() {
        let (_, address, sealed) = sealed_fixture();
        let err = unseal(&sealed, "not the passphrase", &address).unwrap_err();
        assert!(matches!(err, TanglematchError::UnsealFailed { .. }));
    }

    #[test]
    fn sealed_seed_is_bound_to_its_address() {
        let (_, _, sealed) = sealed_fixture();
        let other = Seed::from_bytes([7u8; 32]).address();
        let err = unseal(&sealed, "passphrase", &other).unwrap_err();
        assert!(matches!(err, TanglematchError::UnsealFailed { .. }));
    }

    #[test]
    fn tampered_ciphertext_is_refused() {
        let (_, address, mut sealed) = sealed_fixture();
        sealed.ciphertext[0] ^= 0xFF;
        let err = unseal(&sealed, "passphrase", &address).unwrap_err();
        assert!(matches!(err, TanglematchError::UnsealFailed { .. }));
    }

    #[test]
    fn unknown_seal_version_is_refused() {
        let (_, address, mut sealed) = sealed_fixture();
        sealed.version = SEAL_VERSION + 1;
        let err = unseal(&sealed, "passphrase", &address).unwrap_err();
        assert!(matches!(err, TanglematchError::UnsealFailed { .. }));
    }

    #[test]
    fn sealed_record_survives_serialization() {
        let (_, address, sealed) = sealed_fixture();
        let json = serde_json::to_string(&sealed).unwrap();
        let back: SealedSeed = serde_json::from_str(&json).unwrap();
        assert_eq!(sealed, back);
        assert!(unseal(&back, "passphrase", &address).is_ok());
    }
}
