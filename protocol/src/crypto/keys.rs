//! # Key Management
//!
//! The spending identity: an Ed25519 signing key plus the values derived
//! from it that the rest of the core cares about, namely the public key,
//! the 20-byte pk-hash, and the address.
//!
//! The core never persists a [`SpendKey`]. Callers obtain one from their
//! key directory for the duration of a single spend and drop it afterwards.
//!
//! ## Security considerations
//!
//! - Secret bytes are zeroized on drop by ed25519-dalek.
//! - `Debug` prints the address only.
//! - Key bytes are never logged.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey, SECRET_KEY_LENGTH};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::address::Address;
use super::hash::hash160;
use crate::config::PK_HASH_LENGTH;

/// Errors that can occur while loading key material.
///
/// Messages never include the rejected bytes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("invalid secret key bytes: wrong length or encoding")]
    InvalidSecretKey,

    #[error("invalid public key bytes: not a valid Ed25519 point")]
    InvalidPublicKey,
}

// ---------------------------------------------------------------------------
// PkHash
// ---------------------------------------------------------------------------

/// `HASH160` of a public key.
///
/// Identifies an address, is the target of pay-to-key-hash scripts, and is
/// the value spends are serialized on.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PkHash([u8; PK_HASH_LENGTH]);

impl PkHash {
    /// Wraps raw hash bytes.
    pub const fn from_bytes(bytes: [u8; PK_HASH_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Parses a 20-byte slice.
    pub fn try_from_slice(slice: &[u8]) -> Option<Self> {
        let bytes: [u8; PK_HASH_LENGTH] = slice.try_into().ok()?;
        Some(Self(bytes))
    }

    /// Hashes a serialized public key.
    pub fn of_public_key(public_key: &PublicKey) -> Self {
        Self(hash160(public_key.as_bytes()))
    }

    pub fn as_bytes(&self) -> &[u8; PK_HASH_LENGTH] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for PkHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for PkHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PkHash({})", self.to_hex())
    }
}

// ---------------------------------------------------------------------------
// PublicKey
// ---------------------------------------------------------------------------

/// A 32-byte Ed25519 public key, as carried in unlocking scripts.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey([u8; 32]);

impl PublicKey {
    /// Parses and validates a public key from a slice.
    pub fn try_from_slice(slice: &[u8]) -> Result<Self, KeyError> {
        let bytes: [u8; 32] = slice.try_into().map_err(|_| KeyError::InvalidPublicKey)?;
        VerifyingKey::from_bytes(&bytes).map_err(|_| KeyError::InvalidPublicKey)?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Returns the pk-hash of this key.
    pub fn pk_hash(&self) -> PkHash {
        PkHash::of_public_key(self)
    }

    /// Verifies an Ed25519 signature over `message`.
    ///
    /// Malformed keys or signatures simply fail verification.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(&self.0) else {
            return false;
        };
        let Ok(sig_bytes) = <[u8; 64]>::try_from(signature) else {
            return false;
        };
        verifying_key
            .verify(message, &Signature::from_bytes(&sig_bytes))
            .is_ok()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

// ---------------------------------------------------------------------------
// SpendKey
// ---------------------------------------------------------------------------

/// The private key controlling one address.
pub struct SpendKey {
    signing_key: SigningKey,
    address_version: u8,
}

impl SpendKey {
    /// Generate a fresh key using the OS RNG. Mainnet address version.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
            address_version: crate::config::ADDRESS_VERSION_MAINNET,
        }
    }

    /// Build a key deterministically from a 32-byte seed.
    pub fn from_seed(seed: &[u8; SECRET_KEY_LENGTH]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
            address_version: crate::config::ADDRESS_VERSION_MAINNET,
        }
    }

    /// Load a key from a hex-encoded 32-byte secret.
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_str.trim()).map_err(|_| KeyError::InvalidSecretKey)?;
        let seed: [u8; SECRET_KEY_LENGTH] =
            bytes.try_into().map_err(|_| KeyError::InvalidSecretKey)?;
        Ok(Self::from_seed(&seed))
    }

    /// Selects the address version byte used by [`SpendKey::address`].
    pub fn with_address_version(mut self, version: u8) -> Self {
        self.address_version = version;
        self
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    pub fn pk_hash(&self) -> PkHash {
        self.public_key().pk_hash()
    }

    /// The address funds for this key are locked to.
    pub fn address(&self) -> Address {
        Address::new(self.address_version, self.pk_hash())
    }

    /// Ed25519 signature over `message`. Deterministic.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }

    /// Hex export of the secret. Only the wallet's `keygen` should need this.
    pub fn secret_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }
}

impl Clone for SpendKey {
    fn clone(&self) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&self.signing_key.to_bytes()),
            address_version: self.address_version,
        }
    }
}

impl fmt::Debug for SpendKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpendKey")
            .field("address", &self.address().to_string())
            .finish_non_exhaustive()
    }
}
