//! # Hashing Utilities
//!
//! The three digests the UTXO model needs and nothing else:
//!
//! - **SHA-256**, the building block.
//! - **double SHA-256**, for transaction ids, sighash digests and address
//!   checksums.
//! - **HASH160** (`RIPEMD160(SHA256(x))`), for public key hashes. This is
//!   the 20-byte value a pay-to-key-hash script commits to and the value
//!   the key lock is keyed by.

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use crate::config::PK_HASH_LENGTH;

/// Compute the SHA-256 hash of the input data.
///
/// # Example
///
/// ```
/// use memo_protocol::crypto::sha256;
///
/// let hash = sha256(b"memo");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let mut output = [0u8; 32];
    output.copy_from_slice(&hasher.finalize());
    output
}

/// Compute `SHA-256(SHA-256(data))`.
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// Compute `RIPEMD160(SHA-256(data))`.
///
/// Applied to a serialized public key this yields the pk-hash.
pub fn hash160(data: &[u8]) -> [u8; PK_HASH_LENGTH] {
    let mut hasher = Ripemd160::new();
    hasher.update(sha256(data));
    let mut output = [0u8; PK_HASH_LENGTH];
    output.copy_from_slice(&hasher.finalize());
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector() {
        // SHA-256("abc") from FIPS 180-2.
        assert_eq!(
            hex::encode(sha256(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn double_sha256_of_empty_input() {
        assert_eq!(
            hex::encode(double_sha256(b"")),
            "5df6e0e2761359d30a8275058e299fcc0381534545f55cf43e41983f5d4c9456"
        );
    }

    #[test]
    fn hash160_of_empty_input() {
        assert_eq!(
            hex::encode(hash160(b"")),
            "b472a266d0bd89c13706a4132ccfb16f7c3b9fcb"
        );
    }

    #[test]
    fn hash160_is_twenty_bytes_and_input_sensitive() {
        let a = hash160(b"key-a");
        let b = hash160(b"key-b");
        assert_eq!(a.len(), 20);
        assert_ne!(a, b);
    }
}
