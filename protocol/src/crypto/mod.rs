//! # Cryptographic Primitives
//!
//! Hashing, spending keys, and addresses. Everything here is a thin,
//! type-safe wrapper around audited crates (`sha2`, `ripemd`,
//! `ed25519-dalek`, `bs58`).

pub mod address;
pub mod hash;
pub mod keys;

pub use address::Address;
pub use hash::{double_sha256, hash160, sha256};
pub use keys::{KeyError, PkHash, PublicKey, SpendKey};
