//! # Memo Protocol: Spend Core
//!
//! Builds, signs, and queues the transactions behind every on-chain action
//! a Memo user takes: posting, setting a profile picture, following, paying
//! another address. Each action is a UTXO transaction carrying an optional
//! data-embed output plus change back to the sender.
//!
//! ## Architecture
//!
//! - **config**: Protocol constants and runtime spend configuration.
//! - **crypto**: Hashing, keys, pk-hashes and base58check addresses.
//! - **script**: Pay-to-key-hash and data-embed scripts.
//! - **transaction**: Wire types, sighash, signing, and the builder.
//! - **fee**: Flat-rate-minus-savings fee model.
//! - **utxo**: Spendable output stores (memory, sled) and input selection.
//! - **keylock**: Per-key spend serialization.
//! - **broadcast**: Non-blocking relay queue with a background worker.
//! - **memo**: Typed Memo actions encoded as data-embed payloads.
//! - **spend**: The coordinator tying the above into one call.
//!
//! ## Guarantees
//!
//! 1. Spends from one key are totally ordered; different keys never wait
//!    on each other.
//! 2. Nothing reaches the relay queue unless building and signing both
//!    succeeded and the inputs were reserved.
//! 3. A failed spend releases the key lock and leaves the store as it was.

pub mod broadcast;
pub mod config;
pub mod crypto;
pub mod error;
pub mod fee;
pub mod keylock;
pub mod memo;
pub mod script;
pub mod spend;
pub mod transaction;
pub mod utxo;

pub use error::{SpendError, SpendResult};
pub use spend::SpendCoordinator;
