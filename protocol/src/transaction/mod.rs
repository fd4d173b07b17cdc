//! # Transaction Module
//!
//! Construction, signing, and verification of spend transactions.
//!
//! ## Architecture
//!
//! ```text
//! types.rs    - TxId, OutPoint, TxIn/TxOut, SpendOutput, Transaction + wire encoding
//! sighash.rs  - per-input signature digest (FORKID preimage)
//! signing.rs  - Signer trait, Ed25519Signer, input verification
//! builder.rs  - TransactionBuilder: inputs + outputs + fee -> signed transaction
//! ```
//!
//! ## Transaction Lifecycle
//!
//! 1. **Build**: [`TransactionBuilder`] lays out requested outputs and change.
//! 2. **Sign**: each input is signed over its [`sighash`] digest.
//! 3. **Reserve**: the coordinator records the spend in the output store.
//! 4. **Queue**: the signed transaction goes to the broadcast queue.

pub mod builder;
pub mod sighash;
pub mod signing;
pub mod types;

pub use builder::{BuiltTransaction, TransactionBuilder};
pub use signing::{verify_input, verify_transaction, Ed25519Signer, InputSignature, Signer};
pub use types::{OutPoint, SpendOutput, Transaction, TxId, TxIn, TxOut};
