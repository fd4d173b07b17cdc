//! # Protocol Configuration & Constants
//!
//! Every consensus-adjacent number used by the spend core lives here: script
//! opcodes we emit, the sighash flags we sign with, address version bytes,
//! and the fee policy defaults. Runtime-tunable knobs (fee policy, queue
//! capacity) are plain structs with `Default` impls that start from these
//! values.

use serde::{Deserialize, Serialize};

use crate::fee::FeePolicy;
use crate::utxo::SelectionPolicy;

// ---------------------------------------------------------------------------
// Transaction Format
// ---------------------------------------------------------------------------

/// Transaction version written into every transaction we build.
pub const TX_VERSION: u32 = 1;

/// Sequence number for inputs. Final, no relative lock time.
pub const DEFAULT_SEQUENCE: u32 = 0xFFFF_FFFF;

/// Lock time for every transaction we build. Spendable immediately.
pub const DEFAULT_LOCK_TIME: u32 = 0;

/// Length of a public key hash (RIPEMD160 of SHA256).
pub const PK_HASH_LENGTH: usize = 20;

/// Length of a transaction id (double SHA-256).
pub const TXID_LENGTH: usize = 32;

// ---------------------------------------------------------------------------
// Sighash Flags
// ---------------------------------------------------------------------------

/// Commit to all inputs and all outputs.
pub const SIGHASH_ALL: u32 = 0x01;

/// Replay-protection flag. Selects the BIP-143 style digest.
pub const SIGHASH_FORKID: u32 = 0x40;

/// The only sighash type this core produces.
pub const SIGHASH_ALL_FORKID: u32 = SIGHASH_ALL | SIGHASH_FORKID;

// ---------------------------------------------------------------------------
// Addresses
// ---------------------------------------------------------------------------

/// Version byte for mainnet pay-to-key-hash addresses (leading `1`).
pub const ADDRESS_VERSION_MAINNET: u8 = 0x00;

/// Version byte for testnet pay-to-key-hash addresses (leading `m`/`n`).
pub const ADDRESS_VERSION_TESTNET: u8 = 0x6F;

// ---------------------------------------------------------------------------
// Fee Policy
// ---------------------------------------------------------------------------

/// Flat fee ceiling for a single action transaction, in satoshis. A
/// transaction carrying a maximum-size payload pays exactly this.
pub const DEFAULT_MAX_TX_FEE: u64 = 1_000;

/// Largest payload a data-embed output may carry, in bytes.
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 217;

/// Smallest output value the network relays. Change below this is folded
/// into the fee.
pub const DUST_MINIMUM_OUTPUT: u64 = 546;

// ---------------------------------------------------------------------------
// Broadcast Queue
// ---------------------------------------------------------------------------

/// Pending transactions the relay worker may buffer before `enqueue`
/// starts refusing.
pub const DEFAULT_RELAY_QUEUE_CAPACITY: usize = 1_024;

/// Most recently accepted transaction ids remembered for deduplication.
pub const DEFAULT_RELAY_DEDUP_WINDOW: usize = 8_192;

// ---------------------------------------------------------------------------
// SpendConfig
// ---------------------------------------------------------------------------

/// Runtime configuration for a [`crate::spend::SpendCoordinator`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendConfig {
    /// Fee model parameters.
    pub fee: FeePolicy,
    /// Which of the spendable outputs become inputs.
    pub selection: SelectionPolicy,
    /// Address version byte used when rendering change/sender addresses.
    pub address_version: u8,
}

impl Default for SpendConfig {
    fn default() -> Self {
        Self {
            fee: FeePolicy::default(),
            selection: SelectionPolicy::All,
            address_version: ADDRESS_VERSION_MAINNET,
        }
    }
}
