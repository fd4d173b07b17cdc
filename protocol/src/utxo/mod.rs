//! # Spendable Output Store
//!
//! Read/write interface over the unspent outputs controlled by each
//! pk-hash.
//!
//! ```text
//! mod.rs        - UnspentOutput and the SpendableOutputStore trait
//! memory.rs     - in-process store (DashMap of per-key output sets)
//! sled_store.rs - persisted store on sled
//! selection.rs  - which spendable outputs become inputs
//! ```
//!
//! The store does not arbitrate concurrent spends. Callers read it inside
//! the [`KeyLock`](crate::keylock::KeyLock) for the key, and record the
//! result with [`SpendableOutputStore::reserve`] before releasing the lock,
//! so the next holder sees a set that already excludes those outputs.

pub mod memory;
pub mod selection;
pub mod sled_store;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::crypto::keys::PkHash;
use crate::error::{SpendError, SpendResult};
use crate::script::Script;
use crate::transaction::{OutPoint, Transaction};

pub use memory::MemoryOutputStore;
pub use selection::SelectionPolicy;
pub use sled_store::SledOutputStore;

/// An output that can be used as a transaction input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnspentOutput {
    pub outpoint: OutPoint,
    /// Value in satoshis.
    pub value: u64,
    /// Locking script, pay-to-key-hash for the owning key.
    pub script: Script,
    /// Confirmation height. `None` while the creating transaction is only
    /// queued.
    pub height: Option<u32>,
}

/// Persisted index of spendable outputs, keyed by pk-hash.
#[async_trait]
pub trait SpendableOutputStore: Send + Sync {
    /// Whether the key has at least one spendable output.
    async fn has_spendable(&self, pk_hash: &PkHash) -> SpendResult<bool>;

    /// All currently spendable outputs for the key.
    ///
    /// Fails with `InsufficientFunds` if their total is below
    /// `minimum_total`.
    async fn get_spendable(
        &self,
        pk_hash: &PkHash,
        minimum_total: u64,
    ) -> SpendResult<Vec<UnspentOutput>>;

    /// Records `tx` as accepted for relay: its inputs stop being
    /// spendable, and its outputs locked to `pk_hash` become spendable.
    async fn reserve(&self, pk_hash: &PkHash, tx: &Transaction) -> SpendResult<()>;

    /// Undoes a previous [`reserve`](Self::reserve) of `tx`.
    async fn release(&self, pk_hash: &PkHash, tx: &Transaction) -> SpendResult<()>;

    /// Credits an output to the key (funding, chain sync).
    async fn insert(&self, pk_hash: &PkHash, output: UnspentOutput) -> SpendResult<()>;

    /// Total spendable value for the key.
    async fn balance(&self, pk_hash: &PkHash) -> SpendResult<u64> {
        let outputs = self.get_spendable(pk_hash, 0).await?;
        Ok(total_value(&outputs))
    }
}

/// Sum of output values. Saturates instead of wrapping.
pub fn total_value(outputs: &[UnspentOutput]) -> u64 {
    outputs
        .iter()
        .fold(0u64, |acc, o| acc.saturating_add(o.value))
}

/// Shared sufficiency check for store implementations.
pub(crate) fn ensure_sufficient(
    outputs: &[UnspentOutput],
    minimum_total: u64,
) -> SpendResult<()> {
    let available = total_value(outputs);
    if available < minimum_total {
        return Err(SpendError::InsufficientFunds {
            required: minimum_total,
            available,
        });
    }
    Ok(())
}

/// Outputs of `tx` that `pk_hash` can spend next (change), as unconfirmed
/// spendable outputs.
pub(crate) fn outputs_owned_by(pk_hash: &PkHash, tx: &Transaction) -> Vec<UnspentOutput> {
    let txid = tx.txid();
    tx.outputs
        .iter()
        .enumerate()
        .filter(|(_, out)| out.locking_script.pay_to_key_hash_target() == Some(*pk_hash))
        .map(|(vout, out)| UnspentOutput {
            outpoint: OutPoint::new(txid, vout as u32),
            value: out.value,
            script: out.locking_script.clone(),
            height: None,
        })
        .collect()
}
