//! In-process spendable output store.
//!
//! `DashMap` shards the per-key output sets so lookups for unrelated keys
//! never contend. Each key's set is a `BTreeMap` ordered by outpoint, so
//! results are deterministic.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use dashmap::DashMap;

use super::{ensure_sufficient, outputs_owned_by, SpendableOutputStore, UnspentOutput};
use crate::crypto::keys::PkHash;
use crate::error::{SpendError, SpendResult};
use crate::transaction::{OutPoint, Transaction, TxId};

#[derive(Debug, Default)]
struct KeyOutputs {
    unspent: BTreeMap<OutPoint, UnspentOutput>,
    /// Outputs consumed by a reserved transaction, kept so the reservation
    /// can be released.
    reserved: HashMap<TxId, Vec<UnspentOutput>>,
}

/// Spendable outputs held in memory.
#[derive(Debug, Default)]
pub struct MemoryOutputStore {
    keys: DashMap<PkHash, KeyOutputs>,
}

impl MemoryOutputStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of transactions currently reserved for the key.
    pub fn reserved_count(&self, pk_hash: &PkHash) -> usize {
        self.keys
            .get(pk_hash)
            .map(|entry| entry.reserved.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl SpendableOutputStore for MemoryOutputStore {
    async fn has_spendable(&self, pk_hash: &PkHash) -> SpendResult<bool> {
        Ok(self
            .keys
            .get(pk_hash)
            .map(|entry| !entry.unspent.is_empty())
            .unwrap_or(false))
    }

    async fn get_spendable(
        &self,
        pk_hash: &PkHash,
        minimum_total: u64,
    ) -> SpendResult<Vec<UnspentOutput>> {
        let outputs: Vec<UnspentOutput> = self
            .keys
            .get(pk_hash)
            .map(|entry| entry.unspent.values().cloned().collect())
            .unwrap_or_default();
        ensure_sufficient(&outputs, minimum_total)?;
        Ok(outputs)
    }

    async fn reserve(&self, pk_hash: &PkHash, tx: &Transaction) -> SpendResult<()> {
        let txid = tx.txid();
        let mut entry = self.keys.entry(*pk_hash).or_default();

        if entry.reserved.contains_key(&txid) {
            return Err(SpendError::InvalidTransaction(format!(
                "transaction {txid} already reserved"
            )));
        }
        for input in &tx.inputs {
            if !entry.unspent.contains_key(&input.previous_output) {
                return Err(SpendError::InvalidTransaction(format!(
                    "input {} is not spendable by {}",
                    input.previous_output, pk_hash
                )));
            }
        }

        let consumed: Vec<UnspentOutput> = tx
            .inputs
            .iter()
            .filter_map(|input| entry.unspent.remove(&input.previous_output))
            .collect();
        for change in outputs_owned_by(pk_hash, tx) {
            entry.unspent.insert(change.outpoint, change);
        }
        entry.reserved.insert(txid, consumed);
        Ok(())
    }

    async fn release(&self, pk_hash: &PkHash, tx: &Transaction) -> SpendResult<()> {
        let txid = tx.txid();
        let Some(mut entry) = self.keys.get_mut(pk_hash) else {
            return Ok(());
        };
        let Some(consumed) = entry.reserved.remove(&txid) else {
            return Ok(());
        };
        for change in outputs_owned_by(pk_hash, tx) {
            entry.unspent.remove(&change.outpoint);
        }
        for output in consumed {
            entry.unspent.insert(output.outpoint, output);
        }
        Ok(())
    }

    async fn insert(&self, pk_hash: &PkHash, output: UnspentOutput) -> SpendResult<()> {
        self.keys
            .entry(*pk_hash)
            .or_default()
            .unspent
            .insert(output.outpoint, output);
        Ok(())
    }
}
