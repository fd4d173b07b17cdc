//! Persisted spendable output store on sled.
//!
//! ## Key Layout
//!
//! Everything lives in a single tree so that a reservation (inputs out,
//! change in) or its release is one atomic `Batch`:
//!
//! | Prefix | Key                                             | Value                   |
//! |--------|-------------------------------------------------|-------------------------|
//! | `u`    | `pk_hash(20) ‖ txid(32) ‖ vout(4 BE)`           | `bincode(UnspentOutput)`|
//! | `r`    | `pk_hash(20) ‖ spending_txid(32) ‖ txid ‖ vout` | `bincode(UnspentOutput)`|
//!
//! Big-endian `vout` keeps sled's lexicographic order equal to outpoint
//! order, so a prefix scan over `u ‖ pk_hash` yields a key's outputs sorted.

use std::path::Path;

use async_trait::async_trait;
use sled::{Batch, Db, Tree};

use super::{ensure_sufficient, outputs_owned_by, SpendableOutputStore, UnspentOutput};
use crate::crypto::keys::PkHash;
use crate::error::{SpendError, SpendResult};
use crate::transaction::{OutPoint, Transaction, TxId};

const UNSPENT_PREFIX: u8 = b'u';
const RESERVED_PREFIX: u8 = b'r';

/// Spendable outputs persisted in a sled database.
#[derive(Debug, Clone)]
pub struct SledOutputStore {
    db: Db,
    outputs: Tree,
}

impl SledOutputStore {
    /// Open or create a store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> SpendResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// A store that lives in a temporary directory and is removed on drop.
    pub fn open_temporary() -> SpendResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> SpendResult<Self> {
        let outputs = db.open_tree("spendable_outputs")?;
        Ok(Self { db, outputs })
    }

    fn unspent_prefix(pk_hash: &PkHash) -> Vec<u8> {
        let mut key = Vec::with_capacity(1 + 20);
        key.push(UNSPENT_PREFIX);
        key.extend_from_slice(pk_hash.as_bytes());
        key
    }

    fn unspent_key(pk_hash: &PkHash, outpoint: &OutPoint) -> Vec<u8> {
        let mut key = Self::unspent_prefix(pk_hash);
        push_outpoint(&mut key, outpoint);
        key
    }

    fn reserved_prefix(pk_hash: &PkHash, spending: &TxId) -> Vec<u8> {
        let mut key = Vec::with_capacity(1 + 20 + 32 + 36);
        key.push(RESERVED_PREFIX);
        key.extend_from_slice(pk_hash.as_bytes());
        key.extend_from_slice(spending.as_bytes());
        key
    }

    fn scan(&self, prefix: &[u8]) -> SpendResult<Vec<UnspentOutput>> {
        self.outputs
            .scan_prefix(prefix)
            .map(|item| {
                let (_, value) = item?;
                Ok(bincode::deserialize::<UnspentOutput>(&value)?)
            })
            .collect()
    }

    async fn apply(&self, batch: Batch) -> SpendResult<()> {
        self.outputs.apply_batch(batch)?;
        self.db.flush_async().await?;
        Ok(())
    }
}

fn push_outpoint(key: &mut Vec<u8>, outpoint: &OutPoint) {
    key.extend_from_slice(outpoint.txid.as_bytes());
    key.extend_from_slice(&outpoint.vout.to_be_bytes());
}

#[async_trait]
impl SpendableOutputStore for SledOutputStore {
    async fn has_spendable(&self, pk_hash: &PkHash) -> SpendResult<bool> {
        let first = self
            .outputs
            .scan_prefix(Self::unspent_prefix(pk_hash))
            .next()
            .transpose()?;
        Ok(first.is_some())
    }

    async fn get_spendable(
        &self,
        pk_hash: &PkHash,
        minimum_total: u64,
    ) -> SpendResult<Vec<UnspentOutput>> {
        let outputs = self.scan(&Self::unspent_prefix(pk_hash))?;
        ensure_sufficient(&outputs, minimum_total)?;
        Ok(outputs)
    }

    async fn reserve(&self, pk_hash: &PkHash, tx: &Transaction) -> SpendResult<()> {
        let txid = tx.txid();
        let reserved_prefix = Self::reserved_prefix(pk_hash, &txid);
        if self.outputs.scan_prefix(&reserved_prefix).next().is_some() {
            return Err(SpendError::InvalidTransaction(format!(
                "transaction {txid} already reserved"
            )));
        }

        let mut batch = Batch::default();
        for input in &tx.inputs {
            let key = Self::unspent_key(pk_hash, &input.previous_output);
            let Some(value) = self.outputs.get(&key)? else {
                return Err(SpendError::InvalidTransaction(format!(
                    "input {} is not spendable by {}",
                    input.previous_output, pk_hash
                )));
            };
            let mut reserved_key = reserved_prefix.clone();
            push_outpoint(&mut reserved_key, &input.previous_output);
            batch.remove(key);
            batch.insert(reserved_key, value);
        }
        for change in outputs_owned_by(pk_hash, tx) {
            let key = Self::unspent_key(pk_hash, &change.outpoint);
            batch.insert(key, bincode::serialize(&change)?);
        }
        self.apply(batch).await
    }

    async fn release(&self, pk_hash: &PkHash, tx: &Transaction) -> SpendResult<()> {
        let txid = tx.txid();
        let reserved_prefix = Self::reserved_prefix(pk_hash, &txid);

        let mut batch = Batch::default();
        let mut restored = 0usize;
        for item in self.outputs.scan_prefix(&reserved_prefix) {
            let (key, value) = item?;
            let output: UnspentOutput = bincode::deserialize(&value)?;
            batch.remove(key);
            batch.insert(Self::unspent_key(pk_hash, &output.outpoint), value);
            restored += 1;
        }
        if restored == 0 {
            return Ok(());
        }
        for change in outputs_owned_by(pk_hash, tx) {
            batch.remove(Self::unspent_key(pk_hash, &change.outpoint));
        }
        self.apply(batch).await
    }

    async fn insert(&self, pk_hash: &PkHash, output: UnspentOutput) -> SpendResult<()> {
        let mut batch = Batch::default();
        batch.insert(
            Self::unspent_key(pk_hash, &output.outpoint),
            bincode::serialize(&output)?,
        );
        self.apply(batch).await
    }
}
