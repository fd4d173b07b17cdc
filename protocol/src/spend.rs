//! # Spend Coordination
//!
//! [`SpendCoordinator::create_and_queue_transaction`] is the single entry
//! point that turns an output request into a queued, signed transaction.
//!
//! ## Pipeline
//!
//! ```text
//! 1. CHECK    - payload limits, minimum input (no lock held)
//! 2. LOCK     - KeyLock::acquire(pk_hash)
//! 3. READ     - store.get_spendable(pk_hash, minimum)
//! 4. SELECT   - SelectionPolicy picks the inputs
//! 5. BUILD    - TransactionBuilder lays out outputs + change and signs
//! 6. RESERVE  - store.reserve(pk_hash, tx); on failure, store.release(pk_hash, tx)
//! 7. QUEUE    - queue.enqueue(tx); on failure, store.release(pk_hash, tx)
//! 8. UNLOCK   - guard dropped
//! ```
//!
//! Any failure in steps 3-7 returns before a transaction reaches the queue,
//! and the guard's drop releases the lock on every one of those paths. The
//! reservation is made before the lock is released, so the next holder for
//! the same key reads a set that already excludes these inputs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::broadcast::{BroadcastQueue, Enqueued};
use crate::config::SpendConfig;
use crate::crypto::address::Address;
use crate::crypto::keys::{PkHash, SpendKey};
use crate::error::{SpendError, SpendResult};
use crate::fee;
use crate::keylock::KeyLock;
use crate::memo::MemoAction;
use crate::transaction::{
    Ed25519Signer, Signer, SpendOutput, Transaction, TransactionBuilder, TxId,
};
use crate::utxo::SpendableOutputStore;

// ---------------------------------------------------------------------------
// Key directory
// ---------------------------------------------------------------------------

/// Resolves an application user to the key that spends for them.
#[async_trait]
pub trait KeyDirectory: Send + Sync {
    /// Fails with `AuthorizationFailure` for unknown users.
    async fn lookup_key(&self, user_id: u64) -> SpendResult<SpendKey>;
}

/// In-memory user -> key table.
#[derive(Debug, Default)]
pub struct MemoryKeyDirectory {
    keys: RwLock<HashMap<u64, SpendKey>>,
}

impl MemoryKeyDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user_id: u64, key: SpendKey) {
        self.keys.write().insert(user_id, key);
    }
}

#[async_trait]
impl KeyDirectory for MemoryKeyDirectory {
    async fn lookup_key(&self, user_id: u64) -> SpendResult<SpendKey> {
        self.keys
            .read()
            .get(&user_id)
            .cloned()
            .ok_or_else(|| SpendError::AuthorizationFailure(format!("no key for user {user_id}")))
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

pub struct SpendCoordinator {
    locks: Arc<KeyLock>,
    store: Arc<dyn SpendableOutputStore>,
    queue: Arc<BroadcastQueue>,
    signer: Arc<dyn Signer>,
    config: SpendConfig,
}

impl SpendCoordinator {
    pub fn new(
        store: Arc<dyn SpendableOutputStore>,
        queue: Arc<BroadcastQueue>,
        config: SpendConfig,
    ) -> Self {
        Self {
            locks: Arc::new(KeyLock::new()),
            store,
            queue,
            signer: Arc::new(Ed25519Signer),
            config,
        }
    }

    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = signer;
        self
    }

    /// Shares a lock table with other coordinators over the same store.
    pub fn with_key_lock(mut self, locks: Arc<KeyLock>) -> Self {
        self.locks = locks;
        self
    }

    pub fn key_lock(&self) -> &KeyLock {
        &self.locks
    }

    pub fn config(&self) -> &SpendConfig {
        &self.config
    }

    /// Gate for spend-triggering actions.
    pub async fn has_spendable_funds(&self, pk_hash: &PkHash) -> SpendResult<bool> {
        self.store.has_spendable(pk_hash).await
    }

    /// Builds, signs, reserves, and queues a transaction paying `outputs`
    /// from `key`. Returns the id of the queued transaction.
    pub async fn create_and_queue_transaction(
        &self,
        key: &SpendKey,
        outputs: Vec<SpendOutput>,
    ) -> SpendResult<TxId> {
        let fee_model = &self.config.fee;
        fee::check_payloads(fee_model, &outputs)?;
        let minimum = fee::minimum_input(fee_model, &outputs)?;
        let pk_hash = key.pk_hash();

        let guard = self.locks.acquire(pk_hash).await;

        let available = self.store.get_spendable(&pk_hash, minimum).await?;
        let inputs = self.config.selection.select(available, minimum)?;
        debug!(
            %pk_hash,
            minimum,
            inputs = inputs.len(),
            policy = ?self.config.selection,
            "inputs selected"
        );

        let built = TransactionBuilder::new(fee_model)
            .with_signer(self.signer.as_ref())
            .build(inputs, key, &outputs)?;
        let tx = built.transaction;
        let txid = tx.txid();

        if let Err(e) = self.store.reserve(&pk_hash, &tx).await {
            self.release_quietly(&pk_hash, &tx).await;
            return Err(e);
        }
        debug!(tx = %tx.summary(), "reserved");

        match self.queue.enqueue(tx.clone()) {
            Ok(Enqueued::Accepted(_)) => {
                info!(
                    %txid,
                    sender = %Address::new(self.config.address_version, pk_hash),
                    fee = built.fee,
                    change = built.change.unwrap_or(0),
                    "transaction accepted for relay"
                );
            }
            Ok(Enqueued::Duplicate(_)) => {
                debug!(%txid, "transaction was already queued");
            }
            Err(e) => {
                self.release_quietly(&pk_hash, &tx).await;
                return Err(e);
            }
        }

        guard.release();
        Ok(txid)
    }

    /// Returns the inputs of a queued transaction that the relay refused to
    /// the spendable set and drops its change. Takes the key lock.
    ///
    /// Call in reverse queue order when several transactions from one key
    /// failed, so chained change is removed before its parent is restored.
    pub async fn release_unrelayed(&self, pk_hash: &PkHash, tx: &Transaction) -> SpendResult<()> {
        let guard = self.locks.acquire(*pk_hash).await;
        self.store.release(pk_hash, tx).await?;
        info!(txid = %tx.txid(), %pk_hash, "reservation released after relay failure");
        guard.release();
        Ok(())
    }

    /// Undoes a reservation, partial or complete. Logs instead of failing
    /// so the caller can report the original error.
    async fn release_quietly(&self, pk_hash: &PkHash, tx: &Transaction) {
        if let Err(e) = self.store.release(pk_hash, tx).await {
            warn!(txid = %tx.txid(), error = %e, "failed to release reservation");
        }
    }

    /// Resolves `user_id` through `directory`, outside the key lock, then
    /// spends for them.
    pub async fn create_and_queue_for_identity(
        &self,
        directory: &dyn KeyDirectory,
        user_id: u64,
        outputs: Vec<SpendOutput>,
    ) -> SpendResult<TxId> {
        let key = directory.lookup_key(user_id).await?;
        self.create_and_queue_transaction(&key, outputs).await
    }

    /// Queues a memo action as a data-embed output, with change back to `key`.
    pub async fn queue_memo_action(
        &self,
        key: &SpendKey,
        action: &MemoAction,
    ) -> SpendResult<TxId> {
        let output = action.to_output()?;
        self.create_and_queue_transaction(key, vec![output]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::{BroadcastConfig, MemoryRelay, Relay};
    use crate::fee::FeePolicy;
    use crate::script::Script;
    use crate::transaction::OutPoint;
    use crate::utxo::{MemoryOutputStore, UnspentOutput};

    struct RefusingRelay;

    #[async_trait]
    impl Relay for RefusingRelay {
        async fn relay(&self, _tx: &Transaction) -> SpendResult<()> {
            Err(SpendError::RelayUnavailable("node unreachable".into()))
        }
    }

    /// Applies reservations to the inner store, then reports a failed flush.
    struct UnflushedStore(Arc<MemoryOutputStore>);

    #[async_trait]
    impl SpendableOutputStore for UnflushedStore {
        async fn has_spendable(&self, pk_hash: &PkHash) -> SpendResult<bool> {
            self.0.has_spendable(pk_hash).await
        }

        async fn get_spendable(
            &self,
            pk_hash: &PkHash,
            minimum_total: u64,
        ) -> SpendResult<Vec<UnspentOutput>> {
            self.0.get_spendable(pk_hash, minimum_total).await
        }

        async fn reserve(&self, pk_hash: &PkHash, tx: &Transaction) -> SpendResult<()> {
            self.0.reserve(pk_hash, tx).await?;
            Err(SpendError::StoreUnavailable("flush failed".into()))
        }

        async fn release(&self, pk_hash: &PkHash, tx: &Transaction) -> SpendResult<()> {
            self.0.release(pk_hash, tx).await
        }

        async fn insert(&self, pk_hash: &PkHash, output: UnspentOutput) -> SpendResult<()> {
            self.0.insert(pk_hash, output).await
        }
    }

    fn coordinator() -> (SpendCoordinator, Arc<MemoryOutputStore>, Arc<MemoryRelay>) {
        let store = Arc::new(MemoryOutputStore::new());
        let relay = Arc::new(MemoryRelay::new());
        let (queue, _worker) = BroadcastQueue::spawn(relay.clone(), BroadcastConfig::default());
        let config = SpendConfig {
            fee: FeePolicy::new(1_000, 200, 546).unwrap(),
            ..SpendConfig::default()
        };
        (SpendCoordinator::new(store.clone(), queue, config), store, relay)
    }

    async fn fund(store: &MemoryOutputStore, key: &SpendKey, n: u8, value: u64) {
        store
            .insert(
                &key.pk_hash(),
                UnspentOutput {
                    outpoint: OutPoint::new(TxId::from_bytes([n; 32]), 0),
                    value,
                    script: Script::pay_to_key_hash(&key.pk_hash()),
                    height: Some(1),
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn funds_gate_reflects_store() {
        let (coord, store, _) = coordinator();
        let key = SpendKey::generate();
        assert!(!coord.has_spendable_funds(&key.pk_hash()).await.unwrap());
        fund(&store, &key, 1, 1_000).await;
        assert!(coord.has_spendable_funds(&key.pk_hash()).await.unwrap());
    }

    #[tokio::test]
    async fn memo_action_spends_and_leaves_change() {
        let (coord, store, _) = coordinator();
        let key = SpendKey::generate();
        fund(&store, &key, 1, 10_000).await;

        let txid = coord
            .queue_memo_action(&key, &MemoAction::Post("hello".into()))
            .await
            .unwrap();

        // 7-byte payload: fee 807, change 9193 at (txid, 1).
        let outputs = store.get_spendable(&key.pk_hash(), 0).await.unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].outpoint, OutPoint::new(txid, 1));
        assert_eq!(outputs[0].value, 9_193);
    }

    #[tokio::test]
    async fn unknown_identity_is_rejected_before_locking() {
        let (coord, _, _) = coordinator();
        let directory = MemoryKeyDirectory::new();
        let result = coord
            .create_and_queue_for_identity(&directory, 42, Vec::new())
            .await;
        assert!(matches!(result, Err(SpendError::AuthorizationFailure(_))));
        assert_eq!(coord.key_lock().tracked_keys(), 0);
    }

    #[tokio::test]
    async fn identity_spend_uses_directory_key() {
        let (coord, store, _) = coordinator();
        let key = SpendKey::generate();
        fund(&store, &key, 1, 5_000).await;
        let directory = MemoryKeyDirectory::new();
        directory.insert(7, key.clone());

        coord
            .create_and_queue_for_identity(&directory, 7, Vec::new())
            .await
            .unwrap();
        assert_eq!(store.reserved_count(&key.pk_hash()), 1);
    }

    #[tokio::test]
    async fn coordinators_sharing_a_lock_table_serialize_spends() {
        let (coord, store, _) = coordinator();
        let shared = Arc::new(KeyLock::new());
        let coord = coord.with_key_lock(shared.clone());
        assert_eq!(coord.config().fee.max_fee, 1_000);

        let key = SpendKey::generate();
        fund(&store, &key, 1, 5_000).await;

        let held = shared.acquire(key.pk_hash()).await;
        let spend = coord.create_and_queue_transaction(&key, Vec::new());
        tokio::pin!(spend);
        assert!(
            tokio::time::timeout(std::time::Duration::from_millis(20), &mut spend)
                .await
                .is_err(),
            "spend must wait for the shared lock"
        );
        held.release();
        spend.await.unwrap();
        assert_eq!(store.reserved_count(&key.pk_hash()), 1);
    }

    #[tokio::test]
    async fn refused_relay_reservation_can_be_released() {
        let store = Arc::new(MemoryOutputStore::new());
        let (queue, worker) =
            BroadcastQueue::spawn(Arc::new(RefusingRelay), BroadcastConfig::default());
        let coord = SpendCoordinator::new(store.clone(), queue.clone(), SpendConfig::default());
        let key = SpendKey::generate();
        fund(&store, &key, 1, 10_000).await;
        let before = store.get_spendable(&key.pk_hash(), 0).await.unwrap();

        coord
            .queue_memo_action(&key, &MemoAction::Post("hi".into()))
            .await
            .unwrap();
        queue.shutdown();
        let stats = worker.await.unwrap();
        assert_eq!(stats.failed.len(), 1);

        for tx in stats.failed.iter().rev() {
            coord.release_unrelayed(&key.pk_hash(), tx).await.unwrap();
        }
        assert_eq!(store.get_spendable(&key.pk_hash(), 0).await.unwrap(), before);
        assert_eq!(store.reserved_count(&key.pk_hash()), 0);
        assert!(!coord.key_lock().is_locked(&key.pk_hash()));
    }

    #[tokio::test]
    async fn failed_reserve_is_rolled_back() {
        let inner = Arc::new(MemoryOutputStore::new());
        let store = Arc::new(UnflushedStore(inner.clone()));
        let (queue, _worker) =
            BroadcastQueue::spawn(Arc::new(MemoryRelay::new()), BroadcastConfig::default());
        let coord = SpendCoordinator::new(store, queue, SpendConfig::default());
        let key = SpendKey::generate();
        fund(&inner, &key, 1, 10_000).await;
        let before = inner.get_spendable(&key.pk_hash(), 0).await.unwrap();

        let result = coord.create_and_queue_transaction(&key, Vec::new()).await;
        assert!(matches!(result, Err(SpendError::StoreUnavailable(_))));
        assert_eq!(inner.get_spendable(&key.pk_hash(), 0).await.unwrap(), before);
        assert_eq!(inner.reserved_count(&key.pk_hash()), 0);
    }

    #[tokio::test]
    async fn chained_spends_use_unconfirmed_change() {
        let (coord, store, _) = coordinator();
        let key = SpendKey::generate();
        fund(&store, &key, 1, 10_000).await;

        let first = coord
            .queue_memo_action(&key, &MemoAction::SetName("alice".into()))
            .await
            .unwrap();
        let second = coord
            .queue_memo_action(&key, &MemoAction::Post("second".into()))
            .await
            .unwrap();
        assert_ne!(first, second);

        let outputs = store.get_spendable(&key.pk_hash(), 0).await.unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].outpoint.txid, second);
        assert_eq!(outputs[0].height, None);
    }
}
