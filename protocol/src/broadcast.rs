//! # Broadcast Queue
//!
//! Hands signed transactions to a background relay worker.
//!
//! ```text
//! enqueue(tx) ──try_send──▶ [bounded mpsc] ──▶ worker ──▶ Relay::relay(tx)
//! ```
//!
//! `enqueue` never waits: a full or closed channel is reported to the caller
//! as `RelayUnavailable`, which lets the coordinator roll back its
//! reservation while it still holds the key lock. Delivery after acceptance
//! is best-effort. Relay failures are logged and not retried here.
//!
//! Accepted transaction ids are remembered in a bounded window
//! ([`BroadcastConfig::dedup_window`]); re-enqueueing one of them is a
//! no-op. Transactions the relay refuses come back to the caller in the
//! worker's [`RelayStats`] so their reservations can be released.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{DEFAULT_RELAY_DEDUP_WINDOW, DEFAULT_RELAY_QUEUE_CAPACITY};
use crate::error::{SpendError, SpendResult};
use crate::transaction::{Transaction, TxId};

// ---------------------------------------------------------------------------
// Relay
// ---------------------------------------------------------------------------

/// Submits a transaction to the network.
#[async_trait]
pub trait Relay: Send + Sync {
    async fn relay(&self, tx: &Transaction) -> SpendResult<()>;
}

/// Relay that records what it was given. Nothing leaves the process.
#[derive(Debug, Default)]
pub struct MemoryRelay {
    relayed: Mutex<Vec<Transaction>>,
}

impl MemoryRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transactions relayed so far, in relay order.
    pub fn relayed(&self) -> Vec<Transaction> {
        self.relayed.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.relayed.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.relayed.lock().is_empty()
    }
}

#[async_trait]
impl Relay for MemoryRelay {
    async fn relay(&self, tx: &Transaction) -> SpendResult<()> {
        self.relayed.lock().push(tx.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastConfig {
    /// Transactions buffered ahead of the worker.
    pub capacity: usize,
    /// Accepted transaction ids remembered for deduplication. The oldest
    /// id is forgotten once the window is full.
    pub dedup_window: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_RELAY_QUEUE_CAPACITY,
            dedup_window: DEFAULT_RELAY_DEDUP_WINDOW,
        }
    }
}

/// Outcome of a successful [`BroadcastQueue::enqueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    /// Newly queued for relay.
    Accepted(TxId),
    /// Already accepted earlier; not queued again.
    Duplicate(TxId),
}

impl Enqueued {
    pub fn txid(&self) -> TxId {
        match self {
            Self::Accepted(txid) | Self::Duplicate(txid) => *txid,
        }
    }
}

/// Returned by the worker when it exits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub relayed: u64,
    /// Transactions the relay refused, in queue order. Their reservations
    /// are still held by the output store.
    pub failed: Vec<Transaction>,
}

#[derive(Debug)]
struct QueueState {
    sender: Option<mpsc::Sender<Transaction>>,
    seen: HashSet<TxId>,
    accepted: VecDeque<TxId>,
}

impl QueueState {
    fn remember(&mut self, txid: TxId, window: usize) {
        if window == 0 {
            return;
        }
        while self.accepted.len() >= window {
            if let Some(oldest) = self.accepted.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.seen.insert(txid);
        self.accepted.push_back(txid);
    }
}

/// Producer side of the relay pipeline.
#[derive(Debug)]
pub struct BroadcastQueue {
    state: Mutex<QueueState>,
    dedup_window: usize,
}

impl BroadcastQueue {
    /// Starts the relay worker on the current tokio runtime.
    pub fn spawn(
        relay: Arc<dyn Relay>,
        config: BroadcastConfig,
    ) -> (Arc<Self>, JoinHandle<RelayStats>) {
        let (sender, receiver) = mpsc::channel(config.capacity.max(1));
        let queue = Arc::new(Self {
            state: Mutex::new(QueueState {
                sender: Some(sender),
                seen: HashSet::new(),
                accepted: VecDeque::new(),
            }),
            dedup_window: config.dedup_window,
        });
        let worker = tokio::spawn(run_worker(relay, receiver));
        (queue, worker)
    }

    /// Queues `tx` for relay without waiting.
    ///
    /// The duplicate check and the send happen under one lock, so an id is
    /// only reported as a duplicate once its first copy is in the channel.
    pub fn enqueue(&self, tx: Transaction) -> SpendResult<Enqueued> {
        let txid = tx.txid();
        let mut state = self.state.lock();
        if state.seen.contains(&txid) {
            debug!(%txid, "duplicate transaction not queued");
            return Ok(Enqueued::Duplicate(txid));
        }

        let sender = state.sender.as_ref().ok_or_else(|| {
            SpendError::RelayUnavailable("broadcast queue is shut down".into())
        })?;
        sender.try_send(tx).map_err(|e| match e {
            TrySendError::Full(_) => {
                SpendError::RelayUnavailable("broadcast queue is full".into())
            }
            TrySendError::Closed(_) => {
                SpendError::RelayUnavailable("relay worker has stopped".into())
            }
        })?;
        state.remember(txid, self.dedup_window);
        drop(state);

        info!(%txid, "transaction queued for relay");
        Ok(Enqueued::Accepted(txid))
    }

    /// Whether `enqueue` would accept a transaction with this id as new.
    pub fn would_accept(&self, txid: &TxId) -> bool {
        let state = self.state.lock();
        !state.seen.contains(txid)
            && state
                .sender
                .as_ref()
                .is_some_and(|s| !s.is_closed() && s.capacity() > 0)
    }

    /// Stops accepting transactions. The worker relays what is already
    /// queued and then exits.
    pub fn shutdown(&self) {
        if self.state.lock().sender.take().is_some() {
            info!("broadcast queue shutting down");
        }
    }
}

async fn run_worker(
    relay: Arc<dyn Relay>,
    mut receiver: mpsc::Receiver<Transaction>,
) -> RelayStats {
    let mut stats = RelayStats::default();
    while let Some(tx) = receiver.recv().await {
        let txid = tx.txid();
        match relay.relay(&tx).await {
            Ok(()) => {
                stats.relayed += 1;
                debug!(%txid, "transaction relayed");
            }
            Err(e) => {
                warn!(%txid, error = %e, "relay failed");
                stats.failed.push(tx);
            }
        }
    }
    info!(
        relayed = stats.relayed,
        failed = stats.failed.len(),
        "relay worker stopped"
    );
    stats
}
