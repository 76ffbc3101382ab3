//! Transaction store
//!
//! Each record sits behind its own async mutex, which is the serialization
//! point for every operation on that id. Different ids never share a lock.
//! Id allocation is serialized separately so ids stay dense and sequential.

use std::sync::Arc;

use dashmap::DashMap;
use escrowkit_types::{AccountId, EscrowError, Result, Transaction, TransactionId};
use tokio::sync::{Mutex, MutexGuard};

pub(crate) type TransactionHandle = Arc<Mutex<Transaction>>;

#[derive(Default)]
pub(crate) struct TransactionStore {
    records: DashMap<TransactionId, TransactionHandle>,
    next_id: Mutex<TransactionId>,
}

impl TransactionStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Hold the id counter; the guard's value is the id the next insert takes
    pub(crate) async fn lock_next_id(&self) -> MutexGuard<'_, TransactionId> {
        self.next_id.lock().await
    }

    /// Store a new record under the id held by `next_id` and advance it
    pub(crate) fn insert(&self, next_id: &mut MutexGuard<'_, TransactionId>, tx: Transaction) {
        debug_assert_eq!(tx.id, **next_id);
        let id = tx.id;
        self.records.insert(id, Arc::new(Mutex::new(tx)));
        **next_id = id.next();
    }

    /// The per-transaction lock for `id`
    ///
    /// The map guard is released before returning, so callers may await on
    /// the handle without blocking other ids.
    pub(crate) fn handle(&self, id: TransactionId) -> Result<TransactionHandle> {
        self.records
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(EscrowError::NotFound { id })
    }

    pub(crate) async fn snapshot(&self, id: TransactionId) -> Result<Transaction> {
        let handle = self.handle(id)?;
        let tx = handle.lock().await;
        Ok(tx.clone())
    }

    /// Copies of every record matching `filter`, in id order
    pub(crate) async fn snapshots<F>(&self, filter: F) -> Vec<Transaction>
    where
        F: Fn(&Transaction) -> bool,
    {
        let mut handles: Vec<(TransactionId, TransactionHandle)> = self
            .records
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        handles.sort_by_key(|(id, _)| *id);

        let mut out = Vec::with_capacity(handles.len());
        for (_, handle) in handles {
            let tx = handle.lock().await;
            if filter(&*tx) {
                out.push(tx.clone());
            }
        }
        out
    }

    pub(crate) async fn involving(&self, account: &AccountId) -> Vec<Transaction> {
        self.snapshots(|tx| tx.role_of(account).is_some()).await
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }
}
