use crate::domain::contract::ContractId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per contract.
///
/// Held across read, charge and write of a single contract so two overlapping
/// evaluations cannot both see an uncharged breach.
#[derive(Default)]
pub struct ContractLocks {
    locks: Mutex<HashMap<ContractId, Arc<Mutex<()>>>>,
}

impl ContractLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, id: ContractId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.entry(id).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Drops the entry of a contract nothing will write again.
    ///
    /// An entry still held or awaited by another task is kept, so callers
    /// queued on it stay exclusive with later ones.
    pub async fn forget(&self, id: ContractId) {
        let mut locks = self.locks.lock().await;
        if locks.get(&id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(&id);
        }
    }

    /// Number of contracts with a live entry.
    pub async fn tracked(&self) -> usize {
        self.locks.lock().await.len()
    }
}
