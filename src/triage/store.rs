use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use tokio::sync::OwnedMutexGuard;

use crate::models::UserMedicalHistory;

use super::types::HistoryError;

/// Persistent per-user medical history. Implementations are blocking;
/// the engine calls them from `spawn_blocking`.
pub trait HistoryStore: Send + Sync {
    fn get(&self, user_id: &str) -> Result<Option<UserMedicalHistory>, HistoryError>;
    fn put(&self, history: &UserMedicalHistory) -> Result<(), HistoryError>;
}

/// Process-local store. Contents are lost on restart.
#[derive(Default)]
pub struct InMemoryHistoryStore {
    records: RwLock<HashMap<String, UserMedicalHistory>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl HistoryStore for InMemoryHistoryStore {
    fn get(&self, user_id: &str) -> Result<Option<UserMedicalHistory>, HistoryError> {
        let records = self.records.read().map_err(|_| HistoryError::LockFailed)?;
        Ok(records.get(user_id).cloned())
    }

    fn put(&self, history: &UserMedicalHistory) -> Result<(), HistoryError> {
        let mut records = self.records.write().map_err(|_| HistoryError::LockFailed)?;
        records.insert(history.user_id.clone(), history.clone());
        Ok(())
    }
}

/// Idle lock entries are pruned once the map grows past this.
const LOCK_PRUNE_THRESHOLD: usize = 1024;

/// One async mutex per user id. Holding the guard serializes the
/// read-evaluate-write cycle for that user; other users proceed in parallel.
#[derive(Default)]
pub struct UserLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, user_id: &str) -> Result<OwnedMutexGuard<()>, HistoryError> {
        let lock = {
            let mut locks = self.locks.lock().map_err(|_| HistoryError::LockFailed)?;
            if locks.len() > LOCK_PRUNE_THRESHOLD {
                locks.retain(|_, l| Arc::strong_count(l) > 1);
            }
            locks
                .entry(user_id.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        Ok(lock.lock_owned().await)
    }

    pub fn tracked(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PatientContext;
    use std::time::Duration;

    #[test]
    fn in_memory_store_round_trip() {
        let store = InMemoryHistoryStore::new();
        assert!(store.get("u1").unwrap().is_none());

        let history = UserMedicalHistory::from_context("u1", &PatientContext::default());
        store.put(&history).unwrap();
        assert_eq!(store.get("u1").unwrap(), Some(history));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn put_replaces_existing_record() {
        let store = InMemoryHistoryStore::new();
        let mut history = UserMedicalHistory::from_context("u1", &PatientContext::default());
        store.put(&history).unwrap();
        history.age = 61;
        store.put(&history).unwrap();
        assert_eq!(store.get("u1").unwrap().unwrap().age, 61);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn same_user_lock_is_exclusive() {
        let locks = Arc::new(UserLocks::new());
        let guard = locks.acquire("u1").await.unwrap();

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move { locks.acquire("u1").await.map(|_| ()) })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .expect("contender should acquire after release")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn different_users_do_not_block() {
        let locks = UserLocks::new();
        let _a = locks.acquire("a").await.unwrap();
        let b = tokio::time::timeout(Duration::from_millis(200), locks.acquire("b")).await;
        assert!(b.is_ok());
        assert_eq!(locks.tracked(), 2);
    }

    #[tokio::test]
    async fn idle_locks_are_pruned_and_held_ones_survive() {
        let locks = Arc::new(UserLocks::new());
        let held = locks.acquire("held").await.unwrap();
        for i in 0..LOCK_PRUNE_THRESHOLD {
            drop(locks.acquire(&format!("idle-{i}")).await.unwrap());
        }
        assert_eq!(locks.tracked(), LOCK_PRUNE_THRESHOLD + 1);

        let _trigger = locks.acquire("trigger").await.unwrap();
        assert_eq!(locks.tracked(), 2);

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move { locks.acquire("held").await.map(|_| ()) })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(held);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .expect("held lock should still serialize its user")
            .unwrap()
            .unwrap();
    }
}
