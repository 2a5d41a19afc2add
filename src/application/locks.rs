use crate::domain::account::{AccountId, CustomerId};
use crate::domain::emi::EmiId;
use crate::domain::loan::LoanId;
use crate::error::{BankError, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex as RowMutex, OwnedMutexGuard};
use tracing::warn;

/// A lockable row.
///
/// The derived ordering is the acquisition order every unit of work follows:
/// loans, then installments, then customers, then accounts by ascending id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LockKey {
    Loan(LoanId),
    Emi(EmiId),
    Customer(CustomerId),
    Account(AccountId),
}

type RowTable = Arc<Mutex<HashMap<LockKey, Arc<RowMutex<()>>>>>;

/// Exclusive hold on one row. The row's table entry is dropped with the last
/// holder or waiter.
#[derive(Debug)]
pub struct RowGuard {
    key: LockKey,
    guard: Option<OwnedMutexGuard<()>>,
    rows: RowTable,
}

impl Drop for RowGuard {
    fn drop(&mut self) {
        let mut rows = self.rows.lock();
        drop(self.guard.take());
        prune(&mut rows, self.key);
    }
}

fn prune(rows: &mut HashMap<LockKey, Arc<RowMutex<()>>>, key: LockKey) {
    if rows.get(&key).is_some_and(|row| Arc::strong_count(row) == 1) {
        rows.remove(&key);
    }
}

/// Exclusive per-row locks with a bounded wait.
///
/// Only rows currently held or awaited have an entry in the table.
pub struct LockManager {
    rows: RowTable,
    timeout: Duration,
}

impl LockManager {
    pub fn new(timeout: Duration) -> Self {
        Self {
            rows: Arc::new(Mutex::new(HashMap::new())),
            timeout,
        }
    }

    /// Waits for exclusive access to `key`, giving up after the configured
    /// timeout with a retryable [`BankError::LockTimeout`].
    pub async fn acquire(&self, key: LockKey) -> Result<RowGuard> {
        let row = self.rows.lock().entry(key).or_default().clone();
        match tokio::time::timeout(self.timeout, row.clone().lock_owned()).await {
            Ok(guard) => {
                drop(row);
                Ok(RowGuard {
                    key,
                    guard: Some(guard),
                    rows: self.rows.clone(),
                })
            }
            Err(_) => {
                let mut rows = self.rows.lock();
                drop(row);
                prune(&mut rows, key);
                warn!(%key, timeout_ms = self.timeout.as_millis() as u64, "lock wait timed out");
                Err(BankError::LockTimeout(key.to_string()))
            }
        }
    }

    /// Number of rows with a live lock entry.
    pub fn tracked_rows(&self) -> usize {
        self.rows.lock().len()
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockKey::Loan(id) => write!(f, "loan #{}", id),
            LockKey::Emi(id) => write!(f, "EMI #{}", id),
            LockKey::Customer(id) => write!(f, "customer #{}", id),
            LockKey::Account(id) => write!(f, "account #{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_order() {
        let mut keys = vec![
            LockKey::Account(2),
            LockKey::Customer(9),
            LockKey::Account(1),
            LockKey::Emi(4),
            LockKey::Loan(7),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                LockKey::Loan(7),
                LockKey::Emi(4),
                LockKey::Customer(9),
                LockKey::Account(1),
                LockKey::Account(2),
            ]
        );
    }

    #[tokio::test]
    async fn test_contended_lock_times_out() {
        let locks = LockManager::new(Duration::from_millis(20));
        let _held = locks.acquire(LockKey::Account(1)).await.unwrap();

        let err = locks.acquire(LockKey::Account(1)).await.unwrap_err();
        assert!(err.is_retryable());

        assert!(locks.acquire(LockKey::Account(2)).await.is_ok());
    }

    #[tokio::test]
    async fn test_lock_is_released_on_drop() {
        let locks = LockManager::new(Duration::from_millis(20));
        let guard = locks.acquire(LockKey::Loan(1)).await.unwrap();
        drop(guard);
        assert!(locks.acquire(LockKey::Loan(1)).await.is_ok());
    }

    #[tokio::test]
    async fn test_released_rows_leave_the_table() {
        let locks = LockManager::new(Duration::from_millis(20));
        for id in 0..100 {
            let guard = locks.acquire(LockKey::Account(id)).await.unwrap();
            assert_eq!(locks.tracked_rows(), 1);
            drop(guard);
        }
        assert_eq!(locks.tracked_rows(), 0);

        let held = locks.acquire(LockKey::Emi(1)).await.unwrap();
        assert!(locks.acquire(LockKey::Emi(1)).await.is_err());
        // The holder's entry survives the timed-out waiter.
        assert_eq!(locks.tracked_rows(), 1);
        drop(held);
        assert_eq!(locks.tracked_rows(), 0);
    }
}
