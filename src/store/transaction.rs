//! Scoped transaction acquisition
//!
//! [`Transaction`] owns an open transaction for as long as it lives. Dropping
//! it without calling [`Transaction::commit`] rolls every write back, whether
//! the scope was left through an error, an early return or a panic.

use std::ops::{Deref, DerefMut};

use tracing::{debug, warn};

use crate::store::traits::{StorageError, StoreResult, Transactional};

/// An open transaction on a store
#[derive(Debug)]
pub struct Transaction<'a, S: Transactional + ?Sized> {
    store: &'a mut S,
    finished: bool,
}

impl<'a, S: Transactional + ?Sized> Transaction<'a, S> {
    /// Begin a transaction on `store`
    pub fn begin(store: &'a mut S) -> StoreResult<Self> {
        store.begin()?;
        debug!("Transaction opened");
        Ok(Self { store, finished: false })
    }

    /// Commit every write made through this transaction
    ///
    /// A failed commit leaves the guard unfinished, so dropping it rolls back.
    pub fn commit(mut self) -> StoreResult<()> {
        self.store.commit()?;
        self.finished = true;
        debug!("Transaction committed");
        Ok(())
    }

    /// Discard every write made through this transaction
    pub fn rollback(mut self) -> StoreResult<()> {
        self.finished = true;
        self.store.rollback()
    }
}

impl<S: Transactional + ?Sized> Deref for Transaction<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        &*self.store
    }
}

impl<S: Transactional + ?Sized> DerefMut for Transaction<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut *self.store
    }
}

impl<S: Transactional + ?Sized> Drop for Transaction<'_, S> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        match self.store.rollback() {
            Ok(()) => debug!("Transaction rolled back"),
            Err(e) => warn!("Rollback of abandoned transaction failed: {}", e),
        }
    }
}

/// Run `work` inside a transaction, committing only when it returns `Ok`
///
/// Any `Err` from `work` (or from the commit itself) leaves the store exactly
/// as it was before the call.
pub fn run_in_transaction<S, T, E, F>(store: &mut S, work: F) -> Result<T, E>
where
    S: Transactional + ?Sized,
    E: From<StorageError>,
    F: FnOnce(&mut S) -> Result<T, E>,
{
    let mut tx = Transaction::begin(store)?;
    let value = work(&mut *tx)?;
    tx.commit()?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Counter {
        value: i32,
        saved: Option<i32>,
        commits: usize,
        rollbacks: usize,
        reject_commit: bool,
    }

    impl Transactional for Counter {
        fn begin(&mut self) -> StoreResult<()> {
            if self.saved.is_some() {
                return Err(StorageError::Transaction("already open".to_string()));
            }
            self.saved = Some(self.value);
            Ok(())
        }

        fn commit(&mut self) -> StoreResult<()> {
            if self.reject_commit {
                return Err(StorageError::Transaction("commit rejected".to_string()));
            }
            self.saved = None;
            self.commits += 1;
            Ok(())
        }

        fn rollback(&mut self) -> StoreResult<()> {
            if let Some(saved) = self.saved.take() {
                self.value = saved;
            }
            self.rollbacks += 1;
            Ok(())
        }
    }

    #[test]
    fn test_commit_keeps_writes() {
        let mut counter = Counter::default();
        let result: StoreResult<()> = run_in_transaction(&mut counter, |c| {
            c.value = 5;
            Ok(())
        });
        assert!(result.is_ok());
        assert_eq!(counter.value, 5);
        assert_eq!(counter.commits, 1);
        assert_eq!(counter.rollbacks, 0);
    }

    #[test]
    fn test_error_rolls_back() {
        let mut counter = Counter { value: 1, ..Default::default() };
        let result: StoreResult<()> = run_in_transaction(&mut counter, |c| {
            c.value = 99;
            Err(StorageError::BackendError("boom".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(counter.value, 1);
        assert_eq!(counter.rollbacks, 1);
        assert_eq!(counter.commits, 0);
    }

    #[test]
    fn test_dropped_guard_rolls_back() {
        let mut counter = Counter { value: 3, ..Default::default() };
        {
            let mut tx = Transaction::begin(&mut counter).unwrap();
            tx.value = 10;
        }
        assert_eq!(counter.value, 3);
        assert_eq!(counter.rollbacks, 1);

        // The store accepts a new transaction afterwards
        let tx = Transaction::begin(&mut counter).unwrap();
        tx.commit().unwrap();
        assert_eq!(counter.commits, 1);
    }

    #[test]
    fn test_failed_commit_rolls_back() {
        let mut counter = Counter { value: 2, reject_commit: true, ..Default::default() };
        let result: StoreResult<()> = run_in_transaction(&mut counter, |c| {
            c.value = 40;
            Ok(())
        });
        assert!(matches!(result, Err(StorageError::Transaction(_))));
        assert_eq!(counter.value, 2);
        assert_eq!(counter.rollbacks, 1);
        assert!(counter.saved.is_none());
    }
}
