//! Durable storage layer using RocksDB.
//!
//! All records are JSON values under prefixed string keys. Multi-key
//! atomicity comes from `batch_write`; per-entity mutual exclusion comes
//! from the [`LockTable`].

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use dashmap::DashMap;
use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};

use crate::errors::{StorageError, VaultResult};

#[derive(Clone)]
pub struct Store {
    db: Arc<DB>,
}

impl Store {
    pub fn open<P: AsRef<Path>>(path: P) -> VaultResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_write_buffer_size(32 * 1024 * 1024);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let db = DB::open(&opts, path)
            .map_err(|e| StorageError::DatabaseOpenFailed(e.to_string()))?;
        Ok(Self { db: Arc::new(db) })
    }

    pub fn get(&self, key: &[u8]) -> VaultResult<Option<Vec<u8>>> {
        self.db
            .get(key)
            .map_err(|e| StorageError::ReadFailed(e.to_string()).into())
    }

    pub fn put(&self, key: &[u8], value: &[u8]) -> VaultResult<()> {
        self.db
            .put(key, value)
            .map_err(|e| StorageError::WriteFailed(e.to_string()).into())
    }

    pub fn delete(&self, key: &[u8]) -> VaultResult<()> {
        self.db
            .delete(key)
            .map_err(|e| StorageError::WriteFailed(e.to_string()).into())
    }

    /// Write every (key, value) pair atomically. Either all land or none do.
    pub fn batch_write(&self, items: &[(Vec<u8>, Vec<u8>)]) -> VaultResult<()> {
        let mut batch = WriteBatch::default();
        for (key, value) in items {
            batch.put(key, value);
        }
        self.db
            .write(batch)
            .map_err(|e| StorageError::WriteFailed(e.to_string()).into())
    }

    /// All (key, value) rows whose key starts with `prefix`, in key order.
    pub fn scan_prefix(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut rows = Vec::new();
        let iter = self
            .db
            .iterator(IteratorMode::From(prefix, Direction::Forward));
        for item in iter {
            let Ok((key, value)) = item else { break };
            if !key.starts_with(prefix) {
                break;
            }
            rows.push((key.to_vec(), value.to_vec()));
        }
        rows
    }

    /// Decode a stored JSON record.
    pub fn get_json<T: serde::de::DeserializeOwned>(&self, key: &[u8]) -> VaultResult<Option<T>> {
        match self.get(key)? {
            Some(bytes) => {
                let value = serde_json::from_slice(&bytes).map_err(|e| {
                    StorageError::CorruptedData(format!(
                        "Failed to decode {}: {}",
                        String::from_utf8_lossy(key),
                        e
                    ))
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}

/// Per-entity mutexes keyed by account id or by an arbitrary name.
///
/// Lock ordering: a named lock (payment reference, promo code, draw date)
/// is always taken before any account lock, never the other way around.
pub struct LockTable {
    accounts: DashMap<u64, Arc<Mutex<()>>>,
    named: DashMap<String, Arc<Mutex<()>>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            named: DashMap::new(),
        }
    }

    pub fn account(&self, id: u64) -> AccountLock {
        let lock = self
            .accounts
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        AccountLock(lock)
    }

    pub fn named(&self, name: &str) -> AccountLock {
        let lock = self
            .named
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        AccountLock(lock)
    }
}

impl Default for LockTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Owned handle to one entity lock; call `guard()` to enter the section.
pub struct AccountLock(Arc<Mutex<()>>);

impl AccountLock {
    pub fn guard(&self) -> MutexGuard<'_, ()> {
        // A poisoned mutex only means another thread panicked mid-section;
        // the store itself stays consistent because writes are batched.
        match self.0.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_batch_write_and_scan() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path()).unwrap();

        store
            .batch_write(&[
                (b"a:1".to_vec(), b"one".to_vec()),
                (b"a:2".to_vec(), b"two".to_vec()),
                (b"b:1".to_vec(), b"other".to_vec()),
            ])
            .unwrap();

        let rows = store.scan_prefix(b"a:");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].1, b"one");
        assert_eq!(rows[1].1, b"two");
    }

    #[test]
    fn test_lock_table_reuses_locks() {
        let locks = LockTable::new();
        let first = locks.account(7);
        let second = locks.account(7);
        assert!(Arc::ptr_eq(&first.0, &second.0));
    }
}
