use super::{Database, RecordKey, decode, encode};
use crate::error::StoreError;
use log::info;
use rocksdb::{DB, Options};
use std::path::Path;
use std::sync::Arc;

/// RocksDB-backed store used by nodes.
#[derive(Clone)]
pub struct RocksDB {
    db: Arc<DB>,
}

impl RocksDB {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);

        let db = DB::open(&opts, path.as_ref())?;
        info!("Milestone database opened at {}", path.as_ref().display());

        Ok(RocksDB { db: Arc::new(db) })
    }
}

impl Database for RocksDB {
    fn put<T: RecordKey>(&self, key: T, value: &T::Type) -> Result<(), StoreError> {
        let bytes = encode(value)?;
        self.db.put(key.key().as_bytes(), bytes)?;
        Ok(())
    }

    fn get<T: RecordKey>(&self, key: T) -> Result<Option<T::Type>, StoreError> {
        let key = key.key();
        match self.db.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&key, &bytes)?)),
            None => Ok(None),
        }
    }

    fn delete<T: RecordKey>(&self, key: T) -> Result<(), StoreError> {
        self.db.delete(key.key().as_bytes())?;
        Ok(())
    }
}
