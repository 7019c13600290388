use super::{Database, RecordKey, decode, encode};
use crate::error::StoreError;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// In-process store. Clones share the same map.
#[derive(Clone, Default)]
pub struct MemoryDB {
    map: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryDB {
    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }
}

impl Database for MemoryDB {
    fn put<T: RecordKey>(&self, key: T, value: &T::Type) -> Result<(), StoreError> {
        let bytes = encode(value)?;
        self.map.write().insert(key.key(), bytes);
        Ok(())
    }

    fn get<T: RecordKey>(&self, key: T) -> Result<Option<T::Type>, StoreError> {
        let key = key.key();
        let map = self.map.read();
        map.get(&key).map(|bytes| decode(&key, bytes)).transpose()
    }

    fn delete<T: RecordKey>(&self, key: T) -> Result<(), StoreError> {
        self.map.write().remove(&key.key());
        Ok(())
    }
}
