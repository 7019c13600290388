//! Record-keyed storage for milestone state.
//!
//! Every record is addressed by a [`RecordKey`], which also names the type stored under it.
//! Values are bincode-encoded, so any backend only needs to move bytes.

use crate::block::{BlockHash, Milestone};
use crate::error::StoreError;
use bincode::{Decode, Encode, config};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

mod mem_db;
mod rocks_db;

pub use mem_db::MemoryDB;
pub use rocks_db::RocksDB;

pub static BINCODE_CONFIG: Lazy<config::Configuration> = Lazy::new(config::standard);

pub const LAST_MILESTONE_KEY: &str = "milestone:last";
pub const LOCK_FIELD_KEY: &str = "milestone:lock";
pub const FUTURE_MILESTONE_KEY: &str = "milestone:future";

/// Type of the database key which we can get from the custom key.
pub trait RecordKey {
    type Type: Encode + Decode<()>;

    fn key(&self) -> String;
}

pub trait Database: Send + Sync {
    /// Puts value for given key into database.
    fn put<T: RecordKey>(&self, key: T, value: &T::Type) -> Result<(), StoreError>;

    /// Gets value for given key, `None` if it was never written.
    fn get<T: RecordKey>(&self, key: T) -> Result<Option<T::Type>, StoreError>;

    /// Deletes value from the database for the given key.
    fn delete<T: RecordKey>(&self, key: T) -> Result<(), StoreError>;
}

pub(crate) fn encode<T: Encode>(value: &T) -> Result<Vec<u8>, StoreError> {
    Ok(bincode::encode_to_vec(value, *BINCODE_CONFIG)?)
}

pub(crate) fn decode<T: Decode<()>>(key: &str, bytes: &[u8]) -> Result<T, StoreError> {
    let (value, _) = bincode::decode_from_slice(bytes, *BINCODE_CONFIG).map_err(|source| {
        StoreError::Decode {
            key: key.to_string(),
            source,
        }
    })?;
    Ok(value)
}

/// Persisted vote lock fields.
#[derive(Serialize, Encode, Decode, Debug, Clone, Default, PartialEq)]
pub struct LockRecord {
    pub locked: bool,
    pub number: u64,
    pub hash: BlockHash,
    pub ids: Vec<String>,
}

/// Persisted future milestone queue: the order list and the number to hash list.
#[derive(Encode, Decode, Debug, Clone, Default, PartialEq)]
pub struct FutureRecord {
    pub order: Vec<u64>,
    pub list: Vec<(u64, BlockHash)>,
}

pub struct LastMilestoneKey;

impl RecordKey for LastMilestoneKey {
    type Type = Milestone;

    fn key(&self) -> String {
        LAST_MILESTONE_KEY.into()
    }
}

pub struct LockFieldKey;

impl RecordKey for LockFieldKey {
    type Type = LockRecord;

    fn key(&self) -> String {
        LOCK_FIELD_KEY.into()
    }
}

pub struct FutureMilestoneKey;

impl RecordKey for FutureMilestoneKey {
    type Type = FutureRecord;

    fn key(&self) -> String {
        FUTURE_MILESTONE_KEY.into()
    }
}

pub fn read_last_milestone<D: Database>(db: &D) -> Result<Option<Milestone>, StoreError> {
    db.get(LastMilestoneKey)
}

pub fn write_last_milestone<D: Database>(db: &D, milestone: Milestone) -> Result<(), StoreError> {
    db.put(LastMilestoneKey, &milestone)
}

pub fn delete_last_milestone<D: Database>(db: &D) -> Result<(), StoreError> {
    db.delete(LastMilestoneKey)
}

pub fn read_lock_field<D: Database>(db: &D) -> Result<Option<LockRecord>, StoreError> {
    db.get(LockFieldKey)
}

pub fn write_lock_field<D: Database>(
    db: &D,
    locked: bool,
    number: u64,
    hash: BlockHash,
    ids: &HashSet<String>,
) -> Result<(), StoreError> {
    let mut ids: Vec<String> = ids.iter().cloned().collect();
    ids.sort();
    db.put(
        LockFieldKey,
        &LockRecord {
            locked,
            number,
            hash,
            ids,
        },
    )
}

pub fn read_future_milestone_list<D: Database>(
    db: &D,
) -> Result<Option<FutureRecord>, StoreError> {
    db.get(FutureMilestoneKey)
}

pub fn write_future_milestone_list<D: Database>(
    db: &D,
    list: &BTreeMap<u64, BlockHash>,
) -> Result<(), StoreError> {
    db.put(
        FutureMilestoneKey,
        &FutureRecord {
            order: list.keys().copied().collect(),
            list: list.iter().map(|(number, hash)| (*number, *hash)).collect(),
        },
    )
}
