use crate::block::BlockHash;
use thiserror::Error;

/// Failures of the storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("rocksdb: {0}")]
    Rocks(#[from] rocksdb::Error),
    #[error("failed to encode record: {0}")]
    Encode(#[from] bincode::error::EncodeError),
    #[error("failed to decode record {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: bincode::error::DecodeError,
    },
}

/// Errors surfaced by the whitelist. An invalid chain is not an error: it is reported
/// as `false` by the validity checks.
#[derive(Debug, Error)]
pub enum WhitelistError {
    #[error("empty chain handed to milestone validation")]
    EmptyChain,
    #[error("remote peer did not serve whitelisted block {number}: {reason}")]
    NoRemote { number: u64, reason: String },
    #[error("remote block {number} has hash {got}, whitelisted hash is {expected}")]
    Mismatch {
        number: u64,
        expected: BlockHash,
        got: BlockHash,
    },
    #[error("invalid block hash {0}")]
    InvalidHash(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T, E = WhitelistError> = std::result::Result<T, E>;
