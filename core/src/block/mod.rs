use crate::error::WhitelistError;
use bincode::{Decode, Encode};
use hex;
use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// 32-byte block digest
#[derive(Encode, Decode, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockHash(pub [u8; 32]);

impl BlockHash {
    pub const ZERO: BlockHash = BlockHash([0u8; 32]);

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// First 8 bytes as hex, for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl From<[u8; 32]> for BlockHash {
    fn from(bytes: [u8; 32]) -> Self {
        BlockHash(bytes)
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Serialize for BlockHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockHash({})", self)
    }
}

impl FromStr for BlockHash {
    type Err = WhitelistError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.strip_prefix("0x").unwrap_or(s);
        let bytes =
            hex::decode(normalized).map_err(|e| WhitelistError::InvalidHash(format!("{s}: {e}")))?;
        let bytes: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
            WhitelistError::InvalidHash(format!("{s}: expected 32 bytes, got {}", b.len()))
        })?;
        Ok(BlockHash(bytes))
    }
}

/// A finality checkpoint: block `number` has hash `hash` and will not be reverted.
#[derive(Serialize, Encode, Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Milestone {
    pub number: u64,
    pub hash: BlockHash,
}

impl Milestone {
    pub fn new(number: u64, hash: BlockHash) -> Self {
        Milestone { number, hash }
    }
}

/// block header
#[derive(Encode, Decode, Debug, Clone, PartialEq)]
pub struct BlockHeader {
    pub number: u64,
    pub parent_hash: BlockHash,
    pub timestamp: i64, // unix seconds
    pub extra: Vec<u8>,
}

/// Header together with its hash, as handed to the whitelist by sync and peers.
#[derive(Debug, Clone, PartialEq)]
pub struct SealedHeader {
    pub header: BlockHeader,
    hash: BlockHash,
}

impl SealedHeader {
    /// Hashes `header` and seals it.
    pub fn seal(header: BlockHeader) -> Result<Self, bincode::error::EncodeError> {
        let hash = compute_header_hash(&header)?;
        Ok(SealedHeader { header, hash })
    }

    /// Pairs a header with a hash obtained elsewhere (e.g. from a peer response).
    pub fn new(header: BlockHeader, hash: BlockHash) -> Self {
        SealedHeader { header, hash }
    }

    pub fn number(&self) -> u64 {
        self.header.number
    }

    pub fn hash(&self) -> BlockHash {
        self.hash
    }
}

pub fn sha256d(data: &[u8]) -> [u8; 32] {
    let h1 = Sha256::digest(data);
    let h2 = Sha256::digest(h1);
    let mut out = [0u8; 32];
    out.copy_from_slice(&h2);
    out
}

/// Deterministic serialization: use bincode (v2 Encode trait)
pub fn serialize_header(header: &BlockHeader) -> Result<Vec<u8>, bincode::error::EncodeError> {
    let config = bincode::config::standard().with_fixed_int_encoding(); // u64 = 8 bytes
    bincode::encode_to_vec(header, config)
}

/// Compute hash from the header (sha256d)
pub fn compute_header_hash(header: &BlockHeader) -> Result<BlockHash, bincode::error::EncodeError> {
    let bytes = serialize_header(header)?;
    Ok(BlockHash(sha256d(&bytes)))
}
