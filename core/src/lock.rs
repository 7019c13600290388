use crate::block::{BlockHash, Milestone, SealedHeader};
use crate::db::LockRecord;
use std::collections::HashSet;

/// Why a vote lock request was turned down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reserve {
    /// The candidate is now the locked number. `released` is set when a lower lock
    /// had to be dropped first.
    Accepted { released: bool },
    /// A milestone at or beyond the candidate is already whitelisted.
    Finalized,
    /// A higher number is already locked.
    BelowLocked,
}

impl Reserve {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Reserve::Accepted { .. })
    }
}

/// Provisional reservation of the next milestone while validators vote on it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VoteLock {
    locked: bool,
    number: u64,
    hash: BlockHash,
    ids: HashSet<String>,
}

impl VoteLock {
    pub fn from_record(record: LockRecord) -> Self {
        let mut lock = VoteLock {
            locked: record.locked,
            number: record.number,
            hash: record.hash,
            ids: record.ids.into_iter().collect(),
        };
        if !lock.locked && !lock.ids.is_empty() {
            log::warn!(
                "Dropping {} vote ids restored without a lock at {}",
                lock.ids.len(),
                lock.number
            );
            lock.ids.clear();
        }
        lock
    }

    pub fn to_record(&self) -> LockRecord {
        LockRecord {
            locked: self.locked,
            number: self.number,
            hash: self.hash,
            ids: self.ids_sorted(),
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn hash(&self) -> BlockHash {
        self.hash
    }

    pub fn ids(&self) -> &HashSet<String> {
        &self.ids
    }

    pub fn ids_sorted(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.ids.iter().cloned().collect();
        ids.sort();
        ids
    }

    /// Reserves `candidate` as the number being voted on.
    pub fn reserve(&mut self, candidate: u64, whitelisted: Option<Milestone>) -> Reserve {
        if let Some(milestone) = whitelisted {
            if candidate <= milestone.number {
                log::debug!(
                    "Vote candidate {} is at or below whitelisted milestone {}",
                    candidate,
                    milestone.number
                );
                return Reserve::Finalized;
            }
        }

        let mut released = false;
        if self.locked && candidate != self.number {
            if candidate < self.number {
                log::debug!(
                    "Vote candidate {} is below locked milestone {}",
                    candidate,
                    self.number
                );
                return Reserve::BelowLocked;
            }

            log::debug!(
                "Vote candidate {} supersedes locked milestone {}",
                candidate,
                self.number
            );
            released = self.unlock_sprint(self.number);
        }

        self.number = candidate;
        Reserve::Accepted { released }
    }

    /// Locks the reserved number to `hash` on behalf of `vote_id`.
    pub fn commit(&mut self, vote_id: &str, hash: BlockHash) {
        self.locked = true;
        self.hash = hash;
        self.ids.insert(vote_id.to_string());
    }

    /// Releases the lock once `number` reaches it. Returns false when the lock still
    /// guards a point ahead of `number`.
    pub fn unlock_sprint(&mut self, number: u64) -> bool {
        if number < self.number {
            return false;
        }
        self.locked = false;
        self.ids.clear();
        true
    }

    /// Withdraws one vote; the lock goes with the last one.
    pub fn remove_id(&mut self, vote_id: &str) -> bool {
        let removed = self.ids.remove(vote_id);
        if self.ids.is_empty() {
            self.locked = false;
        }
        removed
    }
}

/// Whether `chain` may replace our chain given a lock on `locked_number`.
///
/// The chain has to reach past the lock, and if it contains the locked block that block
/// must carry `locked_hash`.
pub fn is_reorg_allowed(chain: &[SealedHeader], locked_number: u64, locked_hash: BlockHash) -> bool {
    let Some(tip) = chain.last() else {
        return false;
    };

    if tip.number() <= locked_number {
        return false;
    }

    match chain.iter().find(|header| header.number() == locked_number) {
        Some(header) => header.hash() == locked_hash,
        None => true,
    }
}
