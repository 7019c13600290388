//! Baseline finality tracking.
//!
//! The tracker remembers the latest whitelisted milestone and enforces the one rule
//! every candidate chain must pass before the milestone-specific checks run:
//! a chain that covers the milestone height must carry the milestone hash there.
//!
//! The tracker does not lock anything itself. It lives inside the whitelist's
//! read/write lock together with the rest of the milestone state.
use crate::block::{BlockHash, Milestone, SealedHeader};
use crate::db::{self, Database};
use crate::error::{Result, WhitelistError};
use std::sync::Arc;

/// Source of headers from a remote peer: `(number, amount, skip, reverse)`.
pub trait HeaderFetcher {
    fn fetch_headers_by_number(
        &self,
        number: u64,
        amount: usize,
        skip: usize,
        reverse: bool,
    ) -> anyhow::Result<Vec<SealedHeader>>;
}

impl<F> HeaderFetcher for F
where
    F: Fn(u64, usize, usize, bool) -> anyhow::Result<Vec<SealedHeader>>,
{
    fn fetch_headers_by_number(
        &self,
        number: u64,
        amount: usize,
        skip: usize,
        reverse: bool,
    ) -> anyhow::Result<Vec<SealedHeader>> {
        self(number, amount, skip, reverse)
    }
}

/// Latest-checkpoint tracker the milestone whitelist builds on.
pub trait Finality: Send + Sync {
    /// Checks `chain` against the latest whitelisted milestone only.
    fn is_valid_chain(&self, current: &SealedHeader, chain: &[SealedHeader]) -> Result<bool>;

    /// Records a newly whitelisted milestone.
    fn process(&mut self, number: u64, hash: BlockHash);

    fn whitelisted(&self) -> Option<Milestone>;

    /// Forgets the whitelisted milestone.
    fn purge(&mut self);
}

/// [`Finality`] backed by a [`Database`], restoring the last milestone on startup.
pub struct FinalityTracker<D> {
    db: Arc<D>,
    milestone: Option<Milestone>,
}

impl<D: Database> FinalityTracker<D> {
    pub fn new(db: Arc<D>) -> Self {
        let milestone = match db::read_last_milestone(db.as_ref()) {
            Ok(milestone) => milestone,
            Err(e) => {
                log::error!("Failed to read last milestone from db: {}", e);
                None
            }
        };

        if let Some(m) = milestone {
            log::info!("Restored whitelisted milestone {} ({})", m.number, m.hash.short());
        }

        FinalityTracker { db, milestone }
    }
}

impl<D: Database> Finality for FinalityTracker<D> {
    fn is_valid_chain(&self, current: &SealedHeader, chain: &[SealedHeader]) -> Result<bool> {
        if chain.is_empty() {
            return Ok(false);
        }
        Ok(is_valid_chain(current, chain, self.milestone))
    }

    fn process(&mut self, number: u64, hash: BlockHash) {
        let milestone = Milestone::new(number, hash);
        self.milestone = Some(milestone);

        if let Err(e) = db::write_last_milestone(self.db.as_ref(), milestone) {
            log::error!("Error in writing milestone to db: {}", e);
        }
    }

    fn whitelisted(&self) -> Option<Milestone> {
        self.milestone
    }

    fn purge(&mut self) {
        self.milestone = None;

        if let Err(e) = db::delete_last_milestone(self.db.as_ref()) {
            log::error!("Error in removing milestone from db: {}", e);
        }
    }
}

/// Baseline chain rule against a single milestone. `chain` must not be empty.
pub fn is_valid_chain(
    current: &SealedHeader,
    chain: &[SealedHeader],
    milestone: Option<Milestone>,
) -> bool {
    // Nothing whitelisted yet, nothing to compare against
    let Some(milestone) = milestone else {
        return true;
    };
    let Some(tip) = chain.last() else {
        return false;
    };

    let current = current.number();

    // The chain ends before the milestone: only acceptable while we are behind it too
    if tip.number() < milestone.number {
        return current < milestone.number;
    }

    let (past, _) = split_chain(current, chain);
    for header in past.iter().rev() {
        if header.number() == milestone.number {
            return header.hash() == milestone.hash;
        }
    }

    true
}

/// Splits `chain` into the part at or below `current` and the part above it.
pub fn split_chain(current: u64, chain: &[SealedHeader]) -> (&[SealedHeader], &[SealedHeader]) {
    let at = chain.partition_point(|header| header.number() <= current);
    chain.split_at(at)
}

/// Asks the peer for the whitelisted block and compares it with ours.
///
/// Called without the whitelist lock held: the milestone is a snapshot.
pub fn is_valid_peer(fetcher: &dyn HeaderFetcher, milestone: Option<Milestone>) -> Result<bool> {
    let Some(milestone) = milestone else {
        return Ok(true);
    };

    let headers = fetcher
        .fetch_headers_by_number(milestone.number, 1, 0, false)
        .map_err(|e| WhitelistError::NoRemote {
            number: milestone.number,
            reason: e.to_string(),
        })?;

    let Some(header) = headers.first() else {
        return Err(WhitelistError::NoRemote {
            number: milestone.number,
            reason: "empty response".to_string(),
        });
    };

    if header.number() == milestone.number && header.hash() == milestone.hash {
        return Ok(true);
    }

    Err(WhitelistError::Mismatch {
        number: header.number(),
        expected: milestone.hash,
        got: header.hash(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryDB;
    use crate::test_utils::chain;
    use anyhow::anyhow;

    #[test]
    fn anything_goes_without_milestone() {
        let local = chain(0, 20, 0);
        let remote = chain(5, 30, 1);
        assert!(is_valid_chain(&local[20], &remote, None));
    }

    #[test]
    fn chain_must_match_milestone_hash() {
        let local = chain(0, 20, 0);
        let milestone = Milestone::new(10, local[10].hash());

        assert!(is_valid_chain(&local[20], &chain(0, 25, 0), Some(milestone)));
        assert!(!is_valid_chain(&local[20], &chain(0, 25, 1), Some(milestone)));
        // starts past the milestone: nothing to compare
        assert!(is_valid_chain(&local[20], &chain(11, 25, 1), Some(milestone)));
    }

    #[test]
    fn short_chain_only_valid_while_behind_milestone() {
        let local = chain(0, 20, 0);
        let milestone = Milestone::new(15, BlockHash([1; 32]));

        assert!(is_valid_chain(&local[10], &chain(0, 12, 1), Some(milestone)));
        assert!(!is_valid_chain(&local[20], &chain(0, 12, 1), Some(milestone)));
    }

    #[test]
    fn future_part_of_chain_is_not_compared() {
        let local = chain(0, 20, 0);
        // milestone ahead of our head; the block at 25 is above current and is skipped
        let milestone = Milestone::new(25, BlockHash([1; 32]));
        assert!(is_valid_chain(&local[20], &chain(0, 30, 1), Some(milestone)));
    }

    #[test]
    fn split_chain_at_current() {
        let c = chain(5, 10, 0);
        let (past, future) = split_chain(7, &c);
        assert_eq!(past.len(), 3);
        assert_eq!(future.len(), 3);
        assert_eq!(future[0].number(), 8);

        let (past, future) = split_chain(100, &c);
        assert_eq!((past.len(), future.len()), (6, 0));
    }

    #[test]
    fn tracker_persists_and_purges() {
        let db = Arc::new(MemoryDB::default());
        let mut tracker = FinalityTracker::new(db.clone());
        assert_eq!(tracker.whitelisted(), None);

        tracker.process(12, BlockHash([2; 32]));
        let restored = FinalityTracker::new(db.clone());
        assert_eq!(
            restored.whitelisted(),
            Some(Milestone::new(12, BlockHash([2; 32])))
        );

        tracker.purge();
        assert_eq!(FinalityTracker::new(db).whitelisted(), None);
    }

    #[test]
    fn tracker_rejects_empty_chain() {
        let tracker = FinalityTracker::new(Arc::new(MemoryDB::default()));
        let local = chain(0, 1, 0);
        assert!(!tracker.is_valid_chain(&local[1], &[]).unwrap());
    }

    #[test]
    fn peer_validation() {
        let local = chain(0, 20, 0);
        let milestone = Milestone::new(10, local[10].hash());

        let honest = |number: u64, _: usize, _: usize, _: bool| -> anyhow::Result<Vec<SealedHeader>> {
            Ok(vec![local[number as usize].clone()])
        };
        assert!(is_valid_peer(&honest, Some(milestone)).unwrap());
        assert!(is_valid_peer(&honest, None).unwrap());

        let forked = chain(0, 20, 1);
        let liar = |number: u64, _: usize, _: usize, _: bool| -> anyhow::Result<Vec<SealedHeader>> {
            Ok(vec![forked[number as usize].clone()])
        };
        assert!(matches!(
            is_valid_peer(&liar, Some(milestone)),
            Err(WhitelistError::Mismatch { number: 10, .. })
        ));

        let silent = |_: u64, _: usize, _: usize, _: bool| -> anyhow::Result<Vec<SealedHeader>> {
            Ok(vec![])
        };
        assert!(matches!(
            is_valid_peer(&silent, Some(milestone)),
            Err(WhitelistError::NoRemote { number: 10, .. })
        ));

        let broken = |_: u64, _: usize, _: usize, _: bool| -> anyhow::Result<Vec<SealedHeader>> {
            Err(anyhow!("connection reset"))
        };
        match is_valid_peer(&broken, Some(milestone)) {
            Err(WhitelistError::NoRemote { reason, .. }) => assert!(reason.contains("reset")),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
