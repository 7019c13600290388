use super::{MilestoneWhitelist, State};
use crate::block::BlockHash;
use crate::db::Database;
use crate::finality::Finality;
use crate::lock::Reserve;
use parking_lot::RwLockWriteGuard;

/// Exclusive hold on the milestone state for the duration of a vote.
///
/// Returned by [`MilestoneWhitelist::lock_mutex`]. Nothing else can read or change the
/// whitelist until the guard is consumed by [`VoteGuard::unlock_mutex`] or dropped.
/// Dropping it is the same as `unlock_mutex(false, ..)`: the lock fields are written
/// through and nothing is committed.
#[must_use = "the whitelist stays locked until the guard is released"]
pub struct VoteGuard<'a, F: Finality, D: Database> {
    whitelist: &'a MilestoneWhitelist<F, D>,
    state: Option<RwLockWriteGuard<'a, State<F>>>,
    reserve: Reserve,
    end_block: u64,
}

impl<'a, F: Finality, D: Database> VoteGuard<'a, F, D> {
    pub(super) fn new(
        whitelist: &'a MilestoneWhitelist<F, D>,
        state: RwLockWriteGuard<'a, State<F>>,
        reserve: Reserve,
        end_block: u64,
    ) -> Self {
        VoteGuard {
            whitelist,
            state: Some(state),
            reserve,
            end_block,
        }
    }

    /// Whether `end_block` was reserved for this vote.
    pub fn accepted(&self) -> bool {
        self.reserve.is_accepted()
    }

    pub fn reserve(&self) -> Reserve {
        self.reserve
    }

    pub fn end_block(&self) -> u64 {
        self.end_block
    }

    /// Finishes the vote. With `do_lock` the reserved block is locked to
    /// `end_block_hash` and `milestone_id` joins the lock's votes.
    pub fn unlock_mutex(mut self, do_lock: bool, milestone_id: &str, end_block_hash: BlockHash) {
        self.release(do_lock, milestone_id, end_block_hash);
    }

    fn release(&mut self, do_lock: bool, milestone_id: &str, end_block_hash: BlockHash) {
        let Some(mut state) = self.state.take() else {
            return;
        };

        if do_lock {
            if self.reserve.is_accepted() {
                state.lock.commit(milestone_id, end_block_hash);
                log::info!(
                    "Locked milestone {} ({}) for vote {}",
                    self.end_block,
                    end_block_hash.short(),
                    milestone_id
                );
            } else {
                log::warn!(
                    "Ignoring commit of vote {} on {}: lock was not granted ({:?})",
                    milestone_id,
                    self.end_block,
                    self.reserve
                );
            }
        }

        self.whitelist.write_lock(&state.lock);
    }
}

impl<F: Finality, D: Database> Drop for VoteGuard<'_, F, D> {
    fn drop(&mut self) {
        if self.state.is_some() {
            log::warn!(
                "Vote lock on {} dropped without unlock, releasing",
                self.end_block
            );
            self.release(false, "", BlockHash::ZERO);
        }
    }
}
