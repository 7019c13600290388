//! Milestone whitelist: decides whether a candidate chain may be adopted.
//!
//! One read/write lock guards the finality tracker, the vote lock and the future
//! milestone queue together. Validation takes it shared; vote locking, new milestones
//! and queue updates take it exclusive and write the touched records through to the
//! database before releasing it. Storage failures are logged, never returned: the
//! in-memory state stays authoritative for the life of the process.

use crate::block::{BlockHash, Milestone, SealedHeader};
use crate::db::{self, Database, LockRecord};
use crate::error::{Result, WhitelistError};
use crate::finality::{self, Finality, FinalityTracker, HeaderFetcher};
use crate::future::{Enqueue, FutureMilestones};
use crate::lock::{self, Reserve, VoteLock};
use crate::metrics::{MetricGauge, MetricMeter, Metrics};
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

mod guard;

pub use guard::VoteGuard;

/// Default number of future milestones kept in the queue.
pub const DEFAULT_FUTURE_CAPACITY: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WhitelistSettings {
    /// When off, every chain and peer is accepted without looking at milestones.
    pub milestone_enabled: bool,
    pub max_future_capacity: usize,
}

impl Default for WhitelistSettings {
    fn default() -> Self {
        WhitelistSettings {
            milestone_enabled: true,
            max_future_capacity: DEFAULT_FUTURE_CAPACITY,
        }
    }
}

pub(crate) struct State<F> {
    pub(crate) finality: F,
    pub(crate) lock: VoteLock,
    pub(crate) future: FutureMilestones,
}

pub struct MilestoneWhitelist<F, D> {
    state: RwLock<State<F>>,
    db: Arc<D>,
    metrics: Arc<dyn Metrics>,
    enabled: AtomicBool,
}

/// Whitelist over the database-backed [`FinalityTracker`], as run by a node.
pub type NodeWhitelist<D> = MilestoneWhitelist<FinalityTracker<D>, D>;

impl<D: Database> MilestoneWhitelist<FinalityTracker<D>, D> {
    /// Restores the tracker and the milestone state from `db`.
    pub fn open(db: Arc<D>, metrics: Arc<dyn Metrics>, settings: WhitelistSettings) -> Self {
        let tracker = FinalityTracker::new(db.clone());
        Self::new(tracker, db, metrics, settings)
    }
}

impl<F: Finality, D: Database> MilestoneWhitelist<F, D> {
    /// Builds the whitelist around `finality`, hydrating the lock fields and the
    /// future queue from `db`. Missing or unreadable records start empty.
    pub fn new(
        finality: F,
        db: Arc<D>,
        metrics: Arc<dyn Metrics>,
        settings: WhitelistSettings,
    ) -> Self {
        let lock = match db::read_lock_field(db.as_ref()) {
            Ok(Some(record)) => VoteLock::from_record(record),
            Ok(None) => VoteLock::default(),
            Err(e) => {
                log::error!("Error in reading lock data of milestone from db: {}", e);
                VoteLock::default()
            }
        };

        let future = match db::read_future_milestone_list(db.as_ref()) {
            Ok(Some(record)) => FutureMilestones::from_record(record, settings.max_future_capacity),
            Ok(None) => FutureMilestones::new(settings.max_future_capacity),
            Err(e) => {
                log::error!("Error in reading future milestone data from db: {}", e);
                FutureMilestones::new(settings.max_future_capacity)
            }
        };

        if let Some(milestone) = finality.whitelisted() {
            metrics.update(MetricGauge::LatestMilestone, milestone.number as i64);
        }
        metrics.update(MetricGauge::MilestoneIdsLength, lock.ids().len() as i64);

        log::info!(
            "Milestone whitelist ready: locked={} at {}, {} future milestones, enforcement {}",
            lock.is_locked(),
            lock.number(),
            future.len(),
            if settings.milestone_enabled { "on" } else { "off" }
        );

        MilestoneWhitelist {
            state: RwLock::new(State {
                finality,
                lock,
                future,
            }),
            db,
            metrics,
            enabled: AtomicBool::new(settings.milestone_enabled),
        }
    }

    pub fn milestone_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Turns milestone enforcement on or off for subsequent validation calls.
    pub fn set_milestone_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Checks `chain` against the local milestones.
    ///
    /// Returns `(valid, skip_difficulty_check)`. The second value is only set when the
    /// chain carries a queued future milestone with the right hash, in which case the
    /// caller does not need to compare total difficulty.
    pub fn is_valid_chain(
        &self,
        current: &SealedHeader,
        chain: &[SealedHeader],
    ) -> Result<(bool, bool)> {
        if !self.milestone_enabled() {
            return Ok((true, false));
        }

        let (Some(first), Some(last)) = (chain.first(), chain.last()) else {
            return Err(WhitelistError::EmptyChain);
        };

        log::debug!(
            "Validating chain {}..{} against milestones, current head {}",
            first.number(),
            last.number(),
            current.number()
        );

        let state = self.state.read();
        let result = Self::check_chain(&state, current, chain);

        let valid = matches!(result, Ok((true, _)));
        self.metrics
            .mark(MetricMeter::ValidChain, if valid { 1 } else { -1 });

        result
    }

    fn check_chain(
        state: &State<F>,
        current: &SealedHeader,
        chain: &[SealedHeader],
    ) -> Result<(bool, bool)> {
        if !state.finality.is_valid_chain(current, chain)? {
            log::debug!("Chain rejected by whitelisted milestone");
            return Ok((false, false));
        }

        if state.lock.is_locked()
            && !lock::is_reorg_allowed(chain, state.lock.number(), state.lock.hash())
        {
            log::debug!(
                "Chain rejected: reorg past locked milestone {} not allowed",
                state.lock.number()
            );
            return Ok((false, false));
        }

        let (compatible, skip) = state.future.is_compatible(chain);
        if !compatible {
            log::debug!("Chain rejected: conflicts with a future milestone");
            return Ok((false, skip));
        }

        Ok((true, skip))
    }

    /// Checks that the peer serves our whitelisted block before syncing from it.
    ///
    /// The whitelist lock is released before `fetcher` runs.
    pub fn is_valid_peer(&self, fetcher: &dyn HeaderFetcher) -> Result<bool> {
        if !self.milestone_enabled() {
            return Ok(true);
        }

        let milestone = self.state.read().finality.whitelisted();
        let result = finality::is_valid_peer(fetcher, milestone);

        let valid = matches!(result, Ok(true));
        self.metrics
            .mark(MetricMeter::ValidPeer, if valid { 1 } else { -1 });

        result
    }

    /// Accepts a new finalized milestone.
    pub fn process(&self, number: u64, hash: BlockHash) {
        let mut state = self.state.write();

        state.finality.process(number, hash);

        if state.future.dequeue_through(number) > 0 {
            self.write_future(&state.future);
        }

        self.metrics
            .update(MetricGauge::LatestMilestone, number as i64);

        if state.lock.unlock_sprint(number) {
            self.write_lock(&state.lock);
        }

        log::info!("Whitelisted milestone {} ({})", number, hash.short());
    }

    /// Takes the exclusive lock for a vote on `end_block` and keeps it in the returned
    /// guard until [`VoteGuard::unlock_mutex`] is called or the guard is dropped.
    ///
    /// Check [`VoteGuard::accepted`] before voting: a rejected guard still holds the lock
    /// but will not record a commit. Any other whitelist call made on the same thread
    /// while the guard is alive blocks forever.
    pub fn lock_mutex(&self, end_block: u64) -> VoteGuard<'_, F, D> {
        let mut state = self.state.write();

        let whitelisted = state.finality.whitelisted();
        let reserve = state.lock.reserve(end_block, whitelisted);

        if let Reserve::Accepted { released: true } = reserve {
            log::info!("Released superseded milestone lock for vote on {}", end_block);
            self.write_lock(&state.lock);
        }

        VoteGuard::new(self, state, reserve, end_block)
    }

    /// Releases the vote lock if `end_block` has reached it.
    pub fn unlock_sprint(&self, end_block: u64) {
        let mut state = self.state.write();
        if state.lock.unlock_sprint(end_block) {
            self.write_lock(&state.lock);
        }
    }

    /// Withdraws a single vote from the current lock.
    pub fn remove_milestone_id(&self, milestone_id: &str) {
        let mut state = self.state.write();
        if !state.lock.remove_id(milestone_id) {
            log::debug!("Milestone id {} was not part of the lock", milestone_id);
        }
        self.write_lock(&state.lock);
    }

    pub fn get_milestone_ids_list(&self) -> Vec<String> {
        self.state.read().lock.ids_sorted()
    }

    /// Queues a milestone for a block we have not reached yet.
    pub fn process_future_milestone(&self, number: u64, hash: BlockHash) -> Enqueue {
        let mut state = self.state.write();

        let outcome = state.future.enqueue(number, hash);
        match outcome {
            Enqueue::Added => {
                log::info!("Enqueued future milestone {} ({})", number, hash.short());
                self.write_future(&state.future);
                self.metrics
                    .update(MetricGauge::FutureMilestone, number as i64);
            }
            Enqueue::Duplicate => {
                log::info!("Future milestone {} already exists", number);
            }
            Enqueue::Full => {
                log::debug!(
                    "Future milestone queue full ({}), dropping {}",
                    state.future.max_capacity(),
                    number
                );
            }
        }
        outcome
    }

    pub fn is_future_milestone_compatible(&self, chain: &[SealedHeader]) -> (bool, bool) {
        self.state.read().future.is_compatible(chain)
    }

    pub fn get_whitelisted_milestone(&self) -> Option<Milestone> {
        self.state.read().finality.whitelisted()
    }

    pub fn purge_whitelisted_milestone(&self) {
        self.state.write().finality.purge();
        log::info!("Purged whitelisted milestone");
    }

    /// Current vote lock fields.
    pub fn lock_state(&self) -> LockRecord {
        self.state.read().lock.to_record()
    }

    /// Queued future milestones, ascending.
    pub fn future_milestones(&self) -> Vec<Milestone> {
        self.state.read().future.to_vec()
    }

    pub(crate) fn write_lock(&self, lock: &VoteLock) {
        if let Err(e) = db::write_lock_field(
            self.db.as_ref(),
            lock.is_locked(),
            lock.number(),
            lock.hash(),
            lock.ids(),
        ) {
            log::error!("Error in writing lock data of milestone to db: {}", e);
        }
        self.metrics
            .update(MetricGauge::MilestoneIdsLength, lock.ids().len() as i64);
    }

    fn write_future(&self, future: &FutureMilestones) {
        if let Err(e) = db::write_future_milestone_list(self.db.as_ref(), future.list()) {
            log::error!("Error in writing future milestone data to db: {}", e);
        }
    }
}
