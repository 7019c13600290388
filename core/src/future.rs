use crate::block::{BlockHash, Milestone, SealedHeader};
use crate::db::FutureRecord;
use std::collections::BTreeMap;

/// Outcome of [`FutureMilestones::enqueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueue {
    Added,
    /// The number is already queued; the queue is unchanged.
    Duplicate,
    /// The queue is at capacity; the milestone was dropped.
    Full,
}

/// Bounded queue of milestones for blocks we have not reached yet, ascending by number.
#[derive(Debug, Clone)]
pub struct FutureMilestones {
    list: BTreeMap<u64, BlockHash>,
    max_capacity: usize,
}

impl FutureMilestones {
    pub fn new(max_capacity: usize) -> Self {
        FutureMilestones {
            list: BTreeMap::new(),
            max_capacity,
        }
    }

    /// Rebuilds the queue from its persisted form.
    ///
    /// `list` is authoritative: an `order` that disagrees with it is ignored. Entries beyond
    /// `max_capacity` are dropped from the top.
    pub fn from_record(record: FutureRecord, max_capacity: usize) -> Self {
        let list: BTreeMap<u64, BlockHash> = record.list.iter().copied().collect();

        if record.order.len() != list.len() || !record.order.iter().eq(list.keys()) {
            log::warn!(
                "Future milestone order {:?} disagrees with list, rebuilding from list",
                record.order
            );
        }

        let mut queue = FutureMilestones { list, max_capacity };
        while queue.list.len() > max_capacity {
            if let Some((number, _)) = queue.list.pop_last() {
                log::warn!(
                    "Dropping future milestone {} restored beyond capacity {}",
                    number,
                    max_capacity
                );
            }
        }
        queue
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    pub fn get(&self, number: u64) -> Option<BlockHash> {
        self.list.get(&number).copied()
    }

    pub fn list(&self) -> &BTreeMap<u64, BlockHash> {
        &self.list
    }

    pub fn to_vec(&self) -> Vec<Milestone> {
        self.list
            .iter()
            .map(|(number, hash)| Milestone::new(*number, *hash))
            .collect()
    }

    /// Queues a milestone unless the number is already present or the queue is full.
    /// Existing entries are never evicted.
    pub fn enqueue(&mut self, number: u64, hash: BlockHash) -> Enqueue {
        if self.list.len() >= self.max_capacity {
            return Enqueue::Full;
        }
        if self.list.contains_key(&number) {
            return Enqueue::Duplicate;
        }
        self.list.insert(number, hash);
        Enqueue::Added
    }

    /// Removes every entry at or below `number`, returning how many were removed.
    pub fn dequeue_through(&mut self, number: u64) -> usize {
        let mut removed = 0;
        while let Some(entry) = self.list.first_entry() {
            if *entry.key() > number {
                break;
            }
            entry.remove();
            removed += 1;
        }
        removed
    }

    /// Checks `chain` against the highest queued milestone at or below its tip.
    ///
    /// Returns `(compatible, skip_difficulty_check)`. Only that one milestone is
    /// consulted; when the chain does not contain its block, no constraint applies.
    pub fn is_compatible(&self, chain: &[SealedHeader]) -> (bool, bool) {
        let Some(tip) = chain.last() else {
            return (true, false);
        };

        let Some((&number, &hash)) = self.list.range(..=tip.number()).next_back() else {
            return (true, false);
        };

        match chain.iter().rev().find(|header| header.number() == number) {
            Some(header) if header.hash() == hash => (true, true),
            Some(_) => (false, false),
            None => (true, false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::chain;

    fn hash(byte: u8) -> BlockHash {
        BlockHash([byte; 32])
    }

    #[test]
    fn capacity_bounds_the_queue() {
        let mut queue = FutureMilestones::new(2);

        assert_eq!(queue.enqueue(10, hash(1)), Enqueue::Added);
        assert_eq!(queue.enqueue(20, hash(2)), Enqueue::Added);
        assert_eq!(queue.enqueue(30, hash(3)), Enqueue::Full);

        assert_eq!(
            queue.to_vec(),
            vec![Milestone::new(10, hash(1)), Milestone::new(20, hash(2))]
        );
    }

    #[test]
    fn enqueue_is_idempotent_per_number() {
        let mut queue = FutureMilestones::new(5);

        assert_eq!(queue.enqueue(10, hash(1)), Enqueue::Added);
        assert_eq!(queue.enqueue(10, hash(9)), Enqueue::Duplicate);

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.get(10), Some(hash(1)));
    }

    #[test]
    fn out_of_order_numbers_stay_sorted() {
        let mut queue = FutureMilestones::new(5);
        queue.enqueue(30, hash(3));
        queue.enqueue(10, hash(1));
        queue.enqueue(20, hash(2));

        let order: Vec<u64> = queue.list().keys().copied().collect();
        assert_eq!(order, vec![10, 20, 30]);
    }

    #[test]
    fn dequeue_removes_only_reached_entries() {
        let mut queue = FutureMilestones::new(5);
        queue.enqueue(10, hash(1));
        queue.enqueue(20, hash(2));
        queue.enqueue(30, hash(3));

        assert_eq!(queue.dequeue_through(5), 0);
        assert_eq!(queue.dequeue_through(20), 2);
        assert_eq!(queue.to_vec(), vec![Milestone::new(30, hash(3))]);
        assert_eq!(queue.dequeue_through(100), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn compatibility_uses_highest_entry_below_tip() {
        let good = chain(0, 40, 0);
        let bad = chain(0, 40, 1);

        let mut queue = FutureMilestones::new(5);
        queue.enqueue(20, good[20].hash());
        queue.enqueue(50, hash(5));

        assert_eq!(queue.is_compatible(&good), (true, true));
        assert_eq!(queue.is_compatible(&bad), (false, false));
        // tip below every entry
        assert_eq!(queue.is_compatible(&good[..15]), (true, false));
        // entry at or below tip but the block is not part of the chain
        assert_eq!(queue.is_compatible(&bad[25..]), (true, false));
        assert_eq!(FutureMilestones::new(5).is_compatible(&good), (true, false));
    }

    #[test]
    fn lower_entries_are_not_consulted() {
        let good = chain(0, 40, 0);
        let bad = chain(0, 40, 1);

        let mut queue = FutureMilestones::new(5);
        queue.enqueue(10, good[10].hash());
        queue.enqueue(30, hash(3));

        // block 30 is missing from the chain; the mismatch at 10 is never looked at
        let gap: Vec<SealedHeader> = bad[..=12].iter().chain(&bad[31..]).cloned().collect();
        assert_eq!(queue.is_compatible(&gap), (true, false));
    }

    #[test]
    fn record_is_repaired_and_bounded() {
        let record = FutureRecord {
            order: vec![30, 10],
            list: vec![(10, hash(1)), (20, hash(2)), (30, hash(3))],
        };

        let queue = FutureMilestones::from_record(record, 2);
        assert_eq!(
            queue.to_vec(),
            vec![Milestone::new(10, hash(1)), Milestone::new(20, hash(2))]
        );
        assert_eq!(queue.max_capacity(), 2);
    }
}
