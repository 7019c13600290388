use Astram_whitelist::{
    BlockHash, BlockHeader, Enqueue, InMemoryMetrics, MetricGauge, Milestone, MilestoneWhitelist,
    NodeWhitelist, RocksDB, SealedHeader, WhitelistSettings,
};
use std::path::Path;
use std::sync::Arc;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn chain(to: u64, salt: u8) -> Vec<SealedHeader> {
    let mut parent = BlockHash::ZERO;
    (0..=to)
        .map(|number| {
            let header = SealedHeader::seal(BlockHeader {
                number,
                parent_hash: parent,
                timestamp: 1_700_000_000 + number as i64,
                extra: vec![salt],
            })
            .unwrap();
            parent = header.hash();
            header
        })
        .collect()
}

fn open(path: &Path, capacity: usize) -> (NodeWhitelist<RocksDB>, Arc<InMemoryMetrics>) {
    let db = Arc::new(RocksDB::open(path).unwrap());
    let metrics = Arc::new(InMemoryMetrics::default());
    let settings = WhitelistSettings {
        milestone_enabled: true,
        max_future_capacity: capacity,
    };
    (MilestoneWhitelist::open(db, metrics.clone(), settings), metrics)
}

#[test]
fn vote_lock_survives_restart() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let ours = chain(160, 0);
    let theirs = chain(160, 1);

    {
        let (whitelist, _) = open(dir.path(), 5);
        let guard = whitelist.lock_mutex(100);
        assert!(guard.accepted());
        guard.unlock_mutex(true, "vote-1", ours[100].hash());

        assert!(!whitelist.is_valid_chain(&ours[80], &theirs[..=150]).unwrap().0);
    }

    let (whitelist, metrics) = open(dir.path(), 5);
    assert_eq!(whitelist.get_milestone_ids_list(), vec!["vote-1"]);
    assert_eq!(metrics.gauge(MetricGauge::MilestoneIdsLength), Some(1));

    assert_eq!(
        whitelist.is_valid_chain(&ours[80], &ours[..=150]).unwrap(),
        (true, false)
    );
    assert!(!whitelist.is_valid_chain(&ours[80], &theirs[..=150]).unwrap().0);
    assert!(!whitelist.is_valid_chain(&ours[80], &ours[..=90]).unwrap().0);

    // finality on the locked block releases the lock for good
    whitelist.process(100, ours[100].hash());
    drop(whitelist);

    let (whitelist, _) = open(dir.path(), 5);
    assert!(!whitelist.lock_state().locked);
    assert_eq!(
        whitelist.get_whitelisted_milestone(),
        Some(Milestone::new(100, ours[100].hash()))
    );
}

#[test]
fn future_queue_survives_restart_and_drains() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let cc = BlockHash([0xcc; 32]);

    {
        let (whitelist, _) = open(dir.path(), 5);
        assert_eq!(whitelist.process_future_milestone(200, cc), Enqueue::Added);
        whitelist.process(150, BlockHash([1; 32]));
    }

    let (whitelist, _) = open(dir.path(), 5);
    assert_eq!(whitelist.future_milestones(), vec![Milestone::new(200, cc)]);

    whitelist.process(200, BlockHash([2; 32]));
    drop(whitelist);

    let (whitelist, _) = open(dir.path(), 5);
    assert!(whitelist.future_milestones().is_empty());
}

#[test]
fn capacity_drops_late_milestones() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let (whitelist, _) = open(dir.path(), 2);

    whitelist.process_future_milestone(10, BlockHash([0xa; 32]));
    whitelist.process_future_milestone(20, BlockHash([0xb; 32]));
    assert_eq!(
        whitelist.process_future_milestone(30, BlockHash([0xc; 32])),
        Enqueue::Full
    );
    drop(whitelist);

    let (whitelist, _) = open(dir.path(), 2);
    assert_eq!(
        whitelist.future_milestones(),
        vec![
            Milestone::new(10, BlockHash([0xa; 32])),
            Milestone::new(20, BlockHash([0xb; 32]))
        ]
    );
}
