pub mod block;
pub mod db;
pub mod error;
pub mod finality;
pub mod future;
pub mod lock;
pub mod metrics;
pub mod milestone;

// Explicit re-exports to avoid ambiguous glob re-exports
pub use block::{BlockHash, BlockHeader, Milestone, SealedHeader};
pub use db::{Database, MemoryDB, RocksDB};
pub use error::{StoreError, WhitelistError};
pub use finality::{Finality, FinalityTracker, HeaderFetcher};
pub use future::Enqueue;
pub use metrics::{InMemoryMetrics, MetricGauge, MetricMeter, Metrics, NoopMetrics};
pub use milestone::{MilestoneWhitelist, NodeWhitelist, VoteGuard, WhitelistSettings};
