use Astram_config::config::Config;
use Astram_whitelist::{
    BlockHash, Enqueue, InMemoryMetrics, NodeWhitelist, RocksDB, WhitelistSettings,
};
use anyhow::{Context, Result};
use std::sync::Arc;

#[derive(clap::Subcommand)]
pub enum Commands {
    /// Show the whitelisted milestone, the vote lock and the future queue
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Record a finalized milestone
    Process { number: u64, hash: String },

    /// Queue a milestone for a block the node has not reached yet
    Future { number: u64, hash: String },

    /// Release the vote lock if it is at or below the given block
    UnlockSprint { number: u64 },

    /// Withdraw a single vote from the current lock
    RemoveVote { id: String },

    /// Forget the whitelisted milestone
    Purge,

    /// Manage CLI configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
pub enum ConfigCommands {
    View,
    Set { key: String, value: String },
    Init,
}

fn parse_hash(hash: &str) -> Result<BlockHash> {
    hash.parse::<BlockHash>()
        .with_context(|| format!("invalid block hash {}", hash))
}

fn open_whitelist(
    data_dir: Option<String>,
) -> Result<(NodeWhitelist<RocksDB>, Arc<InMemoryMetrics>)> {
    let mut cfg = Config::load()?;
    if let Some(dir) = data_dir {
        cfg.data_dir = dir;
    }
    let path = cfg.data_dir_resolved();

    let db = RocksDB::open(&path)
        .with_context(|| format!("failed to open milestone database at {}", path.display()))?;
    let metrics = Arc::new(InMemoryMetrics::default());
    let settings = WhitelistSettings {
        milestone_enabled: cfg.milestone_enabled,
        max_future_capacity: cfg.future_milestone_capacity,
    };

    let whitelist = NodeWhitelist::open(Arc::new(db), metrics.clone(), settings);
    Ok((whitelist, metrics))
}

pub fn run(data_dir: Option<String>, command: Commands) -> Result<()> {
    let (whitelist, metrics) = open_whitelist(data_dir)?;

    match command {
        Commands::Status { json: true } => {
            let status = serde_json::json!({
                "milestone": whitelist.get_whitelisted_milestone(),
                "lock": whitelist.lock_state(),
                "future": whitelist.future_milestones(),
                "enabled": whitelist.milestone_enabled(),
            });
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::Status { json: false } => {
            match whitelist.get_whitelisted_milestone() {
                Some(m) => println!("📍 Whitelisted milestone: {} {}", m.number, m.hash),
                None => println!("📍 Whitelisted milestone: none"),
            }

            let lock = whitelist.lock_state();
            println!(
                "🔒 Vote lock: {} at {} {}",
                if lock.locked { "held" } else { "free" },
                lock.number,
                lock.hash
            );
            for id in &lock.ids {
                println!("   vote {}", id);
            }

            let future = whitelist.future_milestones();
            println!("⏳ Future milestones: {}", future.len());
            for m in future {
                println!("   {} {}", m.number, m.hash);
            }

            println!(
                "⚙️  Enforcement: {}",
                if whitelist.milestone_enabled() { "on" } else { "off" }
            );
        }
        Commands::Process { number, hash } => {
            whitelist.process(number, parse_hash(&hash)?);
            println!("✅ Milestone {} whitelisted", number);
        }
        Commands::Future { number, hash } => {
            match whitelist.process_future_milestone(number, parse_hash(&hash)?) {
                Enqueue::Added => println!("✅ Future milestone {} queued", number),
                Enqueue::Duplicate => println!("Future milestone {} already queued", number),
                Enqueue::Full => println!("❌ Future milestone queue is full, {} dropped", number),
            }
        }
        Commands::UnlockSprint { number } => {
            whitelist.unlock_sprint(number);
            let lock = whitelist.lock_state();
            println!(
                "🔒 Vote lock at {} is {}",
                lock.number,
                if lock.locked { "still held" } else { "free" }
            );
        }
        Commands::RemoveVote { id } => {
            whitelist.remove_milestone_id(&id);
            println!("✅ Vote {} removed, {} left", id, whitelist.get_milestone_ids_list().len());
        }
        Commands::Purge => {
            whitelist.purge_whitelisted_milestone();
            println!("✅ Whitelisted milestone purged");
        }
        Commands::Config { .. } => unreachable!("config commands are handled in main"),
    }

    for (name, value) in metrics.snapshot() {
        log::debug!("{} = {:?}", name, value);
    }

    Ok(())
}
