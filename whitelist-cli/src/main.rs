mod commands;

use clap::Parser;
use commands::*;

use Astram_config::config::Config;

#[derive(Parser)]
#[command(name = "Astram-whitelist")]
#[command(about = "Inspect and administer a node's milestone whitelist", long_about = None)]
struct Cli {
    /// Milestone database directory (defaults to data_dir from the config file)
    #[arg(long, global = true)]
    data_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Config { subcommand } => match subcommand {
            ConfigCommands::View => Config::load().and_then(|cfg| cfg.view()).map(|json| {
                println!("{}", json);
            }),
            ConfigCommands::Set { key, value } => Config::load().and_then(|mut cfg| {
                cfg.set_value(&key, &value)?;
                cfg.save()?;
                println!("✅ {} = {} set successfully.", key, value);
                Ok(())
            }),
            ConfigCommands::Init => Config::init_default().map(|path| {
                println!("Default configuration file has been created: {:?}", path);
            }),
        },
        command => run(cli.data_dir, command),
    };

    if let Err(e) = result {
        eprintln!("❌ {:#}", e);
        std::process::exit(1);
    }
}
