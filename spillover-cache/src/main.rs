use anyhow::Result;
use clap::Parser;
use spillover_cache::config::LoggingConfig;
use spillover_cache::{SpilloverCache, SpilloverConfig};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "spillover-cache")]
#[command(about = "Fill a spillover cache past its capacity and drain it again", long_about = None)]
struct Args {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// In-memory capacity (overrides the config file)
    #[arg(long)]
    capacity: Option<usize>,

    /// Store directory (overrides the config file)
    #[arg(short, long)]
    directory: Option<PathBuf>,

    /// Number of keys to insert
    #[arg(short = 'n', long, default_value = "15")]
    count: usize,
}

fn init_logging(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    if logging.format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => SpilloverConfig::from_file(path)?,
        None => SpilloverConfig::default(),
    };
    init_logging(&config.logging);

    let mut cache_config = config.to_cache_config();
    if let Some(capacity) = args.capacity {
        cache_config.capacity = capacity;
    }
    if let Some(directory) = args.directory {
        cache_config.directory = directory;
    }

    let cache: SpilloverCache<String> = SpilloverCache::with_config(cache_config)?;
    info!(
        "Cache with in-memory capacity {} created",
        cache.capacity()
    );

    let mut keys = Vec::with_capacity(args.count);
    let mut key = String::from("1");
    for _ in 0..args.count {
        key.push('1');
        cache.set(&key, key.clone())?;
        info!("Added key of length {}, tier: {:?}", key.len(), cache.tier());
        keys.push(key.clone());
    }

    while let Some(key) = keys.pop() {
        if cache.len()? <= cache.capacity() {
            break;
        }
        cache.delete(&key)?;
        info!("Removed key of length {}, tier: {:?}", key.len(), cache.tier());
    }

    let stats = cache.stats();
    info!(
        "Done: {} sets, {} deletes, {} spills, {} reloads",
        stats.sets, stats.deletes, stats.spills, stats.reloads
    );
    Ok(())
}
