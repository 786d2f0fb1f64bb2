//! storewatch-ls: list the keys of a configured store.
//!
//! Opens the store described by the configuration (see [`Config::load`]) and
//! prints every key under an optional prefix, one per line.
//!
//! ```text
//! storewatch-ls [--config <file>] [prefix]
//! ```

use clap::Parser;
use futures::TryStreamExt;
use tracing::info;

use storewatch::config::Config;
use storewatch::storage::init_store;
use storewatch::utils::bootstrap::init_tracing;

#[derive(Debug, Parser)]
#[command(name = "storewatch-ls", about = "List the keys of a configured store", version)]
struct Cli {
    /// Configuration file, layered over storewatch.yaml
    #[arg(short, long)]
    config: Option<String>,

    /// Only list keys starting with this prefix
    prefix: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing();

    let config = Config::load(cli.config.as_deref())?;
    let store = init_store(&config.storage)?;
    store.ensure_open().await?;

    let prefix = cli.prefix.unwrap_or_default();
    let mut keys = store.list_prefix(&prefix);
    let mut listed = 0usize;
    while let Some(key) = keys.try_next().await? {
        println!("{key}");
        listed += 1;
    }

    info!(store = %store, listed, "Listing complete");
    Ok(())
}
