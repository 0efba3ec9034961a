use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// xym-extract: decode a Symbol block store and replay it into a chain-state snapshot.
#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    /// Only log warnings and errors (unless RUST_LOG is set).
    #[arg(long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Decode block and statement files and write records plus a state snapshot.
    Extract(ExtractArgs),
    /// Print the balance history of one address as JSON.
    Balance(BalanceArgs),
    /// Print the node/harvester delegation graph at a height as JSON.
    Harvesters(HarvestersArgs),
    /// Print harvest-count bubbles over a height range as JSON.
    Bubbles(BubblesArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    /// Data directory searched recursively for block and statement files.
    #[arg(long, env = "XYM_INPUT")]
    pub input: PathBuf,

    /// Directory receiving record streams and the snapshot.
    #[arg(long, default_value = ".", env = "XYM_OUTPUT")]
    pub output: PathBuf,

    /// Extension of block files (`NNNNN.dat`).
    #[arg(long, default_value = ".dat")]
    pub block_extension: String,

    /// Extension of statement files (`NNNNN.stmt`).
    #[arg(long, default_value = ".stmt")]
    pub statement_extension: String,

    /// Bytes skipped at the start of every store file.
    #[arg(long, default_value = "800")]
    pub db_offset_bytes: usize,

    /// Keep per-block transaction hash lists.
    #[arg(long)]
    pub save_tx_hashes: bool,

    /// Keep per-block sub-cache merkle roots.
    #[arg(long)]
    pub save_subcache_merkle_roots: bool,

    /// Merge blocks as they are read instead of buffering them all.
    #[arg(long)]
    pub stream: bool,

    /// Maximum block files decoded concurrently in batch mode.
    #[arg(long, default_value = "4")]
    pub decode_concurrency: usize,

    /// Also write one JSON summary line per block.
    #[arg(long)]
    pub write_summaries: bool,
}

#[derive(Args, Debug, Clone)]
pub struct BalanceArgs {
    /// State snapshot written by `extract`.
    #[arg(long, default_value = "state_map.bin", env = "XYM_SNAPSHOT")]
    pub snapshot: PathBuf,

    /// Account address in its 39-character form.
    #[arg(long)]
    pub address: String,
}

#[derive(Args, Debug, Clone)]
pub struct HarvestersArgs {
    #[arg(long, default_value = "state_map.bin", env = "XYM_SNAPSHOT")]
    pub snapshot: PathBuf,

    /// Height to evaluate links and balances at (default: chain tip).
    #[arg(long)]
    pub height: Option<u64>,

    /// Minimum harvester balance in whole XYM.
    #[arg(long, default_value = "10000")]
    pub min_harvester_size: f64,

    /// Minimum total delegated balance for a node, in whole XYM.
    #[arg(long, default_value = "10000")]
    pub min_node_size: f64,

    /// Include accounts that harvested without a node link.
    #[arg(long)]
    pub track_remote: bool,
}

#[derive(Args, Debug, Clone)]
pub struct BubblesArgs {
    #[arg(long, default_value = "state_map.bin", env = "XYM_SNAPSHOT")]
    pub snapshot: PathBuf,

    #[arg(long, default_value = "0")]
    pub min_height: u64,

    /// Default: chain tip.
    #[arg(long)]
    pub max_height: Option<u64>,

    /// Minimum harvested blocks for a node bubble.
    #[arg(long, default_value = "1")]
    pub min_harvester_size: usize,

    /// Minimum delegated blocks for a delegate bubble.
    #[arg(long, default_value = "1")]
    pub min_delegate_size: usize,
}
