#![allow(clippy::collapsible_if)]
#![allow(clippy::collapsible_else_if)]
#![allow(clippy::too_many_arguments)]

// Core modules
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod models;
pub mod utils;

// Re-export commonly used types outside of crate (for the replay binary)
pub use config::EngineConfig;
pub use domain::{Candle, Timeframe};
pub use engine::{MarketAnalyzer, StructureEngine};
pub use error::{EngineError, EngineResult};
pub use models::{MirrorSnapshot, Pulses, Snapshot};

// CLI argument parsing
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Candle cache file: a JSON array of closed bars
    #[arg(long, default_value = "data/candles.json")]
    pub cache: PathBuf,

    /// Instrument tick size
    #[arg(long, default_value_t = 0.01)]
    pub tick_size: f64,

    /// Higher timeframes to mirror (e.g. M5 M15)
    #[arg(long, value_delimiter = ',')]
    pub mirrors: Vec<Timeframe>,
}
