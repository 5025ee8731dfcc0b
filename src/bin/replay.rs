//! Feeds a cached candle file through the analyzer and logs what fires.
//! Stand-in for the downstream exporter.

use {
    anyhow::{Context, Result},
    clap::Parser,
    serde::Deserialize,
    std::fs,
    structure_sniper::{
        Candle, Cli, EngineConfig, MarketAnalyzer, Snapshot, Timeframe,
        config::TickSize,
        utils::epoch_ms_to_utc,
    },
};

#[derive(Debug, Deserialize)]
struct CachedBar {
    close_time_ms: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    smoothed_range: Option<f64>,
}

/// Rolls primary bars up into one higher timeframe's candles.
struct BarAggregator {
    timeframe: Timeframe,
    partial: Option<Candle>,
}

impl BarAggregator {
    fn new(timeframe: Timeframe) -> Self {
        Self {
            timeframe,
            partial: None,
        }
    }

    /// Folds one primary bar in; returns the completed higher-timeframe
    /// candle when this bar lands on the interval boundary.
    fn fold(&mut self, bar: &Candle) -> Option<Candle> {
        match self.partial.as_mut() {
            Some(p) => {
                if bar.high_price > p.high_price {
                    p.high_price = bar.high_price;
                }
                if bar.low_price < p.low_price {
                    p.low_price = bar.low_price;
                }
                p.close_price = bar.close_price;
                p.close_time_ms = bar.close_time_ms;
            }
            None => self.partial = Some(*bar),
        }

        let boundary = self
            .partial
            .is_some_and(|p| p.close_time_ms % self.timeframe.interval_ms() == 0);
        if boundary { self.partial.take() } else { None }
    }
}

fn log_snapshot(snap: &Snapshot) {
    if snap.pulses.any() {
        log::info!(
            "{} pulses: {:?}",
            epoch_ms_to_utc(snap.close_time_ms),
            snap.pulses
        );
    }
    for mirror in &snap.mirrors {
        if mirror.pulses.any() {
            log::info!(
                "{} {} pulses: {:?}",
                epoch_ms_to_utc(mirror.close_time_ms),
                mirror.timeframe,
                mirror.pulses
            );
        }
    }
}

fn main() -> Result<()> {
    let (global_level, my_code_level) = if cfg!(debug_assertions) {
        (log::LevelFilter::Warn, log::LevelFilter::Debug)
    } else {
        (log::LevelFilter::Warn, log::LevelFilter::Info)
    };

    let mut builder = env_logger::Builder::new();
    builder
        .filter(None, global_level)
        .filter(Some("structure_sniper"), my_code_level)
        .filter(Some("replay"), my_code_level)
        .init();

    let args = Cli::parse();

    let raw = fs::read_to_string(&args.cache)
        .with_context(|| format!("reading candle cache {}", args.cache.display()))?;
    let cached: Vec<CachedBar> = serde_json::from_str(&raw).context("parsing candle cache")?;

    let mut config = EngineConfig::default();
    config.tick_size = TickSize::new(args.tick_size);
    config.mirrors = args.mirrors.clone();

    let mut analyzer = MarketAnalyzer::new(config)?;
    let mut aggregators: Vec<BarAggregator> =
        args.mirrors.iter().map(|tf| BarAggregator::new(*tf)).collect();

    log::info!("replaying {} bars from {}", cached.len(), args.cache.display());

    for raw_bar in &cached {
        let candle = Candle::new(
            raw_bar.close_time_ms,
            raw_bar.open,
            raw_bar.high,
            raw_bar.low,
            raw_bar.close,
        );

        // Completed mirror bars go in first so a mirror bar closing at the
        // same time as this primary bar publishes on it, not later.
        for agg in &mut aggregators {
            if let Some(higher) = agg.fold(&candle) {
                analyzer.on_higher_bar(agg.timeframe, &higher, None);
            }
        }

        let snapshot = analyzer.on_primary_bar(&candle, raw_bar.smoothed_range);
        log_snapshot(&snapshot);
    }

    Ok(())
}
