//! Top-level entry point: the primary pipeline plus one mirror per
//! configured higher timeframe.

use crate::{
    config::EngineConfig,
    domain::{Candle, Timeframe},
    error::EngineResult,
    models::Snapshot,
};

use super::{core::StructureEngine, mirror::MirrorEngine};

pub struct MarketAnalyzer {
    primary: StructureEngine,
    mirrors: Vec<MirrorEngine>,
}

impl MarketAnalyzer {
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;

        let mirrors = config
            .mirrors
            .iter()
            .map(|tf| MirrorEngine::new(*tf, config.clone()))
            .collect::<EngineResult<Vec<_>>>()?;

        log::info!(
            "analyzer ready: ext window {}, int window {}, {} mirror(s)",
            config.swings.external_window,
            config.swings.internal_window,
            mirrors.len()
        );

        Ok(Self {
            primary: StructureEngine::new(config)?,
            mirrors,
        })
    }

    pub fn primary(&self) -> &StructureEngine {
        &self.primary
    }

    /// One closed primary bar: runs the full pipeline, then drains every
    /// mirror whose pending record's close time this bar has reached.
    pub fn on_primary_bar(&mut self, candle: &Candle, smoothed_range: Option<f64>) -> Snapshot {
        let mut snapshot = self.primary.process_bar(candle, smoothed_range);

        for mirror in &mut self.mirrors {
            if let Some(published) = mirror.take_published(snapshot.close_time_ms) {
                snapshot.mirrors.push(published);
            }
        }

        snapshot
    }

    /// One closed bar of a higher timeframe. Unconfigured timeframes are
    /// ignored with a warning rather than failing the feed.
    pub fn on_higher_bar(&mut self, timeframe: Timeframe, candle: &Candle, smoothed_range: Option<f64>) {
        match self
            .mirrors
            .iter_mut()
            .find(|m| m.timeframe() == timeframe)
        {
            Some(mirror) => mirror.on_bar(candle, smoothed_range),
            None => log::warn!("dropping bar for unconfigured mirror timeframe {timeframe}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(t_ms: i64, price: f64) -> Candle {
        Candle::new(t_ms, price, price + 1.0, price - 1.0, price + 0.5)
    }

    #[test]
    fn mirror_publication_respects_close_time() {
        let mut cfg = EngineConfig::default();
        cfg.mirrors = vec![Timeframe::M5];
        let mut analyzer = MarketAnalyzer::new(cfg).unwrap();

        // Mirror bar closes at t=300s; primary bars at 240s and 300s
        analyzer.on_higher_bar(Timeframe::M5, &bar(300_000, 100.0), Some(1.0));

        let early = analyzer.on_primary_bar(&bar(240_000, 100.0), Some(1.0));
        assert!(early.mirrors.is_empty());

        let caught_up = analyzer.on_primary_bar(&bar(300_000, 100.0), Some(1.0));
        assert_eq!(caught_up.mirrors.len(), 1);
        assert_eq!(caught_up.mirrors[0].timeframe, Timeframe::M5);
    }
}
