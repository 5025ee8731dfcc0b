//! Higher-timeframe mirror: an independent pipeline whose output reaches
//! the primary snapshot only through a close-time-gated pending record.

use crate::{
    config::EngineConfig,
    domain::{Candle, Timeframe},
    error::EngineResult,
    models::{Direction, MirrorSnapshot, Scope, Snapshot},
};

use super::core::StructureEngine;

pub struct MirrorEngine {
    timeframe: Timeframe,
    engine: StructureEngine,
    pending: Option<MirrorSnapshot>,
}

impl MirrorEngine {
    pub fn new(timeframe: Timeframe, config: EngineConfig) -> EngineResult<Self> {
        Ok(Self {
            timeframe,
            engine: StructureEngine::new(config)?,
            pending: None,
        })
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    /// Processes one closed mirror bar and folds its result into the
    /// pending record: pulses OR-combine across unpublished bars, the
    /// persistent fields and close-time tag always reflect the newest bar.
    pub fn on_bar(&mut self, candle: &Candle, smoothed_range: Option<f64>) {
        let snap = self.engine.process_bar(candle, smoothed_range);
        let mut record = self.to_mirror_snapshot(&snap);

        if let Some(prev) = self.pending.take() {
            record.pulses.merge(&prev.pulses);
        }
        self.pending = Some(record);
    }

    /// Releases the pending record once the primary close time catches up.
    pub fn take_published(&mut self, primary_close_time_ms: i64) -> Option<MirrorSnapshot> {
        match &self.pending {
            Some(p) if primary_close_time_ms >= p.close_time_ms => self.pending.take(),
            _ => None,
        }
    }

    fn to_mirror_snapshot(&self, snap: &Snapshot) -> MirrorSnapshot {
        MirrorSnapshot {
            timeframe: self.timeframe,
            close_time_ms: snap.close_time_ms,
            external_direction: snap.external_direction,
            internal_direction: snap.internal_direction,
            external_swings: snap.external_swings,
            internal_swings: snap.internal_swings,
            bars_since_swing: snap.bars_since_swing,
            pulses: snap.pulses,
            has_active_bull_ob: self
                .engine
                .order_blocks()
                .has_active(Scope::External, Direction::Bullish),
            has_active_bear_ob: self
                .engine
                .order_blocks()
                .has_active(Scope::External, Direction::Bearish),
            has_active_bull_fvg: self.engine.fvgs().has_active(Direction::Bullish),
            has_active_bear_fvg: self.engine.fvgs().has_active(Direction::Bearish),
            in_premium: snap.in_premium,
            in_discount: snap.in_discount,
        }
    }
}
