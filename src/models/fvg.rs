//! Fair-value-gap pool: 3-bar imbalances above a configurable threshold,
//! with age-based expiry and one-shot first-retest pulses.

use {
    crate::{
        config::{EngineConfig, FvgThresholdMode, PriceLike, StopPrice},
        error::EngineResult,
        models::{
            bar_window::BarWindow,
            swing::{Direction, Scope},
            zone::{Zone, ZoneKind, ZoneRef, ZoneState},
        },
    },
    serde::{Deserialize, Serialize},
};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FvgPulses {
    pub retest_bull: bool,
    pub retest_bear: bool,
    pub stop_bull: Option<StopPrice>,
    pub stop_bear: Option<StopPrice>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FvgPool {
    zones: Vec<Zone>,
    // Running mean of absolute per-bar body move, for the adaptive threshold
    body_move_sum: f64,
    body_move_count: u64,
}

impl FvgPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn has_active(&self, direction: Direction) -> bool {
        self.zones
            .iter()
            .any(|z| z.direction == direction && z.is_active())
    }

    pub fn nearest_active(&self, price: f64) -> Option<ZoneRef> {
        self.zones
            .iter()
            .filter(|z| z.is_active())
            .min_by(|a, b| {
                a.distance_to(price)
                    .partial_cmp(&b.distance_to(price))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(ZoneRef::from)
    }

    /// Looks for a qualifying gap across the last three bars. Must run once
    /// per bar: it also feeds the adaptive-threshold running mean.
    pub fn detect(&mut self, bars: &BarWindow, cfg: &EngineConfig) -> EngineResult<bool> {
        if bars.bars() == 0 {
            return Ok(false);
        }

        let newest_move = bars.candle_ago(0)?.body_move_pct().abs();
        self.body_move_sum += newest_move;
        self.body_move_count += 1;

        if bars.bars() < 3 {
            return Ok(false);
        }

        let low0 = bars.low_ago(0)?.value();
        let high0 = bars.high_ago(0)?.value();
        let low2 = bars.low_ago(2)?.value();
        let high2 = bars.high_ago(2)?.value();
        let close1 = bars.close_ago(1)?.value();

        let (direction, top, bottom) = if low0 > high2 {
            (Direction::Bullish, low0, high2)
        } else if high0 < low2 {
            (Direction::Bearish, low2, high0)
        } else {
            return Ok(false);
        };

        if !self.passes_threshold(bars, direction, top - bottom, cfg)? {
            return Ok(false);
        }

        if cfg.fvg.require_middle_confirm {
            let confirmed = match direction {
                Direction::Bullish => close1 > high2,
                Direction::Bearish => close1 < low2,
            };
            if !confirmed {
                return Ok(false);
            }
        }

        let stop_offset = cfg.tick_size.ticks(cfg.fvg.stop_offset_ticks);
        let suggested_stop = match direction {
            Direction::Bullish => StopPrice::new(bottom - stop_offset),
            Direction::Bearish => StopPrice::new(top + stop_offset),
        };

        log::debug!("{direction} fvg [{bottom}, {top}]");

        self.zones.push(Zone {
            kind: ZoneKind::Fvg,
            scope: Scope::Internal,
            direction,
            top,
            bottom,
            origin_ordinal: bars.ordinal_ago(1)?,
            origin_close_time_ms: bars.close_time_ago(1)?,
            age_bars: 0,
            hit_top: false,
            hit_bottom: false,
            state: ZoneState::Active,
            suggested_stop,
        });

        self.enforce_limits(cfg);
        Ok(true)
    }

    fn passes_threshold(
        &self,
        bars: &BarWindow,
        direction: Direction,
        gap_height: f64,
        cfg: &EngineConfig,
    ) -> EngineResult<bool> {
        match cfg.fvg.threshold_mode {
            FvgThresholdMode::Adaptive => {
                // Middle-bar displacement must beat the running mean move
                let mean = if self.body_move_count > 0 {
                    self.body_move_sum / self.body_move_count as f64
                } else {
                    0.0
                };
                let middle_move = bars.candle_ago(1)?.body_move_pct();
                let directed = match direction {
                    Direction::Bullish => middle_move,
                    Direction::Bearish => -middle_move,
                };
                Ok(directed > cfg.fvg.threshold_multiplier * mean)
            }
            FvgThresholdMode::SmoothedRange => {
                let threshold = match bars.require_smoothed_range(0) {
                    Ok(sr) => cfg.fvg.threshold_multiplier * sr,
                    Err(e) => {
                        log::debug!("{e}, accepting any gap");
                        0.0
                    }
                };
                Ok(gap_height >= threshold)
            }
        }
    }

    /// Ages, expires, invalidates, and retests every open gap.
    pub fn maintain(&mut self, bars: &BarWindow, cfg: &EngineConfig) -> EngineResult<FvgPulses> {
        if bars.bars() == 0 {
            return Ok(FvgPulses::default());
        }

        let low0 = bars.low_ago(0)?.value();
        let high0 = bars.high_ago(0)?.value();
        let close = bars.close_ago(0)?.value();
        let tolerance = cfg.tick_size.ticks(cfg.fvg.retest_buffer_ticks);

        let mut pulses = FvgPulses::default();
        let mut removals = Vec::new();

        for (idx, zone) in self.zones.iter_mut().enumerate() {
            zone.age_bars += 1;

            if cfg.fvg.max_age_bars > 0 && zone.age_bars > cfg.fvg.max_age_bars {
                removals.push(idx);
                continue;
            }

            // Price trading through the far edge deletes the gap
            let filled = match zone.direction {
                Direction::Bullish => low0 <= zone.bottom,
                Direction::Bearish => high0 >= zone.top,
            };
            if filled {
                removals.push(idx);
                continue;
            }

            if zone.state != ZoneState::Active {
                continue;
            }

            // One-sided: any close at or past the near edge counts, as long
            // as the gap survived the fill check above.
            let retested = match zone.direction {
                Direction::Bullish => close <= zone.top + tolerance,
                Direction::Bearish => close >= zone.bottom - tolerance,
            };
            if retested {
                zone.advance(ZoneState::Retested);
                match zone.direction {
                    Direction::Bullish => {
                        pulses.retest_bull = true;
                        pulses.stop_bull = Some(zone.suggested_stop);
                    }
                    Direction::Bearish => {
                        pulses.retest_bear = true;
                        pulses.stop_bear = Some(zone.suggested_stop);
                    }
                }
            }
        }

        for idx in removals.into_iter().rev() {
            self.zones.remove(idx);
        }

        Ok(pulses)
    }

    fn enforce_limits(&mut self, cfg: &EngineConfig) {
        for direction in [Direction::Bullish, Direction::Bearish] {
            loop {
                let count = self
                    .zones
                    .iter()
                    .filter(|z| z.direction == direction)
                    .count();
                if count <= cfg.fvg.max_zones {
                    break;
                }
                let oldest = self
                    .zones
                    .iter()
                    .enumerate()
                    .filter(|(_, z)| z.direction == direction)
                    .min_by_key(|(_, z)| z.origin_ordinal)
                    .map(|(i, _)| i);
                match oldest {
                    Some(i) => {
                        self.zones.remove(i);
                    }
                    None => break,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Candle;

    fn cfg_smoothed(mult: f64) -> EngineConfig {
        let mut cfg = EngineConfig::default();
        cfg.fvg.threshold_mode = FvgThresholdMode::SmoothedRange;
        cfg.fvg.threshold_multiplier = mult;
        cfg
    }

    /// A clean bullish gap: high[2]=100, low[0]=105, middle bar driving up.
    fn gap_window() -> BarWindow {
        let mut bars = BarWindow::new();
        bars.push(&Candle::new(0, 99.0, 100.0, 98.5, 99.5), Some(2.0));
        bars.push(&Candle::new(1, 99.5, 106.0, 99.0, 105.5), Some(2.0));
        bars.push(&Candle::new(2, 105.5, 107.0, 105.0, 106.5), Some(2.0));
        bars
    }

    #[test]
    fn bullish_gap_creates_zone() {
        let cfg = cfg_smoothed(2.0);
        let mut pool = FvgPool::new();
        let bars = gap_window();

        // Gap height 5 against threshold 2 * 2.0
        assert!(pool.detect(&bars, &cfg).unwrap());
        let z = &pool.zones()[0];
        assert_eq!(z.top, 105.0);
        assert_eq!(z.bottom, 100.0);
        assert_eq!(z.direction, Direction::Bullish);
    }

    #[test]
    fn undersized_gap_rejected() {
        let cfg = cfg_smoothed(4.0); // threshold 8 > gap 5
        let mut pool = FvgPool::new();
        assert!(!pool.detect(&gap_window(), &cfg).unwrap());
    }

    #[test]
    fn middle_confirm_blocks_weak_gap() {
        let mut cfg = cfg_smoothed(1.0);
        cfg.fvg.require_middle_confirm = true;
        let mut bars = BarWindow::new();
        bars.push(&Candle::new(0, 99.0, 100.0, 98.5, 99.5), Some(1.0));
        // Middle bar closes back under high[2]: wick-made gap, no confirm
        bars.push(&Candle::new(1, 99.5, 106.0, 99.0, 99.8), Some(1.0));
        bars.push(&Candle::new(2, 105.5, 107.0, 105.0, 106.5), Some(1.0));

        let mut pool = FvgPool::new();
        assert!(!pool.detect(&bars, &cfg).unwrap());
    }

    #[test]
    fn retest_fires_once_then_zone_stays() {
        let cfg = cfg_smoothed(2.0);
        let mut pool = FvgPool::new();
        let mut bars = gap_window();
        pool.detect(&bars, &cfg).unwrap();

        // Close right on the near edge, gap still open (low above 100)
        bars.push(&Candle::new(3, 106.0, 106.5, 104.5, 105.0), Some(2.0));
        let pulses = pool.maintain(&bars, &cfg).unwrap();
        assert!(pulses.retest_bull);
        assert!(pulses.stop_bull.is_some());
        assert_eq!(pool.zones()[0].state, ZoneState::Retested);

        bars.push(&Candle::new(4, 105.0, 105.5, 104.5, 105.0), Some(2.0));
        let pulses = pool.maintain(&bars, &cfg).unwrap();
        assert!(!pulses.retest_bull);
        assert_eq!(pool.zones().len(), 1);
    }

    #[test]
    fn close_inside_open_gap_counts_as_retest() {
        let cfg = cfg_smoothed(2.0);
        let mut pool = FvgPool::new();
        let mut bars = gap_window();
        pool.detect(&bars, &cfg).unwrap();

        // Close well past the near edge but above the far edge
        bars.push(&Candle::new(3, 106.0, 106.5, 101.0, 102.0), Some(2.0));
        let pulses = pool.maintain(&bars, &cfg).unwrap();
        assert!(pulses.retest_bull);
        assert_eq!(pool.zones()[0].state, ZoneState::Retested);
    }

    #[test]
    fn trading_through_far_edge_removes_zone() {
        let cfg = cfg_smoothed(2.0);
        let mut pool = FvgPool::new();
        let mut bars = gap_window();
        pool.detect(&bars, &cfg).unwrap();

        bars.push(&Candle::new(3, 105.0, 105.5, 99.5, 101.0), Some(2.0));
        pool.maintain(&bars, &cfg).unwrap();
        assert!(pool.zones().is_empty());
    }

    #[test]
    fn age_limit_expires_zone() {
        let mut cfg = cfg_smoothed(2.0);
        cfg.fvg.max_age_bars = 2;
        let mut pool = FvgPool::new();
        let mut bars = gap_window();
        pool.detect(&bars, &cfg).unwrap();

        for i in 0..3 {
            bars.push(
                &Candle::new(3 + i, 106.0, 107.0, 105.5, 106.5),
                Some(2.0),
            );
            pool.maintain(&bars, &cfg).unwrap();
        }
        assert!(pool.zones().is_empty());
    }

    #[test]
    fn missing_smoothed_range_degrades_to_zero_threshold() {
        let cfg = cfg_smoothed(2.0);
        let mut pool = FvgPool::new();
        let mut bars = BarWindow::new();
        bars.push(&Candle::new(0, 99.0, 100.0, 98.5, 99.5), None);
        bars.push(&Candle::new(1, 99.5, 106.0, 99.0, 105.5), None);
        bars.push(&Candle::new(2, 105.5, 107.0, 105.0, 106.5), None);

        assert!(pool.detect(&bars, &cfg).unwrap());
    }
}
