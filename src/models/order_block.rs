//! Order-block pool: zones anchored to the extremal candle behind a
//! structural break, with bounded per-scope capacity and one-shot retests.

use {
    crate::{
        config::{EngineConfig, PriceLike, StopPrice},
        error::EngineResult,
        models::{
            bar_window::BarWindow,
            breaks::BreakEvent,
            swing::{Direction, Scope},
            zone::{Zone, ZoneKind, ZoneRef, ZoneState},
        },
    },
    serde::{Deserialize, Serialize},
};

/// One-shot outputs of a maintenance pass.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ObPulses {
    pub retest_bull: bool,
    pub retest_bear: bool,
    pub stop_bull: Option<StopPrice>,
    pub stop_bear: Option<StopPrice>,
}

/// The candle range an order block is built from, after violence parsing.
#[derive(Debug, Clone, Copy)]
struct ParsedCandle {
    low: f64,
    high: f64,
    ordinal: usize,
    close_time_ms: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderBlockPool {
    zones: Vec<Zone>,
}

impl OrderBlockPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn count(&self, scope: Scope) -> usize {
        self.zones.iter().filter(|z| z.scope == scope).count()
    }

    pub fn has_active(&self, scope: Scope, direction: Direction) -> bool {
        self.zones
            .iter()
            .any(|z| z.scope == scope && z.direction == direction && z.is_active())
    }

    /// Active zone closest to the reference price.
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

    /// Opens a zone for a break. Scans from the broken swing's origin up to
    /// the bar before the break for the extremal opposing candle, falling
    /// back to the fixed lookback when no opposing candle exists there.
    pub fn create_from_break(
        &mut self,
        event: &BreakEvent,
        bars: &BarWindow,
        cfg: &EngineConfig,
    ) -> EngineResult<bool> {
        if bars.bars() < 2 {
            return Ok(false);
        }
        let current = bars.ordinal_ago(0)?;
        let span_to_origin = current.saturating_sub(event.level_origin_ordinal);

        let mut picked = self.scan_for_source(event, bars, cfg, span_to_origin, true)?;
        if picked.is_none() {
            let lookback = cfg.order_blocks.lookback_bars.min(bars.bars() - 1);
            picked = self.scan_for_source(event, bars, cfg, lookback, false)?;
        }

        let Some(parsed) = picked else {
            return Ok(false);
        };

        let buffer = cfg.tick_size.ticks(cfg.order_blocks.buffer_ticks);
        let bottom = parsed.low - buffer;
        let top = parsed.high + buffer;
        let stop_offset = cfg.tick_size.ticks(cfg.order_blocks.stop_offset_ticks);
        let suggested_stop = match event.direction {
            Direction::Bullish => StopPrice::new(bottom - stop_offset),
            Direction::Bearish => StopPrice::new(top + stop_offset),
        };

        log::debug!(
            "{} {} order block [{}, {}] from ordinal {}",
            event.scope,
            event.direction,
            bottom,
            top,
            parsed.ordinal
        );

        self.zones.push(Zone {
            kind: ZoneKind::OrderBlock,
            scope: event.scope,
            direction: event.direction,
            top,
            bottom,
            origin_ordinal: parsed.ordinal,
            origin_close_time_ms: parsed.close_time_ms,
            age_bars: 0,
            hit_top: false,
            hit_bottom: false,
            state: ZoneState::Active,
            suggested_stop,
        });

        self.enforce_limits(cfg);
        Ok(true)
    }

    fn scan_for_source(
        &self,
        event: &BreakEvent,
        bars: &BarWindow,
        cfg: &EngineConfig,
        span: usize,
        opposing_only: bool,
    ) -> EngineResult<Option<ParsedCandle>> {
        let mut best: Option<ParsedCandle> = None;

        for ago in 1..=span.min(bars.bars().saturating_sub(1)) {
            let candle = bars.candle_ago(ago)?;
            let opposes = match event.direction {
                Direction::Bullish => candle.is_bearish(),
                Direction::Bearish => candle.is_bullish(),
            };
            if opposing_only && !opposes {
                continue;
            }

            let parsed = self.parse_candle(bars, ago, cfg)?;
            best = Some(match (best, event.direction) {
                (None, _) => parsed,
                (Some(b), Direction::Bullish) if parsed.low < b.low => parsed,
                (Some(b), Direction::Bearish) if parsed.high > b.high => parsed,
                (Some(b), _) => b,
            });
        }

        Ok(best)
    }

    /// Violence parsing: a candle whose true range dwarfs the smoothed range
    /// flips between wick and body representation. Missing smoothed range
    /// means the candle is treated as non-violent.
    fn parse_candle(
        &self,
        bars: &BarWindow,
        ago: usize,
        cfg: &EngineConfig,
    ) -> EngineResult<ParsedCandle> {
        let candle = bars.candle_ago(ago)?;
        let violent = match bars.require_smoothed_range(ago) {
            Ok(sr) if sr > f64::EPSILON => {
                bars.true_range_ago(ago)? >= cfg.order_blocks.violence_atr_mult * sr
            }
            _ => false,
        };

        let use_wicks = cfg.order_blocks.full_candle != violent;
        let (low, high) = if use_wicks {
            (candle.low_price.value(), candle.high_price.value())
        } else {
            candle.body_range()
        };

        Ok(ParsedCandle {
            low,
            high,
            ordinal: bars.ordinal_ago(ago)?,
            close_time_ms: candle.close_time_ms,
        })
    }

    /// Per-bar lifecycle pass: invalidation, full-fill deletion, first-touch
    /// retests. External retests emit pulses with suggested stops.
    pub fn maintain(&mut self, bars: &BarWindow, cfg: &EngineConfig) -> EngineResult<ObPulses> {
        if bars.bars() == 0 {
            return Ok(ObPulses::default());
        }

        let close = bars.close_ago(0)?.value();
        let candle = bars.candle_ago(0)?;
        let (probe_low, probe_high) = if cfg.order_blocks.touch_use_wicks {
            (candle.low_price.value(), candle.high_price.value())
        } else {
            candle.body_range()
        };
        let tolerance = cfg.tick_size.ticks(cfg.order_blocks.retest_buffer_ticks);

        let mut pulses = ObPulses::default();
        let mut removals = Vec::new();

        for (idx, zone) in self.zones.iter_mut().enumerate() {
            zone.age_bars += 1;
            zone.hit_top |= probe_high >= zone.top;
            zone.hit_bottom |= probe_low <= zone.bottom;

            // Both edges reached at any point in the zone's life, not
            // necessarily on the same bar.
            let full_fill = zone.hit_top && zone.hit_bottom;
            if zone.scope == Scope::Internal && cfg.order_blocks.remove_on_full_fill && full_fill {
                removals.push(idx);
                continue;
            }

            let breached = match zone.direction {
                Direction::Bullish => close < zone.bottom,
                Direction::Bearish => close > zone.top,
            };
            if breached {
                zone.advance(ZoneState::Invalidated);
                continue;
            }

            // A valid touch intrudes to the near edge without the probe
            // crossing the far edge.
            let touched = match zone.direction {
                Direction::Bullish => probe_low <= zone.top + tolerance && probe_low > zone.bottom,
                Direction::Bearish => {
                    probe_high >= zone.bottom - tolerance && probe_high < zone.top
                }
            };
            if !touched || zone.state != ZoneState::Active {
                continue;
            }

            match zone.scope {
                Scope::External => {
                    zone.advance(ZoneState::Mitigated);
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
                Scope::Internal => {
                    zone.advance(ZoneState::Retested);
                }
            }
        }

        for idx in removals.into_iter().rev() {
            self.zones.remove(idx);
        }

        Ok(pulses)
    }

    /// Oldest-origin-first eviction, independently per scope.
    fn enforce_limits(&mut self, cfg: &EngineConfig) {
        for (scope, cap) in [
            (Scope::External, cfg.order_blocks.max_external),
            (Scope::Internal, cfg.order_blocks.max_internal),
        ] {
            while self.count(scope) > cap {
                let oldest = self
                    .zones
                    .iter()
                    .enumerate()
                    .filter(|(_, z)| z.scope == scope)
                    .min_by_key(|(_, z)| z.origin_ordinal)
                    .map(|(i, _)| i);
                match oldest {
                    Some(i) => {
                        let z = self.zones.remove(i);
                        log::debug!(
                            "evicted {} {} order block from ordinal {}",
                            z.scope,
                            z.direction,
                            z.origin_ordinal
                        );
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
    use crate::models::breaks::BreakKind;

    fn bull_break(level: f64, origin: usize) -> BreakEvent {
        BreakEvent {
            scope: Scope::External,
            direction: Direction::Bullish,
            kind: BreakKind::Choch,
            level,
            level_origin_ordinal: origin,
            strict: true,
        }
    }

    /// Down candle at ordinal 1 is the obvious source; break closes bar 3.
    fn window_with_source() -> BarWindow {
        let mut bars = BarWindow::new();
        bars.push(&Candle::new(0, 100.0, 101.0, 99.0, 100.5), Some(2.0));
        bars.push(&Candle::new(1, 100.5, 100.8, 97.0, 97.5), Some(2.0)); // bearish, lowest
        bars.push(&Candle::new(2, 97.5, 102.0, 97.2, 101.5), Some(2.0));
        bars.push(&Candle::new(3, 101.5, 106.0, 101.0, 105.5), Some(2.0));
        bars
    }

    #[test]
    fn break_opens_zone_on_extremal_opposing_candle() {
        let cfg = EngineConfig::default();
        let mut pool = OrderBlockPool::new();
        let bars = window_with_source();

        assert!(
            pool.create_from_break(&bull_break(102.0, 0), &bars, &cfg)
                .unwrap()
        );
        let z = &pool.zones()[0];
        assert_eq!(z.origin_ordinal, 1);
        // Wick extremes padded by one 0.01 tick
        assert_eq!(z.bottom, 97.0 - 0.01);
        assert_eq!(z.top, 100.8 + 0.01);
        assert_eq!(z.direction, Direction::Bullish);
        // Stop two ticks under the bottom edge
        assert!((z.suggested_stop.value() - (z.bottom - 0.02)).abs() < 1e-9);
    }

    #[test]
    fn violent_candle_swaps_to_body_edges() {
        let mut cfg = EngineConfig::default();
        cfg.order_blocks.buffer_ticks = 0;
        let mut bars = BarWindow::new();
        bars.push(&Candle::new(0, 100.0, 101.0, 99.0, 100.5), Some(1.0));
        // True range 10 vs smoothed 1.0: violent
        bars.push(&Candle::new(1, 99.0, 105.0, 95.0, 96.0), Some(1.0));
        bars.push(&Candle::new(2, 96.0, 104.0, 95.5, 103.0), Some(1.0));

        let mut pool = OrderBlockPool::new();
        pool.create_from_break(&bull_break(101.0, 0), &bars, &cfg)
            .unwrap();
        let z = &pool.zones()[0];
        // Body edges, not wicks
        assert_eq!(z.bottom, 96.0);
        assert_eq!(z.top, 99.0);
    }

    #[test]
    fn pool_stays_bounded_evicting_oldest() {
        let mut cfg = EngineConfig::default();
        cfg.order_blocks.max_external = 2;
        let mut pool = OrderBlockPool::new();

        // Every bar bearish, so each break's one-bar scan span pins the
        // source to the bar right before it.
        let mut bars = BarWindow::new();
        bars.push(&Candle::new(0, 100.5, 101.0, 99.0, 100.0), Some(1.0));
        for i in 1..6usize {
            let base = 100.0 + i as f64;
            bars.push(
                &Candle::new(i as i64, base + 0.5, base + 1.0, base - 1.0, base),
                Some(1.0),
            );
            let mut event = bull_break(base, i - 1);
            event.level_origin_ordinal = i - 1;
            pool.create_from_break(&event, &bars, &cfg).unwrap();
        }

        assert_eq!(pool.count(Scope::External), 2);
        // Survivors are the two most recent origins
        let mut origins: Vec<usize> = pool.zones().iter().map(|z| z.origin_ordinal).collect();
        origins.sort_unstable();
        assert_eq!(origins, vec![3, 4]);
    }

    #[test]
    fn external_retest_fires_once_with_stop() {
        let cfg = EngineConfig::default();
        let mut pool = OrderBlockPool::new();
        let mut bars = window_with_source();
        pool.create_from_break(&bull_break(102.0, 0), &bars, &cfg)
            .unwrap();
        let zone_top = pool.zones()[0].top;

        // Dip into the zone, close above its bottom
        bars.push(&Candle::new(4, 105.0, 105.5, zone_top - 0.1, 104.0), Some(1.0));
        let pulses = pool.maintain(&bars, &cfg).unwrap();
        assert!(pulses.retest_bull);
        assert!(pulses.stop_bull.is_some());
        assert_eq!(pool.zones()[0].state, ZoneState::Mitigated);

        // Same dip again: no second pulse
        bars.push(&Candle::new(5, 104.0, 104.5, zone_top - 0.1, 103.5), Some(1.0));
        let pulses = pool.maintain(&bars, &cfg).unwrap();
        assert!(!pulses.retest_bull);
    }

    #[test]
    fn wick_through_bottom_is_not_a_valid_touch() {
        let cfg = EngineConfig::default();
        let mut pool = OrderBlockPool::new();
        let mut bars = window_with_source();
        pool.create_from_break(&bull_break(102.0, 0), &bars, &cfg)
            .unwrap();
        let bottom = pool.zones()[0].bottom;

        // Wick pierces the bottom edge but the close holds inside the zone
        bars.push(&Candle::new(4, 100.0, 100.5, bottom - 0.5, 99.0), Some(1.0));
        let pulses = pool.maintain(&bars, &cfg).unwrap();
        assert!(!pulses.retest_bull);
        assert_eq!(pool.zones()[0].state, ZoneState::Active);
    }

    #[test]
    fn internal_zone_deleted_once_both_edges_hit_across_bars() {
        let cfg = EngineConfig::default();
        let mut pool = OrderBlockPool::new();
        let mut bars = window_with_source();
        let mut event = bull_break(102.0, 0);
        event.scope = Scope::Internal;
        pool.create_from_break(&event, &bars, &cfg).unwrap();
        let (bottom, top) = (pool.zones()[0].bottom, pool.zones()[0].top);

        // Top edge on one bar, bottom edge two bars later
        bars.push(&Candle::new(4, 101.0, top + 0.5, top - 0.1, 101.5), Some(1.0));
        pool.maintain(&bars, &cfg).unwrap();
        assert_eq!(pool.zones().len(), 1);

        bars.push(&Candle::new(5, 101.5, 102.0, top - 0.1, 101.0), Some(1.0));
        pool.maintain(&bars, &cfg).unwrap();
        assert_eq!(pool.zones().len(), 1);

        bars.push(&Candle::new(6, 101.0, 101.5, bottom - 0.1, 101.0), Some(1.0));
        pool.maintain(&bars, &cfg).unwrap();
        assert!(pool.zones().is_empty());
    }

    #[test]
    fn close_through_bottom_invalidates() {
        let cfg = EngineConfig::default();
        let mut pool = OrderBlockPool::new();
        let mut bars = window_with_source();
        pool.create_from_break(&bull_break(102.0, 0), &bars, &cfg)
            .unwrap();
        let bottom = pool.zones()[0].bottom;

        bars.push(&Candle::new(4, 100.0, 100.5, bottom - 1.0, bottom - 0.5), Some(1.0));
        pool.maintain(&bars, &cfg).unwrap();
        assert_eq!(pool.zones()[0].state, ZoneState::Invalidated);
        assert!(!pool.has_active(Scope::External, Direction::Bullish));
    }
}
