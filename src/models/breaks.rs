//! Break classification: tests each bar against the latest uncrossed swing
//! extreme and labels the break as continuation (BOS) or reversal (CHoCH).

use {
    crate::{
        config::{EngineConfig, PriceLike},
        error::EngineResult,
        models::{
            bar_window::BarWindow,
            swing::{Direction, Scope, SwingTracker},
        },
    },
    serde::{Deserialize, Serialize},
    strum_macros::Display,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum BreakKind {
    Bos,
    Choch,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BreakEvent {
    pub scope: Scope,
    pub direction: Direction,
    pub kind: BreakKind,
    /// The swing level that was broken.
    pub level: f64,
    pub level_origin_ordinal: usize,
    /// Internal-scope breaks carry the strict-filter verdict separately
    /// from the fact that the break fired. External breaks are always strict.
    pub strict: bool,
}

/// Per-scope bias and break detection. Bias starts undefined and flips to
/// the direction of each confirmed break.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakClassifier {
    scope: Scope,
    bias: Option<Direction>,
}

impl BreakClassifier {
    pub fn new(scope: Scope) -> Self {
        Self { scope, bias: None }
    }

    pub fn bias(&self) -> Option<Direction> {
        self.bias
    }

    /// Structure direction as exported: -1 bearish, 0 undefined, 1 bullish.
    pub fn direction_sign(&self) -> i8 {
        self.bias.map_or(0, Direction::sign)
    }

    /// Tests the newest bar against both uncrossed swing extremes.
    /// At most one event per side per bar; crossing consumes the level.
    pub fn classify(
        &mut self,
        bars: &BarWindow,
        swings: &mut SwingTracker,
        cfg: &EngineConfig,
    ) -> EngineResult<Vec<BreakEvent>> {
        if bars.bars() == 0 {
            return Ok(Vec::new());
        }

        let buffer = cfg.tick_size.ticks(cfg.breaks.buffer_ticks);
        let close = bars.close_ago(0)?.value();
        let high = bars.high_ago(0)?.value();
        let low = bars.low_ago(0)?.value();

        let trigger_up = if cfg.breaks.confirm_on_close { close } else { high };
        let trigger_dn = if cfg.breaks.confirm_on_close { close } else { low };

        let mut events = Vec::new();

        if let Some(level) = swings.curr_high
            && !level.crossed
            && trigger_up > level.price + buffer
        {
            let strict = self.scope == Scope::External
                || self.strict_filters_pass(bars, Direction::Bullish, level.price, cfg)?;
            let event = self.fire(Direction::Bullish, level.price, level.origin_ordinal, strict);
            if let Some(l) = swings.curr_high.as_mut() {
                l.crossed = true;
            }
            events.push(event);
        }

        if let Some(level) = swings.curr_low
            && !level.crossed
            && trigger_dn < level.price - buffer
        {
            let strict = self.scope == Scope::External
                || self.strict_filters_pass(bars, Direction::Bearish, level.price, cfg)?;
            let event = self.fire(Direction::Bearish, level.price, level.origin_ordinal, strict);
            if let Some(l) = swings.curr_low.as_mut() {
                l.crossed = true;
            }
            events.push(event);
        }

        Ok(events)
    }

    fn fire(
        &mut self,
        direction: Direction,
        level: f64,
        level_origin_ordinal: usize,
        strict: bool,
    ) -> BreakEvent {
        let kind = if self.bias == Some(direction) {
            BreakKind::Bos
        } else {
            BreakKind::Choch
        };
        self.bias = Some(direction);

        log::debug!(
            "{} {} {} through {} (strict={})",
            self.scope,
            kind,
            direction,
            level,
            strict
        );

        BreakEvent {
            scope: self.scope,
            direction,
            kind,
            level,
            level_origin_ordinal,
            strict,
        }
    }

    /// Internal-scope strict filters: body close beyond the level, minimum
    /// penetration depth, and a displacement requirement on the break bar.
    fn strict_filters_pass(
        &self,
        bars: &BarWindow,
        direction: Direction,
        level: f64,
        cfg: &EngineConfig,
    ) -> EngineResult<bool> {
        let close = bars.close_ago(0)?.value();
        let high = bars.high_ago(0)?.value();
        let low = bars.low_ago(0)?.value();
        let range = high - low;

        let body_buffer = cfg.tick_size.ticks(cfg.breaks.body_buffer_ticks);
        let min_break = cfg.tick_size.ticks(cfg.breaks.min_break_ticks);

        let (body_ok, depth_ok) = match direction {
            Direction::Bullish => (close > level + body_buffer, close - level >= min_break),
            Direction::Bearish => (close < level - body_buffer, level - close >= min_break),
        };

        // Missing smoothed range degrades to the bar's own range.
        let smoothed = match bars.require_smoothed_range(0) {
            Ok(v) => v,
            Err(e) => {
                log::debug!("{}: {e}, using bar range", self.scope);
                range
            }
        };

        let displaced = range >= cfg.breaks.displacement_atr_mult * smoothed;
        // A zero-range bar has its close at both extremes, so the quartile
        // check holds vacuously.
        let quartile_ok = if range > f64::EPSILON {
            match direction {
                Direction::Bullish => (close - low) / range >= cfg.breaks.displacement_quartile,
                Direction::Bearish => (high - close) / range >= cfg.breaks.displacement_quartile,
            }
        } else {
            true
        };

        Ok(body_ok && depth_ok && (displaced || quartile_ok))
    }
}

/// Liquidity sweep: a wick beyond the uncrossed external swing extreme with
/// the close back inside. Returns (sweep_high, sweep_low) pulses.
pub fn detect_sweeps(bars: &BarWindow, swings: &SwingTracker) -> EngineResult<(bool, bool)> {
    if bars.bars() == 0 {
        return Ok((false, false));
    }

    let close = bars.close_ago(0)?.value();
    let high = bars.high_ago(0)?.value();
    let low = bars.low_ago(0)?.value();

    let sweep_high = swings
        .curr_high
        .map(|l| !l.crossed && high > l.price && close < l.price)
        .unwrap_or(false);
    let sweep_low = swings
        .curr_low
        .map(|l| !l.crossed && low < l.price && close > l.price)
        .unwrap_or(false);

    Ok((sweep_high, sweep_low))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Candle;
    use crate::models::swing::SwingLevel;

    fn one_bar(open: f64, high: f64, low: f64, close: f64) -> BarWindow {
        let mut bars = BarWindow::new();
        bars.push(&Candle::new(0, open, high, low, close), Some(1.0));
        bars
    }

    fn tracker_with_high(price: f64) -> SwingTracker {
        let mut t = SwingTracker::new(Scope::External, 5);
        t.curr_high = Some(SwingLevel {
            price,
            origin_ordinal: 10,
            crossed: false,
        });
        t
    }

    #[test]
    fn first_break_with_no_bias_is_choch() {
        let cfg = EngineConfig::default();
        let bars = one_bar(100.0, 111.0, 99.0, 110.5);
        let mut swings = tracker_with_high(110.0);
        let mut clf = BreakClassifier::new(Scope::External);

        let events = clf.classify(&bars, &mut swings, &cfg).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, BreakKind::Choch);
        assert_eq!(events[0].direction, Direction::Bullish);
        assert!(events[0].strict);
        assert!(swings.curr_high.unwrap().crossed);
        assert_eq!(clf.direction_sign(), 1);
    }

    #[test]
    fn aligned_break_is_bos() {
        let cfg = EngineConfig::default();
        let mut clf = BreakClassifier::new(Scope::External);

        let bars = one_bar(100.0, 111.0, 99.0, 110.5);
        let mut swings = tracker_with_high(110.0);
        clf.classify(&bars, &mut swings, &cfg).unwrap();

        // Second bullish break with bullish bias already set
        let bars = one_bar(110.0, 116.0, 109.0, 115.5);
        let mut swings = tracker_with_high(115.0);
        let events = clf.classify(&bars, &mut swings, &cfg).unwrap();
        assert_eq!(events[0].kind, BreakKind::Bos);
    }

    #[test]
    fn crossed_level_does_not_refire() {
        let cfg = EngineConfig::default();
        let bars = one_bar(100.0, 111.0, 99.0, 110.5);
        let mut swings = tracker_with_high(110.0);
        let mut clf = BreakClassifier::new(Scope::External);

        assert_eq!(clf.classify(&bars, &mut swings, &cfg).unwrap().len(), 1);
        assert_eq!(clf.classify(&bars, &mut swings, &cfg).unwrap().len(), 0);
    }

    #[test]
    fn buffer_blocks_shallow_break() {
        let mut cfg = EngineConfig::default();
        cfg.tick_size = crate::config::TickSize::new(0.5);
        cfg.breaks.buffer_ticks = 2; // needs a full point beyond the level
        let bars = one_bar(100.0, 111.0, 99.0, 110.5);
        let mut swings = tracker_with_high(110.0);
        let mut clf = BreakClassifier::new(Scope::External);

        assert!(clf.classify(&bars, &mut swings, &cfg).unwrap().is_empty());
    }

    #[test]
    fn internal_weak_break_fires_but_not_strict() {
        let mut cfg = EngineConfig::default();
        cfg.breaks.displacement_atr_mult = 1.0;
        // Tiny body close just above the level, big ATR, close mid-range
        let mut bars = BarWindow::new();
        bars.push(&Candle::new(0, 109.0, 112.0, 106.0, 110.1), Some(50.0));
        let mut swings = SwingTracker::new(Scope::Internal, 5);
        swings.curr_high = Some(SwingLevel {
            price: 110.0,
            origin_ordinal: 3,
            crossed: false,
        });
        let mut clf = BreakClassifier::new(Scope::Internal);

        let events = clf.classify(&bars, &mut swings, &cfg).unwrap();
        assert_eq!(events.len(), 1);
        assert!(!events[0].strict);
    }

    #[test]
    fn zero_range_break_bar_is_still_strict() {
        let cfg = EngineConfig::default();
        // Doji with every price at 110.5: body and depth clear the level,
        // and the degenerate range cannot fail the quartile check
        let bars = one_bar(110.5, 110.5, 110.5, 110.5);
        let mut swings = SwingTracker::new(Scope::Internal, 5);
        swings.curr_high = Some(SwingLevel {
            price: 110.0,
            origin_ordinal: 3,
            crossed: false,
        });
        let mut clf = BreakClassifier::new(Scope::Internal);

        let events = clf.classify(&bars, &mut swings, &cfg).unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].strict);
    }

    #[test]
    fn wick_beyond_with_close_inside_is_a_sweep() {
        let bars = one_bar(100.0, 112.0, 99.0, 108.0);
        let swings = tracker_with_high(110.0);
        let (hi, lo) = detect_sweeps(&bars, &swings).unwrap();
        assert!(hi);
        assert!(!lo);
    }
}
