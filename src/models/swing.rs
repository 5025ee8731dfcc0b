//! Rolling-window pivot detection. A leg flips when the bar `W` bars back
//! pokes beyond the rolling extreme of the `W` bars that followed it; the
//! flip confirms the pivot as a swing point.

use {
    crate::{
        config::PriceLike,
        error::EngineResult,
        models::bar_window::BarWindow,
    },
    serde::{Deserialize, Serialize},
    strum_macros::Display,
};

/// Structural granularity. External tracks the major swings, internal the minor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum Scope {
    External,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum Direction {
    Bullish,
    Bearish,
}

impl Direction {
    pub fn sign(self) -> i8 {
        match self {
            Direction::Bullish => 1,
            Direction::Bearish => -1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum SwingSide {
    High,
    Low,
}

/// Relationship of the newest confirmed swing to its predecessor of the
/// same kind. Codes follow the conventional export values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display)]
pub enum SwingPattern {
    #[default]
    Undefined,
    HigherHigh,
    HigherLow,
    LowerLow,
    LowerHigh,
}

impl SwingPattern {
    pub fn code(self) -> i8 {
        match self {
            SwingPattern::Undefined => 0,
            SwingPattern::HigherHigh => 1,
            SwingPattern::HigherLow => 2,
            SwingPattern::LowerLow => -1,
            SwingPattern::LowerHigh => -2,
        }
    }
}

/// A confirmed swing extreme. `crossed` is owned by the break classifier:
/// once price breaks the level it is never re-armed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SwingLevel {
    pub price: f64,
    pub origin_ordinal: usize,
    pub crossed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SwingEvent {
    pub scope: Scope,
    pub side: SwingSide,
    pub price: f64,
    pub origin_ordinal: usize,
    pub pattern: SwingPattern,
}

/// One scope's swing state: the current and immediately-previous extreme
/// per side, the live leg direction, and the latest pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwingTracker {
    scope: Scope,
    window: usize,
    leg: Option<Direction>,
    pub curr_high: Option<SwingLevel>,
    pub prev_high: Option<SwingLevel>,
    pub curr_low: Option<SwingLevel>,
    pub prev_low: Option<SwingLevel>,
    pub pattern: SwingPattern,
}

impl SwingTracker {
    pub fn new(scope: Scope, window: usize) -> Self {
        Self {
            scope,
            window,
            leg: None,
            curr_high: None,
            prev_high: None,
            curr_low: None,
            prev_low: None,
            pattern: SwingPattern::Undefined,
        }
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Bars required before any pivot can confirm.
    pub fn min_bars(&self) -> usize {
        self.window + 3
    }

    /// Runs one detection step against the freshly-extended window.
    /// Returns the swing confirmed on this bar, if any.
    pub fn update(&mut self, bars: &BarWindow) -> EngineResult<Option<SwingEvent>> {
        if bars.bars() < self.min_bars() {
            return Ok(None);
        }

        let w = self.window;
        let pivot_high = bars.high_ago(w)?.value();
        let pivot_low = bars.low_ago(w)?.value();
        let rolling_max = bars.highest_high(0, w)?;
        let rolling_min = bars.lowest_low(0, w)?;
        let pivot_ordinal = bars.ordinal_ago(w)?;

        let new_leg_high = pivot_high > rolling_max;
        let new_leg_low = pivot_low < rolling_min;

        // High check wins outright: a bar that qualifies both ways reads
        // bearish and never reaches the low check.
        let event = if new_leg_high {
            self.flip(Direction::Bearish, SwingSide::High, pivot_high, pivot_ordinal)
        } else if new_leg_low {
            self.flip(Direction::Bullish, SwingSide::Low, pivot_low, pivot_ordinal)
        } else {
            None
        };

        if let Some(ev) = &event {
            log::debug!(
                "{} swing {} confirmed at {} (ordinal {}) [{}]",
                self.scope,
                ev.side,
                ev.price,
                ev.origin_ordinal,
                ev.pattern
            );
        }

        Ok(event)
    }

    /// Applies one leg observation. Same leg again is a no-op; the first
    /// ever only latches; a flip confirms the pivot as a swing.
    fn flip(
        &mut self,
        leg: Direction,
        side: SwingSide,
        price: f64,
        origin_ordinal: usize,
    ) -> Option<SwingEvent> {
        if self.leg == Some(leg) {
            return None;
        }
        let first = self.leg.is_none();
        self.leg = Some(leg);
        if first {
            None
        } else {
            Some(self.confirm(side, price, origin_ordinal))
        }
    }

    fn confirm(&mut self, side: SwingSide, price: f64, origin_ordinal: usize) -> SwingEvent {
        let level = SwingLevel {
            price,
            origin_ordinal,
            crossed: false,
        };

        self.pattern = match side {
            SwingSide::High => match self.curr_high {
                Some(prev) if price > prev.price => SwingPattern::HigherHigh,
                Some(_) => SwingPattern::LowerHigh,
                None => SwingPattern::Undefined,
            },
            SwingSide::Low => match self.curr_low {
                Some(prev) if price < prev.price => SwingPattern::LowerLow,
                Some(_) => SwingPattern::HigherLow,
                None => SwingPattern::Undefined,
            },
        };

        match side {
            SwingSide::High => {
                self.prev_high = self.curr_high;
                self.curr_high = Some(level);
            }
            SwingSide::Low => {
                self.prev_low = self.curr_low;
                self.curr_low = Some(level);
            }
        }

        SwingEvent {
            scope: self.scope,
            side,
            price,
            origin_ordinal,
            pattern: self.pattern,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Candle;

    fn push_flat(bars: &mut BarWindow, n: usize, price: f64) {
        for _ in 0..n {
            let t = bars.bars() as i64 * 60_000;
            bars.push(&Candle::new(t, price, price + 0.5, price - 0.5, price), None);
        }
    }

    fn push_one(bars: &mut BarWindow, high: f64, low: f64) {
        let t = bars.bars() as i64 * 60_000;
        let mid = (high + low) / 2.0;
        bars.push(&Candle::new(t, mid, high, low, mid), None);
    }

    #[test]
    fn needs_minimum_history() {
        let mut bars = BarWindow::new();
        let mut tracker = SwingTracker::new(Scope::Internal, 3);
        push_flat(&mut bars, 5, 100.0);
        assert_eq!(tracker.update(&bars).unwrap(), None);
    }

    #[test]
    fn first_leg_latches_without_emitting() {
        let w = 3;
        let mut bars = BarWindow::new();
        let mut tracker = SwingTracker::new(Scope::Internal, w);

        // Spike high, then enough lower bars that the spike sits w bars back
        push_flat(&mut bars, 3, 100.0);
        push_one(&mut bars, 110.0, 99.5); // the pivot candidate
        for _ in 0..w {
            push_one(&mut bars, 101.0, 99.0);
        }

        let mut events = Vec::new();
        let mut replay = BarWindow::new();
        for i in 0..bars.bars() {
            let c = bars.candle_ago(bars.bars() - 1 - i).unwrap();
            replay.push(&c, None);
            if let Some(ev) = tracker.update(&replay).unwrap() {
                events.push(ev);
            }
        }
        // First flip only latches the leg
        assert!(events.is_empty());
        assert_eq!(tracker.curr_high, None);
    }

    #[test]
    fn outside_pivot_bar_reads_bearish_and_keeps_the_leg() {
        let w = 3;
        let mut tracker = SwingTracker::new(Scope::Internal, w);
        let mut bars = BarWindow::new();

        // Latch the bearish leg, then feed an outside bar whose pivot beats
        // the rolling extremes on both sides. The high check wins, the leg
        // is already bearish, so nothing may flip or confirm.
        push_flat(&mut bars, 3, 100.0);
        push_one(&mut bars, 110.0, 99.5);
        for _ in 0..w {
            push_one(&mut bars, 101.0, 99.0);
        }
        push_one(&mut bars, 120.0, 90.0); // outside bar
        for _ in 0..w {
            push_one(&mut bars, 101.0, 99.0);
        }

        let mut events = Vec::new();
        let mut replay = BarWindow::new();
        for i in 0..bars.bars() {
            let c = bars.candle_ago(bars.bars() - 1 - i).unwrap();
            replay.push(&c, None);
            if let Some(ev) = tracker.update(&replay).unwrap() {
                events.push(ev);
            }
        }

        assert!(events.is_empty());
        assert_eq!(tracker.curr_low, None);
        assert_eq!(tracker.curr_high, None);
    }

    #[test]
    fn second_flip_emits_a_swing_low() {
        let w = 3;
        let mut tracker = SwingTracker::new(Scope::Internal, w);
        let mut bars = BarWindow::new();

        // Rise to a peak, fall to a trough, rise again: peak latches the
        // bearish leg, the trough confirms as the first emitted swing.
        push_flat(&mut bars, 3, 100.0);
        push_one(&mut bars, 110.0, 99.5);
        for i in 0..w {
            push_one(&mut bars, 104.0 - i as f64, 95.0 - i as f64);
        }
        push_one(&mut bars, 96.0, 90.0); // trough
        for i in 0..w {
            push_one(&mut bars, 97.0 + i as f64, 93.0 + i as f64);
        }

        let mut events = Vec::new();
        let mut replay = BarWindow::new();
        for i in 0..bars.bars() {
            let c = bars.candle_ago(bars.bars() - 1 - i).unwrap();
            replay.push(&c, None);
            if let Some(ev) = tracker.update(&replay).unwrap() {
                events.push(ev);
            }
        }

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].side, SwingSide::Low);
        assert_eq!(events[0].price, 90.0);
        assert!(tracker.curr_low.is_some());
        assert!(!tracker.curr_low.unwrap().crossed);
    }
}
