//! The per-bar public surface: one-shot pulses plus persistent structure
//! state, built fresh every bar and immutable once returned.

use {
    crate::{
        config::StopPrice,
        domain::Timeframe,
        models::{
            swing::{SwingPattern, SwingTracker},
            zone::ZoneRef,
        },
    },
    serde::{Deserialize, Serialize},
};

/// Every one-shot flag the engine can raise. True for exactly the bar the
/// condition fires on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pulses {
    pub ext_bos_up: bool,
    pub ext_bos_down: bool,
    pub ext_choch_up: bool,
    pub ext_choch_down: bool,

    pub int_bos_up: bool,
    pub int_bos_down: bool,
    pub int_choch_up: bool,
    pub int_choch_down: bool,
    /// Strict-filter verdicts for the internal break pulses above. An
    /// internal break can fire without being strictly valid.
    pub int_up_strict: bool,
    pub int_down_strict: bool,

    pub sweep_high: bool,
    pub sweep_low: bool,

    pub ob_retest_bull: bool,
    pub ob_retest_bear: bool,
    pub ob_stop_bull: Option<StopPrice>,
    pub ob_stop_bear: Option<StopPrice>,

    pub fvg_retest_bull: bool,
    pub fvg_retest_bear: bool,
    pub fvg_stop_bull: Option<StopPrice>,
    pub fvg_stop_bear: Option<StopPrice>,
}

impl Pulses {
    /// OR-combines another bar's pulses into this one. Used by the mirror's
    /// publication buffer so no event between two primary bars is lost.
    pub fn merge(&mut self, other: &Pulses) {
        self.ext_bos_up |= other.ext_bos_up;
        self.ext_bos_down |= other.ext_bos_down;
        self.ext_choch_up |= other.ext_choch_up;
        self.ext_choch_down |= other.ext_choch_down;
        self.int_bos_up |= other.int_bos_up;
        self.int_bos_down |= other.int_bos_down;
        self.int_choch_up |= other.int_choch_up;
        self.int_choch_down |= other.int_choch_down;
        self.int_up_strict |= other.int_up_strict;
        self.int_down_strict |= other.int_down_strict;
        self.sweep_high |= other.sweep_high;
        self.sweep_low |= other.sweep_low;
        self.ob_retest_bull |= other.ob_retest_bull;
        self.ob_retest_bear |= other.ob_retest_bear;
        self.fvg_retest_bull |= other.fvg_retest_bull;
        self.fvg_retest_bear |= other.fvg_retest_bear;
        // Stops persist, newest emitter wins: self is the newer bar.
        self.ob_stop_bull = self.ob_stop_bull.or(other.ob_stop_bull);
        self.ob_stop_bear = self.ob_stop_bear.or(other.ob_stop_bear);
        self.fvg_stop_bull = self.fvg_stop_bull.or(other.fvg_stop_bull);
        self.fvg_stop_bear = self.fvg_stop_bear.or(other.fvg_stop_bear);
    }

    pub fn any(&self) -> bool {
        self.ext_bos_up
            || self.ext_bos_down
            || self.ext_choch_up
            || self.ext_choch_down
            || self.int_bos_up
            || self.int_bos_down
            || self.int_choch_up
            || self.int_choch_down
            || self.sweep_high
            || self.sweep_low
            || self.ob_retest_bull
            || self.ob_retest_bear
            || self.fvg_retest_bull
            || self.fvg_retest_bear
    }
}

/// Exported swing levels for one scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SwingLevels {
    pub last_high: Option<f64>,
    pub prev_high: Option<f64>,
    pub last_low: Option<f64>,
    pub prev_low: Option<f64>,
    pub pattern: SwingPattern,
}

impl From<&SwingTracker> for SwingLevels {
    fn from(t: &SwingTracker) -> Self {
        Self {
            last_high: t.curr_high.map(|l| l.price),
            prev_high: t.prev_high.map(|l| l.price),
            last_low: t.curr_low.map(|l| l.price),
            prev_low: t.prev_low.map(|l| l.price),
            pattern: t.pattern,
        }
    }
}

/// What one mirror timeframe publishes onto the primary timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorSnapshot {
    pub timeframe: Timeframe,
    pub close_time_ms: i64,
    pub external_direction: i8,
    pub internal_direction: i8,
    pub external_swings: SwingLevels,
    pub internal_swings: SwingLevels,
    pub bars_since_swing: usize,
    pub pulses: Pulses,
    pub has_active_bull_ob: bool,
    pub has_active_bear_ob: bool,
    pub has_active_bull_fvg: bool,
    pub has_active_bear_fvg: bool,
    pub in_premium: bool,
    pub in_discount: bool,
}

/// The read-only snapshot returned for every primary bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub ordinal: usize,
    pub close_time_ms: i64,

    /// -1 bearish, 0 undefined, 1 bullish, per scope.
    pub external_direction: i8,
    pub internal_direction: i8,

    pub external_swings: SwingLevels,
    pub internal_swings: SwingLevels,
    pub bars_since_swing: usize,

    pub pulses: Pulses,

    pub has_active_external_bull_ob: bool,
    pub has_active_external_bear_ob: bool,
    pub has_active_bull_fvg: bool,
    pub has_active_bear_fvg: bool,
    pub in_premium: bool,
    pub in_discount: bool,

    pub nearest_order_block: Option<ZoneRef>,
    pub nearest_fvg: Option<ZoneRef>,

    /// Mirror records released to this bar (close time already caught up).
    pub mirrors: Vec<MirrorSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_is_an_or() {
        let mut a = Pulses {
            ext_bos_up: true,
            ..Default::default()
        };
        let b = Pulses {
            sweep_low: true,
            ob_stop_bull: Some(StopPrice::new(98.0)),
            ..Default::default()
        };
        a.merge(&b);
        assert!(a.ext_bos_up);
        assert!(a.sweep_low);
        assert_eq!(a.ob_stop_bull, Some(StopPrice::new(98.0)));
    }

    #[test]
    fn merge_keeps_the_newer_stop() {
        let mut newer = Pulses {
            ob_stop_bull: Some(StopPrice::new(99.0)),
            ..Default::default()
        };
        let older = Pulses {
            ob_stop_bull: Some(StopPrice::new(95.0)),
            fvg_stop_bear: Some(StopPrice::new(105.0)),
            ..Default::default()
        };
        newer.merge(&older);
        // Both bars emitted a bull stop: the newer one survives
        assert_eq!(newer.ob_stop_bull, Some(StopPrice::new(99.0)));
        // Only the older bar emitted a bear stop: it carries forward
        assert_eq!(newer.fvg_stop_bear, Some(StopPrice::new(105.0)));
    }
}
