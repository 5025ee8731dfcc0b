//! Engine configuration: one struct per component, a nested DEFAULT block,
//! and construction-time validation. Bad values are rejected, never patched.

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::config::types::TickSize;
use crate::domain::Timeframe;
use crate::error::EngineError;

/// Pivot windows for the two structural scopes.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SwingSettings {
    /// External (major) pivot window, bars each side.
    pub external_window: usize,
    /// Internal (minor) pivot window, bars each side.
    pub internal_window: usize,
}

/// Break detection and the strict internal filters.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct BreakSettings {
    /// Penetration buffer beyond the swing extreme, in ticks.
    pub buffer_ticks: u32,
    /// Confirm breaks on the close. When false, wicks confirm.
    pub confirm_on_close: bool,
    /// Internal strict filter: body must clear the level by this many ticks.
    pub body_buffer_ticks: u32,
    /// Internal strict filter: minimum penetration depth in ticks.
    pub min_break_ticks: u32,
    /// Internal strict filter: displacement bar range vs smoothed range.
    pub displacement_atr_mult: f64,
    /// Internal strict filter alternative: close within this fraction of the
    /// bar range toward the break direction (0.75 = top/bottom quartile).
    pub displacement_quartile: f64,
}

/// Order-block pool behavior, shared by both scopes.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct OrderBlockSettings {
    /// How far back to scan for the opposing extremal candle.
    pub lookback_bars: usize,
    /// Zone edge padding in ticks.
    pub buffer_ticks: u32,
    /// Zone edges come from full wick extremes. When false, body extremes.
    /// A violent source candle uses the opposite of this mode.
    pub full_candle: bool,
    /// External sub-pool capacity. Must be at least 1.
    pub max_external: usize,
    /// Internal sub-pool capacity. Must be at least 1.
    pub max_internal: usize,
    /// A source candle with true range at or above this multiple of the
    /// smoothed range swaps body edges for full wick extremes.
    pub violence_atr_mult: f64,
    /// Suggested stop distance beyond the far edge, in ticks.
    pub stop_offset_ticks: u32,
    /// Retest tolerance around the near edge, in ticks.
    pub retest_buffer_ticks: u32,
    /// Delete internal zones once price has traded through both edges.
    pub remove_on_full_fill: bool,
    /// Touch/full-fill probes use wick extremes instead of body extremes.
    pub touch_use_wicks: bool,
}

/// How the FVG engine sizes its minimum-gap threshold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FvgThresholdMode {
    /// Running mean of absolute per-bar body move (percent), times the multiplier.
    Adaptive,
    /// Smoothed range (ATR) times the multiplier. Missing ATR degrades to zero.
    SmoothedRange,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct FvgSettings {
    pub threshold_mode: FvgThresholdMode,
    /// Multiplier applied in either threshold mode.
    pub threshold_multiplier: f64,
    /// Require the middle bar to close beyond the far gap boundary.
    pub require_middle_confirm: bool,
    /// Zones older than this many bars are dropped. 0 = unlimited.
    pub max_age_bars: usize,
    /// Pool capacity per direction. Must be at least 1.
    pub max_zones: usize,
    /// Retest tolerance around the near edge, in ticks.
    pub retest_buffer_ticks: u32,
    /// Suggested stop distance beyond the far edge, in ticks.
    pub stop_offset_ticks: u32,
}

/// The full engine configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    pub tick_size: TickSize,
    pub swings: SwingSettings,
    pub breaks: BreakSettings,
    pub order_blocks: OrderBlockSettings,
    pub fvg: FvgSettings,
    /// Higher timeframes mirrored alongside the primary feed.
    pub mirrors: Vec<Timeframe>,
}

pub mod defaults {
    use super::{BreakSettings, FvgSettings, FvgThresholdMode, OrderBlockSettings, SwingSettings};

    pub const EXTERNAL_WINDOW: usize = 50;
    pub const INTERNAL_WINDOW: usize = 5;

    pub const SWINGS: SwingSettings = SwingSettings {
        external_window: EXTERNAL_WINDOW,
        internal_window: INTERNAL_WINDOW,
    };

    pub const BREAKS: BreakSettings = BreakSettings {
        buffer_ticks: 1,
        confirm_on_close: true,
        body_buffer_ticks: 1,
        min_break_ticks: 1,
        displacement_atr_mult: 1.0,
        displacement_quartile: 0.75,
    };

    pub const ORDER_BLOCKS: OrderBlockSettings = OrderBlockSettings {
        lookback_bars: 30,
        buffer_ticks: 1,
        full_candle: true,
        max_external: 20,
        max_internal: 40,
        violence_atr_mult: 2.0,
        stop_offset_ticks: 2,
        retest_buffer_ticks: 1,
        remove_on_full_fill: true,
        touch_use_wicks: true,
    };

    pub const FVG: FvgSettings = FvgSettings {
        threshold_mode: FvgThresholdMode::Adaptive,
        threshold_multiplier: 2.0,
        require_middle_confirm: true,
        max_age_bars: 0,
        max_zones: 20,
        retest_buffer_ticks: 1,
        stop_offset_ticks: 2,
    };
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_size: TickSize::new(0.01),
            swings: defaults::SWINGS,
            breaks: defaults::BREAKS,
            order_blocks: defaults::ORDER_BLOCKS,
            fvg: defaults::FVG,
            mirrors: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.tick_size.is_valid() {
            return Err(EngineError::ConfigurationInvalid(format!(
                "tick_size must be positive, got {}",
                self.tick_size
            )));
        }
        if self.swings.external_window == 0 || self.swings.internal_window == 0 {
            return Err(EngineError::ConfigurationInvalid(
                "swing windows must be at least 1 bar".into(),
            ));
        }
        if self.order_blocks.max_external == 0 || self.order_blocks.max_internal == 0 {
            return Err(EngineError::ConfigurationInvalid(
                "order-block pool capacities must be at least 1".into(),
            ));
        }
        if self.order_blocks.lookback_bars == 0 {
            return Err(EngineError::ConfigurationInvalid(
                "order-block lookback must be at least 1 bar".into(),
            ));
        }
        if self.fvg.max_zones == 0 {
            return Err(EngineError::ConfigurationInvalid(
                "fvg pool capacity must be at least 1".into(),
            ));
        }
        if self.fvg.threshold_multiplier < 0.0 {
            return Err(EngineError::ConfigurationInvalid(
                "fvg threshold multiplier must not be negative".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.breaks.displacement_quartile) {
            return Err(EngineError::ConfigurationInvalid(format!(
                "displacement quartile must be in [0, 1), got {}",
                self.breaks.displacement_quartile
            )));
        }
        if self.breaks.displacement_atr_mult <= 0.0 {
            return Err(EngineError::ConfigurationInvalid(
                "displacement multiplier must be positive".into(),
            ));
        }
        if self.order_blocks.violence_atr_mult <= 0.0 {
            return Err(EngineError::ConfigurationInvalid(
                "violence multiplier must be positive".into(),
            ));
        }
        if let Some(tf) = self.mirrors.iter().duplicates().next() {
            return Err(EngineError::ConfigurationInvalid(format!(
                "duplicate mirror timeframe {tf}"
            )));
        }
        Ok(())
    }
}
