//! One timeframe's full pipeline. Owns all per-timeframe state and runs the
//! fixed per-bar order: swings, breaks, zones, premium/discount.

use crate::{
    config::{EngineConfig, PriceLike},
    domain::Candle,
    error::{EngineError, EngineResult},
    models::{
        BarWindow, BreakClassifier, BreakEvent, BreakKind, Direction, FvgPool, OrderBlockPool,
        PremiumDiscount, Pulses, Scope, Snapshot, SwingLevels, SwingTracker, detect_sweeps,
    },
};

pub struct StructureEngine {
    config: EngineConfig,
    bars: BarWindow,
    ext_swings: SwingTracker,
    int_swings: SwingTracker,
    ext_breaks: BreakClassifier,
    int_breaks: BreakClassifier,
    order_blocks: OrderBlockPool,
    fvgs: FvgPool,
    premium: PremiumDiscount,
    bars_since_swing: usize,
}

impl StructureEngine {
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            ext_swings: SwingTracker::new(Scope::External, config.swings.external_window),
            int_swings: SwingTracker::new(Scope::Internal, config.swings.internal_window),
            ext_breaks: BreakClassifier::new(Scope::External),
            int_breaks: BreakClassifier::new(Scope::Internal),
            order_blocks: OrderBlockPool::new(),
            fvgs: FvgPool::new(),
            premium: PremiumDiscount::new(),
            bars: BarWindow::new(),
            bars_since_swing: 0,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn bars(&self) -> &BarWindow {
        &self.bars
    }

    pub fn order_blocks(&self) -> &OrderBlockPool {
        &self.order_blocks
    }

    pub fn fvgs(&self) -> &FvgPool {
        &self.fvgs
    }

    /// Ingests one closed bar and returns the bar's snapshot. Component
    /// failures degrade to inaction for that component; they never abort
    /// the bar or poison sibling components.
    pub fn process_bar(&mut self, candle: &Candle, smoothed_range: Option<f64>) -> Snapshot {
        self.bars.push(candle, smoothed_range);
        self.bars_since_swing += 1;

        let mut pulses = Pulses::default();

        // 1. Swings
        if let Some(ev) = recover("external swings", self.ext_swings.update(&self.bars)).flatten()
        {
            self.premium.on_swing(&ev);
            self.bars_since_swing = 0;
        }
        recover("internal swings", self.int_swings.update(&self.bars));

        // 2. Sweeps read the external levels before break classification
        // consumes them.
        let (sweep_high, sweep_low) =
            recover("sweeps", detect_sweeps(&self.bars, &self.ext_swings)).unwrap_or((false, false));
        pulses.sweep_high = sweep_high;
        pulses.sweep_low = sweep_low;

        // 3. Breaks
        let ext_events = recover(
            "external breaks",
            self.ext_breaks
                .classify(&self.bars, &mut self.ext_swings, &self.config),
        )
        .unwrap_or_default();
        let int_events = recover(
            "internal breaks",
            self.int_breaks
                .classify(&self.bars, &mut self.int_swings, &self.config),
        )
        .unwrap_or_default();

        for event in &ext_events {
            apply_break_pulse(&mut pulses, event);
        }
        for event in &int_events {
            apply_break_pulse(&mut pulses, event);
        }

        // 4. Order blocks: maintain the existing pool, then open zones for
        // this bar's breaks so a fresh zone can't retest on its birth bar.
        if let Some(ob) = recover(
            "order-block maintenance",
            self.order_blocks.maintain(&self.bars, &self.config),
        ) {
            pulses.ob_retest_bull = ob.retest_bull;
            pulses.ob_retest_bear = ob.retest_bear;
            pulses.ob_stop_bull = ob.stop_bull;
            pulses.ob_stop_bear = ob.stop_bear;
        }
        for event in ext_events.iter().chain(int_events.iter()) {
            recover(
                "order-block creation",
                self.order_blocks
                    .create_from_break(event, &self.bars, &self.config),
            );
        }

        // 5. Fair value gaps, same maintain-then-detect order
        if let Some(fvg) = recover(
            "fvg maintenance",
            self.fvgs.maintain(&self.bars, &self.config),
        ) {
            pulses.fvg_retest_bull = fvg.retest_bull;
            pulses.fvg_retest_bear = fvg.retest_bear;
            pulses.fvg_stop_bull = fvg.stop_bull;
            pulses.fvg_stop_bear = fvg.stop_bear;
        }
        recover("fvg detection", self.fvgs.detect(&self.bars, &self.config));

        // 6. Premium/discount off the freshly re-anchored band
        let close = candle.close_price.value();
        let (in_premium, in_discount) = self.premium.classify(close);

        Snapshot {
            ordinal: self.bars.bars() - 1,
            close_time_ms: candle.close_time_ms,
            external_direction: self.ext_breaks.direction_sign(),
            internal_direction: self.int_breaks.direction_sign(),
            external_swings: SwingLevels::from(&self.ext_swings),
            internal_swings: SwingLevels::from(&self.int_swings),
            bars_since_swing: self.bars_since_swing,
            pulses,
            has_active_external_bull_ob: self
                .order_blocks
                .has_active(Scope::External, Direction::Bullish),
            has_active_external_bear_ob: self
                .order_blocks
                .has_active(Scope::External, Direction::Bearish),
            has_active_bull_fvg: self.fvgs.has_active(Direction::Bullish),
            has_active_bear_fvg: self.fvgs.has_active(Direction::Bearish),
            in_premium,
            in_discount,
            nearest_order_block: self.order_blocks.nearest_active(close),
            nearest_fvg: self.fvgs.nearest_active(close),
            mirrors: Vec::new(),
        }
    }
}

fn apply_break_pulse(pulses: &mut Pulses, event: &BreakEvent) {
    match (event.scope, event.kind, event.direction) {
        (Scope::External, BreakKind::Bos, Direction::Bullish) => pulses.ext_bos_up = true,
        (Scope::External, BreakKind::Bos, Direction::Bearish) => pulses.ext_bos_down = true,
        (Scope::External, BreakKind::Choch, Direction::Bullish) => pulses.ext_choch_up = true,
        (Scope::External, BreakKind::Choch, Direction::Bearish) => pulses.ext_choch_down = true,
        (Scope::Internal, BreakKind::Bos, Direction::Bullish) => pulses.int_bos_up = true,
        (Scope::Internal, BreakKind::Bos, Direction::Bearish) => pulses.int_bos_down = true,
        (Scope::Internal, BreakKind::Choch, Direction::Bullish) => pulses.int_choch_up = true,
        (Scope::Internal, BreakKind::Choch, Direction::Bearish) => pulses.int_choch_down = true,
    }
    if event.scope == Scope::Internal {
        match event.direction {
            Direction::Bullish => pulses.int_up_strict = event.strict,
            Direction::Bearish => pulses.int_down_strict = event.strict,
        }
    }
}

/// Logs and swallows a component error so the rest of the bar still runs.
fn recover<T>(what: &str, result: Result<T, EngineError>) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            log::warn!("{what} skipped this bar: {e}");
            None
        }
    }
}
