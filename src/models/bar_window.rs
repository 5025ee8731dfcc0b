//! Append-only bar history for one timeframe, stored as column vectors.
//! All lookups are bars-ago indexed (0 = the bar just closed) and fail with
//! `InsufficientHistory` instead of clamping.

use {
    crate::{
        config::{ClosePrice, HighPrice, LowPrice, OpenPrice, PriceLike},
        domain::Candle,
        error::{EngineError, EngineResult},
        utils::{get_max, get_min},
    },
    serde::{Deserialize, Serialize},
};

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct BarWindow {
    pub close_times: Vec<i64>,
    pub open_prices: Vec<OpenPrice>,
    pub high_prices: Vec<HighPrice>,
    pub low_prices: Vec<LowPrice>,
    pub close_prices: Vec<ClosePrice>,

    // Raw copies for window scans (argminmax wants plain slices)
    high_raw: Vec<f64>,
    low_raw: Vec<f64>,

    /// Collaborator smoothed-range (ATR-equivalent) per bar, when supplied.
    pub smoothed_ranges: Vec<Option<f64>>,
}

impl BarWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, candle: &Candle, smoothed_range: Option<f64>) {
        self.close_times.push(candle.close_time_ms);
        self.open_prices.push(candle.open_price);
        self.high_prices.push(candle.high_price);
        self.low_prices.push(candle.low_price);
        self.close_prices.push(candle.close_price);
        self.high_raw.push(candle.high_price.value());
        self.low_raw.push(candle.low_price.value());
        self.smoothed_ranges.push(smoothed_range);
    }

    pub fn bars(&self) -> usize {
        self.close_times.len()
    }

    fn idx_ago(&self, bars_ago: usize) -> EngineResult<usize> {
        let len = self.bars();
        if bars_ago >= len {
            return Err(EngineError::InsufficientHistory {
                requested: bars_ago,
                available: len,
            });
        }
        Ok(len - 1 - bars_ago)
    }

    pub fn candle_ago(&self, bars_ago: usize) -> EngineResult<Candle> {
        let idx = self.idx_ago(bars_ago)?;
        Ok(Candle {
            close_time_ms: self.close_times[idx],
            open_price: self.open_prices[idx],
            high_price: self.high_prices[idx],
            low_price: self.low_prices[idx],
            close_price: self.close_prices[idx],
        })
    }

    pub fn open_ago(&self, bars_ago: usize) -> EngineResult<OpenPrice> {
        Ok(self.open_prices[self.idx_ago(bars_ago)?])
    }

    pub fn high_ago(&self, bars_ago: usize) -> EngineResult<HighPrice> {
        Ok(self.high_prices[self.idx_ago(bars_ago)?])
    }

    pub fn low_ago(&self, bars_ago: usize) -> EngineResult<LowPrice> {
        Ok(self.low_prices[self.idx_ago(bars_ago)?])
    }

    pub fn close_ago(&self, bars_ago: usize) -> EngineResult<ClosePrice> {
        Ok(self.close_prices[self.idx_ago(bars_ago)?])
    }

    pub fn close_time_ago(&self, bars_ago: usize) -> EngineResult<i64> {
        Ok(self.close_times[self.idx_ago(bars_ago)?])
    }

    pub fn smoothed_range_ago(&self, bars_ago: usize) -> EngineResult<Option<f64>> {
        Ok(self.smoothed_ranges[self.idx_ago(bars_ago)?])
    }

    /// Smoothed range with absence surfaced as `MissingCollaboratorValue`,
    /// so callers can pick their own degraded fallback.
    pub fn require_smoothed_range(&self, bars_ago: usize) -> EngineResult<f64> {
        self.smoothed_range_ago(bars_ago)?
            .ok_or(EngineError::MissingCollaboratorValue("smoothed range"))
    }

    /// Ordinal of the bar `bars_ago` back: 0 for the first bar ever pushed.
    pub fn ordinal_ago(&self, bars_ago: usize) -> EngineResult<usize> {
        self.idx_ago(bars_ago)
    }

    /// True range of a bar: full range extended to the previous close.
    /// The very first bar has no previous close and uses high-low alone.
    pub fn true_range_ago(&self, bars_ago: usize) -> EngineResult<f64> {
        let candle = self.candle_ago(bars_ago)?;
        let hl = candle.full_range();
        match self.close_ago(bars_ago + 1) {
            Ok(prev_close) => {
                let pc = prev_close.value();
                let hc = (candle.high_price.value() - pc).abs();
                let lc = (candle.low_price.value() - pc).abs();
                Ok(hl.max(hc).max(lc))
            }
            Err(_) => Ok(hl),
        }
    }

    /// Highest high over bars-ago `[newest_ago, newest_ago + count)`.
    pub fn highest_high(&self, newest_ago: usize, count: usize) -> EngineResult<f64> {
        let slice = self.scan_slice(&self.high_raw, newest_ago, count)?;
        Ok(get_max(slice))
    }

    /// Lowest low over bars-ago `[newest_ago, newest_ago + count)`.
    pub fn lowest_low(&self, newest_ago: usize, count: usize) -> EngineResult<f64> {
        let slice = self.scan_slice(&self.low_raw, newest_ago, count)?;
        Ok(get_min(slice))
    }

    fn scan_slice<'a>(
        &self,
        col: &'a [f64],
        newest_ago: usize,
        count: usize,
    ) -> EngineResult<&'a [f64]> {
        if count == 0 {
            return Err(EngineError::InsufficientHistory {
                requested: newest_ago,
                available: self.bars(),
            });
        }
        let oldest_ago = newest_ago + count - 1;
        let oldest_idx = self.idx_ago(oldest_ago)?;
        let newest_idx = self.idx_ago(newest_ago)?;
        Ok(&col[oldest_idx..=newest_idx])
    }
}
