use crate::config::{ClosePrice, HighPrice, LowPrice, OpenPrice, PriceLike};

// Define the CandleType enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandleType {
    Bullish,
    Bearish,
}

// One closed bar of the feed. Ordinals live in the BarWindow, not here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candle {
    pub close_time_ms: i64,

    pub open_price: OpenPrice,
    pub high_price: HighPrice,
    pub low_price: LowPrice,
    pub close_price: ClosePrice,
}

// Implement methods for the Candle struct
impl Candle {
    // A constructor for convenience
    pub fn new(close_time_ms: i64, open: f64, high: f64, low: f64, close: f64) -> Self {
        Candle {
            close_time_ms,
            open_price: OpenPrice::new(open),
            high_price: HighPrice::new(high),
            low_price: LowPrice::new(low),
            close_price: ClosePrice::new(close),
        }
    }

    // A method to determine the type of candle
    pub fn get_type(&self) -> CandleType {
        if self.close_price.value() >= self.open_price.value() {
            CandleType::Bullish
        } else {
            CandleType::Bearish
        }
    }

    pub fn is_bullish(&self) -> bool {
        self.get_type() == CandleType::Bullish
    }

    pub fn is_bearish(&self) -> bool {
        self.get_type() == CandleType::Bearish
    }

    // Returns the low and high of the candle body as a tuple
    pub fn body_range(&self) -> (f64, f64) {
        match self.get_type() {
            CandleType::Bullish => (self.open_price.value(), self.close_price.value()),
            CandleType::Bearish => (self.close_price.value(), self.open_price.value()),
        }
    }

    /// High minus low.
    pub fn full_range(&self) -> f64 {
        self.high_price.value() - self.low_price.value()
    }

    /// Signed body move as a fraction of the open. Zero when open is zero.
    pub fn body_move_pct(&self) -> f64 {
        let open = self.open_price.value();
        if open <= f64::EPSILON {
            return 0.0;
        }
        (self.close_price.value() - open) / open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_direction() {
        let bull = Candle::new(0, 100.0, 105.0, 99.0, 104.0);
        let bear = Candle::new(0, 104.0, 105.0, 99.0, 100.0);
        assert_eq!(bull.get_type(), CandleType::Bullish);
        assert_eq!(bear.get_type(), CandleType::Bearish);
        // Doji counts as bullish
        assert!(Candle::new(0, 100.0, 101.0, 99.0, 100.0).is_bullish());
    }

    #[test]
    fn body_range_is_ordered() {
        let bear = Candle::new(0, 104.0, 105.0, 99.0, 100.0);
        assert_eq!(bear.body_range(), (100.0, 104.0));
    }
}
