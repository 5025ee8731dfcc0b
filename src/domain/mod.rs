mod candle;
mod timeframe;

pub use candle::{Candle, CandleType};
pub use timeframe::Timeframe;
