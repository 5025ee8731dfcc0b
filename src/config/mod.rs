mod engine;
mod types;

pub use engine::{
    BreakSettings, EngineConfig, FvgSettings, FvgThresholdMode, OrderBlockSettings, SwingSettings,
    defaults,
};
pub use types::{
    ClosePrice, HighPrice, LowPrice, OpenPrice, Price, PriceLike, StopPrice, TickSize,
};
