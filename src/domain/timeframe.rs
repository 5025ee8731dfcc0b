use {
    serde::{Deserialize, Serialize},
    strum_macros::{Display, EnumIter, EnumString},
};

/// Bar interval of a feed. The primary feed is whatever the caller drives
/// `on_primary_bar` with; mirrors are always strictly higher intervals.
#[derive(
    Serialize,
    Deserialize,
    Debug,
    Clone,
    Copy,
    Hash,
    Eq,
    PartialEq,
    PartialOrd,
    Ord,
    Display,
    EnumIter,
    EnumString,
)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    H1,
    H4,
    D1,
}

impl Timeframe {
    pub fn interval_ms(self) -> i64 {
        use crate::utils::TimeUtils;
        match self {
            Timeframe::M1 => TimeUtils::MS_IN_MIN,
            Timeframe::M5 => TimeUtils::MS_IN_5_MIN,
            Timeframe::M15 => TimeUtils::MS_IN_15_MIN,
            Timeframe::H1 => TimeUtils::MS_IN_H,
            Timeframe::H4 => 4 * TimeUtils::MS_IN_H,
            Timeframe::D1 => TimeUtils::MS_IN_D,
        }
    }
}
