mod maths_utils;
mod time_utils;

pub use time_utils::{TimeUtils, epoch_ms_to_utc};

pub(crate) use maths_utils::{get_max, get_min};
