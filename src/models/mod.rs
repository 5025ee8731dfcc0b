mod bar_window;
mod breaks;
mod fvg;
mod order_block;
mod premium;
mod snapshot;
mod swing;
mod zone;

pub use bar_window::BarWindow;
pub use breaks::{BreakClassifier, BreakEvent, BreakKind, detect_sweeps};
pub use fvg::{FvgPool, FvgPulses};
pub use order_block::{ObPulses, OrderBlockPool};
pub use premium::PremiumDiscount;
pub use snapshot::{MirrorSnapshot, Pulses, Snapshot, SwingLevels};
pub use swing::{
    Direction, Scope, SwingEvent, SwingLevel, SwingPattern, SwingSide, SwingTracker,
};
pub use zone::{Zone, ZoneKind, ZoneRef, ZoneState};
