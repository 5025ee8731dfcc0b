//! The shared zone record for order blocks and fair-value gaps.

use {
    crate::{
        config::StopPrice,
        models::swing::{Direction, Scope},
    },
    serde::{Deserialize, Serialize},
    strum_macros::Display,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum ZoneKind {
    OrderBlock,
    Fvg,
}

/// Lifecycle of a zone. Transitions only move forward; a zone leaves the
/// pool through eviction or full-fill deletion, never by reverting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum ZoneState {
    Active,
    Retested,
    Mitigated,
    Invalidated,
}

impl ZoneState {
    fn rank(self) -> u8 {
        match self {
            ZoneState::Active => 0,
            ZoneState::Retested => 1,
            ZoneState::Mitigated => 2,
            ZoneState::Invalidated => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub kind: ZoneKind,
    pub scope: Scope,
    pub direction: Direction,
    pub top: f64,
    pub bottom: f64,
    pub origin_ordinal: usize,
    pub origin_close_time_ms: i64,
    /// Bars since creation. Only the FVG engine ages its zones out.
    pub age_bars: usize,
    /// Edges price has ever reached, accumulated across bars. An internal
    /// order block is deleted once both are set.
    pub hit_top: bool,
    pub hit_bottom: bool,
    pub state: ZoneState,
    pub suggested_stop: StopPrice,
}

impl Zone {
    /// Moves the lifecycle forward. Backward transitions are ignored,
    /// which keeps state monotonic no matter the caller's ordering.
    pub fn advance(&mut self, next: ZoneState) -> bool {
        if next.rank() > self.state.rank() {
            log::debug!(
                "{} {} zone [{}, {}] {} -> {}",
                self.scope,
                self.direction,
                self.bottom,
                self.top,
                self.state,
                next
            );
            self.state = next;
            true
        } else {
            false
        }
    }

    pub fn is_active(&self) -> bool {
        self.state != ZoneState::Invalidated
    }

    pub fn mid(&self) -> f64 {
        (self.top + self.bottom) / 2.0
    }

    /// Distance from a reference price to the nearest point of the zone.
    pub fn distance_to(&self, price: f64) -> f64 {
        if price > self.top {
            price - self.top
        } else if price < self.bottom {
            self.bottom - price
        } else {
            0.0
        }
    }
}

/// Read-only zone descriptor exported on the public snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneRef {
    pub kind: ZoneKind,
    pub scope: Scope,
    pub direction: Direction,
    pub top: f64,
    pub bottom: f64,
    pub origin_ordinal: usize,
    pub state: ZoneState,
}

impl From<&Zone> for ZoneRef {
    fn from(z: &Zone) -> Self {
        Self {
            kind: z.kind,
            scope: z.scope,
            direction: z.direction,
            top: z.top,
            bottom: z.bottom,
            origin_ordinal: z.origin_ordinal,
            state: z.state,
        }
    }
}
