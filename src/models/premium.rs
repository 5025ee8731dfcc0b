//! Premium/discount classification against the trailing external swing band.

use {
    crate::models::swing::{SwingEvent, SwingSide},
    serde::{Deserialize, Serialize},
};

/// Fraction of the band counted as premium (top) / discount (bottom).
const BAND_EDGE: f64 = 0.95;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PremiumDiscount {
    trail_up: Option<f64>,
    trail_dn: Option<f64>,
}

impl PremiumDiscount {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-anchors on every confirmed external swing.
    pub fn on_swing(&mut self, event: &SwingEvent) {
        match event.side {
            SwingSide::High => self.trail_up = Some(event.price),
            SwingSide::Low => self.trail_dn = Some(event.price),
        }
    }

    pub fn band(&self) -> Option<(f64, f64)> {
        match (self.trail_dn, self.trail_up) {
            (Some(dn), Some(up)) => Some((dn, up)),
            _ => None,
        }
    }

    /// (in_premium, in_discount) for a close. Both false until the band
    /// exists and is non-degenerate.
    pub fn classify(&self, close: f64) -> (bool, bool) {
        let Some((dn, up)) = self.band() else {
            return (false, false);
        };
        if up <= dn {
            return (false, false);
        }

        let premium_floor = BAND_EDGE * up + (1.0 - BAND_EDGE) * dn;
        let discount_ceil = BAND_EDGE * dn + (1.0 - BAND_EDGE) * up;
        (close >= premium_floor, close <= discount_ceil)
    }

    #[cfg(test)]
    pub fn with_band(dn: f64, up: f64) -> Self {
        Self {
            trail_up: Some(up),
            trail_dn: Some(dn),
        }
    }
}
