//! Engine evaluation values as reported by the evaluation service.
//!
//! Plain centipawn values live below [`KNOWN_RESULT`]. Above it the value
//! encodes a forced result as a distance inside one of two bands: up to
//! [`CURSED_BAND`] for wins spoiled by the 50-move rule, up to [`WIN_BAND`]
//! for clean wins. Negative values mirror this for the losing side.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Magnitude from which a value denotes a known (forced/tablebase) result.
pub const KNOWN_RESULT: i32 = 18000;
/// Upper boundary of the cursed (drawn with technique) band.
pub const CURSED_BAND: i32 = 20000;
/// Upper boundary of the clean win/loss band.
pub const WIN_BAND: i32 = 30000;

/// Evaluation from the side to move's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub value: i32,
    /// Win probability in [0, 1]; NaN when unknown.
    pub win_pct: f64,
}

impl Score {
    /// Score with win probability derived from the value.
    pub fn new(value: i32) -> Self {
        Self {
            value,
            win_pct: win_probability(value),
        }
    }

    /// Parse the service's string fields. Never fails.
    ///
    /// `value` may carry a trailing alternate encoding ("35 (0.35)"); only its
    /// first token is read, and an unreadable value becomes 0. `win_pct` is a
    /// percentage ("53.2"); when absent the probability is derived from the
    /// value, when unreadable it becomes NaN.
    pub fn parse(value: Option<&str>, win_pct: Option<&str>) -> Self {
        let value = value
            .and_then(|v| v.split_whitespace().next())
            .and_then(|v| v.parse::<i32>().ok())
            .unwrap_or(0);

        let win_pct = if is_known_result(value) {
            win_probability(value)
        } else {
            match win_pct {
                Some(pct) => pct
                    .trim()
                    .parse::<f64>()
                    .map(|p| p / 100.0)
                    .unwrap_or(f64::NAN),
                None => win_probability(value),
            }
        };

        Self { value, win_pct }
    }

    pub fn is_known_result(&self) -> bool {
        is_known_result(self.value)
    }

    /// Expected score for the side to move.
    pub fn perf(&self) -> f64 {
        self.win_pct
    }

    /// Signed distance to the band boundary for known results. Values past
    /// [`WIN_BAND`] count as zero.
    pub fn distance_to_zero(&self) -> Option<i32> {
        if !self.is_known_result() {
            return None;
        }
        let magnitude = self.value.unsigned_abs();
        let band = if magnitude <= CURSED_BAND as u32 {
            CURSED_BAND
        } else {
            WIN_BAND
        };
        let remaining = (band as u32).saturating_sub(magnitude) as i32;
        Some(remaining * self.value.signum())
    }
}

impl From<&str> for Score {
    fn from(value: &str) -> Self {
        Score::parse(Some(value), None)
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.distance_to_zero() {
            None => write!(f, "{}", self.value),
            Some(distance) => {
                let sign = if self.value < 0 { '-' } else { '+' };
                write!(f, "DTZ {sign}{}", distance.abs())
            }
        }
    }
}

fn is_known_result(value: i32) -> bool {
    value.unsigned_abs() >= KNOWN_RESULT as u32
}

/// Logistic win probability; 0 or 1 for known results.
pub fn win_probability(value: i32) -> f64 {
    if is_known_result(value) {
        return if value > 0 { 1.0 } else { 0.0 };
    }
    1.0 / (1.0 + (-(value as f64) / 100.0).exp())
}
