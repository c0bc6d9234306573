//! Score Value Object
//!
//! A scalar confidence/quality value that is always well-formed: never
//! negative, never NaN, never above 1.0 (spec §3 "Score").

use serde::{Deserialize, Serialize};

/// A scalar in `[0, 1]`. Construction always clamps, so a `Score` is a
/// compile-time guarantee that downstream consumers never see NaN or an
/// out-of-range value.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Score(f32);

impl Score {
    pub const ZERO: Score = Score(0.0);
    pub const ONE: Score = Score(1.0);

    /// Creates a score, clamping into `[0, 1]` and replacing NaN with 0.0.
    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            Score(0.0)
        } else {
            Score(value.clamp(0.0, 1.0))
        }
    }

    pub fn value(&self) -> f32 {
        self.0
    }

    /// Whether this score meets or exceeds `threshold`.
    pub fn passes(&self, threshold: f32) -> bool {
        self.0 >= threshold
    }
}

impl Default for Score {
    fn default() -> Self {
        Score::ZERO
    }
}

impl From<f32> for Score {
    fn from(value: f32) -> Self {
        Score::new(value)
    }
}

impl std::ops::Mul<f32> for Score {
    type Output = Score;

    fn mul(self, rhs: f32) -> Score {
        Score::new(self.0 * rhs)
    }
}

impl std::ops::Add for Score {
    type Output = Score;

    fn add(self, rhs: Score) -> Score {
        Score::new(self.0 + rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_above_one() {
        assert_eq!(Score::new(1.5).value(), 1.0);
    }

    #[test]
    fn clamps_below_zero() {
        assert_eq!(Score::new(-0.2).value(), 0.0);
    }

    #[test]
    fn nan_becomes_zero() {
        assert_eq!(Score::new(f32::NAN).value(), 0.0);
    }

    #[test]
    fn passes_respects_threshold() {
        let s = Score::new(0.7);
        assert!(s.passes(0.6));
        assert!(!s.passes(0.8));
    }
}
