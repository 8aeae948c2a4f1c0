//! Dampened Elo rating calculation
//!
//! `rate` is pure and total over ratings >= 0: no I/O, no randomness, no
//! failure modes. Callers are responsible for recomputing a player's
//! aggregate rating whenever one of the mode ratings changes.

use crate::types::Outcome;

/// Constants of the rating update
#[derive(Debug, Clone, Copy)]
pub struct RatingConfig {
    /// Base K-factor
    pub k_factor: f64,
    /// Logistic scale of the expected-score curve
    pub scale: f64,
    /// Dampening ceiling: weight = ceiling / (ceiling + rating), so the
    /// effective K-factor halves by the time a rating reaches the ceiling
    pub ceiling: f64,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            k_factor: 40.0,
            scale: 400.0,
            ceiling: 4000.0,
        }
    }
}

impl RatingConfig {
    /// Build from the ladder section of the application config
    pub fn from_settings(settings: &crate::config::LadderSettings) -> Self {
        Self {
            k_factor: settings.k_factor,
            scale: settings.rating_scale,
            ceiling: settings.rating_ceiling,
        }
    }
}

/// Compute new ratings for both players from a match outcome.
///
/// Returns `(new_rating_a, new_rating_b)`, rounded to the nearest integer.
pub fn rate(config: &RatingConfig, rating_a: i64, rating_b: i64, outcome: Outcome) -> (i64, i64) {
    let (ra, rb) = (rating_a as f64, rating_b as f64);

    let expected_a = 1.0 / (1.0 + 10f64.powf((rb - ra) / config.scale));
    let expected_b = 1.0 - expected_a;

    let weight_a = config.ceiling / (config.ceiling + ra);
    let weight_b = config.ceiling / (config.ceiling + rb);

    let score_a = outcome.score_a();
    let new_a = ra + config.k_factor * (score_a - expected_a) * weight_a;
    let new_b = rb + config.k_factor * ((1.0 - score_a) - expected_b) * weight_b;

    (new_a.round() as i64, new_b.round() as i64)
}
