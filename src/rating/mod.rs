//! Rating engine for the ladder
//!
//! A dampened Elo variant: logistic expected score with a per-player weight
//! that shrinks the effective K-factor as a rating approaches the ceiling.

pub mod elo;

pub use elo::{rate, RatingConfig};
