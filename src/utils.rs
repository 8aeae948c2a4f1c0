//! Utility functions for the ladder service

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a correlation id for outbound messages
pub fn generate_correlation_id() -> Uuid {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Absolute difference between two integer ratings
pub fn rating_difference(rating1: i64, rating2: i64) -> i64 {
    (rating1 - rating2).abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_unique_ids() {
        let id1 = generate_correlation_id();
        let id2 = generate_correlation_id();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_rating_difference() {
        assert_eq!(rating_difference(1500, 1400), 100);
        assert_eq!(rating_difference(1400, 1500), 100);
        assert_eq!(rating_difference(1500, 1500), 0);
    }
}
