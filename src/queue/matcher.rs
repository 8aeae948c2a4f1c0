//! Pairing primitives over waiting lists
//!
//! Pure index arithmetic: the manager owns the lists and the locking, these
//! helpers only answer "who pairs with whom".

use crate::types::PlatformId;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;

/// A player waiting in one of the lists
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub nickname: String,
    pub platform_id: PlatformId,
    /// Pairing key: the mode rating at enqueue time (aggregate rating for
    /// the any-mode list)
    pub rating: i64,
    /// Tiebreak for partner selection
    pub enqueued_at: DateTime<Utc>,
    /// Channel the enqueue came from, for match announcements
    pub reply_channel: Option<String>,
}

/// Index of the earliest-enqueued eligible entry
pub fn earliest_index(
    entries: &VecDeque<QueueEntry>,
    eligible: impl Fn(&QueueEntry) -> bool,
) -> Option<usize> {
    entries
        .iter()
        .enumerate()
        .filter(|(_, e)| eligible(e))
        .min_by_key(|(_, e)| e.enqueued_at)
        .map(|(index, _)| index)
}

/// Index of the eligible entry closest in rating to the anchor, ties broken
/// by earliest enqueue. `skip` excludes the anchor's own slot.
pub fn closest_rating_index(
    entries: &VecDeque<QueueEntry>,
    anchor_rating: i64,
    skip: Option<usize>,
    eligible: impl Fn(&QueueEntry) -> bool,
) -> Option<usize> {
    entries
        .iter()
        .enumerate()
        .filter(|(index, e)| Some(*index) != skip && eligible(e))
        .min_by_key(|(_, e)| ((e.rating - anchor_rating).abs(), e.enqueued_at))
        .map(|(index, _)| index)
}
