//! Persistence seam for the ladder service
//!
//! The store is a small CRUD interface over the three durable entities
//! (players, matches, tournament brackets). It is assumed durable and
//! immediately consistent; a failing store surfaces as `StoreUnavailable`
//! and the triggering operation is retried on the next scheduled pass.

pub mod memory;
pub mod models;

pub use memory::MemoryStore;
pub use models::{AppliedOutcome, MatchRecord, ModeStats, PlayerRecord};

use crate::error::Result;
use crate::types::{MatchId, MatchKind, PlatformId};
use chrono::{DateTime, Utc};

/// CRUD operations the core needs from its persistence collaborator
pub trait LadderStore: Send + Sync {
    // Players
    fn player(&self, nickname: &str) -> Result<Option<PlayerRecord>>;
    fn player_by_platform_id(&self, id: &PlatformId) -> Result<Option<PlayerRecord>>;
    fn put_player(&self, record: PlayerRecord) -> Result<()>;
    /// Moderator purge: removes the player and cascades their match history
    fn purge_player(&self, nickname: &str) -> Result<bool>;
    fn players(&self) -> Result<Vec<PlayerRecord>>;

    // Matches
    fn insert_match(&self, record: MatchRecord) -> Result<MatchId>;
    fn match_record(&self, id: MatchId) -> Result<Option<MatchRecord>>;
    fn put_match(&self, record: MatchRecord) -> Result<()>;
    /// The player's unresolved match of the given kind, if any
    fn unresolved_match_for(&self, nickname: &str, kind: MatchKind)
        -> Result<Option<MatchRecord>>;
    fn unresolved_matches(&self, kind: MatchKind) -> Result<Vec<MatchRecord>>;
    /// Unresolved ladder matches started before the cutoff
    fn ladder_matches_started_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<MatchRecord>>;

    // Tournament bracket snapshots, keyed by tournament name
    fn put_bracket(&self, name: &str, snapshot: serde_json::Value) -> Result<()>;
    fn bracket(&self, name: &str) -> Result<Option<serde_json::Value>>;
    fn remove_bracket(&self, name: &str) -> Result<bool>;
    fn bracket_names(&self) -> Result<Vec<String>>;
}
