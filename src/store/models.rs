//! Durable record types stored by the persistence collaborator

use crate::types::{GameMode, MatchId, MatchKind, MatchStatus, Outcome, PlatformId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Win/loss/tie counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeStats {
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
}

impl ModeStats {
    /// Count one outcome for this side (`won == None` means a tie)
    pub fn record(&mut self, won: Option<bool>) {
        match won {
            Some(true) => self.wins += 1,
            Some(false) => self.losses += 1,
            None => self.ties += 1,
        }
    }

    /// Undo a previously recorded outcome
    pub fn unrecord(&mut self, won: Option<bool>) {
        match won {
            Some(true) => self.wins = self.wins.saturating_sub(1),
            Some(false) => self.losses = self.losses.saturating_sub(1),
            None => self.ties = self.ties.saturating_sub(1),
        }
    }
}

/// A verified player on the ladder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerRecord {
    /// Chat-platform identity (unique)
    pub platform_id: PlatformId,
    /// Display nickname (unique)
    pub nickname: String,
    pub rating_flags: i64,
    pub rating_duel: i64,
    pub rating_blitz: i64,
    /// Always the sum of the three mode ratings
    pub aggregate_rating: i64,
    /// Global counters across all modes
    pub overall: ModeStats,
    pub flags: ModeStats,
    pub duel: ModeStats,
    pub blitz: ModeStats,
    pub in_queue: bool,
    pub banned: bool,
    pub blacklisted: bool,
}

impl PlayerRecord {
    /// Create a fresh player with every mode at the default rating
    pub fn new(platform_id: PlatformId, nickname: String, default_rating: i64) -> Self {
        Self {
            platform_id,
            nickname,
            rating_flags: default_rating,
            rating_duel: default_rating,
            rating_blitz: default_rating,
            aggregate_rating: default_rating * 3,
            overall: ModeStats::default(),
            flags: ModeStats::default(),
            duel: ModeStats::default(),
            blitz: ModeStats::default(),
            in_queue: false,
            banned: false,
            blacklisted: false,
        }
    }

    /// Rating on a specific mode's ladder
    pub fn rating(&self, mode: GameMode) -> i64 {
        match mode {
            GameMode::Flags => self.rating_flags,
            GameMode::Duel => self.rating_duel,
            GameMode::Blitz => self.rating_blitz,
        }
    }

    /// Write a mode rating and recompute the aggregate
    pub fn set_rating(&mut self, mode: GameMode, rating: i64) {
        match mode {
            GameMode::Flags => self.rating_flags = rating,
            GameMode::Duel => self.rating_duel = rating,
            GameMode::Blitz => self.rating_blitz = rating,
        }
        self.aggregate_rating = self.rating_flags + self.rating_duel + self.rating_blitz;
    }

    /// Per-mode counters
    pub fn mode_stats_mut(&mut self, mode: GameMode) -> &mut ModeStats {
        match mode {
            GameMode::Flags => &mut self.flags,
            GameMode::Duel => &mut self.duel,
            GameMode::Blitz => &mut self.blitz,
        }
    }

    /// Count an outcome on both the global and the mode counters
    pub fn record_outcome(&mut self, mode: GameMode, won: Option<bool>) {
        self.overall.record(won);
        self.mode_stats_mut(mode).record(won);
    }

    /// Undo a previously counted outcome on both counter sets
    pub fn unrecord_outcome(&mut self, mode: GameMode, won: Option<bool>) {
        self.overall.unrecord(won);
        self.mode_stats_mut(mode).unrecord(won);
    }
}

/// Rating deltas and counters applied when a match verified, kept for exact
/// rollback when a technical loss overturns an already-verified result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedOutcome {
    pub outcome: Outcome,
    /// Rating change applied to player A (zero for tournament matches)
    pub delta_a: i64,
    /// Rating change applied to player B (zero for tournament matches)
    pub delta_b: i64,
}

/// A match on the permanent audit trail. Never deleted (outside player
/// purges), only closed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: MatchId,
    pub mode: GameMode,
    pub kind: MatchKind,
    pub player_a: String,
    pub player_b: String,
    pub status: MatchStatus,
    pub score_a: Option<u32>,
    pub score_b: Option<u32>,
    pub map: Option<String>,
    pub tournament: Option<String>,
    pub round: Option<u32>,
    pub started_at: DateTime<Utc>,
    pub applied: Option<AppliedOutcome>,
}

impl MatchRecord {
    /// A freshly paired match awaiting play (id is assigned on insert)
    pub fn new(
        mode: GameMode,
        kind: MatchKind,
        player_a: String,
        player_b: String,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: 0,
            mode,
            kind,
            player_a,
            player_b,
            status: MatchStatus::AwaitingSubmission,
            score_a: None,
            score_b: None,
            map: None,
            tournament: None,
            round: None,
            started_at,
            applied: None,
        }
    }

    /// Tag this match as part of a tournament round
    pub fn with_bracket_tag(mut self, tournament: String, round: u32) -> Self {
        self.tournament = Some(tournament);
        self.round = Some(round);
        self
    }

    pub fn has_participant(&self, nickname: &str) -> bool {
        self.player_a == nickname || self.player_b == nickname
    }

    /// The other participant, if `nickname` is one of the two
    pub fn opponent_of(&self, nickname: &str) -> Option<&str> {
        if self.player_a == nickname {
            Some(&self.player_b)
        } else if self.player_b == nickname {
            Some(&self.player_a)
        } else {
            None
        }
    }

    /// Winner nickname by higher score, if the match is scored and decisive
    pub fn winner(&self) -> Option<&str> {
        match (self.score_a, self.score_b) {
            (Some(a), Some(b)) if a > b => Some(&self.player_a),
            (Some(a), Some(b)) if b > a => Some(&self.player_b),
            _ => None,
        }
    }
}
