//! Ephemeral state carried between submission and resolution

use crate::types::MatchId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A submitted, not-yet-confirmed match outcome. Scores are normalized to
/// the match's A/B sides regardless of who submitted.
#[derive(Debug, Clone)]
pub struct PendingResult {
    pub match_id: MatchId,
    pub score_a: u32,
    pub score_b: u32,
    pub evidence: Option<String>,
    pub submitter: String,
    pub opponent: String,
    pub submitted_at: DateTime<Utc>,
    /// Distinguishes this submission from earlier ones on the same match so
    /// a stale confirmation-window timer cannot act on a newer result.
    pub seq: u64,
}

/// A rule-violation report filed against the opponent
#[derive(Debug, Clone)]
pub struct PendingReport {
    pub match_id: MatchId,
    pub reporter: String,
    pub accused: String,
    pub reason: String,
    pub evidence: Option<String>,
    pub filed_at: DateTime<Utc>,
}

/// The three ways a moderator can settle an adjudicated result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModeratorDecision {
    /// Apply the pending result as submitted
    Confirm,
    /// Discard the pending result and reopen the match
    Reject,
    /// Walkover in favor of the offender's opponent
    TechnicalLoss { offender: String },
}

/// Moderator action on a filed report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportDecision {
    Accept,
    Reject,
}
