//! Error types for the ladder service
//!
//! Errors fall into four families: validation (bad input, never retried),
//! conflict (current state forbids the operation), not-found, and transient
//! infrastructure failures. Nothing here is fatal to the process.

use crate::types::MatchId;

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific ladder scenarios
#[derive(Debug, thiserror::Error)]
pub enum LadderError {
    // Validation
    #[error("scores cannot be equal ({score_a}-{score_b}): a match must have a winner")]
    ScoresEqual { score_a: u32, score_b: u32 },

    #[error("a result submission must include evidence")]
    EvidenceRequired,

    #[error("player {player} is not a participant of match {match_id}")]
    NotAParticipant { player: String, match_id: MatchId },

    #[error("it is not {player}'s turn to pick")]
    OutOfTurn { player: String },

    #[error("no active draft for match {match_id}")]
    DraftNotFound { match_id: MatchId },

    #[error("map '{map}' is not in the remaining pool")]
    UnknownMap { map: String },

    #[error("slot count {slots} is not supported (use 8, 16, 32 or 64)")]
    InvalidSlotCount { slots: usize },

    #[error("invalid command: {reason}")]
    InvalidCommand { reason: String },

    // Conflicts
    #[error("player {player} is already queued")]
    AlreadyQueued { player: String },

    #[error("player {player} has an unresolved ladder match (id {match_id})")]
    ActiveMatchExists { player: String, match_id: MatchId },

    #[error("match {match_id} has an open report")]
    ReportPending { match_id: MatchId },

    #[error("match {match_id} already has a result awaiting confirmation")]
    ResultPending { match_id: MatchId },

    #[error("match {match_id} is already closed")]
    MatchClosed { match_id: MatchId },

    #[error("match {match_id} has no result awaiting confirmation")]
    NoPendingResult { match_id: MatchId },

    #[error("player {player} has no active match")]
    NoActiveMatch { player: String },

    #[error("match {match_id} has no open report")]
    NoOpenReport { match_id: MatchId },

    #[error("tournament '{name}' already exists")]
    TournamentExists { name: String },

    #[error("tournament '{name}' is full")]
    TournamentFull { name: String },

    #[error("registration for tournament '{name}' is closed")]
    RegistrationClosed { name: String },

    #[error("player {player} may not register for '{name}': {reason}")]
    RegistrationRefused {
        player: String,
        name: String,
        reason: String,
    },

    // Not found
    #[error("match {match_id} not found")]
    MatchNotFound { match_id: MatchId },

    #[error("player {player} not found")]
    PlayerNotFound { player: String },

    #[error("tournament '{name}' not found")]
    TournamentNotFound { name: String },

    // Infrastructure
    #[error("broker connection failed: {message}")]
    BrokerConnectionFailed { message: String },

    #[error("store operation failed: {message}")]
    StoreUnavailable { message: String },

    #[error("configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("internal service error: {message}")]
    InternalError { message: String },
}
