//! Common types used throughout the ladder service

use serde::{Deserialize, Serialize};

/// Chat-platform identity of a player (opaque to the core)
pub type PlatformId = String;

/// Unique identifier for matches
pub type MatchId = u64;

/// Concrete game modes with independent rating ladders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameMode {
    Flags,
    Duel,
    Blitz,
}

impl GameMode {
    /// All concrete modes, in display order
    pub const ALL: [GameMode; 3] = [GameMode::Flags, GameMode::Duel, GameMode::Blitz];

    /// Whether matches in this mode open with a map-elimination draft
    pub fn requires_map_draft(&self) -> bool {
        matches!(self, GameMode::Duel | GameMode::Blitz)
    }
}

impl std::fmt::Display for GameMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameMode::Flags => write!(f, "Flags"),
            GameMode::Duel => write!(f, "Duel"),
            GameMode::Blitz => write!(f, "Blitz"),
        }
    }
}

/// What a player asked to queue for: a concrete mode, or anything
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueMode {
    Any,
    Mode(GameMode),
}

impl std::fmt::Display for QueueMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueMode::Any => write!(f, "Any"),
            QueueMode::Mode(mode) => mode.fmt(f),
        }
    }
}

/// Ladder and tournament matches are independent concurrency domains:
/// an unresolved match of one kind never blocks queueing for the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchKind {
    Ladder,
    Tournament,
}

/// Lifecycle of a match record.
///
/// `AwaitingModeratorDecision` covers disputes, lapsed confirmation windows
/// and report freezes alike; `Verified` is terminal (ratings applied, match
/// closed). A rejected result returns the match to `AwaitingSubmission`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStatus {
    AwaitingSubmission,
    AwaitingOpponentConfirmation,
    AwaitingModeratorDecision,
    Verified,
}

impl MatchStatus {
    /// A match that still counts as "in play" for queue exclusion and expiry
    pub fn is_unresolved(&self) -> bool {
        !matches!(self, MatchStatus::Verified)
    }
}

/// Outcome of a match from player A's perspective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    WinA,
    WinB,
    Draw,
}

impl Outcome {
    /// Actual score for player A in the logistic model (1, 0 or 0.5)
    pub fn score_a(&self) -> f64 {
        match self {
            Outcome::WinA => 1.0,
            Outcome::WinB => 0.0,
            Outcome::Draw => 0.5,
        }
    }

    /// Derive the outcome from a submitted score pair
    pub fn from_scores(score_a: u32, score_b: u32) -> Self {
        match score_a.cmp(&score_b) {
            std::cmp::Ordering::Greater => Outcome::WinA,
            std::cmp::Ordering::Less => Outcome::WinB,
            std::cmp::Ordering::Equal => Outcome::Draw,
        }
    }

    /// The same outcome with the two sides swapped
    pub fn flipped(&self) -> Self {
        match self {
            Outcome::WinA => Outcome::WinB,
            Outcome::WinB => Outcome::WinA,
            Outcome::Draw => Outcome::Draw,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_modes() {
        assert!(!GameMode::Flags.requires_map_draft());
        assert!(GameMode::Duel.requires_map_draft());
        assert!(GameMode::Blitz.requires_map_draft());
    }

    #[test]
    fn test_outcome_from_scores() {
        assert_eq!(Outcome::from_scores(5, 3), Outcome::WinA);
        assert_eq!(Outcome::from_scores(2, 7), Outcome::WinB);
        assert_eq!(Outcome::from_scores(0, 0), Outcome::Draw);
    }

    #[test]
    fn test_outcome_flip() {
        assert_eq!(Outcome::WinA.flipped(), Outcome::WinB);
        assert_eq!(Outcome::Draw.flipped(), Outcome::Draw);
    }

    #[test]
    fn test_unresolved_statuses() {
        assert!(MatchStatus::AwaitingSubmission.is_unresolved());
        assert!(MatchStatus::AwaitingOpponentConfirmation.is_unresolved());
        assert!(MatchStatus::AwaitingModeratorDecision.is_unresolved());
        assert!(!MatchStatus::Verified.is_unresolved());
    }
}
