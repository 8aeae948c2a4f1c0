//! Notification seam between the core and the chat platform
//!
//! The core never renders messages; it emits typed notices through the
//! `Notifier` trait and lets the platform adapter decide presentation.
//! Delivery is fire-and-forget: failures are logged and never block or
//! roll back core state transitions.

use crate::error::Result;
use crate::types::{GameMode, MatchId, PlatformId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Broadcast channel for closed-match announcements
pub const RESULTS_CHANNEL: &str = "ladder-results";

/// Where a notice is delivered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipient {
    /// Direct message to a player's chat-platform identity
    Player(PlatformId),
    /// The moderator on duty
    Moderator,
    /// A named broadcast channel (queue channel, results feed, bracket feed)
    Channel(String),
}

/// Typed notification payloads the core can emit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Notice {
    MatchFound {
        match_id: MatchId,
        mode: GameMode,
        opponent: String,
        tournament: Option<String>,
    },
    MatchAnnounced {
        match_id: MatchId,
        mode: GameMode,
        players: (String, String),
        tournament: Option<String>,
    },
    DraftTurn {
        match_id: MatchId,
        remaining_maps: Vec<String>,
    },
    DraftWaiting {
        match_id: MatchId,
        picking_player: String,
    },
    DraftAutoPick {
        match_id: MatchId,
        eliminated_map: String,
    },
    DraftResolved {
        match_id: MatchId,
        map: String,
        opponent: String,
    },
    ConfirmationRequested {
        match_id: MatchId,
        scores: (u32, u32),
        evidence: Option<String>,
        window_seconds: u64,
    },
    ConfirmationLapsed {
        match_id: MatchId,
    },
    ResultVerified {
        match_id: MatchId,
        mode: GameMode,
        winner: String,
        scores: (u32, u32),
        rating_changes: Vec<(String, i64, i64)>,
    },
    ResultRejected {
        match_id: MatchId,
    },
    ModeratorReview {
        match_id: MatchId,
        submitter: String,
        opponent: String,
        scores: (u32, u32),
        evidence: Option<String>,
    },
    TechnicalLoss {
        match_id: MatchId,
        winner: String,
        loser: String,
        rating_changes: Vec<(String, i64, i64)>,
    },
    MatchForfeited {
        match_id: MatchId,
        winner: String,
        loser: String,
        rating_changes: Vec<(String, i64, i64)>,
    },
    MatchExpired {
        match_id: MatchId,
        mode: GameMode,
        rating_changes: Vec<(String, i64, i64)>,
    },
    ReportFiled {
        match_id: MatchId,
        reporter: String,
        accused: String,
        reason: String,
        evidence: Option<String>,
    },
    ReportAccepted {
        match_id: MatchId,
    },
    ReportRejected {
        match_id: MatchId,
    },
    RoundStarted {
        tournament: String,
        round: u32,
        match_ids: Vec<MatchId>,
        auto_advanced: Vec<String>,
    },
    AutoAdvanced {
        tournament: String,
        round: u32,
    },
    TournamentWon {
        tournament: String,
        champion: String,
    },
}

/// Trait for delivering notices to the chat platform
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a notice. Implementations may retry internally.
    async fn notify(&self, recipient: Recipient, notice: Notice) -> Result<()>;

    /// Fire-and-forget delivery: failures are logged and swallowed so a dead
    /// notification channel can never stall a state transition.
    async fn send(&self, recipient: Recipient, notice: Notice) {
        if let Err(e) = self.notify(recipient.clone(), notice).await {
            warn!("Notice delivery to {:?} failed: {}", recipient, e);
        }
    }
}

/// Recording notifier for tests
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: std::sync::Mutex<Vec<(Recipient, Notice)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// All notices recorded so far
    pub fn sent(&self) -> Vec<(Recipient, Notice)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Number of notices matching a predicate
    pub fn count_matching(&self, predicate: impl Fn(&Recipient, &Notice) -> bool) -> usize {
        self.sent()
            .iter()
            .filter(|(r, n)| predicate(r, n))
            .count()
    }

    pub fn clear(&self) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.clear();
        }
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, recipient: Recipient, notice: Notice) -> Result<()> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((recipient, notice));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_notifier_captures_notices() {
        let notifier = RecordingNotifier::new();
        tokio_test::block_on(notifier.send(
            Recipient::Player("p1".to_string()),
            Notice::ResultRejected { match_id: 7 },
        ));

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, Recipient::Player("p1".to_string()));
        assert_eq!(
            notifier.count_matching(|_, n| matches!(n, Notice::ResultRejected { .. })),
            1
        );
    }

    #[test]
    fn test_notice_serialization_is_tagged() {
        let notice = Notice::ReportRejected { match_id: 3 };
        let json = serde_json::to_string(&notice).unwrap();
        assert!(json.contains("\"type\":\"ReportRejected\""));
    }
}
