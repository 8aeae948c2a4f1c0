//! The shared match-creation path
//!
//! Both the pairing pass and the tournament bracket create matches through
//! this launcher, so the record shape, queue-flag clearing, announcements
//! and draft kick-off stay identical for the two match kinds.

use crate::draft::{DraftCoordinator, DraftParticipant};
use crate::error::Result;
use crate::metrics::MetricsCollector;
use crate::notify::{Notice, Notifier, Recipient};
use crate::store::models::{MatchRecord, PlayerRecord};
use crate::store::LadderStore;
use crate::types::{GameMode, MatchId, MatchKind};
use crate::utils::current_timestamp;
use std::sync::Arc;
use tracing::info;

/// Creates match records and runs the shared post-creation steps
pub struct MatchLauncher {
    store: Arc<dyn LadderStore>,
    notifier: Arc<dyn Notifier>,
    drafts: Arc<DraftCoordinator>,
    metrics: Option<MetricsCollector>,
}

impl MatchLauncher {
    pub fn new(
        store: Arc<dyn LadderStore>,
        notifier: Arc<dyn Notifier>,
        drafts: Arc<DraftCoordinator>,
    ) -> Self {
        Self {
            store,
            notifier,
            drafts,
            metrics: None,
        }
    }

    pub fn with_metrics(
        store: Arc<dyn LadderStore>,
        notifier: Arc<dyn Notifier>,
        drafts: Arc<DraftCoordinator>,
        metrics: MetricsCollector,
    ) -> Self {
        Self {
            store,
            notifier,
            drafts,
            metrics: Some(metrics),
        }
    }

    /// Create a match between two players.
    ///
    /// Inserts the record, clears queue membership, announces the pairing,
    /// and — for draft modes — starts the map draft before the players are
    /// told to begin playing.
    pub async fn launch(
        &self,
        mode: GameMode,
        kind: MatchKind,
        player_a: &PlayerRecord,
        player_b: &PlayerRecord,
        bracket: Option<(String, u32)>,
        announce_channel: Option<String>,
    ) -> Result<MatchId> {
        let mut record = MatchRecord::new(
            mode,
            kind,
            player_a.nickname.clone(),
            player_b.nickname.clone(),
            current_timestamp(),
        );
        let tournament = bracket.as_ref().map(|(name, _)| name.clone());
        if let Some((name, round)) = bracket {
            record = record.with_bracket_tag(name, round);
        }

        let match_id = self.store.insert_match(record)?;
        if let Some(metrics) = &self.metrics {
            metrics.record_match_created(kind);
        }

        for player in [player_a, player_b] {
            if player.in_queue {
                let mut updated = player.clone();
                updated.in_queue = false;
                self.store.put_player(updated)?;
            }
        }

        info!(
            "Match {} created - mode: {}, kind: {:?}, {} vs {}",
            match_id, mode, kind, player_a.nickname, player_b.nickname
        );

        if let Some(channel) = announce_channel {
            self.notifier
                .send(
                    Recipient::Channel(channel),
                    Notice::MatchAnnounced {
                        match_id,
                        mode,
                        players: (player_a.nickname.clone(), player_b.nickname.clone()),
                        tournament: tournament.clone(),
                    },
                )
                .await;
        }

        for (player, opponent) in [(player_a, player_b), (player_b, player_a)] {
            self.notifier
                .send(
                    Recipient::Player(player.platform_id.clone()),
                    Notice::MatchFound {
                        match_id,
                        mode,
                        opponent: opponent.nickname.clone(),
                        tournament: tournament.clone(),
                    },
                )
                .await;
        }

        if mode.requires_map_draft() {
            self.drafts
                .start(
                    match_id,
                    [
                        DraftParticipant {
                            nickname: player_a.nickname.clone(),
                            platform_id: player_a.platform_id.clone(),
                        },
                        DraftParticipant {
                            nickname: player_b.nickname.clone(),
                            platform_id: player_b.platform_id.clone(),
                        },
                    ],
                )
                .await?;
        }

        Ok(match_id)
    }
}
