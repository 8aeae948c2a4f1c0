//! Expiry sweep: force-close ladder matches nobody reported on
//!
//! A ladder match still waiting for a submission an hour after it was
//! created closes as an automatic 0-0 draw with full rating application.
//! Matches with a pending confirmation are owned by the confirmation-window
//! timer and are left alone, as are tournament matches.

use crate::error::Result;
use crate::notify::{Notice, Notifier, Recipient, RESULTS_CHANNEL};
use crate::rating::RatingConfig;
use crate::results::apply::apply_outcome;
use crate::store::LadderStore;
use crate::types::MatchStatus;
use crate::utils::current_timestamp;
use chrono::Duration;
use std::sync::Arc;
use tracing::{info, warn};

/// Periodically closes ladder matches stuck past the ceiling
pub struct ExpirySweeper {
    store: Arc<dyn LadderStore>,
    notifier: Arc<dyn Notifier>,
    rating: RatingConfig,
    max_age: Duration,
}

impl ExpirySweeper {
    pub fn new(
        store: Arc<dyn LadderStore>,
        notifier: Arc<dyn Notifier>,
        rating: RatingConfig,
        max_age: Duration,
    ) -> Self {
        Self {
            store,
            notifier,
            rating,
            max_age,
        }
    }

    /// One sweep. Returns how many matches were closed.
    pub async fn sweep(&self) -> Result<usize> {
        let cutoff = current_timestamp() - self.max_age;
        let stale = self.store.ladder_matches_started_before(cutoff)?;

        let mut closed = 0;
        for record in stale {
            // Submitted or adjudicated matches have their own timers
            if record.status != MatchStatus::AwaitingSubmission {
                continue;
            }

            let match_id = record.id;
            let mode = record.mode;
            let players = (record.player_a.clone(), record.player_b.clone());

            let application = match apply_outcome(self.store.as_ref(), &self.rating, record, 0, 0)
            {
                Ok(application) => application,
                Err(e) => {
                    // Leave it for the next sweep
                    warn!("Failed to expire match {}: {}", match_id, e);
                    continue;
                }
            };
            closed += 1;

            info!(
                "Match {} between {} and {} expired, closed as a draw",
                match_id, players.0, players.1
            );

            let notice = Notice::MatchExpired {
                match_id,
                mode,
                rating_changes: application.rating_changes.clone(),
            };
            for nickname in [&players.0, &players.1] {
                match self.store.player(nickname) {
                    Ok(Some(player)) => {
                        self.notifier
                            .send(Recipient::Player(player.platform_id), notice.clone())
                            .await;
                    }
                    Ok(None) => {}
                    Err(e) => warn!("Player lookup for expiry notice failed: {}", e),
                }
            }
            self.notifier
                .send(Recipient::Channel(RESULTS_CHANNEL.to_string()), notice)
                .await;
        }

        Ok(closed)
    }
}
