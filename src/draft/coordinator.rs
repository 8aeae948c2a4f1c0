//! Draft coordinator: timers, persistence and notifications around sessions
//!
//! Sessions live in an owned map keyed by match id. Every turn arms an
//! abortable timer handle stored next to the session; manual picks abort it
//! before mutating, and a timer that fires late re-checks the turn sequence
//! before acting.

use crate::draft::session::{DraftParticipant, DraftSession, DraftStep};
use crate::error::{LadderError, Result};
use crate::notify::{Notice, Notifier, Recipient};
use crate::store::LadderStore;
use crate::types::{MatchId, PlatformId};
use rand::Rng;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, info, warn};

struct ActiveDraft {
    session: DraftSession,
    timer: Option<JoinHandle<()>>,
}

/// What a completed elimination step requires from the coordinator,
/// computed under the session lock and executed after releasing it.
enum Advance {
    Continue {
        seq: u64,
        picker: DraftParticipant,
        waiting: DraftParticipant,
        remaining: Vec<String>,
    },
    Resolved {
        map: String,
        participants: [DraftParticipant; 2],
    },
}

/// Coordinates all in-flight map drafts
pub struct DraftCoordinator {
    sessions: RwLock<HashMap<MatchId, ActiveDraft>>,
    store: Arc<dyn LadderStore>,
    notifier: Arc<dyn Notifier>,
    pick_timeout: Duration,
    map_pool: Vec<String>,
}

impl DraftCoordinator {
    pub fn new(
        store: Arc<dyn LadderStore>,
        notifier: Arc<dyn Notifier>,
        pick_timeout: Duration,
        map_pool: Vec<String>,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            store,
            notifier,
            pick_timeout,
            map_pool,
        }
    }

    fn lock_err() -> LadderError {
        LadderError::InternalError {
            message: "Failed to acquire draft sessions lock".to_string(),
        }
    }

    /// Number of drafts currently in flight
    pub fn active_count(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    /// Begin a draft for a freshly created match. The first participant
    /// picks first.
    pub async fn start(
        self: &Arc<Self>,
        match_id: MatchId,
        participants: [DraftParticipant; 2],
    ) -> Result<()> {
        let session = DraftSession::new(match_id, participants, self.map_pool.clone());
        let picker = session.current_picker().clone();
        let waiting = session.waiting_player().clone();
        let remaining = session.remaining.clone();

        {
            let mut sessions = self.sessions.write().map_err(|_| Self::lock_err())?;
            sessions.insert(
                match_id,
                ActiveDraft {
                    session,
                    timer: None,
                },
            );
        }

        info!(
            "Draft started for match {} - {} picks first",
            match_id, picker.nickname
        );

        self.notifier
            .send(
                Recipient::Player(picker.platform_id.clone()),
                Notice::DraftTurn {
                    match_id,
                    remaining_maps: remaining,
                },
            )
            .await;
        self.notifier
            .send(
                Recipient::Player(waiting.platform_id.clone()),
                Notice::DraftWaiting {
                    match_id,
                    picking_player: picker.nickname.clone(),
                },
            )
            .await;

        self.arm_timer(match_id, 0)?;
        Ok(())
    }

    /// A manual elimination by the player whose turn it is
    pub async fn pick(
        self: &Arc<Self>,
        match_id: MatchId,
        picker: &PlatformId,
        map: &str,
    ) -> Result<()> {
        let advance = {
            let mut sessions = self.sessions.write().map_err(|_| Self::lock_err())?;
            let active = sessions
                .get_mut(&match_id)
                .ok_or(LadderError::DraftNotFound { match_id })?;

            if !active.session.is_turn_of(picker) {
                let player = active
                    .session
                    .participants
                    .iter()
                    .find(|p| &p.platform_id == picker)
                    .map(|p| p.nickname.clone())
                    .unwrap_or_else(|| picker.clone());
                return Err(LadderError::OutOfTurn { player }.into());
            }

            let step = active.session.eliminate(map)?;

            // The pick was accepted: the pending turn timer is now stale
            if let Some(timer) = active.timer.take() {
                timer.abort();
            }

            Self::advance_from(&mut sessions, match_id, step)?
        };

        debug!("Match {} draft: {} struck '{}'", match_id, picker, map);
        self.dispatch_advance(match_id, advance).await;
        Ok(())
    }

    /// Timer callback for a pick that was never made. `seq` identifies the
    /// turn the timer was armed for; if the session has moved on (or is
    /// gone), this is a no-op.
    async fn handle_timeout(self: Arc<Self>, match_id: MatchId, seq: u64) {
        let result = {
            let mut sessions = match self.sessions.write() {
                Ok(s) => s,
                Err(_) => return,
            };
            let active = match sessions.get_mut(&match_id) {
                Some(a) => a,
                None => return,
            };
            if active.session.seq() != seq {
                debug!(
                    "Stale draft timer for match {} (seq {} != {})",
                    match_id,
                    seq,
                    active.session.seq()
                );
                return;
            }

            let slow_player = active.session.current_picker().clone();
            let index = rand::thread_rng().gen_range(0..active.session.remaining.len());
            let map = active.session.remaining[index].clone();

            // The random strike cannot fail: the map came from the pool
            match active.session.eliminate(&map) {
                Ok(step) => Self::advance_from(&mut sessions, match_id, step)
                    .map(|advance| (slow_player, map, advance)),
                Err(e) => Err(e),
            }
        };

        match result {
            Ok((slow_player, map, advance)) => {
                info!(
                    "Match {} draft: pick timed out, struck '{}' for {}",
                    match_id, map, slow_player.nickname
                );
                self.notifier
                    .send(
                        Recipient::Player(slow_player.platform_id),
                        Notice::DraftAutoPick {
                            match_id,
                            eliminated_map: map,
                        },
                    )
                    .await;
                self.dispatch_advance(match_id, advance).await;
            }
            Err(e) => warn!("Draft timeout handling failed for match {}: {}", match_id, e),
        }
    }

    /// Translate a session step into the follow-up work, removing resolved
    /// sessions while the lock is still held.
    fn advance_from(
        sessions: &mut HashMap<MatchId, ActiveDraft>,
        match_id: MatchId,
        step: DraftStep,
    ) -> Result<Advance> {
        match step {
            DraftStep::Continue => {
                let active = sessions
                    .get(&match_id)
                    .ok_or(LadderError::DraftNotFound { match_id })?;
                Ok(Advance::Continue {
                    seq: active.session.seq(),
                    picker: active.session.current_picker().clone(),
                    waiting: active.session.waiting_player().clone(),
                    remaining: active.session.remaining.clone(),
                })
            }
            DraftStep::Resolved(map) => {
                let active = sessions
                    .remove(&match_id)
                    .ok_or(LadderError::DraftNotFound { match_id })?;
                if let Some(timer) = active.timer {
                    timer.abort();
                }
                Ok(Advance::Resolved {
                    map,
                    participants: active.session.participants,
                })
            }
        }
    }

    /// Execute the follow-up of a step with no locks held
    async fn dispatch_advance(self: &Arc<Self>, match_id: MatchId, advance: Advance) {
        match advance {
            Advance::Continue {
                seq,
                picker,
                waiting,
                remaining,
            } => {
                self.notifier
                    .send(
                        Recipient::Player(picker.platform_id.clone()),
                        Notice::DraftTurn {
                            match_id,
                            remaining_maps: remaining,
                        },
                    )
                    .await;
                self.notifier
                    .send(
                        Recipient::Player(waiting.platform_id),
                        Notice::DraftWaiting {
                            match_id,
                            picking_player: picker.nickname,
                        },
                    )
                    .await;
                if let Err(e) = self.arm_timer(match_id, seq) {
                    warn!("Failed to arm draft timer for match {}: {}", match_id, e);
                }
            }
            Advance::Resolved { map, participants } => {
                self.finalize(match_id, map, participants).await;
            }
        }
    }

    /// Persist the surviving map and tell both players who they face
    async fn finalize(&self, match_id: MatchId, map: String, participants: [DraftParticipant; 2]) {
        info!("Draft for match {} resolved to '{}'", match_id, map);

        match self.store.match_record(match_id) {
            Ok(Some(mut record)) => {
                record.map = Some(map.clone());
                if let Err(e) = self.store.put_match(record) {
                    warn!("Failed to persist drafted map for match {}: {}", match_id, e);
                }
            }
            Ok(None) => warn!("Draft resolved for unknown match {}", match_id),
            Err(e) => warn!("Failed to load match {} for draft result: {}", match_id, e),
        }

        for (index, participant) in participants.iter().enumerate() {
            let opponent = &participants[1 - index];
            self.notifier
                .send(
                    Recipient::Player(participant.platform_id.clone()),
                    Notice::DraftResolved {
                        match_id,
                        map: map.clone(),
                        opponent: opponent.nickname.clone(),
                    },
                )
                .await;
        }
    }

    /// Arm the per-turn timeout for the given turn sequence
    fn arm_timer(self: &Arc<Self>, match_id: MatchId, seq: u64) -> Result<()> {
        let coordinator = Arc::clone(self);
        let timeout = self.pick_timeout;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            coordinator.handle_timeout(match_id, seq).await;
        });

        let mut sessions = self.sessions.write().map_err(|_| Self::lock_err())?;
        match sessions.get_mut(&match_id) {
            Some(active) => {
                if let Some(old) = active.timer.replace(handle) {
                    old.abort();
                }
            }
            // Session resolved between the step and the timer arm
            None => handle.abort(),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;
    use crate::store::models::MatchRecord;
    use crate::store::MemoryStore;
    use crate::types::{GameMode, MatchKind};
    use crate::utils::current_timestamp;

    fn participants() -> [DraftParticipant; 2] {
        [
            DraftParticipant {
                nickname: "alice".to_string(),
                platform_id: "p-alice".to_string(),
            },
            DraftParticipant {
                nickname: "bob".to_string(),
                platform_id: "p-bob".to_string(),
            },
        ]
    }

    fn test_setup(pool: Vec<String>) -> (Arc<DraftCoordinator>, Arc<MemoryStore>, Arc<RecordingNotifier>) {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let coordinator = Arc::new(DraftCoordinator::new(
            store.clone(),
            notifier.clone(),
            Duration::from_secs(120),
            pool,
        ));
        (coordinator, store, notifier)
    }

    async fn insert_match(store: &MemoryStore) -> MatchId {
        store
            .insert_match(MatchRecord::new(
                GameMode::Duel,
                MatchKind::Ladder,
                "alice".to_string(),
                "bob".to_string(),
                current_timestamp(),
            ))
            .unwrap()
    }

    #[tokio::test]
    async fn test_alternating_picks_resolve_and_persist() {
        let pool = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let (coordinator, store, notifier) = test_setup(pool);
        let match_id = insert_match(&store).await;

        coordinator.start(match_id, participants()).await.unwrap();
        coordinator
            .pick(match_id, &"p-alice".to_string(), "a")
            .await
            .unwrap();
        coordinator
            .pick(match_id, &"p-bob".to_string(), "c")
            .await
            .unwrap();

        // Exactly one map survived, the session is gone, the match carries it
        assert_eq!(coordinator.active_count(), 0);
        let record = store.match_record(match_id).unwrap().unwrap();
        assert_eq!(record.map.as_deref(), Some("b"));
        assert_eq!(
            notifier.count_matching(|_, n| matches!(n, Notice::DraftResolved { .. })),
            2
        );
    }

    #[tokio::test]
    async fn test_out_of_turn_pick_rejected() {
        let pool = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let (coordinator, store, _notifier) = test_setup(pool);
        let match_id = insert_match(&store).await;

        coordinator.start(match_id, participants()).await.unwrap();
        let result = coordinator.pick(match_id, &"p-bob".to_string(), "a").await;
        assert!(result.is_err());
        assert_eq!(coordinator.active_count(), 1);
    }

    #[tokio::test]
    async fn test_timeout_auto_picks_and_continues() {
        let pool = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let coordinator = Arc::new(DraftCoordinator::new(
            store.clone(),
            notifier.clone(),
            Duration::from_millis(20),
            pool,
        ));
        let match_id = insert_match(&store).await;

        coordinator.start(match_id, participants()).await.unwrap();

        // Both picks time out; the draft must still resolve on its own
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(coordinator.active_count(), 0);
        let record = store.match_record(match_id).unwrap().unwrap();
        assert!(record.map.is_some());
        assert_eq!(
            notifier.count_matching(|_, n| matches!(n, Notice::DraftAutoPick { .. })),
            2
        );
    }

    #[tokio::test]
    async fn test_stale_timer_is_noop() {
        let pool = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let (coordinator, store, notifier) = test_setup(pool);
        let match_id = insert_match(&store).await;

        coordinator.start(match_id, participants()).await.unwrap();

        // Fire a timeout for a turn that already passed
        Arc::clone(&coordinator).handle_timeout(match_id, 99).await;

        assert_eq!(coordinator.active_count(), 1);
        assert_eq!(
            notifier.count_matching(|_, n| matches!(n, Notice::DraftAutoPick { .. })),
            0
        );
    }
}
