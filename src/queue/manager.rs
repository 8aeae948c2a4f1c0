//! Queue manager: waiting lists and the periodic pairing pass

use crate::error::{LadderError, Result};
use crate::queue::launcher::MatchLauncher;
use crate::queue::matcher::{closest_rating_index, earliest_index, QueueEntry};
use crate::store::LadderStore;
use crate::types::{GameMode, MatchId, MatchKind, PlatformId, QueueMode};
use crate::utils::current_timestamp;
use chrono::{DateTime, Utc};
use rand::Rng;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

/// Counters about queue activity
#[derive(Debug, Clone, Default)]
pub struct QueueStats {
    pub players_queued: u64,
    pub pairs_made: u64,
    pub pairing_failures: u64,
}

/// The waiting lists: one per concrete mode plus the any-mode bridge
struct QueueLists {
    modes: HashMap<GameMode, VecDeque<QueueEntry>>,
    any: VecDeque<QueueEntry>,
}

impl QueueLists {
    fn new() -> Self {
        Self {
            modes: GameMode::ALL
                .iter()
                .map(|mode| (*mode, VecDeque::new()))
                .collect(),
            any: VecDeque::new(),
        }
    }

    fn list_mut(&mut self, mode: QueueMode) -> &mut VecDeque<QueueEntry> {
        match mode {
            QueueMode::Any => &mut self.any,
            QueueMode::Mode(mode) => self.modes.get_mut(&mode).expect("all modes pre-seeded"),
        }
    }

    fn contains(&self, nickname: &str) -> bool {
        self.any.iter().any(|e| e.nickname == nickname)
            || self
                .modes
                .values()
                .any(|list| list.iter().any(|e| e.nickname == nickname))
    }

    fn remove_platform_id(&mut self, platform_id: &PlatformId) -> bool {
        let before: usize =
            self.any.len() + self.modes.values().map(|l| l.len()).sum::<usize>();
        self.any.retain(|e| &e.platform_id != platform_id);
        for list in self.modes.values_mut() {
            list.retain(|e| &e.platform_id != platform_id);
        }
        let after: usize = self.any.len() + self.modes.values().map(|l| l.len()).sum::<usize>();
        after < before
    }
}

/// A pair picked out of the lists, remembering each entry's origin so a
/// failed launch can put both players back where they came from.
struct PlannedPair {
    match_mode: GameMode,
    first: (QueueEntry, QueueMode),
    second: (QueueEntry, QueueMode),
}

/// Holds the waiting lists and drives pairing
pub struct QueueManager {
    lists: RwLock<QueueLists>,
    store: Arc<dyn LadderStore>,
    launcher: Arc<MatchLauncher>,
    stats: RwLock<QueueStats>,
}

impl QueueManager {
    pub fn new(store: Arc<dyn LadderStore>, launcher: Arc<MatchLauncher>) -> Self {
        Self {
            lists: RwLock::new(QueueLists::new()),
            store,
            launcher,
            stats: RwLock::new(QueueStats::default()),
        }
    }

    fn lock_err(what: &str) -> LadderError {
        LadderError::InternalError {
            message: format!("Failed to acquire {} lock", what),
        }
    }

    /// Enroll a player in a waiting list.
    pub fn enqueue(
        &self,
        platform_id: &PlatformId,
        mode: QueueMode,
        reply_channel: Option<String>,
    ) -> Result<()> {
        let player = self
            .store
            .player_by_platform_id(platform_id)?
            .ok_or_else(|| LadderError::PlayerNotFound {
                player: platform_id.clone(),
            })?;

        // Tournament matches do not block ladder queueing, only ladder ones do
        if let Some(open) = self
            .store
            .unresolved_match_for(&player.nickname, MatchKind::Ladder)?
        {
            return Err(LadderError::ActiveMatchExists {
                player: player.nickname,
                match_id: open.id,
            }
            .into());
        }

        let rating = match mode {
            QueueMode::Any => player.aggregate_rating,
            QueueMode::Mode(mode) => player.rating(mode),
        };

        {
            let mut lists = self.lists.write().map_err(|_| Self::lock_err("lists"))?;
            if lists.contains(&player.nickname) {
                return Err(LadderError::AlreadyQueued {
                    player: player.nickname,
                }
                .into());
            }
            lists.list_mut(mode).push_back(QueueEntry {
                nickname: player.nickname.clone(),
                platform_id: platform_id.clone(),
                rating,
                enqueued_at: current_timestamp(),
                reply_channel,
            });
        }

        let mut updated = player;
        updated.in_queue = true;
        let nickname = updated.nickname.clone();
        self.store.put_player(updated)?;

        if let Ok(mut stats) = self.stats.write() {
            stats.players_queued += 1;
        }

        info!("{} queued for {} at rating {}", nickname, mode, rating);
        Ok(())
    }

    /// Withdraw a player from all lists. Idempotent: succeeds whether or not
    /// the player was queued.
    pub fn dequeue(&self, platform_id: &PlatformId) -> Result<bool> {
        let removed = {
            let mut lists = self.lists.write().map_err(|_| Self::lock_err("lists"))?;
            lists.remove_platform_id(platform_id)
        };

        if let Some(mut player) = self.store.player_by_platform_id(platform_id)? {
            if player.in_queue {
                player.in_queue = false;
                self.store.put_player(player)?;
            }
        }

        Ok(removed)
    }

    /// One pairing pass over every list. Returns the number of matches made.
    ///
    /// Each concrete mode pairs its earliest waiter with the closest-rated
    /// partner in the same list. The any-mode head is first offered to every
    /// concrete list (the match adopts the partner's mode) and only pairs
    /// inside the any-mode list, with a random mode, when no concrete
    /// partner exists.
    pub async fn run_pairing_pass(&self) -> Result<usize> {
        let active = self.active_ladder_players()?;

        let planned = {
            let mut lists = self.lists.write().map_err(|_| Self::lock_err("lists"))?;
            let mut planned = Vec::new();

            for mode in GameMode::ALL {
                if let Some((anchor, partner)) =
                    Self::plan_mode_pair(lists.list_mut(QueueMode::Mode(mode)), &active)
                {
                    planned.push(PlannedPair {
                        match_mode: mode,
                        first: (anchor, QueueMode::Mode(mode)),
                        second: (partner, QueueMode::Mode(mode)),
                    });
                }
            }

            if let Some(pair) = Self::plan_any_pair(&mut lists, &active) {
                planned.push(pair);
            }

            planned
        };

        let mut made = 0;
        for pair in planned {
            match self.launch_pair(&pair).await {
                Ok(match_id) => {
                    made += 1;
                    if let Ok(mut stats) = self.stats.write() {
                        stats.pairs_made += 1;
                    }
                    debug!(
                        "Paired {} vs {} into match {}",
                        pair.first.0.nickname, pair.second.0.nickname, match_id
                    );
                }
                Err(e) => {
                    warn!(
                        "Pairing {} vs {} failed, returning players to their queues: {}",
                        pair.first.0.nickname, pair.second.0.nickname, e
                    );
                    if let Ok(mut stats) = self.stats.write() {
                        stats.pairing_failures += 1;
                    }
                    self.requeue(pair, &e)?;
                }
            }
        }

        Ok(made)
    }

    /// Nicknames currently locked into an unresolved ladder match
    fn active_ladder_players(&self) -> Result<HashSet<String>> {
        Ok(self
            .store
            .unresolved_matches(MatchKind::Ladder)?
            .into_iter()
            .flat_map(|m| [m.player_a, m.player_b])
            .collect())
    }

    /// Pick at most one pair out of a concrete-mode list
    fn plan_mode_pair(
        list: &mut VecDeque<QueueEntry>,
        active: &HashSet<String>,
    ) -> Option<(QueueEntry, QueueEntry)> {
        let eligible = |e: &QueueEntry| !active.contains(&e.nickname);

        let anchor_index = earliest_index(list, eligible)?;
        let partner_index =
            closest_rating_index(list, list[anchor_index].rating, Some(anchor_index), eligible)?;

        Some(Self::take_two(list, anchor_index, partner_index))
    }

    /// Pick at most one pair for the any-mode head
    fn plan_any_pair(lists: &mut QueueLists, active: &HashSet<String>) -> Option<PlannedPair> {
        let eligible = |e: &QueueEntry| !active.contains(&e.nickname);

        let anchor_index = earliest_index(&lists.any, eligible)?;
        let anchor_rating = lists.any[anchor_index].rating;

        // Cross-mode first: the best-rated partner across every concrete list
        let mut best: Option<(i64, DateTime<Utc>, GameMode, usize)> = None;
        for mode in GameMode::ALL {
            let list = &lists.modes[&mode];
            if let Some(index) = closest_rating_index(list, anchor_rating, None, eligible) {
                let candidate = &list[index];
                let key = (
                    (candidate.rating - anchor_rating).abs(),
                    candidate.enqueued_at,
                );
                let better = match best {
                    None => true,
                    Some((diff, at, _, _)) => key < (diff, at),
                };
                if better {
                    best = Some((key.0, key.1, mode, index));
                }
            }
        }

        if let Some((_, _, mode, index)) = best {
            let partner = lists
                .modes
                .get_mut(&mode)
                .expect("all modes pre-seeded")
                .remove(index)
                .expect("index from search");
            let anchor = lists.any.remove(anchor_index).expect("index from search");
            return Some(PlannedPair {
                match_mode: mode,
                first: (anchor, QueueMode::Any),
                second: (partner, QueueMode::Mode(mode)),
            });
        }

        // No concrete partner anywhere: pair inside the any-mode list and
        // give the match a uniformly random concrete mode
        let partner_index =
            closest_rating_index(&lists.any, anchor_rating, Some(anchor_index), eligible)?;
        let (anchor, partner) = Self::take_two(&mut lists.any, anchor_index, partner_index);
        let mode = GameMode::ALL[rand::thread_rng().gen_range(0..GameMode::ALL.len())];

        Some(PlannedPair {
            match_mode: mode,
            first: (anchor, QueueMode::Any),
            second: (partner, QueueMode::Any),
        })
    }

    /// Remove two entries from one list, index-shift safe
    fn take_two(
        list: &mut VecDeque<QueueEntry>,
        first_index: usize,
        second_index: usize,
    ) -> (QueueEntry, QueueEntry) {
        debug_assert_ne!(first_index, second_index);
        if first_index > second_index {
            let first = list.remove(first_index).expect("index from search");
            let second = list.remove(second_index).expect("index from search");
            (first, second)
        } else {
            let second = list.remove(second_index).expect("index from search");
            let first = list.remove(first_index).expect("index from search");
            (first, second)
        }
    }

    /// Resolve fresh player records and hand the pair to the launcher
    async fn launch_pair(&self, pair: &PlannedPair) -> Result<MatchId> {
        let player_a = self
            .store
            .player(&pair.first.0.nickname)?
            .ok_or_else(|| LadderError::PlayerNotFound {
                player: pair.first.0.nickname.clone(),
            })?;
        let player_b = self
            .store
            .player(&pair.second.0.nickname)?
            .ok_or_else(|| LadderError::PlayerNotFound {
                player: pair.second.0.nickname.clone(),
            })?;

        let channel = pair
            .first
            .0
            .reply_channel
            .clone()
            .or_else(|| pair.second.0.reply_channel.clone());

        self.launcher
            .launch(
                pair.match_mode,
                MatchKind::Ladder,
                &player_a,
                &player_b,
                None,
                channel,
            )
            .await
    }

    /// Put a failed pair back at the front of their originating lists. A
    /// player who no longer exists (purged while waiting) is dropped instead
    /// of being requeued forever.
    fn requeue(&self, pair: PlannedPair, error: &anyhow::Error) -> Result<()> {
        let missing = error
            .downcast_ref::<LadderError>()
            .and_then(|e| match e {
                LadderError::PlayerNotFound { player } => Some(player.clone()),
                _ => None,
            });

        let mut lists = self.lists.write().map_err(|_| Self::lock_err("lists"))?;
        for (entry, origin) in [pair.first, pair.second] {
            if Some(&entry.nickname) == missing.as_ref() {
                debug!("Dropping vanished player {} from the queue", entry.nickname);
                continue;
            }
            lists.list_mut(origin).push_front(entry);
        }
        Ok(())
    }

    /// Best-effort queue reconstruction from persisted membership flags.
    /// The flag does not record a mode, so restored players land in the
    /// any-mode list with their aggregate rating.
    pub fn restore_from_flags(&self) -> Result<usize> {
        let players = self.store.players()?;
        let mut lists = self.lists.write().map_err(|_| Self::lock_err("lists"))?;

        let mut restored = 0;
        for player in players.into_iter().filter(|p| p.in_queue) {
            if lists.contains(&player.nickname) {
                continue;
            }
            lists.any.push_back(QueueEntry {
                nickname: player.nickname,
                platform_id: player.platform_id,
                rating: player.aggregate_rating,
                enqueued_at: current_timestamp(),
                reply_channel: None,
            });
            restored += 1;
        }

        if restored > 0 {
            info!("Restored {} queued players from persisted flags", restored);
        }
        Ok(restored)
    }

    /// Current depth of every list, for reporting surfaces
    pub fn queue_depths(&self) -> Vec<(QueueMode, usize)> {
        match self.lists.read() {
            Ok(lists) => {
                let mut depths: Vec<(QueueMode, usize)> = GameMode::ALL
                    .iter()
                    .map(|mode| (QueueMode::Mode(*mode), lists.modes[mode].len()))
                    .collect();
                depths.push((QueueMode::Any, lists.any.len()));
                depths
            }
            Err(_) => Vec::new(),
        }
    }

    /// Snapshot of the activity counters
    pub fn stats(&self) -> QueueStats {
        self.stats
            .read()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_map_pool;
    use crate::draft::DraftCoordinator;
    use crate::notify::RecordingNotifier;
    use crate::store::models::{MatchRecord, PlayerRecord};
    use crate::store::MemoryStore;
    use crate::types::MatchStatus;
    use tokio::time::Duration;

    fn test_manager() -> (QueueManager, Arc<MemoryStore>, Arc<RecordingNotifier>) {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let drafts = Arc::new(DraftCoordinator::new(
            store.clone(),
            notifier.clone(),
            Duration::from_secs(120),
            default_map_pool(),
        ));
        let launcher = Arc::new(MatchLauncher::new(
            store.clone(),
            notifier.clone(),
            drafts,
        ));
        (
            QueueManager::new(store.clone(), launcher),
            store,
            notifier,
        )
    }

    fn add_player(store: &MemoryStore, nickname: &str, flags_rating: i64) {
        let mut player = PlayerRecord::new(format!("p-{}", nickname), nickname.to_string(), 1000);
        player.set_rating(GameMode::Flags, flags_rating);
        store.put_player(player).unwrap();
    }

    #[tokio::test]
    async fn test_enqueue_and_pair_equal_ratings() {
        let (manager, store, _notifier) = test_manager();
        add_player(&store, "alice", 1000);
        add_player(&store, "bob", 1000);

        manager
            .enqueue(&"p-alice".to_string(), QueueMode::Mode(GameMode::Flags), None)
            .unwrap();
        manager
            .enqueue(&"p-bob".to_string(), QueueMode::Mode(GameMode::Flags), None)
            .unwrap();

        let made = manager.run_pairing_pass().await.unwrap();
        assert_eq!(made, 1);

        // Both players left the queue and are locked into one open match
        let depths: usize = manager.queue_depths().iter().map(|(_, d)| d).sum();
        assert_eq!(depths, 0);
        let open = store
            .unresolved_match_for("alice", MatchKind::Ladder)
            .unwrap()
            .unwrap();
        assert_eq!(open.status, MatchStatus::AwaitingSubmission);
        assert!(open.has_participant("bob"));
        assert!(!store.player("alice").unwrap().unwrap().in_queue);
    }

    #[tokio::test]
    async fn test_anchor_pairs_with_closest_rating() {
        let (manager, store, _notifier) = test_manager();
        add_player(&store, "anchor", 1000);
        add_player(&store, "far", 1300);
        add_player(&store, "near", 1010);

        for name in ["anchor", "far", "near"] {
            manager
                .enqueue(
                    &format!("p-{}", name),
                    QueueMode::Mode(GameMode::Flags),
                    None,
                )
                .unwrap();
        }

        manager.run_pairing_pass().await.unwrap();

        let open = store
            .unresolved_match_for("anchor", MatchKind::Ladder)
            .unwrap()
            .unwrap();
        assert!(open.has_participant("near"));
        // The outlier stays queued
        let depths: usize = manager.queue_depths().iter().map(|(_, d)| d).sum();
        assert_eq!(depths, 1);
    }

    #[tokio::test]
    async fn test_double_enqueue_rejected() {
        let (manager, store, _notifier) = test_manager();
        add_player(&store, "alice", 1000);

        manager
            .enqueue(&"p-alice".to_string(), QueueMode::Mode(GameMode::Flags), None)
            .unwrap();
        let second = manager.enqueue(&"p-alice".to_string(), QueueMode::Any, None);

        let err = second.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LadderError>(),
            Some(LadderError::AlreadyQueued { .. })
        ));
    }

    #[tokio::test]
    async fn test_active_ladder_match_blocks_enqueue() {
        let (manager, store, _notifier) = test_manager();
        add_player(&store, "alice", 1000);
        store
            .insert_match(MatchRecord::new(
                GameMode::Flags,
                MatchKind::Ladder,
                "alice".to_string(),
                "bob".to_string(),
                current_timestamp(),
            ))
            .unwrap();

        let err = manager
            .enqueue(&"p-alice".to_string(), QueueMode::Mode(GameMode::Flags), None)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LadderError>(),
            Some(LadderError::ActiveMatchExists { .. })
        ));
    }

    #[tokio::test]
    async fn test_tournament_match_does_not_block_enqueue() {
        let (manager, store, _notifier) = test_manager();
        add_player(&store, "alice", 1000);
        store
            .insert_match(MatchRecord::new(
                GameMode::Flags,
                MatchKind::Tournament,
                "alice".to_string(),
                "bob".to_string(),
                current_timestamp(),
            ))
            .unwrap();

        assert!(manager
            .enqueue(&"p-alice".to_string(), QueueMode::Mode(GameMode::Flags), None)
            .is_ok());
    }

    #[tokio::test]
    async fn test_dequeue_is_idempotent() {
        let (manager, store, _notifier) = test_manager();
        add_player(&store, "alice", 1000);

        manager
            .enqueue(&"p-alice".to_string(), QueueMode::Any, None)
            .unwrap();
        assert!(manager.dequeue(&"p-alice".to_string()).unwrap());
        assert!(!manager.dequeue(&"p-alice".to_string()).unwrap());
        assert!(!store.player("alice").unwrap().unwrap().in_queue);
    }

    #[tokio::test]
    async fn test_any_mode_bridges_into_concrete_list() {
        let (manager, store, _notifier) = test_manager();
        add_player(&store, "drifter", 1000);
        add_player(&store, "flagger", 1000);

        manager
            .enqueue(&"p-drifter".to_string(), QueueMode::Any, None)
            .unwrap();
        manager
            .enqueue(&"p-flagger".to_string(), QueueMode::Mode(GameMode::Flags), None)
            .unwrap();

        let made = manager.run_pairing_pass().await.unwrap();
        assert_eq!(made, 1);

        // The match adopted the concrete partner's mode
        let open = store
            .unresolved_match_for("drifter", MatchKind::Ladder)
            .unwrap()
            .unwrap();
        assert_eq!(open.mode, GameMode::Flags);
    }

    #[tokio::test]
    async fn test_any_mode_pairs_internally_as_last_resort() {
        let (manager, store, _notifier) = test_manager();
        add_player(&store, "one", 1000);
        add_player(&store, "two", 1000);

        manager
            .enqueue(&"p-one".to_string(), QueueMode::Any, None)
            .unwrap();
        manager
            .enqueue(&"p-two".to_string(), QueueMode::Any, None)
            .unwrap();

        let made = manager.run_pairing_pass().await.unwrap();
        assert_eq!(made, 1);

        let open = store
            .unresolved_match_for("one", MatchKind::Ladder)
            .unwrap()
            .unwrap();
        assert!(GameMode::ALL.contains(&open.mode));
    }

    #[tokio::test]
    async fn test_players_in_open_matches_are_skipped() {
        let (manager, store, _notifier) = test_manager();
        add_player(&store, "busy", 1000);
        add_player(&store, "free", 1000);

        manager
            .enqueue(&"p-busy".to_string(), QueueMode::Mode(GameMode::Flags), None)
            .unwrap();
        manager
            .enqueue(&"p-free".to_string(), QueueMode::Mode(GameMode::Flags), None)
            .unwrap();

        // busy entered a match through some other path after enqueueing
        store
            .insert_match(MatchRecord::new(
                GameMode::Flags,
                MatchKind::Ladder,
                "busy".to_string(),
                "other".to_string(),
                current_timestamp(),
            ))
            .unwrap();

        let made = manager.run_pairing_pass().await.unwrap();
        assert_eq!(made, 0);
        // Both entries are still waiting
        let depths: usize = manager.queue_depths().iter().map(|(_, d)| d).sum();
        assert_eq!(depths, 2);
    }

    #[tokio::test]
    async fn test_restore_from_flags_lands_in_any_list() {
        let (manager, store, _notifier) = test_manager();
        let mut player = PlayerRecord::new("p-alice".to_string(), "alice".to_string(), 1000);
        player.in_queue = true;
        store.put_player(player).unwrap();

        let restored = manager.restore_from_flags().unwrap();
        assert_eq!(restored, 1);

        let any_depth = manager
            .queue_depths()
            .into_iter()
            .find(|(mode, _)| *mode == QueueMode::Any)
            .map(|(_, d)| d)
            .unwrap();
        assert_eq!(any_depth, 1);
    }
}
