//! Tournament coordinator: registration, round lifecycle and persistence

use crate::error::{LadderError, Result};
use crate::notify::{Notice, Notifier, Recipient};
use crate::queue::MatchLauncher;
use crate::rating::RatingConfig;
use crate::results::apply::apply_outcome;
use crate::results::BracketObserver;
use crate::store::models::MatchRecord;
use crate::store::LadderStore;
use crate::tournament::bracket::{pair_round, BracketMatch, Pairing, Tournament};
use crate::types::{GameMode, MatchId, MatchKind, MatchStatus, PlatformId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

enum RoundDecision {
    Wait,
    Finish(String),
    Abandon,
    NextRound,
}

/// Owns the active brackets and drives them to a champion
pub struct TournamentCoordinator {
    active: RwLock<HashMap<String, Tournament>>,
    store: Arc<dyn LadderStore>,
    notifier: Arc<dyn Notifier>,
    launcher: Arc<MatchLauncher>,
    rating: RatingConfig,
    mode: GameMode,
}

impl TournamentCoordinator {
    pub fn new(
        store: Arc<dyn LadderStore>,
        notifier: Arc<dyn Notifier>,
        launcher: Arc<MatchLauncher>,
        rating: RatingConfig,
        mode: GameMode,
    ) -> Self {
        Self {
            active: RwLock::new(HashMap::new()),
            store,
            notifier,
            launcher,
            rating,
            mode,
        }
    }

    fn lock_err() -> LadderError {
        LadderError::InternalError {
            message: "Failed to acquire tournaments lock".to_string(),
        }
    }

    /// Brackets currently in memory
    pub fn active_count(&self) -> usize {
        self.active.read().map(|a| a.len()).unwrap_or(0)
    }

    fn nickname_of(&self, platform_id: &PlatformId) -> Result<String> {
        self.store
            .player_by_platform_id(platform_id)?
            .map(|p| p.nickname)
            .ok_or_else(|| {
                LadderError::PlayerNotFound {
                    player: platform_id.clone(),
                }
                .into()
            })
    }

    async fn notify_player(&self, nickname: &str, notice: Notice) {
        match self.store.player(nickname) {
            Ok(Some(player)) => {
                self.notifier
                    .send(Recipient::Player(player.platform_id), notice)
                    .await;
            }
            Ok(None) => {}
            Err(e) => warn!("Player lookup for notice failed ({}): {}", nickname, e),
        }
    }

    /// Serialize the bracket to the store so a restart can resume it
    fn persist(&self, name: &str) -> Result<()> {
        let snapshot = {
            let active = self.active.read().map_err(|_| Self::lock_err())?;
            match active.get(name) {
                Some(tournament) => serde_json::to_value(tournament).map_err(|e| {
                    LadderError::InternalError {
                        message: format!("Failed to serialize bracket '{}': {}", name, e),
                    }
                })?,
                None => return Ok(()),
            }
        };
        self.store.put_bracket(name, snapshot)
    }

    /// Reload every persisted bracket into memory (startup path)
    pub fn resume(&self) -> Result<usize> {
        let mut resumed = 0;
        for name in self.store.bracket_names()? {
            let Some(snapshot) = self.store.bracket(&name)? else {
                continue;
            };
            match serde_json::from_value::<Tournament>(snapshot) {
                Ok(tournament) => {
                    let mut active = self.active.write().map_err(|_| Self::lock_err())?;
                    active.insert(name.clone(), tournament);
                    resumed += 1;
                }
                Err(e) => warn!("Discarding unreadable bracket snapshot '{}': {}", name, e),
            }
        }
        if resumed > 0 {
            info!("Resumed {} in-flight tournaments", resumed);
        }
        Ok(resumed)
    }

    /// Moderator creates a bracket shell open for registration
    pub fn create_tournament(&self, name: &str, slots: usize) -> Result<()> {
        {
            let mut active = self.active.write().map_err(|_| Self::lock_err())?;
            if active.contains_key(name) {
                return Err(LadderError::TournamentExists {
                    name: name.to_string(),
                }
                .into());
            }
            let tournament = Tournament::new(name.to_string(), slots)?;
            active.insert(name.to_string(), tournament);
        }
        info!("Tournament '{}' created with {} slots", name, slots);
        self.persist(name)
    }

    /// A verified player signs up
    pub fn register_participant(&self, name: &str, platform_id: &PlatformId) -> Result<()> {
        let player = self
            .store
            .player_by_platform_id(platform_id)?
            .ok_or_else(|| LadderError::PlayerNotFound {
                player: platform_id.clone(),
            })?;

        let refusal = |reason: &str| LadderError::RegistrationRefused {
            player: player.nickname.clone(),
            name: name.to_string(),
            reason: reason.to_string(),
        };

        {
            let mut active = self.active.write().map_err(|_| Self::lock_err())?;
            let tournament = active.get_mut(name).ok_or_else(|| {
                LadderError::TournamentNotFound {
                    name: name.to_string(),
                }
            })?;

            if tournament.started {
                return Err(LadderError::RegistrationClosed {
                    name: name.to_string(),
                }
                .into());
            }
            if player.blacklisted {
                return Err(refusal("blacklisted from tournaments").into());
            }
            if tournament.is_banned(&player.nickname) {
                return Err(refusal("banned in this tournament").into());
            }
            if tournament.is_registered(&player.nickname) {
                return Err(refusal("already registered").into());
            }
            if tournament.is_full() {
                return Err(LadderError::TournamentFull {
                    name: name.to_string(),
                }
                .into());
            }

            tournament.participants.push(player.nickname.clone());
        }

        info!("{} registered for tournament '{}'", player.nickname, name);
        self.persist(name)
    }

    /// A participant withdraws before the bracket starts
    pub fn unregister_participant(&self, name: &str, platform_id: &PlatformId) -> Result<()> {
        let nickname = self.nickname_of(platform_id)?;
        {
            let mut active = self.active.write().map_err(|_| Self::lock_err())?;
            let tournament = active.get_mut(name).ok_or_else(|| {
                LadderError::TournamentNotFound {
                    name: name.to_string(),
                }
            })?;
            if tournament.started {
                return Err(LadderError::RegistrationClosed {
                    name: name.to_string(),
                }
                .into());
            }
            tournament.participants.retain(|p| p != &nickname);
        }
        self.persist(name)
    }

    /// Moderator freezes registration and launches round one
    pub async fn start_tournament(&self, name: &str) -> Result<()> {
        {
            let mut active = self.active.write().map_err(|_| Self::lock_err())?;
            let tournament = active.get_mut(name).ok_or_else(|| {
                LadderError::TournamentNotFound {
                    name: name.to_string(),
                }
            })?;
            if tournament.started {
                return Err(LadderError::InvalidCommand {
                    reason: format!("tournament '{}' is already underway", name),
                }
                .into());
            }
            if tournament.participants.is_empty() {
                return Err(LadderError::InvalidCommand {
                    reason: format!("tournament '{}' has no participants", name),
                }
                .into());
            }
            tournament.started = true;
            tournament.current_round = 1;
        }

        info!("Tournament '{}' started", name);
        self.start_round(name).await?;
        self.check_round_completion(name).await
    }

    /// Pair the current pool and create the round's matches
    async fn start_round(&self, name: &str) -> Result<()> {
        let (round, versus, auto_advanced) = {
            let mut active = self.active.write().map_err(|_| Self::lock_err())?;
            let tournament = active.get_mut(name).ok_or_else(|| {
                LadderError::TournamentNotFound {
                    name: name.to_string(),
                }
            })?;

            let seeds = tournament.round_seeds(&mut rand::thread_rng());
            let pairings = pair_round(&seeds);

            let mut versus = Vec::new();
            let mut auto_advanced = Vec::new();
            for pairing in pairings {
                match pairing {
                    Pairing::Versus(a, b) => versus.push((a, b)),
                    Pairing::AutoAdvance(player) => {
                        tournament.winners.push(player.clone());
                        auto_advanced.push(player);
                    }
                }
            }

            (tournament.current_round, versus, auto_advanced)
        };

        let mut created = Vec::new();
        let mut defaulted = Vec::new();
        for (a, b) in versus {
            match (self.store.player(&a)?, self.store.player(&b)?) {
                (Some(player_a), Some(player_b)) => {
                    match self
                        .launcher
                        .launch(
                            self.mode,
                            MatchKind::Tournament,
                            &player_a,
                            &player_b,
                            Some((name.to_string(), round)),
                            None,
                        )
                        .await
                    {
                        Ok(match_id) => created.push(BracketMatch {
                            match_id,
                            player_a: a,
                            player_b: b,
                            winner: None,
                            finished: false,
                        }),
                        Err(e) => {
                            // Both advance rather than silently dropping out
                            warn!(
                                "Failed to create bracket match {} vs {}: {}",
                                a, b, e
                            );
                            defaulted.push(a);
                            defaulted.push(b);
                        }
                    }
                }
                (Some(_), None) => defaulted.push(a),
                (None, Some(_)) => defaulted.push(b),
                (None, None) => {}
            }
        }

        let match_ids: Vec<MatchId> = created.iter().map(|m| m.match_id).collect();
        {
            let mut active = self.active.write().map_err(|_| Self::lock_err())?;
            if let Some(tournament) = active.get_mut(name) {
                tournament.matches.extend(created);
                tournament.winners.extend(defaulted);
            }
        }
        self.persist(name)?;

        info!(
            "Tournament '{}' round {}: {} matches, {} walkovers",
            name,
            round,
            match_ids.len(),
            auto_advanced.len()
        );

        self.notifier
            .send(
                Recipient::Channel(format!("{}-matches", name)),
                Notice::RoundStarted {
                    tournament: name.to_string(),
                    round,
                    match_ids,
                    auto_advanced: auto_advanced.clone(),
                },
            )
            .await;
        for player in auto_advanced {
            self.notify_player(
                &player,
                Notice::AutoAdvanced {
                    tournament: name.to_string(),
                    round,
                },
            )
            .await;
        }

        Ok(())
    }

    /// Collect finished matches; once the round is complete either crown the
    /// champion or roll the winners into the next round. Loops so rounds
    /// settled entirely by walkovers advance without waiting for a tick.
    pub async fn check_round_completion(&self, name: &str) -> Result<()> {
        loop {
            let decision = {
                let mut active = self.active.write().map_err(|_| Self::lock_err())?;
                let tournament = active.get_mut(name).ok_or_else(|| {
                    LadderError::TournamentNotFound {
                        name: name.to_string(),
                    }
                })?;

                for bracket_match in &mut tournament.matches {
                    if bracket_match.finished {
                        continue;
                    }
                    if let Some(record) = self.store.match_record(bracket_match.match_id)? {
                        if record.status == MatchStatus::Verified {
                            if let Some(winner) = record.winner() {
                                bracket_match.winner = Some(winner.to_string());
                                bracket_match.finished = true;
                                tournament.winners.push(winner.to_string());
                            }
                        }
                    }
                }

                if !tournament.matches.iter().all(|m| m.finished) {
                    RoundDecision::Wait
                } else if tournament.winners.len() == 1 {
                    RoundDecision::Finish(tournament.winners[0].clone())
                } else if tournament.winners.is_empty() {
                    RoundDecision::Abandon
                } else {
                    tournament.current_round += 1;
                    tournament.participants = std::mem::take(&mut tournament.winners);
                    tournament.matches.clear();
                    RoundDecision::NextRound
                }
            };
            self.persist(name)?;

            match decision {
                RoundDecision::Wait => return Ok(()),
                RoundDecision::Finish(champion) => {
                    self.finish_tournament(name, &champion).await?;
                    return Ok(());
                }
                RoundDecision::Abandon => {
                    warn!("Tournament '{}' ran out of participants, discarding", name);
                    self.remove(name)?;
                    return Ok(());
                }
                RoundDecision::NextRound => {
                    self.start_round(name).await?;
                    let has_open_matches = {
                        let active = self.active.read().map_err(|_| Self::lock_err())?;
                        active
                            .get(name)
                            .map(|t| t.matches.iter().any(|m| !m.finished))
                            .unwrap_or(false)
                    };
                    if has_open_matches {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Run the completion check for every active bracket (periodic tick)
    pub async fn check_all(&self) -> Result<()> {
        let names: Vec<String> = {
            let active = self.active.read().map_err(|_| Self::lock_err())?;
            active.keys().cloned().collect()
        };
        for name in names {
            if let Err(e) = self.check_round_completion(&name).await {
                warn!("Bracket completion check for '{}' failed: {}", name, e);
            }
        }
        Ok(())
    }

    async fn finish_tournament(&self, name: &str, champion: &str) -> Result<()> {
        info!("Tournament '{}' won by {}", name, champion);

        self.notifier
            .send(
                Recipient::Channel(format!("{}-results", name)),
                Notice::TournamentWon {
                    tournament: name.to_string(),
                    champion: champion.to_string(),
                },
            )
            .await;
        self.notify_player(
            champion,
            Notice::TournamentWon {
                tournament: name.to_string(),
                champion: champion.to_string(),
            },
        )
        .await;

        self.remove(name)
    }

    fn remove(&self, name: &str) -> Result<()> {
        {
            let mut active = self.active.write().map_err(|_| Self::lock_err())?;
            active.remove(name);
        }
        self.store.remove_bracket(name)?;
        Ok(())
    }

    /// Moderator bans a participant. Before the start this only removes the
    /// registration; afterwards any pending bracket match of the banned
    /// player resolves as a walkover for the opponent.
    pub async fn ban_participant(&self, name: &str, nickname: &str) -> Result<()> {
        let pending = {
            let mut active = self.active.write().map_err(|_| Self::lock_err())?;
            let tournament = active.get_mut(name).ok_or_else(|| {
                LadderError::TournamentNotFound {
                    name: name.to_string(),
                }
            })?;

            if !tournament.is_banned(nickname) {
                tournament.banned.push(nickname.to_string());
            }
            tournament.participants.retain(|p| p != nickname);
            tournament.winners.retain(|w| w != nickname);

            let mut pending = None;
            if let Some(bracket_match) = tournament
                .matches
                .iter_mut()
                .find(|m| !m.finished && (m.player_a == nickname || m.player_b == nickname))
            {
                let opponent = if bracket_match.player_a == nickname {
                    bracket_match.player_b.clone()
                } else {
                    bracket_match.player_a.clone()
                };
                bracket_match.winner = Some(opponent.clone());
                bracket_match.finished = true;
                pending = Some((bracket_match.match_id, opponent));
            }
            if let Some((_, opponent)) = &pending {
                // The walkover winner advances like any match winner
                tournament.winners.push(opponent.clone());
            }
            pending
        };
        self.persist(name)?;

        info!("{} banned from tournament '{}'", nickname, name);

        if let Some((match_id, opponent)) = pending {
            if let Some(record) = self.store.match_record(match_id)? {
                if record.status != MatchStatus::Verified {
                    let (score_a, score_b) = if record.player_a == opponent {
                        (1, 0)
                    } else {
                        (0, 1)
                    };
                    let application =
                        apply_outcome(self.store.as_ref(), &self.rating, record, score_a, score_b)?;
                    self.notifier
                        .send(
                            Recipient::Channel(format!("{}-results", name)),
                            Notice::TechnicalLoss {
                                match_id,
                                winner: opponent.clone(),
                                loser: nickname.to_string(),
                                rating_changes: application.rating_changes,
                            },
                        )
                        .await;
                }
            }
            self.check_round_completion(name).await?;
        }

        Ok(())
    }

    /// Moderator override: directly set a match's winner. Equivalent to a
    /// verified result for bracket progression.
    pub async fn set_winner(&self, name: &str, match_id: MatchId, winner: &str) -> Result<()> {
        {
            let active = self.active.read().map_err(|_| Self::lock_err())?;
            let tournament = active.get(name).ok_or_else(|| {
                LadderError::TournamentNotFound {
                    name: name.to_string(),
                }
            })?;
            let bracket_match = tournament
                .matches
                .iter()
                .find(|m| m.match_id == match_id)
                .ok_or(LadderError::MatchNotFound { match_id })?;
            if bracket_match.finished {
                return Err(LadderError::MatchClosed { match_id }.into());
            }
            if bracket_match.player_a != winner && bracket_match.player_b != winner {
                return Err(LadderError::NotAParticipant {
                    player: winner.to_string(),
                    match_id,
                }
                .into());
            }
        }

        let record = self
            .store
            .match_record(match_id)?
            .ok_or(LadderError::MatchNotFound { match_id })?;
        if record.status == MatchStatus::Verified {
            return Err(LadderError::MatchClosed { match_id }.into());
        }

        let (score_a, score_b) = if record.player_a == winner { (1, 0) } else { (0, 1) };
        apply_outcome(self.store.as_ref(), &self.rating, record, score_a, score_b)?;

        info!(
            "Winner of bracket match {} in '{}' set to {} by moderator",
            match_id, name, winner
        );

        self.check_round_completion(name).await
    }
}

#[async_trait]
impl BracketObserver for TournamentCoordinator {
    async fn match_verified(&self, record: &MatchRecord) {
        let Some(name) = record.tournament.clone() else {
            return;
        };
        let known = self
            .active
            .read()
            .map(|a| a.contains_key(&name))
            .unwrap_or(false);
        if known {
            if let Err(e) = self.check_round_completion(&name).await {
                warn!("Bracket update for '{}' failed: {}", name, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_map_pool;
    use crate::draft::DraftCoordinator;
    use crate::notify::RecordingNotifier;
    use crate::store::models::PlayerRecord;
    use crate::store::MemoryStore;
    use tokio::time::Duration;

    struct Fixture {
        coordinator: Arc<TournamentCoordinator>,
        store: Arc<MemoryStore>,
        notifier: Arc<RecordingNotifier>,
    }

    fn fixture() -> Fixture {
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
        let coordinator = Arc::new(TournamentCoordinator::new(
            store.clone(),
            notifier.clone(),
            launcher,
            RatingConfig::default(),
            GameMode::Flags,
        ));
        Fixture {
            coordinator,
            store,
            notifier,
        }
    }

    fn add_players(store: &MemoryStore, names: &[&str]) {
        for name in names {
            store
                .put_player(PlayerRecord::new(
                    format!("p-{}", name),
                    name.to_string(),
                    1000,
                ))
                .unwrap();
        }
    }

    async fn register_all(f: &Fixture, name: &str, players: &[&str]) {
        for player in players {
            f.coordinator
                .register_participant(name, &format!("p-{}", player))
                .unwrap();
        }
    }

    fn open_bracket_matches(f: &Fixture, name: &str) -> Vec<BracketMatch> {
        let active = f.coordinator.active.read().unwrap();
        active
            .get(name)
            .map(|t| {
                t.matches
                    .iter()
                    .filter(|m| !m.finished)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_registration_rules() {
        let f = fixture();
        add_players(&f.store, &["a", "b"]);
        let mut blacklisted = PlayerRecord::new("p-x".to_string(), "x".to_string(), 1000);
        blacklisted.blacklisted = true;
        f.store.put_player(blacklisted).unwrap();

        f.coordinator.create_tournament("cup", 8).unwrap();

        f.coordinator
            .register_participant("cup", &"p-a".to_string())
            .unwrap();
        // Duplicate registration refused
        assert!(f
            .coordinator
            .register_participant("cup", &"p-a".to_string())
            .is_err());
        // Blacklisted player refused
        assert!(f
            .coordinator
            .register_participant("cup", &"p-x".to_string())
            .is_err());
        // Unverified player refused
        assert!(f
            .coordinator
            .register_participant("cup", &"p-ghost".to_string())
            .is_err());
    }

    #[tokio::test]
    async fn test_invalid_slot_count_rejected() {
        let f = fixture();
        let err = f.coordinator.create_tournament("cup", 12).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LadderError>(),
            Some(LadderError::InvalidSlotCount { slots: 12 })
        ));
    }

    #[tokio::test]
    async fn test_five_players_round_one_shape() {
        let f = fixture();
        let players = ["a", "b", "c", "d", "e"];
        add_players(&f.store, &players);

        f.coordinator.create_tournament("cup", 8).unwrap();
        register_all(&f, "cup", &players).await;
        f.coordinator.start_tournament("cup").await.unwrap();

        // Exactly two playable matches, exactly one walkover
        let open = open_bracket_matches(&f, "cup");
        assert_eq!(open.len(), 2);

        let created = f.store.unresolved_matches(MatchKind::Tournament).unwrap();
        assert_eq!(created.len(), 2);
        for record in &created {
            assert_eq!(record.tournament.as_deref(), Some("cup"));
            assert_eq!(record.round, Some(1));
        }

        assert_eq!(
            f.notifier.count_matching(|_, n| matches!(
                n,
                Notice::RoundStarted {
                    auto_advanced,
                    ..
                } if auto_advanced.len() == 1
            )),
            1
        );
    }

    #[tokio::test]
    async fn test_bracket_runs_to_a_champion() {
        let f = fixture();
        let players = ["a", "b", "c", "d", "e"];
        add_players(&f.store, &players);

        f.coordinator.create_tournament("cup", 8).unwrap();
        register_all(&f, "cup", &players).await;
        f.coordinator.start_tournament("cup").await.unwrap();

        // Settle every round by letting side A win each open match
        let mut guard = 0;
        while f.coordinator.active_count() > 0 {
            guard += 1;
            assert!(guard < 10, "bracket failed to converge");

            for bracket_match in open_bracket_matches(&f, "cup") {
                let record = f
                    .store
                    .match_record(bracket_match.match_id)
                    .unwrap()
                    .unwrap();
                apply_outcome(f.store.as_ref(), &RatingConfig::default(), record, 1, 0).unwrap();
            }
            f.coordinator.check_round_completion("cup").await.unwrap();
        }

        assert_eq!(
            f.notifier
                .count_matching(|_, n| matches!(n, Notice::TournamentWon { .. })),
            2 // channel + champion DM
        );
        assert!(f.store.bracket("cup").unwrap().is_none());

        // Tournament matches never move ratings
        for name in players {
            let player = f.store.player(name).unwrap().unwrap();
            assert_eq!(player.rating(GameMode::Flags), 1000);
        }
    }

    #[tokio::test]
    async fn test_ban_after_start_walks_over_pending_match() {
        let f = fixture();
        let players = ["a", "b", "c", "d"];
        add_players(&f.store, &players);

        f.coordinator.create_tournament("cup", 8).unwrap();
        register_all(&f, "cup", &players).await;
        f.coordinator.start_tournament("cup").await.unwrap();

        let open = open_bracket_matches(&f, "cup");
        assert_eq!(open.len(), 2);
        let target = &open[0];
        let banned = target.player_a.clone();
        let survivor = target.player_b.clone();

        f.coordinator.ban_participant("cup", &banned).await.unwrap();

        let record = f.store.match_record(target.match_id).unwrap().unwrap();
        assert_eq!(record.status, MatchStatus::Verified);
        assert_eq!(record.winner(), Some(survivor.as_str()));
    }

    #[tokio::test]
    async fn test_set_winner_advances_bracket() {
        let f = fixture();
        let players = ["a", "b"];
        add_players(&f.store, &players);

        f.coordinator.create_tournament("cup", 8).unwrap();
        register_all(&f, "cup", &players).await;
        f.coordinator.start_tournament("cup").await.unwrap();

        let open = open_bracket_matches(&f, "cup");
        assert_eq!(open.len(), 1);
        let winner = open[0].player_b.clone();

        f.coordinator
            .set_winner("cup", open[0].match_id, &winner)
            .await
            .unwrap();

        // Two players, one match: the override decided the tournament
        assert_eq!(f.coordinator.active_count(), 0);
        assert_eq!(
            f.notifier.count_matching(|_, n| matches!(
                n,
                Notice::TournamentWon { champion, .. } if *champion == winner
            )),
            2
        );
    }

    #[tokio::test]
    async fn test_bracket_resumes_from_persisted_state() {
        let f = fixture();
        let players = ["a", "b", "c", "d"];
        add_players(&f.store, &players);

        f.coordinator.create_tournament("cup", 8).unwrap();
        register_all(&f, "cup", &players).await;
        f.coordinator.start_tournament("cup").await.unwrap();
        let open_before = open_bracket_matches(&f, "cup");

        // A fresh coordinator over the same store stands in for a restart
        let revived = fixture_with_store(f.store.clone());
        assert_eq!(revived.coordinator.resume().unwrap(), 1);
        let open_after = open_bracket_matches(&revived, "cup");
        assert_eq!(
            open_before.iter().map(|m| m.match_id).collect::<Vec<_>>(),
            open_after.iter().map(|m| m.match_id).collect::<Vec<_>>()
        );
    }

    fn fixture_with_store(store: Arc<MemoryStore>) -> Fixture {
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
        let coordinator = Arc::new(TournamentCoordinator::new(
            store.clone(),
            notifier.clone(),
            launcher,
            RatingConfig::default(),
            GameMode::Flags,
        ));
        Fixture {
            coordinator,
            store,
            notifier,
        }
    }
}
