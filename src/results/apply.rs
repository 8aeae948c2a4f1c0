//! Applying and reversing match outcomes against the store
//!
//! These helpers own the only code paths that move ratings and counters, so
//! confirmation, technical losses, forfeits and the expiry sweep all agree
//! on what "verified" means. Ratings move for ladder matches only;
//! tournament matches update win/loss counters but leave ratings alone.

use crate::error::{LadderError, Result};
use crate::rating::{rate, RatingConfig};
use crate::store::models::{AppliedOutcome, MatchRecord};
use crate::store::LadderStore;
use crate::types::{MatchKind, MatchStatus, Outcome};

/// The effect of verifying a match
#[derive(Debug, Clone)]
pub struct OutcomeApplication {
    pub record: MatchRecord,
    /// (nickname, old rating, new rating) on the match's mode ladder;
    /// empty for tournament matches
    pub rating_changes: Vec<(String, i64, i64)>,
    pub winner: Option<String>,
}

/// Close a match with the given scores: move ratings (ladder only), count
/// the outcome for both players, and record the applied deltas for rollback.
pub fn apply_outcome(
    store: &dyn LadderStore,
    rating: &RatingConfig,
    mut record: MatchRecord,
    score_a: u32,
    score_b: u32,
) -> Result<OutcomeApplication> {
    let outcome = Outcome::from_scores(score_a, score_b);

    let mut player_a = store
        .player(&record.player_a)?
        .ok_or_else(|| LadderError::PlayerNotFound {
            player: record.player_a.clone(),
        })?;
    let mut player_b = store
        .player(&record.player_b)?
        .ok_or_else(|| LadderError::PlayerNotFound {
            player: record.player_b.clone(),
        })?;

    let mut rating_changes = Vec::new();
    let (delta_a, delta_b) = if record.kind == MatchKind::Ladder {
        let old_a = player_a.rating(record.mode);
        let old_b = player_b.rating(record.mode);
        let (new_a, new_b) = rate(rating, old_a, old_b, outcome);

        player_a.set_rating(record.mode, new_a);
        player_b.set_rating(record.mode, new_b);
        rating_changes.push((player_a.nickname.clone(), old_a, new_a));
        rating_changes.push((player_b.nickname.clone(), old_b, new_b));

        (new_a - old_a, new_b - old_b)
    } else {
        (0, 0)
    };

    let (won_a, won_b) = match outcome {
        Outcome::WinA => (Some(true), Some(false)),
        Outcome::WinB => (Some(false), Some(true)),
        Outcome::Draw => (None, None),
    };
    player_a.record_outcome(record.mode, won_a);
    player_b.record_outcome(record.mode, won_b);

    store.put_player(player_a)?;
    store.put_player(player_b)?;

    record.score_a = Some(score_a);
    record.score_b = Some(score_b);
    record.status = MatchStatus::Verified;
    record.applied = Some(AppliedOutcome {
        outcome,
        delta_a,
        delta_b,
    });
    store.put_match(record.clone())?;

    let winner = record.winner().map(|w| w.to_string());
    Ok(OutcomeApplication {
        record,
        rating_changes,
        winner,
    })
}

/// Exactly reverse a previously applied outcome: subtract the recorded
/// rating deltas, uncount the win/loss/tie, and reopen the match. After
/// this, re-applying any outcome yields the same ratings as if the original
/// verification had never happened.
pub fn rollback_outcome(store: &dyn LadderStore, record: &mut MatchRecord) -> Result<()> {
    let applied = match record.applied.take() {
        Some(applied) => applied,
        None => return Ok(()),
    };

    let mut player_a = store
        .player(&record.player_a)?
        .ok_or_else(|| LadderError::PlayerNotFound {
            player: record.player_a.clone(),
        })?;
    let mut player_b = store
        .player(&record.player_b)?
        .ok_or_else(|| LadderError::PlayerNotFound {
            player: record.player_b.clone(),
        })?;

    let mode = record.mode;
    player_a.set_rating(mode, player_a.rating(mode) - applied.delta_a);
    player_b.set_rating(mode, player_b.rating(mode) - applied.delta_b);

    let (won_a, won_b) = match applied.outcome {
        Outcome::WinA => (Some(true), Some(false)),
        Outcome::WinB => (Some(false), Some(true)),
        Outcome::Draw => (None, None),
    };
    player_a.unrecord_outcome(mode, won_a);
    player_b.unrecord_outcome(mode, won_b);

    store.put_player(player_a)?;
    store.put_player(player_b)?;

    record.score_a = None;
    record.score_b = None;
    record.status = MatchStatus::AwaitingSubmission;
    store.put_match(record.clone())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::models::PlayerRecord;
    use crate::store::MemoryStore;
    use crate::types::GameMode;
    use crate::utils::current_timestamp;

    fn setup() -> (MemoryStore, RatingConfig) {
        let store = MemoryStore::new();
        for name in ["alice", "bob"] {
            store
                .put_player(PlayerRecord::new(
                    format!("p-{}", name),
                    name.to_string(),
                    1000,
                ))
                .unwrap();
        }
        (store, RatingConfig::default())
    }

    fn ladder_match(store: &MemoryStore) -> MatchRecord {
        let id = store
            .insert_match(MatchRecord::new(
                GameMode::Flags,
                MatchKind::Ladder,
                "alice".to_string(),
                "bob".to_string(),
                current_timestamp(),
            ))
            .unwrap();
        store.match_record(id).unwrap().unwrap()
    }

    #[test]
    fn test_apply_moves_ratings_and_counters() {
        let (store, rating) = setup();
        let record = ladder_match(&store);

        let applied = apply_outcome(&store, &rating, record, 5, 3).unwrap();
        assert_eq!(applied.winner.as_deref(), Some("alice"));

        let alice = store.player("alice").unwrap().unwrap();
        let bob = store.player("bob").unwrap().unwrap();
        assert!(alice.rating(GameMode::Flags) > 1000);
        assert!(bob.rating(GameMode::Flags) < 1000);
        assert_eq!(alice.overall.wins, 1);
        assert_eq!(alice.flags.wins, 1);
        assert_eq!(bob.overall.losses, 1);
        // Aggregate rating follows the mode rating
        assert_eq!(alice.aggregate_rating, alice.rating(GameMode::Flags) + 2000);
    }

    #[test]
    fn test_tournament_matches_leave_ratings_alone() {
        let (store, rating) = setup();
        let id = store
            .insert_match(
                MatchRecord::new(
                    GameMode::Flags,
                    MatchKind::Tournament,
                    "alice".to_string(),
                    "bob".to_string(),
                    current_timestamp(),
                )
                .with_bracket_tag("cup".to_string(), 1),
            )
            .unwrap();
        let record = store.match_record(id).unwrap().unwrap();

        let applied = apply_outcome(&store, &rating, record, 2, 1).unwrap();
        assert!(applied.rating_changes.is_empty());

        let alice = store.player("alice").unwrap().unwrap();
        assert_eq!(alice.rating(GameMode::Flags), 1000);
        assert_eq!(alice.overall.wins, 1);
    }

    #[test]
    fn test_rollback_restores_prior_state() {
        let (store, rating) = setup();
        let record = ladder_match(&store);

        let applied = apply_outcome(&store, &rating, record, 5, 3).unwrap();
        let mut verified = applied.record;
        rollback_outcome(&store, &mut verified).unwrap();

        let alice = store.player("alice").unwrap().unwrap();
        let bob = store.player("bob").unwrap().unwrap();
        assert_eq!(alice.rating(GameMode::Flags), 1000);
        assert_eq!(bob.rating(GameMode::Flags), 1000);
        assert_eq!(alice.overall.wins, 0);
        assert_eq!(bob.overall.losses, 0);

        let reopened = store.match_record(verified.id).unwrap().unwrap();
        assert_eq!(reopened.status, MatchStatus::AwaitingSubmission);
        assert!(reopened.applied.is_none());
    }

    #[test]
    fn test_rollback_then_reapply_equals_fresh_outcome() {
        let (store, rating) = setup();
        let record = ladder_match(&store);
        let match_id = record.id;

        // Verify 5-3 for alice, then overturn into a walkover for bob
        let applied = apply_outcome(&store, &rating, record, 5, 3).unwrap();
        let mut verified = applied.record;
        rollback_outcome(&store, &mut verified).unwrap();
        apply_outcome(&store, &rating, verified, 0, 1).unwrap();

        // Expected: the same as a 0-1 walkover applied to two fresh players
        let control = MemoryStore::new();
        for name in ["alice", "bob"] {
            control
                .put_player(PlayerRecord::new(
                    format!("p-{}", name),
                    name.to_string(),
                    1000,
                ))
                .unwrap();
        }
        let control_id = control
            .insert_match(MatchRecord::new(
                GameMode::Flags,
                MatchKind::Ladder,
                "alice".to_string(),
                "bob".to_string(),
                current_timestamp(),
            ))
            .unwrap();
        let control_record = control.match_record(control_id).unwrap().unwrap();
        apply_outcome(&control, &rating, control_record, 0, 1).unwrap();

        for name in ["alice", "bob"] {
            let overturned = store.player(name).unwrap().unwrap();
            let fresh = control.player(name).unwrap().unwrap();
            assert_eq!(overturned.rating(GameMode::Flags), fresh.rating(GameMode::Flags));
            assert_eq!(overturned.overall, fresh.overall);
        }

        let final_record = store.match_record(match_id).unwrap().unwrap();
        assert_eq!(final_record.winner(), Some("bob"));
    }
}
