//! Draft session state machine
//!
//! Pure state: no timers, no I/O. The coordinator layers timeouts and
//! persistence on top.

use crate::error::{LadderError, Result};
use crate::types::{MatchId, PlatformId};

/// One of the two drafting players
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftParticipant {
    pub nickname: String,
    pub platform_id: PlatformId,
}

/// Result of an accepted elimination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftStep {
    /// More than one map remains; the turn has passed to the other player
    Continue,
    /// Exactly one map survived; the draft is over
    Resolved(String),
}

/// Elimination draft over an ordered map pool
#[derive(Debug, Clone)]
pub struct DraftSession {
    pub match_id: MatchId,
    pub participants: [DraftParticipant; 2],
    pub remaining: Vec<String>,
    turn: usize,
    seq: u64,
}

impl DraftSession {
    /// Start a session; the first listed participant picks first
    pub fn new(match_id: MatchId, participants: [DraftParticipant; 2], pool: Vec<String>) -> Self {
        debug_assert!(pool.len() >= 2);
        Self {
            match_id,
            participants,
            remaining: pool,
            turn: 0,
            seq: 0,
        }
    }

    /// The participant whose turn it is
    pub fn current_picker(&self) -> &DraftParticipant {
        &self.participants[self.turn]
    }

    /// The participant waiting on the current pick
    pub fn waiting_player(&self) -> &DraftParticipant {
        &self.participants[1 - self.turn]
    }

    /// Turn sequence number; bumps on every accepted elimination. Timer
    /// callbacks compare against it so a late timer is a no-op.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn is_turn_of(&self, platform_id: &PlatformId) -> bool {
        &self.current_picker().platform_id == platform_id
    }

    /// Strike a map for the current picker and advance the alternation.
    pub fn eliminate(&mut self, map: &str) -> Result<DraftStep> {
        let index = self
            .remaining
            .iter()
            .position(|m| m == map)
            .ok_or_else(|| LadderError::UnknownMap {
                map: map.to_string(),
            })?;

        self.remaining.remove(index);
        self.seq += 1;

        if self.remaining.len() == 1 {
            Ok(DraftStep::Resolved(self.remaining[0].clone()))
        } else {
            self.turn = 1 - self.turn;
            Ok(DraftStep::Continue)
        }
    }

    /// The opponent of the given participant
    pub fn opponent_of(&self, platform_id: &PlatformId) -> &DraftParticipant {
        if &self.participants[0].platform_id == platform_id {
            &self.participants[1]
        } else {
            &self.participants[0]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    fn pool(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("map{}", i)).collect()
    }

    #[test]
    fn test_strict_alternation() {
        let mut session = DraftSession::new(1, participants(), pool(4));
        assert_eq!(session.current_picker().nickname, "alice");

        session.eliminate("map0").unwrap();
        assert_eq!(session.current_picker().nickname, "bob");

        session.eliminate("map1").unwrap();
        assert_eq!(session.current_picker().nickname, "alice");
    }

    #[test]
    fn test_resolves_with_exactly_one_map() {
        let mut session = DraftSession::new(1, participants(), pool(3));
        assert_eq!(session.eliminate("map2").unwrap(), DraftStep::Continue);
        assert_eq!(
            session.eliminate("map0").unwrap(),
            DraftStep::Resolved("map1".to_string())
        );
        assert_eq!(session.remaining, vec!["map1".to_string()]);
    }

    #[test]
    fn test_terminates_in_pool_minus_one_picks() {
        let n = 7;
        let mut session = DraftSession::new(1, participants(), pool(n));
        let mut picks = 0;
        loop {
            let next = session.remaining[0].clone();
            picks += 1;
            match session.eliminate(&next).unwrap() {
                DraftStep::Continue => continue,
                DraftStep::Resolved(_) => break,
            }
        }
        assert_eq!(picks, n - 1);
    }

    #[test]
    fn test_unknown_map_rejected() {
        let mut session = DraftSession::new(1, participants(), pool(3));
        assert!(session.eliminate("atlantis").is_err());
        // A rejected pick does not advance the turn or the sequence
        assert_eq!(session.current_picker().nickname, "alice");
        assert_eq!(session.seq(), 0);
    }

    #[test]
    fn test_seq_tracks_accepted_picks() {
        let mut session = DraftSession::new(1, participants(), pool(4));
        assert_eq!(session.seq(), 0);
        session.eliminate("map3").unwrap();
        assert_eq!(session.seq(), 1);
    }
}
