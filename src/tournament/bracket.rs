//! Bracket state and the pure round-pairing rules

use crate::error::{LadderError, Result};
use crate::types::MatchId;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Slot counts a bracket may be created with
pub const ALLOWED_SLOTS: [usize; 4] = [8, 16, 32, 64];

/// One slot in a round's pairing pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Seed {
    Player(String),
    Bye,
}

impl Seed {
    pub fn player(&self) -> Option<&str> {
        match self {
            Seed::Player(name) => Some(name),
            Seed::Bye => None,
        }
    }
}

/// What a round pairing produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pairing {
    /// Two real players meet in a playable match
    Versus(String, String),
    /// A walkover: the player advances without a match
    AutoAdvance(String),
}

/// A playable match inside the current round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BracketMatch {
    pub match_id: MatchId,
    pub player_a: String,
    pub player_b: String,
    pub winner: Option<String>,
    pub finished: bool,
}

/// The whole durable state of one tournament
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tournament {
    pub name: String,
    pub slots: usize,
    pub started: bool,
    /// Registration list before start; the current round's pool afterwards
    pub participants: Vec<String>,
    pub banned: Vec<String>,
    pub current_round: u32,
    /// Winners collected so far in the current round (auto-advances included)
    pub winners: Vec<String>,
    pub matches: Vec<BracketMatch>,
}

impl Tournament {
    pub fn new(name: String, slots: usize) -> Result<Self> {
        if !ALLOWED_SLOTS.contains(&slots) {
            return Err(LadderError::InvalidSlotCount { slots }.into());
        }
        Ok(Self {
            name,
            slots,
            started: false,
            participants: Vec::new(),
            banned: Vec::new(),
            current_round: 0,
            winners: Vec::new(),
            matches: Vec::new(),
        })
    }

    pub fn is_full(&self) -> bool {
        self.participants.len() >= self.slots
    }

    pub fn is_registered(&self, nickname: &str) -> bool {
        self.participants.iter().any(|p| p == nickname)
    }

    pub fn is_banned(&self, nickname: &str) -> bool {
        self.banned.iter().any(|b| b == nickname)
    }

    /// The pairing pool for the next round: shuffled real participants,
    /// padded with byes to the slot count on round one only.
    pub fn round_seeds(&self, rng: &mut impl Rng) -> Vec<Seed> {
        let mut pool: Vec<String> = Vec::new();
        for participant in &self.participants {
            if !pool.contains(participant) {
                pool.push(participant.clone());
            }
        }
        pool.shuffle(rng);

        let mut seeds: Vec<Seed> = pool.into_iter().map(Seed::Player).collect();
        if self.current_round == 1 {
            while seeds.len() < self.slots {
                seeds.push(Seed::Bye);
            }
        }
        seeds
    }
}

/// Pair a round's pool consecutively. Byes sit at the tail, so real-real
/// pairs form first; a real player drawn against a bye (or left unpaired)
/// advances by walkover, and bye-vs-bye pairs vanish. The duplicate guard
/// refuses to pair an identity against itself.
pub fn pair_round(seeds: &[Seed]) -> Vec<Pairing> {
    let mut pairings = Vec::new();
    let mut used = vec![false; seeds.len()];

    for i in 0..seeds.len() {
        if used[i] {
            continue;
        }
        used[i] = true;

        let partner = (i + 1..seeds.len()).find(|&j| {
            if used[j] {
                return false;
            }
            match (&seeds[i], &seeds[j]) {
                (Seed::Player(a), Seed::Player(b)) => a != b,
                _ => true,
            }
        });

        match partner {
            Some(j) => {
                used[j] = true;
                match (&seeds[i], &seeds[j]) {
                    (Seed::Player(a), Seed::Player(b)) => {
                        pairings.push(Pairing::Versus(a.clone(), b.clone()));
                    }
                    (Seed::Player(a), Seed::Bye) | (Seed::Bye, Seed::Player(a)) => {
                        pairings.push(Pairing::AutoAdvance(a.clone()));
                    }
                    (Seed::Bye, Seed::Bye) => {}
                }
            }
            None => {
                if let Seed::Player(name) = &seeds[i] {
                    pairings.push(Pairing::AutoAdvance(name.clone()));
                }
            }
        }
    }

    pairings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn players(names: &[&str]) -> Vec<Seed> {
        names.iter().map(|n| Seed::Player(n.to_string())).collect()
    }

    #[test]
    fn test_slot_count_validation() {
        assert!(Tournament::new("cup".to_string(), 8).is_ok());
        assert!(Tournament::new("cup".to_string(), 6).is_err());
        assert!(Tournament::new("cup".to_string(), 128).is_err());
    }

    #[test]
    fn test_five_players_in_eight_slots() {
        // Byes sit at the tail: two real matches, one walkover, one vanished
        // bye pair
        let mut seeds = players(&["a", "b", "c", "d", "e"]);
        seeds.extend([Seed::Bye, Seed::Bye, Seed::Bye]);

        let pairings = pair_round(&seeds);
        let versus = pairings
            .iter()
            .filter(|p| matches!(p, Pairing::Versus(_, _)))
            .count();
        let walkovers = pairings
            .iter()
            .filter(|p| matches!(p, Pairing::AutoAdvance(_)))
            .count();

        assert_eq!(versus, 2);
        assert_eq!(walkovers, 1);
    }

    #[test]
    fn test_odd_pool_auto_advances_leftover() {
        let pairings = pair_round(&players(&["a", "b", "c"]));
        assert_eq!(
            pairings
                .iter()
                .filter(|p| matches!(p, Pairing::Versus(_, _)))
                .count(),
            1
        );
        assert_eq!(
            pairings
                .iter()
                .filter(|p| matches!(p, Pairing::AutoAdvance(_)))
                .count(),
            1
        );
    }

    #[test]
    fn test_duplicate_identity_never_self_pairs() {
        let pairings = pair_round(&players(&["a", "a", "b"]));
        for pairing in &pairings {
            if let Pairing::Versus(x, y) = pairing {
                assert_ne!(x, y);
            }
        }
    }

    #[test]
    fn test_all_byes_produce_nothing() {
        let pairings = pair_round(&[Seed::Bye, Seed::Bye, Seed::Bye, Seed::Bye]);
        assert!(pairings.is_empty());
    }

    #[test]
    fn test_round_one_pads_to_slot_count() {
        let mut tournament = Tournament::new("cup".to_string(), 8).unwrap();
        tournament.participants = vec!["a".to_string(), "b".to_string()];
        tournament.current_round = 1;

        let seeds = tournament.round_seeds(&mut rand::thread_rng());
        assert_eq!(seeds.len(), 8);
        assert_eq!(seeds.iter().filter(|s| **s == Seed::Bye).count(), 6);
        // Byes are padding at the tail, never shuffled into the middle
        assert!(seeds[..2].iter().all(|s| s.player().is_some()));
    }

    #[test]
    fn test_later_rounds_have_no_byes() {
        let mut tournament = Tournament::new("cup".to_string(), 8).unwrap();
        tournament.participants = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        tournament.current_round = 2;

        let seeds = tournament.round_seeds(&mut rand::thread_rng());
        assert_eq!(seeds.len(), 3);
        assert!(seeds.iter().all(|s| s.player().is_some()));
    }

    #[test]
    fn test_state_serialization_roundtrip() {
        let mut tournament = Tournament::new("cup".to_string(), 16).unwrap();
        tournament.started = true;
        tournament.current_round = 3;
        tournament.participants = vec!["a".to_string(), "b".to_string()];
        tournament.matches.push(BracketMatch {
            match_id: 42,
            player_a: "a".to_string(),
            player_b: "b".to_string(),
            winner: None,
            finished: false,
        });

        let snapshot = serde_json::to_value(&tournament).unwrap();
        let restored: Tournament = serde_json::from_value(snapshot).unwrap();
        assert_eq!(restored.current_round, 3);
        assert_eq!(restored.matches.len(), 1);
        assert_eq!(restored.matches[0].match_id, 42);
    }
}
