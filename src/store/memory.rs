//! In-memory store implementation
//!
//! Backs tests and single-process deployments. Match ids are a monotonic
//! sequence owned by the store, mirroring an autoincrement column.

use crate::error::{LadderError, Result};
use crate::store::models::{MatchRecord, PlayerRecord};
use crate::store::LadderStore;
use crate::types::{MatchId, MatchKind, PlatformId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

/// HashMap-backed store guarded by RwLocks
#[derive(Debug, Default)]
pub struct MemoryStore {
    players: RwLock<HashMap<String, PlayerRecord>>,
    matches: RwLock<HashMap<MatchId, MatchRecord>>,
    brackets: RwLock<HashMap<String, serde_json::Value>>,
    next_match_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            players: RwLock::new(HashMap::new()),
            matches: RwLock::new(HashMap::new()),
            brackets: RwLock::new(HashMap::new()),
            next_match_id: AtomicU64::new(1),
        }
    }

    fn lock_err(what: &str) -> LadderError {
        LadderError::InternalError {
            message: format!("Failed to acquire {} lock", what),
        }
    }
}

impl LadderStore for MemoryStore {
    fn player(&self, nickname: &str) -> Result<Option<PlayerRecord>> {
        let players = self
            .players
            .read()
            .map_err(|_| Self::lock_err("players read"))?;
        Ok(players.get(nickname).cloned())
    }

    fn player_by_platform_id(&self, id: &PlatformId) -> Result<Option<PlayerRecord>> {
        let players = self
            .players
            .read()
            .map_err(|_| Self::lock_err("players read"))?;
        Ok(players.values().find(|p| &p.platform_id == id).cloned())
    }

    fn put_player(&self, record: PlayerRecord) -> Result<()> {
        let mut players = self
            .players
            .write()
            .map_err(|_| Self::lock_err("players write"))?;
        players.insert(record.nickname.clone(), record);
        Ok(())
    }

    fn purge_player(&self, nickname: &str) -> Result<bool> {
        let mut players = self
            .players
            .write()
            .map_err(|_| Self::lock_err("players write"))?;
        let removed = players.remove(nickname).is_some();
        drop(players);

        if removed {
            let mut matches = self
                .matches
                .write()
                .map_err(|_| Self::lock_err("matches write"))?;
            matches.retain(|_, m| !m.has_participant(nickname));
        }

        Ok(removed)
    }

    fn players(&self) -> Result<Vec<PlayerRecord>> {
        let players = self
            .players
            .read()
            .map_err(|_| Self::lock_err("players read"))?;
        Ok(players.values().cloned().collect())
    }

    fn insert_match(&self, mut record: MatchRecord) -> Result<MatchId> {
        let id = self.next_match_id.fetch_add(1, Ordering::SeqCst);
        record.id = id;

        let mut matches = self
            .matches
            .write()
            .map_err(|_| Self::lock_err("matches write"))?;
        matches.insert(id, record);
        Ok(id)
    }

    fn match_record(&self, id: MatchId) -> Result<Option<MatchRecord>> {
        let matches = self
            .matches
            .read()
            .map_err(|_| Self::lock_err("matches read"))?;
        Ok(matches.get(&id).cloned())
    }

    fn put_match(&self, record: MatchRecord) -> Result<()> {
        let mut matches = self
            .matches
            .write()
            .map_err(|_| Self::lock_err("matches write"))?;
        matches.insert(record.id, record);
        Ok(())
    }

    fn unresolved_match_for(
        &self,
        nickname: &str,
        kind: MatchKind,
    ) -> Result<Option<MatchRecord>> {
        let matches = self
            .matches
            .read()
            .map_err(|_| Self::lock_err("matches read"))?;
        Ok(matches
            .values()
            .find(|m| m.kind == kind && m.status.is_unresolved() && m.has_participant(nickname))
            .cloned())
    }

    fn unresolved_matches(&self, kind: MatchKind) -> Result<Vec<MatchRecord>> {
        let matches = self
            .matches
            .read()
            .map_err(|_| Self::lock_err("matches read"))?;
        Ok(matches
            .values()
            .filter(|m| m.kind == kind && m.status.is_unresolved())
            .cloned()
            .collect())
    }

    fn ladder_matches_started_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<MatchRecord>> {
        let matches = self
            .matches
            .read()
            .map_err(|_| Self::lock_err("matches read"))?;
        Ok(matches
            .values()
            .filter(|m| {
                m.kind == MatchKind::Ladder && m.status.is_unresolved() && m.started_at < cutoff
            })
            .cloned()
            .collect())
    }

    fn put_bracket(&self, name: &str, snapshot: serde_json::Value) -> Result<()> {
        let mut brackets = self
            .brackets
            .write()
            .map_err(|_| Self::lock_err("brackets write"))?;
        brackets.insert(name.to_string(), snapshot);
        Ok(())
    }

    fn bracket(&self, name: &str) -> Result<Option<serde_json::Value>> {
        let brackets = self
            .brackets
            .read()
            .map_err(|_| Self::lock_err("brackets read"))?;
        Ok(brackets.get(name).cloned())
    }

    fn remove_bracket(&self, name: &str) -> Result<bool> {
        let mut brackets = self
            .brackets
            .write()
            .map_err(|_| Self::lock_err("brackets write"))?;
        Ok(brackets.remove(name).is_some())
    }

    fn bracket_names(&self) -> Result<Vec<String>> {
        let brackets = self
            .brackets
            .read()
            .map_err(|_| Self::lock_err("brackets read"))?;
        Ok(brackets.keys().cloned().collect())
    }
}
