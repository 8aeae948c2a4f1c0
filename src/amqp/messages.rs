//! Command protocol and message serialization
//!
//! Every operation the platform adapter can ask for is one `Command`
//! variant carrying a typed payload; the service routes on the variant, so
//! there is exactly one dispatch point and no callback state.

use crate::error::{LadderError, Result};
use crate::results::{ModeratorDecision, ReportDecision};
use crate::types::{MatchId, PlatformId, QueueMode};
use serde::{Deserialize, Serialize};

/// Inbound ladder commands from the platform adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum Command {
    /// Verification completed: create the player's ladder record
    RegisterPlayer {
        platform_id: PlatformId,
        nickname: String,
    },
    Enqueue {
        platform_id: PlatformId,
        mode: QueueMode,
        reply_channel: Option<String>,
    },
    Dequeue {
        platform_id: PlatformId,
    },
    PickMap {
        match_id: MatchId,
        platform_id: PlatformId,
        map: String,
    },
    SubmitResult {
        match_id: MatchId,
        platform_id: PlatformId,
        score_for_submitter: u32,
        score_for_opponent: u32,
        evidence: Option<String>,
    },
    ConfirmResult {
        match_id: MatchId,
        platform_id: PlatformId,
    },
    DisputeResult {
        match_id: MatchId,
        platform_id: PlatformId,
    },
    FileReport {
        match_id: MatchId,
        platform_id: PlatformId,
        reason: String,
        evidence: Option<String>,
    },
    ResolveReport {
        match_id: MatchId,
        decision: ReportDecision,
    },
    ModeratorResolve {
        match_id: MatchId,
        decision: ModeratorDecision,
    },
    Forfeit {
        platform_id: PlatformId,
    },
    CreateTournament {
        name: String,
        slots: usize,
    },
    RegisterParticipant {
        name: String,
        platform_id: PlatformId,
    },
    UnregisterParticipant {
        name: String,
        platform_id: PlatformId,
    },
    StartTournament {
        name: String,
    },
    BanParticipant {
        name: String,
        nickname: String,
    },
    SetWinner {
        name: String,
        match_id: MatchId,
        winner: String,
    },
}

/// Message envelope with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEnvelope<T> {
    pub payload: T,
    pub correlation_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub routing_key: String,
}

impl<T> MessageEnvelope<T>
where
    T: Serialize + serde::de::DeserializeOwned,
{
    pub fn new(payload: T, routing_key: String) -> Self {
        Self {
            payload,
            correlation_id: crate::utils::generate_correlation_id().to_string(),
            timestamp: crate::utils::current_timestamp(),
            routing_key,
        }
    }

    /// Serialize the envelope to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| {
            LadderError::InternalError {
                message: format!("Failed to serialize message: {}", e),
            }
            .into()
        })
    }
}

/// Parse and validate an inbound command
pub fn decode_command(bytes: &[u8]) -> Result<Command> {
    let command: Command =
        serde_json::from_slice(bytes).map_err(|e| LadderError::InvalidCommand {
            reason: format!("Failed to deserialize command: {}", e),
        })?;
    validate_command(&command)?;
    Ok(command)
}

fn validate_command(command: &Command) -> Result<()> {
    let empty = |value: &str, what: &str| -> Result<()> {
        if value.is_empty() {
            Err(LadderError::InvalidCommand {
                reason: format!("{} cannot be empty", what),
            }
            .into())
        } else {
            Ok(())
        }
    };

    match command {
        Command::RegisterPlayer {
            platform_id,
            nickname,
        } => {
            empty(platform_id, "platform id")?;
            empty(nickname, "nickname")
        }
        Command::Enqueue { platform_id, .. }
        | Command::Dequeue { platform_id }
        | Command::Forfeit { platform_id }
        | Command::ConfirmResult { platform_id, .. }
        | Command::DisputeResult { platform_id, .. }
        | Command::SubmitResult { platform_id, .. }
        | Command::PickMap { platform_id, .. }
        | Command::FileReport { platform_id, .. }
        | Command::RegisterParticipant { platform_id, .. }
        | Command::UnregisterParticipant { platform_id, .. } => empty(platform_id, "platform id"),
        Command::CreateTournament { name, .. }
        | Command::StartTournament { name }
        | Command::BanParticipant { name, .. }
        | Command::SetWinner { name, .. } => empty(name, "tournament name"),
        Command::ResolveReport { .. } | Command::ModeratorResolve { .. } => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_roundtrip() {
        let command = Command::SubmitResult {
            match_id: 7,
            platform_id: "p-1".to_string(),
            score_for_submitter: 5,
            score_for_opponent: 3,
            evidence: Some("screenshot://1".to_string()),
        };
        let bytes = serde_json::to_vec(&command).unwrap();
        let decoded = decode_command(&bytes).unwrap();
        assert!(matches!(
            decoded,
            Command::SubmitResult { match_id: 7, .. }
        ));
    }

    #[test]
    fn test_commands_are_tagged_by_action() {
        let command = Command::Dequeue {
            platform_id: "p-1".to_string(),
        };
        let json = serde_json::to_string(&command).unwrap();
        assert!(json.contains("\"action\":\"Dequeue\""));
    }

    #[test]
    fn test_empty_platform_id_rejected() {
        let command = Command::Dequeue {
            platform_id: String::new(),
        };
        let bytes = serde_json::to_vec(&command).unwrap();
        assert!(decode_command(&bytes).is_err());
    }

    #[test]
    fn test_envelope_carries_correlation_id() {
        let command = Command::StartTournament {
            name: "cup".to_string(),
        };
        let envelope = MessageEnvelope::new(command, "ladder.commands".to_string());
        assert!(!envelope.correlation_id.is_empty());
        assert!(envelope.to_bytes().is_ok());
    }
}
