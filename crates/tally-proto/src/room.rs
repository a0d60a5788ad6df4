//! Room WebSocket messages.

use std::fmt;

use serde::{Deserialize, Serialize};
use tally_core::{Command, FieldChange, PlayerId, Room, RoomError, SessionId};

/// Proof of a session, issued by the server on first join.
///
/// `session_id` is public (it appears as the room's `creatorId`), `secret`
/// is only ever sent back by the session that received it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCredential {
    pub session_id: SessionId,
    pub secret: String,
}

impl SessionCredential {
    pub fn issue() -> Self {
        Self {
            session_id: SessionId::new(),
            secret: uuid::Uuid::new_v4().simple().to_string(),
        }
    }
}

/// Client-chosen id used to match acks and to deduplicate retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(uuid::Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Must be the first message on a connection.
    Join {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        credential: Option<SessionCredential>,
    },
    Command {
        request_id: RequestId,
        command: Command,
    },
    /// Ask for a full snapshot, e.g. after a version gap.
    Resync,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        credential: SessionCredential,
        is_creator: bool,
        /// The presented credential was recognized.
        resumed: bool,
        version: u64,
        room: Room,
    },
    Snapshot {
        version: u64,
        room: Room,
    },
    Patch {
        version: u64,
        changes: Vec<FieldChange>,
    },
    Ack {
        request_id: RequestId,
        outcome: CommandOutcome,
    },
    Rejected {
        request_id: RequestId,
        reason: Rejection,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CommandOutcome {
    /// `changes` is 0 when the command was a no-op (e.g. undo with nothing
    /// pending).
    Applied {
        changes: usize,
    },
    PlayerAdded {
        player_id: PlayerId,
        /// The add also elected this session as creator.
        became_creator: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Rejection {
    NotFound { message: String },
    Unauthorized { message: String },
    Invalid { message: String },
    NotJoined,
    RoomClosed,
}

impl From<&RoomError> for Rejection {
    fn from(err: &RoomError) -> Self {
        let message = err.to_string();
        match err {
            RoomError::PlayerNotFound(_) => Rejection::NotFound { message },
            RoomError::CreatorOnly(_) | RoomError::NotOwner(_) => {
                Rejection::Unauthorized { message }
            }
            RoomError::InvalidName
            | RoomError::WrongAbilityKind { .. }
            | RoomError::InvalidToggleValue { .. } => Rejection::Invalid { message },
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::NotFound { message }
            | Rejection::Unauthorized { message }
            | Rejection::Invalid { message } => f.write_str(message),
            Rejection::NotJoined => f.write_str("Join the room before sending commands"),
            Rejection::RoomClosed => f.write_str("Room is closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::AbilityKind;

    #[test]
    fn test_client_message_tagging() {
        let msg = ClientMessage::Command {
            request_id: RequestId::new(),
            command: Command::ToggleAbility {
                player_id: PlayerId::from("p1"),
                ability: AbilityKind::MapPlayerCount,
            },
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "command");
        assert_eq!(json["command"]["kind"], "toggle_ability");

        let join: ClientMessage = serde_json::from_str(r#"{"type":"join"}"#).unwrap();
        assert_eq!(join, ClientMessage::Join { credential: None });
    }

    #[test]
    fn test_rejection_mapping() {
        let not_found = Rejection::from(&RoomError::PlayerNotFound(PlayerId::from("x")));
        assert!(matches!(not_found, Rejection::NotFound { .. }));
        let unauthorized = Rejection::from(&RoomError::CreatorOnly("reset_all"));
        assert!(matches!(unauthorized, Rejection::Unauthorized { .. }));
        let json = serde_json::to_value(&unauthorized).unwrap();
        assert_eq!(json["reason"], "unauthorized");
    }

    #[test]
    fn test_issued_credentials_are_distinct() {
        let a = SessionCredential::issue();
        let b = SessionCredential::issue();
        assert_ne!(a.session_id, b.session_id);
        assert_ne!(a.secret, b.secret);
    }
}
