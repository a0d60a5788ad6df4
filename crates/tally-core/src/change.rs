//! Field-level changes to a room document.
//!
//! Every mutation produces a list of [`FieldChange`]s. The server broadcasts
//! them as patches and clients replay them with [`Room::apply`], so both sides
//! run the same code to move the document forward.
//!
//! [`Room::apply`]: crate::room::Room::apply

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ability::AbilityKind;
use crate::color::Color;
use crate::ids::{PlayerId, RoomId, SessionId};
use crate::player::Player;
use crate::room::ResetSnapshot;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FieldChange {
    CreatorSet {
        creator_id: SessionId,
    },
    PlayerPut {
        player: Player,
    },
    PlayerRemoved {
        player_id: PlayerId,
    },
    AbilitySet {
        player_id: PlayerId,
        kind: AbilityKind,
        value: u32,
    },
    ColorSet {
        player_id: PlayerId,
        color: Color,
    },
    PlayersReplaced {
        players: BTreeMap<PlayerId, Player>,
    },
    ResetStored {
        snapshot: ResetSnapshot,
    },
    ResetCleared,
}

/// Location of a field inside a room document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldPath {
    CreatorId,
    Players,
    Player(PlayerId),
    Color(PlayerId),
    Ability(PlayerId, AbilityKind),
    LastResetState,
}

impl FieldChange {
    pub fn path(&self) -> FieldPath {
        match self {
            FieldChange::CreatorSet { .. } => FieldPath::CreatorId,
            FieldChange::PlayerPut { player } => FieldPath::Player(player.id.clone()),
            FieldChange::PlayerRemoved { player_id } => FieldPath::Player(player_id.clone()),
            FieldChange::AbilitySet {
                player_id, kind, ..
            } => FieldPath::Ability(player_id.clone(), *kind),
            FieldChange::ColorSet { player_id, .. } => FieldPath::Color(player_id.clone()),
            FieldChange::PlayersReplaced { .. } => FieldPath::Players,
            FieldChange::ResetStored { .. } | FieldChange::ResetCleared => {
                FieldPath::LastResetState
            }
        }
    }

    /// Player the change touches, if it touches exactly one.
    pub fn player_id(&self) -> Option<&PlayerId> {
        match self {
            FieldChange::PlayerPut { player } => Some(&player.id),
            FieldChange::PlayerRemoved { player_id }
            | FieldChange::AbilitySet { player_id, .. }
            | FieldChange::ColorSet { player_id, .. } => Some(player_id),
            _ => None,
        }
    }
}

impl FieldPath {
    /// Full document path, e.g. `rooms/AB12/players/p1/abilities/STRENGTH`.
    pub fn in_room(&self, room_id: &RoomId) -> String {
        format!("rooms/{room_id}/{self}")
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldPath::CreatorId => f.write_str("creatorId"),
            FieldPath::Players => f.write_str("players"),
            FieldPath::Player(id) => write!(f, "players/{id}"),
            FieldPath::Color(id) => write!(f, "players/{id}/color"),
            FieldPath::Ability(id, kind) => write!(f, "players/{id}/abilities/{kind}"),
            FieldPath::LastResetState => f.write_str("lastResetState"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let room: RoomId = "AB12".parse().unwrap();
        let change = FieldChange::AbilitySet {
            player_id: PlayerId::from("p1"),
            kind: AbilityKind::SprintSpeed,
            value: 2,
        };
        assert_eq!(
            change.path().in_room(&room),
            "rooms/AB12/players/p1/abilities/SPRINT SPEED"
        );
        assert_eq!(
            FieldChange::ResetCleared.path().in_room(&room),
            "rooms/AB12/lastResetState"
        );
    }

    #[test]
    fn test_wire_tagging() {
        let json = serde_json::to_value(FieldChange::ResetCleared).unwrap();
        assert_eq!(json, serde_json::json!({ "op": "reset_cleared" }));
    }
}
