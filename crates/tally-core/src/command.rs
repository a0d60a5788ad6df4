//! Serializable mutation requests against a [`Room`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ability::AbilityKind;
use crate::change::FieldChange;
use crate::color::Color;
use crate::ids::{PlayerId, SessionId};
use crate::room::{Room, RoomError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Command {
    AddPlayer {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        color: Option<Color>,
    },
    RemovePlayer {
        player_id: PlayerId,
    },
    /// Absolute last-write-wins value computed by the client.
    SetAbility {
        player_id: PlayerId,
        ability: AbilityKind,
        value: u32,
    },
    /// Increment applied to the authoritative value.
    AdjustAbility {
        player_id: PlayerId,
        ability: AbilityKind,
        delta: i32,
    },
    ToggleAbility {
        player_id: PlayerId,
        ability: AbilityKind,
    },
    SetColor {
        player_id: PlayerId,
        color: Color,
    },
    ResetAll,
    UndoReset,
}

/// Who issues a command, and when.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub session: SessionId,
    pub now: DateTime<Utc>,
}

impl CommandContext {
    pub fn new(session: SessionId) -> Self {
        Self {
            session,
            now: Utc::now(),
        }
    }
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::AddPlayer { .. } => "add_player",
            Command::RemovePlayer { .. } => "remove_player",
            Command::SetAbility { .. } => "set_ability",
            Command::AdjustAbility { .. } => "adjust_ability",
            Command::ToggleAbility { .. } => "toggle_ability",
            Command::SetColor { .. } => "set_color",
            Command::ResetAll => "reset_all",
            Command::UndoReset => "undo_reset",
        }
    }

    /// Existing player the command mutates, for ownership checks.
    pub fn target_player(&self) -> Option<&PlayerId> {
        match self {
            Command::RemovePlayer { player_id }
            | Command::SetAbility { player_id, .. }
            | Command::AdjustAbility { player_id, .. }
            | Command::ToggleAbility { player_id, .. }
            | Command::SetColor { player_id, .. } => Some(player_id),
            Command::AddPlayer { .. } | Command::ResetAll | Command::UndoReset => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Command::ResetAll | Command::UndoReset)
    }
}

impl Room {
    /// Runs `command` and returns the applied changes.
    ///
    /// `AddPlayer` uses a freshly generated id; use [`Room::add_player`] to
    /// pick one.
    pub fn execute(
        &mut self,
        command: &Command,
        ctx: &CommandContext,
    ) -> Result<Vec<FieldChange>, RoomError> {
        match command {
            Command::AddPlayer { name, color } => {
                self.add_player(PlayerId::generate(), name, *color, ctx.session)
            }
            Command::RemovePlayer { player_id } => self.remove_player(player_id),
            Command::SetAbility {
                player_id,
                ability,
                value,
            } => self.set_ability(player_id, *ability, *value),
            Command::AdjustAbility {
                player_id,
                ability,
                delta,
            } => self.adjust_ability(player_id, *ability, *delta),
            Command::ToggleAbility { player_id, ability } => {
                self.toggle_ability(player_id, *ability)
            }
            Command::SetColor { player_id, color } => self.set_color(player_id, *color),
            Command::ResetAll => self.reset_all(ctx.session, ctx.now),
            Command::UndoReset => self.undo_reset(ctx.session),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execute_add_then_adjust() {
        let mut room = Room::new();
        let ctx = CommandContext::new(SessionId::new());
        let changes = room
            .execute(
                &Command::AddPlayer {
                    name: "Alice".to_string(),
                    color: None,
                },
                &ctx,
            )
            .unwrap();
        let player_id = changes
            .iter()
            .find_map(|c| match c {
                FieldChange::PlayerPut { player } => Some(player.id.clone()),
                _ => None,
            })
            .unwrap();

        room.execute(
            &Command::AdjustAbility {
                player_id: player_id.clone(),
                ability: AbilityKind::TumbleWings,
                delta: 2,
            },
            &ctx,
        )
        .unwrap();
        assert_eq!(room.players[&player_id].abilities.get(AbilityKind::TumbleWings), 2);
    }

    #[test]
    fn test_wire_shape() {
        let command = Command::AdjustAbility {
            player_id: PlayerId::from("p1"),
            ability: AbilityKind::ExtraJump,
            delta: -1,
        };
        let json = serde_json::to_value(&command).unwrap();
        assert_eq!(json["kind"], "adjust_ability");
        assert_eq!(json["ability"], "Extra Jump");
        assert_eq!(serde_json::from_value::<Command>(json).unwrap(), command);

        let reset: Command = serde_json::from_str(r#"{"kind":"reset_all"}"#).unwrap();
        assert!(reset.is_admin());
    }

    #[test]
    fn test_target_player() {
        assert_eq!(Command::ResetAll.target_player(), None);
        let remove = Command::RemovePlayer {
            player_id: PlayerId::from("p1"),
        };
        assert_eq!(remove.target_player(), Some(&PlayerId::from("p1")));
    }
}
