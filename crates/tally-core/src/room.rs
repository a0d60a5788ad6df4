//! The shared room document and its field-level operations.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ability::{AbilityKind, AbilityTag};
use crate::change::FieldChange;
use crate::color::Color;
use crate::ids::{PlayerId, SessionId};
use crate::player::{Player, normalize_name};

/// Players captured right before a reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetSnapshot {
    pub timestamp: DateTime<Utc>,
    pub players: BTreeMap<PlayerId, Player>,
}

/// Reset/undo state of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminState {
    Normal,
    /// A reset happened and can be undone once.
    PendingUndo,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator_id: Option<SessionId>,
    #[serde(default)]
    pub players: BTreeMap<PlayerId, Player>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reset_state: Option<ResetSnapshot>,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RoomError {
    #[error("Player not found in the room: {0}")]
    PlayerNotFound(PlayerId),

    #[error("Player name must be 1-{max} characters", max = crate::player::MAX_NAME_LEN)]
    InvalidName,

    #[error("{kind} is a {tag} ability")]
    WrongAbilityKind { kind: AbilityKind, tag: &'static str },

    #[error("{kind} only accepts 0 or 1, got {value}")]
    InvalidToggleValue { kind: AbilityKind, value: u32 },

    #[error("Only the room creator can perform this action: {0}")]
    CreatorOnly(&'static str),

    #[error("Player {0} is managed by another session")]
    NotOwner(PlayerId),
}

impl Room {
    pub fn new() -> Self {
        Self::default()
    }

    /// A room exists once somebody has joined it.
    pub fn exists(&self) -> bool {
        self.creator_id.is_some() || !self.players.is_empty()
    }

    pub fn player(&self, player_id: &PlayerId) -> Option<&Player> {
        self.players.get(player_id)
    }

    pub fn is_creator(&self, session: SessionId) -> bool {
        self.creator_id == Some(session)
    }

    pub fn admin_state(&self) -> AdminState {
        if self.last_reset_state.is_some() {
            AdminState::PendingUndo
        } else {
            AdminState::Normal
        }
    }

    pub fn assert_creator(&self, session: SessionId, feature: &'static str) -> Result<(), RoomError> {
        if self.is_creator(session) {
            Ok(())
        } else {
            Err(RoomError::CreatorOnly(feature))
        }
    }

    fn require_player(&self, player_id: &PlayerId) -> Result<&Player, RoomError> {
        self.players
            .get(player_id)
            .ok_or_else(|| RoomError::PlayerNotFound(player_id.clone()))
    }

    fn commit(&mut self, changes: Vec<FieldChange>) -> Vec<FieldChange> {
        for change in &changes {
            self.apply(change);
        }
        changes
    }

    /// Adds a player with every ability at 0.
    ///
    /// The first player added to a creator-less room also makes `session`
    /// the creator, in the same change set.
    pub fn add_player(
        &mut self,
        id: PlayerId,
        name: &str,
        color: Option<Color>,
        session: SessionId,
    ) -> Result<Vec<FieldChange>, RoomError> {
        let name = normalize_name(name).ok_or(RoomError::InvalidName)?;
        let mut changes = Vec::with_capacity(2);
        if self.creator_id.is_none() {
            changes.push(FieldChange::CreatorSet {
                creator_id: session,
            });
        }
        changes.push(FieldChange::PlayerPut {
            player: Player::new(id, name, color),
        });
        Ok(self.commit(changes))
    }

    pub fn remove_player(&mut self, player_id: &PlayerId) -> Result<Vec<FieldChange>, RoomError> {
        self.require_player(player_id)?;
        Ok(self.commit(vec![FieldChange::PlayerRemoved {
            player_id: player_id.clone(),
        }]))
    }

    /// Writes an absolute value, last write wins.
    ///
    /// Callers that compute `value` from a cached document can lose a
    /// concurrent update; [`Room::adjust_ability`] cannot.
    pub fn set_ability(
        &mut self,
        player_id: &PlayerId,
        kind: AbilityKind,
        value: u32,
    ) -> Result<Vec<FieldChange>, RoomError> {
        self.require_player(player_id)?;
        if kind.is_toggle() && value > 1 {
            return Err(RoomError::InvalidToggleValue { kind, value });
        }
        Ok(self.commit(vec![FieldChange::AbilitySet {
            player_id: player_id.clone(),
            kind,
            value,
        }]))
    }

    /// Applies `delta` to the current value, clamping at 0.
    pub fn adjust_ability(
        &mut self,
        player_id: &PlayerId,
        kind: AbilityKind,
        delta: i32,
    ) -> Result<Vec<FieldChange>, RoomError> {
        if kind.tag() != AbilityTag::Counter {
            return Err(RoomError::WrongAbilityKind {
                kind,
                tag: "toggle",
            });
        }
        let current = self.require_player(player_id)?.abilities.get(kind);
        let value = current.saturating_add_signed(delta);
        Ok(self.commit(vec![FieldChange::AbilitySet {
            player_id: player_id.clone(),
            kind,
            value,
        }]))
    }

    /// Flips a toggle ability between 0 and 1.
    pub fn toggle_ability(
        &mut self,
        player_id: &PlayerId,
        kind: AbilityKind,
    ) -> Result<Vec<FieldChange>, RoomError> {
        if kind.tag() != AbilityTag::Toggle {
            return Err(RoomError::WrongAbilityKind {
                kind,
                tag: "counter",
            });
        }
        let current = self.require_player(player_id)?.abilities.get(kind);
        Ok(self.commit(vec![FieldChange::AbilitySet {
            player_id: player_id.clone(),
            kind,
            value: u32::from(current == 0),
        }]))
    }

    pub fn set_color(
        &mut self,
        player_id: &PlayerId,
        color: Color,
    ) -> Result<Vec<FieldChange>, RoomError> {
        self.require_player(player_id)?;
        Ok(self.commit(vec![FieldChange::ColorSet {
            player_id: player_id.clone(),
            color,
        }]))
    }

    /// Stores the current players for undo, then zeroes every ability.
    ///
    /// A pending snapshot is overwritten, never stacked.
    pub fn reset_all(
        &mut self,
        session: SessionId,
        now: DateTime<Utc>,
    ) -> Result<Vec<FieldChange>, RoomError> {
        self.assert_creator(session, "reset_all")?;

        let mut changes = vec![FieldChange::ResetStored {
            snapshot: ResetSnapshot {
                timestamp: now,
                players: self.players.clone(),
            },
        }];
        for player_id in self.players.keys() {
            changes.extend(AbilityKind::ALL.iter().map(|&kind| FieldChange::AbilitySet {
                player_id: player_id.clone(),
                kind,
                value: 0,
            }));
        }
        Ok(self.commit(changes))
    }

    /// Restores the pending snapshot. Without one this changes nothing.
    pub fn undo_reset(&mut self, session: SessionId) -> Result<Vec<FieldChange>, RoomError> {
        self.assert_creator(session, "undo_reset")?;

        let Some(snapshot) = &self.last_reset_state else {
            return Ok(Vec::new());
        };
        let changes = vec![
            FieldChange::PlayersReplaced {
                players: snapshot.players.clone(),
            },
            FieldChange::ResetCleared,
        ];
        Ok(self.commit(changes))
    }

    /// Applies one change. Changes addressed to absent players are ignored.
    pub fn apply(&mut self, change: &FieldChange) {
        match change {
            FieldChange::CreatorSet { creator_id } => self.creator_id = Some(*creator_id),
            FieldChange::PlayerPut { player } => {
                self.players.insert(player.id.clone(), player.clone());
            }
            FieldChange::PlayerRemoved { player_id } => {
                self.players.remove(player_id);
            }
            FieldChange::AbilitySet {
                player_id,
                kind,
                value,
            } => {
                if let Some(player) = self.players.get_mut(player_id) {
                    player.abilities.set(*kind, *value);
                }
            }
            FieldChange::ColorSet { player_id, color } => {
                if let Some(player) = self.players.get_mut(player_id) {
                    player.color = Some(*color);
                }
            }
            FieldChange::PlayersReplaced { players } => self.players = players.clone(),
            FieldChange::ResetStored { snapshot } => {
                self.last_reset_state = Some(snapshot.clone());
            }
            FieldChange::ResetCleared => self.last_reset_state = None,
        }
    }

    /// Changes that turn `self` into `other`.
    pub fn diff(&self, other: &Room) -> Vec<FieldChange> {
        let mut changes = Vec::new();

        if self.creator_id != other.creator_id
            && let Some(creator_id) = other.creator_id
        {
            changes.push(FieldChange::CreatorSet { creator_id });
        }

        for player_id in self.players.keys() {
            if !other.players.contains_key(player_id) {
                changes.push(FieldChange::PlayerRemoved {
                    player_id: player_id.clone(),
                });
            }
        }

        for (player_id, new) in &other.players {
            let Some(old) = self.players.get(player_id) else {
                changes.push(FieldChange::PlayerPut {
                    player: new.clone(),
                });
                continue;
            };
            if old == new {
                continue;
            }
            // A rename or a cleared color has no field-level change.
            let color_expressible = old.color == new.color || new.color.is_some();
            if old.name != new.name || !color_expressible {
                changes.push(FieldChange::PlayerPut {
                    player: new.clone(),
                });
                continue;
            }
            if let Some(color) = new.color.filter(|_| old.color != new.color) {
                changes.push(FieldChange::ColorSet {
                    player_id: player_id.clone(),
                    color,
                });
            }
            for ((kind, before), (_, after)) in old.abilities.iter().zip(new.abilities.iter()) {
                if before != after {
                    changes.push(FieldChange::AbilitySet {
                        player_id: player_id.clone(),
                        kind,
                        value: after,
                    });
                }
            }
        }

        if self.last_reset_state != other.last_reset_state {
            changes.push(match &other.last_reset_state {
                Some(snapshot) => FieldChange::ResetStored {
                    snapshot: snapshot.clone(),
                },
                None => FieldChange::ResetCleared,
            });
        }

        changes
    }
}
