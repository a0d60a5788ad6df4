//! Client view of one room.
//!
//! [`ClientSession`] performs no I/O on the socket. It turns user actions
//! into commands, folds server messages into a local copy of the room, and
//! tracks which players this client manages. Changes are never applied
//! locally before the server echoes them back as a patch.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tally_core::player::normalize_name;
use tally_core::{
    AbilityKind, AdminState, Color, Command, FieldChange, FieldPath, Player, PlayerId, Room,
    RoomId,
};
use tally_proto::{ClientMessage, CommandOutcome, Rejection, RequestId, ServerMessage, SessionCredential};

use crate::error::ClientError;
use crate::history::{RoomHistoryEntry, record_visit};
use crate::local;
use crate::store::KeyValueStore;

/// A command waiting for its ack. Retries reuse the same `request_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCommand {
    pub request_id: RequestId,
    pub command: Command,
}

impl PendingCommand {
    pub fn to_message(&self) -> ClientMessage {
        ClientMessage::Command {
            request_id: self.request_id,
            command: self.command.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Welcome processed.
    Joined { changed: Vec<FieldPath> },
    /// Snapshot or patch applied.
    Updated { changed: Vec<FieldPath> },
    /// A patch did not follow the local version; send [`ClientMessage::Resync`].
    /// Reported once per gap; later patches are dropped until a snapshot
    /// arrives.
    ResyncNeeded,
    Acked {
        request_id: RequestId,
        outcome: CommandOutcome,
    },
    Rejected {
        request_id: RequestId,
        reason: Rejection,
    },
    ServerError { message: String },
}

pub struct ClientSession {
    room_id: RoomId,
    store: Arc<dyn KeyValueStore>,
    credential: Option<SessionCredential>,
    room: Room,
    version: Option<u64>,
    naive_creator_claim: bool,
    owned: Vec<PlayerId>,
    current: Option<PlayerId>,
    pending: HashMap<RequestId, Command>,
    resync_requested: bool,
}

impl std::fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("room_id", &self.room_id)
            .field("version", &self.version)
            .field("owned", &self.owned)
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl ClientSession {
    /// Reads the managed list and any stored credential for `room_id`.
    pub fn new(room_id: RoomId, store: Arc<dyn KeyValueStore>) -> Result<Self, ClientError> {
        let owned = local::load_managed(store.as_ref(), &room_id)?;
        let credential = local::load_credential(store.as_ref(), &room_id)?;
        Ok(Self {
            room_id,
            store,
            credential,
            room: Room::new(),
            version: None,
            naive_creator_claim: false,
            current: owned.first().cloned(),
            owned,
            pending: HashMap::new(),
            resync_requested: false,
        })
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn room(&self) -> &Room {
        &self.room
    }

    pub fn version(&self) -> Option<u64> {
        self.version
    }

    pub fn credential(&self) -> Option<&SessionCredential> {
        self.credential.as_ref()
    }

    pub fn is_joined(&self) -> bool {
        self.version.is_some()
    }

    pub fn join_message(&self) -> ClientMessage {
        ClientMessage::Join {
            credential: self.credential.clone(),
        }
    }

    // Views

    /// Managed players that still exist, in the order they were added.
    pub fn my_players(&self) -> Vec<&Player> {
        self.owned
            .iter()
            .filter_map(|id| self.room.player(id))
            .collect()
    }

    /// Every player this client does not manage.
    pub fn team_members(&self) -> Vec<&Player> {
        self.room
            .players
            .values()
            .filter(|player| !self.owned.contains(&player.id))
            .collect()
    }

    pub fn current_player(&self) -> Option<&Player> {
        self.current
            .as_ref()
            .and_then(|id| self.room.player(id))
            .or_else(|| self.my_players().into_iter().next())
    }

    /// Only a managed id can become the edit target.
    pub fn select_player(&mut self, player_id: &PlayerId) -> bool {
        if !self.owned.contains(player_id) {
            return false;
        }
        self.current = Some(player_id.clone());
        true
    }

    /// Whether the server recorded this session as the room creator.
    pub fn is_creator(&self) -> bool {
        self.credential
            .as_ref()
            .is_some_and(|c| self.room.is_creator(c.session_id))
    }

    pub fn admin_state(&self) -> AdminState {
        self.room.admin_state()
    }

    pub fn can_undo(&self) -> bool {
        self.is_creator() && self.admin_state() == AdminState::PendingUndo
    }

    /// True when the room had no creator in the snapshot this session joined
    /// with. Two sessions joining an empty room at once both see `true`;
    /// only [`ClientSession::is_creator`] is authoritative.
    pub fn naive_creator_claim(&self) -> bool {
        self.naive_creator_claim
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    // Commands

    fn issue(&mut self, command: Command) -> PendingCommand {
        let request_id = RequestId::new();
        tracing::debug!(room_id = %self.room_id, command = command.name(), request_id = %request_id, "Issuing command");
        self.pending.insert(request_id, command.clone());
        PendingCommand {
            request_id,
            command,
        }
    }

    fn cached_value(&self, player_id: &PlayerId, kind: AbilityKind) -> Result<u32, ClientError> {
        self.room
            .player(player_id)
            .map(|player| player.abilities.get(kind))
            .ok_or_else(|| ClientError::InvalidInput(format!("Unknown player {player_id}")))
    }

    pub fn add_player(&mut self, name: &str, color: Option<Color>) -> Result<PendingCommand, ClientError> {
        let name = normalize_name(name)
            .ok_or_else(|| ClientError::InvalidInput("Player name must not be empty".to_string()))?;
        Ok(self.issue(Command::AddPlayer { name, color }))
    }

    pub fn remove_player(&mut self, player_id: &PlayerId) -> PendingCommand {
        self.issue(Command::RemovePlayer {
            player_id: player_id.clone(),
        })
    }

    /// Adds `delta` to the server's current value.
    pub fn update_ability(
        &mut self,
        player_id: &PlayerId,
        kind: AbilityKind,
        delta: i32,
    ) -> Result<PendingCommand, ClientError> {
        if kind.is_toggle() {
            return Err(ClientError::InvalidInput(format!("{kind} is a toggle ability")));
        }
        Ok(self.issue(Command::AdjustAbility {
            player_id: player_id.clone(),
            ability: kind,
            delta,
        }))
    }

    /// Writes `max(0, cached + delta)` as an absolute value. Concurrent
    /// writers computing from the same cached value overwrite each other.
    pub fn update_ability_from_cache(
        &mut self,
        player_id: &PlayerId,
        kind: AbilityKind,
        delta: i32,
    ) -> Result<PendingCommand, ClientError> {
        let value = self.cached_value(player_id, kind)?.saturating_add_signed(delta);
        Ok(self.issue(Command::SetAbility {
            player_id: player_id.clone(),
            ability: kind,
            value,
        }))
    }

    pub fn toggle_ability(
        &mut self,
        player_id: &PlayerId,
        kind: AbilityKind,
    ) -> Result<PendingCommand, ClientError> {
        if !kind.is_toggle() {
            return Err(ClientError::InvalidInput(format!("{kind} is a counter ability")));
        }
        Ok(self.issue(Command::ToggleAbility {
            player_id: player_id.clone(),
            ability: kind,
        }))
    }

    /// Writes the flipped cached value.
    pub fn toggle_ability_from_cache(
        &mut self,
        player_id: &PlayerId,
        kind: AbilityKind,
    ) -> Result<PendingCommand, ClientError> {
        let value = u32::from(self.cached_value(player_id, kind)? == 0);
        Ok(self.issue(Command::SetAbility {
            player_id: player_id.clone(),
            ability: kind,
            value,
        }))
    }

    pub fn set_color(&mut self, player_id: &PlayerId, color: Color) -> PendingCommand {
        self.issue(Command::SetColor {
            player_id: player_id.clone(),
            color,
        })
    }

    pub fn reset_all(&mut self) -> PendingCommand {
        self.issue(Command::ResetAll)
    }

    pub fn undo_reset(&mut self) -> PendingCommand {
        self.issue(Command::UndoReset)
    }

    /// Drops a command that will not be retried any more.
    pub fn forget(&mut self, request_id: RequestId) {
        self.pending.remove(&request_id);
    }

    // Server messages

    pub fn handle(&mut self, message: ServerMessage) -> Result<SessionEvent, ClientError> {
        match message {
            ServerMessage::Welcome {
                credential,
                is_creator,
                resumed,
                version,
                room,
            } => {
                tracing::info!(
                    room_id = %self.room_id,
                    session_id = %credential.session_id,
                    resumed,
                    is_creator,
                    version,
                    "Joined room"
                );
                local::save_credential(self.store.as_ref(), &self.room_id, &credential)?;
                self.credential = Some(credential);
                self.naive_creator_claim = room.creator_id.is_none();
                let changed = self.replace_room(version, room)?;
                Ok(SessionEvent::Joined { changed })
            }
            ServerMessage::Snapshot { version, room } => {
                let changed = self.replace_room(version, room)?;
                Ok(SessionEvent::Updated { changed })
            }
            ServerMessage::Patch { version, changes } => self.apply_patch(version, &changes),
            ServerMessage::Ack {
                request_id,
                outcome,
            } => {
                self.acknowledge(request_id, &outcome)?;
                Ok(SessionEvent::Acked {
                    request_id,
                    outcome,
                })
            }
            ServerMessage::Rejected { request_id, reason } => {
                if let Some(Command::RemovePlayer { player_id }) = self.pending.remove(&request_id)
                    && matches!(reason, Rejection::NotFound { .. })
                {
                    self.drop_owned(&player_id)?;
                }
                tracing::debug!(room_id = %self.room_id, request_id = %request_id, reason = %reason, "Command rejected");
                Ok(SessionEvent::Rejected { request_id, reason })
            }
            ServerMessage::Error { message } => {
                tracing::warn!(room_id = %self.room_id, error = %message, "Server reported an error");
                Ok(SessionEvent::ServerError { message })
            }
        }
    }

    fn replace_room(&mut self, version: u64, room: Room) -> Result<Vec<FieldPath>, ClientError> {
        let changed = self.room.diff(&room).iter().map(FieldChange::path).collect();
        self.room = room;
        self.version = Some(version);
        self.resync_requested = false;
        self.record_history()?;
        Ok(changed)
    }

    fn apply_patch(&mut self, version: u64, changes: &[FieldChange]) -> Result<SessionEvent, ClientError> {
        let Some(current) = self.version else {
            return Err(ClientError::NotJoined);
        };
        if version <= current {
            return Ok(SessionEvent::Updated { changed: Vec::new() });
        }
        if version != current + 1 {
            if self.resync_requested {
                tracing::debug!(room_id = %self.room_id, got = version, "Dropping patch while resync is outstanding");
                return Ok(SessionEvent::Updated { changed: Vec::new() });
            }
            tracing::warn!(room_id = %self.room_id, expected = current + 1, got = version, "Patch version gap");
            self.resync_requested = true;
            return Ok(SessionEvent::ResyncNeeded);
        }
        for change in changes {
            self.room.apply(change);
        }
        self.version = Some(version);
        self.record_history()?;
        Ok(SessionEvent::Updated {
            changed: changes.iter().map(FieldChange::path).collect(),
        })
    }

    fn acknowledge(&mut self, request_id: RequestId, outcome: &CommandOutcome) -> Result<(), ClientError> {
        let Some(command) = self.pending.remove(&request_id) else {
            return Ok(());
        };
        match (command, outcome) {
            (Command::AddPlayer { .. }, CommandOutcome::PlayerAdded { player_id, .. }) => {
                if !self.owned.contains(player_id) {
                    self.owned.push(player_id.clone());
                    local::save_managed(self.store.as_ref(), &self.room_id, &self.owned)?;
                }
                if self.current.is_none() {
                    self.current = Some(player_id.clone());
                }
            }
            (Command::RemovePlayer { player_id }, _) => self.drop_owned(&player_id)?,
            _ => {}
        }
        Ok(())
    }

    fn drop_owned(&mut self, player_id: &PlayerId) -> Result<(), ClientError> {
        let before = self.owned.len();
        self.owned.retain(|id| id != player_id);
        if self.owned.len() != before {
            local::save_managed(self.store.as_ref(), &self.room_id, &self.owned)?;
        }
        if self.current.as_ref() == Some(player_id) {
            self.current = self.owned.first().cloned();
        }
        Ok(())
    }

    /// Refreshes this room's history entry on every room update while the
    /// client manages at least one player.
    fn record_history(&self) -> Result<(), ClientError> {
        let names: Vec<String> = self
            .my_players()
            .into_iter()
            .map(|player| player.name.clone())
            .collect();
        if names.is_empty() {
            return Ok(());
        }
        record_visit(
            self.store.as_ref(),
            RoomHistoryEntry {
                room_id: self.room_id.clone(),
                last_visited: Utc::now(),
                player_names: names,
            },
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::RoomHistory;
    use crate::store::MemoryStore;
    use tally_core::{CommandContext, SessionId};

    /// Plays the server side of a room for one or more sessions.
    struct FakeServer {
        room: Room,
        version: u64,
    }

    impl FakeServer {
        fn new() -> Self {
            Self {
                room: Room::new(),
                version: 0,
            }
        }

        fn welcome(&self, credential: &SessionCredential) -> ServerMessage {
            ServerMessage::Welcome {
                credential: credential.clone(),
                is_creator: self.room.is_creator(credential.session_id),
                resumed: false,
                version: self.version,
                room: self.room.clone(),
            }
        }

        /// Returns the ack and the patch, in the order the server sends them.
        fn run(&mut self, session: SessionId, pending: &PendingCommand) -> (ServerMessage, ServerMessage) {
            let ctx = CommandContext::new(session);
            let (changes, outcome) = match &pending.command {
                Command::AddPlayer { name, color } => {
                    let player_id = PlayerId::generate();
                    let changes = self
                        .room
                        .add_player(player_id.clone(), name, *color, session)
                        .unwrap();
                    let became_creator = changes
                        .iter()
                        .any(|c| matches!(c, FieldChange::CreatorSet { .. }));
                    (
                        changes,
                        CommandOutcome::PlayerAdded {
                            player_id,
                            became_creator,
                        },
                    )
                }
                other => {
                    let changes = self.room.execute(other, &ctx).unwrap();
                    let count = changes.len();
                    (changes, CommandOutcome::Applied { changes: count })
                }
            };
            self.version += 1;
            (
                ServerMessage::Ack {
                    request_id: pending.request_id,
                    outcome,
                },
                ServerMessage::Patch {
                    version: self.version,
                    changes,
                },
            )
        }
    }

    fn room_id() -> RoomId {
        "AB12".parse().unwrap()
    }

    fn joined(server: &FakeServer, store: Arc<dyn KeyValueStore>) -> ClientSession {
        let mut session = ClientSession::new(room_id(), store).unwrap();
        let credential = SessionCredential::issue();
        session.handle(server.welcome(&credential)).unwrap();
        session
    }

    fn deliver(server: &mut FakeServer, session: &mut ClientSession, pending: &PendingCommand) {
        let id = session.credential().unwrap().session_id;
        let (ack, patch) = server.run(id, pending);
        session.handle(ack).unwrap();
        session.handle(patch).unwrap();
    }

    #[test]
    fn test_add_player_becomes_owned_and_current() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let mut server = FakeServer::new();
        let mut session = joined(&server, store.clone());
        assert!(session.naive_creator_claim());
        assert!(!session.is_creator());

        let add = session.add_player("  Alice ", Some(Color::RED)).unwrap();
        deliver(&mut server, &mut session, &add);

        assert!(session.is_creator());
        assert_eq!(session.my_players().len(), 1);
        assert_eq!(session.current_player().unwrap().name, "Alice");
        assert!(session.team_members().is_empty());
        assert_eq!(local::load_managed(store.as_ref(), &room_id()).unwrap().len(), 1);

        let history = RoomHistory::load(store.as_ref()).unwrap();
        assert_eq!(history.entries()[0].player_names, vec!["Alice".to_string()]);
    }

    #[test]
    fn test_blank_name_is_not_sent() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let mut session = joined(&FakeServer::new(), store);
        assert!(matches!(session.add_player("   ", None), Err(ClientError::InvalidInput(_))));
        assert_eq!(session.pending_count(), 0);
    }

    #[test]
    fn test_no_local_change_before_patch() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let mut server = FakeServer::new();
        let mut session = joined(&server, store);
        let add = session.add_player("Alice", None).unwrap();
        deliver(&mut server, &mut session, &add);
        let player = session.my_players()[0].id.clone();

        let adjust = session.update_ability(&player, AbilityKind::Strength, 1).unwrap();
        let (ack, patch) = server.run(session.credential().unwrap().session_id, &adjust);
        session.handle(ack).unwrap();
        assert_eq!(session.room().players[&player].abilities.get(AbilityKind::Strength), 0);

        let event = session.handle(patch).unwrap();
        assert_eq!(
            event,
            SessionEvent::Updated {
                changed: vec![FieldPath::Ability(player.clone(), AbilityKind::Strength)]
            }
        );
        assert_eq!(session.room().players[&player].abilities.get(AbilityKind::Strength), 1);
    }

    #[test]
    fn test_version_gap_requests_resync() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let mut server = FakeServer::new();
        let mut watcher = joined(&server, store.clone());
        let mut writer = joined(&server, Arc::new(MemoryStore::new()));

        let first = writer.add_player("A", None).unwrap();
        let (_, patch1) = server.run(writer.credential().unwrap().session_id, &first);
        let second = writer.add_player("B", None).unwrap();
        let (_, patch2) = server.run(writer.credential().unwrap().session_id, &second);

        assert_eq!(watcher.handle(patch2).unwrap(), SessionEvent::ResyncNeeded);
        assert_eq!(watcher.version(), Some(0));

        let snapshot = ServerMessage::Snapshot {
            version: server.version,
            room: server.room.clone(),
        };
        let SessionEvent::Updated { changed } = watcher.handle(snapshot).unwrap() else {
            panic!("expected update");
        };
        assert_eq!(changed.len(), 3);
        assert_eq!(watcher.room(), &server.room);

        // Stale patches after a snapshot are ignored.
        assert_eq!(
            watcher.handle(patch1).unwrap(),
            SessionEvent::Updated { changed: Vec::new() }
        );
        assert_eq!(watcher.team_members().len(), 2);
        assert!(watcher.my_players().is_empty());
    }

    #[test]
    fn test_one_resync_per_gap() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let mut server = FakeServer::new();
        let mut watcher = joined(&server, store);
        let mut writer = joined(&server, Arc::new(MemoryStore::new()));
        let writer_id = writer.credential().unwrap().session_id;

        let mut patches = Vec::new();
        for name in ["A", "B", "C", "D"] {
            let add = writer.add_player(name, None).unwrap();
            patches.push(server.run(writer_id, &add).1);
        }
        let mut patches = patches.into_iter().skip(1);

        assert_eq!(watcher.handle(patches.next().unwrap()).unwrap(), SessionEvent::ResyncNeeded);
        for patch in patches {
            assert_eq!(
                watcher.handle(patch).unwrap(),
                SessionEvent::Updated { changed: Vec::new() }
            );
        }
        assert_eq!(watcher.version(), Some(0));

        watcher
            .handle(ServerMessage::Snapshot {
                version: server.version,
                room: server.room.clone(),
            })
            .unwrap();
        assert_eq!(watcher.version(), Some(4));

        // A new gap after the snapshot asks again.
        let late = writer.add_player("E", None).unwrap();
        server.run(writer_id, &late);
        let later = writer.add_player("F", None).unwrap();
        let (_, gap) = server.run(writer_id, &later);
        assert_eq!(watcher.handle(gap).unwrap(), SessionEvent::ResyncNeeded);
    }

    #[test]
    fn test_every_update_refreshes_history_timestamp() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let mut server = FakeServer::new();
        let mut session = joined(&server, store.clone());
        let add = session.add_player("Alice", None).unwrap();
        deliver(&mut server, &mut session, &add);
        let player = session.my_players()[0].id.clone();

        let stale = Utc::now() - chrono::TimeDelta::days(3);
        record_visit(
            store.as_ref(),
            RoomHistoryEntry {
                room_id: room_id(),
                last_visited: stale,
                player_names: vec!["Alice".to_string()],
            },
        )
        .unwrap();

        // Same names as before; the visit time still moves.
        let bump = session.update_ability(&player, AbilityKind::Health, 1).unwrap();
        deliver(&mut server, &mut session, &bump);

        let history = RoomHistory::load(store.as_ref()).unwrap();
        assert_eq!(history.entries().len(), 1);
        assert!(history.entries()[0].last_visited > stale);
        assert_eq!(history.entries()[0].player_names, vec!["Alice".to_string()]);
    }

    #[test]
    fn test_select_and_remove_fall_back() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let mut server = FakeServer::new();
        let mut session = joined(&server, store);
        for name in ["One", "Two"] {
            let add = session.add_player(name, None).unwrap();
            deliver(&mut server, &mut session, &add);
        }
        let ids: Vec<PlayerId> = session.my_players().iter().map(|p| p.id.clone()).collect();
        assert_eq!(session.current_player().unwrap().id, ids[0]);

        assert!(session.select_player(&ids[1]));
        assert!(!session.select_player(&PlayerId::from("someone-else")));
        assert_eq!(session.current_player().unwrap().id, ids[1]);

        let remove = session.remove_player(&ids[1]);
        deliver(&mut server, &mut session, &remove);
        assert_eq!(session.current_player().unwrap().id, ids[0]);
        assert_eq!(session.my_players().len(), 1);
    }

    #[test]
    fn test_cached_paths_compute_absolute_values() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let mut server = FakeServer::new();
        let mut session = joined(&server, store);
        let add = session.add_player("P", None).unwrap();
        deliver(&mut server, &mut session, &add);
        let player = session.my_players()[0].id.clone();

        let down = session
            .update_ability_from_cache(&player, AbilityKind::SprintSpeed, -1)
            .unwrap();
        assert_eq!(
            down.command,
            Command::SetAbility {
                player_id: player.clone(),
                ability: AbilityKind::SprintSpeed,
                value: 0
            }
        );

        let toggle = session
            .toggle_ability_from_cache(&player, AbilityKind::MapPlayerCount)
            .unwrap();
        assert_eq!(
            toggle.command,
            Command::SetAbility {
                player_id: player.clone(),
                ability: AbilityKind::MapPlayerCount,
                value: 1
            }
        );

        assert!(session.toggle_ability(&player, AbilityKind::SprintSpeed).is_err());
        assert!(session.update_ability(&player, AbilityKind::MapPlayerCount, 1).is_err());
    }

    #[test]
    fn test_reset_and_undo_flags() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let mut server = FakeServer::new();
        let mut creator = joined(&server, store);
        let add = creator.add_player("P", None).unwrap();
        deliver(&mut server, &mut creator, &add);
        let player = creator.my_players()[0].id.clone();
        let bump = creator.update_ability(&player, AbilityKind::Health, 3).unwrap();
        deliver(&mut server, &mut creator, &bump);

        let reset = creator.reset_all();
        deliver(&mut server, &mut creator, &reset);
        assert!(creator.can_undo());
        assert_eq!(creator.room().players[&player].abilities.get(AbilityKind::Health), 0);

        let undo = creator.undo_reset();
        deliver(&mut server, &mut creator, &undo);
        assert!(!creator.can_undo());
        assert_eq!(creator.admin_state(), AdminState::Normal);
        assert_eq!(creator.room().players[&player].abilities.get(AbilityKind::Health), 3);
    }

    #[test]
    fn test_owned_list_survives_new_session() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let mut server = FakeServer::new();
        let mut session = joined(&server, store.clone());
        let add = session.add_player("Kept", None).unwrap();
        deliver(&mut server, &mut session, &add);
        let credential = session.credential().unwrap().clone();

        let mut reopened = ClientSession::new(room_id(), store).unwrap();
        assert_eq!(reopened.join_message(), ClientMessage::Join { credential: Some(credential.clone()) });
        reopened.handle(server.welcome(&credential)).unwrap();
        assert_eq!(reopened.my_players()[0].name, "Kept");
        assert!(reopened.is_creator());
        assert!(!reopened.naive_creator_claim());
    }
}
