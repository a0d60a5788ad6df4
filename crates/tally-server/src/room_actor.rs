//! One task per room.
//!
//! The actor owns the room document, applies every command in queue order,
//! and fans each resulting change set out to subscribers as a versioned
//! patch. Because every read and write of the document happens on this task,
//! creator election and counter increments need no further coordination.
//!
//! Session records are capped per room: once the cap is exceeded the least
//! recently seen disconnected sessions are forgotten, except the creator's
//! and those owning a player. An actor whose room is empty and has no
//! subscribers retires after `idle_timeout` without requests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tally_core::{Command, CommandContext, FieldChange, PlayerId, Room, RoomError, RoomId, SessionId};
use tally_proto::{CommandOutcome, Rejection, RequestId, SessionCredential};
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::config::RoomConfig;
use crate::error::ServerError;

pub type CommandResult = Result<CommandOutcome, Rejection>;

/// Called on the actor task right before an idle actor exits, with the room
/// id and the id of the retiring actor.
pub type RetireHook = Box<dyn FnOnce(&RoomId, u64) + Send>;

static NEXT_ACTOR_ID: AtomicU64 = AtomicU64::new(1);

/// One applied change set.
#[derive(Debug, Clone)]
pub struct RoomEvent {
    pub version: u64,
    pub changes: Arc<[FieldChange]>,
}

/// Counts a session as connected until dropped.
#[derive(Debug)]
pub struct Presence {
    session_id: SessionId,
    departures: mpsc::UnboundedSender<SessionId>,
}

impl Drop for Presence {
    fn drop(&mut self) {
        // The actor may already be gone.
        let _ = self.departures.send(self.session_id);
    }
}

/// Reply to a join: the session, a consistent snapshot, and a patch stream
/// starting right after that snapshot.
#[derive(Debug)]
pub struct Joined {
    pub credential: SessionCredential,
    pub is_creator: bool,
    pub resumed: bool,
    pub version: u64,
    pub room: Room,
    pub events: broadcast::Receiver<RoomEvent>,
    pub presence: Presence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomStats {
    pub version: u64,
    pub sessions: usize,
    pub subscribers: usize,
}

enum RoomRequest {
    Join {
        credential: Option<SessionCredential>,
        reply: oneshot::Sender<Joined>,
    },
    Command {
        credential: SessionCredential,
        request_id: RequestId,
        command: Command,
        reply: oneshot::Sender<CommandResult>,
    },
    Snapshot {
        reply: oneshot::Sender<(u64, Room)>,
    },
    Stats {
        reply: oneshot::Sender<RoomStats>,
    },
}

/// Cheap handle for talking to a room actor.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    actor_id: u64,
    requests: mpsc::Sender<RoomRequest>,
}

impl std::fmt::Debug for RoomRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoomRequest::Join { .. } => f.write_str("Join"),
            RoomRequest::Command { command, .. } => write!(f, "Command({})", command.name()),
            RoomRequest::Snapshot { .. } => f.write_str("Snapshot"),
            RoomRequest::Stats { .. } => f.write_str("Stats"),
        }
    }
}

impl RoomHandle {
    /// Spawns the actor for `room_id` on the current tokio runtime.
    pub fn spawn(room_id: RoomId, config: RoomConfig) -> Self {
        Self::spawn_with_hook(room_id, config, None)
    }

    pub fn spawn_with_hook(room_id: RoomId, config: RoomConfig, on_retire: Option<RetireHook>) -> Self {
        let actor_id = NEXT_ACTOR_ID.fetch_add(1, Ordering::Relaxed);
        let (requests, inbox) = mpsc::channel(config.command_queue);
        let actor = RoomActor::new(room_id.clone(), actor_id, config, inbox, on_retire);
        tokio::spawn(actor.run());
        Self {
            room_id,
            actor_id,
            requests,
        }
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn actor_id(&self) -> u64 {
        self.actor_id
    }

    /// True once the actor has retired or stopped.
    pub fn is_closed(&self) -> bool {
        self.requests.is_closed()
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> RoomRequest,
    ) -> Result<T, ServerError> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(make(reply))
            .await
            .map_err(|_| ServerError::RoomClosed)?;
        response.await.map_err(|_| ServerError::RoomClosed)
    }

    /// Joins with an existing credential, or mints a new session.
    pub async fn join(&self, credential: Option<SessionCredential>) -> Result<Joined, ServerError> {
        self.request(|reply| RoomRequest::Join { credential, reply })
            .await
    }

    pub async fn execute(
        &self,
        credential: SessionCredential,
        request_id: RequestId,
        command: Command,
    ) -> Result<CommandResult, ServerError> {
        self.request(|reply| RoomRequest::Command {
            credential,
            request_id,
            command,
            reply,
        })
        .await
    }

    pub async fn snapshot(&self) -> Result<(u64, Room), ServerError> {
        self.request(|reply| RoomRequest::Snapshot { reply }).await
    }

    pub async fn stats(&self) -> Result<RoomStats, ServerError> {
        self.request(|reply| RoomRequest::Stats { reply }).await
    }
}

struct SessionRecord {
    secret: String,
    recent: VecDeque<(RequestId, CommandResult)>,
    connections: usize,
    last_seen: u64,
}

impl SessionRecord {
    fn new(secret: String) -> Self {
        Self {
            secret,
            recent: VecDeque::new(),
            connections: 0,
            last_seen: 0,
        }
    }

    fn replay(&self, request_id: RequestId) -> Option<CommandResult> {
        self.recent
            .iter()
            .find(|(id, _)| *id == request_id)
            .map(|(_, result)| result.clone())
    }

    fn remember(&mut self, request_id: RequestId, result: CommandResult, window: usize) {
        if window == 0 {
            return;
        }
        while self.recent.len() >= window {
            self.recent.pop_front();
        }
        self.recent.push_back((request_id, result));
    }
}

struct RoomActor {
    room_id: RoomId,
    actor_id: u64,
    room: Room,
    version: u64,
    sessions: HashMap<SessionId, SessionRecord>,
    /// Session that added each player. Entries outlive removal so players
    /// restored by an undo keep their owner.
    owners: HashMap<PlayerId, SessionId>,
    /// Monotonic activity counter used to order sessions for eviction.
    clock: u64,
    events: broadcast::Sender<RoomEvent>,
    inbox: mpsc::Receiver<RoomRequest>,
    departures_tx: mpsc::UnboundedSender<SessionId>,
    departures: mpsc::UnboundedReceiver<SessionId>,
    on_retire: Option<RetireHook>,
    config: RoomConfig,
}

impl RoomActor {
    fn new(
        room_id: RoomId,
        actor_id: u64,
        config: RoomConfig,
        inbox: mpsc::Receiver<RoomRequest>,
        on_retire: Option<RetireHook>,
    ) -> Self {
        let (events, _) = broadcast::channel(config.broadcast_capacity);
        let (departures_tx, departures) = mpsc::unbounded_channel();
        Self {
            room_id,
            actor_id,
            room: Room::new(),
            version: 0,
            sessions: HashMap::new(),
            owners: HashMap::new(),
            clock: 0,
            events,
            inbox,
            departures_tx,
            departures,
            on_retire,
            config,
        }
    }

    async fn run(mut self) {
        tracing::info!(room_id = %self.room_id, actor_id = self.actor_id, "Room actor started");

        loop {
            tokio::select! {
                biased;
                Some(session_id) = self.departures.recv() => self.depart(session_id),
                request = self.inbox.recv() => match request {
                    Some(request) => self.handle_request(request),
                    None => break,
                },
                () = tokio::time::sleep(self.config.idle_timeout) => {
                    if self.is_idle() {
                        self.retire();
                        break;
                    }
                }
            }
        }

        tracing::info!(room_id = %self.room_id, actor_id = self.actor_id, "Room actor stopped");
    }

    fn handle_request(&mut self, request: RoomRequest) {
        match request {
            RoomRequest::Join { credential, reply } => {
                let joined = self.join(credential);
                let _ = reply.send(joined);
            }
            RoomRequest::Command {
                credential,
                request_id,
                command,
                reply,
            } => {
                let result = self.handle_command(&credential, request_id, &command);
                let _ = reply.send(result);
            }
            RoomRequest::Snapshot { reply } => {
                let _ = reply.send((self.version, self.room.clone()));
            }
            RoomRequest::Stats { reply } => {
                let _ = reply.send(RoomStats {
                    version: self.version,
                    sessions: self.sessions.len(),
                    subscribers: self.events.receiver_count(),
                });
            }
        }
    }

    fn is_idle(&self) -> bool {
        self.events.receiver_count() == 0 && !self.room.exists() && self.inbox.is_empty()
    }

    fn retire(&mut self) {
        self.inbox.close();
        tracing::info!(room_id = %self.room_id, actor_id = self.actor_id, "Idle room retired");
        if let Some(on_retire) = self.on_retire.take() {
            on_retire(&self.room_id, self.actor_id);
        }
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn depart(&mut self, session_id: SessionId) {
        if let Some(record) = self.sessions.get_mut(&session_id) {
            record.connections = record.connections.saturating_sub(1);
        }
        self.evict_sessions();
    }

    /// Drops the least recently seen disconnected sessions above the cap.
    /// The creator and player owners are kept.
    fn evict_sessions(&mut self) {
        let excess = self.sessions.len().saturating_sub(self.config.max_sessions);
        if excess == 0 {
            return;
        }
        let protected: HashSet<SessionId> = self
            .owners
            .values()
            .copied()
            .chain(self.room.creator_id)
            .collect();
        let mut idle: Vec<(u64, SessionId)> = self
            .sessions
            .iter()
            .filter(|(id, record)| record.connections == 0 && !protected.contains(*id))
            .map(|(id, record)| (record.last_seen, *id))
            .collect();
        idle.sort_unstable();

        let evicted = idle.len().min(excess);
        for (_, session_id) in idle.into_iter().take(excess) {
            self.sessions.remove(&session_id);
        }
        if evicted > 0 {
            tracing::debug!(
                room_id = %self.room_id,
                evicted,
                sessions = self.sessions.len(),
                "Evicted idle sessions"
            );
        }
    }

    fn authenticate(&self, credential: &SessionCredential) -> bool {
        self.sessions
            .get(&credential.session_id)
            .is_some_and(|record| record.secret == credential.secret)
    }

    fn join(&mut self, credential: Option<SessionCredential>) -> Joined {
        let known = credential.filter(|c| self.authenticate(c));
        let resumed = known.is_some();
        let credential = known.unwrap_or_else(|| {
            let credential = SessionCredential::issue();
            self.sessions.insert(
                credential.session_id,
                SessionRecord::new(credential.secret.clone()),
            );
            credential
        });

        let now = self.tick();
        if let Some(record) = self.sessions.get_mut(&credential.session_id) {
            record.connections += 1;
            record.last_seen = now;
        }
        self.evict_sessions();

        tracing::info!(
            room_id = %self.room_id,
            session_id = %credential.session_id,
            resumed,
            version = self.version,
            "Session joined room"
        );

        Joined {
            is_creator: self.room.is_creator(credential.session_id),
            presence: Presence {
                session_id: credential.session_id,
                departures: self.departures_tx.clone(),
            },
            credential,
            resumed,
            version: self.version,
            room: self.room.clone(),
            events: self.events.subscribe(),
        }
    }

    fn handle_command(
        &mut self,
        credential: &SessionCredential,
        request_id: RequestId,
        command: &Command,
    ) -> CommandResult {
        if !self.authenticate(credential) {
            return Err(Rejection::NotJoined);
        }
        let session = credential.session_id;
        let now = self.tick();
        if let Some(record) = self.sessions.get_mut(&session) {
            record.last_seen = now;
        }

        if let Some(previous) = self
            .sessions
            .get(&session)
            .and_then(|record| record.replay(request_id))
        {
            tracing::debug!(
                room_id = %self.room_id,
                session_id = %session,
                request_id = %request_id,
                "Replaying outcome of a retried request"
            );
            return previous;
        }

        let result = self.apply_command(session, command);

        let window = self.config.dedupe_window;
        if let Some(record) = self.sessions.get_mut(&session) {
            record.remember(request_id, result.clone(), window);
        }
        result
    }

    fn reject(&self, session: SessionId, command: &Command, err: &RoomError) -> Rejection {
        tracing::debug!(
            room_id = %self.room_id,
            session_id = %session,
            command = command.name(),
            error = %err,
            "Command rejected"
        );
        Rejection::from(err)
    }

    fn apply_command(&mut self, session: SessionId, command: &Command) -> CommandResult {
        if self.config.enforce_ownership
            && let Some(player_id) = command.target_player()
            && let Some(owner) = self.owners.get(player_id)
            && *owner != session
        {
            return Err(self.reject(session, command, &RoomError::NotOwner(player_id.clone())));
        }

        let ctx = CommandContext::new(session);
        let (changes, outcome) = match command {
            Command::AddPlayer { name, color } => {
                let mut player_id = PlayerId::generate();
                while self.room.players.contains_key(&player_id) || self.owners.contains_key(&player_id) {
                    player_id = PlayerId::generate();
                }
                let changes = self
                    .room
                    .add_player(player_id.clone(), name, *color, session)
                    .map_err(|err| self.reject(session, command, &err))?;
                let became_creator = changes
                    .iter()
                    .any(|change| matches!(change, FieldChange::CreatorSet { .. }));
                if became_creator {
                    tracing::info!(room_id = %self.room_id, session_id = %session, "Room creator elected");
                }
                self.owners.insert(player_id.clone(), session);
                (
                    changes,
                    CommandOutcome::PlayerAdded {
                        player_id,
                        became_creator,
                    },
                )
            }
            other => {
                let changes = self
                    .room
                    .execute(other, &ctx)
                    .map_err(|err| self.reject(session, command, &err))?;
                let count = changes.len();
                (changes, CommandOutcome::Applied { changes: count })
            }
        };

        match command {
            Command::ResetAll => tracing::info!(
                room_id = %self.room_id,
                players = self.room.players.len(),
                "Room reset, undo available"
            ),
            Command::UndoReset if !changes.is_empty() => {
                tracing::info!(room_id = %self.room_id, "Room reset undone");
            }
            _ => tracing::debug!(
                room_id = %self.room_id,
                session_id = %session,
                command = command.name(),
                changes = changes.len(),
                "Command applied"
            ),
        }

        self.publish(changes);
        Ok(outcome)
    }

    fn publish(&mut self, changes: Vec<FieldChange>) {
        if changes.is_empty() {
            return;
        }
        self.version += 1;
        // No subscribers is fine; the document is still updated.
        let _ = self.events.send(RoomEvent {
            version: self.version,
            changes: changes.into(),
        });
    }
}
