//! WebSocket session for one client in one room.
//!
//! The first text frame must be a `join`. After the welcome, the loop
//! forwards client commands to the room actor and relays the actor's
//! patches back, in version order and without duplicates.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tally_core::{RoomId, SessionId};
use tally_proto::{ClientMessage, Rejection, ServerMessage, SessionCredential};
use tokio::sync::broadcast::error::RecvError;

use crate::AppState;
use crate::error::ServerError;
use crate::room_actor::{Joined, RoomEvent, RoomHandle};
use crate::service::registry::RoomRegistry;

type Sink = SplitSink<WebSocket, Message>;

pub async fn room_socket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Response, ServerError> {
    let room_id: RoomId = room_id.parse()?;
    let handle = state.registry.get_or_spawn(&room_id);
    let registry = state.registry.clone();

    Ok(ws.on_upgrade(move |socket| async move {
        if let Err(err) = run_session(socket, &registry, handle).await {
            tracing::warn!(room_id = %room_id, error = %err, "Session ended with error");
        }
    }))
}

async fn send(sink: &mut Sink, message: &ServerMessage) -> Result<(), ServerError> {
    let text = tally_proto::encode(message)?;
    sink.send(Message::Text(text.into())).await?;
    Ok(())
}

/// Credential presented by a `join`, if any.
struct JoinRequest(Option<SessionCredential>);

/// Reads frames until the client joins. `None` means the socket closed first.
async fn await_join(
    sink: &mut Sink,
    stream: &mut SplitStream<WebSocket>,
) -> Result<Option<JoinRequest>, ServerError> {
    while let Some(frame) = stream.next().await {
        let text = match frame? {
            Message::Text(text) => text,
            Message::Close(_) => return Ok(None),
            _ => continue,
        };
        match tally_proto::decode::<ClientMessage>(text.as_str()) {
            Ok(ClientMessage::Join { credential }) => return Ok(Some(JoinRequest(credential))),
            Ok(ClientMessage::Command { request_id, .. }) => {
                let reply = ServerMessage::Rejected {
                    request_id,
                    reason: Rejection::NotJoined,
                };
                send(sink, &reply).await?;
            }
            Ok(ClientMessage::Resync) => {
                let reply = ServerMessage::Error {
                    message: Rejection::NotJoined.to_string(),
                };
                send(sink, &reply).await?;
            }
            Err(err) => {
                send(sink, &ServerMessage::Error { message: err.to_string() }).await?;
            }
        }
    }
    Ok(None)
}

/// Orders the patches one subscriber receives. Events at or below the last
/// version sent are dropped; a lagged receiver is caught up with a snapshot.
struct PatchRelay {
    session_id: SessionId,
    last_sent: u64,
}

enum Relayed {
    Send(ServerMessage),
    Skip,
    Closed,
}

impl PatchRelay {
    fn new(session_id: SessionId, version: u64) -> Self {
        Self {
            session_id,
            last_sent: version,
        }
    }

    async fn on_event(
        &mut self,
        event: Result<RoomEvent, RecvError>,
        handle: &RoomHandle,
    ) -> Result<Relayed, ServerError> {
        match event {
            Ok(event) if event.version <= self.last_sent => Ok(Relayed::Skip),
            Ok(event) => {
                self.last_sent = event.version;
                Ok(Relayed::Send(ServerMessage::Patch {
                    version: event.version,
                    changes: event.changes.to_vec(),
                }))
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(session_id = %self.session_id, skipped, "Subscriber lagged, sending snapshot");
                self.snapshot(handle).await.map(Relayed::Send)
            }
            Err(RecvError::Closed) => Ok(Relayed::Closed),
        }
    }

    async fn snapshot(&mut self, handle: &RoomHandle) -> Result<ServerMessage, ServerError> {
        let (version, room) = handle.snapshot().await?;
        self.last_sent = version;
        Ok(ServerMessage::Snapshot { version, room })
    }
}

async fn run_session(
    socket: WebSocket,
    registry: &RoomRegistry,
    mut handle: RoomHandle,
) -> Result<(), ServerError> {
    let (mut sink, mut stream) = socket.split();

    let Some(JoinRequest(presented)) = await_join(&mut sink, &mut stream).await? else {
        return Ok(());
    };

    let joined = match handle.join(presented.clone()).await {
        // The actor retired between lookup and join.
        Err(ServerError::RoomClosed) => {
            handle = registry.get_or_spawn(handle.room_id());
            handle.join(presented).await?
        }
        joined => joined?,
    };
    let Joined {
        credential,
        is_creator,
        resumed,
        version,
        room,
        mut events,
        presence: _presence,
    } = joined;
    let session_id = credential.session_id;

    send(
        &mut sink,
        &ServerMessage::Welcome {
            credential: credential.clone(),
            is_creator,
            resumed,
            version,
            room,
        },
    )
    .await?;

    let mut relay = PatchRelay::new(session_id, version);

    loop {
        tokio::select! {
            frame = stream.next() => {
                let Some(frame) = frame else { break };
                let text = match frame? {
                    Message::Text(text) => text,
                    Message::Close(_) => break,
                    _ => continue,
                };
                match tally_proto::decode::<ClientMessage>(text.as_str()) {
                    Ok(ClientMessage::Command { request_id, command }) => {
                        let reply = match handle
                            .execute(credential.clone(), request_id, command)
                            .await
                        {
                            Ok(Ok(outcome)) => ServerMessage::Ack { request_id, outcome },
                            Ok(Err(reason)) => ServerMessage::Rejected { request_id, reason },
                            Err(err) => ServerMessage::Rejected {
                                request_id,
                                reason: err.to_rejection(),
                            },
                        };
                        send(&mut sink, &reply).await?;
                    }
                    Ok(ClientMessage::Resync) => {
                        let snapshot = relay.snapshot(&handle).await?;
                        send(&mut sink, &snapshot).await?;
                    }
                    Ok(ClientMessage::Join { .. }) => {
                        let message = "Already joined".to_string();
                        send(&mut sink, &ServerMessage::Error { message }).await?;
                    }
                    Err(err) => {
                        tracing::debug!(session_id = %session_id, error = %err, "Undecodable frame");
                        send(&mut sink, &ServerMessage::Error { message: err.to_string() }).await?;
                    }
                }
            }
            event = events.recv() => match relay.on_event(event, &handle).await? {
                Relayed::Send(message) => send(&mut sink, &message).await?,
                Relayed::Skip => {}
                Relayed::Closed => break,
            },
        }
    }

    tracing::info!(room_id = %handle.room_id(), session_id = %session_id, "Session disconnected");
    Ok(())
}

#[cfg(test)]
mod tests {
    use tally_core::{AbilityKind, Color, Command, PlayerId};
    use tally_proto::{CommandOutcome, RequestId};

    use super::*;
    use crate::config::RoomConfig;

    async fn bump(handle: &RoomHandle, writer: &SessionCredential, player: &PlayerId) {
        handle
            .execute(
                writer.clone(),
                RequestId::new(),
                Command::AdjustAbility {
                    player_id: player.clone(),
                    ability: AbilityKind::Health,
                    delta: 1,
                },
            )
            .await
            .unwrap()
            .unwrap();
    }

    fn version_of(relayed: &Relayed) -> (&'static str, u64) {
        match relayed {
            Relayed::Send(ServerMessage::Patch { version, .. }) => ("patch", *version),
            Relayed::Send(ServerMessage::Snapshot { version, .. }) => ("snapshot", *version),
            Relayed::Send(other) => panic!("unexpected message {other:?}"),
            Relayed::Skip => ("skip", 0),
            Relayed::Closed => ("closed", 0),
        }
    }

    async fn setup() -> (RoomHandle, SessionCredential, PlayerId, Joined) {
        let config = RoomConfig {
            broadcast_capacity: 1,
            ..RoomConfig::default()
        };
        let handle = RoomHandle::spawn("LAG1".parse().unwrap(), config);
        let writer = handle.join(None).await.unwrap().credential;
        let outcome = handle
            .execute(
                writer.clone(),
                RequestId::new(),
                Command::AddPlayer {
                    name: "P".to_string(),
                    color: Some(Color::GREEN),
                },
            )
            .await
            .unwrap()
            .unwrap();
        let player_id = match outcome {
            CommandOutcome::PlayerAdded { player_id, .. } => player_id,
            other => panic!("unexpected outcome {other:?}"),
        };
        let watcher = handle.join(None).await.unwrap();
        (handle, writer, player_id, watcher)
    }

    #[tokio::test]
    async fn test_lagged_subscriber_gets_snapshot_then_contiguous_patches() {
        let (handle, writer, player, mut watcher) = setup().await;
        let mut relay = PatchRelay::new(watcher.credential.session_id, watcher.version);
        assert_eq!(watcher.version, 1);

        for _ in 0..20 {
            bump(&handle, &writer, &player).await;
        }

        let relayed = relay.on_event(watcher.events.recv().await, &handle).await.unwrap();
        assert_eq!(version_of(&relayed), ("snapshot", 21));
        let Relayed::Send(ServerMessage::Snapshot { room, .. }) = relayed else {
            unreachable!();
        };
        assert_eq!(room.players[&player].abilities.get(AbilityKind::Health), 20);

        // The one retained event is already covered by the snapshot.
        let relayed = relay.on_event(watcher.events.recv().await, &handle).await.unwrap();
        assert_eq!(version_of(&relayed), ("skip", 0));

        let mut sent = Vec::new();
        for _ in 0..5 {
            bump(&handle, &writer, &player).await;
            let relayed = relay.on_event(watcher.events.recv().await, &handle).await.unwrap();
            sent.push(version_of(&relayed));
        }
        let expected: Vec<_> = (22..=26).map(|version| ("patch", version)).collect();
        assert_eq!(sent, expected);
    }

    #[tokio::test]
    async fn test_resync_returns_snapshot_and_skips_covered_patches() {
        let (handle, writer, player, mut watcher) = setup().await;
        let mut relay = PatchRelay::new(watcher.credential.session_id, watcher.version);

        bump(&handle, &writer, &player).await;
        let snapshot = relay.snapshot(&handle).await.unwrap();
        let (expected_version, expected_room) = handle.snapshot().await.unwrap();
        assert_eq!(
            snapshot,
            ServerMessage::Snapshot {
                version: expected_version,
                room: expected_room,
            }
        );

        let relayed = relay.on_event(watcher.events.recv().await, &handle).await.unwrap();
        assert_eq!(version_of(&relayed), ("skip", 0));

        bump(&handle, &writer, &player).await;
        let relayed = relay.on_event(watcher.events.recv().await, &handle).await.unwrap();
        assert_eq!(version_of(&relayed), ("patch", expected_version + 1));
    }
}
