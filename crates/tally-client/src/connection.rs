//! WebSocket transport for a [`ClientSession`].

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tally_proto::{ClientMessage, CommandOutcome, RequestId, ServerMessage};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::ClientError;
use crate::session::{ClientSession, PendingCommand, SessionEvent};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// How long to wait for an ack before resending.
    pub write_timeout: Duration,
    pub max_attempts: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            write_timeout: Duration::from_secs(5),
            max_attempts: 3,
        }
    }
}

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct Connection {
    url: String,
    socket: Socket,
    session: ClientSession,
    config: ClientConfig,
}

async fn open(url: &str) -> Result<Socket, ClientError> {
    let (socket, _) = tokio_tungstenite::connect_async(url).await?;
    tracing::debug!(url = %url, "Connected");
    Ok(socket)
}

impl Connection {
    /// Opens `{base_url}/rooms/{room_id}/ws` and waits for the welcome.
    ///
    /// `base_url` is the server root, e.g. `ws://127.0.0.1:3000`.
    pub async fn connect(
        base_url: &str,
        session: ClientSession,
        config: ClientConfig,
    ) -> Result<Self, ClientError> {
        let url = format!(
            "{}/rooms/{}/ws",
            base_url.trim_end_matches('/'),
            session.room_id()
        );
        let socket = open(&url).await?;
        let mut connection = Self {
            url,
            socket,
            session,
            config,
        };
        connection.handshake().await?;
        Ok(connection)
    }

    async fn handshake(&mut self) -> Result<(), ClientError> {
        let join = self.session.join_message();
        self.send(&join).await?;
        loop {
            if let SessionEvent::Joined { .. } = self.poll().await? {
                return Ok(());
            }
        }
    }

    /// Opens a new socket and joins again with the stored credential.
    pub async fn reconnect(&mut self) -> Result<(), ClientError> {
        self.socket = open(&self.url).await?;
        self.handshake().await?;
        tracing::info!(url = %self.url, "Reconnected");
        Ok(())
    }

    pub fn session(&self) -> &ClientSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut ClientSession {
        &mut self.session
    }

    async fn send(&mut self, message: &ClientMessage) -> Result<(), ClientError> {
        let text = tally_proto::encode(message)?;
        self.socket.send(Message::Text(text.into())).await?;
        Ok(())
    }

    async fn next_message(&mut self) -> Result<ServerMessage, ClientError> {
        while let Some(frame) = self.socket.next().await {
            match frame? {
                Message::Text(text) => return Ok(tally_proto::decode(text.as_str())?),
                Message::Close(_) => return Err(ClientError::Closed),
                _ => {}
            }
        }
        Err(ClientError::Closed)
    }

    /// Reads and applies one server message. Version gaps are answered with
    /// a resync request before the event is returned.
    pub async fn poll(&mut self) -> Result<SessionEvent, ClientError> {
        let message = self.next_message().await?;
        let event = self.session.handle(message)?;
        if event == SessionEvent::ResyncNeeded {
            self.send(&ClientMessage::Resync).await?;
        }
        Ok(event)
    }

    /// Polls until `ready` holds for the session.
    pub async fn wait_for(
        &mut self,
        mut ready: impl FnMut(&ClientSession) -> bool,
    ) -> Result<(), ClientError> {
        while !ready(&self.session) {
            self.poll().await?;
        }
        Ok(())
    }

    async fn await_reply(&mut self, request_id: RequestId) -> Result<CommandOutcome, ClientError> {
        loop {
            match self.poll().await? {
                SessionEvent::Acked {
                    request_id: id,
                    outcome,
                } if id == request_id => return Ok(outcome),
                SessionEvent::Rejected { request_id: id, reason } if id == request_id => {
                    return Err(ClientError::Rejected(reason));
                }
                _ => {}
            }
        }
    }

    /// Sends `pending` and waits for its ack, resending with the same request
    /// id after each timeout. A lost socket is reopened before the resend.
    /// The server applies a retried request at most once.
    pub async fn submit(&mut self, pending: PendingCommand) -> Result<CommandOutcome, ClientError> {
        let result = self.deliver(&pending).await;
        // An ack already settled the command; anything else is abandoned.
        self.session.forget(pending.request_id);
        result
    }

    async fn deliver(&mut self, pending: &PendingCommand) -> Result<CommandOutcome, ClientError> {
        let message = pending.to_message();
        let attempts = self.config.max_attempts.max(1);
        let mut connected = true;

        for attempt in 1..=attempts {
            if !connected {
                match tokio::time::timeout(self.config.write_timeout, self.reconnect()).await {
                    Ok(Ok(())) => connected = true,
                    Ok(Err(err)) => {
                        tracing::warn!(attempt, error = %err, "Reconnect failed");
                        continue;
                    }
                    Err(_) => {
                        tracing::warn!(attempt, "Reconnect timed out");
                        continue;
                    }
                }
            }

            let reply = match self.send(&message).await {
                Ok(()) => {
                    tokio::time::timeout(self.config.write_timeout, self.await_reply(pending.request_id))
                        .await
                }
                Err(err) => Ok(Err(err)),
            };
            match reply {
                Ok(Err(err)) if err.is_connection_lost() => {
                    tracing::warn!(
                        request_id = %pending.request_id,
                        command = pending.command.name(),
                        attempt,
                        error = %err,
                        "Connection lost before ack"
                    );
                    connected = false;
                }
                Ok(result) => return result,
                Err(_) => tracing::warn!(
                    request_id = %pending.request_id,
                    command = pending.command.name(),
                    attempt,
                    "No ack before timeout"
                ),
            }
        }

        Err(ClientError::WriteFailed { attempts })
    }

    pub async fn close(mut self) -> Result<(), ClientError> {
        self.socket.close(None).await?;
        Ok(())
    }
}
