use tally_proto::{ProtoError, Rejection};
use tokio_tungstenite::tungstenite;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode stored value: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("WebSocket transport failed: {0}")]
    Transport(Box<tungstenite::Error>),

    #[error(transparent)]
    Protocol(#[from] ProtoError),

    #[error("Server rejected the request: {0}")]
    Rejected(Rejection),

    #[error("Write failed after {attempts} attempts")]
    WriteFailed { attempts: u32 },

    #[error("Connection closed")]
    Closed,

    #[error("Not joined to the room yet")]
    NotJoined,

    #[error("{0}")]
    InvalidInput(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ClientError {
    /// The socket is gone and a reconnect may help.
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, ClientError::Transport(_) | ClientError::Closed)
    }
}

impl From<tungstenite::Error> for ClientError {
    fn from(err: tungstenite::Error) -> Self {
        ClientError::Transport(Box::new(err))
    }
}
