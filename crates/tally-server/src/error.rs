use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tally_core::ParseRoomIdError;
use tally_proto::{ProtoError, Rejection};

#[derive(thiserror::Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    InvalidRoomId(#[from] ParseRoomIdError),

    #[error("Room not found")]
    RoomNotFound,

    #[error("Room actor has shut down")]
    RoomClosed,

    #[error(transparent)]
    Protocol(#[from] ProtoError),

    #[error("WebSocket transport failed: {0}")]
    Transport(#[from] axum::Error),
}

impl ServerError {
    pub fn to_status(&self) -> StatusCode {
        match self {
            ServerError::InvalidRoomId(_) | ServerError::Protocol(_) => StatusCode::BAD_REQUEST,
            ServerError::RoomNotFound => StatusCode::NOT_FOUND,
            ServerError::RoomClosed => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Wire form for errors that answer a single command.
    pub fn to_rejection(&self) -> Rejection {
        match self {
            ServerError::RoomNotFound => Rejection::NotFound {
                message: self.to_string(),
            },
            ServerError::RoomClosed | ServerError::Transport(_) => Rejection::RoomClosed,
            ServerError::InvalidRoomId(_) | ServerError::Protocol(_) => Rejection::Invalid {
                message: self.to_string(),
            },
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (self.to_status(), self.to_string()).into_response()
    }
}
