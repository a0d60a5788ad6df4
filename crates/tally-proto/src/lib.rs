//! Room-Tally Protocol Library
//!
//! Messages exchanged over the room WebSocket, encoded as JSON text frames.

#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

pub mod room;

use serde::{Serialize, de::DeserializeOwned};

pub use room::{
    ClientMessage, CommandOutcome, Rejection, RequestId, ServerMessage, SessionCredential,
};

#[derive(thiserror::Error, Debug)]
pub enum ProtoError {
    #[error("Failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to decode message: {0}")]
    Decode(#[source] serde_json::Error),
}

pub fn encode<T: Serialize>(message: &T) -> Result<String, ProtoError> {
    serde_json::to_string(message).map_err(ProtoError::Encode)
}

pub fn decode<T: DeserializeOwned>(text: &str) -> Result<T, ProtoError> {
    serde_json::from_str(text).map_err(ProtoError::Decode)
}
