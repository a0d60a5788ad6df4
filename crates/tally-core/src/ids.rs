//! Identifiers for rooms, players and sessions.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

fn random_base36(rng: &mut impl Rng, len: usize) -> String {
    (0..len)
        .map(|_| char::from(BASE36[rng.random_range(0..BASE36.len())]))
        .collect()
}

/// Opaque short alphanumeric room identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomId(String);

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid room id '{0}': expected 1-{max} ASCII letters or digits", max = RoomId::MAX_LEN)]
pub struct ParseRoomIdError(pub String);

impl RoomId {
    pub const MAX_LEN: usize = 32;
    pub const GENERATED_LEN: usize = 6;

    /// Generates a fresh 6-character upper-case id.
    pub fn generate() -> Self {
        Self(random_base36(&mut rand::rng(), Self::GENERATED_LEN).to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for RoomId {
    type Err = ParseRoomIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.len() > Self::MAX_LEN || !s.bytes().all(|b| b.is_ascii_alphanumeric())
        {
            return Err(ParseRoomIdError(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for RoomId {
    type Error = ParseRoomIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RoomId> for String {
    fn from(id: RoomId) -> Self {
        id.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Player identifier, unique within a room.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    /// `user-{unix_millis}-{7 base36 chars}`.
    pub fn generate() -> Self {
        let millis = chrono::Utc::now().timestamp_millis();
        let suffix = random_base36(&mut rand::rng(), 7);
        Self(format!("user-{millis}-{suffix}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PlayerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for PlayerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Public identity of one client session in one room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(uuid::Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
