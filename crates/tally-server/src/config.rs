//! Server configuration read from the environment.

use std::net::SocketAddr;
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("{key} has an invalid value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Per-room actor settings.
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// Reject mutations of players added by another session.
    pub enforce_ownership: bool,
    /// Patches buffered per subscriber before it is resynced with a snapshot.
    pub broadcast_capacity: usize,
    /// Pending requests queued in front of a room actor.
    pub command_queue: usize,
    /// Command outcomes remembered per session for retried requests.
    pub dedupe_window: usize,
    /// Session records kept per room before idle ones are evicted.
    pub max_sessions: usize,
    /// Quiet period after which an empty room with no subscribers stops.
    pub idle_timeout: Duration,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            enforce_ownership: true,
            broadcast_capacity: 256,
            command_queue: 64,
            dedupe_window: 64,
            max_sessions: 1024,
            idle_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub room: RoomConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 3000)),
            room: RoomConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Reads `TALLY_*` variables, falling back to defaults for unset ones.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            bind: parse(&lookup, "TALLY_BIND", defaults.bind)?,
            room: RoomConfig {
                enforce_ownership: parse_bool(
                    &lookup,
                    "TALLY_ENFORCE_OWNERSHIP",
                    defaults.room.enforce_ownership,
                )?,
                broadcast_capacity: parse_positive(
                    &lookup,
                    "TALLY_BROADCAST_CAPACITY",
                    defaults.room.broadcast_capacity,
                )?,
                command_queue: parse_positive(
                    &lookup,
                    "TALLY_COMMAND_QUEUE",
                    defaults.room.command_queue,
                )?,
                dedupe_window: parse(&lookup, "TALLY_DEDUPE_WINDOW", defaults.room.dedupe_window)?,
                max_sessions: parse_positive(
                    &lookup,
                    "TALLY_MAX_SESSIONS",
                    defaults.room.max_sessions,
                )?,
                idle_timeout: Duration::from_secs(parse(
                    &lookup,
                    "TALLY_ROOM_IDLE_SECS",
                    defaults.room.idle_timeout.as_secs(),
                )?),
            },
        })
    }
}

fn parse<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let Some(value) = lookup(key) else {
        return Ok(default);
    };
    let parsed = value.trim().parse::<T>();
    parsed.map_err(|err| ConfigError::Invalid {
        key,
        reason: err.to_string(),
        value,
    })
}

fn parse_positive(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: usize,
) -> Result<usize, ConfigError> {
    let value = parse(lookup, key, default)?;
    if value == 0 {
        return Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}

fn parse_bool(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    let Some(value) = lookup(key) else {
        return Ok(default);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value,
            reason: "expected true or false".to_string(),
        }),
    }
}
