//! Room-Tally Client Library
//!
//! Native client for a room-tally server: [`ClientSession`] holds the room
//! state and ownership bookkeeping, [`Connection`] carries it over a
//! WebSocket, and the store modules persist what a browser client would keep
//! in `localStorage`.

#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod connection;
pub mod error;
pub mod history;
pub mod local;
pub mod session;
pub mod store;

pub use connection::{ClientConfig, Connection};
pub use error::{ClientError, StoreError};
pub use history::{RoomHistory, RoomHistoryEntry};
pub use session::{ClientSession, PendingCommand, SessionEvent};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore};
