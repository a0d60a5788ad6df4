//! Room-Tally Core Library
//!
//! The shared room document: players with a fixed set of ability counters,
//! field-level mutation operations, and the creator-only reset/undo state
//! machine. Mutations return [`FieldChange`] lists that the server
//! broadcasts and clients replay with [`Room::apply`].

#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod ability;
pub mod change;
pub mod color;
pub mod command;
pub mod ids;
pub mod language;
pub mod player;
pub mod room;

pub use ability::{Abilities, AbilityKind, AbilityTag};
pub use change::{FieldChange, FieldPath};
pub use color::{Color, ParseColorError};
pub use command::{Command, CommandContext};
pub use ids::{ParseRoomIdError, PlayerId, RoomId, SessionId};
pub use language::Language;
pub use player::{MAX_NAME_LEN, Player};
pub use room::{AdminState, ResetSnapshot, Room, RoomError};
