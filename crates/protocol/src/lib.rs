//! Shared protocol crate for keyduel.
//!
//! This crate contains:
//! - The navigation command grammar and its decoder
//! - Client/server message definitions (JSON over WebSocket)
//! - Shared types (Position, ids, error codes)

mod command;
mod error;
pub mod messages;

pub use command::{Command, ParsedCommand, SearchKind, parse_command};
pub use error::ProtocolError;

use serde::{Deserialize, Serialize};

/// Account-scoped player identifier (issued by the account system,
/// which is an external collaborator).
pub type PlayerId = String;

/// Server-local match proposal identifier.
pub type MatchId = u64;

/// Server-local game session identifier.
pub type GameId = u64;

/// Zero-based grid coordinates.
///
/// Ordered row-major so positions can be compared along the reading
/// direction of the text.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}
