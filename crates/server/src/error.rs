//! Domain error taxonomy.
//!
//! Every variant maps to a stable wire code carried in the uniform
//! `{success:false, error}` envelope. Protocol/state-machine
//! violations are recovered into these values locally; they never
//! tear down a session or the process.

use protocol::ProtocolError;
use protocol::messages::ErrorReply;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GameError {
    #[error("player has no live connection")]
    NotConnected,

    #[error("player is already queued")]
    AlreadyQueued,

    #[error("player is not in the queue")]
    NotInQueue,

    #[error("the queue is full")]
    QueueFull,

    #[error("match proposal not found")]
    MatchNotFound,

    #[error("match proposal already responded to")]
    MatchAlreadyResponded,

    #[error("match proposal expired")]
    MatchExpired,

    #[error("player is not part of this game")]
    PlayerNotInGame,

    #[error("game not found")]
    GameNotFound,

    #[error("game is already completed")]
    GameAlreadyCompleted,

    #[error("the countdown has not finished")]
    CountdownActive,

    #[error("invalid command: {0}")]
    InvalidCommand(#[from] ProtocolError),
}

impl GameError {
    /// Stable machine-readable code for the error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotConnected => "not_connected",
            Self::AlreadyQueued => "already_queued",
            Self::NotInQueue => "not_in_queue",
            Self::QueueFull => "queue_full",
            Self::MatchNotFound => "match_not_found",
            Self::MatchAlreadyResponded => "match_already_responded",
            Self::MatchExpired => "match_expired",
            Self::PlayerNotInGame => "player_not_in_game",
            Self::GameNotFound => "game_not_found",
            Self::GameAlreadyCompleted => "game_already_completed",
            Self::CountdownActive => "countdown_active",
            Self::InvalidCommand(_) => "invalid_command",
        }
    }

    /// Build the wire envelope for this error.
    pub fn reply(&self) -> ErrorReply {
        match self {
            Self::CountdownActive => ErrorReply::countdown_active(self.code()),
            _ => ErrorReply::new(self.code()),
        }
    }
}
