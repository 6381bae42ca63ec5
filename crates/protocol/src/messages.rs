//! Client/server message definitions.
//!
//! Messages travel as JSON text frames. The `type` tag uses
//! snake_case kinds; payload fields use camelCase for the browser
//! client.

use crate::{GameId, MatchId, PlayerId, Position};
use serde::{Deserialize, Serialize};

/// Messages sent by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// First message on every connection. Authentication itself is
    /// handled by the account system; the session engine only needs
    /// the identity.
    #[serde(rename_all = "camelCase")]
    Identify {
        player_id: PlayerId,
        display_name: String,
    },
    /// Enter the waiting queue with the chosen character.
    QueueJoin { character: String },
    /// Leave the waiting queue.
    QueueLeave,
    /// Accept or reject a match proposal.
    #[serde(rename_all = "camelCase")]
    MatchRespond { match_id: MatchId, accept: bool },
    /// The client has rendered the starting state and is ready for
    /// the countdown.
    #[serde(rename_all = "camelCase")]
    Ready { game_id: GameId },
    /// A navigation move. The raw keystroke string may carry its own
    /// count prefix; the explicit fields take precedence when set.
    #[serde(rename_all = "camelCase")]
    Move {
        game_id: GameId,
        command: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        count: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        has_explicit_count: Option<bool>,
    },
}

/// Shared snapshot of a running game, sent after every applied move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameUpdate {
    pub game_id: GameId,
    pub player1_position: Position,
    pub player1_score: u32,
    pub player2_position: Position,
    pub player2_score: u32,
    pub collectible_position: Position,
}

/// Reply to the player whose move was applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveResult {
    #[serde(flatten)]
    pub update: GameUpdate,
    pub current_player: PlayerId,
    pub move_score: u32,
    pub completed: bool,
}

/// Countdown display value: 3, 2, 1, then "GO".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CountdownValue {
    Tick(u8),
    Go(String),
}

impl CountdownValue {
    pub fn go() -> Self {
        Self::Go("GO".to_string())
    }
}

/// Uniform failure envelope. Every client-facing failure has this
/// shape so the browser can handle errors in one place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReply {
    /// Always `false`.
    pub success: bool,
    /// Stable machine-readable code, e.g. `"countdown_active"`.
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub countdown_active: Option<bool>,
}

impl ErrorReply {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            success: false,
            error: code.into(),
            countdown_active: None,
        }
    }

    pub fn countdown_active(code: impl Into<String>) -> Self {
        Self {
            success: false,
            error: code.into(),
            countdown_active: Some(true),
        }
    }
}

/// Messages sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Handshake acknowledgement.
    #[serde(rename_all = "camelCase")]
    Identified { player_id: PlayerId },

    // Queue lifecycle.
    QueueJoined,
    QueueLeft,
    QueueTimeout,

    // Matching lifecycle.
    #[serde(rename_all = "camelCase")]
    MatchFound {
        match_id: MatchId,
        own_character: String,
        opponent_character: String,
        opponent_name: String,
        accept_deadline_ms: u64,
    },
    MatchAccepted,
    OpponentAccepted,
    MatchRejected,
    OpponentRejected,
    /// Carries everything the client must render before reporting
    /// ready: the text, both identities and the initial grid state.
    #[serde(rename_all = "camelCase")]
    MatchStarted {
        match_id: MatchId,
        game_id: GameId,
        lines: Vec<String>,
        player1_id: PlayerId,
        player1_name: String,
        player2_id: PlayerId,
        player2_name: String,
        hazards: Vec<Position>,
        #[serde(flatten)]
        update: GameUpdate,
    },

    // In-game.
    Countdown { value: CountdownValue, active: bool },
    GameUpdate(GameUpdate),
    MoveResult(MoveResult),
    #[serde(rename_all = "camelCase")]
    GameComplete {
        winner_id: PlayerId,
        player1_score: u32,
        player2_score: u32,
        duration_seconds: u64,
    },
    PlayerDisconnected { reason: String },
    GameExpired { reason: String },

    Error(ErrorReply),
}
