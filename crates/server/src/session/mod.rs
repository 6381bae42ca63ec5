//! Running two-player sessions.
//!
//! A [`Session`] owns everything one game needs: the text and
//! occupancy grids, both player slots, the collectible, the countdown
//! gate and the win state. Each session sits behind its own lock in
//! the [`registry`](crate::session::registry); one full move executes
//! under that lock, so the two players of a game serialize while
//! unrelated games run in parallel.

pub mod countdown;
pub mod registry;

pub use countdown::CountdownState;
pub use registry::SessionRegistry;

use crate::config::GameConfig;
use crate::error::GameError;
use crate::matchmaking::MatchProposal;
use crate::motion::{CellTag, CharSearchMemento, OccupancyGrid, TextGrid, compute_move};
use crate::store::CompletedMatch;
use protocol::messages::{GameUpdate, MoveResult};
use protocol::{Command, GameId, MatchId, ParsedCommand, PlayerId, Position};
use rand::Rng;
use std::time::Instant;
use tracing::{debug, info};

/// Points awarded for grabbing the collectible, by how demanding the
/// motion that reached it was.
fn move_points(command: Command) -> u32 {
    match command {
        Command::Left | Command::Right | Command::Up | Command::Down => 1,
        Command::LineStart
        | Command::LineEnd
        | Command::FirstNonBlank
        | Command::LastNonBlank => 2,
        Command::WordForward
        | Command::WordBackward
        | Command::WordEnd
        | Command::BigWordForward
        | Command::BigWordBackward
        | Command::BigWordEnd => 2,
        Command::FileTop
        | Command::FileBottom
        | Command::ScreenTop
        | Command::ScreenMiddle
        | Command::ScreenBottom => 3,
        Command::ParagraphForward | Command::ParagraphBackward => 3,
        Command::SentenceForward | Command::SentenceBackward => 3,
        Command::CharSearch(_, _) | Command::RepeatSearch | Command::RepeatSearchReversed => 3,
        Command::MatchBracket => 5,
    }
}

/// One player's half of a session.
#[derive(Debug, Clone)]
pub struct PlayerSlot {
    pub player_id: PlayerId,
    pub display_name: String,
    pub position: Position,
    pub sticky_col: usize,
    pub score: u32,
    pub memento: CharSearchMemento,
    pub ready: bool,
}

impl PlayerSlot {
    fn new(player_id: PlayerId, display_name: String, position: Position) -> Self {
        Self {
            player_id,
            display_name,
            position,
            sticky_col: position.col,
            score: 0,
            memento: CharSearchMemento::default(),
            ready: false,
        }
    }
}

/// Why a session stopped accepting moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    Won,
    Disconnect,
    Inactivity,
    MaxDuration,
}

impl EndReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Won => "won",
            Self::Disconnect => "opponent_disconnected",
            Self::Inactivity => "inactivity_timeout",
            Self::MaxDuration => "max_duration_reached",
        }
    }
}

/// Outcome of one processed move, computed under the session lock and
/// broadcast by the caller afterwards.
#[derive(Debug)]
pub enum MoveOutcome {
    /// The move landed. `completion` is set when it crossed the win
    /// threshold.
    Applied {
        result: MoveResult,
        opponent_id: PlayerId,
        completion: Option<CompletedMatch>,
    },
    /// Geometry or a hazard rejected every step. Not an error: the
    /// mover gets a `move_blocked` envelope plus this state echo.
    Blocked {
        update: GameUpdate,
        penalized: bool,
    },
}

/// One running two-player game.
pub struct Session {
    pub game_id: GameId,
    pub match_id: MatchId,
    pub players: [PlayerSlot; 2],
    pub text: TextGrid,
    pub occupancy: OccupancyGrid,
    pub collectible: Position,
    pub countdown: CountdownState,
    pub completed: bool,
    pub winner_id: Option<PlayerId>,
    pub end_reason: Option<EndReason>,
    pub created_at: Instant,
    pub last_activity: Instant,
    pub ended_at: Option<Instant>,
    win_score: u32,
    hazard_penalty: u32,
}

impl Session {
    /// Build a session from a consumed proposal: players spawn on the
    /// opposite extreme non-empty corners of the text (randomly
    /// swapped), hazards and the collectible land on random empty
    /// cells.
    pub fn create<R: Rng + ?Sized>(
        game_id: GameId,
        proposal: &MatchProposal,
        text_source: &str,
        config: &GameConfig,
        rng: &mut R,
    ) -> Self {
        let text = TextGrid::from_text(text_source);
        let mut occupancy = OccupancyGrid::matching(&text);

        let first_row = (0..text.row_count())
            .find(|&r| text.row_len(r) > 0)
            .unwrap_or(0);
        let last_row = (0..text.row_count())
            .rev()
            .find(|&r| text.row_len(r) > 0)
            .unwrap_or(0);
        let mut spawns = [
            Position::new(first_row, 0),
            Position::new(last_row, text.last_col(last_row)),
        ];
        if rng.random_bool(0.5) {
            spawns.swap(0, 1);
        }
        occupancy.set(spawns[0], CellTag::PlayerOne);
        occupancy.set(spawns[1], CellTag::PlayerTwo);

        for _ in 0..config.hazard_count {
            if let Some(cell) = occupancy.random_empty_cell(rng) {
                occupancy.set(cell, CellTag::Hazard);
            }
        }
        let collectible = occupancy
            .random_empty_cell(rng)
            .unwrap_or(Position::new(0, 0));
        occupancy.set(collectible, CellTag::Collectible);

        let now = Instant::now();
        let a = &proposal.sides[0].entry;
        let b = &proposal.sides[1].entry;
        info!(
            "Session {} created for match {}: {} vs {}",
            game_id, proposal.match_id, a.player_id, b.player_id
        );
        Self {
            game_id,
            match_id: proposal.match_id,
            players: [
                PlayerSlot::new(a.player_id.clone(), a.display_name.clone(), spawns[0]),
                PlayerSlot::new(b.player_id.clone(), b.display_name.clone(), spawns[1]),
            ],
            text,
            occupancy,
            collectible,
            countdown: CountdownState::new(config.countdown_from),
            completed: false,
            winner_id: None,
            end_reason: None,
            created_at: now,
            last_activity: now,
            ended_at: None,
            win_score: config.win_score,
            hazard_penalty: config.hazard_penalty,
        }
    }

    pub fn player_ids(&self) -> [PlayerId; 2] {
        [
            self.players[0].player_id.clone(),
            self.players[1].player_id.clone(),
        ]
    }

    fn slot_of(&self, player_id: &PlayerId) -> Option<usize> {
        self.players
            .iter()
            .position(|p| p.player_id == *player_id)
    }

    fn tag_of(slot: usize) -> CellTag {
        if slot == 0 {
            CellTag::PlayerOne
        } else {
            CellTag::PlayerTwo
        }
    }

    /// Defensive snapshot of the shared state; callers never see live
    /// references into the grids or slots.
    pub fn snapshot(&self) -> GameUpdate {
        GameUpdate {
            game_id: self.game_id,
            player1_position: self.players[0].position,
            player1_score: self.players[0].score,
            player2_position: self.players[1].position,
            player2_score: self.players[1].score,
            collectible_position: self.collectible,
        }
    }

    /// Record that a player rendered the starting state. Returns true
    /// exactly once: when the second ready arrives and the countdown
    /// sequence should be started. The `started` guard keeps racing
    /// ready events from triggering it twice.
    pub fn mark_ready(&mut self, player_id: &PlayerId) -> Result<bool, GameError> {
        let slot = self.slot_of(player_id).ok_or(GameError::PlayerNotInGame)?;
        self.players[slot].ready = true;
        if self.players.iter().all(|p| p.ready) && !self.countdown.started {
            self.countdown.started = true;
            return Ok(true);
        }
        Ok(false)
    }

    /// End the session for a reason other than the score threshold.
    /// The registry drops it after the cleanup grace window.
    pub fn end(&mut self, reason: EndReason) {
        if self.completed {
            return;
        }
        self.completed = true;
        self.end_reason = Some(reason);
        self.ended_at = Some(Instant::now());
        info!("Session {} ended: {}", self.game_id, reason.as_str());
    }

    pub fn duration_seconds(&self) -> u64 {
        self.ended_at
            .unwrap_or_else(Instant::now)
            .duration_since(self.created_at)
            .as_secs()
    }

    fn completed_match(&self, winner_id: PlayerId) -> CompletedMatch {
        CompletedMatch {
            game_id: self.game_id,
            match_id: self.match_id,
            winner_id,
            player1_id: self.players[0].player_id.clone(),
            player1_score: self.players[0].score,
            player2_id: self.players[1].player_id.clone(),
            player2_score: self.players[1].score,
            duration_seconds: self.duration_seconds(),
        }
    }

    /// Apply one decoded move for `player_id`.
    ///
    /// The countdown and completion gates come first; then the motion
    /// engine runs once (count-aware for file jumps) or iteratively up
    /// to `count` times, keeping the last valid step. State only
    /// mutates when at least one step landed.
    pub fn process_move<R: Rng + ?Sized>(
        &mut self,
        player_id: &PlayerId,
        parsed: ParsedCommand,
        rng: &mut R,
    ) -> Result<MoveOutcome, GameError> {
        if self.countdown.active {
            return Err(GameError::CountdownActive);
        }
        if self.completed {
            return Err(GameError::GameAlreadyCompleted);
        }
        let slot = self.slot_of(player_id).ok_or(GameError::PlayerNotInGame)?;
        self.last_activity = Instant::now();

        let player = &self.players[slot];
        let mut position = player.position;
        let mut sticky_col = player.sticky_col;
        let mut memento = player.memento;
        let mut moved = false;
        let mut hazard_hit = false;

        if parsed.count == 1 || parsed.command.is_file_jump() {
            let result = compute_move(
                parsed.command,
                position,
                &self.text,
                &self.occupancy,
                sticky_col,
                &mut memento,
                parsed.count,
                parsed.has_explicit_count,
            );
            if result.valid {
                position = result.position;
                sticky_col = result.sticky_col;
                moved = true;
            }
            hazard_hit = result.blocked_by_hazard;
        } else {
            for _ in 0..parsed.count {
                let result = compute_move(
                    parsed.command,
                    position,
                    &self.text,
                    &self.occupancy,
                    sticky_col,
                    &mut memento,
                    1,
                    false,
                );
                if !result.valid {
                    hazard_hit = result.blocked_by_hazard;
                    break;
                }
                position = result.position;
                sticky_col = result.sticky_col;
                moved = true;
            }
        }

        // Fresh searches update the memento even when the step was
        // rejected, matching how an editor remembers a failed `f`.
        self.players[slot].memento = memento;

        if !moved {
            let penalized = hazard_hit && self.hazard_penalty > 0;
            if penalized {
                let score = &mut self.players[slot].score;
                *score = score.saturating_sub(self.hazard_penalty);
                debug!(
                    "Player {} penalized {} for a hazard in game {}",
                    player_id, self.hazard_penalty, self.game_id
                );
            }
            return Ok(MoveOutcome::Blocked {
                update: self.snapshot(),
                penalized,
            });
        }

        let old_position = self.players[slot].position;
        self.occupancy
            .move_tag(old_position, position, Self::tag_of(slot));
        // Players may pass through each other; restore the opponent's
        // tag when the mover just vacated a shared cell.
        let opponent_position = self.players[1 - slot].position;
        if opponent_position == old_position {
            self.occupancy
                .set(opponent_position, Self::tag_of(1 - slot));
        }
        self.players[slot].position = position;
        self.players[slot].sticky_col = sticky_col;

        let mut move_score = 0;
        if position == self.collectible {
            move_score = move_points(parsed.command);
            self.players[slot].score += move_score;
            // The collectible cell now carries the player tag; respawn
            // on a cell that is empty after the move.
            self.collectible = self
                .occupancy
                .random_empty_cell(rng)
                .unwrap_or(self.collectible);
            self.occupancy.set(self.collectible, CellTag::Collectible);
            debug!(
                "Player {} collected {} points in game {}",
                player_id, move_score, self.game_id
            );
        }

        let mut completion = None;
        if self.players[slot].score >= self.win_score {
            self.completed = true;
            self.winner_id = Some(player_id.clone());
            self.end_reason = Some(EndReason::Won);
            self.ended_at = Some(Instant::now());
            completion = Some(self.completed_match(player_id.clone()));
            info!("Session {} won by {}", self.game_id, player_id);
        }

        let update = self.snapshot();
        Ok(MoveOutcome::Applied {
            result: MoveResult {
                update,
                current_player: player_id.clone(),
                move_score,
                completed: self.completed,
            },
            opponent_id: self.players[1 - slot].player_id.clone(),
            completion,
        })
    }
}
