//! Deterministic motion engine.
//!
//! [`compute_move`] turns one decoded navigation command into a new
//! cursor position. It is a pure function over its inputs: no shared
//! state, no I/O, never blocks. Concurrency and scoring live a level
//! up in the session code.

mod bracket;
mod grid;
mod line;
mod search;
mod sentence;
mod word;

pub use grid::{CellTag, OccupancyGrid, TextGrid};
pub use search::CharSearchMemento;

use line::ScreenSpot;
use protocol::{Command, Position};

/// Outcome of one motion computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionResult {
    /// The landed position when valid, the input position otherwise.
    pub position: Position,
    /// The preferred column after this motion.
    pub sticky_col: usize,
    /// Whether the caller may apply the result.
    pub valid: bool,
    /// Set when the motion was rejected because its destination is a
    /// hazard cell; the caller charges the penalty for it.
    pub blocked_by_hazard: bool,
}

impl MotionResult {
    fn invalid(from: Position, sticky_col: usize) -> Self {
        Self {
            position: from,
            sticky_col,
            valid: false,
            blocked_by_hazard: false,
        }
    }
}

/// Compute the destination of `command` from `from`.
///
/// `count`/`has_explicit_count` only matter for file jumps, where an
/// explicit count addresses an absolute line; repeated application of
/// other commands is the caller's loop. The search memento belongs to
/// the moving player and is both consumed (repeats) and updated
/// (fresh searches) here.
pub fn compute_move(
    command: Command,
    from: Position,
    text: &TextGrid,
    occupancy: &OccupancyGrid,
    sticky_col: usize,
    memento: &mut CharSearchMemento,
    count: u32,
    has_explicit_count: bool,
) -> MotionResult {
    if text.row_count() == 0 || !text.in_bounds(from) {
        return MotionResult::invalid(from, sticky_col);
    }

    let candidate = match command {
        Command::Left => (from.col > 0).then(|| Position::new(from.row, from.col - 1)),
        Command::Right => {
            (from.col < text.last_col(from.row)).then(|| Position::new(from.row, from.col + 1))
        }
        Command::Down => (from.row + 1 < text.row_count()).then(|| {
            let row = from.row + 1;
            Position::new(row, text.clamp_col(row, sticky_col))
        }),
        Command::Up => (from.row > 0).then(|| {
            let row = from.row - 1;
            Position::new(row, text.clamp_col(row, sticky_col))
        }),

        Command::LineStart => Some(line::line_start(from)),
        Command::LineEnd => Some(line::line_end(text, from)),
        Command::FirstNonBlank => Some(line::first_non_blank(text, from)),
        Command::LastNonBlank => Some(line::last_non_blank(text, from)),

        Command::FileTop => {
            let row = if has_explicit_count {
                count.saturating_sub(1) as usize
            } else {
                0
            };
            Some(line::file_jump(text, row, sticky_col))
        }
        Command::FileBottom => {
            let row = if has_explicit_count {
                count.saturating_sub(1) as usize
            } else {
                text.row_count() - 1
            };
            Some(line::file_jump(text, row, sticky_col))
        }

        Command::ScreenTop => Some(line::screen_row(text, ScreenSpot::Top, sticky_col)),
        Command::ScreenMiddle => Some(line::screen_row(text, ScreenSpot::Middle, sticky_col)),
        Command::ScreenBottom => Some(line::screen_row(text, ScreenSpot::Bottom, sticky_col)),

        Command::WordForward => word::word_forward(text, from, false),
        Command::WordBackward => word::word_backward(text, from, false),
        Command::WordEnd => word::word_end(text, from, false),
        Command::BigWordForward => word::word_forward(text, from, true),
        Command::BigWordBackward => word::word_backward(text, from, true),
        Command::BigWordEnd => word::word_end(text, from, true),

        Command::ParagraphForward => Some(line::paragraph_forward(text, from)),
        Command::ParagraphBackward => Some(line::paragraph_backward(text, from)),

        Command::SentenceForward => sentence::sentence_forward(text, from),
        Command::SentenceBackward => sentence::sentence_backward(text, from),

        Command::CharSearch(kind, target) => {
            memento.record(kind, target);
            search::char_search(text, from, kind, target)
        }
        Command::RepeatSearch => memento
            .last()
            .and_then(|(kind, target)| search::char_search(text, from, kind, target)),
        Command::RepeatSearchReversed => memento
            .last()
            .and_then(|(kind, target)| search::char_search(text, from, kind.reversed(), target)),

        Command::MatchBracket => bracket::matching_bracket(text, from),
    };

    let Some(position) = candidate else {
        return MotionResult::invalid(from, sticky_col);
    };

    // Uniform validity policy.
    if !text.in_bounds(position) {
        return MotionResult::invalid(from, sticky_col);
    }
    if occupancy.is_hazard(position) {
        return MotionResult {
            position: from,
            sticky_col,
            valid: false,
            blocked_by_hazard: true,
        };
    }
    if position == from && !command.is_paragraph() {
        return MotionResult::invalid(from, sticky_col);
    }

    let sticky_col = if command.holds_sticky_column() {
        sticky_col
    } else {
        position.col
    };
    MotionResult {
        position,
        sticky_col,
        valid: true,
        blocked_by_hazard: false,
    }
}
