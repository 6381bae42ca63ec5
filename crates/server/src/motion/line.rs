//! Line, file, screen and paragraph motions.
//!
//! There is no scroll window server-side, so the screen motions treat
//! the whole document as the visible viewport.

use super::grid::TextGrid;
use protocol::Position;

/// `0`
pub fn line_start(from: Position) -> Position {
    Position::new(from.row, 0)
}

/// `$`
pub fn line_end(text: &TextGrid, from: Position) -> Position {
    Position::new(from.row, text.last_col(from.row))
}

/// `^` — first non-blank of the line; a blank line degrades to its
/// last column.
pub fn first_non_blank(text: &TextGrid, from: Position) -> Position {
    let col = text
        .first_non_blank(from.row)
        .unwrap_or_else(|| text.last_col(from.row));
    Position::new(from.row, col)
}

/// `g_` — last non-blank of the line.
pub fn last_non_blank(text: &TextGrid, from: Position) -> Position {
    let col = text.last_non_blank(from.row).unwrap_or(0);
    Position::new(from.row, col)
}

/// `gg` / `G` and their count-aware absolute form. `target_row` is
/// already zero-based and gets clamped to the document.
pub fn file_jump(text: &TextGrid, target_row: usize, sticky_col: usize) -> Position {
    let row = target_row.min(text.row_count().saturating_sub(1));
    Position::new(row, text.clamp_col(row, sticky_col))
}

/// `H` / `M` / `L`.
pub fn screen_row(text: &TextGrid, fraction: ScreenSpot, sticky_col: usize) -> Position {
    let last = text.row_count().saturating_sub(1);
    let row = match fraction {
        ScreenSpot::Top => 0,
        ScreenSpot::Middle => last / 2,
        ScreenSpot::Bottom => last,
    };
    Position::new(row, text.clamp_col(row, sticky_col))
}

#[derive(Debug, Clone, Copy)]
pub enum ScreenSpot {
    Top,
    Middle,
    Bottom,
}

/// `}` — forward past the next blank-line boundary, then past the run
/// of blanks, landing on column 0. Staying put (already in the last
/// paragraph) is legitimate for this motion.
pub fn paragraph_forward(text: &TextGrid, from: Position) -> Position {
    let count = text.row_count();
    let mut row = from.row + 1;
    while row < count && !text.is_blank_row(row) {
        row += 1;
    }
    if row >= count {
        return from;
    }
    while row < count && text.is_blank_row(row) {
        row += 1;
    }
    if row >= count {
        // Trailing blank region: land on the final row.
        return Position::new(count - 1, 0);
    }
    Position::new(row, 0)
}

/// `{` — the mirror image of [`paragraph_forward`].
pub fn paragraph_backward(text: &TextGrid, from: Position) -> Position {
    if from.row == 0 {
        return Position::new(0, 0);
    }
    let mut row = from.row as isize - 1;
    while row >= 0 && !text.is_blank_row(row as usize) {
        row -= 1;
    }
    while row >= 0 && text.is_blank_row(row as usize) {
        row -= 1;
    }
    if row < 0 {
        return Position::new(0, 0);
    }
    Position::new(row as usize, 0)
}
