//! Sentence motions.
//!
//! A sentence ends at `.`, `!` or `?`, optionally followed by closing
//! punctuation or quotes, provided whitespace or the end of the row
//! comes next. A sentence starts at the first non-blank character
//! after such a boundary (or at the start of the document).

use super::grid::TextGrid;
use protocol::Position;

fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

fn is_closer(c: char) -> bool {
    matches!(c, ')' | ']' | '"' | '\'')
}

/// All sentence-start positions in reading order.
fn sentence_starts(text: &TextGrid) -> Vec<Position> {
    let mut starts = Vec::new();
    let mut boundary_pending = true;
    for row in 0..text.row_count() {
        let len = text.row_len(row);
        for col in 0..len {
            let pos = Position::new(row, col);
            let c = text.char_at(pos).unwrap_or(' ');
            if c.is_whitespace() {
                continue;
            }
            if boundary_pending {
                starts.push(pos);
                boundary_pending = false;
            }
            if is_terminator(c) {
                let mut k = col + 1;
                while k < len
                    && text
                        .char_at(Position::new(row, k))
                        .is_some_and(is_closer)
                {
                    k += 1;
                }
                let followed_ok = k >= len
                    || text
                        .char_at(Position::new(row, k))
                        .is_some_and(char::is_whitespace);
                if followed_ok {
                    boundary_pending = true;
                }
            }
        }
    }
    starts
}

/// `)` — first sentence start after the cursor.
pub fn sentence_forward(text: &TextGrid, from: Position) -> Option<Position> {
    sentence_starts(text).into_iter().find(|p| *p > from)
}

/// `(` — start of the sentence before the cursor. Being inside a
/// sentence moves to its own start; sitting on a start moves to the
/// previous one.
pub fn sentence_backward(text: &TextGrid, from: Position) -> Option<Position> {
    sentence_starts(text)
        .into_iter()
        .rev()
        .find(|p| *p < from)
}
