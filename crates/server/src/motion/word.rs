//! Word motions.
//!
//! A word token is a run of word characters (alphanumeric or `_`) or
//! a run of punctuation; runs of whitespace separate tokens and are
//! always skipped. "Big word" variants treat every non-space run as
//! one token. Tokens never span rows; motion that runs off a row
//! continues on the next one past any leading blanks.

use super::grid::TextGrid;
use protocol::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Space,
    Word,
    Punct,
}

fn classify(c: char, big: bool) -> CharClass {
    if c.is_whitespace() {
        CharClass::Space
    } else if big || c.is_alphanumeric() || c == '_' {
        CharClass::Word
    } else {
        CharClass::Punct
    }
}

/// Class of a cell; the catch-all cell of an empty row counts as
/// whitespace.
fn class_at(text: &TextGrid, pos: Position, big: bool) -> CharClass {
    match text.char_at(pos) {
        Some(c) => classify(c, big),
        None => CharClass::Space,
    }
}

/// `w` / `W`: start of the next token.
pub fn word_forward(text: &TextGrid, from: Position, big: bool) -> Option<Position> {
    let cls = class_at(text, from, big);
    let mut cur = from;
    let mut next = text.next_cell(cur)?;
    if cls != CharClass::Space {
        // Pass over the remainder of the current token.
        while next.row == cur.row && class_at(text, next, big) == cls {
            cur = next;
            next = text.next_cell(cur)?;
        }
    }
    let mut p = next;
    while class_at(text, p, big) == CharClass::Space {
        p = text.next_cell(p)?;
    }
    Some(p)
}

/// `b` / `B`: start of the previous token.
pub fn word_backward(text: &TextGrid, from: Position, big: bool) -> Option<Position> {
    let mut p = text.prev_cell(from)?;
    while class_at(text, p, big) == CharClass::Space {
        p = text.prev_cell(p)?;
    }
    let cls = class_at(text, p, big);
    loop {
        let Some(q) = text.prev_cell(p) else {
            return Some(p);
        };
        if q.row == p.row && class_at(text, q, big) == cls {
            p = q;
        } else {
            return Some(p);
        }
    }
}

/// `e` / `E`: end of the current token, or of the next one when
/// already sitting on a token end.
pub fn word_end(text: &TextGrid, from: Position, big: bool) -> Option<Position> {
    let mut p = text.next_cell(from)?;
    while class_at(text, p, big) == CharClass::Space {
        p = text.next_cell(p)?;
    }
    let cls = class_at(text, p, big);
    loop {
        let Some(n) = text.next_cell(p) else {
            return Some(p);
        };
        if n.row == p.row && class_at(text, n, big) == cls {
            p = n;
        } else {
            return Some(p);
        }
    }
}
