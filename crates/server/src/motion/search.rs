//! In-row character search (`f`/`F`/`t`/`T`) and its repeat memory.

use super::grid::TextGrid;
use protocol::{Position, SearchKind};

/// Memory of the last character search, replayed by `;` and `,`.
///
/// One memento lives in each player slot of a session — search
/// repeats never leak between players or games.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharSearchMemento {
    last: Option<(SearchKind, char)>,
}

impl CharSearchMemento {
    pub fn record(&mut self, kind: SearchKind, target: char) {
        self.last = Some((kind, target));
    }

    pub fn last(&self) -> Option<(SearchKind, char)> {
        self.last
    }
}

/// Search within the current row. `find` lands on the match, `till`
/// one cell short of it in the travel direction. A till whose match
/// is the adjacent cell resolves to the unchanged position, which the
/// caller's validity policy rejects.
pub fn char_search(
    text: &TextGrid,
    from: Position,
    kind: SearchKind,
    target: char,
) -> Option<Position> {
    let len = text.row_len(from.row);
    match kind {
        SearchKind::Find | SearchKind::Till => {
            let hit = (from.col + 1..len)
                .find(|&col| text.char_at(Position::new(from.row, col)) == Some(target))?;
            let col = if kind == SearchKind::Find { hit } else { hit - 1 };
            Some(Position::new(from.row, col))
        }
        SearchKind::FindBack | SearchKind::TillBack => {
            let hit = (0..from.col)
                .rev()
                .find(|&col| text.char_at(Position::new(from.row, col)) == Some(target))?;
            let col = if kind == SearchKind::FindBack {
                hit
            } else {
                hit + 1
            };
            Some(Position::new(from.row, col))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(text: &str) -> TextGrid {
        TextGrid::from_text(text)
    }

    #[test]
    fn test_find_forward_and_backward() {
        let g = grid("abcabc");
        let from = Position::new(0, 0);
        assert_eq!(
            char_search(&g, from, SearchKind::Find, 'c'),
            Some(Position::new(0, 2))
        );
        assert_eq!(
            char_search(&g, Position::new(0, 5), SearchKind::FindBack, 'a'),
            Some(Position::new(0, 3))
        );
        assert_eq!(char_search(&g, from, SearchKind::Find, 'z'), None);
    }

    #[test]
    fn test_till_stops_short() {
        let g = grid("abcabc");
        assert_eq!(
            char_search(&g, Position::new(0, 0), SearchKind::Till, 'c'),
            Some(Position::new(0, 1))
        );
        assert_eq!(
            char_search(&g, Position::new(0, 5), SearchKind::TillBack, 'a'),
            Some(Position::new(0, 4))
        );
    }

    #[test]
    fn test_zero_width_till_returns_unchanged_position() {
        let g = grid("ab");
        // Match is the adjacent cell: till computes the current
        // position, which the validity policy then rejects.
        assert_eq!(
            char_search(&g, Position::new(0, 0), SearchKind::Till, 'b'),
            Some(Position::new(0, 0))
        );
    }

    #[test]
    fn test_search_is_row_local() {
        let g = grid("abc\nxyz");
        assert_eq!(
            char_search(&g, Position::new(0, 0), SearchKind::Find, 'x'),
            None
        );
    }

    #[test]
    fn test_memento_records_last_search() {
        let mut memento = CharSearchMemento::default();
        assert_eq!(memento.last(), None);
        memento.record(SearchKind::Till, 'q');
        assert_eq!(memento.last(), Some((SearchKind::Till, 'q')));
        memento.record(SearchKind::FindBack, 'z');
        assert_eq!(memento.last(), Some((SearchKind::FindBack, 'z')));
    }
}
