//! Text and occupancy grids.

use protocol::Position;
use rand::Rng;

/// Tag of one occupancy cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellTag {
    Empty,
    PlayerOne,
    PlayerTwo,
    Collectible,
    Hazard,
}

/// Immutable jagged grid of the text a session is played on.
///
/// Rows keep their original whitespace and may have different
/// lengths. An empty row still has the catch-all column 0 so a cursor
/// can rest on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextGrid {
    rows: Vec<Vec<char>>,
}

impl TextGrid {
    pub fn from_text(text: &str) -> Self {
        let rows = text
            .lines()
            .map(|line| line.trim_end_matches('\r').chars().collect())
            .collect();
        Self { rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn row_len(&self, row: usize) -> usize {
        self.rows.get(row).map_or(0, Vec::len)
    }

    /// Last addressable column of a row; 0 for an empty row.
    pub fn last_col(&self, row: usize) -> usize {
        self.row_len(row).saturating_sub(1)
    }

    pub fn char_at(&self, pos: Position) -> Option<char> {
        self.rows.get(pos.row)?.get(pos.col).copied()
    }

    /// A position is in bounds when its column exists, or when it is
    /// the catch-all column 0 of an empty row.
    pub fn in_bounds(&self, pos: Position) -> bool {
        match self.rows.get(pos.row) {
            Some(row) if row.is_empty() => pos.col == 0,
            Some(row) => pos.col < row.len(),
            None => false,
        }
    }

    /// Re-derive a valid column for `row` from a sticky column.
    pub fn clamp_col(&self, row: usize, col: usize) -> usize {
        col.min(self.last_col(row))
    }

    pub fn is_blank_row(&self, row: usize) -> bool {
        self.rows
            .get(row)
            .is_none_or(|r| r.iter().all(|c| c.is_whitespace()))
    }

    pub fn first_non_blank(&self, row: usize) -> Option<usize> {
        self.rows.get(row)?.iter().position(|c| !c.is_whitespace())
    }

    pub fn last_non_blank(&self, row: usize) -> Option<usize> {
        self.rows.get(row)?.iter().rposition(|c| !c.is_whitespace())
    }

    /// Next cell in reading order, crossing row ends. Empty rows
    /// contribute their catch-all cell.
    pub fn next_cell(&self, pos: Position) -> Option<Position> {
        if pos.col + 1 < self.row_len(pos.row) {
            return Some(Position::new(pos.row, pos.col + 1));
        }
        if pos.row + 1 < self.row_count() {
            return Some(Position::new(pos.row + 1, 0));
        }
        None
    }

    /// Previous cell in reading order.
    pub fn prev_cell(&self, pos: Position) -> Option<Position> {
        if pos.col > 0 {
            return Some(Position::new(pos.row, pos.col - 1));
        }
        if pos.row > 0 {
            let row = pos.row - 1;
            return Some(Position::new(row, self.last_col(row)));
        }
        None
    }

    /// Rows as strings, for the client's initial render.
    pub fn to_lines(&self) -> Vec<String> {
        self.rows.iter().map(|r| r.iter().collect()).collect()
    }
}

/// Mutable same-shape grid of cell tags.
#[derive(Debug, Clone)]
pub struct OccupancyGrid {
    cells: Vec<Vec<CellTag>>,
}

impl OccupancyGrid {
    /// Build an all-empty grid matching the text's shape. Empty text
    /// rows get one cell for the catch-all column.
    pub fn matching(text: &TextGrid) -> Self {
        let cells = (0..text.row_count())
            .map(|row| vec![CellTag::Empty; text.row_len(row).max(1)])
            .collect();
        Self { cells }
    }

    pub fn tag_at(&self, pos: Position) -> CellTag {
        self.cells
            .get(pos.row)
            .and_then(|r| r.get(pos.col))
            .copied()
            .unwrap_or(CellTag::Empty)
    }

    pub fn set(&mut self, pos: Position, tag: CellTag) {
        if let Some(cell) = self.cells.get_mut(pos.row).and_then(|r| r.get_mut(pos.col)) {
            *cell = tag;
        }
    }

    /// Relocate a player tag in one step so the grid never shows the
    /// player in two cells.
    pub fn move_tag(&mut self, from: Position, to: Position, tag: CellTag) {
        self.set(from, CellTag::Empty);
        self.set(to, tag);
    }

    pub fn is_hazard(&self, pos: Position) -> bool {
        self.tag_at(pos) == CellTag::Hazard
    }

    /// All cells carrying `tag`, in reading order.
    pub fn cells_tagged(&self, tag: CellTag) -> Vec<Position> {
        self.cells
            .iter()
            .enumerate()
            .flat_map(|(row, cells)| {
                cells.iter().enumerate().filter_map(move |(col, t)| {
                    (*t == tag).then_some(Position::new(row, col))
                })
            })
            .collect()
    }

    /// Pick a uniformly random empty cell, or `None` when the grid is
    /// saturated.
    pub fn random_empty_cell<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Position> {
        let empties: Vec<Position> = self
            .cells
            .iter()
            .enumerate()
            .flat_map(|(row, cells)| {
                cells.iter().enumerate().filter_map(move |(col, tag)| {
                    (*tag == CellTag::Empty).then_some(Position::new(row, col))
                })
            })
            .collect();
        if empties.is_empty() {
            None
        } else {
            Some(empties[rng.random_range(0..empties.len())])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jagged_bounds() {
        let grid = TextGrid::from_text("hello\n\nhi");
        assert_eq!(grid.row_count(), 3);
        assert_eq!(grid.row_len(0), 5);
        assert_eq!(grid.row_len(1), 0);
        assert!(grid.in_bounds(Position::new(0, 4)));
        assert!(!grid.in_bounds(Position::new(0, 5)));
        // Catch-all column of the empty row.
        assert!(grid.in_bounds(Position::new(1, 0)));
        assert!(!grid.in_bounds(Position::new(1, 1)));
        assert!(!grid.in_bounds(Position::new(3, 0)));
    }

    #[test]
    fn test_cell_traversal_crosses_rows() {
        let grid = TextGrid::from_text("ab\n\ncd");
        let mut pos = Position::new(0, 0);
        let mut seen = vec![pos];
        while let Some(next) = grid.next_cell(pos) {
            seen.push(next);
            pos = next;
        }
        assert_eq!(
            seen,
            vec![
                Position::new(0, 0),
                Position::new(0, 1),
                Position::new(1, 0),
                Position::new(2, 0),
                Position::new(2, 1),
            ]
        );
        // And back again.
        let mut back = vec![pos];
        while let Some(prev) = grid.prev_cell(pos) {
            back.push(prev);
            pos = prev;
        }
        back.reverse();
        assert_eq!(back, seen);
    }

    #[test]
    fn test_blank_row_helpers() {
        let grid = TextGrid::from_text("  hi  \n   \ncode");
        assert!(!grid.is_blank_row(0));
        assert!(grid.is_blank_row(1));
        assert_eq!(grid.first_non_blank(0), Some(2));
        assert_eq!(grid.last_non_blank(0), Some(3));
        assert_eq!(grid.first_non_blank(1), None);
    }

    #[test]
    fn test_occupancy_move_is_atomic() {
        let text = TextGrid::from_text("abc\ndef");
        let mut occ = OccupancyGrid::matching(&text);
        let from = Position::new(0, 0);
        let to = Position::new(1, 2);
        occ.set(from, CellTag::PlayerOne);
        occ.move_tag(from, to, CellTag::PlayerOne);
        assert_eq!(occ.tag_at(from), CellTag::Empty);
        assert_eq!(occ.tag_at(to), CellTag::PlayerOne);
    }

    #[test]
    fn test_random_empty_cell_avoids_tags() {
        let text = TextGrid::from_text("ab");
        let mut occ = OccupancyGrid::matching(&text);
        occ.set(Position::new(0, 0), CellTag::PlayerOne);
        let mut rng = rand::rng();
        for _ in 0..20 {
            assert_eq!(
                occ.random_empty_cell(&mut rng),
                Some(Position::new(0, 1))
            );
        }
        occ.set(Position::new(0, 1), CellTag::Hazard);
        assert_eq!(occ.random_empty_cell(&mut rng), None);
    }
}
