//! Bracket matching (`%`).

use super::grid::TextGrid;
use protocol::Position;

const PAIRS: [(char, char); 3] = [('(', ')'), ('[', ']'), ('{', '}')];

fn pair_for(c: char) -> Option<(char, char, bool)> {
    PAIRS.iter().find_map(|&(open, close)| {
        if c == open {
            Some((open, close, true))
        } else if c == close {
            Some((open, close, false))
        } else {
            None
        }
    })
}

/// From a bracket character, find the balancing bracket of the same
/// kind, scanning across row boundaries and tracking nesting depth.
/// Any other character is a no-op.
pub fn matching_bracket(text: &TextGrid, from: Position) -> Option<Position> {
    let c = text.char_at(from)?;
    let (open, close, forward) = pair_for(c)?;
    let mut depth: usize = 1;
    let mut pos = from;
    loop {
        pos = if forward {
            text.next_cell(pos)?
        } else {
            text.prev_cell(pos)?
        };
        match text.char_at(pos) {
            Some(k) if k == c => depth += 1,
            Some(k) if k == open || k == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(pos);
                }
            }
            _ => {}
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
    fn test_simple_pair() {
        let g = grid("f(x)");
        assert_eq!(
            matching_bracket(&g, Position::new(0, 1)),
            Some(Position::new(0, 3))
        );
        assert_eq!(
            matching_bracket(&g, Position::new(0, 3)),
            Some(Position::new(0, 1))
        );
    }

    #[test]
    fn test_nested_same_kind() {
        let g = grid("((a)(b))");
        assert_eq!(
            matching_bracket(&g, Position::new(0, 0)),
            Some(Position::new(0, 7))
        );
        assert_eq!(
            matching_bracket(&g, Position::new(0, 4)),
            Some(Position::new(0, 6))
        );
    }

    #[test]
    fn test_kinds_track_depth_independently() {
        let g = grid("{a[b]c}");
        assert_eq!(
            matching_bracket(&g, Position::new(0, 0)),
            Some(Position::new(0, 6))
        );
        assert_eq!(
            matching_bracket(&g, Position::new(0, 2)),
            Some(Position::new(0, 4))
        );
    }

    #[test]
    fn test_crosses_rows() {
        let g = grid("fn main() {\n    done();\n}");
        assert_eq!(
            matching_bracket(&g, Position::new(0, 10)),
            Some(Position::new(2, 0))
        );
        assert_eq!(
            matching_bracket(&g, Position::new(2, 0)),
            Some(Position::new(0, 10))
        );
    }

    #[test]
    fn test_non_bracket_is_noop() {
        let g = grid("abc");
        assert_eq!(matching_bracket(&g, Position::new(0, 0)), None);
    }

    #[test]
    fn test_unbalanced_gives_none() {
        let g = grid("(((");
        assert_eq!(matching_bracket(&g, Position::new(0, 0)), None);
    }

    #[test]
    fn test_symmetry_for_all_well_nested_pairs() {
        let g = grid("a(b[c{d}e]f)g");
        for row in 0..g.row_count() {
            for col in 0..g.row_len(row) {
                let p = Position::new(row, col);
                if let Some(q) = matching_bracket(&g, p) {
                    assert_eq!(matching_bracket(&g, q), Some(p));
                }
            }
        }
    }
}
