//! Navigation command grammar.
//!
//! Raw client input arrives as a normal-mode keystroke string, e.g.
//! `"3w"`, `"fx"` or `"gg"`. It is decoded exactly once at the
//! protocol boundary into a tagged [`Command`] plus repeat count; the
//! motion engine never sees raw strings.

use crate::ProtocolError;

/// Highest accepted repeat count. Larger prefixes are refused rather
/// than silently clamped so the client learns its input was bad.
const MAX_COUNT: u32 = 9999;

/// Direction family of a character search, kept separate from the
/// target character so repeats can mirror the direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKind {
    /// `f` — move onto the next occurrence.
    Find,
    /// `F` — move onto the previous occurrence.
    FindBack,
    /// `t` — stop one cell short of the next occurrence.
    Till,
    /// `T` — stop one cell after the previous occurrence.
    TillBack,
}

impl SearchKind {
    /// The mirrored direction, used by the `,` repeat.
    pub fn reversed(self) -> Self {
        match self {
            Self::Find => Self::FindBack,
            Self::FindBack => Self::Find,
            Self::Till => Self::TillBack,
            Self::TillBack => Self::Till,
        }
    }
}

/// A single decoded navigation command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `h`
    Left,
    /// `j`
    Down,
    /// `k`
    Up,
    /// `l`
    Right,

    /// `0`
    LineStart,
    /// `$`
    LineEnd,
    /// `^`
    FirstNonBlank,
    /// `g_`
    LastNonBlank,

    /// `gg`
    FileTop,
    /// `G`
    FileBottom,

    /// `H`
    ScreenTop,
    /// `M`
    ScreenMiddle,
    /// `L`
    ScreenBottom,

    /// `w`
    WordForward,
    /// `b`
    WordBackward,
    /// `e`
    WordEnd,
    /// `W`
    BigWordForward,
    /// `B`
    BigWordBackward,
    /// `E`
    BigWordEnd,

    /// `}`
    ParagraphForward,
    /// `{`
    ParagraphBackward,

    /// `)`
    SentenceForward,
    /// `(`
    SentenceBackward,

    /// `f`/`F`/`t`/`T` with the target character.
    CharSearch(SearchKind, char),
    /// `;`
    RepeatSearch,
    /// `,`
    RepeatSearchReversed,

    /// `%`
    MatchBracket,
}

impl Command {
    /// Paragraph motions are the only family allowed to report a
    /// valid result without moving.
    pub fn is_paragraph(&self) -> bool {
        matches!(self, Self::ParagraphForward | Self::ParagraphBackward)
    }

    /// File jumps interpret an explicit count as an absolute line
    /// number instead of a repetition.
    pub fn is_file_jump(&self) -> bool {
        matches!(self, Self::FileTop | Self::FileBottom)
    }

    /// Vertical motions consume the sticky column instead of
    /// updating it.
    pub fn holds_sticky_column(&self) -> bool {
        matches!(
            self,
            Self::Up
                | Self::Down
                | Self::FileTop
                | Self::FileBottom
                | Self::ScreenTop
                | Self::ScreenMiddle
                | Self::ScreenBottom
        )
    }
}

/// A decoded command with its repeat count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedCommand {
    pub command: Command,
    /// Always at least 1.
    pub count: u32,
    /// Whether the count was written out by the player. Matters for
    /// file jumps, where `5G` is absolute and `G` is last-line.
    pub has_explicit_count: bool,
}

/// Decode a raw keystroke string into a [`ParsedCommand`].
///
/// A leading run of digits is the repeat count, except that a leading
/// `0` is the line-start motion. The remainder must be exactly one
/// command token; trailing garbage is refused.
pub fn parse_command(raw: &str) -> Result<ParsedCommand, ProtocolError> {
    let mut chars = raw.chars().peekable();

    let mut count: u32 = 0;
    let mut has_explicit_count = false;
    if matches!(chars.peek(), Some('1'..='9')) {
        has_explicit_count = true;
        while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
            chars.next();
            count = count.saturating_mul(10).saturating_add(d);
            if count > MAX_COUNT {
                return Err(ProtocolError::CountOutOfRange(count));
            }
        }
    }
    let count = count.max(1);

    let head = chars.next().ok_or(ProtocolError::EmptyCommand)?;
    let command = match head {
        'h' => Command::Left,
        'j' => Command::Down,
        'k' => Command::Up,
        'l' => Command::Right,
        '0' => Command::LineStart,
        '$' => Command::LineEnd,
        '^' => Command::FirstNonBlank,
        'g' => match chars.next() {
            Some('g') => Command::FileTop,
            Some('_') => Command::LastNonBlank,
            _ => return Err(ProtocolError::UnknownCommand(raw.to_string())),
        },
        'G' => Command::FileBottom,
        'H' => Command::ScreenTop,
        'M' => Command::ScreenMiddle,
        'L' => Command::ScreenBottom,
        'w' => Command::WordForward,
        'b' => Command::WordBackward,
        'e' => Command::WordEnd,
        'W' => Command::BigWordForward,
        'B' => Command::BigWordBackward,
        'E' => Command::BigWordEnd,
        '}' => Command::ParagraphForward,
        '{' => Command::ParagraphBackward,
        ')' => Command::SentenceForward,
        '(' => Command::SentenceBackward,
        ';' => Command::RepeatSearch,
        ',' => Command::RepeatSearchReversed,
        '%' => Command::MatchBracket,
        'f' | 'F' | 't' | 'T' => {
            let kind = match head {
                'f' => SearchKind::Find,
                'F' => SearchKind::FindBack,
                't' => SearchKind::Till,
                _ => SearchKind::TillBack,
            };
            let target = chars.next().ok_or(ProtocolError::MissingSearchTarget)?;
            Command::CharSearch(kind, target)
        }
        _ => return Err(ProtocolError::UnknownCommand(raw.to_string())),
    };

    if chars.next().is_some() {
        return Err(ProtocolError::UnknownCommand(raw.to_string()));
    }

    Ok(ParsedCommand {
        command,
        count,
        has_explicit_count,
    })
}
