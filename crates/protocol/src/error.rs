//! Protocol error types.

use thiserror::Error;

/// Errors that can occur while decoding a navigation command.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("empty command")]
    EmptyCommand,

    #[error("unknown command: {0:?}")]
    UnknownCommand(String),

    #[error("character search is missing its target character")]
    MissingSearchTarget,

    #[error("repeat count {0} is out of range")]
    CountOutOfRange(u32),
}
