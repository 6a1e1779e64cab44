use thiserror::Error;

/// Fatal engine errors. Malformed sequence text is not one of them: the
/// sequencer simply stops and reports where (see [`crate::sequencer::Sequencer::halted_at`]).
#[derive(Debug, Error)]
pub enum EngineError {
    /// The requested note range produced no directly rendered note, so there is
    /// nothing to resample the rest of the table from.
    #[error("no exact notes rendered for note range {start}..={end}")]
    NoExactNotes { start: i32, end: i32 },

    #[error("note increment must be at least 1")]
    ZeroIncrement,

    #[error("render duration must be finite and non-negative, got {0}")]
    InvalidDuration(f64),

    #[error("sample rate must be positive")]
    InvalidSampleRate,

    #[error("lookahead window must be finite and positive, got {0}")]
    InvalidLookahead(f64),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// Sequence text the reader could not make sense of. Not fatal: scheduling
/// stops at `pos` and can be retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("unexpected char '{ch}' at pos {pos}")]
    UnexpectedChar { ch: char, pos: usize },
}

impl LexError {
    /// Byte offset of the offending text.
    pub fn pos(&self) -> usize {
        match self {
            LexError::UnexpectedChar { pos, .. } => *pos,
        }
    }
}
