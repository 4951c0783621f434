use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FinderError {
    /// The user cancelled, or confirmed while nothing matched.
    #[error("aborted")]
    Abort,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("failed to initialize terminal: {0}")]
    TerminalInit(#[source] io::Error),

    #[error("terminal I/O error: {0}")]
    TerminalIo(#[from] io::Error),

    #[error("candidate of {candidate} runes is shorter than query of {query} runes")]
    ScorerPrecondition { candidate: usize, query: usize },

    #[error("background task failed: {0}")]
    Worker(String),
}

impl FinderError {
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Abort)
    }
}

pub type Result<T> = std::result::Result<T, FinderError>;
