//! Error types surfaced by the quiz server

use shared::ErrorKind;
use thiserror::Error;

/// Failures of a session engine operation, reported to the request layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("No questions available")]
    NoQuestionsAvailable,

    #[error("Player {0} not found")]
    PlayerNotFound(String),

    #[error("Player {0} has been eliminated")]
    PlayerEliminated(String),

    #[error("No active problem for player {0}")]
    NoActiveProblem(String),

    #[error("Invalid join: {0}")]
    InvalidJoin(String),

    #[error("Player {0} is already registered")]
    DuplicatePlayer(String),

    #[error("Player {id} has answered {answered} of {required} required questions")]
    FinishGateNotMet {
        id: String,
        answered: u32,
        required: u32,
    },
}

impl GameError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GameError::NoQuestionsAvailable => ErrorKind::NoQuestionsAvailable,
            GameError::PlayerNotFound(_) => ErrorKind::PlayerNotFound,
            GameError::PlayerEliminated(_) => ErrorKind::PlayerEliminated,
            GameError::NoActiveProblem(_) => ErrorKind::NoActiveProblem,
            GameError::InvalidJoin(_) => ErrorKind::InvalidJoin,
            GameError::DuplicatePlayer(_) => ErrorKind::DuplicatePlayer,
            GameError::FinishGateNotMet { .. } => ErrorKind::FinishGateNotMet,
        }
    }
}

/// Failures reading a question bank document.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to read question bank: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse question bank: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Failures of the persistence collaborator. Logged, never fatal to a game.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("User stats CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Session transcript error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Persistence task failed: {0}")]
    Task(String),
}
