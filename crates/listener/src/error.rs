use clipwatch_clipboard::RevisionError;
use thiserror::Error;

/// Failure of a change detector.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DetectorError {
    /// The mechanism cannot run in this session (missing compositor
    /// protocol, no clipboard access).
    #[error("clipboard detector unavailable: {0}")]
    Unavailable(String),

    /// One wait failed; the next one may succeed.
    #[error("transient detector failure: {0}")]
    Transient(String),

    /// The detector's connection is gone and it must be rebuilt.
    #[error("clipboard detector disconnected: {0}")]
    Disconnected(String),
}

impl From<RevisionError> for DetectorError {
    fn from(err: RevisionError) -> Self {
        match err {
            RevisionError::Unavailable(msg) => DetectorError::Unavailable(msg),
            RevisionError::Transient(msg) => DetectorError::Transient(msg),
        }
    }
}

#[derive(Error, Debug)]
pub enum ListenerError {
    #[error("failed to start clipboard detector: {0}")]
    DetectorInit(#[source] DetectorError),

    #[error("listener is already watching")]
    AlreadyWatching,
}
