use clipwatch_core::FormatTag;
use thiserror::Error;

/// Failure to read or decode a single clipboard format.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("format '{0}' is not on the clipboard")]
    Unavailable(FormatTag),

    #[error("format '{0}' is not valid UTF-8")]
    InvalidUtf8(FormatTag),

    #[error("image decode failed: {0}")]
    Image(String),

    #[error("data transfer failed: {0}")]
    Transfer(String),

    #[error("payload of {size} bytes exceeds limit of {limit} bytes")]
    TooLarge { size: usize, limit: usize },

    #[error("clipboard backend error reading '{tag}': {message}")]
    Backend { tag: FormatTag, message: String },
}

impl DecodeError {
    pub fn backend(tag: &FormatTag, err: impl std::fmt::Display) -> Self {
        DecodeError::Backend {
            tag: tag.clone(),
            message: err.to_string(),
        }
    }
}

/// Failure to read a clipboard revision counter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RevisionError {
    /// The counter cannot be used at all in this session.
    #[error("clipboard revision counter unavailable: {0}")]
    Unavailable(String),

    /// A single read failed; the next poll may succeed.
    #[error("clipboard revision read failed: {0}")]
    Transient(String),
}
