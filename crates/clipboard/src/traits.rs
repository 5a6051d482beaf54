use crate::{DecodeError, RevisionError};
use clipwatch_core::{FormatPayload, FormatTag};

/// Read access to whatever is on the clipboard right now.
pub trait SnapshotReader {
    /// Formats present, in the order the platform reports them.
    fn list_formats(&mut self) -> Result<Vec<FormatTag>, DecodeError>;

    fn read_format(&mut self, tag: &FormatTag) -> Result<FormatPayload, DecodeError>;
}

/// A cheap "has anything changed" probe. Values only need to differ between
/// clipboard generations; they are not required to increase.
pub trait RevisionSource {
    fn revision(&mut self) -> Result<u64, RevisionError>;
}
