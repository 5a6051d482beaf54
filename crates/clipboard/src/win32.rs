use crate::traits::RevisionSource;
use crate::RevisionError;
use windows::Win32::System::DataExchange::GetClipboardSequenceNumber;

/// Windows' clipboard sequence number, bumped by the system on every change.
pub struct SequenceNumber;

impl SequenceNumber {
    pub fn new() -> Result<Self, RevisionError> {
        // Zero means the process has no access to the window station.
        if unsafe { GetClipboardSequenceNumber() } == 0 {
            return Err(RevisionError::Unavailable(
                "GetClipboardSequenceNumber returned 0".to_string(),
            ));
        }
        Ok(Self)
    }
}

impl RevisionSource for SequenceNumber {
    fn revision(&mut self) -> Result<u64, RevisionError> {
        Ok(unsafe { GetClipboardSequenceNumber() } as u64)
    }
}
