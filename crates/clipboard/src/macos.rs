use crate::traits::RevisionSource;
use crate::RevisionError;
use cocoa::base::{id, nil};
use objc::rc::autoreleasepool;
use objc::{msg_send, sel, sel_impl};

/// `NSPasteboard.generalPasteboard.changeCount`.
pub struct ChangeCount;

impl ChangeCount {
    pub fn new() -> Result<Self, RevisionError> {
        Ok(Self)
    }
}

impl RevisionSource for ChangeCount {
    fn revision(&mut self) -> Result<u64, RevisionError> {
        // Polled from a worker thread with no run loop; the pool must be
        // drained on every call.
        autoreleasepool(|| unsafe {
            let ns_pasteboard: id = msg_send![objc::class!(NSPasteboard), generalPasteboard];
            if ns_pasteboard == nil {
                return Err(RevisionError::Transient(
                    "general pasteboard unavailable".to_string(),
                ));
            }
            let change_count: isize = msg_send![ns_pasteboard, changeCount];
            Ok(change_count as u64)
        })
    }
}
