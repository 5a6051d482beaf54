pub mod error;
pub mod traits;
pub mod memory;
pub mod mime;
pub mod system;

#[cfg(target_os = "windows")]
pub mod win32;

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
pub mod watcher;

pub use error::*;
pub use traits::*;
pub use memory::MemorySnapshot;
pub use system::SystemClipboard;

#[cfg(target_os = "windows")]
pub type DefaultRevisionSource = win32::SequenceNumber;

#[cfg(target_os = "macos")]
pub type DefaultRevisionSource = macos::ChangeCount;

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
pub type DefaultRevisionSource = watcher::WatchedRevision;
