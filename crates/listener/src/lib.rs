//! Clipboard change listening.
//!
//! A [`ListenerEngine`] runs one change detector on a background thread
//! and delivers a [`ClipboardData`](clipwatch_core::ClipboardData) for every
//! clipboard change. Detection is either revision polling through the
//! platform clipboard API or, on wlroots-style Wayland compositors,
//! selection events pushed over the data-control protocol.

pub mod bridge;
pub mod engine;
pub mod error;
pub mod polling;
pub mod signal;
pub mod snapshot;
pub mod state;

#[cfg(all(target_os = "linux", feature = "wayland"))]
pub mod wayland;

pub use bridge::{CallbackBridge, ChannelBridge};
pub use engine::ListenerEngine;
pub use error::{DetectorError, ListenerError};
pub use polling::{PollingDetector, POLL_INTERVAL};
pub use signal::{
    is_wayland_clipboard_available, probe_kind, ChangeSignal, DetectorFactory, SystemDetectors,
    Wake,
};
pub use snapshot::{assemble, read_current};
pub use state::{DetectorKind, ListenerState};
