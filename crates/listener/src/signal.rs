use crate::error::DetectorError;
use crate::polling::PollingDetector;
use crate::state::DetectorKind;
use clipwatch_clipboard::{DefaultRevisionSource, SnapshotReader, SystemClipboard};
use clipwatch_core::{BackendPreference, ListenerConfig};
use crossbeam_channel::Receiver;
use std::env;
use tracing::debug;

/// Outcome of one bounded wait on a change detector.
pub enum Wake<'a> {
    /// The clipboard changed; the reader exposes the new content.
    Changed(&'a mut dyn SnapshotReader),
    /// Nothing happened within the wait slice.
    Idle,
    /// The stop channel fired.
    Stopped,
}

/// A source of clipboard-change notifications.
///
/// `wait_for_change` blocks for at most one polling interval or event slice,
/// and returns `Wake::Stopped` as soon as `stop` receives a message or all
/// of its senders are dropped.
pub trait ChangeSignal {
    fn kind(&self) -> DetectorKind;

    fn wait_for_change(&mut self, stop: &Receiver<()>) -> Result<Wake<'_>, DetectorError>;
}

/// Chooses and constructs change detectors for the listener engine.
///
/// `build` runs on the listener thread, so detectors need not be `Send`.
pub trait DetectorFactory: Send + Sync {
    /// The kind a new listener would try first.
    fn probe(&self) -> DetectorKind;

    fn build(&self, kind: DetectorKind) -> Result<Box<dyn ChangeSignal>, DetectorError>;
}

/// Detectors backed by the real platform clipboard.
pub struct SystemDetectors {
    config: ListenerConfig,
}

impl SystemDetectors {
    pub fn new(config: ListenerConfig) -> Self {
        Self { config }
    }
}

impl DetectorFactory for SystemDetectors {
    fn probe(&self) -> DetectorKind {
        probe_kind(&self.config)
    }

    fn build(&self, kind: DetectorKind) -> Result<Box<dyn ChangeSignal>, DetectorError> {
        match kind {
            DetectorKind::Generic => {
                let revisions = DefaultRevisionSource::new()?;
                let reader = SystemClipboard::new(self.config.custom_tags())
                    .map_err(|e| DetectorError::Unavailable(format!("{:#}", e)))?;
                Ok(Box::new(PollingDetector::new(revisions, reader)?))
            }
            DetectorKind::Wayland => build_wayland(&self.config),
        }
    }
}

#[cfg(all(target_os = "linux", feature = "wayland"))]
fn build_wayland(config: &ListenerConfig) -> Result<Box<dyn ChangeSignal>, DetectorError> {
    Ok(Box::new(crate::wayland::EventDetector::connect(config)?))
}

#[cfg(not(all(target_os = "linux", feature = "wayland")))]
fn build_wayland(_config: &ListenerConfig) -> Result<Box<dyn ChangeSignal>, DetectorError> {
    Err(DetectorError::Unavailable(
        "built without Wayland support".to_string(),
    ))
}

/// Detector kind selected by the environment and configuration alone,
/// without opening any connection.
pub fn probe_kind(config: &ListenerConfig) -> DetectorKind {
    if !cfg!(all(target_os = "linux", feature = "wayland")) {
        return DetectorKind::Generic;
    }
    match config.backend {
        BackendPreference::Generic => DetectorKind::Generic,
        BackendPreference::Wayland => DetectorKind::Wayland,
        BackendPreference::Auto if wayland_session() => DetectorKind::Wayland,
        BackendPreference::Auto => DetectorKind::Generic,
    }
}

pub(crate) fn wayland_session() -> bool {
    let display = env::var_os("WAYLAND_DISPLAY").is_some_and(|v| !v.is_empty());
    let session = env::var("XDG_SESSION_TYPE")
        .map(|v| v.eq_ignore_ascii_case("wayland"))
        .unwrap_or(false);
    display || session
}

/// Whether the compositor offers the data-control protocol needed for
/// event-driven listening.
pub fn is_wayland_clipboard_available() -> bool {
    if !wayland_session() {
        debug!("Not a Wayland session");
        return false;
    }
    wayland_protocol_available()
}

#[cfg(all(target_os = "linux", feature = "wayland"))]
fn wayland_protocol_available() -> bool {
    crate::wayland::data_control_available()
}

#[cfg(not(all(target_os = "linux", feature = "wayland")))]
fn wayland_protocol_available() -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn with_session_env<T>(display: Option<&str>, session: Option<&str>, f: impl FnOnce() -> T) -> T {
        let saved = (env::var_os("WAYLAND_DISPLAY"), env::var_os("XDG_SESSION_TYPE"));
        match display {
            Some(v) => env::set_var("WAYLAND_DISPLAY", v),
            None => env::remove_var("WAYLAND_DISPLAY"),
        }
        match session {
            Some(v) => env::set_var("XDG_SESSION_TYPE", v),
            None => env::remove_var("XDG_SESSION_TYPE"),
        }
        let result = f();
        match saved.0 {
            Some(v) => env::set_var("WAYLAND_DISPLAY", v),
            None => env::remove_var("WAYLAND_DISPLAY"),
        }
        match saved.1 {
            Some(v) => env::set_var("XDG_SESSION_TYPE", v),
            None => env::remove_var("XDG_SESSION_TYPE"),
        }
        result
    }

    #[test]
    #[serial]
    fn session_hints_are_detected() {
        assert!(with_session_env(Some("wayland-1"), None, wayland_session));
        assert!(with_session_env(None, Some("Wayland"), wayland_session));
        assert!(!with_session_env(Some(""), Some("x11"), wayland_session));
        assert!(!with_session_env(None, None, wayland_session));
    }

    #[test]
    #[serial]
    fn generic_preference_never_probes_wayland() {
        let config = ListenerConfig {
            backend: BackendPreference::Generic,
            ..ListenerConfig::default()
        };
        let kind = with_session_env(Some("wayland-1"), Some("wayland"), || probe_kind(&config));
        assert_eq!(kind, DetectorKind::Generic);
    }

    #[test]
    #[serial]
    fn auto_follows_the_session() {
        let config = ListenerConfig::default();
        assert_eq!(
            with_session_env(None, Some("x11"), || probe_kind(&config)),
            DetectorKind::Generic
        );

        let expected = if cfg!(all(target_os = "linux", feature = "wayland")) {
            DetectorKind::Wayland
        } else {
            DetectorKind::Generic
        };
        assert_eq!(
            with_session_env(Some("wayland-0"), None, || probe_kind(&config)),
            expected
        );
    }

    #[test]
    #[serial]
    fn no_session_means_no_wayland_clipboard() {
        assert!(!with_session_env(None, None, is_wayland_clipboard_available));
    }
}
