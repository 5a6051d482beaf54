use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ListenerState {
    Idle,
    Watching,
    Stopped,
}

/// Change-detection mechanism behind a running listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    /// Revision-counter polling through the platform clipboard API.
    Generic,
    /// Selection offers pushed by a wlroots-style compositor.
    Wayland,
}

impl DetectorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorKind::Generic => "generic",
            DetectorKind::Wayland => "wayland",
        }
    }
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
