use crate::error::DetectorError;
use crate::signal::{ChangeSignal, Wake};
use crate::state::DetectorKind;
use clipwatch_clipboard::{RevisionSource, SnapshotReader};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::time::Duration;
use tracing::{debug, trace};

pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Detects changes by comparing a platform revision value between polls.
pub struct PollingDetector<R, S> {
    revisions: R,
    reader: S,
    last_revision: u64,
    interval: Duration,
}

impl<R: RevisionSource, S: SnapshotReader> PollingDetector<R, S> {
    /// Reads the baseline revision, so content already on the clipboard is
    /// never reported as a change.
    pub fn new(mut revisions: R, reader: S) -> Result<Self, DetectorError> {
        let last_revision = revisions.revision()?;
        debug!("Polling detector baseline revision {}", last_revision);
        Ok(Self {
            revisions,
            reader,
            last_revision,
            interval: POLL_INTERVAL,
        })
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Reads the revision once and reports whether it moved. Any difference
    /// counts, so counter wraparound is still a change.
    pub fn poll_once(&mut self) -> Result<bool, DetectorError> {
        let revision = self.revisions.revision()?;
        if revision == self.last_revision {
            return Ok(false);
        }
        trace!("Clipboard revision {} -> {}", self.last_revision, revision);
        self.last_revision = revision;
        Ok(true)
    }
}

impl<R: RevisionSource, S: SnapshotReader> ChangeSignal for PollingDetector<R, S> {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Generic
    }

    fn wait_for_change(&mut self, stop: &Receiver<()>) -> Result<Wake<'_>, DetectorError> {
        match stop.recv_timeout(self.interval) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => return Ok(Wake::Stopped),
            Err(RecvTimeoutError::Timeout) => {}
        }
        if self.poll_once()? {
            Ok(Wake::Changed(&mut self.reader))
        } else {
            Ok(Wake::Idle)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipwatch_clipboard::{MemorySnapshot, RevisionError};
    use clipwatch_core::FormatTag;
    use std::collections::VecDeque;

    /// Replays a fixed series of revisions, then repeats the last one.
    struct Scripted {
        values: VecDeque<Result<u64, RevisionError>>,
        last: u64,
    }

    impl Scripted {
        fn new(values: Vec<Result<u64, RevisionError>>) -> Self {
            Self {
                values: values.into(),
                last: 0,
            }
        }
    }

    impl RevisionSource for Scripted {
        fn revision(&mut self) -> Result<u64, RevisionError> {
            match self.values.pop_front() {
                Some(Ok(value)) => {
                    self.last = value;
                    Ok(value)
                }
                Some(Err(e)) => Err(e),
                None => Ok(self.last),
            }
        }
    }

    fn detector(values: Vec<Result<u64, RevisionError>>) -> PollingDetector<Scripted, MemorySnapshot> {
        PollingDetector::new(Scripted::new(values), MemorySnapshot::new().with_text("x"))
            .unwrap()
            .with_interval(Duration::from_millis(1))
    }

    #[test]
    fn baseline_is_not_a_change() {
        let mut detector = detector(vec![Ok(7)]);
        assert!(!detector.poll_once().unwrap());
    }

    #[test]
    fn revision_moves_are_reported_once() {
        let mut detector = detector(vec![Ok(7), Ok(8), Ok(8), Ok(9)]);
        assert!(detector.poll_once().unwrap());
        assert!(!detector.poll_once().unwrap());
        assert!(detector.poll_once().unwrap());
    }

    #[test]
    fn wraparound_counts_as_change() {
        let mut detector = detector(vec![Ok(u32::MAX as u64), Ok(0)]);
        assert!(detector.poll_once().unwrap());
    }

    #[test]
    fn revision_errors_surface_with_their_kind() {
        let mut detector = detector(vec![
            Ok(1),
            Err(RevisionError::Transient("busy".into())),
            Ok(2),
        ]);
        assert_eq!(
            detector.poll_once(),
            Err(DetectorError::Transient("busy".into()))
        );
        assert!(detector.poll_once().unwrap());
    }

    #[test]
    fn unavailable_counter_fails_construction() {
        let result = PollingDetector::new(
            Scripted::new(vec![Err(RevisionError::Unavailable("no access".into()))]),
            MemorySnapshot::new(),
        );
        assert!(matches!(result, Err(DetectorError::Unavailable(_))));
    }

    #[test]
    fn wait_exposes_the_reader_on_change() {
        let (_tx, stop) = crossbeam_channel::bounded::<()>(1);
        let mut detector = detector(vec![Ok(1), Ok(1), Ok(2)]);

        assert!(matches!(detector.wait_for_change(&stop), Ok(Wake::Idle)));
        match detector.wait_for_change(&stop).unwrap() {
            Wake::Changed(reader) => {
                assert_eq!(reader.list_formats().unwrap(), vec![FormatTag::Text]);
            }
            _ => panic!("expected a change"),
        }
    }

    #[test]
    fn dropped_stop_sender_ends_the_wait() {
        let (tx, stop) = crossbeam_channel::bounded::<()>(1);
        drop(tx);
        let mut detector = detector(vec![Ok(1), Ok(2)]);
        assert!(matches!(detector.wait_for_change(&stop), Ok(Wake::Stopped)));
    }
}
