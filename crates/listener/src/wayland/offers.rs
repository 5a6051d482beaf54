//! Selection bookkeeping for the data-control device, kept apart from the
//! protocol objects so it can be driven with plain keys.
//!
//! At most one clipboard and one primary selection are pending at a time.
//! A newer selection of the same kind replaces the pending one, and the
//! replaced offer is handed back to the caller for destruction: once
//! superseded, its source no longer answers `receive` and every read would
//! come back empty.

use crate::error::DetectorError;
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use tracing::debug;

/// A selection announced by the compositor, waiting to be read.
#[derive(Debug, PartialEq)]
pub(crate) struct Selection<O> {
    pub offer: O,
    pub mimes: Vec<String>,
    pub primary: bool,
}

#[derive(Debug)]
pub(crate) struct OfferTracker<K, O> {
    /// MIME types collected per live offer, until its selection event.
    mimes: HashMap<K, Vec<String>>,
    pending: VecDeque<Selection<O>>,
    watch_primary: bool,
    finished: bool,
    coalesced: u64,
}

impl<K, O> Default for OfferTracker<K, O> {
    fn default() -> Self {
        Self {
            mimes: HashMap::new(),
            pending: VecDeque::new(),
            watch_primary: false,
            finished: false,
            coalesced: 0,
        }
    }
}

impl<K: Eq + Hash, O> OfferTracker<K, O> {
    pub fn new(watch_primary: bool) -> Self {
        Self {
            watch_primary,
            ..Self::default()
        }
    }

    pub fn introduce(&mut self, key: K) {
        self.mimes.insert(key, Vec::new());
    }

    pub fn add_mime(&mut self, key: K, mime: String) {
        self.mimes.entry(key).or_default().push(mime);
    }

    /// Records a `selection` or `primary_selection` event. Returns the
    /// offers that will never be read.
    pub fn selection(&mut self, offer: Option<(K, O)>, primary: bool) -> Vec<O> {
        let mut stale = Vec::new();

        if primary && !self.watch_primary {
            if let Some((key, offer)) = offer {
                self.mimes.remove(&key);
                stale.push(offer);
            }
            return stale;
        }

        if let Some(index) = self.pending.iter().position(|s| s.primary == primary) {
            if let Some(replaced) = self.pending.remove(index) {
                self.coalesced += 1;
                debug!(
                    "Dropped unread {} selection ({} coalesced so far)",
                    kind_name(primary),
                    self.coalesced
                );
                stale.push(replaced.offer);
            }
        }

        match offer {
            Some((key, offer)) => {
                let mimes = self.mimes.remove(&key).unwrap_or_default();
                self.pending.push_back(Selection {
                    offer,
                    mimes,
                    primary,
                });
            }
            None => debug!("{} selection cleared", kind_name(primary)),
        }
        stale
    }

    pub fn finish(&mut self) {
        self.finished = true;
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Number of unread selections replaced by newer ones.
    pub fn coalesced(&self) -> u64 {
        self.coalesced
    }

    /// The oldest pending selection. Fails once the device is finished.
    pub fn next(&mut self) -> Result<Option<Selection<O>>, DetectorError> {
        if self.finished {
            return Err(DetectorError::Disconnected(
                "data-control device was finished by the compositor".to_string(),
            ));
        }
        Ok(self.pending.pop_front())
    }

    /// Empties the pending queue, e.g. to skip the selection present at
    /// connect time.
    pub fn drain(&mut self) -> Vec<O> {
        self.pending.drain(..).map(|s| s.offer).collect()
    }
}

fn kind_name(primary: bool) -> &'static str {
    if primary {
        "primary"
    } else {
        "clipboard"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer(tracker: &mut OfferTracker<u32, u32>, id: u32, mimes: &[&str]) -> Option<(u32, u32)> {
        tracker.introduce(id);
        for mime in mimes {
            tracker.add_mime(id, mime.to_string());
        }
        Some((id, id))
    }

    #[test]
    fn unread_selection_is_replaced_by_the_newest() {
        let mut tracker = OfferTracker::new(false);
        let first = offer(&mut tracker, 1, &["text/plain"]);
        assert!(tracker.selection(first, false).is_empty());
        let second = offer(&mut tracker, 2, &["text/html"]);
        assert_eq!(tracker.selection(second, false), vec![1]);

        let next = tracker.next().unwrap().unwrap();
        assert_eq!(next.offer, 2);
        assert_eq!(next.mimes, vec!["text/html".to_string()]);
        assert_eq!(tracker.next().unwrap(), None);
        assert_eq!(tracker.coalesced(), 1);
    }

    #[test]
    fn identical_reoffers_each_count_once_read() {
        let mut tracker = OfferTracker::new(false);
        for id in 1..=3 {
            let same = offer(&mut tracker, id, &["text/plain;charset=utf-8"]);
            assert!(tracker.selection(same, false).is_empty());
            let next = tracker.next().unwrap().unwrap();
            assert_eq!(next.offer, id);
            assert_eq!(next.mimes, vec!["text/plain;charset=utf-8".to_string()]);
        }
        assert_eq!(tracker.coalesced(), 0);
    }

    #[test]
    fn primary_selection_is_dropped_unless_watched() {
        let mut tracker = OfferTracker::new(false);
        let primary = offer(&mut tracker, 1, &["text/plain"]);
        assert_eq!(tracker.selection(primary, true), vec![1]);
        assert!(!tracker.has_pending());

        let mut tracker = OfferTracker::new(true);
        let primary = offer(&mut tracker, 1, &["text/plain"]);
        assert!(tracker.selection(primary, true).is_empty());
        let next = tracker.next().unwrap().unwrap();
        assert!(next.primary);
    }

    #[test]
    fn clipboard_and_primary_are_coalesced_separately() {
        let mut tracker = OfferTracker::new(true);
        let clip = offer(&mut tracker, 1, &["text/plain"]);
        tracker.selection(clip, false);
        let primary = offer(&mut tracker, 2, &["text/plain"]);
        assert!(tracker.selection(primary, true).is_empty());

        assert_eq!(tracker.next().unwrap().unwrap().offer, 1);
        assert_eq!(tracker.next().unwrap().unwrap().offer, 2);
    }

    #[test]
    fn clearing_drops_the_unread_selection() {
        let mut tracker = OfferTracker::new(false);
        let clip = offer(&mut tracker, 1, &["text/plain"]);
        tracker.selection(clip, false);
        assert_eq!(tracker.selection(None, false), vec![1]);
        assert_eq!(tracker.next().unwrap(), None);
    }

    #[test]
    fn null_selection_is_not_a_change() {
        let mut tracker: OfferTracker<u32, u32> = OfferTracker::new(true);
        assert!(tracker.selection(None, false).is_empty());
        assert!(tracker.selection(None, true).is_empty());
        assert!(!tracker.has_pending());
    }

    #[test]
    fn finished_device_reports_disconnect() {
        let mut tracker = OfferTracker::new(false);
        let clip = offer(&mut tracker, 1, &["text/plain"]);
        tracker.selection(clip, false);
        tracker.finish();
        assert!(matches!(tracker.next(), Err(DetectorError::Disconnected(_))));
        assert_eq!(tracker.drain(), vec![1]);
    }
}
