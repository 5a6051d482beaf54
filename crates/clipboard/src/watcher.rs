use crate::traits::RevisionSource;
use crate::RevisionError;
use clipboard_rs::{ClipboardHandler, ClipboardWatcher, ClipboardWatcherContext, WatcherShutdown};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Revision counter for platforms without one (X11), fed by clipboard-rs'
/// change watcher.
///
/// A background thread runs the watcher and bumps the counter on every
/// selection-owner change; `revision` is a plain atomic load, so polling
/// never transfers clipboard content.
pub struct WatchedRevision {
    revision: Arc<AtomicU64>,
    shutdown: Option<WatcherShutdown>,
    thread: Option<JoinHandle<()>>,
}

impl WatchedRevision {
    pub fn new() -> Result<Self, RevisionError> {
        let revision = Arc::new(AtomicU64::new(0));
        let handler = ChangeCounter {
            revision: revision.clone(),
        };
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);

        let thread = thread::Builder::new()
            .name("clipwatch-x11-watcher".to_string())
            .spawn(move || {
                let mut watcher = match ClipboardWatcherContext::<ChangeCounter>::new() {
                    Ok(watcher) => watcher,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                let shutdown = watcher.add_handler(handler).get_shutdown_channel();
                let _ = ready_tx.send(Ok(shutdown));
                watcher.start_watch();
                debug!("Clipboard watcher thread exited");
            })
            .map_err(|e| RevisionError::Unavailable(format!("failed to spawn watcher: {}", e)))?;

        match ready_rx.recv() {
            Ok(Ok(shutdown)) => Ok(Self {
                revision,
                shutdown: Some(shutdown),
                thread: Some(thread),
            }),
            Ok(Err(msg)) => {
                let _ = thread.join();
                Err(RevisionError::Unavailable(format!("clipboard watcher: {}", msg)))
            }
            Err(_) => {
                let _ = thread.join();
                Err(RevisionError::Unavailable(
                    "clipboard watcher exited during startup".to_string(),
                ))
            }
        }
    }
}

impl RevisionSource for WatchedRevision {
    fn revision(&mut self) -> Result<u64, RevisionError> {
        Ok(self.revision.load(Ordering::SeqCst))
    }
}

impl Drop for WatchedRevision {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            shutdown.stop();
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Clipboard watcher thread panicked");
            }
        }
    }
}

struct ChangeCounter {
    revision: Arc<AtomicU64>,
}

impl ClipboardHandler for ChangeCounter {
    fn on_clipboard_change(&mut self) {
        self.revision.fetch_add(1, Ordering::SeqCst);
    }
}
