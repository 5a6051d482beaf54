use crate::bridge::{CallbackBridge, ChannelBridge};
use crate::error::{DetectorError, ListenerError};
use crate::signal::{ChangeSignal, DetectorFactory, SystemDetectors, Wake};
use crate::snapshot::assemble;
use crate::state::{DetectorKind, ListenerState};
use clipwatch_core::{ClipboardData, ListenerConfig};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

const THREAD_NAME: &str = "clipwatch-listener";
const INITIAL_BACKOFF: Duration = Duration::from_millis(250);
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Watches the clipboard on a background thread and hands every change to
/// a callback.
///
/// `Idle -> Watching -> Stopped -> Watching ...`. Stopping is idempotent and
/// may be requested from any thread, including from inside the callback.
pub struct ListenerEngine {
    factory: Arc<dyn DetectorFactory>,
    stop_timeout: Duration,
    inner: Mutex<Inner>,
}

struct Inner {
    state: ListenerState,
    kind: Option<DetectorKind>,
    worker: Option<Worker>,
    /// Set while `watch` waits for the detector, which happens unlocked.
    starting: bool,
    /// `stop` arrived while starting; `watch` shuts the new worker down.
    cancel_start: bool,
}

struct Worker {
    handle: JoinHandle<()>,
    stop_tx: Sender<()>,
    stop_flag: Arc<AtomicBool>,
    done_rx: Receiver<()>,
}

impl ListenerEngine {
    pub fn new(config: ListenerConfig) -> Self {
        let stop_timeout = config.stop_timeout();
        Self::with_factory(Arc::new(SystemDetectors::new(config)), stop_timeout)
    }

    pub fn with_factory(factory: Arc<dyn DetectorFactory>, stop_timeout: Duration) -> Self {
        Self {
            factory,
            stop_timeout,
            inner: Mutex::new(Inner {
                state: ListenerState::Idle,
                kind: None,
                worker: None,
                starting: false,
                cancel_start: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Starts watching. Returns once the detector is running; content
    /// already on the clipboard is not delivered.
    ///
    /// The engine is not locked while the detector connects, so `state`,
    /// `is_watching` and `stop` stay responsive. A `stop` issued meanwhile
    /// takes effect as soon as the detector is up.
    pub fn watch<B>(&self, bridge: B) -> Result<(), ListenerError>
    where
        B: CallbackBridge + 'static,
    {
        {
            let mut inner = self.lock();
            if inner.state == ListenerState::Watching || inner.starting {
                return Err(ListenerError::AlreadyWatching);
            }
            inner.starting = true;
            inner.cancel_start = false;
        }

        let result = self.start(bridge);
        let mut inner = self.lock();
        inner.starting = false;
        let cancelled = std::mem::take(&mut inner.cancel_start);
        let worker = result?;

        if cancelled {
            inner.state = ListenerState::Stopped;
            drop(inner);
            info!("Clipboard listener stopped while starting");
            self.halt(worker);
            return Ok(());
        }

        inner.state = ListenerState::Watching;
        inner.worker = Some(worker);
        Ok(())
    }

    fn start<B>(&self, bridge: B) -> Result<Worker, ListenerError>
    where
        B: CallbackBridge + 'static,
    {
        let preferred = self.factory.probe();
        let factory = self.factory.clone();
        let (init_tx, init_rx) = bounded::<Result<DetectorKind, DetectorError>>(1);
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let (done_tx, done_rx) = bounded::<()>(1);
        let stop_flag = Arc::new(AtomicBool::new(false));
        let worker_flag = stop_flag.clone();

        let handle = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || {
                let detector = match build_detector(factory.as_ref(), preferred) {
                    Ok(detector) => detector,
                    Err(e) => {
                        let _ = init_tx.send(Err(e));
                        return;
                    }
                };
                let _ = init_tx.send(Ok(detector.kind()));
                run(detector, factory, bridge, stop_rx, worker_flag);
                let _ = done_tx.send(());
            })
            .map_err(|e| {
                ListenerError::DetectorInit(DetectorError::Unavailable(format!(
                    "failed to spawn listener thread: {}",
                    e
                )))
            })?;

        let kind = match init_rx.recv() {
            Ok(Ok(kind)) => kind,
            Ok(Err(e)) => {
                let _ = handle.join();
                error!("Clipboard listener failed to start: {}", e);
                return Err(ListenerError::DetectorInit(e));
            }
            Err(_) => {
                let _ = handle.join();
                return Err(ListenerError::DetectorInit(DetectorError::Unavailable(
                    "listener thread exited during startup".to_string(),
                )));
            }
        };

        info!("Clipboard listener started ({})", kind);
        self.lock().kind = Some(kind);
        Ok(Worker {
            handle,
            stop_tx,
            stop_flag,
            done_rx,
        })
    }

    /// Starts watching and returns a channel fed with every change.
    pub fn watch_channel(
        &self,
        capacity: usize,
    ) -> Result<tokio::sync::mpsc::Receiver<ClipboardData>, ListenerError> {
        let (tx, rx) = tokio::sync::mpsc::channel(capacity);
        self.watch(ChannelBridge::new(tx))?;
        Ok(rx)
    }

    /// Stops watching. Waits up to the configured stop timeout for the
    /// listener thread to exit, except when called from that thread.
    pub fn stop(&self) {
        let worker = {
            let mut inner = self.lock();
            if inner.starting {
                inner.cancel_start = true;
                return;
            }
            if inner.state != ListenerState::Watching {
                return;
            }
            inner.state = ListenerState::Stopped;
            inner.worker.take()
        };
        if let Some(worker) = worker {
            self.halt(worker);
        }
    }

    fn halt(&self, worker: Worker) {
        let Worker {
            handle,
            stop_tx,
            stop_flag,
            done_rx,
        } = worker;

        stop_flag.store(true, Ordering::SeqCst);
        drop(stop_tx);

        if thread::current().id() == handle.thread().id() {
            debug!("Stop requested from the listener thread");
            return;
        }

        match done_rx.recv_timeout(self.stop_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                let _ = handle.join();
                info!("Clipboard listener stopped");
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "Clipboard listener did not exit within {:?}; detaching",
                    self.stop_timeout
                );
            }
        }
    }

    pub fn is_watching(&self) -> bool {
        self.lock().state == ListenerState::Watching
    }

    pub fn state(&self) -> ListenerState {
        self.lock().state
    }

    /// The kind chosen by the last successful `watch`, or the kind the
    /// probe would choose if there has been none.
    pub fn listener_type(&self) -> DetectorKind {
        let kind = self.lock().kind;
        kind.unwrap_or_else(|| self.factory.probe())
    }
}

impl Drop for ListenerEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

fn build_detector(
    factory: &dyn DetectorFactory,
    preferred: DetectorKind,
) -> Result<Box<dyn ChangeSignal>, DetectorError> {
    match factory.build(preferred) {
        Ok(detector) => Ok(detector),
        Err(e) if preferred == DetectorKind::Wayland => {
            warn!("Wayland clipboard detector unavailable ({}); falling back to polling", e);
            factory.build(DetectorKind::Generic)
        }
        Err(e) => Err(e),
    }
}

enum Step {
    Deliver(ClipboardData),
    Continue,
    Exit,
    Failed(DetectorError),
}

fn run<B: CallbackBridge>(
    mut detector: Box<dyn ChangeSignal>,
    factory: Arc<dyn DetectorFactory>,
    mut bridge: B,
    stop_rx: Receiver<()>,
    stop_flag: Arc<AtomicBool>,
) {
    loop {
        if stop_flag.load(Ordering::SeqCst) {
            break;
        }

        let step = match detector.wait_for_change(&stop_rx) {
            Ok(Wake::Changed(reader)) => Step::Deliver(assemble(reader)),
            Ok(Wake::Idle) => Step::Continue,
            Ok(Wake::Stopped) => Step::Exit,
            Err(e) => Step::Failed(e),
        };

        match step {
            Step::Deliver(data) => {
                if stop_flag.load(Ordering::SeqCst) {
                    break;
                }
                dispatch(&mut bridge, data);
            }
            Step::Continue => {}
            Step::Exit => break,
            Step::Failed(DetectorError::Transient(msg)) => {
                warn!("Clipboard detector hiccup: {}", msg);
            }
            Step::Failed(e) => {
                error!("Clipboard detector failed: {}", e);
                match rebuild(factory.as_ref(), detector.kind(), &stop_rx) {
                    Some(rebuilt) => detector = rebuilt,
                    None => break,
                }
            }
        }
    }
    debug!("Clipboard listener loop exited");
}

fn dispatch<B: CallbackBridge>(bridge: &mut B, data: ClipboardData) {
    debug!("Dispatching clipboard change: {:?}", data.available_formats);
    match panic::catch_unwind(AssertUnwindSafe(|| bridge.deliver(data))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Clipboard callback failed: {:#}", e),
        Err(_) => error!("Clipboard callback panicked"),
    }
}

/// Rebuilds a detector of the same kind, backing off between attempts.
/// Returns `None` if stopped first.
fn rebuild(
    factory: &dyn DetectorFactory,
    kind: DetectorKind,
    stop_rx: &Receiver<()>,
) -> Option<Box<dyn ChangeSignal>> {
    let mut backoff = INITIAL_BACKOFF;
    loop {
        match stop_rx.recv_timeout(backoff) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => return None,
            Err(RecvTimeoutError::Timeout) => {}
        }
        match factory.build(kind) {
            Ok(detector) => {
                info!("Clipboard detector ({}) reconnected", kind);
                return Some(detector);
            }
            Err(e) => {
                warn!("Reconnecting {} detector failed: {}; retrying in {:?}", kind, e, backoff);
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
        }
    }
}
