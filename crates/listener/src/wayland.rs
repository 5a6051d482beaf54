//! Event-driven clipboard detection through the wlroots data-control
//! protocol (`zwlr_data_control_manager_v1`).
//!
//! The compositor pushes a `selection` event whenever any client sets the
//! clipboard. Each selection arrives as a data offer listing MIME types;
//! content is fetched by handing the compositor the write end of a pipe.

mod offers;

use self::offers::OfferTracker;
use crate::error::DetectorError;
use crate::signal::{ChangeSignal, Wake};
use crate::state::DetectorKind;
use clipwatch_clipboard::{mime, DecodeError, SnapshotReader};
use clipwatch_core::{FormatPayload, FormatTag, ListenerConfig};
use crossbeam_channel::{Receiver, TryRecvError};
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use std::fmt::Display;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::os::fd::AsFd;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use wayland_client::backend::{ObjectId, WaylandError};
use wayland_client::globals::{registry_queue_init, GlobalListContents};
use wayland_client::protocol::{wl_registry::WlRegistry, wl_seat::WlSeat};
use wayland_client::{event_created_child, Connection, Dispatch, EventQueue, Proxy, QueueHandle};
use wayland_protocols_wlr::data_control::v1::client::zwlr_data_control_device_v1::{
    self, ZwlrDataControlDeviceV1,
};
use wayland_protocols_wlr::data_control::v1::client::zwlr_data_control_manager_v1::ZwlrDataControlManagerV1;
use wayland_protocols_wlr::data_control::v1::client::zwlr_data_control_offer_v1::{
    self, ZwlrDataControlOfferV1,
};

/// Upper bound on one blocking read of the Wayland socket.
const EVENT_SLICE_MS: u16 = 100;

const DATA_CONTROL_INTERFACE: &str = "zwlr_data_control_manager_v1";

struct WaylandState {
    tracker: OfferTracker<ObjectId, ZwlrDataControlOfferV1>,
}

impl WaylandState {
    fn new(watch_primary: bool) -> Self {
        Self {
            tracker: OfferTracker::new(watch_primary),
        }
    }

    fn selection(&mut self, offer: Option<ZwlrDataControlOfferV1>, primary: bool) {
        let offer = offer.map(|offer| (offer.id(), offer));
        for stale in self.tracker.selection(offer, primary) {
            stale.destroy();
        }
    }
}

/// Settings copied into every offer snapshot.
#[derive(Clone)]
struct Transfer {
    custom: Vec<FormatTag>,
    priority: Vec<String>,
    timeout: Duration,
    max_bytes: usize,
}

/// Listens for selection changes pushed by the compositor.
pub struct EventDetector {
    conn: Connection,
    queue: EventQueue<WaylandState>,
    state: WaylandState,
    _device: ZwlrDataControlDeviceV1,
    transfer: Transfer,
    current: Option<OfferSnapshot>,
}

impl EventDetector {
    /// Connects to the compositor named by the environment and binds the
    /// data-control device for the default seat. The selection present at
    /// connect time is the baseline and is not reported.
    pub fn connect(config: &ListenerConfig) -> Result<Self, DetectorError> {
        let conn = Connection::connect_to_env()
            .map_err(|e| unavailable("Wayland connection failed", e))?;
        let (globals, mut queue) = registry_queue_init::<WaylandState>(&conn)
            .map_err(|e| unavailable("Failed to initialize Wayland registry", e))?;
        let qh = queue.handle();

        let manager: ZwlrDataControlManagerV1 = globals
            .bind(&qh, 1..=2, ())
            .map_err(|e| unavailable("Compositor lacks zwlr_data_control_manager_v1", e))?;
        let seat: WlSeat = globals
            .bind(&qh, 1..=8, ())
            .map_err(|e| unavailable("Failed to bind wl_seat", e))?;
        let device = manager.get_data_device(&seat, &qh, ());

        let watch_primary = config.watch_primary && manager.version() >= 2;
        if config.watch_primary && !watch_primary {
            warn!("Primary selection needs data-control v2; compositor offers v{}", manager.version());
        }

        let mut state = WaylandState::new(watch_primary);
        queue
            .roundtrip(&mut state)
            .map_err(|e| unavailable("Wayland roundtrip failed", e))?;
        for baseline in state.tracker.drain() {
            baseline.destroy();
        }
        if state.tracker.is_finished() {
            return Err(DetectorError::Unavailable(
                "data-control device finished during setup".to_string(),
            ));
        }

        info!("Bound {} v{}", DATA_CONTROL_INTERFACE, manager.version());
        Ok(Self {
            conn,
            queue,
            state,
            _device: device,
            transfer: Transfer {
                custom: config.custom_tags(),
                priority: config.mime_priority.clone(),
                timeout: config.transfer_timeout(),
                max_bytes: config.max_payload_bytes,
            },
            current: None,
        })
    }

    /// Reads and dispatches whatever arrives on the socket within one slice.
    fn read_events(&mut self) -> Result<(), DetectorError> {
        self.queue
            .dispatch_pending(&mut self.state)
            .map_err(disconnected)?;
        if self.state.tracker.has_pending() {
            return Ok(());
        }
        self.conn.flush().map_err(disconnected)?;

        let Some(guard) = self.queue.prepare_read() else {
            self.queue
                .dispatch_pending(&mut self.state)
                .map_err(disconnected)?;
            return Ok(());
        };

        let readable = {
            let mut fds = [PollFd::new(guard.connection_fd(), PollFlags::POLLIN)];
            match poll(&mut fds, PollTimeout::from(EVENT_SLICE_MS)) {
                Ok(n) => n > 0,
                Err(Errno::EINTR) => false,
                Err(e) => return Err(disconnected(e)),
            }
        };

        if readable {
            match guard.read() {
                Ok(_) => {}
                Err(WaylandError::Io(e)) if e.kind() == ErrorKind::WouldBlock => {}
                Err(e) => return Err(disconnected(e)),
            }
        } else {
            drop(guard);
        }

        self.queue
            .dispatch_pending(&mut self.state)
            .map_err(disconnected)?;
        Ok(())
    }
}

impl ChangeSignal for EventDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Wayland
    }

    fn wait_for_change(&mut self, stop: &Receiver<()>) -> Result<Wake<'_>, DetectorError> {
        match stop.try_recv() {
            Err(TryRecvError::Empty) => {}
            Ok(()) | Err(TryRecvError::Disconnected) => return Ok(Wake::Stopped),
        }

        // The previous offer is superseded once we look for the next one.
        self.current = None;

        // Only the newest selection of each kind is kept; older unread
        // offers were destroyed as soon as they were superseded.
        if !self.state.tracker.has_pending() && !self.state.tracker.is_finished() {
            self.read_events()?;
        }

        match self.state.tracker.next()? {
            Some(selection) => {
                debug!(
                    "New {} offer: {:?} ({} superseded unread)",
                    if selection.primary { "primary" } else { "clipboard" },
                    selection.mimes,
                    self.state.tracker.coalesced()
                );
                let snapshot = OfferSnapshot {
                    conn: self.conn.clone(),
                    offer: selection.offer,
                    mimes: selection.mimes,
                    transfer: self.transfer.clone(),
                };
                Ok(Wake::Changed(self.current.insert(snapshot)))
            }
            None => Ok(Wake::Idle),
        }
    }
}

/// The content behind one data offer, fetched format by format.
pub struct OfferSnapshot {
    conn: Connection,
    offer: ZwlrDataControlOfferV1,
    mimes: Vec<String>,
    transfer: Transfer,
}

impl OfferSnapshot {
    fn receive(&self, mime: &str) -> Result<Vec<u8>, DecodeError> {
        let (read_end, write_end) =
            nix::unistd::pipe().map_err(|e| DecodeError::Transfer(format!("pipe: {}", e)))?;
        self.offer.receive(mime.to_string(), write_end.as_fd());
        self.conn
            .flush()
            .map_err(|e| DecodeError::Transfer(format!("flush: {}", e)))?;
        // Only the source client may hold the write end, or EOF never comes.
        drop(write_end);
        read_pipe(File::from(read_end), self.transfer.timeout, self.transfer.max_bytes)
    }
}

impl SnapshotReader for OfferSnapshot {
    fn list_formats(&mut self) -> Result<Vec<FormatTag>, DecodeError> {
        Ok(mime::tags_for_offer(&self.mimes, &self.transfer.custom))
    }

    fn read_format(&mut self, tag: &FormatTag) -> Result<FormatPayload, DecodeError> {
        let mime = mime::preferred_mime(tag, &self.mimes, &self.transfer.priority)
            .ok_or_else(|| DecodeError::Unavailable(tag.clone()))?
            .to_string();
        let bytes = self.receive(&mime)?;
        mime::decode_payload(tag, bytes)
    }
}

impl Drop for OfferSnapshot {
    fn drop(&mut self) {
        self.offer.destroy();
    }
}

/// Reads a pipe to EOF, failing once `timeout` elapses or more than `limit`
/// bytes arrive.
pub(crate) fn read_pipe(mut file: File, timeout: Duration, limit: usize) -> Result<Vec<u8>, DecodeError> {
    let deadline = Instant::now() + timeout;
    let mut data = Vec::new();
    let mut chunk = [0u8; 8192];

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(DecodeError::Transfer(format!(
                "timed out after {:?} with {} bytes read",
                timeout,
                data.len()
            )));
        }

        let wait_ms = u16::try_from(remaining.as_millis()).unwrap_or(u16::MAX);
        let ready = {
            let mut fds = [PollFd::new(file.as_fd(), PollFlags::POLLIN)];
            match poll(&mut fds, PollTimeout::from(wait_ms)) {
                Ok(n) => n > 0,
                Err(Errno::EINTR) => false,
                Err(e) => return Err(DecodeError::Transfer(format!("poll: {}", e))),
            }
        };
        if !ready {
            continue;
        }

        match file.read(&mut chunk) {
            Ok(0) => return Ok(data),
            Ok(n) => {
                let size = data.len() + n;
                if size > limit {
                    return Err(DecodeError::TooLarge { size, limit });
                }
                data.extend_from_slice(&chunk[..n]);
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(DecodeError::Transfer(e.to_string())),
        }
    }
}

/// Whether the compositor advertises the data-control global.
pub fn data_control_available() -> bool {
    let conn = match Connection::connect_to_env() {
        Ok(conn) => conn,
        Err(e) => {
            debug!("Wayland connection failed: {}", e);
            return false;
        }
    };
    match registry_queue_init::<WaylandState>(&conn) {
        Ok((globals, _queue)) => globals.contents().with_list(|list| {
            list.iter()
                .any(|global| global.interface == DATA_CONTROL_INTERFACE)
        }),
        Err(e) => {
            debug!("Wayland registry unavailable: {}", e);
            false
        }
    }
}

fn unavailable(context: &str, err: impl Display) -> DetectorError {
    DetectorError::Unavailable(format!("{}: {}", context, err))
}

fn disconnected(err: impl Display) -> DetectorError {
    DetectorError::Disconnected(err.to_string())
}

impl Dispatch<WlRegistry, GlobalListContents> for WaylandState {
    fn event(
        _state: &mut Self,
        _proxy: &WlRegistry,
        _event: <WlRegistry as Proxy>::Event,
        _data: &GlobalListContents,
        _conn: &Connection,
        _qhandle: &QueueHandle<Self>,
    ) {
        // Globals are read once at connect time
    }
}

impl Dispatch<WlSeat, ()> for WaylandState {
    fn event(
        _state: &mut Self,
        _proxy: &WlSeat,
        _event: <WlSeat as Proxy>::Event,
        _data: &(),
        _conn: &Connection,
        _qhandle: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<ZwlrDataControlManagerV1, ()> for WaylandState {
    fn event(
        _state: &mut Self,
        _proxy: &ZwlrDataControlManagerV1,
        _event: <ZwlrDataControlManagerV1 as Proxy>::Event,
        _data: &(),
        _conn: &Connection,
        _qhandle: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<ZwlrDataControlDeviceV1, ()> for WaylandState {
    fn event(
        state: &mut Self,
        _proxy: &ZwlrDataControlDeviceV1,
        event: zwlr_data_control_device_v1::Event,
        _data: &(),
        _conn: &Connection,
        _qhandle: &QueueHandle<Self>,
    ) {
        match event {
            zwlr_data_control_device_v1::Event::DataOffer { id } => {
                state.tracker.introduce(id.id());
            }
            zwlr_data_control_device_v1::Event::Selection { id } => {
                state.selection(id, false);
            }
            zwlr_data_control_device_v1::Event::PrimarySelection { id } => {
                state.selection(id, true);
            }
            zwlr_data_control_device_v1::Event::Finished => {
                warn!("Data-control device finished");
                state.tracker.finish();
            }
            _ => {}
        }
    }

    event_created_child!(WaylandState, ZwlrDataControlDeviceV1, [
        zwlr_data_control_device_v1::EVT_DATA_OFFER_OPCODE => (ZwlrDataControlOfferV1, ()),
    ]);
}

impl Dispatch<ZwlrDataControlOfferV1, ()> for WaylandState {
    fn event(
        state: &mut Self,
        proxy: &ZwlrDataControlOfferV1,
        event: zwlr_data_control_offer_v1::Event,
        _data: &(),
        _conn: &Connection,
        _qhandle: &QueueHandle<Self>,
    ) {
        if let zwlr_data_control_offer_v1::Event::Offer { mime_type } = event {
            state.tracker.add_mime(proxy.id(), mime_type);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::thread;

    fn pipe_pair() -> (File, File) {
        let (read_end, write_end) = nix::unistd::pipe().unwrap();
        (File::from(read_end), File::from(write_end))
    }

    #[test]
    fn pipe_is_read_to_eof() {
        let (reader, mut writer) = pipe_pair();
        let feeder = thread::spawn(move || {
            writer.write_all(b"Hello, ").unwrap();
            thread::sleep(Duration::from_millis(20));
            writer.write_all(b"World!").unwrap();
        });
        let bytes = read_pipe(reader, Duration::from_secs(2), 1024).unwrap();
        feeder.join().unwrap();
        assert_eq!(bytes, b"Hello, World!");
    }

    #[test]
    fn silent_source_times_out() {
        let (reader, _writer) = pipe_pair();
        let result = read_pipe(reader, Duration::from_millis(50), 1024);
        assert!(matches!(result, Err(DecodeError::Transfer(_))));
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let (reader, mut writer) = pipe_pair();
        writer.write_all(&[7u8; 64]).unwrap();
        drop(writer);
        assert_eq!(
            read_pipe(reader, Duration::from_secs(1), 16),
            Err(DecodeError::TooLarge { size: 64, limit: 16 })
        );
    }
}
