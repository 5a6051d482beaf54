use anyhow::{anyhow, Result};
use clipwatch_core::ClipboardData;
use tokio::sync::mpsc::Sender;

/// Hands assembled payloads to user code on the listener thread.
///
/// Errors and panics from `deliver` are logged by the engine and never stop
/// the listener.
pub trait CallbackBridge: Send {
    fn deliver(&mut self, data: ClipboardData) -> Result<()>;
}

impl<F> CallbackBridge for F
where
    F: FnMut(ClipboardData) -> Result<()> + Send,
{
    fn deliver(&mut self, data: ClipboardData) -> Result<()> {
        self(data)
    }
}

/// Forwards payloads into a tokio channel, so async code can consume them
/// from its own runtime.
pub struct ChannelBridge {
    tx: Sender<ClipboardData>,
}

impl ChannelBridge {
    pub fn new(tx: Sender<ClipboardData>) -> Self {
        Self { tx }
    }
}

impl CallbackBridge for ChannelBridge {
    fn deliver(&mut self, data: ClipboardData) -> Result<()> {
        // The listener thread is not a runtime thread, so blocking is allowed.
        self.tx
            .blocking_send(data)
            .map_err(|_| anyhow!("clipboard receiver was dropped"))
    }
}
