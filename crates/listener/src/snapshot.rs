use anyhow::Result;
use clipwatch_clipboard::{SnapshotReader, SystemClipboard};
use clipwatch_core::{ClipboardData, ListenerConfig};
use tracing::{debug, warn};

/// Reads every listed format into one payload.
///
/// A format that fails to decode stays listed with its field left empty; a
/// failed listing yields a payload with no formats.
pub fn assemble(reader: &mut dyn SnapshotReader) -> ClipboardData {
    let mut data = ClipboardData::new();
    let formats = match reader.list_formats() {
        Ok(formats) => formats,
        Err(e) => {
            warn!("Failed to list clipboard formats: {}", e);
            return data;
        }
    };

    for tag in formats {
        data.push_format(tag.clone());
        match reader.read_format(&tag) {
            Ok(payload) => data.insert(&tag, payload),
            Err(e) => debug!("Skipping clipboard format {}: {}", tag, e),
        }
    }
    data
}

/// One-shot read of the system clipboard.
pub fn read_current(config: &ListenerConfig) -> Result<ClipboardData> {
    let mut clipboard = SystemClipboard::new(config.custom_tags())?;
    Ok(assemble(&mut clipboard))
}
