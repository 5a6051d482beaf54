use crate::traits::SnapshotReader;
use crate::DecodeError;
use anyhow::{anyhow, Result};
use clipboard_rs::common::RustImage;
use clipboard_rs::{Clipboard, ClipboardContext, ContentFormat};
use clipwatch_core::{FormatPayload, FormatTag, ImageInfo};
use tracing::debug;

/// The OS clipboard, read through clipboard-rs.
pub struct SystemClipboard {
    ctx: ClipboardContext,
    custom: Vec<FormatTag>,
}

impl SystemClipboard {
    /// `custom` lists the registered non-built-in formats worth reporting.
    pub fn new(custom: Vec<FormatTag>) -> Result<Self> {
        let ctx = ClipboardContext::new()
            .map_err(|e| anyhow!("Failed to create clipboard context: {}", e))?;
        if !custom.is_empty() {
            debug!("Reading custom clipboard formats: {:?}", custom);
        }
        Ok(Self { ctx, custom })
    }
}

fn content_format(tag: &FormatTag) -> ContentFormat {
    match tag {
        FormatTag::Text => ContentFormat::Text,
        FormatTag::Html => ContentFormat::Html,
        FormatTag::Rtf => ContentFormat::Rtf,
        FormatTag::Image => ContentFormat::Image,
        FormatTag::Files => ContentFormat::Files,
        FormatTag::Custom(name) => ContentFormat::Other(name.clone()),
    }
}

impl SnapshotReader for SystemClipboard {
    fn list_formats(&mut self) -> Result<Vec<FormatTag>, DecodeError> {
        let tags = FormatTag::BUILT_IN
            .iter()
            .chain(self.custom.iter())
            .filter(|tag| self.ctx.has(content_format(tag)))
            .cloned()
            .collect();
        Ok(tags)
    }

    fn read_format(&mut self, tag: &FormatTag) -> Result<FormatPayload, DecodeError> {
        match tag {
            FormatTag::Text => self
                .ctx
                .get_text()
                .map(FormatPayload::Text)
                .map_err(|e| DecodeError::backend(tag, e)),
            FormatTag::Html => self
                .ctx
                .get_html()
                .map(FormatPayload::Html)
                .map_err(|e| DecodeError::backend(tag, e)),
            FormatTag::Rtf => self
                .ctx
                .get_rich_text()
                .map(FormatPayload::Rtf)
                .map_err(|e| DecodeError::backend(tag, e)),
            FormatTag::Image => {
                let image = self
                    .ctx
                    .get_image()
                    .map_err(|e| DecodeError::backend(tag, e))?;
                let (width, height) = image.get_size();
                let png = image
                    .to_png()
                    .map_err(|e| DecodeError::Image(format!("PNG conversion failed: {}", e)))?;
                Ok(FormatPayload::Image(ImageInfo::from_png(
                    width,
                    height,
                    png.get_bytes().to_vec(),
                )))
            }
            FormatTag::Files => self
                .ctx
                .get_files()
                .map(FormatPayload::Files)
                .map_err(|e| DecodeError::backend(tag, e)),
            FormatTag::Custom(name) => self
                .ctx
                .get_buffer(name)
                .map(FormatPayload::Custom)
                .map_err(|e| DecodeError::backend(tag, e)),
        }
    }
}
