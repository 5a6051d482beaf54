use crate::traits::SnapshotReader;
use crate::DecodeError;
use clipwatch_core::{FormatPayload, FormatTag, ImageInfo};

/// A clipboard snapshot held in memory.
///
/// Each format carries either its payload or the error a read should
/// produce, so a snapshot can model platforms where a format is listed but
/// cannot be decoded.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshot {
    entries: Vec<(FormatTag, Result<FormatPayload, DecodeError>)>,
}

impl MemorySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with(FormatTag::Text, FormatPayload::Text(text.into()))
    }

    pub fn with_html(self, html: impl Into<String>) -> Self {
        self.with(FormatTag::Html, FormatPayload::Html(html.into()))
    }

    pub fn with_rtf(self, rtf: impl Into<String>) -> Self {
        self.with(FormatTag::Rtf, FormatPayload::Rtf(rtf.into()))
    }

    pub fn with_image(self, image: ImageInfo) -> Self {
        self.with(FormatTag::Image, FormatPayload::Image(image))
    }

    pub fn with_files(self, files: Vec<String>) -> Self {
        self.with(FormatTag::Files, FormatPayload::Files(files))
    }

    pub fn with_custom(self, name: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.with(FormatTag::Custom(name.into()), FormatPayload::Custom(bytes))
    }

    /// Lists `tag` but makes every read of it fail with `error`.
    pub fn with_failure(mut self, tag: FormatTag, error: DecodeError) -> Self {
        self.set(tag, Err(error));
        self
    }

    fn with(mut self, tag: FormatTag, payload: FormatPayload) -> Self {
        self.set(tag, Ok(payload));
        self
    }

    fn set(&mut self, tag: FormatTag, value: Result<FormatPayload, DecodeError>) {
        match self.entries.iter_mut().find(|(existing, _)| *existing == tag) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((tag, value)),
        }
    }
}

impl SnapshotReader for MemorySnapshot {
    fn list_formats(&mut self) -> Result<Vec<FormatTag>, DecodeError> {
        Ok(self.entries.iter().map(|(tag, _)| tag.clone()).collect())
    }

    fn read_format(&mut self, tag: &FormatTag) -> Result<FormatPayload, DecodeError> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == tag)
            .map(|(_, value)| value.clone())
            .unwrap_or_else(|| Err(DecodeError::Unavailable(tag.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_formats_in_insertion_order() {
        let mut snapshot = MemorySnapshot::new().with_html("<b>x</b>").with_text("x");
        assert_eq!(
            snapshot.list_formats().unwrap(),
            vec![FormatTag::Html, FormatTag::Text]
        );
    }

    #[test]
    fn replacing_a_format_keeps_its_position() {
        let mut snapshot = MemorySnapshot::new()
            .with_text("first")
            .with_html("<p/>")
            .with_text("second");
        assert_eq!(
            snapshot.list_formats().unwrap(),
            vec![FormatTag::Text, FormatTag::Html]
        );
        assert_eq!(
            snapshot.read_format(&FormatTag::Text).unwrap(),
            FormatPayload::Text("second".into())
        );
    }

    #[test]
    fn injected_failures_are_returned_on_read() {
        let mut snapshot = MemorySnapshot::new()
            .with_failure(FormatTag::Image, DecodeError::Image("corrupt".into()));
        assert_eq!(snapshot.list_formats().unwrap(), vec![FormatTag::Image]);
        assert_eq!(
            snapshot.read_format(&FormatTag::Image),
            Err(DecodeError::Image("corrupt".into()))
        );
    }

    #[test]
    fn unknown_formats_are_unavailable() {
        let mut snapshot = MemorySnapshot::new();
        assert_eq!(
            snapshot.read_format(&FormatTag::Files),
            Err(DecodeError::Unavailable(FormatTag::Files))
        );
    }
}
