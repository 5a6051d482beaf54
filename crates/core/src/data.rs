use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Identifier for a kind of clipboard content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FormatTag {
    Text,
    Html,
    Rtf,
    Image,
    Files,
    /// A registered format outside the built-in set, e.g. `application/x-my-app`.
    Custom(String),
}

impl FormatTag {
    pub const BUILT_IN: [FormatTag; 5] = [
        FormatTag::Text,
        FormatTag::Rtf,
        FormatTag::Html,
        FormatTag::Image,
        FormatTag::Files,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            FormatTag::Text => "text",
            FormatTag::Html => "html",
            FormatTag::Rtf => "rtf",
            FormatTag::Image => "image",
            FormatTag::Files => "files",
            FormatTag::Custom(name) => name,
        }
    }

    /// Maps a name to a built-in tag. `rich_text` is accepted for RTF.
    pub fn builtin(name: &str) -> Option<FormatTag> {
        match name {
            "text" => Some(FormatTag::Text),
            "html" => Some(FormatTag::Html),
            "rtf" | "rich_text" => Some(FormatTag::Rtf),
            "image" => Some(FormatTag::Image),
            "files" => Some(FormatTag::Files),
            _ => None,
        }
    }
}

impl fmt::Display for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormatTag {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(FormatTag::builtin(s).unwrap_or_else(|| FormatTag::Custom(s.to_string())))
    }
}

impl From<String> for FormatTag {
    fn from(s: String) -> Self {
        FormatTag::builtin(&s).unwrap_or(FormatTag::Custom(s))
    }
}

impl From<FormatTag> for String {
    fn from(tag: FormatTag) -> Self {
        match tag {
            FormatTag::Custom(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

/// Image content, always PNG-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub size_bytes: u32,
    pub data: Vec<u8>,
}

impl ImageInfo {
    pub fn from_png(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            size_bytes: data.len() as u32,
            data,
        }
    }
}

/// A decoded payload for one format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatPayload {
    Text(String),
    Html(String),
    Rtf(String),
    Image(ImageInfo),
    Files(Vec<String>),
    Custom(Vec<u8>),
}

/// Everything readable from the clipboard at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipboardData {
    pub available_formats: Vec<FormatTag>,
    pub text: Option<String>,
    pub html: Option<String>,
    pub rtf: Option<String>,
    pub image: Option<ImageInfo>,
    pub files: Option<Vec<String>>,
    pub other: Option<BTreeMap<String, Vec<u8>>>,
    /// Milliseconds since the Unix epoch when the snapshot was assembled.
    pub captured_at_ms: u64,
}

impl ClipboardData {
    pub fn new() -> Self {
        Self {
            captured_at_ms: now_millis(),
            ..Self::default()
        }
    }

    pub fn has_format(&self, tag: &FormatTag) -> bool {
        self.available_formats.contains(tag)
    }

    /// Records that a format is present, keeping discovery order.
    pub fn push_format(&mut self, tag: FormatTag) {
        if !self.available_formats.contains(&tag) {
            self.available_formats.push(tag);
        }
    }

    /// Places a decoded payload into its field. The tag must already be listed.
    pub fn insert(&mut self, tag: &FormatTag, payload: FormatPayload) {
        match payload {
            FormatPayload::Text(text) => self.text = Some(text),
            FormatPayload::Html(html) => self.html = Some(html),
            FormatPayload::Rtf(rtf) => self.rtf = Some(rtf),
            FormatPayload::Image(image) => self.image = Some(image),
            FormatPayload::Files(files) => self.files = Some(files),
            FormatPayload::Custom(bytes) => {
                self.other
                    .get_or_insert_with(BTreeMap::new)
                    .insert(tag.as_str().to_string(), bytes);
            }
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_parse_builtin_names_and_aliases() {
        assert_eq!("text".parse::<FormatTag>().unwrap(), FormatTag::Text);
        assert_eq!("rich_text".parse::<FormatTag>().unwrap(), FormatTag::Rtf);
        assert_eq!(
            "application/x-demo".parse::<FormatTag>().unwrap(),
            FormatTag::Custom("application/x-demo".into())
        );
    }

    #[test]
    fn tags_deserialize_from_plain_strings() {
        #[derive(Deserialize)]
        struct Wrapper {
            tags: Vec<FormatTag>,
        }

        let parsed: Wrapper = toml::from_str(r#"tags = ["text", "rich_text", "x-demo"]"#).unwrap();
        assert_eq!(
            parsed.tags,
            vec![FormatTag::Text, FormatTag::Rtf, FormatTag::Custom("x-demo".into())]
        );
        assert_eq!(String::from(FormatTag::Image), "image");
    }

    #[test]
    fn push_format_keeps_first_occurrence_order() {
        let mut data = ClipboardData::new();
        data.push_format(FormatTag::Html);
        data.push_format(FormatTag::Text);
        data.push_format(FormatTag::Html);
        assert_eq!(data.available_formats, vec![FormatTag::Html, FormatTag::Text]);
    }

    #[test]
    fn custom_payloads_land_in_other() {
        let mut data = ClipboardData::new();
        let tag = FormatTag::Custom("x-demo".into());
        data.push_format(tag.clone());
        data.insert(&tag, FormatPayload::Custom(vec![1, 2, 3]));
        assert_eq!(data.other.unwrap().get("x-demo"), Some(&vec![1, 2, 3]));
    }
}
