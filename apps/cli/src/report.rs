use clipwatch_core::ClipboardData;
use serde_json::{json, Map, Value};

const PREVIEW_CHARS: usize = 80;

/// One-line JSON description of a clipboard payload. Large contents are
/// summarized rather than printed.
pub fn summarize(data: &ClipboardData) -> Value {
    let mut out = Map::new();
    out.insert("captured_at_ms".into(), json!(data.captured_at_ms));
    out.insert("formats".into(), json!(data.available_formats));

    for (key, value) in [("text", &data.text), ("html", &data.html), ("rtf", &data.rtf)] {
        if let Some(value) = value {
            out.insert(key.into(), json!(preview(value)));
        }
    }
    if let Some(image) = &data.image {
        out.insert(
            "image".into(),
            json!({
                "width": image.width,
                "height": image.height,
                "size_bytes": image.size_bytes,
            }),
        );
    }
    if let Some(files) = &data.files {
        out.insert("files".into(), json!(files));
    }
    if let Some(other) = &data.other {
        let sizes: Map<String, Value> = other
            .iter()
            .map(|(name, bytes)| (name.clone(), json!(bytes.len())))
            .collect();
        out.insert("custom".into(), Value::Object(sizes));
    }
    Value::Object(out)
}

fn preview(value: &str) -> String {
    let mut chars = value.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}…", head)
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipwatch_core::{FormatTag, ImageInfo};
    use std::collections::BTreeMap;

    #[test]
    fn summary_lists_formats_and_sizes() {
        let mut data = ClipboardData::new();
        data.available_formats = vec![
            FormatTag::Text,
            FormatTag::Image,
            FormatTag::Custom("x-demo".into()),
        ];
        data.text = Some("Hello, World!".into());
        data.image = Some(ImageInfo::from_png(4, 2, vec![0; 10]));
        data.other = Some(BTreeMap::from([("x-demo".to_string(), vec![1, 2, 3])]));

        let summary = summarize(&data);
        assert_eq!(summary["formats"], json!(["text", "image", "x-demo"]));
        assert_eq!(summary["text"], json!("Hello, World!"));
        assert_eq!(summary["image"]["size_bytes"], json!(10));
        assert_eq!(summary["custom"]["x-demo"], json!(3));
        assert!(summary.get("html").is_none());
    }

    #[test]
    fn long_text_is_truncated() {
        let long = "é".repeat(PREVIEW_CHARS + 5);
        let shown = preview(&long);
        assert_eq!(shown.chars().count(), PREVIEW_CHARS + 1);
        assert!(shown.ends_with('…'));
        assert_eq!(preview("short"), "short");
    }
}
