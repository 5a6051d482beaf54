//! MIME-type knowledge shared by clipboard backends that deal in raw
//! offers rather than typed accessors.

use crate::DecodeError;
use clipwatch_core::{FormatPayload, FormatTag, ImageInfo};
use image::ImageFormat;
use percent_encoding::percent_decode_str;
use std::io::Cursor;

const TEXT_MIMES: &[&str] = &[
    "text/plain;charset=utf-8",
    "text/plain",
    "utf8_string",
    "string",
    "text",
];

const IMAGE_MIMES: &[&str] = &["image/png", "image/jpeg", "image/gif", "image/bmp", "image/webp"];

/// Built-in tag for a MIME type, if it is one we decode.
pub fn tag_for_mime(mime: &str) -> Option<FormatTag> {
    let mime = normalize(mime);
    if TEXT_MIMES.contains(&mime.as_str()) {
        return Some(FormatTag::Text);
    }
    if IMAGE_MIMES.contains(&mime.as_str()) {
        return Some(FormatTag::Image);
    }
    match mime.as_str() {
        "text/html" => Some(FormatTag::Html),
        "text/rtf" | "application/rtf" => Some(FormatTag::Rtf),
        "text/uri-list" => Some(FormatTag::Files),
        _ => None,
    }
}

/// Tags for an offered MIME list, deduplicated in offer order. Custom tags
/// are reported only when registered and offered verbatim.
pub fn tags_for_offer(offered: &[String], custom: &[FormatTag]) -> Vec<FormatTag> {
    let mut tags: Vec<FormatTag> = Vec::new();
    for mime in offered {
        let tag = tag_for_mime(mime).or_else(|| {
            custom
                .iter()
                .find(|tag| tag.as_str() == mime.as_str())
                .cloned()
        });
        if let Some(tag) = tag {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
    }
    tags
}

/// Picks the offered MIME type to request for `tag`. Types listed in
/// `priority` win in that order; the rest keep their offer order.
pub fn preferred_mime<'a>(
    tag: &FormatTag,
    offered: &'a [String],
    priority: &[String],
) -> Option<&'a str> {
    let rank = |mime: &str| {
        let mime = normalize(mime);
        priority
            .iter()
            .position(|p| normalize(p) == mime)
            .unwrap_or(usize::MAX)
    };

    offered
        .iter()
        .filter(|mime| match tag {
            FormatTag::Custom(name) => *mime == name,
            builtin => tag_for_mime(mime).as_ref() == Some(builtin),
        })
        .min_by_key(|mime| rank(mime.as_str()))
        .map(String::as_str)
}

/// Decodes the raw bytes received for `tag`.
pub fn decode_payload(tag: &FormatTag, bytes: Vec<u8>) -> Result<FormatPayload, DecodeError> {
    let utf8 = |bytes: Vec<u8>| {
        String::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8(tag.clone()))
    };
    match tag {
        FormatTag::Text => utf8(bytes).map(FormatPayload::Text),
        FormatTag::Html => utf8(bytes).map(FormatPayload::Html),
        FormatTag::Rtf => utf8(bytes).map(FormatPayload::Rtf),
        FormatTag::Image => png_image(&bytes).map(FormatPayload::Image),
        FormatTag::Files => parse_uri_list(&bytes).map(FormatPayload::Files),
        FormatTag::Custom(_) => Ok(FormatPayload::Custom(bytes)),
    }
}

/// Decodes any supported image and returns it PNG-encoded with its size.
pub fn png_image(bytes: &[u8]) -> Result<ImageInfo, DecodeError> {
    let format = image::guess_format(bytes).map_err(|e| DecodeError::Image(e.to_string()))?;
    let decoded = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| DecodeError::Image(e.to_string()))?;
    let (width, height) = (decoded.width(), decoded.height());

    if format == ImageFormat::Png {
        return Ok(ImageInfo::from_png(width, height, bytes.to_vec()));
    }

    let mut png = Vec::new();
    decoded
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| DecodeError::Image(format!("PNG encode failed: {}", e)))?;
    Ok(ImageInfo::from_png(width, height, png))
}

/// Parses a `text/uri-list` body (RFC 2483) into local file paths.
pub fn parse_uri_list(bytes: &[u8]) -> Result<Vec<String>, DecodeError> {
    let body = std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8(FormatTag::Files))?;
    let files = body
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(file_uri_path)
        .collect();
    Ok(files)
}

fn file_uri_path(uri: &str) -> Option<String> {
    let rest = uri.strip_prefix("file://")?;
    // Skip the authority; an empty host leaves the leading '/' in place.
    let path = &rest[rest.find('/')?..];
    percent_decode_str(path)
        .decode_utf8()
        .ok()
        .map(|decoded| decoded.into_owned())
}

fn normalize(mime: &str) -> String {
    mime.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};

    fn offered(mimes: &[&str]) -> Vec<String> {
        mimes.iter().map(|m| m.to_string()).collect()
    }

    fn encoded(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let img = ImageBuffer::from_pixel(width, height, Rgba([200u8, 10, 10, 255]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .to_rgb8()
            .write_to(&mut Cursor::new(&mut buf), format)
            .unwrap();
        buf
    }

    #[test]
    fn maps_common_mime_types() {
        assert_eq!(tag_for_mime("text/plain;charset=utf-8"), Some(FormatTag::Text));
        assert_eq!(tag_for_mime("text/plain; charset=UTF-8"), Some(FormatTag::Text));
        assert_eq!(tag_for_mime("UTF8_STRING"), Some(FormatTag::Text));
        assert_eq!(tag_for_mime("text/html"), Some(FormatTag::Html));
        assert_eq!(tag_for_mime("application/rtf"), Some(FormatTag::Rtf));
        assert_eq!(tag_for_mime("image/jpeg"), Some(FormatTag::Image));
        assert_eq!(tag_for_mime("text/uri-list"), Some(FormatTag::Files));
        assert_eq!(tag_for_mime("SAVE_TARGETS"), None);
    }

    #[test]
    fn offer_tags_are_deduplicated_and_include_registered_customs() {
        let custom = vec![FormatTag::Custom("application/x-demo".into())];
        let tags = tags_for_offer(
            &offered(&[
                "text/html",
                "text/plain",
                "UTF8_STRING",
                "application/x-demo",
                "application/x-unregistered",
            ]),
            &custom,
        );
        assert_eq!(
            tags,
            vec![
                FormatTag::Html,
                FormatTag::Text,
                FormatTag::Custom("application/x-demo".into())
            ]
        );
    }

    #[test]
    fn preferred_mime_follows_priority_then_offer_order() {
        let offer = offered(&["STRING", "text/plain", "text/plain;charset=utf-8"]);
        let priority = offered(&["text/plain;charset=utf-8", "text/plain"]);
        assert_eq!(
            preferred_mime(&FormatTag::Text, &offer, &priority),
            Some("text/plain;charset=utf-8")
        );
        assert_eq!(preferred_mime(&FormatTag::Text, &offer, &[]), Some("STRING"));
        assert_eq!(preferred_mime(&FormatTag::Html, &offer, &priority), None);
    }

    #[test]
    fn uri_lists_become_decoded_paths() {
        let body = b"# copied by a file manager\r\nfile:///home/me/My%20Notes.txt\r\nfile://localhost/tmp/a.png\r\nhttps://example.com/x\r\n\r\n";
        assert_eq!(
            parse_uri_list(body).unwrap(),
            vec!["/home/me/My Notes.txt".to_string(), "/tmp/a.png".to_string()]
        );
    }

    #[test]
    fn text_decoding_rejects_invalid_utf8() {
        assert_eq!(
            decode_payload(&FormatTag::Html, vec![0xff, 0xfe]),
            Err(DecodeError::InvalidUtf8(FormatTag::Html))
        );
        assert_eq!(
            decode_payload(&FormatTag::Text, b"Hello, World!".to_vec()),
            Ok(FormatPayload::Text("Hello, World!".into()))
        );
    }

    #[test]
    fn png_passes_through_with_dimensions() {
        let png = encoded(3, 2, ImageFormat::Png);
        let info = png_image(&png).unwrap();
        assert_eq!((info.width, info.height), (3, 2));
        assert_eq!(info.data, png);
        assert_eq!(info.size_bytes as usize, png.len());
    }

    #[test]
    fn other_images_are_reencoded_as_png() {
        let bmp = encoded(4, 5, ImageFormat::Bmp);
        let info = png_image(&bmp).unwrap();
        assert_eq!((info.width, info.height), (4, 5));
        assert_eq!(image::guess_format(&info.data).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn corrupt_images_fail_to_decode() {
        let mut png = encoded(2, 2, ImageFormat::Png);
        png.truncate(20);
        assert!(matches!(png_image(&png), Err(DecodeError::Image(_))));
    }
}
