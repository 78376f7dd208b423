//! Character set detection for downloaded pages
//!
//! The encoding of a page is taken from, in order:
//! - A byte order mark
//! - The `charset` parameter of the Content-Type header
//! - A `<meta>` declaration within the first 1024 bytes
//! - UTF-8 otherwise

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};

/// How far into the body `<meta>` declarations are looked for
const PRESCAN_LIMIT: usize = 1024;

/// Picks the encoding of an HTML body
///
/// # Example
///
/// ```
/// use webmirror::crawler::detect_encoding;
///
/// let body = b"<meta charset=\"windows-1251\">";
/// assert_eq!(detect_encoding(body, Some("text/html")).name(), "windows-1251");
/// assert_eq!(detect_encoding(body, Some("text/html; charset=koi8-r")).name(), "KOI8-R");
/// ```
pub fn detect_encoding(body: &[u8], content_type: Option<&str>) -> &'static Encoding {
    if let Some((encoding, _)) = Encoding::for_bom(body) {
        return encoding;
    }
    content_type
        .and_then(header_charset)
        .or_else(|| prescan(body))
        .unwrap_or(UTF_8)
}

/// Decodes an HTML body to a string
///
/// Malformed sequences become U+FFFD.
pub fn decode_html(body: &[u8], content_type: Option<&str>) -> String {
    let encoding = detect_encoding(body, content_type);
    let (text, _, had_errors) = encoding.decode(body);
    if had_errors {
        tracing::debug!("Malformed {} sequences replaced", encoding.name());
    }
    text.into_owned()
}

/// Reads the `charset` parameter of a Content-Type value
fn header_charset(content_type: &str) -> Option<&'static Encoding> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("charset") {
            return None;
        }
        let label = value.trim().trim_matches(|c| c == '"' || c == '\'');
        Encoding::for_label(label.as_bytes())
    })
}

/// Looks for a charset in the `<meta>` tags at the start of the body
///
/// Covers both `<meta charset=...>` and the `content` attribute of
/// `<meta http-equiv="Content-Type">`.
fn prescan(body: &[u8]) -> Option<&'static Encoding> {
    let head = &body[..body.len().min(PRESCAN_LIMIT)];
    let head = head.to_ascii_lowercase();

    let mut rest = head.as_slice();
    while let Some(start) = find(rest, b"<meta") {
        let tag = &rest[start + 5..];
        let end = tag.iter().position(|&b| b == b'>').unwrap_or(tag.len());
        if let Some(encoding) = meta_charset(&tag[..end]) {
            // A page readable as ASCII can't really be UTF-16
            return Some(if encoding == UTF_16LE || encoding == UTF_16BE {
                UTF_8
            } else {
                encoding
            });
        }
        rest = &tag[end..];
    }
    None
}

fn meta_charset(tag: &[u8]) -> Option<&'static Encoding> {
    let mut rest = tag;
    while let Some(pos) = find(rest, b"charset") {
        rest = &rest[pos + 7..];
        let value = skip_space(rest);
        let Some(value) = value.strip_prefix(b"=") else {
            continue;
        };
        let value = skip_space(value);
        let value = value
            .strip_prefix(b"\"")
            .or_else(|| value.strip_prefix(b"'"))
            .unwrap_or(value);
        let len = value
            .iter()
            .position(|&b| matches!(b, b'"' | b'\'' | b';' | b'/' | b'>') || b.is_ascii_whitespace())
            .unwrap_or(value.len());
        if let Some(encoding) = Encoding::for_label(&value[..len]) {
            return Some(encoding);
        }
    }
    None
}

fn skip_space(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    &bytes[start..]
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
