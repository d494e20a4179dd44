//! Minimal XML handling for the two documents the tool exchanges with the service:
//! the Find Blobs by Tags response and the Set Blob Tags request body.

use super::error::{Error, Result};
use super::FindPage;
use crate::{BlobRef, Tags};

/// Escape special characters for XML text.
pub fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Reverse of [`xml_escape`], plus numeric character references. Unknown entities are kept verbatim.
pub fn xml_unescape(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let Some(semi) = tail.find(';') else {
            out.push_str(tail);
            return out;
        };
        let entity = &tail[1..semi];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|d| d.parse().ok()))
                .and_then(char::from_u32),
        };
        match decoded {
            Some(c) => out.push(c),
            None => out.push_str(&tail[..=semi]),
        }
        rest = &tail[semi + 1..];
    }
    out.push_str(rest);
    out
}

/// Locate the first `<tag ...>text</tag>` (or self-closing `<tag/>`) in `s`.
/// Returns the raw inner text and the byte offset just past the element.
fn find_element<'a>(s: &'a str, tag: &str) -> Option<(&'a str, usize)> {
    let open = format!("<{tag}");
    let mut search_from = 0;
    loop {
        let start = s[search_from..].find(&open)? + search_from;
        let after_name = start + open.len();
        match s[after_name..].chars().next() {
            Some('>' | '/' | ' ' | '\t' | '\r' | '\n') => {}
            _ => {
                search_from = after_name;
                continue;
            }
        }
        let gt = s[after_name..].find('>')? + after_name;
        if s[..gt].ends_with('/') {
            return Some(("", gt + 1));
        }
        let close = format!("</{tag}>");
        let text_start = gt + 1;
        let end = s[text_start..].find(&close)? + text_start;
        return Some((&s[text_start..end], end + close.len()));
    }
}

fn element_text(s: &str, tag: &str) -> Option<String> {
    find_element(s, tag).map(|(text, _)| xml_unescape(text.trim()))
}

/// Parse a Find Blobs by Tags `EnumerationResults` document.
/// `fallback_container` fills in blobs that carry no `ContainerName` (container-scoped queries).
pub fn parse_find_page(body: &str, fallback_container: Option<&str>) -> Result<FindPage> {
    if !body.contains("<EnumerationResults") {
        return Err(Error::Xml("missing EnumerationResults element".to_string()));
    }

    let mut blobs = Vec::new();
    if let Some((blobs_xml, _)) = find_element(body, "Blobs") {
        let mut rest = blobs_xml;
        while let Some((blob_xml, next)) = find_element(rest, "Blob") {
            let name = element_text(blob_xml, "Name")
                .filter(|n| !n.is_empty())
                .ok_or_else(|| Error::Xml("Blob without Name".to_string()))?;
            let container = element_text(blob_xml, "ContainerName")
                .filter(|c| !c.is_empty())
                .or_else(|| fallback_container.map(str::to_string))
                .ok_or_else(|| Error::Xml(format!("Blob '{name}' without ContainerName")))?;
            blobs.push(BlobRef::new(container, name));
            rest = &rest[next..];
        }
    }

    let next_marker = element_text(body, "NextMarker").filter(|m| !m.is_empty());
    Ok(FindPage { blobs, next_marker })
}

/// Request body for Set Blob Tags. An empty map produces an empty `TagSet` (clears tags).
pub fn tags_body(tags: &Tags) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?><Tags><TagSet>");
    for (key, value) in tags {
        out.push_str("<Tag><Key>");
        out.push_str(&xml_escape(key));
        out.push_str("</Key><Value>");
        out.push_str(&xml_escape(value));
        out.push_str("</Value></Tag>");
    }
    out.push_str("</TagSet></Tags>");
    out
}
