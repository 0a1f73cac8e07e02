//! Shared quick-xml plumbing for the context pass and the fact pass.

use crate::error::{Result, XbrlError};
use quick_xml::Reader;
use quick_xml::events::{BytesCData, BytesStart, BytesText};

/// Build a reader tolerant of the XHTML found in inline XBRL documents.
pub(crate) fn reader(text: &str) -> Reader<&[u8]> {
    let mut reader = Reader::from_str(text);
    let config = reader.config_mut();
    config.trim_text(true);
    config.check_end_names = false;
    config.allow_unmatched_ends = true;
    reader
}

/// Current byte offset of the reader into the source text.
pub(crate) fn offset(reader: &Reader<&[u8]>) -> Result<usize> {
    usize::try_from(reader.buffer_position())
        .map_err(|e| XbrlError::XmlParse(format!("Offset out of range: {}", e)))
}

/// Local (unprefixed) element name.
pub(crate) fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

/// Qualified element name as written in the source.
pub(crate) fn qualified_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

/// All well-formed attributes of an element, keyed by their qualified name.
pub(crate) fn attributes(e: &BytesStart<'_>) -> Vec<(String, String)> {
    e.attributes()
        .flatten()
        .map(|attr| {
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
            (key, value)
        })
        .collect()
}

/// Look up an attribute by local name, ignoring any namespace prefix.
pub(crate) fn find_attribute<'a>(attrs: &'a [(String, String)], local: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(key, _)| strip_prefix(key) == local)
        .map(|(_, value)| value.as_str())
}

/// Text content with entities expanded where possible.
pub(crate) fn text(t: &BytesText<'_>) -> String {
    t.unescape()
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| String::from_utf8_lossy(t).into_owned())
}

/// CDATA content as text.
pub(crate) fn cdata(c: &BytesCData<'_>) -> String {
    String::from_utf8_lossy(c).into_owned()
}

/// Drop a `prefix:` from a qualified name.
pub(crate) fn strip_prefix(name: &str) -> &str {
    name.split_once(':').map_or(name, |(_, local)| local)
}

/// Split a qualified name into `(prefix, local)`.
pub(crate) fn split_qname(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_qname() {
        assert_eq!(split_qname("us-gaap:Assets"), (Some("us-gaap"), "Assets"));
        assert_eq!(split_qname("Assets"), (None, "Assets"));
        assert_eq!(strip_prefix("xsi:nil"), "nil");
    }

    #[test]
    fn test_find_attribute_ignores_prefix() {
        let attrs = vec![
            ("contextRef".to_string(), "FY2024".to_string()),
            ("xsi:nil".to_string(), "true".to_string()),
        ];
        assert_eq!(find_attribute(&attrs, "contextRef"), Some("FY2024"));
        assert_eq!(find_attribute(&attrs, "nil"), Some("true"));
        assert_eq!(find_attribute(&attrs, "unitRef"), None);
    }
}
