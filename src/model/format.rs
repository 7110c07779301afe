//! Wire formats for parameter values and their mapping from MIME types.

use thiserror::Error;

/// How the raw bytes of a parameter value are encoded.
///
/// `Xml` is reserved: the MIME mapping produces it, but no parameter
/// type decodes it, so XML request bodies are answered with 415.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueFormat {
    Text,
    Json,
    Binary,
    Xml,
}

/// A `Content-Type` header value that does not parse as `type/subtype`.
#[derive(Debug, Error)]
#[error("malformed media type: {0:?}")]
pub struct MediaTypeError(pub String);

/// Extract the lower-cased `type/subtype` essence from a Content-Type
/// header value, dropping any parameters.
pub fn parse_media_type(value: &str) -> Result<String, MediaTypeError> {
    let essence = value
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    let mut parts = essence.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(main), Some(sub), None)
            if !main.is_empty()
                && !sub.is_empty()
                && !essence.contains(char::is_whitespace) =>
        {
            Ok(essence)
        }
        _ => Err(MediaTypeError(value.to_string())),
    }
}

/// Select the value format for a media type essence.
pub fn format_for_media_type(media_type: &str) -> ValueFormat {
    match media_type {
        "application/xml" | "text/xml" => ValueFormat::Xml,
        "application/json" => ValueFormat::Json,
        "application/octet-stream" => ValueFormat::Binary,
        "text/plain" | "application/javascript" | "text/javascript" | "application/rtf"
        | "application/sql" => ValueFormat::Text,
        other => match other.split_once('/') {
            Some(("text", _)) => ValueFormat::Text,
            Some(("audio" | "video" | "image", _)) => ValueFormat::Binary,
            _ => ValueFormat::Binary,
        },
    }
}
