//! Byte framing for the streaming response body

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParleyError;

/// How relay signals are encoded on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WireFormat {
    /// Raw fragments, errors inlined as `[erro]` lines
    #[default]
    #[serde(rename = "text")]
    PlainText,

    /// Server-sent events
    #[serde(rename = "sse")]
    EventStream,
}

impl WireFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            WireFormat::PlainText => "text/plain; charset=utf-8",
            WireFormat::EventStream => "text/event-stream",
        }
    }

    /// Pick a format from an `Accept` header value.
    ///
    /// Returns `None` when the header expresses no streaming preference.
    pub fn from_accept(accept: &str) -> Option<Self> {
        accept
            .split(',')
            .map(|part| part.split(';').next().unwrap_or("").trim())
            .any(|media| media.eq_ignore_ascii_case("text/event-stream"))
            .then_some(WireFormat::EventStream)
    }

    pub fn frame_chunk(&self, fragment: &str) -> String {
        match self {
            WireFormat::PlainText => fragment.to_string(),
            WireFormat::EventStream => {
                let mut frame = String::with_capacity(fragment.len() + 8);
                // CRLF, CR and LF all end an SSE line
                for line in fragment.split("\r\n").flat_map(|l| l.split(['\r', '\n'])) {
                    frame.push_str("data: ");
                    frame.push_str(line);
                    frame.push('\n');
                }
                frame.push('\n');
                frame
            }
        }
    }

    pub fn frame_error(&self, message: &str) -> String {
        match self {
            WireFormat::PlainText => format!("\n[erro] {}\n", message),
            WireFormat::EventStream => {
                // Keep the event on one data line so it cannot be split.
                let message = message.replace("\r\n", " ").replace(['\r', '\n'], " ");
                format!("event: error\ndata: {}\n\n", message)
            }
        }
    }

    /// End marker; plain text relies on the body closing.
    pub fn frame_end(&self) -> Option<String> {
        match self {
            WireFormat::PlainText => None,
            WireFormat::EventStream => Some("event: end\ndata: \n\n".to_string()),
        }
    }
}

impl FromStr for WireFormat {
    type Err = ParleyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" | "plain" | "text/plain" => Ok(WireFormat::PlainText),
            "sse" | "event-stream" | "text/event-stream" => Ok(WireFormat::EventStream),
            other => Err(ParleyError::Validation(format!(
                "Formato desconhecido: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for WireFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireFormat::PlainText => write!(f, "text"),
            WireFormat::EventStream => write!(f, "sse"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_framing() {
        let format = WireFormat::PlainText;
        assert_eq!(format.frame_chunk("Hel"), "Hel");
        assert_eq!(format.frame_chunk(""), "");
        assert_eq!(format.frame_error("falhou"), "\n[erro] falhou\n");
        assert_eq!(format.frame_end(), None);
        assert_eq!(format.content_type(), "text/plain; charset=utf-8");
    }

    #[test]
    fn test_event_stream_framing() {
        let format = WireFormat::EventStream;
        assert_eq!(format.frame_chunk("Hel"), "data: Hel\n\n");
        assert_eq!(format.frame_chunk("a\nb"), "data: a\ndata: b\n\n");
        assert_eq!(
            format.frame_chunk("a\rb\r\nc"),
            "data: a\ndata: b\ndata: c\n\n"
        );
        assert_eq!(
            format.frame_error("linha\rsolta"),
            "event: error\ndata: linha solta\n\n"
        );
        assert_eq!(
            format.frame_error("falhou\nfeio"),
            "event: error\ndata: falhou feio\n\n"
        );
        assert_eq!(format.frame_end().as_deref(), Some("event: end\ndata: \n\n"));
    }

    #[test]
    fn test_from_accept() {
        assert_eq!(
            WireFormat::from_accept("text/event-stream"),
            Some(WireFormat::EventStream)
        );
        assert_eq!(
            WireFormat::from_accept("text/html, Text/Event-Stream;q=0.9"),
            Some(WireFormat::EventStream)
        );
        assert_eq!(WireFormat::from_accept("*/*"), None);
        assert_eq!(WireFormat::from_accept(""), None);
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!("sse".parse::<WireFormat>().unwrap(), WireFormat::EventStream);
        assert_eq!(" TEXT ".parse::<WireFormat>().unwrap(), WireFormat::PlainText);
        assert!("xml".parse::<WireFormat>().is_err());
        assert_eq!(WireFormat::EventStream.to_string(), "sse");
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(
            serde_json::to_string(&WireFormat::EventStream).unwrap(),
            "\"sse\""
        );
        let format: WireFormat = serde_json::from_str("\"text\"").unwrap();
        assert_eq!(format, WireFormat::PlainText);
    }
}
