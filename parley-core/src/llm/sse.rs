//! Server-sent event decoding for upstream streaming responses

use futures::Stream;
use tokio::io::AsyncBufReadExt;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::LinesStream;

use crate::error::{ParleyError, Result};

/// Turn a streaming HTTP response into the payloads of its `data:` lines.
///
/// Comment lines, `event:` lines and blank separators are skipped. A
/// transport failure surfaces as an upstream error item.
pub(crate) fn data_payloads(
    response: reqwest::Response,
) -> impl Stream<Item = Result<String>> + Send {
    // Convert response bytes to a stream of lines
    let bytes_stream = response.bytes_stream();
    let reader = tokio_util::io::StreamReader::new(
        bytes_stream.map(|r| r.map_err(std::io::Error::other)),
    );
    let lines = tokio::io::BufReader::new(reader).lines();

    LinesStream::new(lines).filter_map(|line_result| match line_result {
        Ok(line) => data_payload(&line).map(|data| Ok(data.to_string())),
        Err(e) => Some(Err(ParleyError::upstream(format!("Stream read error: {}", e)))),
    })
}

/// Extract the payload of a single SSE line, if it is a `data:` line.
pub(crate) fn data_payload(line: &str) -> Option<&str> {
    let data = line.strip_prefix("data:")?;
    Some(data.strip_prefix(' ').unwrap_or(data))
}
