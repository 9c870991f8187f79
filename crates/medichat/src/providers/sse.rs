use bytes::Bytes;
use reqwest::Response;
use thiserror::Error;

use crate::errors::ProviderError;
use crate::text::{InvalidUtf8, Utf8Chunks};

#[derive(Error, Debug)]
pub enum SseError {
    #[error("Reading stream chunk failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Encoding(#[from] InvalidUtf8),

    #[error("Stream ended in the middle of an event")]
    Truncated,
}

impl From<SseError> for ProviderError {
    fn from(error: SseError) -> Self {
        match error {
            SseError::Transport(e) => ProviderError::Transport(e),
            other => ProviderError::malformed(other.to_string()),
        }
    }
}

/// Where the bytes come from. Tests script the stream with a queue instead of
/// standing up an HTTP server.
enum ByteSource {
    Http(Response),
    #[cfg(test)]
    Scripted(std::collections::VecDeque<Bytes>),
}

impl ByteSource {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, SseError> {
        match self {
            ByteSource::Http(response) => Ok(response.chunk().await?),
            #[cfg(test)]
            ByteSource::Scripted(queue) => Ok(queue.pop_front()),
        }
    }
}

/// Reads server-sent events off a chunked byte stream.
///
/// Chunk boundaries fall anywhere, including inside a multi-byte character in
/// the event payload, so bytes pass through an incremental UTF-8 decoder
/// before event parsing. Events are delimited by a blank line in either LF or
/// CRLF form. Only `data` fields are surfaced; comments and other fields are
/// skipped.
pub struct SseReader {
    source: ByteSource,
    decoder: Utf8Chunks,
    buf: String,
}

impl SseReader {
    pub fn from_response(response: Response) -> Self {
        Self::new(ByteSource::Http(response))
    }

    #[cfg(test)]
    pub fn from_chunks(chunks: Vec<Bytes>) -> Self {
        Self::new(ByteSource::Scripted(chunks.into()))
    }

    fn new(source: ByteSource) -> Self {
        SseReader {
            source,
            decoder: Utf8Chunks::new(),
            buf: String::new(),
        }
    }

    /// The data of the next event, or `None` once the stream is cleanly
    /// exhausted. Ending mid-event or mid-character is an error.
    pub async fn next_event(&mut self) -> Result<Option<String>, SseError> {
        loop {
            while let Some(block) = self.take_block() {
                if let Some(data) = parse_block(&block) {
                    return Ok(Some(data));
                }
            }
            match self.source.next_chunk().await? {
                Some(bytes) => {
                    let text = self.decoder.push(&bytes)?;
                    self.buf.push_str(&text);
                }
                None => {
                    self.decoder.finish()?;
                    if self.buf.trim().is_empty() {
                        return Ok(None);
                    }
                    return Err(SseError::Truncated);
                }
            }
        }
    }

    /// Pop the next complete event block off the buffer, delimiter excluded.
    fn take_block(&mut self) -> Option<String> {
        let lf = self.buf.find("\n\n").map(|idx| (idx, 2));
        let crlf = self.buf.find("\r\n\r\n").map(|idx| (idx, 4));
        let (end, delimiter) = match (lf, crlf) {
            (Some(lf), Some(crlf)) => {
                if crlf.0 < lf.0 {
                    crlf
                } else {
                    lf
                }
            }
            (lf, crlf) => lf.or(crlf)?,
        };
        let block = self.buf[..end].to_owned();
        self.buf.drain(..end + delimiter);
        Some(block)
    }
}

/// Join the `data` lines of one event block. `None` when the block carries no
/// data at all, e.g. a keep-alive comment.
fn parse_block(block: &str) -> Option<String> {
    let mut data: Option<String> = None;
    for line in block.lines() {
        if line.starts_with(':') {
            continue;
        }
        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        if field != "data" {
            continue;
        }
        let value = value.strip_prefix(' ').unwrap_or(value);
        match data.as_mut() {
            Some(data) => {
                data.push('\n');
                data.push_str(value);
            }
            None => data = Some(value.to_owned()),
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_consecutive_events() {
        let mut sse = SseReader::from_chunks(vec![
            Bytes::from_static(b"data: hello\n\n"),
            Bytes::from_static(b"data: bye\n\n"),
        ]);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "hello");
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "bye");
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn reads_multiple_events_from_one_chunk() {
        let mut sse = SseReader::from_chunks(vec![Bytes::from_static(
            b"data: one\n\ndata: two\n\ndata: three\n\n",
        )]);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "one");
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "two");
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "three");
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn reassembles_event_split_across_chunks() {
        let mut sse = SseReader::from_chunks(vec![
            Bytes::from_static(b"data:"),
            Bytes::from_static(b" hello\n"),
            Bytes::from_static(b"\n"),
        ]);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "hello");
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn handles_crlf_delimiters() {
        let mut sse = SseReader::from_chunks(vec![Bytes::from_static(
            b"data: first\r\n\r\ndata: second\r\n\r\n",
        )]);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "first");
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "second");
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn reassembles_multibyte_character_split_across_chunks() {
        let payload = "data: 허리\n\n".as_bytes();
        // Split inside the first Korean character.
        let mut sse = SseReader::from_chunks(vec![
            Bytes::copy_from_slice(&payload[..8]),
            Bytes::copy_from_slice(&payload[8..]),
        ]);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "허리");
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn skips_comments_and_unknown_fields() {
        let mut sse = SseReader::from_chunks(vec![Bytes::from_static(
            b": keep-alive\n\nevent: ping\nretry: 100\n\ndata: real\n\n",
        )]);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "real");
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn truncated_event_is_an_error() {
        let mut sse = SseReader::from_chunks(vec![Bytes::from_static(b"data: no terminator\n")]);
        assert!(matches!(
            sse.next_event().await.unwrap_err(),
            SseError::Truncated
        ));
    }

    #[tokio::test]
    async fn truncated_character_is_an_error() {
        let payload = "data: 허\n\n".as_bytes();
        let mut sse = SseReader::from_chunks(vec![Bytes::copy_from_slice(&payload[..7])]);
        assert!(matches!(
            sse.next_event().await.unwrap_err(),
            SseError::Encoding(_)
        ));
    }
}
