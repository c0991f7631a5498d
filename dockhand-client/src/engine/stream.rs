//! Progress stream draining
//!
//! Pull, build and push return a stream of JSON progress messages. The
//! transfer only counts as complete once the whole stream has been read;
//! errors can arrive inside the stream with a 200 status. Every streaming
//! engine call goes through [`drain`], which reads to the end (even after an
//! in-stream error) so the response is released on every path.

use dockhand_core::dto::engine::StreamMessage;
use futures_util::{Stream, StreamExt};
use tracing::debug;

use crate::error::{ClientError, Result};

/// What a fully drained progress stream reported
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamSummary {
    /// Number of JSON messages read
    pub messages: usize,
    /// Last status or build output line
    pub last_status: Option<String>,
    /// Image ID announced by a build (`aux.ID`)
    pub image_id: Option<String>,
    /// First error reported in the stream
    error: Option<String>,
}

impl StreamSummary {
    fn record(&mut self, message: StreamMessage) {
        self.messages += 1;

        if let Some(error) = message.error_text() {
            debug!("Stream error message: {}", error);
            if self.error.is_none() {
                self.error = Some(error.to_string());
            }
        }

        let line = message.status.or(message.stream);
        if let Some(line) = line.map(|l| l.trim().to_string()).filter(|l| !l.is_empty()) {
            self.last_status = Some(line);
        }

        if let Some(id) = message
            .aux
            .as_ref()
            .and_then(|aux| aux.get("ID"))
            .and_then(|id| id.as_str())
        {
            self.image_id = Some(id.to_string());
        }
    }

    /// Parses every complete message in `buf`, returning the bytes consumed
    fn absorb(&mut self, buf: &[u8]) -> Result<usize> {
        let mut messages = serde_json::Deserializer::from_slice(buf).into_iter::<StreamMessage>();
        let mut consumed = 0;

        loop {
            match messages.next() {
                Some(Ok(message)) => {
                    consumed = messages.byte_offset();
                    self.record(message);
                }
                // Message split across chunks; wait for the rest
                Some(Err(e)) if e.is_eof() => break,
                Some(Err(e)) => {
                    return Err(ClientError::ParseError(format!(
                        "malformed progress message: {}",
                        e
                    )));
                }
                None => {
                    consumed = buf.len();
                    break;
                }
            }
        }

        Ok(consumed)
    }
}

/// Drains an engine progress response to the end
pub(crate) async fn drain(response: reqwest::Response) -> Result<StreamSummary> {
    drain_chunks(response.bytes_stream()).await
}

/// Drains a stream of body chunks to the end
///
/// Fails with [`ClientError::IncompleteStream`] if the body breaks off or ends
/// mid-message, and with [`ClientError::Stream`] if the engine reported an
/// error in any message. After a malformed message the rest of the body is
/// still read, then discarded, and [`ClientError::ParseError`] is returned.
pub async fn drain_chunks<S, B, E>(chunks: S) -> Result<StreamSummary>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut chunks = std::pin::pin!(chunks);
    let mut summary = StreamSummary::default();
    let mut pending: Vec<u8> = Vec::new();
    let mut malformed: Option<ClientError> = None;

    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.map_err(|e| ClientError::IncompleteStream(e.to_string()))?;
        if malformed.is_some() {
            continue;
        }
        pending.extend_from_slice(chunk.as_ref());
        match summary.absorb(&pending) {
            Ok(consumed) => {
                pending.drain(..consumed);
            }
            Err(e) => {
                malformed = Some(e);
                pending.clear();
            }
        }
    }

    if let Some(e) = malformed {
        return Err(e);
    }

    if !pending.iter().all(u8::is_ascii_whitespace) {
        return Err(ClientError::IncompleteStream(
            "stream ended in the middle of a message".to_string(),
        ));
    }

    debug!("Drained {} progress message(s)", summary.messages);

    match summary.error.take() {
        Some(error) => Err(ClientError::Stream(error)),
        None => Ok(summary),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    fn chunks(parts: &[&'static str]) -> impl Stream<Item = std::result::Result<&'static [u8], String>> {
        stream::iter(parts.iter().map(|p| Ok(p.as_bytes())).collect::<Vec<_>>())
    }

    #[tokio::test]
    async fn test_drains_progress_messages() {
        let summary = drain_chunks(chunks(&[
            "{\"status\":\"Pulling from agent\"}\r\n",
            "{\"status\":\"Downloading\",\"progressDetail\":{\"current\":10}}\r\n",
            "{\"status\":\"Status: Downloaded newer image\"}\r\n",
        ]))
        .await
        .unwrap();
        assert_eq!(summary.messages, 3);
        assert_eq!(
            summary.last_status.as_deref(),
            Some("Status: Downloaded newer image")
        );
    }

    #[tokio::test]
    async fn test_message_split_across_chunks() {
        let summary = drain_chunks(chunks(&["{\"stat", "us\":\"Done\"}", "\n"]))
            .await
            .unwrap();
        assert_eq!(summary.messages, 1);
        assert_eq!(summary.last_status.as_deref(), Some("Done"));
    }

    #[tokio::test]
    async fn test_in_stream_error_fails_after_draining() {
        let err = drain_chunks(chunks(&[
            "{\"status\":\"Pulling\"}\n",
            "{\"error\":\"manifest unknown\",\"errorDetail\":{\"message\":\"manifest unknown\"}}\n",
            "{\"status\":\"trailing\"}\n",
        ]))
        .await
        .unwrap_err();
        assert!(matches!(err, ClientError::Stream(ref m) if m == "manifest unknown"));
    }

    #[tokio::test]
    async fn test_broken_body_is_incomplete() {
        let parts: Vec<std::result::Result<&'static [u8], String>> = vec![
            Ok(&b"{\"status\":\"Downloading\"}\n"[..]),
            Err("connection reset".to_string()),
        ];
        let err = drain_chunks(stream::iter(parts)).await.unwrap_err();
        assert!(matches!(err, ClientError::IncompleteStream(_)));
    }

    #[tokio::test]
    async fn test_truncated_message_is_incomplete() {
        let err = drain_chunks(chunks(&["{\"status\":\"Down"])).await.unwrap_err();
        assert!(matches!(err, ClientError::IncompleteStream(_)));
    }

    #[tokio::test]
    async fn test_build_reports_image_id() {
        let summary = drain_chunks(chunks(&[
            "{\"stream\":\"Step 1/2 : FROM alpine\\n\"}\n",
            "{\"aux\":{\"ID\":\"sha256:feedface\"}}\n",
            "{\"stream\":\"Successfully built feedface\\n\"}\n",
        ]))
        .await
        .unwrap();
        assert_eq!(summary.image_id.as_deref(), Some("sha256:feedface"));
        assert_eq!(
            summary.last_status.as_deref(),
            Some("Successfully built feedface")
        );
    }

    #[tokio::test]
    async fn test_malformed_message_still_drains_body() {
        let read = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = read.clone();
        let body = chunks(&[
            "{\"status\":\"Pulling\"}\n",
            "not json\n",
            "{\"status\":\"Downloading\"}\n",
            "{\"status\":\"Done\"}\n",
        ])
        .inspect(move |_| {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });

        let err = drain_chunks(body).await.unwrap_err();
        assert!(matches!(err, ClientError::ParseError(_)));
        assert_eq!(read.load(std::sync::atomic::Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_garbage_is_parse_error() {
        let err = drain_chunks(chunks(&["<html>bad gateway</html>"])).await.unwrap_err();
        assert!(matches!(err, ClientError::ParseError(_)));
    }
}
