//! Line-delimited JSON-RPC framer (spec §4.1).
//!
//! Two halves: [`MessageReader`] tolerates malformed lines (logs and skips
//! rather than tearing down the connection) and treats EOF as an orderly
//! shutdown signal; [`PeerSink`] remembers once a write has failed that the
//! peer is gone and silently drops every subsequent write instead of
//! letting a broken pipe turn into a panic or a flood of log spam.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::sync::Mutex;
use tracing::warn;

use crate::types::InboundMessage;

/// Default cap on a single line's length (spec §4.1: "Lines exceeding a
/// configurable maximum are rejected with a parse error"), overridable via
/// [`MessageReader::with_max_line_bytes`].
pub const DEFAULT_MAX_LINE_BYTES: usize = 10 * 1024 * 1024;

/// Reads JSON-RPC messages from a line-delimited source, one line per
/// message.
pub struct MessageReader<R> {
    lines: Lines<BufReader<R>>,
    max_line_bytes: usize,
}

impl<R: AsyncRead + Unpin> MessageReader<R> {
    /// Wrap a reader (typically `tokio::io::stdin()`) with the default
    /// maximum line length.
    pub fn new(reader: R) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }

    /// Override the maximum accepted line length (spec §6 configuration).
    pub fn with_max_line_bytes(mut self, max_line_bytes: usize) -> Self {
        self.max_line_bytes = max_line_bytes;
        self
    }

    /// Read and parse the next well-formed message, skipping blank,
    /// oversized, and malformed lines. Returns `Ok(None)` at EOF.
    pub async fn next_message(&mut self) -> std::io::Result<Option<InboundMessage>> {
        loop {
            let Some(line) = self.lines.next_line().await? else {
                return Ok(None);
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed.len() > self.max_line_bytes {
                warn!(
                    line_bytes = trimmed.len(),
                    max = self.max_line_bytes,
                    "rejecting oversized JSON-RPC line with a parse error"
                );
                continue;
            }
            match serde_json::from_str::<InboundMessage>(trimmed) {
                Ok(msg) => return Ok(Some(msg)),
                Err(err) => {
                    warn!(error = %err, "skipping malformed JSON-RPC line");
                    continue;
                }
            }
        }
    }
}

/// Outbound half of the framer. Once a write fails, every later `send`
/// becomes a silent no-op rather than attempting to write to a peer that
/// is already gone.
pub struct PeerSink<W> {
    writer: Mutex<W>,
    gone: AtomicBool,
}

impl<W: AsyncWrite + Unpin> PeerSink<W> {
    /// Wrap a writer (typically `tokio::io::stdout()`).
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
            gone: AtomicBool::new(false),
        }
    }

    /// Serialize `payload` as a single line and write it, unless the peer
    /// is already known gone.
    pub async fn send(&self, payload: &impl serde::Serialize) {
        if self.is_gone() {
            return;
        }
        let mut line = match serde_json::to_string(payload) {
            Ok(s) => s,
            Err(err) => {
                warn!(error = %err, "failed to serialize outbound message");
                return;
            }
        };
        line.push('\n');
        let mut writer = self.writer.lock().await;
        if let Err(err) = writer.write_all(line.as_bytes()).await {
            warn!(error = %err, "peer write failed, suppressing further writes");
            self.gone.store(true, Ordering::Release);
            return;
        }
        if let Err(err) = writer.flush().await {
            warn!(error = %err, "peer flush failed, suppressing further writes");
            self.gone.store(true, Ordering::Release);
        }
    }

    /// Mark the peer gone without attempting a write, e.g. on EOF from the
    /// reader half.
    pub fn mark_gone(&self) {
        self.gone.store(true, Ordering::Release);
    }

    /// Whether the peer is known gone.
    pub fn is_gone(&self) -> bool {
        self.gone.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    #[tokio::test]
    async fn skips_malformed_and_blank_lines() {
        let input = b"not json\n\n{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"tools/list\"}\n".to_vec();
        let mut reader = MessageReader::new(input.as_slice());
        let msg = reader.next_message().await.unwrap().unwrap();
        assert_eq!(msg.method, "tools/list");
    }

    #[tokio::test]
    async fn oversized_line_is_rejected_without_terminating_the_stream() {
        let oversized = "x".repeat(100);
        let input = format!(
            "{oversized}\n{{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"tools/list\"}}\n"
        )
        .into_bytes();
        let mut reader = MessageReader::new(input.as_slice()).with_max_line_bytes(50);
        let msg = reader.next_message().await.unwrap().unwrap();
        assert_eq!(msg.method, "tools/list");
    }

    #[tokio::test]
    async fn eof_returns_none() {
        let mut reader = MessageReader::new(b"".as_slice());
        assert!(reader.next_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn peer_sink_writes_a_line() {
        let mut buf = Vec::new();
        {
            let sink = PeerSink::new(&mut buf);
            sink.send(&json!({"ok": true})).await;
        }
        let text = String::from_utf8(buf).unwrap();
        assert!(text.ends_with('\n'));
        assert!(text.contains("\"ok\":true"));
    }

    struct AlwaysErrors;

    impl AsyncWrite for AlwaysErrors {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            Poll::Ready(Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone")))
        }
        fn poll_flush(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
        fn poll_shutdown(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn write_failure_suppresses_future_sends() {
        let sink = PeerSink::new(AlwaysErrors);
        assert!(!sink.is_gone());
        sink.send(&json!({"a": 1})).await;
        assert!(sink.is_gone());
        // Second send must not panic or attempt another write.
        sink.send(&json!({"a": 2})).await;
    }

    #[tokio::test]
    async fn mark_gone_suppresses_sends() {
        let mut buf = Vec::new();
        let sink = PeerSink::new(&mut buf);
        sink.mark_gone();
        sink.send(&json!({"a": 1})).await;
        assert!(buf.is_empty());
    }
}
