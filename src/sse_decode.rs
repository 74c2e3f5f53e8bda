//! Incremental decoder for chunked SSE (`text/event-stream`) bodies.
//!
//! The upstream model API delivers its response as a chunked transfer where
//! a line terminator may be split across two physical reads. This module
//! buffers the remainder across chunk boundaries and yields assembled
//! frames: one `SseFrame` per blank-line-delimited event, with multi-line
//! `data:` fields joined by newlines.
//!
//! Decoding a frame's JSON payload is the caller's job; this layer only
//! tokenizes the wire format.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::Stream;

/// A single field line extracted from the stream.
#[derive(Debug, Clone, PartialEq)]
enum Line {
    Data(String),
    Event(String),
    Id(String),
    /// Blank line: end of frame.
    Blank,
    /// Comment or unrecognized field; ignored.
    Ignored,
}

/// An assembled SSE frame (one logical upstream event).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SseFrame {
    /// Joined `data:` payload lines.
    pub data: String,
    /// Optional `event:` type.
    pub event: Option<String>,
    /// Optional `id:` field.
    pub id: Option<String>,
}

fn parse_line(line: &str) -> Line {
    if line.is_empty() {
        return Line::Blank;
    }
    if let Some(rest) = line.strip_prefix("data:") {
        return Line::Data(rest.strip_prefix(' ').unwrap_or(rest).to_string());
    }
    if let Some(rest) = line.strip_prefix("event:") {
        return Line::Event(rest.strip_prefix(' ').unwrap_or(rest).to_string());
    }
    if let Some(rest) = line.strip_prefix("id:") {
        return Line::Id(rest.strip_prefix(' ').unwrap_or(rest).to_string());
    }
    Line::Ignored
}

#[derive(Default)]
struct FrameBuilder {
    data_lines: Vec<String>,
    event: Option<String>,
    id: Option<String>,
}

impl FrameBuilder {
    fn push(&mut self, line: Line) {
        match line {
            Line::Data(d) => self.data_lines.push(d),
            Line::Event(e) => self.event = Some(e),
            Line::Id(i) => self.id = Some(i),
            Line::Blank | Line::Ignored => {}
        }
    }

    fn is_empty(&self) -> bool {
        self.data_lines.is_empty() && self.event.is_none() && self.id.is_none()
    }

    fn take(&mut self) -> SseFrame {
        SseFrame {
            data: std::mem::take(&mut self.data_lines).join("\n"),
            event: self.event.take(),
            id: self.id.take(),
        }
    }
}

/// Stream adapter turning a chunked byte stream into assembled SSE frames.
///
/// Handles `\n` and `\r\n` endings and terminators split across reads.
/// The remainder is buffered as raw bytes so a multi-byte character cut
/// by a chunk boundary survives; UTF-8 conversion happens per complete
/// line. A trailing frame without a closing blank line is still emitted
/// at end of stream.
pub struct SseFrameStream<S> {
    inner: S,
    buffer: BytesMut,
    builder: FrameBuilder,
    done: bool,
}

impl<S> SseFrameStream<S> {
    #[must_use]
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            buffer: BytesMut::new(),
            builder: FrameBuilder::default(),
            done: false,
        }
    }

    /// Pull the next complete line out of the buffer, if any.
    fn next_line(&mut self) -> Option<String> {
        let end = self.buffer.iter().position(|&b| b == b'\n')?;
        let raw = self.buffer.split_to(end + 1);
        let mut line = String::from_utf8_lossy(&raw[..end]).into_owned();
        if line.ends_with('\r') {
            line.pop();
        }
        Some(line)
    }
}

impl<S, E> Stream for SseFrameStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    type Item = Result<SseFrame, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }

        loop {
            // Drain complete lines already buffered.
            while let Some(line) = self.next_line() {
                match parse_line(&line) {
                    Line::Blank => {
                        if !self.builder.is_empty() {
                            return Poll::Ready(Some(Ok(self.builder.take())));
                        }
                    }
                    other => self.builder.push(other),
                }
            }

            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    self.buffer.extend_from_slice(&bytes);
                }
                Poll::Ready(Some(Err(e))) => return Poll::Ready(Some(Err(e))),
                Poll::Ready(None) => {
                    self.done = true;
                    // Flush an unterminated trailing line and frame.
                    if !self.buffer.is_empty() {
                        let raw = std::mem::take(&mut self.buffer);
                        let line = String::from_utf8_lossy(&raw).into_owned();
                        self.builder.push(parse_line(&line));
                    }
                    if !self.builder.is_empty() {
                        return Poll::Ready(Some(Ok(self.builder.take())));
                    }
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn byte_stream(chunks: Vec<&str>) -> impl Stream<Item = Result<Bytes, std::convert::Infallible>> + use<'_> {
        futures::stream::iter(chunks.into_iter().map(|s| Ok(Bytes::from(s.to_string()))))
    }

    #[tokio::test]
    async fn assembles_single_frame() {
        let mut frames = SseFrameStream::new(byte_stream(vec!["data: hello\n\n"]));
        let frame = frames.next().await.unwrap().unwrap();
        assert_eq!(frame.data, "hello");
        assert!(frames.next().await.is_none());
    }

    #[tokio::test]
    async fn joins_multiline_data() {
        let mut frames = SseFrameStream::new(byte_stream(vec![
            "data: hello\n",
            "data: world\n",
            "\n",
        ]));
        let frame = frames.next().await.unwrap().unwrap();
        assert_eq!(frame.data, "hello\nworld");
    }

    #[tokio::test]
    async fn terminator_split_across_chunks() {
        let mut frames = SseFrameStream::new(byte_stream(vec!["dat", "a: par", "tial\n", "\n"]));
        let frame = frames.next().await.unwrap().unwrap();
        assert_eq!(frame.data, "partial");
    }

    #[tokio::test]
    async fn multibyte_character_split_across_chunks() {
        let chunks = futures::stream::iter(vec![
            Ok::<_, std::convert::Infallible>(Bytes::from_static(b"data: caf\xC3")),
            Ok(Bytes::from_static(b"\xA9\n\n")),
        ]);
        let mut frames = SseFrameStream::new(chunks);
        let frame = frames.next().await.unwrap().unwrap();
        assert_eq!(frame.data, "café");
    }

    #[tokio::test]
    async fn crlf_endings() {
        let mut frames = SseFrameStream::new(byte_stream(vec!["data: test\r\n\r\n"]));
        let frame = frames.next().await.unwrap().unwrap();
        assert_eq!(frame.data, "test");
    }

    #[tokio::test]
    async fn captures_event_and_id() {
        let mut frames = SseFrameStream::new(byte_stream(vec![
            "event: message\n",
            "id: 7\n",
            "data: payload\n",
            "\n",
        ]));
        let frame = frames.next().await.unwrap().unwrap();
        assert_eq!(frame.event.as_deref(), Some("message"));
        assert_eq!(frame.id.as_deref(), Some("7"));
        assert_eq!(frame.data, "payload");
    }

    #[tokio::test]
    async fn comments_and_unknown_fields_ignored() {
        let mut frames = SseFrameStream::new(byte_stream(vec![
            ": keepalive\n",
            "unknown: value\n",
            "data: real\n",
            "\n",
        ]));
        let frame = frames.next().await.unwrap().unwrap();
        assert_eq!(frame.data, "real");
    }

    #[tokio::test]
    async fn data_without_space_after_colon() {
        let mut frames = SseFrameStream::new(byte_stream(vec!["data:tight\n\n"]));
        let frame = frames.next().await.unwrap().unwrap();
        assert_eq!(frame.data, "tight");
    }

    #[tokio::test]
    async fn trailing_frame_flushed_at_eof() {
        let mut frames = SseFrameStream::new(byte_stream(vec!["data: last"]));
        let frame = frames.next().await.unwrap().unwrap();
        assert_eq!(frame.data, "last");
        assert!(frames.next().await.is_none());
    }

    #[tokio::test]
    async fn multiple_frames() {
        let mut frames = SseFrameStream::new(byte_stream(vec![
            "data: one\n\n",
            "data: two\n\ndata: three\n\n",
        ]));
        assert_eq!(frames.next().await.unwrap().unwrap().data, "one");
        assert_eq!(frames.next().await.unwrap().unwrap().data, "two");
        assert_eq!(frames.next().await.unwrap().unwrap().data, "three");
        assert!(frames.next().await.is_none());
    }

    #[tokio::test]
    async fn empty_stream_yields_nothing() {
        let mut frames = SseFrameStream::new(byte_stream(vec![]));
        assert!(frames.next().await.is_none());
    }

    #[tokio::test]
    async fn blank_lines_without_fields_skipped() {
        let mut frames = SseFrameStream::new(byte_stream(vec!["\n\n", "data: x\n\n"]));
        let frame = frames.next().await.unwrap().unwrap();
        assert_eq!(frame.data, "x");
        assert!(frames.next().await.is_none());
    }
}
