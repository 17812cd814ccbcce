//! SSE decoder for chat responses.
//!
//! The backend frames each update as an SSE event whose `data` field holds
//! either the `[DONE]` sentinel or a JSON object:
//!
//! ```text
//! data: {"type":"definition","definition":"...","sources":[{"source":"a.pdf"}]}
//!
//! data: {"text":"partial answer"}
//!
//! data: [DONE]
//! ```
//!
//! Payloads that are not JSON are passed through as plain text chunks so a
//! backend that streams raw tokens still renders. JSON that is not an object
//! (`null` heartbeats, bare numbers) carries nothing to render and is skipped.

use std::pin::Pin;
use std::task::{Context, Poll};

use eventsource_stream::{EventStream, Eventsource};
use futures_util::Stream;
use serde_json::Value;
use tracing::{debug, trace};

use super::types::{ChatEvent, sources_from_value};
use crate::error::{ChatError, ChatResult};

/// End-of-stream sentinel. Not valid JSON, so it is checked before parsing.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Converts a byte stream into `ChatEvent`s.
///
/// The stream is fused: after `Done` or a read failure it yields `None`.
pub struct ChatEventStream<S> {
    inner: EventStream<S>,
    finished: bool,
}

impl<S> ChatEventStream<S> {
    pub fn new(stream: S) -> Self
    where
        S: Eventsource,
    {
        Self {
            inner: stream.eventsource(),
            finished: false,
        }
    }

    /// Returns true once `Done` was emitted or the underlying stream ended.
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl<S> std::fmt::Debug for ChatEventStream<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatEventStream")
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

/// Wraps a response body in a `ChatEventStream`.
pub fn decode_stream<S>(stream: S) -> ChatEventStream<S>
where
    S: Eventsource,
{
    ChatEventStream::new(stream)
}

impl<S, E> Stream for ChatEventStream<S>
where
    S: Stream<Item = std::result::Result<bytes::Bytes, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    type Item = ChatResult<ChatEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }

        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => {
                    trace!(event = %event.event, bytes = event.data.len(), "sse event");
                    match parse_payload(&event.data) {
                        Some(ChatEvent::Done) => {
                            self.finished = true;
                            return Poll::Ready(Some(Ok(ChatEvent::Done)));
                        }
                        Some(chat_event) => return Poll::Ready(Some(Ok(chat_event))),
                        None => {}
                    }
                }
                Poll::Ready(Some(Err(e))) => {
                    self.finished = true;
                    return Poll::Ready(Some(Err(ChatError::stream(format!(
                        "SSE stream error: {e}"
                    )))));
                }
                Poll::Ready(None) => {
                    self.finished = true;
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Parses one `data:` payload.
///
/// Returns `None` for payloads that carry nothing to render: an empty
/// payload, JSON that is not an object, or an object with neither a
/// definition nor non-empty text.
pub fn parse_payload(data: &str) -> Option<ChatEvent> {
    if data.trim() == DONE_SENTINEL {
        return Some(ChatEvent::Done);
    }
    if data.is_empty() {
        return None;
    }

    let Ok(value) = serde_json::from_str::<Value>(data) else {
        return Some(ChatEvent::TextChunk {
            text: data.to_string(),
        });
    };

    let Value::Object(ref obj) = value else {
        debug!(payload = data, "ignoring non-object JSON payload");
        return None;
    };

    if obj.get("type").and_then(Value::as_str) == Some("definition") {
        return Some(ChatEvent::Definition {
            text: obj
                .get("definition")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            sources: sources_from_value(obj.get("sources")),
        });
    }

    match obj.get("text").and_then(Value::as_str) {
        Some(text) if !text.is_empty() => Some(ChatEvent::TextChunk {
            text: text.to_string(),
        }),
        _ => {
            debug!(payload = data, "ignoring SSE payload without text");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;

    use super::*;
    use crate::chat::types::Source;
    use crate::error::ChatErrorKind;

    const SSE_DEFINITION_RESPONSE: &str = "data: {\"type\":\"definition\",\"term\":\"IFSC\",\"definition\":\"International Financial Services Centre\",\"sources\":[{\"source\":\"/files/ifsc.pdf\"}],\"user\":\"E100\"}\n\ndata: [DONE]\n\n";

    const SSE_CHUNKED_RESPONSE: &str = "event: message\ndata: {\"text\":\"He\"}\n\ndata: {\"text\":\"llo\"}\n\ndata: plain words\n\ndata: [DONE]\n\n";

    fn mock_byte_stream(
        data: &str,
        chunk_size: usize,
    ) -> impl Stream<Item = std::result::Result<bytes::Bytes, std::io::Error>> + Unpin {
        let chunks: Vec<_> = data
            .as_bytes()
            .chunks(chunk_size)
            .map(|c| Ok(bytes::Bytes::copy_from_slice(c)))
            .collect();
        futures_util::stream::iter(chunks)
    }

    async fn collect_events<S>(stream: S) -> Vec<ChatEvent>
    where
        S: Stream<Item = std::result::Result<bytes::Bytes, std::io::Error>> + Unpin,
    {
        let mut decoder = ChatEventStream::new(stream);
        let mut events = Vec::new();
        while let Some(result) = decoder.next().await {
            events.push(result.expect("Expected valid event"));
        }
        events
    }

    #[test]
    fn test_parse_done_sentinel() {
        assert_eq!(parse_payload("[DONE]"), Some(ChatEvent::Done));
        assert_eq!(parse_payload(" [DONE] "), Some(ChatEvent::Done));
    }

    #[test]
    fn test_parse_non_json_becomes_text_chunk() {
        assert_eq!(
            parse_payload("hello"),
            Some(ChatEvent::TextChunk {
                text: "hello".to_string()
            })
        );
    }

    #[test]
    fn test_parse_definition() {
        let event = parse_payload(
            r#"{"type":"definition","definition":"X","sources":[{"source":"a.pdf"}]}"#,
        );
        assert_eq!(
            event,
            Some(ChatEvent::Definition {
                text: "X".to_string(),
                sources: vec![Source::new("a.pdf")],
            })
        );
    }

    #[test]
    fn test_parse_definition_missing_fields() {
        assert_eq!(
            parse_payload(r#"{"type":"definition"}"#),
            Some(ChatEvent::Definition {
                text: String::new(),
                sources: vec![],
            })
        );
    }

    #[test]
    fn test_parse_text_object() {
        assert_eq!(
            parse_payload(r#"{"text":"chunk"}"#),
            Some(ChatEvent::TextChunk {
                text: "chunk".to_string()
            })
        );
    }

    #[test]
    fn test_parse_skips_objects_without_text() {
        assert_eq!(parse_payload(r#"{"text":""}"#), None);
        assert_eq!(parse_payload(r#"{"status":"thinking"}"#), None);
        assert_eq!(parse_payload(""), None);
    }

    #[test]
    fn test_parse_skips_json_scalars() {
        for payload in ["42", "true", "null", "\"word\"", "[1,2]"] {
            assert_eq!(parse_payload(payload), None, "payload: {payload}");
        }
    }

    #[tokio::test]
    async fn test_decoder_ignores_null_heartbeat() {
        let data = "data: {\"text\":\"Hi\"}\n\ndata: null\n\ndata: [DONE]\n\n";
        let events = collect_events(mock_byte_stream(data, 5)).await;
        assert_eq!(
            events,
            vec![
                ChatEvent::TextChunk {
                    text: "Hi".to_string()
                },
                ChatEvent::Done,
            ]
        );
    }

    #[test]
    fn test_event_stream_debug_shows_state() {
        let decoder = ChatEventStream::new(mock_byte_stream("", 1));
        assert_eq!(
            format!("{decoder:?}"),
            "ChatEventStream { finished: false, .. }"
        );
    }

    #[tokio::test]
    async fn test_decoder_definition_response() {
        let events = collect_events(mock_byte_stream(SSE_DEFINITION_RESPONSE, 50)).await;
        assert_eq!(
            events,
            vec![
                ChatEvent::Definition {
                    text: "International Financial Services Centre".to_string(),
                    sources: vec![Source::new("/files/ifsc.pdf")],
                },
                ChatEvent::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_decoder_is_boundary_insensitive() {
        let whole = collect_events(mock_byte_stream(SSE_CHUNKED_RESPONSE, usize::MAX)).await;
        assert_eq!(whole.len(), 4);

        for chunk_size in [1, 2, 3, 7, 13, 64] {
            let split = collect_events(mock_byte_stream(SSE_CHUNKED_RESPONSE, chunk_size)).await;
            assert_eq!(split, whole, "chunk size {chunk_size}");
        }
    }

    #[tokio::test]
    async fn test_decoder_stops_after_done() {
        let data = "data: {\"text\":\"a\"}\n\ndata: [DONE]\n\ndata: {\"text\":\"late\"}\n\n";
        let events = collect_events(mock_byte_stream(data, 50)).await;
        assert_eq!(
            events,
            vec![
                ChatEvent::TextChunk {
                    text: "a".to_string()
                },
                ChatEvent::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_decoder_done_first() {
        let events = collect_events(mock_byte_stream("data: [DONE]\n\n", 50)).await;
        assert_eq!(events, vec![ChatEvent::Done]);
    }

    #[tokio::test]
    async fn test_decoder_handles_crlf_line_endings() {
        let data = "data: {\"text\":\"a\"}\r\n\r\ndata: [DONE]\r\n\r\n";
        let events = collect_events(mock_byte_stream(data, 5)).await;
        assert_eq!(
            events,
            vec![
                ChatEvent::TextChunk {
                    text: "a".to_string()
                },
                ChatEvent::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_decoder_handles_utf8_split_across_chunks() {
        let data = "data: {\"text\":\"Namaste 🙏 team\"}\n\n";
        let bytes = data.as_bytes();
        let emoji_start = bytes
            .windows(4)
            .position(|w| w == "🙏".as_bytes())
            .expect("emoji not found");
        let split_point = emoji_start + 2;

        let chunks: Vec<std::result::Result<bytes::Bytes, std::io::Error>> = vec![
            Ok(bytes::Bytes::copy_from_slice(&bytes[..split_point])),
            Ok(bytes::Bytes::copy_from_slice(&bytes[split_point..])),
        ];

        let events = collect_events(futures_util::stream::iter(chunks)).await;
        assert_eq!(
            events,
            vec![ChatEvent::TextChunk {
                text: "Namaste 🙏 team".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_decoder_ends_without_done() {
        let mut decoder =
            ChatEventStream::new(mock_byte_stream("data: {\"text\":\"partial\"}\n\n", 50));
        assert_eq!(
            decoder.next().await.unwrap().unwrap(),
            ChatEvent::TextChunk {
                text: "partial".to_string()
            }
        );
        assert!(decoder.next().await.is_none());
        assert!(decoder.is_finished());
    }

    #[tokio::test]
    async fn test_decoder_surfaces_read_failure_then_ends() {
        let chunks: Vec<std::result::Result<bytes::Bytes, std::io::Error>> = vec![
            Ok(bytes::Bytes::from_static(b"data: {\"text\":\"one\"}\n\n")),
            Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset",
            )),
            Ok(bytes::Bytes::from_static(b"data: {\"text\":\"two\"}\n\n")),
        ];
        let mut decoder = ChatEventStream::new(futures_util::stream::iter(chunks));

        assert!(matches!(
            decoder.next().await,
            Some(Ok(ChatEvent::TextChunk { .. }))
        ));
        let err = decoder.next().await.unwrap().unwrap_err();
        assert_eq!(err.kind, ChatErrorKind::Stream);
        assert!(err.message.contains("connection reset"));
        assert!(decoder.next().await.is_none());
    }

    #[tokio::test]
    async fn test_decoder_skips_empty_text_objects() {
        let data = "data: {\"text\":\"\"}\n\ndata: {\"text\":\"x\"}\n\ndata: [DONE]\n\n";
        let events = collect_events(mock_byte_stream(data, 50)).await;
        assert_eq!(
            events,
            vec![
                ChatEvent::TextChunk {
                    text: "x".to_string()
                },
                ChatEvent::Done,
            ]
        );
    }
}
