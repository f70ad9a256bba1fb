//! Server-sent event decoding for streamed chat completions.
//!
//! Each event's data is either a JSON chunk carrying
//! `choices[0].delta.content` or the `[DONE]` sentinel. A 2xx response that
//! closes without a single event is malformed, not an empty reply.

use super::ReplyStream;
use eventsource_stream::Eventsource;
use futures_util::{Stream, StreamExt};
use parley_common::{Error, Result};
use serde::Deserialize;
use std::fmt::Display;

/// A decoded event.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum SseEvent {
    /// A text fragment (possibly empty, e.g. the role-only first chunk)
    Delta(String),
    /// The `[DONE]` sentinel
    Done,
    /// Event without data
    Skip,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<StreamError>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    message: String,
}

/// Decode the data of one event.
pub(crate) fn parse_event(data: &str) -> Result<SseEvent> {
    let payload = data.trim();
    if payload.is_empty() {
        return Ok(SseEvent::Skip);
    }
    if payload == "[DONE]" {
        return Ok(SseEvent::Done);
    }

    let chunk: StreamChunk = serde_json::from_str(payload)
        .map_err(|e| Error::Transport(format!("Malformed stream event: {e}")))?;

    if let Some(err) = chunk.error {
        return Err(Error::Transport(format!("Stream aborted by service: {}", err.message)));
    }

    let content = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .unwrap_or_default();

    Ok(SseEvent::Delta(content))
}

/// Turn a raw SSE byte stream into reply fragments.
pub(crate) fn decode<S, B, E>(bytes: S) -> ReplyStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    Box::pin(async_stream::try_stream! {
        let mut events = std::pin::pin!(bytes.eventsource());
        let mut seen = 0usize;

        while let Some(event) = events.next().await {
            let event = event.map_err(|e| Error::Transport(format!("Stream interrupted: {e}")))?;
            match parse_event(&event.data)? {
                SseEvent::Delta(text) => {
                    seen += 1;
                    if !text.is_empty() {
                        yield text;
                    }
                }
                SseEvent::Done => {
                    seen += 1;
                    break;
                }
                SseEvent::Skip => {}
            }
        }

        if seen == 0 {
            tracing::warn!("Stream closed without any events");
            Err::<(), _>(Error::Transport("Malformed stream: no events".into()))?;
        }
    })
}

/// Turn a streaming HTTP response into reply fragments.
pub(crate) fn fragments(response: reqwest::Response) -> ReplyStream {
    decode(response.bytes_stream())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use std::convert::Infallible;

    async fn run_bytes(chunks: Vec<Vec<u8>>) -> Vec<Result<String>> {
        let bytes = stream::iter(chunks.into_iter().map(Ok::<_, Infallible>));
        decode(bytes).collect().await
    }

    async fn run(chunks: &[&str]) -> Vec<Result<String>> {
        run_bytes(chunks.iter().map(|c| c.as_bytes().to_vec()).collect()).await
    }

    fn texts(items: Vec<Result<String>>) -> Vec<String> {
        items.into_iter().map(|r| r.unwrap()).collect()
    }

    #[tokio::test]
    async fn yields_deltas_until_done() {
        let items = run(&[
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\ndata: [DONE]\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n\n",
        ])
        .await;
        assert_eq!(texts(items), vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn handles_crlf_and_split_events() {
        let items = run(&[
            "data: {\"choices\":[{\"delta\":{\"con",
            "tent\":\"a\"}}]}\r\n\r\n: keep-alive\r\n\r\ndata: [DONE]\r\n\r\n",
        ])
        .await;
        assert_eq!(texts(items), vec!["a"]);
    }

    #[tokio::test]
    async fn reassembles_split_utf8() {
        let bytes = "data: {\"choices\":[{\"delta\":{\"content\":\"héllo\"}}]}\n\n".as_bytes();
        let split = bytes.iter().position(|b| *b == 0xc3).unwrap() + 1;
        let items = run_bytes(vec![bytes[..split].to_vec(), bytes[split..].to_vec()]).await;
        assert_eq!(texts(items), vec!["héllo"]);
    }

    #[tokio::test]
    async fn empty_body_is_transport_error() {
        let items = run(&[]).await;
        assert_eq!(items.len(), 1);
        assert!(items[0].as_ref().unwrap_err().is_transport());
    }

    #[tokio::test]
    async fn plain_json_body_is_transport_error() {
        let items = run(&["{\"choices\":[{\"message\":{\"content\":\"Hi there\"}}]}"]).await;
        assert_eq!(items.len(), 1);
        assert!(items[0].as_ref().unwrap_err().is_transport());
    }

    #[tokio::test]
    async fn role_only_stream_is_an_empty_reply() {
        let items = run(&[
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\ndata: [DONE]\n\n",
        ])
        .await;
        assert!(items.is_empty());
    }

    #[test]
    fn parses_content_delta() {
        let data = r#"{"id":"x","choices":[{"index":0,"delta":{"content":"Hel"},"finish_reason":null}]}"#;
        assert_eq!(parse_event(data).unwrap(), SseEvent::Delta("Hel".into()));
    }

    #[test]
    fn role_only_chunk_is_empty_delta() {
        let data = r#"{"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert_eq!(parse_event(data).unwrap(), SseEvent::Delta(String::new()));
    }

    #[test]
    fn parses_done_sentinel() {
        assert_eq!(parse_event("[DONE]").unwrap(), SseEvent::Done);
        assert_eq!(parse_event(" [DONE] ").unwrap(), SseEvent::Done);
    }

    #[test]
    fn empty_data_is_skipped() {
        assert_eq!(parse_event("").unwrap(), SseEvent::Skip);
    }

    #[test]
    fn malformed_json_is_transport_error() {
        let err = parse_event("{not json").unwrap_err();
        assert!(err.is_transport());
    }

    #[test]
    fn in_band_error_fails_the_stream() {
        let err = parse_event(r#"{"error":{"message":"overloaded"}}"#).unwrap_err();
        assert!(err.is_transport());
        assert!(err.to_string().contains("overloaded"));
    }
}
