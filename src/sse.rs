//! Server-sent event decoding for streamed chat completions.
//!
//! OpenAI-compatible servers stream one `data: {json}` line per chunk and
//! finish with `data: [DONE]`.  Decoding is relaxed: a line that
//! is not valid UTF-8, is not a `data:` line, or does not parse as a chunk is
//! skipped and the stream carries on.  Only the `[DONE]` sentinel, the end of
//! the byte stream, or a transport error end it.

use std::time::Duration;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::observability::{STREAM_BYTES, STREAM_ERRORS, STREAM_EVENTS, STREAM_SKIPPED_LINES};
use crate::types::{ChatCompletionChunk, StreamEvent};
use crate::{Error, Result};

/// Payload of the terminal line.
const DONE_SENTINEL: &str = "[DONE]";

struct SseState<S> {
    stream: S,
    buffer: Vec<u8>,
    chunk_timeout: Option<Duration>,
    finished: bool,
}

/// Process a stream of bytes into a stream of [`StreamEvent`]s.
///
/// The returned stream is lazy and pull based: each poll reads only as many
/// chunks from `byte_stream` as it takes to complete the next line.  After
/// [`StreamEvent::Done`] or an `Err` item it yields nothing more.
///
/// With a `chunk_timeout`, a wait longer than that for the next chunk ends
/// the stream with a timeout error.  A reply may take any total time as long
/// as chunks keep arriving.
pub fn process_sse<S>(
    byte_stream: S,
    chunk_timeout: Option<Duration>,
) -> impl Stream<Item = Result<StreamEvent>> + Send
where
    S: Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Send + Unpin + 'static,
{
    let state = SseState {
        stream: byte_stream,
        buffer: Vec::new(),
        chunk_timeout,
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if state.finished {
                return None;
            }

            // Drain complete lines before reading more data.
            while let Some(line) = next_line(&mut state.buffer) {
                if let Some(event) = decode_line(&line) {
                    STREAM_EVENTS.click();
                    state.finished = event.is_done();
                    return Some((Ok(event), state));
                }
            }

            let next = match state.chunk_timeout {
                Some(limit) => match tokio::time::timeout(limit, state.stream.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        STREAM_ERRORS.click();
                        state.finished = true;
                        let err = Error::timeout(
                            "No data received from the stream",
                            Some(limit.as_secs_f64()),
                        );
                        return Some((Err(err), state));
                    }
                },
                None => state.stream.next().await,
            };
            match next {
                Some(Ok(bytes)) => {
                    STREAM_BYTES.count(bytes.len() as u64);
                    state.buffer.extend_from_slice(&bytes);
                }
                Some(Err(e)) => {
                    STREAM_ERRORS.click();
                    state.finished = true;
                    let err = if e.is_timeout() {
                        Error::timeout(format!("Stream timed out: {e}"), None)
                    } else {
                        Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e)))
                    };
                    return Some((Err(err), state));
                }
                None => {
                    // End of stream; the last line may lack its newline.
                    state.finished = true;
                    let line = std::mem::take(&mut state.buffer);
                    if let Some(event) = decode_line(&line) {
                        STREAM_EVENTS.click();
                        return Some((Ok(event), state));
                    }
                    return None;
                }
            }
        }
    })
}

/// Split the first complete line off `buffer`, without its terminator.
fn next_line(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    let newline = buffer.iter().position(|b| *b == b'\n')?;
    let mut line: Vec<u8> = buffer.drain(..=newline).collect();
    line.pop();
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Some(line)
}

/// Decode one line; `None` means there is nothing to emit for it.
fn decode_line(line: &[u8]) -> Option<StreamEvent> {
    let Ok(line) = std::str::from_utf8(line) else {
        STREAM_SKIPPED_LINES.click();
        return None;
    };
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let Some(payload) = line.strip_prefix("data:").map(str::trim) else {
        // Comments (keep-alives) and `event:`/`id:` fields carry no text.
        return None;
    };
    if payload == DONE_SENTINEL {
        return Some(StreamEvent::Done);
    }
    match serde_json::from_str::<ChatCompletionChunk>(payload) {
        Ok(chunk) => chunk
            .content()
            .filter(|text| !text.is_empty())
            .map(|text| StreamEvent::Content(text.to_string())),
        Err(_) => {
            STREAM_SKIPPED_LINES.click();
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    type ByteResult = std::result::Result<Bytes, reqwest::Error>;

    fn chunks(parts: &[&'static [u8]]) -> impl Stream<Item = ByteResult> + Send + Unpin + 'static {
        stream::iter(
            parts
                .iter()
                .map(|part| Ok(Bytes::from_static(part)))
                .collect::<Vec<_>>(),
        )
    }

    async fn collect(parts: &[&'static [u8]]) -> Vec<StreamEvent> {
        process_sse(chunks(parts), None)
            .map(|event| event.unwrap())
            .collect()
            .await
    }

    #[tokio::test]
    async fn fragments_then_done() {
        let events = collect(&[b"data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\
data: {\"choices\":[{\"delta\":{\"content\":\" there\"}}]}\n\
data: [DONE]\n"])
        .await;
        assert_eq!(
            events,
            vec![
                StreamEvent::Content("Hi".to_string()),
                StreamEvent::Content(" there".to_string()),
                StreamEvent::Done,
            ]
        );
    }

    #[tokio::test]
    async fn malformed_line_is_skipped() {
        let events = collect(&[b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\n\
data: {not json\n\n\
data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n\n\
data: [DONE]\n\n"])
        .await;
        assert_eq!(
            events,
            vec![
                StreamEvent::Content("a".to_string()),
                StreamEvent::Content("b".to_string()),
                StreamEvent::Done,
            ]
        );
    }

    #[tokio::test]
    async fn nothing_after_done() {
        let events = collect(&[b"data: [DONE]\ndata: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n"])
            .await;
        assert_eq!(events, vec![StreamEvent::Done]);
    }

    #[tokio::test]
    async fn line_split_across_chunks() {
        let events = collect(&[
            b"data: {\"choices\":[{\"del",
            b"ta\":{\"content\":\"Hel",
            b"lo\"}}]}\r\ndata: [DO",
            b"NE]\r\n",
        ])
        .await;
        assert_eq!(
            events,
            vec![StreamEvent::Content("Hello".to_string()), StreamEvent::Done]
        );
    }

    #[tokio::test]
    async fn multibyte_character_split_across_chunks() {
        // "é" is 0xC3 0xA9.
        let events = collect(&[
            b"data: {\"choices\":[{\"delta\":{\"content\":\"caf\xC3",
            b"\xA9\"}}]}\n",
        ])
        .await;
        assert_eq!(events, vec![StreamEvent::Content("café".to_string())]);
    }

    #[tokio::test]
    async fn ends_when_transport_closes() {
        let events = collect(&[b"data: {\"choices\":[{\"delta\":{\"content\":\"cut\"}}]}"]).await;
        assert_eq!(events, vec![StreamEvent::Content("cut".to_string())]);
    }

    #[tokio::test]
    async fn ignores_roles_comments_and_other_fields() {
        let events = collect(&[b": keep-alive\n\
event: message\n\
data: {\"choices\":[{\"delta\":{\"role\":\"assistant\",\"content\":\"\"}}]}\n\
data: {\"choices\":[{\"delta\":{\"content\":\"x\"},\"finish_reason\":null}]}\n\
data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\
data:[DONE]\n"])
        .await;
        assert_eq!(
            events,
            vec![StreamEvent::Content("x".to_string()), StreamEvent::Done]
        );
    }

    #[tokio::test]
    async fn invalid_utf8_line_is_skipped() {
        let events = collect(&[
            b"data: \xFF\xFE\n",
            b"data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n",
        ])
        .await;
        assert_eq!(events, vec![StreamEvent::Content("ok".to_string())]);
    }

    #[test]
    fn next_line_keeps_remainder() {
        let mut buffer = b"one\r\ntwo".to_vec();
        assert_eq!(next_line(&mut buffer), Some(b"one".to_vec()));
        assert_eq!(next_line(&mut buffer), None);
        assert_eq!(buffer, b"two".to_vec());
    }

    #[test]
    fn empty_stream() {
        let events: Vec<_> = tokio_test::block_on(process_sse(chunks(&[]), None).collect::<Vec<_>>());
        assert!(events.is_empty());
    }

    const HELLO: &[u8] = b"data: {\"choices\":[{\"delta\":{\"content\":\"hello\"}}]}\n";

    #[tokio::test(start_paused = true)]
    async fn stalled_stream_times_out_once() {
        let stalled = chunks(&[HELLO]).chain(stream::pending());
        let mut events = Box::pin(process_sse(stalled, Some(Duration::from_secs(1))));

        assert_eq!(
            events.next().await.unwrap().unwrap(),
            StreamEvent::Content("hello".to_string())
        );
        let err = events.next().await.unwrap().unwrap_err();
        assert!(err.is_timeout());
        assert!(err.is_transport());
        assert!(events.next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_stream_within_chunk_timeout_completes() {
        let parts: Vec<&'static [u8]> = vec![HELLO, HELLO, HELLO, HELLO, b"data: [DONE]\n"];
        let slow = stream::unfold(parts.into_iter(), |mut parts| async move {
            let part = parts.next()?;
            tokio::time::sleep(Duration::from_millis(900)).await;
            Some((Ok::<_, reqwest::Error>(Bytes::from_static(part)), parts))
        });
        let events: Vec<StreamEvent> =
            process_sse(Box::pin(slow), Some(Duration::from_secs(1)))
                .map(|event| event.unwrap())
                .collect()
                .await;
        assert_eq!(events.len(), 5);
        assert_eq!(events.last(), Some(&StreamEvent::Done));
    }

    #[tokio::test]
    async fn transport_error_ends_stream() {
        // Nothing listens on the discard port, so this yields a real client error.
        let failure = reqwest::get("http://127.0.0.1:9/").await.unwrap_err();
        let broken = stream::iter(vec![
            Ok(Bytes::from_static(HELLO)),
            Err(failure),
            Ok(Bytes::from_static(HELLO)),
        ]);
        let events: Vec<Result<StreamEvent>> = process_sse(broken, None).collect().await;

        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0].as_ref().unwrap(),
            &StreamEvent::Content("hello".to_string())
        );
        let err = events[1].as_ref().unwrap_err();
        assert!(err.is_transport());
        assert!(!err.is_server());
    }
}
