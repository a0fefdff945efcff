//! Streaming body decoding
//!
//! `:streamGenerateContent?alt=sse` answers with newline-delimited
//! `data: {json}` lines. Network chunks do not respect line (or UTF-8)
//! boundaries, so bytes are buffered until a full line is available.

use futures::stream::{self, BoxStream, Stream, StreamExt};
use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;

use crate::upstream::BackendError;
use crate::upstream::types::GenerateContentResponse;

/// Stream of text fragments from one committed upstream call
pub type FragmentStream = BoxStream<'static, Result<String, BackendError>>;

/// Splits a byte stream into complete lines
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and return every line it completed, without the `\n`
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            lines.push(String::from_utf8_lossy(&line[..pos]).into_owned());
        }
        lines
    }

    /// Whatever is left after the body ended without a trailing newline
    pub fn take_remainder(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}

/// Classification of one streamed line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamLine {
    /// Non-empty text of the first candidate
    Fragment(String),
    /// `[DONE]` terminator
    Done,
    /// Blank line, SSE comment or field, or a chunk without text
    Skip,
    /// Payload that is not a valid response chunk
    Malformed,
}

pub fn parse_stream_line(line: &str) -> StreamLine {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return StreamLine::Skip;
    }
    if ["event:", "id:", "retry:"]
        .iter()
        .any(|field| line.starts_with(field))
    {
        return StreamLine::Skip;
    }

    let payload = line
        .strip_prefix("data:")
        .map(str::trim_start)
        .unwrap_or(line);
    if payload == "[DONE]" {
        return StreamLine::Done;
    }

    match serde_json::from_str::<GenerateContentResponse>(payload) {
        Ok(chunk) => match chunk.first_text() {
            Some(text) if !text.is_empty() => StreamLine::Fragment(text),
            _ => StreamLine::Skip,
        },
        Err(_) => StreamLine::Malformed,
    }
}

struct DecodeState<S> {
    body: Pin<Box<S>>,
    decoder: LineDecoder,
    pending: VecDeque<String>,
    finished: bool,
}

impl<S> DecodeState<S> {
    fn absorb(&mut self, line: &str) {
        if self.finished {
            return;
        }
        match parse_stream_line(line) {
            StreamLine::Fragment(text) => self.pending.push_back(text),
            StreamLine::Done => self.finished = true,
            StreamLine::Skip => {}
            StreamLine::Malformed => {
                let preview: String = line.chars().take(50).collect();
                tracing::debug!(line = %preview, "Skipping malformed stream line");
            }
        }
    }
}

/// Turn a raw streaming body into a stream of text fragments
///
/// Malformed lines are skipped. A transport error is yielded once and ends
/// the stream.
pub fn decode_fragments<S, B, E>(body: S) -> FragmentStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: Display + Send,
{
    let state = DecodeState {
        body: Box::pin(body),
        decoder: LineDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(fragment) = state.pending.pop_front() {
                return Some((Ok(fragment), state));
            }
            if state.finished {
                return None;
            }

            match state.body.next().await {
                Some(Ok(chunk)) => {
                    for line in state.decoder.push(chunk.as_ref()) {
                        state.absorb(&line);
                    }
                }
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(BackendError::Transport(e.to_string())), state));
                }
                None => {
                    if let Some(rest) = state.decoder.take_remainder() {
                        state.absorb(&rest);
                    }
                    state.finished = true;
                }
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_line(text: &str) -> String {
        format!(
            "data: {}\n",
            serde_json::json!({"candidates": [{"content": {"parts": [{"text": text}]}}]})
        )
    }

    async fn collect(chunks: Vec<Result<Vec<u8>, String>>) -> Vec<Result<String, BackendError>> {
        decode_fragments(stream::iter(chunks)).collect().await
    }

    #[test]
    fn test_line_decoder_buffers_partial_lines() {
        let mut decoder = LineDecoder::new();
        assert!(decoder.push(b"data: {\"a\"").is_empty());
        assert_eq!(decoder.push(b":1}\ndata: x\n"), vec!["data: {\"a\":1}", "data: x"]);
        assert_eq!(decoder.take_remainder(), None);
    }

    #[test]
    fn test_line_decoder_keeps_multibyte_characters_split_across_chunks() {
        let bytes = "café\n".as_bytes();
        let mut decoder = LineDecoder::new();
        assert!(decoder.push(&bytes[..4]).is_empty());
        assert_eq!(decoder.push(&bytes[4..]), vec!["café"]);
    }

    #[test]
    fn test_parse_line_variants() {
        assert_eq!(
            parse_stream_line(data_line("Day 1").trim_end()),
            StreamLine::Fragment("Day 1".to_string())
        );
        assert_eq!(parse_stream_line("data: [DONE]"), StreamLine::Done);
        assert_eq!(parse_stream_line(""), StreamLine::Skip);
        assert_eq!(parse_stream_line(": keep-alive"), StreamLine::Skip);
        assert_eq!(parse_stream_line("event: message"), StreamLine::Skip);
        assert_eq!(parse_stream_line("data: {not json"), StreamLine::Malformed);
    }

    #[test]
    fn test_parse_line_accepts_bare_json_and_crlf() {
        let bare = r#"{"candidates":[{"content":{"parts":[{"text":"hi"}]}}]}"#;
        assert_eq!(parse_stream_line(bare), StreamLine::Fragment("hi".to_string()));
        assert_eq!(
            parse_stream_line(&format!("data: {bare}\r")),
            StreamLine::Fragment("hi".to_string())
        );
    }

    #[test]
    fn test_chunk_without_text_is_skipped() {
        assert_eq!(
            parse_stream_line(r#"data: {"candidates":[{"finishReason":"STOP"}]}"#),
            StreamLine::Skip
        );
    }

    #[tokio::test]
    async fn test_fragments_survive_arbitrary_chunk_splits() {
        let body = format!("{}{}", data_line("Hello, "), data_line("Lisbon"));
        let bytes = body.into_bytes();
        let chunks = bytes
            .chunks(7)
            .map(|c| Ok::<_, String>(c.to_vec()))
            .collect();

        let out: Vec<String> = collect(chunks).await.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(out, vec!["Hello, ", "Lisbon"]);
    }

    #[tokio::test]
    async fn test_done_marker_ends_stream() {
        let body = format!("{}data: [DONE]\n{}", data_line("one"), data_line("two"));
        let out = collect(vec![Ok(body.into_bytes())]).await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].as_ref().unwrap(), "one");
    }

    #[tokio::test]
    async fn test_malformed_lines_are_skipped() {
        let body = format!("data: {{oops\n{}", data_line("kept"));
        let out = collect(vec![Ok(body.into_bytes())]).await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].as_ref().unwrap(), "kept");
    }

    #[tokio::test]
    async fn test_final_line_without_newline_is_decoded() {
        let body = data_line("tail");
        let out = collect(vec![Ok(body.trim_end().as_bytes().to_vec())]).await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].as_ref().unwrap(), "tail");
    }

    #[tokio::test]
    async fn test_transport_error_is_yielded_once_and_ends_stream() {
        let out = collect(vec![
            Ok(data_line("partial").into_bytes()),
            Err("connection reset".to_string()),
            Ok(data_line("never").into_bytes()),
        ])
        .await;

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].as_ref().unwrap(), "partial");
        assert!(matches!(&out[1], Err(BackendError::Transport(msg)) if msg.contains("reset")));
    }
}
