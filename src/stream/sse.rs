use bytes::Bytes;
use futures::{ stream, Stream, StreamExt };
use std::collections::VecDeque;

/// A dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

/// Incremental `text/event-stream` parser. Bytes may be split anywhere,
/// including inside a UTF-8 sequence.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.pending.extend_from_slice(chunk);
        let mut frames = Vec::new();

        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw[..raw.len() - 1]);
            let line = line.strip_suffix('\r').unwrap_or(&line);
            if let Some(frame) = self.process_line(line) {
                frames.push(frame);
            }
        }

        frames
    }

    /// Flushes a trailing frame that was not terminated by a blank line.
    pub fn finish(&mut self) -> Option<SseFrame> {
        if !self.pending.is_empty() {
            let raw = std::mem::take(&mut self.pending);
            let line = String::from_utf8_lossy(&raw).into_owned();
            let line = line.strip_suffix('\r').unwrap_or(&line).to_string();
            if let Some(frame) = self.process_line(&line) {
                return Some(frame);
            }
        }
        self.dispatch()
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => self.data.push(value.to_string()),
            "event" => {
                self.event = Some(value.to_string());
            }
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseFrame { event, data })
    }
}

/// Adapts a byte stream (e.g. `reqwest::Response::bytes_stream`) into SSE frames.
pub fn sse_frames<S, E>(bytes: S) -> impl Stream<Item = Result<SseFrame, E>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + Unpin + 'static,
    E: Send + 'static,
{
    stream::unfold(
        (bytes, SseDecoder::new(), VecDeque::new(), false),
        |(mut bytes, mut decoder, mut ready, mut done)| async move {
            loop {
                if let Some(frame) = ready.pop_front() {
                    return Some((Ok(frame), (bytes, decoder, ready, done)));
                }
                if done {
                    return None;
                }
                match bytes.next().await {
                    Some(Ok(chunk)) => ready.extend(decoder.push(&chunk)),
                    Some(Err(e)) => {
                        done = true;
                        return Some((Err(e), (bytes, decoder, ready, done)));
                    }
                    None => {
                        done = true;
                        ready.extend(decoder.finish());
                    }
                }
            }
        }
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"event: text\nda").is_empty());
        assert!(decoder.push(b"ta: {\"a\":").is_empty());
        let frames = decoder.push(b"1}\n\ndata: second\n\n");
        assert_eq!(frames, vec![
            SseFrame { event: Some("text".into()), data: "{\"a\":1}".into() },
            SseFrame { event: None, data: "second".into() }
        ]);
    }

    #[test]
    fn test_crlf_and_comments() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b": keep-alive\r\n\r\ndata: x\r\n\r\n");
        assert_eq!(frames, vec![SseFrame { event: None, data: "x".into() }]);
    }

    #[test]
    fn test_multibyte_split() {
        let text = "data: สวัสดี\n\n".as_bytes();
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(&text[..8]).is_empty());
        let frames = decoder.push(&text[8..]);
        assert_eq!(frames[0].data, "สวัสดี");
    }

    #[test]
    fn test_multiline_data_joined() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"data: a\ndata: b\n\n");
        assert_eq!(frames[0].data, "a\nb");
    }

    #[test]
    fn test_finish_flushes_unterminated_frame() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: [DONE]").is_empty());
        assert_eq!(decoder.finish().map(|f| f.data), Some("[DONE]".to_string()));
        assert!(decoder.finish().is_none());
    }

    #[tokio::test]
    async fn test_sse_frames_over_byte_stream() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"data: one\n")),
            Ok(Bytes::from_static(b"\ndata: two")),
        ];
        let frames: Vec<_> = sse_frames(stream::iter(chunks)).collect().await;
        let data: Vec<String> = frames
            .into_iter()
            .map(|f| f.unwrap().data)
            .collect();
        assert_eq!(data, vec!["one".to_string(), "two".to_string()]);
    }
}
