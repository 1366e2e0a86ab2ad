use futures::StreamExt;
use std::time::Duration;
use tokio::time::sleep;

use super::{ create_streaming_response, EventStream };
use crate::models::stream::StreamEvent;

/// Removes and returns every complete line from `buffer`. A run of newlines
/// stays attached to the text before it.
pub fn take_complete_lines(buffer: &mut String) -> Vec<String> {
    let mut lines = Vec::new();

    while let Some(start) = buffer.find('\n') {
        let end = buffer[start..]
            .find(|c: char| c != '\n')
            .map(|offset| start + offset)
            .unwrap_or(buffer.len());
        lines.push(buffer.drain(..end).collect());
    }

    lines
}

/// Re-chunks text deltas by line and waits `delay` after each emitted chunk.
/// Other events flush pending text first and pass through untouched.
pub fn smooth_by_line(input: EventStream, delay: Duration) -> EventStream {
    create_streaming_response(move |tx| async move {
        let mut input = input;
        let mut buffer = String::new();

        while let Some(item) = input.next().await {
            match item {
                Ok(StreamEvent::Text { text }) => {
                    buffer.push_str(&text);
                    for line in take_complete_lines(&mut buffer) {
                        if tx.send(Ok(StreamEvent::text(line))).await.is_err() {
                            return;
                        }
                        if !delay.is_zero() {
                            sleep(delay).await;
                        }
                    }
                }
                other => {
                    if !buffer.is_empty() {
                        let pending = std::mem::take(&mut buffer);
                        if tx.send(Ok(StreamEvent::text(pending))).await.is_err() {
                            return;
                        }
                    }
                    if tx.send(other).await.is_err() {
                        return;
                    }
                }
            }
        }

        if !buffer.is_empty() {
            let _ = tx.send(Ok(StreamEvent::text(buffer))).await;
        }
    })
}
