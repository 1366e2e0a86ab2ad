pub mod gemini;
pub mod groq;

use async_trait::async_trait;
use futures::{ Stream, StreamExt };
use log::{ info, warn };
use std::collections::HashSet;
use std::pin::Pin;
use std::sync::Arc;

use super::{ LlmConfig, LlmError, LlmType };
use self::gemini::GeminiChatClient;
use self::groq::GroqChatClient;
use crate::models::chat::ConversationMessage;
use crate::models::stream::{ FinishReason, StreamEvent };
use crate::stream::sse::{ sse_frames, SseFrame };
use crate::stream::{ create_streaming_response, EventStream };

type FrameStream = Pin<Box<dyn Stream<Item = Result<SseFrame, reqwest::Error>> + Send>>;

/// Everything a provider needs for one streaming completion step.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub system: String,
    pub messages: Vec<ConversationMessage>,
    pub temperature: f32,
    pub search_grounding: bool,
    pub reasoning: bool,
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Sends one streaming request. Resolves once the provider has accepted it,
    /// so authentication and quota failures surface here rather than mid-stream.
    async fn stream_step(&self, request: &CompletionRequest) -> Result<EventStream, LlmError>;

    fn llm_type(&self) -> LlmType;

    fn base_url(&self) -> &str;
}

/// Decodes provider-specific SSE payloads into stream events.
pub trait ChunkParser: Send + 'static {
    fn parse(&mut self, data: &str) -> Result<Vec<StreamEvent>, LlmError>;
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn ChatClient>, LlmError> {
    let client: Arc<dyn ChatClient> = match config.llm_type {
        LlmType::Groq => {
            let specific_client = GroqChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
        LlmType::Gemini => {
            let specific_client = GeminiChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
    };
    Ok(client)
}

/// Sends `request` and returns its body as SSE frames, or the provider's
/// error status and body.
pub async fn open_event_stream(
    provider: LlmType,
    request: reqwest::RequestBuilder
) -> Result<FrameStream, LlmError> {
    let resp = request.send().await.map_err(|source| LlmError::Http { provider, source })?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        warn!("{} API rejected request with {}: {}", provider, status, body);
        return Err(LlmError::Status { provider, status: status.as_u16(), body });
    }

    Ok(Box::pin(sse_frames(Box::pin(resp.bytes_stream()))))
}

pub fn events_from_frames<P: ChunkParser>(
    provider: LlmType,
    frames: FrameStream,
    parser: P
) -> EventStream {
    create_streaming_response(move |tx| async move {
        let mut frames = frames;
        let mut parser = parser;

        while let Some(frame) = frames.next().await {
            let frame = match frame {
                Ok(frame) => frame,
                Err(source) => {
                    let _ = tx.send(Err(LlmError::Http { provider, source })).await;
                    return;
                }
            };

            if frame.data.trim() == "[DONE]" {
                return;
            }

            match parser.parse(&frame.data) {
                Ok(events) => {
                    for event in events {
                        if tx.send(Ok(event)).await.is_err() {
                            return;
                        }
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            }
        }
    })
}

/// Streams a reply across up to `max_steps` provider requests. A step that
/// stops for length is fed back as an assistant turn and generation resumes.
/// Only the last step's finish event is forwarded, and each source URL is
/// forwarded once per reply.
pub async fn stream_with_continuation(
    client: Arc<dyn ChatClient>,
    request: CompletionRequest,
    max_steps: usize
) -> Result<EventStream, LlmError> {
    let max_steps = max_steps.max(1);
    let first = client.stream_step(&request).await?;

    Ok(create_streaming_response(move |tx| async move {
        let mut request = request;
        let mut step_stream = first;
        let mut step = 1;
        let mut continuing = false;
        let mut seen_sources = HashSet::new();

        loop {
            let mut step_text = String::new();
            let mut finish = None;

            while let Some(item) = step_stream.next().await {
                match item {
                    Ok(StreamEvent::Finish { finish_reason }) => {
                        finish = Some(finish_reason);
                    }
                    Ok(StreamEvent::Source { url, .. }) if seen_sources.contains(&url) => {}
                    Ok(event) => {
                        match &event {
                            StreamEvent::Text { text } => step_text.push_str(text),
                            StreamEvent::Source { url, .. } => {
                                seen_sources.insert(url.clone());
                            }
                            _ => {}
                        }
                        if tx.send(Ok(event)).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                }
            }

            let reason = finish.unwrap_or(FinishReason::Other);
            if reason != FinishReason::Length || step >= max_steps {
                let _ = tx.send(Ok(StreamEvent::Finish { finish_reason: reason })).await;
                return;
            }

            step += 1;
            info!("{} stopped for length, continuing (step {}/{})", client.llm_type(), step, max_steps);
            if continuing {
                if let Some(last) = request.messages.last_mut() {
                    last.content.push_str(&step_text);
                }
            } else {
                request.messages.push(ConversationMessage::assistant(step_text));
                continuing = true;
            }

            step_stream = match client.stream_step(&request).await {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            };
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::from_events;
    use std::sync::Mutex;

    /// Replays one scripted step per call and records the requests it saw.
    struct ScriptedClient {
        steps: Mutex<Vec<Vec<StreamEvent>>>,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedClient {
        fn new(steps: Vec<Vec<StreamEvent>>) -> Self {
            Self { steps: Mutex::new(steps), seen: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl ChatClient for ScriptedClient {
        async fn stream_step(&self, request: &CompletionRequest) -> Result<EventStream, LlmError> {
            self.seen.lock().unwrap().push(request.clone());
            let mut steps = self.steps.lock().unwrap();
            if steps.is_empty() {
                return Err(LlmError::ClientUnavailable(LlmType::Groq));
            }
            Ok(from_events(steps.remove(0).into_iter().map(Ok).collect()))
        }

        fn llm_type(&self) -> LlmType {
            LlmType::Groq
        }

        fn base_url(&self) -> &str {
            "http://scripted"
        }
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: "m".into(),
            system: "sys".into(),
            messages: vec![ConversationMessage::user("hi")],
            temperature: 0.4,
            search_grounding: false,
            reasoning: false,
        }
    }

    fn length() -> StreamEvent {
        StreamEvent::Finish { finish_reason: FinishReason::Length }
    }

    #[tokio::test]
    async fn test_single_step_forwards_finish() {
        let client = Arc::new(ScriptedClient::new(vec![vec![
            StreamEvent::text("done"),
            StreamEvent::Finish { finish_reason: FinishReason::Stop }
        ]]));
        let events: Vec<StreamEvent> = stream_with_continuation(client.clone(), request(), 5).await
            .unwrap()
            .map(|e| e.unwrap())
            .collect().await;
        assert_eq!(events, vec![
            StreamEvent::text("done"),
            StreamEvent::Finish { finish_reason: FinishReason::Stop }
        ]);
        assert_eq!(client.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_length_stop_continues_with_assistant_turn() {
        let client = Arc::new(ScriptedClient::new(vec![
            vec![StreamEvent::text("Hel"), length()],
            vec![StreamEvent::text("lo"), length()],
            vec![StreamEvent::text("!"), StreamEvent::Finish { finish_reason: FinishReason::Stop }]
        ]));
        let events: Vec<StreamEvent> = stream_with_continuation(client.clone(), request(), 5).await
            .unwrap()
            .map(|e| e.unwrap())
            .collect().await;

        assert_eq!(events, vec![
            StreamEvent::text("Hel"),
            StreamEvent::text("lo"),
            StreamEvent::text("!"),
            StreamEvent::Finish { finish_reason: FinishReason::Stop }
        ]);

        let seen = client.seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[1].messages.last(), Some(&ConversationMessage::assistant("Hel")));
        assert_eq!(seen[2].messages.len(), 2);
        assert_eq!(seen[2].messages.last(), Some(&ConversationMessage::assistant("Hello")));
    }

    #[tokio::test]
    async fn test_continuation_stops_at_step_budget() {
        let client = Arc::new(ScriptedClient::new(vec![
            vec![StreamEvent::text("a"), length()],
            vec![StreamEvent::text("b"), length()],
            vec![StreamEvent::text("c"), length()]
        ]));
        let events: Vec<StreamEvent> = stream_with_continuation(client.clone(), request(), 2).await
            .unwrap()
            .map(|e| e.unwrap())
            .collect().await;

        assert_eq!(events.last(), Some(&length()));
        assert_eq!(client.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_sources_repeated_in_later_steps_are_forwarded_once() {
        let source = |id: &str, url: &str| StreamEvent::Source {
            id: id.into(),
            url: url.into(),
            title: None,
        };
        let client = Arc::new(ScriptedClient::new(vec![
            vec![source("1", "https://a.example/x"), StreamEvent::text("Hel"), length()],
            vec![
                source("2", "https://a.example/x"),
                source("3", "https://b.example/y"),
                StreamEvent::text("lo"),
                StreamEvent::Finish { finish_reason: FinishReason::Stop }
            ]
        ]));
        let events: Vec<StreamEvent> = stream_with_continuation(client, request(), 5).await
            .unwrap()
            .map(|e| e.unwrap())
            .collect().await;

        assert_eq!(events, vec![
            source("1", "https://a.example/x"),
            StreamEvent::text("Hel"),
            source("3", "https://b.example/y"),
            StreamEvent::text("lo"),
            StreamEvent::Finish { finish_reason: FinishReason::Stop }
        ]);
    }

    #[tokio::test]
    async fn test_first_step_failure_is_returned_before_streaming() {
        let client = Arc::new(ScriptedClient::new(vec![]));
        let result = stream_with_continuation(client, request(), 5).await;
        assert!(matches!(result, Err(LlmError::ClientUnavailable(LlmType::Groq))));
    }
}
