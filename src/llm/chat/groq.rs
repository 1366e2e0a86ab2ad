use async_trait::async_trait;
use log::info;
use reqwest::{ Client as HttpClient, header::{ HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION } };
use serde::{ Deserialize, Serialize };

use super::{ events_from_frames, open_event_stream, ChatClient, ChunkParser, CompletionRequest };
use crate::llm::{ LlmConfig, LlmError, LlmType };
use crate::models::chat::Role;
use crate::models::stream::{ FinishReason, StreamEvent };
use crate::stream::EventStream;

const DEFAULT_BASE_URL: &str = "https://api.groq.com";
const COMPLETIONS_ROUTE: &str = "/openai/v1/chat/completions";

pub struct GroqChatClient {
    http: HttpClient,
    base_url: String,
}

#[derive(Serialize)]
struct GroqMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct GroqRequest<'a> {
    messages: Vec<GroqMessage<'a>>,
    model: &'a str,
    temperature: f32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_format: Option<&'static str>,
}

#[derive(Deserialize)]
struct GroqStreamResponse {
    #[serde(default)]
    choices: Vec<GroqStreamChoice>,
}

#[derive(Deserialize)]
struct GroqStreamChoice {
    #[serde(default)]
    delta: GroqDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct GroqDelta {
    content: Option<String>,
    reasoning: Option<String>,
}

fn finish_reason(reason: &str) -> FinishReason {
    match reason {
        "stop" => FinishReason::Stop,
        "length" => FinishReason::Length,
        "content_filter" => FinishReason::ContentFilter,
        "tool_calls" | "function_call" => FinishReason::ToolCalls,
        _ => FinishReason::Other,
    }
}

/// Parses OpenAI-style `chat.completion.chunk` payloads.
#[derive(Default)]
pub struct GroqChunkParser;

impl ChunkParser for GroqChunkParser {
    fn parse(&mut self, data: &str) -> Result<Vec<StreamEvent>, LlmError> {
        let chunk = serde_json::from_str::<GroqStreamResponse>(data).map_err(|e| LlmError::Decode {
            provider: LlmType::Groq,
            message: format!("{}: {}", e, data),
        })?;

        let mut events = Vec::new();
        for choice in chunk.choices {
            if let Some(reasoning) = choice.delta.reasoning.filter(|r| !r.is_empty()) {
                events.push(StreamEvent::reasoning(reasoning));
            }
            if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
                events.push(StreamEvent::text(content));
            }
            if let Some(reason) = choice.finish_reason {
                events.push(StreamEvent::Finish { finish_reason: finish_reason(&reason) });
            }
        }
        Ok(events)
    }
}

impl GroqChatClient {
    pub fn new(api_key: String, base_url: Option<String>) -> Result<Self, LlmError> {
        let api_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| LlmError::Config(format!("Invalid API key format: {}", e)))?
        );

        let http = HttpClient::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| LlmError::Config(e.to_string()))?;

        Ok(Self { http, base_url: api_url })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(LlmError::MissingApiKey(LlmType::Groq))?;

        Self::new(api_key, config.base_url.clone())
    }
}

#[async_trait]
impl ChatClient for GroqChatClient {
    async fn stream_step(&self, request: &CompletionRequest) -> Result<EventStream, LlmError> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), COMPLETIONS_ROUTE);

        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        messages.push(GroqMessage { role: "system", content: &request.system });
        for message in &request.messages {
            let role = match message.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            messages.push(GroqMessage { role, content: &message.content });
        }

        let req = GroqRequest {
            messages,
            model: &request.model,
            temperature: request.temperature,
            stream: true,
            reasoning_format: request.reasoning.then_some("parsed"),
        };

        info!("Starting Groq stream request to {} (model={})", url, request.model);

        let frames = open_event_stream(LlmType::Groq, self.http.post(&url).json(&req)).await?;
        Ok(events_from_frames(LlmType::Groq, frames, GroqChunkParser))
    }

    fn llm_type(&self) -> LlmType {
        LlmType::Groq
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}
