use async_trait::async_trait;
use log::info;
use reqwest::{ Client as HttpClient, header::{ HeaderMap, HeaderValue, CONTENT_TYPE } };
use serde::{ Deserialize, Serialize };
use std::collections::HashSet;
use uuid::Uuid;

use super::{ events_from_frames, open_event_stream, ChatClient, ChunkParser, CompletionRequest };
use crate::llm::{ LlmConfig, LlmError, LlmType };
use crate::models::chat::Role;
use crate::models::stream::{ FinishReason, StreamEvent };
use crate::stream::EventStream;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiStreamRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    system_instruction: GeminiContent<'a>,
    generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<GeminiTool>,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    google_search: GoogleSearch,
}

#[derive(Serialize)]
struct GoogleSearch {}

#[derive(Deserialize)]
struct GoogleChunk {
    #[serde(default)]
    candidates: Vec<GoogleCandidate>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleCandidate {
    content: Option<GoogleContent>,
    finish_reason: Option<String>,
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Deserialize)]
struct GoogleContent {
    #[serde(default)]
    parts: Vec<GooglePart>,
}

#[derive(Deserialize)]
struct GooglePart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Deserialize)]
struct GroundingChunk {
    web: Option<WebSource>,
}

#[derive(Deserialize)]
struct WebSource {
    uri: String,
    title: Option<String>,
}

fn finish_reason(reason: &str) -> FinishReason {
    match reason {
        "STOP" => FinishReason::Stop,
        "MAX_TOKENS" => FinishReason::Length,
        "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII" =>
            FinishReason::ContentFilter,
        "MALFORMED_FUNCTION_CALL" => FinishReason::Error,
        _ => FinishReason::Other,
    }
}

/// Parses `streamGenerateContent?alt=sse` payloads. Grounding sources repeat
/// across chunks, so each URL is emitted once per step.
#[derive(Default)]
pub struct GeminiChunkParser {
    seen_sources: HashSet<String>,
}

impl ChunkParser for GeminiChunkParser {
    fn parse(&mut self, data: &str) -> Result<Vec<StreamEvent>, LlmError> {
        let chunk = serde_json::from_str::<GoogleChunk>(data).map_err(|e| LlmError::Decode {
            provider: LlmType::Gemini,
            message: format!("{}: {}", e, data),
        })?;

        let mut events = Vec::new();
        let Some(candidate) = chunk.candidates.into_iter().next() else {
            return Ok(events);
        };

        if let Some(content) = candidate.content {
            for part in content.parts {
                let Some(text) = part.text.filter(|t| !t.is_empty()) else {
                    continue;
                };
                if part.thought {
                    events.push(StreamEvent::reasoning(text));
                } else {
                    events.push(StreamEvent::text(text));
                }
            }
        }

        if let Some(metadata) = candidate.grounding_metadata {
            for web in metadata.grounding_chunks.into_iter().filter_map(|c| c.web) {
                if self.seen_sources.insert(web.uri.clone()) {
                    events.push(StreamEvent::Source {
                        id: Uuid::new_v4().to_string(),
                        url: web.uri,
                        title: web.title,
                    });
                }
            }
        }

        if let Some(reason) = candidate.finish_reason {
            events.push(StreamEvent::Finish { finish_reason: finish_reason(&reason) });
        }

        Ok(events)
    }
}

pub struct GeminiChatClient {
    http: HttpClient,
    base_url: String,
}

impl GeminiChatClient {
    pub fn new(api_key: String, base_url: Option<String>) -> Result<Self, LlmError> {
        let api_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(&api_key)
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
            .ok_or(LlmError::MissingApiKey(LlmType::Gemini))?;

        Self::new(api_key, config.base_url.clone())
    }
}

#[async_trait]
impl ChatClient for GeminiChatClient {
    async fn stream_step(&self, request: &CompletionRequest) -> Result<EventStream, LlmError> {
        let url = format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.base_url.trim_end_matches('/'),
            request.model
        );

        let contents = request.messages
            .iter()
            .map(|message| GeminiContent {
                role: Some(match message.role {
                    Role::User => "user",
                    Role::Assistant => "model",
                }),
                parts: vec![GeminiPart { text: &message.content }],
            })
            .collect();

        let tools = if request.search_grounding {
            vec![GeminiTool { google_search: GoogleSearch {} }]
        } else {
            Vec::new()
        };

        let payload = GeminiStreamRequest {
            contents,
            system_instruction: GeminiContent {
                role: None,
                parts: vec![GeminiPart { text: &request.system }],
            },
            generation_config: GenerationConfig { temperature: request.temperature },
            tools,
        };

        info!(
            "GeminiChatClient::stream_step() → model={} grounding={}",
            request.model,
            request.search_grounding
        );

        let frames = open_event_stream(LlmType::Gemini, self.http.post(&url).json(&payload)).await?;
        Ok(events_from_frames(LlmType::Gemini, frames, GeminiChunkParser::default()))
    }

    fn llm_type(&self) -> LlmType {
        LlmType::Gemini
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}
