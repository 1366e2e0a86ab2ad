use crate::cli::Args;
use crate::config::prompt::{ PromptError, PromptTemplate, Region };
use crate::llm::chat::{ new_client, stream_with_continuation, ChatClient, CompletionRequest };
use crate::llm::selector::ModelSelector;
use crate::llm::{ LlmConfig, LlmError, LlmType };
use crate::models::chat::ChatRequest;
use crate::stream::smooth::smooth_by_line;
use crate::stream::EventStream;

use log::{ info, warn };
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Prompt(#[from] PromptError),
}

/// Generation knobs shared by every request.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub temperature: f32,
    pub max_steps: usize,
    pub smooth_delay: Duration,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            temperature: 0.4,
            max_steps: 5,
            smooth_delay: Duration::from_millis(50),
        }
    }
}

/// Turns a chat request into a streamed provider reply. Stateless between
/// requests; the only per-request work is prompt rendering and backend lookup.
#[derive(Clone)]
pub struct ChatAgent {
    clients: HashMap<LlmType, Arc<dyn ChatClient>>,
    prompt: Arc<PromptTemplate>,
    region: Region,
    settings: ChatSettings,
}

impl ChatAgent {
    pub fn new(args: &Args) -> Result<Self, AgentError> {
        let mut clients: Vec<Arc<dyn ChatClient>> = Vec::new();

        let providers = [
            (LlmType::Groq, &args.groq_api_key, &args.groq_base_url),
            (LlmType::Gemini, &args.google_api_key, &args.gemini_base_url),
        ];
        for (llm_type, api_key, base_url) in providers {
            let config = LlmConfig {
                llm_type,
                api_key: Some(api_key.clone()),
                base_url: base_url.clone(),
            };
            match new_client(&config) {
                Ok(client) => {
                    info!(
                        "Chat client configured: Type={}, BaseURL={}",
                        llm_type,
                        client.base_url()
                    );
                    clients.push(client);
                }
                Err(LlmError::MissingApiKey(_)) => {
                    warn!("No API key for {}; models served by it will fail", llm_type);
                }
                Err(e) => return Err(e.into()),
            }
        }

        let prompt = match &args.system_prompt_path {
            Some(path) => PromptTemplate::load(path)?,
            None => PromptTemplate::default(),
        };
        let region = Region::new(args.timezone_name.clone(), args.timezone_offset_minutes)?;
        let settings = ChatSettings {
            temperature: args.temperature,
            max_steps: args.max_steps,
            smooth_delay: Duration::from_millis(args.smooth_delay_ms),
        };

        Ok(Self::with_clients(clients, prompt, region, settings))
    }

    pub fn with_clients(
        clients: Vec<Arc<dyn ChatClient>>,
        prompt: PromptTemplate,
        region: Region,
        settings: ChatSettings
    ) -> Self {
        let clients = clients
            .into_iter()
            .map(|client| (client.llm_type(), client))
            .collect();
        Self { clients, prompt: Arc::new(prompt), region, settings }
    }

    /// Resolves the backend and renders the system prompt for one request.
    pub fn build_completion(&self, request: &ChatRequest) -> (ModelSelector, CompletionRequest) {
        let selector = ModelSelector::resolve(request.selected_model.as_deref());
        let backend = selector.backend();

        let completion = CompletionRequest {
            model: backend.model.to_string(),
            system: self.prompt.render(&self.region),
            messages: request.messages.clone(),
            temperature: self.settings.temperature,
            search_grounding: backend.search_grounding,
            reasoning: backend.reasoning,
        };
        (selector, completion)
    }

    pub async fn stream_reply(&self, request: &ChatRequest) -> Result<EventStream, AgentError> {
        if request.messages.is_empty() {
            return Err(AgentError::InvalidRequest("messages must not be empty".into()));
        }

        let (selector, completion) = self.build_completion(request);
        let backend = selector.backend();
        let client = self.clients
            .get(&backend.llm_type)
            .cloned()
            .ok_or(LlmError::MissingApiKey(backend.llm_type))?;

        info!(
            "Streaming reply: selector={} model={} messages={}",
            selector,
            backend.model,
            completion.messages.len()
        );

        let events = stream_with_continuation(client, completion, self.settings.max_steps).await?;
        Ok(smooth_by_line(events, self.settings.smooth_delay))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::prompt::{ COUNTRY_PLACEHOLDER, CURRENT_TIME_PLACEHOLDER };
    use crate::models::chat::ConversationMessage;
    use crate::models::stream::{ FinishReason, StreamEvent };
    use crate::stream::from_events;
    use async_trait::async_trait;
    use futures::StreamExt;
    use std::sync::Mutex;

    struct RecordingClient {
        llm_type: LlmType,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    #[async_trait]
    impl ChatClient for RecordingClient {
        async fn stream_step(&self, request: &CompletionRequest) -> Result<EventStream, LlmError> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(from_events(vec![
                Ok(StreamEvent::text(format!("from {}", request.model))),
                Ok(StreamEvent::Finish { finish_reason: FinishReason::Stop })
            ]))
        }

        fn llm_type(&self) -> LlmType {
            self.llm_type
        }

        fn base_url(&self) -> &str {
            "http://recording"
        }
    }

    fn recording(llm_type: LlmType) -> Arc<RecordingClient> {
        Arc::new(RecordingClient { llm_type, seen: Mutex::new(Vec::new()) })
    }

    fn agent(clients: Vec<Arc<dyn ChatClient>>) -> ChatAgent {
        let settings = ChatSettings { smooth_delay: Duration::ZERO, ..ChatSettings::default() };
        ChatAgent::with_clients(
            clients,
            PromptTemplate::default(),
            Region::new("Asia/Bangkok", 420).unwrap(),
            settings
        )
    }

    fn request(selected: Option<&str>) -> ChatRequest {
        ChatRequest {
            messages: vec![ConversationMessage::user("hello")],
            selected_model: selected.map(str::to_string),
        }
    }

    #[test]
    fn test_build_completion_routes_and_renders_prompt() {
        let agent = agent(vec![]);
        for selector in ModelSelector::ALL {
            let (resolved, completion) = agent.build_completion(&request(Some(selector.as_str())));
            assert_eq!(resolved, selector);
            assert_eq!(completion.model, selector.backend().model);
            assert_eq!(completion.search_grounding, selector.backend().search_grounding);
            assert!(!completion.system.contains(CURRENT_TIME_PLACEHOLDER));
            assert!(!completion.system.contains(COUNTRY_PLACEHOLDER));
            assert!((completion.temperature - 0.4).abs() < f32::EPSILON);
        }
    }

    #[test]
    fn test_build_completion_defaults_unknown_selector() {
        let agent = agent(vec![]);
        let (resolved, completion) = agent.build_completion(&request(Some("gpt-9")));
        assert_eq!(resolved, ModelSelector::Fast);
        assert_eq!(completion.model, "qwen-2.5-32b");
        let (resolved, _) = agent.build_completion(&request(None));
        assert_eq!(resolved, ModelSelector::Fast);
    }

    #[tokio::test]
    async fn test_stream_reply_uses_matching_provider() {
        let groq = recording(LlmType::Groq);
        let gemini = recording(LlmType::Gemini);
        let agent = agent(vec![groq.clone() as Arc<dyn ChatClient>, gemini.clone()]);

        let events: Vec<StreamEvent> = agent.stream_reply(&request(Some("search"))).await
            .unwrap()
            .map(|e| e.unwrap())
            .collect().await;

        assert_eq!(events[0], StreamEvent::text("from gemini-2.0-flash-001"));
        assert!(groq.seen.lock().unwrap().is_empty());
        let seen = gemini.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].search_grounding);
        assert_eq!(seen[0].messages, vec![ConversationMessage::user("hello")]);
    }

    #[tokio::test]
    async fn test_missing_provider_fails_before_streaming() {
        let agent = agent(vec![recording(LlmType::Groq) as Arc<dyn ChatClient>]);
        let result = agent.stream_reply(&request(Some("pro"))).await;
        assert!(matches!(result, Err(AgentError::Llm(LlmError::MissingApiKey(LlmType::Gemini)))));
    }

    #[tokio::test]
    async fn test_empty_conversation_is_rejected() {
        let groq = recording(LlmType::Groq);
        let agent = agent(vec![groq.clone() as Arc<dyn ChatClient>]);
        let empty = ChatRequest { messages: vec![], selected_model: None };
        assert!(matches!(agent.stream_reply(&empty).await, Err(AgentError::InvalidRequest(_))));
        assert!(groq.seen.lock().unwrap().is_empty());
    }
}
