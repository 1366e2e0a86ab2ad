use futures::{ Stream, StreamExt };
use log::{ debug, warn };
use reqwest::Client as HttpClient;
use serde::Deserialize;
use std::pin::Pin;
use thiserror::Error;

use crate::models::chat::ChatRequest;
use crate::models::stream::StreamEvent;
use crate::server::api::API_KEY_HEADER;
use crate::stream::sse::sse_frames;
use crate::view::{ ChatView, ViewEffect };

pub type ReplyStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, ClientError>> + Send>>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request to chat relay failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("chat relay returned {status}: {message}")]
    Status {
        status: u16,
        message: String,
    },

    #[error("invalid event from chat relay: {0}")]
    Decode(String),
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// HTTP client for the relay's `/api/chat` endpoint.
#[derive(Clone)]
pub struct ChatServiceClient {
    http: HttpClient,
    base_url: String,
    api_key: Option<String>,
}

impl ChatServiceClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http: HttpClient::new(),
            base_url: base_url.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    pub async fn send(&self, request: &ChatRequest) -> Result<ReplyStream, ClientError> {
        let url = format!("{}/api/chat", self.base_url.trim_end_matches('/'));
        let mut req = self.http.post(&url).json(request);
        if let Some(key) = &self.api_key {
            req = req.header(API_KEY_HEADER, key);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or(body);
            return Err(ClientError::Status { status: status.as_u16(), message });
        }

        let events = sse_frames(Box::pin(resp.bytes_stream())).map(|frame| {
            let frame = frame?;
            debug!("relay event {:?}: {}", frame.event, frame.data);
            serde_json::from_str::<StreamEvent>(&frame.data)
                .map_err(|e| ClientError::Decode(format!("{}: {}", e, frame.data)))
        });
        Ok(Box::pin(events))
    }

    /// Sends `request` and folds the reply into `view`, calling `observe` for
    /// every event as it arrives. Failures leave the view idle with an error.
    pub async fn stream_into_view<F>(
        &self,
        view: &mut ChatView,
        request: &ChatRequest,
        mut observe: F
    ) -> Vec<ViewEffect>
    where
        F: FnMut(&StreamEvent, &ChatView),
    {
        let mut effects = Vec::new();

        let mut events = match self.send(request).await {
            Ok(events) => events,
            Err(e) => {
                warn!("Chat request failed: {}", e);
                view.fail(e.to_string());
                return effects;
            }
        };

        while let Some(item) = events.next().await {
            match item {
                Ok(event) => {
                    effects.extend(view.apply(event.clone()));
                    observe(&event, view);
                }
                Err(e) => {
                    warn!("Reply stream failed: {}", e);
                    view.fail(e.to_string());
                    return effects;
                }
            }
        }

        if view.is_loading() {
            view.fail("connection closed before the reply finished");
        }
        effects
    }
}
