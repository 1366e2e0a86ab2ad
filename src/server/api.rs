use crate::agent::{ AgentError, ChatAgent };
use crate::cli::Args;
use crate::llm::LlmError;
use crate::models::chat::ChatRequest;
use crate::models::stream::StreamEvent;
use crate::stream::{ create_streaming_response, EventStream };

use std::error::Error;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use axum::{
    routing::{ get, post },
    Router,
    extract::{ rejection::JsonRejection, Request, State },
    middleware::{ self, Next },
    response::{ sse::{ Event, KeepAlive, Sse }, IntoResponse, Response },
    http::StatusCode,
    Json,
};
use futures::{ Stream, StreamExt };
use governor::{ RateLimiter, Quota, state::{ InMemoryState, NotKeyed }, clock::DefaultClock };
use serde::Serialize;
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, warn, error };

pub const API_KEY_HEADER: &str = "X-API-Key";

type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Clone)]
struct AppState {
    agent: Arc<ChatAgent>,
    api_key: Option<String>,
    limiter: Option<Arc<Limiter>>,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorBody { error: message.into() })).into_response()
}

impl IntoResponse for AgentError {
    fn into_response(self) -> Response {
        let status = match &self {
            AgentError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AgentError::Prompt(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AgentError::Llm(err) => match err {
                LlmError::MissingApiKey(_) | LlmError::ClientUnavailable(_) | LlmError::Config(_) =>
                    StatusCode::INTERNAL_SERVER_ERROR,
                _ if err.upstream_status() == Some(429) => StatusCode::TOO_MANY_REQUESTS,
                _ => StatusCode::BAD_GATEWAY,
            },
        };
        error_response(status, self.to_string())
    }
}

pub fn router(agent: Arc<ChatAgent>, api_key: Option<String>, requests_per_second: u32) -> Router {
    let limiter = NonZeroU32::new(requests_per_second).map(|rate| {
        Arc::new(RateLimiter::direct(Quota::per_second(rate)))
    });
    let state = AppState { agent, api_key, limiter };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/chat", post(chat_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn start_http_server(args: &Args, app: Router) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = args.server_addr.parse::<SocketAddr>()?;

    if args.enable_tls {
        let (cert_path, key_path) = match (&args.tls_cert_path, &args.tls_key_path) {
            (Some(cert_path), Some(key_path)) => (cert_path, key_path),
            _ => {
                error!("Both --tls-cert-path and --tls-key-path must be provided to enable TLS.");
                return Err("TLS enabled without cert/key".into());
            }
        };
        info!("TLS enabled. Loading certificate from '{}' and key from '{}'", cert_path, key_path);
        let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
            cert_path,
            key_path
        ).await?;

        info!("Starting HTTPS server on: https://{}", addr);
        axum_server::bind_rustls(addr, tls_config)
            .serve(app.into_make_service())
            .await?;
    } else {
        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
            error!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e);
            e
        })?;
        info!("Starting HTTP server on: http://{}", addr);
        axum::serve(listener, app.into_make_service()).await?;
    }

    Ok(())
}

async fn require_api_key(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if let Some(required) = &state.api_key {
        let provided = req
            .headers()
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok());
        if provided != Some(required.as_str()) {
            warn!("Rejected {} {}: bad or missing API key", req.method(), req.uri().path());
            return error_response(StatusCode::UNAUTHORIZED, "Unauthorized");
        }
    }
    next.run(req).await
}

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

async fn chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>
) -> Response {
    if let Some(limiter) = &state.limiter {
        if limiter.check().is_err() {
            warn!("Chat rate limit exceeded. Rejecting request.");
            return error_response(StatusCode::TOO_MANY_REQUESTS, "Too many requests");
        }
    }

    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            warn!("Malformed chat request: {}", rejection.body_text());
            return error_response(StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };

    match state.agent.stream_reply(&request).await {
        Ok(events) => sse_response(events).into_response(),
        Err(e) => {
            error!("Failed to start reply: {}", e);
            e.into_response()
        }
    }
}

fn to_sse_event(event: &StreamEvent) -> Result<Event, axum::Error> {
    Event::default().event(event.kind()).json_data(event)
}

/// Relays events as SSE. A provider failure mid-stream becomes one `error`
/// event and ends the response.
fn sse_response(events: EventStream) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let frames = create_streaming_response(move |tx| async move {
        let mut events = events;
        while let Some(item) = events.next().await {
            let (event, failed) = match item {
                Ok(event) => (event, false),
                Err(e) => {
                    error!("Provider stream failed: {}", e);
                    (StreamEvent::Error { message: e.to_string() }, true)
                }
            };
            if tx.send(to_sse_event(&event)).await.is_err() || failed {
                return;
            }
        }
    });

    Sse::new(frames).keep_alive(KeepAlive::default())
}
