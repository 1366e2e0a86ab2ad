pub mod chat;
pub mod selector;

use serde::{ Deserialize, Serialize };
use std::str::FromStr;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmType {
    Groq,
    Gemini,
}

impl fmt::Display for LlmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmType::Groq => write!(f, "groq"),
            LlmType::Gemini => write!(f, "gemini"),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseLlmTypeError {
    message: String,
}

impl fmt::Display for ParseLlmTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseLlmTypeError {}

impl FromStr for LlmType {
    type Err = ParseLlmTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "groq" => Ok(LlmType::Groq),
            "gemini" | "google" => Ok(LlmType::Gemini),
            _ =>
                Err(ParseLlmTypeError {
                    message: format!("Invalid LLM type: '{}'", s),
                }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub llm_type: LlmType,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

/// Failures talking to a hosted model provider.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("{0} API key is not configured")]
    MissingApiKey(LlmType),

    #[error("no {0} client is configured")]
    ClientUnavailable(LlmType),

    #[error("{provider} request failed: {source}")]
    Http {
        provider: LlmType,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} API returned {status}: {body}")]
    Status {
        provider: LlmType,
        status: u16,
        body: String,
    },

    #[error("failed to decode {provider} stream chunk: {message}")]
    Decode {
        provider: LlmType,
        message: String,
    },

    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl LlmError {
    /// Upstream HTTP status, when the provider answered at all.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            LlmError::Status { status, .. } => Some(*status),
            LlmError::Http { source, .. } => source.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
