use log::debug;
use serde::{ Deserialize, Serialize };
use std::fmt;

use super::LlmType;

/// Client-supplied tag choosing one of the hosted backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelSelector {
    #[default]
    Fast,
    Pro,
    Reasoning,
    Search,
}

/// Fixed configuration of one hosted backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendConfig {
    pub llm_type: LlmType,
    pub model: &'static str,
    pub search_grounding: bool,
    pub reasoning: bool,
}

const FAST_BACKEND: BackendConfig = BackendConfig {
    llm_type: LlmType::Groq,
    model: "qwen-2.5-32b",
    search_grounding: false,
    reasoning: false,
};

const PRO_BACKEND: BackendConfig = BackendConfig {
    llm_type: LlmType::Gemini,
    model: "gemini-2.5-pro-exp-03-25",
    search_grounding: false,
    reasoning: false,
};

const REASONING_BACKEND: BackendConfig = BackendConfig {
    llm_type: LlmType::Groq,
    model: "deepseek-r1-distill-llama-70b",
    search_grounding: false,
    reasoning: true,
};

const SEARCH_BACKEND: BackendConfig = BackendConfig {
    llm_type: LlmType::Gemini,
    model: "gemini-2.0-flash-001",
    search_grounding: true,
    reasoning: false,
};

impl ModelSelector {
    pub const ALL: [ModelSelector; 4] = [
        ModelSelector::Fast,
        ModelSelector::Pro,
        ModelSelector::Reasoning,
        ModelSelector::Search,
    ];

    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "fast" => Some(ModelSelector::Fast),
            "pro" => Some(ModelSelector::Pro),
            "reasoning" => Some(ModelSelector::Reasoning),
            "search" => Some(ModelSelector::Search),
            _ => None,
        }
    }

    /// Unknown or missing tags fall back to `Fast` instead of failing the request.
    pub fn resolve(tag: Option<&str>) -> Self {
        match tag.and_then(Self::parse) {
            Some(selector) => selector,
            None => {
                debug!("Unrecognised model selector {:?}, using default", tag);
                ModelSelector::default()
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelSelector::Fast => "fast",
            ModelSelector::Pro => "pro",
            ModelSelector::Reasoning => "reasoning",
            ModelSelector::Search => "search",
        }
    }

    pub fn backend(&self) -> &'static BackendConfig {
        match self {
            ModelSelector::Fast => &FAST_BACKEND,
            ModelSelector::Pro => &PRO_BACKEND,
            ModelSelector::Reasoning => &REASONING_BACKEND,
            ModelSelector::Search => &SEARCH_BACKEND,
        }
    }
}

impl fmt::Display for ModelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_tag_routes_to_its_backend() {
        assert_eq!(ModelSelector::resolve(Some("fast")).backend().model, "qwen-2.5-32b");
        assert_eq!(
            ModelSelector::resolve(Some("pro")).backend().model,
            "gemini-2.5-pro-exp-03-25"
        );
        assert_eq!(
            ModelSelector::resolve(Some("reasoning")).backend().model,
            "deepseek-r1-distill-llama-70b"
        );
        let search = ModelSelector::resolve(Some("search")).backend();
        assert_eq!(search.model, "gemini-2.0-flash-001");
        assert_eq!(search.llm_type, LlmType::Gemini);
        assert!(search.search_grounding);
    }

    #[test]
    fn test_only_search_uses_grounding() {
        for selector in ModelSelector::ALL {
            assert_eq!(
                selector.backend().search_grounding,
                selector == ModelSelector::Search
            );
        }
    }

    #[test]
    fn test_unknown_or_missing_tag_uses_fast() {
        for tag in [None, Some(""), Some("turbo"), Some("FAST"), Some(" pro")] {
            assert_eq!(ModelSelector::resolve(tag), ModelSelector::Fast);
            assert_eq!(ModelSelector::resolve(tag).backend(), &FAST_BACKEND);
        }
    }

    #[test]
    fn test_tag_round_trips_through_as_str() {
        for selector in ModelSelector::ALL {
            assert_eq!(ModelSelector::parse(selector.as_str()), Some(selector));
        }
    }
}
