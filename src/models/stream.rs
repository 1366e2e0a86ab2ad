use serde::{ Serialize, Deserialize };

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    ToolCalls,
    Error,
    Other,
}

/// One event of a streamed reply. Used both for provider output and on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    #[serde(rename = "text")] Text {
        text: String,
    },
    #[serde(rename = "reasoning")] Reasoning {
        text: String,
    },
    #[serde(rename = "redacted-reasoning")] RedactedReasoning {
        data: String,
    },
    #[serde(rename = "source")] Source {
        id: String,
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    #[serde(rename = "finish")] Finish {
        #[serde(rename = "finishReason")]
        finish_reason: FinishReason,
    },
    #[serde(rename = "error")] Error {
        message: String,
    },
}

impl StreamEvent {
    pub fn text(text: impl Into<String>) -> Self {
        StreamEvent::Text { text: text.into() }
    }

    pub fn reasoning(text: impl Into<String>) -> Self {
        StreamEvent::Reasoning { text: text.into() }
    }

    /// SSE event name for this event.
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::Text { .. } => "text",
            StreamEvent::Reasoning { .. } => "reasoning",
            StreamEvent::RedactedReasoning { .. } => "redacted-reasoning",
            StreamEvent::Source { .. } => "source",
            StreamEvent::Finish { .. } => "finish",
            StreamEvent::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_event_wire_shape() {
        let event = StreamEvent::Source {
            id: "s1".into(),
            url: "https://example.com/a".into(),
            title: None,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"source","id":"s1","url":"https://example.com/a"}"#);
        assert_eq!(event.kind(), "source");
    }

    #[test]
    fn test_finish_event_wire_shape() {
        let json = serde_json::to_string(
            &(StreamEvent::Finish { finish_reason: FinishReason::ContentFilter })
        ).unwrap();
        assert_eq!(json, r#"{"type":"finish","finishReason":"content-filter"}"#);
    }
}
