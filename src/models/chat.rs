use serde::{ Serialize, Deserialize };
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single turn as it travels between the chat view, the relay and the provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
}

impl ConversationMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub messages: Vec<ConversationMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_model: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "text")]
pub enum ReasoningDetail {
    #[serde(rename = "text")] Text(String),
    #[serde(rename = "redacted")] Redacted(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MessagePart {
    #[serde(rename = "text")] Text {
        text: String,
    },
    #[serde(rename = "reasoning")] Reasoning {
        details: Vec<ReasoningDetail>,
    },
    #[serde(rename = "source")] Source {
        url: String,
        title: Option<String>,
    },
}

/// A transcript entry held by the chat view.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub parts: Vec<MessagePart>,
}

impl Message {
    pub fn new(role: Role) -> Self {
        Self { id: Uuid::new_v4().to_string(), role, parts: Vec::new() }
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        let mut message = Self::new(Role::User);
        message.parts.push(MessagePart::Text { text: text.into() });
        message
    }

    /// Concatenated text parts; reasoning and sources are not sent back upstream.
    pub fn text_content(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                MessagePart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn to_conversation(&self) -> ConversationMessage {
        ConversationMessage { role: self.role, content: self.text_content() }
    }
}
