//! Client-side chat state: transcript, submit state machine and model choice.
//!
//! The view is driven by three inputs: the text field (`set_input`), the
//! submit control (`submit`) and the stream of reply events (`apply`). Each
//! operation returns the UI side effects it implies so a front end can scroll
//! or move focus without tracking transitions itself.

pub mod render;

use crate::llm::selector::ModelSelector;
use crate::models::chat::{ ChatRequest, Message, MessagePart, ReasoningDetail, Role };
use crate::models::stream::StreamEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatStatus {
    /// Ready for input.
    Idle,
    /// Request sent, nothing received yet. Input is disabled.
    Submitted,
    /// Reply is arriving.
    Streaming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewEffect {
    ScrollToBottom,
    FocusInput,
}

#[derive(Debug, Clone)]
pub struct ChatView {
    messages: Vec<Message>,
    input: String,
    status: ChatStatus,
    selected_model: ModelSelector,
    error: Option<String>,
}

impl Default for ChatView {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatView {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            input: String::new(),
            status: ChatStatus::Idle,
            selected_model: ModelSelector::default(),
            error: None,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn status(&self) -> ChatStatus {
        self.status
    }

    pub fn selected_model(&self) -> ModelSelector {
        self.selected_model
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.status != ChatStatus::Idle
    }

    pub fn can_submit(&self) -> bool {
        self.status == ChatStatus::Idle && !self.input.trim().is_empty()
    }

    pub fn set_input(&mut self, input: impl Into<String>) {
        self.input = input.into();
    }

    pub fn select_model(&mut self, selector: ModelSelector) {
        self.selected_model = selector;
    }

    /// Appends the user's message and returns the request to send. Returns
    /// `None` and changes nothing when the input is blank or a reply is
    /// still pending.
    pub fn submit(&mut self) -> Option<(ChatRequest, Vec<ViewEffect>)> {
        if !self.can_submit() {
            return None;
        }

        let text = std::mem::take(&mut self.input);
        self.messages.push(Message::user_text(text));
        self.status = ChatStatus::Submitted;
        self.error = None;

        let request = ChatRequest {
            messages: self.messages.iter().map(Message::to_conversation).collect(),
            selected_model: Some(self.selected_model.as_str().to_string()),
        };
        Some((request, vec![ViewEffect::ScrollToBottom]))
    }

    /// Folds one reply event into the transcript, in arrival order.
    pub fn apply(&mut self, event: StreamEvent) -> Vec<ViewEffect> {
        if self.status == ChatStatus::Idle {
            return Vec::new();
        }

        match event {
            StreamEvent::Finish { .. } => {
                self.status = ChatStatus::Idle;
                vec![ViewEffect::FocusInput]
            }
            StreamEvent::Error { message } => {
                self.fail(message);
                Vec::new()
            }
            StreamEvent::Text { text } => {
                let parts = self.reply_parts();
                match parts.last_mut() {
                    Some(MessagePart::Text { text: current }) => current.push_str(&text),
                    _ => parts.push(MessagePart::Text { text }),
                }
                vec![ViewEffect::ScrollToBottom]
            }
            StreamEvent::Reasoning { text } => {
                self.push_reasoning(ReasoningDetail::Text(text));
                vec![ViewEffect::ScrollToBottom]
            }
            StreamEvent::RedactedReasoning { data } => {
                self.push_reasoning(ReasoningDetail::Redacted(data));
                vec![ViewEffect::ScrollToBottom]
            }
            StreamEvent::Source { url, title, .. } => {
                self.reply_parts().push(MessagePart::Source { url, title });
                vec![ViewEffect::ScrollToBottom]
            }
        }
    }

    /// The request failed or the stream broke. The view returns to idle and
    /// keeps whatever part of the reply already arrived.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = ChatStatus::Idle;
        self.error = Some(message.into());
    }

    fn push_reasoning(&mut self, detail: ReasoningDetail) {
        let parts = self.reply_parts();
        if let Some(MessagePart::Reasoning { details }) = parts.last_mut() {
            match (details.last_mut(), detail) {
                (Some(ReasoningDetail::Text(current)), ReasoningDetail::Text(text)) => {
                    current.push_str(&text);
                }
                (_, detail) => details.push(detail),
            }
            return;
        }
        parts.push(MessagePart::Reasoning { details: vec![detail] });
    }

    /// Parts of the assistant message being streamed, opening it on the
    /// first event of a reply. Only called while a reply is pending, so the
    /// transcript holds at least the user's message.
    fn reply_parts(&mut self) -> &mut Vec<MessagePart> {
        if self.status == ChatStatus::Submitted {
            self.status = ChatStatus::Streaming;
            self.messages.push(Message::new(Role::Assistant));
        }
        let last = self.messages.len() - 1;
        &mut self.messages[last].parts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::stream::FinishReason;
    use crate::view::render::{ render_message, RenderedPart };

    fn submitted(text: &str) -> ChatView {
        let mut view = ChatView::new();
        view.set_input(text);
        view.submit().expect("submit accepted");
        view
    }

    #[test]
    fn test_submit_appends_user_message_and_builds_request() {
        let mut view = ChatView::new();
        view.select_model(ModelSelector::Search);
        view.set_input("What's new?");

        let (request, effects) = view.submit().unwrap();

        assert_eq!(view.status(), ChatStatus::Submitted);
        assert_eq!(view.messages().len(), 1);
        assert_eq!(view.input(), "");
        assert_eq!(request.selected_model.as_deref(), Some("search"));
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].content, "What's new?");
        assert_eq!(effects, vec![ViewEffect::ScrollToBottom]);
    }

    #[test]
    fn test_submit_blank_input_is_noop() {
        let mut view = ChatView::new();
        for input in ["", "   ", "\n\t "] {
            view.set_input(input);
            assert!(view.submit().is_none());
            assert!(view.messages().is_empty());
            assert_eq!(view.status(), ChatStatus::Idle);
        }
    }

    #[test]
    fn test_submit_while_submitted_or_streaming_is_noop() {
        let mut view = submitted("first");
        view.set_input("second");
        assert!(view.submit().is_none());
        assert_eq!(view.messages().len(), 1);
        assert_eq!(view.input(), "second");

        view.apply(StreamEvent::text("partial"));
        assert_eq!(view.status(), ChatStatus::Streaming);
        assert!(view.submit().is_none());
        assert_eq!(view.messages().len(), 2);
    }

    #[test]
    fn test_stream_builds_one_assistant_message_in_arrival_order() {
        let mut view = submitted("hi");

        view.apply(StreamEvent::text("Hello"));
        view.apply(StreamEvent::reasoning("thinking"));
        view.apply(StreamEvent::Source {
            id: "s1".into(),
            url: "https://example.com/page".into(),
            title: Some("Example".into()),
        });
        let effects = view.apply(StreamEvent::Finish { finish_reason: FinishReason::Stop });

        assert_eq!(effects, vec![ViewEffect::FocusInput]);
        assert_eq!(view.status(), ChatStatus::Idle);
        assert_eq!(view.messages().len(), 2);

        let reply = view.messages().last().unwrap();
        assert_eq!(reply.role, Role::Assistant);
        assert_eq!(render_message(reply), vec![
            RenderedPart::Markdown { source: "Hello".into(), html: "<p>Hello</p>\n".into() },
            RenderedPart::Preformatted { text: "thinking".into() },
            RenderedPart::Citation {
                href: Some("https://example.com/page".into()),
                label: "Example".into(),
            }
        ]);
    }

    #[test]
    fn test_consecutive_deltas_merge() {
        let mut view = submitted("hi");
        view.apply(StreamEvent::reasoning("a"));
        view.apply(StreamEvent::reasoning("b"));
        view.apply(StreamEvent::RedactedReasoning { data: "xyz".into() });
        view.apply(StreamEvent::text("Hel"));
        view.apply(StreamEvent::text("lo"));

        let reply = &view.messages()[1];
        assert_eq!(reply.parts, vec![
            MessagePart::Reasoning {
                details: vec![
                    ReasoningDetail::Text("ab".into()),
                    ReasoningDetail::Redacted("xyz".into())
                ],
            },
            MessagePart::Text { text: "Hello".into() }
        ]);
    }

    #[test]
    fn test_error_event_returns_to_idle_without_focus() {
        let mut view = submitted("hi");
        view.apply(StreamEvent::text("par"));
        let effects = view.apply(StreamEvent::Error { message: "quota".into() });

        assert!(effects.is_empty());
        assert_eq!(view.status(), ChatStatus::Idle);
        assert_eq!(view.error(), Some("quota"));
        assert_eq!(view.messages()[1].text_content(), "par");
    }

    #[test]
    fn test_request_failure_before_any_event() {
        let mut view = submitted("hi");
        view.fail("502 Bad Gateway");
        assert!(!view.is_loading());
        assert_eq!(view.messages().len(), 1);

        view.set_input("again");
        assert!(view.submit().is_some());
        assert!(view.error().is_none());
    }

    #[test]
    fn test_events_while_idle_are_ignored() {
        let mut view = ChatView::new();
        assert!(view.apply(StreamEvent::text("stray")).is_empty());
        assert!(view.messages().is_empty());
    }

    #[test]
    fn test_follow_up_request_carries_history() {
        let mut view = submitted("one");
        view.apply(StreamEvent::reasoning("hidden"));
        view.apply(StreamEvent::text("two"));
        view.apply(StreamEvent::Finish { finish_reason: FinishReason::Stop });

        view.set_input("three");
        let (request, _) = view.submit().unwrap();
        let contents: Vec<&str> = request.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
        assert_eq!(request.messages[1].role, Role::Assistant);
    }
}
