use pulldown_cmark::{ html, Event, Options, Parser, Tag, TagEnd };
use url::Url;

use crate::models::chat::{ Message, MessagePart, ReasoningDetail };

pub const REDACTED_PLACEHOLDER: &str = "[redacted]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedPart {
    Markdown {
        source: String,
        html: String,
    },
    Preformatted {
        text: String,
    },
    /// `href` is `None` when the source URL is not an http(s) link.
    Citation {
        href: Option<String>,
        label: String,
    },
}

/// Only absolute http and https URLs are rendered as link targets.
pub fn is_safe_link(url: &str) -> bool {
    Url::parse(url)
        .map(|parsed| matches!(parsed.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Markdown to HTML. Raw HTML in model output is escaped, not passed through,
/// and links or images with a non-http(s) target keep only their text.
pub fn render_markdown(source: &str) -> String {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS;
    let mut kept_targets: Vec<bool> = Vec::new();
    let parser = Parser::new_ext(source, options).filter_map(move |event| {
        let keep = match &event {
            Event::Start(Tag::Link { dest_url, .. } | Tag::Image { dest_url, .. }) => {
                let safe = is_safe_link(dest_url);
                kept_targets.push(safe);
                safe
            }
            Event::End(TagEnd::Link | TagEnd::Image) => kept_targets.pop().unwrap_or(true),
            _ => true,
        };
        if !keep {
            return None;
        }
        Some(match event {
            Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
            other => other,
        })
    });

    let mut out = String::with_capacity(source.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

pub fn render_reasoning(details: &[ReasoningDetail]) -> String {
    details
        .iter()
        .map(|detail| match detail {
            ReasoningDetail::Text(text) => text.as_str(),
            ReasoningDetail::Redacted(_) => REDACTED_PLACEHOLDER,
        })
        .collect()
}

/// Visible label of a citation: the title, or the URL's host name.
pub fn citation_label(url: &str, title: Option<&str>) -> String {
    if let Some(title) = title.map(str::trim).filter(|t| !t.is_empty()) {
        return title.to_string();
    }
    Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}

pub fn render_part(part: &MessagePart) -> RenderedPart {
    match part {
        MessagePart::Text { text } =>
            RenderedPart::Markdown { source: text.clone(), html: render_markdown(text) },
        MessagePart::Reasoning { details } =>
            RenderedPart::Preformatted { text: render_reasoning(details) },
        MessagePart::Source { url, title } =>
            RenderedPart::Citation {
                href: Some(url.clone()).filter(|url| is_safe_link(url)),
                label: citation_label(url, title.as_deref()),
            },
    }
}

pub fn render_message(message: &Message) -> Vec<RenderedPart> {
    message.parts.iter().map(render_part).collect()
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

impl RenderedPart {
    /// HTML fragment for a browser transcript.
    pub fn to_html(&self) -> String {
        match self {
            RenderedPart::Markdown { html, .. } => html.clone(),
            RenderedPart::Preformatted { text } =>
                format!("<pre class=\"reasoning\">{}</pre>", escape_html(text)),
            RenderedPart::Citation { href: None, label } =>
                format!("<span class=\"citation\">{}</span>", escape_html(label)),
            RenderedPart::Citation { href: Some(href), label } =>
                format!(
                    "<a class=\"citation\" href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">{}</a>",
                    escape_html(href),
                    escape_html(label)
                ),
        }
    }
}
