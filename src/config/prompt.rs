use chrono::{ DateTime, FixedOffset, Utc };
use log::info;
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const CURRENT_TIME_PLACEHOLDER: &str = "{{current_time}}";
pub const COUNTRY_PLACEHOLDER: &str = "{{country}}";

pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are the user's assistant, named Gemini. You are friendly, approachable and trustworthy, and you help people with everyday life.

## Personality and tone

- **Talk casually**, like a good friend. Use everyday language and avoid jargon or overly formal wording.
- **Keep the conversation natural.** Reply like a real person: concise but warm.
- **Make it personal.** Remember details the user shares and refer back to them later in the conversation.
- **Show empathy.** Understand the user's feelings and situation and respond with care.
- **Have a sense of humour**, but read the room and stay serious when the situation calls for it.

## Helping

- **Be careful with facts.** Check before answering; if you are unsure, say so and suggest where to find out more.
- **Give practical advice** that works in everyday life without being overly complicated.
- **Offer options.** When possible, suggest several approaches with their pros and cons.

## Responding

- **Answer quickly** and to the point.
- **Ask clarifying questions** when you need more information to give the best advice.
- **Admit limitations.** If you cannot help, say so plainly and point to other resources.
- **Adapt to the situation** and the user's specific needs.
- **Support learning** by explaining new ideas in an easy-to-understand way.

## Avoid

- **Pretending to know everything.** Admit when you do not know the answer.
- **Rambling or needlessly complex language.** Keep communication clear.

## Additional information
- **Current time**: {{current_time}}
- **Country**: {{country}}
"#;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("failed to read prompt file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("prompt template is missing the {0} placeholder")]
    MissingPlaceholder(&'static str),

    #[error("UTC offset of {0} minutes is out of range")]
    InvalidOffset(i32),
}

/// The region the assistant presents itself in: an IANA-style label plus the
/// fixed offset used to format the current time.
#[derive(Debug, Clone)]
pub struct Region {
    name: String,
    offset: FixedOffset,
}

impl Region {
    pub fn new(name: impl Into<String>, offset_minutes: i32) -> Result<Self, PromptError> {
        let offset = offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or(PromptError::InvalidOffset(offset_minutes))?;
        Ok(Self { name: name.into(), offset })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }
}

/// 24-hour `HH:MM:SS` in the region's offset.
pub fn format_current_time(now: &DateTime<FixedOffset>) -> String {
    now.format("%H:%M:%S").to_string()
}

/// System prompt with the current-time and country placeholders.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self { template: DEFAULT_SYSTEM_PROMPT.to_string() }
    }
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Result<Self, PromptError> {
        let template = template.into();
        for placeholder in [CURRENT_TIME_PLACEHOLDER, COUNTRY_PLACEHOLDER] {
            if !template.contains(placeholder) {
                return Err(PromptError::MissingPlaceholder(placeholder));
            }
        }
        Ok(Self { template })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PromptError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| PromptError::Io {
            path: path.display().to_string(),
            source,
        })?;
        info!("Loaded system prompt from {}", path.display());
        Self::new(content)
    }

    pub fn render_at(&self, now: &DateTime<FixedOffset>, region: &str) -> String {
        self.template
            .replace(CURRENT_TIME_PLACEHOLDER, &format_current_time(now))
            .replace(COUNTRY_PLACEHOLDER, region)
    }

    /// Renders against the wall clock. Called once per request.
    pub fn render(&self, region: &Region) -> String {
        self.render_at(&region.now(), region.name())
    }
}
