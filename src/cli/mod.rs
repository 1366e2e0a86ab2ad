use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Provider Args ---
    /// API key for Groq (fast and reasoning models)
    #[arg(long, env = "GROQ_API_KEY", default_value = "", hide_env_values = true)]
    pub groq_api_key: String,

    /// Base URL for the Groq API
    #[arg(long, env = "GROQ_BASE_URL")] // No default, let the client pick the public endpoint
    pub groq_base_url: Option<String>,

    /// API key for Google Gemini (pro and search models)
    #[arg(long, env = "GOOGLE_GENERATIVE_AI_API_KEY", default_value = "", hide_env_values = true)]
    pub google_api_key: String,

    /// Base URL for the Gemini API
    #[arg(long, env = "GEMINI_BASE_URL")]
    pub gemini_base_url: Option<String>,

    // --- Generation Args ---
    /// Sampling temperature sent with every completion
    #[arg(long, env = "TEMPERATURE", default_value = "0.4")]
    pub temperature: f32,

    /// Maximum number of provider requests per reply when a step stops for length
    #[arg(long, env = "MAX_STEPS", default_value = "5")]
    pub max_steps: usize,

    /// Delay in milliseconds after each line of streamed text
    #[arg(long, env = "SMOOTH_DELAY_MS", default_value = "50")]
    pub smooth_delay_ms: u64,

    // --- Prompt Args ---
    /// Optional file overriding the built-in system prompt. Must contain
    /// {{current_time}} and {{country}}.
    #[arg(long, env = "SYSTEM_PROMPT_PATH")]
    pub system_prompt_path: Option<String>,

    /// Region label substituted for {{country}}
    #[arg(long, env = "TIMEZONE_NAME", default_value = "Asia/Bangkok")]
    pub timezone_name: String,

    /// UTC offset in minutes used to format {{current_time}}
    #[arg(long, env = "TIMEZONE_OFFSET_MINUTES", default_value = "420", allow_hyphen_values = true)]
    pub timezone_offset_minutes: i32,

    // --- Server Args ---
    /// Host address and port for the server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    /// Chat requests accepted per second across all clients. 0 disables the limit.
    #[arg(long, env = "RATE_LIMIT_PER_SECOND", default_value = "10")]
    pub rate_limit_per_second: u32,

    /// Optional API Key required in the X-API-Key header of every chat request.
    #[arg(long, env = "SERVER_API_KEY", hide_env_values = true)]
    pub server_api_key: Option<String>,

    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}

/// Arguments of the terminal chat client.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Terminal client for the chat relay", long_about = None)]
pub struct ReplArgs {
    /// Base URL of a running chat relay
    #[arg(long, env = "CHAT_SERVER_URL", default_value = "http://127.0.0.1:4000")]
    pub server_url: String,

    /// API key sent as X-API-Key, if the relay requires one
    #[arg(long, env = "SERVER_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Initial model selector (fast, pro, reasoning, search)
    #[arg(long, env = "CHAT_MODEL", default_value = "fast")]
    pub model: String,
}
