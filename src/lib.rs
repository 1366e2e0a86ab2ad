pub mod agent;
pub mod cli;
pub mod client;
pub mod config;
pub mod llm;
pub mod models;
pub mod server;
pub mod stream;
pub mod view;

use agent::ChatAgent;
use cli::Args;
use log::info;
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Groq Base URL: {}", args.groq_base_url.as_deref().unwrap_or("default"));
    info!("Gemini Base URL: {}", args.gemini_base_url.as_deref().unwrap_or("default"));
    info!("Temperature: {}", args.temperature);
    info!("Max Steps: {}", args.max_steps);
    info!("Smooth Delay: {}ms", args.smooth_delay_ms);
    info!("Region: {} (UTC{:+}min)", args.timezone_name, args.timezone_offset_minutes);
    info!("System Prompt: {}", args.system_prompt_path.as_deref().unwrap_or("built-in"));
    info!("Rate Limit: {}/s", args.rate_limit_per_second);
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    let agent = Arc::new(ChatAgent::new(&args)?);
    let server = Server::new(agent, args);
    server.run().await?;

    Ok(())
}
