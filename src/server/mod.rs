pub mod api;

use crate::agent::ChatAgent;
use crate::cli::Args;
use log::{ info, warn };
use std::error::Error;
use std::sync::Arc;

pub struct Server {
    agent: Arc<ChatAgent>,
    args: Args,
}

impl Server {
    pub fn new(agent: Arc<ChatAgent>, args: Args) -> Self {
        Self { agent, args }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let api_key = self.args.server_api_key.clone().filter(|k| !k.trim().is_empty());
        if api_key.is_some() {
            info!("Server configured with API Key authentication.");
        } else {
            warn!("Server configured WITHOUT API Key authentication. Requests are open.");
        }

        let app = api::router(self.agent.clone(), api_key, self.args.rate_limit_per_second);
        api::start_http_server(&self.args, app).await
    }
}
