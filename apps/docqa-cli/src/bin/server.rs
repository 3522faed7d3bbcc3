use std::sync::Arc;

use docqa_cli::{http, logging};
use docqa_core::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let settings = config.settings()?;
    let rag = Arc::new(docqa_rag::from_config(&config)?);
    http::serve(rag, &settings.server).await
}
