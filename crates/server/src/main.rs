//! receiptscan REST API server

use anyhow::Result;
use receiptscan_server::{init_tracing, run, ServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::from_env()?;
    init_tracing(config.profile.default_log_filter());
    run(config).await
}
