//! Run the HTTP API.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use receiptscan_server::ServerConfig;

#[derive(Args)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(short, long)]
    addr: Option<SocketAddr>,

    /// Enable the cloud engine
    #[arg(long)]
    cloud: bool,
}

pub async fn run(args: ServeArgs, config_path: Option<&str>) -> Result<()> {
    let mut config = ServerConfig::from_env()?;
    if let Some(addr) = args.addr {
        config.addr = addr;
    }
    if let Some(path) = config_path {
        config.pipeline_config = Some(PathBuf::from(path));
    }
    config.enable_cloud |= args.cloud;

    receiptscan_server::run(config).await
}
