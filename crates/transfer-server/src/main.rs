mod api;
mod config;
mod error;
mod locks;
mod openapi;
mod pipe;
mod startup;
mod state;
mod store;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("BUILD_INFO"), ")");

#[derive(Parser, Debug)]
#[command(name = "transfer-server", version = VERSION)]
struct Args {
    /// HTTP bind address, e.g. 0.0.0.0:8080
    #[arg(long)]
    bind: Option<std::net::SocketAddr>,

    /// Directory uploaded files are stored in
    #[arg(long)]
    upload_dir: Option<PathBuf>,

    /// Optional server config file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[actix_web::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,actix_web=info,transfer_server=info")
        }))
        .init();

    startup::run(args).await
}
