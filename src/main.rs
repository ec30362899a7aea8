use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};

use school_cms::api::AppState;
use school_cms::phones::PhonesClient;
use school_cms::{config, db, server};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| cfg.default_database_url());
    let pool = db::init_pool(&database_url).await?;
    db::run_migrations(&pool).await?;

    let mut state = AppState::new(pool, cfg.pagination);
    let api_url = std::env::var("API_URL").ok().or(cfg.phones.api_url.clone());
    match api_url {
        Some(url) => {
            let client = PhonesClient::new(&url, Duration::from_secs(cfg.phones.timeout_seconds))
                .context("building phones API client")?;
            info!(%url, "phones proxy enabled");
            state = state.with_phones(Arc::new(client));
        }
        None => warn!("no phones API URL configured; /api/phones will answer 500"),
    }

    let addr = cfg.server.socket_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    server::serve(listener, server::app(state, &cfg.server)).await
}
