use std::net::SocketAddr;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cascade_merge::bitbucket::BitbucketClient;
use cascade_merge::config::Config;
use cascade_merge::dispatch::EventDispatcher;
use cascade_merge::server::{AppState, build_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cascade_merge=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("invalid configuration")?;
    tracing::debug!(config = ?config, "Loaded configuration");

    let client =
        BitbucketClient::new(config.bitbucket()).context("failed to build Bitbucket client")?;
    let dispatcher = EventDispatcher::new(client, config.dispatcher());
    let app = build_router(AppState::new(dispatcher, config.shared_key.as_bytes()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(
        release_prefix = %config.release_branch_prefix,
        development_branch = %config.development_branch,
        approvers = config.approvers.len(),
        "listening on {}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
