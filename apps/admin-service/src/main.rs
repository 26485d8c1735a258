use anyhow::Result;
use tokio::net::TcpListener;
use tracing::info;

use studydesk_admin_service::build_router;
use studydesk_admin_service::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_filter.clone())),
        )
        .init();

    let listener = TcpListener::bind(config.bind_addr).await?;
    info!(
        bind_addr = %config.bind_addr,
        store_path = ?config.store_path,
        "admin service listening"
    );
    axum::serve(listener, build_router(config)).await?;
    Ok(())
}
