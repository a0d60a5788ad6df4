use tally_server::AppState;
use tally_server::config::ServerConfig;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let listener = TcpListener::bind(config.bind).await?;
    let addr = listener.local_addr()?;

    tracing::info!(
        enforce_ownership = config.room.enforce_ownership,
        "Server listening on {addr}"
    );
    tracing::info!("  - Room socket: ws://{addr}/rooms/{{room_id}}/ws");
    tracing::info!("  - Room view: http://{addr}/rooms/{{room_id}}");

    tally_server::serve(listener, AppState::new(config.room), shutdown_signal()).await?;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
