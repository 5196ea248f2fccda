//! Binary entry point: configures tracing, binds the server, and runs
//! until either the accept loop errors or the process receives ctrl-c.

use aether_party::{AetherServer, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive("aether_party=info".parse()?))
        .init();

    let config = ServerConfig::from_env();
    let mut server = AetherServer::bind(config).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "server exited with error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("ctrl-c received, shutting down");
            server.shutdown().await;
        }
    }

    Ok(())
}
