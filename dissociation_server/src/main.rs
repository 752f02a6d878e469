// SPDX-License-Identifier: MIT OR Apache-2.0
//! Dissociation server binary entry point.

use dissociation_server::{DissociationServer, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("dissociation_server=info".parse()?)
                .add_directive("dissociation_engine=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    // Load configuration from environment or defaults
    let config = ServerConfig::from_env()?;

    tracing::info!("Starting dissociation server on {}", config.bind_addr);

    let server = DissociationServer::from_config(config)?;
    server.serve().await?;

    Ok(())
}
