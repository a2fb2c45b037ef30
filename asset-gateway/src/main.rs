// Asset Gateway - main.rs
// asset-gateway/src/main.rs
mod asset_store;
mod classifier;
mod decision;
mod error;
mod gateway;
mod legacy;
mod middleware;
mod policy;
mod rewriter;
mod session;

use actix_web::{web, App, HttpServer};
use common::{setup_tracing, Config};
use gateway::AssetGateway;
use middleware::AccessLog;
use std::io;

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Setup tracing
    setup_tracing("info").map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    // Load configuration
    let config = Config::from_env();

    if config.session.secret.is_empty() {
        tracing::warn!("No session secret configured; every request will be treated as anonymous");
    }

    // Policy tables are compiled once and shared read-only by every worker
    let gateway = AssetGateway::from_config(&config).map_err(|e| {
        tracing::error!("Invalid path policy: {}", e);
        io::Error::new(io::ErrorKind::InvalidInput, e)
    })?;

    // Save address before moving config into web::Data
    let server_addr = config.gateway_addr.clone();

    tracing::info!("Starting Asset Gateway on {}", server_addr);

    // Create data reference
    let gateway_data = web::Data::new(gateway);

    // Start HTTP server
    HttpServer::new(move || {
        let gateway_data = gateway_data.clone();
        App::new()
            .wrap(AccessLog::new())
            .configure(move |cfg| gateway::configure(cfg, gateway_data))
    })
    .bind(&server_addr)?
    .run()
    .await
}
