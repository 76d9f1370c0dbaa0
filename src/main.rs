use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::oneshot;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use nutriward::api::RestApi;
use nutriward::config::{config_path, load_config, Config};
use nutriward::{Error, SnapshotStore};

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let path = config_path();
    let config = if path.exists() {
        load_config(&path)?
    } else {
        Config::default()
    };
    init_logging(&config);

    if !path.exists() {
        info!(path = %path.display(), "config file not found, using defaults");
    }
    info!(snapshot = %config.snapshot.path.display(), ttl_secs = config.snapshot.ttl_secs, "starting nutriward");

    let store = Arc::new(SnapshotStore::new(&config.snapshot.path, config.snapshot.ttl()));
    let api = RestApi::new(Arc::clone(&store), config.requisition.schedule_times.clone());

    let host: IpAddr = config
        .api
        .host
        .parse()
        .map_err(|e| Error::Server(format!("invalid api.host '{}': {}", config.api.host, e)))?;
    let addr = SocketAddr::new(host, config.api.port);

    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let (bound, server) = warp::serve(api.routes())
        .try_bind_with_graceful_shutdown(addr, async move {
            shutdown_rx.await.ok();
            info!("shutting down server");
        })
        .map_err(|e| Error::Server(e.to_string()))?;
    info!(%bound, "listening");

    let server_handle = tokio::spawn(server);

    signal::ctrl_c()
        .await
        .map_err(|e| Error::Server(e.to_string()))?;
    info!("ctrl+c received, starting graceful shutdown");

    shutdown_tx.send(()).ok();
    server_handle
        .await
        .map_err(|e| Error::Server(e.to_string()))?;

    info!("server shutdown complete");
    Ok(())
}
