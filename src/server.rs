use std::net::SocketAddr;

use axum::{Extension, Router, routing::get};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    api::{self, CallbackState},
    error::{ConfigError, Result},
};

pub fn router(state: CallbackState) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/callback", get(api::callback))
        .layer(Extension(state))
}

/// Binds the loopback server and serves it in the background until
/// `shutdown` is cancelled. Returns the bound address.
pub async fn start_api_server(
    address: &str,
    state: CallbackState,
    shutdown: CancellationToken,
) -> Result<SocketAddr> {
    let addr: SocketAddr = address.parse().map_err(|e: std::net::AddrParseError| {
        ConfigError::Invalid {
            key: "SERVER_ADDRESS",
            reason: e.to_string(),
        }
    })?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound = listener.local_addr()?;
    debug!(%bound, "callback server listening");

    tokio::spawn(async move {
        let served = axum::serve(listener, router(state))
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await;
        if let Err(e) = served {
            warn!(error = %e, "callback server stopped with an error");
        }
    });

    Ok(bound)
}
