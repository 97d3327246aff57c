use std::{net::SocketAddr, str::FromStr, sync::Arc};

use axum::{Extension, Router, routing::get};
use tokio::sync::Mutex;

use crate::{
    api::{self, CallbackState},
    config::Config,
    error::{Error, Result},
    types::PkceToken,
};

/// Serves `/health` and `/callback` until the task is aborted.
pub async fn start_api_server(config: Config, pending: Arc<Mutex<Option<PkceToken>>>) -> Result<()> {
    let addr = SocketAddr::from_str(&config.server_address).map_err(|e| {
        Error::Config(format!(
            "invalid SERVER_ADDRESS '{}': {}",
            config.server_address, e
        ))
    })?;

    let state = CallbackState {
        config: Arc::new(config),
        pending,
    };
    let app = Router::new()
        .route("/health", get(api::health))
        .route("/callback", get(api::callback))
        .layer(Extension(state));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::debug!(%addr, "callback server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
