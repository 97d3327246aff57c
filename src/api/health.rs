use axum::{Extension, response::Json};
use serde_json::{Value, json};

use crate::api::CallbackState;

/// Reports liveness and whether the PKCE flow is still waiting for its code.
pub async fn health(Extension(state): Extension<CallbackState>) -> Json<Value> {
    let awaiting_callback = state
        .pending
        .lock()
        .await
        .as_ref()
        .is_some_and(|pkce| pkce.token.is_none());

    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "redirect_uri": state.config.redirect_uri,
        "awaiting_callback": awaiting_callback,
    }))
}
